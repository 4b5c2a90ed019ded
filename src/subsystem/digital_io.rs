//! Digital I/O subsystem.
//!
//! Tracks the live direction of every line so writes to input lines can be
//! rejected without a round trip. Port-wide configuration applies to `IO`
//! and `BITIO` ports, per-bit configuration only to `BITIO` ports; fixed
//! `IN`/`OUT` ports cannot be reconfigured.
//!
//! Any operation a port's I/O type can never perform (configuring a fixed
//! port, writing a fixed input port) fails with `BadDigOperation`.
//! `WrongDigConfig` means the port could do it once its lines are
//! configured as outputs.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use super::{
    check_buffer, check_burst_count, check_flags, check_rate, check_sample_count,
    check_scan_options, scan_pacer, IoScan,
};
use crate::device::{DeviceCore, DioInfo, DioPortInfo, ScanCaps};
use crate::error::{Result, UlError};
use crate::scan::{ChannelConversion, ScanBuffer, ScanPlan, ScanStrategy};
use crate::timing::PacerSetting;
use crate::trigger::{check_retrigger, TriggerConfig};
use crate::types::{
    DInScanFlag, DOutScanFlag, DigitalDirection, DigitalPortIoType, DigitalPortType, FunctionType,
    ScanOption, ScanStatus, TransferStatus, TriggerType, WaitType,
};

/// Everything a family needs to encode one digital scan.
#[derive(Debug, Clone)]
pub struct DioScanSetup {
    /// Ports in scan order
    pub ports: Vec<DigitalPortType>,
    /// Scans requested (ring size when continuous)
    pub samples_per_chan: usize,
    /// Pacer divider and achievable rate
    pub pacer: PacerSetting,
    /// Scan options
    pub options: ScanOption,
    /// Trigger in effect
    pub trigger: TriggerConfig,
}

/// Family-specific digital operations. `index` is the port's position in
/// [`DioInfo::ports`].
pub trait DioBackend: Send + Sync {
    /// Read the input lines of a port.
    fn read_port(&self, port: &DioPortInfo, index: usize) -> Result<u64>;

    /// Drive the output latch of a port.
    fn write_port(&self, port: &DioPortInfo, index: usize, value: u64) -> Result<()>;

    /// Current direction mask; a set bit is an output line.
    fn read_output_mask(&self, port: &DioPortInfo, index: usize) -> Result<u64>;

    /// Set the direction mask; a set bit is an output line.
    fn write_output_mask(&self, port: &DioPortInfo, index: usize, mask: u64) -> Result<()>;

    /// Command strategy of a digital input scan.
    fn in_scan_strategy(&self, setup: &DioScanSetup) -> Result<Arc<dyn ScanStrategy>>;

    /// Command strategy of a digital output scan.
    fn out_scan_strategy(&self, setup: &DioScanSetup) -> Result<Arc<dyn ScanStrategy>>;
}

/// Digital I/O subsystem of one device.
pub struct DioDevice {
    core: Arc<DeviceCore>,
    info: DioInfo,
    backend: Arc<dyn DioBackend>,
    in_scan: IoScan,
    out_scan: IoScan,
    outputs: RwLock<Vec<u64>>,
    latch: RwLock<Vec<u64>>,
}

impl DioDevice {
    /// Subsystem over `backend`.
    pub fn new(core: Arc<DeviceCore>, info: DioInfo, backend: Arc<dyn DioBackend>) -> Self {
        let outputs = info
            .ports
            .iter()
            .map(|p| match p.io_type {
                DigitalPortIoType::Out => p.mask(),
                _ => 0,
            })
            .collect();
        let latch = vec![0; info.ports.len()];
        let in_triggers = info.in_scan.as_ref().map_or(TriggerType::NONE, |c| c.trigger_types);
        let out_triggers = info.out_scan.as_ref().map_or(TriggerType::NONE, |c| c.trigger_types);
        let in_scan = IoScan::new(FunctionType::Di, Arc::clone(core.input_engine()), in_triggers);
        let out_scan = IoScan::new(FunctionType::Do, Arc::clone(core.output_engine()), out_triggers);
        debug!(ports = info.ports.len(), "Created digital I/O subsystem");
        Self {
            core,
            info,
            backend,
            in_scan,
            out_scan,
            outputs: RwLock::new(outputs),
            latch: RwLock::new(latch),
        }
    }

    /// Capabilities.
    pub fn info(&self) -> &DioInfo {
        &self.info
    }

    fn port(&self, port: DigitalPortType) -> Result<(usize, &DioPortInfo)> {
        self.info.port(port).ok_or(UlError::BadPortType)
    }

    fn check_bit(info: &DioPortInfo, bit: u32) -> Result<()> {
        if bit >= info.num_bits {
            return Err(UlError::BadBitNum);
        }
        Ok(())
    }

    /// Read the live direction of every configurable port.
    pub fn load_directions(&self) -> Result<()> {
        for (index, port) in self.info.ports.iter().enumerate() {
            if matches!(port.io_type, DigitalPortIoType::Io | DigitalPortIoType::BitIo) {
                let mask = self.backend.read_output_mask(port, index)? & port.mask();
                if let Some(slot) = self.outputs.write().get_mut(index) {
                    *slot = mask;
                }
                debug!(port = ?port.port_type, mask, "Loaded port direction");
            }
        }
        Ok(())
    }

    /// Direction mask of `port`; a set bit is an output line.
    pub fn port_direction(&self, port: DigitalPortType) -> Result<u64> {
        let (index, _) = self.port(port)?;
        Ok(self.outputs.read().get(index).copied().unwrap_or(0))
    }

    /// Direction of one line.
    pub fn bit_direction(&self, port: DigitalPortType, bit: u32) -> Result<DigitalDirection> {
        let (_, info) = self.port(port)?;
        Self::check_bit(info, bit)?;
        let mask = self.port_direction(port)?;
        Ok(if mask & (1 << bit) != 0 {
            DigitalDirection::Output
        } else {
            DigitalDirection::Input
        })
    }

    /// Read-modify-write of a direction mask. The host copy stays locked
    /// until the device has accepted the new mask.
    fn update_mask(&self, index: usize, info: &DioPortInfo, f: impl FnOnce(u64) -> u64) -> Result<()> {
        let mut outputs = self.outputs.write();
        let slot = outputs.get_mut(index).ok_or(UlError::BadPortType)?;
        let mask = f(*slot);
        self.backend.write_output_mask(info, index, mask)?;
        *slot = mask;
        debug!(port = ?info.port_type, mask, "Port direction set");
        Ok(())
    }

    fn check_writable(info: &DioPortInfo) -> Result<()> {
        if info.io_type == DigitalPortIoType::In {
            return Err(UlError::BadDigOperation);
        }
        Ok(())
    }

    /// Configure every line of a port.
    pub fn d_config_port(&self, port: DigitalPortType, direction: DigitalDirection) -> Result<()> {
        let (index, info) = self.port(port)?;
        if !matches!(info.io_type, DigitalPortIoType::Io | DigitalPortIoType::BitIo) {
            return Err(UlError::BadDigOperation);
        }
        self.core.check_connected()?;
        let mask = match direction {
            DigitalDirection::Output => info.mask(),
            DigitalDirection::Input => 0,
        };
        self.update_mask(index, info, |_| mask)
    }

    /// Configure one line of a bit-configurable port.
    pub fn d_config_bit(&self, port: DigitalPortType, bit: u32, direction: DigitalDirection) -> Result<()> {
        let (index, info) = self.port(port)?;
        if info.io_type != DigitalPortIoType::BitIo {
            return Err(UlError::BadDigOperation);
        }
        Self::check_bit(info, bit)?;
        self.core.check_connected()?;
        self.update_mask(index, info, |current| match direction {
            DigitalDirection::Output => current | (1 << bit),
            DigitalDirection::Input => current & !(1 << bit),
        })
    }

    /// Read a port.
    pub fn d_in(&self, port: DigitalPortType) -> Result<u64> {
        let (index, info) = self.port(port)?;
        self.core.check_connected()?;
        Ok(self.backend.read_port(info, index)? & info.mask())
    }

    /// Write a port. Every line must be an output; a fixed input port
    /// fails with `BadDigOperation`.
    pub fn d_out(&self, port: DigitalPortType, value: u64) -> Result<()> {
        let (index, info) = self.port(port)?;
        Self::check_writable(info)?;
        if value > info.mask() {
            return Err(UlError::BadPortVal);
        }
        if self.port_direction(port)? != info.mask() {
            return Err(UlError::WrongDigConfig);
        }
        self.core.check_connected()?;
        self.backend.write_port(info, index, value)?;
        if let Some(slot) = self.latch.write().get_mut(index) {
            *slot = value;
        }
        Ok(())
    }

    /// Read one line.
    pub fn d_bit_in(&self, port: DigitalPortType, bit: u32) -> Result<u32> {
        let (_, info) = self.port(port)?;
        Self::check_bit(info, bit)?;
        let value = self.d_in(port)?;
        Ok(((value >> bit) & 1) as u32)
    }

    /// Write one output line.
    pub fn d_bit_out(&self, port: DigitalPortType, bit: u32, value: u32) -> Result<()> {
        let (index, info) = self.port(port)?;
        Self::check_writable(info)?;
        Self::check_bit(info, bit)?;
        if value > 1 {
            return Err(UlError::BadPortVal);
        }
        if self.bit_direction(port, bit)? != DigitalDirection::Output {
            return Err(UlError::WrongDigConfig);
        }
        self.core.check_connected()?;

        let mut latch = self.latch.write();
        let current = latch.get(index).copied().unwrap_or(0);
        let next = if value == 1 {
            current | (1 << bit)
        } else {
            current & !(1 << bit)
        };
        self.backend.write_port(info, index, next)?;
        if let Some(slot) = latch.get_mut(index) {
            *slot = next;
        }
        Ok(())
    }

    // =========================================================================
    // Scans
    // =========================================================================

    fn scan_ports(&self, low_port: DigitalPortType, high_port: DigitalPortType) -> Result<Vec<&DioPortInfo>> {
        let (low, _) = self.port(low_port)?;
        let (high, _) = self.port(high_port)?;
        if low > high {
            return Err(UlError::BadPortType);
        }
        Ok(self.info.ports[low..=high].iter().collect())
    }

    fn validate_scan(
        &self,
        caps: &ScanCaps,
        chan_count: usize,
        samples_per_chan: usize,
        rate: f64,
        options: ScanOption,
        buffer_len: usize,
        trigger: &TriggerConfig,
    ) -> Result<()> {
        check_scan_options(options, caps.scan_options)?;
        check_rate(rate, chan_count, options, caps, None)?;
        check_sample_count(samples_per_chan, caps)?;
        check_buffer(buffer_len, samples_per_chan, chan_count)?;
        check_burst_count(options, samples_per_chan, chan_count, caps)?;
        check_retrigger(options, trigger, chan_count, samples_per_chan)?;
        self.core.check_connected()
    }

    /// Start a background input scan of `low_port..=high_port`.
    pub fn d_in_scan(
        &self,
        low_port: DigitalPortType,
        high_port: DigitalPortType,
        samples_per_chan: usize,
        rate: f64,
        options: ScanOption,
        flags: DInScanFlag,
        buffer: &ScanBuffer<u64>,
    ) -> Result<f64> {
        let caps = self.info.in_scan.as_ref().ok_or(UlError::ConfigNotSupported)?;
        let ports = self.scan_ports(low_port, high_port)?;
        check_flags(flags.bits(), DInScanFlag::all().bits())?;
        let trigger = self.in_scan.trigger();
        self.validate_scan(caps, ports.len(), samples_per_chan, rate, options, buffer.len(), &trigger)?;

        let pacer = scan_pacer(caps, rate, options);
        let strategy = self.backend.in_scan_strategy(&DioScanSetup {
            ports: ports.iter().map(|p| p.port_type).collect(),
            samples_per_chan,
            pacer,
            options,
            trigger,
        })?;
        let plan = ScanPlan {
            function: FunctionType::Di,
            chan_count: ports.len(),
            samples_per_chan,
            rate: pacer.actual_rate,
            options,
            sample_size: caps.sample_size,
            conversions: ports
                .iter()
                .map(|p| ChannelConversion::Raw { mask: p.mask() })
                .collect(),
            cjc: None,
        };
        self.core
            .input_engine()
            .start(plan, strategy, buffer.clone().into())
    }

    /// Start a background output scan of `low_port..=high_port`. Every line
    /// of the scanned ports must be an output.
    pub fn d_out_scan(
        &self,
        low_port: DigitalPortType,
        high_port: DigitalPortType,
        samples_per_chan: usize,
        rate: f64,
        options: ScanOption,
        flags: DOutScanFlag,
        buffer: &ScanBuffer<u64>,
    ) -> Result<f64> {
        let caps = self.info.out_scan.as_ref().ok_or(UlError::ConfigNotSupported)?;
        let ports = self.scan_ports(low_port, high_port)?;
        check_flags(flags.bits(), DOutScanFlag::all().bits())?;
        for port in &ports {
            Self::check_writable(port)?;
            if self.port_direction(port.port_type)? != port.mask() {
                return Err(UlError::WrongDigConfig);
            }
        }
        let trigger = self.out_scan.trigger();
        self.validate_scan(caps, ports.len(), samples_per_chan, rate, options, buffer.len(), &trigger)?;

        let pacer = scan_pacer(caps, rate, options);
        let strategy = self.backend.out_scan_strategy(&DioScanSetup {
            ports: ports.iter().map(|p| p.port_type).collect(),
            samples_per_chan,
            pacer,
            options,
            trigger,
        })?;
        let plan = ScanPlan {
            function: FunctionType::Do,
            chan_count: ports.len(),
            samples_per_chan,
            rate: pacer.actual_rate,
            options,
            sample_size: caps.sample_size,
            conversions: ports
                .iter()
                .map(|p| ChannelConversion::Raw { mask: p.mask() })
                .collect(),
            cjc: None,
        };
        self.core
            .output_engine()
            .start(plan, strategy, buffer.clone().into())
    }

    fn scan_of(&self, function: FunctionType) -> Result<&IoScan> {
        match function {
            FunctionType::Di => Ok(&self.in_scan),
            FunctionType::Do => Ok(&self.out_scan),
            _ => Err(UlError::BadArg),
        }
    }

    /// Set the trigger of the input (`Di`) or output (`Do`) scan.
    pub fn d_set_trigger(
        &self,
        function: FunctionType,
        trig_type: TriggerType,
        trig_chan: u32,
        level: f64,
        variance: f64,
        retrig_count: u32,
    ) -> Result<()> {
        let scan = self.scan_of(function)?;
        let _guard = self.core.trigger_lock();
        scan.set_trigger(TriggerConfig {
            trig_type,
            trig_chan,
            level,
            variance,
            retrig_count,
        })
    }

    /// Status of the input (`Di`) or output (`Do`) scan.
    pub fn d_scan_status(&self, function: FunctionType) -> Result<(ScanStatus, TransferStatus)> {
        self.scan_of(function)?.status_pair()
    }

    /// Stop the input (`Di`) or output (`Do`) scan.
    pub fn d_scan_stop(&self, function: FunctionType) -> Result<()> {
        self.scan_of(function)?.stop()
    }

    /// Wait for the input (`Di`) or output (`Do`) scan.
    pub fn d_scan_wait(
        &self,
        function: FunctionType,
        wait_type: WaitType,
        wait_param: i64,
        timeout_secs: f64,
    ) -> Result<()> {
        self.scan_of(function)?.wait(wait_type, wait_param, timeout_secs)
    }

    pub(crate) fn port_info(&self, port: DigitalPortType) -> Result<&DioPortInfo> {
        self.port(port).map(|(_, info)| info)
    }
}
