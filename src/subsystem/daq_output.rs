//! Synchronous mixed-channel output.

use std::sync::Arc;

use tracing::debug;

use super::daq_input::port_from_code;
use super::{
    check_buffer, check_burst_count, check_flags, check_rate, check_sample_count,
    check_scan_options, scan_pacer, AoDevice, DioDevice, IoScan,
};
use crate::device::{DaqOInfo, DeviceCore};
use crate::error::{Result, UlError};
use crate::range::Range;
use crate::scan::{ChannelConversion, ScanBuffer, ScanPlan, ScanStrategy};
use crate::timing::PacerSetting;
use crate::trigger::{check_retrigger, TriggerConfig};
use crate::types::{
    DaqOutChanType, DaqOutScanFlag, FunctionType, ScanOption, ScanStatus, TransferStatus,
    TriggerType, WaitType,
};

/// One channel of a synchronous output scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaqOutChanDescriptor {
    /// AO channel or port code, depending on `chan_type`
    pub channel: u32,
    /// Exactly one channel type
    pub chan_type: DaqOutChanType,
    /// Range of analog channels
    pub range: Range,
}

/// Everything a family needs to encode one synchronous output scan.
#[derive(Debug, Clone)]
pub struct DaqOScanSetup {
    /// Channels in scan order
    pub descriptors: Vec<DaqOutChanDescriptor>,
    /// Scans requested (ring size when continuous)
    pub samples_per_chan: usize,
    /// Pacer divider and achievable rate
    pub pacer: PacerSetting,
    /// Scan options
    pub options: ScanOption,
    /// Trigger in effect
    pub trigger: TriggerConfig,
}

/// Family-specific synchronous output operations.
pub trait DaqOBackend: Send + Sync {
    /// Reject channel orders the hardware cannot update.
    fn check_chan_order(&self, _descriptors: &[DaqOutChanDescriptor]) -> Result<()> {
        Ok(())
    }

    /// Build the command strategy of one scan.
    fn scan_strategy(&self, setup: &DaqOScanSetup) -> Result<Arc<dyn ScanStrategy>>;
}

/// Synchronous output subsystem of one device.
pub struct DaqODevice {
    core: Arc<DeviceCore>,
    info: DaqOInfo,
    backend: Arc<dyn DaqOBackend>,
    scan: IoScan,
    ao: Option<Arc<AoDevice>>,
    dio: Option<Arc<DioDevice>>,
}

impl DaqODevice {
    /// Subsystem over `backend`.
    pub fn new(
        core: Arc<DeviceCore>,
        info: DaqOInfo,
        backend: Arc<dyn DaqOBackend>,
        ao: Option<Arc<AoDevice>>,
        dio: Option<Arc<DioDevice>>,
    ) -> Self {
        let scan = IoScan::new(
            FunctionType::DaqO,
            Arc::clone(core.output_engine()),
            info.scan.trigger_types,
        );
        debug!(chan_types = ?info.chan_types, max_chans = info.max_chans, "Created DAQ output subsystem");
        Self {
            core,
            info,
            backend,
            scan,
            ao,
            dio,
        }
    }

    /// Capabilities.
    pub fn info(&self) -> &DaqOInfo {
        &self.info
    }

    fn conversion(&self, desc: &DaqOutChanDescriptor, calibrate: bool, scale_data: bool) -> Result<ChannelConversion> {
        let ty = desc.chan_type;
        if ty.bits().count_ones() != 1 || !self.info.chan_types.contains(ty) {
            return Err(UlError::BadDaqoChanType);
        }
        if ty == DaqOutChanType::ANALOG {
            let ao = self.ao.as_ref().ok_or(UlError::BadDaqoChanType)?;
            if desc.channel >= ao.info().num_chans {
                return Err(UlError::BadAoChan);
            }
            if !ao.info().ranges.contains(&desc.range) {
                return Err(UlError::BadRange);
            }
            return Ok(ChannelConversion::Analog(ao.conversion(
                desc.channel,
                desc.range,
                calibrate,
                scale_data,
            )));
        }

        let dio = self.dio.as_ref().ok_or(UlError::BadDaqoChanType)?;
        let port = port_from_code(dio, desc.channel)?;
        let info = dio.port_info(port)?;
        if dio.port_direction(port)? != info.mask() {
            return Err(UlError::WrongDigConfig);
        }
        Ok(ChannelConversion::Raw { mask: info.mask() })
    }

    /// Start a synchronous output scan over `descriptors`. Returns the
    /// achievable per-channel rate.
    pub fn daq_out_scan(
        &self,
        descriptors: &[DaqOutChanDescriptor],
        samples_per_chan: usize,
        rate: f64,
        options: ScanOption,
        flags: DaqOutScanFlag,
        buffer: &ScanBuffer<f64>,
    ) -> Result<f64> {
        if descriptors.is_empty() || descriptors.len() > self.info.max_chans {
            return Err(UlError::BadNumChans);
        }
        let calibrate = !flags.contains(DaqOutScanFlag::NOCALIBRATEDATA);
        let scale_data = !flags.contains(DaqOutScanFlag::NOSCALEDATA);
        let conversions = descriptors
            .iter()
            .map(|d| self.conversion(d, calibrate, scale_data))
            .collect::<Result<Vec<_>>>()?;
        self.backend.check_chan_order(descriptors)?;

        let chan_count = descriptors.len();
        let caps = &self.info.scan;
        check_scan_options(options, caps.scan_options)?;
        check_flags(flags.bits(), self.info.scan_flags.bits())?;
        check_rate(rate, chan_count, options, caps, None)?;
        check_sample_count(samples_per_chan, caps)?;
        check_buffer(buffer.len(), samples_per_chan, chan_count)?;
        check_burst_count(options, samples_per_chan, chan_count, caps)?;
        let trigger = self.scan.trigger();
        check_retrigger(options, &trigger, chan_count, samples_per_chan)?;
        self.core.check_connected()?;

        let pacer = scan_pacer(caps, rate, options);
        let strategy = self.backend.scan_strategy(&DaqOScanSetup {
            descriptors: descriptors.to_vec(),
            samples_per_chan,
            pacer,
            options,
            trigger,
        })?;
        let plan = ScanPlan {
            function: FunctionType::DaqO,
            chan_count,
            samples_per_chan,
            rate: pacer.actual_rate,
            options,
            sample_size: caps.sample_size,
            conversions,
            cjc: None,
        };
        self.core
            .output_engine()
            .start(plan, strategy, buffer.clone().into())
    }

    /// Set the scan trigger.
    pub fn daq_out_set_trigger(
        &self,
        trig_type: TriggerType,
        trig_chan: u32,
        level: f64,
        variance: f64,
        retrig_count: u32,
    ) -> Result<()> {
        let _guard = self.core.trigger_lock();
        self.scan.set_trigger(TriggerConfig {
            trig_type,
            trig_chan,
            level,
            variance,
            retrig_count,
        })
    }

    /// Scan status; an error that ended the scan is returned once.
    pub fn daq_out_scan_status(&self) -> Result<(ScanStatus, TransferStatus)> {
        self.scan.status_pair()
    }

    /// Stop the scan. A no-op when idle.
    pub fn daq_out_scan_stop(&self) -> Result<()> {
        self.scan.stop()
    }

    /// Wait for the scan to finish.
    pub fn daq_out_scan_wait(&self, wait_type: WaitType, wait_param: i64, timeout_secs: f64) -> Result<()> {
        self.scan.wait(wait_type, wait_param, timeout_secs)
    }
}
