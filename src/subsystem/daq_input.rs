//! Synchronous mixed-channel input.
//!
//! One scan samples analog, digital and counter channels on the same pacer
//! clock. Each descriptor is validated against the subsystem it refers to and
//! converted with that subsystem's rules.

use std::sync::Arc;

use tracing::debug;

use super::{
    check_buffer, check_burst_count, check_flags, check_rate, check_sample_count,
    check_scan_options, scan_pacer, AiDevice, AiQueueElement, CtrDevice, DioDevice, IoScan,
};
use crate::device::{DaqIInfo, DeviceCore};
use crate::error::{Result, UlError};
use crate::range::Range;
use crate::scan::{ChannelConversion, CjcSource, ScanBuffer, ScanPlan, ScanStrategy};
use crate::timing::PacerSetting;
use crate::trigger::{check_retrigger, TriggerConfig};
use crate::types::{
    AiChanType, AiInputMode, DaqInChanType, DaqInScanFlag, DigitalPortType, FunctionType,
    ScanOption, ScanStatus, TransferStatus, TriggerType, WaitType,
};

/// One channel of a synchronous input scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaqInChanDescriptor {
    /// Channel, port code or counter number, depending on `chan_type`
    pub channel: u32,
    /// Exactly one channel type
    pub chan_type: DaqInChanType,
    /// Range of analog channels
    pub range: Range,
}

/// Everything a family needs to encode one synchronous input scan.
#[derive(Debug, Clone)]
pub struct DaqIScanSetup {
    /// Channels in scan order
    pub descriptors: Vec<DaqInChanDescriptor>,
    /// Scans requested (ring size when continuous)
    pub samples_per_chan: usize,
    /// Pacer divider and achievable rate
    pub pacer: PacerSetting,
    /// Scan options
    pub options: ScanOption,
    /// Leave counters running from their current value
    pub no_clear: bool,
    /// Trigger in effect
    pub trigger: TriggerConfig,
}

/// Family-specific synchronous input operations.
pub trait DaqIBackend: Send + Sync {
    /// Reject channel orders the hardware cannot sample.
    fn check_chan_order(&self, _descriptors: &[DaqInChanDescriptor]) -> Result<()> {
        Ok(())
    }

    /// Build the command strategy of one scan.
    fn scan_strategy(&self, setup: &DaqIScanSetup) -> Result<Arc<dyn ScanStrategy>>;
}

/// Synchronous input subsystem of one device.
pub struct DaqIDevice {
    core: Arc<DeviceCore>,
    info: DaqIInfo,
    backend: Arc<dyn DaqIBackend>,
    scan: IoScan,
    ai: Option<Arc<AiDevice>>,
    dio: Option<Arc<DioDevice>>,
    ctr: Option<Arc<CtrDevice>>,
}

fn analog_mode(chan_type: DaqInChanType) -> Option<AiInputMode> {
    match chan_type {
        DaqInChanType::ANALOG_SE => Some(AiInputMode::SingleEnded),
        DaqInChanType::ANALOG_DIFF => Some(AiInputMode::Differential),
        DaqInChanType::ANALOG_PSEUDO_DIFF => Some(AiInputMode::PseudoDifferential),
        _ => None,
    }
}

fn counter_bits(chan_type: DaqInChanType) -> Option<u32> {
    match chan_type {
        DaqInChanType::CTR16 => Some(16),
        DaqInChanType::CTR32 => Some(32),
        DaqInChanType::CTR48 => Some(48),
        DaqInChanType::CTR64 => Some(64),
        _ => None,
    }
}

pub(crate) fn port_from_code(dio: &DioDevice, code: u32) -> Result<DigitalPortType> {
    dio.info()
        .ports
        .iter()
        .map(|p| p.port_type)
        .find(|p| *p as i32 as i64 == i64::from(code))
        .ok_or(UlError::BadPortType)
}

impl DaqIDevice {
    /// Subsystem over `backend`, drawing channel rules from the other
    /// subsystems of the device.
    pub fn new(
        core: Arc<DeviceCore>,
        info: DaqIInfo,
        backend: Arc<dyn DaqIBackend>,
        ai: Option<Arc<AiDevice>>,
        dio: Option<Arc<DioDevice>>,
        ctr: Option<Arc<CtrDevice>>,
    ) -> Self {
        let scan = IoScan::new(
            FunctionType::DaqI,
            Arc::clone(core.input_engine()),
            info.scan.trigger_types,
        );
        debug!(chan_types = ?info.chan_types, max_chans = info.max_chans, "Created DAQ input subsystem");
        Self {
            core,
            info,
            backend,
            scan,
            ai,
            dio,
            ctr,
        }
    }

    /// Capabilities.
    pub fn info(&self) -> &DaqIInfo {
        &self.info
    }

    fn conversion(
        &self,
        desc: &DaqInChanDescriptor,
        calibrate: bool,
        scale_data: bool,
    ) -> Result<(ChannelConversion, bool)> {
        let ty = desc.chan_type;
        if ty.bits().count_ones() != 1 || !self.info.chan_types.contains(ty) {
            return Err(UlError::BadDaqiChanType);
        }

        if let Some(mode) = analog_mode(ty) {
            let ai = self.ai.as_ref().ok_or(UlError::BadDaqiChanType)?;
            let info = ai.info();
            if info.num_chans_by_mode(mode) == 0 {
                return Err(UlError::BadInputMode);
            }
            if desc.channel >= info.num_chans_by_mode(mode) {
                return Err(UlError::BadAiChan);
            }
            if !info.ranges(mode).contains(&desc.range) {
                return Err(UlError::BadRange);
            }
            let mut config = ai.config_of(desc.channel);
            config.chan_type = AiChanType::VOLTAGE;
            let element = AiQueueElement {
                channel: desc.channel,
                input_mode: mode,
                range: desc.range,
            };
            return Ok((ai.scan_conversion(&element, &config, calibrate, scale_data), false));
        }

        if ty == DaqInChanType::TC {
            let ai = self.ai.as_ref().ok_or(UlError::BadDaqiChanType)?;
            ai.check_tc_chan(desc.channel)?;
            let mut config = ai.config_of(desc.channel);
            config.chan_type = AiChanType::TC;
            let element = ai.resolve_element(
                &AiQueueElement {
                    channel: desc.channel,
                    input_mode: AiInputMode::Differential,
                    range: desc.range,
                },
                &config,
            );
            return Ok((ai.scan_conversion(&element, &config, calibrate, scale_data), true));
        }

        if ty == DaqInChanType::DIGITAL {
            let dio = self.dio.as_ref().ok_or(UlError::BadDaqiChanType)?;
            let port = port_from_code(dio, desc.channel)?;
            let mask = dio.port_info(port)?.mask();
            return Ok((ChannelConversion::Raw { mask }, false));
        }

        if let Some(bits) = counter_bits(ty) {
            let ctr = self.ctr.as_ref().ok_or(UlError::BadDaqiChanType)?;
            if desc.channel >= ctr.info().num_ctrs() {
                return Err(UlError::BadCtr);
            }
            return Ok((ctr.scan_conversion(bits), false));
        }

        Err(UlError::BadDaqiChanType)
    }

    /// Start a synchronous input scan over `descriptors`. Returns the
    /// achievable per-channel rate.
    pub fn daq_in_scan(
        &self,
        descriptors: &[DaqInChanDescriptor],
        samples_per_chan: usize,
        rate: f64,
        options: ScanOption,
        flags: DaqInScanFlag,
        buffer: &ScanBuffer<f64>,
    ) -> Result<f64> {
        if descriptors.is_empty() || descriptors.len() > self.info.max_chans {
            return Err(UlError::BadNumChans);
        }
        let calibrate = !flags.contains(DaqInScanFlag::NOCALIBRATEDATA);
        let scale_data = !flags.contains(DaqInScanFlag::NOSCALEDATA);
        let mut conversions = Vec::with_capacity(descriptors.len());
        let mut has_tc = false;
        for desc in descriptors {
            let (conv, tc) = self.conversion(desc, calibrate, scale_data)?;
            has_tc |= tc;
            conversions.push(conv);
        }
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
        let strategy = self.backend.scan_strategy(&DaqIScanSetup {
            descriptors: descriptors.to_vec(),
            samples_per_chan,
            pacer,
            options,
            no_clear: flags.contains(DaqInScanFlag::NOCLEAR),
            trigger,
        })?;
        let cjc: Option<Arc<dyn CjcSource>> = if has_tc {
            self.ai.as_ref().and_then(|ai| ai.cjc_source())
        } else {
            None
        };
        let plan = ScanPlan {
            function: FunctionType::DaqI,
            chan_count,
            samples_per_chan,
            rate: pacer.actual_rate,
            options,
            sample_size: caps.sample_size,
            conversions,
            cjc,
        };
        self.core
            .input_engine()
            .start(plan, strategy, buffer.clone().into())
    }

    /// Set the scan trigger.
    pub fn daq_in_set_trigger(
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
    pub fn daq_in_scan_status(&self) -> Result<(ScanStatus, TransferStatus)> {
        self.scan.status_pair()
    }

    /// Stop the scan. A no-op when idle.
    pub fn daq_in_scan_stop(&self) -> Result<()> {
        self.scan.stop()
    }

    /// Wait for the scan to finish.
    pub fn daq_in_scan_wait(&self, wait_type: WaitType, wait_param: i64, timeout_secs: f64) -> Result<()> {
        self.scan.wait(wait_type, wait_param, timeout_secs)
    }
}
