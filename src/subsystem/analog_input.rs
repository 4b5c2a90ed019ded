//! Analog input subsystem.
//!
//! Generic request validation, per-channel configuration and the scan setup
//! shared by every family. A family supplies an [`AiBackend`] for the parts
//! that touch the wire: single reads, calibration layout and the scan
//! strategy.
//!
//! Channel configuration (type, thermocouple type, data rate, open-TC
//! detection, custom scale) lives behind a lock and is frozen while any input
//! scan runs: calibration and scaling are captured into the scan pipeline at
//! start.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use super::{
    check_buffer, check_burst_count, check_flags, check_rate, check_sample_count,
    check_scan_options, scan_pacer, IoScan,
};
use crate::calibration::{decode_cal_coefs, CalCoef, CustomScale, CAL_COEF_SIZE};
use crate::device::{AiInfo, DeviceCore};
use crate::error::{Result, UlError};
use crate::memory;
use crate::range::Range;
use crate::scan::{
    AnalogConversion, ChannelConversion, CjcSource, SampleFormat, ScanBuffer, ScanPlan,
    ScanStrategy, TcConversion,
};
use crate::timing::PacerSetting;
use crate::trigger::{check_retrigger, TriggerConfig};
use crate::types::{
    AInFlag, AInScanFlag, AiChanQueueLimitation, AiChanType, AiInputMode, AiQueueType,
    FunctionType, MemRegion, OtdMode, ScanOption, ScanStatus, TInFlag, TcType, TempScale,
    TransferStatus, TriggerType, WaitType,
};

/// One entry of an analog input queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AiQueueElement {
    /// Channel number
    pub channel: u32,
    /// Input mode
    pub input_mode: AiInputMode,
    /// Range
    pub range: Range,
}

/// Per-channel configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AiChanConfig {
    /// Voltage, thermocouple, ...
    pub chan_type: AiChanType,
    /// Sensor type when `chan_type` is `TC`
    pub tc_type: TcType,
    /// Per-channel conversion rate (families with selectable rates)
    pub data_rate: f64,
    /// Open-thermocouple detection
    pub otd: OtdMode,
    /// User scale applied after engineering-unit conversion
    pub custom: CustomScale,
}

impl Default for AiChanConfig {
    fn default() -> Self {
        Self {
            chan_type: AiChanType::VOLTAGE,
            tc_type: TcType::J,
            data_rate: 0.0,
            otd: OtdMode::Enabled,
            custom: CustomScale::IDENTITY,
        }
    }
}

/// Everything a family needs to encode one input scan.
#[derive(Debug, Clone)]
pub struct AiScanSetup {
    /// Channels in scan order
    pub elements: Vec<AiQueueElement>,
    /// Configuration of each element's channel
    pub chan_configs: Vec<AiChanConfig>,
    /// Scans requested (ring size when continuous)
    pub samples_per_chan: usize,
    /// Pacer divider and achievable rate
    pub pacer: PacerSetting,
    /// Scan options
    pub options: ScanOption,
    /// Trigger in effect
    pub trigger: TriggerConfig,
}

/// Family-specific analog input operations.
pub trait AiBackend: Send + Sync {
    /// Wire encoding of ADC samples.
    fn sample_format(&self) -> SampleFormat;

    /// Calibration table location: EEPROM address and coefficient count.
    /// `None` when the family stores no table.
    fn cal_table(&self) -> Option<(u32, usize)>;

    /// Index into the calibration table.
    fn cal_coef_index(&self, chan: u32, mode: AiInputMode, range: Range) -> usize;

    /// Configuration a channel starts with.
    fn default_chan_config(&self) -> AiChanConfig {
        AiChanConfig::default()
    }

    /// Read one raw ADC word.
    fn read_raw(&self, element: &AiQueueElement, config: &AiChanConfig) -> Result<u64>;

    /// Build the command strategy of one scan.
    fn scan_strategy(&self, setup: &AiScanSetup) -> Result<Arc<dyn ScanStrategy>>;

    /// Device-computed rate ceiling for this channel list.
    fn max_scan_rate(&self, _elements: &[AiQueueElement], _configs: &[AiChanConfig]) -> Option<f64> {
        None
    }

    /// Cold-junction sensors, for families with thermocouple inputs.
    fn cjc_source(&self) -> Option<Arc<dyn CjcSource>> {
        None
    }

    /// CJC sensor serving `chan`.
    fn cjc_slot(&self, _chan: u32) -> usize {
        0
    }

    /// Mode and range a thermocouple channel is measured with.
    fn tc_element(&self, chan: u32) -> AiQueueElement {
        AiQueueElement {
            channel: chan,
            input_mode: AiInputMode::Differential,
            range: Range::BipPt078Volts,
        }
    }
}

/// Analog input subsystem of one device.
pub struct AiDevice {
    core: Arc<DeviceCore>,
    info: AiInfo,
    backend: Arc<dyn AiBackend>,
    scan: IoScan,
    cal: RwLock<Vec<CalCoef>>,
    chans: RwLock<Vec<AiChanConfig>>,
    queue: RwLock<Vec<AiQueueElement>>,
}

impl AiDevice {
    /// Subsystem over `backend`.
    pub fn new(core: Arc<DeviceCore>, info: AiInfo, backend: Arc<dyn AiBackend>) -> Self {
        let chans = vec![backend.default_chan_config(); info.num_chans() as usize];
        let scan = IoScan::new(
            FunctionType::Ai,
            Arc::clone(core.input_engine()),
            info.scan.trigger_types,
        );
        debug!(
            channels = info.num_chans(),
            resolution = info.resolution,
            "Created analog input subsystem"
        );
        Self {
            core,
            info,
            backend,
            scan,
            cal: RwLock::new(Vec::new()),
            chans: RwLock::new(chans),
            queue: RwLock::new(Vec::new()),
        }
    }

    /// Capabilities.
    pub fn info(&self) -> &AiInfo {
        &self.info
    }

    // =========================================================================
    // Validation
    // =========================================================================

    fn check_mode(&self, mode: AiInputMode) -> Result<()> {
        if self.info.num_chans_by_mode(mode) == 0 {
            return Err(UlError::BadInputMode);
        }
        Ok(())
    }

    fn check_element(&self, element: &AiQueueElement) -> Result<()> {
        self.check_mode(element.input_mode)?;
        if element.channel >= self.info.num_chans_by_mode(element.input_mode) {
            return Err(UlError::BadAiChan);
        }
        if !self.info.ranges(element.input_mode).contains(&element.range) {
            return Err(UlError::BadRange);
        }
        Ok(())
    }

    fn check_chan(&self, chan: u32) -> Result<()> {
        if chan >= self.info.num_chans() {
            return Err(UlError::BadAiChan);
        }
        Ok(())
    }

    /// Thermocouples are wired differentially, so only the differential
    /// channels (and their cold-junction sensors) can carry one.
    pub(crate) fn check_tc_chan(&self, chan: u32) -> Result<()> {
        if chan >= self.info.num_chans_diff {
            return Err(UlError::BadAiChan);
        }
        Ok(())
    }

    fn check_idle(&self) -> Result<()> {
        if self.core.input_engine().is_busy() {
            return Err(UlError::AlreadyActive);
        }
        Ok(())
    }

    fn supports_tc(&self) -> bool {
        !self.info.tc_types.is_empty() && self.info.chan_types.contains(AiChanType::TC)
    }

    // =========================================================================
    // Calibration
    // =========================================================================

    /// Reload the calibration table from the device EEPROM.
    pub fn load_calibration(&self) -> Result<()> {
        let Some((address, count)) = self.backend.cal_table() else {
            return Ok(());
        };
        let mut bytes = vec![0u8; count * CAL_COEF_SIZE];
        memory::mem_read(&self.core, MemRegion::CAL, address, &mut bytes)?;
        let coefs = decode_cal_coefs(&bytes, count)?;
        info!(count, address, "Loaded AI calibration");
        *self.cal.write() = coefs;
        Ok(())
    }

    /// Coefficient used for `(chan, mode, range)`.
    pub fn cal_coef(&self, chan: u32, mode: AiInputMode, range: Range) -> Result<CalCoef> {
        self.check_element(&AiQueueElement {
            channel: chan,
            input_mode: mode,
            range,
        })?;
        Ok(self.coef(chan, mode, range))
    }

    fn coef(&self, chan: u32, mode: AiInputMode, range: Range) -> CalCoef {
        let idx = self.backend.cal_coef_index(chan, mode, range);
        self.cal.read().get(idx).copied().unwrap_or(CalCoef::IDENTITY)
    }

    // =========================================================================
    // Channel configuration
    // =========================================================================

    /// Configuration of `chan`.
    pub fn chan_config(&self, chan: u32) -> Result<AiChanConfig> {
        self.check_chan(chan)?;
        self.chans
            .read()
            .get(chan as usize)
            .copied()
            .ok_or(UlError::BadAiChan)
    }

    fn update_chan(&self, chan: u32, f: impl FnOnce(&mut AiChanConfig)) -> Result<()> {
        self.check_idle()?;
        let mut chans = self.chans.write();
        let config = chans.get_mut(chan as usize).ok_or(UlError::BadAiChan)?;
        f(config);
        debug!(chan, config = ?*config, "Channel configuration changed");
        Ok(())
    }

    /// Set the channel type.
    pub fn set_chan_type(&self, chan: u32, chan_type: AiChanType) -> Result<()> {
        self.check_chan(chan)?;
        if chan_type.bits().count_ones() != 1 || !self.info.chan_types.contains(chan_type) {
            return Err(UlError::BadAiChanType);
        }
        if chan_type == AiChanType::TC {
            self.check_tc_chan(chan)?;
        }
        self.update_chan(chan, |c| c.chan_type = chan_type)
    }

    /// Set the thermocouple type.
    pub fn set_chan_tc_type(&self, chan: u32, tc_type: TcType) -> Result<()> {
        self.check_chan(chan)?;
        if !self.supports_tc() {
            return Err(UlError::ConfigNotSupported);
        }
        self.check_tc_chan(chan)?;
        if !self.info.tc_types.contains(&tc_type) {
            return Err(UlError::BadTcType);
        }
        self.update_chan(chan, |c| c.tc_type = tc_type)
    }

    /// Select one of the family's per-channel conversion rates.
    pub fn set_chan_data_rate(&self, chan: u32, rate: f64) -> Result<()> {
        self.check_chan(chan)?;
        if self.info.data_rates.is_empty() {
            return Err(UlError::ConfigNotSupported);
        }
        if !self.info.data_rates.iter().any(|r| *r == rate) {
            return Err(UlError::BadRate);
        }
        self.update_chan(chan, |c| c.data_rate = rate)
    }

    /// Enable or disable open-thermocouple detection.
    pub fn set_chan_otd_mode(&self, chan: u32, otd: OtdMode) -> Result<()> {
        self.check_chan(chan)?;
        if !self.supports_tc() {
            return Err(UlError::ConfigNotSupported);
        }
        self.check_tc_chan(chan)?;
        self.update_chan(chan, |c| c.otd = otd)
    }

    /// Set the custom scale of `chan`.
    pub fn set_custom_scale(&self, chan: u32, slope: f64, offset: f64) -> Result<()> {
        self.check_chan(chan)?;
        let scale = CustomScale::new(slope, offset)?;
        self.update_chan(chan, |c| c.custom = scale)
    }

    // =========================================================================
    // Queue
    // =========================================================================

    /// Load a channel queue. An empty slice clears the queue.
    pub fn a_in_load_queue(&self, elements: &[AiQueueElement]) -> Result<()> {
        self.check_idle()?;
        if elements.is_empty() {
            self.clear_queue();
            return Ok(());
        }
        if self.info.queue_types.is_empty() {
            return Err(UlError::ConfigNotSupported);
        }
        self.check_mode(elements[0].input_mode)?;
        if elements.len() > self.info.max_queue_length(elements[0].input_mode) {
            return Err(UlError::BadQueueSize);
        }
        for element in elements {
            self.check_element(element)?;
        }
        self.check_queue_types(elements)?;
        self.check_queue_limitations(elements)?;

        *self.queue.write() = elements.to_vec();
        debug!(len = elements.len(), "Loaded AI queue");
        Ok(())
    }

    fn check_queue_types(&self, elements: &[AiQueueElement]) -> Result<()> {
        let types = self.info.queue_types;
        let first = elements[0];
        if !types.contains(AiQueueType::CHAN)
            && elements
                .iter()
                .enumerate()
                .any(|(i, e)| e.channel != first.channel + i as u32)
        {
            return Err(UlError::BadAiChanQueue);
        }
        if !types.contains(AiQueueType::RANGE) && elements.iter().any(|e| e.range != first.range) {
            return Err(UlError::BadAiGainQueue);
        }
        if !types.contains(AiQueueType::CHAN_MODE)
            && elements.iter().any(|e| e.input_mode != first.input_mode)
        {
            return Err(UlError::BadAiModeQueue);
        }
        Ok(())
    }

    fn check_queue_limitations(&self, elements: &[AiQueueElement]) -> Result<()> {
        let limits = self.info.queue_limitations;
        if limits.contains(AiChanQueueLimitation::UNIQUE_CHAN) {
            let mut seen = Vec::with_capacity(elements.len());
            for e in elements {
                if seen.contains(&e.channel) {
                    return Err(UlError::BadAiChanQueue);
                }
                seen.push(e.channel);
            }
        }
        for pair in elements.windows(2) {
            let (prev, next) = (pair[0].channel, pair[1].channel);
            if limits.contains(AiChanQueueLimitation::ASCENDING_CHAN) && next <= prev {
                return Err(UlError::BadAiChanQueue);
            }
            if limits.contains(AiChanQueueLimitation::CONSECUTIVE_CHAN) && next != prev + 1 {
                return Err(UlError::BadAiChanQueue);
            }
        }
        Ok(())
    }

    /// Loaded queue (empty when none).
    pub fn queue(&self) -> Vec<AiQueueElement> {
        self.queue.read().clone()
    }

    pub(crate) fn clear_queue(&self) {
        self.queue.write().clear();
    }

    // =========================================================================
    // Conversion
    // =========================================================================

    fn analog_conversion(
        &self,
        element: &AiQueueElement,
        config: &AiChanConfig,
        calibrate: bool,
        scale_data: bool,
    ) -> AnalogConversion {
        AnalogConversion {
            cal: self.coef(element.channel, element.input_mode, element.range),
            scale: element.range.eu_scale(),
            custom: config.custom,
            format: self.backend.sample_format(),
            calibrate,
            scale_data,
        }
    }

    fn tc_conversion(&self, chan: u32, config: &AiChanConfig, scale: TempScale, calibrate: bool) -> TcConversion {
        let element = self.backend.tc_element(chan);
        TcConversion {
            analog: self.analog_conversion(&element, config, calibrate, true),
            tc_type: config.tc_type,
            cjc_slot: self.backend.cjc_slot(chan),
            otd: config.otd == OtdMode::Enabled,
            temp_scale: scale,
        }
    }

    /// Conversion of one scanned element, honoring the channel type.
    pub(crate) fn scan_conversion(
        &self,
        element: &AiQueueElement,
        config: &AiChanConfig,
        calibrate: bool,
        scale_data: bool,
    ) -> ChannelConversion {
        if config.chan_type == AiChanType::TC && scale_data {
            ChannelConversion::Thermocouple(self.tc_conversion(
                element.channel,
                config,
                TempScale::Celsius,
                calibrate,
            ))
        } else {
            ChannelConversion::Analog(self.analog_conversion(element, config, calibrate, scale_data))
        }
    }

    /// Element actually measured for `element`, given its channel type.
    pub(crate) fn resolve_element(&self, element: &AiQueueElement, config: &AiChanConfig) -> AiQueueElement {
        if config.chan_type == AiChanType::TC {
            self.backend.tc_element(element.channel)
        } else {
            *element
        }
    }

    pub(crate) fn config_of(&self, chan: u32) -> AiChanConfig {
        self.chans
            .read()
            .get(chan as usize)
            .copied()
            .unwrap_or_else(|| self.backend.default_chan_config())
    }

    pub(crate) fn cjc_source(&self) -> Option<Arc<dyn CjcSource>> {
        self.backend.cjc_source()
    }

    // =========================================================================
    // Single-point reads
    // =========================================================================

    /// Read one value from a voltage channel.
    pub fn a_in(&self, chan: u32, mode: AiInputMode, range: Range, flags: AInFlag) -> Result<f64> {
        let element = AiQueueElement {
            channel: chan,
            input_mode: mode,
            range,
        };
        self.check_element(&element)?;
        check_flags(flags.bits(), AInFlag::all().bits())?;
        let config = self.config_of(chan);
        if config.chan_type != AiChanType::VOLTAGE {
            return Err(UlError::BadAiChanType);
        }
        self.core.check_connected()?;
        self.check_idle()?;

        let raw = self.backend.read_raw(&element, &config)?;
        let conv = self.analog_conversion(
            &element,
            &config,
            !flags.contains(AInFlag::NOCALIBRATEDATA),
            !flags.contains(AInFlag::NOSCALEDATA),
        );
        Ok(conv.to_value(raw))
    }

    /// Read one temperature from a thermocouple channel.
    pub fn t_in(&self, chan: u32, scale: TempScale, flags: TInFlag) -> Result<f64> {
        if !self.supports_tc() {
            return Err(UlError::ConfigNotSupported);
        }
        self.check_tc_chan(chan)?;
        check_flags(flags.bits(), TInFlag::all().bits())?;
        let config = self.config_of(chan);
        if config.chan_type != AiChanType::TC {
            return Err(UlError::BadAiChanType);
        }
        self.core.check_connected()?;
        self.check_idle()?;

        let element = self.backend.tc_element(chan);
        let raw = self.backend.read_raw(&element, &config)?;
        let cjc = match self.backend.cjc_source() {
            Some(source) if !matches!(scale, TempScale::Volts | TempScale::NoScale) => {
                source.read_cjc_temps()?
            }
            _ => Vec::new(),
        };
        self.tc_conversion(chan, &config, scale, true)
            .temperature(raw, &cjc)
    }

    /// Read a block of thermocouple channels. Fails on the first bad channel.
    pub fn t_in_array(
        &self,
        low_chan: u32,
        high_chan: u32,
        scale: TempScale,
        flags: TInFlag,
    ) -> Result<Vec<f64>> {
        if low_chan > high_chan {
            return Err(UlError::BadAiChan);
        }
        if !self.supports_tc() {
            return Err(UlError::ConfigNotSupported);
        }
        self.check_tc_chan(high_chan)?;
        (low_chan..=high_chan)
            .map(|chan| self.t_in(chan, scale, flags))
            .collect()
    }

    // =========================================================================
    // Scan
    // =========================================================================

    fn scan_elements(
        &self,
        low_chan: u32,
        high_chan: u32,
        mode: AiInputMode,
        range: Range,
    ) -> Result<Vec<AiQueueElement>> {
        let queue = self.queue.read();
        if !queue.is_empty() {
            return Ok(queue.clone());
        }
        drop(queue);

        self.check_mode(mode)?;
        if low_chan > high_chan || high_chan >= self.info.num_chans_by_mode(mode) {
            return Err(UlError::BadAiChan);
        }
        if !self.info.ranges(mode).contains(&range) {
            return Err(UlError::BadRange);
        }
        Ok((low_chan..=high_chan)
            .map(|channel| AiQueueElement {
                channel,
                input_mode: mode,
                range,
            })
            .collect())
    }

    /// Start a background scan of `low_chan..=high_chan` (or of the loaded
    /// queue). Returns the achievable per-channel rate.
    pub fn a_in_scan(
        &self,
        low_chan: u32,
        high_chan: u32,
        mode: AiInputMode,
        range: Range,
        samples_per_chan: usize,
        rate: f64,
        options: ScanOption,
        flags: AInScanFlag,
        buffer: &ScanBuffer<f64>,
    ) -> Result<f64> {
        let elements = self.scan_elements(low_chan, high_chan, mode, range)?;
        let chan_count = elements.len();
        let caps = &self.info.scan;

        check_scan_options(options, caps.scan_options)?;
        check_flags(flags.bits(), self.info.scan_flags.bits())?;

        let configs: Vec<AiChanConfig> = elements.iter().map(|e| self.config_of(e.channel)).collect();
        let elements: Vec<AiQueueElement> = elements
            .iter()
            .zip(&configs)
            .map(|(e, c)| self.resolve_element(e, c))
            .collect();

        let max_rate = self.backend.max_scan_rate(&elements, &configs);
        check_rate(rate, chan_count, options, caps, max_rate)?;
        check_sample_count(samples_per_chan, caps)?;
        check_buffer(buffer.len(), samples_per_chan, chan_count)?;
        check_burst_count(options, samples_per_chan, chan_count, caps)?;
        let trigger = self.scan.trigger();
        check_retrigger(options, &trigger, chan_count, samples_per_chan)?;
        self.core.check_connected()?;

        let calibrate = !flags.contains(AInScanFlag::NOCALIBRATEDATA);
        let scale_data = !flags.contains(AInScanFlag::NOSCALEDATA);
        let conversions: Vec<ChannelConversion> = elements
            .iter()
            .zip(&configs)
            .map(|(e, c)| self.scan_conversion(e, c, calibrate, scale_data))
            .collect();
        let has_tc = conversions
            .iter()
            .any(|c| matches!(c, ChannelConversion::Thermocouple(_)));

        let pacer = scan_pacer(caps, rate, options);
        let setup = AiScanSetup {
            elements,
            chan_configs: configs,
            samples_per_chan,
            pacer,
            options,
            trigger,
        };
        let strategy = self.backend.scan_strategy(&setup)?;

        let plan = ScanPlan {
            function: FunctionType::Ai,
            chan_count,
            samples_per_chan,
            rate: pacer.actual_rate,
            options,
            sample_size: caps.sample_size,
            conversions,
            cjc: if has_tc { self.backend.cjc_source() } else { None },
        };
        self.core
            .input_engine()
            .start(plan, strategy, buffer.clone().into())
    }

    /// Set the scan trigger.
    pub fn a_in_set_trigger(
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
    pub fn a_in_scan_status(&self) -> Result<(ScanStatus, TransferStatus)> {
        self.scan.status_pair()
    }

    /// Stop the scan. A no-op when idle.
    pub fn a_in_scan_stop(&self) -> Result<()> {
        self.scan.stop()
    }

    /// Wait for the scan to finish.
    pub fn a_in_scan_wait(&self, wait_type: WaitType, wait_param: i64, timeout_secs: f64) -> Result<()> {
        self.scan.wait(wait_type, wait_param, timeout_secs)
    }
}
