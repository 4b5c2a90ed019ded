//! Analog output subsystem.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use super::{
    check_buffer, check_burst_count, check_flags, check_rate, check_sample_count,
    check_scan_options, scan_pacer, IoScan,
};
use crate::calibration::{decode_cal_coefs, CalCoef, CustomScale, CAL_COEF_SIZE};
use crate::device::{AoInfo, DeviceCore};
use crate::error::{Result, UlError};
use crate::memory;
use crate::range::Range;
use crate::scan::{AnalogConversion, ChannelConversion, SampleFormat, ScanBuffer, ScanPlan, ScanStrategy};
use crate::timing::PacerSetting;
use crate::trigger::{check_retrigger, TriggerConfig};
use crate::types::{
    AOutArrayFlag, AOutFlag, AOutScanFlag, FunctionType, MemRegion, ScanOption, ScanStatus,
    TransferStatus, TriggerType, WaitType,
};

/// Everything a family needs to encode one output scan.
#[derive(Debug, Clone)]
pub struct AoScanSetup {
    /// Channels in scan order
    pub channels: Vec<u32>,
    /// Output range
    pub range: Range,
    /// Scans requested (ring size when continuous)
    pub samples_per_chan: usize,
    /// Pacer divider and achievable rate
    pub pacer: PacerSetting,
    /// Scan options
    pub options: ScanOption,
    /// Trigger in effect
    pub trigger: TriggerConfig,
}

/// Family-specific analog output operations.
pub trait AoBackend: Send + Sync {
    /// Wire encoding of DAC words.
    fn sample_format(&self) -> SampleFormat {
        SampleFormat::Unsigned { bits: 16 }
    }

    /// Calibration table location: EEPROM address and coefficient count.
    fn cal_table(&self) -> Option<(u32, usize)>;

    /// Index of `chan`'s coefficient within the table.
    fn cal_coef_index(&self, chan: u32, range: Range) -> usize;

    /// Write one DAC word.
    fn write_raw(&self, chan: u32, range: Range, word: u64) -> Result<()>;

    /// Write several channels. `simultaneous` updates them together; the
    /// default writes one channel at a time and so rejects it with
    /// `BadOption`.
    fn write_raw_array(&self, first_chan: u32, ranges: &[Range], words: &[u64], simultaneous: bool) -> Result<()> {
        if simultaneous {
            return Err(UlError::BadOption);
        }
        for (i, (range, word)) in ranges.iter().zip(words).enumerate() {
            self.write_raw(first_chan + i as u32, *range, *word)?;
        }
        Ok(())
    }

    /// Build the command strategy of one scan.
    fn scan_strategy(&self, setup: &AoScanSetup) -> Result<Arc<dyn ScanStrategy>>;
}

/// Analog output subsystem of one device.
pub struct AoDevice {
    core: Arc<DeviceCore>,
    info: AoInfo,
    backend: Arc<dyn AoBackend>,
    scan: IoScan,
    cal: RwLock<Vec<CalCoef>>,
}

impl AoDevice {
    /// Subsystem over `backend`.
    pub fn new(core: Arc<DeviceCore>, info: AoInfo, backend: Arc<dyn AoBackend>) -> Self {
        let scan = IoScan::new(
            FunctionType::Ao,
            Arc::clone(core.output_engine()),
            info.scan.trigger_types,
        );
        debug!(channels = info.num_chans, resolution = info.resolution, "Created analog output subsystem");
        Self {
            core,
            info,
            backend,
            scan,
            cal: RwLock::new(Vec::new()),
        }
    }

    /// Capabilities.
    pub fn info(&self) -> &AoInfo {
        &self.info
    }

    /// Reload the calibration table from the device EEPROM.
    pub fn load_calibration(&self) -> Result<()> {
        let Some((address, count)) = self.backend.cal_table() else {
            return Ok(());
        };
        let mut bytes = vec![0u8; count * CAL_COEF_SIZE];
        memory::mem_read(&self.core, MemRegion::CAL, address, &mut bytes)?;
        *self.cal.write() = decode_cal_coefs(&bytes, count)?;
        info!(count, address, "Loaded AO calibration");
        Ok(())
    }

    /// Coefficient used for `chan` on `range`.
    pub fn cal_coef(&self, chan: u32, range: Range) -> Result<CalCoef> {
        self.check_chan(chan)?;
        self.check_range(range)?;
        Ok(self.coef(chan, range))
    }

    fn coef(&self, chan: u32, range: Range) -> CalCoef {
        let idx = self.backend.cal_coef_index(chan, range);
        self.cal.read().get(idx).copied().unwrap_or(CalCoef::IDENTITY)
    }

    fn check_chan(&self, chan: u32) -> Result<()> {
        if chan >= self.info.num_chans {
            return Err(UlError::BadAoChan);
        }
        Ok(())
    }

    fn check_range(&self, range: Range) -> Result<()> {
        if !self.info.ranges.contains(&range) {
            return Err(UlError::BadRange);
        }
        Ok(())
    }

    fn check_chan_span(&self, low_chan: u32, high_chan: u32) -> Result<()> {
        if low_chan > high_chan || high_chan >= self.info.num_chans {
            return Err(UlError::BadAoChan);
        }
        Ok(())
    }

    pub(crate) fn conversion(&self, chan: u32, range: Range, calibrate: bool, scale_data: bool) -> AnalogConversion {
        AnalogConversion {
            cal: self.coef(chan, range),
            scale: range.eu_scale(),
            custom: CustomScale::IDENTITY,
            format: self.backend.sample_format(),
            calibrate,
            scale_data,
        }
    }

    fn word(&self, conv: &AnalogConversion, value: f64) -> Result<u64> {
        if !value.is_finite() {
            return Err(UlError::BadDaVal);
        }
        if !conv.scale_data && (value < 0.0 || value > conv.format.max_code() as f64) {
            return Err(UlError::BadDaVal);
        }
        Ok(conv.to_word(value))
    }

    fn check_output_idle(&self) -> Result<()> {
        if self.core.output_engine().is_busy() {
            return Err(UlError::AlreadyActive);
        }
        Ok(())
    }

    /// Write one value.
    pub fn a_out(&self, chan: u32, range: Range, flags: AOutFlag, value: f64) -> Result<()> {
        self.check_chan(chan)?;
        self.check_range(range)?;
        check_flags(flags.bits(), AOutFlag::all().bits())?;
        self.core.check_connected()?;
        self.check_output_idle()?;

        let conv = self.conversion(
            chan,
            range,
            !flags.contains(AOutFlag::NOCALIBRATEDATA),
            !flags.contains(AOutFlag::NOSCALEDATA),
        );
        let word = self.word(&conv, value)?;
        self.backend.write_raw(chan, range, word)
    }

    /// Write `low_chan..=high_chan`, one range and value per channel.
    pub fn a_out_array(
        &self,
        low_chan: u32,
        high_chan: u32,
        ranges: &[Range],
        flags: AOutArrayFlag,
        data: &[f64],
    ) -> Result<()> {
        self.check_chan_span(low_chan, high_chan)?;
        let count = (high_chan - low_chan + 1) as usize;
        if ranges.len() < count {
            return Err(UlError::BadArg);
        }
        for range in &ranges[..count] {
            self.check_range(*range)?;
        }
        check_flags(flags.bits(), AOutArrayFlag::all().bits())?;
        check_buffer(data.len(), 1, count)?;
        self.core.check_connected()?;
        self.check_output_idle()?;

        let calibrate = !flags.contains(AOutArrayFlag::NOCALIBRATEDATA);
        let scale_data = !flags.contains(AOutArrayFlag::NOSCALEDATA);
        let words = (0..count)
            .map(|i| {
                let conv = self.conversion(low_chan + i as u32, ranges[i], calibrate, scale_data);
                self.word(&conv, data[i])
            })
            .collect::<Result<Vec<u64>>>()?;
        self.backend.write_raw_array(
            low_chan,
            &ranges[..count],
            &words,
            flags.contains(AOutArrayFlag::SIMULTANEOUS),
        )
    }

    /// Start a background output scan of `low_chan..=high_chan`. Returns the
    /// achievable per-channel rate.
    pub fn a_out_scan(
        &self,
        low_chan: u32,
        high_chan: u32,
        range: Range,
        samples_per_chan: usize,
        rate: f64,
        options: ScanOption,
        flags: AOutScanFlag,
        buffer: &ScanBuffer<f64>,
    ) -> Result<f64> {
        self.check_chan_span(low_chan, high_chan)?;
        self.check_range(range)?;
        let chan_count = (high_chan - low_chan + 1) as usize;
        let caps = &self.info.scan;

        check_scan_options(options, caps.scan_options)?;
        check_flags(flags.bits(), AOutScanFlag::all().bits())?;
        check_rate(rate, chan_count, options, caps, None)?;
        check_sample_count(samples_per_chan, caps)?;
        check_buffer(buffer.len(), samples_per_chan, chan_count)?;
        check_burst_count(options, samples_per_chan, chan_count, caps)?;
        let trigger = self.scan.trigger();
        check_retrigger(options, &trigger, chan_count, samples_per_chan)?;
        self.core.check_connected()?;

        let calibrate = !flags.contains(AOutScanFlag::NOCALIBRATEDATA);
        let scale_data = !flags.contains(AOutScanFlag::NOSCALEDATA);
        let channels: Vec<u32> = (low_chan..=high_chan).collect();
        let conversions = channels
            .iter()
            .map(|chan| ChannelConversion::Analog(self.conversion(*chan, range, calibrate, scale_data)))
            .collect();

        let pacer = scan_pacer(caps, rate, options);
        let strategy = self.backend.scan_strategy(&AoScanSetup {
            channels,
            range,
            samples_per_chan,
            pacer,
            options,
            trigger,
        })?;
        let plan = ScanPlan {
            function: FunctionType::Ao,
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
    pub fn a_out_set_trigger(
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
    pub fn a_out_scan_status(&self) -> Result<(ScanStatus, TransferStatus)> {
        self.scan.status_pair()
    }

    /// Stop the scan. A no-op when idle.
    pub fn a_out_scan_stop(&self) -> Result<()> {
        self.scan.stop()
    }

    /// Wait for the scan to finish.
    pub fn a_out_scan_wait(&self, wait_type: WaitType, wait_param: i64, timeout_secs: f64) -> Result<()> {
        self.scan.wait(wait_type, wait_param, timeout_secs)
    }
}
