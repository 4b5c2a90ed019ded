//! Subsystem devices and the validation they share.
//!
//! - [`analog_input`] - analog input (AI), thermocouples, queues
//! - [`analog_output`] - analog output (AO)
//! - [`digital_io`] - digital ports (DIO)
//! - [`counter`] - counters (CTR)
//! - [`timer`] - pulse timers (TMR)
//! - [`daq_input`] / [`daq_output`] - synchronous mixed-channel scans
//!
//! Every validator returns the first violated contract; nothing is
//! aggregated. Index bounds are checked as `index >= count`.

pub mod analog_input;
pub mod analog_output;
pub mod counter;
pub mod daq_input;
pub mod daq_output;
pub mod digital_io;
pub mod timer;

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::device::info::ScanCaps;
use crate::error::{Result, UlError};
use crate::scan::{ScanEngine, StatusSnapshot};
use crate::timing::{pacer_period, PacerSetting};
use crate::trigger::TriggerConfig;
use crate::types::{FunctionType, ScanOption, ScanStatus, TransferStatus, TriggerType, WaitType};

pub use analog_input::{AiBackend, AiChanConfig, AiDevice, AiQueueElement, AiScanSetup};
pub use analog_output::{AoBackend, AoDevice, AoScanSetup};
pub use counter::{CtrBackend, CtrDevice, CtrScanConfig, CtrScanSetup};
pub use daq_input::{DaqIBackend, DaqIDevice, DaqInChanDescriptor, DaqIScanSetup};
pub use daq_output::{DaqOBackend, DaqODevice, DaqOScanSetup, DaqOutChanDescriptor};
pub use digital_io::{DioBackend, DioDevice, DioScanSetup};
pub use timer::{PulseOutActual, PulseOutSettings, TmrBackend, TmrDevice};

/// Requested options must be supported, with at most one IO mode.
pub fn check_scan_options(options: ScanOption, supported: ScanOption) -> Result<()> {
    if !supported.contains(options) {
        return Err(UlError::BadOption);
    }
    let io_modes = options & (ScanOption::SINGLEIO | ScanOption::BLOCKIO | ScanOption::BURSTIO);
    if io_modes.bits().count_ones() > 1 {
        return Err(UlError::BadOption);
    }
    Ok(())
}

/// Requested flag bits must be a subset of the supported ones.
pub fn check_flags(flags: u32, supported: u32) -> Result<()> {
    if flags & !supported != 0 {
        Err(UlError::BadFlag)
    } else {
        Ok(())
    }
}

/// Rate must be positive and, unless externally clocked, inside the pacing
/// limits. The aggregate rate (`rate * chan_count`) is checked against the
/// throughput limit of the selected IO mode.
pub fn check_rate(
    rate: f64,
    chan_count: usize,
    options: ScanOption,
    caps: &ScanCaps,
    max_rate_override: Option<f64>,
) -> Result<()> {
    if !(rate > 0.0) || !rate.is_finite() {
        return Err(UlError::BadRate);
    }
    if options.contains(ScanOption::EXTCLOCK) {
        return Ok(());
    }

    let throughput = rate * chan_count as f64;
    let (max_rate, max_throughput) = if options.contains(ScanOption::BURSTIO) {
        (caps.max_burst_rate, caps.max_burst_throughput)
    } else {
        (caps.max_scan_rate, caps.max_throughput)
    };
    let max_rate = max_rate_override.map_or(max_rate, |r| r.min(max_rate));

    if rate < caps.min_scan_rate || rate > max_rate || throughput > max_throughput {
        debug!(rate, throughput, max_rate, max_throughput, "Rate rejected");
        return Err(UlError::BadRate);
    }
    Ok(())
}

/// `samples_per_chan` must reach the device minimum.
pub fn check_sample_count(samples_per_chan: usize, caps: &ScanCaps) -> Result<()> {
    if samples_per_chan < caps.min_scan_sample_count.max(1) {
        Err(UlError::BadSampleCount)
    } else {
        Ok(())
    }
}

/// The buffer must hold every sample of the scan.
pub fn check_buffer(buffer_len: usize, samples_per_chan: usize, chan_count: usize) -> Result<()> {
    if buffer_len == 0 {
        return Err(UlError::BadBuffer);
    }
    if buffer_len < samples_per_chan * chan_count {
        return Err(UlError::BadBufferSize);
    }
    Ok(())
}

/// A burst scan is finite and must fit in the device FIFO.
pub fn check_burst_count(
    options: ScanOption,
    samples_per_chan: usize,
    chan_count: usize,
    caps: &ScanCaps,
) -> Result<()> {
    if !options.contains(ScanOption::BURSTIO) {
        return Ok(());
    }
    let bytes = samples_per_chan * chan_count * caps.sample_size;
    if options.contains(ScanOption::CONTINUOUS) || bytes > caps.fifo_size {
        return Err(UlError::BadBurstIoCount);
    }
    Ok(())
}

/// Pacer for a validated rate. External clocks run at whatever the caller
/// asked for.
pub fn scan_pacer(caps: &ScanCaps, rate: f64, options: ScanOption) -> PacerSetting {
    if options.contains(ScanOption::EXTCLOCK) || caps.clock_freq <= 0.0 {
        PacerSetting {
            period: 0,
            actual_rate: rate,
        }
    } else {
        pacer_period(caps.clock_freq, rate, caps.max_pacer_period)
    }
}

/// Background operation of one subsystem function: its engine, trigger and
/// status/stop/wait plumbing.
pub struct IoScan {
    function: FunctionType,
    engine: Arc<ScanEngine>,
    trigger: RwLock<TriggerConfig>,
    trigger_types: TriggerType,
}

impl IoScan {
    /// Operation of `function` on `engine`.
    pub fn new(function: FunctionType, engine: Arc<ScanEngine>, trigger_types: TriggerType) -> Self {
        Self {
            function,
            engine,
            trigger: RwLock::new(TriggerConfig::default()),
            trigger_types,
        }
    }

    /// Owning function.
    pub fn function(&self) -> FunctionType {
        self.function
    }

    /// Shared engine.
    pub fn engine(&self) -> &Arc<ScanEngine> {
        &self.engine
    }

    /// Replace the trigger configuration.
    pub fn set_trigger(&self, trigger: TriggerConfig) -> Result<()> {
        trigger.validate(self.trigger_types)?;
        *self.trigger.write() = trigger;
        debug!(function = ?self.function, trigger = ?trigger, "Trigger set");
        Ok(())
    }

    /// Current trigger configuration.
    pub fn trigger(&self) -> TriggerConfig {
        *self.trigger.read()
    }

    /// True while this function's scan runs.
    pub fn is_running(&self) -> bool {
        self.engine.owner() == Some(self.function)
    }

    /// Status snapshot; a finished scan's error is reported once.
    pub fn status(&self) -> StatusSnapshot {
        self.engine.status(self.function)
    }

    /// Status pair, or the error that ended the scan.
    pub fn status_pair(&self) -> Result<(ScanStatus, TransferStatus)> {
        self.status().into_result()
    }

    /// Stop the scan; a no-op when idle.
    pub fn stop(&self) -> Result<()> {
        self.engine.stop(self.function)
    }

    /// Wait for the scan to finish.
    pub fn wait(&self, wait_type: WaitType, _wait_param: i64, timeout_secs: f64) -> Result<()> {
        self.engine.wait(self.function, wait_type, timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps() -> ScanCaps {
        ScanCaps {
            clock_freq: 100e6,
            min_scan_rate: 0.1,
            max_scan_rate: 1000.0,
            max_throughput: 2000.0,
            max_burst_rate: 5000.0,
            max_burst_throughput: 5000.0,
            fifo_size: 64,
            sample_size: 4,
            scan_options: ScanOption::SINGLEIO
                | ScanOption::BLOCKIO
                | ScanOption::BURSTIO
                | ScanOption::CONTINUOUS
                | ScanOption::EXTCLOCK,
            ..Default::default()
        }
    }

    #[test]
    fn test_scan_options() {
        let caps = caps();
        assert!(check_scan_options(ScanOption::CONTINUOUS | ScanOption::BLOCKIO, caps.scan_options).is_ok());
        assert_eq!(
            check_scan_options(ScanOption::SINGLEIO | ScanOption::BLOCKIO, caps.scan_options),
            Err(UlError::BadOption)
        );
        assert_eq!(
            check_scan_options(ScanOption::BURSTIO | ScanOption::SINGLEIO, caps.scan_options),
            Err(UlError::BadOption)
        );
        assert_eq!(
            check_scan_options(ScanOption::RETRIGGER, caps.scan_options),
            Err(UlError::BadOption)
        );
    }

    #[test]
    fn test_rate_limits() {
        let caps = caps();
        let none = ScanOption::empty();
        assert!(check_rate(100.0, 4, none, &caps, None).is_ok());
        assert_eq!(check_rate(-1.0, 4, none, &caps, None), Err(UlError::BadRate));
        assert_eq!(check_rate(f64::NAN, 4, none, &caps, None), Err(UlError::BadRate));
        assert_eq!(check_rate(0.01, 1, none, &caps, None), Err(UlError::BadRate));
        assert_eq!(check_rate(1001.0, 1, none, &caps, None), Err(UlError::BadRate));
        // aggregate throughput
        assert_eq!(check_rate(600.0, 4, none, &caps, None), Err(UlError::BadRate));
        // burst limits
        assert!(check_rate(2000.0, 2, ScanOption::BURSTIO, &caps, None).is_ok());
        // external clock skips the bounds but not the sign
        assert!(check_rate(1e6, 4, ScanOption::EXTCLOCK, &caps, None).is_ok());
        assert_eq!(check_rate(0.0, 4, ScanOption::EXTCLOCK, &caps, None), Err(UlError::BadRate));
        // device-computed ceiling
        assert_eq!(check_rate(500.0, 1, none, &caps, Some(400.0)), Err(UlError::BadRate));
    }

    #[test]
    fn test_buffer_and_counts() {
        let caps = caps();
        assert_eq!(check_buffer(0, 10, 2), Err(UlError::BadBuffer));
        assert_eq!(check_buffer(19, 10, 2), Err(UlError::BadBufferSize));
        assert!(check_buffer(20, 10, 2).is_ok());
        assert_eq!(check_sample_count(0, &caps), Err(UlError::BadSampleCount));
        assert!(check_burst_count(ScanOption::BURSTIO, 8, 2, &caps).is_ok());
        assert_eq!(
            check_burst_count(ScanOption::BURSTIO, 9, 2, &caps),
            Err(UlError::BadBurstIoCount)
        );
        assert_eq!(
            check_burst_count(ScanOption::BURSTIO | ScanOption::CONTINUOUS, 1, 1, &caps),
            Err(UlError::BadBurstIoCount)
        );
    }

    #[test]
    fn test_flags() {
        assert!(check_flags(0b01, 0b11).is_ok());
        assert_eq!(check_flags(0b100, 0b11), Err(UlError::BadFlag));
    }

    #[test]
    fn test_scan_pacer() {
        let caps = caps();
        let pacer = scan_pacer(&caps, 100.0, ScanOption::empty());
        assert_eq!(pacer.period, 1_000_000);
        assert_eq!(pacer.actual_rate, 100.0);
        let pacer = scan_pacer(&caps, 123.4, ScanOption::EXTCLOCK);
        assert_eq!(pacer.actual_rate, 123.4);
    }
}
