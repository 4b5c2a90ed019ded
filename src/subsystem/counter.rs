//! Counter subsystem.
//!
//! Counters of one device may differ: each [`CtrCapability`] declares the
//! measurement types, mode bits and registers of a single counter, and every
//! request is checked against the capability of the counter it names.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use super::{
    check_buffer, check_burst_count, check_flags, check_rate, check_sample_count,
    check_scan_options, scan_pacer, IoScan,
};
use crate::device::{CtrCapability, CtrInfo, DeviceCore};
use crate::error::{Result, UlError};
use crate::scan::{ChannelConversion, ScanBuffer, ScanPlan, ScanStrategy};
use crate::timing::PacerSetting;
use crate::trigger::{check_retrigger, TriggerConfig};
use crate::types::{
    CInScanFlag, CounterDebounceMode, CounterDebounceTime, CounterEdgeDetection,
    CounterMeasurementMode, CounterMeasurementType, CounterRegisterType, CounterTickSize,
    FunctionType, ScanOption, ScanStatus, TransferStatus, TriggerType, WaitType,
};

/// Measurement configuration of one counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CtrScanConfig {
    /// What the counter measures
    pub measurement_type: CounterMeasurementType,
    /// Mode bits valid for `measurement_type`
    pub mode: CounterMeasurementMode,
    /// Counted edge
    pub edge_detection: CounterEdgeDetection,
    /// Time base of period, pulse-width and timing measurements
    pub tick_size: Option<CounterTickSize>,
    /// Debounce filter
    pub debounce_mode: CounterDebounceMode,
    /// Debounce interval
    pub debounce_time: CounterDebounceTime,
}

impl Default for CtrScanConfig {
    fn default() -> Self {
        Self {
            measurement_type: CounterMeasurementType::COUNT,
            mode: CounterMeasurementMode::empty(),
            edge_detection: CounterEdgeDetection::RisingEdge,
            tick_size: None,
            debounce_mode: CounterDebounceMode::None,
            debounce_time: CounterDebounceTime::Debounce0ns,
        }
    }
}

/// Everything a family needs to encode one counter scan.
#[derive(Debug, Clone)]
pub struct CtrScanSetup {
    /// Counters in scan order
    pub counters: Vec<u32>,
    /// Scans requested (ring size when continuous)
    pub samples_per_chan: usize,
    /// Pacer divider and achievable rate
    pub pacer: PacerSetting,
    /// Scan options
    pub options: ScanOption,
    /// Leave the counters running from their current value
    pub no_clear: bool,
    /// Trigger in effect
    pub trigger: TriggerConfig,
}

/// Family-specific counter operations.
pub trait CtrBackend: Send + Sync {
    /// Read a register.
    fn read(&self, ctr: u32, register: CounterRegisterType) -> Result<u64>;

    /// Load a register.
    fn load(&self, ctr: u32, register: CounterRegisterType, value: u64) -> Result<()>;

    /// Apply a measurement configuration.
    fn configure(&self, ctr: u32, config: &CtrScanConfig) -> Result<()>;

    /// Build the command strategy of one scan.
    fn scan_strategy(&self, setup: &CtrScanSetup) -> Result<Arc<dyn ScanStrategy>>;
}

/// Counter subsystem of one device.
pub struct CtrDevice {
    core: Arc<DeviceCore>,
    info: CtrInfo,
    backend: Arc<dyn CtrBackend>,
    scan: IoScan,
    configs: RwLock<Vec<CtrScanConfig>>,
}

impl CtrDevice {
    /// Subsystem over `backend`.
    pub fn new(core: Arc<DeviceCore>, info: CtrInfo, backend: Arc<dyn CtrBackend>) -> Self {
        let configs = vec![CtrScanConfig::default(); info.counters.len()];
        let scan = IoScan::new(
            FunctionType::Ctr,
            Arc::clone(core.input_engine()),
            info.scan.trigger_types,
        );
        debug!(counters = info.num_ctrs(), resolution = info.resolution, "Created counter subsystem");
        Self {
            core,
            info,
            backend,
            scan,
            configs: RwLock::new(configs),
        }
    }

    /// Capabilities.
    pub fn info(&self) -> &CtrInfo {
        &self.info
    }

    fn capability(&self, ctr: u32) -> Result<&CtrCapability> {
        self.info.counters.get(ctr as usize).ok_or(UlError::BadCtr)
    }

    fn check_register(&self, ctr: u32, register: CounterRegisterType) -> Result<()> {
        let cap = self.capability(ctr)?;
        if register.bits().count_ones() != 1 || !cap.registers.contains(register) {
            return Err(UlError::BadCtrReg);
        }
        Ok(())
    }

    fn max_value(&self) -> u64 {
        if self.info.resolution >= 64 {
            u64::MAX
        } else {
            (1u64 << self.info.resolution) - 1
        }
    }

    /// Current count of `ctr`.
    pub fn c_in(&self, ctr: u32) -> Result<u64> {
        self.c_read(ctr, CounterRegisterType::COUNT)
    }

    /// Read a register of `ctr`.
    pub fn c_read(&self, ctr: u32, register: CounterRegisterType) -> Result<u64> {
        self.check_register(ctr, register)?;
        self.core.check_connected()?;
        self.backend.read(ctr, register)
    }

    /// Load a register of `ctr`.
    pub fn c_load(&self, ctr: u32, register: CounterRegisterType, value: u64) -> Result<()> {
        self.check_register(ctr, register)?;
        if value > self.max_value() {
            return Err(UlError::BadCtrVal);
        }
        self.core.check_connected()?;
        self.backend.load(ctr, register, value)?;
        debug!(ctr, ?register, value, "Counter register loaded");
        Ok(())
    }

    /// Reset the count of `ctr` to zero.
    pub fn c_clear(&self, ctr: u32) -> Result<()> {
        self.c_load(ctr, CounterRegisterType::COUNT, 0)
    }

    /// Configure what `ctr` measures.
    pub fn c_config_scan(&self, ctr: u32, config: CtrScanConfig) -> Result<()> {
        let cap = self.capability(ctr)?;
        let ty = config.measurement_type;
        if ty.bits().count_ones() != 1 || !cap.measurement_types.contains(ty) {
            return Err(UlError::BadCtrMeasureType);
        }
        if !cap.modes_for(ty).contains(config.mode) {
            return Err(UlError::BadCtrMeasureMode);
        }
        if !self.info.edge_detections.contains(&config.edge_detection) {
            return Err(UlError::BadEdgeDetection);
        }
        match config.tick_size {
            Some(tick) => {
                if !CounterMeasurementType::TICK_BASED.contains(ty) || !self.info.tick_sizes.contains(&tick) {
                    return Err(UlError::BadTickSize);
                }
            }
            None => {
                if CounterMeasurementType::TICK_BASED.contains(ty) && !self.info.tick_sizes.is_empty() {
                    return Err(UlError::BadTickSize);
                }
            }
        }
        if !self.info.debounce_modes.contains(&config.debounce_mode) {
            return Err(UlError::BadDebounceMode);
        }
        let debounced = config.debounce_mode != CounterDebounceMode::None;
        if (!debounced && config.debounce_time != CounterDebounceTime::Debounce0ns)
            || (debounced && !self.info.debounce_times.contains(&config.debounce_time))
        {
            return Err(UlError::BadDebounceTime);
        }
        if self.core.input_engine().owner() == Some(FunctionType::Ctr) {
            return Err(UlError::AlreadyActive);
        }
        self.core.check_connected()?;

        self.backend.configure(ctr, &config)?;
        if let Some(slot) = self.configs.write().get_mut(ctr as usize) {
            *slot = config;
        }
        debug!(ctr, config = ?config, "Counter configured");
        Ok(())
    }

    /// Configuration last applied to `ctr`.
    pub fn config(&self, ctr: u32) -> Result<CtrScanConfig> {
        self.configs
            .read()
            .get(ctr as usize)
            .copied()
            .ok_or(UlError::BadCtr)
    }

    pub(crate) fn scan_conversion(&self, bits: u32) -> ChannelConversion {
        ChannelConversion::Counter {
            bits: bits.min(self.info.resolution),
        }
    }

    /// Start a background scan of counters `low_ctr..=high_ctr`.
    pub fn c_in_scan(
        &self,
        low_ctr: u32,
        high_ctr: u32,
        samples_per_chan: usize,
        rate: f64,
        options: ScanOption,
        flags: CInScanFlag,
        buffer: &ScanBuffer<u64>,
    ) -> Result<f64> {
        if low_ctr > high_ctr || high_ctr >= self.info.num_ctrs() {
            return Err(UlError::BadCtr);
        }
        let chan_count = (high_ctr - low_ctr + 1) as usize;
        let caps = &self.info.scan;

        check_scan_options(options, caps.scan_options)?;
        check_flags(flags.bits(), self.info.scan_flags.bits())?;
        let width = flags & (CInScanFlag::CTR16_BIT | CInScanFlag::CTR32_BIT | CInScanFlag::CTR64_BIT);
        if width.bits().count_ones() > 1 {
            return Err(UlError::BadFlag);
        }
        check_rate(rate, chan_count, options, caps, None)?;
        check_sample_count(samples_per_chan, caps)?;
        check_buffer(buffer.len(), samples_per_chan, chan_count)?;
        check_burst_count(options, samples_per_chan, chan_count, caps)?;
        let trigger = self.scan.trigger();
        check_retrigger(options, &trigger, chan_count, samples_per_chan)?;
        self.core.check_connected()?;

        let bits = if width.contains(CInScanFlag::CTR16_BIT) {
            16
        } else if width.contains(CInScanFlag::CTR32_BIT) {
            32
        } else {
            64
        };
        let pacer = scan_pacer(caps, rate, options);
        let counters: Vec<u32> = (low_ctr..=high_ctr).collect();
        let strategy = self.backend.scan_strategy(&CtrScanSetup {
            counters,
            samples_per_chan,
            pacer,
            options,
            no_clear: flags.contains(CInScanFlag::NOCLEAR),
            trigger,
        })?;
        let plan = ScanPlan {
            function: FunctionType::Ctr,
            chan_count,
            samples_per_chan,
            rate: pacer.actual_rate,
            options,
            sample_size: caps.sample_size,
            conversions: vec![self.scan_conversion(bits); chan_count],
            cjc: None,
        };
        self.core
            .input_engine()
            .start(plan, strategy, buffer.clone().into())
    }

    /// Set the scan trigger.
    pub fn c_set_trigger(
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
    pub fn c_in_scan_status(&self) -> Result<(ScanStatus, TransferStatus)> {
        self.scan.status_pair()
    }

    /// Stop the scan. A no-op when idle.
    pub fn c_in_scan_stop(&self) -> Result<()> {
        self.scan.stop()
    }

    /// Wait for the scan to finish.
    pub fn c_in_scan_wait(&self, wait_type: WaitType, wait_param: i64, timeout_secs: f64) -> Result<()> {
        self.scan.wait(wait_type, wait_param, timeout_secs)
    }
}
