//! USB-1808 counters.
//!
//! Counters 0 and 1 are general purpose (count, period, pulse width,
//! timing); counters 2 and 3 are quadrature encoder inputs. All are 32 bits.

use std::sync::Arc;

use tracing::debug;

use super::input_caps;
use super::scan::{InScanStrategy, MASK_CTR_SHIFT};
use super::Model;
use crate::device::{CmdKey, CtrCapability, CtrInfo, DeviceCore};
use crate::endian::{read_u32_le, write_u32_le};
use crate::error::{Result, UlError};
use crate::scan::ScanStrategy;
use crate::subsystem::{CtrBackend, CtrScanConfig, CtrScanSetup};
use crate::types::{
    CInScanFlag, CounterDebounceMode, CounterDebounceTime, CounterEdgeDetection,
    CounterMeasurementMode as Mode, CounterMeasurementType as Measure, CounterRegisterType as Reg,
    CounterTickSize,
};

/// Counter channels.
pub const NUM_CTRS: u32 = 4;
/// Counter width.
pub const RESOLUTION: u32 = 32;

const TICK_SIZES: [CounterTickSize; 4] = [
    CounterTickSize::Tick20ns,
    CounterTickSize::Tick200ns,
    CounterTickSize::Tick2000ns,
    CounterTickSize::Tick20000ns,
];

fn general_purpose() -> CtrCapability {
    CtrCapability {
        measurement_types: Measure::COUNT | Measure::PERIOD | Measure::PULSE_WIDTH | Measure::TIMING,
        modes: vec![
            (
                Measure::COUNT,
                Mode::CLEAR_ON_READ
                    | Mode::COUNT_DOWN
                    | Mode::GATE_CONTROLS_DIR
                    | Mode::GATE_CLEARS_CTR
                    | Mode::GATE_TRIG_SRC
                    | Mode::OUTPUT_ON
                    | Mode::OUTPUT_INITIAL_STATE_HIGH
                    | Mode::NO_RECYCLE
                    | Mode::RANGE_LIMIT_ON
                    | Mode::GATING_ON
                    | Mode::INVERT_GATE,
            ),
            (
                Measure::PERIOD,
                Mode::PERIOD_X10
                    | Mode::PERIOD_X100
                    | Mode::PERIOD_X1000
                    | Mode::PERIOD_GATING_ON
                    | Mode::PERIOD_INVERT_GATE,
            ),
            (
                Measure::PULSE_WIDTH,
                Mode::PULSE_WIDTH_GATING_ON | Mode::PULSE_WIDTH_INVERT_GATE,
            ),
            (Measure::TIMING, Mode::TIMING_MODE_INVERT_GATE),
        ],
        registers: Reg::COUNT | Reg::LOAD | Reg::MIN_LIMIT | Reg::MAX_LIMIT,
    }
}

fn encoder() -> CtrCapability {
    CtrCapability {
        measurement_types: Measure::ENCODER,
        modes: vec![(
            Measure::ENCODER,
            Mode::ENCODER_X2
                | Mode::ENCODER_X4
                | Mode::ENCODER_LATCH_ON_Z
                | Mode::ENCODER_CLEAR_ON_Z
                | Mode::ENCODER_NO_RECYCLE
                | Mode::ENCODER_RANGE_LIMIT_ON
                | Mode::ENCODER_Z_ACTIVE_EDGE,
        )],
        registers: Reg::COUNT | Reg::LOAD,
    }
}

/// Counter capabilities.
pub fn info(model: Model) -> CtrInfo {
    CtrInfo {
        resolution: RESOLUTION,
        counters: vec![general_purpose(), general_purpose(), encoder(), encoder()],
        tick_sizes: TICK_SIZES.to_vec(),
        debounce_modes: vec![
            CounterDebounceMode::None,
            CounterDebounceMode::TriggerAfterStable,
            CounterDebounceMode::TriggerBeforeStable,
        ],
        debounce_times: vec![
            CounterDebounceTime::Debounce500ns,
            CounterDebounceTime::Debounce1500ns,
            CounterDebounceTime::Debounce3500ns,
            CounterDebounceTime::Debounce7500ns,
            CounterDebounceTime::Debounce15500ns,
            CounterDebounceTime::Debounce31500ns,
            CounterDebounceTime::Debounce63500ns,
            CounterDebounceTime::Debounce127500ns,
            CounterDebounceTime::Debounce100us,
            CounterDebounceTime::Debounce300us,
            CounterDebounceTime::Debounce700us,
            CounterDebounceTime::Debounce1500us,
            CounterDebounceTime::Debounce3100us,
            CounterDebounceTime::Debounce6300us,
            CounterDebounceTime::Debounce12700us,
            CounterDebounceTime::Debounce25500us,
        ],
        edge_detections: vec![CounterEdgeDetection::RisingEdge, CounterEdgeDetection::FallingEdge],
        scan_flags: CInScanFlag::CTR16_BIT | CInScanFlag::CTR32_BIT | CInScanFlag::NOCLEAR,
        scan: input_caps(model),
    }
}

fn measure_code(measurement_type: Measure) -> Result<u8> {
    match measurement_type {
        Measure::COUNT => Ok(0),
        Measure::PERIOD => Ok(1),
        Measure::PULSE_WIDTH => Ok(2),
        Measure::TIMING => Ok(3),
        Measure::ENCODER => Ok(4),
        _ => Err(UlError::BadCtrMeasureType),
    }
}

fn tick_code(tick: Option<CounterTickSize>) -> Result<u8> {
    match tick {
        None => Ok(0),
        Some(t) => TICK_SIZES
            .iter()
            .position(|s| *s == t)
            .map(|i| i as u8)
            .ok_or(UlError::BadTickSize),
    }
}

/// Command key and `wValue` addressing a register.
fn register_address(register: Reg) -> Result<(CmdKey, u16)> {
    match register {
        Reg::COUNT => Ok((CmdKey::Counter, 0)),
        Reg::LOAD => Ok((CmdKey::Counter, 1)),
        Reg::MIN_LIMIT => Ok((CmdKey::CounterLimits, 0)),
        Reg::MAX_LIMIT => Ok((CmdKey::CounterLimits, 1)),
        _ => Err(UlError::BadCtrReg),
    }
}

/// Counter backend.
pub struct Usb1808Ctr {
    core: Arc<DeviceCore>,
}

impl Usb1808Ctr {
    /// Backend over `core`.
    pub fn new(core: Arc<DeviceCore>) -> Self {
        Self { core }
    }
}

/// Counters a scan clears before it starts.
pub(crate) fn counters_to_clear(counters: &[u32], no_clear: bool) -> Vec<u32> {
    if no_clear {
        Vec::new()
    } else {
        counters.to_vec()
    }
}

/// Mask bits of the counters of a scan.
pub(crate) fn scan_mask(counters: &[u32]) -> u16 {
    counters
        .iter()
        .fold(0u16, |mask, ctr| mask | (1 << (MASK_CTR_SHIFT + ctr)))
}

impl CtrBackend for Usb1808Ctr {
    fn read(&self, ctr: u32, register: Reg) -> Result<u64> {
        let (key, value) = register_address(register)?;
        let reply = self.core.query_exact(key, value, ctr as u16, 4)?;
        Ok(u64::from(read_u32_le(&reply, 0)?))
    }

    fn load(&self, ctr: u32, register: Reg, value: u64) -> Result<()> {
        let (key, reg) = register_address(register)?;
        let value = u32::try_from(value).map_err(|_| UlError::BadCtrVal)?;
        let mut data = [0u8; 4];
        write_u32_le(&mut data, 0, value)?;
        self.core.send_cmd(key, reg, ctr as u16, &data)
    }

    fn configure(&self, ctr: u32, config: &CtrScanConfig) -> Result<()> {
        let mut mode = [0u8; 5];
        mode[0] = measure_code(config.measurement_type)?;
        write_u32_le(&mut mode, 1, config.mode.bits())?;
        self.core.send_cmd(CmdKey::CounterMode, 0, ctr as u16, &mode)?;

        let options = [
            config.edge_detection as u8,
            tick_code(config.tick_size)?,
            config.debounce_mode as u8,
            config.debounce_time as u8,
        ];
        self.core.send_cmd(CmdKey::CounterOptions, 0, ctr as u16, &options)?;
        debug!(ctr, mode = ?mode, options = ?options, "Counter registers written");
        Ok(())
    }

    fn scan_strategy(&self, setup: &CtrScanSetup) -> Result<Arc<dyn ScanStrategy>> {
        let strategy = InScanStrategy::new(
            Arc::clone(&self.core),
            scan_mask(&setup.counters),
            None,
            counters_to_clear(&setup.counters, setup.no_clear),
            setup.samples_per_chan,
            setup.pacer,
            setup.options,
            setup.trigger,
        )?;
        Ok(Arc::new(strategy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_addressing() {
        assert_eq!(register_address(Reg::LOAD), Ok((CmdKey::Counter, 1)));
        assert_eq!(register_address(Reg::MAX_LIMIT), Ok((CmdKey::CounterLimits, 1)));
        assert_eq!(register_address(Reg::OUTPUT_VAL0), Err(UlError::BadCtrReg));
    }

    #[test]
    fn test_counter_scan_mask() {
        assert_eq!(scan_mask(&[0, 1]), 0b11 << 9);
        assert_eq!(scan_mask(&[3]), 1 << 12);
    }

    #[test]
    fn test_capabilities_differ_per_counter() {
        let info = info(Model::Usb1808);
        assert!(info.counters[0].measurement_types.contains(Measure::PERIOD));
        assert!(!info.counters[2].measurement_types.contains(Measure::PERIOD));
        assert_eq!(info.counters[3].measurement_types, Measure::ENCODER);
        assert_eq!(tick_code(Some(CounterTickSize::Tick2000ns)), Ok(2));
        assert_eq!(tick_code(Some(CounterTickSize::Tick20Pt83ns)), Err(UlError::BadTickSize));
    }
}
