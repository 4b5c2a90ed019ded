//! USB-1808 / USB-1808X family driver.
//!
//! Eight 18-bit analog inputs, two 16-bit analog outputs, one 4-bit
//! bit-configurable digital port, two general-purpose counters, two encoder
//! counters and two pulse timers. Every input function (AI, DIn, CIn, DaqI)
//! feeds the same input FIFO and every output function (AO, DOut, DaqO) the
//! same output FIFO, so one scan of each direction can run at a time.
//!
//! # Wire layout
//!
//! | Command           | Payload                                               |
//! |-------------------|-------------------------------------------------------|
//! | `AInScanStart`    | count u32, retrig u32, period-1 u32, mask u16, packet u8, options u8 |
//! | `AOutScanStart`   | count u32, retrig u32, period-1 u32, mask u8, options u8 |
//! | `AInConfig`       | one byte per channel: range (bits 0-1), mode (bits 2-3) |
//! | `TimerParameters` | period-1 u32, width-1 u32, count u32, delay u32       |
//! | `Status`          | u16 status word                                       |
//!
//! Scan masks: input bits 0-7 analog, bit 8 the digital port, bits 9-12
//! counters; output bits 0-1 analog, bit 2 the digital port.

pub mod ai;
pub mod ao;
pub mod ctr;
pub mod daq;
pub mod dio;
mod scan;
pub mod tmr;

use std::sync::Arc;

use once_cell::sync::Lazy;
use tracing::info;

use crate::config::UlConfig;
use crate::device::{CmdKey, CommandTable, DaqDevice, DaqDeviceBuilder, DevInfo, DeviceCore, MemRegionInfo, ScanCaps};
use crate::error::Result;
use crate::transport::UsbTransport;
use crate::types::{DaqEventType, MemAccessType, MemRegion, ScanOption, TriggerType};

pub use scan::{InScanStrategy, OutScanStrategy};

/// Product id of the USB-1808.
pub const PID_USB_1808: u16 = 0x013D;
/// Product id of the USB-1808X.
pub const PID_USB_1808X: u16 = 0x013E;

/// Pacer and timer base clock.
pub const CLOCK_FREQ: f64 = 100e6;
/// Largest pacer divider (the register holds `period - 1`).
pub const MAX_PACER_PERIOD: u64 = 1 << 32;

/// Calibration table address in the CAL region.
pub const CAL_TABLE_ADDR: u32 = 0x7000;

pub(crate) const STATUS_AIN_RUNNING: u16 = 0x02;
pub(crate) const STATUS_AOUT_RUNNING: u16 = 0x04;
pub(crate) const STATUS_AIN_OVERRUN: u16 = 0x08;
pub(crate) const STATUS_AOUT_UNDERRUN: u16 = 0x10;

/// Vendor request bytes.
pub static COMMANDS: Lazy<CommandTable> = Lazy::new(|| {
    CommandTable::new(
        "usb1808",
        &[
            (CmdKey::DTristate, 0x00),
            (CmdKey::DPort, 0x01),
            (CmdKey::DLatch, 0x02),
            (CmdKey::AIn, 0x10),
            (CmdKey::AInScanStart, 0x11),
            (CmdKey::AInScanStop, 0x12),
            (CmdKey::AInConfig, 0x14),
            (CmdKey::AInClearFifo, 0x15),
            (CmdKey::AOut, 0x18),
            (CmdKey::AOutScanStart, 0x1A),
            (CmdKey::AOutScanStop, 0x1B),
            (CmdKey::AOutClearFifo, 0x1C),
            (CmdKey::Counter, 0x20),
            (CmdKey::CounterOptions, 0x21),
            (CmdKey::CounterLimits, 0x22),
            (CmdKey::CounterMode, 0x23),
            (CmdKey::TimerControl, 0x28),
            (CmdKey::TimerParameters, 0x2D),
            (CmdKey::MemCal, 0x31),
            (CmdKey::MemUser, 0x32),
            (CmdKey::MemSettings, 0x33),
            (CmdKey::Status, 0x40),
            (CmdKey::Blink, 0x41),
            (CmdKey::Reset, 0x42),
            (CmdKey::TriggerConfig, 0x43),
        ],
    )
});

/// Family member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Model {
    /// 50 kS/s per channel
    Usb1808,
    /// 200 kS/s per channel
    Usb1808X,
}

impl Model {
    /// Model for a USB product id.
    pub fn from_product_id(product_id: u16) -> Option<Self> {
        match product_id {
            PID_USB_1808 => Some(Self::Usb1808),
            PID_USB_1808X => Some(Self::Usb1808X),
            _ => None,
        }
    }

    /// USB product id.
    pub fn product_id(self) -> u16 {
        match self {
            Self::Usb1808 => PID_USB_1808,
            Self::Usb1808X => PID_USB_1808X,
        }
    }

    /// Marketing name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Usb1808 => "USB-1808",
            Self::Usb1808X => "USB-1808X",
        }
    }

    fn max_ai_rate(self) -> f64 {
        match self {
            Self::Usb1808 => 50e3,
            Self::Usb1808X => 200e3,
        }
    }
}

pub(crate) fn input_caps(model: Model) -> ScanCaps {
    let max_rate = model.max_ai_rate();
    ScanCaps {
        clock_freq: CLOCK_FREQ,
        max_pacer_period: MAX_PACER_PERIOD,
        min_scan_rate: CLOCK_FREQ / MAX_PACER_PERIOD as f64,
        max_scan_rate: max_rate,
        max_throughput: max_rate * 8.0,
        max_burst_rate: max_rate,
        max_burst_throughput: max_rate * 8.0,
        fifo_size: 8192,
        sample_size: 4,
        scan_options: ScanOption::SINGLEIO
            | ScanOption::BLOCKIO
            | ScanOption::BURSTIO
            | ScanOption::CONTINUOUS
            | ScanOption::EXTCLOCK
            | ScanOption::EXTTRIGGER
            | ScanOption::RETRIGGER
            | ScanOption::PACEROUT,
        trigger_types: TriggerType::POS_EDGE | TriggerType::NEG_EDGE | TriggerType::HIGH | TriggerType::LOW,
        min_scan_sample_count: 1,
    }
}

pub(crate) fn output_caps() -> ScanCaps {
    ScanCaps {
        clock_freq: CLOCK_FREQ,
        max_pacer_period: MAX_PACER_PERIOD,
        min_scan_rate: CLOCK_FREQ / MAX_PACER_PERIOD as f64,
        max_scan_rate: 500e3,
        max_throughput: 500e3,
        max_burst_rate: 0.0,
        max_burst_throughput: 0.0,
        fifo_size: 4096,
        sample_size: 2,
        scan_options: ScanOption::SINGLEIO
            | ScanOption::BLOCKIO
            | ScanOption::CONTINUOUS
            | ScanOption::EXTCLOCK
            | ScanOption::EXTTRIGGER
            | ScanOption::RETRIGGER
            | ScanOption::PACEROUT,
        trigger_types: TriggerType::POS_EDGE | TriggerType::NEG_EDGE | TriggerType::HIGH | TriggerType::LOW,
        min_scan_sample_count: 1,
    }
}

fn dev_info(model: Model, unique_id: &str) -> DevInfo {
    DevInfo {
        product_id: model.product_id(),
        product_name: model.name().to_string(),
        unique_id: unique_id.to_string(),
        clock_freq: CLOCK_FREQ,
        event_types: DaqEventType::all(),
        mem_regions: vec![
            MemRegionInfo {
                region: MemRegion::CAL,
                address: CAL_TABLE_ADDR,
                size: 0x1000,
                access: MemAccessType::READ,
            },
            MemRegionInfo {
                region: MemRegion::USER,
                address: 0x0000,
                size: 0x7000,
                access: MemAccessType::READ | MemAccessType::WRITE,
            },
            MemRegionInfo {
                region: MemRegion::SETTINGS,
                address: 0x8000,
                size: 0x800,
                access: MemAccessType::READ | MemAccessType::WRITE,
            },
        ],
        mem_chunk_size: 64,
    }
}

/// Assemble a device of `model` over `transport`. The device is returned
/// disconnected.
pub fn open(
    model: Model,
    unique_id: &str,
    transport: Arc<dyn UsbTransport>,
    config: UlConfig,
) -> Result<DaqDevice> {
    config.validate()?;
    let core = DeviceCore::new(dev_info(model, unique_id), transport, &COMMANDS, config);
    let builder = DaqDeviceBuilder::new(core);
    let core = Arc::clone(builder.core());
    let ai_regs = Arc::new(ai::AiConfigRegs::default());

    let device = builder
        .with_ai(
            ai::info(model),
            Arc::new(ai::Usb1808Ai::new(Arc::clone(&core), Arc::clone(&ai_regs))),
        )
        .with_ao(ao::info(), Arc::new(ao::Usb1808Ao::new(Arc::clone(&core))))
        .with_dio(dio::info(model), Arc::new(dio::Usb1808Dio::new(Arc::clone(&core))))
        .with_ctr(ctr::info(model), Arc::new(ctr::Usb1808Ctr::new(Arc::clone(&core))))
        .with_tmr(tmr::info(), Arc::new(tmr::Usb1808Tmr::new(Arc::clone(&core))))
        .with_daqi(
            daq::daqi_info(model),
            Arc::new(daq::Usb1808DaqI::new(Arc::clone(&core), ai_regs)),
        )
        .with_daqo(daq::daqo_info(), Arc::new(daq::Usb1808DaqO::new(Arc::clone(&core))))
        .build();
    info!(model = model.name(), unique_id, "Opened USB-1808 family device");
    Ok(device)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;

    #[test]
    fn test_model_lookup() {
        assert_eq!(Model::from_product_id(0x013D), Some(Model::Usb1808));
        assert_eq!(Model::from_product_id(0x013E), Some(Model::Usb1808X));
        assert_eq!(Model::from_product_id(0x00D0), None);
    }

    #[test]
    fn test_open_builds_every_subsystem() {
        let mock = Arc::new(MockTransport::new());
        let device = open(Model::Usb1808X, "01ABCDEF", mock, UlConfig::default()).unwrap();
        assert!(!device.is_connected());
        assert_eq!(device.dev_info().product_name, "USB-1808X");
        assert!(device.ai().is_ok());
        assert!(device.ao().is_ok());
        assert!(device.dio().is_ok());
        assert!(device.ctr().is_ok());
        assert!(device.tmr().is_ok());
        assert!(device.daqi().is_ok());
        assert!(device.daqo().is_ok());
    }

    #[test]
    fn test_min_rate_matches_pacer_limit() {
        let caps = input_caps(Model::Usb1808);
        assert!((caps.min_scan_rate - 100e6 / 4_294_967_296.0).abs() < 1e-12);
    }
}
