//! USB-2408 / USB-2416 family driver.
//!
//! Analog input only: 24-bit delta-sigma converters with per-channel data
//! rates, thermocouple inputs with on-board cold-junction sensors and
//! open-thermocouple detection, and a 64-element channel queue without
//! ordering restrictions.
//!
//! Samples arrive as 32-bit words: the low 24 bits hold the two's-complement
//! conversion, the high byte a channel tag that is stripped before
//! conversion.

pub mod ai;

use std::sync::Arc;

use once_cell::sync::Lazy;
use tracing::info;

use crate::config::UlConfig;
use crate::device::{CmdKey, CommandTable, DaqDevice, DaqDeviceBuilder, DevInfo, DeviceCore, MemRegionInfo};
use crate::error::Result;
use crate::transport::UsbTransport;
use crate::types::{DaqEventType, MemAccessType, MemRegion};

/// Product id of the USB-2408.
pub const PID_USB_2408: u16 = 0x00FD;
/// Product id of the USB-2416.
pub const PID_USB_2416: u16 = 0x00D0;

/// Calibration table address in the CAL region.
pub const CAL_TABLE_ADDR: u32 = 0x0000;

/// Vendor request bytes.
pub static COMMANDS: Lazy<CommandTable> = Lazy::new(|| {
    CommandTable::new(
        "usb24xx",
        &[
            (CmdKey::AIn, 0x10),
            (CmdKey::AInScanStart, 0x12),
            (CmdKey::AInScanStop, 0x13),
            (CmdKey::AInScanQueue, 0x14),
            (CmdKey::AInClearFifo, 0x15),
            (CmdKey::Cjc, 0x16),
            (CmdKey::MemCal, 0x30),
            (CmdKey::MemUser, 0x31),
            (CmdKey::MemSettings, 0x32),
            (CmdKey::Status, 0x40),
            (CmdKey::Blink, 0x41),
            (CmdKey::Reset, 0x42),
        ],
    )
});

/// Family member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Model {
    /// 16 single-ended / 8 differential inputs
    Usb2408,
    /// 32 single-ended / 16 differential inputs
    Usb2416,
}

impl Model {
    /// Model for a USB product id.
    pub fn from_product_id(product_id: u16) -> Option<Self> {
        match product_id {
            PID_USB_2408 => Some(Self::Usb2408),
            PID_USB_2416 => Some(Self::Usb2416),
            _ => None,
        }
    }

    /// USB product id.
    pub fn product_id(self) -> u16 {
        match self {
            Self::Usb2408 => PID_USB_2408,
            Self::Usb2416 => PID_USB_2416,
        }
    }

    /// Marketing name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Usb2408 => "USB-2408",
            Self::Usb2416 => "USB-2416",
        }
    }

    /// Differential (thermocouple-capable) channels.
    pub fn num_chans_diff(self) -> u32 {
        match self {
            Self::Usb2408 => 8,
            Self::Usb2416 => 16,
        }
    }
}

fn dev_info(model: Model, unique_id: &str) -> DevInfo {
    DevInfo {
        product_id: model.product_id(),
        product_name: model.name().to_string(),
        unique_id: unique_id.to_string(),
        clock_freq: ai::PACER_CLOCK,
        event_types: DaqEventType::ON_DATA_AVAILABLE
            | DaqEventType::ON_INPUT_SCAN_ERROR
            | DaqEventType::ON_END_OF_INPUT_SCAN,
        mem_regions: vec![
            MemRegionInfo {
                region: MemRegion::CAL,
                address: CAL_TABLE_ADDR,
                size: 0x200,
                access: MemAccessType::READ,
            },
            MemRegionInfo {
                region: MemRegion::USER,
                address: 0x0000,
                size: 0x400,
                access: MemAccessType::READ | MemAccessType::WRITE,
            },
            MemRegionInfo {
                region: MemRegion::SETTINGS,
                address: 0x0000,
                size: 0x100,
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
    let backend = Arc::new(ai::Usb24xxAi::new(Arc::clone(builder.core()), model));
    let device = builder.with_ai(ai::info(model), backend).build();
    info!(model = model.name(), unique_id, "Opened USB-24xx family device");
    Ok(device)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UlError;
    use crate::transport::MockTransport;

    #[test]
    fn test_open_is_ai_only() {
        let mock = Arc::new(MockTransport::new());
        let device = open(Model::Usb2408, "0200ABCD", mock, UlConfig::default()).unwrap();
        assert!(device.ai().is_ok());
        assert_eq!(device.ao().err(), Some(UlError::BadDevType));
        assert_eq!(device.daqi().err(), Some(UlError::BadDevType));
        assert_eq!(device.ai().unwrap().info().num_chans_se, 16);
    }

    #[test]
    fn test_model_lookup() {
        assert_eq!(Model::from_product_id(0x00FD), Some(Model::Usb2408));
        assert_eq!(Model::from_product_id(0x013D), None);
    }
}
