//! USB-1808 synchronous input and output.
//!
//! The hardware returns a scan in mask order: analog channels ascending, the
//! digital port, then counters ascending. Descriptor lists must already be in
//! that order.

use std::sync::Arc;

use super::ai::{self, AiConfigRegs};
use super::scan::{InScanStrategy, OutScanStrategy, MASK_DIO_IN, MASK_DIO_OUT};
use super::{ctr, input_caps, output_caps, Model};
use crate::device::{DaqIInfo, DaqOInfo, DeviceCore};
use crate::error::{Result, UlError};
use crate::scan::ScanStrategy;
use crate::subsystem::{
    DaqIBackend, DaqIScanSetup, DaqInChanDescriptor, DaqOBackend, DaqOScanSetup, DaqOutChanDescriptor,
};
use crate::types::{AiInputMode, DaqInChanType, DaqInScanFlag, DaqOutChanType, DaqOutScanFlag};

/// Analog, digital and counter channels in one scan.
pub const MAX_DAQI_CHANS: usize = ai::NUM_CHANS + 1 + ctr::NUM_CTRS as usize;
/// Analog outputs plus the digital port.
pub const MAX_DAQO_CHANS: usize = super::ao::NUM_CHANS as usize + 1;

/// Synchronous input capabilities.
pub fn daqi_info(model: Model) -> DaqIInfo {
    DaqIInfo {
        chan_types: DaqInChanType::ANALOG_SE
            | DaqInChanType::ANALOG_DIFF
            | DaqInChanType::DIGITAL
            | DaqInChanType::CTR32,
        max_chans: MAX_DAQI_CHANS,
        scan_flags: DaqInScanFlag::all(),
        scan: input_caps(model),
    }
}

/// Synchronous output capabilities.
pub fn daqo_info() -> DaqOInfo {
    DaqOInfo {
        chan_types: DaqOutChanType::ANALOG | DaqOutChanType::DIGITAL,
        max_chans: MAX_DAQO_CHANS,
        scan_flags: DaqOutScanFlag::all(),
        scan: output_caps(),
    }
}

/// Position of a channel type group in the hardware order.
fn in_group(chan_type: DaqInChanType) -> u8 {
    if DaqInChanType::ANALOG.contains(chan_type) {
        0
    } else if chan_type == DaqInChanType::DIGITAL {
        1
    } else {
        2
    }
}

/// Groups must appear in hardware order and channels ascend within a group.
fn check_order<T: Copy + Ord>(keys: impl IntoIterator<Item = (u8, T)>) -> Result<()> {
    let mut prev: Option<(u8, T)> = None;
    for key in keys {
        if prev.is_some_and(|p| key <= p) {
            return Err(UlError::BadChanOrder);
        }
        prev = Some(key);
    }
    Ok(())
}

/// Synchronous input backend.
pub struct Usb1808DaqI {
    core: Arc<DeviceCore>,
    regs: Arc<AiConfigRegs>,
}

impl Usb1808DaqI {
    /// Backend sharing the analog range registers with the AI backend.
    pub fn new(core: Arc<DeviceCore>, regs: Arc<AiConfigRegs>) -> Self {
        Self { core, regs }
    }
}

impl DaqIBackend for Usb1808DaqI {
    fn check_chan_order(&self, descriptors: &[DaqInChanDescriptor]) -> Result<()> {
        check_order(descriptors.iter().map(|d| (in_group(d.chan_type), d.channel)))
    }

    fn scan_strategy(&self, setup: &DaqIScanSetup) -> Result<Arc<dyn ScanStrategy>> {
        let mut mask = 0u16;
        let mut analog = Vec::new();
        let mut counters = Vec::new();
        for desc in &setup.descriptors {
            match in_group(desc.chan_type) {
                0 => {
                    let mode = if desc.chan_type == DaqInChanType::ANALOG_DIFF {
                        AiInputMode::Differential
                    } else {
                        AiInputMode::SingleEnded
                    };
                    analog.push((desc.channel, mode, desc.range));
                }
                1 => mask |= MASK_DIO_IN,
                _ => counters.push(desc.channel),
            }
        }
        mask |= ai::scan_mask(analog.iter().map(|(chan, _, _)| *chan));
        mask |= ctr::scan_mask(&counters);
        let ai_config = if analog.is_empty() {
            None
        } else {
            Some(self.regs.scan_block(analog)?)
        };
        let strategy = InScanStrategy::new(
            Arc::clone(&self.core),
            mask,
            ai_config,
            ctr::counters_to_clear(&counters, setup.no_clear),
            setup.samples_per_chan,
            setup.pacer,
            setup.options,
            setup.trigger,
        )?;
        Ok(Arc::new(strategy))
    }
}

/// Synchronous output backend.
pub struct Usb1808DaqO {
    core: Arc<DeviceCore>,
}

impl Usb1808DaqO {
    /// Backend over `core`.
    pub fn new(core: Arc<DeviceCore>) -> Self {
        Self { core }
    }
}

impl DaqOBackend for Usb1808DaqO {
    fn check_chan_order(&self, descriptors: &[DaqOutChanDescriptor]) -> Result<()> {
        check_order(
            descriptors
                .iter()
                .map(|d| (u8::from(d.chan_type == DaqOutChanType::DIGITAL), d.channel)),
        )
    }

    fn scan_strategy(&self, setup: &DaqOScanSetup) -> Result<Arc<dyn ScanStrategy>> {
        let mask = setup.descriptors.iter().fold(0u8, |mask, d| {
            if d.chan_type == DaqOutChanType::DIGITAL {
                mask | MASK_DIO_OUT
            } else {
                mask | (1 << d.channel)
            }
        });
        let strategy = OutScanStrategy::new(
            Arc::clone(&self.core),
            mask,
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
    fn test_order_rules() {
        assert!(check_order([(0, 0u32), (0, 3), (1, 1), (2, 0), (2, 1)]).is_ok());
        assert_eq!(check_order([(0, 2u32), (0, 1)]), Err(UlError::BadChanOrder));
        assert_eq!(check_order([(1, 1u32), (0, 0)]), Err(UlError::BadChanOrder));
        assert_eq!(check_order([(2, 0u32), (2, 0)]), Err(UlError::BadChanOrder));
    }

    #[test]
    fn test_groups() {
        assert_eq!(in_group(DaqInChanType::ANALOG_DIFF), 0);
        assert_eq!(in_group(DaqInChanType::DIGITAL), 1);
        assert_eq!(in_group(DaqInChanType::CTR32), 2);
    }
}
