//! USB-1808 analog output.

use std::sync::Arc;

use super::scan::OutScanStrategy;
use super::{output_caps, CAL_TABLE_ADDR};
use crate::calibration::CAL_COEF_SIZE;
use crate::device::{AoInfo, CmdKey, DeviceCore};
use crate::error::{Result, UlError};
use crate::range::Range;
use crate::scan::ScanStrategy;
use crate::subsystem::{AoBackend, AoScanSetup};

/// Output channels.
pub const NUM_CHANS: u32 = 2;
/// AO coefficients follow the AI table.
pub const CAL_TABLE_OFFSET: u32 = (super::ai::CAL_COEF_COUNT * CAL_COEF_SIZE) as u32;

/// Analog output capabilities.
pub fn info() -> AoInfo {
    AoInfo {
        resolution: 16,
        num_chans: NUM_CHANS,
        ranges: vec![Range::Bip10Volts],
        scan: output_caps(),
    }
}

/// Analog output backend.
pub struct Usb1808Ao {
    core: Arc<DeviceCore>,
}

impl Usb1808Ao {
    /// Backend over `core`.
    pub fn new(core: Arc<DeviceCore>) -> Self {
        Self { core }
    }
}

impl AoBackend for Usb1808Ao {
    fn cal_table(&self) -> Option<(u32, usize)> {
        Some((CAL_TABLE_ADDR + CAL_TABLE_OFFSET, NUM_CHANS as usize))
    }

    fn cal_coef_index(&self, chan: u32, _range: Range) -> usize {
        chan as usize
    }

    fn write_raw(&self, chan: u32, _range: Range, word: u64) -> Result<()> {
        let word = u16::try_from(word).map_err(|_| UlError::BadDaVal)?;
        self.core.send_cmd(CmdKey::AOut, word, chan as u16, &[])
    }

    fn scan_strategy(&self, setup: &AoScanSetup) -> Result<Arc<dyn ScanStrategy>> {
        let mask = setup.channels.iter().fold(0u8, |m, c| m | (1 << *c));
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
