//! USB-1808 analog input.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use super::scan::InScanStrategy;
use super::{input_caps, Model, CAL_TABLE_ADDR};
use crate::device::{AiInfo, CmdKey, DeviceCore};
use crate::endian::read_u32_le;
use crate::error::{Result, UlError};
use crate::range::Range;
use crate::scan::{SampleFormat, ScanStrategy};
use crate::subsystem::{AiBackend, AiChanConfig, AiQueueElement, AiScanSetup};
use crate::types::{AInScanFlag, AiChanQueueLimitation, AiChanType, AiInputMode, AiQueueType};

/// Single-ended channels.
pub const NUM_CHANS: usize = 8;
/// Analog inputs are 18-bit.
pub const RESOLUTION: u32 = 18;
/// Ranges, in register order.
pub const RANGES: [Range; 4] = [Range::Bip10Volts, Range::Bip5Volts, Range::Uni10Volts, Range::Uni5Volts];
/// Calibration coefficients: one per channel and range.
pub const CAL_COEF_COUNT: usize = NUM_CHANS * RANGES.len();

const MODE_SE: u8 = 0;
const MODE_DIFF: u8 = 1;

pub(crate) fn range_index(range: Range) -> Result<u8> {
    RANGES
        .iter()
        .position(|r| *r == range)
        .map(|i| i as u8)
        .ok_or(UlError::BadRange)
}

fn mode_bits(mode: AiInputMode) -> Result<u8> {
    match mode {
        AiInputMode::SingleEnded => Ok(MODE_SE),
        AiInputMode::Differential => Ok(MODE_DIFF),
        AiInputMode::PseudoDifferential => Err(UlError::BadInputMode),
    }
}

/// Analog input capabilities.
pub fn info(model: Model) -> AiInfo {
    AiInfo {
        resolution: RESOLUTION,
        num_chans_se: NUM_CHANS as u32,
        num_chans_diff: NUM_CHANS as u32 / 2,
        num_chans_pseudo_diff: 0,
        chan_types: AiChanType::VOLTAGE,
        ranges_se: RANGES.to_vec(),
        ranges_diff: RANGES.to_vec(),
        tc_types: Vec::new(),
        scan_flags: AInScanFlag::NOSCALEDATA | AInScanFlag::NOCALIBRATEDATA,
        queue_types: AiQueueType::empty(),
        queue_limitations: AiChanQueueLimitation::empty(),
        max_queue_length_se: 0,
        max_queue_length_diff: 0,
        data_rates: Vec::new(),
        scan: input_caps(model),
    }
}

/// Host copy of the per-channel range/mode register block. `None` until
/// the block has been written once.
#[derive(Debug, Default)]
pub struct AiConfigRegs {
    regs: Mutex<Option<[u8; NUM_CHANS]>>,
}

impl AiConfigRegs {
    /// Apply `(channel, mode, range)` settings. Returns the new block when it
    /// differs from what the device holds.
    pub(crate) fn update(
        &self,
        elements: impl IntoIterator<Item = (u32, AiInputMode, Range)>,
    ) -> Result<Option<Vec<u8>>> {
        let mut regs = self.regs.lock();
        let mut next = regs.unwrap_or([0; NUM_CHANS]);
        for (chan, mode, range) in elements {
            let slot = next.get_mut(chan as usize).ok_or(UlError::BadAiChan)?;
            *slot = range_index(range)? | (mode_bits(mode)? << 2);
        }
        if *regs == Some(next) {
            return Ok(None);
        }
        *regs = Some(next);
        Ok(Some(next.to_vec()))
    }

    /// Block a scan loads for `elements`. The host copy is dropped: the scan
    /// may never reach the device, so the next single read rewrites it.
    pub(crate) fn scan_block(
        &self,
        elements: impl IntoIterator<Item = (u32, AiInputMode, Range)>,
    ) -> Result<Vec<u8>> {
        let mut regs = self.regs.lock();
        let mut next = regs.unwrap_or([0; NUM_CHANS]);
        for (chan, mode, range) in elements {
            let slot = next.get_mut(chan as usize).ok_or(UlError::BadAiChan)?;
            *slot = range_index(range)? | (mode_bits(mode)? << 2);
        }
        *regs = None;
        Ok(next.to_vec())
    }
}

/// Mask bits of the analog elements of a scan.
pub(crate) fn scan_mask(channels: impl IntoIterator<Item = u32>) -> u16 {
    channels.into_iter().fold(0u16, |mask, chan| mask | (1 << chan))
}

/// Analog input backend.
pub struct Usb1808Ai {
    core: Arc<DeviceCore>,
    regs: Arc<AiConfigRegs>,
}

impl Usb1808Ai {
    /// Backend sharing `regs` with the synchronous input backend.
    pub fn new(core: Arc<DeviceCore>, regs: Arc<AiConfigRegs>) -> Self {
        Self { core, regs }
    }
}

impl AiBackend for Usb1808Ai {
    fn sample_format(&self) -> SampleFormat {
        SampleFormat::Unsigned { bits: RESOLUTION }
    }

    fn cal_table(&self) -> Option<(u32, usize)> {
        Some((CAL_TABLE_ADDR, CAL_COEF_COUNT))
    }

    fn cal_coef_index(&self, chan: u32, _mode: AiInputMode, range: Range) -> usize {
        let range_idx = range_index(range).map_or(0, usize::from);
        chan as usize * RANGES.len() + range_idx
    }

    fn read_raw(&self, element: &AiQueueElement, _config: &AiChanConfig) -> Result<u64> {
        if let Some(block) = self
            .regs
            .update([(element.channel, element.input_mode, element.range)])?
        {
            self.core.send_cmd(CmdKey::AInConfig, 0, 0, &block)?;
        }
        let reply = self.core.query_exact(CmdKey::AIn, 0, 0, NUM_CHANS * 4)?;
        let word = read_u32_le(&reply, element.channel as usize * 4)?;
        trace!(chan = element.channel, word, "AIn");
        Ok(u64::from(word) & ((1 << RESOLUTION) - 1))
    }

    fn scan_strategy(&self, setup: &AiScanSetup) -> Result<Arc<dyn ScanStrategy>> {
        let block = self.regs.scan_block(
            setup
                .elements
                .iter()
                .map(|e| (e.channel, e.input_mode, e.range)),
        )?;
        let mask = scan_mask(setup.elements.iter().map(|e| e.channel));
        let strategy = InScanStrategy::new(
            Arc::clone(&self.core),
            mask,
            Some(block),
            Vec::new(),
            setup.samples_per_chan,
            setup.pacer,
            setup.options,
            setup.trigger,
        )?;
        Ok(Arc::new(strategy))
    }
}
