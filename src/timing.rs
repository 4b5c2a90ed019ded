//! Pacer and transfer sizing.
//!
//! ```text
//!   clock ──► ÷ period ──► sample clock      actual = clock / period
//!
//!   stage bytes = rate x channels x width x stage_rate_secs
//!                 rounded up to the endpoint packet size,
//!                 clamped to [packet, max_stage_size] and to the scan total
//! ```

use tracing::debug;

use crate::config::TransferConfig;
use crate::types::ScanOption;

/// Pacer setting achievable for a requested rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PacerSetting {
    /// Clock divider, at least 1
    pub period: u64,
    /// Rate the hardware will actually run at
    pub actual_rate: f64,
}

/// Closest pacer divider for `rate`, clamped to `[1, max_period]`.
pub fn pacer_period(clock_freq: f64, rate: f64, max_period: u64) -> PacerSetting {
    let ideal = (clock_freq / rate).round();
    let period = if ideal.is_finite() && ideal >= 1.0 {
        (ideal as u64).min(max_period.max(1))
    } else if ideal.is_finite() {
        1
    } else {
        max_period.max(1)
    };
    let actual_rate = clock_freq / period as f64;
    debug!(rate, period, actual_rate, "Pacer period");
    PacerSetting {
        period,
        actual_rate,
    }
}

/// How samples move between the device FIFO and the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    /// One sample per transfer
    SingleIo,
    /// Blocks sized for the rate
    BlockIo,
    /// Everything after the scan completes
    BurstIo,
}

impl TransferMode {
    /// Mode requested by `options`. Without an explicit mode, rates below
    /// `single_io_threshold` use single-IO.
    pub fn select(options: ScanOption, rate: f64, single_io_threshold: f64) -> Self {
        if options.contains(ScanOption::BURSTIO) {
            Self::BurstIo
        } else if options.contains(ScanOption::SINGLEIO) {
            Self::SingleIo
        } else if options.contains(ScanOption::BLOCKIO) {
            Self::BlockIo
        } else if single_io_threshold > 0.0 && rate < single_io_threshold {
            Self::SingleIo
        } else {
            Self::BlockIo
        }
    }
}

/// Parameters for [`stage_size`].
#[derive(Debug, Clone, Copy)]
pub struct StageRequest {
    /// Per-channel rate
    pub rate: f64,
    /// Channels per scan
    pub chan_count: usize,
    /// Bytes per sample
    pub sample_size: usize,
    /// Bulk endpoint packet size
    pub max_packet_size: usize,
    /// Bytes in a finite scan; `None` when continuous
    pub total_bytes: Option<usize>,
    /// Transfer mode
    pub mode: TransferMode,
}

/// Bytes moved per bulk stage.
pub fn stage_size(req: &StageRequest, config: &TransferConfig) -> usize {
    let packet = req.max_packet_size.max(1);
    let scan_bytes = (req.chan_count * req.sample_size).max(1);

    let size = match req.mode {
        TransferMode::SingleIo => req.sample_size.max(1),
        TransferMode::BurstIo => config.max_stage_size.max(packet),
        TransferMode::BlockIo => {
            let wanted = req.rate * scan_bytes as f64 * config.stage_rate_secs;
            let wanted = if wanted.is_finite() && wanted > 0.0 {
                wanted.ceil() as usize
            } else {
                packet
            };
            let rounded = wanted.div_ceil(packet) * packet;
            let max = (config.max_stage_size / packet).max(1) * packet;
            rounded.clamp(packet, max)
        }
    };

    match req.total_bytes {
        Some(total) if total > 0 => size.min(total),
        _ => size,
    }
}
