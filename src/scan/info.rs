//! Ring-buffer cursors of a running scan.
//!
//! ```text
//!   buffer: [ s0c0 s0c1 s0c2 | s1c0 s1c1 s1c2 | ... ]   data_buffer_size samples
//!              ▲                    ▲
//!              │                    └─ current_data_buffer_idx (next slot)
//!              └─ wraps to 0 at the end; finite scans stop there
//!
//!   current_cal_coef_idx cycles 0..chan_count in lockstep with the samples
//! ```
//!
//! [`ScanInfo`] is owned by the transfer worker and only mutated there; other
//! threads see it through the [`TransferStatus`] snapshots the worker
//! publishes.

use crate::types::{FunctionType, TransferStatus};

/// Cursor state of one background scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanInfo {
    /// Function that owns the scan
    pub function: FunctionType,
    /// Channels per scan
    pub chan_count: usize,
    /// Wire bytes per sample
    pub sample_size: usize,
    /// Capacity of the caller's buffer in samples
    pub data_buffer_size: usize,
    /// Continuous scan: wrap and keep going
    pub recycle: bool,
    /// Next buffer slot to write (input) or read (output)
    pub current_data_buffer_idx: usize,
    /// Channel of the next sample
    pub current_cal_coef_idx: usize,
    /// Samples moved since the scan started
    pub total_sample_transferred: u64,
    /// Finite scan complete; no further samples are accepted
    pub all_samples_transferred: bool,
}

impl ScanInfo {
    /// Fresh cursors for a scan of `samples_per_chan` scans over
    /// `chan_count` channels.
    pub fn new(
        function: FunctionType,
        chan_count: usize,
        samples_per_chan: usize,
        sample_size: usize,
        recycle: bool,
    ) -> Self {
        Self {
            function,
            chan_count: chan_count.max(1),
            sample_size,
            data_buffer_size: (samples_per_chan * chan_count).max(1),
            recycle,
            current_data_buffer_idx: 0,
            current_cal_coef_idx: 0,
            total_sample_transferred: 0,
            all_samples_transferred: false,
        }
    }

    /// Samples a finite scan still expects; `usize::MAX` when continuous.
    pub fn remaining(&self) -> usize {
        if self.recycle {
            usize::MAX
        } else if self.all_samples_transferred {
            0
        } else {
            self.data_buffer_size - self.current_data_buffer_idx
        }
    }

    /// Step past one sample. Returns false once a finite scan is complete.
    #[inline]
    pub fn advance(&mut self) -> bool {
        if self.all_samples_transferred {
            return false;
        }

        self.total_sample_transferred += 1;
        self.current_cal_coef_idx += 1;
        if self.current_cal_coef_idx == self.chan_count {
            self.current_cal_coef_idx = 0;
        }

        self.current_data_buffer_idx += 1;
        if self.current_data_buffer_idx == self.data_buffer_size {
            self.current_data_buffer_idx = 0;
            if !self.recycle {
                self.all_samples_transferred = true;
                return false;
            }
        }
        true
    }

    /// Complete scans (every channel sampled once) so far.
    pub fn scan_count(&self) -> u64 {
        self.total_sample_transferred / self.chan_count as u64
    }

    /// Progress snapshot. `current_index` points at the first sample of the
    /// last complete scan.
    pub fn transfer_status(&self) -> TransferStatus {
        let scans = self.scan_count();
        let current_index = if scans == 0 {
            -1
        } else {
            (((scans - 1) * self.chan_count as u64) % self.data_buffer_size as u64) as i64
        };
        TransferStatus {
            current_scan_count: scans,
            current_total_count: self.total_sample_transferred,
            current_index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_invariant_continuous() {
        let mut info = ScanInfo::new(FunctionType::Ai, 3, 5, 4, true);
        for _ in 0..47 {
            assert!(info.advance());
            let total = info.total_sample_transferred;
            assert_eq!(info.current_data_buffer_idx as u64, total % 15);
            assert_eq!(info.current_cal_coef_idx as u64, total % 3);
        }
        assert!(!info.all_samples_transferred);
        assert_eq!(info.remaining(), usize::MAX);
    }

    #[test]
    fn test_finite_scan_terminates() {
        let mut info = ScanInfo::new(FunctionType::Ai, 2, 3, 4, false);
        for _ in 0..5 {
            assert!(info.advance());
        }
        assert_eq!(info.remaining(), 1);
        assert!(!info.advance());
        assert!(info.all_samples_transferred);
        assert_eq!(info.remaining(), 0);

        // further data is ignored
        assert!(!info.advance());
        assert_eq!(info.total_sample_transferred, 6);
    }

    #[test]
    fn test_transfer_status() {
        let mut info = ScanInfo::new(FunctionType::Ai, 4, 2, 2, true);
        assert_eq!(info.transfer_status(), TransferStatus::EMPTY);

        for _ in 0..3 {
            info.advance();
        }
        assert_eq!(info.transfer_status().current_index, -1);

        info.advance();
        let status = info.transfer_status();
        assert_eq!(status.current_scan_count, 1);
        assert_eq!(status.current_index, 0);

        for _ in 0..8 {
            info.advance();
        }
        // 3 scans in a 2-scan buffer: last scan starts at slot 0 again
        let status = info.transfer_status();
        assert_eq!(status.current_scan_count, 3);
        assert_eq!(status.current_total_count, 12);
        assert_eq!(status.current_index, 0);
    }
}
