//! Transfer worker: the thread that moves one scan's data.
//!
//! The worker owns the scan's [`ScanInfo`] and [`Pipeline`]. Each bulk stage
//! is converted under the caller buffer's lock, after which a
//! [`ScanProgress`] snapshot is published on a `watch` channel. Errors end the
//! worker and are published, never propagated: the engine surfaces them from
//! the next status or wait call.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, trace, warn};

use super::buffer::ScanTarget;
use super::codec::SampleCodec;
use super::engine::{Direction, ScanStrategy};
use super::info::ScanInfo;
use super::pipeline::Pipeline;
use crate::error::{Result, UlError};
use crate::events::EventHub;
use crate::transport::UsbTransport;
use crate::types::{DaqEventType, TransferStatus};

/// Snapshot published by the worker after every stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanProgress {
    /// Cursor snapshot
    pub transfer: TransferStatus,
    /// The worker has exited its transfer loop
    pub finished: bool,
    /// Error that ended the scan
    pub error: Option<UlError>,
}

impl ScanProgress {
    /// Progress of a scan that has not moved any data.
    pub const STARTING: Self = Self {
        transfer: TransferStatus::EMPTY,
        finished: false,
        error: None,
    };
}

/// Flags shared between the engine and its worker.
#[derive(Debug, Default)]
pub struct ScanControl {
    /// Set by `stop`
    pub stop: AtomicBool,
    /// Set once the hardware has been started
    pub armed: AtomicBool,
}

impl ScanControl {
    fn stopping(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    fn armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }
}

enum Outcome {
    Completed,
    Stopped,
}

/// State moved onto the worker thread.
pub(crate) struct TransferWorker {
    pub(crate) name: &'static str,
    pub(crate) direction: Direction,
    pub(crate) transport: Arc<dyn UsbTransport>,
    pub(crate) strategy: Arc<dyn ScanStrategy>,
    pub(crate) events: Arc<EventHub>,
    pub(crate) control: Arc<ScanControl>,
    pub(crate) progress: watch::Sender<ScanProgress>,
    pub(crate) info: ScanInfo,
    pub(crate) pipeline: Pipeline,
    pub(crate) target: ScanTarget,
    pub(crate) stage_size: usize,
    pub(crate) bulk_timeout: Duration,
    pub(crate) poll_interval: Duration,
    pub(crate) data_available: Option<u64>,
    pub(crate) next_event_scan: u64,
}

fn convert_input<W: SampleCodec>(
    pipeline: &mut Pipeline,
    info: &mut ScanInfo,
    target: &ScanTarget,
    strategy: &dyn ScanStrategy,
    bytes: &[u8],
) -> usize {
    let decode = |chan: usize, raw: u64| strategy.decode_raw_sample(chan, raw);
    match target {
        ScanTarget::F64(buf) => {
            buf.with_mut(|data| pipeline.process_input::<W, f64, _>(info, bytes, data, decode))
        }
        ScanTarget::U64(buf) => {
            buf.with_mut(|data| pipeline.process_input::<W, u64, _>(info, bytes, data, decode))
        }
    }
}

fn fill_output<W: SampleCodec>(
    pipeline: &mut Pipeline,
    info: &mut ScanInfo,
    target: &ScanTarget,
    out: &mut [u8],
) -> usize {
    match target {
        ScanTarget::F64(buf) => buf.with(|data| pipeline.process_output::<W, f64>(info, out, data)),
        ScanTarget::U64(buf) => buf.with(|data| pipeline.process_output::<W, u64>(info, out, data)),
    }
}

impl TransferWorker {
    /// Thread entry point.
    pub(crate) fn run(mut self) {
        debug!(scan = self.name, stage_size = self.stage_size, "Transfer worker started");

        let result = match self.direction {
            Direction::Input => self.run_input(),
            Direction::Output => self.run_output(),
        };

        let scans = self.info.scan_count();
        let error = match result {
            Ok(Outcome::Completed) => {
                debug!(scan = self.name, scans, "Scan complete");
                let event = match self.direction {
                    Direction::Input => DaqEventType::ON_END_OF_INPUT_SCAN,
                    Direction::Output => DaqEventType::ON_END_OF_OUTPUT_SCAN,
                };
                self.events.fire(event, scans);
                None
            }
            Ok(Outcome::Stopped) => None,
            Err(e) => {
                error!(scan = self.name, error = %e, scans, "Scan failed");
                if let Err(stop_err) = self.strategy.disarm_scan() {
                    warn!(scan = self.name, error = %stop_err, "Stop after failure failed");
                }
                let event = match self.direction {
                    Direction::Input => DaqEventType::ON_INPUT_SCAN_ERROR,
                    Direction::Output => DaqEventType::ON_OUTPUT_SCAN_ERROR,
                };
                self.events.fire(event, e.code() as u64);
                Some(e)
            }
        };

        self.progress.send_replace(ScanProgress {
            transfer: self.info.transfer_status(),
            finished: true,
            error,
        });
        debug!(scan = self.name, "Transfer worker exiting");
    }

    fn publish(&self) {
        self.progress.send_replace(ScanProgress {
            transfer: self.info.transfer_status(),
            finished: false,
            error: None,
        });
    }

    fn fire_data_available(&mut self) {
        let Some(param) = self.data_available else {
            return;
        };
        let scans = self.info.scan_count();
        if scans >= self.next_event_scan {
            self.events.fire(DaqEventType::ON_DATA_AVAILABLE, scans);
            while self.next_event_scan <= scans {
                self.next_event_scan += param;
            }
        }
    }

    /// Device-reported error, if any. Only meaningful once armed.
    fn check_hardware(&self) -> Result<bool> {
        if !self.control.armed() {
            return Ok(true);
        }
        let status = self.strategy.query_hw_status()?;
        match status.error {
            Some(e) => Err(e),
            None => Ok(status.running),
        }
    }

    fn run_input(&mut self) -> Result<Outcome> {
        let endpoint = self.strategy.endpoint();
        let mut stage = vec![0u8; self.stage_size];

        while !self.control.stopping() {
            let want = match self.info.remaining() {
                usize::MAX => stage.len(),
                remaining => stage.len().min(remaining * self.info.sample_size),
            };

            match self.transport.bulk_in(endpoint, &mut stage[..want], self.bulk_timeout) {
                Ok(0) => continue,
                Ok(n) => {
                    if self.control.stopping() {
                        break;
                    }
                    let bytes = &stage[..n];
                    let stored = match self.info.sample_size {
                        2 => convert_input::<u16>(
                            &mut self.pipeline,
                            &mut self.info,
                            &self.target,
                            self.strategy.as_ref(),
                            bytes,
                        ),
                        8 => convert_input::<u64>(
                            &mut self.pipeline,
                            &mut self.info,
                            &self.target,
                            self.strategy.as_ref(),
                            bytes,
                        ),
                        _ => convert_input::<u32>(
                            &mut self.pipeline,
                            &mut self.info,
                            &self.target,
                            self.strategy.as_ref(),
                            bytes,
                        ),
                    };
                    trace!(
                        scan = self.name,
                        bytes = n,
                        stored,
                        total = self.info.total_sample_transferred,
                        "Input stage"
                    );
                    self.publish();
                    self.fire_data_available();
                    if self.info.all_samples_transferred {
                        return Ok(Outcome::Completed);
                    }
                }
                Err(UlError::TimedOut) => {
                    self.check_hardware()?;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(Outcome::Stopped)
    }

    /// Fill one stage from the caller buffer. Returns the byte count.
    pub(crate) fn fill_stage(&mut self, stage: &mut [u8]) -> usize {
        match self.info.sample_size {
            2 => fill_output::<u16>(&mut self.pipeline, &mut self.info, &self.target, stage),
            8 => fill_output::<u64>(&mut self.pipeline, &mut self.info, &self.target, stage),
            _ => fill_output::<u32>(&mut self.pipeline, &mut self.info, &self.target, stage),
        }
    }

    /// Write one stage before the hardware starts so the FIFO is not empty
    /// when the pacer begins.
    pub(crate) fn prime(&mut self) -> Result<()> {
        let mut stage = vec![0u8; self.stage_size];
        let n = self.fill_stage(&mut stage);
        self.write_all(&stage[..n])?;
        self.publish();
        trace!(scan = self.name, bytes = n, "Primed output FIFO");
        Ok(())
    }

    fn write_all(&self, data: &[u8]) -> Result<()> {
        let endpoint = self.strategy.endpoint();
        let mut sent = 0;
        while sent < data.len() {
            if self.control.stopping() {
                break;
            }
            match self.transport.bulk_out(endpoint, &data[sent..], self.bulk_timeout) {
                Ok(n) => sent += n,
                Err(UlError::TimedOut) => {
                    self.check_hardware()?;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn run_output(&mut self) -> Result<Outcome> {
        let mut stage = vec![0u8; self.stage_size];

        while !self.control.stopping() {
            if self.info.all_samples_transferred {
                // everything is in the device; wait for it to drain
                if !self.check_hardware()? {
                    return Ok(Outcome::Completed);
                }
                thread::sleep(self.poll_interval);
                continue;
            }

            let n = self.fill_stage(&mut stage);
            self.write_all(&stage[..n])?;
            trace!(
                scan = self.name,
                bytes = n,
                total = self.info.total_sample_transferred,
                "Output stage"
            );
            self.publish();
        }
        Ok(Outcome::Stopped)
    }
}
