//! Generic background scan engine.
//!
//! One [`ScanEngine`] exists per hardware data path (input or output). A
//! subsystem starts a scan by handing the engine a [`ScanPlan`], a
//! family-specific [`ScanStrategy`] and the caller's buffer:
//!
//! ```text
//!   start ─► encode_channel_config ─► clear_fifo ─► [prime FIFO] ─► spawn worker ─► arm_scan
//!                                                                                    │
//!        SS_IDLE ◄── stop / error / finite completion ◄──── SS_RUNNING ◄─────────────┘
//! ```
//!
//! The worker publishes progress over a `watch` channel; `status` and `wait`
//! read the latest snapshot and reap the worker once it has finished.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::buffer::ScanTarget;
use super::info::ScanInfo;
use super::pipeline::{ChannelConversion, CjcSource, Pipeline};
use super::transfer::{ScanControl, ScanProgress, TransferWorker};
use crate::config::UlConfig;
use crate::error::{Result, UlError};
use crate::events::EventHub;
use crate::timing::{stage_size, StageRequest, TransferMode};
use crate::transport::UsbTransport;
use crate::types::{FunctionType, ScanOption, ScanStatus, TransferStatus, WaitType};

/// Data direction of an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Device to host
    Input,
    /// Host to device
    Output,
}

/// Scan state reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HwStatus {
    /// The pacer is running
    pub running: bool,
    /// Overrun, underrun or similar fault latched by the device
    pub error: Option<UlError>,
}

/// Family-specific commands behind one scan.
///
/// An instance is built per scan and captures everything the family needs to
/// arm the hardware (pacer period, channel mask, trigger).
pub trait ScanStrategy: Send + Sync {
    /// Bulk endpoint the data moves through.
    fn endpoint(&self) -> u8;

    /// Load channel, range and queue configuration.
    fn encode_channel_config(&self) -> Result<()>;

    /// Discard stale FIFO contents.
    fn clear_fifo(&self) -> Result<()>;

    /// Start the pacer.
    fn arm_scan(&self) -> Result<()>;

    /// Stop the pacer.
    fn disarm_scan(&self) -> Result<()>;

    /// Normalize a wire word of channel `chan` before conversion.
    fn decode_raw_sample(&self, _chan: usize, raw: u64) -> u64 {
        raw
    }

    /// Read the device's scan status.
    fn query_hw_status(&self) -> Result<HwStatus>;
}

/// Everything the engine needs to run one scan.
pub struct ScanPlan {
    /// Owning function
    pub function: FunctionType,
    /// Channels per scan
    pub chan_count: usize,
    /// Scans to run (ring size when continuous)
    pub samples_per_chan: usize,
    /// Achievable per-channel rate
    pub rate: f64,
    /// Scan options
    pub options: ScanOption,
    /// Wire bytes per sample: 2, 4 or 8
    pub sample_size: usize,
    /// Conversion of each channel, in scan order
    pub conversions: Vec<ChannelConversion>,
    /// CJC source for thermocouple channels
    pub cjc: Option<Arc<dyn CjcSource>>,
}

/// Result of a status query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusSnapshot {
    /// Running or idle
    pub status: ScanStatus,
    /// Cursor snapshot
    pub transfer: TransferStatus,
    /// Error that ended the scan, reported once
    pub error: Option<UlError>,
}

impl StatusSnapshot {
    fn idle(transfer: TransferStatus) -> Self {
        Self {
            status: ScanStatus::Idle,
            transfer,
            error: None,
        }
    }

    /// `Err` with the scan error, otherwise the status pair.
    pub fn into_result(self) -> Result<(ScanStatus, TransferStatus)> {
        match self.error {
            Some(e) => Err(e),
            None => Ok((self.status, self.transfer)),
        }
    }
}

struct ActiveScan {
    owner: FunctionType,
    strategy: Arc<dyn ScanStrategy>,
    control: Arc<ScanControl>,
    worker: Option<JoinHandle<()>>,
    worker_id: ThreadId,
    progress: watch::Receiver<ScanProgress>,
}

impl ActiveScan {
    fn latest(&self) -> ScanProgress {
        *self.progress.borrow()
    }

    fn on_worker_thread(&self) -> bool {
        thread::current().id() == self.worker_id
    }

    fn join(&mut self) {
        if self.on_worker_thread() {
            return;
        }
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                error!(owner = ?self.owner, "Transfer worker panicked");
            }
        }
    }
}

/// Background scan state machine for one data path.
pub struct ScanEngine {
    name: &'static str,
    direction: Direction,
    transport: Arc<dyn UsbTransport>,
    events: Arc<EventHub>,
    config: UlConfig,
    slot: Mutex<Option<ActiveScan>>,
    teardown: Mutex<()>,
    last: Mutex<Option<(FunctionType, TransferStatus)>>,
}

impl ScanEngine {
    /// Idle engine.
    pub fn new(
        name: &'static str,
        direction: Direction,
        transport: Arc<dyn UsbTransport>,
        events: Arc<EventHub>,
        config: UlConfig,
    ) -> Self {
        Self {
            name,
            direction,
            transport,
            events,
            config,
            slot: Mutex::new(None),
            teardown: Mutex::new(()),
            last: Mutex::new(None),
        }
    }

    /// Engine name used in logs and thread names.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Data direction.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// True while any function's scan is running on this path.
    pub fn is_busy(&self) -> bool {
        self.slot
            .lock()
            .as_ref()
            .is_some_and(|active| !active.latest().finished)
    }

    /// Function owning the running scan.
    pub fn owner(&self) -> Option<FunctionType> {
        self.slot
            .lock()
            .as_ref()
            .filter(|active| !active.latest().finished)
            .map(|active| active.owner)
    }

    /// Start a scan. Returns the achievable rate from the plan.
    ///
    /// A failing hardware start tears the half-started scan down before the
    /// error is returned.
    pub fn start(
        &self,
        plan: ScanPlan,
        strategy: Arc<dyn ScanStrategy>,
        target: ScanTarget,
    ) -> Result<f64> {
        let _teardown = self.teardown.lock();
        self.reap_finished()?;

        strategy.encode_channel_config()?;
        strategy.clear_fifo()?;

        let endpoint = strategy.endpoint();
        let recycle = plan.options.contains(ScanOption::CONTINUOUS);
        let total_bytes = plan.samples_per_chan * plan.chan_count * plan.sample_size;
        let mode = TransferMode::select(
            plan.options,
            plan.rate,
            self.config.scan.single_io_rate_threshold,
        );
        let stage = stage_size(
            &StageRequest {
                rate: plan.rate,
                chan_count: plan.chan_count,
                sample_size: plan.sample_size,
                max_packet_size: self.transport.max_packet_size(endpoint),
                total_bytes: (!recycle).then_some(total_bytes),
                mode,
            },
            &self.config.transfer,
        );
        // whole words only
        let stage = (stage / plan.sample_size).max(1) * plan.sample_size;

        let mut pipeline = Pipeline::new(plan.conversions);
        if let Some(source) = plan.cjc {
            let refresh = self.config.scan.cjc_refresh_secs * plan.rate * plan.chan_count as f64;
            pipeline = pipeline.with_cjc(source, refresh.round().max(1.0) as u64);
        }

        let (tx, rx) = watch::channel(ScanProgress::STARTING);
        let control = Arc::new(ScanControl::default());
        let mut worker = TransferWorker {
            name: self.name,
            direction: self.direction,
            transport: Arc::clone(&self.transport),
            strategy: Arc::clone(&strategy),
            events: Arc::clone(&self.events),
            control: Arc::clone(&control),
            progress: tx,
            info: ScanInfo::new(
                plan.function,
                plan.chan_count,
                plan.samples_per_chan,
                plan.sample_size,
                recycle,
            ),
            pipeline,
            target,
            stage_size: stage,
            bulk_timeout: self.config.transfer.bulk_timeout(),
            poll_interval: self.config.scan.wait_poll_interval(),
            data_available: self
                .events
                .data_available_threshold()
                .filter(|_| self.direction == Direction::Input),
            next_event_scan: self.events.data_available_threshold().unwrap_or(0),
        };

        if self.direction == Direction::Output {
            worker.prime()?;
        }

        let handle = thread::Builder::new()
            .name(format!("uldaq-{}-xfer", self.name))
            .spawn(move || worker.run())
            .map_err(|e| {
                error!(error = %e, "Failed to spawn transfer worker");
                UlError::Internal
            })?;

        let worker_id = handle.thread().id();
        *self.slot.lock() = Some(ActiveScan {
            owner: plan.function,
            strategy: Arc::clone(&strategy),
            control: Arc::clone(&control),
            worker: Some(handle),
            worker_id,
            progress: rx,
        });

        if let Err(e) = strategy.arm_scan() {
            error!(scan = self.name, error = %e, "Hardware start failed");
            let active = self.slot.lock().take();
            if let Some(active) = active {
                // the start error is what the caller sees
                if let Err(stop_err) = self.shutdown(active) {
                    warn!(scan = self.name, error = %stop_err, "Teardown after failed start reported an error");
                }
            }
            return Err(e);
        }
        control.armed.store(true, Ordering::SeqCst);

        info!(
            scan = self.name,
            function = ?plan.function,
            chans = plan.chan_count,
            samples_per_chan = plan.samples_per_chan,
            rate = plan.rate,
            options = ?plan.options,
            stage_size = stage,
            "Started scan"
        );
        Ok(plan.rate)
    }

    /// Drop a finished scan so a new one may start.
    fn reap_finished(&self) -> Result<()> {
        let finished = {
            let mut slot = self.slot.lock();
            match slot.as_ref() {
                Some(active) if !active.latest().finished => return Err(UlError::AlreadyActive),
                Some(_) => slot.take(),
                None => None,
            }
        };
        if let Some(mut active) = finished {
            active.join();
            *self.last.lock() = Some((active.owner, active.latest().transfer));
        }
        Ok(())
    }

    fn shutdown(&self, mut active: ActiveScan) -> Result<()> {
        let progress = active.latest();
        let disarm = if progress.finished {
            Ok(())
        } else {
            active.strategy.disarm_scan()
        };
        if let Err(e) = &disarm {
            warn!(scan = self.name, error = %e, "Stop command failed, tearing down anyway");
        }

        active.control.stop.store(true, Ordering::SeqCst);
        active.join();

        let transfer = active.latest().transfer;
        *self.last.lock() = Some((active.owner, transfer));
        info!(
            scan = self.name,
            function = ?active.owner,
            total = transfer.current_total_count,
            "Stopped scan"
        );
        disarm
    }

    /// Stop `function`'s scan. Stopping an idle function is a no-op.
    ///
    /// The stop command is best effort: the worker is always joined first
    /// and a stop-command failure is returned afterwards.
    pub fn stop(&self, function: FunctionType) -> Result<()> {
        let _teardown = self.teardown.lock();
        let active = {
            let mut slot = self.slot.lock();
            match slot.as_ref() {
                Some(active) if active.owner == function => slot.take(),
                _ => None,
            }
        };
        match active {
            Some(active) => self.shutdown(active),
            None => {
                debug!(scan = self.name, function = ?function, "Stop while idle");
                Ok(())
            }
        }
    }

    /// Stop whatever is running on this path.
    pub fn stop_any(&self) -> Result<()> {
        let owner = self.slot.lock().as_ref().map(|active| active.owner);
        match owner {
            Some(owner) => self.stop(owner),
            None => Ok(()),
        }
    }

    /// Status of `function`'s scan.
    ///
    /// A function that does not own the engine reads as idle. A finished
    /// scan is reaped here and its error is reported exactly once.
    pub fn status(&self, function: FunctionType) -> StatusSnapshot {
        let finished = {
            let mut slot = self.slot.lock();
            match slot.as_ref() {
                Some(active) if active.owner == function => {
                    let progress = active.latest();
                    if !progress.finished {
                        return StatusSnapshot {
                            status: ScanStatus::Running,
                            transfer: progress.transfer,
                            error: None,
                        };
                    }
                    if active.on_worker_thread() {
                        return StatusSnapshot {
                            status: ScanStatus::Idle,
                            transfer: progress.transfer,
                            error: None,
                        };
                    }
                    slot.take()
                }
                _ => None,
            }
        };

        if let Some(mut active) = finished {
            active.join();
            let progress = active.latest();
            *self.last.lock() = Some((active.owner, progress.transfer));
            if let Some(e) = progress.error {
                warn!(scan = self.name, error = %e, "Scan ended with error");
            }
            return StatusSnapshot {
                status: ScanStatus::Idle,
                transfer: progress.transfer,
                error: progress.error,
            };
        }

        match *self.last.lock() {
            Some((owner, transfer)) if owner == function => StatusSnapshot::idle(transfer),
            _ => StatusSnapshot::idle(TransferStatus::EMPTY),
        }
    }

    /// Block until `function`'s scan is no longer running.
    ///
    /// `timeout_secs < 0` waits forever. Returns `ERR_TIMEDOUT` when the
    /// deadline passes first, or the error that ended the scan.
    pub fn wait(&self, function: FunctionType, wait_type: WaitType, timeout_secs: f64) -> Result<()> {
        let WaitType::UntilDone = wait_type;
        let deadline = if timeout_secs < 0.0 {
            None
        } else if timeout_secs.is_finite() {
            Some(Instant::now() + Duration::from_secs_f64(timeout_secs))
        } else {
            return Err(UlError::BadArg);
        };
        let poll = self.config.scan.wait_poll_interval();

        loop {
            let snapshot = self.status(function);
            if snapshot.status == ScanStatus::Idle {
                return snapshot.error.map_or(Ok(()), Err);
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Err(UlError::TimedOut);
            }
            thread::sleep(poll);
        }
    }
}

impl Drop for ScanEngine {
    fn drop(&mut self) {
        if let Some(active) = self.slot.get_mut().take() {
            if let Err(e) = self.shutdown(active) {
                warn!(scan = self.name, error = %e, "Stop on drop failed");
            }
        }
    }
}
