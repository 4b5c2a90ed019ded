//! Pulse timer subsystem.
//!
//! Timers are not scanned; they run on their own once started. Requested
//! frequency, duty cycle and delay are quantized to the timer clock and the
//! achievable values are handed back to the caller.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::device::{DeviceCore, TmrInfo};
use crate::error::{Result, UlError};
use crate::trigger::TriggerConfig;
use crate::types::{PulseOutOption, TmrIdleState, TmrStatus, TriggerType};

/// Register values for one pulse train, in timer clock ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseOutSettings {
    /// Ticks per period, at least 2
    pub period: u64,
    /// Ticks the output is active, in `[1, period - 1]`
    pub pulse_width: u64,
    /// Pulses to generate; 0 runs until stopped
    pub pulse_count: u64,
    /// Ticks before the first pulse
    pub delay: u64,
    /// Output level while idle
    pub idle_state: TmrIdleState,
    /// Trigger options
    pub options: PulseOutOption,
}

/// Achievable values of a started pulse train.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PulseOutActual {
    /// Frequency in Hz
    pub frequency: f64,
    /// Fraction of the period the output is active
    pub duty_cycle: f64,
    /// Delay before the first pulse in seconds
    pub initial_delay: f64,
}

/// Family-specific timer operations.
pub trait TmrBackend: Send + Sync {
    /// Program and enable a timer.
    fn start(&self, tmr: u32, settings: &PulseOutSettings, trigger: &TriggerConfig) -> Result<()>;

    /// Disable a timer.
    fn stop(&self, tmr: u32) -> Result<()>;

    /// Running or idle.
    fn status(&self, tmr: u32) -> Result<TmrStatus>;
}

/// Pulse timer subsystem of one device.
pub struct TmrDevice {
    core: Arc<DeviceCore>,
    info: TmrInfo,
    backend: Arc<dyn TmrBackend>,
    trigger: RwLock<TriggerConfig>,
}

impl TmrDevice {
    /// Subsystem over `backend`.
    pub fn new(core: Arc<DeviceCore>, info: TmrInfo, backend: Arc<dyn TmrBackend>) -> Self {
        debug!(timers = info.num_tmrs, clock = info.clock_freq, "Created timer subsystem");
        Self {
            core,
            info,
            backend,
            trigger: RwLock::new(TriggerConfig::default()),
        }
    }

    /// Capabilities.
    pub fn info(&self) -> &TmrInfo {
        &self.info
    }

    fn check_tmr(&self, tmr: u32) -> Result<()> {
        if tmr >= self.info.num_tmrs {
            return Err(UlError::BadTmr);
        }
        Ok(())
    }

    /// Quantize a request to timer ticks.
    pub fn settings_for(
        &self,
        frequency: f64,
        duty_cycle: f64,
        pulse_count: u64,
        initial_delay: f64,
        idle_state: TmrIdleState,
        options: PulseOutOption,
    ) -> Result<(PulseOutSettings, PulseOutActual)> {
        if !frequency.is_finite()
            || frequency < self.info.min_frequency
            || frequency > self.info.max_frequency
        {
            return Err(UlError::BadFrequency);
        }
        if !(duty_cycle > 0.0 && duty_cycle < 1.0) {
            return Err(UlError::BadDutyCycle);
        }
        if !(initial_delay >= 0.0 && initial_delay <= self.info.max_initial_delay) {
            return Err(UlError::BadInitialDelay);
        }
        if !self.info.options.contains(options) {
            return Err(UlError::BadOption);
        }

        let clock = self.info.clock_freq;
        let period = ((clock / frequency).round() as u64).max(2);
        let pulse_width = ((period as f64 * duty_cycle).round() as u64).clamp(1, period - 1);
        let delay = (initial_delay * clock).round() as u64;

        let settings = PulseOutSettings {
            period,
            pulse_width,
            pulse_count,
            delay,
            idle_state,
            options,
        };
        let actual = PulseOutActual {
            frequency: clock / period as f64,
            duty_cycle: pulse_width as f64 / period as f64,
            initial_delay: delay as f64 / clock,
        };
        Ok((settings, actual))
    }

    /// Start a pulse train. Returns the achievable frequency, duty cycle and
    /// initial delay.
    pub fn pulse_out_start(
        &self,
        tmr: u32,
        frequency: f64,
        duty_cycle: f64,
        pulse_count: u64,
        initial_delay: f64,
        idle_state: TmrIdleState,
        options: PulseOutOption,
    ) -> Result<PulseOutActual> {
        self.check_tmr(tmr)?;
        let (settings, actual) =
            self.settings_for(frequency, duty_cycle, pulse_count, initial_delay, idle_state, options)?;
        self.core.check_connected()?;

        let trigger = *self.trigger.read();
        {
            let _guard = self.core.trigger_lock();
            self.backend.start(tmr, &settings, &trigger)?;
        }
        info!(
            tmr,
            frequency = actual.frequency,
            duty_cycle = actual.duty_cycle,
            pulse_count,
            "Started pulse output"
        );
        Ok(actual)
    }

    /// Stop a pulse train. Stopping an idle timer is not an error.
    pub fn pulse_out_stop(&self, tmr: u32) -> Result<()> {
        self.check_tmr(tmr)?;
        self.core.check_connected()?;
        self.backend.stop(tmr)?;
        debug!(tmr, "Stopped pulse output");
        Ok(())
    }

    /// Running or idle.
    pub fn pulse_out_status(&self, tmr: u32) -> Result<TmrStatus> {
        self.check_tmr(tmr)?;
        self.core.check_connected()?;
        self.backend.status(tmr)
    }

    /// Set the trigger used by pulse trains started with `EXTTRIGGER`.
    pub fn set_trigger(
        &self,
        trig_type: TriggerType,
        trig_chan: u32,
        level: f64,
        variance: f64,
        retrig_count: u32,
    ) -> Result<()> {
        let trigger = TriggerConfig {
            trig_type,
            trig_chan,
            level,
            variance,
            retrig_count,
        };
        trigger.validate(self.info.trigger_types)?;
        let _guard = self.core.trigger_lock();
        *self.trigger.write() = trigger;
        Ok(())
    }

    pub(crate) fn stop_all(&self) {
        if !self.core.is_connected() {
            return;
        }
        for tmr in 0..self.info.num_tmrs {
            if let Err(e) = self.backend.stop(tmr) {
                warn!(tmr, error = %e, "Timer stop failed");
            }
        }
    }
}
