//! USB-1808 pulse timers.

use std::sync::Arc;

use super::scan::trigger_code;
use super::{CLOCK_FREQ, MAX_PACER_PERIOD};
use crate::device::{CmdKey, DeviceCore, TmrInfo};
use crate::endian::write_u32_le;
use crate::error::{Result, UlError};
use crate::subsystem::{PulseOutSettings, TmrBackend};
use crate::trigger::TriggerConfig;
use crate::types::{PulseOutOption, TmrIdleState, TmrStatus, TriggerType};

/// Pulse timers.
pub const NUM_TMRS: u32 = 2;

const CTL_ENABLE: u8 = 0x01;
const CTL_IDLE_HIGH: u8 = 0x02;
const CTL_EXT_TRIGGER: u8 = 0x04;
const CTL_RETRIGGER: u8 = 0x08;

/// Timer capabilities.
pub fn info() -> TmrInfo {
    TmrInfo {
        num_tmrs: NUM_TMRS,
        clock_freq: CLOCK_FREQ,
        min_frequency: CLOCK_FREQ / MAX_PACER_PERIOD as f64,
        max_frequency: CLOCK_FREQ / 2.0,
        max_initial_delay: f64::from(u32::MAX) / CLOCK_FREQ,
        options: PulseOutOption::EXTTRIGGER | PulseOutOption::RETRIGGER,
        trigger_types: TriggerType::POS_EDGE | TriggerType::NEG_EDGE | TriggerType::HIGH | TriggerType::LOW,
    }
}

fn register(value: u64) -> Result<u32> {
    u32::try_from(value).map_err(|_| UlError::BadArg)
}

fn control_byte(settings: &PulseOutSettings) -> u8 {
    let mut ctl = CTL_ENABLE;
    if settings.idle_state == TmrIdleState::High {
        ctl |= CTL_IDLE_HIGH;
    }
    if settings.options.contains(PulseOutOption::EXTTRIGGER) {
        ctl |= CTL_EXT_TRIGGER;
    }
    if settings.options.contains(PulseOutOption::RETRIGGER) {
        ctl |= CTL_RETRIGGER;
    }
    ctl
}

/// Timer backend.
pub struct Usb1808Tmr {
    core: Arc<DeviceCore>,
}

impl Usb1808Tmr {
    /// Backend over `core`.
    pub fn new(core: Arc<DeviceCore>) -> Self {
        Self { core }
    }
}

impl TmrBackend for Usb1808Tmr {
    fn start(&self, tmr: u32, settings: &PulseOutSettings, trigger: &TriggerConfig) -> Result<()> {
        let mut params = [0u8; 16];
        write_u32_le(&mut params, 0, register(settings.period - 1)?)?;
        write_u32_le(&mut params, 4, register(settings.pulse_width - 1)?)?;
        write_u32_le(&mut params, 8, register(settings.pulse_count)?)?;
        write_u32_le(&mut params, 12, register(settings.delay)?)?;
        self.core
            .send_cmd(CmdKey::TimerParameters, 0, tmr as u16, &params)?;

        if settings.options.contains(PulseOutOption::EXTTRIGGER) {
            self.core
                .send_cmd(CmdKey::TriggerConfig, 0, 0, &[trigger_code(trigger.trig_type)?])?;
        }
        self.core
            .send_cmd(CmdKey::TimerControl, 0, tmr as u16, &[control_byte(settings)])
    }

    fn stop(&self, tmr: u32) -> Result<()> {
        self.core.send_cmd(CmdKey::TimerControl, 0, tmr as u16, &[0])
    }

    fn status(&self, tmr: u32) -> Result<TmrStatus> {
        let reply = self.core.query_exact(CmdKey::TimerControl, 0, tmr as u16, 1)?;
        Ok(if reply[0] & CTL_ENABLE != 0 {
            TmrStatus::Running
        } else {
            TmrStatus::Idle
        })
    }
}
