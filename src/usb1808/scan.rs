//! Scan strategies shared by every function of one direction.

use std::sync::Arc;

use tracing::{debug, trace};

use super::{STATUS_AIN_OVERRUN, STATUS_AIN_RUNNING, STATUS_AOUT_RUNNING, STATUS_AOUT_UNDERRUN};
use crate::device::{CmdKey, DeviceCore};
use crate::endian::{read_u16_le, write_u16_le, write_u32_le};
use crate::error::{Result, UlError};
use crate::scan::{HwStatus, ScanStrategy};
use crate::timing::PacerSetting;
use crate::transport::{EP_SCAN_IN, EP_SCAN_OUT};
use crate::trigger::TriggerConfig;
use crate::types::{ScanOption, TriggerType};

const OPT_BURST: u8 = 0x01;
const OPT_CONTINUOUS: u8 = 0x02;
const OPT_EXT_TRIGGER: u8 = 0x04;
const OPT_RETRIGGER: u8 = 0x08;
const OPT_PACER_OUT: u8 = 0x10;

pub(crate) const MASK_DIO_IN: u16 = 1 << 8;
pub(crate) const MASK_CTR_SHIFT: u32 = 9;
pub(crate) const MASK_DIO_OUT: u8 = 1 << 2;

fn option_bits(options: ScanOption) -> u8 {
    let mut bits = 0;
    if options.contains(ScanOption::BURSTIO) {
        bits |= OPT_BURST;
    }
    if options.contains(ScanOption::CONTINUOUS) {
        bits |= OPT_CONTINUOUS;
    }
    if options.contains(ScanOption::EXTTRIGGER) {
        bits |= OPT_EXT_TRIGGER;
    }
    if options.contains(ScanOption::RETRIGGER) {
        bits |= OPT_RETRIGGER;
    }
    if options.contains(ScanOption::PACEROUT) {
        bits |= OPT_PACER_OUT;
    }
    bits
}

pub(crate) fn trigger_code(trig_type: TriggerType) -> Result<u8> {
    match trig_type {
        TriggerType::POS_EDGE => Ok(0),
        TriggerType::NEG_EDGE => Ok(1),
        TriggerType::HIGH => Ok(2),
        TriggerType::LOW => Ok(3),
        _ => Err(UlError::BadTrigType),
    }
}

/// Count, retrigger count and pacer register shared by both directions.
#[derive(Debug, Clone, Copy)]
struct Timing {
    count: u32,
    retrig: u32,
    period: u32,
    options: u8,
}

impl Timing {
    fn new(samples_per_chan: usize, pacer: PacerSetting, options: ScanOption, trigger: &TriggerConfig) -> Result<Self> {
        let count = if options.contains(ScanOption::CONTINUOUS) {
            0
        } else {
            u32::try_from(samples_per_chan).map_err(|_| UlError::BadSampleCount)?
        };
        let retrig = if options.contains(ScanOption::RETRIGGER) {
            trigger.retrig_count
        } else {
            0
        };
        let period = u32::try_from(pacer.period.saturating_sub(1)).map_err(|_| UlError::BadRate)?;
        Ok(Self {
            count,
            retrig,
            period,
            options: option_bits(options),
        })
    }

    fn encode(&self, buf: &mut [u8]) -> Result<()> {
        write_u32_le(buf, 0, self.count)?;
        write_u32_le(buf, 4, self.retrig)?;
        write_u32_le(buf, 8, self.period)
    }
}

fn send_trigger(core: &DeviceCore, options: ScanOption, trigger: &TriggerConfig) -> Result<()> {
    if !options.contains(ScanOption::EXTTRIGGER) {
        return Ok(());
    }
    let code = trigger_code(trigger.trig_type)?;
    let _guard = core.trigger_lock();
    core.send_cmd(CmdKey::TriggerConfig, 0, 0, &[code])
}

fn status_word(core: &DeviceCore) -> Result<u16> {
    let reply = core.query_exact(CmdKey::Status, 0, 0, 2)?;
    read_u16_le(&reply, 0)
}

/// Input scan over any mix of analog channels, the digital port and counters.
pub struct InScanStrategy {
    core: Arc<DeviceCore>,
    mask: u16,
    ai_config: Option<Vec<u8>>,
    clear_counters: Vec<u32>,
    timing: Timing,
    options: ScanOption,
    trigger: TriggerConfig,
}

impl InScanStrategy {
    pub(crate) fn new(
        core: Arc<DeviceCore>,
        mask: u16,
        ai_config: Option<Vec<u8>>,
        clear_counters: Vec<u32>,
        samples_per_chan: usize,
        pacer: PacerSetting,
        options: ScanOption,
        trigger: TriggerConfig,
    ) -> Result<Self> {
        if mask == 0 {
            return Err(UlError::BadNumChans);
        }
        let timing = Timing::new(samples_per_chan, pacer, options, &trigger)?;
        Ok(Self {
            core,
            mask,
            ai_config,
            clear_counters,
            timing,
            options,
            trigger,
        })
    }

    /// Channel mask sent with the start command.
    pub fn mask(&self) -> u16 {
        self.mask
    }
}

impl ScanStrategy for InScanStrategy {
    fn endpoint(&self) -> u8 {
        EP_SCAN_IN
    }

    fn encode_channel_config(&self) -> Result<()> {
        if let Some(config) = &self.ai_config {
            self.core.send_cmd(CmdKey::AInConfig, 0, 0, config)?;
        }
        for ctr in &self.clear_counters {
            self.core.send_cmd(CmdKey::Counter, 0, *ctr as u16, &[0; 4])?;
        }
        Ok(())
    }

    fn clear_fifo(&self) -> Result<()> {
        self.core.send_cmd(CmdKey::AInClearFifo, 0, 0, &[])
    }

    fn arm_scan(&self) -> Result<()> {
        send_trigger(&self.core, self.options, &self.trigger)?;
        let packet = (self.core.transport().max_packet_size(EP_SCAN_IN) / 4).clamp(1, 255) as u8;
        let mut payload = [0u8; 16];
        self.timing.encode(&mut payload)?;
        write_u16_le(&mut payload, 12, self.mask)?;
        payload[14] = packet - 1;
        payload[15] = self.timing.options;
        debug!(mask = self.mask, period = self.timing.period, count = self.timing.count, "Arming input scan");
        self.core.send_cmd(CmdKey::AInScanStart, 0, 0, &payload)
    }

    fn disarm_scan(&self) -> Result<()> {
        self.core.send_cmd(CmdKey::AInScanStop, 0, 0, &[])
    }

    fn query_hw_status(&self) -> Result<HwStatus> {
        let status = status_word(&self.core)?;
        trace!(status, "Input status");
        Ok(HwStatus {
            running: status & STATUS_AIN_RUNNING != 0,
            error: (status & STATUS_AIN_OVERRUN != 0).then_some(UlError::Overrun),
        })
    }
}

/// Output scan over the analog outputs and the digital port.
pub struct OutScanStrategy {
    core: Arc<DeviceCore>,
    mask: u8,
    timing: Timing,
    options: ScanOption,
    trigger: TriggerConfig,
}

impl OutScanStrategy {
    pub(crate) fn new(
        core: Arc<DeviceCore>,
        mask: u8,
        samples_per_chan: usize,
        pacer: PacerSetting,
        options: ScanOption,
        trigger: TriggerConfig,
    ) -> Result<Self> {
        if mask == 0 {
            return Err(UlError::BadNumChans);
        }
        let timing = Timing::new(samples_per_chan, pacer, options, &trigger)?;
        Ok(Self {
            core,
            mask,
            timing,
            options,
            trigger,
        })
    }

    /// Channel mask sent with the start command.
    pub fn mask(&self) -> u8 {
        self.mask
    }
}

impl ScanStrategy for OutScanStrategy {
    fn endpoint(&self) -> u8 {
        EP_SCAN_OUT
    }

    fn encode_channel_config(&self) -> Result<()> {
        Ok(())
    }

    fn clear_fifo(&self) -> Result<()> {
        self.core.send_cmd(CmdKey::AOutClearFifo, 0, 0, &[])
    }

    fn arm_scan(&self) -> Result<()> {
        send_trigger(&self.core, self.options, &self.trigger)?;
        let mut payload = [0u8; 14];
        self.timing.encode(&mut payload)?;
        payload[12] = self.mask;
        payload[13] = self.timing.options;
        debug!(mask = self.mask, period = self.timing.period, count = self.timing.count, "Arming output scan");
        self.core.send_cmd(CmdKey::AOutScanStart, 0, 0, &payload)
    }

    fn disarm_scan(&self) -> Result<()> {
        self.core.send_cmd(CmdKey::AOutScanStop, 0, 0, &[])
    }

    fn query_hw_status(&self) -> Result<HwStatus> {
        let status = status_word(&self.core)?;
        trace!(status, "Output status");
        Ok(HwStatus {
            running: status & STATUS_AOUT_RUNNING != 0,
            error: (status & STATUS_AOUT_UNDERRUN != 0).then_some(UlError::Underrun),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_bits() {
        assert_eq!(option_bits(ScanOption::DEFAULTIO), 0);
        assert_eq!(
            option_bits(ScanOption::CONTINUOUS | ScanOption::EXTTRIGGER),
            OPT_CONTINUOUS | OPT_EXT_TRIGGER
        );
        assert_eq!(option_bits(ScanOption::BURSTIO | ScanOption::RETRIGGER), OPT_BURST | OPT_RETRIGGER);
    }

    #[test]
    fn test_timing_registers() {
        let pacer = PacerSetting {
            period: 100_000,
            actual_rate: 1000.0,
        };
        let t = Timing::new(500, pacer, ScanOption::DEFAULTIO, &TriggerConfig::default()).unwrap();
        assert_eq!((t.count, t.period, t.retrig), (500, 99_999, 0));

        let t = Timing::new(500, pacer, ScanOption::CONTINUOUS, &TriggerConfig::default()).unwrap();
        assert_eq!(t.count, 0);

        let ext = PacerSetting {
            period: 0,
            actual_rate: 1000.0,
        };
        let t = Timing::new(10, ext, ScanOption::EXTCLOCK, &TriggerConfig::default()).unwrap();
        assert_eq!(t.period, 0);
    }

    #[test]
    fn test_max_period_fits_register() {
        let pacer = PacerSetting {
            period: super::super::MAX_PACER_PERIOD,
            actual_rate: 0.0233,
        };
        let t = Timing::new(1, pacer, ScanOption::DEFAULTIO, &TriggerConfig::default()).unwrap();
        assert_eq!(t.period, u32::MAX);
    }

    #[test]
    fn test_trigger_codes() {
        assert_eq!(trigger_code(TriggerType::POS_EDGE), Ok(0));
        assert_eq!(trigger_code(TriggerType::LOW), Ok(3));
        assert_eq!(trigger_code(TriggerType::RISING), Err(UlError::BadTrigType));
    }
}
