//! Trigger configuration.

use crate::error::{Result, UlError};
use crate::types::{ScanOption, TriggerType};

/// Trigger parameters of one subsystem direction. Replaced wholesale by each
/// `*_set_trigger` call and read when a scan is armed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriggerConfig {
    /// Trigger condition
    pub trig_type: TriggerType,
    /// Source channel for analog or pattern triggers
    pub trig_chan: u32,
    /// Threshold (volts) or pattern
    pub level: f64,
    /// Hysteresis (volts) or pattern mask
    pub variance: f64,
    /// Samples per trigger with `SO_RETRIGGER` (0 = whole scan)
    pub retrig_count: u32,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            trig_type: TriggerType::POS_EDGE,
            trig_chan: 0,
            level: 0.0,
            variance: 0.0,
            retrig_count: 0,
        }
    }
}

impl TriggerConfig {
    /// Validate against the trigger types a subsystem supports.
    pub fn validate(&self, supported: TriggerType) -> Result<()> {
        if !self.trig_type.is_single() || !supported.contains(self.trig_type) {
            return Err(UlError::BadTrigType);
        }
        if !self.level.is_finite() || !self.variance.is_finite() {
            return Err(UlError::BadTrigLevel);
        }
        Ok(())
    }

    /// True for level-sensitive triggers, which cannot re-arm.
    pub fn is_level(&self) -> bool {
        self.trig_type
            .intersects(TriggerType::HIGH | TriggerType::LOW | TriggerType::ABOVE | TriggerType::BELOW)
    }
}

/// Retrigger checks applied at scan start.
///
/// `SO_RETRIGGER` needs `SO_EXTTRIGGER`, an edge trigger, and a retrigger
/// count that is a whole number of scans no larger than the scan itself.
pub fn check_retrigger(
    options: ScanOption,
    trigger: &TriggerConfig,
    chan_count: usize,
    samples_per_chan: usize,
) -> Result<()> {
    if !options.contains(ScanOption::RETRIGGER) {
        return Ok(());
    }
    if !options.contains(ScanOption::EXTTRIGGER) {
        return Err(UlError::BadOption);
    }
    if trigger.is_level() {
        return Err(UlError::BadRetrigTrigType);
    }
    let count = trigger.retrig_count as usize;
    if count == 0 {
        return Ok(());
    }
    let total = samples_per_chan * chan_count;
    if count % chan_count.max(1) != 0
        || (!options.contains(ScanOption::CONTINUOUS) && count > total)
    {
        return Err(UlError::BadRetrigCount);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate() {
        let supported = TriggerType::POS_EDGE | TriggerType::NEG_EDGE;
        let mut trig = TriggerConfig::default();
        assert!(trig.validate(supported).is_ok());

        trig.trig_type = TriggerType::HIGH;
        assert_eq!(trig.validate(supported), Err(UlError::BadTrigType));

        trig.trig_type = TriggerType::POS_EDGE | TriggerType::NEG_EDGE;
        assert_eq!(trig.validate(supported), Err(UlError::BadTrigType));

        trig.trig_type = TriggerType::NEG_EDGE;
        trig.level = f64::NAN;
        assert_eq!(trig.validate(supported), Err(UlError::BadTrigLevel));
    }

    #[test]
    fn test_retrigger() {
        let opts = ScanOption::EXTTRIGGER | ScanOption::RETRIGGER;
        let mut trig = TriggerConfig {
            retrig_count: 8,
            ..Default::default()
        };
        assert!(check_retrigger(opts, &trig, 4, 10).is_ok());
        assert_eq!(
            check_retrigger(ScanOption::RETRIGGER, &trig, 4, 10),
            Err(UlError::BadOption)
        );

        trig.retrig_count = 6;
        assert_eq!(
            check_retrigger(opts, &trig, 4, 10),
            Err(UlError::BadRetrigCount)
        );

        trig.retrig_count = 80;
        assert_eq!(
            check_retrigger(opts, &trig, 4, 10),
            Err(UlError::BadRetrigCount)
        );

        trig.retrig_count = 8;
        trig.trig_type = TriggerType::HIGH;
        assert_eq!(
            check_retrigger(opts, &trig, 4, 10),
            Err(UlError::BadRetrigTrigType)
        );
    }
}
