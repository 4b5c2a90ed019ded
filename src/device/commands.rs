//! Logical command keys and per-family wire mappings.

use std::collections::HashMap;

use crate::error::{Result, UlError};

/// Logical device command. Each family maps the keys it implements onto its
/// own vendor request bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmdKey {
    /// Digital direction register
    DTristate,
    /// Digital port input
    DPort,
    /// Digital output latch
    DLatch,
    /// Single analog input read
    AIn,
    /// Start an input scan
    AInScanStart,
    /// Stop an input scan
    AInScanStop,
    /// Analog input channel configuration
    AInConfig,
    /// Load an analog input scan queue
    AInScanQueue,
    /// Clear the input FIFO
    AInClearFifo,
    /// Single analog output write
    AOut,
    /// Start an output scan
    AOutScanStart,
    /// Stop an output scan
    AOutScanStop,
    /// Clear the output FIFO
    AOutClearFifo,
    /// Counter value
    Counter,
    /// Counter options (edge, debounce, tick size)
    CounterOptions,
    /// Counter limit registers
    CounterLimits,
    /// Counter measurement mode
    CounterMode,
    /// Timer enable/disable and status
    TimerControl,
    /// Timer period, width, count and delay
    TimerParameters,
    /// Cold-junction temperatures
    Cjc,
    /// Calibration EEPROM
    MemCal,
    /// User EEPROM
    MemUser,
    /// Settings EEPROM
    MemSettings,
    /// Device status word
    Status,
    /// Blink the LED
    Blink,
    /// Reset the device
    Reset,
    /// Trigger configuration
    TriggerConfig,
}

/// Mapping from [`CmdKey`] to a vendor request byte.
#[derive(Debug, Clone)]
pub struct CommandTable {
    name: &'static str,
    entries: HashMap<CmdKey, u8>,
}

impl CommandTable {
    /// Build a table from `(key, request)` pairs.
    pub fn new(name: &'static str, entries: &[(CmdKey, u8)]) -> Self {
        Self {
            name,
            entries: entries.iter().copied().collect(),
        }
    }

    /// Family the table belongs to.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Request byte for `key`; `ERR_CONFIG_NOT_SUPPORTED` when the family
    /// has no such command.
    pub fn get(&self, key: CmdKey) -> Result<u8> {
        self.entries
            .get(&key)
            .copied()
            .ok_or(UlError::ConfigNotSupported)
    }

    /// True when the family implements `key`.
    pub fn supports(&self, key: CmdKey) -> bool {
        self.entries.contains_key(&key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let table = CommandTable::new("test", &[(CmdKey::AIn, 0x10), (CmdKey::Status, 0x40)]);
        assert_eq!(table.get(CmdKey::AIn), Ok(0x10));
        assert_eq!(table.get(CmdKey::Cjc), Err(UlError::ConfigNotSupported));
        assert!(table.supports(CmdKey::Status));
        assert_eq!(table.name(), "test");
    }
}
