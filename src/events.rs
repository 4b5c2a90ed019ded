//! Scan event callbacks.
//!
//! Callbacks are invoked on the transfer worker thread with the event type and
//! its data: the per-channel sample count for data-available and end-of-scan
//! events, the error code for scan-error events. A callback must not block for
//! long and must not stop the scan that is calling it.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, error};

use crate::error::{Result, UlError};
use crate::types::DaqEventType;

/// User callback: `(event_type, event_data)`.
pub type EventCallback = Arc<dyn Fn(DaqEventType, u64) + Send + Sync>;

struct Registration {
    event_type: DaqEventType,
    param: u64,
    callback: EventCallback,
}

/// Registered callbacks of one device.
pub struct EventHub {
    supported: DaqEventType,
    registrations: RwLock<Vec<Registration>>,
}

impl EventHub {
    /// Hub accepting only the given event types.
    pub fn new(supported: DaqEventType) -> Self {
        Self {
            supported,
            registrations: RwLock::new(Vec::new()),
        }
    }

    /// Event types the device can raise.
    pub fn supported(&self) -> DaqEventType {
        self.supported
    }

    /// Register `callback` for every type in `types`.
    ///
    /// `param` is the data-available threshold in samples per channel and
    /// must be non-zero when `ON_DATA_AVAILABLE` is requested.
    pub fn enable(&self, types: DaqEventType, param: u64, callback: EventCallback) -> Result<()> {
        if types.is_empty() || !self.supported.contains(types) {
            return Err(UlError::BadEventType);
        }
        if types.contains(DaqEventType::ON_DATA_AVAILABLE) && param == 0 {
            return Err(UlError::BadEventParameter);
        }

        let mut regs = self.registrations.write();
        if regs.iter().any(|r| types.contains(r.event_type)) {
            return Err(UlError::EventAlreadyEnabled);
        }
        for event_type in types.iter() {
            regs.push(Registration {
                event_type,
                param,
                callback: Arc::clone(&callback),
            });
        }
        debug!(types = ?types, param, "Enabled events");
        Ok(())
    }

    /// Remove the callbacks for `types`. Disabling a type that is not
    /// enabled is not an error.
    pub fn disable(&self, types: DaqEventType) -> Result<()> {
        if !self.supported.contains(types) {
            return Err(UlError::BadEventType);
        }
        self.registrations
            .write()
            .retain(|r| !types.contains(r.event_type));
        debug!(types = ?types, "Disabled events");
        Ok(())
    }

    /// Event types that currently have a callback.
    pub fn enabled(&self) -> DaqEventType {
        self.registrations
            .read()
            .iter()
            .fold(DaqEventType::empty(), |acc, r| acc | r.event_type)
    }

    /// Data-available threshold, if that event is enabled.
    pub fn data_available_threshold(&self) -> Option<u64> {
        self.registrations
            .read()
            .iter()
            .find(|r| r.event_type == DaqEventType::ON_DATA_AVAILABLE)
            .map(|r| r.param)
    }

    /// Invoke the callback registered for `event_type`.
    pub fn fire(&self, event_type: DaqEventType, data: u64) {
        let callback = self
            .registrations
            .read()
            .iter()
            .find(|r| r.event_type == event_type)
            .map(|r| Arc::clone(&r.callback));

        if let Some(callback) = callback {
            let result =
                std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| callback(event_type, data)));
            if result.is_err() {
                error!(event = ?event_type, "Event callback panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn hub() -> EventHub {
        EventHub::new(
            DaqEventType::ON_DATA_AVAILABLE
                | DaqEventType::ON_END_OF_INPUT_SCAN
                | DaqEventType::ON_INPUT_SCAN_ERROR,
        )
    }

    #[test]
    fn test_enable_and_fire() {
        let hub = hub();
        let seen = Arc::new(AtomicU64::new(0));
        let seen2 = Arc::clone(&seen);
        hub.enable(
            DaqEventType::ON_END_OF_INPUT_SCAN,
            0,
            Arc::new(move |_, data| {
                seen2.store(data, Ordering::SeqCst);
            }),
        )
        .unwrap();

        hub.fire(DaqEventType::ON_END_OF_INPUT_SCAN, 42);
        assert_eq!(seen.load(Ordering::SeqCst), 42);
        hub.fire(DaqEventType::ON_INPUT_SCAN_ERROR, 7);
        assert_eq!(seen.load(Ordering::SeqCst), 42);
    }

    #[test]
    fn test_enable_errors() {
        let hub = hub();
        let cb: EventCallback = Arc::new(|_, _| {});
        assert_eq!(
            hub.enable(DaqEventType::ON_END_OF_OUTPUT_SCAN, 0, Arc::clone(&cb)),
            Err(UlError::BadEventType)
        );
        assert_eq!(
            hub.enable(DaqEventType::ON_DATA_AVAILABLE, 0, Arc::clone(&cb)),
            Err(UlError::BadEventParameter)
        );
        hub.enable(DaqEventType::ON_DATA_AVAILABLE, 100, Arc::clone(&cb))
            .unwrap();
        assert_eq!(
            hub.enable(DaqEventType::ON_DATA_AVAILABLE, 10, Arc::clone(&cb)),
            Err(UlError::EventAlreadyEnabled)
        );
        assert_eq!(hub.data_available_threshold(), Some(100));
    }

    #[test]
    fn test_disable() {
        let hub = hub();
        let cb: EventCallback = Arc::new(|_, _| {});
        hub.enable(
            DaqEventType::ON_DATA_AVAILABLE | DaqEventType::ON_END_OF_INPUT_SCAN,
            10,
            cb,
        )
        .unwrap();
        hub.disable(DaqEventType::ON_DATA_AVAILABLE).unwrap();
        assert_eq!(hub.enabled(), DaqEventType::ON_END_OF_INPUT_SCAN);
        assert_eq!(hub.data_available_threshold(), None);
    }
}
