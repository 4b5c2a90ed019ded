//! # uldaq
//!
//! Device-agnostic data acquisition over USB DAQ hardware: analog input and
//! output, digital I/O, counters, pulse timers and synchronous multi-type
//! scans. Generic request validation, the background scan engine and the
//! calibration pipeline are shared; each device family contributes only the
//! wire encoding of its commands.
//!
//! ## Crate Structure
//!
//! - **`api`**: Handle-based `ul_*` functions returning error codes, the
//!   boundary no `Err` or panic crosses.
//! - **`family`**: Product-id registry that opens a device of any built-in
//!   family.
//! - **`device`**: `DaqDevice`, its shared `DeviceCore` (command mutex,
//!   trigger mutex, connection state) and the capability structs.
//! - **`subsystem`**: AI, AO, DIO, counter, timer, DaqI and DaqO subsystems
//!   with the validators they share.
//! - **`scan`**: Scan engine, transfer worker, ring-buffer cursors and the
//!   sample conversion pipeline.
//! - **`usb1808`** / **`usb24xx`**: Device family drivers.
//! - **`transport`**: The `UsbTransport` interface and an in-memory mock.
//! - **`config`** / **`logging`**: Figment-loaded runtime configuration and
//!   the tracing subscriber setup.
//! - **`error`**: `UlError`, the closed set of error codes and their
//!   messages.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use uldaq::{create_device, DaqDeviceDescriptor, ScanBuffer, UlConfig};
//! use uldaq::range::Range;
//! use uldaq::transport::MockTransport;
//! use uldaq::types::{AInScanFlag, AiInputMode, ScanOption, WaitType};
//!
//! # fn main() -> uldaq::Result<()> {
//! let transport = Arc::new(MockTransport::new());
//! let device = create_device(
//!     &DaqDeviceDescriptor::new(uldaq::usb1808::PID_USB_1808, "01A2B3C4"),
//!     transport,
//!     UlConfig::load()?,
//! )?;
//! device.connect()?;
//!
//! let buffer = ScanBuffer::new(4 * 1000);
//! let rate = device.ai()?.a_in_scan(
//!     0, 3, AiInputMode::SingleEnded, Range::Bip10Volts,
//!     1000, 10_000.0, ScanOption::DEFAULTIO, AInScanFlag::empty(), &buffer,
//! )?;
//! device.ai()?.a_in_scan_wait(WaitType::UntilDone, 0, 5.0)?;
//! println!("scanned at {rate} S/s: {:?}", buffer.get(0));
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod calibration;
pub mod config;
pub mod device;
pub mod endian;
pub mod error;
pub mod events;
pub mod family;
pub mod logging;
pub mod memory;
pub mod nist;
pub mod range;
pub mod scan;
pub mod subsystem;
pub mod timing;
pub mod transport;
pub mod trigger;
pub mod types;
pub mod usb1808;
pub mod usb24xx;

pub use config::UlConfig;
pub use device::{DaqDevice, DevInfo};
pub use error::{Result, UlError};
pub use family::{create_device, DaqDeviceDescriptor, FamilyRegistry};
pub use scan::ScanBuffer;
