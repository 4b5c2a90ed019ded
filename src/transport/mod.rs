//! Command and bulk transport consumed by the device layer.
//!
//! The library never talks to libusb directly. A family driver is handed an
//! implementation of [`UsbTransport`] that performs vendor control transfers
//! (`send_cmd`/`query_cmd`) and bulk transfers on the scan endpoints. The
//! implementation must be safe to call from the transfer worker thread and
//! the caller's thread at the same time; command serialization is handled by
//! [`DeviceCore`](crate::device::DeviceCore), not by the transport.

pub mod mock;

use std::time::Duration;

use crate::error::Result;

pub use mock::{MockTransport, TransportCall};

/// Bulk IN endpoint used by input scans.
pub const EP_SCAN_IN: u8 = 0x86;
/// Bulk OUT endpoint used by output scans.
pub const EP_SCAN_OUT: u8 = 0x02;

/// Vendor control and bulk transfers to one physical device.
pub trait UsbTransport: Send + Sync {
    /// Host-to-device vendor request.
    fn send_cmd(
        &self,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
        timeout: Duration,
    ) -> Result<()>;

    /// Device-to-host vendor request. Returns the number of bytes received.
    fn query_cmd(
        &self,
        request: u8,
        value: u16,
        index: u16,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<usize>;

    /// Read up to `buf.len()` bytes. Returns `ERR_TIMEDOUT` when nothing
    /// arrives within `timeout`.
    fn bulk_in(&self, endpoint: u8, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Write `data`. Returns the number of bytes accepted.
    fn bulk_out(&self, endpoint: u8, data: &[u8], timeout: Duration) -> Result<usize>;

    /// Maximum packet size of a bulk endpoint.
    fn max_packet_size(&self, endpoint: u8) -> usize;

    /// False once the device has gone away.
    fn is_connected(&self) -> bool;
}
