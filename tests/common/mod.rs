//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use uldaq::transport::MockTransport;
use uldaq::{usb1808, usb24xx, DaqDevice, UlConfig};

/// Short bulk timeout so idle scans poll the status word quickly.
pub fn test_config() -> UlConfig {
    let mut config = UlConfig::default();
    config.transfer.bulk_timeout_ms = 5;
    config
}

/// Connected USB-1808 over a fresh mock. The mock answers every query with
/// zeros, so calibration loads as identity and every DIO line is an output.
pub fn open_1808() -> (Arc<MockTransport>, DaqDevice) {
    let mock = Arc::new(MockTransport::new());
    let device = usb1808::open(usb1808::Model::Usb1808, "01AB23CD", mock.clone(), test_config())
        .expect("open USB-1808");
    device.connect().expect("connect USB-1808");
    mock.clear_calls();
    (mock, device)
}

/// Connected USB-2408 over a fresh mock.
pub fn open_2408() -> (Arc<MockTransport>, DaqDevice) {
    let mock = Arc::new(MockTransport::new());
    let device = usb24xx::open(usb24xx::Model::Usb2408, "1F2E3D4C", mock.clone(), test_config())
        .expect("open USB-2408");
    device.connect().expect("connect USB-2408");
    mock.clear_calls();
    (mock, device)
}

/// Little-endian wire bytes of 32-bit sample words.
pub fn words32(values: impl IntoIterator<Item = u32>) -> Vec<u8> {
    values.into_iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Little-endian wire bytes of 16-bit sample words.
pub fn words16(values: impl IntoIterator<Item = u16>) -> Vec<u8> {
    values.into_iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Decode little-endian 16-bit words.
pub fn decode16(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect()
}
