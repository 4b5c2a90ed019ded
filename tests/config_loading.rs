//! Configuration files as shipped and as seen by device construction.

use std::io::Write;
use std::sync::Arc;

use tempfile::NamedTempFile;
use uldaq::api::{ul_create_daq_device, DaqDeviceHandle};
use uldaq::config::DEFAULT_CONFIG_PATH;
use uldaq::transport::MockTransport;
use uldaq::{usb1808, usb24xx, DaqDeviceDescriptor, UlConfig, UlError};

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_shipped_file_matches_defaults() {
    let shipped = UlConfig::load_from(DEFAULT_CONFIG_PATH).unwrap();
    assert_eq!(shipped, UlConfig::default());
}

#[test]
fn test_partial_file_reaches_device() {
    let file = config_file("[transfer]\nbulk_timeout_ms = 250\n\n[logging]\nformat = \"json\"\n");
    let config = UlConfig::load_from(file.path()).unwrap();
    assert_eq!(config.transfer.bulk_timeout_ms, 250);
    assert_eq!(config.transfer.command_timeout_ms, UlConfig::default().transfer.command_timeout_ms);

    let device = usb24xx::open(usb24xx::Model::Usb2416, "C0FFEE", Arc::new(MockTransport::new()), config)
        .unwrap();
    assert_eq!(device.dev_info().product_name, "USB-2416");
}

#[test]
fn test_invalid_file_fails_to_load() {
    let file = config_file("[transfer]\ntransfer_count = 0\n");
    assert_eq!(UlConfig::load_from(file.path()), Err(UlError::BadConfigVal));

    let file = config_file("[scan]\nwait_poll_interval_ms = \"often\"\n");
    assert_eq!(UlConfig::load_from(file.path()), Err(UlError::BadConfigVal));
}

#[test]
fn test_open_rejects_invalid_config() {
    let mut config = UlConfig::default();
    config.logging.level = "loud".into();
    let result = usb1808::open(usb1808::Model::Usb1808, "1", Arc::new(MockTransport::new()), config.clone());
    assert_eq!(result.err(), Some(UlError::BadConfigVal));

    let mut handle: DaqDeviceHandle = 0;
    let err = ul_create_daq_device(
        &DaqDeviceDescriptor::new(usb1808::PID_USB_1808, "1"),
        Arc::new(MockTransport::new()),
        config,
        &mut handle,
    );
    assert_eq!(err, UlError::BadConfigVal);
    assert_eq!(handle, 0);
}
