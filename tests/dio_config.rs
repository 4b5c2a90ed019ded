//! Integration tests for the USB-1808 digital port: direction tracking,
//! port and bit writes, and digital scans.

mod common;

use std::sync::Arc;

use common::{decode16, open_1808, test_config, words32};
use uldaq::transport::{MockTransport, TransportCall};
use uldaq::types::{DInScanFlag, DOutScanFlag, DigitalDirection, DigitalPortType, ScanOption, WaitType};
use uldaq::{usb1808, ScanBuffer, UlError};

const D_TRISTATE: u8 = 0x00;
const D_PORT: u8 = 0x01;
const D_LATCH: u8 = 0x02;
const AIN_SCAN_START: u8 = 0x11;

const AUX: DigitalPortType = DigitalPortType::AuxPort;

fn latch_values(mock: &MockTransport) -> Vec<u16> {
    mock.sent(D_LATCH)
        .iter()
        .map(|call| match call {
            TransportCall::Send { value, .. } => *value,
            TransportCall::Query { .. } => unreachable!(),
        })
        .collect()
}

// =============================================================================
// Directions
// =============================================================================

#[test]
fn test_connect_reads_live_directions() {
    let mock = Arc::new(MockTransport::new());
    // every line tristated: all inputs
    mock.set_query_response(D_TRISTATE, vec![0x0F, 0x00]);
    let device = usb1808::open(usb1808::Model::Usb1808X, "0001", mock.clone(), test_config()).unwrap();
    device.connect().unwrap();

    let dio = device.dio().unwrap();
    assert_eq!(dio.port_direction(AUX).unwrap(), 0);
    assert_eq!(dio.bit_direction(AUX, 3).unwrap(), DigitalDirection::Input);
    assert_eq!(dio.d_out(AUX, 1), Err(UlError::WrongDigConfig));
}

#[test]
fn test_config_bit_updates_tristate() {
    let (mock, device) = open_1808();
    let dio = device.dio().unwrap();
    assert_eq!(dio.port_direction(AUX).unwrap(), 0x0F);

    dio.d_config_bit(AUX, 2, DigitalDirection::Input).unwrap();
    assert_eq!(
        mock.sent(D_TRISTATE),
        vec![TransportCall::Send {
            request: D_TRISTATE,
            value: 0b0100,
            index: 0,
            data: Vec::new(),
        }]
    );
    assert_eq!(dio.port_direction(AUX).unwrap(), 0b1011);
    assert_eq!(dio.bit_direction(AUX, 2).unwrap(), DigitalDirection::Input);

    dio.d_config_port(AUX, DigitalDirection::Output).unwrap();
    assert_eq!(dio.port_direction(AUX).unwrap(), 0x0F);
}

#[test]
fn test_port_and_bit_numbers_checked() {
    let (_mock, device) = open_1808();
    let dio = device.dio().unwrap();

    assert_eq!(
        dio.d_config_port(DigitalPortType::FirstPortA, DigitalDirection::Input),
        Err(UlError::BadPortType)
    );
    assert_eq!(
        dio.d_config_bit(AUX, 4, DigitalDirection::Input),
        Err(UlError::BadBitNum)
    );
    assert_eq!(dio.d_bit_in(AUX, 7), Err(UlError::BadBitNum));
}

// =============================================================================
// Port and bit I/O
// =============================================================================

#[test]
fn test_d_out_requires_outputs() {
    let (mock, device) = open_1808();
    let dio = device.dio().unwrap();

    assert_eq!(dio.d_out(AUX, 0x10), Err(UlError::BadPortVal));
    dio.d_out(AUX, 0x5).unwrap();

    dio.d_config_bit(AUX, 0, DigitalDirection::Input).unwrap();
    assert_eq!(dio.d_out(AUX, 0x4), Err(UlError::WrongDigConfig));
    assert_eq!(latch_values(&mock), vec![0x5]);
}

#[test]
fn test_d_bit_out_keeps_other_lines() {
    let (mock, device) = open_1808();
    let dio = device.dio().unwrap();

    dio.d_out(AUX, 0b1001).unwrap();
    dio.d_bit_out(AUX, 1, 1).unwrap();
    dio.d_bit_out(AUX, 3, 0).unwrap();
    assert_eq!(latch_values(&mock), vec![0b1001, 0b1011, 0b0011]);

    assert_eq!(dio.d_bit_out(AUX, 1, 2), Err(UlError::BadPortVal));
    dio.d_config_bit(AUX, 2, DigitalDirection::Input).unwrap();
    assert_eq!(dio.d_bit_out(AUX, 2, 1), Err(UlError::WrongDigConfig));
}

#[test]
fn test_d_in_masks_port_width() {
    let (mock, device) = open_1808();
    mock.set_query_response(D_PORT, vec![0x1B, 0x00]);
    let dio = device.dio().unwrap();

    assert_eq!(dio.d_in(AUX).unwrap(), 0xB);
    assert_eq!(dio.d_bit_in(AUX, 3).unwrap(), 1);
    assert_eq!(dio.d_bit_in(AUX, 2).unwrap(), 0);
}

#[test]
fn test_disconnected_device_rejects_io() {
    let (_mock, device) = open_1808();
    device.disconnect().unwrap();
    assert_eq!(
        device.dio().unwrap().d_in(AUX),
        Err(UlError::NoConnectionEstablished)
    );
}

// =============================================================================
// Digital scans
// =============================================================================

#[test]
fn test_d_in_scan_collects_port_words() {
    let (mock, device) = open_1808();
    let dio = device.dio().unwrap();
    let buffer = ScanBuffer::new(4);

    mock.push_bulk_in(&words32([0x3, 0xF, 0x1A, 0x0]));
    dio.d_in_scan(AUX, AUX, 4, 500.0, ScanOption::DEFAULTIO, DInScanFlag::empty(), &buffer)
        .unwrap();
    dio.d_scan_wait(uldaq::types::FunctionType::Di, WaitType::UntilDone, 0, 2.0)
        .unwrap();

    assert_eq!(buffer.to_vec(), vec![0x3, 0xF, 0xA, 0x0]);
    let start = mock.last_sent_data(AIN_SCAN_START).unwrap();
    assert_eq!(u16::from_le_bytes([start[12], start[13]]), 1 << 8);
}

#[test]
fn test_d_out_scan_streams_words() {
    let (mock, device) = open_1808();
    let dio = device.dio().unwrap();
    let buffer = ScanBuffer::from_vec(vec![0x1u64, 0x2, 0x4, 0x8]);

    dio.d_out_scan(AUX, AUX, 4, 500.0, ScanOption::DEFAULTIO, DOutScanFlag::empty(), &buffer)
        .unwrap();
    dio.d_scan_wait(uldaq::types::FunctionType::Do, WaitType::UntilDone, 0, 2.0)
        .unwrap();
    assert_eq!(decode16(&mock.bulk_out_data()), vec![0x1, 0x2, 0x4, 0x8]);
}

#[test]
fn test_d_out_scan_rejects_input_lines() {
    let (_mock, device) = open_1808();
    let dio = device.dio().unwrap();
    dio.d_config_bit(AUX, 0, DigitalDirection::Input).unwrap();
    let buffer = ScanBuffer::from_vec(vec![0u64; 4]);
    assert_eq!(
        dio.d_out_scan(AUX, AUX, 4, 500.0, ScanOption::DEFAULTIO, DOutScanFlag::empty(), &buffer),
        Err(UlError::WrongDigConfig)
    );
}

#[test]
fn test_scan_function_must_match_direction() {
    let (_mock, device) = open_1808();
    assert_eq!(
        device.dio().unwrap().d_scan_status(uldaq::types::FunctionType::Ai),
        Err(UlError::BadArg)
    );
}
