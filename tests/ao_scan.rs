//! Integration tests for analog output on the USB-1808 driver

mod common;

use common::{decode16, open_1808};
use uldaq::range::Range;
use uldaq::transport::TransportCall;
use uldaq::types::{
    AOutArrayFlag, AOutFlag, AOutScanFlag, DOutScanFlag, DigitalPortType, ScanOption, ScanStatus,
    WaitType,
};
use uldaq::{ScanBuffer, UlError};

const AOUT: u8 = 0x18;
const AOUT_SCAN_START: u8 = 0x1A;
const AOUT_CLEAR_FIFO: u8 = 0x1C;

// =============================================================================
// Single-point writes
// =============================================================================

#[test]
fn test_a_out_scales_to_dac_word() {
    let (mock, device) = open_1808();
    let ao = device.ao().unwrap();

    ao.a_out(1, Range::Bip10Volts, AOutFlag::empty(), 5.0).unwrap();
    assert_eq!(
        mock.sent(AOUT),
        vec![TransportCall::Send {
            request: AOUT,
            value: 0xC000,
            index: 1,
            data: Vec::new(),
        }]
    );
}

#[test]
fn test_a_out_clamps_out_of_range_volts() {
    let (mock, device) = open_1808();
    let ao = device.ao().unwrap();

    ao.a_out(0, Range::Bip10Volts, AOutFlag::empty(), 12.0).unwrap();
    ao.a_out(0, Range::Bip10Volts, AOutFlag::empty(), -12.0).unwrap();
    let values: Vec<u16> = mock
        .sent(AOUT)
        .iter()
        .map(|call| match call {
            TransportCall::Send { value, .. } => *value,
            TransportCall::Query { .. } => unreachable!(),
        })
        .collect();
    assert_eq!(values, vec![0xFFFF, 0x0000]);
}

#[test]
fn test_a_out_rejections() {
    let (_mock, device) = open_1808();
    let ao = device.ao().unwrap();

    assert_eq!(
        ao.a_out(2, Range::Bip10Volts, AOutFlag::empty(), 0.0),
        Err(UlError::BadAoChan)
    );
    assert_eq!(
        ao.a_out(0, Range::Bip5Volts, AOutFlag::empty(), 0.0),
        Err(UlError::BadRange)
    );
    assert_eq!(
        ao.a_out(0, Range::Bip10Volts, AOutFlag::empty(), f64::NAN),
        Err(UlError::BadDaVal)
    );
    assert_eq!(
        ao.a_out(0, Range::Bip10Volts, AOutFlag::NOSCALEDATA, 70_000.0),
        Err(UlError::BadDaVal)
    );
}

#[test]
fn test_a_out_array_writes_each_channel() {
    let (mock, device) = open_1808();
    let ao = device.ao().unwrap();

    ao.a_out_array(
        0,
        1,
        &[Range::Bip10Volts, Range::Bip10Volts],
        AOutArrayFlag::NOSCALEDATA,
        &[100.0, 200.0],
    )
    .unwrap();
    let sent: Vec<(u16, u16)> = mock
        .sent(AOUT)
        .iter()
        .map(|call| match call {
            TransportCall::Send { value, index, .. } => (*value, *index),
            TransportCall::Query { .. } => unreachable!(),
        })
        .collect();
    assert_eq!(sent, vec![(100, 0), (200, 1)]);

    assert_eq!(
        ao.a_out_array(0, 1, &[Range::Bip10Volts], AOutArrayFlag::empty(), &[0.0, 0.0]),
        Err(UlError::BadArg)
    );
    assert_eq!(
        ao.a_out_array(1, 0, &[Range::Bip10Volts; 2], AOutArrayFlag::empty(), &[0.0, 0.0]),
        Err(UlError::BadAoChan)
    );

    // the DACs of a 1808 can only be updated one at a time
    mock.clear_calls();
    assert_eq!(
        ao.a_out_array(
            0,
            1,
            &[Range::Bip10Volts; 2],
            AOutArrayFlag::SIMULTANEOUS,
            &[1.0, 2.0]
        ),
        Err(UlError::BadOption)
    );
    assert!(mock.sent(AOUT).is_empty());
}

// =============================================================================
// Output scans
// =============================================================================

#[test]
fn test_finite_output_scan_writes_words() {
    let (mock, device) = open_1808();
    let ao = device.ao().unwrap();
    let buffer = ScanBuffer::from_vec(vec![-10.0, 0.0, 10.0, 12.0, -12.0, 5.0]);

    ao.a_out_scan(
        0,
        1,
        Range::Bip10Volts,
        3,
        1000.0,
        ScanOption::DEFAULTIO,
        AOutScanFlag::empty(),
        &buffer,
    )
    .unwrap();
    ao.a_out_scan_wait(WaitType::UntilDone, 0, 2.0).unwrap();

    assert_eq!(
        decode16(&mock.bulk_out_data()),
        vec![0x0000, 0x8000, 0xFFFF, 0xFFFF, 0x0000, 0xC000]
    );

    let start = mock.last_sent_data(AOUT_SCAN_START).unwrap();
    assert_eq!(start.len(), 14);
    assert_eq!(u32::from_le_bytes(start[0..4].try_into().unwrap()), 3);
    assert_eq!(start[12], 0b11);
    assert!(!mock.sent(AOUT_CLEAR_FIFO).is_empty());

    let (status, transfer) = ao.a_out_scan_status().unwrap();
    assert_eq!(status, ScanStatus::Idle);
    assert_eq!(transfer.current_total_count, 6);
    assert_eq!(transfer.current_scan_count, 3);
}

#[test]
fn test_output_path_is_shared() {
    let (_mock, device) = open_1808();
    let ao = device.ao().unwrap();
    let buffer = ScanBuffer::from_vec(vec![0.0; 64]);

    ao.a_out_scan(
        0,
        0,
        Range::Bip10Volts,
        64,
        1000.0,
        ScanOption::CONTINUOUS,
        AOutScanFlag::empty(),
        &buffer,
    )
    .unwrap();
    assert_eq!(ao.a_out_scan_status().unwrap().0, ScanStatus::Running);

    // single writes and every other output function wait for the scan
    assert_eq!(
        ao.a_out(0, Range::Bip10Volts, AOutFlag::empty(), 1.0),
        Err(UlError::AlreadyActive)
    );
    let words = ScanBuffer::from_vec(vec![0u64; 8]);
    assert_eq!(
        device.dio().unwrap().d_out_scan(
            DigitalPortType::AuxPort,
            DigitalPortType::AuxPort,
            8,
            1000.0,
            ScanOption::DEFAULTIO,
            DOutScanFlag::empty(),
            &words,
        ),
        Err(UlError::AlreadyActive)
    );

    ao.a_out_scan_stop().unwrap();
    assert_eq!(ao.a_out_scan_status().unwrap().0, ScanStatus::Idle);
    ao.a_out(0, Range::Bip10Volts, AOutFlag::empty(), 1.0).unwrap();
}

#[test]
fn test_output_scan_validation() {
    let (_mock, device) = open_1808();
    let ao = device.ao().unwrap();
    let buffer = ScanBuffer::from_vec(vec![0.0; 4]);
    let scan = |high: u32, rate: f64, options: ScanOption| {
        ao.a_out_scan(
            0,
            high,
            Range::Bip10Volts,
            2,
            rate,
            options,
            AOutScanFlag::empty(),
            &buffer,
        )
    };

    assert_eq!(scan(2, 1000.0, ScanOption::DEFAULTIO), Err(UlError::BadAoChan));
    assert_eq!(scan(1, 600e3, ScanOption::DEFAULTIO), Err(UlError::BadRate));
    assert_eq!(scan(1, 1000.0, ScanOption::BURSTIO), Err(UlError::BadOption));
    assert_eq!(
        ao.a_out_scan(
            0,
            1,
            Range::Bip10Volts,
            4,
            1000.0,
            ScanOption::DEFAULTIO,
            AOutScanFlag::empty(),
            &buffer
        ),
        Err(UlError::BadBufferSize)
    );
}
