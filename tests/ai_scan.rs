//! Integration tests for analog input scans on the USB-1808 driver
//!
//! Every test drives the full path: subsystem validation, the family's wire
//! encoding, the transfer worker and the conversion pipeline, against an
//! in-memory transport.

mod common;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{open_1808, words32};
use float_cmp::approx_eq;
use uldaq::range::Range;
use uldaq::types::{AInFlag, AInScanFlag, AiInputMode, DaqEventType, ScanOption, ScanStatus, WaitType};
use uldaq::{ScanBuffer, UlError};

const AIN: u8 = 0x10;
const AIN_SCAN_START: u8 = 0x11;
const AIN_SCAN_STOP: u8 = 0x12;
const AIN_CONFIG: u8 = 0x14;
const AIN_CLEAR_FIFO: u8 = 0x15;
const STATUS: u8 = 0x40;

const MID: u32 = 0x20000;
const TOP: u32 = 0x3FFFF;

fn wait_for_total(device: &uldaq::DaqDevice, total: u64) {
    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        let (_, transfer) = device.ai().unwrap().a_in_scan_status().unwrap();
        if transfer.current_total_count >= total {
            return;
        }
        assert!(Instant::now() < deadline, "scan stalled at {transfer:?}");
        std::thread::sleep(Duration::from_millis(1));
    }
}

// =============================================================================
// Single-point reads
// =============================================================================

#[test]
fn test_a_in_converts_selected_channel() {
    let (mock, device) = open_1808();
    let mut reply = vec![0u32; 8];
    reply[3] = 0x30000;
    mock.set_query_response(AIN, words32(reply));

    let volts = device
        .ai()
        .unwrap()
        .a_in(3, AiInputMode::SingleEnded, Range::Bip10Volts, AInFlag::empty())
        .unwrap();
    assert!(approx_eq!(f64, volts, 5.0, epsilon = 1e-9));

    // first read of a channel writes the range/mode block
    let block = mock.last_sent_data(AIN_CONFIG).unwrap();
    assert_eq!(block.len(), 8);
    assert_eq!(block[3], 0);
}

#[test]
fn test_a_in_raw_code() {
    let (mock, device) = open_1808();
    mock.set_query_response(AIN, words32([TOP; 8]));

    let code = device
        .ai()
        .unwrap()
        .a_in(
            0,
            AiInputMode::SingleEnded,
            Range::Uni5Volts,
            AInFlag::NOSCALEDATA | AInFlag::NOCALIBRATEDATA,
        )
        .unwrap();
    assert_eq!(code, f64::from(TOP));
}

// =============================================================================
// Finite scans
// =============================================================================

#[test]
fn test_finite_scan_fills_buffer() {
    let (mock, device) = open_1808();
    let ai = device.ai().unwrap();
    let buffer = ScanBuffer::new(8);

    mock.push_bulk_in(&words32([MID, TOP, 0, 0x30000, MID, MID, 0, 0]));
    let rate = ai
        .a_in_scan(
            0,
            1,
            AiInputMode::SingleEnded,
            Range::Bip10Volts,
            4,
            1000.0,
            ScanOption::DEFAULTIO,
            AInScanFlag::empty(),
            &buffer,
        )
        .unwrap();
    assert!(approx_eq!(f64, rate, 1000.0, epsilon = 1e-9));

    ai.a_in_scan_wait(WaitType::UntilDone, 0, 2.0).unwrap();

    let data = buffer.to_vec();
    let lsb = 20.0 / f64::from(1u32 << 18);
    let expected = [0.0, 10.0 - lsb, -10.0, 5.0, 0.0, 0.0, -10.0, -10.0];
    for (got, want) in data.iter().zip(expected) {
        assert!(approx_eq!(f64, *got, want, epsilon = 1e-9), "{got} != {want}");
    }

    let (status, transfer) = ai.a_in_scan_status().unwrap();
    assert_eq!(status, ScanStatus::Idle);
    assert_eq!(transfer.current_scan_count, 4);
    assert_eq!(transfer.current_total_count, 8);
    assert_eq!(transfer.current_index, 6);
}

#[test]
fn test_scan_command_sequence() {
    let (mock, device) = open_1808();
    let buffer = ScanBuffer::new(4);

    mock.push_bulk_in(&words32([MID; 4]));
    device
        .ai()
        .unwrap()
        .a_in_scan(
            2,
            3,
            AiInputMode::SingleEnded,
            Range::Uni10Volts,
            2,
            1000.0,
            ScanOption::DEFAULTIO,
            AInScanFlag::empty(),
            &buffer,
        )
        .unwrap();
    device
        .ai()
        .unwrap()
        .a_in_scan_wait(WaitType::UntilDone, 0, 2.0)
        .unwrap();

    let order: Vec<u8> = mock
        .calls()
        .iter()
        .map(|c| c.request())
        .filter(|r| [AIN_CONFIG, AIN_CLEAR_FIFO, AIN_SCAN_START].contains(r))
        .collect();
    assert_eq!(order, vec![AIN_CONFIG, AIN_CLEAR_FIFO, AIN_SCAN_START]);

    let block = mock.last_sent_data(AIN_CONFIG).unwrap();
    assert_eq!(&block[2..4], &[2, 2]);

    let start = mock.last_sent_data(AIN_SCAN_START).unwrap();
    assert_eq!(start.len(), 16);
    assert_eq!(u32::from_le_bytes(start[0..4].try_into().unwrap()), 2);
    assert_eq!(u32::from_le_bytes(start[8..12].try_into().unwrap()), 99_999);
    assert_eq!(u16::from_le_bytes([start[12], start[13]]), 0b1100);
    assert_eq!(start[14], 127);
    assert_eq!(start[15], 0);
}

#[test]
fn test_end_of_scan_event() {
    let (mock, device) = open_1808();
    let ended = Arc::new(AtomicU64::new(0));
    {
        let ended = ended.clone();
        device
            .enable_event(
                DaqEventType::ON_END_OF_INPUT_SCAN,
                0,
                Arc::new(move |_, scans| ended.store(scans, Ordering::SeqCst)),
            )
            .unwrap();
    }

    let buffer = ScanBuffer::new(6);
    mock.push_bulk_in(&words32([MID; 6]));
    device
        .ai()
        .unwrap()
        .a_in_scan(
            0,
            0,
            AiInputMode::SingleEnded,
            Range::Bip5Volts,
            6,
            500.0,
            ScanOption::DEFAULTIO,
            AInScanFlag::empty(),
            &buffer,
        )
        .unwrap();
    device
        .ai()
        .unwrap()
        .a_in_scan_wait(WaitType::UntilDone, 0, 2.0)
        .unwrap();
    assert_eq!(ended.load(Ordering::SeqCst), 6);
}

// =============================================================================
// Continuous scans
// =============================================================================

#[test]
fn test_continuous_scan_wraps_buffer() {
    let (mock, device) = open_1808();
    let ai = device.ai().unwrap();
    let buffer = ScanBuffer::new(8);

    // ten scans of two channels into a four-scan ring
    mock.push_bulk_in(&words32((0..20).map(|i| if i % 2 == 0 { MID } else { 0 })));
    ai.a_in_scan(
        0,
        1,
        AiInputMode::SingleEnded,
        Range::Bip10Volts,
        4,
        1000.0,
        ScanOption::CONTINUOUS,
        AInScanFlag::empty(),
        &buffer,
    )
    .unwrap();

    wait_for_total(&device, 20);
    let (status, transfer) = ai.a_in_scan_status().unwrap();
    assert_eq!(status, ScanStatus::Running);
    assert_eq!(transfer.current_scan_count, 10);
    assert_eq!(transfer.current_index, 2);

    ai.a_in_scan_stop().unwrap();
    assert_eq!(ai.a_in_scan_status().unwrap().0, ScanStatus::Idle);
    assert!(!mock.sent(AIN_SCAN_STOP).is_empty());

    let data = buffer.to_vec();
    for pair in data.chunks(2) {
        assert!(approx_eq!(f64, pair[0], 0.0, epsilon = 1e-9));
        assert!(approx_eq!(f64, pair[1], -10.0, epsilon = 1e-9));
    }

    // continuous start encodes a zero count
    let start = mock.last_sent_data(AIN_SCAN_START).unwrap();
    assert_eq!(&start[0..4], &[0, 0, 0, 0]);
    assert_eq!(start[15] & 0x02, 0x02);
}

#[test]
fn test_overrun_reported_once() {
    let (mock, device) = open_1808();
    let ai = device.ai().unwrap();
    let buffer = ScanBuffer::new(4);

    mock.set_query_response(STATUS, vec![0x08, 0x00]);
    ai.a_in_scan(
        0,
        0,
        AiInputMode::SingleEnded,
        Range::Bip10Volts,
        4,
        1000.0,
        ScanOption::CONTINUOUS,
        AInScanFlag::empty(),
        &buffer,
    )
    .unwrap();

    assert_eq!(
        ai.a_in_scan_wait(WaitType::UntilDone, 0, 2.0),
        Err(UlError::Overrun)
    );
    let (status, _) = ai.a_in_scan_status().unwrap();
    assert_eq!(status, ScanStatus::Idle);
    // the worker stops the hardware after a failure
    assert!(!mock.sent(AIN_SCAN_STOP).is_empty());
}

#[test]
fn test_start_failure_releases_engine() {
    let (mock, device) = open_1808();
    let ai = device.ai().unwrap();
    let buffer = ScanBuffer::new(4);
    let start = |buffer: &ScanBuffer<f64>| {
        ai.a_in_scan(
            0,
            0,
            AiInputMode::SingleEnded,
            Range::Bip10Volts,
            4,
            1000.0,
            ScanOption::CONTINUOUS,
            AInScanFlag::empty(),
            buffer,
        )
    };

    mock.fail_command(AIN_SCAN_START, UlError::DeadDev);
    assert_eq!(start(&buffer), Err(UlError::DeadDev));
    assert_eq!(ai.a_in_scan_status().unwrap().0, ScanStatus::Idle);
    assert!(!device.core().input_engine().is_busy());

    mock.clear_command_failure(AIN_SCAN_START);
    start(&buffer).unwrap();
    assert_eq!(ai.a_in_scan_status().unwrap().0, ScanStatus::Running);
    ai.a_in_scan_stop().unwrap();
}

#[test]
fn test_stop_when_idle_is_noop() {
    let (mock, device) = open_1808();
    device.ai().unwrap().a_in_scan_stop().unwrap();
    assert!(mock.sent(AIN_SCAN_STOP).is_empty());
}

#[test]
fn test_disconnect_stops_running_scan() {
    let (_mock, device) = open_1808();
    let ai = device.ai().unwrap();
    let buffer = ScanBuffer::new(4);
    ai.a_in_scan(
        0,
        0,
        AiInputMode::SingleEnded,
        Range::Bip10Volts,
        4,
        1000.0,
        ScanOption::CONTINUOUS,
        AInScanFlag::empty(),
        &buffer,
    )
    .unwrap();

    device.disconnect().unwrap();
    assert!(!device.core().input_engine().is_busy());
    assert_eq!(
        ai.a_in_scan(
            0,
            0,
            AiInputMode::SingleEnded,
            Range::Bip10Volts,
            4,
            1000.0,
            ScanOption::CONTINUOUS,
            AInScanFlag::empty(),
            &buffer,
        ),
        Err(UlError::NoConnectionEstablished)
    );
}

/// Runs `teardown` on a scanning device in another thread and fails if it
/// has not returned within five seconds.
fn teardown_within_timeout(teardown: impl FnOnce(uldaq::DaqDevice) + Send + 'static) -> Arc<uldaq::transport::MockTransport> {
    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let (mock, device) = open_1808();
        let buffer = ScanBuffer::new(4);
        device
            .ai()
            .unwrap()
            .a_in_scan(
                0,
                0,
                AiInputMode::SingleEnded,
                Range::Bip10Volts,
                4,
                1000.0,
                ScanOption::CONTINUOUS,
                AInScanFlag::empty(),
                &buffer,
            )
            .unwrap();
        assert!(device.core().input_engine().is_busy());
        teardown(device);
        let _ = tx.send(mock);
    });
    rx.recv_timeout(Duration::from_secs(5))
        .expect("device teardown did not finish")
}

#[test]
fn test_disconnect_returns_while_scanning() {
    let mock = teardown_within_timeout(|device| {
        device.disconnect().unwrap();
        assert!(!device.is_connected());
    });
    assert!(!mock.sent(AIN_SCAN_STOP).is_empty());
}

#[test]
fn test_drop_stops_running_scan() {
    let mock = teardown_within_timeout(drop);
    assert!(!mock.sent(AIN_SCAN_STOP).is_empty());
}
