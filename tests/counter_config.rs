//! Integration tests for USB-1808 counters: register access, scan
//! configuration rules and counter scans.

mod common;

use common::{open_1808, words32};
use uldaq::subsystem::CtrScanConfig;
use uldaq::transport::TransportCall;
use uldaq::types::{
    CInScanFlag, CounterDebounceMode, CounterDebounceTime, CounterMeasurementMode,
    CounterMeasurementType, CounterRegisterType, CounterTickSize, ScanOption, ScanStatus, WaitType,
};
use uldaq::{ScanBuffer, UlError};

const COUNTER: u8 = 0x20;
const COUNTER_OPTIONS: u8 = 0x21;
const COUNTER_LIMITS: u8 = 0x22;
const COUNTER_MODE: u8 = 0x23;
const AIN_SCAN_START: u8 = 0x11;

fn period_config() -> CtrScanConfig {
    CtrScanConfig {
        measurement_type: CounterMeasurementType::PERIOD,
        mode: CounterMeasurementMode::PERIOD_X10,
        tick_size: Some(CounterTickSize::Tick200ns),
        debounce_mode: CounterDebounceMode::TriggerAfterStable,
        debounce_time: CounterDebounceTime::Debounce1500ns,
        ..CtrScanConfig::default()
    }
}

// =============================================================================
// Registers
// =============================================================================

#[test]
fn test_c_in_reads_count_register() {
    let (mock, device) = open_1808();
    mock.set_query_response(COUNTER, vec![0x78, 0x56, 0x34, 0x12]);

    assert_eq!(device.ctr().unwrap().c_in(1).unwrap(), 0x1234_5678);
    assert_eq!(
        mock.calls(),
        vec![TransportCall::Query {
            request: COUNTER,
            value: 0,
            index: 1,
            len: 4,
        }]
    );
}

#[test]
fn test_c_load_limits() {
    let (mock, device) = open_1808();
    let ctr = device.ctr().unwrap();

    ctr.c_load(0, CounterRegisterType::MAX_LIMIT, 1000).unwrap();
    assert_eq!(
        mock.sent(COUNTER_LIMITS),
        vec![TransportCall::Send {
            request: COUNTER_LIMITS,
            value: 1,
            index: 0,
            data: 1000u32.to_le_bytes().to_vec(),
        }]
    );

    assert_eq!(
        ctr.c_load(0, CounterRegisterType::LOAD, 1 << 32),
        Err(UlError::BadCtrVal)
    );
    // encoders have no limit registers
    assert_eq!(
        ctr.c_load(2, CounterRegisterType::MIN_LIMIT, 0),
        Err(UlError::BadCtrReg)
    );
    assert_eq!(
        ctr.c_load(0, CounterRegisterType::COUNT | CounterRegisterType::LOAD, 0),
        Err(UlError::BadCtrReg)
    );
    assert_eq!(ctr.c_read(4, CounterRegisterType::COUNT), Err(UlError::BadCtr));
}

#[test]
fn test_c_clear_writes_zero() {
    let (mock, device) = open_1808();
    device.ctr().unwrap().c_clear(3).unwrap();
    assert_eq!(
        mock.sent(COUNTER),
        vec![TransportCall::Send {
            request: COUNTER,
            value: 0,
            index: 3,
            data: vec![0; 4],
        }]
    );
}

// =============================================================================
// Scan configuration
// =============================================================================

#[test]
fn test_config_scan_accepts_period_measurement() {
    let (mock, device) = open_1808();
    let ctr = device.ctr().unwrap();

    ctr.c_config_scan(1, period_config()).unwrap();
    assert_eq!(
        mock.last_sent_data(COUNTER_MODE),
        Some(vec![1, 0x00, 0x08, 0x00, 0x00])
    );
    // rising edge, second tick size, after-stable, 1500 ns
    assert_eq!(mock.last_sent_data(COUNTER_OPTIONS), Some(vec![1, 1, 1, 2]));
    assert_eq!(ctr.config(1).unwrap(), period_config());
}

#[test]
fn test_config_scan_rule_order() {
    let (mock, device) = open_1808();
    let ctr = device.ctr().unwrap();

    assert_eq!(ctr.c_config_scan(4, CtrScanConfig::default()), Err(UlError::BadCtr));

    // encoder counters only measure position
    assert_eq!(ctr.c_config_scan(2, period_config()), Err(UlError::BadCtrMeasureType));
    let mut two_types = period_config();
    two_types.measurement_type = CounterMeasurementType::PERIOD | CounterMeasurementType::COUNT;
    assert_eq!(ctr.c_config_scan(0, two_types), Err(UlError::BadCtrMeasureType));

    let mut wrong_mode = CtrScanConfig::default();
    wrong_mode.mode = CounterMeasurementMode::ENCODER_X4;
    assert_eq!(ctr.c_config_scan(0, wrong_mode), Err(UlError::BadCtrMeasureMode));

    let mut tick_on_count = CtrScanConfig::default();
    tick_on_count.tick_size = Some(CounterTickSize::Tick20ns);
    assert_eq!(ctr.c_config_scan(0, tick_on_count), Err(UlError::BadTickSize));

    let mut missing_tick = period_config();
    missing_tick.tick_size = None;
    assert_eq!(ctr.c_config_scan(0, missing_tick), Err(UlError::BadTickSize));

    let mut foreign_tick = period_config();
    foreign_tick.tick_size = Some(CounterTickSize::Tick20Pt83ns);
    assert_eq!(ctr.c_config_scan(0, foreign_tick), Err(UlError::BadTickSize));

    let mut time_without_mode = CtrScanConfig::default();
    time_without_mode.debounce_time = CounterDebounceTime::Debounce500ns;
    assert_eq!(ctr.c_config_scan(0, time_without_mode), Err(UlError::BadDebounceTime));

    let mut mode_without_time = CtrScanConfig::default();
    mode_without_time.debounce_mode = CounterDebounceMode::TriggerBeforeStable;
    assert_eq!(ctr.c_config_scan(0, mode_without_time), Err(UlError::BadDebounceTime));

    // nothing reached the device
    assert!(mock.sent(COUNTER_MODE).is_empty());
    assert!(mock.sent(COUNTER_OPTIONS).is_empty());
}

#[test]
fn test_config_scan_blocked_during_counter_scan() {
    let (_mock, device) = open_1808();
    let ctr = device.ctr().unwrap();
    let buffer = ScanBuffer::new(8);

    ctr.c_in_scan(0, 0, 8, 100.0, ScanOption::CONTINUOUS, CInScanFlag::empty(), &buffer)
        .unwrap();
    assert_eq!(
        ctr.c_config_scan(0, CtrScanConfig::default()),
        Err(UlError::AlreadyActive)
    );
    ctr.c_in_scan_stop().unwrap();
    ctr.c_config_scan(0, CtrScanConfig::default()).unwrap();
}

// =============================================================================
// Counter scans
// =============================================================================

#[test]
fn test_counter_scan_clears_and_masks() {
    let (mock, device) = open_1808();
    let ctr = device.ctr().unwrap();
    let buffer = ScanBuffer::new(6);

    mock.push_bulk_in(&words32([1, 0x0001_0002, 3, 0x0002_0004, 5, 0xFFFF_FFFF]));
    let rate = ctr
        .c_in_scan(0, 1, 3, 2000.0, ScanOption::DEFAULTIO, CInScanFlag::CTR16_BIT, &buffer)
        .unwrap();
    assert_eq!(rate, 2000.0);
    ctr.c_in_scan_wait(WaitType::UntilDone, 0, 2.0).unwrap();

    assert_eq!(buffer.to_vec(), vec![1, 2, 3, 4, 5, 0xFFFF]);
    assert_eq!(ctr.c_in_scan_status().unwrap().0, ScanStatus::Idle);

    // both counters cleared before the start command
    let cleared: Vec<u16> = mock
        .sent(COUNTER)
        .iter()
        .map(|call| match call {
            TransportCall::Send { index, .. } => *index,
            TransportCall::Query { .. } => unreachable!(),
        })
        .collect();
    assert_eq!(cleared, vec![0, 1]);

    let start = mock.last_sent_data(AIN_SCAN_START).unwrap();
    assert_eq!(u16::from_le_bytes([start[12], start[13]]), 0b11 << 9);
}

#[test]
fn test_counter_scan_no_clear() {
    let (mock, device) = open_1808();
    let ctr = device.ctr().unwrap();
    let buffer = ScanBuffer::new(2);

    mock.push_bulk_in(&words32([7, 8]));
    ctr.c_in_scan(3, 3, 2, 100.0, ScanOption::DEFAULTIO, CInScanFlag::NOCLEAR, &buffer)
        .unwrap();
    ctr.c_in_scan_wait(WaitType::UntilDone, 0, 2.0).unwrap();

    assert!(mock.sent(COUNTER).is_empty());
    assert_eq!(buffer.to_vec(), vec![7, 8]);
}

#[test]
fn test_counter_scan_flag_rules() {
    let (_mock, device) = open_1808();
    let ctr = device.ctr().unwrap();
    let buffer = ScanBuffer::new(4);

    assert_eq!(
        ctr.c_in_scan(
            0,
            0,
            4,
            100.0,
            ScanOption::DEFAULTIO,
            CInScanFlag::CTR16_BIT | CInScanFlag::CTR32_BIT,
            &buffer
        ),
        Err(UlError::BadFlag)
    );
    assert_eq!(
        ctr.c_in_scan(0, 0, 4, 100.0, ScanOption::DEFAULTIO, CInScanFlag::CTR64_BIT, &buffer),
        Err(UlError::BadFlag)
    );
    assert_eq!(
        ctr.c_in_scan(1, 0, 4, 100.0, ScanOption::DEFAULTIO, CInScanFlag::empty(), &buffer),
        Err(UlError::BadCtr)
    );
}
