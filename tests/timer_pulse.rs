//! USB-1808 pulse timers.

mod common;

use common::open_1808;
use float_cmp::approx_eq;
use uldaq::transport::TransportCall;
use uldaq::types::{PulseOutOption, TmrIdleState, TmrStatus, TriggerType};
use uldaq::UlError;

const TIMER_CONTROL: u8 = 0x28;
const TIMER_PARAMETERS: u8 = 0x2D;
const TRIGGER_CONFIG: u8 = 0x43;

fn words(data: &[u8]) -> Vec<u32> {
    data.chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

#[test]
fn test_pulse_out_quantizes_request() {
    let (mock, device) = open_1808();
    let tmr = device.tmr().unwrap();

    let actual = tmr
        .pulse_out_start(1, 1000.0, 0.25, 10, 1e-3, TmrIdleState::Low, PulseOutOption::empty())
        .unwrap();
    assert!(approx_eq!(f64, actual.frequency, 1000.0, ulps = 2));
    assert!(approx_eq!(f64, actual.duty_cycle, 0.25, ulps = 2));
    assert!(approx_eq!(f64, actual.initial_delay, 1e-3, epsilon = 1e-12));

    // 100 MHz clock
    let params = mock.last_sent_data(TIMER_PARAMETERS).unwrap();
    assert_eq!(words(&params), vec![99_999, 24_999, 10, 100_000]);
    assert_eq!(
        mock.sent(TIMER_CONTROL),
        vec![TransportCall::Send {
            request: TIMER_CONTROL,
            value: 0,
            index: 1,
            data: vec![0x01],
        }]
    );
    assert!(mock.sent(TRIGGER_CONFIG).is_empty());

    // 3 MHz does not divide the clock evenly
    let actual = tmr
        .pulse_out_start(0, 3e6, 0.5, 0, 0.0, TmrIdleState::High, PulseOutOption::empty())
        .unwrap();
    assert!(approx_eq!(f64, actual.frequency, 100e6 / 33.0, ulps = 2));
    assert!(approx_eq!(f64, actual.duty_cycle, 17.0 / 33.0, ulps = 2));
    assert_eq!(mock.last_sent_data(TIMER_CONTROL), Some(vec![0x03]));
}

#[test]
fn test_pulse_out_argument_errors() {
    let (mock, device) = open_1808();
    let tmr = device.tmr().unwrap();
    let start = |timer, frequency, duty, delay, options| {
        tmr.pulse_out_start(timer, frequency, duty, 0, delay, TmrIdleState::Low, options)
    };

    assert_eq!(start(2, 1000.0, 0.5, 0.0, PulseOutOption::empty()), Err(UlError::BadTmr));
    assert_eq!(start(0, 0.0, 0.5, 0.0, PulseOutOption::empty()), Err(UlError::BadFrequency));
    assert_eq!(start(0, 60e6, 0.5, 0.0, PulseOutOption::empty()), Err(UlError::BadFrequency));
    assert_eq!(start(0, f64::NAN, 0.5, 0.0, PulseOutOption::empty()), Err(UlError::BadFrequency));
    assert_eq!(start(0, 1000.0, 1.0, 0.0, PulseOutOption::empty()), Err(UlError::BadDutyCycle));
    assert_eq!(start(0, 1000.0, 0.0, 0.0, PulseOutOption::empty()), Err(UlError::BadDutyCycle));
    assert_eq!(start(0, 1000.0, 0.5, -1.0, PulseOutOption::empty()), Err(UlError::BadInitialDelay));
    assert_eq!(start(0, 1000.0, 0.5, 0.0, PulseOutOption::from_bits_retain(1)), Err(UlError::BadOption));
    assert!(mock.calls().is_empty());
}

#[test]
fn test_external_trigger() {
    let (mock, device) = open_1808();
    let tmr = device.tmr().unwrap();

    assert_eq!(
        tmr.set_trigger(TriggerType::RISING, 0, 1.0, 0.1, 0),
        Err(UlError::BadTrigType)
    );
    tmr.set_trigger(TriggerType::NEG_EDGE, 0, 0.0, 0.0, 0).unwrap();
    tmr.pulse_out_start(
        0,
        500.0,
        0.5,
        0,
        0.0,
        TmrIdleState::Low,
        PulseOutOption::EXTTRIGGER | PulseOutOption::RETRIGGER,
    )
    .unwrap();

    assert_eq!(mock.last_sent_data(TRIGGER_CONFIG), Some(vec![1]));
    assert_eq!(mock.last_sent_data(TIMER_CONTROL), Some(vec![0x01 | 0x04 | 0x08]));
}

#[test]
fn test_status_and_stop() {
    let (mock, device) = open_1808();
    let tmr = device.tmr().unwrap();

    assert_eq!(tmr.pulse_out_status(0).unwrap(), TmrStatus::Idle);
    mock.set_query_response(TIMER_CONTROL, vec![0x01]);
    assert_eq!(tmr.pulse_out_status(0).unwrap(), TmrStatus::Running);

    tmr.pulse_out_stop(0).unwrap();
    assert_eq!(mock.last_sent_data(TIMER_CONTROL), Some(vec![0]));

    mock.clear_calls();
    device.disconnect().unwrap();
    let stopped: Vec<u16> = mock
        .sent(TIMER_CONTROL)
        .into_iter()
        .map(|call| match call {
            TransportCall::Send { index, .. } => index,
            TransportCall::Query { .. } => unreachable!(),
        })
        .collect();
    assert_eq!(stopped, vec![0, 1]);
    assert_eq!(tmr.pulse_out_status(0), Err(UlError::NoConnectionEstablished));
}
