//! Handle-based surface mirroring `uldaq.h`.
//!
//! Every function returns a [`UlError`] (`ERR_NO_ERROR` on success) and
//! writes results through `&mut` out-parameters. Scan starts take the
//! requested rate by reference and replace it with the achievable rate.
//! Neither an `Err` nor a panic crosses this boundary: [`call`] turns both
//! into error codes.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::{debug, error};

use crate::config::UlConfig;
use crate::device::DaqDevice;
use crate::error::{err_msg, Result, UlError};
use crate::events::EventCallback;
use crate::family::{create_device, DaqDeviceDescriptor};
use crate::range::Range;
use crate::scan::ScanBuffer;
use crate::subsystem::{AiQueueElement, CtrScanConfig, DaqInChanDescriptor, DaqOutChanDescriptor};
use crate::transport::UsbTransport;
use crate::types::{
    AInFlag, AInScanFlag, AOutArrayFlag, AOutFlag, AOutScanFlag, AiChanType, AiInputMode, CInScanFlag,
    CounterRegisterType, DInScanFlag, DOutScanFlag, DaqEventType, DaqInScanFlag, DaqOutScanFlag,
    DigitalDirection, DigitalPortType, FunctionType, MemRegion, OtdMode, PulseOutOption, ScanOption,
    ScanStatus, TInFlag, TcType, TempScale, TmrIdleState, TmrStatus, TransferStatus, TriggerType, WaitType,
};

/// Opaque device handle. Never 0 for a live device.
pub type DaqDeviceHandle = i64;

static DEVICES: Lazy<RwLock<HashMap<DaqDeviceHandle, Arc<DaqDevice>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));
static NEXT_HANDLE: AtomicI64 = AtomicI64::new(1);

/// Run `f`, mapping its error and any panic to an error code.
pub fn call<F>(f: F) -> UlError
where
    F: FnOnce() -> Result<()>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => UlError::NoError,
        Ok(Err(e)) => {
            debug!(error = %e, code = e.code(), "API call failed");
            e
        }
        Err(_) => {
            error!("Panic caught at the API boundary");
            UlError::UnhandledException
        }
    }
}

fn device(handle: DaqDeviceHandle) -> Result<Arc<DaqDevice>> {
    DEVICES
        .read()
        .get(&handle)
        .cloned()
        .ok_or(UlError::BadDevHandle)
}

fn with_device<F>(handle: DaqDeviceHandle, f: F) -> UlError
where
    F: FnOnce(&DaqDevice) -> Result<()>,
{
    call(|| {
        let device = device(handle)?;
        f(&device)
    })
}

// =============================================================================
// Device lifetime
// =============================================================================

/// Create a device object for `descriptor`, reachable through `transport`.
pub fn ul_create_daq_device(
    descriptor: &DaqDeviceDescriptor,
    transport: Arc<dyn UsbTransport>,
    config: UlConfig,
    handle: &mut DaqDeviceHandle,
) -> UlError {
    call(|| {
        let device = create_device(descriptor, transport, config)?;
        let id = NEXT_HANDLE.fetch_add(1, Ordering::Relaxed);
        DEVICES.write().insert(id, Arc::new(device));
        *handle = id;
        Ok(())
    })
}

/// Disconnect and forget a device. The handle becomes invalid.
pub fn ul_release_daq_device(handle: DaqDeviceHandle) -> UlError {
    call(|| {
        let device = DEVICES.write().remove(&handle).ok_or(UlError::BadDevHandle)?;
        if device.is_connected() {
            device.disconnect()?;
        }
        Ok(())
    })
}

/// Establish the session with the device.
pub fn ul_connect_daq_device(handle: DaqDeviceHandle) -> UlError {
    with_device(handle, DaqDevice::connect)
}

/// Stop every scan and close the session.
pub fn ul_disconnect_daq_device(handle: DaqDeviceHandle) -> UlError {
    with_device(handle, DaqDevice::disconnect)
}

/// Connection state.
pub fn ul_is_daq_device_connected(handle: DaqDeviceHandle, connected: &mut bool) -> UlError {
    with_device(handle, |d| {
        *connected = d.is_connected();
        Ok(())
    })
}

/// Descriptor of an open device.
pub fn ul_get_daq_device_descriptor(handle: DaqDeviceHandle, descriptor: &mut DaqDeviceDescriptor) -> UlError {
    with_device(handle, |d| {
        let info = d.dev_info();
        *descriptor = DaqDeviceDescriptor::new(info.product_id, info.unique_id.clone());
        Ok(())
    })
}

/// Blink the device LED.
pub fn ul_flash_led(handle: DaqDeviceHandle, flash_count: u8) -> UlError {
    with_device(handle, |d| d.flash_led(flash_count))
}

// =============================================================================
// Analog input
// =============================================================================

/// Single analog read.
pub fn ul_a_in(
    handle: DaqDeviceHandle,
    chan: u32,
    mode: AiInputMode,
    range: Range,
    flags: AInFlag,
    data: &mut f64,
) -> UlError {
    with_device(handle, |d| {
        *data = d.ai()?.a_in(chan, mode, range, flags)?;
        Ok(())
    })
}

/// Start an analog input scan.
#[allow(clippy::too_many_arguments)]
pub fn ul_a_in_scan(
    handle: DaqDeviceHandle,
    low_chan: u32,
    high_chan: u32,
    mode: AiInputMode,
    range: Range,
    samples_per_chan: usize,
    rate: &mut f64,
    options: ScanOption,
    flags: AInScanFlag,
    data: &ScanBuffer<f64>,
) -> UlError {
    with_device(handle, |d| {
        *rate = d
            .ai()?
            .a_in_scan(low_chan, high_chan, mode, range, samples_per_chan, *rate, options, flags, data)?;
        Ok(())
    })
}

/// Load (or clear, with an empty slice) the analog input queue.
pub fn ul_a_in_load_queue(handle: DaqDeviceHandle, queue: &[AiQueueElement]) -> UlError {
    with_device(handle, |d| d.ai()?.a_in_load_queue(queue))
}

/// Trigger of the next analog input scan.
pub fn ul_a_in_set_trigger(
    handle: DaqDeviceHandle,
    trig_type: TriggerType,
    trig_chan: u32,
    level: f64,
    variance: f64,
    retrig_count: u32,
) -> UlError {
    with_device(handle, |d| {
        d.ai()?
            .a_in_set_trigger(trig_type, trig_chan, level, variance, retrig_count)
    })
}

/// Analog input scan status.
pub fn ul_a_in_scan_status(handle: DaqDeviceHandle, status: &mut ScanStatus, xfer: &mut TransferStatus) -> UlError {
    with_device(handle, |d| {
        (*status, *xfer) = d.ai()?.a_in_scan_status()?;
        Ok(())
    })
}

/// Stop the analog input scan.
pub fn ul_a_in_scan_stop(handle: DaqDeviceHandle) -> UlError {
    with_device(handle, |d| d.ai()?.a_in_scan_stop())
}

/// Wait for the analog input scan.
pub fn ul_a_in_scan_wait(handle: DaqDeviceHandle, wait_type: WaitType, wait_param: i64, timeout: f64) -> UlError {
    with_device(handle, |d| d.ai()?.a_in_scan_wait(wait_type, wait_param, timeout))
}

/// Single thermocouple read.
pub fn ul_t_in(handle: DaqDeviceHandle, chan: u32, scale: TempScale, flags: TInFlag, data: &mut f64) -> UlError {
    with_device(handle, |d| {
        *data = d.ai()?.t_in(chan, scale, flags)?;
        Ok(())
    })
}

/// Thermocouple block read into `data[..=high_chan - low_chan]`.
pub fn ul_t_in_array(
    handle: DaqDeviceHandle,
    low_chan: u32,
    high_chan: u32,
    scale: TempScale,
    flags: TInFlag,
    data: &mut [f64],
) -> UlError {
    with_device(handle, |d| {
        let values = d.ai()?.t_in_array(low_chan, high_chan, scale, flags)?;
        let out = data.get_mut(..values.len()).ok_or(UlError::BadBufferSize)?;
        out.copy_from_slice(&values);
        Ok(())
    })
}

/// Channel type of an analog input.
pub fn ul_ai_set_chan_type(handle: DaqDeviceHandle, chan: u32, chan_type: AiChanType) -> UlError {
    with_device(handle, |d| d.ai()?.set_chan_type(chan, chan_type))
}

/// Thermocouple type of an analog input.
pub fn ul_ai_set_chan_tc_type(handle: DaqDeviceHandle, chan: u32, tc_type: TcType) -> UlError {
    with_device(handle, |d| d.ai()?.set_chan_tc_type(chan, tc_type))
}

/// Conversion rate of an analog input.
pub fn ul_ai_set_chan_data_rate(handle: DaqDeviceHandle, chan: u32, rate: f64) -> UlError {
    with_device(handle, |d| d.ai()?.set_chan_data_rate(chan, rate))
}

/// Open-thermocouple detection of an analog input.
pub fn ul_ai_set_chan_otd_mode(handle: DaqDeviceHandle, chan: u32, otd: OtdMode) -> UlError {
    with_device(handle, |d| d.ai()?.set_chan_otd_mode(chan, otd))
}

/// User scale of an analog input.
pub fn ul_ai_set_custom_scale(handle: DaqDeviceHandle, chan: u32, slope: f64, offset: f64) -> UlError {
    with_device(handle, |d| d.ai()?.set_custom_scale(chan, slope, offset))
}

// =============================================================================
// Analog output
// =============================================================================

/// Single analog write.
pub fn ul_a_out(handle: DaqDeviceHandle, chan: u32, range: Range, flags: AOutFlag, data: f64) -> UlError {
    with_device(handle, |d| d.ao()?.a_out(chan, range, flags, data))
}

/// Simultaneous write of `low_chan..=high_chan`.
pub fn ul_a_out_array(
    handle: DaqDeviceHandle,
    low_chan: u32,
    high_chan: u32,
    ranges: &[Range],
    flags: AOutArrayFlag,
    data: &[f64],
) -> UlError {
    with_device(handle, |d| d.ao()?.a_out_array(low_chan, high_chan, ranges, flags, data))
}

/// Start an analog output scan.
#[allow(clippy::too_many_arguments)]
pub fn ul_a_out_scan(
    handle: DaqDeviceHandle,
    low_chan: u32,
    high_chan: u32,
    range: Range,
    samples_per_chan: usize,
    rate: &mut f64,
    options: ScanOption,
    flags: AOutScanFlag,
    data: &ScanBuffer<f64>,
) -> UlError {
    with_device(handle, |d| {
        *rate = d
            .ao()?
            .a_out_scan(low_chan, high_chan, range, samples_per_chan, *rate, options, flags, data)?;
        Ok(())
    })
}

/// Trigger of the next analog output scan.
pub fn ul_a_out_set_trigger(
    handle: DaqDeviceHandle,
    trig_type: TriggerType,
    trig_chan: u32,
    level: f64,
    variance: f64,
    retrig_count: u32,
) -> UlError {
    with_device(handle, |d| {
        d.ao()?
            .a_out_set_trigger(trig_type, trig_chan, level, variance, retrig_count)
    })
}

/// Analog output scan status.
pub fn ul_a_out_scan_status(handle: DaqDeviceHandle, status: &mut ScanStatus, xfer: &mut TransferStatus) -> UlError {
    with_device(handle, |d| {
        (*status, *xfer) = d.ao()?.a_out_scan_status()?;
        Ok(())
    })
}

/// Stop the analog output scan.
pub fn ul_a_out_scan_stop(handle: DaqDeviceHandle) -> UlError {
    with_device(handle, |d| d.ao()?.a_out_scan_stop())
}

/// Wait for the analog output scan.
pub fn ul_a_out_scan_wait(handle: DaqDeviceHandle, wait_type: WaitType, wait_param: i64, timeout: f64) -> UlError {
    with_device(handle, |d| d.ao()?.a_out_scan_wait(wait_type, wait_param, timeout))
}

// =============================================================================
// Digital I/O
// =============================================================================

/// Direction of a whole port.
pub fn ul_d_config_port(handle: DaqDeviceHandle, port: DigitalPortType, direction: DigitalDirection) -> UlError {
    with_device(handle, |d| d.dio()?.d_config_port(port, direction))
}

/// Direction of one bit.
pub fn ul_d_config_bit(
    handle: DaqDeviceHandle,
    port: DigitalPortType,
    bit: u32,
    direction: DigitalDirection,
) -> UlError {
    with_device(handle, |d| d.dio()?.d_config_bit(port, bit, direction))
}

/// Read a port.
pub fn ul_d_in(handle: DaqDeviceHandle, port: DigitalPortType, data: &mut u64) -> UlError {
    with_device(handle, |d| {
        *data = d.dio()?.d_in(port)?;
        Ok(())
    })
}

/// Write a port.
pub fn ul_d_out(handle: DaqDeviceHandle, port: DigitalPortType, data: u64) -> UlError {
    with_device(handle, |d| d.dio()?.d_out(port, data))
}

/// Read one bit.
pub fn ul_d_bit_in(handle: DaqDeviceHandle, port: DigitalPortType, bit: u32, value: &mut u32) -> UlError {
    with_device(handle, |d| {
        *value = d.dio()?.d_bit_in(port, bit)?;
        Ok(())
    })
}

/// Write one bit.
pub fn ul_d_bit_out(handle: DaqDeviceHandle, port: DigitalPortType, bit: u32, value: u32) -> UlError {
    with_device(handle, |d| d.dio()?.d_bit_out(port, bit, value))
}

/// Start a digital input scan.
#[allow(clippy::too_many_arguments)]
pub fn ul_d_in_scan(
    handle: DaqDeviceHandle,
    low_port: DigitalPortType,
    high_port: DigitalPortType,
    samples_per_chan: usize,
    rate: &mut f64,
    options: ScanOption,
    flags: DInScanFlag,
    data: &ScanBuffer<u64>,
) -> UlError {
    with_device(handle, |d| {
        *rate = d
            .dio()?
            .d_in_scan(low_port, high_port, samples_per_chan, *rate, options, flags, data)?;
        Ok(())
    })
}

/// Start a digital output scan.
#[allow(clippy::too_many_arguments)]
pub fn ul_d_out_scan(
    handle: DaqDeviceHandle,
    low_port: DigitalPortType,
    high_port: DigitalPortType,
    samples_per_chan: usize,
    rate: &mut f64,
    options: ScanOption,
    flags: DOutScanFlag,
    data: &ScanBuffer<u64>,
) -> UlError {
    with_device(handle, |d| {
        *rate = d
            .dio()?
            .d_out_scan(low_port, high_port, samples_per_chan, *rate, options, flags, data)?;
        Ok(())
    })
}

fn d_set_trigger(
    handle: DaqDeviceHandle,
    function: FunctionType,
    trig_type: TriggerType,
    trig_chan: u32,
    level: f64,
    variance: f64,
    retrig_count: u32,
) -> UlError {
    with_device(handle, |d| {
        d.dio()?
            .d_set_trigger(function, trig_type, trig_chan, level, variance, retrig_count)
    })
}

/// Trigger of the next digital input scan.
pub fn ul_d_in_set_trigger(
    handle: DaqDeviceHandle,
    trig_type: TriggerType,
    trig_chan: u32,
    level: f64,
    variance: f64,
    retrig_count: u32,
) -> UlError {
    d_set_trigger(handle, FunctionType::Di, trig_type, trig_chan, level, variance, retrig_count)
}

/// Trigger of the next digital output scan.
pub fn ul_d_out_set_trigger(
    handle: DaqDeviceHandle,
    trig_type: TriggerType,
    trig_chan: u32,
    level: f64,
    variance: f64,
    retrig_count: u32,
) -> UlError {
    d_set_trigger(handle, FunctionType::Do, trig_type, trig_chan, level, variance, retrig_count)
}

/// Digital input scan status.
pub fn ul_d_in_scan_status(handle: DaqDeviceHandle, status: &mut ScanStatus, xfer: &mut TransferStatus) -> UlError {
    with_device(handle, |d| {
        (*status, *xfer) = d.dio()?.d_scan_status(FunctionType::Di)?;
        Ok(())
    })
}

/// Digital output scan status.
pub fn ul_d_out_scan_status(handle: DaqDeviceHandle, status: &mut ScanStatus, xfer: &mut TransferStatus) -> UlError {
    with_device(handle, |d| {
        (*status, *xfer) = d.dio()?.d_scan_status(FunctionType::Do)?;
        Ok(())
    })
}

/// Stop the digital input scan.
pub fn ul_d_in_scan_stop(handle: DaqDeviceHandle) -> UlError {
    with_device(handle, |d| d.dio()?.d_scan_stop(FunctionType::Di))
}

/// Stop the digital output scan.
pub fn ul_d_out_scan_stop(handle: DaqDeviceHandle) -> UlError {
    with_device(handle, |d| d.dio()?.d_scan_stop(FunctionType::Do))
}

/// Wait for the digital input scan.
pub fn ul_d_in_scan_wait(handle: DaqDeviceHandle, wait_type: WaitType, wait_param: i64, timeout: f64) -> UlError {
    with_device(handle, |d| {
        d.dio()?
            .d_scan_wait(FunctionType::Di, wait_type, wait_param, timeout)
    })
}

/// Wait for the digital output scan.
pub fn ul_d_out_scan_wait(handle: DaqDeviceHandle, wait_type: WaitType, wait_param: i64, timeout: f64) -> UlError {
    with_device(handle, |d| {
        d.dio()?
            .d_scan_wait(FunctionType::Do, wait_type, wait_param, timeout)
    })
}

// =============================================================================
// Counters
// =============================================================================

/// Read a counter's count register.
pub fn ul_c_in(handle: DaqDeviceHandle, ctr: u32, data: &mut u64) -> UlError {
    with_device(handle, |d| {
        *data = d.ctr()?.c_in(ctr)?;
        Ok(())
    })
}

/// Read any counter register.
pub fn ul_c_read(handle: DaqDeviceHandle, ctr: u32, register: CounterRegisterType, data: &mut u64) -> UlError {
    with_device(handle, |d| {
        *data = d.ctr()?.c_read(ctr, register)?;
        Ok(())
    })
}

/// Load a counter register.
pub fn ul_c_load(handle: DaqDeviceHandle, ctr: u32, register: CounterRegisterType, value: u64) -> UlError {
    with_device(handle, |d| d.ctr()?.c_load(ctr, register, value))
}

/// Zero a counter.
pub fn ul_c_clear(handle: DaqDeviceHandle, ctr: u32) -> UlError {
    with_device(handle, |d| d.ctr()?.c_clear(ctr))
}

/// Measurement configuration of a counter.
pub fn ul_c_config_scan(handle: DaqDeviceHandle, ctr: u32, config: CtrScanConfig) -> UlError {
    with_device(handle, |d| d.ctr()?.c_config_scan(ctr, config))
}

/// Start a counter input scan.
#[allow(clippy::too_many_arguments)]
pub fn ul_c_in_scan(
    handle: DaqDeviceHandle,
    low_ctr: u32,
    high_ctr: u32,
    samples_per_chan: usize,
    rate: &mut f64,
    options: ScanOption,
    flags: CInScanFlag,
    data: &ScanBuffer<u64>,
) -> UlError {
    with_device(handle, |d| {
        *rate = d
            .ctr()?
            .c_in_scan(low_ctr, high_ctr, samples_per_chan, *rate, options, flags, data)?;
        Ok(())
    })
}

/// Trigger of the next counter scan.
pub fn ul_c_in_set_trigger(
    handle: DaqDeviceHandle,
    trig_type: TriggerType,
    trig_chan: u32,
    level: f64,
    variance: f64,
    retrig_count: u32,
) -> UlError {
    with_device(handle, |d| {
        d.ctr()?
            .c_set_trigger(trig_type, trig_chan, level, variance, retrig_count)
    })
}

/// Counter scan status.
pub fn ul_c_in_scan_status(handle: DaqDeviceHandle, status: &mut ScanStatus, xfer: &mut TransferStatus) -> UlError {
    with_device(handle, |d| {
        (*status, *xfer) = d.ctr()?.c_in_scan_status()?;
        Ok(())
    })
}

/// Stop the counter scan.
pub fn ul_c_in_scan_stop(handle: DaqDeviceHandle) -> UlError {
    with_device(handle, |d| d.ctr()?.c_in_scan_stop())
}

/// Wait for the counter scan.
pub fn ul_c_in_scan_wait(handle: DaqDeviceHandle, wait_type: WaitType, wait_param: i64, timeout: f64) -> UlError {
    with_device(handle, |d| d.ctr()?.c_in_scan_wait(wait_type, wait_param, timeout))
}

// =============================================================================
// Timers
// =============================================================================

/// Start a pulse train. `frequency`, `duty_cycle` and `initial_delay` are
/// replaced by the values the hardware will produce.
#[allow(clippy::too_many_arguments)]
pub fn ul_tmr_pulse_out_start(
    handle: DaqDeviceHandle,
    tmr: u32,
    frequency: &mut f64,
    duty_cycle: &mut f64,
    pulse_count: u64,
    initial_delay: &mut f64,
    idle_state: TmrIdleState,
    options: PulseOutOption,
) -> UlError {
    with_device(handle, |d| {
        let actual = d.tmr()?.pulse_out_start(
            tmr,
            *frequency,
            *duty_cycle,
            pulse_count,
            *initial_delay,
            idle_state,
            options,
        )?;
        *frequency = actual.frequency;
        *duty_cycle = actual.duty_cycle;
        *initial_delay = actual.initial_delay;
        Ok(())
    })
}

/// Stop a pulse train.
pub fn ul_tmr_pulse_out_stop(handle: DaqDeviceHandle, tmr: u32) -> UlError {
    with_device(handle, |d| d.tmr()?.pulse_out_stop(tmr))
}

/// Pulse train state.
pub fn ul_tmr_pulse_out_status(handle: DaqDeviceHandle, tmr: u32, status: &mut TmrStatus) -> UlError {
    with_device(handle, |d| {
        *status = d.tmr()?.pulse_out_status(tmr)?;
        Ok(())
    })
}

/// Trigger of the next pulse train.
pub fn ul_tmr_set_trigger(
    handle: DaqDeviceHandle,
    trig_type: TriggerType,
    trig_chan: u32,
    level: f64,
    variance: f64,
    retrig_count: u32,
) -> UlError {
    with_device(handle, |d| {
        d.tmr()?
            .set_trigger(trig_type, trig_chan, level, variance, retrig_count)
    })
}

// =============================================================================
// Synchronous input / output
// =============================================================================

/// Start a synchronous input scan.
#[allow(clippy::too_many_arguments)]
pub fn ul_daq_in_scan(
    handle: DaqDeviceHandle,
    descriptors: &[DaqInChanDescriptor],
    samples_per_chan: usize,
    rate: &mut f64,
    options: ScanOption,
    flags: DaqInScanFlag,
    data: &ScanBuffer<f64>,
) -> UlError {
    with_device(handle, |d| {
        *rate = d
            .daqi()?
            .daq_in_scan(descriptors, samples_per_chan, *rate, options, flags, data)?;
        Ok(())
    })
}

/// Trigger of the next synchronous input scan.
pub fn ul_daq_in_set_trigger(
    handle: DaqDeviceHandle,
    trig_type: TriggerType,
    trig_chan: u32,
    level: f64,
    variance: f64,
    retrig_count: u32,
) -> UlError {
    with_device(handle, |d| {
        d.daqi()?
            .daq_in_set_trigger(trig_type, trig_chan, level, variance, retrig_count)
    })
}

/// Synchronous input scan status.
pub fn ul_daq_in_scan_status(handle: DaqDeviceHandle, status: &mut ScanStatus, xfer: &mut TransferStatus) -> UlError {
    with_device(handle, |d| {
        (*status, *xfer) = d.daqi()?.daq_in_scan_status()?;
        Ok(())
    })
}

/// Stop the synchronous input scan.
pub fn ul_daq_in_scan_stop(handle: DaqDeviceHandle) -> UlError {
    with_device(handle, |d| d.daqi()?.daq_in_scan_stop())
}

/// Wait for the synchronous input scan.
pub fn ul_daq_in_scan_wait(handle: DaqDeviceHandle, wait_type: WaitType, wait_param: i64, timeout: f64) -> UlError {
    with_device(handle, |d| d.daqi()?.daq_in_scan_wait(wait_type, wait_param, timeout))
}

/// Start a synchronous output scan.
#[allow(clippy::too_many_arguments)]
pub fn ul_daq_out_scan(
    handle: DaqDeviceHandle,
    descriptors: &[DaqOutChanDescriptor],
    samples_per_chan: usize,
    rate: &mut f64,
    options: ScanOption,
    flags: DaqOutScanFlag,
    data: &ScanBuffer<f64>,
) -> UlError {
    with_device(handle, |d| {
        *rate = d
            .daqo()?
            .daq_out_scan(descriptors, samples_per_chan, *rate, options, flags, data)?;
        Ok(())
    })
}

/// Trigger of the next synchronous output scan.
pub fn ul_daq_out_set_trigger(
    handle: DaqDeviceHandle,
    trig_type: TriggerType,
    trig_chan: u32,
    level: f64,
    variance: f64,
    retrig_count: u32,
) -> UlError {
    with_device(handle, |d| {
        d.daqo()?
            .daq_out_set_trigger(trig_type, trig_chan, level, variance, retrig_count)
    })
}

/// Synchronous output scan status.
pub fn ul_daq_out_scan_status(handle: DaqDeviceHandle, status: &mut ScanStatus, xfer: &mut TransferStatus) -> UlError {
    with_device(handle, |d| {
        (*status, *xfer) = d.daqo()?.daq_out_scan_status()?;
        Ok(())
    })
}

/// Stop the synchronous output scan.
pub fn ul_daq_out_scan_stop(handle: DaqDeviceHandle) -> UlError {
    with_device(handle, |d| d.daqo()?.daq_out_scan_stop())
}

/// Wait for the synchronous output scan.
pub fn ul_daq_out_scan_wait(handle: DaqDeviceHandle, wait_type: WaitType, wait_param: i64, timeout: f64) -> UlError {
    with_device(handle, |d| d.daqo()?.daq_out_scan_wait(wait_type, wait_param, timeout))
}

// =============================================================================
// Events, memory, messages
// =============================================================================

/// Register a scan event callback.
pub fn ul_enable_event(
    handle: DaqDeviceHandle,
    types: DaqEventType,
    param: u64,
    callback: EventCallback,
) -> UlError {
    with_device(handle, |d| d.enable_event(types, param, callback))
}

/// Remove scan event callbacks.
pub fn ul_disable_event(handle: DaqDeviceHandle, types: DaqEventType) -> UlError {
    with_device(handle, |d| d.disable_event(types))
}

/// Read device memory into `buf`; `count` receives the bytes read.
pub fn ul_mem_read(
    handle: DaqDeviceHandle,
    region: MemRegion,
    address: u32,
    buf: &mut [u8],
    count: &mut usize,
) -> UlError {
    with_device(handle, |d| {
        *count = d.mem_read(region, address, buf)?;
        Ok(())
    })
}

/// Write `data` to device memory; `count` receives the bytes written.
pub fn ul_mem_write(
    handle: DaqDeviceHandle,
    region: MemRegion,
    address: u32,
    data: &[u8],
    count: &mut usize,
) -> UlError {
    with_device(handle, |d| {
        *count = d.mem_write(region, address, data)?;
        Ok(())
    })
}

/// Message for an error code.
pub fn ul_get_err_msg(code: i32) -> &'static str {
    err_msg(code)
}
