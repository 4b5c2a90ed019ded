//! USB-24xx analog input.
//!
//! Every channel converts at its own data rate; a scan walks the uploaded
//! queue and spends `1/rate + 640 µs` (mux settling) on each element. The
//! pacer only sets how often the queue restarts.

use std::sync::Arc;

use tracing::{debug, trace};

use super::{Model, CAL_TABLE_ADDR};
use crate::device::{AiInfo, CmdKey, DeviceCore, ScanCaps};
use crate::endian::{read_f32_le, read_u32_le, write_u32_le};
use crate::error::{Result, UlError};
use crate::range::Range;
use crate::scan::{CjcSource, HwStatus, SampleFormat, ScanStrategy};
use crate::subsystem::{AiBackend, AiChanConfig, AiQueueElement, AiScanSetup};
use crate::timing::PacerSetting;
use crate::transport::EP_SCAN_IN;
use crate::types::{
    AInScanFlag, AiChanQueueLimitation, AiChanType, AiInputMode, AiQueueType, OtdMode, ScanOption, TcType,
    TriggerType,
};

/// ADC resolution.
pub const RESOLUTION: u32 = 24;
/// Ranges, in register order. Calibration is per range.
pub const RANGES: [Range; 8] = [
    Range::Bip10Volts,
    Range::Bip5Volts,
    Range::Bip2Pt5Volts,
    Range::Bip1Pt25Volts,
    Range::BipPt625Volts,
    Range::BipPt312Volts,
    Range::BipPt156Volts,
    Range::BipPt078Volts,
];
/// Selectable conversion rates in S/s, in register order.
pub const DATA_RATES: [f64; 14] = [
    3750.0, 2000.0, 1000.0, 500.0, 100.0, 60.0, 50.0, 30.0, 25.0, 15.0, 10.0, 7.5, 5.0, 2.5,
];
/// Rate a channel starts with.
pub const DEFAULT_DATA_RATE: f64 = 1000.0;
/// Queue capacity.
pub const MAX_QUEUE_LEN: usize = 64;
/// Pacer base clock.
pub const PACER_CLOCK: f64 = 1e6;
/// Largest pacer divider.
pub const MAX_PACER_PERIOD: u64 = 1 << 32;
/// Mux settling added to every conversion.
pub const SETTLING_TIME: f64 = 640e-6;
/// Thermocouple inputs sharing one CJC sensor.
pub const CHANS_PER_CJC: u32 = 4;

const WORD_MASK: u64 = 0x00FF_FFFF;
const OTD_ENABLE: u16 = 0x8000;

const MODE_SE: u8 = 0;
const MODE_DIFF: u8 = 1;

const OPT_CONTINUOUS: u8 = 0x01;

const STATUS_RUNNING: u8 = 0x02;
const STATUS_OVERRUN: u8 = 0x04;

/// Fastest per-channel scan rate: one channel at the top data rate.
pub fn max_scan_rate() -> f64 {
    queue_scan_rate([DATA_RATES[0]])
}

/// Scan rate a queue of channels converting at `rates` can sustain.
pub fn queue_scan_rate(rates: impl IntoIterator<Item = f64>) -> f64 {
    let period: f64 = rates.into_iter().map(|r| 1.0 / r + SETTLING_TIME).sum();
    1.0 / period
}

fn range_index(range: Range) -> Result<u8> {
    RANGES
        .iter()
        .position(|r| *r == range)
        .map(|i| i as u8)
        .ok_or(UlError::BadRange)
}

fn rate_index(rate: f64) -> Result<u8> {
    DATA_RATES
        .iter()
        .position(|r| *r == rate)
        .map(|i| i as u8)
        .ok_or(UlError::BadArg)
}

fn mode_code(mode: AiInputMode) -> Result<u8> {
    match mode {
        AiInputMode::SingleEnded => Ok(MODE_SE),
        AiInputMode::Differential => Ok(MODE_DIFF),
        AiInputMode::PseudoDifferential => Err(UlError::BadInputMode),
    }
}

/// Scan limits.
pub fn scan_caps() -> ScanCaps {
    let max_rate = max_scan_rate();
    ScanCaps {
        clock_freq: PACER_CLOCK,
        max_pacer_period: MAX_PACER_PERIOD,
        min_scan_rate: PACER_CLOCK / MAX_PACER_PERIOD as f64,
        max_scan_rate: max_rate,
        max_throughput: max_rate,
        max_burst_rate: 0.0,
        max_burst_throughput: 0.0,
        fifo_size: 4096,
        sample_size: 4,
        scan_options: ScanOption::SINGLEIO | ScanOption::BLOCKIO | ScanOption::CONTINUOUS,
        trigger_types: TriggerType::empty(),
        min_scan_sample_count: 1,
    }
}

/// Analog input capabilities.
pub fn info(model: Model) -> AiInfo {
    let diff = model.num_chans_diff();
    AiInfo {
        resolution: RESOLUTION,
        num_chans_se: diff * 2,
        num_chans_diff: diff,
        num_chans_pseudo_diff: 0,
        chan_types: AiChanType::VOLTAGE | AiChanType::TC,
        ranges_se: RANGES.to_vec(),
        ranges_diff: RANGES.to_vec(),
        tc_types: vec![TcType::J, TcType::K, TcType::T],
        scan_flags: AInScanFlag::NOSCALEDATA | AInScanFlag::NOCALIBRATEDATA,
        queue_types: AiQueueType::CHAN | AiQueueType::CHAN_MODE | AiQueueType::RANGE,
        queue_limitations: AiChanQueueLimitation::empty(),
        max_queue_length_se: MAX_QUEUE_LEN,
        max_queue_length_diff: MAX_QUEUE_LEN,
        data_rates: DATA_RATES.to_vec(),
        scan: scan_caps(),
    }
}

/// `wValue` and `wIndex` of a single conversion.
fn a_in_address(element: &AiQueueElement, config: &AiChanConfig) -> Result<(u16, u16)> {
    let mut value = (u16::from(mode_code(element.input_mode)?) << 8) | (element.channel as u16 & 0xFF);
    if config.chan_type == AiChanType::TC && config.otd == OtdMode::Enabled {
        value |= OTD_ENABLE;
    }
    let index = (u16::from(rate_index(config.data_rate)?) << 8) | u16::from(range_index(element.range)?);
    Ok((value, index))
}

/// Queue upload: element count, then `[chan, mode, range, rate]` per element.
fn encode_queue(elements: &[AiQueueElement], configs: &[AiChanConfig]) -> Result<Vec<u8>> {
    if elements.is_empty() || elements.len() > MAX_QUEUE_LEN || elements.len() != configs.len() {
        return Err(UlError::BadQueueSize);
    }
    let mut payload = Vec::with_capacity(1 + elements.len() * 4);
    payload.push(elements.len() as u8);
    for (element, config) in elements.iter().zip(configs) {
        payload.extend_from_slice(&[
            element.channel as u8,
            mode_code(element.input_mode)?,
            range_index(element.range)?,
            rate_index(config.data_rate)?,
        ]);
    }
    Ok(payload)
}

/// Analog input backend.
pub struct Usb24xxAi {
    core: Arc<DeviceCore>,
    cjc: Arc<Usb24xxCjc>,
}

impl Usb24xxAi {
    /// Backend over `core`.
    pub fn new(core: Arc<DeviceCore>, model: Model) -> Self {
        let cjc = Arc::new(Usb24xxCjc {
            core: Arc::clone(&core),
            sensors: (model.num_chans_diff() / CHANS_PER_CJC) as usize,
        });
        Self { core, cjc }
    }
}

impl AiBackend for Usb24xxAi {
    fn sample_format(&self) -> SampleFormat {
        SampleFormat::Signed { bits: RESOLUTION }
    }

    fn cal_table(&self) -> Option<(u32, usize)> {
        Some((CAL_TABLE_ADDR, RANGES.len()))
    }

    fn cal_coef_index(&self, _chan: u32, _mode: AiInputMode, range: Range) -> usize {
        range_index(range).map_or(0, usize::from)
    }

    fn default_chan_config(&self) -> AiChanConfig {
        AiChanConfig {
            data_rate: DEFAULT_DATA_RATE,
            ..AiChanConfig::default()
        }
    }

    fn read_raw(&self, element: &AiQueueElement, config: &AiChanConfig) -> Result<u64> {
        let (value, index) = a_in_address(element, config)?;
        let reply = self.core.query_exact(CmdKey::AIn, value, index, 4)?;
        let word = read_u32_le(&reply, 0)?;
        trace!(chan = element.channel, word, "AIn");
        Ok(u64::from(word) & WORD_MASK)
    }

    fn scan_strategy(&self, setup: &AiScanSetup) -> Result<Arc<dyn ScanStrategy>> {
        let queue = encode_queue(&setup.elements, &setup.chan_configs)?;
        let strategy = Usb24xxScan::new(
            Arc::clone(&self.core),
            queue,
            setup.samples_per_chan,
            setup.pacer,
            setup.options,
        )?;
        Ok(Arc::new(strategy))
    }

    fn max_scan_rate(&self, _elements: &[AiQueueElement], configs: &[AiChanConfig]) -> Option<f64> {
        if configs.is_empty() || configs.iter().any(|c| !(c.data_rate > 0.0)) {
            return None;
        }
        Some(queue_scan_rate(configs.iter().map(|c| c.data_rate)))
    }

    fn cjc_source(&self) -> Option<Arc<dyn CjcSource>> {
        Some(Arc::clone(&self.cjc) as Arc<dyn CjcSource>)
    }

    fn cjc_slot(&self, chan: u32) -> usize {
        (chan / CHANS_PER_CJC) as usize
    }
}

/// On-board cold-junction sensors, reported as `f32` °C.
pub struct Usb24xxCjc {
    core: Arc<DeviceCore>,
    sensors: usize,
}

impl CjcSource for Usb24xxCjc {
    fn read_cjc_temps(&self) -> Result<Vec<f64>> {
        let reply = self.core.query_exact(CmdKey::Cjc, 0, 0, self.sensors * 4)?;
        (0..self.sensors)
            .map(|i| read_f32_le(&reply, i * 4).map(f64::from))
            .collect()
    }
}

/// Queue-driven input scan.
pub struct Usb24xxScan {
    core: Arc<DeviceCore>,
    queue: Vec<u8>,
    count: u32,
    period: u32,
    options: u8,
}

impl Usb24xxScan {
    fn new(
        core: Arc<DeviceCore>,
        queue: Vec<u8>,
        samples_per_chan: usize,
        pacer: PacerSetting,
        options: ScanOption,
    ) -> Result<Self> {
        let continuous = options.contains(ScanOption::CONTINUOUS);
        let count = if continuous {
            0
        } else {
            u32::try_from(samples_per_chan).map_err(|_| UlError::BadSampleCount)?
        };
        let period = u32::try_from(pacer.period.saturating_sub(1)).map_err(|_| UlError::BadRate)?;
        Ok(Self {
            core,
            queue,
            count,
            period,
            options: if continuous { OPT_CONTINUOUS } else { 0 },
        })
    }
}

impl ScanStrategy for Usb24xxScan {
    fn endpoint(&self) -> u8 {
        EP_SCAN_IN
    }

    fn encode_channel_config(&self) -> Result<()> {
        self.core.send_cmd(CmdKey::AInScanQueue, 0, 0, &self.queue)
    }

    fn clear_fifo(&self) -> Result<()> {
        self.core.send_cmd(CmdKey::AInClearFifo, 0, 0, &[])
    }

    fn arm_scan(&self) -> Result<()> {
        let packet = (self.core.transport().max_packet_size(EP_SCAN_IN) / 4).clamp(1, 255) as u8;
        let mut payload = [0u8; 10];
        write_u32_le(&mut payload, 0, self.count)?;
        write_u32_le(&mut payload, 4, self.period)?;
        payload[8] = packet - 1;
        payload[9] = self.options;
        debug!(elements = self.queue.first().copied().unwrap_or(0), period = self.period, count = self.count, "Arming input scan");
        self.core.send_cmd(CmdKey::AInScanStart, 0, 0, &payload)
    }

    fn disarm_scan(&self) -> Result<()> {
        self.core.send_cmd(CmdKey::AInScanStop, 0, 0, &[])
    }

    fn decode_raw_sample(&self, _chan: usize, raw: u64) -> u64 {
        raw & WORD_MASK
    }

    fn query_hw_status(&self) -> Result<HwStatus> {
        let reply = self.core.query_exact(CmdKey::Status, 0, 0, 1)?;
        let status = reply[0];
        trace!(status, "Input status");
        Ok(HwStatus {
            running: status & STATUS_RUNNING != 0,
            error: (status & STATUS_OVERRUN != 0).then_some(UlError::Overrun),
        })
    }
}
