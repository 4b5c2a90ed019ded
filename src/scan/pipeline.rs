//! Sample conversion between wire words and caller buffers.
//!
//! Input path, per sample:
//!
//! ```text
//!   wire word ─► decode (family) ─► sign handling ─► calibration ─► EU scale ─► custom scale
//!                                                                     └─► thermocouple: CJC + NIST
//! ```
//!
//! The output path runs the same steps in reverse. One routine handles every
//! wire width ([`SampleCodec`]) and both buffer kinds ([`ScanSample`]).

use std::sync::Arc;

use tracing::{trace, warn};

use super::codec::SampleCodec;
use super::info::ScanInfo;
use crate::calibration::{sign_extend, signed_to_unsigned, CalCoef, CustomScale};
use crate::error::{Result, UlError};
use crate::nist;
use crate::range::EuScale;
use crate::types::{TcType, TempScale};

/// Value written into scan buffers for an open or out-of-range thermocouple.
pub const OPEN_TC_VALUE: f64 = -9999.0;

/// How an ADC/DAC word encodes a code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    /// Offset binary, `bits` wide
    Unsigned {
        /// Resolution
        bits: u32,
    },
    /// Two's complement in the low `bits`
    Signed {
        /// Resolution
        bits: u32,
    },
}

impl SampleFormat {
    /// Resolution in bits.
    pub fn bits(self) -> u32 {
        match self {
            Self::Unsigned { bits } | Self::Signed { bits } => bits,
        }
    }

    /// Number of codes.
    pub fn full_scale(self) -> f64 {
        (1u64 << self.bits()) as f64
    }

    /// Largest unsigned code.
    pub fn max_code(self) -> u64 {
        (1u64 << self.bits()) - 1
    }

    /// Word the converter reports when its input is saturated high.
    pub fn saturated_code(self) -> u64 {
        match self {
            Self::Unsigned { bits } => (1u64 << bits) - 1,
            Self::Signed { bits } => (1u64 << (bits - 1)) - 1,
        }
    }
}

/// Conversion of one analog channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalogConversion {
    /// Calibration for the channel's range
    pub cal: CalCoef,
    /// Range scale
    pub scale: EuScale,
    /// User scale, applied to engineering units
    pub custom: CustomScale,
    /// Wire encoding
    pub format: SampleFormat,
    /// Apply `cal`
    pub calibrate: bool,
    /// Convert codes to engineering units
    pub scale_data: bool,
}

impl AnalogConversion {
    /// Calibrated code in the unsigned domain.
    #[inline]
    pub fn code(&self, raw: u64) -> f64 {
        match self.format {
            SampleFormat::Unsigned { .. } => {
                let code = (raw & self.format.max_code()) as f64;
                if self.calibrate {
                    self.cal.apply(code)
                } else {
                    code
                }
            }
            SampleFormat::Signed { bits } => {
                let signed = f64::from(sign_extend(raw as u32, bits));
                let calibrated = if self.calibrate {
                    self.cal.apply(signed)
                } else {
                    signed
                };
                signed_to_unsigned(calibrated, bits)
            }
        }
    }

    /// Calibrated volts, ignoring the custom scale.
    #[inline]
    pub fn volts(&self, raw: u64) -> f64 {
        self.scale.to_eu(self.code(raw), self.format.full_scale())
    }

    /// Buffer value for a raw word.
    #[inline]
    pub fn to_value(&self, raw: u64) -> f64 {
        if self.scale_data {
            self.custom.apply(self.volts(raw))
        } else {
            self.clamped_code(self.code(raw)) as f64
        }
    }

    /// Integer code for a raw word.
    #[inline]
    pub fn to_count(&self, raw: u64) -> u64 {
        self.clamped_code(self.code(raw))
    }

    /// Wire word for an engineering value (output direction).
    pub fn to_word(&self, value: f64) -> u64 {
        let code = if self.scale_data {
            self.scale
                .from_eu(self.custom.invert(value), self.format.full_scale())
        } else {
            value
        };
        self.code_to_word(code)
    }

    /// Wire word for a code (output direction).
    pub fn code_to_word(&self, code: f64) -> u64 {
        let code = if self.calibrate {
            self.cal.apply(code)
        } else {
            code
        };
        let code = self.clamped_code(code);
        match self.format {
            SampleFormat::Unsigned { .. } => code,
            SampleFormat::Signed { bits } => {
                let half = 1i64 << (bits - 1);
                ((code as i64 - half) as u64) & self.format.max_code()
            }
        }
    }

    fn clamped_code(&self, code: f64) -> u64 {
        if code.is_nan() {
            return 0;
        }
        code.round().clamp(0.0, self.format.max_code() as f64) as u64
    }
}

/// Conversion of one thermocouple channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TcConversion {
    /// Voltage conversion of the channel
    pub analog: AnalogConversion,
    /// Sensor type
    pub tc_type: TcType,
    /// Index into the CJC temperatures
    pub cjc_slot: usize,
    /// Open-thermocouple detection enabled
    pub otd: bool,
    /// Unit of the result
    pub temp_scale: TempScale,
}

impl TcConversion {
    /// True when the word is a saturated reading with detection enabled.
    pub fn is_open(&self, raw: u64) -> bool {
        self.otd && (raw & self.analog.format.max_code()) == self.analog.format.saturated_code()
    }

    /// Temperature for a raw word given the CJC readings in °C.
    pub fn temperature(&self, raw: u64, cjc: &[f64]) -> Result<f64> {
        if self.is_open(raw) {
            return Err(UlError::OpenConnection);
        }
        if !self.analog.scale_data {
            return Ok(self.analog.to_count(raw) as f64);
        }

        let volts = self.analog.volts(raw);
        let value = match self.temp_scale {
            TempScale::Volts => volts,
            TempScale::NoScale => self.analog.to_count(raw) as f64,
            scale => {
                let cjc_c = cjc
                    .get(self.cjc_slot)
                    .copied()
                    .ok_or(UlError::Internal)?;
                let celsius = nist::compensated_temp(self.tc_type, volts * 1000.0, cjc_c)
                    .ok_or(UlError::TempOutOfRange)?;
                scale.from_celsius(celsius)
            }
        };
        Ok(self.analog.custom.apply(value))
    }
}

/// Per-channel conversion rule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChannelConversion {
    /// Voltage or current channel
    Analog(AnalogConversion),
    /// Thermocouple channel
    Thermocouple(TcConversion),
    /// Digital port word, masked to the port width
    Raw {
        /// Valid bits
        mask: u64,
    },
    /// Counter word, truncated to `bits`
    Counter {
        /// Counter width
        bits: u32,
    },
}

impl ChannelConversion {
    fn mask(bits: u32) -> u64 {
        if bits >= 64 {
            u64::MAX
        } else {
            (1u64 << bits) - 1
        }
    }

    /// Engineering value of a raw input word.
    #[inline]
    pub fn to_f64(&self, raw: u64, cjc: &[f64]) -> f64 {
        match self {
            Self::Analog(conv) => conv.to_value(raw),
            Self::Thermocouple(conv) => conv.temperature(raw, cjc).unwrap_or(OPEN_TC_VALUE),
            Self::Raw { mask } => (raw & mask) as f64,
            Self::Counter { bits } => (raw & Self::mask(*bits)) as f64,
        }
    }

    /// Integer value of a raw input word.
    #[inline]
    pub fn to_u64(&self, raw: u64) -> u64 {
        match self {
            Self::Analog(conv) => conv.to_count(raw),
            Self::Thermocouple(conv) => conv.analog.to_count(raw),
            Self::Raw { mask } => raw & mask,
            Self::Counter { bits } => raw & Self::mask(*bits),
        }
    }

    /// Wire word for an output value.
    #[inline]
    pub fn f64_to_word(&self, value: f64) -> u64 {
        match self {
            Self::Analog(conv) => conv.to_word(value),
            Self::Thermocouple(conv) => conv.analog.to_word(value),
            Self::Raw { mask } => (value.max(0.0) as u64) & mask,
            Self::Counter { bits } => (value.max(0.0) as u64) & Self::mask(*bits),
        }
    }

    /// Wire word for an integer output value.
    #[inline]
    pub fn u64_to_word(&self, value: u64) -> u64 {
        match self {
            Self::Analog(conv) => conv.code_to_word(value as f64),
            Self::Thermocouple(conv) => conv.analog.code_to_word(value as f64),
            Self::Raw { mask } => value & mask,
            Self::Counter { bits } => value & Self::mask(*bits),
        }
    }
}

/// Element type of a scan buffer.
pub trait ScanSample: Copy + Send + 'static {
    /// Convert a decoded input word.
    fn from_input(conv: &ChannelConversion, raw: u64, cjc: &[f64]) -> Self;

    /// Convert into an output wire word.
    fn to_output(self, conv: &ChannelConversion) -> u64;
}

impl ScanSample for f64 {
    #[inline]
    fn from_input(conv: &ChannelConversion, raw: u64, cjc: &[f64]) -> Self {
        conv.to_f64(raw, cjc)
    }

    #[inline]
    fn to_output(self, conv: &ChannelConversion) -> u64 {
        conv.f64_to_word(self)
    }
}

impl ScanSample for u64 {
    #[inline]
    fn from_input(conv: &ChannelConversion, raw: u64, _cjc: &[f64]) -> Self {
        conv.to_u64(raw)
    }

    #[inline]
    fn to_output(self, conv: &ChannelConversion) -> u64 {
        conv.u64_to_word(self)
    }
}

/// Source of cold-junction temperatures in °C.
pub trait CjcSource: Send + Sync {
    /// Current temperature of every CJC sensor.
    fn read_cjc_temps(&self) -> Result<Vec<f64>>;
}

struct CjcState {
    source: Arc<dyn CjcSource>,
    temps: Vec<f64>,
    refresh_samples: u64,
    next_refresh: u64,
}

impl CjcState {
    fn refresh(&mut self, total: u64) {
        if total < self.next_refresh {
            return;
        }
        match self.source.read_cjc_temps() {
            Ok(temps) => {
                trace!(?temps, "CJC refreshed");
                self.temps = temps;
            }
            Err(e) => warn!(error = %e, "CJC read failed, keeping previous values"),
        }
        self.next_refresh = total + self.refresh_samples;
    }
}

/// Stateful converter for one scan.
pub struct Pipeline {
    conversions: Vec<ChannelConversion>,
    cjc: Option<CjcState>,
    carry: Vec<u8>,
}

impl Pipeline {
    /// Pipeline over the per-channel conversions, in scan order.
    pub fn new(conversions: Vec<ChannelConversion>) -> Self {
        Self {
            conversions,
            cjc: None,
            carry: Vec::new(),
        }
    }

    /// Refresh CJC temperatures from `source` every `refresh_samples`
    /// samples (all channels).
    pub fn with_cjc(mut self, source: Arc<dyn CjcSource>, refresh_samples: u64) -> Self {
        self.cjc = Some(CjcState {
            source,
            temps: Vec::new(),
            refresh_samples: refresh_samples.max(1),
            next_refresh: 0,
        });
        self
    }

    /// Conversions in scan order.
    pub fn conversions(&self) -> &[ChannelConversion] {
        &self.conversions
    }

    fn store_input<T, F>(&mut self, info: &mut ScanInfo, raw: u64, buffer: &mut [T], decode: &F) -> bool
    where
        T: ScanSample,
        F: Fn(usize, u64) -> u64,
    {
        if info.all_samples_transferred {
            return false;
        }
        let chan = info.current_cal_coef_idx;
        let cjc: &[f64] = match self.cjc.as_mut() {
            Some(state) => {
                state.refresh(info.total_sample_transferred);
                &state.temps
            }
            None => &[],
        };

        let raw = decode(chan, raw);
        if let (Some(conv), Some(slot)) = (
            self.conversions.get(chan),
            buffer.get_mut(info.current_data_buffer_idx),
        ) {
            *slot = T::from_input(conv, raw, cjc);
        }
        info.advance()
    }

    /// Convert a block of input bytes into `buffer`, advancing the cursors.
    ///
    /// A word split across two blocks is carried over to the next call.
    /// Returns the number of samples stored; bytes past the end of a finite
    /// scan are discarded.
    pub fn process_input<W, T, F>(
        &mut self,
        info: &mut ScanInfo,
        bytes: &[u8],
        buffer: &mut [T],
        decode: F,
    ) -> usize
    where
        W: SampleCodec,
        T: ScanSample,
        F: Fn(usize, u64) -> u64,
    {
        let start = info.total_sample_transferred;
        let mut data = bytes;

        if !self.carry.is_empty() {
            let take = (W::WIDTH - self.carry.len()).min(data.len());
            self.carry.extend_from_slice(&data[..take]);
            data = &data[take..];
            if self.carry.len() < W::WIDTH {
                return 0;
            }
            let raw = W::read_le(&self.carry).to_u64();
            self.carry.clear();
            if !self.store_input(info, raw, buffer, &decode) {
                return (info.total_sample_transferred - start) as usize;
            }
        }

        let mut chunks = data.chunks_exact(W::WIDTH);
        for chunk in &mut chunks {
            let raw = W::read_le(chunk).to_u64();
            if !self.store_input(info, raw, buffer, &decode) {
                return (info.total_sample_transferred - start) as usize;
            }
        }
        self.carry.extend_from_slice(chunks.remainder());

        (info.total_sample_transferred - start) as usize
    }

    /// Fill `out` with wire words taken from `buffer`, advancing the cursors.
    ///
    /// Returns the number of bytes written, a whole number of words. A
    /// finite scan stops at the end of the buffer.
    pub fn process_output<W, T>(&mut self, info: &mut ScanInfo, out: &mut [u8], buffer: &[T]) -> usize
    where
        W: SampleCodec,
        T: ScanSample,
    {
        let mut written = 0;
        for word in out.chunks_exact_mut(W::WIDTH) {
            if info.all_samples_transferred {
                break;
            }
            let chan = info.current_cal_coef_idx;
            let value = match (buffer.get(info.current_data_buffer_idx), self.conversions.get(chan)) {
                (Some(sample), Some(conv)) => sample.to_output(conv),
                _ => 0,
            };
            W::from_u64(value).write_le(word);
            written += W::WIDTH;
            if !info.advance() {
                break;
            }
        }
        written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::range::Range;
    use crate::types::FunctionType;
    use float_cmp::approx_eq;

    fn analog(format: SampleFormat, range: Range) -> AnalogConversion {
        AnalogConversion {
            cal: CalCoef::IDENTITY,
            scale: range.eu_scale(),
            custom: CustomScale::IDENTITY,
            format,
            calibrate: true,
            scale_data: true,
        }
    }

    fn words_u32(values: &[u32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn test_identity_calibration_matches_scale() {
        let conv = analog(SampleFormat::Unsigned { bits: 16 }, Range::Bip10Volts);
        for raw in [0u64, 1, 0x7FFF, 0x8000, 0xFFFF] {
            let expected = Range::Bip10Volts.eu_scale().to_eu(raw as f64, 65536.0);
            assert!(approx_eq!(f64, conv.to_value(raw), expected, epsilon = 1e-12));
        }
        assert!(approx_eq!(f64, conv.to_value(0), -10.0, epsilon = 1e-12));
        assert!(approx_eq!(f64, conv.to_value(0x8000), 0.0, epsilon = 1e-12));
    }

    #[test]
    fn test_signed_words() {
        let conv = analog(SampleFormat::Signed { bits: 24 }, Range::Bip10Volts);
        // zero, most negative, most positive
        assert!(approx_eq!(f64, conv.to_value(0), 0.0, epsilon = 1e-9));
        assert!(approx_eq!(f64, conv.to_value(0x80_0000), -10.0, epsilon = 1e-9));
        let top = 10.0 - 20.0 / f64::from(1u32 << 24);
        assert!(approx_eq!(f64, conv.to_value(0x7F_FFFF), top, epsilon = 1e-9));
    }

    #[test]
    fn test_calibration_and_custom_scale() {
        let mut conv = analog(SampleFormat::Unsigned { bits: 16 }, Range::Uni10Volts);
        conv.cal = CalCoef::new(1.0, 100.0);
        conv.custom = CustomScale { slope: 2.0, offset: 1.0 };
        let volts = 100.0 * 10.0 / 65536.0;
        assert!(approx_eq!(f64, conv.to_value(0), volts * 2.0 + 1.0, epsilon = 1e-12));

        conv.calibrate = false;
        assert!(approx_eq!(f64, conv.to_value(0), 1.0, epsilon = 1e-12));

        conv.scale_data = false;
        conv.calibrate = true;
        assert_eq!(conv.to_value(0), 100.0);
        assert_eq!(conv.to_count(0xFFFF), 0xFFFF);
    }

    #[test]
    fn test_output_inverse_clamps() {
        let mut conv = analog(SampleFormat::Unsigned { bits: 16 }, Range::Bip10Volts);
        assert_eq!(conv.to_word(0.0), 0x8000);
        assert_eq!(conv.to_word(-10.0), 0);
        assert_eq!(conv.to_word(25.0), 0xFFFF);
        assert_eq!(conv.to_word(-25.0), 0);

        conv.cal = CalCoef::new(1.0, -10.0);
        assert_eq!(conv.to_word(-10.0), 0);
        assert_eq!(conv.to_word(0.0), 0x8000 - 10);

        conv.scale_data = false;
        conv.calibrate = false;
        assert_eq!(conv.to_word(1234.0), 1234);
    }

    #[test]
    fn test_thermocouple_open_and_temperature() {
        let conv = TcConversion {
            analog: analog(SampleFormat::Signed { bits: 24 }, Range::BipPt078Volts),
            tc_type: TcType::K,
            cjc_slot: 1,
            otd: true,
            temp_scale: TempScale::Celsius,
        };
        assert!(conv.is_open(0x7F_FFFF));
        assert_eq!(conv.temperature(0x7F_FFFF, &[0.0, 0.0]), Err(UlError::OpenConnection));
        assert_eq!(
            ChannelConversion::Thermocouple(conv).to_f64(0x7F_FFFF, &[0.0, 0.0]),
            OPEN_TC_VALUE
        );

        // 0 V with the junction at 25 °C reads 25 °C
        let t = conv.temperature(0, &[0.0, 25.0]).unwrap();
        assert!(approx_eq!(f64, t, 25.0, epsilon = 0.05));

        // missing CJC slot
        assert_eq!(conv.temperature(0, &[25.0]), Err(UlError::Internal));
    }

    #[test]
    fn test_process_input_carries_split_words() {
        let conv = ChannelConversion::Raw { mask: u64::from(u32::MAX) };
        let mut pipeline = Pipeline::new(vec![conv, conv]);
        let mut info = ScanInfo::new(FunctionType::Di, 2, 2, 4, false);
        let mut buffer = vec![0u64; 4];

        let bytes = words_u32(&[1, 2, 3, 4, 5]);
        let n = pipeline.process_input::<u32, u64, _>(&mut info, &bytes[..6], &mut buffer, |_, r| r);
        assert_eq!(n, 1);
        let n = pipeline.process_input::<u32, u64, _>(&mut info, &bytes[6..], &mut buffer, |_, r| r);
        // the fifth word is past the end of the finite scan
        assert_eq!(n, 3);
        assert_eq!(buffer, vec![1, 2, 3, 4]);
        assert!(info.all_samples_transferred);
    }

    #[test]
    fn test_process_input_wraps_continuous() {
        let conv = ChannelConversion::Counter { bits: 16 };
        let mut pipeline = Pipeline::new(vec![conv]);
        let mut info = ScanInfo::new(FunctionType::Ctr, 1, 3, 4, true);
        let mut buffer = vec![0f64; 3];

        let bytes = words_u32(&[10, 11, 12, 0x1_000D]);
        let n = pipeline.process_input::<u32, f64, _>(&mut info, &bytes, &mut buffer, |_, r| r);
        assert_eq!(n, 4);
        assert_eq!(buffer, vec![13.0, 11.0, 12.0]);
        assert_eq!(info.current_data_buffer_idx, 1);
    }

    #[test]
    fn test_decode_hook_sees_channel() {
        let conv = ChannelConversion::Raw { mask: 0xFF };
        let mut pipeline = Pipeline::new(vec![conv, conv]);
        let mut info = ScanInfo::new(FunctionType::Di, 2, 1, 2, false);
        let mut buffer = vec![0u64; 2];
        let bytes: Vec<u8> = [1u16, 1].iter().flat_map(|v| v.to_le_bytes()).collect();
        pipeline.process_input::<u16, u64, _>(&mut info, &bytes, &mut buffer, |chan, r| {
            r + chan as u64 * 10
        });
        assert_eq!(buffer, vec![1, 11]);
    }

    #[test]
    fn test_process_output() {
        let conv = ChannelConversion::Analog(analog(
            SampleFormat::Unsigned { bits: 16 },
            Range::Bip10Volts,
        ));
        let mut pipeline = Pipeline::new(vec![conv, conv]);
        let mut info = ScanInfo::new(FunctionType::Ao, 2, 2, 2, false);
        let buffer = vec![-10.0, 0.0, 10.0, 50.0];
        let mut out = vec![0u8; 12];

        let n = pipeline.process_output::<u16, f64>(&mut info, &mut out, &buffer);
        assert_eq!(n, 8);
        let words: Vec<u16> = out[..8]
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        assert_eq!(words, vec![0, 0x8000, 0xFFFF, 0xFFFF]);
        assert!(info.all_samples_transferred);
    }

    struct FixedCjc(std::sync::atomic::AtomicUsize);

    impl CjcSource for FixedCjc {
        fn read_cjc_temps(&self) -> Result<Vec<f64>> {
            self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(vec![25.0])
        }
    }

    #[test]
    fn test_cjc_refresh_interval() {
        let source = Arc::new(FixedCjc(std::sync::atomic::AtomicUsize::new(0)));
        let conv = ChannelConversion::Thermocouple(TcConversion {
            analog: analog(SampleFormat::Signed { bits: 24 }, Range::BipPt078Volts),
            tc_type: TcType::J,
            cjc_slot: 0,
            otd: false,
            temp_scale: TempScale::Celsius,
        });
        let mut pipeline = Pipeline::new(vec![conv]).with_cjc(source.clone(), 4);
        let mut info = ScanInfo::new(FunctionType::Ai, 1, 10, 4, false);
        let mut buffer = vec![0f64; 10];
        let bytes = words_u32(&[0; 10]);
        pipeline.process_input::<u32, f64, _>(&mut info, &bytes, &mut buffer, |_, r| r);

        // refreshed at samples 0, 4 and 8
        assert_eq!(source.0.load(std::sync::atomic::Ordering::SeqCst), 3);
        assert!(approx_eq!(f64, buffer[9], 25.0, epsilon = 0.05));
    }
}
