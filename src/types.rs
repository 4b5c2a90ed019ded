//! Enumerations and bitmasks of the UL surface.
//!
//! Numeric values match the public `uldaq.h` constants so they can cross an
//! FFI boundary unchanged.

use bitflags::bitflags;

/// Analog input mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum AiInputMode {
    /// Differential
    Differential = 1,
    /// Single-ended
    SingleEnded = 2,
    /// Pseudo-differential
    PseudoDifferential = 3,
}

bitflags! {
    /// Analog input channel type.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AiChanType: u32 {
        /// Voltage
        const VOLTAGE = 1;
        /// Thermocouple
        const TC = 1 << 1;
        /// Resistance temperature detector
        const RTD = 1 << 2;
        /// Thermistor
        const THERMISTOR = 1 << 3;
        /// Semiconductor sensor
        const SEMICONDUCTOR = 1 << 4;
        /// Channel disabled
        const DISABLED = 1 << 30;
    }
}

/// Thermocouple type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum TcType {
    /// Type J
    J = 1,
    /// Type K
    K = 2,
    /// Type T
    T = 3,
    /// Type E
    E = 4,
    /// Type R
    R = 5,
    /// Type S
    S = 6,
    /// Type B
    B = 7,
    /// Type N
    N = 8,
}

/// Temperature unit for `t_in`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum TempScale {
    /// Celsius
    Celsius = 1,
    /// Fahrenheit
    Fahrenheit = 2,
    /// Kelvin
    Kelvin = 3,
    /// Calibrated volts
    Volts = 4,
    /// Raw counts
    NoScale = 5,
}

impl TempScale {
    /// Convert a Celsius value into this scale. `Volts` and `NoScale`
    /// return the input unchanged.
    pub fn from_celsius(self, celsius: f64) -> f64 {
        match self {
            Self::Celsius => celsius,
            Self::Fahrenheit => celsius * 1.8 + 32.0,
            Self::Kelvin => celsius + 273.15,
            Self::Volts | Self::NoScale => celsius,
        }
    }
}

bitflags! {
    /// Scan options.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ScanOption: u32 {
        /// Transfer one sample at a time
        const SINGLEIO = 1;
        /// Transfer blocks of samples
        const BLOCKIO = 1 << 1;
        /// Hold all samples in the device FIFO until the scan completes
        const BURSTIO = 1 << 2;
        /// Run until stopped
        const CONTINUOUS = 1 << 3;
        /// External pacer clock
        const EXTCLOCK = 1 << 4;
        /// Wait for the configured trigger
        const EXTTRIGGER = 1 << 5;
        /// Re-arm the trigger after each batch
        const RETRIGGER = 1 << 6;
        /// Burst mode (minimum interchannel delay)
        const BURSTMODE = 1 << 7;
        /// Output the pacer clock
        const PACEROUT = 1 << 8;
        /// External time base
        const EXTTIMEBASE = 1 << 9;
        /// Output the time base
        const TIMEBASEOUT = 1 << 10;
    }
}

impl ScanOption {
    /// Default transfer mode and internal pacer.
    pub const DEFAULTIO: Self = Self::empty();
}

bitflags! {
    /// Flags for `a_in_scan`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AInScanFlag: u32 {
        /// Return calibrated counts instead of engineering units
        const NOSCALEDATA = 1;
        /// Skip calibration
        const NOCALIBRATEDATA = 1 << 1;
    }
}

bitflags! {
    /// Flags for `a_in`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AInFlag: u32 {
        /// Return calibrated counts instead of engineering units
        const NOSCALEDATA = 1;
        /// Skip calibration
        const NOCALIBRATEDATA = 1 << 1;
    }
}

bitflags! {
    /// Flags for `a_out_scan`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AOutScanFlag: u32 {
        /// Input data is counts rather than engineering units
        const NOSCALEDATA = 1;
        /// Skip calibration
        const NOCALIBRATEDATA = 1 << 1;
    }
}

bitflags! {
    /// Flags for `a_out`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AOutFlag: u32 {
        /// Input data is counts rather than engineering units
        const NOSCALEDATA = 1;
        /// Skip calibration
        const NOCALIBRATEDATA = 1 << 1;
    }
}

bitflags! {
    /// Flags for `a_out_array`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AOutArrayFlag: u32 {
        /// Input data is counts rather than engineering units
        const NOSCALEDATA = 1;
        /// Skip calibration
        const NOCALIBRATEDATA = 1 << 1;
        /// Update all channels at once
        const SIMULTANEOUS = 1 << 2;
    }
}

bitflags! {
    /// Flags for `d_in_scan`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DInScanFlag: u32 {}
}

bitflags! {
    /// Flags for `d_out_scan`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DOutScanFlag: u32 {}
}

bitflags! {
    /// Flags for `c_in_scan`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CInScanFlag: u32 {
        /// Truncate counts to 16 bits
        const CTR16_BIT = 1;
        /// Truncate counts to 32 bits
        const CTR32_BIT = 1 << 1;
        /// Return full 64-bit counts
        const CTR64_BIT = 1 << 2;
        /// Do not clear counters at scan start
        const NOCLEAR = 1 << 3;
    }
}

bitflags! {
    /// Flags for `daq_in_scan`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DaqInScanFlag: u32 {
        /// Analog channels return calibrated counts
        const NOSCALEDATA = 1;
        /// Skip analog calibration
        const NOCALIBRATEDATA = 1 << 1;
        /// Do not clear counters at scan start
        const NOCLEAR = 1 << 3;
    }
}

bitflags! {
    /// Flags for `daq_out_scan`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DaqOutScanFlag: u32 {
        /// Analog data is counts rather than engineering units
        const NOSCALEDATA = 1;
        /// Skip analog calibration
        const NOCALIBRATEDATA = 1 << 1;
    }
}

bitflags! {
    /// Flags for `t_in` and `t_in_array`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TInFlag: u32 {
        /// Wait for a fresh conversion before returning
        const WAIT_FOR_NEW_DATA = 1;
    }
}

/// Background operation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(i32)]
pub enum ScanStatus {
    /// No scan running
    #[default]
    Idle = 0,
    /// Scan running
    Running = 1,
}

/// Progress of a background scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransferStatus {
    /// Complete scans (one sample of every channel) transferred
    pub current_scan_count: u64,
    /// Samples transferred across all channels
    pub current_total_count: u64,
    /// Buffer index of the first sample of the last complete scan, -1 before
    /// the first scan completes
    pub current_index: i64,
}

impl TransferStatus {
    /// Status reported before any data has moved.
    pub const EMPTY: Self = Self {
        current_scan_count: 0,
        current_total_count: 0,
        current_index: -1,
    };
}

bitflags! {
    /// Trigger types.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TriggerType: u32 {
        /// Digital rising edge
        const POS_EDGE = 1;
        /// Digital falling edge
        const NEG_EDGE = 1 << 1;
        /// Digital high level
        const HIGH = 1 << 2;
        /// Digital low level
        const LOW = 1 << 3;
        /// Gate high
        const GATE_HIGH = 1 << 4;
        /// Gate low
        const GATE_LOW = 1 << 5;
        /// Analog rising through level
        const RISING = 1 << 6;
        /// Analog falling through level
        const FALLING = 1 << 7;
        /// Analog above level
        const ABOVE = 1 << 8;
        /// Analog below level
        const BELOW = 1 << 9;
        /// Digital pattern equal
        const PATTERN_EQ = 1 << 16;
        /// Digital pattern not equal
        const PATTERN_NE = 1 << 17;
    }
}

impl TriggerType {
    /// No trigger configured.
    pub const NONE: Self = Self::empty();

    /// True when exactly one trigger type bit is set.
    pub fn is_single(self) -> bool {
        self.bits().count_ones() == 1
    }
}

/// What `*_scan_wait` waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum WaitType {
    /// Wait until the scan leaves the running state
    UntilDone = 1,
}

/// Subsystem function that owns a background operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum FunctionType {
    /// Analog input
    Ai = 1,
    /// Analog output
    Ao = 2,
    /// Digital input
    Di = 3,
    /// Digital output
    Do = 4,
    /// Counter input
    Ctr = 5,
    /// Timer output
    Tmr = 6,
    /// Synchronous input
    DaqI = 7,
    /// Synchronous output
    DaqO = 8,
}

impl FunctionType {
    /// Input functions fire input-direction events.
    pub fn is_input(self) -> bool {
        matches!(self, Self::Ai | Self::Di | Self::Ctr | Self::DaqI)
    }
}

bitflags! {
    /// Event types.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DaqEventType: u32 {
        /// A block of samples is available
        const ON_DATA_AVAILABLE = 1;
        /// An input scan stopped on error
        const ON_INPUT_SCAN_ERROR = 1 << 1;
        /// An input scan completed
        const ON_END_OF_INPUT_SCAN = 1 << 2;
        /// An output scan stopped on error
        const ON_OUTPUT_SCAN_ERROR = 1 << 3;
        /// An output scan completed
        const ON_END_OF_OUTPUT_SCAN = 1 << 4;
    }
}

bitflags! {
    /// Device memory regions.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MemRegion: u32 {
        /// Calibration coefficients
        const CAL = 1;
        /// User area
        const USER = 1 << 1;
        /// Device settings
        const SETTINGS = 1 << 2;
        /// Reserved
        const RESERVED0 = 1 << 3;
    }
}

bitflags! {
    /// Memory region permissions.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MemAccessType: u32 {
        /// Readable
        const READ = 1;
        /// Writable
        const WRITE = 1 << 1;
    }
}

/// Digital port identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum DigitalPortType {
    /// Auxiliary port
    AuxPort = 1,
    /// Auxiliary port 1
    AuxPort1 = 2,
    /// Auxiliary port 2
    AuxPort2 = 3,
    /// First 8255 port A
    FirstPortA = 10,
    /// First 8255 port B
    FirstPortB = 11,
    /// First 8255 port C low nibble
    FirstPortCL = 12,
    /// First 8255 port C high nibble
    FirstPortCH = 13,
}

/// How a digital port can be configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum DigitalPortIoType {
    /// Fixed input
    In = 1,
    /// Fixed output
    Out = 2,
    /// Port-wide direction
    Io = 3,
    /// Per-bit direction
    BitIo = 4,
    /// Not configurable
    NonConfig = 5,
}

/// Digital line direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum DigitalDirection {
    /// Input
    Input = 1,
    /// Output
    Output = 2,
}

bitflags! {
    /// Counter measurement types.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CounterMeasurementType: u32 {
        /// Event counting
        const COUNT = 1;
        /// Period measurement
        const PERIOD = 1 << 1;
        /// Pulse-width measurement
        const PULSE_WIDTH = 1 << 2;
        /// Time between edges on two inputs
        const TIMING = 1 << 3;
        /// Quadrature encoder
        const ENCODER = 1 << 4;
    }
}

impl CounterMeasurementType {
    /// Types whose resolution is set by a tick size.
    pub const TICK_BASED: Self = Self::PERIOD
        .union(Self::PULSE_WIDTH)
        .union(Self::TIMING);
}

bitflags! {
    /// Counter measurement mode bits. Meaning depends on the measurement type.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CounterMeasurementMode: u32 {
        /// Clear the counter after each read
        const CLEAR_ON_READ = 1;
        /// Count down
        const COUNT_DOWN = 1 << 1;
        /// Gate input controls direction
        const GATE_CONTROLS_DIR = 1 << 2;
        /// Gate input clears the counter
        const GATE_CLEARS_CTR = 1 << 3;
        /// Gate input starts counting
        const GATE_TRIG_SRC = 1 << 4;
        /// Drive the counter output
        const OUTPUT_ON = 1 << 5;
        /// Counter output starts high
        const OUTPUT_INITIAL_STATE_HIGH = 1 << 6;
        /// Stop at the limit instead of rolling over
        const NO_RECYCLE = 1 << 7;
        /// Enable min/max limits
        const RANGE_LIMIT_ON = 1 << 8;
        /// Enable gating
        const GATING_ON = 1 << 9;
        /// Invert the gate input
        const INVERT_GATE = 1 << 10;
        /// Period averaged over 10 periods
        const PERIOD_X10 = 1 << 11;
        /// Period averaged over 100 periods
        const PERIOD_X100 = 1 << 12;
        /// Period averaged over 1000 periods
        const PERIOD_X1000 = 1 << 13;
        /// Gate enables period measurement
        const PERIOD_GATING_ON = 1 << 14;
        /// Invert the period gate
        const PERIOD_INVERT_GATE = 1 << 15;
        /// Gate enables pulse-width measurement
        const PULSE_WIDTH_GATING_ON = 1 << 16;
        /// Invert the pulse-width gate
        const PULSE_WIDTH_INVERT_GATE = 1 << 17;
        /// Invert the timing gate
        const TIMING_MODE_INVERT_GATE = 1 << 18;
        /// Encoder 2x decoding
        const ENCODER_X2 = 1 << 19;
        /// Encoder 4x decoding
        const ENCODER_X4 = 1 << 20;
        /// Latch on the Z input
        const ENCODER_LATCH_ON_Z = 1 << 21;
        /// Clear on the Z input
        const ENCODER_CLEAR_ON_Z = 1 << 22;
        /// Encoder does not roll over
        const ENCODER_NO_RECYCLE = 1 << 23;
        /// Encoder min/max limits
        const ENCODER_RANGE_LIMIT_ON = 1 << 24;
        /// Z input active edge is rising
        const ENCODER_Z_ACTIVE_EDGE = 1 << 25;
    }
}

/// Counter input edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum CounterEdgeDetection {
    /// Rising edge
    RisingEdge = 1,
    /// Falling edge
    FallingEdge = 2,
}

/// Counter tick size for period, pulse-width and timing measurements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum CounterTickSize {
    /// 20.83 ns
    Tick20Pt83ns = 1,
    /// 208.3 ns
    Tick208Pt3ns = 2,
    /// 2083.3 ns
    Tick2083Pt3ns = 3,
    /// 20833.3 ns
    Tick20833Pt3ns = 4,
    /// 20 ns
    Tick20ns = 11,
    /// 200 ns
    Tick200ns = 12,
    /// 2000 ns
    Tick2000ns = 13,
    /// 20000 ns
    Tick20000ns = 14,
}

impl CounterTickSize {
    /// Tick period in seconds.
    pub fn seconds(self) -> f64 {
        match self {
            Self::Tick20Pt83ns => 20.83e-9,
            Self::Tick208Pt3ns => 208.3e-9,
            Self::Tick2083Pt3ns => 2083.3e-9,
            Self::Tick20833Pt3ns => 20833.3e-9,
            Self::Tick20ns => 20e-9,
            Self::Tick200ns => 200e-9,
            Self::Tick2000ns => 2000e-9,
            Self::Tick20000ns => 20000e-9,
        }
    }
}

/// Counter debounce mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(i32)]
pub enum CounterDebounceMode {
    /// No debounce
    #[default]
    None = 0,
    /// Trigger once the input is stable
    TriggerAfterStable = 1,
    /// Trigger on the first edge, then hold
    TriggerBeforeStable = 2,
}

/// Counter debounce time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(i32)]
pub enum CounterDebounceTime {
    /// Disabled
    #[default]
    Debounce0ns = 0,
    /// 500 ns
    Debounce500ns = 1,
    /// 1500 ns
    Debounce1500ns = 2,
    /// 3500 ns
    Debounce3500ns = 3,
    /// 7500 ns
    Debounce7500ns = 4,
    /// 15500 ns
    Debounce15500ns = 5,
    /// 31500 ns
    Debounce31500ns = 6,
    /// 63500 ns
    Debounce63500ns = 7,
    /// 127500 ns
    Debounce127500ns = 8,
    /// 100 us
    Debounce100us = 9,
    /// 300 us
    Debounce300us = 10,
    /// 700 us
    Debounce700us = 11,
    /// 1500 us
    Debounce1500us = 12,
    /// 3100 us
    Debounce3100us = 13,
    /// 6300 us
    Debounce6300us = 14,
    /// 12700 us
    Debounce12700us = 15,
    /// 25500 us
    Debounce25500us = 16,
}

bitflags! {
    /// Counter registers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CounterRegisterType: u32 {
        /// Count register
        const COUNT = 1;
        /// Load register
        const LOAD = 1 << 1;
        /// Minimum limit
        const MIN_LIMIT = 1 << 2;
        /// Maximum limit
        const MAX_LIMIT = 1 << 3;
        /// Output toggles when the count reaches this value
        const OUTPUT_VAL0 = 1 << 4;
        /// Output toggles back at this value
        const OUTPUT_VAL1 = 1 << 5;
    }
}

/// Timer output level while idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(i32)]
pub enum TmrIdleState {
    /// Low
    #[default]
    Low = 1,
    /// High
    High = 2,
}

bitflags! {
    /// Pulse output options.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PulseOutOption: u32 {
        /// Wait for the timer trigger
        const EXTTRIGGER = 1 << 5;
        /// Re-arm after each pulse train
        const RETRIGGER = 1 << 6;
    }
}

/// Timer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(i32)]
pub enum TmrStatus {
    /// Idle
    #[default]
    Idle = 0,
    /// Generating pulses
    Running = 1,
}

bitflags! {
    /// Channel types for synchronous input scans.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DaqInChanType: u32 {
        /// Differential analog
        const ANALOG_DIFF = 1;
        /// Single-ended analog
        const ANALOG_SE = 1 << 1;
        /// Digital port
        const DIGITAL = 1 << 2;
        /// 16-bit counter
        const CTR16 = 1 << 3;
        /// 32-bit counter
        const CTR32 = 1 << 4;
        /// 48-bit counter
        const CTR48 = 1 << 5;
        /// 64-bit counter
        const CTR64 = 1 << 6;
        /// Cold-junction sensor
        const CJC = 1 << 7;
        /// Thermocouple
        const TC = 1 << 8;
        /// Pseudo-differential analog
        const ANALOG_PSEUDO_DIFF = 1 << 9;
    }
}

impl DaqInChanType {
    /// Any counter width.
    pub const COUNTERS: Self = Self::CTR16
        .union(Self::CTR32)
        .union(Self::CTR48)
        .union(Self::CTR64);

    /// Any analog mode.
    pub const ANALOG: Self = Self::ANALOG_DIFF
        .union(Self::ANALOG_SE)
        .union(Self::ANALOG_PSEUDO_DIFF);
}

bitflags! {
    /// Channel types for synchronous output scans.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DaqOutChanType: u32 {
        /// Analog output
        const ANALOG = 1;
        /// Digital port
        const DIGITAL = 1 << 1;
    }
}

bitflags! {
    /// What an AI queue element may vary.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AiQueueType: u32 {
        /// Channel
        const CHAN = 1;
        /// Input mode
        const CHAN_MODE = 1 << 1;
        /// Range
        const RANGE = 1 << 2;
    }
}

bitflags! {
    /// Restrictions on channel order within an AI queue.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AiChanQueueLimitation: u32 {
        /// A channel may appear only once
        const UNIQUE_CHAN = 1;
        /// Channels must be in ascending order
        const ASCENDING_CHAN = 1 << 1;
        /// Channels must be consecutive
        const CONSECUTIVE_CHAN = 1 << 2;
    }
}

/// Open thermocouple detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(i32)]
pub enum OtdMode {
    /// Detection on
    #[default]
    Enabled = 1,
    /// Detection off
    Disabled = 2,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_option_values() {
        assert_eq!(ScanOption::DEFAULTIO.bits(), 0);
        assert_eq!(ScanOption::CONTINUOUS.bits(), 8);
        assert_eq!(ScanOption::EXTTRIGGER.bits(), 32);
        assert_eq!(ScanOption::RETRIGGER.bits(), 64);
    }

    #[test]
    fn test_temp_scale() {
        assert_eq!(TempScale::Celsius.from_celsius(25.0), 25.0);
        assert!((TempScale::Fahrenheit.from_celsius(100.0) - 212.0).abs() < 1e-9);
        assert!((TempScale::Kelvin.from_celsius(0.0) - 273.15).abs() < 1e-9);
    }

    #[test]
    fn test_trigger_single() {
        assert!(TriggerType::POS_EDGE.is_single());
        assert!(!(TriggerType::POS_EDGE | TriggerType::HIGH).is_single());
        assert!(!TriggerType::NONE.is_single());
    }

    #[test]
    fn test_tick_based_types() {
        assert!(CounterMeasurementType::TICK_BASED.contains(CounterMeasurementType::PERIOD));
        assert!(!CounterMeasurementType::TICK_BASED.contains(CounterMeasurementType::COUNT));
    }
}
