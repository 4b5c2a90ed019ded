//! Read-only capability descriptions.
//!
//! Each family driver builds these once when the device is opened; the
//! subsystem layer validates every request against them.

use crate::range::Range;
use crate::types::{
    AInScanFlag, AiChanQueueLimitation, AiChanType, AiInputMode, AiQueueType, CInScanFlag,
    CounterDebounceMode, CounterDebounceTime, CounterEdgeDetection, CounterMeasurementMode,
    CounterMeasurementType, CounterRegisterType, CounterTickSize, DaqEventType, DaqInChanType,
    DaqInScanFlag, DaqOutChanType, DaqOutScanFlag, DigitalPortIoType, DigitalPortType,
    MemAccessType, MemRegion, PulseOutOption, ScanOption, TcType, TriggerType,
};

/// Pacing and transfer limits shared by every scanning subsystem.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanCaps {
    /// Pacer base clock in Hz
    pub clock_freq: f64,
    /// Largest pacer period register value
    pub max_pacer_period: u64,
    /// Minimum per-channel rate
    pub min_scan_rate: f64,
    /// Maximum per-channel rate
    pub max_scan_rate: f64,
    /// Maximum aggregate rate (rate x channels)
    pub max_throughput: f64,
    /// Maximum per-channel rate with `SO_BURSTIO`
    pub max_burst_rate: f64,
    /// Maximum aggregate rate with `SO_BURSTIO`
    pub max_burst_throughput: f64,
    /// Device FIFO size in bytes
    pub fifo_size: usize,
    /// Bytes per sample on the wire
    pub sample_size: usize,
    /// Supported scan options
    pub scan_options: ScanOption,
    /// Supported trigger types
    pub trigger_types: TriggerType,
    /// Smallest `samples_per_chan` accepted
    pub min_scan_sample_count: usize,
}

impl Default for ScanCaps {
    fn default() -> Self {
        Self {
            clock_freq: 0.0,
            max_pacer_period: u64::from(u32::MAX),
            min_scan_rate: 0.0,
            max_scan_rate: 0.0,
            max_throughput: 0.0,
            max_burst_rate: 0.0,
            max_burst_throughput: 0.0,
            fifo_size: 0,
            sample_size: 4,
            scan_options: ScanOption::empty(),
            trigger_types: TriggerType::empty(),
            min_scan_sample_count: 1,
        }
    }
}

/// Analog input capabilities.
#[derive(Debug, Clone, PartialEq)]
pub struct AiInfo {
    /// ADC resolution in bits
    pub resolution: u32,
    /// Channel count in single-ended mode
    pub num_chans_se: u32,
    /// Channel count in differential mode
    pub num_chans_diff: u32,
    /// Channel count in pseudo-differential mode
    pub num_chans_pseudo_diff: u32,
    /// Supported channel types
    pub chan_types: AiChanType,
    /// Ranges available in single-ended mode
    pub ranges_se: Vec<Range>,
    /// Ranges available in differential mode
    pub ranges_diff: Vec<Range>,
    /// Supported thermocouple types (empty without TC support)
    pub tc_types: Vec<TcType>,
    /// Supported `a_in_scan` flags
    pub scan_flags: AInScanFlag,
    /// What a queue element may vary
    pub queue_types: AiQueueType,
    /// Channel order restrictions in a queue
    pub queue_limitations: AiChanQueueLimitation,
    /// Queue length limit in single-ended mode
    pub max_queue_length_se: usize,
    /// Queue length limit in differential mode
    pub max_queue_length_diff: usize,
    /// Selectable per-channel data rates (empty when fixed)
    pub data_rates: Vec<f64>,
    /// Scan limits
    pub scan: ScanCaps,
}

impl AiInfo {
    /// Number of channels in `mode`.
    pub fn num_chans_by_mode(&self, mode: AiInputMode) -> u32 {
        match mode {
            AiInputMode::SingleEnded => self.num_chans_se,
            AiInputMode::Differential => self.num_chans_diff,
            AiInputMode::PseudoDifferential => self.num_chans_pseudo_diff,
        }
    }

    /// Total addressable channels.
    pub fn num_chans(&self) -> u32 {
        self.num_chans_se
            .max(self.num_chans_diff)
            .max(self.num_chans_pseudo_diff)
    }

    /// Ranges valid in `mode`.
    pub fn ranges(&self, mode: AiInputMode) -> &[Range] {
        match mode {
            AiInputMode::SingleEnded => &self.ranges_se,
            AiInputMode::Differential | AiInputMode::PseudoDifferential => &self.ranges_diff,
        }
    }

    /// Queue length limit in `mode` (0 when queues are unsupported).
    pub fn max_queue_length(&self, mode: AiInputMode) -> usize {
        match mode {
            AiInputMode::SingleEnded => self.max_queue_length_se,
            AiInputMode::Differential | AiInputMode::PseudoDifferential => {
                self.max_queue_length_diff
            }
        }
    }

    /// Number of codes (`2^resolution`).
    pub fn full_scale(&self) -> f64 {
        (1u64 << self.resolution) as f64
    }
}

/// Analog output capabilities.
#[derive(Debug, Clone, PartialEq)]
pub struct AoInfo {
    /// DAC resolution in bits
    pub resolution: u32,
    /// Number of channels
    pub num_chans: u32,
    /// Output ranges
    pub ranges: Vec<Range>,
    /// Scan limits
    pub scan: ScanCaps,
}

impl AoInfo {
    /// Number of codes (`2^resolution`).
    pub fn full_scale(&self) -> f64 {
        (1u64 << self.resolution) as f64
    }
}

/// One digital port.
#[derive(Debug, Clone, PartialEq)]
pub struct DioPortInfo {
    /// Port identifier
    pub port_type: DigitalPortType,
    /// How the port may be configured
    pub io_type: DigitalPortIoType,
    /// Number of lines
    pub num_bits: u32,
}

impl DioPortInfo {
    /// Mask covering every line of the port.
    pub fn mask(&self) -> u64 {
        if self.num_bits >= 64 {
            u64::MAX
        } else {
            (1u64 << self.num_bits) - 1
        }
    }
}

/// Digital I/O capabilities.
#[derive(Debug, Clone, PartialEq)]
pub struct DioInfo {
    /// Ports in port-number order
    pub ports: Vec<DioPortInfo>,
    /// Input scan limits (`None` without `d_in_scan`)
    pub in_scan: Option<ScanCaps>,
    /// Output scan limits (`None` without `d_out_scan`)
    pub out_scan: Option<ScanCaps>,
}

impl DioInfo {
    /// Position and description of `port`.
    pub fn port(&self, port: DigitalPortType) -> Option<(usize, &DioPortInfo)> {
        self.ports
            .iter()
            .enumerate()
            .find(|(_, p)| p.port_type == port)
    }
}

/// What one counter can do.
#[derive(Debug, Clone, PartialEq)]
pub struct CtrCapability {
    /// Measurement types this counter supports
    pub measurement_types: CounterMeasurementType,
    /// Mode bits valid for each supported type
    pub modes: Vec<(CounterMeasurementType, CounterMeasurementMode)>,
    /// Registers that may be loaded or read
    pub registers: CounterRegisterType,
}

impl CtrCapability {
    /// Mode bits valid for `measurement_type`.
    pub fn modes_for(&self, measurement_type: CounterMeasurementType) -> CounterMeasurementMode {
        self.modes
            .iter()
            .find(|(t, _)| *t == measurement_type)
            .map(|(_, m)| *m)
            .unwrap_or_default()
    }
}

/// Counter capabilities.
#[derive(Debug, Clone, PartialEq)]
pub struct CtrInfo {
    /// Counter resolution in bits
    pub resolution: u32,
    /// Per-counter capabilities, indexed by counter number
    pub counters: Vec<CtrCapability>,
    /// Selectable tick sizes
    pub tick_sizes: Vec<CounterTickSize>,
    /// Supported debounce modes
    pub debounce_modes: Vec<CounterDebounceMode>,
    /// Supported debounce times
    pub debounce_times: Vec<CounterDebounceTime>,
    /// Supported edge selections
    pub edge_detections: Vec<CounterEdgeDetection>,
    /// Supported `c_in_scan` flags
    pub scan_flags: CInScanFlag,
    /// Scan limits
    pub scan: ScanCaps,
}

impl CtrInfo {
    /// Number of counters.
    pub fn num_ctrs(&self) -> u32 {
        self.counters.len() as u32
    }
}

/// Pulse timer capabilities.
#[derive(Debug, Clone, PartialEq)]
pub struct TmrInfo {
    /// Number of timers
    pub num_tmrs: u32,
    /// Timer base clock in Hz
    pub clock_freq: f64,
    /// Lowest output frequency
    pub min_frequency: f64,
    /// Highest output frequency
    pub max_frequency: f64,
    /// Longest initial delay in seconds
    pub max_initial_delay: f64,
    /// Supported pulse output options
    pub options: PulseOutOption,
    /// Supported trigger types
    pub trigger_types: TriggerType,
}

/// Synchronous input capabilities.
#[derive(Debug, Clone, PartialEq)]
pub struct DaqIInfo {
    /// Channel types that may appear in a descriptor list
    pub chan_types: DaqInChanType,
    /// Longest descriptor list
    pub max_chans: usize,
    /// Supported flags
    pub scan_flags: DaqInScanFlag,
    /// Scan limits
    pub scan: ScanCaps,
}

/// Synchronous output capabilities.
#[derive(Debug, Clone, PartialEq)]
pub struct DaqOInfo {
    /// Channel types that may appear in a descriptor list
    pub chan_types: DaqOutChanType,
    /// Longest descriptor list
    pub max_chans: usize,
    /// Supported flags
    pub scan_flags: DaqOutScanFlag,
    /// Scan limits
    pub scan: ScanCaps,
}

/// One EEPROM region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemRegionInfo {
    /// Region
    pub region: MemRegion,
    /// First valid address
    pub address: u32,
    /// Size in bytes
    pub size: u32,
    /// Permissions
    pub access: MemAccessType,
}

impl MemRegionInfo {
    /// True when `[address, address + len)` lies inside the region.
    pub fn contains(&self, address: u32, len: usize) -> bool {
        let start = u64::from(self.address);
        let end = start + u64::from(self.size);
        let addr = u64::from(address);
        addr >= start && addr + len as u64 <= end
    }
}

/// Device-wide information.
#[derive(Debug, Clone, PartialEq)]
pub struct DevInfo {
    /// USB product id
    pub product_id: u16,
    /// Product name
    pub product_name: String,
    /// Serial number
    pub unique_id: String,
    /// Main clock in Hz
    pub clock_freq: f64,
    /// Event types the device can raise
    pub event_types: DaqEventType,
    /// EEPROM regions
    pub mem_regions: Vec<MemRegionInfo>,
    /// Largest memory chunk moved by one control transfer
    pub mem_chunk_size: usize,
}

impl DevInfo {
    /// Description of `region`.
    pub fn mem_region(&self, region: MemRegion) -> Option<&MemRegionInfo> {
        self.mem_regions.iter().find(|r| r.region == region)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mem_region_contains() {
        let info = MemRegionInfo {
            region: MemRegion::USER,
            address: 0x100,
            size: 0x100,
            access: MemAccessType::READ | MemAccessType::WRITE,
        };
        assert!(info.contains(0x100, 0x100));
        assert!(info.contains(0x1FF, 1));
        assert!(!info.contains(0x1FF, 2));
        assert!(!info.contains(0xFF, 1));
    }

    #[test]
    fn test_port_mask() {
        let port = DioPortInfo {
            port_type: DigitalPortType::AuxPort,
            io_type: DigitalPortIoType::BitIo,
            num_bits: 4,
        };
        assert_eq!(port.mask(), 0xF);
    }

    #[test]
    fn test_modes_for_unknown_type() {
        let cap = CtrCapability {
            measurement_types: CounterMeasurementType::COUNT,
            modes: vec![(
                CounterMeasurementType::COUNT,
                CounterMeasurementMode::COUNT_DOWN,
            )],
            registers: CounterRegisterType::COUNT,
        };
        assert_eq!(
            cap.modes_for(CounterMeasurementType::COUNT),
            CounterMeasurementMode::COUNT_DOWN
        );
        assert!(cap.modes_for(CounterMeasurementType::PERIOD).is_empty());
    }
}
