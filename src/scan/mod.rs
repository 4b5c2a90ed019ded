//! Background scans: buffers, conversion pipeline, engine and transfer worker.

pub mod buffer;
pub mod codec;
pub mod engine;
pub mod info;
pub mod pipeline;
pub mod transfer;

pub use buffer::{ScanBuffer, ScanTarget};
pub use codec::SampleCodec;
pub use engine::{Direction, HwStatus, ScanEngine, ScanPlan, ScanStrategy, StatusSnapshot};
pub use info::ScanInfo;
pub use pipeline::{
    AnalogConversion, ChannelConversion, CjcSource, Pipeline, SampleFormat, ScanSample,
    TcConversion, OPEN_TC_VALUE,
};
pub use transfer::{ScanControl, ScanProgress};
