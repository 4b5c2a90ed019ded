//! USB-1808 digital I/O: one 4-bit bit-configurable port.

use std::sync::Arc;

use super::scan::{InScanStrategy, OutScanStrategy, MASK_DIO_IN, MASK_DIO_OUT};
use super::{input_caps, output_caps, Model};
use crate::device::{CmdKey, DeviceCore, DioInfo, DioPortInfo};
use crate::endian::read_u16_le;
use crate::error::Result;
use crate::scan::ScanStrategy;
use crate::subsystem::{DioBackend, DioScanSetup};
use crate::types::{DigitalPortIoType, DigitalPortType};

/// Lines on the auxiliary port.
pub const NUM_BITS: u32 = 4;
const PORT_MASK: u16 = (1 << NUM_BITS) - 1;

/// Digital capabilities.
pub fn info(model: Model) -> DioInfo {
    DioInfo {
        ports: vec![DioPortInfo {
            port_type: DigitalPortType::AuxPort,
            io_type: DigitalPortIoType::BitIo,
            num_bits: NUM_BITS,
        }],
        in_scan: Some(input_caps(model)),
        out_scan: Some(output_caps()),
    }
}

/// Digital backend. The tristate register holds a set bit per input line.
pub struct Usb1808Dio {
    core: Arc<DeviceCore>,
}

impl Usb1808Dio {
    /// Backend over `core`.
    pub fn new(core: Arc<DeviceCore>) -> Self {
        Self { core }
    }

    fn query_word(&self, key: CmdKey) -> Result<u16> {
        let reply = self.core.query_exact(key, 0, 0, 2)?;
        Ok(read_u16_le(&reply, 0)? & PORT_MASK)
    }
}

impl DioBackend for Usb1808Dio {
    fn read_port(&self, _port: &DioPortInfo, _index: usize) -> Result<u64> {
        self.query_word(CmdKey::DPort).map(u64::from)
    }

    fn write_port(&self, _port: &DioPortInfo, _index: usize, value: u64) -> Result<()> {
        self.core
            .send_cmd(CmdKey::DLatch, (value as u16) & PORT_MASK, 0, &[])
    }

    fn read_output_mask(&self, _port: &DioPortInfo, _index: usize) -> Result<u64> {
        let tristate = self.query_word(CmdKey::DTristate)?;
        Ok(u64::from(!tristate & PORT_MASK))
    }

    fn write_output_mask(&self, _port: &DioPortInfo, _index: usize, mask: u64) -> Result<()> {
        let tristate = !(mask as u16) & PORT_MASK;
        self.core.send_cmd(CmdKey::DTristate, tristate, 0, &[])
    }

    fn in_scan_strategy(&self, setup: &DioScanSetup) -> Result<Arc<dyn ScanStrategy>> {
        let strategy = InScanStrategy::new(
            Arc::clone(&self.core),
            MASK_DIO_IN,
            None,
            Vec::new(),
            setup.samples_per_chan,
            setup.pacer,
            setup.options,
            setup.trigger,
        )?;
        Ok(Arc::new(strategy))
    }

    fn out_scan_strategy(&self, setup: &DioScanSetup) -> Result<Arc<dyn ScanStrategy>> {
        let strategy = OutScanStrategy::new(
            Arc::clone(&self.core),
            MASK_DIO_OUT,
            setup.samples_per_chan,
            setup.pacer,
            setup.options,
            setup.trigger,
        )?;
        Ok(Arc::new(strategy))
    }
}
