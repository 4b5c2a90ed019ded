//! EEPROM access through the region descriptors a device declares.
//!
//! Transfers are split into chunks no larger than the family's control
//! payload; the chunk address travels in `wValue`.

use tracing::debug;

use crate::device::{CmdKey, DeviceCore, MemRegionInfo};
use crate::error::{Result, UlError};
use crate::types::{MemAccessType, MemRegion};

fn region_key(region: MemRegion) -> Result<CmdKey> {
    match region {
        MemRegion::CAL => Ok(CmdKey::MemCal),
        MemRegion::USER => Ok(CmdKey::MemUser),
        MemRegion::SETTINGS => Ok(CmdKey::MemSettings),
        _ => Err(UlError::BadMemRegion),
    }
}

fn lookup(
    core: &DeviceCore,
    region: MemRegion,
    access: MemAccessType,
    address: u32,
    len: usize,
) -> Result<(MemRegionInfo, CmdKey)> {
    if region.bits().count_ones() != 1 {
        return Err(UlError::BadMemRegion);
    }
    let info = core
        .info()
        .mem_region(region)
        .cloned()
        .ok_or(UlError::BadMemRegion)?;
    let key = region_key(region)?;
    if !info.access.contains(access) {
        return Err(UlError::MemAccessDenied);
    }
    if len == 0 {
        return Err(UlError::BadBufferSize);
    }
    if !info.contains(address, len) {
        return Err(UlError::BadMemAddress);
    }
    Ok((info, key))
}

fn chunk_address(address: u32, offset: usize) -> Result<u16> {
    u16::try_from(u64::from(address) + offset as u64).map_err(|_| UlError::BadMemAddress)
}

/// Read `buf.len()` bytes starting at `address`. Returns the count read.
pub fn mem_read(core: &DeviceCore, region: MemRegion, address: u32, buf: &mut [u8]) -> Result<usize> {
    core.check_connected()?;
    let (_, key) = lookup(core, region, MemAccessType::READ, address, buf.len())?;
    let chunk = core.info().mem_chunk_size.max(1);

    let mut offset = 0;
    while offset < buf.len() {
        let end = (offset + chunk).min(buf.len());
        let value = chunk_address(address, offset)?;
        let n = core.query_cmd(key, value, 0, &mut buf[offset..end])?;
        if n != end - offset {
            return Err(UlError::DeadDev);
        }
        offset = end;
    }
    debug!(?region, address, len = buf.len(), "Memory read");
    Ok(buf.len())
}

/// Write `data` starting at `address`. Returns the count written.
pub fn mem_write(core: &DeviceCore, region: MemRegion, address: u32, data: &[u8]) -> Result<usize> {
    core.check_connected()?;
    let (_, key) = lookup(core, region, MemAccessType::WRITE, address, data.len())?;
    let chunk = core.info().mem_chunk_size.max(1);

    for (i, part) in data.chunks(chunk).enumerate() {
        let value = chunk_address(address, i * chunk)?;
        core.send_cmd(key, value, 0, part)?;
    }
    debug!(?region, address, len = data.len(), "Memory write");
    Ok(data.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UlConfig;
    use crate::device::{CommandTable, DevInfo};
    use crate::transport::{MockTransport, TransportCall};
    use crate::types::DaqEventType;
    use once_cell::sync::Lazy;
    use std::sync::Arc;

    static TABLE: Lazy<CommandTable> = Lazy::new(|| {
        CommandTable::new(
            "test",
            &[(CmdKey::MemCal, 0x30), (CmdKey::MemUser, 0x31)],
        )
    });

    fn core(mock: &Arc<MockTransport>) -> DeviceCore {
        let info = DevInfo {
            product_id: 1,
            product_name: "TEST".into(),
            unique_id: "0001".into(),
            clock_freq: 1e6,
            event_types: DaqEventType::empty(),
            mem_regions: vec![
                MemRegionInfo {
                    region: MemRegion::CAL,
                    address: 0x100,
                    size: 0x100,
                    access: MemAccessType::READ,
                },
                MemRegionInfo {
                    region: MemRegion::USER,
                    address: 0,
                    size: 0x40,
                    access: MemAccessType::READ | MemAccessType::WRITE,
                },
            ],
            mem_chunk_size: 16,
        };
        let core = DeviceCore::new(info, mock.clone(), &TABLE, UlConfig::default());
        core.set_connected(true);
        core
    }

    #[test]
    fn test_read_is_chunked() {
        let mock = Arc::new(MockTransport::new());
        mock.set_query_handler(|_, value, _, buf| {
            for (i, b) in buf.iter_mut().enumerate() {
                *b = (usize::from(value) + i) as u8;
            }
            Some(Ok(buf.len()))
        });
        let core = core(&mock);

        let mut buf = [0u8; 40];
        assert_eq!(mem_read(&core, MemRegion::CAL, 0x100, &mut buf), Ok(40));
        assert_eq!(buf[0], 0x00);
        assert_eq!(buf[39], 39);

        let queries: Vec<_> = mock
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                TransportCall::Query { value, len, .. } => Some((value, len)),
                _ => None,
            })
            .collect();
        assert_eq!(queries, vec![(0x100, 16), (0x110, 16), (0x120, 8)]);
    }

    #[test]
    fn test_access_checks() {
        let mock = Arc::new(MockTransport::new());
        let core = core(&mock);

        assert_eq!(
            mem_write(&core, MemRegion::CAL, 0x100, &[1, 2]),
            Err(UlError::MemAccessDenied)
        );
        assert_eq!(
            mem_write(&core, MemRegion::USER, 0x3F, &[1, 2]),
            Err(UlError::BadMemAddress)
        );
        assert_eq!(
            mem_write(&core, MemRegion::SETTINGS, 0, &[1]),
            Err(UlError::BadMemRegion)
        );
        assert_eq!(
            mem_write(&core, MemRegion::USER | MemRegion::CAL, 0, &[1]),
            Err(UlError::BadMemRegion)
        );

        assert_eq!(mem_write(&core, MemRegion::USER, 0x10, &[7; 20]), Ok(20));
        let sends = mock.sent(0x31);
        assert_eq!(sends.len(), 2);
    }
}
