//! Byte-order helpers for device payloads.
//!
//! Device words are little-endian unless noted. Every accessor checks bounds
//! and reports a short buffer as `ERR_BAD_BUFFER_SIZE`.

use crate::error::{Result, UlError};

fn slice<const N: usize>(buf: &[u8], offset: usize) -> Result<[u8; N]> {
    buf.get(offset..offset + N)
        .and_then(|b| b.try_into().ok())
        .ok_or(UlError::BadBufferSize)
}

fn slice_mut<const N: usize>(buf: &mut [u8], offset: usize) -> Result<&mut [u8]> {
    buf.get_mut(offset..offset + N).ok_or(UlError::BadBufferSize)
}

/// Read a little-endian `u16`.
pub fn read_u16_le(buf: &[u8], offset: usize) -> Result<u16> {
    slice::<2>(buf, offset).map(u16::from_le_bytes)
}

/// Read a little-endian `u32`.
pub fn read_u32_le(buf: &[u8], offset: usize) -> Result<u32> {
    slice::<4>(buf, offset).map(u32::from_le_bytes)
}

/// Read a little-endian `u64`.
pub fn read_u64_le(buf: &[u8], offset: usize) -> Result<u64> {
    slice::<8>(buf, offset).map(u64::from_le_bytes)
}

/// Read a little-endian `i32`.
pub fn read_i32_le(buf: &[u8], offset: usize) -> Result<i32> {
    slice::<4>(buf, offset).map(i32::from_le_bytes)
}

/// Read a little-endian `f32`.
pub fn read_f32_le(buf: &[u8], offset: usize) -> Result<f32> {
    slice::<4>(buf, offset).map(f32::from_le_bytes)
}

/// Read a little-endian `f64`.
pub fn read_f64_le(buf: &[u8], offset: usize) -> Result<f64> {
    slice::<8>(buf, offset).map(f64::from_le_bytes)
}

/// Read a big-endian `u16`.
pub fn read_u16_be(buf: &[u8], offset: usize) -> Result<u16> {
    slice::<2>(buf, offset).map(u16::from_be_bytes)
}

/// Read a big-endian `u32`.
pub fn read_u32_be(buf: &[u8], offset: usize) -> Result<u32> {
    slice::<4>(buf, offset).map(u32::from_be_bytes)
}

/// Write a little-endian `u16`.
pub fn write_u16_le(buf: &mut [u8], offset: usize, value: u16) -> Result<()> {
    slice_mut::<2>(buf, offset)?.copy_from_slice(&value.to_le_bytes());
    Ok(())
}

/// Write a little-endian `u32`.
pub fn write_u32_le(buf: &mut [u8], offset: usize, value: u32) -> Result<()> {
    slice_mut::<4>(buf, offset)?.copy_from_slice(&value.to_le_bytes());
    Ok(())
}

/// Write a little-endian `u64`.
pub fn write_u64_le(buf: &mut [u8], offset: usize, value: u64) -> Result<()> {
    slice_mut::<8>(buf, offset)?.copy_from_slice(&value.to_le_bytes());
    Ok(())
}

/// Write a little-endian `f64`.
pub fn write_f64_le(buf: &mut [u8], offset: usize, value: f64) -> Result<()> {
    slice_mut::<8>(buf, offset)?.copy_from_slice(&value.to_le_bytes());
    Ok(())
}

/// Write a big-endian `u16`.
pub fn write_u16_be(buf: &mut [u8], offset: usize, value: u16) -> Result<()> {
    slice_mut::<2>(buf, offset)?.copy_from_slice(&value.to_be_bytes());
    Ok(())
}
