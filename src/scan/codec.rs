//! Wire sample words.

/// A fixed-width little-endian sample word.
pub trait SampleCodec: Copy + Send + 'static {
    /// Bytes per word on the wire
    const WIDTH: usize;

    /// Decode one word from exactly `WIDTH` bytes.
    fn read_le(bytes: &[u8]) -> Self;

    /// Encode into exactly `WIDTH` bytes.
    fn write_le(self, out: &mut [u8]);

    /// Widen to `u64`.
    fn to_u64(self) -> u64;

    /// Narrow from `u64`, keeping the low bits.
    fn from_u64(value: u64) -> Self;
}

impl SampleCodec for u16 {
    const WIDTH: usize = 2;

    #[inline]
    fn read_le(bytes: &[u8]) -> Self {
        u16::from_le_bytes([bytes[0], bytes[1]])
    }

    #[inline]
    fn write_le(self, out: &mut [u8]) {
        out[..2].copy_from_slice(&self.to_le_bytes());
    }

    #[inline]
    fn to_u64(self) -> u64 {
        u64::from(self)
    }

    #[inline]
    fn from_u64(value: u64) -> Self {
        value as u16
    }
}

impl SampleCodec for u32 {
    const WIDTH: usize = 4;

    #[inline]
    fn read_le(bytes: &[u8]) -> Self {
        u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    #[inline]
    fn write_le(self, out: &mut [u8]) {
        out[..4].copy_from_slice(&self.to_le_bytes());
    }

    #[inline]
    fn to_u64(self) -> u64 {
        u64::from(self)
    }

    #[inline]
    fn from_u64(value: u64) -> Self {
        value as u32
    }
}

impl SampleCodec for u64 {
    const WIDTH: usize = 8;

    #[inline]
    fn read_le(bytes: &[u8]) -> Self {
        let mut word = [0u8; 8];
        word.copy_from_slice(&bytes[..8]);
        u64::from_le_bytes(word)
    }

    #[inline]
    fn write_le(self, out: &mut [u8]) {
        out[..8].copy_from_slice(&self.to_le_bytes());
    }

    #[inline]
    fn to_u64(self) -> u64 {
        self
    }

    #[inline]
    fn from_u64(value: u64) -> Self {
        value
    }
}
