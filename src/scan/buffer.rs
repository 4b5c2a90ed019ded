//! Caller-owned scan buffers.
//!
//! A [`ScanBuffer`] is a cheaply cloneable handle to sample storage shared
//! between the application and the transfer worker. The worker writes (input
//! scans) or reads (output scans) it under its lock; the application should
//! use the scan's `current_index` to know which region is stable.

use std::sync::Arc;

use parking_lot::Mutex;

/// Shared sample storage.
#[derive(Debug)]
pub struct ScanBuffer<T> {
    data: Arc<Mutex<Vec<T>>>,
}

impl<T> Clone for ScanBuffer<T> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }
}

impl<T: Copy + Default> ScanBuffer<T> {
    /// Zero-filled buffer of `len` samples.
    pub fn new(len: usize) -> Self {
        Self::from_vec(vec![T::default(); len])
    }
}

impl<T: Copy> ScanBuffer<T> {
    /// Wrap existing samples (output scans).
    pub fn from_vec(data: Vec<T>) -> Self {
        Self {
            data: Arc::new(Mutex::new(data)),
        }
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.data.lock().len()
    }

    /// True for a zero-length buffer.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the current contents.
    pub fn to_vec(&self) -> Vec<T> {
        self.data.lock().clone()
    }

    /// Sample at `idx`.
    pub fn get(&self, idx: usize) -> Option<T> {
        self.data.lock().get(idx).copied()
    }

    /// Run `f` with shared access to the samples.
    pub fn with<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        f(&self.data.lock())
    }

    /// Run `f` with exclusive access to the samples.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut [T]) -> R) -> R {
        f(&mut self.data.lock())
    }
}

/// Buffer a scan reads from or writes into.
#[derive(Debug, Clone)]
pub enum ScanTarget {
    /// Engineering values
    F64(ScanBuffer<f64>),
    /// Raw words (digital and counter scans)
    U64(ScanBuffer<u64>),
}

impl ScanTarget {
    /// Number of samples.
    pub fn len(&self) -> usize {
        match self {
            Self::F64(buf) => buf.len(),
            Self::U64(buf) => buf.len(),
        }
    }

    /// True for a zero-length buffer.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<ScanBuffer<f64>> for ScanTarget {
    fn from(buf: ScanBuffer<f64>) -> Self {
        Self::F64(buf)
    }
}

impl From<ScanBuffer<u64>> for ScanTarget {
    fn from(buf: ScanBuffer<u64>) -> Self {
        Self::U64(buf)
    }
}
