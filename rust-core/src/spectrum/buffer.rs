//! Aligned sample buffer
//!
//! One generation of time-domain input. Move-only: a buffer is held by
//! exactly one stage (channel queue, then engine) at a time.

use std::mem::size_of;

/// Byte alignment of the first sample (cache line, widest SIMD register)
pub const SAMPLE_ALIGN: usize = 64;

/// Spare elements allocated so the aligned start always fits
const ALIGN_SLACK: usize = SAMPLE_ALIGN / size_of::<f64>();

/// Fixed-length, SIMD-aligned buffer of real samples
#[derive(Debug)]
pub struct SampleBuffer {
    /// Backing storage, never resized after construction
    storage: Vec<f64>,

    /// Index of the first aligned element in `storage`
    offset: usize,

    /// Number of samples
    len: usize,
}

impl SampleBuffer {
    /// Create a zero-filled buffer of `len` samples
    pub fn zeroed(len: usize) -> Self {
        let storage = vec![0.0; len + ALIGN_SLACK];

        // The heap block does not move when the Vec is moved, so the
        // offset stays valid for the lifetime of the buffer.
        let offset = match storage.as_ptr().align_offset(SAMPLE_ALIGN) {
            off if off <= ALIGN_SLACK => off,
            _ => 0,
        };

        Self {
            storage,
            offset,
            len,
        }
    }

    /// Copy `samples` into a freshly allocated aligned buffer
    pub fn from_slice(samples: &[f64]) -> Self {
        let mut buffer = Self::zeroed(samples.len());
        buffer.as_mut_slice().copy_from_slice(samples);
        buffer
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if buffer holds no samples
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.storage[self.offset..self.offset + self.len]
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.storage[self.offset..self.offset + self.len]
    }

    /// Whether the first sample sits on a `SAMPLE_ALIGN` boundary
    pub fn is_aligned(&self) -> bool {
        self.as_slice().as_ptr().align_offset(SAMPLE_ALIGN) == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_slice_copies_samples() {
        let data = vec![1.0, -2.0, 3.5, 0.25];
        let buffer = SampleBuffer::from_slice(&data);

        assert_eq!(buffer.len(), 4);
        assert_eq!(buffer.as_slice(), &data[..]);
    }

    #[test]
    fn test_alignment() {
        for len in [1, 7, 8, 63, 1024] {
            let buffer = SampleBuffer::zeroed(len);
            assert!(buffer.is_aligned(), "length {} not aligned", len);
        }
    }

    #[test]
    fn test_alignment_survives_move() {
        let buffer = SampleBuffer::from_slice(&[1.0; 100]);
        let moved = Box::new(buffer);
        assert!(moved.is_aligned());
        assert_eq!(moved.as_slice()[99], 1.0);
    }

    #[test]
    fn test_empty_buffer() {
        let buffer = SampleBuffer::from_slice(&[]);
        assert!(buffer.is_empty());
        assert!(buffer.as_slice().is_empty());
    }
}
