//! Working buffer preparation
//!
//! The radix-2 transform needs a power-of-two length, so decoded samples are
//! lifted into the complex plane and right-padded with zeros.

use num_complex::Complex64;

use super::pcm::Sample;

/// Complex buffer whose length is always a power of two.
///
/// Owned by a single pipeline pass: built from one block, transformed in
/// place, then dropped once both frames are out.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkingBuffer {
    data: Vec<Complex64>,
    original_len: usize,
}

impl WorkingBuffer {
    /// Build a buffer from decoded samples (imaginary parts zero)
    pub fn from_samples(samples: &[Sample]) -> Self {
        let data = samples
            .iter()
            .map(|&s| Complex64::new(s as f64, 0.0))
            .collect();
        Self::from_complex(data)
    }

    /// Pad an arbitrary complex sequence to the next power of two
    pub fn from_complex(data: Vec<Complex64>) -> Self {
        let original_len = data.len();
        Self {
            data: pad_to_power_of_two(data),
            original_len,
        }
    }

    /// Number of samples before padding
    pub fn original_len(&self) -> usize {
        self.original_len
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Never true: an empty input still yields one zero sample
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[Complex64] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [Complex64] {
        &mut self.data
    }
}

/// Smallest power of two that is `>= n` (1 for n = 0)
pub fn padded_len(n: usize) -> usize {
    n.max(1).next_power_of_two()
}

/// Right-pad with zeros up to [`padded_len`]
pub fn pad_to_power_of_two(mut data: Vec<Complex64>) -> Vec<Complex64> {
    let target = padded_len(data.len());
    data.resize(target, Complex64::new(0.0, 0.0));
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padded_len() {
        assert_eq!(padded_len(0), 1);
        assert_eq!(padded_len(1), 1);
        assert_eq!(padded_len(2), 2);
        assert_eq!(padded_len(3), 4);
        assert_eq!(padded_len(5), 8);
        assert_eq!(padded_len(960), 1024);
        assert_eq!(padded_len(1024), 1024);
        assert_eq!(padded_len(1025), 2048);
    }

    #[test]
    fn test_padding_is_zero() {
        for n in 1..=70usize {
            let samples: Vec<Sample> = (1..=n as i32).collect();
            let buffer = WorkingBuffer::from_samples(&samples);

            assert_eq!(buffer.len(), padded_len(n));
            assert!(buffer.len().is_power_of_two());
            assert!(buffer.len() / 2 < n.max(1));
            assert_eq!(buffer.original_len(), n);

            for (i, value) in buffer.as_slice().iter().enumerate() {
                if i < n {
                    assert_eq!(*value, Complex64::new((i + 1) as f64, 0.0));
                } else {
                    assert_eq!(value.re, 0.0);
                    assert_eq!(value.im, 0.0);
                }
            }
        }
    }

    #[test]
    fn test_power_of_two_unchanged() {
        let data = vec![Complex64::new(1.0, 2.0); 16];
        let buffer = WorkingBuffer::from_complex(data.clone());
        assert_eq!(buffer.as_slice(), data.as_slice());
    }

    #[test]
    fn test_empty_input_yields_single_zero() {
        let buffer = WorkingBuffer::from_samples(&[]);
        assert_eq!(buffer.len(), 1);
        assert!(!buffer.is_empty());
        assert_eq!(buffer.original_len(), 0);
        assert_eq!(buffer.as_slice()[0], Complex64::new(0.0, 0.0));
    }
}
