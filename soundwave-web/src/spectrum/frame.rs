//! Frame normalization
//!
//! Projects a complex buffer onto display-ready integers. Only the real part
//! survives; this is a visualization step, not something to invert.

use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::ops::Deref;

/// Integer values ready for transmission, one per buffer position.
///
/// Spectrum magnitudes can exceed the 32-bit range (a full-scale block of
/// 1024 samples sums past `2^40`), hence `i64`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Frame(Vec<i64>);

impl Frame {
    pub fn new(values: Vec<i64>) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[i64] {
        &self.0
    }

    pub fn into_values(self) -> Vec<i64> {
        self.0
    }
}

impl Deref for Frame {
    type Target = [i64];

    fn deref(&self) -> &[i64] {
        &self.0
    }
}

/// Round each real component half-to-even and drop the imaginary part.
///
/// Values outside the `i64` range saturate, NaN maps to 0.
pub fn normalize(buf: &[Complex64]) -> Frame {
    Frame(buf.iter().map(|c| c.re.round_ties_even() as i64).collect())
}
