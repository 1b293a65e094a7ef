//! In-place iterative radix-2 FFT
//!
//! Uses the positive exponent convention: bin `k` accumulates
//! `x[j] * e^{+2πi·jk/n}`. The twiddle factor is advanced by complex
//! multiplication inside each block instead of recomputing `cos`/`sin`, and
//! the rounding this accumulates is part of the expected output.

use num_complex::Complex64;
use std::f64::consts::PI;

/// Transform `buf` in place.
///
/// # Panics
/// Panics if the length is not a power of two. Buffers built by
/// [`WorkingBuffer`](super::block::WorkingBuffer) always satisfy this.
pub fn fft_in_place(buf: &mut [Complex64]) {
    let n = buf.len();
    assert!(
        n.is_power_of_two(),
        "FFT length must be a power of two, got {}",
        n
    );

    bit_reverse_permute(buf);

    let mut len = 2;
    while len <= n {
        let angle = 2.0 * PI / len as f64;
        let wlen = Complex64::new(angle.cos(), angle.sin());
        let half = len / 2;

        for block in buf.chunks_exact_mut(len) {
            let (lo, hi) = block.split_at_mut(half);
            let mut w = Complex64::new(1.0, 0.0);
            for (u, v) in lo.iter_mut().zip(hi.iter_mut()) {
                let t = *v * w;
                *v = *u - t;
                *u += t;
                w *= wlen;
            }
        }

        len <<= 1;
    }
}

/// Inverse of [`fft_in_place`]: conjugate, transform, conjugate, scale by `1/n`
pub fn inverse_in_place(buf: &mut [Complex64]) {
    for value in buf.iter_mut() {
        *value = value.conj();
    }

    fft_in_place(buf);

    let scale = 1.0 / buf.len() as f64;
    for value in buf.iter_mut() {
        *value = value.conj() * scale;
    }
}

/// Reorder positions by their bit-reversed index.
///
/// Keeps a running reversed counter `j` and increments it from the most
/// significant bit downward, so no index is reversed from scratch.
fn bit_reverse_permute(buf: &mut [Complex64]) {
    let n = buf.len();
    let mut j = 0usize;

    for i in 1..n {
        let mut bit = n >> 1;
        while j & bit != 0 {
            j ^= bit;
            bit >>= 1;
        }
        j ^= bit;

        if i < j {
            buf.swap(i, j);
        }
    }
}
