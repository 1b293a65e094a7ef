//! PCM block decoding
//!
//! Converts a raw little-endian byte block into signed samples that share a
//! common 32-bit range regardless of the source bit depth.
//!
//! The most significant byte has its top bit flipped before assembly and the
//! assembled value is then recentered by `2^31`. For 8-bit unsigned input and
//! 16/32-bit two's complement input this reproduces the signed sample scaled
//! into the 32-bit range (see DESIGN.md for the encoding discussion).

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// A decoded sample, centered on zero and scaled to the 32-bit range
pub type Sample = i32;

const RECENTER: i64 = 1 << 31;
const SIGN_BIT: u8 = 1 << 7;

/// Declared width of one PCM sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum BitDepth {
    Eight,
    Sixteen,
    ThirtyTwo,
}

impl BitDepth {
    /// Bytes per sample
    pub fn byte_width(self) -> usize {
        match self {
            BitDepth::Eight => 1,
            BitDepth::Sixteen => 2,
            BitDepth::ThirtyTwo => 4,
        }
    }

    pub fn bits(self) -> u16 {
        self.byte_width() as u16 * 8
    }
}

impl TryFrom<u16> for BitDepth {
    type Error = Error;

    fn try_from(bits: u16) -> Result<Self> {
        match bits {
            8 => Ok(BitDepth::Eight),
            16 => Ok(BitDepth::Sixteen),
            32 => Ok(BitDepth::ThirtyTwo),
            other => Err(Error::Config(format!(
                "Unsupported bit depth {} (expected 8, 16 or 32)",
                other
            ))),
        }
    }
}

impl From<BitDepth> for u16 {
    fn from(depth: BitDepth) -> u16 {
        depth.bits()
    }
}

impl fmt::Display for BitDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-bit", self.bits())
    }
}

/// Number of whole samples contained in `len` bytes
pub fn sample_count(len: usize, depth: BitDepth) -> usize {
    len / depth.byte_width()
}

/// Decode a raw block into samples.
///
/// Trailing bytes that do not form a complete sample are ignored, so a
/// truncated block just yields fewer samples.
pub fn decode(raw: &[u8], depth: BitDepth) -> Vec<Sample> {
    match depth {
        BitDepth::Eight => raw.iter().map(|&b| decode_8(b)).collect(),
        BitDepth::Sixteen => raw
            .chunks_exact(2)
            .map(|c| decode_16([c[0], c[1]]))
            .collect(),
        BitDepth::ThirtyTwo => raw
            .chunks_exact(4)
            .map(|c| decode_32([c[0], c[1], c[2], c[3]]))
            .collect(),
    }
}

/// Append one sample in the device's native encoding for `depth`.
///
/// `value` is in the native signed range of the depth (e.g. `i16` range for
/// 16-bit). 8-bit output is unsigned offset binary, as WAV and most devices
/// store it; 16/32-bit output is little-endian two's complement.
pub fn encode_native(value: i32, depth: BitDepth, out: &mut Vec<u8>) {
    match depth {
        BitDepth::Eight => out.push((value.clamp(-128, 127) + 128) as u8),
        BitDepth::Sixteen => {
            let value = value.clamp(i16::MIN as i32, i16::MAX as i32) as i16;
            out.extend_from_slice(&value.to_le_bytes());
        }
        BitDepth::ThirtyTwo => out.extend_from_slice(&value.to_le_bytes()),
    }
}

#[inline]
fn decode_8(byte: u8) -> Sample {
    (((byte as i64) << 24) - RECENTER) as Sample
}

#[inline]
fn decode_16(bytes: [u8; 2]) -> Sample {
    let value = bytes[0] as i64 + (((bytes[1] ^ SIGN_BIT) as i64) << 8);
    ((value << 16) - RECENTER) as Sample
}

#[inline]
fn decode_32(bytes: [u8; 4]) -> Sample {
    let value = bytes[0] as i64
        + ((bytes[1] as i64) << 8)
        + ((bytes[2] as i64) << 16)
        + (((bytes[3] ^ SIGN_BIT) as i64) << 24);
    (value - RECENTER) as Sample
}
