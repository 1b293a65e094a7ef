//! Sample-to-spectrum conversion
//!
//! Decode -> pad -> (wave frame) -> FFT -> (spectrum frame). Everything here
//! is pure, synchronous CPU work with no shared state.

pub mod block;
pub mod fft;
pub mod frame;
pub mod pcm;

pub use block::WorkingBuffer;
pub use fft::fft_in_place;
pub use frame::{normalize, Frame};
pub use pcm::{decode, BitDepth, Sample};

/// Wave and spectrum frames computed from one raw block
#[derive(Debug, Clone, PartialEq)]
pub struct BlockFrames {
    pub wave: Frame,
    pub spectrum: Frame,
}

/// Run one raw block through the whole conversion without broadcasting
pub fn analyze_block(raw: &[u8], depth: BitDepth) -> BlockFrames {
    let mut buffer = WorkingBuffer::from_samples(&decode(raw, depth));
    let wave = normalize(buffer.as_slice());
    fft_in_place(buffer.as_mut_slice());
    let spectrum = normalize(buffer.as_slice());
    BlockFrames { wave, spectrum }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analyze_block_lengths() {
        let raw: Vec<u8> = (0..12).flat_map(|i: i32| (i * 1000).to_le_bytes()).collect();
        let frames = analyze_block(&raw, BitDepth::ThirtyTwo);

        assert_eq!(frames.wave.len(), 16);
        assert_eq!(frames.spectrum.len(), 16);
        assert_eq!(&frames.wave[..3], &[0, 1000, 2000]);
        assert!(frames.wave[12..].iter().all(|&v| v == 0));
    }

    #[test]
    fn test_analyze_block_dc_component() {
        let raw: Vec<u8> = std::iter::repeat(5i32.to_le_bytes()).take(8).flatten().collect();
        let frames = analyze_block(&raw, BitDepth::ThirtyTwo);

        assert_eq!(frames.spectrum[0], 40);
        assert!(frames.spectrum[1..].iter().all(|&v| v == 0));
    }
}
