//! Test tone generator
//!
//! Produces a sine wave that drifts by 4 degrees per block so the wave view
//! visibly scrolls without any audio hardware. The phase shift is owned by
//! the generator; nothing here is shared.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use super::{BlockSender, Submit};
use crate::spectrum::pcm::encode_native;
use crate::spectrum::BitDepth;

/// Degrees advanced per sample
const DEGREES_PER_SAMPLE: f64 = 2.0;
/// Degrees the phase drifts per block
const SHIFT_PER_BLOCK: u32 = 4;

pub struct ToneSource {
    depth: BitDepth,
    block_samples: usize,
    pacing: Duration,
    amplitude: f64,
    shift: u32,
}

impl ToneSource {
    pub fn new(depth: BitDepth, block_samples: usize, pacing: Duration) -> Self {
        // Quarter of full scale for the depth
        let amplitude = match depth {
            BitDepth::Eight => 32.0,
            BitDepth::Sixteen => 8_192.0,
            BitDepth::ThirtyTwo => 536_870_912.0,
        };

        Self {
            depth,
            block_samples: block_samples.max(1),
            pacing,
            amplitude,
            shift: 0,
        }
    }

    /// Generate the next block and advance the phase
    pub fn next_block(&mut self) -> Vec<u8> {
        let mut raw = Vec::with_capacity(self.block_samples * self.depth.byte_width());

        for i in 0..self.block_samples {
            let degrees = (i as f64 + self.shift as f64) * DEGREES_PER_SAMPLE;
            let value = (degrees.to_radians().sin() * self.amplitude) as i32;
            encode_native(value, self.depth, &mut raw);
        }

        self.shift = (self.shift + SHIFT_PER_BLOCK) % 360;
        raw
    }

    /// Emit one block per pacing interval until stopped
    pub async fn run(mut self, sink: BlockSender, running: Arc<AtomicBool>) {
        info!(
            "Tone source: {} samples per block every {:?}",
            self.block_samples, self.pacing
        );

        let mut ticker = interval(self.pacing);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        while running.load(Ordering::SeqCst) {
            ticker.tick().await;
            if sink.submit(self.next_block()) == Submit::Closed {
                debug!("Pipeline closed, tone source exiting");
                break;
            }
        }

        info!("Tone source stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spectrum::decode;

    #[test]
    fn test_block_size_matches_depth() {
        for depth in [BitDepth::Eight, BitDepth::Sixteen, BitDepth::ThirtyTwo] {
            let mut tone = ToneSource::new(depth, 100, Duration::from_millis(16));
            assert_eq!(tone.next_block().len(), 100 * depth.byte_width());
        }
    }

    #[test]
    fn test_phase_drifts_and_wraps() {
        let mut tone = ToneSource::new(BitDepth::ThirtyTwo, 8, Duration::from_millis(16));
        let first = tone.next_block();
        let second = tone.next_block();
        assert_ne!(first, second);

        // 90 blocks * 4 degrees = one full turn
        for _ in 0..88 {
            tone.next_block();
        }
        assert_eq!(tone.shift, 0);
        assert_eq!(tone.next_block(), first);
    }

    #[test]
    fn test_first_sample_is_zero_crossing() {
        let mut tone = ToneSource::new(BitDepth::ThirtyTwo, 46, Duration::from_millis(16));
        let samples = decode(&tone.next_block(), BitDepth::ThirtyTwo);

        assert_eq!(samples[0], 0);
        // Peak at 90 degrees (sample 45)
        assert!((samples[45] - 536_870_912).abs() <= 1);
    }

    #[tokio::test]
    async fn test_run_stops_when_flag_cleared() {
        let stats = Arc::new(crate::state::PipelineStats::default());
        let (sender, mut rx) = super::super::block_channel(2, stats);
        let running = Arc::new(AtomicBool::new(true));

        let tone = ToneSource::new(BitDepth::Sixteen, 16, Duration::from_millis(1));
        let task = tokio::spawn(tone.run(sender, Arc::clone(&running)));

        assert!(rx.recv().await.is_some());
        running.store(false, Ordering::SeqCst);
        task.await.unwrap();
    }
}
