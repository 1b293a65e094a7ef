//! Block-to-subscriber pipeline
//!
//! A single task consumes raw blocks in arrival order. For each block:
//! decode -> pad -> wave frame -> broadcast -> FFT -> spectrum frame ->
//! broadcast. Blocks are never reordered or coalesced; when the pipeline
//! falls behind, the capture layer drops blocks (see [`crate::source`]).

use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use soundwave_common::FrameKind;

use crate::fanout::{BroadcastReport, Broadcaster};
use crate::spectrum::{decode, fft_in_place, normalize, BitDepth, WorkingBuffer};
use crate::state::PipelineStats;

/// Delivery results for the two frames of one block
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockOutcome {
    pub sequence: u64,
    /// Samples decoded from the raw block
    pub samples: usize,
    /// Length of the padded working buffer (and of both frames)
    pub frame_len: usize,
    pub wave: BroadcastReport,
    pub spectrum: BroadcastReport,
}

/// Drives raw blocks through the spectrum conversion and the broadcaster
pub struct Pipeline {
    depth: BitDepth,
    broadcaster: Broadcaster,
    stats: Arc<PipelineStats>,
    sequence: u64,
}

impl Pipeline {
    pub fn new(depth: BitDepth, broadcaster: Broadcaster, stats: Arc<PipelineStats>) -> Self {
        Self {
            depth,
            broadcaster,
            stats,
            sequence: 0,
        }
    }

    /// Process one raw block.
    ///
    /// Taking `&mut self` keeps calls for one stream strictly sequential.
    /// Returns after both broadcasts have been attempted.
    pub async fn on_block(&mut self, raw: &[u8]) -> BlockOutcome {
        let sequence = self.sequence;
        self.sequence += 1;

        let samples = decode(raw, self.depth);
        let mut buffer = WorkingBuffer::from_samples(&samples);

        let wave = Arc::new(normalize(buffer.as_slice()));
        let wave_report = self
            .broadcaster
            .broadcast(wave, FrameKind::Wave, sequence)
            .await;

        fft_in_place(buffer.as_mut_slice());
        let spectrum = Arc::new(normalize(buffer.as_slice()));
        let spectrum_report = self
            .broadcaster
            .broadcast(spectrum, FrameKind::Spectrum, sequence)
            .await;

        self.stats.record_block();
        self.stats.record_broadcast(&wave_report);
        self.stats.record_broadcast(&spectrum_report);

        BlockOutcome {
            sequence,
            samples: samples.len(),
            frame_len: buffer.len(),
            wave: wave_report,
            spectrum: spectrum_report,
        }
    }

    /// Consume blocks until the source ends or shutdown is signalled.
    ///
    /// Shutdown is only observed between blocks, so a block that has started
    /// always finishes both of its broadcasts.
    pub async fn run(mut self, mut blocks: mpsc::Receiver<Vec<u8>>, mut shutdown: watch::Receiver<bool>) {
        info!("Pipeline started ({} samples)", self.depth);

        loop {
            if *shutdown.borrow() {
                info!("Pipeline stopping on shutdown signal");
                break;
            }

            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() {
                        info!("Shutdown handle dropped, stopping pipeline");
                        break;
                    }
                }

                block = blocks.recv() => match block {
                    Some(raw) => {
                        let outcome = self.on_block(&raw).await;
                        debug!(
                            "Block {}: {} bytes -> {} samples -> {} bins",
                            outcome.sequence,
                            raw.len(),
                            outcome.samples,
                            outcome.frame_len
                        );
                    }
                    None => {
                        info!("Block source ended, stopping pipeline");
                        break;
                    }
                },
            }
        }

        info!("Pipeline stopped after {} blocks", self.sequence);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fanout::{subscriber_channel, HubMessage, SubscriberRegistry};
    use soundwave_common::SubscriberId;
    use std::time::Duration;

    fn pipeline() -> (Pipeline, Arc<SubscriberRegistry>, Arc<PipelineStats>) {
        let registry = Arc::new(SubscriberRegistry::new());
        let stats = Arc::new(PipelineStats::default());
        let broadcaster = Broadcaster::new(Arc::clone(&registry), Duration::from_millis(50));
        (
            Pipeline::new(BitDepth::ThirtyTwo, broadcaster, Arc::clone(&stats)),
            registry,
            stats,
        )
    }

    fn block(values: &[i32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[tokio::test]
    async fn test_wave_then_spectrum() {
        let (mut pipeline, registry, stats) = pipeline();
        let (tx, mut rx) = subscriber_channel(4);
        registry.register(SubscriberId::new(), tx).await;

        let outcome = pipeline.on_block(&block(&[1, 0, 0])).await;
        assert_eq!(outcome.samples, 3);
        assert_eq!(outcome.frame_len, 4);
        assert_eq!(outcome.wave.delivered, 1);
        assert_eq!(outcome.spectrum.delivered, 1);

        match rx.try_recv().unwrap() {
            HubMessage::Frame { kind, sequence, frame } => {
                assert_eq!(kind, FrameKind::Wave);
                assert_eq!(sequence, 0);
                assert_eq!(frame.values(), &[1, 0, 0, 0]);
            }
            other => panic!("unexpected {:?}", other),
        }
        match rx.try_recv().unwrap() {
            HubMessage::Frame { kind, sequence, frame } => {
                assert_eq!(kind, FrameKind::Spectrum);
                assert_eq!(sequence, 0);
                assert_eq!(frame.values(), &[1, 1, 1, 1]);
            }
            other => panic!("unexpected {:?}", other),
        }

        assert_eq!(stats.snapshot().blocks_processed, 1);
        assert_eq!(stats.snapshot().frames_delivered, 2);
    }

    #[tokio::test]
    async fn test_sequence_increments() {
        let (mut pipeline, _registry, _stats) = pipeline();
        assert_eq!(pipeline.on_block(&block(&[1])).await.sequence, 0);
        assert_eq!(pipeline.on_block(&block(&[1])).await.sequence, 1);
    }

    #[tokio::test]
    async fn test_empty_block_yields_single_bin() {
        let (mut pipeline, _registry, _stats) = pipeline();
        let outcome = pipeline.on_block(&[0x01, 0x02]).await;
        assert_eq!(outcome.samples, 0);
        assert_eq!(outcome.frame_len, 1);
    }

    #[tokio::test]
    async fn test_run_stops_when_source_closes() {
        let (pipeline, _registry, stats) = pipeline();
        let (block_tx, block_rx) = mpsc::channel(4);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        block_tx.send(block(&[1, 2])).await.unwrap();
        block_tx.send(block(&[3, 4])).await.unwrap();
        drop(block_tx);

        pipeline.run(block_rx, shutdown_rx).await;
        assert_eq!(stats.snapshot().blocks_processed, 2);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let (pipeline, _registry, stats) = pipeline();
        let (_block_tx, block_rx) = mpsc::channel::<Vec<u8>>(4);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(pipeline.run(block_rx, shutdown_rx));
        shutdown_tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("pipeline did not stop")
            .unwrap();
        assert_eq!(stats.snapshot().blocks_processed, 0);
    }
}
