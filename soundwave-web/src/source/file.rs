//! WAV file playback source
//!
//! Feeds the pipeline from a PCM WAV file instead of a live device, paced
//! at one block per buffer interval to emulate real-time capture. Only the
//! first channel is used. Blocks are re-packed into the same raw encoding a
//! device delivers, so the pipeline cannot tell the two sources apart.

use hound::{SampleFormat, WavReader};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

use super::{BlockSender, Submit};
use crate::error::{Error, Result};
use crate::spectrum::pcm::encode_native;
use crate::spectrum::BitDepth;

pub struct FileSource {
    reader: WavReader<BufReader<File>>,
    depth: BitDepth,
    channels: usize,
    block_samples: usize,
    pacing: Duration,
    loop_file: bool,
}

impl FileSource {
    /// Open a WAV file and validate that it holds integer PCM the pipeline can decode
    pub fn open(path: &Path, buffer_ms: u64, loop_file: bool) -> Result<Self> {
        let reader = WavReader::open(path)?;
        let spec = reader.spec();

        if spec.sample_format != SampleFormat::Int {
            return Err(Error::Config(format!(
                "{}: floating point WAV is not supported",
                path.display()
            )));
        }

        let depth = BitDepth::try_from(spec.bits_per_sample)?;
        let block_samples = ((spec.sample_rate as u64 * buffer_ms / 1000) as usize).max(1);

        info!(
            "Opened {}: {} Hz, {} channel(s), {}, {} samples per block",
            path.display(),
            spec.sample_rate,
            spec.channels,
            depth,
            block_samples
        );

        Ok(Self {
            reader,
            depth,
            channels: spec.channels.max(1) as usize,
            block_samples,
            pacing: Duration::from_millis(buffer_ms.max(1)),
            loop_file,
        })
    }

    pub fn bit_depth(&self) -> BitDepth {
        self.depth
    }

    pub fn block_samples(&self) -> usize {
        self.block_samples
    }

    /// Read the next block, `None` at end of file (unless looping).
    ///
    /// The last block of a file may be short.
    pub fn next_block(&mut self) -> Result<Option<Vec<u8>>> {
        let block = self.read_block()?;
        if !block.is_empty() {
            return Ok(Some(block));
        }

        if self.loop_file {
            debug!("End of file, looping");
            self.reader.seek(0)?;
            let block = self.read_block()?;
            if !block.is_empty() {
                return Ok(Some(block));
            }
        }

        Ok(None)
    }

    fn read_block(&mut self) -> Result<Vec<u8>> {
        let depth = self.depth;
        let channels = self.channels;
        let mut raw = Vec::with_capacity(self.block_samples * depth.byte_width());

        let wanted = self.block_samples * channels;
        for (i, sample) in self.reader.samples::<i32>().take(wanted).enumerate() {
            let sample = sample?;
            if i % channels == 0 {
                encode_native(sample, depth, &mut raw);
            }
        }

        Ok(raw)
    }

    /// Emit one block per pacing interval until the file ends or the source is stopped
    pub async fn run(mut self, sink: BlockSender, running: Arc<AtomicBool>) {
        let mut ticker = interval(self.pacing);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut blocks = 0u64;
        while running.load(Ordering::SeqCst) {
            ticker.tick().await;

            let block = match self.next_block() {
                Ok(Some(block)) => block,
                Ok(None) => {
                    info!("File playback finished after {} blocks", blocks);
                    break;
                }
                Err(e) => {
                    error!("File playback failed: {}", e);
                    break;
                }
            };

            blocks += 1;
            if sink.submit(block) == Submit::Closed {
                debug!("Pipeline closed, file source exiting");
                break;
            }
        }

        info!("File source stopped");
    }
}
