//! Raw block sources
//!
//! A source pushes raw PCM blocks into the pipeline's bounded queue. Sources
//! never wait on the pipeline: when the queue is full the block is dropped
//! here and counted, so overload is absorbed at the capture layer and the
//! pipeline keeps processing blocks strictly in order.

pub mod capture;
pub mod file;
pub mod tone;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::{Config, SourceKind};
use crate::error::{Error, Result};
use crate::spectrum::BitDepth;
use crate::state::PipelineStats;

/// Outcome of handing a block to the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submit {
    Queued,
    /// Pipeline busy, block discarded
    Dropped,
    /// Pipeline gone, the source should stop
    Closed,
}

/// Producer side of the raw block queue
#[derive(Debug, Clone)]
pub struct BlockSender {
    tx: mpsc::Sender<Vec<u8>>,
    stats: Arc<PipelineStats>,
}

impl BlockSender {
    pub fn new(tx: mpsc::Sender<Vec<u8>>, stats: Arc<PipelineStats>) -> Self {
        Self { tx, stats }
    }

    /// Non-blocking submit, safe to call from a real-time audio callback
    pub fn submit(&self, block: Vec<u8>) -> Submit {
        match self.tx.try_send(block) {
            Ok(()) => Submit::Queued,
            Err(mpsc::error::TrySendError::Full(_)) => {
                let dropped = self.stats.record_dropped_block();
                if dropped == 1 || dropped % 100 == 0 {
                    warn!("Pipeline behind, {} blocks dropped so far", dropped);
                }
                Submit::Dropped
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Submit::Closed,
        }
    }
}

/// Create the raw block queue between a source and the pipeline
pub fn block_channel(capacity: usize, stats: Arc<PipelineStats>) -> (BlockSender, mpsc::Receiver<Vec<u8>>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (BlockSender::new(tx, stats), rx)
}

enum SourceWorker {
    Thread(std::thread::JoinHandle<()>),
    Task(tokio::task::JoinHandle<()>),
}

/// A started source
pub struct RunningSource {
    kind: SourceKind,
    depth: BitDepth,
    running: Arc<AtomicBool>,
    worker: SourceWorker,
}

impl RunningSource {
    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    /// Bit depth of the blocks this source produces
    pub fn bit_depth(&self) -> BitDepth {
        self.depth
    }

    /// Tell the source to stop capturing and wait for it to finish
    pub async fn stop(self) {
        info!("Stopping {} source", self.kind);
        self.running.store(false, Ordering::SeqCst);

        match self.worker {
            SourceWorker::Thread(handle) => {
                let joined = tokio::task::spawn_blocking(move || handle.join()).await;
                if !matches!(joined, Ok(Ok(()))) {
                    warn!("{} source thread did not exit cleanly", self.kind);
                }
            }
            SourceWorker::Task(handle) => {
                if let Err(e) = handle.await {
                    warn!("{} source task failed: {}", self.kind, e);
                }
            }
        }
    }
}

/// Start the source selected in `config`
///
/// Must be called from within a Tokio runtime.
pub fn start(config: &Config, sink: BlockSender) -> Result<RunningSource> {
    let running = Arc::new(AtomicBool::new(true));

    let (depth, worker) = match config.source {
        SourceKind::Device => {
            let (depth, handle) = capture::spawn(
                capture::CaptureSettings::from_config(config),
                sink,
                Arc::clone(&running),
            )?;
            (depth, SourceWorker::Thread(handle))
        }
        SourceKind::File => {
            let path = config
                .file_path
                .clone()
                .ok_or_else(|| Error::Config("file source requires a file path".to_string()))?;
            let source = file::FileSource::open(&path, config.buffer_ms, config.loop_file)?;
            let depth = source.bit_depth();
            let handle = tokio::spawn(source.run(sink, Arc::clone(&running)));
            (depth, SourceWorker::Task(handle))
        }
        SourceKind::Tone => {
            let source = tone::ToneSource::new(config.bit_depth, config.block_samples(), config.buffer_interval());
            let handle = tokio::spawn(source.run(sink, Arc::clone(&running)));
            (config.bit_depth, SourceWorker::Task(handle))
        }
    };

    info!("Started {} source producing {} blocks", config.source, depth);

    Ok(RunningSource {
        kind: config.source,
        depth,
        running,
        worker,
    })
}
