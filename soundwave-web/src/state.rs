//! Shared service state
//!
//! The subscriber registry is the only state that crosses between the
//! pipeline task and the connection handlers; the counters here are
//! lock-free observability for the status endpoint.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::fanout::{BroadcastReport, Broadcaster, SubscriberRegistry};

/// Pipeline counters, updated by the pipeline task and the capture layer
#[derive(Debug, Default)]
pub struct PipelineStats {
    blocks_processed: AtomicU64,
    blocks_dropped: AtomicU64,
    frames_delivered: AtomicU64,
    deliveries_failed: AtomicU64,
}

/// Point-in-time copy of [`PipelineStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub blocks_processed: u64,
    pub blocks_dropped: u64,
    pub frames_delivered: u64,
    pub deliveries_failed: u64,
}

impl PipelineStats {
    pub fn record_block(&self) {
        self.blocks_processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Block discarded at the capture layer because the pipeline was behind
    pub fn record_dropped_block(&self) -> u64 {
        self.blocks_dropped.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_broadcast(&self, report: &BroadcastReport) {
        self.frames_delivered
            .fetch_add(report.delivered as u64, Ordering::Relaxed);
        self.deliveries_failed
            .fetch_add(report.failed() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            blocks_processed: self.blocks_processed.load(Ordering::Relaxed),
            blocks_dropped: self.blocks_dropped.load(Ordering::Relaxed),
            frames_delivered: self.frames_delivered.load(Ordering::Relaxed),
            deliveries_failed: self.deliveries_failed.load(Ordering::Relaxed),
        }
    }
}

/// State shared by the pipeline, the sources and the HTTP handlers
#[derive(Debug)]
pub struct SharedState {
    pub registry: Arc<SubscriberRegistry>,
    pub broadcaster: Broadcaster,
    pub stats: Arc<PipelineStats>,
    pub started_at: DateTime<Utc>,
}

impl SharedState {
    pub fn new(send_timeout: Duration) -> Self {
        let registry = Arc::new(SubscriberRegistry::new());
        Self {
            broadcaster: Broadcaster::new(Arc::clone(&registry), send_timeout),
            registry,
            stats: Arc::new(PipelineStats::default()),
            started_at: Utc::now(),
        }
    }
}
