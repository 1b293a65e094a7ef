//! Concurrent per-subscriber delivery
//!
//! Each broadcast sends to every registered subscriber in parallel. A send
//! that cannot complete within the configured timeout, or whose receiver is
//! gone, is counted as failed for that subscriber only; the call itself never
//! fails and returns once every attempt has finished. A subscriber that times
//! out on several consecutive sends is evicted so it stops costing every
//! later block a full timeout.

use futures::future::join_all;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

use soundwave_common::{ChatMessage, FrameKind, SubscriberId};

use super::registry::SubscriberRegistry;
use super::HubMessage;
use crate::spectrum::Frame;

/// Consecutive timed-out sends after which a subscriber is dropped
pub const MAX_CONSECUTIVE_TIMEOUTS: u32 = 3;

/// Outcome counts for one broadcast call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Subscribers eligible for this message when the fan-out started
    pub attempted: usize,
    pub delivered: usize,
    /// Receiver already dropped (subscriber disconnected)
    pub closed: usize,
    /// Subscriber queue stayed full for the whole send timeout
    pub timed_out: usize,
    /// Timed-out subscribers removed from the registry
    pub evicted: usize,
}

impl BroadcastReport {
    pub fn failed(&self) -> usize {
        self.closed + self.timed_out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    Delivered,
    Closed,
    TimedOut { evict: bool },
}

/// Delivers hub messages to every registered subscriber
#[derive(Debug, Clone)]
pub struct Broadcaster {
    registry: Arc<SubscriberRegistry>,
    send_timeout: Duration,
}

impl Broadcaster {
    /// Create a broadcaster over `registry`
    ///
    /// # Arguments
    ///
    /// * `send_timeout` - Upper bound on how long one subscriber may hold up a broadcast
    pub fn new(registry: Arc<SubscriberRegistry>, send_timeout: Duration) -> Self {
        Self {
            registry,
            send_timeout,
        }
    }

    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    pub fn send_timeout(&self) -> Duration {
        self.send_timeout
    }

    /// Send a wave or spectrum frame to every subscriber.
    ///
    /// A wave frame opens block `sequence`: subscribers registering from now
    /// on skip the rest of it, including its spectrum frame.
    pub async fn broadcast(&self, frame: Arc<Frame>, kind: FrameKind, sequence: u64) -> BroadcastReport {
        if kind == FrameKind::Wave {
            self.registry.start_block(sequence);
        }

        let report = self
            .fan_out(HubMessage::Frame {
                kind,
                sequence,
                frame,
            })
            .await;

        debug!(
            "Block {} {} frame: delivered {}/{}",
            sequence, kind, report.delivered, report.attempted
        );
        report
    }

    /// Relay a chat message to every subscriber
    pub async fn broadcast_message(&self, message: ChatMessage) -> BroadcastReport {
        self.fan_out(HubMessage::Chat(message)).await
    }

    async fn fan_out(&self, message: HubMessage) -> BroadcastReport {
        // Read guard held until every delivery finished, see registry docs
        let subscribers = self.registry.read().await;

        let deliveries = subscribers
            .iter()
            .filter(|(_, subscriber)| !subscriber.predates(&message))
            .map(|(id, subscriber)| {
                let message = message.clone();
                async move {
                    let outcome = match timeout(self.send_timeout, subscriber.sender.send(message)).await {
                        Ok(Ok(())) => {
                            subscriber.timeouts.store(0, Ordering::Relaxed);
                            Delivery::Delivered
                        }
                        Ok(Err(_)) => Delivery::Closed,
                        Err(_) => {
                            let misses = subscriber.timeouts.fetch_add(1, Ordering::Relaxed) + 1;
                            Delivery::TimedOut {
                                evict: misses >= MAX_CONSECUTIVE_TIMEOUTS,
                            }
                        }
                    };
                    (*id, outcome)
                }
            });

        let outcomes: Vec<(SubscriberId, Delivery)> = join_all(deliveries).await;
        drop(subscribers);

        let mut report = BroadcastReport {
            attempted: outcomes.len(),
            ..Default::default()
        };
        let mut evicted = Vec::new();

        for (id, outcome) in outcomes {
            match outcome {
                Delivery::Delivered => report.delivered += 1,
                Delivery::Closed => {
                    debug!("Subscriber {} closed before {} was delivered", id, message.event_name());
                    report.closed += 1;
                }
                Delivery::TimedOut { evict } => {
                    warn!(
                        "Subscriber {} did not accept {} within {:?}, dropped",
                        id,
                        message.event_name(),
                        self.send_timeout
                    );
                    report.timed_out += 1;
                    if evict {
                        evicted.push(id);
                    }
                }
            }
        }

        if !evicted.is_empty() {
            warn!(
                "Evicting {} subscriber(s) after {} consecutive timeouts",
                evicted.len(),
                MAX_CONSECUTIVE_TIMEOUTS
            );
            self.registry.evict(&evicted).await;
            report.evicted = evicted.len();
        }

        report
    }
}
