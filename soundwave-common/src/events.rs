//! Event types pushed to subscribers
//!
//! Event names match what the browser visualizer listens for, so they are
//! part of the wire contract and must not be renamed casually.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::Error;

/// Event name for hub chat messages
pub const HUB_MESSAGE_EVENT: &str = "ReceiveMessage";

/// Kind of frame produced for each audio block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameKind {
    /// Time-domain samples, before the transform
    Wave,
    /// Frequency-domain values, after the transform
    Spectrum,
}

impl FrameKind {
    /// SSE event name used on the wire
    pub fn event_name(self) -> &'static str {
        match self {
            FrameKind::Wave => "SendWave",
            FrameKind::Spectrum => "SendFFT",
        }
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameKind::Wave => write!(f, "wave"),
            FrameKind::Spectrum => write!(f, "spectrum"),
        }
    }
}

/// Free-form message relayed to every subscriber
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub user: String,
    pub message: String,
}

/// Opaque connection identity of a subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    /// Generate a fresh random id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SubscriberId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| Error::InvalidInput(format!("Invalid subscriber id '{}': {}", s, e)))
    }
}
