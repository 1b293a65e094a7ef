//! Subscriber fan-out
//!
//! Tracks connected subscribers and delivers frames and hub messages to each
//! of them independently.

pub mod broadcaster;
pub mod registry;

pub use broadcaster::{BroadcastReport, Broadcaster};
pub use registry::{
    subscriber_channel, RegistrationGuard, SubscriberReceiver, SubscriberRegistry,
    SubscriberSender,
};

use std::sync::Arc;

use soundwave_common::events::HUB_MESSAGE_EVENT;
use soundwave_common::{ChatMessage, FrameKind};

use crate::spectrum::Frame;

/// Message carried on a subscriber channel
#[derive(Debug, Clone, PartialEq)]
pub enum HubMessage {
    /// Wave or spectrum frame for one audio block
    Frame {
        kind: FrameKind,
        /// Block sequence number, shared by the wave and spectrum frame
        sequence: u64,
        frame: Arc<Frame>,
    },
    /// Chat line relayed to everyone
    Chat(ChatMessage),
}

impl HubMessage {
    /// Wire event name for this message
    pub fn event_name(&self) -> &'static str {
        match self {
            HubMessage::Frame { kind, .. } => kind.event_name(),
            HubMessage::Chat(_) => HUB_MESSAGE_EVENT,
        }
    }
}
