//! # SoundWave Common Library
//!
//! Shared code for the SoundWave services:
//! - Error type
//! - Event types sent to subscribers (frame kinds, hub messages)
//! - Configuration file discovery and loading

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
pub use events::{ChatMessage, FrameKind, SubscriberId};
