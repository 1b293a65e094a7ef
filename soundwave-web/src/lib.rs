//! # Soundwave Web Library (soundwave-web)
//!
//! Real-time audio spectrum hub.
//!
//! **Purpose:** Capture raw PCM blocks from an input device (or a WAV file or
//! test tone), convert each block into a time-domain wave frame and a
//! frequency-domain spectrum frame, and fan both out to every connected
//! subscriber over Server-Sent Events.
//!
//! **Architecture:** source -> bounded block queue -> single pipeline task ->
//! broadcaster -> per-subscriber bounded channels -> SSE streams

pub mod api;
pub mod config;
pub mod error;
pub mod fanout;
pub mod pipeline;
pub mod source;
pub mod spectrum;
pub mod state;

pub use error::{Error, Result};
pub use state::SharedState;
