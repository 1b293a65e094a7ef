//! Test helpers for soundwave-web integration tests
//!
//! Provides reusable test infrastructure components:
//! - TestServer: router plus shared state, driven in-process with `oneshot`
//! - pcm: raw block builders for the supported bit depths

pub mod pcm;
pub mod test_server;

pub use test_server::TestServer;
