//! HTTP API for the spectrum hub
//!
//! SSE subscriber stream, hub messages, health and status endpoints.

pub mod handlers;
pub mod server;
pub mod sse;

pub use server::{build_router, run, AppContext};
