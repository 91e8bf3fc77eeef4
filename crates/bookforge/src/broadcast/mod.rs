//! Broadcasting modules for real-time event streaming.
//!
//! Events are fanned out over a tokio broadcast channel so that any
//! number of listeners (websocket bridges, desktop shells, tests) can
//! follow generation and rendering progress.

pub mod events;

pub use events::{BookEvent, EventBroadcaster};
