//! Watch Together - Core Library
//!
//! This library keeps video playback in sync across everyone in a room.
//! A host drives play/pause/seek over a WebSocket relay; clients follow the
//! host's heartbeat and correct their own drift.

pub mod config;
pub mod drift;
pub mod engine;
pub mod ffi;
pub mod network;
pub mod seek_throttle;
pub mod sync;

// Re-exports for convenience
pub use config::{JoinRequest, SyncConfig, TransportConfig};
pub use engine::{EngineHandle, PolicyViolation, UserAction};
pub use sync::{Envelope, RoomState};

// Setup uniffi scaffolding
uniffi::setup_scaffolding!();
