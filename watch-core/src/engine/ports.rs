//! Collaborator ports
//!
//! Everything the engine touches outside its own state goes through one of
//! these traits: the native player, the relay connection, timers, the wall
//! clock and whoever renders the room.

use std::time::Duration;

use thiserror::Error;

use crate::drift::SyncStatus;
use crate::network::TransportError;
use crate::sync::{ChatLine, Outbound, RoomState, VideoMode};

/// Playback state as reported by a player surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Unstarted,
    Playing,
    Paused,
    Buffering,
    Ended,
    Cued,
    Unknown,
}

/// What a player should play
#[derive(Debug, Clone, PartialEq)]
pub enum VideoSource {
    Streamed { video_id: String },
    /// A file the user picked; the native side already holds it
    Local { duration_secs: f64, size_bytes: u64 },
}

/// Player control failures. Never fatal: the engine logs and carries on.
#[derive(Debug, Error, PartialEq)]
pub enum PlayerError {
    #[error("operation not supported by this player")]
    Unsupported,

    #[error("player error: {0}")]
    Failed(String),
}

/// A native playback surface.
///
/// Every control defaults to `Unsupported`, so a surface that only
/// implements part of the interface simply turns the rest into no-ops.
pub trait PlayerSurface: Send {
    fn play(&mut self) -> Result<(), PlayerError> {
        Err(PlayerError::Unsupported)
    }

    fn pause(&mut self) -> Result<(), PlayerError> {
        Err(PlayerError::Unsupported)
    }

    fn seek_to(&mut self, _position: f64) -> Result<(), PlayerError> {
        Err(PlayerError::Unsupported)
    }

    fn set_playback_rate(&mut self, _rate: f64) -> Result<(), PlayerError> {
        Err(PlayerError::Unsupported)
    }

    /// Current position in seconds
    fn current_time(&self) -> Option<f64> {
        None
    }

    fn state(&self) -> PlayerState {
        PlayerState::Unknown
    }

    /// Whether the surface finished initialising and accepts controls
    fn is_ready(&self) -> bool {
        true
    }

    fn destroy(&mut self) -> Result<(), PlayerError> {
        Ok(())
    }
}

/// Builds player surfaces
pub trait PlayerFactory: Send {
    /// Whether the streamed-video backend finished loading
    fn backend_ready(&self) -> bool;

    /// Create a player. `player_id` tags the events it will report back.
    fn create(
        &mut self,
        player_id: u64,
        source: &VideoSource,
        controls: bool,
    ) -> Option<Box<dyn PlayerSurface>>;
}

/// Send side of the relay connection
pub trait Outbox: Send {
    fn send(&self, frame: &Outbound) -> Result<(), TransportError>;

    /// Shut the connection down; later sends fail
    fn close(&self) {}
}

/// Timers the engine can arm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Host beacon cadence
    Heartbeat,
    /// End of a soft drift correction
    RateRevert,
}

/// Delivers `EngineEvent::Timer` back into the engine.
///
/// At most one timer per kind is live; arming a kind replaces the previous one.
pub trait Scheduler: Send {
    fn schedule_once(&mut self, kind: TimerKind, delay: Duration);
    fn schedule_repeating(&mut self, kind: TimerKind, period: Duration);
    fn cancel(&mut self, kind: TimerKind);
}

/// Wall clock, milliseconds since the UNIX epoch
pub trait Clock: Send {
    fn now_ms(&self) -> u64;
}

/// Presentation layer
#[allow(unused_variables)]
pub trait SessionObserver: Send {
    fn on_state_changed(&mut self, state: &RoomState) {}
    fn on_mode_changed(&mut self, mode: VideoMode) {}
    /// Blocking notice for the user (rejected action)
    fn on_notice(&mut self, message: &str) {}
    fn on_chat(&mut self, line: &ChatLine) {}
    fn on_sync_status(&mut self, status: &SyncStatus) {}
    fn on_connection_changed(&mut self, connected: bool) {}
}

/// The full set of collaborators an engine runs against
pub struct EnginePorts {
    pub players: Box<dyn PlayerFactory>,
    pub outbox: Box<dyn Outbox>,
    pub scheduler: Box<dyn Scheduler>,
    pub clock: Box<dyn Clock>,
    pub observer: Box<dyn SessionObserver>,
}
