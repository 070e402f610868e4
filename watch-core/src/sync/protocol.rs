//! Sync Protocol Messages
//!
//! Wire format shared with the room relay: one JSON object per message, the
//! message kind in the `type` field and kind-specific fields next to it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::state::{Role, VideoMode};

/// Errors produced while decoding or encoding an envelope
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Host play/pause instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandAction {
    Play,
    Pause,
}

/// Video descriptor carried by a `roomState` resync
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoDescriptor {
    pub mode: VideoMode,
    #[serde(default)]
    pub video_id: Option<String>,
}

/// Room snapshot the relay hands to a participant joining mid-session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomStatePayload {
    #[serde(default)]
    pub video: Option<VideoDescriptor>,
    /// Last position reported by the host heartbeat (seconds)
    #[serde(default)]
    pub position: f64,
    #[serde(default)]
    pub playing: bool,
}

/// Messages exchanged through the relay
///
/// `from` fields are stamped by the relay on the way in; we never set them on
/// outbound messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Envelope {
    // === Session ===
    /// Relay assigned our connection identifier
    Connected { client_id: String },

    /// Relay acknowledged a `createRoom`
    RoomCreated {
        #[serde(default)]
        room: Option<String>,
    },

    /// Full state resync, sent to us right after we join
    RoomState { state: RoomStatePayload },

    /// Current roster of connection identifiers
    Participants {
        #[serde(default)]
        list: Vec<String>,
    },

    /// Ask the relay to create a room
    CreateRoom { room: String },

    /// Join a room
    Join { room: String, role: Role, name: String },

    // === Readiness ===
    Ready {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<String>,
        #[serde(default)]
        ready: bool,
    },

    /// Local file fingerprint used for the same-video check
    LocalMeta {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<String>,
        duration: f64,
        size: u64,
    },

    // === Playback (host) ===
    /// Load a streamed video
    Video {
        mode: VideoMode,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        video_id: Option<String>,
    },

    /// Play/pause everyone
    Command { action: CommandAction },

    /// Tear down the current video everywhere
    ClearVideo,

    /// Periodic position beacon
    Heartbeat { position: f64, wall_ts: u64 },

    // === Timeline ===
    Seek { position: f64 },

    // === Chat ===
    Chat {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<String>,
        #[serde(default)]
        from_name: String,
        #[serde(default)]
        text: String,
    },

    /// Any `type` we do not know about
    #[serde(other)]
    Unknown,
}

impl Envelope {
    /// Short name used in log lines
    pub fn kind(&self) -> &'static str {
        match self {
            Envelope::Connected { .. } => "connected",
            Envelope::RoomCreated { .. } => "roomCreated",
            Envelope::RoomState { .. } => "roomState",
            Envelope::Participants { .. } => "participants",
            Envelope::CreateRoom { .. } => "createRoom",
            Envelope::Join { .. } => "join",
            Envelope::Ready { .. } => "ready",
            Envelope::LocalMeta { .. } => "localMeta",
            Envelope::Video { .. } => "video",
            Envelope::Command { .. } => "command",
            Envelope::ClearVideo => "clearVideo",
            Envelope::Heartbeat { .. } => "heartbeat",
            Envelope::Seek { .. } => "seek",
            Envelope::Chat { .. } => "chat",
            Envelope::Unknown => "unknown",
        }
    }

    /// Check if this is a message only the host may originate
    pub fn requires_host(&self) -> bool {
        matches!(
            self,
            Envelope::Video { .. }
                | Envelope::Command { .. }
                | Envelope::ClearVideo
                | Envelope::Heartbeat { .. }
                | Envelope::CreateRoom { .. }
        )
    }
}

/// An outbound envelope, tagged with the room it is addressed to
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outbound {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    #[serde(flatten)]
    pub envelope: Envelope,
}

impl Outbound {
    pub fn new(room: Option<String>, envelope: Envelope) -> Self {
        // createRoom/join already name their room
        let room = match envelope {
            Envelope::CreateRoom { .. } | Envelope::Join { .. } => None,
            _ => room,
        };
        Self { room, envelope }
    }
}

/// Decode one inbound transport frame
pub fn decode(text: &str) -> Result<Envelope, CodecError> {
    Ok(serde_json::from_str(text)?)
}

/// Encode one outbound frame
pub fn encode(frame: &Outbound) -> Result<String, CodecError> {
    Ok(serde_json::to_string(frame)?)
}
