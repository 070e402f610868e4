//! FFI types exposed via uniffi

use crate::drift::{Correction, DriftReading, SyncStatus as InternalSyncStatus};
use crate::engine::{
    PlayerEvent, PlayerState as InternalPlayerState, PolicyViolation,
    VideoSource as InternalVideoSource,
};
use crate::sync::{
    ChatLine, MatchTolerance, Role as InternalRole, RoomState as InternalRoomState,
    VideoMode as InternalVideoMode,
};

/// Error types exposed via FFI
#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum CoreError {
    #[error("Not in a room")]
    NotInRoom,

    #[error("Already in a room")]
    AlreadyInRoom,

    #[error("Not the host")]
    NotHost,

    #[error("Wait until all users are ready.")]
    NotAllReady,

    #[error("All users must load the same video before ready.")]
    VideosDoNotMatch,

    #[error("Invalid video link")]
    InvalidVideoUrl,

    #[error("No video loaded")]
    NoPlayer,

    #[error("Please enter a room")]
    InvalidRoom,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Runtime error: {0}")]
    RuntimeError(String),
}

impl From<PolicyViolation> for CoreError {
    fn from(v: PolicyViolation) -> Self {
        match v {
            PolicyViolation::NotHost => CoreError::NotHost,
            PolicyViolation::NotAllReady => CoreError::NotAllReady,
            PolicyViolation::VideosDoNotMatch => CoreError::VideosDoNotMatch,
            PolicyViolation::InvalidVideoUrl => CoreError::InvalidVideoUrl,
            PolicyViolation::NoPlayer => CoreError::NoPlayer,
            PolicyViolation::NotInRoom => CoreError::NotInRoom,
        }
    }
}

/// Role in a room
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum Role {
    Host,
    Client,
}

impl From<Role> for InternalRole {
    fn from(r: Role) -> Self {
        match r {
            Role::Host => InternalRole::Host,
            Role::Client => InternalRole::Client,
        }
    }
}

impl From<InternalRole> for Role {
    fn from(r: InternalRole) -> Self {
        match r {
            InternalRole::Host => Role::Host,
            InternalRole::Client => Role::Client,
        }
    }
}

/// What the room is watching
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum VideoMode {
    None,
    Local,
    Streamed,
}

impl From<InternalVideoMode> for VideoMode {
    fn from(m: InternalVideoMode) -> Self {
        match m {
            InternalVideoMode::None => VideoMode::None,
            InternalVideoMode::Local => VideoMode::Local,
            InternalVideoMode::Streamed => VideoMode::Streamed,
        }
    }
}

/// How to join
#[derive(Debug, Clone, uniffi::Record)]
pub struct JoinConfig {
    /// Room name, room code or invite link. Hosts may leave it empty.
    pub room: Option<String>,
    pub role: Role,
    pub display_name: String,
    /// Overrides `WATCH_RELAY_URL` and the built-in default
    pub relay_url: Option<String>,
}

/// Participant exposed via FFI
#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct Participant {
    pub id: String,
    pub ready: bool,
    pub is_self: bool,
}

/// Chat line exposed via FFI
#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct ChatMessage {
    pub from_name: String,
    pub text: String,
}

impl From<&ChatLine> for ChatMessage {
    fn from(l: &ChatLine) -> Self {
        Self {
            from_name: l.from_name.clone(),
            text: l.text.clone(),
        }
    }
}

/// Room state exposed via FFI
#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct RoomState {
    pub room_id: String,
    pub role: Role,
    pub self_name: String,
    pub self_id: Option<String>,
    pub self_ready: bool,
    pub participants: Vec<Participant>,
    pub mode: VideoMode,
    pub streamed_id: Option<String>,
    pub position_secs: f64,
    pub playing: bool,
    pub all_ready: bool,
    /// Local mode only: every reported file matches
    pub videos_match: bool,
    pub chat: Vec<ChatMessage>,
}

impl RoomState {
    pub fn snapshot(state: &InternalRoomState, tolerance: &MatchTolerance) -> Self {
        let room = state.room();
        let video = state.video();
        Self {
            room_id: room.room_id.clone(),
            role: room.role.into(),
            self_name: room.self_name.clone(),
            self_id: state.self_id().map(str::to_string),
            self_ready: state.self_ready(),
            participants: state
                .participants()
                .iter()
                .map(|p| Participant {
                    id: p.id.clone(),
                    ready: p.ready,
                    is_self: state.self_id() == Some(p.id.as_str()),
                })
                .collect(),
            mode: video.mode.into(),
            streamed_id: video.streamed_id.clone(),
            position_secs: video.position,
            playing: video.playing,
            all_ready: state.all_ready(),
            videos_match: state.videos_match(tolerance),
            chat: state.chat().map(ChatMessage::from).collect(),
        }
    }
}

/// Native player state
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum PlayerStatus {
    Unstarted,
    Playing,
    Paused,
    Buffering,
    Ended,
    Cued,
    Unknown,
}

impl From<PlayerStatus> for InternalPlayerState {
    fn from(s: PlayerStatus) -> Self {
        match s {
            PlayerStatus::Unstarted => InternalPlayerState::Unstarted,
            PlayerStatus::Playing => InternalPlayerState::Playing,
            PlayerStatus::Paused => InternalPlayerState::Paused,
            PlayerStatus::Buffering => InternalPlayerState::Buffering,
            PlayerStatus::Ended => InternalPlayerState::Ended,
            PlayerStatus::Cued => InternalPlayerState::Cued,
            PlayerStatus::Unknown => InternalPlayerState::Unknown,
        }
    }
}

/// Player callback reported by the native side
#[derive(Debug, Clone, Copy, PartialEq, uniffi::Enum)]
pub enum PlayerEventKind {
    Ready,
    StateChanged { status: PlayerStatus },
}

impl From<PlayerEventKind> for PlayerEvent {
    fn from(e: PlayerEventKind) -> Self {
        match e {
            PlayerEventKind::Ready => PlayerEvent::Ready,
            PlayerEventKind::StateChanged { status } => PlayerEvent::StateChanged(status.into()),
        }
    }
}

/// What a native player should play
#[derive(Debug, Clone, PartialEq, uniffi::Enum)]
pub enum VideoSource {
    Streamed { video_id: String },
    Local { duration_secs: f64, size_bytes: u64 },
}

impl From<&InternalVideoSource> for VideoSource {
    fn from(s: &InternalVideoSource) -> Self {
        match s {
            InternalVideoSource::Streamed { video_id } => VideoSource::Streamed {
                video_id: video_id.clone(),
            },
            InternalVideoSource::Local {
                duration_secs,
                size_bytes,
            } => VideoSource::Local {
                duration_secs: *duration_secs,
                size_bytes: *size_bytes,
            },
        }
    }
}

/// Drift correction applied for one beacon
#[derive(Debug, Clone, Copy, PartialEq, uniffi::Enum)]
pub enum DriftCorrection {
    None,
    Soft { rate: f64 },
    Hard { target_secs: f64 },
}

impl From<Correction> for DriftCorrection {
    fn from(c: Correction) -> Self {
        match c {
            Correction::None => DriftCorrection::None,
            Correction::Soft { rate } => DriftCorrection::Soft { rate },
            Correction::Hard { target } => DriftCorrection::Hard {
                target_secs: target,
            },
        }
    }
}

/// One evaluated beacon for debug display
#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct DriftSample {
    pub expected_secs: f64,
    pub local_secs: f64,
    /// Positive = behind the host
    pub drift_secs: f64,
    pub elapsed_ms: i64,
    pub correction: DriftCorrection,
}

impl From<&DriftReading> for DriftSample {
    fn from(r: &DriftReading) -> Self {
        Self {
            expected_secs: r.expected,
            local_secs: r.local,
            drift_secs: r.diff,
            elapsed_ms: r.elapsed_ms,
            correction: r.correction.into(),
        }
    }
}

/// Sync status for debug display (clients only)
#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct SyncStatus {
    /// Positive = behind the host
    pub drift_secs: f64,
    /// Time the last beacon spent in flight
    pub elapsed_ms: i64,
    pub correction: DriftCorrection,
    /// Recent samples (newest last)
    pub history: Vec<DriftSample>,
}

impl From<&InternalSyncStatus> for SyncStatus {
    fn from(s: &InternalSyncStatus) -> Self {
        Self {
            drift_secs: s.drift_secs,
            elapsed_ms: s.elapsed_ms,
            correction: s.correction.into(),
            history: s.history.iter().map(DriftSample::from).collect(),
        }
    }
}

/// Callback interface for session events
#[uniffi::export(callback_interface)]
pub trait SessionCallback: Send + Sync {
    fn on_room_state_changed(&self, state: RoomState);
    fn on_mode_changed(&self, mode: VideoMode);
    /// Show a blocking notice (rejected action)
    fn on_notice(&self, message: String);
    fn on_chat(&self, message: ChatMessage);
    /// Called on every host beacon (clients only)
    fn on_sync_status(&self, status: SyncStatus);
    fn on_connection_changed(&self, connected: bool);
}

/// Native playback surfaces, addressed by player id.
///
/// Controls return false when the current surface cannot do them.
#[uniffi::export(callback_interface)]
pub trait PlayerBridge: Send + Sync {
    /// Whether the streamed-video backend finished loading
    fn backend_ready(&self) -> bool;
    /// Build a player; false if it could not be created
    fn create_player(&self, player_id: u64, source: VideoSource, controls: bool) -> bool;
    fn play(&self, player_id: u64) -> bool;
    fn pause(&self, player_id: u64) -> bool;
    fn seek_to(&self, player_id: u64, position_secs: f64) -> bool;
    fn set_playback_rate(&self, player_id: u64, rate: f64) -> bool;
    fn current_time(&self, player_id: u64) -> Option<f64>;
    fn player_status(&self, player_id: u64) -> PlayerStatus;
    fn is_ready(&self, player_id: u64) -> bool;
    fn destroy_player(&self, player_id: u64);
}
