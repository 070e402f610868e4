//! Room State Management

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::matcher::{LocalMetaTable, MatchTolerance};
use super::readiness;

/// Our role in the room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Host,
    Client,
}

/// Which kind of video the room is watching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VideoMode {
    #[default]
    #[serde(rename = "none")]
    None,
    /// Every participant plays their own copy of a file
    #[serde(rename = "local")]
    Local,
    /// Third-party streamed video (the relay calls it "youtube")
    #[serde(rename = "youtube", alias = "streamed")]
    Streamed,
}

/// Participant in a room
#[derive(Debug, Clone, PartialEq)]
pub struct Participant {
    /// Relay-assigned connection identifier
    pub id: String,
    pub ready: bool,
}

/// Fingerprint of a locally loaded file
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalFileMeta {
    pub duration_secs: f64,
    pub size_bytes: u64,
}

/// Room we joined; fixed for the life of the session
#[derive(Debug, Clone, PartialEq)]
pub struct RoomInfo {
    pub room_id: String,
    pub role: Role,
    pub self_name: String,
}

/// Shared video timeline
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VideoState {
    pub mode: VideoMode,
    pub streamed_id: Option<String>,
    /// Logical timeline position in seconds
    pub position: f64,
    pub playing: bool,
}

/// One chat line
#[derive(Debug, Clone, PartialEq)]
pub struct ChatLine {
    pub from_name: String,
    pub text: String,
}

/// What a roster resync changed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RosterChange {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl RosterChange {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Everything one client knows about its room.
///
/// Readable by anyone; mutated only by the engine while it handles an event.
#[derive(Debug, Clone)]
pub struct RoomState {
    room: RoomInfo,
    /// Our relay-assigned id, once the relay told us
    self_id: Option<String>,
    /// Whether we told the room we are ready
    self_ready: bool,
    participants: Vec<Participant>,
    video: VideoState,
    local_meta: LocalMetaTable,
    chat: VecDeque<ChatLine>,
    chat_capacity: usize,
}

impl RoomState {
    pub fn new(room: RoomInfo, chat_capacity: usize) -> Self {
        Self {
            room,
            self_id: None,
            self_ready: false,
            participants: Vec::new(),
            video: VideoState::default(),
            local_meta: LocalMetaTable::new(),
            chat: VecDeque::new(),
            chat_capacity,
        }
    }

    pub fn room(&self) -> &RoomInfo {
        &self.room
    }

    pub fn self_id(&self) -> Option<&str> {
        self.self_id.as_deref()
    }

    pub fn self_ready(&self) -> bool {
        self.self_ready
    }

    /// Check if we are the host
    pub fn is_host(&self) -> bool {
        self.room.role == Role::Host
    }

    /// Host id, as far as this client can tell (only the host knows it for sure)
    pub fn host_id(&self) -> Option<&str> {
        if self.is_host() {
            self.self_id()
        } else {
            None
        }
    }

    /// Roster in relay order
    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn participant(&self, id: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == id)
    }

    pub fn video(&self) -> &VideoState {
        &self.video
    }

    pub fn mode(&self) -> VideoMode {
        self.video.mode
    }

    pub fn local_meta(&self) -> &LocalMetaTable {
        &self.local_meta
    }

    pub fn chat(&self) -> impl Iterator<Item = &ChatLine> {
        self.chat.iter()
    }

    /// Readiness consensus over the current roster
    pub fn all_ready(&self) -> bool {
        readiness::all_ready(&self.participants, self.host_id())
    }

    pub fn videos_match(&self, tolerance: &MatchTolerance) -> bool {
        self.local_meta.videos_match(tolerance)
    }

    // === Mutations (engine only) ===

    pub(crate) fn set_self_id(&mut self, id: String) {
        self.self_id = Some(id);
    }

    pub(crate) fn set_self_ready(&mut self, ready: bool) {
        self.self_ready = ready;
    }

    /// Replace the roster, keeping the readiness of members present in both
    /// the old and the new list. Newcomers start unready.
    pub(crate) fn sync_roster(&mut self, ids: &[String]) -> RosterChange {
        let mut previous = std::mem::take(&mut self.participants);
        let mut change = RosterChange::default();

        for id in ids {
            if self.participants.iter().any(|p| &p.id == id) {
                continue;
            }
            match previous.iter().position(|p| &p.id == id) {
                Some(idx) => self.participants.push(previous.swap_remove(idx)),
                None => {
                    change.added.push(id.clone());
                    self.participants.push(Participant { id: id.clone(), ready: false });
                }
            }
        }

        change.removed = previous.into_iter().map(|p| p.id).collect();
        change
    }

    /// Set one participant's readiness, adding them if we have not seen them.
    /// Returns true if anything changed.
    pub(crate) fn set_ready(&mut self, id: &str, ready: bool) -> bool {
        match self.participants.iter_mut().find(|p| p.id == id) {
            Some(p) if p.ready == ready => false,
            Some(p) => {
                p.ready = ready;
                true
            }
            None => {
                self.participants.push(Participant { id: id.to_string(), ready });
                true
            }
        }
    }

    /// Switch to a streamed video. Nothing from the previous video survives.
    pub(crate) fn load_streamed(&mut self, video_id: &str) {
        self.local_meta.clear();
        self.video = VideoState {
            mode: VideoMode::Streamed,
            streamed_id: Some(video_id.to_string()),
            position: 0.0,
            playing: false,
        };
    }

    /// Switch to local-file mode. Reports from other participants are kept if
    /// we already were in local mode.
    pub(crate) fn enter_local(&mut self) {
        if self.video.mode == VideoMode::Local {
            return;
        }
        self.local_meta.clear();
        self.video = VideoState {
            mode: VideoMode::Local,
            ..VideoState::default()
        };
    }

    /// Back to no video at all
    pub(crate) fn clear_video(&mut self) {
        self.local_meta.clear();
        self.video = VideoState::default();
    }

    /// Record a participant's file report. Ignored while a streamed video is
    /// loaded; a report arriving with no video switches the room to local mode.
    pub(crate) fn record_local_meta(&mut self, id: &str, meta: LocalFileMeta) -> bool {
        match self.video.mode {
            VideoMode::Streamed => false,
            VideoMode::None => {
                self.enter_local();
                self.local_meta.insert(id, meta);
                true
            }
            VideoMode::Local => {
                self.local_meta.insert(id, meta);
                true
            }
        }
    }

    pub(crate) fn set_playing(&mut self, playing: bool) {
        if self.video.mode != VideoMode::None {
            self.video.playing = playing;
        }
    }

    pub(crate) fn set_position(&mut self, position: f64) {
        if self.video.mode != VideoMode::None {
            self.video.position = position.max(0.0);
        }
    }

    pub(crate) fn push_chat(&mut self, line: ChatLine) {
        if self.chat_capacity == 0 {
            return;
        }
        while self.chat.len() >= self.chat_capacity {
            self.chat.pop_front();
        }
        self.chat.push_back(line);
    }

    /// Forget everything learned since joining (leave)
    pub(crate) fn reset(&mut self) {
        self.self_id = None;
        self.self_ready = false;
        self.participants.clear();
        self.clear_video();
        self.chat.clear();
    }
}
