//! Playback Synchronization Engine
//!
//! A synchronous state machine: every input (relay frame, player callback,
//! user action, timer tick) is one [`EngineEvent`], handled to completion
//! before the next. The runtime module drives it from a single tokio task.

mod handlers;
mod heartbeat;
pub mod ports;
mod runtime;
#[cfg(test)]
pub(crate) mod testing;

use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::drift::DriftCorrector;
use crate::network::TransportEvent;
use crate::seek_throttle::SeekThrottle;
use crate::sync::{
    decode, extract_video_id, CommandAction, Envelope, LocalFileMeta, Outbound, RoomInfo,
    RoomState, VideoMode,
};

use heartbeat::HeartbeatEmitter;
pub use ports::*;
pub use runtime::{spawn, EngineHandle, SystemClock, TokioScheduler};

/// A local action rejected before anything was sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PolicyViolation {
    #[error("Only the host can do that.")]
    NotHost,

    #[error("Wait until all users are ready.")]
    NotAllReady,

    #[error("All users must load the same video before ready.")]
    VideosDoNotMatch,

    #[error("Invalid video link.")]
    InvalidVideoUrl,

    #[error("No video loaded.")]
    NoPlayer,

    #[error("Not in a room.")]
    NotInRoom,
}

/// Something the local user asked for
#[derive(Debug, Clone, PartialEq)]
pub enum UserAction {
    ToggleReady,
    /// Host play/pause button
    PlayPause,
    LoadStreamed { url: String },
    LoadLocal { duration_secs: f64, size_bytes: u64 },
    ClearVideo,
    Seek { position: f64 },
    SendChat { text: String },
    Leave,
}

/// Player callbacks
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlayerEvent {
    /// Surface finished initialising
    Ready,
    StateChanged(PlayerState),
}

pub type ActionReply = oneshot::Sender<Result<(), PolicyViolation>>;

/// Every input the engine reacts to
#[derive(Debug)]
pub enum EngineEvent {
    Transport(TransportEvent),
    Player { player_id: u64, event: PlayerEvent },
    /// Streamed-video backend finished loading
    BackendReady,
    Action {
        action: UserAction,
        reply: Option<ActionReply>,
    },
    Timer(TimerKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Connecting,
    Joined,
    Left,
}

/// Where a late joiner's player should land once it can take controls
#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) struct Resync {
    position: f64,
    playing: bool,
}

/// Streamed load waiting for the backend
#[derive(Debug, Clone, PartialEq)]
struct PendingStream {
    video_id: String,
    resync: Option<Resync>,
}

struct ActivePlayer {
    id: u64,
    surface: Box<dyn PlayerSurface>,
}

pub struct Engine {
    config: SyncConfig,
    state: RoomState,
    lifecycle: Lifecycle,
    player: Option<ActivePlayer>,
    next_player_id: u64,
    pending_stream: Option<PendingStream>,
    pending_resync: Option<Resync>,
    heartbeat: HeartbeatEmitter,
    /// A soft correction is in effect
    rate_nudged: bool,
    throttle: SeekThrottle,
    drift: DriftCorrector,
    ports: EnginePorts,
}

impl Engine {
    pub fn new(config: SyncConfig, room: RoomInfo, ports: EnginePorts) -> Self {
        Self {
            state: RoomState::new(room, config.chat_history),
            lifecycle: Lifecycle::Connecting,
            player: None,
            next_player_id: 1,
            pending_stream: None,
            pending_resync: None,
            heartbeat: HeartbeatEmitter::new(config.heartbeat_interval),
            rate_nudged: false,
            throttle: SeekThrottle::new(config.seek_window.as_millis() as u64),
            drift: DriftCorrector::new(config.drift),
            config,
            ports,
        }
    }

    pub fn state(&self) -> &RoomState {
        &self.state
    }

    /// True once the user left; the engine ignores everything afterwards
    pub fn is_finished(&self) -> bool {
        self.lifecycle == Lifecycle::Left
    }

    /// Handle one event to completion
    pub fn handle(&mut self, event: EngineEvent) {
        if self.is_finished() {
            if let EngineEvent::Action { reply: Some(reply), .. } = event {
                let _ = reply.send(Err(PolicyViolation::NotInRoom));
            }
            return;
        }

        match event {
            EngineEvent::Transport(event) => self.on_transport(event),
            EngineEvent::Player { player_id, event } => self.on_player_event(player_id, event),
            EngineEvent::BackendReady => self.on_backend_ready(),
            EngineEvent::Action { action, reply } => {
                let result = self.perform(action);
                if let Err(violation) = &result {
                    debug!("Action rejected: {:?}", violation);
                    self.ports.observer.on_notice(&violation.to_string());
                }
                if let Some(reply) = reply {
                    let _ = reply.send(result);
                }
            }
            EngineEvent::Timer(kind) => self.on_timer(kind),
        }

        self.ports.observer.on_state_changed(&self.state);
    }

    fn on_transport(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Opened => {
                self.ports.observer.on_connection_changed(true);
                self.establish();
            }
            TransportEvent::Message(text) => match decode(&text) {
                Ok(envelope) => self.dispatch(envelope),
                Err(e) => warn!("Dropping inbound frame: {}", e),
            },
            TransportEvent::Closed => {
                info!("Relay connection closed");
                self.ports.observer.on_connection_changed(false);
            }
            TransportEvent::Error(message) => {
                warn!("Relay connection error: {}", message);
                self.ports.observer.on_connection_changed(false);
            }
        }
    }

    /// createRoom (host) + join, then the host declares itself ready
    fn establish(&mut self) {
        let room = self.state.room().clone();
        if self.state.is_host() {
            self.send(Envelope::CreateRoom {
                room: room.room_id.clone(),
            });
        }
        self.send(Envelope::Join {
            room: room.room_id.clone(),
            role: room.role,
            name: room.self_name.clone(),
        });
        self.lifecycle = Lifecycle::Joined;
        info!("Joined room {} as {:?}", room.room_id, room.role);

        if self.state.is_host() {
            self.announce_host_ready();
        }
    }

    fn announce_host_ready(&mut self) {
        self.state.set_self_ready(true);
        self.send(Envelope::Ready {
            from: None,
            ready: true,
        });
    }

    /// Repeat our readiness so late joiners see the real roster
    pub(super) fn reannounce_ready(&mut self) {
        if self.state.is_host() {
            self.announce_host_ready();
        } else if self.state.self_ready() {
            self.send(Envelope::Ready {
                from: None,
                ready: true,
            });
        }
    }

    /// Run a user action. Rejections never produce outbound traffic.
    pub(crate) fn perform(&mut self, action: UserAction) -> Result<(), PolicyViolation> {
        if self.lifecycle != Lifecycle::Joined && action != UserAction::Leave {
            return Err(PolicyViolation::NotInRoom);
        }

        match action {
            UserAction::ToggleReady => self.toggle_ready(),
            UserAction::PlayPause => self.play_pause(),
            UserAction::LoadStreamed { url } => {
                self.require_host()?;
                let video_id = extract_video_id(&url).ok_or(PolicyViolation::InvalidVideoUrl)?;
                self.send(Envelope::Video {
                    mode: VideoMode::Streamed,
                    video_id: Some(video_id.clone()),
                });
                self.load_streamed(video_id, None);
                Ok(())
            }
            UserAction::LoadLocal {
                duration_secs,
                size_bytes,
            } => {
                self.load_local(LocalFileMeta {
                    duration_secs,
                    size_bytes,
                });
                Ok(())
            }
            UserAction::ClearVideo => {
                self.require_host()?;
                self.send(Envelope::ClearVideo);
                self.apply_clear();
                Ok(())
            }
            UserAction::Seek { position } => {
                if self.state.mode() == VideoMode::None {
                    return Err(PolicyViolation::NoPlayer);
                }
                self.with_player("seek", |p| p.seek_to(position));
                self.state.set_position(position);
                // the host's jump goes out through its buffering report
                if !self.state.is_host() {
                    self.report_seek(position);
                }
                Ok(())
            }
            UserAction::SendChat { text } => {
                let text = text.trim();
                if !text.is_empty() {
                    let from_name = self.state.room().self_name.clone();
                    self.send(Envelope::Chat {
                        from: None,
                        from_name,
                        text: text.to_string(),
                    });
                }
                Ok(())
            }
            UserAction::Leave => {
                self.leave();
                Ok(())
            }
        }
    }

    fn require_host(&self) -> Result<(), PolicyViolation> {
        if self.state.is_host() {
            Ok(())
        } else {
            Err(PolicyViolation::NotHost)
        }
    }

    fn toggle_ready(&mut self) -> Result<(), PolicyViolation> {
        // the host is ready by definition
        if self.state.is_host() {
            return Ok(());
        }

        let ready = !self.state.self_ready();
        if ready
            && self.state.mode() == VideoMode::Local
            && !self.state.videos_match(&self.config.match_tolerance)
        {
            return Err(PolicyViolation::VideosDoNotMatch);
        }

        self.state.set_self_ready(ready);
        self.send(Envelope::Ready { from: None, ready });
        Ok(())
    }

    fn play_pause(&mut self) -> Result<(), PolicyViolation> {
        self.require_host()?;
        if !self.state.all_ready() {
            return Err(PolicyViolation::NotAllReady);
        }
        if self.state.mode() == VideoMode::None || self.player.is_none() {
            return Err(PolicyViolation::NoPlayer);
        }

        let playing = match self.player.as_ref().map(|p| p.surface.state()) {
            Some(PlayerState::Playing) => true,
            Some(PlayerState::Unknown) | None => self.state.video().playing,
            Some(_) => false,
        };

        if playing {
            self.with_player("pause", |p| p.pause());
            self.host_paused();
        } else {
            self.with_player("play", |p| p.play());
            self.host_playing();
        }
        Ok(())
    }

    /// Host playback started: beacons on, everyone told once
    pub(super) fn host_playing(&mut self) {
        if self.state.mode() == VideoMode::Streamed {
            self.heartbeat.start(self.ports.scheduler.as_mut());
        }
        if !self.state.video().playing {
            self.state.set_playing(true);
            self.send(Envelope::Command {
                action: CommandAction::Play,
            });
        }
    }

    /// Host playback stopped: beacons off, everyone told once
    pub(super) fn host_paused(&mut self) {
        self.heartbeat.stop(self.ports.scheduler.as_mut());
        if self.state.video().playing {
            self.state.set_playing(false);
            self.send(Envelope::Command {
                action: CommandAction::Pause,
            });
        }
    }

    /// Send a seek unless one went out less than a window ago
    pub(super) fn report_seek(&mut self, position: f64) {
        let now = self.ports.clock.now_ms();
        if self.throttle.admit(now) {
            self.send(Envelope::Seek { position });
        } else {
            debug!("Seek to {:.2}s throttled", position);
        }
    }

    /// Readiness consensus just went from true to false
    pub(super) fn consensus_lost(&mut self) {
        info!("Not everyone is ready anymore, pausing");
        self.with_player("pause", |p| p.pause());
        self.state.set_playing(false);

        if self.state.is_host() {
            self.heartbeat.stop(self.ports.scheduler.as_mut());
            self.send(Envelope::Command {
                action: CommandAction::Pause,
            });
        }
    }

    // === Video lifecycle ===

    /// Stop beacons and rate nudges, drop the player and any pending resync
    fn teardown_video(&mut self) {
        self.heartbeat.stop(self.ports.scheduler.as_mut());
        self.ports.scheduler.cancel(TimerKind::RateRevert);
        self.rate_nudged = false;

        if let Some(mut player) = self.player.take() {
            if let Err(e) = player.surface.destroy() {
                debug!("Ignoring error destroying player {}: {}", player.id, e);
            }
        }

        self.pending_resync = None;
        self.drift.reset();
    }

    fn create_player(&mut self, source: VideoSource) {
        let player_id = self.next_player_id;
        self.next_player_id += 1;

        let controls = self.state.is_host();
        match self.ports.players.create(player_id, &source, controls) {
            Some(surface) => {
                debug!("Created player {} for {:?}", player_id, source);
                self.player = Some(ActivePlayer {
                    id: player_id,
                    surface,
                });
            }
            None => warn!("Player could not be created for {:?}", source),
        }
    }

    pub(super) fn load_streamed(&mut self, video_id: String, resync: Option<Resync>) {
        if !self.ports.players.backend_ready() {
            info!("Player backend not ready, queuing video {}", video_id);
            self.pending_stream = Some(PendingStream { video_id, resync });
            return;
        }
        self.pending_stream = None;

        self.teardown_video();
        self.state.load_streamed(&video_id);
        self.pending_resync = resync;
        self.create_player(VideoSource::Streamed {
            video_id: video_id.clone(),
        });
        info!("Loaded streamed video {}", video_id);

        if self.player.as_ref().is_some_and(|p| p.surface.is_ready()) {
            self.apply_pending_resync();
        }
        self.ports.observer.on_mode_changed(VideoMode::Streamed);
    }

    /// Whether `video_id` is what we are showing or about to show
    pub(super) fn is_current_stream(&self, video_id: &str) -> bool {
        match &self.pending_stream {
            Some(pending) => pending.video_id == video_id,
            None => {
                self.state.mode() == VideoMode::Streamed
                    && self.state.video().streamed_id.as_deref() == Some(video_id)
            }
        }
    }

    fn load_local(&mut self, meta: LocalFileMeta) {
        self.pending_stream = None;
        self.teardown_video();
        self.state.enter_local();
        if let Some(self_id) = self.state.self_id().map(str::to_string) {
            self.state.record_local_meta(&self_id, meta);
        }
        self.create_player(VideoSource::Local {
            duration_secs: meta.duration_secs,
            size_bytes: meta.size_bytes,
        });
        info!(
            "Loaded local file ({:.1}s, {} bytes)",
            meta.duration_secs, meta.size_bytes
        );

        self.send(Envelope::LocalMeta {
            from: None,
            duration: meta.duration_secs,
            size: meta.size_bytes,
        });
        self.ports.observer.on_mode_changed(VideoMode::Local);
    }

    /// Switch to local mode without a file of our own yet
    pub(super) fn enter_local(&mut self) {
        if self.state.mode() == VideoMode::Local {
            return;
        }
        self.pending_stream = None;
        self.teardown_video();
        self.state.enter_local();
        self.ports.observer.on_mode_changed(VideoMode::Local);
    }

    pub(super) fn apply_clear(&mut self) {
        self.pending_stream = None;
        self.teardown_video();
        let had_video = self.state.mode() != VideoMode::None;
        self.state.clear_video();
        self.throttle.reset();
        if had_video {
            info!("Video cleared");
            self.ports.observer.on_mode_changed(VideoMode::None);
        }
    }

    /// Fold a later timeline update into a resync that has not landed yet
    pub(super) fn amend_resync(&mut self, position: Option<f64>, playing: Option<bool>) {
        let queued = self.pending_stream.as_mut().and_then(|s| s.resync.as_mut());
        for resync in [self.pending_resync.as_mut(), queued].into_iter().flatten() {
            if let Some(position) = position {
                resync.position = position;
            }
            if let Some(playing) = playing {
                resync.playing = playing;
            }
        }
    }

    fn apply_pending_resync(&mut self) {
        let Some(resync) = self.pending_resync.take() else {
            return;
        };
        debug!(
            "Resyncing to {:.2}s ({})",
            resync.position,
            if resync.playing { "playing" } else { "paused" }
        );
        self.with_player("seek", |p| p.seek_to(resync.position));
        if resync.playing {
            self.with_player("play", |p| p.play());
        } else {
            self.with_player("pause", |p| p.pause());
        }
        self.state.set_position(resync.position);
        self.state.set_playing(resync.playing);
    }

    fn leave(&mut self) {
        info!("Leaving room {}", self.state.room().room_id);
        self.pending_stream = None;
        self.teardown_video();
        self.state.reset();
        self.throttle.reset();
        self.lifecycle = Lifecycle::Left;
        self.ports.outbox.close();
    }

    // === Player and backend callbacks ===

    fn on_backend_ready(&mut self) {
        info!("Player backend ready");
        if let Some(pending) = self.pending_stream.take() {
            self.load_streamed(pending.video_id, pending.resync);
        }
    }

    fn on_player_event(&mut self, player_id: u64, event: PlayerEvent) {
        if self.player.as_ref().map(|p| p.id) != Some(player_id) {
            debug!("Ignoring {:?} from stale player {}", event, player_id);
            return;
        }

        match event {
            PlayerEvent::Ready => self.apply_pending_resync(),
            PlayerEvent::StateChanged(state) => {
                if !self.state.is_host() {
                    return;
                }
                match state {
                    PlayerState::Playing => self.host_playing(),
                    PlayerState::Paused | PlayerState::Ended => self.host_paused(),
                    PlayerState::Buffering if self.state.mode() == VideoMode::Streamed => {
                        if let Some(position) = self.player_time() {
                            self.state.set_position(position);
                            self.report_seek(position);
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    fn on_timer(&mut self, kind: TimerKind) {
        match kind {
            TimerKind::Heartbeat => {
                if !self.heartbeat.is_emitting()
                    || !self.state.is_host()
                    || self.state.mode() != VideoMode::Streamed
                {
                    return;
                }
                let Some(position) = self.player_time() else {
                    return;
                };
                self.state.set_position(position);
                let wall_ts = self.ports.clock.now_ms();
                self.send(Envelope::Heartbeat { position, wall_ts });
            }
            TimerKind::RateRevert => {
                if self.rate_nudged {
                    self.rate_nudged = false;
                    self.with_player("rate", |p| p.set_playback_rate(1.0));
                }
            }
        }
    }

    // === Helpers ===

    pub(super) fn player_time(&self) -> Option<f64> {
        self.player
            .as_ref()
            .filter(|p| p.surface.is_ready())
            .and_then(|p| p.surface.current_time())
    }

    /// Run a control on the player, if there is one that accepts controls
    pub(super) fn with_player(
        &mut self,
        op: &str,
        f: impl FnOnce(&mut dyn PlayerSurface) -> Result<(), PlayerError>,
    ) {
        match self.player.as_mut() {
            Some(player) if player.surface.is_ready() => {
                if let Err(e) = f(player.surface.as_mut()) {
                    debug!("Player {} {} failed: {}", player.id, op, e);
                }
            }
            Some(player) => debug!("Player {} not ready, skipping {}", player.id, op),
            None => debug!("No player, skipping {}", op),
        }
    }

    /// Send to the room. Host-only kinds never leave a client; transport
    /// failures are dropped.
    pub(super) fn send(&mut self, envelope: Envelope) {
        if envelope.requires_host() && !self.state.is_host() {
            warn!("Refusing to send {} as a client", envelope.kind());
            return;
        }
        let kind = envelope.kind();
        let frame = Outbound::new(Some(self.state.room().room_id.clone()), envelope);
        if let Err(e) = self.ports.outbox.send(&frame) {
            debug!("Dropped outbound {}: {}", kind, e);
        }
    }
}
