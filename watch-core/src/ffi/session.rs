//! Session implementation for FFI

use std::sync::{Arc, Once};

use parking_lot::RwLock;
use tokio::runtime::Runtime;
use tracing::{debug, info, warn};

use crate::config::{JoinRequest, SyncConfig, TransportConfig};
use crate::engine::{self, EngineEvent, EngineHandle, UserAction};
use crate::network::{self as net, RelayTransport};

use super::bridge::{BridgeFactory, CallbackObserver, SharedBridge, SharedCallback, SharedSnapshot};
use super::types::*;

static TRACING_INIT: Once = Once::new();

/// Main session interface
#[derive(uniffi::Object)]
pub struct Session {
    runtime: Runtime,
    config: SyncConfig,
    callback: SharedCallback,
    bridge: SharedBridge,
    /// Latest room snapshot, refreshed by the engine task
    snapshot: SharedSnapshot,
    engine: RwLock<Option<EngineHandle>>,
}

#[uniffi::export]
impl Session {
    /// Create a new session
    #[uniffi::constructor]
    pub fn new() -> Self {
        TRACING_INIT.call_once(|| {
            tracing_subscriber::fmt()
                .with_ansi(false)
                .with_target(false)
                .with_env_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive("watch_core=debug".parse().expect("static directive"))
                        .add_directive("tungstenite=info".parse().expect("static directive")),
                )
                .with_writer(std::io::stderr)
                .try_init()
                .ok();
        });

        info!("Initializing watch-core session");

        let runtime = Runtime::new().expect("Failed to create tokio runtime");

        Self {
            runtime,
            config: SyncConfig::default(),
            callback: Arc::new(RwLock::new(None)),
            bridge: Arc::new(RwLock::new(None)),
            snapshot: Arc::new(RwLock::new(None)),
            engine: RwLock::new(None),
        }
    }

    /// Set the event callback
    pub fn set_callback(&self, callback: Box<dyn SessionCallback>) {
        *self.callback.write() = Some(Arc::from(callback));
    }

    /// Set the native player bridge. Can be set before or after joining.
    pub fn set_player_bridge(&self, bridge: Box<dyn PlayerBridge>) {
        *self.bridge.write() = Some(Arc::from(bridge));
        self.post(EngineEvent::BackendReady);
    }

    /// Create or join a room. Returns the room id actually used.
    pub fn join(&self, config: JoinConfig) -> Result<String, CoreError> {
        if self.is_in_room() {
            return Err(CoreError::AlreadyInRoom);
        }

        let room = JoinRequest {
            room: config.room,
            role: config.role.into(),
            display_name: config.display_name,
        }
        .into_room_info()
        .ok_or(CoreError::InvalidRoom)?;
        let room_id = room.room_id.clone();

        let transport_config = TransportConfig::from_env().with_relay_url(config.relay_url);
        *self.snapshot.write() = None;

        let handle = {
            let _guard = self.runtime.enter();
            let (transport, events) = RelayTransport::new(transport_config).start();
            let observer = CallbackObserver::new(
                self.callback.clone(),
                self.snapshot.clone(),
                self.config.match_tolerance,
            );
            engine::spawn(
                self.config.clone(),
                room,
                Box::new(BridgeFactory::new(self.bridge.clone())),
                Box::new(transport),
                Box::new(observer),
                events,
            )
        };
        *self.engine.write() = Some(handle);

        info!("Joining room {} as {:?}", room_id, config.role);
        Ok(room_id)
    }

    /// Leave the current room
    pub fn leave(&self) -> Result<(), CoreError> {
        let handle = self.engine.write().take().ok_or(CoreError::NotInRoom)?;
        let result = self.runtime.block_on(handle.act(UserAction::Leave));
        *self.snapshot.write() = None;
        info!("Left room");
        result.map_err(CoreError::from)
    }

    pub fn is_in_room(&self) -> bool {
        self.engine
            .read()
            .as_ref()
            .is_some_and(|handle| !handle.is_closed())
    }

    /// Tell the room whether we are ready (clients)
    pub fn toggle_ready(&self) -> Result<(), CoreError> {
        self.act(UserAction::ToggleReady)
    }

    /// Host play/pause button
    pub fn play_pause(&self) -> Result<(), CoreError> {
        self.act(UserAction::PlayPause)
    }

    /// Load a streamed video by URL (host)
    pub fn load_streamed(&self, url: String) -> Result<(), CoreError> {
        self.act(UserAction::LoadStreamed { url })
    }

    /// Report a local file the app just opened
    pub fn load_local_file(&self, duration_secs: f64, size_bytes: u64) -> Result<(), CoreError> {
        self.act(UserAction::LoadLocal {
            duration_secs,
            size_bytes,
        })
    }

    /// Tear down the video for everyone (host)
    pub fn clear_video(&self) -> Result<(), CoreError> {
        self.act(UserAction::ClearVideo)
    }

    /// Seek the shared timeline
    pub fn seek(&self, position_secs: f64) -> Result<(), CoreError> {
        self.act(UserAction::Seek {
            position: position_secs,
        })
    }

    pub fn send_chat(&self, text: String) -> Result<(), CoreError> {
        self.act(UserAction::SendChat { text })
    }

    /// Forward a native player callback
    pub fn player_event(&self, player_id: u64, event: PlayerEventKind) {
        let posted = self
            .engine
            .read()
            .as_ref()
            .is_some_and(|handle| handle.player_event(player_id, event.into()));
        if !posted {
            debug!("Dropped player event for {} (no room)", player_id);
        }
    }

    /// The streamed-video backend finished loading
    pub fn backend_ready(&self) {
        self.post(EngineEvent::BackendReady);
    }

    /// Get current room state
    pub fn room_state(&self) -> Option<RoomState> {
        self.snapshot.read().clone()
    }

    /// Shareable link for the current room, built on the app's base URL
    pub fn invite_link(&self, base_url: String) -> Result<String, CoreError> {
        let room_id = self
            .snapshot
            .read()
            .as_ref()
            .map(|state| state.room_id.clone())
            .ok_or(CoreError::NotInRoom)?;
        net::invite_link(&base_url, &room_id).map_err(|e| CoreError::InvalidUrl(e.to_string()))
    }
}

impl Session {
    fn act(&self, action: UserAction) -> Result<(), CoreError> {
        let handle = self.engine.read().clone().ok_or(CoreError::NotInRoom)?;
        let result = self.runtime.block_on(handle.act(action));
        if let Err(e) = &result {
            debug!("Action rejected: {}", e);
        }
        result.map_err(CoreError::from)
    }

    fn post(&self, event: EngineEvent) {
        if let Some(handle) = self.engine.read().as_ref() {
            handle.post(event);
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(handle) = self.engine.get_mut().take() {
            if !handle.post(EngineEvent::Action {
                action: UserAction::Leave,
                reply: None,
            }) {
                warn!("Engine already stopped on drop");
            }
        }
    }
}
