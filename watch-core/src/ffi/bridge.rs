//! Adapters between the engine ports and the native callback interfaces

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::drift::SyncStatus as InternalSyncStatus;
use crate::engine::{
    PlayerError, PlayerFactory, PlayerState, PlayerSurface, SessionObserver,
    VideoSource as InternalVideoSource,
};
use crate::sync::{
    ChatLine, MatchTolerance, RoomState as InternalRoomState, VideoMode as InternalVideoMode,
};

use super::types::*;

pub(crate) type SharedCallback = Arc<RwLock<Option<Arc<dyn SessionCallback>>>>;
pub(crate) type SharedBridge = Arc<RwLock<Option<Arc<dyn PlayerBridge>>>>;
pub(crate) type SharedSnapshot = Arc<RwLock<Option<RoomState>>>;

/// Builds players through whatever bridge the app registered
pub(crate) struct BridgeFactory {
    bridge: SharedBridge,
}

impl BridgeFactory {
    pub(crate) fn new(bridge: SharedBridge) -> Self {
        Self { bridge }
    }

    fn current(&self) -> Option<Arc<dyn PlayerBridge>> {
        self.bridge.read().clone()
    }
}

impl PlayerFactory for BridgeFactory {
    fn backend_ready(&self) -> bool {
        self.current().is_some_and(|bridge| bridge.backend_ready())
    }

    fn create(
        &mut self,
        player_id: u64,
        source: &InternalVideoSource,
        controls: bool,
    ) -> Option<Box<dyn PlayerSurface>> {
        let bridge = self.current()?;
        if !bridge.create_player(player_id, source.into(), controls) {
            debug!("Native side refused player {}", player_id);
            return None;
        }
        Some(Box::new(BridgePlayer {
            id: player_id,
            bridge,
        }))
    }
}

/// One native player, addressed by id
struct BridgePlayer {
    id: u64,
    bridge: Arc<dyn PlayerBridge>,
}

fn supported(ok: bool) -> Result<(), PlayerError> {
    if ok {
        Ok(())
    } else {
        Err(PlayerError::Unsupported)
    }
}

impl PlayerSurface for BridgePlayer {
    fn play(&mut self) -> Result<(), PlayerError> {
        supported(self.bridge.play(self.id))
    }

    fn pause(&mut self) -> Result<(), PlayerError> {
        supported(self.bridge.pause(self.id))
    }

    fn seek_to(&mut self, position: f64) -> Result<(), PlayerError> {
        supported(self.bridge.seek_to(self.id, position))
    }

    fn set_playback_rate(&mut self, rate: f64) -> Result<(), PlayerError> {
        supported(self.bridge.set_playback_rate(self.id, rate))
    }

    fn current_time(&self) -> Option<f64> {
        self.bridge.current_time(self.id)
    }

    fn state(&self) -> PlayerState {
        self.bridge.player_status(self.id).into()
    }

    fn is_ready(&self) -> bool {
        self.bridge.is_ready(self.id)
    }

    fn destroy(&mut self) -> Result<(), PlayerError> {
        self.bridge.destroy_player(self.id);
        Ok(())
    }
}

/// Forwards engine notifications to the app callback and keeps the
/// snapshot served by `Session::room_state`
pub(crate) struct CallbackObserver {
    callback: SharedCallback,
    snapshot: SharedSnapshot,
    tolerance: MatchTolerance,
}

impl CallbackObserver {
    pub(crate) fn new(
        callback: SharedCallback,
        snapshot: SharedSnapshot,
        tolerance: MatchTolerance,
    ) -> Self {
        Self {
            callback,
            snapshot,
            tolerance,
        }
    }

    fn callback(&self) -> Option<Arc<dyn SessionCallback>> {
        self.callback.read().clone()
    }
}

impl SessionObserver for CallbackObserver {
    fn on_state_changed(&mut self, state: &InternalRoomState) {
        let next = RoomState::snapshot(state, &self.tolerance);
        {
            let mut current = self.snapshot.write();
            // heartbeat ticks land here twice a second with nothing new
            if current.as_ref() == Some(&next) {
                return;
            }
            *current = Some(next.clone());
        }
        if let Some(cb) = self.callback() {
            cb.on_room_state_changed(next);
        }
    }

    fn on_mode_changed(&mut self, mode: InternalVideoMode) {
        if let Some(cb) = self.callback() {
            cb.on_mode_changed(mode.into());
        }
    }

    fn on_notice(&mut self, message: &str) {
        if let Some(cb) = self.callback() {
            cb.on_notice(message.to_string());
        }
    }

    fn on_chat(&mut self, line: &ChatLine) {
        if let Some(cb) = self.callback() {
            cb.on_chat(line.into());
        }
    }

    fn on_sync_status(&mut self, status: &InternalSyncStatus) {
        if let Some(cb) = self.callback() {
            cb.on_sync_status(status.into());
        }
    }

    fn on_connection_changed(&mut self, connected: bool) {
        if let Some(cb) = self.callback() {
            cb.on_connection_changed(connected);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::{RoomInfo, Role as InternalRole};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
        refuse: bool,
    }

    impl Recorder {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }

        fn push(&self, call: String) {
            self.calls.lock().push(call);
        }
    }

    impl PlayerBridge for Recorder {
        fn backend_ready(&self) -> bool {
            true
        }
        fn create_player(&self, player_id: u64, source: VideoSource, controls: bool) -> bool {
            self.push(format!("create {} {:?} {}", player_id, source, controls));
            !self.refuse
        }
        fn play(&self, player_id: u64) -> bool {
            self.push(format!("play {}", player_id));
            true
        }
        fn pause(&self, player_id: u64) -> bool {
            self.push(format!("pause {}", player_id));
            true
        }
        fn seek_to(&self, player_id: u64, position_secs: f64) -> bool {
            self.push(format!("seek {} {}", player_id, position_secs));
            true
        }
        fn set_playback_rate(&self, _player_id: u64, _rate: f64) -> bool {
            false
        }
        fn current_time(&self, _player_id: u64) -> Option<f64> {
            Some(42.0)
        }
        fn player_status(&self, _player_id: u64) -> PlayerStatus {
            PlayerStatus::Buffering
        }
        fn is_ready(&self, _player_id: u64) -> bool {
            true
        }
        fn destroy_player(&self, player_id: u64) {
            self.push(format!("destroy {}", player_id));
        }
    }

    impl SessionCallback for Recorder {
        fn on_room_state_changed(&self, state: RoomState) {
            self.push(format!("state {} {}", state.room_id, state.participants.len()));
        }
        fn on_mode_changed(&self, mode: VideoMode) {
            self.push(format!("mode {:?}", mode));
        }
        fn on_notice(&self, message: String) {
            self.push(format!("notice {}", message));
        }
        fn on_chat(&self, message: ChatMessage) {
            self.push(format!("chat {}: {}", message.from_name, message.text));
        }
        fn on_sync_status(&self, status: SyncStatus) {
            self.push(format!("sync {}", status.drift_secs));
        }
        fn on_connection_changed(&self, connected: bool) {
            self.push(format!("connected {}", connected));
        }
    }

    #[test]
    fn test_factory_without_bridge() {
        let mut factory = BridgeFactory::new(Arc::new(RwLock::new(None)));
        assert!(!factory.backend_ready());

        let source = InternalVideoSource::Streamed {
            video_id: "dQw4w9WgXcQ".to_string(),
        };
        assert!(factory.create(1, &source, true).is_none());
    }

    #[test]
    fn test_bridge_player_forwards_by_id() {
        let recorder = Arc::new(Recorder::default());
        let shared: SharedBridge = Arc::new(RwLock::new(Some(recorder.clone() as Arc<dyn PlayerBridge>)));
        let mut factory = BridgeFactory::new(shared);
        assert!(factory.backend_ready());

        let source = InternalVideoSource::Local {
            duration_secs: 100.0,
            size_bytes: 5,
        };
        let mut player = factory.create(7, &source, false).unwrap();
        player.play().unwrap();
        player.seek_to(3.5).unwrap();
        assert_eq!(player.set_playback_rate(1.05), Err(PlayerError::Unsupported));
        assert_eq!(player.current_time(), Some(42.0));
        assert_eq!(player.state(), PlayerState::Buffering);
        player.destroy().unwrap();

        assert_eq!(
            recorder.calls(),
            vec![
                "create 7 Local { duration_secs: 100.0, size_bytes: 5 } false".to_string(),
                "play 7".to_string(),
                "seek 7 3.5".to_string(),
                "destroy 7".to_string(),
            ]
        );
    }

    #[test]
    fn test_refused_player_is_none() {
        let recorder = Arc::new(Recorder {
            refuse: true,
            ..Default::default()
        });
        let mut factory =
            BridgeFactory::new(Arc::new(RwLock::new(Some(recorder as Arc<dyn PlayerBridge>))));
        let source = InternalVideoSource::Streamed {
            video_id: "dQw4w9WgXcQ".to_string(),
        };
        assert!(factory.create(1, &source, true).is_none());
    }

    #[test]
    fn test_observer_skips_unchanged_snapshots() {
        let recorder = Arc::new(Recorder::default());
        let callback: SharedCallback =
            Arc::new(RwLock::new(Some(recorder.clone() as Arc<dyn SessionCallback>)));
        let snapshot: SharedSnapshot = Arc::new(RwLock::new(None));
        let mut observer = CallbackObserver::new(callback, snapshot.clone(), MatchTolerance::default());

        let state = InternalRoomState::new(
            RoomInfo {
                room_id: "den".to_string(),
                role: InternalRole::Host,
                self_name: "Ana".to_string(),
            },
            10,
        );
        observer.on_state_changed(&state);
        observer.on_state_changed(&state);
        observer.on_notice("Wait until all users are ready.");

        assert_eq!(
            recorder.calls(),
            vec![
                "state den 0".to_string(),
                "notice Wait until all users are ready.".to_string(),
            ]
        );
        let stored = snapshot.read().clone().unwrap();
        assert_eq!(stored.role, Role::Host);
        assert_eq!(stored.mode, VideoMode::None);
    }
}
