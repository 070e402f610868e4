//! Recording fakes for the engine ports

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;

use super::ports::*;
use super::{Engine, EngineEvent, PolicyViolation, UserAction};
use crate::config::SyncConfig;
use crate::drift::Correction;
use crate::network::{TransportError, TransportEvent};
use crate::sync::{ChatLine, Envelope, Outbound, Role, RoomInfo, VideoMode};

pub const T0: u64 = 1_700_000_000_000;

/// One observable side effect
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Create { player_id: u64, source: VideoSource, controls: bool },
    Play(u64),
    Pause(u64),
    SeekTo(u64, f64),
    SetRate(u64, f64),
    Destroy(u64),
    Sent(Outbound),
    ScheduleOnce(TimerKind, Duration),
    ScheduleRepeating(TimerKind, Duration),
    Cancel(TimerKind),
    ModeChanged(VideoMode),
    Notice(String),
    Chat(ChatLine),
    SyncStatus(Correction),
    Connection(bool),
}

/// Shared, ordered record of every call made through the fakes
#[derive(Debug, Clone, Default)]
pub struct Log(Arc<Mutex<Vec<Call>>>);

impl Log {
    pub fn push(&self, call: Call) {
        self.0.lock().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().clone()
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }

    /// Envelopes handed to the transport, in order
    pub fn sent(&self) -> Vec<Envelope> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Sent(frame) => Some(frame.envelope),
                _ => None,
            })
            .collect()
    }

    pub fn position(&self, call: &Call) -> Option<usize> {
        self.calls().iter().position(|c| c == call)
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }
}

/// What every fake player reports back
#[derive(Debug, Clone)]
pub struct PlayerKnobs {
    pub current_time: Option<f64>,
    pub state: PlayerState,
    pub ready: bool,
}

impl Default for PlayerKnobs {
    fn default() -> Self {
        Self {
            current_time: Some(0.0),
            state: PlayerState::Unstarted,
            ready: true,
        }
    }
}

pub struct FakePlayer {
    id: u64,
    log: Log,
    knobs: Arc<Mutex<PlayerKnobs>>,
}

impl PlayerSurface for FakePlayer {
    fn play(&mut self) -> Result<(), PlayerError> {
        self.log.push(Call::Play(self.id));
        Ok(())
    }

    fn pause(&mut self) -> Result<(), PlayerError> {
        self.log.push(Call::Pause(self.id));
        Ok(())
    }

    fn seek_to(&mut self, position: f64) -> Result<(), PlayerError> {
        self.log.push(Call::SeekTo(self.id, position));
        Ok(())
    }

    fn set_playback_rate(&mut self, rate: f64) -> Result<(), PlayerError> {
        self.log.push(Call::SetRate(self.id, rate));
        Ok(())
    }

    fn current_time(&self) -> Option<f64> {
        self.knobs.lock().current_time
    }

    fn state(&self) -> PlayerState {
        self.knobs.lock().state
    }

    fn is_ready(&self) -> bool {
        self.knobs.lock().ready
    }

    fn destroy(&mut self) -> Result<(), PlayerError> {
        self.log.push(Call::Destroy(self.id));
        Err(PlayerError::Failed("already gone".to_string()))
    }
}

pub struct FakePlayerFactory {
    log: Log,
    knobs: Arc<Mutex<PlayerKnobs>>,
    backend: Arc<AtomicBool>,
}

impl PlayerFactory for FakePlayerFactory {
    fn backend_ready(&self) -> bool {
        self.backend.load(Ordering::SeqCst)
    }

    fn create(
        &mut self,
        player_id: u64,
        source: &VideoSource,
        controls: bool,
    ) -> Option<Box<dyn PlayerSurface>> {
        self.log.push(Call::Create {
            player_id,
            source: source.clone(),
            controls,
        });
        Some(Box::new(FakePlayer {
            id: player_id,
            log: self.log.clone(),
            knobs: self.knobs.clone(),
        }))
    }
}

pub struct FakeOutbox {
    log: Log,
    connected: Arc<AtomicBool>,
}

impl Outbox for FakeOutbox {
    fn send(&self, frame: &Outbound) -> Result<(), TransportError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(TransportError::NotConnected);
        }
        self.log.push(Call::Sent(frame.clone()));
        Ok(())
    }
}

pub struct FakeScheduler {
    log: Log,
}

impl FakeScheduler {
    pub fn new(log: Log) -> Self {
        Self { log }
    }
}

impl Scheduler for FakeScheduler {
    fn schedule_once(&mut self, kind: TimerKind, delay: Duration) {
        self.log.push(Call::ScheduleOnce(kind, delay));
    }

    fn schedule_repeating(&mut self, kind: TimerKind, period: Duration) {
        self.log.push(Call::ScheduleRepeating(kind, period));
    }

    fn cancel(&mut self, kind: TimerKind) {
        self.log.push(Call::Cancel(kind));
    }
}

pub struct FakeClock(Arc<AtomicU64>);

impl Clock for FakeClock {
    fn now_ms(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct FakeObserver {
    log: Log,
}

impl SessionObserver for FakeObserver {
    fn on_mode_changed(&mut self, mode: VideoMode) {
        self.log.push(Call::ModeChanged(mode));
    }

    fn on_notice(&mut self, message: &str) {
        self.log.push(Call::Notice(message.to_string()));
    }

    fn on_chat(&mut self, line: &ChatLine) {
        self.log.push(Call::Chat(line.clone()));
    }

    fn on_sync_status(&mut self, status: &crate::drift::SyncStatus) {
        self.log.push(Call::SyncStatus(status.correction));
    }

    fn on_connection_changed(&mut self, connected: bool) {
        self.log.push(Call::Connection(connected));
    }
}

/// An engine wired to fakes, plus the knobs to drive them
pub struct Rig {
    pub engine: Engine,
    pub log: Log,
    pub player: Arc<Mutex<PlayerKnobs>>,
    pub backend: Arc<AtomicBool>,
    pub connected: Arc<AtomicBool>,
    pub clock: Arc<AtomicU64>,
}

impl Rig {
    pub fn new(role: Role) -> Self {
        let log = Log::default();
        let player = Arc::new(Mutex::new(PlayerKnobs::default()));
        let backend = Arc::new(AtomicBool::new(true));
        let connected = Arc::new(AtomicBool::new(true));
        let clock = Arc::new(AtomicU64::new(T0));

        let ports = EnginePorts {
            players: Box::new(FakePlayerFactory {
                log: log.clone(),
                knobs: player.clone(),
                backend: backend.clone(),
            }),
            outbox: Box::new(FakeOutbox {
                log: log.clone(),
                connected: connected.clone(),
            }),
            scheduler: Box::new(FakeScheduler::new(log.clone())),
            clock: Box::new(FakeClock(clock.clone())),
            observer: Box::new(FakeObserver { log: log.clone() }),
        };

        let room = RoomInfo {
            room_id: "den".to_string(),
            role,
            self_name: "Ana".to_string(),
        };

        Self {
            engine: Engine::new(SyncConfig::default(), room, ports),
            log,
            player,
            backend,
            connected,
            clock,
        }
    }

    /// Open the transport, get an id and settle on `roster`, then forget the calls
    pub fn joined(role: Role, self_id: &str, roster: &[&str]) -> Self {
        let mut rig = Self::new(role);
        rig.engine.handle(EngineEvent::Transport(TransportEvent::Opened));
        rig.inbound(serde_json::json!({"type": "connected", "clientId": self_id}));
        rig.inbound(serde_json::json!({"type": "participants", "list": roster}));
        rig.log.clear();
        rig
    }

    pub fn inbound(&mut self, message: Value) {
        self.engine
            .handle(EngineEvent::Transport(TransportEvent::Message(message.to_string())));
    }

    pub fn act(&mut self, action: UserAction) -> Result<(), PolicyViolation> {
        let (tx, mut rx) = oneshot::channel();
        self.engine.handle(EngineEvent::Action {
            action,
            reply: Some(tx),
        });
        rx.try_recv().unwrap_or(Err(PolicyViolation::NotInRoom))
    }

    pub fn player_state(&mut self, player_id: u64, state: PlayerState) {
        self.player.lock().state = state;
        self.engine.handle(EngineEvent::Player {
            player_id,
            event: super::PlayerEvent::StateChanged(state),
        });
    }

    pub fn timer(&mut self, kind: TimerKind) {
        self.engine.handle(EngineEvent::Timer(kind));
    }

    pub fn set_time(&self, seconds: f64) {
        self.player.lock().current_time = Some(seconds);
    }

    pub fn advance(&self, ms: u64) {
        self.clock.fetch_add(ms, Ordering::SeqCst);
    }
}
