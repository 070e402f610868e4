//! Engine event loop
//!
//! One tokio task owns the [`Engine`] and feeds it, one event at a time, from
//! its own inbox (actions, player callbacks, timers) and from the relay
//! transport.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use super::ports::*;
use super::{Engine, EngineEvent, PlayerEvent, PolicyViolation, UserAction};
use crate::config::SyncConfig;
use crate::network::TransportEvent;
use crate::sync::RoomInfo;

/// Handle to a running engine
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::UnboundedSender<EngineEvent>,
}

impl EngineHandle {
    /// Queue an event; false if the engine is gone
    pub fn post(&self, event: EngineEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    pub fn player_event(&self, player_id: u64, event: PlayerEvent) -> bool {
        self.post(EngineEvent::Player { player_id, event })
    }

    /// Run a user action and wait for the verdict
    pub async fn act(&self, action: UserAction) -> Result<(), PolicyViolation> {
        let (reply, rx) = oneshot::channel();
        if !self.post(EngineEvent::Action {
            action,
            reply: Some(reply),
        }) {
            return Err(PolicyViolation::NotInRoom);
        }
        rx.await.unwrap_or(Err(PolicyViolation::NotInRoom))
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Start the engine task. Must be called from within a tokio runtime.
pub fn spawn(
    config: SyncConfig,
    room: RoomInfo,
    players: Box<dyn PlayerFactory>,
    outbox: Box<dyn Outbox>,
    observer: Box<dyn SessionObserver>,
    mut transport_rx: mpsc::UnboundedReceiver<TransportEvent>,
) -> EngineHandle {
    let (tx, mut rx) = mpsc::unbounded_channel();

    let ports = EnginePorts {
        players,
        outbox,
        scheduler: Box::new(TokioScheduler::new(tx.clone())),
        clock: Box::new(SystemClock),
        observer,
    };
    let mut engine = Engine::new(config, room, ports);

    tokio::spawn(async move {
        info!("Engine started for room {}", engine.state().room().room_id);
        loop {
            let event = tokio::select! {
                Some(event) = rx.recv() => event,
                Some(event) = transport_rx.recv() => EngineEvent::Transport(event),
                else => break,
            };
            engine.handle(event);
            if engine.is_finished() {
                break;
            }
        }
        info!("Engine stopped");
    });

    EngineHandle { tx }
}

/// Timers as sleeper tasks posting `EngineEvent::Timer` into the inbox
pub struct TokioScheduler {
    tx: mpsc::UnboundedSender<EngineEvent>,
    timers: HashMap<TimerKind, JoinHandle<()>>,
}

impl TokioScheduler {
    pub fn new(tx: mpsc::UnboundedSender<EngineEvent>) -> Self {
        Self {
            tx,
            timers: HashMap::new(),
        }
    }
}

impl Scheduler for TokioScheduler {
    fn schedule_once(&mut self, kind: TimerKind, delay: Duration) {
        self.cancel(kind);
        let tx = self.tx.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(EngineEvent::Timer(kind));
        });
        self.timers.insert(kind, task);
    }

    fn schedule_repeating(&mut self, kind: TimerKind, period: Duration) {
        self.cancel(kind);
        let tx = self.tx.clone();
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                interval.tick().await;
                if tx.send(EngineEvent::Timer(kind)).is_err() {
                    break;
                }
            }
        });
        self.timers.insert(kind, task);
    }

    fn cancel(&mut self, kind: TimerKind) {
        if let Some(task) = self.timers.remove(&kind) {
            task.abort();
            debug!("Cancelled {:?} timer", kind);
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        for (_, task) in self.timers.drain() {
            task.abort();
        }
    }
}

/// Wall clock
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}
