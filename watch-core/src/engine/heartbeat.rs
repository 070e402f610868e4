//! Host-side beacon emission
//!
//! `Idle -> Emitting` when the host starts playing a streamed video,
//! `Emitting -> Idle` on pause, end, teardown or leave.

use std::time::Duration;

use tracing::info;

use super::ports::{Scheduler, TimerKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Emitting,
}

#[derive(Debug)]
pub struct HeartbeatEmitter {
    phase: Phase,
    interval: Duration,
}

impl HeartbeatEmitter {
    pub fn new(interval: Duration) -> Self {
        Self {
            phase: Phase::Idle,
            interval,
        }
    }

    pub fn is_emitting(&self) -> bool {
        self.phase == Phase::Emitting
    }

    /// Arm the repeating timer. No-op if already emitting.
    pub fn start(&mut self, scheduler: &mut dyn Scheduler) -> bool {
        if self.phase == Phase::Emitting {
            return false;
        }
        scheduler.schedule_repeating(TimerKind::Heartbeat, self.interval);
        self.phase = Phase::Emitting;
        info!("Heartbeat started ({}ms)", self.interval.as_millis());
        true
    }

    /// Disarm the timer. Always cancels, so a stale timer never survives.
    pub fn stop(&mut self, scheduler: &mut dyn Scheduler) -> bool {
        scheduler.cancel(TimerKind::Heartbeat);
        let was_emitting = self.phase == Phase::Emitting;
        self.phase = Phase::Idle;
        if was_emitting {
            info!("Heartbeat stopped");
        }
        was_emitting
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{Call, FakeScheduler, Log};

    #[test]
    fn test_start_is_idempotent() {
        let log = Log::default();
        let mut scheduler = FakeScheduler::new(log.clone());
        let mut heartbeat = HeartbeatEmitter::new(Duration::from_millis(500));

        assert!(heartbeat.start(&mut scheduler));
        assert!(!heartbeat.start(&mut scheduler));
        assert!(heartbeat.is_emitting());
        assert_eq!(
            log.calls(),
            vec![Call::ScheduleRepeating(TimerKind::Heartbeat, Duration::from_millis(500))]
        );
    }

    #[test]
    fn test_stop_always_cancels() {
        let log = Log::default();
        let mut scheduler = FakeScheduler::new(log.clone());
        let mut heartbeat = HeartbeatEmitter::new(Duration::from_millis(500));

        assert!(!heartbeat.stop(&mut scheduler));
        heartbeat.start(&mut scheduler);
        assert!(heartbeat.stop(&mut scheduler));
        assert!(!heartbeat.is_emitting());
        assert_eq!(
            log.calls(),
            vec![
                Call::Cancel(TimerKind::Heartbeat),
                Call::ScheduleRepeating(TimerKind::Heartbeat, Duration::from_millis(500)),
                Call::Cancel(TimerKind::Heartbeat),
            ]
        );
    }
}
