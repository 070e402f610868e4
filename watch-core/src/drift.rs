//! Heartbeat drift correction for non-host clients
//!
//! The host sends `{position, wallTs}` beacons while a streamed video plays.
//! A client projects the beacon forward by the time it spent in flight and
//! compares that with its own player:
//!
//! - far off: seek straight to the projected position
//! - a little off: nudge the playback rate for a moment
//! - close enough: leave it alone, so network jitter does not cause oscillation

use std::collections::VecDeque;

/// Maximum number of readings to keep in history
const MAX_READING_HISTORY: usize = 10;

/// A position beacon received from the host
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Beacon {
    /// Host player position in seconds
    pub position: f64,
    /// Host wall clock when the beacon was sent (ms since UNIX epoch)
    pub sent_at_ms: u64,
}

/// Thresholds and gain for drift correction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriftThresholds {
    /// Above this (seconds) we seek
    pub hard_secs: f64,
    /// Above this (seconds) we nudge the rate
    pub soft_secs: f64,
    /// Rate change per second of drift
    pub soft_gain: f64,
}

impl Default for DriftThresholds {
    fn default() -> Self {
        Self {
            hard_secs: 1.2,
            soft_secs: 0.25,
            soft_gain: 0.15,
        }
    }
}

/// What to do about a measured drift
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Correction {
    None,
    /// Temporarily play at this rate
    Soft { rate: f64 },
    /// Seek to this position
    Hard { target: f64 },
}

/// One evaluated beacon
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriftReading {
    /// Where the host should be now (seconds)
    pub expected: f64,
    /// Where our player is (seconds)
    pub local: f64,
    /// `expected - local` (positive = we are behind)
    pub diff: f64,
    /// Time the beacon spent in flight, by our wall clock
    pub elapsed_ms: i64,
    pub correction: Correction,
}

/// Snapshot for the diagnostics view, produced on every processed beacon
#[derive(Debug, Clone, PartialEq)]
pub struct SyncStatus {
    pub drift_secs: f64,
    pub elapsed_ms: i64,
    pub correction: Correction,
    /// Recent readings (newest last)
    pub history: Vec<DriftReading>,
}

/// Evaluate a beacon against the local player position
pub fn evaluate(
    beacon: &Beacon,
    now_ms: u64,
    local_position: f64,
    thresholds: &DriftThresholds,
) -> DriftReading {
    let elapsed_ms = now_ms as i64 - beacon.sent_at_ms as i64;
    let expected = beacon.position + elapsed_ms as f64 / 1000.0;
    let diff = expected - local_position;

    let correction = if diff.abs() > thresholds.hard_secs {
        Correction::Hard { target: expected }
    } else if diff.abs() > thresholds.soft_secs {
        Correction::Soft {
            rate: 1.0 + diff * thresholds.soft_gain,
        }
    } else {
        Correction::None
    };

    DriftReading {
        expected,
        local: local_position,
        diff,
        elapsed_ms,
        correction,
    }
}

/// Evaluates beacons and remembers the most recent decisions
#[derive(Debug, Default)]
pub struct DriftCorrector {
    thresholds: DriftThresholds,
    history: VecDeque<DriftReading>,
}

impl DriftCorrector {
    pub fn new(thresholds: DriftThresholds) -> Self {
        Self {
            thresholds,
            history: VecDeque::with_capacity(MAX_READING_HISTORY),
        }
    }

    /// Evaluate a beacon and record the result
    pub fn observe(&mut self, beacon: &Beacon, now_ms: u64, local_position: f64) -> DriftReading {
        let reading = evaluate(beacon, now_ms, local_position, &self.thresholds);

        if self.history.len() >= MAX_READING_HISTORY {
            self.history.pop_front();
        }
        self.history.push_back(reading);

        tracing::debug!(
            "Drift: {:+.3}s (expected: {:.3}s, local: {:.3}s, elapsed: {}ms) -> {:?}",
            reading.diff,
            reading.expected,
            reading.local,
            reading.elapsed_ms,
            reading.correction
        );

        reading
    }

    /// Recent readings (newest last)
    pub fn history(&self) -> impl Iterator<Item = &DriftReading> {
        self.history.iter()
    }

    /// Diagnostics for the most recent reading
    pub fn status(&self) -> Option<SyncStatus> {
        let latest = self.history.back()?;
        Some(SyncStatus {
            drift_secs: latest.diff,
            elapsed_ms: latest.elapsed_ms,
            correction: latest.correction,
            history: self.history.iter().copied().collect(),
        })
    }

    /// Forget history (new video, leave)
    pub fn reset(&mut self) {
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: u64 = 1_700_000_000_000;

    #[test]
    fn test_large_drift_seeks() {
        let beacon = Beacon { position: 10.0, sent_at_ms: T };
        let reading = evaluate(&beacon, T + 2_000, 8.0, &DriftThresholds::default());

        assert_eq!(reading.expected, 12.0);
        assert_eq!(reading.diff, 4.0);
        assert_eq!(reading.correction, Correction::Hard { target: 12.0 });
    }

    #[test]
    fn test_small_drift_nudges_rate() {
        let beacon = Beacon { position: 10.0, sent_at_ms: T };
        let reading = evaluate(&beacon, T, 9.5, &DriftThresholds::default());

        match reading.correction {
            Correction::Soft { rate } => assert!((rate - 1.075).abs() < 1e-9, "rate was {}", rate),
            other => panic!("expected soft correction, got {:?}", other),
        }
    }

    #[test]
    fn test_ahead_slows_down() {
        let beacon = Beacon { position: 10.0, sent_at_ms: T };
        let reading = evaluate(&beacon, T, 10.5, &DriftThresholds::default());

        match reading.correction {
            Correction::Soft { rate } => assert!((rate - 0.925).abs() < 1e-9, "rate was {}", rate),
            other => panic!("expected soft correction, got {:?}", other),
        }
    }

    #[test]
    fn test_dead_zone() {
        let beacon = Beacon { position: 10.0, sent_at_ms: T };
        let reading = evaluate(&beacon, T, 9.9, &DriftThresholds::default());
        assert_eq!(reading.correction, Correction::None);
    }

    #[test]
    fn test_threshold_edges() {
        let thresholds = DriftThresholds::default();
        let beacon = Beacon { position: 10.0, sent_at_ms: T };

        // exactly at the hard threshold is still a soft correction
        let reading = evaluate(&beacon, T + 1_200, 10.0, &thresholds);
        assert!(matches!(reading.correction, Correction::Soft { .. }));

        // exactly at the soft threshold is still inside the dead zone
        let reading = evaluate(&beacon, T + 250, 10.0, &thresholds);
        assert_eq!(reading.correction, Correction::None);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut corrector = DriftCorrector::new(DriftThresholds::default());
        let beacon = Beacon { position: 10.0, sent_at_ms: T };
        for i in 0..15 {
            corrector.observe(&beacon, T + i, 10.0);
        }
        assert_eq!(corrector.history().count(), MAX_READING_HISTORY);
        assert_eq!(corrector.history().last().map(|r| r.elapsed_ms), Some(14));

        let status = corrector.status().unwrap();
        assert_eq!(status.elapsed_ms, 14);
        assert_eq!(status.history.len(), MAX_READING_HISTORY);

        corrector.reset();
        assert_eq!(corrector.history().count(), 0);
        assert!(corrector.status().is_none());
    }
}
