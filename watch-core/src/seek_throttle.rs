//! Outbound seek throttle
//!
//! Leading-edge: the first seek of a burst goes out, anything else inside the
//! window is dropped (not delayed).

/// Default minimum spacing between outbound seeks
pub const DEFAULT_SEEK_WINDOW_MS: u64 = 300;

#[derive(Debug, Clone)]
pub struct SeekThrottle {
    window_ms: u64,
    last_sent_ms: Option<u64>,
}

impl SeekThrottle {
    pub fn new(window_ms: u64) -> Self {
        Self {
            window_ms,
            last_sent_ms: None,
        }
    }

    /// Returns true if a seek at `now_ms` may be sent, and records it if so
    pub fn admit(&mut self, now_ms: u64) -> bool {
        if let Some(last) = self.last_sent_ms {
            if now_ms.saturating_sub(last) < self.window_ms {
                return false;
            }
        }
        self.last_sent_ms = Some(now_ms);
        true
    }

    pub fn reset(&mut self) {
        self.last_sent_ms = None;
    }
}

impl Default for SeekThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_SEEK_WINDOW_MS)
    }
}
