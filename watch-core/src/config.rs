//! Configuration

use std::time::Duration;

use crate::drift::DriftThresholds;
use crate::network::{room_from_invite, RoomCode};
use crate::seek_throttle::DEFAULT_SEEK_WINDOW_MS;
use crate::sync::{MatchTolerance, Role, RoomInfo};

/// Default relay endpoint
const DEFAULT_RELAY_URL: &str = "ws://127.0.0.1:8000/ws";

/// Environment variable overriding the relay endpoint
const RELAY_URL_ENV: &str = "WATCH_RELAY_URL";

/// Default number of chat lines kept in memory
const DEFAULT_CHAT_HISTORY: usize = 200;

/// Display name used when the user leaves it blank
const DEFAULT_DISPLAY_NAME: &str = "Guest";

/// Timing and tolerance knobs of the sync engine
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Host beacon cadence
    pub heartbeat_interval: Duration,
    /// Drift correction thresholds
    pub drift: DriftThresholds,
    /// How long a soft correction keeps the nudged rate
    pub soft_revert_after: Duration,
    /// Minimum spacing between outbound seeks
    pub seek_window: Duration,
    /// Same-video tolerance for local files
    pub match_tolerance: MatchTolerance,
    /// Chat lines kept in the room state
    pub chat_history: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_millis(500),
            drift: DriftThresholds::default(),
            soft_revert_after: Duration::from_millis(500),
            seek_window: Duration::from_millis(DEFAULT_SEEK_WINDOW_MS),
            match_tolerance: MatchTolerance::default(),
            chat_history: DEFAULT_CHAT_HISTORY,
        }
    }
}

/// Relay connection settings
#[derive(Debug, Clone, PartialEq)]
pub struct TransportConfig {
    /// WebSocket URL of the room relay
    pub relay_url: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            relay_url: DEFAULT_RELAY_URL.to_string(),
        }
    }
}

impl TransportConfig {
    /// Defaults, with the relay URL taken from `WATCH_RELAY_URL` when set
    pub fn from_env() -> Self {
        match std::env::var(RELAY_URL_ENV) {
            Ok(url) if !url.trim().is_empty() => Self {
                relay_url: url.trim().to_string(),
            },
            _ => Self::default(),
        }
    }

    /// Explicit URL wins over the environment
    pub fn with_relay_url(mut self, url: Option<String>) -> Self {
        if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
            self.relay_url = url.trim().to_string();
        }
        self
    }
}

/// What the user asked for when creating or joining a room
#[derive(Debug, Clone, PartialEq)]
pub struct JoinRequest {
    /// Room name, room code or invite link. Hosts may leave it empty.
    pub room: Option<String>,
    pub role: Role,
    pub display_name: String,
}

impl JoinRequest {
    /// Resolve the room to join. `None` if a client gave no usable room.
    pub fn into_room_info(self) -> Option<RoomInfo> {
        let input = self.room.as_deref().map(str::trim).unwrap_or_default();

        let room_id = if input.is_empty() {
            match self.role {
                Role::Host => RoomCode::random().as_str().to_string(),
                Role::Client => return None,
            }
        } else if let Some(room) = room_from_invite(input) {
            room
        } else if let Some(code) = RoomCode::parse(input) {
            code.as_str().to_string()
        } else {
            input.to_string()
        };

        let name = self.display_name.trim();
        let self_name = if name.is_empty() {
            DEFAULT_DISPLAY_NAME.to_string()
        } else {
            name.to_string()
        };

        Some(RoomInfo {
            room_id,
            role: self.role,
            self_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.heartbeat_interval, Duration::from_millis(500));
        assert_eq!(config.soft_revert_after, Duration::from_millis(500));
        assert_eq!(config.seek_window, Duration::from_millis(300));
        assert_eq!(config.drift.hard_secs, 1.2);
        assert_eq!(config.match_tolerance.size_bytes, 1024 * 1024);
    }

    #[test]
    fn test_explicit_relay_url() {
        let config = TransportConfig::default().with_relay_url(Some(" wss://relay.example/ws ".to_string()));
        assert_eq!(config.relay_url, "wss://relay.example/ws");

        let config = TransportConfig::default().with_relay_url(Some("   ".to_string()));
        assert_eq!(config, TransportConfig::default());
    }

    fn request(room: Option<&str>, role: Role, name: &str) -> JoinRequest {
        JoinRequest {
            room: room.map(str::to_string),
            role,
            display_name: name.to_string(),
        }
    }

    #[test]
    fn test_host_without_room_gets_a_code() {
        let info = request(None, Role::Host, " Ana ").into_room_info().unwrap();
        assert!(RoomCode::parse(&info.room_id).is_some());
        assert_eq!(info.self_name, "Ana");
    }

    #[test]
    fn test_client_needs_a_room() {
        assert!(request(None, Role::Client, "Bo").into_room_info().is_none());
        assert!(request(Some("  "), Role::Client, "Bo").into_room_info().is_none());
    }

    #[test]
    fn test_room_inputs_are_resolved() {
        let info = request(Some("https://watch.example.com/?room=den"), Role::Client, "")
            .into_room_info()
            .unwrap();
        assert_eq!(info.room_id, "den");
        assert_eq!(info.self_name, "Guest");

        let info = request(Some("abcd-efgh"), Role::Client, "Bo").into_room_info().unwrap();
        assert_eq!(info.room_id, "ABCDEFGH");

        let info = request(Some(" movie night "), Role::Host, "Bo").into_room_info().unwrap();
        assert_eq!(info.room_id, "movie night");
    }
}
