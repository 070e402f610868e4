//! Relay Networking
//!
//! WebSocket connection to the room relay, which fans every message out to
//! all members of a named room.

mod room_code;
mod transport;

pub use room_code::{invite_link, room_from_invite, RoomCode};
pub use transport::{RelayTransport, TransportError, TransportEvent, TransportHandle};
