//! Room Codes and Invite Links
//!
//! Hosts that do not pick a room name get a random human-friendly code.
//! Invite links carry the room in a `room` query parameter.

use std::fmt;

use url::Url;

/// Characters used in room codes (unambiguous, uppercase)
/// Excludes: 0/O, 1/I/L, 5/S, 2/Z to avoid confusion
const ALPHABET: &[u8] = b"346789ABCDEFGHJKMNPQRTUVWXY";

/// Room code length (8 chars = ~282 trillion combinations with 27-char alphabet)
const CODE_LENGTH: usize = 8;

/// Query parameter holding the room in an invite link
const ROOM_PARAM: &str = "room";

/// A generated room code
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomCode(String);

impl RoomCode {
    /// Generate a random room code
    pub fn random() -> Self {
        use rand::Rng;
        let mut rng = rand::thread_rng();

        let code = (0..CODE_LENGTH)
            .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
            .collect();
        RoomCode(code)
    }

    /// The code as sent to the relay (no separator)
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse a room code typed by a user.
    ///
    /// Accepts any case and separators ("abcd-efgh", "ABCD EFGH").
    pub fn parse(input: &str) -> Option<Self> {
        let normalized: String = input
            .chars()
            .filter(|c| c.is_alphanumeric())
            .map(|c| c.to_ascii_uppercase())
            .collect();

        if normalized.len() != CODE_LENGTH {
            return None;
        }

        if normalized.bytes().all(|b| ALPHABET.contains(&b)) {
            Some(RoomCode(normalized))
        } else {
            None
        }
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // XXXX-XXXX for readability
        if self.0.len() == CODE_LENGTH {
            write!(f, "{}-{}", &self.0[..4], &self.0[4..])
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Build `<origin>/?room=<room>` from the app's base URL
pub fn invite_link(base: &str, room: &str) -> Result<String, url::ParseError> {
    let mut url = Url::parse(base.trim())?;
    url.set_path("/");
    url.set_fragment(None);
    url.query_pairs_mut().clear().append_pair(ROOM_PARAM, room);
    Ok(url.to_string())
}

/// Room carried by an invite link, if any
pub fn room_from_invite(link: &str) -> Option<String> {
    let url = Url::parse(link.trim()).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == ROOM_PARAM)
        .map(|(_, value)| value.trim().to_string())
        .filter(|room| !room.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_code_parse() {
        let code = RoomCode::parse("ABCD-EFGH").unwrap();
        assert_eq!(code.as_str(), "ABCDEFGH");

        let code = RoomCode::parse("abcd efgh").unwrap();
        assert_eq!(code.as_str(), "ABCDEFGH");

        assert!(RoomCode::parse("ABC").is_none()); // Too short
        assert!(RoomCode::parse("ABCDEFGHI").is_none()); // Too long (9 chars)
        assert!(RoomCode::parse("ABCD-EFG0").is_none()); // Ambiguous character
    }

    #[test]
    fn test_room_code_display() {
        let code = RoomCode("ABCDEFGH".to_string());
        assert_eq!(format!("{}", code), "ABCD-EFGH");
    }

    #[test]
    fn test_random_code() {
        let code1 = RoomCode::random();
        let code2 = RoomCode::random();
        // Very unlikely to be equal
        assert_ne!(code1, code2);
        assert_eq!(code1.as_str().len(), 8);
        assert_eq!(RoomCode::parse(code1.as_str()), Some(code1));
    }

    #[test]
    fn test_invite_link_round_trip() {
        let link = invite_link("https://watch.example.com/app?x=1#top", "movie night").unwrap();
        assert_eq!(link, "https://watch.example.com/?room=movie+night");
        assert_eq!(room_from_invite(&link).as_deref(), Some("movie night"));
    }

    #[test]
    fn test_room_from_invite_rejects_other_input() {
        assert!(room_from_invite("movie night").is_none());
        assert!(room_from_invite("https://watch.example.com/?other=1").is_none());
        assert!(room_from_invite("https://watch.example.com/?room=").is_none());
        assert!(invite_link("not a url", "den").is_err());
    }
}
