//! Readiness consensus

use super::state::Participant;

/// How a readiness update moved the room-wide consensus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessTransition {
    /// Consensus was reached before and is lost now
    BecameUnready,
    /// Consensus is reached now and was not before
    BecameReady,
    Unchanged,
}

impl ReadinessTransition {
    pub fn between(before: bool, after: bool) -> Self {
        match (before, after) {
            (true, false) => ReadinessTransition::BecameUnready,
            (false, true) => ReadinessTransition::BecameReady,
            _ => ReadinessTransition::Unchanged,
        }
    }
}

/// True iff the roster has at most one member, or every member other than the
/// host is ready. The host's own flag is never consulted.
pub fn all_ready(participants: &[Participant], host_id: Option<&str>) -> bool {
    if participants.len() <= 1 {
        return true;
    }

    participants
        .iter()
        .filter(|p| Some(p.id.as_str()) != host_id)
        .all(|p| p.ready)
}
