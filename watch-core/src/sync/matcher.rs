//! Same-video check for local files
//!
//! Every participant reports `(duration, size)` of the file they loaded. The
//! files are considered identical when every report is close enough to the
//! first reporter's. This is a heuristic, not a content hash.

use super::state::LocalFileMeta;

/// How far a report may be from the first reporter's and still match
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchTolerance {
    pub duration_secs: f64,
    pub size_bytes: u64,
}

impl Default for MatchTolerance {
    fn default() -> Self {
        Self {
            duration_secs: 0.4,
            size_bytes: 1024 * 1024,
        }
    }
}

/// Per-participant file reports, kept in first-report order
#[derive(Debug, Clone, Default)]
pub struct LocalMetaTable {
    entries: Vec<(String, LocalFileMeta)>,
}

impl LocalMetaTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a report. A participant reporting again keeps its original slot.
    pub fn insert(&mut self, participant_id: &str, meta: LocalFileMeta) {
        match self.entries.iter_mut().find(|(id, _)| id == participant_id) {
            Some((_, existing)) => *existing = meta,
            None => self.entries.push((participant_id.to_string(), meta)),
        }
    }

    pub fn get(&self, participant_id: &str) -> Option<&LocalFileMeta> {
        self.entries
            .iter()
            .find(|(id, _)| id == participant_id)
            .map(|(_, meta)| meta)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &LocalFileMeta)> {
        self.entries.iter().map(|(id, meta)| (id.as_str(), meta))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Requires at least two reports.
    pub fn videos_match(&self, tolerance: &MatchTolerance) -> bool {
        if self.entries.len() < 2 {
            return false;
        }

        let base = &self.entries[0].1;
        self.entries.iter().all(|(_, meta)| {
            (meta.duration_secs - base.duration_secs).abs() < tolerance.duration_secs
                && meta.size_bytes.abs_diff(base.size_bytes) < tolerance.size_bytes
        })
    }
}
