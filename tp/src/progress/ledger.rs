//! Client-side cache of activity completion marks
//!
//! The server owns progress; this ledger is a read cache keyed by
//! (itinerary, document version). Marks index by (day, activity index).
//! Rebinding to a different itinerary or document version throws the whole
//! cache away, because a revised document can reorder or remove the
//! activities the old marks pointed at.

use std::collections::HashMap;

use tracing::debug;

use crate::domain::{ItineraryId, ProgressEntry, ProgressSummary};

/// Cached completion state for the active itinerary
#[derive(Debug, Default)]
pub struct ProgressLedger {
    itinerary_id: Option<ItineraryId>,
    version: u64,
    marks: HashMap<(u32, u32), ProgressEntry>,
    summary: Option<ProgressSummary>,
}

impl ProgressLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scope the ledger to an itinerary at a document version
    ///
    /// Changing either the itinerary or the version invalidates everything
    /// cached; rebinding to the same scope keeps it.
    pub fn bind(&mut self, itinerary_id: ItineraryId, version: u64) {
        if self.itinerary_id == Some(itinerary_id) && self.version == version {
            return;
        }
        debug!(itinerary_id, version, "ProgressLedger::bind: rebinding, cache cleared");
        self.itinerary_id = Some(itinerary_id);
        self.version = version;
        self.marks.clear();
        self.summary = None;
    }

    /// Replace the cache with a freshly read aggregate
    ///
    /// Later entries win when the server holds several rows for one slot.
    pub fn absorb(&mut self, summary: ProgressSummary) {
        debug!(
            itinerary_id = summary.itinerary_id,
            completed = summary.completed_activities,
            "ProgressLedger::absorb: called"
        );
        self.marks.clear();
        for entry in &summary.entries {
            self.marks.insert((entry.day, entry.activity_index), entry.clone());
        }
        self.summary = Some(summary);
    }

    /// Drop cached marks without changing scope
    pub fn invalidate(&mut self) {
        debug!("ProgressLedger::invalidate: called");
        self.marks.clear();
        self.summary = None;
    }

    /// Whether an activity slot is currently marked done
    ///
    /// Unknown slots are incomplete; the ledger never errors on a key it has
    /// not seen.
    pub fn completed(&self, day: u32, activity_index: u32) -> bool {
        self.marks.get(&(day, activity_index)).is_some_and(|e| e.completed)
    }

    /// Cached aggregate, when one has been read in this scope
    pub fn summary(&self) -> Option<&ProgressSummary> {
        self.summary.as_ref()
    }

    /// Cached whole-percent completion (0 when nothing is cached)
    pub fn percentage(&self) -> u8 {
        self.summary.as_ref().map(|s| s.completion_percentage).unwrap_or(0)
    }

    /// Scope check, mainly for staleness guards
    pub fn is_bound_to(&self, itinerary_id: ItineraryId, version: u64) -> bool {
        self.itinerary_id == Some(itinerary_id) && self.version == version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(day: u32, index: u32, completed: bool) -> ProgressEntry {
        ProgressEntry {
            day,
            activity_index: index,
            completed,
            notes: None,
            completed_at: None,
        }
    }

    fn summary(entries: Vec<ProgressEntry>) -> ProgressSummary {
        let completed = entries.iter().filter(|e| e.completed).count() as u32;
        ProgressSummary {
            itinerary_id: 1,
            total_activities: 4,
            completed_activities: completed,
            completion_percentage: crate::domain::completion_percentage(4, completed),
            entries,
        }
    }

    #[test]
    fn test_absorb_indexes_marks() {
        let mut ledger = ProgressLedger::new();
        ledger.bind(1, 1);
        ledger.absorb(summary(vec![entry(1, 0, true), entry(2, 1, false)]));

        assert!(ledger.completed(1, 0));
        assert!(!ledger.completed(2, 1));
        assert!(!ledger.completed(3, 0));
        assert_eq!(ledger.percentage(), 25);
    }

    #[test]
    fn test_later_entries_win_per_slot() {
        let mut ledger = ProgressLedger::new();
        ledger.bind(1, 1);
        ledger.absorb(summary(vec![entry(1, 0, true), entry(1, 0, false)]));
        assert!(!ledger.completed(1, 0));
    }

    #[test]
    fn test_rebind_to_new_version_clears_cache() {
        let mut ledger = ProgressLedger::new();
        ledger.bind(1, 1);
        ledger.absorb(summary(vec![entry(1, 0, true)]));
        assert!(ledger.completed(1, 0));

        ledger.bind(1, 2);
        assert!(!ledger.completed(1, 0));
        assert!(ledger.summary().is_none());
        assert_eq!(ledger.percentage(), 0);
    }

    #[test]
    fn test_rebind_to_same_scope_keeps_cache() {
        let mut ledger = ProgressLedger::new();
        ledger.bind(1, 1);
        ledger.absorb(summary(vec![entry(1, 0, true)]));

        ledger.bind(1, 1);
        assert!(ledger.completed(1, 0));
        assert!(ledger.summary().is_some());
    }

    #[test]
    fn test_rebind_to_other_itinerary_clears_cache() {
        let mut ledger = ProgressLedger::new();
        ledger.bind(1, 1);
        ledger.absorb(summary(vec![entry(1, 0, true)]));

        ledger.bind(2, 1);
        assert!(!ledger.completed(1, 0));
        assert!(!ledger.is_bound_to(1, 1));
        assert!(ledger.is_bound_to(2, 1));
    }

    #[test]
    fn test_invalidate_keeps_scope() {
        let mut ledger = ProgressLedger::new();
        ledger.bind(1, 3);
        ledger.absorb(summary(vec![entry(1, 0, true)]));

        ledger.invalidate();
        assert!(!ledger.completed(1, 0));
        assert!(ledger.is_bound_to(1, 3));
    }
}
