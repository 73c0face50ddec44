//! Activity progress domain types
//!
//! Completion marks are keyed by (itinerary, day, activity index). The server
//! owns the marks; the client keeps a cache in `progress::ProgressLedger` and
//! re-reads the aggregate after every write.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ItineraryId;

/// Aggregate percentage, rounded to the nearest whole percent
///
/// Zero activities means zero percent, never a division error.
pub fn completion_percentage(total: u32, completed: u32) -> u8 {
    if total == 0 {
        return 0;
    }
    ((completed as f64 / total as f64) * 100.0).round() as u8
}

/// One completion mark as stored by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEntry {
    /// Day number, 1-indexed
    pub day: u32,

    /// Position within the day's activity list, 0-indexed
    pub activity_index: u32,

    /// Whether the activity is marked done
    pub completed: bool,

    /// Free-text note attached to the mark
    pub notes: Option<String>,

    /// When the mark was set (None while incomplete)
    pub completed_at: Option<DateTime<Utc>>,
}

/// Aggregate completion state for one itinerary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSummary {
    pub itinerary_id: ItineraryId,

    /// Activity count derived from the itinerary document
    pub total_activities: u32,

    /// Number of marks currently set
    pub completed_activities: u32,

    /// Rounded whole percent, 0 when there are no activities
    pub completion_percentage: u8,

    /// Individual marks backing the aggregate
    pub entries: Vec<ProgressEntry>,
}

impl ProgressSummary {
    /// Empty summary for an itinerary with no marks yet
    pub fn empty(itinerary_id: ItineraryId, total_activities: u32) -> Self {
        Self {
            itinerary_id,
            total_activities,
            completed_activities: 0,
            completion_percentage: 0,
            entries: Vec::new(),
        }
    }
}

/// Outgoing completion mark
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub itinerary_id: ItineraryId,
    pub day: u32,
    pub activity_index: u32,
    pub completed: bool,
    pub notes: Option<String>,
}
