//! Notification domain type

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::NotificationId;

/// One notification row
///
/// `status` is the server's free-form vocabulary ("pending", "read", and the
/// group-invite states); unread is defined by `read_at` being unset, not by
/// the status string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,

    /// Server notification type (e.g. "group_invite", "trip_reminder")
    #[serde(rename = "type")]
    pub kind: String,

    pub title: String,

    pub message: String,

    pub status: String,

    pub created_at: DateTime<Utc>,

    /// Set when the user has seen the notification
    pub read_at: Option<DateTime<Utc>>,
}

impl Notification {
    /// Check whether the notification still counts toward the unread badge
    pub fn is_unread(&self) -> bool {
        self.read_at.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification(read_at: Option<DateTime<Utc>>) -> Notification {
        Notification {
            id: 1,
            kind: "trip_reminder".to_string(),
            title: "Trip coming up".to_string(),
            message: "Your Lisbon trip starts tomorrow".to_string(),
            status: "pending".to_string(),
            created_at: Utc::now(),
            read_at,
        }
    }

    #[test]
    fn test_unread_is_defined_by_read_at() {
        assert!(notification(None).is_unread());
        assert!(!notification(Some(Utc::now())).is_unread());
    }
}
