//! Domain types for TripSync
//!
//! Core domain types: chat turns, itinerary documents, activity progress,
//! and notifications. These are plain data; anything that talks to the
//! server lives in `remote`, and anything stateful lives in the `chat`,
//! `planner`, and `progress` modules.

mod itinerary;
mod message;
mod notification;
mod progress;
mod trip;

pub use itinerary::{
    Activity, Coordinates, DayPlan, ItineraryPlan, ItineraryRecord, ItinerarySummary, PlanParseError,
    sanitize_model_json,
};
pub use message::{ChatTurn, ConversationSummary, Delivery, MessageId, Role};
pub use notification::Notification;
pub use progress::{ProgressEntry, ProgressSummary, ProgressUpdate, completion_percentage};
pub use trip::{TripRequest, ValidationError};

/// Server-assigned conversation identifier
pub type ConversationId = i64;

/// Server-assigned itinerary identifier
pub type ItineraryId = i64;

/// Server-assigned notification identifier
pub type NotificationId = i64;
