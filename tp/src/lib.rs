//! TripSync - conversation and itinerary sync for AI trip planning
//!
//! TripSync keeps a terminal client in step with a travel-assistant server:
//! chat messages are echoed optimistically and confirmed or rolled back,
//! model-generated itinerary documents are sanitized and swapped in
//! atomically, and activity completion is cached against the exact plan
//! version it was read for.
//!
//! # Core Concepts
//!
//! - **Optimistic Sends**: A message shows up in the transcript immediately
//!   and is removed only if the server never takes it
//! - **One Writer**: A single actor task owns all mutable state, so there is
//!   no lock ordering to get wrong
//! - **Versioned Plans**: Every installed document bumps a version; progress
//!   marks are valid only for the version they were read against
//! - **Tolerant Decoding**: Model output is scrubbed of fences and broken
//!   quoting before any parse is attempted
//!
//! # Modules
//!
//! - [`domain`] - Shared domain types (turns, plans, progress, notifications)
//! - [`chat`] - Conversation transcript and reply classification
//! - [`planner`] - Active itinerary document and versioning
//! - [`progress`] - Activity completion ledger
//! - [`engine`] - The actor that serializes all of the above
//! - [`remote`] - HTTP client for the travel server
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface
//! - [`repl`] - Interactive chat session

pub mod chat;
pub mod cli;
pub mod config;
pub mod domain;
pub mod engine;
pub mod planner;
pub mod progress;
pub mod remote;
pub mod repl;

// Re-export commonly used types
pub use chat::{AssistantReply, Conversation, classify_reply};
pub use config::{Config, LoggingConfig, PollingConfig, RemoteConfig};
pub use domain::{
    Activity, ChatTurn, ConversationId, ConversationSummary, DayPlan, Delivery, ItineraryId, ItineraryPlan,
    ItineraryRecord, ItinerarySummary, MessageId, Notification, NotificationId, PlanParseError, ProgressEntry,
    ProgressSummary, ProgressUpdate, Role, TripRequest, ValidationError, completion_percentage, sanitize_model_json,
};
pub use engine::{EngineError, EngineEvent, EngineOptions, EngineResponse, EngineSnapshot, SyncEngine};
pub use planner::{ActivePlan, PlanController};
pub use progress::ProgressLedger;
pub use remote::{
    AuthSession, ChatReply, CreatedItinerary, HttpTravelApi, RemoteError, SessionContext, TravelApi, UpdatedItinerary,
    UserProfile, create_api, login,
};
