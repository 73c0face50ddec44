//! Travel API client trait
//!
//! The engine talks to the server through this trait so tests can swap in a
//! scripted implementation. The real client lives in `remote::http`.

use async_trait::async_trait;

use super::RemoteError;
use crate::domain::{
    ChatTurn, ConversationId, ConversationSummary, ItineraryId, ItineraryRecord, ItinerarySummary, Notification,
    NotificationId, ProgressSummary, ProgressUpdate, TripRequest,
};

/// Server response to a chat send
#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    /// Conversation the server filed the exchange under
    pub conversation_id: ConversationId,

    /// Assistant text (may itself be a JSON document)
    pub response: String,

    /// True when the server declined to treat the input as travel-related
    pub query_rejected: bool,
}

/// Server response to itinerary generation
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedItinerary {
    pub itinerary_id: ItineraryId,

    /// Conversation created alongside the itinerary
    pub conversation_id: ConversationId,

    /// Raw model document as stored server-side
    pub raw_plan: String,
}

/// Server response to an itinerary revision
#[derive(Debug, Clone, PartialEq)]
pub struct UpdatedItinerary {
    /// Human-readable acknowledgement
    pub message: String,

    /// Replacement model document
    pub raw_plan: String,
}

/// Authenticated operations against the travel server
#[async_trait]
pub trait TravelApi: Send + Sync {
    /// Send a chat message, creating a conversation server-side if needed
    async fn send_message(
        &self,
        message: &str,
        conversation_id: Option<ConversationId>,
    ) -> Result<ChatReply, RemoteError>;

    /// Fetch the full message history of a conversation, oldest first
    async fn conversation_messages(&self, conversation_id: ConversationId) -> Result<Vec<ChatTurn>, RemoteError>;

    /// List the user's conversations, newest activity first
    async fn conversations(&self) -> Result<Vec<ConversationSummary>, RemoteError>;

    /// Generate a new itinerary (slow: waits on the generation model)
    async fn create_itinerary(&self, request: &TripRequest) -> Result<CreatedItinerary, RemoteError>;

    /// List the user's itineraries, newest first
    async fn itineraries(&self) -> Result<Vec<ItinerarySummary>, RemoteError>;

    /// Fetch one itinerary row including its raw document
    async fn itinerary(&self, id: ItineraryId) -> Result<ItineraryRecord, RemoteError>;

    /// Revise an itinerary (slow: waits on the generation model)
    async fn update_itinerary(&self, id: ItineraryId, instructions: &str) -> Result<UpdatedItinerary, RemoteError>;

    /// Read the aggregate completion state for an itinerary
    async fn progress(&self, itinerary_id: ItineraryId) -> Result<ProgressSummary, RemoteError>;

    /// Upsert one completion mark
    async fn set_progress(&self, update: &ProgressUpdate) -> Result<(), RemoteError>;

    /// List notifications, newest first
    async fn notifications(&self) -> Result<Vec<Notification>, RemoteError>;

    /// Count notifications not yet marked read
    async fn unread_count(&self) -> Result<u32, RemoteError>;

    /// Mark one notification as read
    async fn mark_read(&self, id: NotificationId) -> Result<(), RemoteError>;
}
