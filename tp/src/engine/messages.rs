//! Sync engine messages
//!
//! Commands, responses, and broadcast events for the actor pattern.

use thiserror::Error;
use tokio::sync::oneshot;

use crate::chat::AssistantReply;
use crate::domain::{
    ChatTurn, ConversationId, ConversationSummary, ItineraryId, ItinerarySummary, MessageId, Notification,
    NotificationId, PlanParseError, ProgressSummary, TripRequest, ValidationError,
};
use crate::planner::ActivePlan;
use crate::remote::RemoteError;

/// Errors from sync engine operations
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Plan(#[from] PlanParseError),

    #[error("No itinerary is open")]
    NoActiveItinerary,

    #[error("Channel error")]
    ChannelError,
}

impl EngineError {
    /// Check if this error left local state untouched (safe to just retry)
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Check if this error came from the server or transport
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }

    /// Check if repeating the operation unchanged might succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Remote(remote) if remote.is_retryable())
    }
}

/// Response from sync engine operations
pub type EngineResponse<T> = Result<T, EngineError>;

/// Commands sent to the SyncEngine actor
#[derive(Debug)]
pub enum EngineCommand {
    // Conversation operations
    SendMessage {
        text: String,
        reply: oneshot::Sender<EngineResponse<AssistantReply>>,
    },
    LoadHistory {
        conversation_id: ConversationId,
        reply: oneshot::Sender<EngineResponse<Vec<ChatTurn>>>,
    },
    ListConversations {
        reply: oneshot::Sender<EngineResponse<Vec<ConversationSummary>>>,
    },

    // Itinerary operations
    CreateItinerary {
        request: TripRequest,
        reply: oneshot::Sender<EngineResponse<ItineraryId>>,
    },
    OpenItinerary {
        id: ItineraryId,
        reply: oneshot::Sender<EngineResponse<()>>,
    },
    ReviseItinerary {
        instructions: String,
        reply: oneshot::Sender<EngineResponse<String>>,
    },
    ListItineraries {
        reply: oneshot::Sender<EngineResponse<Vec<ItinerarySummary>>>,
    },

    // Progress operations
    ToggleActivity {
        day: u32,
        index: u32,
        notes: Option<String>,
        reply: oneshot::Sender<EngineResponse<ProgressSummary>>,
    },
    RefreshProgress {
        reply: oneshot::Sender<EngineResponse<ProgressSummary>>,
    },

    // Notification operations
    ListNotifications {
        reply: oneshot::Sender<EngineResponse<Vec<Notification>>>,
    },
    MarkNotificationRead {
        id: NotificationId,
        reply: oneshot::Sender<EngineResponse<()>>,
    },
    UnreadCount {
        reply: oneshot::Sender<EngineResponse<u32>>,
    },

    // Introspection
    Snapshot {
        reply: oneshot::Sender<EngineSnapshot>,
    },

    // Shutdown
    Shutdown,
}

/// Event broadcast when engine state changes that a UI should react to
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// The conversation picked up its server id from a send or create
    ConversationAdopted { id: ConversationId },
    /// A turn was appended to the transcript (optimistic echo or reply)
    TurnAppended { turn: ChatTurn },
    /// A pending turn was confirmed by the server
    TurnCommitted { id: MessageId },
    /// A pending turn was removed after a failed send
    TurnRolledBack { id: MessageId },
    /// The assistant replied, already classified
    AssistantReplied { reply: AssistantReply },
    /// A new or revised plan document became active
    PlanInstalled { itinerary_id: ItineraryId, version: u64 },
    /// The progress ledger absorbed fresh server state
    ProgressChanged { summary: ProgressSummary },
    /// The unread notification count moved
    UnreadChanged { count: u32 },
}

/// Point-in-time copy of engine state, for rendering
#[derive(Debug, Clone)]
pub struct EngineSnapshot {
    /// Server conversation id, once adopted
    pub conversation_id: Option<ConversationId>,
    /// Transcript including any in-flight pending turns
    pub turns: Vec<ChatTurn>,
    /// Active plan document, if an itinerary is open
    pub plan: Option<ActivePlan>,
    /// Cached progress for the active itinerary
    pub progress: Option<ProgressSummary>,
    /// Last polled unread notification count
    pub unread: Option<u32>,
}
