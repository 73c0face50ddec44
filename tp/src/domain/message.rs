//! Chat message domain types
//!
//! A transcript is a sequence of `ChatTurn`s. Turns echoed locally before the
//! server has confirmed them carry a client-generated id and a `Pending`
//! delivery tag; confirmed turns carry the server's integer id (or keep their
//! local id with a `Committed` tag when the server acknowledged the content
//! without assigning one).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::ConversationId;

/// Identifier for a chat turn
///
/// Local and remote ids live in separate spaces, so an optimistic echo can
/// never collide with a row that later arrives from the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageId {
    /// Client-assigned id for a locally created turn
    Local(Uuid),
    /// Server-assigned id for a turn present in server history
    Remote(i64),
}

impl MessageId {
    /// Generate a fresh local id
    pub fn local() -> Self {
        Self::Local(Uuid::now_v7())
    }

    /// Check whether this id was assigned by the client
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local(uuid) => write!(f, "local-{uuid}"),
            Self::Remote(id) => write!(f, "{id}"),
        }
    }
}

/// Author of a chat turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Delivery state of a chat turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Delivery {
    /// Echoed locally, not yet acknowledged by the server
    Pending,
    /// Acknowledged by the server or loaded from server history
    Committed,
}

/// One turn of a conversation transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    /// Turn identifier (local until the server has a say)
    pub id: MessageId,

    /// Who authored the turn
    pub role: Role,

    /// Message text as shown to the user
    pub content: String,

    /// Whether the server has confirmed this turn
    pub delivery: Delivery,

    /// Server timestamp for history rows, local clock for echoes
    pub created_at: DateTime<Utc>,
}

impl ChatTurn {
    /// Create an optimistic local echo of a user message
    pub fn pending_user(content: impl Into<String>) -> Self {
        let content = content.into();
        debug!(len = content.len(), "ChatTurn::pending_user: called");
        Self {
            id: MessageId::local(),
            role: Role::User,
            content,
            delivery: Delivery::Pending,
            created_at: Utc::now(),
        }
    }

    /// Create a server-acknowledged assistant turn
    ///
    /// Send responses carry no message id, so the turn keeps a local id
    /// until a history load replaces it with the server row.
    pub fn committed_assistant(content: impl Into<String>) -> Self {
        let content = content.into();
        debug!(len = content.len(), "ChatTurn::committed_assistant: called");
        Self {
            id: MessageId::local(),
            role: Role::Assistant,
            content,
            delivery: Delivery::Committed,
            created_at: Utc::now(),
        }
    }

    /// Create a turn from a server history row
    pub fn from_history(id: i64, role: Role, content: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: MessageId::Remote(id),
            role,
            content: content.into(),
            delivery: Delivery::Committed,
            created_at,
        }
    }

    /// Flip a pending turn to committed
    pub fn mark_committed(&mut self) {
        debug!(%self.id, "ChatTurn::mark_committed: called");
        self.delivery = Delivery::Committed;
    }

    /// Check whether the turn is still awaiting confirmation
    pub fn is_pending(&self) -> bool {
        self.delivery == Delivery::Pending
    }
}

/// One row of the conversation listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    /// Conversation identifier
    pub id: ConversationId,

    /// Server-assigned title (derived from the first message)
    pub title: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last activity timestamp (listing is ordered by this, newest first)
    pub updated_at: DateTime<Utc>,
}
