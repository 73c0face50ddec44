//! Assistant reply classification
//!
//! Every server reply lands in exactly one of three buckets: rejected by the
//! travel guardrail, a structured `{message, itinerary}` document, or plain
//! text. Classification is total; text that merely looks like JSON falls
//! through to plain text rather than erroring.

use serde_json::Value;
use tracing::debug;

use crate::domain::{ItineraryPlan, sanitize_model_json};
use crate::remote::ChatReply;

/// How an assistant reply should be treated
#[derive(Debug, Clone, PartialEq)]
pub enum AssistantReply {
    /// Plain conversational text
    Text(String),

    /// The model produced an itinerary document alongside its message
    Structured { message: String, plan: ItineraryPlan },

    /// The server declined to treat the input as travel-related
    Rejected(String),
}

impl AssistantReply {
    /// Text to append to the transcript for this reply
    pub fn display_text(&self) -> &str {
        match self {
            Self::Text(text) => text,
            Self::Structured { message, .. } => message,
            Self::Rejected(text) => text,
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, Self::Structured { .. })
    }
}

/// Classify a chat reply
///
/// The rejection flag wins over everything; otherwise a reply is structured
/// exactly when it decodes to a JSON object carrying both a `message` string
/// and an `itinerary` document.
pub fn classify_reply(reply: &ChatReply) -> AssistantReply {
    if reply.query_rejected {
        debug!("classify_reply: rejected by server");
        return AssistantReply::Rejected(reply.response.clone());
    }

    match try_structured(&reply.response) {
        Some((message, plan)) => {
            debug!(days = plan.days.len(), "classify_reply: structured");
            AssistantReply::Structured { message, plan }
        }
        None => AssistantReply::Text(reply.response.clone()),
    }
}

fn try_structured(response: &str) -> Option<(String, ItineraryPlan)> {
    let cleaned = sanitize_model_json(response);
    let value: Value = serde_json::from_str(&cleaned).ok()?;
    let map = value.as_object()?;
    let message = map.get("message")?.as_str()?.to_string();
    let plan: ItineraryPlan = serde_json::from_value(map.get("itinerary")?.clone()).ok()?;
    Some((message, plan))
}
