//! Conversation state and reply classification
//!
//! `Conversation` owns the transcript and the append-then-confirm-or-rollback
//! bookkeeping for optimistic sends. `classify_reply` decides how an
//! assistant response should be rendered.

mod classify;
mod conversation;

pub use classify::{AssistantReply, classify_reply};
pub use conversation::Conversation;
