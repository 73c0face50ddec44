//! Conversation transcript state
//!
//! The transcript is the UI's source of truth. A send appends an optimistic
//! pending turn first; the turn is committed once the server acknowledges it
//! and removed (by its specific id) if delivery fails. The conversation id is
//! adopted from the first server reply and never changes afterwards.

use tracing::{debug, warn};

use crate::domain::{ChatTurn, ConversationId, Delivery, MessageId};

/// One conversation's transcript and identity
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    id: Option<ConversationId>,
    turns: Vec<ChatTurn>,
}

impl Conversation {
    /// Start a conversation with no server identity yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume a conversation the server already knows
    pub fn with_id(id: ConversationId) -> Self {
        Self {
            id: Some(id),
            turns: Vec::new(),
        }
    }

    /// Server id, once adopted
    pub fn id(&self) -> Option<ConversationId> {
        self.id
    }

    /// Transcript in display order
    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Check whether any turn is still awaiting confirmation
    pub fn has_pending(&self) -> bool {
        self.turns.iter().any(|t| t.is_pending())
    }

    /// Adopt the server-assigned conversation id
    ///
    /// The first adoption wins; later calls with a different id are ignored.
    /// Returns true when the id was newly adopted.
    pub fn adopt_id(&mut self, id: ConversationId) -> bool {
        match self.id {
            None => {
                debug!(id, "Conversation::adopt_id: adopted");
                self.id = Some(id);
                true
            }
            Some(current) if current == id => false,
            Some(current) => {
                warn!(current, offered = id, "Conversation::adopt_id: id already adopted, keeping current");
                false
            }
        }
    }

    /// Append an optimistic local echo of a user message
    pub fn push_pending(&mut self, content: impl Into<String>) -> MessageId {
        let turn = ChatTurn::pending_user(content);
        let id = turn.id;
        debug!(%id, "Conversation::push_pending: called");
        self.turns.push(turn);
        id
    }

    /// Append a server-acknowledged assistant turn
    pub fn push_assistant(&mut self, content: impl Into<String>) -> MessageId {
        let turn = ChatTurn::committed_assistant(content);
        let id = turn.id;
        debug!(%id, "Conversation::push_assistant: called");
        self.turns.push(turn);
        id
    }

    /// Mark a pending turn as confirmed; returns false when the id is gone
    pub fn commit(&mut self, id: &MessageId) -> bool {
        debug!(%id, "Conversation::commit: called");
        match self.turns.iter_mut().find(|t| t.id == *id) {
            Some(turn) => {
                turn.mark_committed();
                true
            }
            None => false,
        }
    }

    /// Remove a pending turn after a failed send
    ///
    /// Only the turn with this exact id is touched, and only while it is
    /// still pending; committed turns are never rolled back.
    pub fn rollback(&mut self, id: &MessageId) -> bool {
        debug!(%id, "Conversation::rollback: called");
        let before = self.turns.len();
        self.turns.retain(|t| !(t.id == *id && t.delivery == Delivery::Pending));
        self.turns.len() != before
    }

    /// Replace the transcript with server history
    ///
    /// Sends run to completion before a history load can start, so there is
    /// never a pending turn to preserve here.
    pub fn replace_history(&mut self, turns: Vec<ChatTurn>) {
        debug!(count = turns.len(), "Conversation::replace_history: called");
        self.turns = turns;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Role;
    use chrono::Utc;

    // === POSITIVE TESTS: optimistic send bookkeeping ===

    #[test]
    fn test_push_pending_then_commit() {
        let mut conv = Conversation::new();
        let id = conv.push_pending("two days in Rome please");
        assert!(conv.has_pending());

        assert!(conv.commit(&id));
        assert!(!conv.has_pending());
        assert_eq!(conv.turns().len(), 1);
        assert_eq!(conv.turns()[0].delivery, Delivery::Committed);
    }

    #[test]
    fn test_rollback_removes_only_the_failed_turn() {
        let mut conv = Conversation::new();
        let first = conv.push_pending("message one");
        let second = conv.push_pending("message two");

        assert!(conv.rollback(&second));
        assert_eq!(conv.turns().len(), 1);
        assert_eq!(conv.turns()[0].id, first);
        assert!(conv.turns()[0].is_pending());
    }

    #[test]
    fn test_rollback_never_touches_committed_turns() {
        let mut conv = Conversation::new();
        let id = conv.push_pending("hello");
        conv.commit(&id);

        assert!(!conv.rollback(&id));
        assert_eq!(conv.turns().len(), 1);
    }

    #[test]
    fn test_rollback_of_unknown_id_is_a_noop() {
        let mut conv = Conversation::new();
        conv.push_pending("hello");
        assert!(!conv.rollback(&MessageId::local()));
        assert_eq!(conv.turns().len(), 1);
    }

    #[test]
    fn test_assistant_turns_are_committed_on_arrival() {
        let mut conv = Conversation::new();
        conv.push_assistant("How can I help?");
        assert!(!conv.has_pending());
        assert_eq!(conv.turns()[0].role, Role::Assistant);
    }

    // === POSITIVE TESTS: id adoption ===

    #[test]
    fn test_adopt_id_first_wins() {
        let mut conv = Conversation::new();
        assert_eq!(conv.id(), None);

        assert!(conv.adopt_id(42));
        assert_eq!(conv.id(), Some(42));

        // Same id again is not a new adoption
        assert!(!conv.adopt_id(42));

        // A different id never replaces the adopted one
        assert!(!conv.adopt_id(99));
        assert_eq!(conv.id(), Some(42));
    }

    #[test]
    fn test_with_id_counts_as_adopted() {
        let mut conv = Conversation::with_id(7);
        assert!(!conv.adopt_id(8));
        assert_eq!(conv.id(), Some(7));
    }

    // === POSITIVE TESTS: history replacement ===

    #[test]
    fn test_replace_history_is_wholesale() {
        let mut conv = Conversation::with_id(7);
        let id = conv.push_pending("local note");
        conv.commit(&id);

        let history = vec![
            ChatTurn::from_history(1, Role::User, "hi", Utc::now()),
            ChatTurn::from_history(2, Role::Assistant, "hello!", Utc::now()),
        ];
        conv.replace_history(history);

        assert_eq!(conv.turns().len(), 2);
        assert_eq!(conv.turns()[0].id, MessageId::Remote(1));
        assert_eq!(conv.turns()[1].id, MessageId::Remote(2));
    }
}
