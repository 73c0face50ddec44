//! SyncEngine - actor that owns conversation, plan, and progress state
//!
//! Every mutation runs on one task, so optimistic sends, history loads, and
//! plan swaps are serialized without locks. Commands arrive via channels;
//! state changes a UI cares about are broadcast as events.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::chat::{AssistantReply, Conversation, classify_reply};
use crate::domain::{
    ChatTurn, ConversationId, ConversationSummary, ItineraryId, ItinerarySummary, Notification, NotificationId,
    ProgressSummary, ProgressUpdate, TripRequest, ValidationError,
};
use crate::planner::PlanController;
use crate::progress::ProgressLedger;
use crate::remote::TravelApi;

use super::messages::{EngineCommand, EngineError, EngineEvent, EngineResponse, EngineSnapshot};

/// Knobs for the engine's background behavior
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// How often to poll the unread notification count
    pub poll_interval: Duration,

    /// Disable to stop all background polling
    pub polling: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            polling: true,
        }
    }
}

/// Handle to send commands to the SyncEngine
#[derive(Clone)]
pub struct SyncEngine {
    tx: mpsc::Sender<EngineCommand>,
    /// Broadcast sender for engine event notifications
    event_tx: broadcast::Sender<EngineEvent>,
}

impl SyncEngine {
    /// Spawn a new SyncEngine actor
    pub fn spawn(api: Arc<dyn TravelApi>, options: EngineOptions) -> Self {
        debug!(polling = options.polling, "spawn: called");
        let (tx, rx) = mpsc::channel(256);

        // Broadcast channel for engine events (UIs subscribe)
        let (event_tx, _) = broadcast::channel(64);

        let actor = EngineActor {
            api,
            conversation: Conversation::new(),
            planner: PlanController::new(),
            ledger: ProgressLedger::new(),
            unread: None,
            event_tx: event_tx.clone(),
        };

        // Spawn the actor task
        tokio::spawn(actor.run(rx, options));

        info!("SyncEngine spawned");

        Self { tx, event_tx }
    }

    /// Subscribe to engine events (for instant UI updates)
    pub fn subscribe_events(&self) -> broadcast::Receiver<EngineEvent> {
        self.event_tx.subscribe()
    }

    // === Conversation operations ===

    /// Send a user message, echoing it locally until the server confirms
    pub async fn send_message(&self, text: impl Into<String>) -> EngineResponse<AssistantReply> {
        let text = text.into();
        debug!(len = text.len(), "send_message: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineCommand::SendMessage { text, reply: reply_tx })
            .await
            .map_err(|_| EngineError::ChannelError)?;
        reply_rx.await.map_err(|_| EngineError::ChannelError)?
    }

    /// Replace the transcript with server history for one conversation
    pub async fn load_history(&self, conversation_id: ConversationId) -> EngineResponse<Vec<ChatTurn>> {
        debug!(conversation_id, "load_history: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineCommand::LoadHistory {
                conversation_id,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelError)?;
        reply_rx.await.map_err(|_| EngineError::ChannelError)?
    }

    /// List the user's conversations
    pub async fn conversations(&self) -> EngineResponse<Vec<ConversationSummary>> {
        debug!("conversations: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineCommand::ListConversations { reply: reply_tx })
            .await
            .map_err(|_| EngineError::ChannelError)?;
        reply_rx.await.map_err(|_| EngineError::ChannelError)?
    }

    // === Itinerary operations ===

    /// Validate a trip request, generate its itinerary, and open it
    pub async fn create_itinerary(&self, request: TripRequest) -> EngineResponse<ItineraryId> {
        debug!(destination = %request.destination, "create_itinerary: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineCommand::CreateItinerary { request, reply: reply_tx })
            .await
            .map_err(|_| EngineError::ChannelError)?;
        reply_rx.await.map_err(|_| EngineError::ChannelError)?
    }

    /// Fetch an itinerary and make it the active plan
    pub async fn open_itinerary(&self, id: ItineraryId) -> EngineResponse<()> {
        debug!(id, "open_itinerary: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineCommand::OpenItinerary { id, reply: reply_tx })
            .await
            .map_err(|_| EngineError::ChannelError)?;
        reply_rx.await.map_err(|_| EngineError::ChannelError)?
    }

    /// Apply a natural-language revision to the active itinerary
    ///
    /// Returns the server's summary of what changed.
    pub async fn revise_itinerary(&self, instructions: impl Into<String>) -> EngineResponse<String> {
        let instructions = instructions.into();
        debug!(len = instructions.len(), "revise_itinerary: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineCommand::ReviseItinerary {
                instructions,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelError)?;
        reply_rx.await.map_err(|_| EngineError::ChannelError)?
    }

    /// List the user's itineraries
    pub async fn itineraries(&self) -> EngineResponse<Vec<ItinerarySummary>> {
        debug!("itineraries: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineCommand::ListItineraries { reply: reply_tx })
            .await
            .map_err(|_| EngineError::ChannelError)?;
        reply_rx.await.map_err(|_| EngineError::ChannelError)?
    }

    // === Progress operations ===

    /// Flip one activity's completion mark and return the fresh summary
    pub async fn toggle_activity(&self, day: u32, index: u32, notes: Option<String>) -> EngineResponse<ProgressSummary> {
        debug!(day, index, "toggle_activity: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineCommand::ToggleActivity {
                day,
                index,
                notes,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelError)?;
        reply_rx.await.map_err(|_| EngineError::ChannelError)?
    }

    /// Refetch completion state for the active itinerary
    pub async fn refresh_progress(&self) -> EngineResponse<ProgressSummary> {
        debug!("refresh_progress: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineCommand::RefreshProgress { reply: reply_tx })
            .await
            .map_err(|_| EngineError::ChannelError)?;
        reply_rx.await.map_err(|_| EngineError::ChannelError)?
    }

    // === Notification operations ===

    /// List notifications, newest first
    pub async fn notifications(&self) -> EngineResponse<Vec<Notification>> {
        debug!("notifications: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineCommand::ListNotifications { reply: reply_tx })
            .await
            .map_err(|_| EngineError::ChannelError)?;
        reply_rx.await.map_err(|_| EngineError::ChannelError)?
    }

    /// Mark one notification read and refresh the unread badge
    pub async fn mark_notification_read(&self, id: NotificationId) -> EngineResponse<()> {
        debug!(id, "mark_notification_read: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineCommand::MarkNotificationRead { id, reply: reply_tx })
            .await
            .map_err(|_| EngineError::ChannelError)?;
        reply_rx.await.map_err(|_| EngineError::ChannelError)?
    }

    /// Fetch the unread notification count on demand
    pub async fn unread_count(&self) -> EngineResponse<u32> {
        debug!("unread_count: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineCommand::UnreadCount { reply: reply_tx })
            .await
            .map_err(|_| EngineError::ChannelError)?;
        reply_rx.await.map_err(|_| EngineError::ChannelError)?
    }

    // === Introspection ===

    /// Copy the current engine state for rendering
    pub async fn snapshot(&self) -> EngineResponse<EngineSnapshot> {
        debug!("snapshot: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineCommand::Snapshot { reply: reply_tx })
            .await
            .map_err(|_| EngineError::ChannelError)?;
        reply_rx.await.map_err(|_| EngineError::ChannelError)
    }

    /// Shutdown the SyncEngine
    pub async fn shutdown(&self) -> Result<(), EngineError> {
        debug!("shutdown: called");
        self.tx
            .send(EngineCommand::Shutdown)
            .await
            .map_err(|_| EngineError::ChannelError)
    }
}

/// The actor that owns all mutable client state
struct EngineActor {
    api: Arc<dyn TravelApi>,
    conversation: Conversation,
    planner: PlanController,
    ledger: ProgressLedger,
    unread: Option<u32>,
    event_tx: broadcast::Sender<EngineEvent>,
}

impl EngineActor {
    async fn run(mut self, mut rx: mpsc::Receiver<EngineCommand>, options: EngineOptions) {
        debug!("run: called");
        debug!("SyncEngine actor started");

        let mut poll = tokio::time::interval(options.poll_interval);
        poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                maybe_cmd = rx.recv() => {
                    match maybe_cmd {
                        Some(EngineCommand::Shutdown) => {
                            debug!("run: Shutdown command");
                            info!("SyncEngine shutting down");
                            break;
                        }
                        Some(cmd) => self.dispatch(cmd).await,
                        None => {
                            debug!("run: command channel closed");
                            break;
                        }
                    }
                }

                // Fallback polling keeps the unread badge fresh
                _ = poll.tick(), if options.polling => {
                    self.poll_unread().await;
                }
            }
        }

        debug!("SyncEngine actor stopped");
    }

    async fn dispatch(&mut self, cmd: EngineCommand) {
        match cmd {
            // Conversation operations
            EngineCommand::SendMessage { text, reply } => {
                debug!(len = text.len(), "run: SendMessage command");
                let result = self.send_message(text).await;
                let _ = reply.send(result);
            }

            EngineCommand::LoadHistory { conversation_id, reply } => {
                debug!(conversation_id, "run: LoadHistory command");
                let result = self.load_history(conversation_id).await;
                let _ = reply.send(result);
            }

            EngineCommand::ListConversations { reply } => {
                debug!("run: ListConversations command");
                let result = self.api.conversations().await.map_err(EngineError::from);
                let _ = reply.send(result);
            }

            // Itinerary operations
            EngineCommand::CreateItinerary { request, reply } => {
                debug!(destination = %request.destination, "run: CreateItinerary command");
                let result = self.create_itinerary(request).await;
                let _ = reply.send(result);
            }

            EngineCommand::OpenItinerary { id, reply } => {
                debug!(id, "run: OpenItinerary command");
                let result = self.open_itinerary(id).await;
                let _ = reply.send(result);
            }

            EngineCommand::ReviseItinerary { instructions, reply } => {
                debug!(len = instructions.len(), "run: ReviseItinerary command");
                let result = self.revise_itinerary(instructions).await;
                let _ = reply.send(result);
            }

            EngineCommand::ListItineraries { reply } => {
                debug!("run: ListItineraries command");
                let result = self.api.itineraries().await.map_err(EngineError::from);
                let _ = reply.send(result);
            }

            // Progress operations
            EngineCommand::ToggleActivity { day, index, notes, reply } => {
                debug!(day, index, "run: ToggleActivity command");
                let result = self.toggle_activity(day, index, notes).await;
                let _ = reply.send(result);
            }

            EngineCommand::RefreshProgress { reply } => {
                debug!("run: RefreshProgress command");
                let result = self.refresh_progress().await;
                let _ = reply.send(result);
            }

            // Notification operations
            EngineCommand::ListNotifications { reply } => {
                debug!("run: ListNotifications command");
                let result = self.api.notifications().await.map_err(EngineError::from);
                let _ = reply.send(result);
            }

            EngineCommand::MarkNotificationRead { id, reply } => {
                debug!(id, "run: MarkNotificationRead command");
                let result = self.mark_notification_read(id).await;
                let _ = reply.send(result);
            }

            EngineCommand::UnreadCount { reply } => {
                debug!("run: UnreadCount command");
                let result = self.unread_count().await;
                let _ = reply.send(result);
            }

            // Introspection
            EngineCommand::Snapshot { reply } => {
                debug!("run: Snapshot command");
                let _ = reply.send(self.snapshot());
            }

            // Intercepted by the run loop before dispatch
            EngineCommand::Shutdown => {}
        }
    }

    /// Optimistic send: echo the message locally, then confirm or roll back
    async fn send_message(&mut self, text: String) -> EngineResponse<AssistantReply> {
        if text.trim().is_empty() {
            return Err(ValidationError::EmptyMessage.into());
        }

        let pending_id = self.conversation.push_pending(&text);
        if let Some(turn) = self.conversation.turns().last() {
            let _ = self.event_tx.send(EngineEvent::TurnAppended { turn: turn.clone() });
        }

        match self.api.send_message(&text, self.conversation.id()).await {
            Ok(chat) => {
                if self.conversation.adopt_id(chat.conversation_id) {
                    let _ = self.event_tx.send(EngineEvent::ConversationAdopted {
                        id: chat.conversation_id,
                    });
                }

                self.conversation.commit(&pending_id);
                let _ = self.event_tx.send(EngineEvent::TurnCommitted { id: pending_id });

                let reply = classify_reply(&chat);
                self.conversation.push_assistant(reply.display_text());
                if let Some(turn) = self.conversation.turns().last() {
                    let _ = self.event_tx.send(EngineEvent::TurnAppended { turn: turn.clone() });
                }
                let _ = self.event_tx.send(EngineEvent::AssistantReplied { reply: reply.clone() });

                Ok(reply)
            }
            Err(err) => {
                warn!(error = %err, "send_message: delivery failed, rolling back");
                if self.conversation.rollback(&pending_id) {
                    let _ = self.event_tx.send(EngineEvent::TurnRolledBack { id: pending_id });
                }
                Err(err.into())
            }
        }
    }

    /// Swap the transcript for server history
    async fn load_history(&mut self, conversation_id: ConversationId) -> EngineResponse<Vec<ChatTurn>> {
        let turns = self.api.conversation_messages(conversation_id).await?;
        self.conversation = Conversation::with_id(conversation_id);
        self.conversation.replace_history(turns);
        Ok(self.conversation.turns().to_vec())
    }

    /// Validate locally, generate remotely, then open the new itinerary
    async fn create_itinerary(&mut self, request: TripRequest) -> EngineResponse<ItineraryId> {
        request.validate()?;

        let created = self.api.create_itinerary(&request).await?;

        // Generation links a fresh conversation; switch to it
        self.conversation = Conversation::with_id(created.conversation_id);
        let _ = self.event_tx.send(EngineEvent::ConversationAdopted {
            id: created.conversation_id,
        });

        self.open_itinerary(created.itinerary_id).await?;
        Ok(created.itinerary_id)
    }

    /// Fetch an itinerary record and install it as the active plan
    async fn open_itinerary(&mut self, id: ItineraryId) -> EngineResponse<()> {
        let record = self.api.itinerary(id).await?;
        let version = self.planner.install(record)?;
        self.ledger.bind(id, version);
        let _ = self.event_tx.send(EngineEvent::PlanInstalled {
            itinerary_id: id,
            version,
        });

        // The plan is already usable; marks refill on the next refresh
        match self.api.progress(id).await {
            Ok(summary) => {
                self.ledger.absorb(summary.clone());
                let _ = self.event_tx.send(EngineEvent::ProgressChanged { summary });
            }
            Err(err) => {
                warn!(error = %err, id, "open_itinerary: progress prefetch failed");
            }
        }

        Ok(())
    }

    /// Send revision instructions and install the revised document
    async fn revise_itinerary(&mut self, instructions: String) -> EngineResponse<String> {
        let Some(id) = self.planner.active_id() else {
            return Err(EngineError::NoActiveItinerary);
        };
        if instructions.trim().is_empty() {
            return Err(ValidationError::EmptyRevision.into());
        }

        let updated = self.api.update_itinerary(id, &instructions).await?;
        let version = self.planner.apply_update(&updated.raw_plan)?;

        // The activity layout may have shifted; local marks are void
        self.ledger.bind(id, version);
        let _ = self.event_tx.send(EngineEvent::PlanInstalled {
            itinerary_id: id,
            version,
        });

        match self.api.progress(id).await {
            Ok(summary) => {
                self.ledger.absorb(summary.clone());
                let _ = self.event_tx.send(EngineEvent::ProgressChanged { summary });
            }
            Err(err) => {
                warn!(error = %err, id, "revise_itinerary: progress refresh failed");
            }
        }

        Ok(updated.message)
    }

    /// Flip one activity's completion mark against the active plan
    async fn toggle_activity(&mut self, day: u32, index: u32, notes: Option<String>) -> EngineResponse<ProgressSummary> {
        let Some(active) = self.planner.active() else {
            return Err(EngineError::NoActiveItinerary);
        };
        if active.plan.activity(day, index).is_none() {
            return Err(ValidationError::NoSuchActivity { day, index }.into());
        }
        let id = active.record.id;

        let update = ProgressUpdate {
            itinerary_id: id,
            day,
            activity_index: index,
            completed: !self.ledger.completed(day, index),
            notes,
        };
        self.api.set_progress(&update).await?;

        let summary = self.api.progress(id).await?;
        self.ledger.absorb(summary.clone());
        let _ = self.event_tx.send(EngineEvent::ProgressChanged {
            summary: summary.clone(),
        });
        Ok(summary)
    }

    /// Refetch completion state for the active itinerary
    async fn refresh_progress(&mut self) -> EngineResponse<ProgressSummary> {
        let Some(id) = self.planner.active_id() else {
            return Err(EngineError::NoActiveItinerary);
        };

        let summary = self.api.progress(id).await?;
        self.ledger.absorb(summary.clone());
        let _ = self.event_tx.send(EngineEvent::ProgressChanged {
            summary: summary.clone(),
        });
        Ok(summary)
    }

    /// Mark one notification read, then refresh the stale badge
    async fn mark_notification_read(&mut self, id: NotificationId) -> EngineResponse<()> {
        self.api.mark_read(id).await?;

        match self.api.unread_count().await {
            Ok(count) => self.note_unread(count),
            Err(err) => debug!(error = %err, "mark_notification_read: unread refresh failed"),
        }
        Ok(())
    }

    /// Fetch the unread count on demand
    async fn unread_count(&mut self) -> EngineResponse<u32> {
        let count = self.api.unread_count().await?;
        self.note_unread(count);
        Ok(count)
    }

    /// Timed poll for the unread badge; failures stay quiet
    async fn poll_unread(&mut self) {
        match self.api.unread_count().await {
            Ok(count) => self.note_unread(count),
            Err(err) => debug!(error = %err, "poll_unread: fetch failed"),
        }
    }

    /// Record a fresh unread count, broadcasting only on change
    fn note_unread(&mut self, count: u32) {
        if self.unread != Some(count) {
            debug!(count, "note_unread: count changed");
            self.unread = Some(count);
            let _ = self.event_tx.send(EngineEvent::UnreadChanged { count });
        }
    }

    fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            conversation_id: self.conversation.id(),
            turns: self.conversation.turns().to_vec(),
            plan: self.planner.active().cloned(),
            progress: self.ledger.summary().cloned(),
            unread: self.unread,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Delivery, ProgressEntry, Role};
    use crate::remote::api::mock::MockTravelApi;
    use crate::remote::{ChatReply, CreatedItinerary, RemoteError, UpdatedItinerary};
    use chrono::{NaiveDate, Utc};

    const PLAN_DOC: &str = r#"{
        "destination": "Lisbon",
        "duration": "2 days",
        "days": [
            {
                "day": 1,
                "date": "2099-06-01",
                "activities": [
                    {"time": "09:00", "activity": "Tram 28 loop", "cost": 3.0},
                    {"time": "13:00", "activity": "Time Out Market", "cost": 25.0}
                ]
            },
            {
                "day": 2,
                "date": "2099-06-02",
                "activities": [
                    {"time": "10:00", "activity": "Belem Tower", "cost": 15.0}
                ]
            }
        ]
    }"#;

    const REVISED_DOC: &str = r#"{
        "destination": "Lisbon and Sintra",
        "duration": "2 days",
        "days": [
            {
                "day": 1,
                "date": "2099-06-01",
                "activities": [
                    {"time": "09:00", "activity": "Pena Palace", "cost": 20.0}
                ]
            }
        ]
    }"#;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn chat(conversation_id: i64, response: &str) -> ChatReply {
        ChatReply {
            conversation_id,
            response: response.to_string(),
            query_rejected: false,
        }
    }

    fn record(id: i64) -> crate::domain::ItineraryRecord {
        crate::domain::ItineraryRecord {
            id,
            title: "Lisbon Getaway".to_string(),
            destination: "Lisbon".to_string(),
            start_date: date("2099-06-01"),
            end_date: date("2099-06-03"),
            budget: Some(800.0),
            itinerary_data: PLAN_DOC.to_string(),
            created_at: Utc::now(),
            is_group: false,
            group_id: None,
        }
    }

    fn trip() -> TripRequest {
        TripRequest::new("Lisbon", date("2099-06-01"), date("2099-06-04"))
    }

    fn spawn_engine(mock: &Arc<MockTravelApi>) -> SyncEngine {
        SyncEngine::spawn(
            mock.clone(),
            EngineOptions {
                poll_interval: Duration::from_secs(3600),
                polling: false,
            },
        )
    }

    async fn open_lisbon(engine: &SyncEngine, mock: &Arc<MockTravelApi>) {
        mock.push_itinerary(Ok(record(3)));
        mock.push_progress(Ok(ProgressSummary::empty(3, 3)));
        engine.open_itinerary(3).await.unwrap();
    }

    // === POSITIVE TESTS: optimistic send ===

    #[tokio::test]
    async fn test_send_message_commits_on_success() {
        let mock = Arc::new(MockTravelApi::new());
        mock.push_chat(Ok(chat(7, "Sounds like a great trip!")));
        let engine = spawn_engine(&mock);

        let reply = engine.send_message("two days in Lisbon").await.unwrap();
        assert_eq!(reply, AssistantReply::Text("Sounds like a great trip!".to_string()));

        let snap = engine.snapshot().await.unwrap();
        assert_eq!(snap.conversation_id, Some(7));
        assert_eq!(snap.turns.len(), 2);
        assert_eq!(snap.turns[0].role, Role::User);
        assert_eq!(snap.turns[0].delivery, Delivery::Committed);
        assert_eq!(snap.turns[1].role, Role::Assistant);

        engine.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_send_message_rolls_back_on_failure() {
        let mock = Arc::new(MockTravelApi::new());
        mock.push_chat(Err(RemoteError::Timeout(Duration::from_secs(30))));
        let engine = spawn_engine(&mock);

        let err = engine.send_message("hello?").await.unwrap_err();
        assert!(err.is_remote());

        // The optimistic echo is gone and no id was adopted
        let snap = engine.snapshot().await.unwrap();
        assert!(snap.turns.is_empty());
        assert_eq!(snap.conversation_id, None);

        engine.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_send_rejected_reply_keeps_both_turns() {
        let mock = Arc::new(MockTravelApi::new());
        mock.push_chat(Ok(ChatReply {
            conversation_id: 7,
            response: "I can only help with travel planning.".to_string(),
            query_rejected: true,
        }));
        let engine = spawn_engine(&mock);

        let reply = engine.send_message("write me a poem").await.unwrap();
        assert!(reply.is_rejected());

        // A rejection is a delivered answer, not a failure
        let snap = engine.snapshot().await.unwrap();
        assert_eq!(snap.turns.len(), 2);
        assert_eq!(snap.turns[0].delivery, Delivery::Committed);

        engine.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_send_structured_reply_carries_the_plan() {
        let mock = Arc::new(MockTravelApi::new());
        let body = format!(r#"{{"message": "Here is your itinerary!", "itinerary": {PLAN_DOC}}}"#);
        mock.push_chat(Ok(chat(7, &body)));
        let engine = spawn_engine(&mock);

        let reply = engine.send_message("plan lisbon").await.unwrap();
        assert!(reply.is_structured());
        assert_eq!(reply.display_text(), "Here is your itinerary!");

        // The transcript shows the prose, not the raw JSON
        let snap = engine.snapshot().await.unwrap();
        assert_eq!(snap.turns[1].content, "Here is your itinerary!");

        engine.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_send_empty_message_never_reaches_the_wire() {
        let mock = Arc::new(MockTravelApi::new());
        let engine = spawn_engine(&mock);

        let err = engine.send_message("   ").await.unwrap_err();
        assert!(err.is_validation());
        assert!(mock.calls().is_empty());

        let snap = engine.snapshot().await.unwrap();
        assert!(snap.turns.is_empty());

        engine.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_conversation_id_adopted_once() {
        let mock = Arc::new(MockTravelApi::new());
        mock.push_chat(Ok(chat(7, "first")));
        mock.push_chat(Ok(chat(99, "second")));
        let engine = spawn_engine(&mock);

        engine.send_message("one").await.unwrap();
        engine.send_message("two").await.unwrap();

        // The second send carried the adopted id; the offered 99 was ignored
        let sent = mock.sent_messages();
        assert_eq!(sent[0].1, None);
        assert_eq!(sent[1].1, Some(7));

        let snap = engine.snapshot().await.unwrap();
        assert_eq!(snap.conversation_id, Some(7));

        engine.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_send_event_sequence() {
        let mock = Arc::new(MockTravelApi::new());
        mock.push_chat(Ok(chat(7, "hello!")));
        let engine = spawn_engine(&mock);
        let mut events = engine.subscribe_events();

        engine.send_message("hi").await.unwrap();

        let appended = events.try_recv().unwrap();
        let EngineEvent::TurnAppended { turn } = appended else {
            panic!("expected TurnAppended, got {appended:?}");
        };
        assert!(turn.is_pending());
        let pending_id = turn.id;

        assert!(matches!(events.try_recv().unwrap(), EngineEvent::ConversationAdopted { id: 7 }));
        assert!(matches!(events.try_recv().unwrap(), EngineEvent::TurnCommitted { id } if id == pending_id));
        assert!(matches!(events.try_recv().unwrap(), EngineEvent::TurnAppended { .. }));
        assert!(matches!(events.try_recv().unwrap(), EngineEvent::AssistantReplied { .. }));

        engine.shutdown().await.unwrap();
    }

    // === POSITIVE TESTS: history ===

    #[tokio::test]
    async fn test_load_history_replaces_transcript() {
        let mock = Arc::new(MockTravelApi::new());
        mock.push_chat(Ok(chat(7, "old conversation")));
        mock.push_history(Ok(vec![
            ChatTurn::from_history(1, Role::User, "hi", Utc::now()),
            ChatTurn::from_history(2, Role::Assistant, "hello!", Utc::now()),
        ]));
        let engine = spawn_engine(&mock);

        engine.send_message("start").await.unwrap();
        let turns = engine.load_history(9).await.unwrap();
        assert_eq!(turns.len(), 2);

        let snap = engine.snapshot().await.unwrap();
        assert_eq!(snap.conversation_id, Some(9));
        assert_eq!(snap.turns.len(), 2);

        engine.shutdown().await.unwrap();
    }

    // === POSITIVE TESTS: itinerary lifecycle ===

    #[tokio::test]
    async fn test_create_itinerary_opens_the_plan() {
        let mock = Arc::new(MockTravelApi::new());
        mock.push_creation(Ok(CreatedItinerary {
            itinerary_id: 3,
            conversation_id: 12,
            raw_plan: PLAN_DOC.to_string(),
        }));
        mock.push_itinerary(Ok(record(3)));
        mock.push_progress(Ok(ProgressSummary::empty(3, 3)));
        let engine = spawn_engine(&mock);

        let id = engine.create_itinerary(trip()).await.unwrap();
        assert_eq!(id, 3);

        let snap = engine.snapshot().await.unwrap();
        assert_eq!(snap.conversation_id, Some(12));
        let plan = snap.plan.unwrap();
        assert_eq!(plan.record.id, 3);
        assert_eq!(plan.version, 1);
        assert_eq!(plan.plan.total_activities(), 3);
        assert_eq!(snap.progress.unwrap().total_activities, 3);

        engine.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_create_itinerary_validates_before_the_wire() {
        let mock = Arc::new(MockTravelApi::new());
        let engine = spawn_engine(&mock);

        let mut request = trip();
        request.destination = " ".to_string();
        let err = engine.create_itinerary(request).await.unwrap_err();
        assert!(err.is_validation());
        assert!(mock.calls().is_empty());

        engine.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_open_survives_progress_fetch_failure() {
        let mock = Arc::new(MockTravelApi::new());
        mock.push_itinerary(Ok(record(3)));
        mock.push_progress(Err(RemoteError::Api {
            status: 500,
            message: "boom".to_string(),
        }));
        let engine = spawn_engine(&mock);

        engine.open_itinerary(3).await.unwrap();

        let snap = engine.snapshot().await.unwrap();
        assert!(snap.plan.is_some());
        assert!(snap.progress.is_none());

        engine.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_revise_itinerary_installs_the_new_document() {
        let mock = Arc::new(MockTravelApi::new());
        let engine = spawn_engine(&mock);
        open_lisbon(&engine, &mock).await;

        mock.push_update(Ok(UpdatedItinerary {
            message: "Swapped day one for Sintra.".to_string(),
            raw_plan: REVISED_DOC.to_string(),
        }));
        mock.push_progress(Ok(ProgressSummary::empty(3, 1)));

        let message = engine.revise_itinerary("add a day trip to Sintra").await.unwrap();
        assert_eq!(message, "Swapped day one for Sintra.");
        assert_eq!(mock.sent_updates(), vec![(3, "add a day trip to Sintra".to_string())]);

        let snap = engine.snapshot().await.unwrap();
        let plan = snap.plan.unwrap();
        assert_eq!(plan.version, 2);
        assert_eq!(plan.plan.destination, "Lisbon and Sintra");

        engine.shutdown().await.unwrap();
    }

    // === NEGATIVE TESTS: revision guards ===

    #[tokio::test]
    async fn test_revise_requires_an_open_itinerary() {
        let mock = Arc::new(MockTravelApi::new());
        let engine = spawn_engine(&mock);

        let err = engine.revise_itinerary("anything").await.unwrap_err();
        assert!(matches!(err, EngineError::NoActiveItinerary));
        assert!(mock.calls().is_empty());

        engine.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_revise_rejects_empty_instructions() {
        let mock = Arc::new(MockTravelApi::new());
        let engine = spawn_engine(&mock);
        open_lisbon(&engine, &mock).await;

        let err = engine.revise_itinerary("  ").await.unwrap_err();
        assert!(err.is_validation());
        assert!(mock.sent_updates().is_empty());

        engine.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_revise_keeps_prior_plan_on_bad_document() {
        let mock = Arc::new(MockTravelApi::new());
        let engine = spawn_engine(&mock);
        open_lisbon(&engine, &mock).await;

        mock.push_update(Ok(UpdatedItinerary {
            message: "done".to_string(),
            raw_plan: "The new plan is great!".to_string(),
        }));

        let err = engine.revise_itinerary("make it better").await.unwrap_err();
        assert!(matches!(err, EngineError::Plan(_)));

        // The previous document and its progress remain in place
        let snap = engine.snapshot().await.unwrap();
        let plan = snap.plan.unwrap();
        assert_eq!(plan.version, 1);
        assert_eq!(plan.plan.destination, "Lisbon");
        assert!(snap.progress.is_some());

        engine.shutdown().await.unwrap();
    }

    // === POSITIVE TESTS: progress ===

    #[tokio::test]
    async fn test_toggle_activity_flips_and_absorbs() {
        let mock = Arc::new(MockTravelApi::new());
        let engine = spawn_engine(&mock);
        open_lisbon(&engine, &mock).await;

        mock.push_progress_write(Ok(()));
        mock.push_progress(Ok(ProgressSummary {
            itinerary_id: 3,
            total_activities: 3,
            completed_activities: 1,
            completion_percentage: 33,
            entries: vec![ProgressEntry {
                day: 1,
                activity_index: 0,
                completed: true,
                notes: None,
                completed_at: Some(Utc::now()),
            }],
        }));

        let summary = engine.toggle_activity(1, 0, None).await.unwrap();
        assert_eq!(summary.completion_percentage, 33);

        // The slot was unmarked, so the toggle sent completed = true
        let sent = mock.sent_progress();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].completed);
        assert_eq!(sent[0].day, 1);
        assert_eq!(sent[0].activity_index, 0);

        engine.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_toggle_completed_activity_unmarks_it() {
        let mock = Arc::new(MockTravelApi::new());
        mock.push_itinerary(Ok(record(3)));
        mock.push_progress(Ok(ProgressSummary {
            itinerary_id: 3,
            total_activities: 3,
            completed_activities: 1,
            completion_percentage: 33,
            entries: vec![ProgressEntry {
                day: 1,
                activity_index: 0,
                completed: true,
                notes: None,
                completed_at: Some(Utc::now()),
            }],
        }));
        let engine = spawn_engine(&mock);
        engine.open_itinerary(3).await.unwrap();

        mock.push_progress_write(Ok(()));
        mock.push_progress(Ok(ProgressSummary::empty(3, 3)));

        engine.toggle_activity(1, 0, None).await.unwrap();
        assert!(!mock.sent_progress()[0].completed);

        engine.shutdown().await.unwrap();
    }

    // === NEGATIVE TESTS: progress guards ===

    #[tokio::test]
    async fn test_toggle_unknown_activity_is_a_local_error() {
        let mock = Arc::new(MockTravelApi::new());
        let engine = spawn_engine(&mock);
        open_lisbon(&engine, &mock).await;

        let err = engine.toggle_activity(1, 9, None).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation(ValidationError::NoSuchActivity { day: 1, index: 9 })
        ));
        assert!(mock.sent_progress().is_empty());

        engine.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_toggle_requires_an_open_itinerary() {
        let mock = Arc::new(MockTravelApi::new());
        let engine = spawn_engine(&mock);

        let err = engine.toggle_activity(1, 0, None).await.unwrap_err();
        assert!(matches!(err, EngineError::NoActiveItinerary));

        engine.shutdown().await.unwrap();
    }

    // === POSITIVE TESTS: notifications ===

    #[tokio::test]
    async fn test_unread_count_broadcasts_only_on_change() {
        let mock = Arc::new(MockTravelApi::new());
        mock.push_unread_count(Ok(2));
        mock.push_unread_count(Ok(2));
        mock.push_unread_count(Ok(5));
        let engine = spawn_engine(&mock);
        let mut events = engine.subscribe_events();

        assert_eq!(engine.unread_count().await.unwrap(), 2);
        assert!(matches!(events.try_recv().unwrap(), EngineEvent::UnreadChanged { count: 2 }));

        // Same count again stays quiet
        assert_eq!(engine.unread_count().await.unwrap(), 2);
        assert!(events.try_recv().is_err());

        assert_eq!(engine.unread_count().await.unwrap(), 5);
        assert!(matches!(events.try_recv().unwrap(), EngineEvent::UnreadChanged { count: 5 }));

        engine.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_mark_read_refreshes_the_badge() {
        let mock = Arc::new(MockTravelApi::new());
        mock.push_mark_read(Ok(()));
        mock.push_unread_count(Ok(0));
        let engine = spawn_engine(&mock);

        engine.mark_notification_read(4).await.unwrap();

        let snap = engine.snapshot().await.unwrap();
        assert_eq!(snap.unread, Some(0));

        engine.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_polling_broadcasts_unread_changes() {
        let mock = Arc::new(MockTravelApi::new());
        let engine = SyncEngine::spawn(
            mock.clone(),
            EngineOptions {
                poll_interval: Duration::from_millis(10),
                polling: true,
            },
        );
        let mut events = engine.subscribe_events();

        // Ticks before this land on an empty script and stay silent
        mock.push_unread_count(Ok(3));

        let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("a poll tick should fire well within the timeout")
            .unwrap();
        assert!(matches!(event, EngineEvent::UnreadChanged { count: 3 }));

        engine.shutdown().await.unwrap();
    }

    // === POSITIVE TESTS: listings ===

    #[tokio::test]
    async fn test_listing_passthroughs() {
        let mock = Arc::new(MockTravelApi::new());
        mock.push_conversations(Ok(vec![ConversationSummary {
            id: 7,
            title: Some("Lisbon".to_string()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }]));
        mock.push_itineraries(Ok(vec![]));
        mock.push_notifications(Ok(vec![]));
        let engine = spawn_engine(&mock);

        assert_eq!(engine.conversations().await.unwrap().len(), 1);
        assert!(engine.itineraries().await.unwrap().is_empty());
        assert!(engine.notifications().await.unwrap().is_empty());

        engine.shutdown().await.unwrap();
    }

    // === NEGATIVE TESTS: lifecycle ===

    #[tokio::test]
    async fn test_commands_after_shutdown_fail_with_channel_error() {
        let mock = Arc::new(MockTravelApi::new());
        let engine = spawn_engine(&mock);

        engine.shutdown().await.unwrap();

        let err = engine.send_message("anyone there?").await.unwrap_err();
        assert!(matches!(err, EngineError::ChannelError));
    }
}
