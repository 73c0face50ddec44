//! HTTP travel API client
//!
//! Implements the TravelApi trait against the travel server's REST API with
//! bounded retries for transient failures. Generation endpoints (create and
//! revise) block on the server's model call, so they get a longer timeout and
//! are never retried; everything else retries with exponential backoff.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::{ChatReply, CreatedItinerary, RemoteError, SessionContext, TravelApi, UpdatedItinerary};
use crate::config::RemoteConfig;
use crate::domain::{
    ChatTurn, ConversationId, ConversationSummary, ItineraryId, ItineraryRecord, ItinerarySummary, Notification,
    NotificationId, ProgressEntry, ProgressSummary, ProgressUpdate, Role, TripRequest,
};
use crate::remote::session::{AuthSession, UserProfile};

/// Default per-request timeout
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default timeout for generation endpoints
const DEFAULT_GENERATION_TIMEOUT_SECS: u64 = 180;

/// Default maximum number of retries for transient errors
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Initial backoff delay for retries
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Check if an HTTP status code is retryable
fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
}

/// Authenticate and obtain a session
///
/// Standalone because every other operation requires a [`SessionContext`],
/// which only login can produce.
pub async fn login(base_url: &str, username: &str, password: &str) -> Result<AuthSession, RemoteError> {
    debug!(%username, "login: called");
    let http = Client::builder().timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS)).build()?;
    let url = format!("{}/auth/login", base_url.trim_end_matches('/'));
    let body = serde_json::json!({ "username": username, "password": password });

    let response = http.post(&url).json(&body).send().await?;
    let status = response.status().as_u16();

    if status == 401 || status == 403 {
        debug!(status, "login: rejected");
        return Err(RemoteError::Auth { status });
    }
    if !response.status().is_success() {
        let text = response.text().await.unwrap_or_default();
        debug!(status, "login: API error");
        return Err(RemoteError::Api { status, message: text });
    }

    let wire: LoginWire = response.json().await?;
    debug!(user_id = wire.user.id, "login: success");
    Ok(AuthSession {
        token: wire.access_token,
        user: UserProfile {
            id: wire.user.id,
            email: wire.user.email,
            username: wire.user.username,
            full_name: wire.user.full_name,
        },
    })
}

/// Travel API client over HTTP
pub struct HttpTravelApi {
    base_url: String,
    session: SessionContext,
    http: Client,
    timeout: Duration,
    generation_timeout: Duration,
    max_retries: u32,
}

impl HttpTravelApi {
    /// Create a client with default timeouts and retries
    pub fn new(base_url: impl Into<String>, session: SessionContext) -> Result<Self, RemoteError> {
        let base_url = base_url.into();
        debug!(%base_url, "HttpTravelApi::new: called");
        let timeout = Duration::from_secs(DEFAULT_TIMEOUT_SECS);
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
            http,
            timeout,
            generation_timeout: Duration::from_secs(DEFAULT_GENERATION_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
        })
    }

    /// Create a client from configuration
    pub fn from_config(config: &RemoteConfig, session: SessionContext) -> Result<Self, RemoteError> {
        debug!(base_url = %config.base_url, "HttpTravelApi::from_config: called");
        let timeout = Duration::from_secs(config.timeout_secs);
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            session,
            http,
            timeout,
            generation_timeout: Duration::from_secs(config.generation_timeout_secs),
            max_retries: config.max_retries,
        })
    }

    /// Issue a request with bounded retries for transient failures
    ///
    /// 401/403 and 429 return immediately; other retryable statuses and
    /// network errors back off exponentially up to `max_retries`.
    async fn request<T: serde::de::DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<T, RemoteError> {
        let url = format!("{}{}", self.base_url, path);
        let mut last_error = None;

        for attempt in 0..=max_retries {
            if attempt > 0 {
                let backoff = INITIAL_BACKOFF_MS * 2u64.pow(attempt - 1);
                warn!(attempt, backoff_ms = backoff, %url, "request: retrying after transient error");
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }

            let mut builder = self
                .http
                .request(method.clone(), &url)
                .header("Authorization", format!("Bearer {}", self.session.token()))
                .timeout(timeout);
            if let Some(ref body) = body {
                builder = builder.json(body);
            }

            let response = match builder.send().await {
                Ok(r) => r,
                Err(e) if e.is_timeout() => {
                    debug!(attempt, %url, "request: timed out");
                    last_error = Some(RemoteError::Timeout(timeout));
                    continue;
                }
                Err(e) => {
                    debug!(attempt, error = %e, "request: network error");
                    last_error = Some(RemoteError::Network(e));
                    continue;
                }
            };

            let status = response.status().as_u16();

            if status == 401 || status == 403 {
                debug!(status, "request: authentication failed");
                return Err(RemoteError::Auth { status });
            }

            if status == 429 {
                debug!("request: rate limited (429)");
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(60);

                return Err(RemoteError::RateLimited {
                    retry_after: Duration::from_secs(retry_after),
                });
            }

            if is_retryable_status(status) && attempt < max_retries {
                let text = response.text().await.unwrap_or_default();
                debug!(attempt, status, "request: retryable error");
                last_error = Some(RemoteError::Api { status, message: text });
                continue;
            }

            if !response.status().is_success() {
                let text = response.text().await.unwrap_or_default();
                debug!(status, "request: API error");
                return Err(RemoteError::Api { status, message: text });
            }

            debug!(status, %url, "request: success");
            return Ok(response.json::<T>().await?);
        }

        Err(last_error.unwrap_or_else(|| RemoteError::InvalidResponse("Max retries exceeded".to_string())))
    }
}

#[async_trait]
impl TravelApi for HttpTravelApi {
    async fn send_message(
        &self,
        message: &str,
        conversation_id: Option<ConversationId>,
    ) -> Result<ChatReply, RemoteError> {
        debug!(?conversation_id, "send_message: called");
        let body = serde_json::json!({
            "message": message,
            "conversation_id": conversation_id,
        });
        let wire: ChatWire = self
            .request(Method::POST, "/chat", Some(body), self.timeout, self.max_retries)
            .await?;
        Ok(ChatReply {
            conversation_id: wire.conversation_id,
            response: wire.response,
            query_rejected: wire.query_rejected,
        })
    }

    async fn conversation_messages(&self, conversation_id: ConversationId) -> Result<Vec<ChatTurn>, RemoteError> {
        debug!(conversation_id, "conversation_messages: called");
        let rows: Vec<MessageRow> = self
            .request(
                Method::GET,
                &format!("/conversation/{conversation_id}/messages"),
                None,
                self.timeout,
                self.max_retries,
            )
            .await?;
        rows.into_iter().map(turn_from_row).collect()
    }

    async fn conversations(&self) -> Result<Vec<ConversationSummary>, RemoteError> {
        debug!("conversations: called");
        let rows: Vec<ConversationRow> = self
            .request(Method::GET, "/conversations", None, self.timeout, self.max_retries)
            .await?;
        rows.into_iter()
            .map(|row| {
                Ok(ConversationSummary {
                    id: row.id,
                    title: row.title,
                    created_at: parse_server_time(&row.created_at)?,
                    updated_at: parse_server_time(&row.updated_at)?,
                })
            })
            .collect()
    }

    async fn create_itinerary(&self, request: &TripRequest) -> Result<CreatedItinerary, RemoteError> {
        debug!(destination = %request.destination, "create_itinerary: called");
        let body = serde_json::json!({
            "destination": request.destination,
            "start_date": request.start_date,
            "end_date": request.end_date,
            "budget": request.budget,
            "travelers": request.travelers,
            "preferences": request.preferences,
        });
        // Generation is slow and not idempotent; wait longer, never retry
        let wire: CreateWire = self
            .request(Method::POST, "/itinerary/create", Some(body), self.generation_timeout, 0)
            .await?;
        Ok(CreatedItinerary {
            itinerary_id: wire.itinerary_id,
            conversation_id: wire.conversation_id,
            raw_plan: wire.itinerary,
        })
    }

    async fn itineraries(&self) -> Result<Vec<ItinerarySummary>, RemoteError> {
        debug!("itineraries: called");
        let rows: Vec<ItineraryRow> = self
            .request(Method::GET, "/itineraries", None, self.timeout, self.max_retries)
            .await?;
        rows.into_iter()
            .map(|row| {
                Ok(ItinerarySummary {
                    id: row.id,
                    title: row.title,
                    destination: row.destination,
                    start_date: row.start_date,
                    end_date: row.end_date,
                    budget: row.budget,
                    created_at: parse_server_time(&row.created_at)?,
                })
            })
            .collect()
    }

    async fn itinerary(&self, id: ItineraryId) -> Result<ItineraryRecord, RemoteError> {
        debug!(id, "itinerary: called");
        let wire: ItineraryDetailWire = self
            .request(
                Method::GET,
                &format!("/itinerary/{id}"),
                None,
                self.timeout,
                self.max_retries,
            )
            .await?;
        record_from_wire(wire)
    }

    async fn update_itinerary(&self, id: ItineraryId, instructions: &str) -> Result<UpdatedItinerary, RemoteError> {
        debug!(id, "update_itinerary: called");
        let body = serde_json::json!({
            "itinerary_id": id,
            "update_request": instructions,
        });
        // Revision re-runs the generation model; same policy as create
        let wire: UpdateWire = self
            .request(
                Method::PUT,
                &format!("/itinerary/{id}"),
                Some(body),
                self.generation_timeout,
                0,
            )
            .await?;
        Ok(UpdatedItinerary {
            message: wire.message,
            raw_plan: wire.itinerary,
        })
    }

    async fn progress(&self, itinerary_id: ItineraryId) -> Result<ProgressSummary, RemoteError> {
        debug!(itinerary_id, "progress: called");
        let wire: ProgressWire = self
            .request(
                Method::GET,
                &format!("/activity/progress/{itinerary_id}"),
                None,
                self.timeout,
                self.max_retries,
            )
            .await?;
        summary_from_wire(wire)
    }

    async fn set_progress(&self, update: &ProgressUpdate) -> Result<(), RemoteError> {
        debug!(
            itinerary_id = update.itinerary_id,
            day = update.day,
            activity_index = update.activity_index,
            completed = update.completed,
            "set_progress: called"
        );
        let body = serde_json::to_value(update)?;
        let _: AckWire = self
            .request(
                Method::POST,
                "/activity/progress",
                Some(body),
                self.timeout,
                self.max_retries,
            )
            .await?;
        Ok(())
    }

    async fn notifications(&self) -> Result<Vec<Notification>, RemoteError> {
        debug!("notifications: called");
        let rows: Vec<NotificationRow> = self
            .request(Method::GET, "/notifications", None, self.timeout, self.max_retries)
            .await?;
        rows.into_iter().map(notification_from_row).collect()
    }

    async fn unread_count(&self) -> Result<u32, RemoteError> {
        debug!("unread_count: called");
        let wire: CountWire = self
            .request(
                Method::GET,
                "/notifications/unread-count",
                None,
                self.timeout,
                self.max_retries,
            )
            .await?;
        Ok(wire.count)
    }

    async fn mark_read(&self, id: NotificationId) -> Result<(), RemoteError> {
        debug!(id, "mark_read: called");
        let _: AckWire = self
            .request(
                Method::POST,
                &format!("/notifications/{id}/read"),
                None,
                self.timeout,
                self.max_retries,
            )
            .await?;
        Ok(())
    }
}

/// Parse the server's timestamp formats
///
/// The server emits naive ISO timestamps (no offset) and treats them as UTC;
/// RFC 3339 is accepted too in case that ever changes.
fn parse_server_time(raw: &str) -> Result<DateTime<Utc>, RemoteError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(naive.and_utc());
        }
    }
    Err(RemoteError::InvalidResponse(format!("Unparseable timestamp: {raw}")))
}

fn turn_from_row(row: MessageRow) -> Result<ChatTurn, RemoteError> {
    let role = row.role.parse::<Role>().map_err(RemoteError::InvalidResponse)?;
    Ok(ChatTurn::from_history(
        row.id,
        role,
        row.content,
        parse_server_time(&row.created_at)?,
    ))
}

fn record_from_wire(wire: ItineraryDetailWire) -> Result<ItineraryRecord, RemoteError> {
    Ok(ItineraryRecord {
        id: wire.id,
        title: wire.title,
        destination: wire.destination,
        start_date: wire.start_date,
        end_date: wire.end_date,
        budget: wire.budget,
        itinerary_data: wire.itinerary_data,
        created_at: parse_server_time(&wire.created_at)?,
        is_group: wire.is_group != 0,
        group_id: wire.group_id,
    })
}

fn summary_from_wire(wire: ProgressWire) -> Result<ProgressSummary, RemoteError> {
    let entries = wire
        .progress_details
        .into_iter()
        .map(|detail| {
            Ok(ProgressEntry {
                day: detail.day,
                activity_index: detail.activity_index,
                completed: detail.completed,
                notes: detail.notes,
                completed_at: detail.completed_at.as_deref().map(parse_server_time).transpose()?,
            })
        })
        .collect::<Result<Vec<_>, RemoteError>>()?;
    Ok(ProgressSummary {
        itinerary_id: wire.itinerary_id,
        total_activities: wire.total_activities,
        completed_activities: wire.completed_activities,
        completion_percentage: wire.progress_percentage.round() as u8,
        entries,
    })
}

fn notification_from_row(row: NotificationRow) -> Result<Notification, RemoteError> {
    Ok(Notification {
        id: row.id,
        kind: row.kind,
        title: row.title,
        message: row.message,
        status: row.status,
        created_at: parse_server_time(&row.created_at)?,
        read_at: row.read_at.as_deref().map(parse_server_time).transpose()?,
    })
}

// Wire format structs for the travel server API

#[derive(Debug, Deserialize)]
struct LoginWire {
    access_token: String,
    #[allow(dead_code)]
    token_type: String,
    user: UserWire,
}

#[derive(Debug, Deserialize)]
struct UserWire {
    id: i64,
    email: String,
    username: String,
    full_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatWire {
    conversation_id: i64,
    response: String,
    #[serde(default)]
    query_rejected: bool,
}

#[derive(Debug, Deserialize)]
struct ConversationRow {
    id: i64,
    title: Option<String>,
    created_at: String,
    updated_at: String,
}

#[derive(Debug, Deserialize)]
struct MessageRow {
    id: i64,
    content: String,
    role: String,
    created_at: String,
}

#[derive(Debug, Deserialize)]
struct CreateWire {
    itinerary_id: i64,
    conversation_id: i64,
    itinerary: String,
}

#[derive(Debug, Deserialize)]
struct ItineraryRow {
    id: i64,
    title: String,
    destination: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    budget: Option<f64>,
    created_at: String,
}

#[derive(Debug, Deserialize)]
struct ItineraryDetailWire {
    id: i64,
    title: String,
    destination: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    budget: Option<f64>,
    itinerary_data: String,
    created_at: String,
    #[serde(default)]
    is_group: i64,
    #[serde(default)]
    group_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct UpdateWire {
    message: String,
    itinerary: String,
}

#[derive(Debug, Deserialize)]
struct ProgressWire {
    itinerary_id: i64,
    total_activities: u32,
    completed_activities: u32,
    progress_percentage: f64,
    progress_details: Vec<ProgressDetailWire>,
}

#[derive(Debug, Deserialize)]
struct ProgressDetailWire {
    day: u32,
    activity_index: u32,
    completed: bool,
    notes: Option<String>,
    completed_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NotificationRow {
    id: i64,
    #[serde(rename = "type")]
    kind: String,
    title: String,
    message: String,
    status: String,
    created_at: String,
    read_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CountWire {
    count: u32,
}

#[derive(Debug, Deserialize)]
struct AckWire {
    #[allow(dead_code)]
    message: String,
}
