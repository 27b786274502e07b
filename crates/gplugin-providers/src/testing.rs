//! In-process stand-in for the Google endpoints the gateway uses.
//!
//! Serves the OAuth token endpoint, Calendar v3, Gmail v1 and People v1 on
//! `127.0.0.1:0`, backed by in-memory state the test can seed and inspect.
//! Point a [`GoogleConfig`](crate::google::GoogleConfig) at it with
//! [`MockGoogle::endpoints`].

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::extract::{Form, Path, Query, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::{Value, json};
use tokio::task::JoinHandle;

use crate::google::GoogleEndpoints;

type MockResult = Result<Json<Value>, (StatusCode, Json<Value>)>;

/// A Gmail message held by the mock.
#[derive(Debug, Clone)]
pub struct MockMessage {
    pub id: String,
    pub thread_id: String,
    pub label_ids: Vec<String>,
    pub headers: Vec<(String, String)>,
    pub snippet: String,
}

impl MockMessage {
    pub fn new(id: impl Into<String>, thread_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            thread_id: thread_id.into(),
            label_ids: vec!["INBOX".to_string()],
            headers: Vec::new(),
            snippet: String::new(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn labels(mut self, labels: &[&str]) -> Self {
        self.label_ids = labels.iter().map(|l| l.to_string()).collect();
        self
    }

    fn to_full(&self) -> Value {
        let headers: Vec<Value> = self
            .headers
            .iter()
            .map(|(name, value)| json!({"name": name, "value": value}))
            .collect();
        json!({
            "id": self.id,
            "threadId": self.thread_id,
            "labelIds": self.label_ids,
            "snippet": self.snippet,
            "payload": {"mimeType": "text/plain", "headers": headers},
        })
    }
}

/// A message received on `messages/send`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub id: String,
    pub thread_id: String,
    /// The decoded RFC 2822 text.
    pub raw: String,
}

#[derive(Debug, Default)]
struct Inner {
    next_id: u64,
    events: Vec<Value>,
    messages: Vec<MockMessage>,
    sent: Vec<SentMessage>,
    contacts: Vec<Value>,
    refresh_tokens: Vec<String>,
    token_requests: usize,
    event_updates: usize,
    last_authorization: Option<String>,
    last_events_query: Option<HashMap<String, String>>,
}

impl Inner {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }
}

#[derive(Debug, Clone, Default)]
struct Shared(Arc<Mutex<Inner>>);

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panicking handler only poisons test state.
        self.0.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Running mock server. Aborted on drop.
#[derive(Debug)]
pub struct MockGoogle {
    addr: SocketAddr,
    state: Shared,
    task: JoinHandle<()>,
}

impl MockGoogle {
    pub async fn start() -> std::io::Result<Self> {
        let state = Shared::default();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let app = router(state.clone());
        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Ok(Self { addr, state, task })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn endpoints(&self) -> GoogleEndpoints {
        GoogleEndpoints::with_base(&self.base_url())
    }

    /// Seeds a calendar event; `start`/`end` use `dateTime` unless they are
    /// plain dates.
    pub fn add_event(&self, summary: &str, start: &str, end: &str) -> String {
        let mut inner = self.state.lock();
        let id = inner.next_id("evt");
        let event = json!({
            "id": id,
            "status": "confirmed",
            "htmlLink": format!("https://calendar.google.com/event?eid={}", id),
            "summary": summary,
            "start": time_value(start),
            "end": time_value(end),
        });
        inner.events.push(event);
        id
    }

    pub fn event(&self, id: &str) -> Option<Value> {
        self.state
            .lock()
            .events
            .iter()
            .find(|e| e["id"] == id)
            .cloned()
    }

    pub fn add_message(&self, message: MockMessage) {
        self.state.lock().messages.push(message);
    }

    pub fn has_message(&self, id: &str) -> bool {
        self.state.lock().messages.iter().any(|m| m.id == id)
    }

    pub fn add_contact(&self, name: &str, email: &str) {
        let mut inner = self.state.lock();
        let resource = inner.next_id("people/c");
        inner.contacts.push(json!({
            "resourceName": resource,
            "names": [{"displayName": name}],
            "emailAddresses": [{"value": email}],
        }));
    }

    /// Makes the token endpoint accept `refresh_token` for refresh grants.
    pub fn accept_refresh_token(&self, refresh_token: &str) {
        self.state
            .lock()
            .refresh_tokens
            .push(refresh_token.to_string());
    }

    pub fn token_requests(&self) -> usize {
        self.state.lock().token_requests
    }

    /// Number of event PUTs that reached an existing event.
    pub fn event_updates(&self) -> usize {
        self.state.lock().event_updates
    }

    pub fn sent_messages(&self) -> Vec<SentMessage> {
        self.state.lock().sent.clone()
    }

    /// `Authorization` header of the last API (non-token) request.
    pub fn last_authorization(&self) -> Option<String> {
        self.state.lock().last_authorization.clone()
    }

    pub fn last_events_query(&self) -> Option<HashMap<String, String>> {
        self.state.lock().last_events_query.clone()
    }
}

impl Drop for MockGoogle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn router(state: Shared) -> Router {
    let api = Router::new()
        .route(
            "/calendar/v3/calendars/:calendar/events",
            get(list_events).post(insert_event),
        )
        .route(
            "/calendar/v3/calendars/:calendar/events/:event_id",
            get(get_event).put(update_event),
        )
        .route("/gmail/v1/users/me/labels", get(list_labels))
        .route("/gmail/v1/users/me/messages", get(list_messages))
        .route("/gmail/v1/users/me/messages/send", post(send_message))
        .route(
            "/gmail/v1/users/me/messages/:message_id",
            get(get_message).delete(delete_message),
        )
        .route("/v1/*method", get(people_method))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            record_authorization,
        ));

    Router::new()
        .route("/token", post(token))
        .merge(api)
        .with_state(state)
}

async fn record_authorization(State(state): State<Shared>, request: Request, next: Next) -> Response {
    let authorization = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    state.lock().last_authorization = authorization;
    next.run(request).await
}

fn google_error(status: StatusCode, message: &str) -> (StatusCode, Json<Value>) {
    (
        status,
        Json(json!({
            "error": {"code": status.as_u16(), "message": message, "status": status.canonical_reason()}
        })),
    )
}

fn time_value(value: &str) -> Value {
    if value.len() == 10 {
        json!({"date": value})
    } else {
        json!({"dateTime": value})
    }
}

fn event_start(event: &Value) -> String {
    event["start"]["dateTime"]
        .as_str()
        .or_else(|| event["start"]["date"].as_str())
        .unwrap_or_default()
        .to_string()
}

fn max_results(query: &HashMap<String, String>, key: &str) -> usize {
    query
        .get(key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(usize::MAX)
}

async fn token(State(state): State<Shared>, Form(form): Form<HashMap<String, String>>) -> Response {
    let mut inner = state.lock();
    inner.token_requests += 1;

    let accepted = match form.get("grant_type").map(String::as_str) {
        Some("refresh_token") => form
            .get("refresh_token")
            .is_some_and(|t| inner.refresh_tokens.contains(t)),
        Some("authorization_code") => form.contains_key("code") && form.contains_key("code_verifier"),
        _ => false,
    };

    if !accepted {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "invalid_grant", "error_description": "Token has been expired or revoked."})),
        )
            .into_response();
    }

    let n = inner.token_requests;
    Json(json!({
        "access_token": format!("ya29.mock-{}", n),
        "expires_in": 3599,
        "token_type": "Bearer",
    }))
    .into_response()
}

async fn list_events(
    State(state): State<Shared>,
    Path(_calendar): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> MockResult {
    let mut inner = state.lock();
    let time_min = query.get("timeMin").cloned().unwrap_or_default();
    let limit = max_results(&query, "maxResults");
    inner.last_events_query = Some(query);

    let mut items: Vec<Value> = inner
        .events
        .iter()
        .filter(|e| event_start(e) >= time_min)
        .cloned()
        .collect();
    items.sort_by_key(event_start);
    items.truncate(limit);

    Ok(Json(json!({"kind": "calendar#events", "items": items})))
}

async fn insert_event(
    State(state): State<Shared>,
    Path(_calendar): Path<String>,
    Json(mut body): Json<Value>,
) -> MockResult {
    if body.get("start").is_none() || body.get("end").is_none() {
        return Err(google_error(StatusCode::BAD_REQUEST, "Missing end time."));
    }
    let mut inner = state.lock();
    let id = inner.next_id("evt");
    body["id"] = json!(id);
    body["status"] = json!("confirmed");
    body["htmlLink"] = json!(format!("https://calendar.google.com/event?eid={}", id));
    inner.events.push(body.clone());
    Ok(Json(body))
}

async fn get_event(
    State(state): State<Shared>,
    Path((_calendar, event_id)): Path<(String, String)>,
) -> MockResult {
    state
        .lock()
        .events
        .iter()
        .find(|e| e["id"] == event_id.as_str())
        .cloned()
        .map(Json)
        .ok_or_else(|| google_error(StatusCode::NOT_FOUND, "Not Found"))
}

async fn update_event(
    State(state): State<Shared>,
    Path((_calendar, event_id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> MockResult {
    let mut inner = state.lock();
    let Some(slot) = inner
        .events
        .iter_mut()
        .find(|e| e["id"] == event_id.as_str())
    else {
        return Err(google_error(StatusCode::NOT_FOUND, "Not Found"));
    };
    *slot = body;
    slot["id"] = json!(event_id);
    let updated = slot.clone();
    inner.event_updates += 1;
    Ok(Json(updated))
}

async fn list_labels() -> MockResult {
    let labels: Vec<Value> = ["INBOX", "SENT", "TRASH", "UNREAD"]
        .iter()
        .map(|id| json!({"id": id, "name": id, "type": "system"}))
        .collect();
    Ok(Json(json!({"labels": labels})))
}

async fn list_messages(
    State(state): State<Shared>,
    Query(query): Query<HashMap<String, String>>,
) -> MockResult {
    let inner = state.lock();
    let label = query.get("labelIds").cloned().unwrap_or_default();
    let limit = max_results(&query, "maxResults");

    let messages: Vec<Value> = inner
        .messages
        .iter()
        .filter(|m| label.is_empty() || m.label_ids.contains(&label))
        .take(limit)
        .map(|m| json!({"id": m.id, "threadId": m.thread_id}))
        .collect();

    // Gmail omits the key entirely for an empty result.
    if messages.is_empty() {
        return Ok(Json(json!({"resultSizeEstimate": 0})));
    }
    let estimate = messages.len();
    Ok(Json(json!({"messages": messages, "resultSizeEstimate": estimate})))
}

async fn get_message(
    State(state): State<Shared>,
    Path(message_id): Path<String>,
) -> MockResult {
    state
        .lock()
        .messages
        .iter()
        .find(|m| m.id == message_id)
        .map(|m| Json(m.to_full()))
        .ok_or_else(|| google_error(StatusCode::NOT_FOUND, "Requested entity was not found."))
}

async fn send_message(State(state): State<Shared>, Json(body): Json<Value>) -> MockResult {
    let raw = body["raw"].as_str().unwrap_or_default().trim_end_matches('=');
    let decoded = URL_SAFE_NO_PAD
        .decode(raw)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .ok_or_else(|| google_error(StatusCode::BAD_REQUEST, "Invalid value for ByteString"))?;

    let mut inner = state.lock();
    let id = inner.next_id("sent");
    let thread_id = match body["threadId"].as_str() {
        Some(t) => t.to_string(),
        None => inner.next_id("thread"),
    };
    inner.sent.push(SentMessage {
        id: id.clone(),
        thread_id: thread_id.clone(),
        raw: decoded,
    });
    Ok(Json(json!({"id": id, "threadId": thread_id, "labelIds": ["SENT"]})))
}

async fn delete_message(State(state): State<Shared>, Path(message_id): Path<String>) -> Response {
    let mut inner = state.lock();
    let before = inner.messages.len();
    inner.messages.retain(|m| m.id != message_id);
    if inner.messages.len() == before {
        return google_error(StatusCode::NOT_FOUND, "Requested entity was not found.").into_response();
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn people_method(
    State(state): State<Shared>,
    Path(method): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> MockResult {
    if method != "people:searchContacts" {
        return Err(google_error(StatusCode::NOT_FOUND, "Not Found"));
    }
    if !query.contains_key("readMask") {
        return Err(google_error(StatusCode::BAD_REQUEST, "readMask is required"));
    }

    let needle = query.get("query").cloned().unwrap_or_default().to_lowercase();
    let limit = max_results(&query, "pageSize");
    let inner = state.lock();
    let results: Vec<Value> = inner
        .contacts
        .iter()
        .filter(|p| {
            p["names"][0]["displayName"]
                .as_str()
                .is_some_and(|n| n.to_lowercase().contains(&needle))
        })
        .take(limit)
        .map(|p| json!({"person": p}))
        .collect();

    if results.is_empty() {
        return Ok(Json(json!({})));
    }
    Ok(Json(json!({"results": results})))
}
