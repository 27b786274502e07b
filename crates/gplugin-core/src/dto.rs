//! Request and response shapes of the HTTP surface.
//!
//! These are the only typed bodies the gateway exchanges with the plugin
//! host. Endpoints that hand back Google's own JSON (labels, messages,
//! contacts, reply results) use `serde_json::Value` instead.

use serde::{Deserialize, Serialize};

/// Result count used when the caller does not pass one.
pub const DEFAULT_MAX_RESULTS: u32 = 10;

/// Label listed by `/messages` when the caller does not pass one.
pub const DEFAULT_LABEL_ID: &str = "INBOX";

fn default_max_results() -> u32 {
    DEFAULT_MAX_RESULTS
}

fn default_label_id() -> String {
    DEFAULT_LABEL_ID.to_string()
}

/// Body of `GET /`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootMessage {
    pub message: String,
}

/// One upcoming event as returned by `GET /events`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSummary {
    /// `start.dateTime`, or `start.date` for all-day events.
    pub start: String,
    pub summary: String,
}

/// Query string of `GET /events`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct EventsQuery {
    #[serde(default = "default_max_results")]
    pub max_results: u32,
}

impl Default for EventsQuery {
    fn default() -> Self {
        Self {
            max_results: DEFAULT_MAX_RESULTS,
        }
    }
}

/// Body of `POST /send_email`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailRequest {
    pub to: String,
    pub subject: String,
    pub message_text: String,
}

/// Response of `POST /send_email`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendEmailResponse {
    pub status: String,
    pub message_id: Option<String>,
}

impl SendEmailResponse {
    pub fn success(message_id: Option<String>) -> Self {
        Self {
            status: "success".to_string(),
            message_id,
        }
    }
}

/// Body of `POST /create_event`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateEventRequest {
    pub summary: String,
    pub start: String,
    pub end: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

/// Body of `POST /edit_event`.
///
/// Every field except `event_id` is optional; only the supplied ones are
/// written to the event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditEventRequest {
    pub event_id: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

impl EditEventRequest {
    /// Returns true if the request would not change anything.
    pub fn is_empty(&self) -> bool {
        self.summary.is_none()
            && self.start.is_none()
            && self.end.is_none()
            && self.description.is_none()
            && self.location.is_none()
    }
}

/// Response of `POST /create_event` and `POST /edit_event`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLink {
    pub id: String,
    #[serde(rename = "htmlLink")]
    pub html_link: Option<String>,
}

/// Body of `POST /search_contacts`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactSearchRequest {
    pub query: String,
    #[serde(default = "default_max_results")]
    pub max_results: u32,
}

/// Query string of `GET /messages`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MessagesQuery {
    #[serde(default = "default_label_id")]
    pub label_id: String,
    #[serde(default = "default_max_results")]
    pub max_results: u32,
}

impl Default for MessagesQuery {
    fn default() -> Self {
        Self {
            label_id: default_label_id(),
            max_results: DEFAULT_MAX_RESULTS,
        }
    }
}

/// Body of `POST /reply`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyRequest {
    pub message_id: String,
    pub reply_text: String,
}

/// Body of `POST /delete_message`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteMessageRequest {
    pub message_id: String,
}

/// Response of `POST /delete_message`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteMessageResponse {
    pub status: String,
    pub id: String,
}

impl DeleteMessageResponse {
    pub fn deleted(id: impl Into<String>) -> Self {
        Self {
            status: "deleted".to_string(),
            id: id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_link_uses_google_field_name() {
        let link = EventLink {
            id: "evt1".to_string(),
            html_link: Some("https://calendar.google.com/event?eid=1".to_string()),
        };
        let value = serde_json::to_value(&link).unwrap();
        assert_eq!(
            value,
            json!({"id": "evt1", "htmlLink": "https://calendar.google.com/event?eid=1"})
        );
    }

    #[test]
    fn edit_request_only_requires_event_id() {
        let req: EditEventRequest =
            serde_json::from_value(json!({"event_id": "e1", "summary": "New"})).unwrap();
        assert_eq!(req.summary.as_deref(), Some("New"));
        assert!(req.start.is_none());
        assert!(!req.is_empty());

        let bare: EditEventRequest = serde_json::from_value(json!({"event_id": "e1"})).unwrap();
        assert!(bare.is_empty());
    }

    #[test]
    fn create_request_rejects_missing_end() {
        let result: Result<CreateEventRequest, _> =
            serde_json::from_value(json!({"summary": "x", "start": "2024-03-15"}));
        assert!(result.is_err());
    }

    #[test]
    fn contact_search_defaults_max_results() {
        let req: ContactSearchRequest = serde_json::from_value(json!({"query": "ada"})).unwrap();
        assert_eq!(req.max_results, DEFAULT_MAX_RESULTS);
    }

    #[test]
    fn messages_query_defaults() {
        let q: MessagesQuery = serde_json::from_value(json!({})).unwrap();
        assert_eq!(q, MessagesQuery::default());
        assert_eq!(q.label_id, "INBOX");
    }

    #[test]
    fn delete_response_shape() {
        let value = serde_json::to_value(DeleteMessageResponse::deleted("m1")).unwrap();
        assert_eq!(value, json!({"status": "deleted", "id": "m1"}));
    }
}
