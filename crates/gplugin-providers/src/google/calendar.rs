//! Google Calendar v3 client.

use chrono::{NaiveDate, SecondsFormat, Utc};
use gplugin_core::{CreateEventRequest, EditEventRequest, EventLink, EventSummary};
use serde_json::{Map, Value, json};
use tracing::{debug, info};

use crate::error::{ProviderError, ProviderResult};

use super::client::GoogleClient;

/// Calendar operations against one calendar (normally `primary`).
#[derive(Debug, Clone)]
pub struct CalendarApi {
    client: GoogleClient,
    calendar_id: String,
    time_zone: String,
}

impl CalendarApi {
    pub fn new(
        client: GoogleClient,
        calendar_id: impl Into<String>,
        time_zone: impl Into<String>,
    ) -> Self {
        Self {
            client,
            calendar_id: calendar_id.into(),
            time_zone: time_zone.into(),
        }
    }

    fn events_path(&self) -> String {
        format!(
            "calendars/{}/events",
            urlencoding::encode(&self.calendar_id)
        )
    }

    fn event_path(&self, event_id: &str) -> String {
        format!("{}/{}", self.events_path(), urlencoding::encode(event_id))
    }

    /// Lists upcoming events in ascending start order, at most `max_results`.
    pub async fn list_upcoming(&self, max_results: u32) -> ProviderResult<Vec<EventSummary>> {
        if max_results == 0 {
            return Ok(Vec::new());
        }

        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let query = [
            ("timeMin", now),
            ("maxResults", max_results.to_string()),
            ("singleEvents", "true".to_string()),
            ("orderBy", "startTime".to_string()),
        ];

        let response = self.client.get(&self.events_path(), &query).await?;
        let mut events: Vec<EventSummary> = response
            .get("items")
            .and_then(Value::as_array)
            .map(|items| items.iter().map(summarize_event).collect())
            .unwrap_or_default();

        events.truncate(max_results as usize);
        debug!("fetched {} upcoming events", events.len());
        Ok(events)
    }

    /// Fetches one event as Google returns it.
    pub async fn get_event(&self, event_id: &str) -> ProviderResult<Value> {
        self.client.get(&self.event_path(event_id), &[]).await
    }

    pub async fn create_event(&self, request: &CreateEventRequest) -> ProviderResult<EventLink> {
        let mut body = json!({
            "summary": request.summary,
            "start": event_time(&request.start, &self.time_zone),
            "end": event_time(&request.end, &self.time_zone),
        });
        if let Some(description) = &request.description {
            body["description"] = json!(description);
        }
        if let Some(location) = &request.location {
            body["location"] = json!(location);
        }

        let created = self.client.post(&self.events_path(), &body).await?;
        let link = event_link(&created)?;
        info!("created event {}", link.id);
        Ok(link)
    }

    /// Read-modify-write update: only the fields present in `request` change.
    /// A request without fields only checks the event exists.
    pub async fn edit_event(&self, request: &EditEventRequest) -> ProviderResult<EventLink> {
        let mut event = self.get_event(&request.event_id).await?;
        if request.is_empty() {
            debug!("nothing to change on event {}", request.event_id);
            return event_link(&event);
        }
        apply_event_patch(&mut event, request, &self.time_zone);

        let updated = self
            .client
            .put(&self.event_path(&request.event_id), &event)
            .await?;
        let link = event_link(&updated)?;
        info!("updated event {}", link.id);
        Ok(link)
    }
}

/// Maps a Google event to `{start, summary}`.
pub fn summarize_event(event: &Value) -> EventSummary {
    let start = &event["start"];
    EventSummary {
        start: start["dateTime"]
            .as_str()
            .or_else(|| start["date"].as_str())
            .unwrap_or_default()
            .to_string(),
        summary: event["summary"].as_str().unwrap_or_default().to_string(),
    }
}

/// Builds a Google event time: all-day for `YYYY-MM-DD`, timed otherwise.
pub fn event_time(value: &str, time_zone: &str) -> Value {
    if value.len() == 10 && NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok() {
        json!({"date": value})
    } else {
        json!({"dateTime": value, "timeZone": time_zone})
    }
}

/// Writes the supplied fields of `request` into a fetched event.
pub fn apply_event_patch(event: &mut Value, request: &EditEventRequest, time_zone: &str) {
    if !event.is_object() {
        *event = Value::Object(Map::new());
    }

    if let Some(summary) = &request.summary {
        event["summary"] = json!(summary);
    }
    if let Some(start) = &request.start {
        event["start"] = event_time(start, time_zone);
    }
    if let Some(end) = &request.end {
        event["end"] = event_time(end, time_zone);
    }
    if let Some(description) = &request.description {
        event["description"] = json!(description);
    }
    if let Some(location) = &request.location {
        event["location"] = json!(location);
    }
}

fn event_link(event: &Value) -> ProviderResult<EventLink> {
    let id = event["id"].as_str().ok_or_else(|| {
        ProviderError::invalid_response("event response has no id").with_provider("calendar")
    })?;
    Ok(EventLink {
        id: id.to_string(),
        html_link: event["htmlLink"].as_str().map(String::from),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockGoogle;

    fn calendar(mock: &MockGoogle) -> CalendarApi {
        let client = GoogleClient::new(
            reqwest::Client::new(),
            mock.endpoints().calendar,
            "ya29.test",
            "calendar",
        );
        CalendarApi::new(client, "primary", "UTC")
    }

    #[test]
    fn date_only_values_are_all_day() {
        assert_eq!(event_time("2024-03-15", "UTC"), json!({"date": "2024-03-15"}));
        assert_eq!(
            event_time("2024-03-15T10:00:00Z", "Europe/Paris"),
            json!({"dateTime": "2024-03-15T10:00:00Z", "timeZone": "Europe/Paris"})
        );
        // Not a real date, so it is passed through as a dateTime.
        assert_eq!(
            event_time("2024-13-45", "UTC")["dateTime"],
            json!("2024-13-45")
        );
    }

    #[test]
    fn summarize_falls_back_to_date_and_empty_summary() {
        let event = json!({"start": {"date": "2024-03-15"}});
        assert_eq!(
            summarize_event(&event),
            EventSummary {
                start: "2024-03-15".to_string(),
                summary: String::new()
            }
        );
    }

    #[test]
    fn patch_with_summary_only_keeps_other_fields() {
        let mut event = json!({
            "id": "e1",
            "summary": "Old",
            "start": {"dateTime": "2099-01-01T10:00:00Z"},
            "end": {"dateTime": "2099-01-01T11:00:00Z"},
            "description": "notes",
            "location": "Room 1",
            "attendees": [{"email": "a@example.com"}],
        });
        let before = event.clone();
        let request = EditEventRequest {
            event_id: "e1".to_string(),
            summary: Some("New".to_string()),
            ..Default::default()
        };

        apply_event_patch(&mut event, &request, "UTC");

        assert_eq!(event["summary"], "New");
        for key in ["start", "end", "description", "location", "attendees"] {
            assert_eq!(event[key], before[key], "{key} changed");
        }
    }

    #[tokio::test]
    async fn list_upcoming_orders_and_limits() {
        let mock = MockGoogle::start().await.unwrap();
        mock.add_event("B", "2099-01-02T09:00:00Z", "2099-01-02T10:00:00Z");
        mock.add_event("A", "2099-01-01T09:00:00Z", "2099-01-01T10:00:00Z");
        mock.add_event("C", "2099-01-03", "2099-01-04");
        mock.add_event("Past", "2000-01-01T09:00:00Z", "2000-01-01T10:00:00Z");

        let events = calendar(&mock).list_upcoming(2).await.unwrap();

        assert_eq!(
            events,
            vec![
                EventSummary {
                    start: "2099-01-01T09:00:00Z".to_string(),
                    summary: "A".to_string()
                },
                EventSummary {
                    start: "2099-01-02T09:00:00Z".to_string(),
                    summary: "B".to_string()
                },
            ]
        );

        let query = mock.last_events_query().unwrap();
        assert_eq!(query["singleEvents"], "true");
        assert_eq!(query["orderBy"], "startTime");
        assert_eq!(query["maxResults"], "2");
        assert!(query["timeMin"].ends_with('Z'));
        assert_eq!(mock.last_authorization().as_deref(), Some("Bearer ya29.test"));
    }

    #[tokio::test]
    async fn create_then_edit_round_trip() {
        let mock = MockGoogle::start().await.unwrap();
        let api = calendar(&mock);

        let link = api
            .create_event(&CreateEventRequest {
                summary: "Planning".to_string(),
                start: "2099-05-01T10:00:00Z".to_string(),
                end: "2099-05-01T11:00:00Z".to_string(),
                description: None,
                location: Some("Room 2".to_string()),
            })
            .await
            .unwrap();
        assert!(link.html_link.is_some());

        let stored = mock.event(&link.id).unwrap();
        assert_eq!(stored["start"]["timeZone"], "UTC");
        assert!(stored.get("description").is_none());

        let edited = api
            .edit_event(&EditEventRequest {
                event_id: link.id.clone(),
                summary: Some("Planning v2".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(edited.id, link.id);
        assert_eq!(mock.event_updates(), 1);

        let stored = mock.event(&link.id).unwrap();
        assert_eq!(stored["summary"], "Planning v2");
        assert_eq!(stored["location"], "Room 2");
        assert_eq!(stored["start"]["dateTime"], "2099-05-01T10:00:00Z");
    }

    #[tokio::test]
    async fn edit_without_fields_leaves_event_alone() {
        let mock = MockGoogle::start().await.unwrap();
        let id = mock.add_event("Standup", "2099-03-01T09:00:00Z", "2099-03-01T09:15:00Z");
        let before = mock.event(&id).unwrap();

        let link = calendar(&mock)
            .edit_event(&EditEventRequest {
                event_id: id.clone(),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(link.id, id);
        assert_eq!(link.html_link.as_deref(), before["htmlLink"].as_str());
        assert_eq!(mock.event_updates(), 0);
        assert_eq!(mock.event(&id).unwrap(), before);

        let err = calendar(&mock)
            .edit_event(&EditEventRequest {
                event_id: "missing".to_string(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), crate::ProviderErrorCode::NotFound);
    }

    #[tokio::test]
    async fn edit_unknown_event_is_not_found() {
        let mock = MockGoogle::start().await.unwrap();
        let err = calendar(&mock)
            .edit_event(&EditEventRequest {
                event_id: "missing".to_string(),
                summary: Some("x".to_string()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), crate::ProviderErrorCode::NotFound);
        assert_eq!(err.provider(), Some("calendar"));
    }
}
