//! HTTP surface of the gateway.

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::handlers::{calendar, contacts, mail, root};
use crate::request_tracing;
use crate::state::AppState;

/// Builds the gateway router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root::index))
        .route("/events", get(calendar::list_events))
        .route("/create_event", post(calendar::create_event))
        .route("/edit_event", post(calendar::edit_event))
        .route("/send_email", post(mail::send_email))
        .route("/labels", get(mail::list_labels))
        .route("/messages", get(mail::list_messages))
        .route("/message/:message_id", get(mail::get_message))
        .route("/reply", post(mail::reply))
        .route("/delete_message", post(mail::delete_message))
        .route("/search_contacts", post(contacts::search_contacts))
        .fallback(handler_404)
        .layer(request_tracing::trace_with_request_id_layer())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn handler_404() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "detail": "Not Found" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request, Response};
    use gplugin_providers::google::{CredentialManager, GoogleConfig, MapEnv, TokenInfo, TokenStorage};
    use gplugin_providers::testing::{MockGoogle, MockMessage};
    use serde_json::Value;
    use tempfile::TempDir;
    use tower::ServiceExt;

    struct Gateway {
        _dir: TempDir,
        mock: MockGoogle,
        app: Router,
    }

    impl Gateway {
        /// Gateway with a valid stored token, backed by the mock.
        async fn start() -> Self {
            let dir = TempDir::new().unwrap();
            let mock = MockGoogle::start().await.unwrap();
            let token_path = dir.path().join("token.json");
            TokenStorage::new(&token_path)
                .save(&TokenInfo::new("ya29.gateway", None, Some(3600), vec![]))
                .unwrap();
            Self::with_token_path(dir, mock, token_path)
        }

        /// Gateway with no stored token and interactive auth disabled.
        async fn unauthenticated() -> Self {
            let dir = TempDir::new().unwrap();
            let mock = MockGoogle::start().await.unwrap();
            let token_path = dir.path().join("token.json");
            Self::with_token_path(dir, mock, token_path)
        }

        fn with_token_path(dir: TempDir, mock: MockGoogle, token_path: std::path::PathBuf) -> Self {
            let config = GoogleConfig::default()
                .with_token_path(token_path)
                .with_credentials_path(dir.path().join("credentials.json"))
                .with_endpoints(mock.endpoints())
                .with_interactive(false);
            let manager = CredentialManager::new(config).unwrap().with_env(MapEnv::new());
            let app = router(AppState::new(manager));
            Self { _dir: dir, mock, app }
        }

        async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> Response<Body> {
            let mut request = Request::builder().method(method).uri(uri);
            let body = match body {
                Some(value) => {
                    request = request.header("content-type", "application/json");
                    Body::from(value.to_string())
                }
                None => Body::empty(),
            };
            self.app
                .clone()
                .oneshot(request.body(body).unwrap())
                .await
                .unwrap()
        }

        async fn call(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
            let response = self.send(method, uri, body).await;
            let status = response.status();
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            (status, serde_json::from_slice(&bytes).unwrap())
        }

        async fn get(&self, uri: &str) -> (StatusCode, Value) {
            self.call(Method::GET, uri, None).await
        }

        async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
            self.call(Method::POST, uri, Some(body)).await
        }
    }

    #[tokio::test]
    async fn root_greets() {
        let gw = Gateway::start().await;
        let (status, body) = gw.get("/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"message": root::ROOT_MESSAGE}));
    }

    #[tokio::test]
    async fn events_are_ordered_and_limited() {
        let gw = Gateway::start().await;
        gw.mock.add_event("B", "2099-02-01T09:00:00Z", "2099-02-01T10:00:00Z");
        gw.mock.add_event("A", "2099-01-01T09:00:00Z", "2099-01-01T10:00:00Z");
        gw.mock.add_event("C", "2099-03-01T09:00:00Z", "2099-03-01T10:00:00Z");

        let (status, body) = gw.get("/events?max_results=2").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!([
                {"start": "2099-01-01T09:00:00Z", "summary": "A"},
                {"start": "2099-02-01T09:00:00Z", "summary": "B"},
            ])
        );
    }

    #[tokio::test]
    async fn events_default_to_ten() {
        let gw = Gateway::start().await;
        let (status, body) = gw.get("/events").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
        assert_eq!(gw.mock.last_events_query().unwrap()["maxResults"], "10");
    }

    #[tokio::test]
    async fn created_event_is_listed() {
        let gw = Gateway::start().await;
        let (status, link) = gw
            .post(
                "/create_event",
                json!({
                    "summary": "Standup",
                    "start": "2099-06-01T09:00:00Z",
                    "end": "2099-06-01T09:15:00Z",
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert!(link["id"].is_string());
        assert!(link["htmlLink"].is_string());

        let (_, events) = gw.get("/events").await;
        assert_eq!(
            events,
            json!([{"start": "2099-06-01T09:00:00Z", "summary": "Standup"}])
        );
    }

    #[tokio::test]
    async fn edit_with_summary_only() {
        let gw = Gateway::start().await;
        let id = gw
            .mock
            .add_event("Old", "2099-01-01T09:00:00Z", "2099-01-01T10:00:00Z");
        let before = gw.mock.event(&id).unwrap();

        let (status, link) = gw
            .post("/edit_event", json!({"event_id": id, "summary": "New"}))
            .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(link["id"], id.as_str());
        let after = gw.mock.event(&id).unwrap();
        assert_eq!(after["summary"], "New");
        assert_eq!(after["start"], before["start"]);
        assert_eq!(after["end"], before["end"]);
    }

    #[tokio::test]
    async fn send_email_returns_message_id() {
        let gw = Gateway::start().await;
        let (status, body) = gw
            .post(
                "/send_email",
                json!({"to": "ada@example.com", "subject": "Hi", "message_text": "Hello"}),
            )
            .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(body["message_id"], gw.mock.sent_messages()[0].id.as_str());
    }

    #[tokio::test]
    async fn missing_field_is_422() {
        let gw = Gateway::start().await;
        let (status, body) = gw
            .post("/send_email", json!({"to": "ada@example.com"}))
            .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["detail"].as_str().unwrap().contains("subject"));
        assert!(gw.mock.sent_messages().is_empty());
    }

    #[tokio::test]
    async fn mail_listing_passthrough() {
        let gw = Gateway::start().await;
        gw.mock.add_message(MockMessage::new("m1", "t1"));
        gw.mock.add_message(MockMessage::new("m2", "t2").labels(&["SENT"]));

        let (status, labels) = gw.get("/labels").await;
        assert_eq!(status, StatusCode::OK);
        assert!(labels.as_array().unwrap().iter().any(|l| l["id"] == "INBOX"));

        let (_, inbox) = gw.get("/messages").await;
        assert_eq!(inbox, json!([{"id": "m1", "threadId": "t1"}]));

        let (_, sent) = gw.get("/messages?label_id=SENT&max_results=5").await;
        assert_eq!(sent, json!([{"id": "m2", "threadId": "t2"}]));

        let (status, message) = gw.get("/message/m1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(message["threadId"], "t1");
    }

    #[tokio::test]
    async fn reply_threads_and_prefixes_subject() {
        let gw = Gateway::start().await;
        gw.mock.add_message(
            MockMessage::new("m1", "thread-42")
                .header("From", "grace@example.com")
                .header("Subject", "Budget"),
        );

        let (status, body) = gw
            .post("/reply", json!({"message_id": "m1", "reply_text": "Approved"}))
            .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["threadId"], "thread-42");
        let sent = &gw.mock.sent_messages()[0];
        assert_eq!(sent.thread_id, "thread-42");
        assert!(sent.raw.contains("Subject: Re: Budget\r\n"));
        assert!(sent.raw.contains("To: grace@example.com\r\n"));
    }

    #[tokio::test]
    async fn deleting_twice_fails_the_second_time() {
        let gw = Gateway::start().await;
        gw.mock.add_message(MockMessage::new("m1", "t1"));

        let (status, body) = gw
            .post("/delete_message", json!({"message_id": "m1"}))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "deleted", "id": "m1"}));

        let (status, body) = gw
            .post("/delete_message", json!({"message_id": "m1"}))
            .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["detail"].as_str().unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn contact_search() {
        let gw = Gateway::start().await;
        gw.mock.add_contact("Ada Lovelace", "ada@example.com");

        let (status, body) = gw
            .post("/search_contacts", json!({"query": "lovelace"}))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);

        let (_, body) = gw.post("/search_contacts", json!({"query": "zed"})).await;
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn no_credential_is_500_with_detail() {
        let gw = Gateway::unauthenticated().await;
        let (status, body) = gw.get("/events").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(
            body["detail"]
                .as_str()
                .unwrap()
                .contains("interactive authorization is disabled")
        );
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let gw = Gateway::start().await;
        let (status, body) = gw.get("/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({"detail": "Not Found"}));
    }

    #[tokio::test]
    async fn responses_carry_request_id_and_cors() {
        let gw = Gateway::start().await;
        let mut request = Request::builder()
            .uri("/")
            .header("origin", "https://assistant.example.com")
            .body(Body::empty())
            .unwrap();
        request
            .headers_mut()
            .insert("x-request-id", "req-123".parse().unwrap());

        let response = gw.app.clone().oneshot(request).await.unwrap();

        assert_eq!(response.headers()["x-request-id"], "req-123");
        assert_eq!(response.headers()["access-control-allow-origin"], "*");

        let generated = gw.send(Method::GET, "/", None).await;
        assert!(generated.headers().contains_key("x-request-id"));
    }
}
