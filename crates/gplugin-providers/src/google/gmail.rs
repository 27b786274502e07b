//! Gmail v1 client.
//!
//! All operations act on the authenticated user (`users/me`).

use gplugin_core::EmailRequest;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::error::{ProviderError, ProviderResult};

use super::client::GoogleClient;
use super::mime::{PlainMessage, find_header, reply_subject};

#[derive(Debug, Clone)]
pub struct GmailApi {
    client: GoogleClient,
}

impl GmailApi {
    pub fn new(client: GoogleClient) -> Self {
        Self { client }
    }

    /// Sends a plain-text email and returns Gmail's message resource.
    pub async fn send(&self, request: &EmailRequest) -> ProviderResult<Value> {
        let message = PlainMessage::new(&request.to, &request.subject, &request.message_text);
        let sent = self.send_raw(&message, None).await?;
        info!("sent message {}", sent["id"].as_str().unwrap_or("?"));
        Ok(sent)
    }

    async fn send_raw(&self, message: &PlainMessage, thread_id: Option<&str>) -> ProviderResult<Value> {
        let mut body = json!({ "raw": message.to_raw() });
        if let Some(thread_id) = thread_id {
            body["threadId"] = json!(thread_id);
        }
        self.client.post("users/me/messages/send", &body).await
    }

    /// Lists the user's labels (`[]` when Gmail returns none).
    pub async fn list_labels(&self) -> ProviderResult<Vec<Value>> {
        let response = self.client.get("users/me/labels", &[]).await?;
        Ok(take_array(response, "labels"))
    }

    /// Lists message ids (with thread ids) carrying `label_id`.
    pub async fn list_messages(&self, label_id: &str, max_results: u32) -> ProviderResult<Vec<Value>> {
        let query = [
            ("labelIds", label_id.to_string()),
            ("maxResults", max_results.to_string()),
        ];
        let response = self.client.get("users/me/messages", &query).await?;
        let messages = take_array(response, "messages");
        debug!("listed {} messages in {}", messages.len(), label_id);
        Ok(messages)
    }

    /// Fetches one message in `full` format.
    pub async fn get_message(&self, message_id: &str) -> ProviderResult<Value> {
        let path = format!("users/me/messages/{}", urlencoding::encode(message_id));
        self.client
            .get(&path, &[("format", "full".to_string())])
            .await
    }

    /// Replies to a message in its thread.
    ///
    /// The reply goes to the original `From`, with `Re: <Subject>` and
    /// `In-Reply-To`/`References` set from the original `Message-ID`.
    pub async fn reply(&self, message_id: &str, reply_text: &str) -> ProviderResult<Value> {
        let original = self.get_message(message_id).await?;

        let from = find_header(&original, "From").ok_or_else(|| {
            ProviderError::invalid_response(format!("message {} has no From header", message_id))
                .with_provider("gmail")
        })?;
        let subject = find_header(&original, "Subject").unwrap_or_default();
        let thread_id = original["threadId"].as_str();

        let mut message = PlainMessage::new(from, &reply_subject(subject), reply_text);
        if let Some(original_id) = find_header(&original, "Message-ID") {
            message = message
                .header("In-Reply-To", original_id)
                .header("References", original_id);
        }

        let sent = self.send_raw(&message, thread_id).await?;
        info!("replied to {} in thread {}", message_id, thread_id.unwrap_or("?"));
        Ok(sent)
    }

    /// Permanently deletes a message.
    pub async fn delete_message(&self, message_id: &str) -> ProviderResult<()> {
        let path = format!("users/me/messages/{}", urlencoding::encode(message_id));
        self.client.delete(&path).await?;
        info!("deleted message {}", message_id);
        Ok(())
    }
}

fn take_array(mut response: Value, key: &str) -> Vec<Value> {
    match response.get_mut(key).map(Value::take) {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockGoogle, MockMessage};
    use crate::ProviderErrorCode;

    fn gmail(mock: &MockGoogle) -> GmailApi {
        GmailApi::new(GoogleClient::new(
            reqwest::Client::new(),
            mock.endpoints().gmail,
            "ya29.test",
            "gmail",
        ))
    }

    #[test]
    fn missing_array_is_empty() {
        assert!(take_array(json!({"resultSizeEstimate": 0}), "messages").is_empty());
        assert_eq!(take_array(json!({"labels": [1, 2]}), "labels").len(), 2);
    }

    #[tokio::test]
    async fn send_encodes_message() {
        let mock = MockGoogle::start().await.unwrap();
        let sent = gmail(&mock)
            .send(&EmailRequest {
                to: "ada@example.com".to_string(),
                subject: "Hi".to_string(),
                message_text: "Hello there".to_string(),
            })
            .await
            .unwrap();

        assert!(sent["id"].is_string());
        let messages = mock.sent_messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].raw.starts_with("To: ada@example.com\r\nSubject: Hi\r\n"));
        assert!(messages[0].raw.ends_with("\r\n\r\nHello there"));
    }

    #[tokio::test]
    async fn reply_stays_in_thread() {
        let mock = MockGoogle::start().await.unwrap();
        mock.add_message(
            MockMessage::new("m1", "t1")
                .header("from", "Grace <grace@example.com>")
                .header("SUBJECT", "Lunch")
                .header("Message-ID", "<abc@mail.example.com>"),
        );

        let sent = gmail(&mock).reply("m1", "Sure").await.unwrap();

        assert_eq!(sent["threadId"], "t1");
        let raw = &mock.sent_messages()[0].raw;
        assert!(raw.contains("To: Grace <grace@example.com>\r\n"));
        assert!(raw.contains("Subject: Re: Lunch\r\n"));
        assert!(raw.contains("In-Reply-To: <abc@mail.example.com>\r\n"));
        assert!(raw.contains("References: <abc@mail.example.com>\r\n"));
    }

    #[tokio::test]
    async fn reply_without_from_fails() {
        let mock = MockGoogle::start().await.unwrap();
        mock.add_message(MockMessage::new("m1", "t1").header("Subject", "Lunch"));

        let err = gmail(&mock).reply("m1", "Sure").await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::InvalidResponse);
        assert!(mock.sent_messages().is_empty());
    }

    #[tokio::test]
    async fn list_messages_filters_by_label() {
        let mock = MockGoogle::start().await.unwrap();
        mock.add_message(MockMessage::new("m1", "t1"));
        mock.add_message(MockMessage::new("m2", "t2").labels(&["SENT"]));
        mock.add_message(MockMessage::new("m3", "t3"));

        let api = gmail(&mock);
        let inbox = api.list_messages("INBOX", 10).await.unwrap();
        assert_eq!(inbox, vec![json!({"id": "m1", "threadId": "t1"}), json!({"id": "m3", "threadId": "t3"})]);

        assert_eq!(api.list_messages("INBOX", 1).await.unwrap().len(), 1);
        assert!(api.list_messages("SPAM", 10).await.unwrap().is_empty());
        assert!(!api.list_labels().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_twice_fails_second_time() {
        let mock = MockGoogle::start().await.unwrap();
        mock.add_message(MockMessage::new("m1", "t1"));
        let api = gmail(&mock);

        api.delete_message("m1").await.unwrap();
        assert!(!mock.has_message("m1"));

        let err = api.delete_message("m1").await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::NotFound);
        assert!(err.message().contains("not found"));
    }
}
