//! Minimal RFC 2822 plain-text message building and header lookup.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use serde_json::Value;

/// A plain-text message ready to be handed to Gmail as `raw`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlainMessage {
    headers: Vec<(String, String)>,
    body: String,
}

impl PlainMessage {
    pub fn new(to: &str, subject: &str, body: impl Into<String>) -> Self {
        Self {
            headers: Vec::new(),
            body: body.into(),
        }
        .header("To", to)
        .header("Subject", &encode_header_value(subject))
    }

    /// Adds a header. Line breaks in the value are dropped so a value can
    /// never start a new header.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        let value: String = value.chars().filter(|c| *c != '\r' && *c != '\n').collect();
        self.headers.push((name.to_string(), value));
        self
    }

    /// Renders headers, content type, a blank line, then the body.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (name, value) in &self.headers {
            out.push_str(name);
            out.push_str(": ");
            out.push_str(value);
            out.push_str("\r\n");
        }
        out.push_str("Content-Type: text/plain; charset=UTF-8\r\n");
        out.push_str("\r\n");
        out.push_str(&self.body);
        out
    }

    /// Base64url encoding of the rendered message (Gmail's `raw` field).
    pub fn to_raw(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.render().as_bytes())
    }
}

/// RFC 2047 encoded-word for non-ASCII header values.
fn encode_header_value(value: &str) -> String {
    if value.is_ascii() {
        value.to_string()
    } else {
        format!("=?UTF-8?B?{}?=", STANDARD.encode(value.as_bytes()))
    }
}

/// Finds a header of a Gmail `format=full` message, ignoring name case.
pub fn find_header<'a>(message: &'a Value, name: &str) -> Option<&'a str> {
    message["payload"]["headers"]
        .as_array()?
        .iter()
        .find(|h| {
            h["name"]
                .as_str()
                .is_some_and(|n| n.eq_ignore_ascii_case(name))
        })
        .and_then(|h| h["value"].as_str())
}

/// Subject of a reply: always `"Re: "` followed by the original subject.
pub fn reply_subject(original: &str) -> String {
    format!("Re: {}", original)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_headers_then_body() {
        let message = PlainMessage::new("ada@example.com", "Hello", "Line one\nLine two");
        assert_eq!(
            message.render(),
            "To: ada@example.com\r\nSubject: Hello\r\n\
             Content-Type: text/plain; charset=UTF-8\r\n\r\nLine one\nLine two"
        );
    }

    #[test]
    fn raw_is_url_safe_without_padding() {
        let raw = PlainMessage::new("a@b.c", "??>>", "~~~").to_raw();
        assert!(!raw.contains('+'));
        assert!(!raw.contains('/'));
        assert!(!raw.contains('='));
        let decoded = URL_SAFE_NO_PAD.decode(raw).unwrap();
        assert!(String::from_utf8(decoded).unwrap().starts_with("To: a@b.c\r\n"));
    }

    #[test]
    fn header_values_cannot_inject_headers() {
        let message = PlainMessage::new("a@b.c\r\nBcc: evil@example.com", "x", "");
        assert!(message.render().starts_with("To: a@b.cBcc: evil@example.com\r\n"));
    }

    #[test]
    fn non_ascii_subject_is_encoded() {
        let rendered = PlainMessage::new("a@b.c", "Café", "").render();
        assert!(rendered.contains("Subject: =?UTF-8?B?Q2Fmw6k=?=\r\n"));
    }

    #[test]
    fn header_lookup_ignores_case() {
        let message = json!({
            "payload": {"headers": [
                {"name": "FROM", "value": "Grace <grace@example.com>"},
                {"name": "subject", "value": "Lunch"},
            ]}
        });
        assert_eq!(find_header(&message, "From"), Some("Grace <grace@example.com>"));
        assert_eq!(find_header(&message, "Subject"), Some("Lunch"));
        assert_eq!(find_header(&message, "Message-ID"), None);
        assert_eq!(find_header(&json!({}), "From"), None);
    }

    #[test]
    fn reply_subject_always_prefixes() {
        assert_eq!(reply_subject("Lunch"), "Re: Lunch");
        assert_eq!(reply_subject("Re: Lunch"), "Re: Re: Lunch");
    }
}
