//! Shared types for the gplugin gateway: request/response shapes and tracing setup.

pub mod dto;
pub mod tracing;

pub use dto::{
    ContactSearchRequest, CreateEventRequest, DeleteMessageRequest, DeleteMessageResponse,
    EditEventRequest, EmailRequest, EventLink, EventSummary, EventsQuery, MessagesQuery,
    ReplyRequest, RootMessage, SendEmailResponse, DEFAULT_LABEL_ID, DEFAULT_MAX_RESULTS,
};
pub use tracing::{LogFormat, TracingConfig, TracingError, init_tracing};
