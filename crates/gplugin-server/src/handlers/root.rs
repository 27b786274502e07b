use axum::Json;
use gplugin_core::RootMessage;

/// Greeting served on `/`.
pub const ROOT_MESSAGE: &str = "Hello from the gplugin Google gateway!";

pub async fn index() -> Json<RootMessage> {
    Json(RootMessage {
        message: ROOT_MESSAGE.to_string(),
    })
}
