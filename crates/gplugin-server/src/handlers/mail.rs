//! Gmail routes. Everything except send and delete passes Google's JSON
//! through unchanged.

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use gplugin_core::{
    DeleteMessageRequest, DeleteMessageResponse, EmailRequest, MessagesQuery, ReplyRequest,
    SendEmailResponse,
};
use serde_json::Value;

use crate::error::ApiResult;
use crate::state::AppState;

pub async fn send_email(
    State(state): State<AppState>,
    body: Result<Json<EmailRequest>, JsonRejection>,
) -> ApiResult<Json<SendEmailResponse>> {
    let Json(request) = body?;
    let gmail = state.credentials.get_mail_client().await?;
    let sent = gmail.send(&request).await?;
    let id = sent["id"].as_str().map(String::from);
    Ok(Json(SendEmailResponse::success(id)))
}

pub async fn list_labels(State(state): State<AppState>) -> ApiResult<Json<Vec<Value>>> {
    let gmail = state.credentials.get_mail_client().await?;
    Ok(Json(gmail.list_labels().await?))
}

pub async fn list_messages(
    State(state): State<AppState>,
    query: Result<Query<MessagesQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<Value>>> {
    let Query(query) = query?;
    let gmail = state.credentials.get_mail_client().await?;
    let messages = gmail
        .list_messages(&query.label_id, query.max_results)
        .await?;
    Ok(Json(messages))
}

pub async fn get_message(
    State(state): State<AppState>,
    Path(message_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let gmail = state.credentials.get_mail_client().await?;
    Ok(Json(gmail.get_message(&message_id).await?))
}

pub async fn reply(
    State(state): State<AppState>,
    body: Result<Json<ReplyRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(request) = body?;
    let gmail = state.credentials.get_mail_client().await?;
    Ok(Json(
        gmail.reply(&request.message_id, &request.reply_text).await?,
    ))
}

pub async fn delete_message(
    State(state): State<AppState>,
    body: Result<Json<DeleteMessageRequest>, JsonRejection>,
) -> ApiResult<Json<DeleteMessageResponse>> {
    let Json(request) = body?;
    let gmail = state.credentials.get_mail_client().await?;
    gmail.delete_message(&request.message_id).await?;
    Ok(Json(DeleteMessageResponse::deleted(request.message_id)))
}
