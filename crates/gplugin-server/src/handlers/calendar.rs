//! `/events`, `/create_event`, `/edit_event`.

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use gplugin_core::{CreateEventRequest, EditEventRequest, EventLink, EventSummary, EventsQuery};

use crate::error::ApiResult;
use crate::state::AppState;

pub async fn list_events(
    State(state): State<AppState>,
    query: Result<Query<EventsQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<EventSummary>>> {
    let Query(query) = query?;
    let calendar = state.credentials.get_calendar_client().await?;
    let events = calendar.list_upcoming(query.max_results).await?;
    Ok(Json(events))
}

pub async fn create_event(
    State(state): State<AppState>,
    body: Result<Json<CreateEventRequest>, JsonRejection>,
) -> ApiResult<Json<EventLink>> {
    let Json(request) = body?;
    let calendar = state.credentials.get_calendar_client().await?;
    Ok(Json(calendar.create_event(&request).await?))
}

pub async fn edit_event(
    State(state): State<AppState>,
    body: Result<Json<EditEventRequest>, JsonRejection>,
) -> ApiResult<Json<EventLink>> {
    let Json(request) = body?;
    let calendar = state.credentials.get_calendar_client().await?;
    Ok(Json(calendar.edit_event(&request).await?))
}
