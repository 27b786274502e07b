use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use gplugin_core::ContactSearchRequest;
use serde_json::Value;

use crate::error::ApiResult;
use crate::state::AppState;

/// `/search_contacts`: Google's `results` list, unchanged.
pub async fn search_contacts(
    State(state): State<AppState>,
    body: Result<Json<ContactSearchRequest>, JsonRejection>,
) -> ApiResult<Json<Vec<Value>>> {
    let Json(request) = body?;
    let people = state.credentials.get_people_client().await?;
    let results = people
        .search_contacts(&request.query, request.max_results)
        .await?;
    Ok(Json(results))
}
