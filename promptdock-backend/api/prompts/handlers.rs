use axum::Json;
use axum::extract::{Path, Query, State};
use hyper::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::api::{ApiError, AppState, not_found, store_error};
use crate::prompts::{NewPrompt, Prompt, PromptPatch};

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ListPromptsQuery {
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    q: Option<String>,
}

/// Without `category` the active category applies (all prompts when none is active).
pub(crate) async fn list_prompts(
    State(state): State<AppState>,
    Query(query): Query<ListPromptsQuery>,
) -> Json<Value> {
    let prompts = match query.category.as_deref() {
        Some(category) => {
            state
                .store
                .filter_prompts(Some(category), query.q.as_deref())
                .await
        }
        None => state.store.visible_prompts(query.q.as_deref()).await,
    };
    Json(json!({ "prompts": prompts }))
}

pub(crate) async fn get_prompt(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Prompt>, ApiError> {
    state
        .store
        .get_prompt(&id)
        .await
        .map(Json)
        .ok_or_else(|| not_found("prompt"))
}

pub(crate) async fn create_prompt(
    State(state): State<AppState>,
    Json(body): Json<NewPrompt>,
) -> Result<(StatusCode, Json<Prompt>), ApiError> {
    let prompt = state.store.add_prompt(body).await.map_err(store_error)?;
    Ok((StatusCode::CREATED, Json(prompt)))
}

/// System prompts are read-only and answer 404 like unknown ids.
pub(crate) async fn update_prompt(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<PromptPatch>,
) -> Result<Json<Prompt>, ApiError> {
    state
        .store
        .update_prompt(&id, patch)
        .await
        .map_err(store_error)?
        .map(Json)
        .ok_or_else(|| not_found("editable prompt"))
}

pub(crate) async fn delete_prompt(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    if !state.store.delete_prompt(&id).await.map_err(store_error)? {
        return Err(not_found("deletable prompt"));
    }
    Ok(Json(json!({ "deleted": true })))
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReorderPromptsRequest {
    active_id: String,
    over_id: String,
    category: String,
}

pub(crate) async fn reorder_prompts(
    State(state): State<AppState>,
    Json(body): Json<ReorderPromptsRequest>,
) -> Result<Json<Value>, ApiError> {
    let changed = state
        .store
        .reorder_prompt(&body.active_id, &body.over_id, &body.category)
        .await
        .map_err(store_error)?;
    Ok(Json(json!({ "changed": changed })))
}

#[derive(Debug, Deserialize)]
pub(crate) struct MovePromptRequest {
    category: String,
}

pub(crate) async fn move_prompt(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<MovePromptRequest>,
) -> Result<Json<Prompt>, ApiError> {
    state
        .store
        .move_prompt_to_category(&id, &body.category)
        .await
        .map_err(store_error)?
        .map(Json)
        .ok_or_else(|| not_found("movable prompt"))
}
