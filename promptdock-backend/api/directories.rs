use axum::extract::{Path, State};
use axum::routing::{get, put};
use axum::{Json, Router};
use hyper::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};

use super::{ApiError, AppState, not_found, store_error};
use crate::prompts::Directory;

#[derive(Debug, Deserialize)]
pub(crate) struct DirectoryRequest {
    name: String,
}

pub(crate) async fn list_directories(State(state): State<AppState>) -> Json<Value> {
    let directories = state.store.snapshot().await.directories;
    Json(json!({ "directories": directories }))
}

pub(crate) async fn create_directory(
    State(state): State<AppState>,
    Json(body): Json<DirectoryRequest>,
) -> Result<(StatusCode, Json<Directory>), ApiError> {
    let directory = state
        .store
        .add_directory(&body.name)
        .await
        .map_err(store_error)?;
    Ok((StatusCode::CREATED, Json(directory)))
}

pub(crate) async fn rename_directory(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<DirectoryRequest>,
) -> Result<Json<Directory>, ApiError> {
    state
        .store
        .rename_directory(&id, &body.name)
        .await
        .map_err(store_error)?
        .map(Json)
        .ok_or_else(|| not_found("directory"))
}

pub(crate) async fn delete_directory(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    if !state.store.delete_directory(&id).await.map_err(store_error)? {
        return Err(not_found("directory"));
    }
    Ok(Json(json!({ "deleted": true })))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/directories",
            get(list_directories).post(create_directory),
        )
        .route(
            "/directories/{id}",
            put(rename_directory).delete(delete_directory),
        )
}
