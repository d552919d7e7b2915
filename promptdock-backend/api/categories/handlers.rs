use axum::Json;
use axum::extract::{Path, State};
use hyper::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::api::{ApiError, AppState, not_found, store_error};
use crate::prompts::{Category, CategoryPatch, NewCategory};

pub(crate) async fn list_categories(State(state): State<AppState>) -> Json<Value> {
    let snapshot = state.store.snapshot().await;
    Json(json!({
        "categories": snapshot.categories,
        "active": snapshot.active_category,
    }))
}

pub(crate) async fn create_category(
    State(state): State<AppState>,
    Json(body): Json<NewCategory>,
) -> Result<(StatusCode, Json<Category>), ApiError> {
    let category = state.store.add_category(body).await.map_err(store_error)?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub(crate) async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<CategoryPatch>,
) -> Result<Json<Category>, ApiError> {
    state
        .store
        .update_category(&id, patch)
        .await
        .map_err(store_error)?
        .map(Json)
        .ok_or_else(|| not_found("category"))
}

pub(crate) async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    if !state.store.delete_category(&id).await.map_err(store_error)? {
        return Err(not_found("category"));
    }
    Ok(Json(json!({ "deleted": true })))
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReorderCategoriesRequest {
    from: usize,
    to: usize,
}

pub(crate) async fn reorder_categories(
    State(state): State<AppState>,
    Json(body): Json<ReorderCategoriesRequest>,
) -> Result<Json<Value>, ApiError> {
    let changed = state
        .store
        .reorder_category(body.from, body.to)
        .await
        .map_err(store_error)?;
    Ok(Json(json!({ "changed": changed })))
}

#[derive(Debug, Deserialize)]
pub(crate) struct ActiveCategoryRequest {
    #[serde(default)]
    id: Option<String>,
}

pub(crate) async fn set_active_category(
    State(state): State<AppState>,
    Json(body): Json<ActiveCategoryRequest>,
) -> Json<Value> {
    state.store.set_active_category(body.id.clone()).await;
    Json(json!({ "active": body.id }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing;

    fn new_category(name: &str) -> NewCategory {
        NewCategory {
            name: name.into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn lists_system_categories_in_order() {
        let state = testing::state().await;
        let Json(body) = list_categories(State(state)).await;
        let ids: Vec<_> = body["categories"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids, ["requirement", "debug", "deployment", "summary"]);
        assert!(body["active"].is_null());
    }

    #[tokio::test]
    async fn create_rename_delete_user_category() {
        let state = testing::state().await;
        let (status, Json(created)) =
            create_category(State(state.clone()), Json(new_category("Work")))
                .await
                .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert!(created.id.starts_with("custom-"));

        let patch = CategoryPatch {
            name: Some("Office".into()),
            ..Default::default()
        };
        let Json(renamed) = update_category(State(state.clone()), Path(created.id.clone()), Json(patch))
            .await
            .unwrap();
        assert_eq!(renamed.name, "Office");

        let Json(body) = delete_category(State(state.clone()), Path(created.id.clone()))
            .await
            .unwrap();
        assert_eq!(body["deleted"], true);
        let (status, _) = delete_category(State(state), Path(created.id)).await.unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn system_category_delete_conflicts() {
        let state = testing::state().await;
        let (status, Json(body)) = delete_category(State(state), Path("requirement".into()))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["error"].as_str().unwrap().contains("requirement"));
    }

    #[tokio::test]
    async fn reorder_and_select_active() {
        let state = testing::state().await;
        let Json(body) = reorder_categories(
            State(state.clone()),
            Json(ReorderCategoriesRequest { from: 3, to: 0 }),
        )
        .await
        .unwrap();
        assert_eq!(body["changed"], true);

        let Json(body) = set_active_category(
            State(state.clone()),
            Json(ActiveCategoryRequest {
                id: Some("summary".into()),
            }),
        )
        .await;
        assert_eq!(body["active"], "summary");

        let Json(body) = list_categories(State(state)).await;
        assert_eq!(body["categories"][0]["id"], "summary");
        assert_eq!(body["active"], "summary");
    }
}
