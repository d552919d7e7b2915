use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};

use super::{ApiError, AppState, activation_error};

pub(crate) async fn get_activation(State(state): State<AppState>) -> Json<Value> {
    let activation = state.activation.state().await;
    Json(json!({
        "activated": activation.is_activated(),
        "state": activation,
        "device": state.activation.device(),
    }))
}

#[derive(Debug, Deserialize)]
pub(crate) struct ActivateRequest {
    code: String,
}

pub(crate) async fn activate(
    State(state): State<AppState>,
    Json(body): Json<ActivateRequest>,
) -> Result<Json<Value>, ApiError> {
    let activation = state
        .activation
        .activate(&body.code)
        .await
        .map_err(activation_error)?;
    Ok(Json(json!({
        "activated": activation.is_activated(),
        "state": activation,
    })))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/activation", get(get_activation).post(activate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing;
    use hyper::StatusCode;

    #[tokio::test]
    async fn reports_inactive_device() {
        let state = testing::state().await;
        let Json(body) = get_activation(State(state)).await;
        assert_eq!(body["activated"], false);
        assert_eq!(body["state"]["status"], "inactive");
        assert!(body["device"]["deviceId"].as_str().unwrap().starts_with("DEVICE-"));
    }

    #[tokio::test]
    async fn empty_code_is_bad_request() {
        let state = testing::state().await;
        let (status, Json(body)) = activate(
            State(state),
            Json(ActivateRequest { code: " ".into() }),
        )
        .await
        .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "activation code must not be empty");
    }

    #[tokio::test]
    async fn unreachable_server_is_bad_gateway() {
        let state = testing::state().await;
        let (status, _) = activate(
            State(state.clone()),
            Json(ActivateRequest {
                code: "CODE-1".into(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(!state.activation.state().await.is_activated());
    }
}
