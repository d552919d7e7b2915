//! Local HTTP bridge between the store and the UI windows.
pub mod activation;
pub mod categories;
pub mod changes;
pub mod directories;
pub mod middleware;
pub mod prompts;
mod routes;

use std::fmt::Display;
use std::sync::Arc;

use axum::Json;
use hyper::StatusCode;
use serde_json::{Value, json};

use crate::activation::{ActivationError, ActivationService};
use crate::store::{PromptStore, StoreError};

pub use routes::build_router;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<PromptStore>,
    pub activation: Arc<ActivationService>,
}

pub(crate) type ApiError = (StatusCode, Json<Value>);

pub(crate) fn error_response(status: StatusCode, message: impl Display) -> ApiError {
    (status, Json(json!({ "error": message.to_string() })))
}

pub(crate) fn not_found(what: &str) -> ApiError {
    error_response(StatusCode::NOT_FOUND, format!("{what} not found"))
}

pub(crate) fn store_error(err: StoreError) -> ApiError {
    let status = match &err {
        StoreError::Validation(_) => StatusCode::BAD_REQUEST,
        StoreError::SystemCategory(_)
        | StoreError::SystemDirectory(_)
        | StoreError::HasContent(_) => StatusCode::CONFLICT,
        StoreError::NoFallbackCategory | StoreError::Storage(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    error_response(status, err)
}

pub(crate) fn activation_error(err: ActivationError) -> ApiError {
    let status = match &err {
        ActivationError::EmptyCode
        | ActivationError::Expired
        | ActivationError::DeviceLimit
        | ActivationError::AlreadyActivated
        | ActivationError::InvalidCode => StatusCode::BAD_REQUEST,
        ActivationError::Rejected { status, .. } if *status < 500 => StatusCode::BAD_REQUEST,
        ActivationError::Rejected { .. }
        | ActivationError::Server
        | ActivationError::Network(_)
        | ActivationError::InvalidResponse(_) => StatusCode::BAD_GATEWAY,
        ActivationError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, err)
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;
    use std::time::Duration;

    use super::AppState;
    use crate::activation::ActivationService;
    use crate::activation::client::HttpActivationClient;
    use crate::activation::device::DeviceInfo;
    use crate::kv::testing::MemoryKeyValueStore;
    use crate::prompts::kv_repository::KvPromptRepository;
    use crate::prompts::seed::SystemSeed;
    use crate::store::PromptStore;

    /// Seeded in-memory state. Activation requests go to an unreachable endpoint.
    pub async fn state() -> AppState {
        let kv = Arc::new(MemoryKeyValueStore::default());
        let seed = Arc::new(SystemSeed::bundled().unwrap());
        let repo = Arc::new(KvPromptRepository::new(kv.clone(), seed));
        let store = Arc::new(PromptStore::new(repo, None));
        store.initialize().await;

        let client = HttpActivationClient::new(
            Arc::new(reqwest::Client::new()),
            "http://127.0.0.1:9/validate",
        )
        .with_retry(1, Duration::ZERO);
        let activation = Arc::new(ActivationService::new(
            Arc::new(client),
            kv,
            DeviceInfo::current(),
        ));

        AppState { store, activation }
    }
}
