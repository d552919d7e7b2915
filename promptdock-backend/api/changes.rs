use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use axum::{Json, Router};
use futures::stream::Stream;
use std::convert::Infallible;

use super::AppState;
use crate::store::StoreState;

/// Full state for a window that is (re)opening.
pub(crate) async fn snapshot(State(state): State<AppState>) -> Json<StoreState> {
    Json(state.store.snapshot().await)
}

pub(crate) async fn stream_changes(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut rx = state.store.subscribe();
    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let sse_event_name = event.as_sse_event();
                    let data = serde_json::to_string(&event).unwrap_or_default();
                    yield Ok(Event::default().event(sse_event_name).data(data));
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "changes SSE subscriber lagged");
                    continue;
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                    break;
                }
            }
        }
    };
    Sse::new(stream).keep_alive(KeepAlive::new().interval(std::time::Duration::from_secs(15)))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/snapshot", get(snapshot))
        .route("/changes", get(stream_changes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing;

    #[tokio::test]
    async fn snapshot_contains_seeded_state() {
        let state = testing::state().await;
        let Json(snapshot) = snapshot(State(state)).await;
        assert_eq!(snapshot.prompts.len(), 12);
        assert_eq!(snapshot.categories.len(), 4);
        assert_eq!(snapshot.directories.len(), 3);
        assert!(!snapshot.is_loading);
    }

    #[tokio::test]
    async fn snapshot_serializes_camel_case() {
        let state = testing::state().await;
        state.store.set_active_category(Some("debug".into())).await;
        let Json(snapshot) = snapshot(State(state)).await;
        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["activeCategory"], "debug");
        assert_eq!(value["isLoading"], false);
    }
}
