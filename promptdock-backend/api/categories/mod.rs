pub mod handlers;

use axum::Router;
use axum::routing::{get, post, put};

use crate::api::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/categories",
            get(handlers::list_categories).post(handlers::create_category),
        )
        .route("/categories/reorder", post(handlers::reorder_categories))
        .route("/categories/active", put(handlers::set_active_category))
        .route(
            "/categories/{id}",
            put(handlers::update_category).delete(handlers::delete_category),
        )
}
