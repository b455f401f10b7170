use axum::{
    Json, Router,
    http::{StatusCode, Uri},
    routing::get,
};

use crate::{
    response::{ApiResponse, Meta},
    state::AppState,
};

pub mod addresses;
pub mod cart;
pub mod cart_items;
pub mod doc;
pub mod health;
pub mod params;
pub mod products;
pub mod users;

// Build the API router without binding state; it will be provided at the top level.
// Routes are registered with full paths because the collection endpoints
// answer both with and without the trailing slash.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .merge(users::router())
        .merge(addresses::router())
        .merge(products::router())
        .merge(cart::router())
}

/// The whole application minus transport layers, bound to `state`.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .merge(create_api_router())
        .merge(doc::scalar_docs())
        .fallback(not_found)
        .with_state(state)
}

async fn not_found(uri: Uri) -> (StatusCode, Json<ApiResponse<serde_json::Value>>) {
    let body = ApiResponse::success(
        "Not Found",
        serde_json::json!({ "path": uri.path() }),
        Some(Meta::empty()),
    );
    (StatusCode::NOT_FOUND, Json(body))
}
