use axum::{Json, extract::State};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    models::Product,
    response::{ApiResponse, Meta},
    state::AppState,
    store::{Filter, FindOptions},
};

#[derive(Serialize, ToSchema)]
pub struct HealthData {
    pub status: String,
    pub store: String,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "OK", body = ApiResponse<HealthData>),
    ),
    tag = "Health"
)]
pub async fn health_check(State(state): State<AppState>) -> Json<ApiResponse<HealthData>> {
    let store = match state
        .repo
        .find_many::<Product>(&Filter::new(), FindOptions::limit(1))
        .await
    {
        Ok(_) => "ok".to_string(),
        Err(err) => {
            tracing::warn!(error = %err, "store health probe failed");
            "unavailable".to_string()
        }
    };

    let data = HealthData {
        status: "ok".to_string(),
        store,
    };
    Json(ApiResponse::success(
        "Health check",
        data,
        Some(Meta::empty()),
    ))
}
