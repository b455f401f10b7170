use axum::{
    Json, Router,
    extract::{Path, State},
    response::Redirect,
    routing::get,
};

use crate::{
    dto::users::AddressList,
    error::AppResult,
    models::Address,
    response::ApiResponse,
    services::address_service,
    state::AppState,
    store::DocumentId,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/user/{id}/address",
            get(list_addresses).put(add_address).delete(delete_address),
        )
        .route(
            "/user/{id}/address/",
            get(list_addresses).put(add_address).delete(delete_address),
        )
}

fn back_to_addresses(user_id: &str) -> Redirect {
    Redirect::to(&format!("/user/{user_id}/address"))
}

#[utoipa::path(
    put,
    path = "/user/{user_id}/address/",
    params(("user_id" = String, Path, description = "User ID")),
    request_body = Address,
    responses(
        (status = 303, description = "Address added"),
        (status = 404, description = "User not found"),
        (status = 422, description = "Address already registered"),
    ),
    tag = "Addresses"
)]
pub async fn add_address(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(address): Json<Address>,
) -> AppResult<Redirect> {
    address_service::add_address(&state, &DocumentId::from(user_id.as_str()), address).await?;
    Ok(back_to_addresses(&user_id))
}

#[utoipa::path(
    get,
    path = "/user/{user_id}/address/",
    params(("user_id" = String, Path, description = "User ID")),
    responses(
        (status = 200, description = "Addresses of the user", body = ApiResponse<AddressList>),
        (status = 404, description = "User not found"),
    ),
    tag = "Addresses"
)]
pub async fn list_addresses(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<ApiResponse<AddressList>>> {
    let resp = address_service::list_addresses(&state, &DocumentId::from(user_id)).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/user/{user_id}/address/",
    params(("user_id" = String, Path, description = "User ID")),
    request_body = Address,
    responses(
        (status = 303, description = "Matching addresses removed"),
        (status = 404, description = "User or address not found"),
    ),
    tag = "Addresses"
)]
pub async fn delete_address(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(address): Json<Address>,
) -> AppResult<Redirect> {
    address_service::delete_address(&state, &DocumentId::from(user_id.as_str()), address).await?;
    Ok(back_to_addresses(&user_id))
}
