use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    routing::get,
};

use crate::{
    dto::cart::{CartPatch, CreateCartRequest},
    error::{AppError, AppResult},
    models::Cart,
    response::{ApiResponse, Success},
    routes::{cart_items, params::optional_json},
    services::{
        cart_service,
        cascade::{self, CascadeMode},
    },
    state::AppState,
    store::DocumentId,
};

/// Cart routes. `{id}` is the owner's user id here and the cart id under
/// `/item`; the segment name is shared so the two trees can coexist.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/cart/{id}",
            get(get_cart)
                .post(create_cart)
                .put(update_cart)
                .delete(delete_cart),
        )
        .merge(cart_items::router())
}

#[utoipa::path(
    post,
    path = "/cart/{user_id}",
    params(("user_id" = String, Path, description = "Owner user ID")),
    request_body(content = CreateCartRequest, description = "Optional address and authority"),
    responses(
        (status = 200, description = "The user's active cart, created if needed", body = ApiResponse<Cart>),
        (status = 404, description = "User not found"),
        (status = 422, description = "No delivery address available"),
    ),
    tag = "Cart"
)]
pub async fn create_cart(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    body: Bytes,
) -> AppResult<Json<ApiResponse<Cart>>> {
    let payload: CreateCartRequest = optional_json(&body)?;
    let cart = cart_service::create_cart(&state, &DocumentId::from(user_id), payload).await?;
    Ok(Json(ApiResponse::success("Cart", cart, None)))
}

#[utoipa::path(
    get,
    path = "/cart/{user_id}",
    params(("user_id" = String, Path, description = "Owner user ID")),
    responses(
        (status = 200, description = "The user's active cart", body = ApiResponse<Cart>),
        (status = 404, description = "No active cart"),
    ),
    tag = "Cart"
)]
pub async fn get_cart(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<ApiResponse<Cart>>> {
    let cart = cart_service::get_active_cart(&state, &DocumentId::from(user_id))
        .await?
        .ok_or_else(|| AppError::NotFound("Active cart not found".to_string()))?;
    Ok(Json(ApiResponse::success("Cart", cart, None)))
}

#[utoipa::path(
    put,
    path = "/cart/{user_id}",
    params(("user_id" = String, Path, description = "Owner user ID")),
    request_body = CartPatch,
    responses(
        (status = 200, description = "Updated cart", body = ApiResponse<Cart>),
        (status = 404, description = "No active cart"),
    ),
    tag = "Cart"
)]
pub async fn update_cart(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(patch): Json<CartPatch>,
) -> AppResult<Json<ApiResponse<Cart>>> {
    let cart = cart_service::update_cart(&state, &DocumentId::from(user_id), patch).await?;
    Ok(Json(ApiResponse::success("Cart updated", cart, None)))
}

#[utoipa::path(
    delete,
    path = "/cart/{user_id}",
    params(("user_id" = String, Path, description = "Owner user ID")),
    responses(
        (status = 200, description = "Cart and its items deleted", body = ApiResponse<Success>),
        (status = 404, description = "No active cart"),
        (status = 500, description = "Cart could not be deleted"),
    ),
    tag = "Cart"
)]
pub async fn delete_cart(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<ApiResponse<Success>>> {
    let done = cascade::cascade_delete(&state, &DocumentId::from(user_id), CascadeMode::User)
        .await?
        .ok_or_else(|| AppError::NotFound("Active cart not found".to_string()))?;
    Ok(Json(ApiResponse::success("Cart deleted", done, None)))
}
