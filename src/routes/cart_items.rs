use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::get,
};

use crate::{
    dto::cart_items::{AddItemRequest, CartItemList, RemoveItemQuery},
    error::{AppError, AppResult},
    models::CartItem,
    response::ApiResponse,
    services::{
        cart_item_service::{self, RemoveOutcome, RequestedQuantity},
        cart_service, product_service,
    },
    state::AppState,
    store::DocumentId,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/cart/{id}/item", get(list_items).put(add_item))
        .route("/cart/{id}/item/", get(list_items).put(add_item))
        .route(
            "/cart/{id}/item/{product_id}",
            get(get_item).delete(remove_item),
        )
}

#[utoipa::path(
    put,
    path = "/cart/{cart_id}/item/",
    params(("cart_id" = String, Path, description = "Cart ID")),
    request_body = AddItemRequest,
    responses(
        (status = 200, description = "Line item after the add", body = ApiResponse<CartItem>),
        (status = 404, description = "Unknown cart or product"),
        (status = 409, description = "Too much concurrent activity on the cart"),
    ),
    tag = "Cart Items"
)]
pub async fn add_item(
    State(state): State<AppState>,
    Path(cart_id): Path<String>,
    Json(payload): Json<AddItemRequest>,
) -> AppResult<Json<ApiResponse<CartItem>>> {
    let cart_id = DocumentId::from(cart_id);
    if cart_service::get_cart_by_id(&state, &cart_id).await?.is_none() {
        return Err(AppError::unknown_cart());
    }
    let product =
        product_service::find_product(&state, &DocumentId::from(payload.product_id)).await?;
    let requested = RequestedQuantity::from_json(payload.quantity.as_ref());

    let item = cart_item_service::add_or_merge_item(&state, &cart_id, product, requested).await?;
    Ok(Json(ApiResponse::success("Cart item", item, None)))
}

#[utoipa::path(
    get,
    path = "/cart/{cart_id}/item/",
    params(("cart_id" = String, Path, description = "Cart ID")),
    responses(
        (status = 200, description = "Line items of the cart", body = ApiResponse<CartItemList>),
        (status = 404, description = "Unknown cart"),
    ),
    tag = "Cart Items"
)]
pub async fn list_items(
    State(state): State<AppState>,
    Path(cart_id): Path<String>,
) -> AppResult<Json<ApiResponse<CartItemList>>> {
    let items = cart_item_service::list_cart_items(&state, &DocumentId::from(cart_id)).await?;
    Ok(Json(ApiResponse::success(
        "Cart items",
        CartItemList { items },
        None,
    )))
}

#[utoipa::path(
    get,
    path = "/cart/{cart_id}/item/{product_id}",
    params(
        ("cart_id" = String, Path, description = "Cart ID"),
        ("product_id" = String, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Line item", body = ApiResponse<CartItem>),
        (status = 404, description = "Unknown cart or no such item"),
    ),
    tag = "Cart Items"
)]
pub async fn get_item(
    State(state): State<AppState>,
    Path((cart_id, product_id)): Path<(String, String)>,
) -> AppResult<Json<ApiResponse<CartItem>>> {
    let item = cart_item_service::get_cart_item(
        &state,
        &DocumentId::from(cart_id),
        &DocumentId::from(product_id),
    )
    .await?
    .ok_or_else(|| AppError::NotFound("Cart item not found".to_string()))?;
    Ok(Json(ApiResponse::success("Cart item", item, None)))
}

#[utoipa::path(
    delete,
    path = "/cart/{cart_id}/item/{product_id}",
    params(
        ("cart_id" = String, Path, description = "Cart ID"),
        ("product_id" = String, Path, description = "Product ID"),
        ("quantity" = Option<String>, Query, description = "Units to remove, default 1")
    ),
    responses(
        (status = 200, description = "Line item after the removal", body = ApiResponse<CartItem>),
        (status = 303, description = "Line item deleted, redirects to the owner's cart"),
        (status = 404, description = "Unknown cart or no such item"),
    ),
    tag = "Cart Items"
)]
pub async fn remove_item(
    State(state): State<AppState>,
    Path((cart_id, product_id)): Path<(String, String)>,
    Query(query): Query<RemoveItemQuery>,
) -> AppResult<Response> {
    let requested = query
        .quantity
        .as_deref()
        .map(RequestedQuantity::parse)
        .unwrap_or_default();

    let outcome = cart_item_service::remove_quantity(
        &state,
        &DocumentId::from(cart_id),
        &DocumentId::from(product_id),
        requested,
    )
    .await?;

    Ok(match outcome {
        RemoveOutcome::Updated(item) => {
            Json(ApiResponse::success("Cart item", item, None)).into_response()
        }
        RemoveOutcome::Removed { user_id } => {
            Redirect::to(&format!("/cart/{user_id}")).into_response()
        }
    })
}
