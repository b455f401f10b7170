use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::Redirect,
    routing::get,
};

use crate::{
    dto::products::{CreateProducts, CreatedProducts, ProductList, UpdateProductRequest},
    error::AppResult,
    models::Product,
    response::ApiResponse,
    services::product_service,
    state::AppState,
    store::DocumentId,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products).post(create_products))
        .route("/products/", get(list_products).post(create_products))
        .route(
            "/products/{product_id}",
            get(get_product).put(update_product).delete(delete_product),
        )
}

#[utoipa::path(
    get,
    path = "/products/",
    responses(
        (status = 200, description = "List products", body = ApiResponse<ProductList>)
    ),
    tag = "Products"
)]
pub async fn list_products(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    let resp = product_service::list_products(&state).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/products/{product_id}",
    params(("product_id" = String, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Get product", body = ApiResponse<Product>),
        (status = 404, description = "Product not found"),
    ),
    tag = "Products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let resp = product_service::get_product(&state, &DocumentId::from(product_id)).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/products/",
    request_body = CreateProducts,
    responses(
        (status = 201, description = "Create one product or a batch", body = ApiResponse<CreatedProducts>),
        (status = 422, description = "Invalid product"),
    ),
    tag = "Products"
)]
pub async fn create_products(
    State(state): State<AppState>,
    Json(payload): Json<CreateProducts>,
) -> AppResult<(StatusCode, Json<ApiResponse<CreatedProducts>>)> {
    let resp = product_service::create_products(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    put,
    path = "/products/{product_id}",
    params(("product_id" = String, Path, description = "Product ID")),
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Update product", body = ApiResponse<Product>),
        (status = 404, description = "Product not found"),
    ),
    tag = "Products"
)]
pub async fn update_product(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
    Json(payload): Json<UpdateProductRequest>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let resp =
        product_service::update_product(&state, &DocumentId::from(product_id), payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/products/{product_id}",
    params(("product_id" = String, Path, description = "Product ID")),
    responses(
        (status = 303, description = "Deleted, redirects to the catalogue"),
        (status = 404, description = "Product not found"),
    ),
    tag = "Products"
)]
pub async fn delete_product(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> AppResult<Redirect> {
    product_service::delete_product(&state, &DocumentId::from(product_id)).await?;
    Ok(Redirect::to("/products/"))
}
