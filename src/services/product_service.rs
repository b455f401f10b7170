use rust_decimal::Decimal;

use crate::{
    dto::products::{
        CreateProductRequest, CreateProducts, CreatedProducts, ProductList, UpdateProductRequest,
    },
    error::{AppError, AppResult},
    models::{MAX_MONEY, Product, in_money_range, round_money},
    response::ApiResponse,
    state::AppState,
    store::{DocumentId, Filter, FindOptions, Update},
};

const MAX_LISTED_PRODUCTS: u64 = 100;

fn check_request(payload: &CreateProductRequest) -> AppResult<()> {
    if payload.name.trim().is_empty() {
        return Err(AppError::Validation("name must not be empty".to_string()));
    }
    check_price(payload.price).map(|_| ())
}

fn check_price(price: Decimal) -> AppResult<Decimal> {
    if price < Decimal::ZERO {
        return Err(AppError::Validation(
            "price must not be negative".to_string(),
        ));
    }
    let price = round_money(price);
    if !in_money_range(price) {
        return Err(AppError::Validation(format!(
            "price must not exceed {MAX_MONEY}"
        )));
    }
    Ok(price)
}

pub async fn find_product(state: &AppState, product_id: &DocumentId) -> AppResult<Product> {
    state
        .repo
        .find_one(&Filter::new().id("_id", product_id))
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))
}

async fn insert_product(state: &AppState, payload: CreateProductRequest) -> AppResult<Product> {
    check_request(&payload)?;
    let product = Product {
        id: DocumentId::generate(),
        name: payload.name,
        description: payload.description,
        price: check_price(payload.price)?,
    };
    let id = state.repo.insert(&product).await?;
    tracing::info!(product_id = %id, "product created");
    find_product(state, &id).await
}

pub async fn create_products(
    state: &AppState,
    payload: CreateProducts,
) -> AppResult<ApiResponse<CreatedProducts>> {
    let created = match payload {
        CreateProducts::One(one) => CreatedProducts::One(insert_product(state, one).await?),
        CreateProducts::Many(many) => {
            // Validate the whole batch up front so a bad entry inserts nothing.
            for entry in &many {
                check_request(entry)?;
            }
            let mut products = Vec::with_capacity(many.len());
            for entry in many {
                products.push(insert_product(state, entry).await?);
            }
            CreatedProducts::Many(products)
        }
    };
    Ok(ApiResponse::success("Product created", created, None))
}

pub async fn list_products(state: &AppState) -> AppResult<ApiResponse<ProductList>> {
    let items = state
        .repo
        .find_many(&Filter::new(), FindOptions::limit(MAX_LISTED_PRODUCTS))
        .await?;
    Ok(ApiResponse::success("Products", ProductList { items }, None))
}

pub async fn get_product(
    state: &AppState,
    product_id: &DocumentId,
) -> AppResult<ApiResponse<Product>> {
    let product = find_product(state, product_id).await?;
    Ok(ApiResponse::success("Product", product, None))
}

/// Line items keep their snapshot until the product is next added to a cart.
pub async fn update_product(
    state: &AppState,
    product_id: &DocumentId,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    let mut product = find_product(state, product_id).await?;
    let mut fields = Vec::new();
    if let Some(name) = payload.name {
        product.name = name;
        fields.push("name");
    }
    if let Some(description) = payload.description {
        product.description = description;
        fields.push("description");
    }
    if let Some(price) = payload.price {
        product.price = check_price(price)?;
        fields.push("price");
    }

    if !fields.is_empty() {
        let update = Update::pick(&product, &fields)?;
        let result = state
            .repo
            .update_one::<Product>(&Filter::new().eq("_id", product.id.as_str()), &update)
            .await?;
        if result.matched == 0 {
            return Err(AppError::NotFound("Product not found".to_string()));
        }
        tracing::info!(product_id = %product.id, ?fields, "product updated");
    }

    let product = find_product(state, &product.id).await?;
    Ok(ApiResponse::success("Product updated", product, None))
}

pub async fn delete_product(state: &AppState, product_id: &DocumentId) -> AppResult<()> {
    let deleted = state
        .repo
        .delete_one::<Product>(&Filter::new().id("_id", product_id))
        .await?;
    if deleted == 0 {
        return Err(AppError::NotFound("Product not found".to_string()));
    }
    tracing::info!(product_id = %product_id, "product deleted");
    Ok(())
}
