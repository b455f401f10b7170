use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::Product;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateProductRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
}

/// Either a single product or a batch; the response mirrors the shape.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum CreateProducts {
    Many(Vec<CreateProductRequest>),
    One(CreateProductRequest),
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(untagged)]
pub enum CreatedProducts {
    Many(Vec<Product>),
    One(Product),
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    #[schema(value_type = Option<f64>)]
    pub price: Option<Decimal>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct ProductList {
    #[schema(value_type = Vec<Product>)]
    pub items: Vec<Product>,
}
