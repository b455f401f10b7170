use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::CartItem;

/// Body of an add-to-cart call. `quantity` is deliberately loose: anything
/// that is not a positive whole number counts as 1.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AddItemRequest {
    pub product_id: String,
    #[serde(default)]
    #[schema(value_type = Option<i64>)]
    pub quantity: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct RemoveItemQuery {
    pub quantity: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct CartItemList {
    #[schema(value_type = Vec<CartItem>)]
    pub items: Vec<CartItem>,
}
