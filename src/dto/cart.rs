use serde::Deserialize;
use utoipa::ToSchema;

use crate::models::Address;

/// Optional fields for a new cart. Aggregates are never client-supplied.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CreateCartRequest {
    pub address: Option<Address>,
    pub authority: Option<String>,
}

/// Partial cart update; absent fields are left untouched.
#[derive(Debug, Default, Clone, Deserialize, ToSchema)]
pub struct CartPatch {
    pub paid: Option<bool>,
    pub address: Option<Address>,
    pub authority: Option<String>,
}

impl CartPatch {
    pub fn is_empty(&self) -> bool {
        self.paid.is_none() && self.address.is_none() && self.authority.is_none()
    }
}
