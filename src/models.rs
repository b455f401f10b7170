use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::store::{Collection, Document, DocumentId};

/// Rounds a money amount to cents, half away from zero.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Largest amount stored, in either direction. Money travels as a JSON number,
/// and every cent up to here survives the trip through `f64` unchanged.
// 9_999_999_999_999.99 (mantissa 999_999_999_999_999, scale 2); `Decimal::new` is not const.
pub const MAX_MONEY: Decimal = Decimal::from_parts(0xA4C6_7FFF, 0x0003_8D7E, 0, false, 2);

pub fn in_money_range(amount: Decimal) -> bool {
    amount.abs() <= MAX_MONEY
}

/// `unit_price × quantity`, rounded to cents. `None` on overflow or past
/// [`MAX_MONEY`].
pub fn line_total(unit_price: Decimal, quantity: i64) -> Option<Decimal> {
    unit_price
        .checked_mul(Decimal::from(quantity))
        .map(round_money)
        .filter(|total| in_money_range(*total))
}

/// Serde adapter for stored money: a JSON number on the wire, read back
/// through its shortest decimal form so cents never drift.
pub mod money {
    use std::str::FromStr;

    use rust_decimal::Decimal;
    use serde::{Deserialize, Deserializer, Serializer, de, ser};

    pub fn serialize<S: Serializer>(amount: &Decimal, serializer: S) -> Result<S::Ok, S::Error> {
        let value: f64 = amount.to_string().parse().map_err(ser::Error::custom)?;
        serializer.serialize_f64(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Decimal, D::Error> {
        let value = f64::deserialize(deserializer)?;
        Decimal::from_str(&value.to_string()).map_err(de::Error::custom)
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Address {
    pub street: String,
    pub zipcode: String,
    pub district: String,
    pub city: String,
    pub state: String,
    #[serde(default = "default_true")]
    pub is_delivery: bool,
}

/// Stored user document. `pwd` holds the Argon2 hash and is never returned by
/// the API (see `dto::users::UserResponse`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: DocumentId,
    pub name: String,
    pub email: String,
    pub pwd: String,
    #[serde(default)]
    pub address: Vec<Address>,
    /// Bumped on every address-list write; writers condition on it.
    #[serde(default)]
    pub version: i64,
}

impl User {
    pub fn delivery_address(&self) -> Option<&Address> {
        self.address.iter().find(|a| a.is_delivery)
    }
}

impl Document for User {
    const COLLECTION: Collection = Collection::Users;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Product {
    #[serde(rename = "_id")]
    #[schema(value_type = String)]
    pub id: DocumentId,
    pub name: String,
    pub description: String,
    #[serde(with = "money")]
    #[schema(value_type = f64)]
    pub price: Decimal,
}

impl Document for Product {
    const COLLECTION: Collection = Collection::Products;
}

/// Owner snapshot embedded in a cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CartOwner {
    #[serde(rename = "_id")]
    #[schema(value_type = String)]
    pub id: DocumentId,
    pub name: String,
    pub email: String,
}

impl From<&User> for CartOwner {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
        }
    }
}

/// The aggregate fields a cart derives from its line items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Aggregates {
    pub price: Decimal,
    pub items_quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Cart {
    #[serde(rename = "_id")]
    #[schema(value_type = String)]
    pub id: DocumentId,
    pub user: CartOwner,
    #[serde(with = "money")]
    #[schema(value_type = f64)]
    pub price: Decimal,
    pub paid: bool,
    pub address: Address,
    pub authority: Option<String>,
    pub items_quantity: i64,
    pub created_at: DateTime<Utc>,
    /// Bumped on every aggregate write; writers condition on it.
    #[serde(default)]
    pub version: i64,
}

impl Cart {
    pub fn aggregates(&self) -> Aggregates {
        Aggregates {
            price: self.price,
            items_quantity: self.items_quantity,
        }
    }
}

impl Document for Cart {
    const COLLECTION: Collection = Collection::Carts;
}

/// Reference from a line item to its cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CartRef {
    #[serde(rename = "_id")]
    #[schema(value_type = String)]
    pub id: DocumentId,
    #[schema(value_type = String)]
    pub user_id: DocumentId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CartItem {
    #[serde(rename = "_id")]
    #[schema(value_type = String)]
    pub id: DocumentId,
    pub cart: CartRef,
    pub product: Product,
    pub quantity: i64,
    #[serde(with = "money")]
    #[schema(value_type = f64)]
    pub item_price: Decimal,
    #[serde(default)]
    pub version: i64,
}

impl CartItem {
    pub fn new(cart: &Cart, product: Product, quantity: i64, item_price: Decimal) -> Self {
        Self {
            id: DocumentId::generate(),
            cart: CartRef {
                id: cart.id.clone(),
                user_id: cart.user.id.clone(),
            },
            product,
            quantity,
            item_price,
            version: 0,
        }
    }
}

impl Document for CartItem {
    const COLLECTION: Collection = Collection::CartItems;
}
