//! Keeps line items and their cart's aggregates in step.
//!
//! The store cannot update a cart and an item atomically, so every mutation
//! runs the same cycle: read both, write the aggregate delta against the cart
//! version, then write the item against its own version. When the item write
//! loses a race the applied delta is reversed and the cycle starts over.

use rust_decimal::Decimal;
use serde_json::Value;

use crate::{
    error::{AppError, AppResult},
    models::{Cart, CartItem, Product, line_total},
    services::cart_service::{self, AggregateChange},
    state::AppState,
    store::{DocumentId, Filter, FindOptions, StoreError, Update},
};

pub const MAX_RECONCILE_ATTEMPTS: usize = 8;

pub const MAX_LISTED_ITEMS: u64 = 100;

/// A client-supplied quantity, already coerced to a whole number ≥ 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestedQuantity(i64);

impl RequestedQuantity {
    pub fn new(quantity: i64) -> Self {
        Self(quantity.max(1))
    }

    pub fn get(self) -> i64 {
        self.0
    }

    /// Missing, null, fractional, non-positive and non-numeric inputs all
    /// count as 1.
    pub fn from_json(value: Option<&Value>) -> Self {
        match value {
            Some(Value::Number(number)) => number.as_i64().map_or(Self(1), Self::new),
            Some(Value::String(raw)) => Self::parse(raw),
            _ => Self(1),
        }
    }

    /// Digits only; anything else counts as 1.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Self(1);
        }
        raw.parse::<i64>().map_or(Self(1), Self::new)
    }
}

impl Default for RequestedQuantity {
    fn default() -> Self {
        Self(1)
    }
}

/// Result of taking units out of a cart.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoveOutcome {
    Updated(CartItem),
    /// The line item is gone; callers send the client back to the owner's cart.
    Removed { user_id: DocumentId },
}

async fn resolve_cart(state: &AppState, cart_id: &DocumentId) -> AppResult<Cart> {
    cart_service::get_cart_by_id(state, cart_id)
        .await?
        .ok_or_else(AppError::unknown_cart)
}

async fn find_item(
    state: &AppState,
    cart: &Cart,
    product_id: &DocumentId,
) -> AppResult<Option<CartItem>> {
    let filter = Filter::new()
        .id("cart._id", &cart.id)
        .id("product._id", product_id);
    Ok(state.repo.find_one(&filter).await?)
}

async fn reread_item(state: &AppState, item_id: &DocumentId) -> AppResult<CartItem> {
    state
        .repo
        .find_one(&Filter::new().id("_id", item_id))
        .await?
        .ok_or_else(|| AppError::NotFound("Cart item not found".to_string()))
}

fn item_guard(item: &CartItem) -> Filter {
    Filter::new()
        .eq("_id", item.id.as_str())
        .eq("version", item.version)
}

fn priced(unit_price: Decimal, quantity: i64) -> AppResult<Decimal> {
    line_total(unit_price, quantity)
        .ok_or_else(|| AppError::Validation("Item price out of range".to_string()))
}

/// Reverses a committed aggregate change. Contention alone never stops a
/// compensation: every lost round means another writer committed.
async fn compensate(
    state: &AppState,
    cart_id: &DocumentId,
    change: &AggregateChange,
) -> AppResult<()> {
    loop {
        match cart_service::apply_aggregate_delta(
            state,
            cart_id,
            -change.applied_price(),
            -change.applied_quantity(),
        )
        .await
        {
            Err(AppError::ConflictOrNoop(_)) => {
                tracing::warn!(cart_id = %cart_id, "compensation contended, retrying");
                tokio::task::yield_now().await;
            }
            other => return other.map(|_| ()),
        }
    }
}

/// Deletes a freshly inserted item whose cart was cascade-deleted while the
/// insert was in flight. The cart's aggregates went with it, so there is
/// nothing to compensate.
async fn discard_if_orphaned(
    state: &AppState,
    cart_id: &DocumentId,
    item_id: &DocumentId,
) -> AppResult<()> {
    let cart = state
        .repo
        .find_one::<Cart>(&Filter::new().id("_id", cart_id))
        .await?;
    if cart.is_some() {
        return Ok(());
    }

    state
        .repo
        .delete_one::<CartItem>(&Filter::new().eq("_id", item_id.as_str()))
        .await?;
    tracing::warn!(
        cart_id = %cart_id,
        item_id = %item_id,
        "cart deleted mid-insert, item discarded"
    );
    Err(AppError::unknown_cart())
}

/// Adds `requested` units of `product` to the cart, merging into an existing
/// line item when there is one.
pub async fn add_or_merge_item(
    state: &AppState,
    cart_id: &DocumentId,
    product: Product,
    requested: RequestedQuantity,
) -> AppResult<CartItem> {
    if product.price < Decimal::ZERO {
        return Err(AppError::Validation(
            "Product price must not be negative".to_string(),
        ));
    }

    for attempt in 1..=MAX_RECONCILE_ATTEMPTS {
        let cart = resolve_cart(state, cart_id).await?;
        let existing = find_item(state, &cart, &product.id).await?;

        let (previous_price, quantity) = match &existing {
            Some(item) => (
                item.item_price,
                item.quantity
                    .checked_add(requested.get())
                    .ok_or_else(|| AppError::Validation("Quantity out of range".to_string()))?,
            ),
            None => (Decimal::ZERO, requested.get()),
        };
        let item_price = priced(product.price, quantity)?;

        let change = cart_service::apply_aggregate_delta(
            state,
            &cart.id,
            item_price - previous_price,
            requested.get(),
        )
        .await?;

        let written = match existing {
            Some(item) => {
                let next = CartItem {
                    product: product.clone(),
                    quantity,
                    item_price,
                    version: item.version + 1,
                    ..item.clone()
                };
                let update =
                    Update::pick(&next, &["product", "quantity", "item_price", "version"])?;
                state
                    .repo
                    .update_one::<CartItem>(&item_guard(&item), &update)
                    .await
                    .map(|result| (result.matched == 1).then_some(next.id))
            }
            None => {
                let item = CartItem::new(&cart, product.clone(), quantity, item_price);
                match state.repo.insert(&item).await {
                    Ok(id) => {
                        discard_if_orphaned(state, &cart.id, &id).await?;
                        Ok(Some(id))
                    }
                    Err(StoreError::DuplicateKey { .. }) => Ok(None),
                    Err(err) => Err(err),
                }
            }
        };

        match written {
            Ok(Some(item_id)) => {
                tracing::info!(
                    cart_id = %cart.id,
                    product_id = %product.id,
                    quantity,
                    "cart item saved"
                );
                return reread_item(state, &item_id).await;
            }
            Ok(None) => {
                tracing::warn!(
                    cart_id = %cart.id,
                    product_id = %product.id,
                    attempt,
                    "cart item changed underneath, compensating and retrying"
                );
                compensate(state, &cart.id, &change).await?;
                tokio::task::yield_now().await;
            }
            Err(err) => {
                if let Err(undo) = compensate(state, &cart.id, &change).await {
                    tracing::warn!(cart_id = %cart.id, error = %undo, "compensation failed");
                }
                return Err(err.into());
            }
        }
    }

    Err(AppError::ConflictOrNoop(
        "Cart item is being modified concurrently, try again".to_string(),
    ))
}

pub async fn get_cart_item(
    state: &AppState,
    cart_id: &DocumentId,
    product_id: &DocumentId,
) -> AppResult<Option<CartItem>> {
    let cart = resolve_cart(state, cart_id).await?;
    find_item(state, &cart, product_id).await
}

pub async fn list_cart_items(state: &AppState, cart_id: &DocumentId) -> AppResult<Vec<CartItem>> {
    let cart = resolve_cart(state, cart_id).await?;
    let items = state
        .repo
        .find_many(
            &Filter::new().id("cart._id", &cart.id),
            FindOptions::limit(MAX_LISTED_ITEMS),
        )
        .await?;
    Ok(items)
}

/// Takes up to `requested` units of a product out of the cart. Asking for at
/// least the held quantity deletes the line item.
pub async fn remove_quantity(
    state: &AppState,
    cart_id: &DocumentId,
    product_id: &DocumentId,
    requested: RequestedQuantity,
) -> AppResult<RemoveOutcome> {
    for attempt in 1..=MAX_RECONCILE_ATTEMPTS {
        let cart = resolve_cart(state, cart_id).await?;
        let item = find_item(state, &cart, product_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Cart item not found".to_string()))?;

        let removed = requested.get().min(item.quantity);
        let remaining = item.quantity - removed;

        if remaining >= 1 {
            let item_price = priced(item.product.price, remaining)?;
            let change = cart_service::apply_aggregate_delta(
                state,
                &cart.id,
                item_price - item.item_price,
                -removed,
            )
            .await?;

            let next = CartItem {
                quantity: remaining,
                item_price,
                version: item.version + 1,
                ..item.clone()
            };
            let update = Update::pick(&next, &["quantity", "item_price", "version"])?;
            match state
                .repo
                .update_one::<CartItem>(&item_guard(&item), &update)
                .await
            {
                Ok(result) if result.matched == 1 => {
                    tracing::info!(
                        cart_id = %cart.id,
                        product_id = %product_id,
                        remaining,
                        "cart item reduced"
                    );
                    return Ok(RemoveOutcome::Updated(reread_item(state, &item.id).await?));
                }
                Ok(_) => {
                    tracing::warn!(
                        cart_id = %cart.id,
                        attempt,
                        "cart item changed underneath, compensating and retrying"
                    );
                    compensate(state, &cart.id, &change).await?;
                }
                Err(err) => {
                    if let Err(undo) = compensate(state, &cart.id, &change).await {
                        tracing::warn!(cart_id = %cart.id, error = %undo, "compensation failed");
                    }
                    return Err(err.into());
                }
            }
        } else {
            let change = cart_service::apply_aggregate_delta(
                state,
                &cart.id,
                -item.item_price,
                -item.quantity,
            )
            .await?;

            match state
                .repo
                .delete_one::<CartItem>(&item_guard(&item))
                .await
            {
                Ok(1) => {
                    tracing::info!(
                        cart_id = %cart.id,
                        product_id = %product_id,
                        "cart item removed"
                    );
                    return Ok(RemoveOutcome::Removed {
                        user_id: cart.user.id,
                    });
                }
                Ok(_) => {
                    tracing::warn!(
                        cart_id = %cart.id,
                        attempt,
                        "cart item changed underneath, compensating and retrying"
                    );
                    compensate(state, &cart.id, &change).await?;
                }
                Err(err) => {
                    if let Err(undo) = compensate(state, &cart.id, &change).await {
                        tracing::warn!(cart_id = %cart.id, error = %undo, "compensation failed");
                    }
                    return Err(err.into());
                }
            }
        }
        tokio::task::yield_now().await;
    }

    Err(AppError::ConflictOrNoop(
        "Cart item is being modified concurrently, try again".to_string(),
    ))
}
