//! Cart lifecycle and the only code path that writes cart aggregates.

use chrono::Utc;
use rust_decimal::Decimal;

use crate::{
    dto::cart::{CartPatch, CreateCartRequest},
    error::{AppError, AppResult},
    models::{Aggregates, Cart, CartOwner, User, in_money_range, round_money},
    state::AppState,
    store::{DocumentId, Filter, StoreError, Update},
};

/// Attempts a single aggregate write gets before reporting contention.
pub const MAX_AGGREGATE_ATTEMPTS: usize = 16;

pub const MAX_AUTHORITY_LEN: usize = 100;

/// Aggregates observed immediately before and after one committed write.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateChange {
    pub before: Aggregates,
    pub after: Aggregates,
    pub cart: Cart,
}

impl AggregateChange {
    /// Price delta that actually landed, after clamping at zero.
    pub fn applied_price(&self) -> Decimal {
        self.after.price - self.before.price
    }

    pub fn applied_quantity(&self) -> i64 {
        self.after.items_quantity - self.before.items_quantity
    }
}

fn active_by_owner(user_id: &DocumentId) -> Filter {
    Filter::new().id("user._id", user_id).eq("paid", false)
}

fn active_by_id(cart_id: &DocumentId) -> Filter {
    Filter::new().id("_id", cart_id).eq("paid", false)
}

fn check_authority(authority: Option<&String>) -> AppResult<()> {
    match authority {
        Some(value) if value.chars().count() > MAX_AUTHORITY_LEN => Err(AppError::Validation(
            format!("authority must be at most {MAX_AUTHORITY_LEN} characters"),
        )),
        _ => Ok(()),
    }
}

pub async fn get_active_cart(state: &AppState, user_id: &DocumentId) -> AppResult<Option<Cart>> {
    Ok(state.repo.find_one(&active_by_owner(user_id)).await?)
}

/// Looks up an active cart by identity, accepting either stored encoding.
pub async fn get_cart_by_id(state: &AppState, cart_id: &DocumentId) -> AppResult<Option<Cart>> {
    Ok(state.repo.find_one(&active_by_id(cart_id)).await?)
}

/// Returns the user's active cart, creating it first when there is none.
pub async fn create_cart(
    state: &AppState,
    user_id: &DocumentId,
    payload: CreateCartRequest,
) -> AppResult<Cart> {
    if let Some(cart) = get_active_cart(state, user_id).await? {
        return Ok(cart);
    }

    let user: User = state
        .repo
        .find_one(&Filter::new().id("_id", user_id))
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    check_authority(payload.authority.as_ref())?;
    let address = payload
        .address
        .or_else(|| user.delivery_address().cloned())
        .ok_or_else(|| {
            AppError::Validation("No delivery address given and none registered".to_string())
        })?;

    let cart = Cart {
        id: DocumentId::generate(),
        user: CartOwner::from(&user),
        price: Decimal::ZERO,
        paid: false,
        address,
        authority: payload.authority,
        items_quantity: 0,
        created_at: Utc::now(),
        version: 0,
    };

    match state.repo.insert(&cart).await {
        Ok(id) => {
            tracing::info!(cart_id = %id, user_id = %user.id, "cart created");
            get_cart_by_id(state, &id)
                .await?
                .ok_or_else(|| AppError::NotFound("Cart not found".to_string()))
        }
        Err(StoreError::DuplicateKey { .. }) => {
            tracing::warn!(user_id = %user.id, "concurrent cart creation, returning the winner");
            get_active_cart(state, &user.id).await?.ok_or_else(|| {
                AppError::ConflictOrNoop("Cart creation raced with a deletion".to_string())
            })
        }
        Err(err) => Err(err.into()),
    }
}

/// Writes the present fields of `patch` to the user's active cart.
pub async fn update_cart(
    state: &AppState,
    user_id: &DocumentId,
    patch: CartPatch,
) -> AppResult<Cart> {
    let cart = get_active_cart(state, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Active cart not found".to_string()))?;
    if patch.is_empty() {
        return Ok(cart);
    }
    check_authority(patch.authority.as_ref())?;

    let mut next = cart.clone();
    let mut fields = Vec::new();
    if let Some(paid) = patch.paid {
        next.paid = paid;
        fields.push("paid");
    }
    if let Some(address) = patch.address {
        next.address = address;
        fields.push("address");
    }
    if let Some(authority) = patch.authority {
        next.authority = Some(authority);
        fields.push("authority");
    }

    let update = Update::pick(&next, &fields)?;
    let result = state
        .repo
        .update_one::<Cart>(&active_by_id(&cart.id), &update)
        .await?;
    if result.matched == 0 {
        return Err(AppError::NotFound("Active cart not found".to_string()));
    }
    tracing::info!(cart_id = %cart.id, ?fields, "cart updated");

    state
        .repo
        .find_one(&Filter::new().id("_id", &cart.id))
        .await?
        .ok_or_else(|| AppError::NotFound("Cart not found".to_string()))
}

/// Adds the deltas to the cart aggregates with a version-conditioned write.
///
/// Price lands at `max(0, round(price + delta))` and quantity at
/// `max(0, quantity + delta)`; callers compensate with the applied change,
/// not the requested one.
pub async fn apply_aggregate_delta(
    state: &AppState,
    cart_id: &DocumentId,
    price_delta: Decimal,
    quantity_delta: i64,
) -> AppResult<AggregateChange> {
    for attempt in 1..=MAX_AGGREGATE_ATTEMPTS {
        let cart = get_cart_by_id(state, cart_id)
            .await?
            .ok_or_else(AppError::unknown_cart)?;
        let before = cart.aggregates();
        let price = before
            .price
            .checked_add(price_delta)
            .map(round_money)
            .filter(|price| in_money_range(*price))
            .ok_or_else(|| AppError::Validation("Cart price out of range".to_string()))?;
        let after = Aggregates {
            price: price.max(Decimal::ZERO),
            items_quantity: before.items_quantity.saturating_add(quantity_delta).max(0),
        };

        let mut next = cart.clone();
        next.price = after.price;
        next.items_quantity = after.items_quantity;
        next.version = cart.version + 1;
        let update = Update::pick(&next, &["price", "items_quantity", "version"])?;
        let guard = Filter::new()
            .eq("_id", cart.id.as_str())
            .eq("version", cart.version)
            .eq("paid", false);

        let result = state.repo.update_one::<Cart>(&guard, &update).await?;
        if result.matched == 1 {
            tracing::debug!(
                cart_id = %cart.id,
                price = %after.price,
                items_quantity = after.items_quantity,
                version = next.version,
                "cart aggregates updated"
            );
            return Ok(AggregateChange {
                before,
                after,
                cart: next,
            });
        }

        tracing::debug!(
            cart_id = %cart.id,
            attempt,
            "cart version moved, retrying aggregate write"
        );
        tokio::task::yield_now().await;
    }

    tracing::warn!(cart_id = %cart_id, "aggregate write gave up after repeated conflicts");
    Err(AppError::ConflictOrNoop(
        "Cart is being modified concurrently, try again".to_string(),
    ))
}
