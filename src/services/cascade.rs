use crate::{
    error::{AppError, AppResult},
    models::{Cart, CartItem},
    response::Success,
    services::cart_service,
    state::AppState,
    store::{DocumentId, Filter},
};

/// How the id handed to [`cascade_delete`] identifies the cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadeMode {
    /// The id is the cart owner's user id.
    User,
    /// The id is the cart's own id.
    Cart,
}

/// Deletes an active cart together with every line item that references it.
///
/// Items go first so a failure never leaves orphans behind a deleted cart, and
/// are swept once more after the cart is gone. Returns `None` when there is no
/// active cart to delete.
pub async fn cascade_delete(
    state: &AppState,
    id: &DocumentId,
    mode: CascadeMode,
) -> AppResult<Option<Success>> {
    let cart = match mode {
        CascadeMode::User => cart_service::get_active_cart(state, id).await?,
        CascadeMode::Cart => cart_service::get_cart_by_id(state, id).await?,
    };
    let Some(cart) = cart else {
        tracing::debug!(%id, ?mode, "no active cart to delete");
        return Ok(None);
    };

    let items = state
        .repo
        .delete_many::<CartItem>(&Filter::new().id("cart._id", &cart.id))
        .await?;

    let deleted = state
        .repo
        .delete_one::<Cart>(&Filter::new().eq("_id", cart.id.as_str()))
        .await?;
    if deleted != 1 {
        tracing::warn!(cart_id = %cart.id, deleted, "cart vanished during cascade delete");
        return Err(AppError::DeleteFailed(
            "Failed to delete the user cart".to_string(),
        ));
    }

    // Adds racing the cart delete may have landed after the first sweep.
    let late = state
        .repo
        .delete_many::<CartItem>(&Filter::new().id("cart._id", &cart.id))
        .await?;
    if late > 0 {
        tracing::warn!(cart_id = %cart.id, late, "swept items added during cascade delete");
    }

    tracing::info!(
        cart_id = %cart.id,
        user_id = %cart.user.id,
        items = items + late,
        "cart deleted with its items"
    );
    Ok(Some(Success::new("Deleted the user cart")))
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::{
        dto::cart::{CartPatch, CreateCartRequest},
        models::{Address, Product, User},
        services::cart_item_service::{self, RequestedQuantity},
        store::FindOptions,
    };

    async fn seed(state: &AppState) -> (DocumentId, Cart) {
        let user = User {
            id: DocumentId::generate(),
            name: "ferris".into(),
            email: "ferris@example.com".into(),
            pwd: "x".into(),
            address: vec![Address {
                street: "1 Crab Lane".into(),
                zipcode: "10001".into(),
                district: "Harbor".into(),
                city: "Rustville".into(),
                state: "RS".into(),
                is_delivery: true,
            }],
            version: 0,
        };
        let user_id = state.repo.insert(&user).await.unwrap();
        let product = Product {
            id: DocumentId::generate(),
            name: "Ferris Mug".into(),
            description: String::new(),
            price: Decimal::new(999, 2),
        };
        state.repo.insert(&product).await.unwrap();

        let cart = cart_service::create_cart(state, &user_id, CreateCartRequest::default())
            .await
            .unwrap();
        cart_item_service::add_or_merge_item(state, &cart.id, product, RequestedQuantity::new(2))
            .await
            .unwrap();
        (user_id, cart)
    }

    async fn items_of(state: &AppState, cart_id: &DocumentId) -> Vec<CartItem> {
        state
            .repo
            .find_many(&Filter::new().id("cart._id", cart_id), FindOptions::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn cart_mode_deletes_cart_and_items() {
        let state = AppState::in_memory();
        let (user_id, cart) = seed(&state).await;

        let done = cascade_delete(&state, &cart.id, CascadeMode::Cart)
            .await
            .unwrap();
        assert_eq!(done.map(|s| s.msg), Some("Deleted the user cart".to_string()));
        assert!(cart_service::get_active_cart(&state, &user_id).await.unwrap().is_none());
        assert!(items_of(&state, &cart.id).await.is_empty());
    }

    #[tokio::test]
    async fn user_without_cart_is_a_noop() {
        let state = AppState::in_memory();
        let done = cascade_delete(&state, &DocumentId::generate(), CascadeMode::User)
            .await
            .unwrap();
        assert!(done.is_none());
    }

    #[tokio::test]
    async fn paid_carts_are_left_alone() {
        let state = AppState::in_memory();
        let (user_id, cart) = seed(&state).await;
        cart_service::update_cart(
            &state,
            &user_id,
            CartPatch {
                paid: Some(true),
                ..CartPatch::default()
            },
        )
        .await
        .unwrap();

        assert!(cascade_delete(&state, &user_id, CascadeMode::User).await.unwrap().is_none());
        assert!(cascade_delete(&state, &cart.id, CascadeMode::Cart).await.unwrap().is_none());
        assert_eq!(items_of(&state, &cart.id).await.len(), 1);
    }
}
