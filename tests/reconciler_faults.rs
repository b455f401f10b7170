//! Drives the reconciler through a store that misbehaves on purpose.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::Value;
use shopping_cart_api::{
    dto::cart::CreateCartRequest,
    error::AppError,
    models::{Address, Cart, CartItem, Product, User},
    services::{
        cart_item_service::{self, RequestedQuantity},
        cart_service,
        cascade::{self, CascadeMode},
    },
    state::AppState,
    store::{
        Collection, DocumentId, DocumentStore, Filter, FindOptions, MemoryStore, StoreError,
        StoreResult, Update, UpdateResult,
    },
};

#[derive(Default)]
struct FaultyStore {
    inner: MemoryStore,
    /// Bump the target item's version right before the next item update,
    /// as if another writer got there first.
    race_next_item_update: AtomicBool,
    fail_cart_updates: AtomicBool,
    fail_item_inserts: AtomicBool,
    /// Delete the cart and its items right before the next item insert.
    drop_cart_before_item_insert: AtomicBool,
    /// Slip this item in right before the next cart delete.
    item_before_cart_delete: Mutex<Option<Value>>,
    skip_cart_deletes: AtomicBool,
    item_updates: AtomicUsize,
}

fn injected() -> StoreError {
    StoreError::InvalidDocument("injected failure".into())
}

#[async_trait]
impl DocumentStore for FaultyStore {
    async fn find_one(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> StoreResult<Option<Value>> {
        self.inner.find_one(collection, filter).await
    }

    async fn find_many(
        &self,
        collection: Collection,
        filter: &Filter,
        options: FindOptions,
    ) -> StoreResult<Vec<Value>> {
        self.inner.find_many(collection, filter, options).await
    }

    async fn insert_one(&self, collection: Collection, document: Value) -> StoreResult<DocumentId> {
        if collection == Collection::CartItems {
            if self.fail_item_inserts.load(Ordering::SeqCst) {
                return Err(injected());
            }
            if self.drop_cart_before_item_insert.swap(false, Ordering::SeqCst) {
                let cart_id = document["cart"]["_id"].clone();
                self.inner
                    .delete_many(collection, &Filter::new().eq("cart._id", cart_id.clone()))
                    .await?;
                self.inner
                    .delete_one(Collection::Carts, &Filter::new().eq("_id", cart_id))
                    .await?;
            }
        }
        self.inner.insert_one(collection, document).await
    }

    async fn update_one(
        &self,
        collection: Collection,
        filter: &Filter,
        update: &Update,
    ) -> StoreResult<UpdateResult> {
        match collection {
            Collection::Carts if self.fail_cart_updates.load(Ordering::SeqCst) => {
                return Err(injected());
            }
            Collection::CartItems => {
                self.item_updates.fetch_add(1, Ordering::SeqCst);
                if self.race_next_item_update.swap(false, Ordering::SeqCst) {
                    let id = filter
                        .clauses()
                        .iter()
                        .find(|clause| clause.path == "_id")
                        .and_then(|clause| clause.any_of.first().cloned())
                        .expect("item update filters on _id");
                    let current = self
                        .inner
                        .find_one(collection, &Filter::new().eq("_id", id.clone()))
                        .await?
                        .expect("item exists");
                    let bumped = current["version"].as_i64().unwrap_or(0) + 1;
                    self.inner
                        .update_one(
                            collection,
                            &Filter::new().eq("_id", id),
                            &Update::new().set("version", bumped),
                        )
                        .await?;
                }
            }
            _ => {}
        }
        self.inner.update_one(collection, filter, update).await
    }

    async fn delete_one(&self, collection: Collection, filter: &Filter) -> StoreResult<u64> {
        if collection == Collection::Carts {
            if self.skip_cart_deletes.load(Ordering::SeqCst) {
                return Ok(0);
            }
            let late = self.item_before_cart_delete.lock().expect("lock").take();
            if let Some(item) = late {
                self.inner.insert_one(Collection::CartItems, item).await?;
            }
        }
        self.inner.delete_one(collection, filter).await
    }

    async fn delete_many(&self, collection: Collection, filter: &Filter) -> StoreResult<u64> {
        self.inner.delete_many(collection, filter).await
    }
}

async fn setup() -> anyhow::Result<(Arc<FaultyStore>, AppState, Cart, Product)> {
    let store = Arc::new(FaultyStore::default());
    let state = AppState::new(store.clone());

    let user = User {
        id: DocumentId::generate(),
        name: "ferris".into(),
        email: "ferris@example.com".into(),
        pwd: "not-a-real-hash".into(),
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
    state.repo.insert(&user).await?;

    let product = Product {
        id: DocumentId::generate(),
        name: "Ferris Mug".into(),
        description: "Coffee tastes better with Ferris".into(),
        price: Decimal::new(999, 2),
    };
    state.repo.insert(&product).await?;

    let cart = cart_service::create_cart(&state, &user.id, CreateCartRequest::default()).await?;
    Ok((store, state, cart, product))
}

async fn read_cart(state: &AppState, cart_id: &DocumentId) -> Cart {
    cart_service::get_cart_by_id(state, cart_id)
        .await
        .expect("read cart")
        .expect("cart exists")
}

async fn items(state: &AppState, cart_id: &DocumentId) -> Vec<CartItem> {
    state
        .repo
        .find_many(&Filter::new().id("cart._id", cart_id), FindOptions::default())
        .await
        .expect("list items")
}

#[tokio::test]
async fn lost_item_race_is_compensated_and_retried() -> anyhow::Result<()> {
    let (store, state, cart, product) = setup().await?;
    cart_item_service::add_or_merge_item(
        &state,
        &cart.id,
        product.clone(),
        RequestedQuantity::new(2),
    )
    .await?;

    store.race_next_item_update.store(true, Ordering::SeqCst);
    let item =
        cart_item_service::add_or_merge_item(&state, &cart.id, product, RequestedQuantity::new(3))
            .await?;

    // One write lost the race, the retry landed.
    assert_eq!(store.item_updates.load(Ordering::SeqCst), 2);
    assert_eq!(item.quantity, 5);
    assert_eq!(item.item_price, Decimal::new(4995, 2));

    let current = read_cart(&state, &cart.id).await;
    assert_eq!(current.price, Decimal::new(4995, 2));
    assert_eq!(current.items_quantity, 5);
    Ok(())
}

#[tokio::test]
async fn lost_race_on_partial_removal_is_compensated() -> anyhow::Result<()> {
    let (store, state, cart, product) = setup().await?;
    cart_item_service::add_or_merge_item(
        &state,
        &cart.id,
        product.clone(),
        RequestedQuantity::new(5),
    )
    .await?;

    store.race_next_item_update.store(true, Ordering::SeqCst);
    cart_item_service::remove_quantity(&state, &cart.id, &product.id, RequestedQuantity::new(2))
        .await?;

    let current = read_cart(&state, &cart.id).await;
    let held = items(&state, &cart.id).await;
    assert_eq!(held.len(), 1);
    assert_eq!(held[0].quantity, 3);
    assert_eq!(current.items_quantity, 3);
    assert_eq!(current.price, held[0].item_price);
    Ok(())
}

#[tokio::test]
async fn failed_aggregate_write_leaves_item_untouched() -> anyhow::Result<()> {
    let (store, state, cart, product) = setup().await?;

    store.fail_cart_updates.store(true, Ordering::SeqCst);
    let err =
        cart_item_service::add_or_merge_item(&state, &cart.id, product, RequestedQuantity::new(1))
            .await
            .unwrap_err();
    assert!(matches!(err, AppError::Store(_)));
    store.fail_cart_updates.store(false, Ordering::SeqCst);

    assert!(items(&state, &cart.id).await.is_empty());
    let current = read_cart(&state, &cart.id).await;
    assert_eq!(current.price, Decimal::ZERO);
    assert_eq!(current.items_quantity, 0);
    Ok(())
}

#[tokio::test]
async fn failed_item_insert_rolls_back_aggregates() -> anyhow::Result<()> {
    let (store, state, cart, product) = setup().await?;

    store.fail_item_inserts.store(true, Ordering::SeqCst);
    let err =
        cart_item_service::add_or_merge_item(&state, &cart.id, product, RequestedQuantity::new(4))
            .await
            .unwrap_err();
    assert!(matches!(err, AppError::Store(_)));

    assert!(items(&state, &cart.id).await.is_empty());
    let current = read_cart(&state, &cart.id).await;
    assert_eq!(current.price, Decimal::ZERO);
    assert_eq!(current.items_quantity, 0);
    // Forward write plus its compensation.
    assert_eq!(current.version, 2);
    Ok(())
}

#[tokio::test]
async fn add_racing_a_cascade_leaves_no_orphan() -> anyhow::Result<()> {
    let (store, state, cart, product) = setup().await?;

    store.drop_cart_before_item_insert.store(true, Ordering::SeqCst);
    let err =
        cart_item_service::add_or_merge_item(&state, &cart.id, product, RequestedQuantity::new(1))
            .await
            .unwrap_err();
    assert!(matches!(err, AppError::UnknownCart(_)));

    assert!(cart_service::get_active_cart(&state, &cart.user.id).await?.is_none());
    assert!(items(&state, &cart.id).await.is_empty());
    Ok(())
}

#[tokio::test]
async fn item_added_during_cascade_is_swept() -> anyhow::Result<()> {
    let (store, state, cart, product) = setup().await?;
    cart_item_service::add_or_merge_item(&state, &cart.id, product, RequestedQuantity::new(1))
        .await?;

    let sticker = Product {
        id: DocumentId::generate(),
        name: "Sticker Pack".into(),
        description: String::new(),
        price: Decimal::new(450, 2),
    };
    let late = CartItem::new(&cart, sticker, 1, Decimal::new(450, 2));
    *store.item_before_cart_delete.lock().expect("lock") = Some(serde_json::to_value(&late)?);

    let done = cascade::cascade_delete(&state, &cart.user.id, CascadeMode::User).await?;
    assert!(done.is_some());
    assert!(items(&state, &cart.id).await.is_empty());
    Ok(())
}

#[tokio::test]
async fn cart_that_cannot_be_deleted_reports_failure() -> anyhow::Result<()> {
    let (store, state, cart, product) = setup().await?;
    cart_item_service::add_or_merge_item(&state, &cart.id, product, RequestedQuantity::new(2))
        .await?;

    store.skip_cart_deletes.store(true, Ordering::SeqCst);
    let err = cascade::cascade_delete(&state, &cart.id, CascadeMode::Cart)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::DeleteFailed(_)));

    // Items go first, so only the empty cart is left behind.
    assert!(items(&state, &cart.id).await.is_empty());
    assert!(cart_service::get_cart_by_id(&state, &cart.id).await?.is_some());
    Ok(())
}
