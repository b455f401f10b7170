//! Document store abstraction.
//!
//! Collections hold JSON documents keyed by `_id`. The store offers atomic
//! single-document writes only; anything spanning two documents is the
//! caller's problem (see `services::cart_item_service`).

mod memory;
mod postgres;

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

/// The logical collections known to the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Users,
    Products,
    Carts,
    CartItems,
}

impl Collection {
    pub const fn as_str(self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Products => "products",
            Collection::Carts => "carts",
            Collection::CartItems => "cart_items",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a stored document.
///
/// Identities minted by this service are hyphenated lowercase UUIDs, but
/// callers hand us whatever they got (`{...}` braces, simple form, upper case,
/// or an arbitrary legacy key), so lookups go through [`DocumentId::lookup_forms`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().hyphenated().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Every encoding under which this identity may have been stored: the raw
    /// string as given and, when it parses as a UUID, the canonical form.
    pub fn lookup_forms(&self) -> Vec<Value> {
        let mut forms = vec![Value::String(self.0.clone())];
        if let Ok(uuid) = Uuid::parse_str(self.0.trim()) {
            let canonical = uuid.hyphenated().to_string();
            if canonical != self.0 {
                forms.push(Value::String(canonical));
            }
        }
        forms
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for DocumentId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<Uuid> for DocumentId {
    fn from(value: Uuid) -> Self {
        Self(value.hyphenated().to_string())
    }
}

/// One equality condition: the value at a dotted `path` equals any of `any_of`.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub path: String,
    pub any_of: Vec<Value>,
}

/// A conjunction of [`Clause`]s. An empty filter matches every document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<Clause>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, path: &str, value: impl Into<Value>) -> Self {
        self.clauses.push(Clause {
            path: path.to_string(),
            any_of: vec![value.into()],
        });
        self
    }

    /// Identity match that tries both stored encodings of `id`.
    pub fn id(mut self, path: &str, id: &DocumentId) -> Self {
        self.clauses.push(Clause {
            path: path.to_string(),
            any_of: id.lookup_forms(),
        });
        self
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn matches(&self, document: &Value) -> bool {
        self.clauses.iter().all(|clause| {
            lookup(document, &clause.path).is_some_and(|found| clause.any_of.contains(found))
        })
    }
}

/// Resolves a dotted path such as `cart._id` inside a document.
pub fn lookup<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(document, |value, key| value.get(key))
}

/// Top-level field assignments, applied atomically to a single document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    set: Map<String, Value>,
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.set.insert(field.to_string(), value.into());
        self
    }

    /// Builds an update from selected fields of a serialized document, so the
    /// written values use exactly the same encoding as a full insert.
    pub fn pick<T: Serialize>(document: &T, fields: &[&str]) -> StoreResult<Self> {
        let value = serde_json::to_value(document)?;
        let mut update = Self::new();
        for field in fields {
            if let Some(found) = value.get(*field) {
                update.set.insert((*field).to_string(), found.clone());
            }
        }
        Ok(update)
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.set.iter().filter(|(field, _)| field.as_str() != ID_FIELD)
    }

    pub(crate) fn as_patch(&self) -> Value {
        Value::Object(
            self.fields()
                .map(|(field, value)| (field.clone(), value.clone()))
                .collect(),
        )
    }

    pub fn apply_to(&self, document: &mut Value) {
        if let Value::Object(map) = document {
            for (field, value) in self.fields() {
                map.insert(field.clone(), value.clone());
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FindOptions {
    pub skip: u64,
    pub limit: Option<u64>,
}

impl FindOptions {
    pub fn limit(limit: u64) -> Self {
        Self {
            skip: 0,
            limit: Some(limit),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateResult {
    pub matched: u64,
    pub modified: u64,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate key in {collection} ({index})")]
    DuplicateKey {
        collection: Collection,
        index: String,
    },

    #[error("invalid document: {0}")]
    InvalidDocument(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

pub type StoreResult<T> = Result<T, StoreError>;

pub(crate) const ID_FIELD: &str = "_id";

/// Unique constraints every backend enforces. A document only takes part in an
/// index when all of its fields are present and the partial condition holds.
#[derive(Debug, Clone, Copy)]
pub struct UniqueIndex {
    pub name: &'static str,
    pub collection: Collection,
    pub fields: &'static [&'static str],
    pub partial: Option<(&'static str, bool)>,
}

impl UniqueIndex {
    pub fn key(&self, document: &Value) -> Option<Vec<Value>> {
        if let Some((path, expected)) = self.partial {
            if lookup(document, path) != Some(&Value::Bool(expected)) {
                return None;
            }
        }
        self.fields
            .iter()
            .map(|path| lookup(document, path).cloned())
            .collect()
    }
}

pub const UNIQUE_INDEXES: &[UniqueIndex] = &[
    UniqueIndex {
        name: "users_email_key",
        collection: Collection::Users,
        fields: &["email"],
        partial: None,
    },
    UniqueIndex {
        name: "carts_active_user_key",
        collection: Collection::Carts,
        fields: &["user._id"],
        partial: Some(("paid", false)),
    },
    UniqueIndex {
        name: "cart_items_cart_product_key",
        collection: Collection::CartItems,
        fields: &["cart._id", "product._id"],
        partial: None,
    },
];

/// Returns the document's `_id`, minting one when it is absent.
pub(crate) fn ensure_id(document: &mut Value) -> StoreResult<DocumentId> {
    let Value::Object(map) = document else {
        return Err(StoreError::InvalidDocument(
            "document must be a JSON object".into(),
        ));
    };
    match map.get(ID_FIELD) {
        Some(Value::String(id)) => Ok(DocumentId::from(id.as_str())),
        Some(_) => Err(StoreError::InvalidDocument("_id must be a string".into())),
        None => {
            let id = DocumentId::generate();
            map.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
            Ok(id)
        }
    }
}

/// Raw document operations. Implementations must make each call atomic with
/// respect to the single document it touches; nothing more is promised.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find_one(&self, collection: Collection, filter: &Filter)
    -> StoreResult<Option<Value>>;

    async fn find_many(
        &self,
        collection: Collection,
        filter: &Filter,
        options: FindOptions,
    ) -> StoreResult<Vec<Value>>;

    async fn insert_one(&self, collection: Collection, document: Value)
    -> StoreResult<DocumentId>;

    async fn update_one(
        &self,
        collection: Collection,
        filter: &Filter,
        update: &Update,
    ) -> StoreResult<UpdateResult>;

    async fn delete_one(&self, collection: Collection, filter: &Filter) -> StoreResult<u64>;

    async fn delete_many(&self, collection: Collection, filter: &Filter) -> StoreResult<u64>;

    async fn close(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// A typed record living in one collection.
pub trait Document: Serialize + DeserializeOwned + Send + Sync {
    const COLLECTION: Collection;
}

/// Typed front for a shared [`DocumentStore`] handle.
#[derive(Clone)]
pub struct Repository {
    store: Arc<dyn DocumentStore>,
}

impl Repository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub async fn find_one<T: Document>(&self, filter: &Filter) -> StoreResult<Option<T>> {
        match self.store.find_one(T::COLLECTION, filter).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    pub async fn find_many<T: Document>(
        &self,
        filter: &Filter,
        options: FindOptions,
    ) -> StoreResult<Vec<T>> {
        self.store
            .find_many(T::COLLECTION, filter, options)
            .await?
            .into_iter()
            .map(|value| serde_json::from_value(value).map_err(StoreError::from))
            .collect()
    }

    pub async fn insert<T: Document>(&self, document: &T) -> StoreResult<DocumentId> {
        let value = serde_json::to_value(document)?;
        self.store.insert_one(T::COLLECTION, value).await
    }

    pub async fn update_one<T: Document>(
        &self,
        filter: &Filter,
        update: &Update,
    ) -> StoreResult<UpdateResult> {
        self.store.update_one(T::COLLECTION, filter, update).await
    }

    pub async fn delete_one<T: Document>(&self, filter: &Filter) -> StoreResult<u64> {
        self.store.delete_one(T::COLLECTION, filter).await
    }

    pub async fn delete_many<T: Document>(&self, filter: &Filter) -> StoreResult<u64> {
        self.store.delete_many(T::COLLECTION, filter).await
    }

    pub async fn close(&self) -> StoreResult<()> {
        self.store.close().await
    }
}
