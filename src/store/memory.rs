//! In-memory document store, used by tests and by local runs without a
//! database.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{
    Collection, DocumentId, DocumentStore, FindOptions, Filter, ID_FIELD, StoreError,
    StoreResult, UNIQUE_INDEXES, Update, UpdateResult, ensure_id, lookup,
};

#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<Collection, Vec<Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Rejects `candidate` if it collides with any document other than the one at
/// `replacing`.
fn check_unique(
    collection: Collection,
    documents: &[Value],
    candidate: &Value,
    replacing: Option<usize>,
) -> StoreResult<()> {
    let candidate_id = lookup(candidate, ID_FIELD);
    for (position, existing) in documents.iter().enumerate() {
        if Some(position) == replacing {
            continue;
        }
        if candidate_id.is_some() && lookup(existing, ID_FIELD) == candidate_id {
            return Err(StoreError::DuplicateKey {
                collection,
                index: "_id_".into(),
            });
        }
    }

    for index in UNIQUE_INDEXES.iter().filter(|i| i.collection == collection) {
        let Some(key) = index.key(candidate) else {
            continue;
        };
        let clash = documents
            .iter()
            .enumerate()
            .filter(|(position, _)| Some(*position) != replacing)
            .any(|(_, existing)| index.key(existing).as_ref() == Some(&key));
        if clash {
            return Err(StoreError::DuplicateKey {
                collection,
                index: index.name.into(),
            });
        }
    }
    Ok(())
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find_one(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> StoreResult<Option<Value>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(&collection)
            .and_then(|docs| docs.iter().find(|doc| filter.matches(doc)))
            .cloned())
    }

    async fn find_many(
        &self,
        collection: Collection,
        filter: &Filter,
        options: FindOptions,
    ) -> StoreResult<Vec<Value>> {
        let collections = self.collections.read().await;
        let Some(docs) = collections.get(&collection) else {
            return Ok(Vec::new());
        };
        let limit = options.limit.map_or(usize::MAX, |l| l as usize);
        Ok(docs
            .iter()
            .filter(|doc| filter.matches(doc))
            .skip(options.skip as usize)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn insert_one(
        &self,
        collection: Collection,
        mut document: Value,
    ) -> StoreResult<DocumentId> {
        let id = ensure_id(&mut document)?;
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection).or_default();
        check_unique(collection, docs, &document, None)?;
        docs.push(document);
        Ok(id)
    }

    async fn update_one(
        &self,
        collection: Collection,
        filter: &Filter,
        update: &Update,
    ) -> StoreResult<UpdateResult> {
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(&collection) else {
            return Ok(UpdateResult::default());
        };
        let Some(position) = docs.iter().position(|doc| filter.matches(doc)) else {
            return Ok(UpdateResult::default());
        };

        let mut updated = docs[position].clone();
        update.apply_to(&mut updated);
        check_unique(collection, docs, &updated, Some(position))?;

        let modified = updated != docs[position];
        docs[position] = updated;
        Ok(UpdateResult {
            matched: 1,
            modified: u64::from(modified),
        })
    }

    async fn delete_one(&self, collection: Collection, filter: &Filter) -> StoreResult<u64> {
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(&collection) else {
            return Ok(0);
        };
        match docs.iter().position(|doc| filter.matches(doc)) {
            Some(position) => {
                docs.remove(position);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_many(&self, collection: Collection, filter: &Filter) -> StoreResult<u64> {
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(&collection) else {
            return Ok(0);
        };
        let before = docs.len();
        docs.retain(|doc| !filter.matches(doc));
        Ok((before - docs.len()) as u64)
    }
}
