//! PostgreSQL-backed document store.
//!
//! Documents live as JSONB in the `documents` table (see `migrations/`).
//! Filters compile to `body @> ...` containment tests, so each clause can use
//! the GIN index. Every statement runs on its own; no transactions are opened.

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ConnectionTrait, DatabaseConnection, DbBackend,
    EntityTrait, Set, SqlErr, Statement,
};
use serde_json::{Map, Value};

use super::{
    Collection, DocumentId, DocumentStore, Filter, FindOptions, StoreError, StoreResult, Update,
    UpdateResult, ensure_id,
};
use crate::entity::documents::{ActiveModel as DocumentActive, Entity as Documents};

#[derive(Debug, Clone)]
pub struct PostgresStore {
    conn: DatabaseConnection,
}

impl PostgresStore {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.conn
    }
}

/// `cart._id` = "c" becomes `{"cart": {"_id": "c"}}`.
fn containment(path: &str, value: &Value) -> Value {
    path.rsplit('.').fold(value.clone(), |inner, key| {
        let mut object = Map::new();
        object.insert(key.to_string(), inner);
        Value::Object(object)
    })
}

/// Builds the `WHERE` body for a collection and filter. Parameters start at `$1`.
fn where_clause(collection: Collection, filter: &Filter) -> (String, Vec<sea_orm::Value>) {
    let mut values: Vec<sea_orm::Value> = vec![collection.as_str().into()];
    let mut sql = String::from("collection = $1");

    for clause in filter.clauses() {
        if clause.any_of.is_empty() {
            sql.push_str(" AND FALSE");
            continue;
        }
        let alternatives: Vec<String> = clause
            .any_of
            .iter()
            .map(|value| {
                values.push(containment(&clause.path, value).into());
                format!("body @> ${}", values.len())
            })
            .collect();
        sql.push_str(&format!(" AND ({})", alternatives.join(" OR ")));
    }

    (sql, values)
}

/// Restricts a write to the first matching row. The filter is repeated on the
/// outer statement so a concurrent writer that changed the row in between makes
/// the conditional write miss instead of overwrite.
fn first_match(condition: &str) -> String {
    format!(
        "{condition} AND id = (SELECT id FROM documents WHERE {condition} \
         ORDER BY created_at, id LIMIT 1)"
    )
}

fn map_write_error(collection: Collection, err: sea_orm::DbErr) -> StoreError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(detail)) => StoreError::DuplicateKey {
            collection,
            index: detail,
        },
        _ => StoreError::Database(err),
    }
}

#[async_trait]
impl DocumentStore for PostgresStore {
    async fn find_one(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> StoreResult<Option<Value>> {
        let (condition, values) = where_clause(collection, filter);
        let sql = format!(
            "SELECT collection, id, body, created_at FROM documents WHERE {condition} \
             ORDER BY created_at, id LIMIT 1"
        );
        let row = Documents::find()
            .from_raw_sql(Statement::from_sql_and_values(
                DbBackend::Postgres,
                sql,
                values,
            ))
            .one(&self.conn)
            .await?;
        Ok(row.map(|row| row.body))
    }

    async fn find_many(
        &self,
        collection: Collection,
        filter: &Filter,
        options: FindOptions,
    ) -> StoreResult<Vec<Value>> {
        let (condition, values) = where_clause(collection, filter);
        let mut sql = format!(
            "SELECT collection, id, body, created_at FROM documents WHERE {condition} \
             ORDER BY created_at, id"
        );
        if let Some(limit) = options.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if options.skip > 0 {
            sql.push_str(&format!(" OFFSET {}", options.skip));
        }
        let rows = Documents::find()
            .from_raw_sql(Statement::from_sql_and_values(
                DbBackend::Postgres,
                sql,
                values,
            ))
            .all(&self.conn)
            .await?;
        Ok(rows.into_iter().map(|row| row.body).collect())
    }

    async fn insert_one(
        &self,
        collection: Collection,
        mut document: Value,
    ) -> StoreResult<DocumentId> {
        let id = ensure_id(&mut document)?;
        DocumentActive {
            collection: Set(collection.as_str().to_string()),
            id: Set(id.to_string()),
            body: Set(document),
            created_at: NotSet,
        }
        .insert(&self.conn)
        .await
        .map_err(|err| map_write_error(collection, err))?;
        Ok(id)
    }

    async fn update_one(
        &self,
        collection: Collection,
        filter: &Filter,
        update: &Update,
    ) -> StoreResult<UpdateResult> {
        let (condition, mut values) = where_clause(collection, filter);
        values.push(update.as_patch().into());
        let sql = format!(
            "UPDATE documents SET body = body || ${} WHERE {}",
            values.len(),
            first_match(&condition)
        );
        let result = self
            .conn
            .execute(Statement::from_sql_and_values(
                DbBackend::Postgres,
                sql,
                values,
            ))
            .await
            .map_err(|err| map_write_error(collection, err))?;
        // Postgres reports touched rows, which for us equals matched rows.
        Ok(UpdateResult {
            matched: result.rows_affected(),
            modified: result.rows_affected(),
        })
    }

    async fn delete_one(&self, collection: Collection, filter: &Filter) -> StoreResult<u64> {
        let (condition, values) = where_clause(collection, filter);
        let sql = format!("DELETE FROM documents WHERE {}", first_match(&condition));
        let result = self
            .conn
            .execute(Statement::from_sql_and_values(
                DbBackend::Postgres,
                sql,
                values,
            ))
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_many(&self, collection: Collection, filter: &Filter) -> StoreResult<u64> {
        let (condition, values) = where_clause(collection, filter);
        let sql = format!("DELETE FROM documents WHERE {condition}");
        let result = self
            .conn
            .execute(Statement::from_sql_and_values(
                DbBackend::Postgres,
                sql,
                values,
            ))
            .await?;
        Ok(result.rows_affected())
    }

    async fn close(&self) -> StoreResult<()> {
        self.conn.clone().close().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn containment_nests_dotted_paths() {
        assert_eq!(
            containment("cart._id", &json!("c-1")),
            json!({ "cart": { "_id": "c-1" } })
        );
        assert_eq!(containment("paid", &json!(false)), json!({ "paid": false }));
    }

    #[test]
    fn where_clause_numbers_every_alternative() {
        let id = DocumentId::from("67E55044-10B1-426F-9247-BB680E5FE0C8");
        let filter = Filter::new().id("_id", &id).eq("paid", false);
        let (sql, values) = where_clause(Collection::Carts, &filter);
        assert_eq!(
            sql,
            "collection = $1 AND (body @> $2 OR body @> $3) AND (body @> $4)"
        );
        assert_eq!(values.len(), 4);
    }

    #[test]
    fn first_match_repeats_condition() {
        let sql = first_match("collection = $1");
        assert_eq!(
            sql,
            "collection = $1 AND id = (SELECT id FROM documents WHERE collection = $1 \
             ORDER BY created_at, id LIMIT 1)"
        );
    }
}
