use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};
use tokio::fs;

use crate::{
    config::{AppConfig, StoreBackend},
    store::{DocumentStore, MemoryStore, PostgresStore},
};

/// Create a SeaORM connection.
pub async fn create_orm_conn(database_url: &str) -> Result<DatabaseConnection> {
    let conn = Database::connect(database_url).await?;
    Ok(conn)
}

/// Minimal migration runner that executes SQL files in `migrations/` in filename order.
pub async fn run_migrations(conn: &DatabaseConnection) -> Result<()> {
    let mut entries = fs::read_dir("migrations").await?;
    let mut files: Vec<PathBuf> = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "sql") {
            files.push(path);
        }
    }
    files.sort();

    let backend = conn.get_database_backend();
    for file in files {
        let sql = fs::read_to_string(&file).await?;
        // Postgres prepared statements cannot contain multiple commands,
        // so split the migration file and run each statement individually.
        for stmt in sql.split(';') {
            let stmt = stmt.trim();
            if stmt.is_empty() {
                continue;
            }
            let statement = format!("{stmt};");
            conn.execute(Statement::from_string(backend, statement))
                .await
                .with_context(|| format!("migration {} failed", file.display()))?;
        }
        tracing::debug!(file = %file.display(), "migration applied");
    }

    Ok(())
}

/// Opens the document store selected by configuration. The caller owns the
/// handle and must `close` it on shutdown.
pub async fn open_store(config: &AppConfig) -> Result<Arc<dyn DocumentStore>> {
    match (config.store_backend, config.database_url.as_deref()) {
        (StoreBackend::Postgres, Some(url)) => {
            let conn = create_orm_conn(url).await?;
            run_migrations(&conn).await?;
            tracing::info!("using postgres document store");
            Ok(Arc::new(PostgresStore::new(conn)))
        }
        (StoreBackend::Postgres, None) => anyhow::bail!("postgres store requires DATABASE_URL"),
        (StoreBackend::Memory, _) => {
            tracing::warn!("using in-memory document store, data is lost on exit");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
