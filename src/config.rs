use std::env;

use anyhow::bail;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub store_backend: StoreBackend,
    pub host: String,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL").ok().filter(|url| !url.is_empty());
        let store_backend = match env::var("STORE_BACKEND").ok().as_deref() {
            Some("memory") => StoreBackend::Memory,
            Some("postgres") => StoreBackend::Postgres,
            Some(other) => bail!("unknown STORE_BACKEND {other:?}, expected memory or postgres"),
            None if database_url.is_some() => StoreBackend::Postgres,
            None => StoreBackend::Memory,
        };
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            bail!("STORE_BACKEND=postgres requires DATABASE_URL");
        }

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        Ok(Self {
            port,
            database_url,
            store_backend,
            host,
        })
    }
}
