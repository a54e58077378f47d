use crate::error::TribunalError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

pub fn case_key(case_id: &str) -> String {
    format!("case_{case_id}")
}

pub fn settlement_key(case_id: &str) -> String {
    format!("settlement_{case_id}")
}

pub fn penalty_key(case_id: &str) -> String {
    format!("penalty_{case_id}")
}

pub const SETTLEMENT_PREFIX: &str = "settlement_";
pub const PENALTY_PREFIX: &str = "penalty_";

/// Document persistence backend configuration.
#[derive(Debug, Clone)]
pub enum StoreConfig {
    /// Keep all documents in process memory only.
    Memory,
    /// Persist documents in PostgreSQL and hydrate indexes on startup.
    Postgres {
        database_url: String,
        max_connections: u32,
    },
}

impl StoreConfig {
    pub fn memory() -> Self {
        Self::Memory
    }

    pub fn postgres(database_url: impl Into<String>, max_connections: u32) -> Self {
        Self::Postgres {
            database_url: database_url.into(),
            max_connections,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Postgres { .. } => "postgres",
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::Memory
    }
}

enum StoreBackend {
    Memory(RwLock<BTreeMap<String, Value>>),
    Postgres(PostgresDocumentStore),
}

/// Flat JSON document store keyed by record id.
///
/// Every write rewrites the whole document (no partial patches), which keeps
/// crash recovery simple: on restart the engine rebuilds its in-memory
/// indexes by scanning the persisted settlement and penalty documents.
pub struct DocumentStore {
    backend: StoreBackend,
}

impl DocumentStore {
    pub async fn bootstrap(config: StoreConfig) -> Result<Self, TribunalError> {
        let backend = match config {
            StoreConfig::Memory => StoreBackend::Memory(RwLock::new(BTreeMap::new())),
            StoreConfig::Postgres {
                database_url,
                max_connections,
            } => {
                let store = PostgresDocumentStore::connect(&database_url, max_connections).await?;
                store.ensure_schema().await?;
                StoreBackend::Postgres(store)
            }
        };

        Ok(Self { backend })
    }

    pub fn backend_label(&self) -> &'static str {
        match self.backend {
            StoreBackend::Memory(_) => "memory",
            StoreBackend::Postgres(_) => "postgres",
        }
    }

    pub async fn put(&self, key: &str, document: Value) -> Result<(), TribunalError> {
        match &self.backend {
            StoreBackend::Memory(map) => {
                map.write().await.insert(key.to_string(), document);
                Ok(())
            }
            StoreBackend::Postgres(store) => store.upsert(key, &document).await,
        }
    }

    pub async fn get(&self, key: &str) -> Result<Option<Value>, TribunalError> {
        match &self.backend {
            StoreBackend::Memory(map) => Ok(map.read().await.get(key).cloned()),
            StoreBackend::Postgres(store) => store.fetch(key).await,
        }
    }

    pub async fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, Value)>, TribunalError> {
        match &self.backend {
            StoreBackend::Memory(map) => Ok(map
                .read()
                .await
                .range(prefix.to_string()..)
                .take_while(|(key, _)| key.starts_with(prefix))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect()),
            StoreBackend::Postgres(store) => store.scan_prefix(prefix).await,
        }
    }

    pub async fn put_record<T: Serialize>(
        &self,
        key: &str,
        record: &T,
    ) -> Result<(), TribunalError> {
        let document = serde_json::to_value(record)?;
        self.put(key, document).await
    }

    pub async fn get_record<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<T>, TribunalError> {
        match self.get(key).await? {
            None => Ok(None),
            Some(document) => Ok(Some(serde_json::from_value(document)?)),
        }
    }
}

struct PostgresDocumentStore {
    pool: PgPool,
}

impl PostgresDocumentStore {
    async fn connect(database_url: &str, max_connections: u32) -> Result<Self, TribunalError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(database_url)
            .await
            .map_err(|e| TribunalError::Storage(format!("postgres connect failed: {e}")))?;

        Ok(Self { pool })
    }

    async fn ensure_schema(&self) -> Result<(), TribunalError> {
        // One row per flat document; the application owns key naming.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tribunal_documents (
                doc_key TEXT PRIMARY KEY,
                doc JSONB NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| TribunalError::Storage(format!("postgres schema create failed: {e}")))?;

        Ok(())
    }

    async fn upsert(&self, key: &str, document: &Value) -> Result<(), TribunalError> {
        sqlx::query(
            r#"
            INSERT INTO tribunal_documents (doc_key, doc, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (doc_key) DO UPDATE
            SET doc = EXCLUDED.doc, updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(key)
        .bind(document)
        .execute(&self.pool)
        .await
        .map_err(|e| TribunalError::Storage(format!("postgres upsert failed: {e}")))?;

        Ok(())
    }

    async fn fetch(&self, key: &str) -> Result<Option<Value>, TribunalError> {
        let row = sqlx::query("SELECT doc FROM tribunal_documents WHERE doc_key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| TribunalError::Storage(format!("postgres fetch failed: {e}")))?;

        row.map(|row| {
            row.try_get("doc")
                .map_err(|e| TribunalError::Storage(format!("postgres decode doc failed: {e}")))
        })
        .transpose()
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, Value)>, TribunalError> {
        let pattern = format!("{}%", prefix.replace('%', "\\%").replace('_', "\\_"));
        let rows = sqlx::query(
            "SELECT doc_key, doc FROM tribunal_documents WHERE doc_key LIKE $1 ORDER BY doc_key",
        )
        .bind(pattern)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| TribunalError::Storage(format!("postgres scan failed: {e}")))?;

        let mut documents = Vec::with_capacity(rows.len());
        for row in rows {
            let key: String = row
                .try_get("doc_key")
                .map_err(|e| TribunalError::Storage(format!("postgres decode key failed: {e}")))?;
            let doc: Value = row
                .try_get("doc")
                .map_err(|e| TribunalError::Storage(format!("postgres decode doc failed: {e}")))?;
            documents.push((key, doc));
        }

        Ok(documents)
    }
}
