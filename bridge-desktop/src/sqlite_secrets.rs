//! Credential storage in a SQLite table
//!
//! Shares the media catalog's pool, so credentials live next to the records
//! that need them and survive on hosts without an OS keychain.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::SecureStore,
};
use sqlx::{
    sqlite::{SqlitePool, SqlitePoolOptions},
    Row,
};
use tracing::debug;

/// SQLite-backed implementation of [`SecureStore`].
///
/// Values are stored as raw bytes in a `secure_secrets` table. Encryption at
/// rest is left to the database file's location and permissions.
#[derive(Clone)]
pub struct SqliteSecretStore {
    pool: SqlitePool,
}

impl SqliteSecretStore {
    /// Wrap an existing pool, creating the table if needed.
    pub async fn new(pool: SqlitePool) -> Result<Self> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS secure_secrets (
                key TEXT PRIMARY KEY,
                value BLOB NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .map_err(|e| BridgeError::DatabaseError(format!("Failed to create table: {}", e)))?;

        Ok(Self { pool })
    }

    /// In-memory store for tests.
    pub async fn in_memory() -> Result<Self> {
        // One connection, otherwise every pooled connection sees its own
        // empty database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| BridgeError::DatabaseError(format!("Failed to connect to DB: {}", e)))?;
        Self::new(pool).await
    }
}

fn db_error(context: &str, e: sqlx::Error) -> BridgeError {
    BridgeError::DatabaseError(format!("{}: {}", context, e))
}

#[async_trait]
impl SecureStore for SqliteSecretStore {
    async fn set_secret(&self, key: &str, value: &[u8]) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO secure_secrets (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to store secret", e))?;

        debug!(key = key, "Stored secret in database");
        Ok(())
    }

    async fn get_secret(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let row = sqlx::query("SELECT value FROM secure_secrets WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to read secret", e))?;

        Ok(row.map(|row| row.get::<Vec<u8>, _>(0)))
    }

    async fn delete_secret(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM secure_secrets WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Failed to delete secret", e))?;
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT key FROM secure_secrets ORDER BY key")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to list secrets", e))?;

        Ok(rows.into_iter().map(|row| row.get::<String, _>(0)).collect())
    }

    async fn clear_all(&self) -> Result<()> {
        sqlx::query("DELETE FROM secure_secrets")
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Failed to clear secrets", e))?;
        Ok(())
    }
}
