//! SQLite connection management.
//!
//! A single [`ConnectionManager`] owns the process-wide pool. It is created
//! cheaply, connects on the first [`acquire`](ConnectionManager::acquire),
//! and hands out clones of the same pool afterwards. [`release`] closes the
//! pool; calling it twice is safe, and a later `acquire` reconnects.
//!
//! WAL mode is enabled so the HTTP server can answer searches while an
//! extraction run is writing.
//!
//! [`release`]: ConnectionManager::release

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tokio::sync::Mutex;

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};

pub struct ConnectionManager {
    path: PathBuf,
    max_connections: u32,
    acquire_timeout: Duration,
    pool: Mutex<Option<SqlitePool>>,
}

impl ConnectionManager {
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            path: config.path.clone(),
            max_connections: config.max_connections,
            acquire_timeout: Duration::from_secs(config.acquire_timeout_secs),
            pool: Mutex::new(None),
        }
    }

    /// Return the shared pool, connecting first if needed.
    pub async fn acquire(&self) -> StoreResult<SqlitePool> {
        let mut guard = self.pool.lock().await;
        if let Some(pool) = guard.as_ref() {
            if !pool.is_closed() {
                return Ok(pool.clone());
            }
        }
        let pool = self.connect().await?;
        *guard = Some(pool.clone());
        Ok(pool)
    }

    /// Close the pool if one is open.
    pub async fn release(&self) {
        let pool = self.pool.lock().await.take();
        if let Some(pool) = pool {
            pool.close().await;
            tracing::debug!(path = %self.path.display(), "store connection closed");
        }
    }

    /// Establish the connection and run a trivial query.
    pub async fn test_connection(&self) -> bool {
        let pool = match self.acquire().await {
            Ok(pool) => pool,
            Err(e) => {
                tracing::warn!(error = %e, "store connection test failed");
                return false;
            }
        };
        match sqlx::query("SELECT 1").execute(&pool).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(error = %e, "store connection test failed");
                false
            }
        }
    }

    async fn connect(&self) -> StoreResult<SqlitePool> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| StoreError::Path {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", self.path.display()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.acquire_timeout)
            .connect_with(options)
            .await?;

        tracing::debug!(path = %self.path.display(), "store connection established");
        Ok(pool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_config(path: PathBuf) -> StoreConfig {
        StoreConfig {
            path,
            max_connections: 2,
            acquire_timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn test_acquire_creates_parent_and_reuses_pool() {
        let tmp = TempDir::new().unwrap();
        let manager = ConnectionManager::new(&store_config(tmp.path().join("nested/kh.sqlite")));

        let first = manager.acquire().await.unwrap();
        let second = manager.acquire().await.unwrap();
        assert!(tmp.path().join("nested/kh.sqlite").exists());
        assert_eq!(first.size(), second.size());
        assert!(manager.test_connection().await);
    }

    #[tokio::test]
    async fn test_release_twice_is_safe() {
        let tmp = TempDir::new().unwrap();
        let manager = ConnectionManager::new(&store_config(tmp.path().join("kh.sqlite")));
        manager.acquire().await.unwrap();
        manager.release().await;
        manager.release().await;
        // Reconnects lazily.
        assert!(manager.test_connection().await);
    }

    #[tokio::test]
    async fn test_unreachable_path_is_unavailable() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("file");
        std::fs::write(&blocker, "not a directory").unwrap();
        let manager = ConnectionManager::new(&store_config(blocker.join("kh.sqlite")));
        assert!(manager.acquire().await.is_err());
        assert!(!manager.test_connection().await);
    }
}
