//! SQLite-backed [`ContentStore`].
//!
//! Assets are nodes in `content_assets`, edges live in `relationships`, and
//! the extraction ledger and sync error log have their own tables. The
//! schema is created on first use, so a fresh database file works without
//! `kh init`.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tokio::sync::OnceCell;

use super::{format_ts_iso, merge_fields, ContentStore, RECENT_EXTRACTIONS_LIMIT};
use crate::config::StoreConfig;
use crate::db::ConnectionManager;
use crate::error::StoreResult;
use crate::migrate;
use crate::models::{
    AssetMetadata, ContentAsset, ContentType, DatabaseInfo, ExtractionMetadata, HealthStatus,
    RecentExtraction, Relationship, SearchFilters, SearchResult, SyncErrorRecord,
};

pub struct SqliteStore {
    manager: Arc<ConnectionManager>,
    schema: OnceCell<()>,
}

impl SqliteStore {
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self {
            manager,
            schema: OnceCell::new(),
        }
    }

    /// Store with its own connection manager.
    pub fn open(config: &StoreConfig) -> Self {
        Self::new(Arc::new(ConnectionManager::new(config)))
    }

    pub fn manager(&self) -> &Arc<ConnectionManager> {
        &self.manager
    }

    async fn pool(&self) -> StoreResult<SqlitePool> {
        let pool = self.manager.acquire().await?;
        self.schema
            .get_or_try_init(|| migrate::run_migrations(&pool))
            .await?;
        Ok(pool)
    }

    async fn try_health(&self) -> StoreResult<HealthStatus> {
        let pool = self.pool().await?;

        let version: String = sqlx::query_scalar("SELECT sqlite_version()")
            .fetch_one(&pool)
            .await?;
        let content_assets: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM content_assets")
            .fetch_one(&pool)
            .await?;

        let rows = sqlx::query(
            "SELECT platform, fields, updated_at FROM extraction_metadata ORDER BY updated_at DESC, revision DESC LIMIT ?",
        )
        .bind(RECENT_EXTRACTIONS_LIMIT as i64)
        .fetch_all(&pool)
        .await?;

        let recent_extractions = rows
            .iter()
            .map(|row| {
                let fields: String = row.get("fields");
                let fields: Map<String, Value> = serde_json::from_str(&fields).unwrap_or_default();
                RecentExtraction {
                    platform: row.get("platform"),
                    last_extraction: fields
                        .get("lastExtraction")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    updated_at: format_ts_iso(row.get("updated_at")),
                }
            })
            .collect();

        Ok(HealthStatus {
            connected: true,
            database: Some(DatabaseInfo {
                name: "SQLite".to_string(),
                version,
                edition: "embedded".to_string(),
            }),
            content_assets: Some(content_assets),
            recent_extractions: Some(recent_extractions),
            error: None,
        })
    }
}

fn row_to_asset(row: &SqliteRow) -> StoreResult<ContentAsset> {
    let type_str: String = row.get("type");
    let content_type = type_str.parse().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "stored asset has unknown type, reading as asset");
        ContentType::Asset
    });
    let blob: String = row.get("metadata");

    Ok(ContentAsset {
        id: row.get("id"),
        title: row.get("title"),
        content: row.get("content"),
        content_type,
        source: row.get("source"),
        metadata: AssetMetadata::from_blob(&blob)?,
    })
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[async_trait]
impl ContentStore for SqliteStore {
    async fn ingest(&self, asset: &ContentAsset) -> StoreResult<()> {
        let pool = self.pool().await?;
        let blob = asset.metadata.to_blob(&asset.source)?;

        sqlx::query(
            r#"
            INSERT INTO content_assets (id, title, content, type, source, metadata, updated_at, revision)
            VALUES (?, ?, ?, ?, ?, ?, ?, (SELECT COALESCE(MAX(revision), 0) + 1 FROM content_assets))
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                content = excluded.content,
                type = excluded.type,
                source = excluded.source,
                metadata = excluded.metadata,
                updated_at = excluded.updated_at,
                revision = excluded.revision
            "#,
        )
        .bind(&asset.id)
        .bind(&asset.title)
        .bind(&asset.content)
        .bind(asset.content_type.as_str())
        .bind(&asset.source)
        .bind(&blob)
        .bind(now_millis())
        .execute(&pool)
        .await?;

        tracing::debug!(id = %asset.id, source = %asset.source, "ingested content asset");
        Ok(())
    }

    async fn get(&self, id: &str) -> StoreResult<Option<ContentAsset>> {
        let pool = self.pool().await?;
        let row = sqlx::query(
            "SELECT id, title, content, type, source, metadata FROM content_assets WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&pool)
        .await?;

        row.as_ref().map(row_to_asset).transpose()
    }

    async fn remove(&self, id: &str) -> StoreResult<()> {
        let pool = self.pool().await?;
        let mut tx = pool.begin().await?;

        sqlx::query("DELETE FROM relationships WHERE from_id = ? OR to_id = ?")
            .bind(id)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM content_assets WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn search(&self, query: &str, filters: &SearchFilters) -> StoreResult<SearchResult> {
        let pool = self.pool().await?;

        let mut sql = String::from(
            "SELECT id, title, content, type, source, metadata FROM content_assets WHERE 1 = 1",
        );
        if !query.is_empty() {
            sql.push_str(" AND (instr(title, ?) > 0 OR instr(content, ?) > 0)");
        }
        if filters.source.is_some() {
            sql.push_str(" AND source = ?");
        }
        if filters.content_type.is_some() {
            sql.push_str(" AND type = ?");
        }
        sql.push_str(" ORDER BY updated_at DESC, revision DESC");
        let limit = filters.effective_limit();
        if limit.is_some() {
            sql.push_str(" LIMIT ?");
        }

        let mut q = sqlx::query(&sql);
        if !query.is_empty() {
            q = q.bind(query).bind(query);
        }
        if let Some(ref source) = filters.source {
            q = q.bind(source);
        }
        if let Some(ty) = filters.content_type {
            q = q.bind(ty.as_str());
        }
        if let Some(lim) = limit {
            // One extra row tells us whether the page was cut short.
            let fetch = i64::try_from(lim)
                .ok()
                .and_then(|l| l.checked_add(1))
                .unwrap_or(i64::MAX);
            q = q.bind(fetch);
        }

        let rows = q.fetch_all(&pool).await?;
        let mut items = rows
            .iter()
            .map(row_to_asset)
            .collect::<StoreResult<Vec<_>>>()?;

        let has_more = match limit {
            Some(lim) if items.len() > lim => {
                items.truncate(lim);
                true
            }
            _ => false,
        };

        Ok(SearchResult {
            total: items.len(),
            items,
            has_more,
        })
    }

    async fn update_extraction_metadata(
        &self,
        platform: &str,
        fields: Map<String, Value>,
    ) -> StoreResult<()> {
        let pool = self.pool().await?;
        let mut tx = pool.begin().await?;

        let existing: Option<String> =
            sqlx::query_scalar("SELECT fields FROM extraction_metadata WHERE platform = ?")
                .bind(platform)
                .fetch_optional(&mut *tx)
                .await?;
        let mut merged: Map<String, Value> = match existing {
            Some(blob) => serde_json::from_str(&blob)?,
            None => Map::new(),
        };
        merge_fields(&mut merged, fields);

        sqlx::query(
            r#"
            INSERT INTO extraction_metadata (platform, fields, updated_at, revision)
            VALUES (?, ?, ?, (SELECT COALESCE(MAX(revision), 0) + 1 FROM extraction_metadata))
            ON CONFLICT(platform) DO UPDATE SET
                fields = excluded.fields,
                updated_at = excluded.updated_at,
                revision = excluded.revision
            "#,
        )
        .bind(platform)
        .bind(serde_json::to_string(&merged)?)
        .bind(now_millis())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_extraction_metadata(
        &self,
        platform: &str,
    ) -> StoreResult<Option<ExtractionMetadata>> {
        let pool = self.pool().await?;
        let row = sqlx::query(
            "SELECT platform, fields, updated_at FROM extraction_metadata WHERE platform = ?",
        )
        .bind(platform)
        .fetch_optional(&pool)
        .await?;

        let row = match row {
            Some(row) => row,
            None => return Ok(None),
        };
        let fields: String = row.get("fields");
        Ok(Some(ExtractionMetadata {
            platform: row.get("platform"),
            fields: serde_json::from_str(&fields)?,
            updated_at: format_ts_iso(row.get("updated_at")),
        }))
    }

    async fn health_status(&self) -> HealthStatus {
        match self.try_health().await {
            Ok(status) => status,
            Err(e) => HealthStatus::disconnected(e),
        }
    }

    async fn test_connection(&self) -> bool {
        self.manager.test_connection().await
    }

    async fn relate(&self, from_id: &str, to_id: &str, kind: &str) -> StoreResult<()> {
        let pool = self.pool().await?;
        sqlx::query(
            r#"
            INSERT INTO relationships (from_id, to_id, kind, created_at) VALUES (?, ?, ?, ?)
            ON CONFLICT(from_id, to_id, kind) DO NOTHING
            "#,
        )
        .bind(from_id)
        .bind(to_id)
        .bind(kind)
        .bind(now_millis())
        .execute(&pool)
        .await?;
        Ok(())
    }

    async fn clear_relationships(&self, from_id: &str, kind: &str) -> StoreResult<()> {
        let pool = self.pool().await?;
        sqlx::query("DELETE FROM relationships WHERE from_id = ? AND kind = ?")
            .bind(from_id)
            .bind(kind)
            .execute(&pool)
            .await?;
        Ok(())
    }

    async fn relationships(&self, id: &str) -> StoreResult<Vec<Relationship>> {
        let pool = self.pool().await?;
        let rows = sqlx::query(
            "SELECT from_id, to_id, kind FROM relationships WHERE from_id = ? OR to_id = ? ORDER BY from_id, to_id, kind",
        )
        .bind(id)
        .bind(id)
        .fetch_all(&pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| Relationship {
                from_id: row.get("from_id"),
                to_id: row.get("to_id"),
                kind: row.get("kind"),
            })
            .collect())
    }

    async fn log_sync_error(&self, platform: &str, message: &str) -> StoreResult<()> {
        let pool = self.pool().await?;
        sqlx::query("INSERT INTO sync_errors (platform, message, created_at) VALUES (?, ?, ?)")
            .bind(platform)
            .bind(message)
            .bind(now_millis())
            .execute(&pool)
            .await?;
        Ok(())
    }

    async fn recent_sync_errors(
        &self,
        platform: &str,
        limit: usize,
    ) -> StoreResult<Vec<SyncErrorRecord>> {
        let pool = self.pool().await?;
        let rows = sqlx::query(
            "SELECT platform, message, created_at FROM sync_errors WHERE platform = ? ORDER BY id DESC LIMIT ?",
        )
        .bind(platform)
        .bind(limit as i64)
        .fetch_all(&pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| SyncErrorRecord {
                platform: row.get("platform"),
                message: row.get("message"),
                created_at: format_ts_iso(row.get("created_at")),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn store(tmp: &TempDir) -> SqliteStore {
        let manager = ConnectionManager::new(&StoreConfig {
            path: tmp.path().join("kh.sqlite"),
            max_connections: 2,
            acquire_timeout_secs: 5,
        });
        SqliteStore::new(Arc::new(manager))
    }

    fn asset(id: &str, title: &str, content: &str, source: &str) -> ContentAsset {
        let mut meta = Map::new();
        meta.insert("note".into(), json!(id));
        ContentAsset {
            id: id.to_string(),
            title: title.to_string(),
            content: content.to_string(),
            content_type: ContentType::Asset,
            source: source.to_string(),
            metadata: AssetMetadata::Open(meta),
        }
    }

    #[tokio::test]
    async fn test_ingest_twice_replaces() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);

        store.ingest(&asset("a", "First", "one", "s")).await.unwrap();
        store.ingest(&asset("a", "Second", "two", "s")).await.unwrap();

        let got = store.get("a").await.unwrap().unwrap();
        assert_eq!(got.title, "Second");
        assert_eq!(got.content, "two");
        let all = store.search("", &SearchFilters::default()).await.unwrap();
        assert_eq!(all.total, 1);
    }

    #[tokio::test]
    async fn test_metadata_blob_gains_platform_and_timestamp() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        store.ingest(&asset("a", "T", "c", "health_check")).await.unwrap();

        let got = store.get("a").await.unwrap().unwrap();
        assert_eq!(got.metadata.platform(), Some("health_check"));
        assert!(got.metadata.extracted_at().is_some());
    }

    #[tokio::test]
    async fn test_huge_limit_returns_every_match() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        store.ingest(&asset("w", "widget", "body", "s")).await.unwrap();

        for lim in [usize::MAX, i64::MAX as usize] {
            let filters = SearchFilters {
                limit: Some(lim),
                ..Default::default()
            };
            let page = store.search("widget", &filters).await.unwrap();
            assert_eq!(page.items.len(), 1, "limit {}", lim);
            assert!(!page.has_more);
        }
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let tmp = TempDir::new().unwrap();
        assert!(store(&tmp).get("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_remove_detaches_and_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        store.ingest(&asset("a", "A", "x", "s")).await.unwrap();
        store.ingest(&asset("b", "B", "y", "s")).await.unwrap();
        store.relate("a", "b", "IMPORTS").await.unwrap();
        store.relate("a", "b", "IMPORTS").await.unwrap();
        assert_eq!(store.relationships("b").await.unwrap().len(), 1);

        store.remove("b").await.unwrap();
        store.remove("b").await.unwrap();
        assert!(store.get("b").await.unwrap().is_none());
        assert!(store.relationships("a").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_is_case_sensitive_and_newest_first() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        store.ingest(&asset("1", "Widget one", "", "s")).await.unwrap();
        store.ingest(&asset("2", "Other", "a widget here", "s")).await.unwrap();
        store.ingest(&asset("3", "Nothing", "nothing", "s")).await.unwrap();

        let lower = store.search("widget", &SearchFilters::default()).await.unwrap();
        assert_eq!(lower.items.len(), 1);
        assert_eq!(lower.items[0].id, "2");

        store.ingest(&asset("1", "widget one", "", "s")).await.unwrap();
        let both = store.search("widget", &SearchFilters::default()).await.unwrap();
        let ids: Vec<&str> = both.items.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[tokio::test]
    async fn test_search_limit_reports_has_more() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        for i in 0..3 {
            store
                .ingest(&asset(&format!("w{}", i), "widget", "", "s"))
                .await
                .unwrap();
        }
        let filters = SearchFilters {
            limit: Some(2),
            ..Default::default()
        };
        let page = store.search("widget", &filters).await.unwrap();
        assert_eq!(page.total, 2);
        assert!(page.has_more);

        let filters = SearchFilters {
            limit: Some(3),
            ..Default::default()
        };
        assert!(!store.search("widget", &filters).await.unwrap().has_more);
    }

    #[tokio::test]
    async fn test_extraction_metadata_merges() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        assert!(store.get_extraction_metadata("react").await.unwrap().is_none());

        let mut first = Map::new();
        first.insert("totalFiles".into(), json!(5));
        store.update_extraction_metadata("react", first).await.unwrap();
        let before = store.get_extraction_metadata("react").await.unwrap().unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let mut second = Map::new();
        second.insert("extractedComponents".into(), json!(3));
        store.update_extraction_metadata("react", second).await.unwrap();

        let meta = store.get_extraction_metadata("react").await.unwrap().unwrap();
        assert_eq!(meta.count("totalFiles"), Some(5));
        assert_eq!(meta.count("extractedComponents"), Some(3));
        assert!(meta.updated_at > before.updated_at);
    }

    #[tokio::test]
    async fn test_health_reports_counts() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        store.ingest(&asset("a", "A", "x", "s")).await.unwrap();
        let mut fields = Map::new();
        fields.insert("lastExtraction".into(), json!("2024-01-01T00:00:00.000Z"));
        store.update_extraction_metadata("react", fields).await.unwrap();

        let health = store.health_status().await;
        assert!(health.connected);
        assert_eq!(health.content_assets, Some(1));
        let recent = health.recent_extractions.unwrap();
        assert_eq!(recent[0].platform, "react");
        assert_eq!(
            recent[0].last_extraction.as_deref(),
            Some("2024-01-01T00:00:00.000Z")
        );
    }

    #[tokio::test]
    async fn test_health_on_unreachable_store_is_structured() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        let manager = ConnectionManager::new(&StoreConfig {
            path: blocker.join("kh.sqlite"),
            max_connections: 1,
            acquire_timeout_secs: 1,
        });
        let store = SqliteStore::new(Arc::new(manager));

        let health = store.health_status().await;
        assert!(!health.connected);
        assert!(health.error.is_some());
        assert!(store.ingest(&asset("a", "A", "x", "s")).await.is_err());
    }

    #[tokio::test]
    async fn test_sync_errors_newest_first() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        store.log_sync_error("react", "first").await.unwrap();
        store.log_sync_error("react", "second").await.unwrap();
        store.log_sync_error("docs", "other").await.unwrap();

        let errors = store.recent_sync_errors("react", 10).await.unwrap();
        let messages: Vec<&str> = errors.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["second", "first"]);
    }
}
