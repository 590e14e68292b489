//! In-memory [`ContentStore`] for tests and embedding callers.
//!
//! Metadata still round-trips through the JSON blob so reads behave exactly
//! like the SQLite backend.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use super::{matches_query, merge_fields, ContentStore, RECENT_EXTRACTIONS_LIMIT};
use crate::error::StoreResult;
use crate::models::{
    iso_now, AssetMetadata, ContentAsset, DatabaseInfo, ExtractionMetadata, HealthStatus,
    RecentExtraction, Relationship, SearchFilters, SearchResult, SyncErrorRecord,
};

struct StoredAsset {
    asset: ContentAsset,
    blob: String,
    revision: u64,
}

struct StoredLedger {
    fields: Map<String, Value>,
    updated_at: String,
    revision: u64,
}

#[derive(Default)]
struct Inner {
    assets: HashMap<String, StoredAsset>,
    ledger: HashMap<String, StoredLedger>,
    relationships: Vec<Relationship>,
    sync_errors: Vec<SyncErrorRecord>,
    revision: u64,
}

impl Inner {
    fn next_revision(&mut self) -> u64 {
        self.revision += 1;
        self.revision
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn decode(stored: &StoredAsset) -> StoreResult<ContentAsset> {
    Ok(ContentAsset {
        metadata: AssetMetadata::from_blob(&stored.blob)?,
        ..stored.asset.clone()
    })
}

#[async_trait]
impl ContentStore for InMemoryStore {
    async fn ingest(&self, asset: &ContentAsset) -> StoreResult<()> {
        let blob = asset.metadata.to_blob(&asset.source)?;
        let mut inner = self.inner.write().await;
        let revision = inner.next_revision();
        inner.assets.insert(
            asset.id.clone(),
            StoredAsset {
                asset: asset.clone(),
                blob,
                revision,
            },
        );
        Ok(())
    }

    async fn get(&self, id: &str) -> StoreResult<Option<ContentAsset>> {
        let inner = self.inner.read().await;
        inner.assets.get(id).map(decode).transpose()
    }

    async fn remove(&self, id: &str) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        inner.assets.remove(id);
        inner
            .relationships
            .retain(|r| r.from_id != id && r.to_id != id);
        Ok(())
    }

    async fn search(&self, query: &str, filters: &SearchFilters) -> StoreResult<SearchResult> {
        let inner = self.inner.read().await;
        let mut hits: Vec<&StoredAsset> = inner
            .assets
            .values()
            .filter(|s| matches_query(&s.asset, query, filters))
            .collect();
        hits.sort_by(|a, b| b.revision.cmp(&a.revision));

        let mut has_more = false;
        if let Some(lim) = filters.effective_limit() {
            has_more = hits.len() > lim;
            hits.truncate(lim);
        }

        let items = hits
            .into_iter()
            .map(decode)
            .collect::<StoreResult<Vec<_>>>()?;
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
        let mut inner = self.inner.write().await;
        let revision = inner.next_revision();
        let entry = inner
            .ledger
            .entry(platform.to_string())
            .or_insert_with(|| StoredLedger {
                fields: Map::new(),
                updated_at: String::new(),
                revision,
            });
        merge_fields(&mut entry.fields, fields);
        entry.updated_at = iso_now();
        entry.revision = revision;
        Ok(())
    }

    async fn get_extraction_metadata(
        &self,
        platform: &str,
    ) -> StoreResult<Option<ExtractionMetadata>> {
        let inner = self.inner.read().await;
        Ok(inner.ledger.get(platform).map(|l| ExtractionMetadata {
            platform: platform.to_string(),
            fields: l.fields.clone(),
            updated_at: l.updated_at.clone(),
        }))
    }

    async fn health_status(&self) -> HealthStatus {
        let inner = self.inner.read().await;
        let mut ledger: Vec<(&String, &StoredLedger)> = inner.ledger.iter().collect();
        ledger.sort_by(|a, b| b.1.revision.cmp(&a.1.revision));

        let recent_extractions = ledger
            .into_iter()
            .take(RECENT_EXTRACTIONS_LIMIT)
            .map(|(platform, l)| RecentExtraction {
                platform: platform.clone(),
                last_extraction: l
                    .fields
                    .get("lastExtraction")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                updated_at: l.updated_at.clone(),
            })
            .collect();

        HealthStatus {
            connected: true,
            database: Some(DatabaseInfo {
                name: "memory".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                edition: "in-process".to_string(),
            }),
            content_assets: Some(inner.assets.len() as i64),
            recent_extractions: Some(recent_extractions),
            error: None,
        }
    }

    async fn test_connection(&self) -> bool {
        true
    }

    async fn relate(&self, from_id: &str, to_id: &str, kind: &str) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let edge = Relationship {
            from_id: from_id.to_string(),
            to_id: to_id.to_string(),
            kind: kind.to_string(),
        };
        if !inner.relationships.contains(&edge) {
            inner.relationships.push(edge);
        }
        Ok(())
    }

    async fn clear_relationships(&self, from_id: &str, kind: &str) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        inner
            .relationships
            .retain(|r| !(r.from_id == from_id && r.kind == kind));
        Ok(())
    }

    async fn relationships(&self, id: &str) -> StoreResult<Vec<Relationship>> {
        let inner = self.inner.read().await;
        let mut edges: Vec<Relationship> = inner
            .relationships
            .iter()
            .filter(|r| r.from_id == id || r.to_id == id)
            .cloned()
            .collect();
        edges.sort_by(|a, b| {
            (&a.from_id, &a.to_id, &a.kind).cmp(&(&b.from_id, &b.to_id, &b.kind))
        });
        Ok(edges)
    }

    async fn log_sync_error(&self, platform: &str, message: &str) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        inner.sync_errors.push(SyncErrorRecord {
            platform: platform.to_string(),
            message: message.to_string(),
            created_at: iso_now(),
        });
        Ok(())
    }

    async fn recent_sync_errors(
        &self,
        platform: &str,
        limit: usize,
    ) -> StoreResult<Vec<SyncErrorRecord>> {
        let inner = self.inner.read().await;
        Ok(inner
            .sync_errors
            .iter()
            .rev()
            .filter(|e| e.platform == platform)
            .take(limit)
            .cloned()
            .collect())
    }
}
