//! Content store abstraction.
//!
//! The [`ContentStore`] trait is the only way extractors, the run
//! controller, and readers touch persisted knowledge. Two backends exist:
//!
//! | Backend | Use |
//! |---------|-----|
//! | [`SqliteStore`] | Durable store behind the shared [`ConnectionManager`](crate::db::ConnectionManager) |
//! | [`InMemoryStore`] | Tests and embedding callers |
//!
//! The store has no extractor-specific logic. Metadata crosses the boundary
//! as a JSON blob via [`AssetMetadata::to_blob`](crate::models::AssetMetadata::to_blob)
//! and comes back typed via [`AssetMetadata::from_blob`](crate::models::AssetMetadata::from_blob).

pub mod memory;
pub mod sqlite;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::StoreResult;
use crate::models::{
    ContentAsset, ExtractionMetadata, HealthStatus, Relationship, SearchFilters, SearchResult,
    SyncErrorRecord,
};

/// Number of ledger entries reported by [`ContentStore::health_status`].
pub const RECENT_EXTRACTIONS_LIMIT: usize = 10;

/// Edge kind linking a component to a component it imports.
pub const IMPORTS: &str = "IMPORTS";

/// Keyed storage, substring search, and the extraction ledger.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`ingest`](ContentStore::ingest) | Create or fully replace an asset by id |
/// | [`get`](ContentStore::get) | Point lookup |
/// | [`remove`](ContentStore::remove) | Hard delete with relationships |
/// | [`search`](ContentStore::search) | Substring search with filters |
/// | [`update_extraction_metadata`](ContentStore::update_extraction_metadata) | Shallow-merge a platform's ledger entry |
/// | [`get_extraction_metadata`](ContentStore::get_extraction_metadata) | Read a platform's ledger entry |
/// | [`health_status`](ContentStore::health_status) | Diagnostics, never fails |
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Upsert by id. Every field is overwritten and `updatedAt` refreshed.
    async fn ingest(&self, asset: &ContentAsset) -> StoreResult<()>;

    /// Returns `None` when no asset has this id.
    async fn get(&self, id: &str) -> StoreResult<Option<ContentAsset>>;

    /// Delete the asset and every relationship touching it. Removing an
    /// unknown id is a no-op.
    async fn remove(&self, id: &str) -> StoreResult<()>;

    /// Case-sensitive substring match on title OR content, with the
    /// filters ANDed, newest first.
    async fn search(&self, query: &str, filters: &SearchFilters) -> StoreResult<SearchResult>;

    /// Shallow-merge `fields` onto the platform's ledger entry, creating it
    /// if needed.
    async fn update_extraction_metadata(
        &self,
        platform: &str,
        fields: Map<String, Value>,
    ) -> StoreResult<()>;

    async fn get_extraction_metadata(&self, platform: &str)
        -> StoreResult<Option<ExtractionMetadata>>;

    async fn health_status(&self) -> HealthStatus;

    async fn test_connection(&self) -> bool;

    /// Add a directed edge. Adding an existing edge is a no-op.
    async fn relate(&self, from_id: &str, to_id: &str, kind: &str) -> StoreResult<()>;

    /// Drop every outgoing edge of `kind` from `from_id`.
    async fn clear_relationships(&self, from_id: &str, kind: &str) -> StoreResult<()>;

    /// All edges where `id` is either end.
    async fn relationships(&self, id: &str) -> StoreResult<Vec<Relationship>>;

    async fn log_sync_error(&self, platform: &str, message: &str) -> StoreResult<()>;

    /// Newest first.
    async fn recent_sync_errors(
        &self,
        platform: &str,
        limit: usize,
    ) -> StoreResult<Vec<SyncErrorRecord>>;
}

/// Shallow merge used by both backends. Keys owned by the ledger itself
/// (`platform`, `updatedAt`) are ignored.
pub(crate) fn merge_fields(existing: &mut Map<String, Value>, fields: Map<String, Value>) {
    for (key, value) in fields {
        if key == "platform" || key == "updatedAt" {
            continue;
        }
        existing.insert(key, value);
    }
}

pub(crate) fn matches_query(asset: &ContentAsset, query: &str, filters: &SearchFilters) -> bool {
    if !(asset.title.contains(query) || asset.content.contains(query)) {
        return false;
    }
    if let Some(ref source) = filters.source {
        if &asset.source != source {
            return false;
        }
    }
    if let Some(ty) = filters.content_type {
        if asset.content_type != ty {
            return false;
        }
    }
    true
}

pub(crate) fn format_ts_iso(ts_millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ts_millis)
        .map(crate::models::iso)
        .unwrap_or_else(|| ts_millis.to_string())
}
