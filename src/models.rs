//! Core data models used throughout Knowledge Harness.
//!
//! These types represent the content records, ledger entries, and search
//! results that flow between extractors, the content store, and callers.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Platform key of the component extractor.
pub const COMPONENT_PLATFORM: &str = "react";
/// Platform key of the document extractor.
pub const DOCUMENT_PLATFORM: &str = "docs";

/// Closed set of asset kinds a [`ContentAsset`] can have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContentType {
    /// Narrative document (articles, guides, notes).
    BlogPost,
    /// Operational data record.
    OperationalData,
    /// Component or other code-derived asset.
    Asset,
    /// Configuration record.
    Configuration,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::BlogPost => "blog-post",
            ContentType::OperationalData => "operational-data",
            ContentType::Asset => "asset",
            ContentType::Configuration => "configuration",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "blog-post" => Ok(ContentType::BlogPost),
            "operational-data" => Ok(ContentType::OperationalData),
            "asset" => Ok(ContentType::Asset),
            "configuration" => Ok(ContentType::Configuration),
            other => Err(format!(
                "unknown content type '{}'. Must be blog-post, operational-data, asset, or configuration.",
                other
            )),
        }
    }
}

/// The canonical unit of extracted knowledge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentAsset {
    /// Stable id derived from the source locator.
    pub id: String,
    pub title: String,
    /// Extracted body text. May be empty, never absent.
    pub content: String,
    #[serde(rename = "type")]
    pub content_type: ContentType,
    /// Provenance tag of the extractor that produced the record.
    pub source: String,
    pub metadata: AssetMetadata,
}

/// Facts the component extractor records about one UI source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentMetadata {
    pub file_path: String,
    pub component_name: String,
    pub jsx_elements: Vec<String>,
    pub exports: Vec<String>,
    /// External module specifiers only.
    pub imports: Vec<String>,
    pub line_count: usize,
    pub file_size: u64,
    pub last_modified: String,
    pub has_default_export: bool,
    pub has_named_exports: bool,
    pub extracted_at: String,
    pub platform: String,
}

/// Facts the document extractor records about one text file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    pub file_path: String,
    pub headings: Vec<String>,
    pub word_count: usize,
    pub content_hash: String,
    pub last_modified: String,
    pub extracted_at: String,
    pub platform: String,
}

/// Typed view over the metadata blob of a [`ContentAsset`].
///
/// The store persists metadata as a single JSON string; [`to_blob`] and
/// [`from_blob`] are the only conversions across that boundary. Blobs whose
/// `platform` is not a known extractor (or that do not decode into the
/// extractor's shape) come back as [`AssetMetadata::Open`].
///
/// [`to_blob`]: AssetMetadata::to_blob
/// [`from_blob`]: AssetMetadata::from_blob
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AssetMetadata {
    Component(ComponentMetadata),
    Document(DocumentMetadata),
    Open(Map<String, Value>),
}

impl AssetMetadata {
    /// The `platform` discriminator, if one is set.
    pub fn platform(&self) -> Option<&str> {
        match self {
            AssetMetadata::Component(m) => Some(&m.platform),
            AssetMetadata::Document(m) => Some(&m.platform),
            AssetMetadata::Open(map) => map.get("platform").and_then(Value::as_str),
        }
    }

    /// The `extractedAt` timestamp, if one is set.
    pub fn extracted_at(&self) -> Option<&str> {
        match self {
            AssetMetadata::Component(m) => Some(&m.extracted_at),
            AssetMetadata::Document(m) => Some(&m.extracted_at),
            AssetMetadata::Open(map) => map.get("extractedAt").and_then(Value::as_str),
        }
    }

    /// Encode as the JSON blob stored next to the asset.
    ///
    /// Fills in `extractedAt` (now) and `platform` (the asset's `source`)
    /// when the metadata does not carry them.
    pub fn to_blob(&self, source: &str) -> Result<String, serde_json::Error> {
        let mut map = match serde_json::to_value(self)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        map.entry("extractedAt")
            .or_insert_with(|| Value::String(iso_now()));
        map.entry("platform")
            .or_insert_with(|| Value::String(source.to_string()));
        serde_json::to_string(&Value::Object(map))
    }

    /// Decode a stored blob into its typed variant.
    pub fn from_blob(blob: &str) -> Result<Self, serde_json::Error> {
        if blob.trim().is_empty() {
            return Ok(AssetMetadata::Open(Map::new()));
        }
        let map = match serde_json::from_str::<Value>(blob)? {
            Value::Object(map) => map,
            _ => return Ok(AssetMetadata::Open(Map::new())),
        };
        let platform = map.get("platform").and_then(Value::as_str).unwrap_or("");
        let value = Value::Object(map.clone());
        let typed = match platform {
            COMPONENT_PLATFORM => serde_json::from_value(value)
                .ok()
                .map(AssetMetadata::Component),
            DOCUMENT_PLATFORM => serde_json::from_value(value)
                .ok()
                .map(AssetMetadata::Document),
            _ => None,
        };
        Ok(typed.unwrap_or(AssetMetadata::Open(map)))
    }
}

/// Last-run summary of one source extractor, keyed by platform.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionMetadata {
    pub platform: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
    pub updated_at: String,
}

impl ExtractionMetadata {
    /// Read a numeric ledger field such as `totalFiles`.
    pub fn count(&self, key: &str) -> Option<u64> {
        self.fields.get(key).and_then(Value::as_u64)
    }

    pub fn last_extraction(&self) -> Option<&str> {
        self.fields.get("lastExtraction").and_then(Value::as_str)
    }
}

/// Optional filters for [`ContentStore::search`](crate::store::ContentStore::search).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub content_type: Option<ContentType>,
    /// Page size. `None` or `0` means unlimited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl SearchFilters {
    pub fn effective_limit(&self) -> Option<usize> {
        self.limit.filter(|l| *l > 0)
    }
}

/// A single page of search results.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub items: Vec<ContentAsset>,
    /// Number of items on this page.
    pub total: usize,
    /// True when the limit cut off further matches.
    pub has_more: bool,
}

/// An edge between two content assets.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    pub from_id: String,
    pub to_id: String,
    pub kind: String,
}

/// One entry of the per-platform sync error log.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncErrorRecord {
    pub platform: String,
    pub message: String,
    pub created_at: String,
}

/// Backend identity reported by [`HealthStatus`].
#[derive(Debug, Clone, Serialize)]
pub struct DatabaseInfo {
    pub name: String,
    pub version: String,
    pub edition: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentExtraction {
    pub platform: String,
    pub last_extraction: Option<String>,
    pub updated_at: String,
}

/// Aggregate diagnostic returned by
/// [`ContentStore::health_status`](crate::store::ContentStore::health_status).
///
/// Never an error: an unreachable backend yields `connected: false` plus the
/// failure message.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<DatabaseInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_assets: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recent_extractions: Option<Vec<RecentExtraction>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthStatus {
    pub fn disconnected(error: impl fmt::Display) -> Self {
        Self {
            connected: false,
            database: None,
            content_assets: None,
            recent_extractions: None,
            error: Some(error.to_string()),
        }
    }
}

/// ISO-8601 timestamp with millisecond precision, e.g. `2024-05-01T12:00:00.000Z`.
pub fn iso(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn iso_now() -> String {
    iso(Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn component_meta() -> ComponentMetadata {
        ComponentMetadata {
            file_path: "sections/Hero.tsx".to_string(),
            component_name: "Hero".to_string(),
            jsx_elements: vec!["h1".to_string()],
            exports: vec!["Hero".to_string()],
            imports: vec!["react".to_string()],
            line_count: 3,
            file_size: 120,
            last_modified: "2024-01-01T00:00:00.000Z".to_string(),
            has_default_export: false,
            has_named_exports: false,
            extracted_at: "2024-01-02T00:00:00.000Z".to_string(),
            platform: COMPONENT_PLATFORM.to_string(),
        }
    }

    #[test]
    fn test_component_blob_decodes_typed() {
        let meta = AssetMetadata::Component(component_meta());
        let blob = meta.to_blob("react_component").unwrap();
        assert!(blob.contains("\"jsxElements\":[\"h1\"]"));
        assert_eq!(AssetMetadata::from_blob(&blob).unwrap(), meta);
    }

    #[test]
    fn test_open_blob_gets_platform_and_timestamp() {
        let mut map = Map::new();
        map.insert("test".to_string(), json!(true));
        let blob = AssetMetadata::Open(map).to_blob("health_check").unwrap();
        let decoded = AssetMetadata::from_blob(&blob).unwrap();
        assert_eq!(decoded.platform(), Some("health_check"));
        assert!(decoded.extracted_at().is_some());
    }

    #[test]
    fn test_malformed_component_blob_falls_back_to_open() {
        let decoded = AssetMetadata::from_blob(r#"{"platform":"react","filePath":1}"#).unwrap();
        assert!(matches!(decoded, AssetMetadata::Open(_)));
        assert_eq!(decoded.platform(), Some("react"));
    }

    #[test]
    fn test_empty_blob_is_open() {
        assert_eq!(
            AssetMetadata::from_blob("").unwrap(),
            AssetMetadata::Open(Map::new())
        );
    }

    #[test]
    fn test_content_type_round_trips_wire_names() {
        for name in ["blog-post", "operational-data", "asset", "configuration"] {
            let ty: ContentType = name.parse().unwrap();
            assert_eq!(ty.as_str(), name);
        }
        assert!("widget".parse::<ContentType>().is_err());
    }

    #[test]
    fn test_search_limit_zero_is_unlimited() {
        let filters = SearchFilters {
            limit: Some(0),
            ..Default::default()
        };
        assert_eq!(filters.effective_limit(), None);
    }
}
