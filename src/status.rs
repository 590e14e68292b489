//! Store health and extraction ledger overview.
//!
//! Shared by `kh status` and the HTTP health/content-stats endpoints.

use anyhow::Result;
use serde::Serialize;

use crate::error::StoreResult;
use crate::models::{ExtractionMetadata, HealthStatus};
use crate::store::ContentStore;

const RECENT_SYNC_ERRORS: usize = 5;

/// Ledger entry for one platform, or a marker that it never ran.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ExtractionStats {
    Ran(ExtractionMetadata),
    NotRun { platform: String, status: &'static str },
}

pub async fn extraction_stats(
    store: &dyn ContentStore,
    platform: &str,
) -> StoreResult<ExtractionStats> {
    Ok(match store.get_extraction_metadata(platform).await? {
        Some(meta) => ExtractionStats::Ran(meta),
        None => ExtractionStats::NotRun {
            platform: platform.to_string(),
            status: "not_run",
        },
    })
}

/// CLI entry point: print health plus the ledger of each platform.
pub async fn run_status(store: &dyn ContentStore, platforms: &[String]) -> Result<()> {
    let health = store.health_status().await;
    print_health(&health);

    for platform in platforms {
        println!();
        match extraction_stats(store, platform).await? {
            ExtractionStats::Ran(meta) => {
                println!("  {}", platform);
                println!("    last extraction:  {}", meta.last_extraction().unwrap_or("-"));
                for key in ["totalFiles", "processedFiles", "extractedComponents", "errors", "duration"] {
                    if let Some(v) = meta.count(key) {
                        println!("    {:<18}{}", format!("{}:", key), v);
                    }
                }
            }
            ExtractionStats::NotRun { .. } => {
                println!("  {}", platform);
                println!("    never extracted");
            }
        }

        let errors = store.recent_sync_errors(platform, RECENT_SYNC_ERRORS).await?;
        if !errors.is_empty() {
            println!("    recent errors:");
            for e in &errors {
                println!("      {}  {}", e.created_at, e.message);
            }
        }
    }
    Ok(())
}

fn print_health(health: &HealthStatus) {
    println!("Knowledge Harness: Store Status");
    println!("=================================");
    println!();
    if !health.connected {
        println!("  Connected:   no");
        if let Some(ref err) = health.error {
            println!("  Error:       {}", err);
        }
        return;
    }
    println!("  Connected:   yes");
    if let Some(ref db) = health.database {
        println!("  Backend:     {} {} ({})", db.name, db.version, db.edition);
    }
    if let Some(count) = health.content_assets {
        println!("  Assets:      {}", count);
    }
    if let Some(ref recent) = health.recent_extractions {
        if !recent.is_empty() {
            println!();
            println!("  {:<16} {}", "PLATFORM", "UPDATED");
            for r in recent {
                println!("  {:<16} {}", r.platform, r.updated_at);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use serde_json::{json, Map};

    #[tokio::test]
    async fn test_not_run_marker() {
        let store = InMemoryStore::new();
        let stats = extraction_stats(&store, "react").await.unwrap();
        assert_eq!(
            serde_json::to_value(stats).unwrap(),
            json!({"platform": "react", "status": "not_run"})
        );
    }

    #[tokio::test]
    async fn test_ledger_is_flattened() {
        let store = InMemoryStore::new();
        let mut fields = Map::new();
        fields.insert("totalFiles".into(), json!(4));
        store.update_extraction_metadata("react", fields).await.unwrap();

        let value = serde_json::to_value(extraction_stats(&store, "react").await.unwrap()).unwrap();
        assert_eq!(value["platform"], "react");
        assert_eq!(value["totalFiles"], 4);
        assert!(value["updatedAt"].is_string());
    }
}
