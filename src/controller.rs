//! Extraction run controller.
//!
//! Drives one full pass of a [`SourceExtractor`] over its corpus:
//!
//! ```text
//! discover ──► extract (per file) ──► store.ingest ──► link imports ──► ledger
//! ```
//!
//! Per-file failures are collected and never abort the run. Only a failure
//! outside the loop (enumeration, ledger write) ends the run as
//! [`RunStatus::Failed`], and even then the caller gets a result instead of
//! an error.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use serde_json::{json, Map};
use tracing::{debug, error, info, warn};

use crate::extractor::SourceExtractor;
use crate::models::iso_now;
use crate::store::{ContentStore, IMPORTS};

/// Lifecycle of an extraction run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Idle,
    #[serde(rename = "in_progress")]
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

/// Summary of one run.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    /// Candidate files discovered.
    pub total_files: usize,
    /// Files read and analyzed, extracted or not.
    pub processed_files: usize,
    /// Records ingested into the store.
    pub extracted_components: usize,
    pub errors: Vec<String>,
    /// Wall time in milliseconds.
    pub duration: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub result: ExtractionResult,
}

pub struct ExtractionController {
    extractor: Arc<dyn SourceExtractor>,
    store: Arc<dyn ContentStore>,
}

impl ExtractionController {
    pub fn new(extractor: Arc<dyn SourceExtractor>, store: Arc<dyn ContentStore>) -> Self {
        Self { extractor, store }
    }

    pub fn platform(&self) -> &str {
        self.extractor.platform()
    }

    /// Run the extractor to completion.
    pub async fn run(&self) -> RunOutcome {
        let started = Instant::now();
        let platform = self.extractor.platform().to_string();
        let mut result = ExtractionResult::default();
        info!(platform = %platform, "extraction started");

        let extractor = Arc::clone(&self.extractor);
        let files = match tokio::task::spawn_blocking(move || extractor.discover()).await {
            Ok(Ok(files)) => files,
            Ok(Err(e)) => return self.fail(result, started, e),
            Err(e) => return self.fail(result, started, e),
        };
        result.total_files = files.len();

        let mut ingested: HashSet<String> = HashSet::new();
        let mut links: Vec<(String, Vec<String>)> = Vec::new();

        for file in &files {
            let extraction = match self.extractor.extract(file).await {
                Ok(Some(extraction)) => extraction,
                Ok(None) => {
                    result.processed_files += 1;
                    continue;
                }
                Err(e) => {
                    self.record_error(&mut result, format!("Error processing {}: {}", file.relative, e))
                        .await;
                    continue;
                }
            };

            match self.store.ingest(&extraction.asset).await {
                Ok(()) => {
                    debug!(id = %extraction.asset.id, "ingested");
                    result.processed_files += 1;
                    result.extracted_components += 1;
                    ingested.insert(extraction.asset.id.clone());
                    links.push((extraction.asset.id, extraction.links));
                }
                Err(e) => {
                    self.record_error(&mut result, format!("Error processing {}: {}", file.relative, e))
                        .await;
                }
            }
        }

        self.link_imports(&mut result, &ingested, links).await;

        result.duration = started.elapsed().as_millis() as u64;
        let mut fields = Map::new();
        fields.insert("lastExtraction".into(), json!(iso_now()));
        fields.insert("totalFiles".into(), json!(result.total_files));
        fields.insert("processedFiles".into(), json!(result.processed_files));
        fields.insert("extractedComponents".into(), json!(result.extracted_components));
        fields.insert("errors".into(), json!(result.errors.len()));
        fields.insert("duration".into(), json!(result.duration));

        if let Err(e) = self.store.update_extraction_metadata(&platform, fields).await {
            return self.fail(result, started, e);
        }

        info!(
            platform = %platform,
            total = result.total_files,
            processed = result.processed_files,
            extracted = result.extracted_components,
            errors = result.errors.len(),
            duration_ms = result.duration,
            "extraction completed"
        );
        RunOutcome {
            status: RunStatus::Completed,
            result,
        }
    }

    /// Replace each ingested asset's import edges with those whose target
    /// was ingested in this run.
    async fn link_imports(
        &self,
        result: &mut ExtractionResult,
        ingested: &HashSet<String>,
        links: Vec<(String, Vec<String>)>,
    ) {
        for (from, targets) in links {
            if let Err(e) = self.store.clear_relationships(&from, IMPORTS).await {
                self.record_error(result, format!("Error linking {}: {}", from, e))
                    .await;
                continue;
            }
            for to in targets.iter().filter(|t| ingested.contains(*t)) {
                if let Err(e) = self.store.relate(&from, to, IMPORTS).await {
                    self.record_error(result, format!("Error linking {} -> {}: {}", from, to, e))
                        .await;
                }
            }
        }
    }

    async fn record_error(&self, result: &mut ExtractionResult, message: String) {
        warn!(platform = %self.extractor.platform(), "{}", message);
        if let Err(e) = self
            .store
            .log_sync_error(self.extractor.platform(), &message)
            .await
        {
            warn!(error = %e, "failed to log sync error");
        }
        result.errors.push(message);
    }

    fn fail(
        &self,
        mut result: ExtractionResult,
        started: Instant,
        err: impl std::fmt::Display,
    ) -> RunOutcome {
        let message = format!("Extraction failed: {}", err);
        error!(platform = %self.extractor.platform(), "{}", message);
        result.errors.push(message);
        result.duration = started.elapsed().as_millis() as u64;
        RunOutcome {
            status: RunStatus::Failed,
            result,
        }
    }
}
