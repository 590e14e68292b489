//! Background extraction runs.
//!
//! [`RunRegistry`] starts a controller on its own tokio task and answers
//! immediately with a run id. Callers poll [`status`](RunRegistry::status),
//! await [`wait`](RunRegistry::wait), or [`cancel`](RunRegistry::cancel).
//! At most one run per platform is in flight at a time, and only the most
//! recent finished runs of each platform are remembered.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::info;
use uuid::Uuid;

use crate::controller::{ExtractionController, ExtractionResult, RunStatus};
use crate::error::DispatchError;
use crate::models::iso_now;

/// Public view of one run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub id: String,
    pub platform: String,
    pub status: RunStatus,
    pub started_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ExtractionResult>,
}

/// Finished runs kept per platform before the oldest are dropped.
pub const DEFAULT_RETAINED_RUNS: usize = 20;

struct RunEntry {
    seq: u64,
    record: RunRecord,
    handle: Option<JoinHandle<()>>,
    status_tx: watch::Sender<RunStatus>,
}

impl RunEntry {
    fn finish(&mut self, status: RunStatus, result: ExtractionResult) {
        self.record.status = status;
        self.record.result = Some(result);
        self.record.finished_at = Some(iso_now());
        self.handle = None;
        self.status_tx.send_replace(status);
    }
}

#[derive(Default)]
struct Runs {
    entries: HashMap<String, RunEntry>,
    next_seq: u64,
}

impl Runs {
    /// Drop the oldest finished runs of `platform` beyond `keep`.
    fn evict_finished(&mut self, platform: &str, keep: usize) {
        let mut finished: Vec<(u64, String)> = self
            .entries
            .values()
            .filter(|e| e.record.platform == platform && e.record.status.is_terminal())
            .map(|e| (e.seq, e.record.id.clone()))
            .collect();
        if finished.len() <= keep {
            return;
        }
        finished.sort();
        let excess = finished.len() - keep;
        for (_, id) in finished.into_iter().take(excess) {
            self.entries.remove(&id);
        }
    }
}

#[derive(Clone)]
pub struct RunRegistry {
    runs: Arc<Mutex<Runs>>,
    retained: usize,
}

impl Default for RunRegistry {
    fn default() -> Self {
        Self::with_retention(DEFAULT_RETAINED_RUNS)
    }
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry remembering at most `retained` finished runs per platform.
    pub fn with_retention(retained: usize) -> Self {
        Self {
            runs: Arc::new(Mutex::new(Runs::default())),
            retained,
        }
    }

    /// Start `controller` in the background and return its run id.
    pub async fn dispatch(&self, controller: ExtractionController) -> Result<String, DispatchError> {
        let platform = controller.platform().to_string();
        let mut runs = self.runs.lock().await;

        if let Some(active) = runs
            .entries
            .values()
            .find(|e| e.record.platform == platform && !e.record.status.is_terminal())
        {
            return Err(DispatchError::AlreadyRunning {
                platform,
                run_id: active.record.id.clone(),
            });
        }

        runs.evict_finished(&platform, self.retained);

        let id = Uuid::new_v4().to_string();
        let (status_tx, _) = watch::channel(RunStatus::Running);

        let registry = Arc::clone(&self.runs);
        let run_id = id.clone();
        // The spawned task cannot touch the map until this lock is released,
        // so the entry is always present when it finishes.
        let handle = tokio::spawn(async move {
            let outcome = controller.run().await;
            let mut runs = registry.lock().await;
            if let Some(entry) = runs.entries.get_mut(&run_id) {
                if !entry.record.status.is_terminal() {
                    entry.finish(outcome.status, outcome.result);
                }
            }
        });

        info!(run_id = %id, platform = %platform, "extraction dispatched");
        let seq = runs.next_seq;
        runs.next_seq += 1;
        runs.entries.insert(
            id.clone(),
            RunEntry {
                seq,
                record: RunRecord {
                    id: id.clone(),
                    platform,
                    status: RunStatus::Running,
                    started_at: iso_now(),
                    finished_at: None,
                    result: None,
                },
                handle: Some(handle),
                status_tx,
            },
        );
        Ok(id)
    }

    pub async fn status(&self, id: &str) -> Option<RunRecord> {
        self.runs.lock().await.entries.get(id).map(|e| e.record.clone())
    }

    /// Abort a running run. Finished runs are returned unchanged.
    pub async fn cancel(&self, id: &str) -> Option<RunRecord> {
        let mut runs = self.runs.lock().await;
        let entry = runs.entries.get_mut(id)?;
        if !entry.record.status.is_terminal() {
            if let Some(handle) = entry.handle.take() {
                handle.abort();
            }
            info!(run_id = %id, "extraction cancelled");
            entry.finish(
                RunStatus::Failed,
                ExtractionResult {
                    errors: vec!["Extraction cancelled".to_string()],
                    ..Default::default()
                },
            );
        }
        Some(entry.record.clone())
    }

    /// Wait until the run reaches a terminal state.
    pub async fn wait(&self, id: &str) -> Option<RunRecord> {
        let mut rx = {
            let runs = self.runs.lock().await;
            runs.entries.get(id)?.status_tx.subscribe()
        };
        // The sender lives in the map; it only closes if the run was evicted,
        // which happens after it finished.
        let _ = rx.wait_for(|s| s.is_terminal()).await;
        self.status(id).await
    }
}
