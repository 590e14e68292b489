//! Source extractor abstraction.
//!
//! A [`SourceExtractor`] scans one corpus and turns each candidate file into
//! at most one [`ContentAsset`]. The run controller drives it; the store
//! never sees extractor-specific logic.
//!
//! | Platform | Extractor | Source tag |
//! |----------|-----------|------------|
//! | `react` | [`ComponentExtractor`] | `react_component` |
//! | `docs` | [`DocumentExtractor`] | `document` |

use std::sync::Arc;

use async_trait::async_trait;

use crate::component::ComponentExtractor;
use crate::config::Config;
use crate::document::DocumentExtractor;
use crate::error::{ScanError, SourceReadError};
use crate::models::ContentAsset;
use crate::scan::CandidateFile;

/// Output of extracting one candidate file.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub asset: ContentAsset,
    /// Ids of other assets this one imports. Only targets ingested in the
    /// same run become edges.
    pub links: Vec<String>,
}

/// A pluggable producer of content records.
#[async_trait]
pub trait SourceExtractor: Send + Sync {
    /// Ledger key, e.g. `"react"`.
    fn platform(&self) -> &str;

    /// Provenance tag written to every asset, e.g. `"react_component"`.
    fn source(&self) -> &str;

    /// Enumerate candidate files in deterministic order.
    fn discover(&self) -> Result<Vec<CandidateFile>, ScanError>;

    /// Read and analyze one file.
    ///
    /// `Ok(None)` means the file was processed but holds nothing worth
    /// storing.
    async fn extract(&self, file: &CandidateFile) -> Result<Option<Extraction>, SourceReadError>;
}

/// Every extractor enabled in the config.
pub fn build_extractors(config: &Config) -> Vec<Arc<dyn SourceExtractor>> {
    let mut extractors: Vec<Arc<dyn SourceExtractor>> = Vec::new();
    if let Some(ref components) = config.extractors.components {
        extractors.push(Arc::new(ComponentExtractor::new(components.clone())));
    }
    if let Some(ref documents) = config.extractors.documents {
        extractors.push(Arc::new(DocumentExtractor::new(documents.clone())));
    }
    extractors
}

/// The configured extractor for `platform`, if any.
pub fn extractor_for(config: &Config, platform: &str) -> Option<Arc<dyn SourceExtractor>> {
    build_extractors(config)
        .into_iter()
        .find(|e| e.platform() == platform)
}
