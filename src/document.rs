//! Document extractor for Markdown and plain-text files.
//!
//! Each non-blank file becomes one `blog-post` asset whose body is the file
//! text. The title is the first level-one heading, else the file name.

use std::io;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::config::DocumentExtractorConfig;
use crate::error::{ScanError, SourceReadError};
use crate::extractor::{Extraction, SourceExtractor};
use crate::models::{
    iso, iso_now, AssetMetadata, ContentAsset, ContentType, DocumentMetadata, DOCUMENT_PLATFORM,
};
use crate::scan::{self, sanitize_locator, CandidateFile};

/// Provenance tag of document assets.
pub const SOURCE: &str = "document";

pub fn document_id(relative: &str) -> String {
    format!("docs_{}", sanitize_locator(relative))
}

/// Markdown ATX headings outside fenced code blocks, without their `#`s.
pub fn headings(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut in_fence = false;
    for line in text.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }
        let hashes = trimmed.chars().take_while(|c| *c == '#').count();
        if (1..=6).contains(&hashes) && trimmed[hashes..].starts_with(' ') {
            let heading = trimmed[hashes..].trim().trim_end_matches('#').trim();
            if !heading.is_empty() {
                out.push(heading.to_string());
            }
        }
    }
    out
}

fn title_of(relative: &str, text: &str) -> String {
    text.lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix("# "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| {
            Path::new(relative)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| relative.to_string())
        })
}

fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub struct DocumentExtractor {
    config: DocumentExtractorConfig,
}

impl DocumentExtractor {
    pub fn new(config: DocumentExtractorConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SourceExtractor for DocumentExtractor {
    fn platform(&self) -> &str {
        DOCUMENT_PLATFORM
    }

    fn source(&self) -> &str {
        SOURCE
    }

    fn discover(&self) -> Result<Vec<CandidateFile>, ScanError> {
        scan::discover(
            &self.config.root,
            &self.config.include_patterns,
            &self.config.exclude_patterns,
            self.config.follow_symlinks,
        )
    }

    async fn extract(&self, file: &CandidateFile) -> Result<Option<Extraction>, SourceReadError> {
        let read_err = |source: io::Error| SourceReadError::Read {
            path: file.path.clone(),
            source,
        };

        let bytes = tokio::fs::read(&file.path).await.map_err(read_err)?;
        let stat = tokio::fs::metadata(&file.path).await.map_err(read_err)?;
        let text = String::from_utf8(bytes)
            .map_err(|e| read_err(io::Error::new(io::ErrorKind::InvalidData, e)))?;

        let body = text.trim();
        if body.is_empty() {
            debug!(file = %file.relative, "blank document");
            return Ok(None);
        }

        let last_modified = stat
            .modified()
            .ok()
            .map(|t| iso(DateTime::<Utc>::from(t)))
            .unwrap_or_else(iso_now);

        let asset = ContentAsset {
            id: document_id(&file.relative),
            title: title_of(&file.relative, &text),
            content: body.to_string(),
            content_type: ContentType::BlogPost,
            source: SOURCE.to_string(),
            metadata: AssetMetadata::Document(DocumentMetadata {
                file_path: file.relative.clone(),
                headings: headings(&text),
                word_count: body.split_whitespace().count(),
                content_hash: content_hash(&text),
                last_modified,
                extracted_at: iso_now(),
                platform: DOCUMENT_PLATFORM.to_string(),
            }),
        };

        Ok(Some(Extraction {
            asset,
            links: Vec::new(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const GUIDE: &str = "# Getting Started\n\nInstall the tool.\n\n## Setup\n\n```sh\n# not a heading\n```\n\n### Next steps ###\n";

    fn candidate(root: &Path, rel: &str, body: &str) -> CandidateFile {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, body).unwrap();
        CandidateFile {
            path,
            relative: rel.to_string(),
        }
    }

    #[test]
    fn test_headings_skip_code_fences() {
        assert_eq!(
            headings(GUIDE),
            vec!["Getting Started", "Setup", "Next steps"]
        );
        assert!(headings("#hashtag\n####### seven").is_empty());
    }

    #[test]
    fn test_title_falls_back_to_file_name() {
        assert_eq!(title_of("guides/intro.md", GUIDE), "Getting Started");
        assert_eq!(title_of("notes/todo.txt", "just text"), "todo");
    }

    #[tokio::test]
    async fn test_extract_document() {
        let tmp = TempDir::new().unwrap();
        let file = candidate(tmp.path(), "guides/intro.md", GUIDE);
        let extractor = DocumentExtractor::new(DocumentExtractorConfig::new(tmp.path()));

        let extraction = extractor.extract(&file).await.unwrap().unwrap();
        let asset = extraction.asset;
        assert_eq!(asset.id, "docs_guides_intro_md");
        assert_eq!(asset.title, "Getting Started");
        assert_eq!(asset.content_type, ContentType::BlogPost);
        assert_eq!(asset.source, "document");

        let AssetMetadata::Document(meta) = asset.metadata else {
            panic!("expected document metadata");
        };
        assert_eq!(meta.platform, "docs");
        assert_eq!(meta.content_hash.len(), 64);
        assert_eq!(meta.content_hash, content_hash(GUIDE));
        assert!(meta.word_count > 5);
    }

    #[tokio::test]
    async fn test_blank_document_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let file = candidate(tmp.path(), "empty.md", "  \n\n ");
        let extractor = DocumentExtractor::new(DocumentExtractorConfig::new(tmp.path()));
        assert!(extractor.extract(&file).await.unwrap().is_none());
    }
}
