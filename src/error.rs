//! Error types for the extraction pipeline and content store.
//!
//! Store and extractor boundaries return these typed errors so callers can
//! tell a dead backend apart from a single bad source file. Command and
//! server glue wraps them in `anyhow`.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by a [`ContentStore`](crate::store::ContentStore).
#[derive(Error, Debug)]
pub enum StoreError {
    /// The backing connection could not be established, or a query failed
    /// at the transport level. The underlying cause is kept.
    #[error("store unavailable: {0}")]
    Unavailable(#[from] sqlx::Error),

    /// The backing directory for the database could not be prepared.
    #[error("store unavailable: {path}: {source}")]
    Path {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A metadata blob could not be encoded or decoded.
    #[error("metadata serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// A candidate source file could not be read or parsed.
///
/// Always local to one file; the run controller records it and moves on.
#[derive(Error, Debug)]
pub enum SourceReadError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("grammar could not be loaded: {0}")]
    Language(#[from] tree_sitter::LanguageError),
}

/// Errors raised while enumerating candidate files.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("extraction root does not exist: {0}")]
    MissingRoot(PathBuf),

    #[error("invalid glob pattern: {0}")]
    Glob(#[from] globset::Error),

    #[error("directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
}

/// A run could not be started.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("an extraction run is already in progress for {platform} ({run_id})")]
    AlreadyRunning { platform: String, run_id: String },
}
