//! Candidate file discovery shared by the filesystem extractors.
//!
//! Walks a root directory and keeps files whose root-relative path matches
//! an include glob and no exclude glob. Paths are `/`-separated before
//! matching so patterns behave the same on every platform.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use crate::error::ScanError;

/// A file selected for extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFile {
    /// Path used to open the file.
    pub path: PathBuf,
    /// Root-relative path with `/` separators. Source of the asset id.
    pub relative: String,
}

/// Enumerate candidate files, deduplicated and sorted by relative path.
pub fn discover(
    root: &Path,
    include_patterns: &[String],
    exclude_patterns: &[String],
    follow_symlinks: bool,
) -> Result<Vec<CandidateFile>, ScanError> {
    if !root.is_dir() {
        return Err(ScanError::MissingRoot(root.to_path_buf()));
    }

    let include_set = build_globset(include_patterns)?;
    let exclude_set = build_globset(exclude_patterns)?;

    let mut found: BTreeMap<String, PathBuf> = BTreeMap::new();

    for entry in WalkDir::new(root).follow_links(follow_symlinks) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = normalize_separators(relative);

        if exclude_set.is_match(&rel_str) {
            continue;
        }
        if !include_set.is_match(&rel_str) {
            continue;
        }

        found.entry(rel_str).or_insert_with(|| path.to_path_buf());
    }

    Ok(found
        .into_iter()
        .map(|(relative, path)| CandidateFile { path, relative })
        .collect())
}

/// Root-relative path as a `/`-separated string.
pub fn normalize_separators(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Replace path separators and dots so a relative path can be used as an id.
pub fn sanitize_locator(relative: &str) -> String {
    relative.replace(|c| matches!(c, '/' | '\\' | '.'), "_")
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, ScanError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
