//! Substring search over stored assets.
//!
//! Used by the `kh search` CLI command and the HTTP search endpoints.

use anyhow::{bail, Result};

use crate::models::{SearchFilters, SearchResult};
use crate::store::ContentStore;

const EXCERPT_CHARS: usize = 160;

/// Validate and run a search.
///
/// An empty or whitespace-only query is rejected here; the store itself
/// treats an empty query as "match everything".
pub async fn search_assets(
    store: &dyn ContentStore,
    query: &str,
    filters: &SearchFilters,
) -> Result<SearchResult> {
    if query.trim().is_empty() {
        bail!("query must not be empty");
    }
    Ok(store.search(query, filters).await?)
}

/// CLI entry point: search and print results to stdout.
pub async fn run_search(store: &dyn ContentStore, query: &str, filters: &SearchFilters) -> Result<()> {
    let page = search_assets(store, query, filters).await?;

    if page.items.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, asset) in page.items.iter().enumerate() {
        println!("{}. [{}] {} / {}", i + 1, asset.content_type, asset.source, asset.title);
        println!("    excerpt: \"{}\"", excerpt(&asset.content));
        println!("    id: {}", asset.id);
        println!();
    }

    if page.has_more {
        println!("More results available; raise --limit to see them.");
    }
    Ok(())
}

fn excerpt(content: &str) -> String {
    let flat = content.replace('\n', " ");
    let flat = flat.trim();
    if flat.chars().count() <= EXCERPT_CHARS {
        return flat.to_string();
    }
    let cut: String = flat.chars().take(EXCERPT_CHARS).collect();
    format!("{}…", cut.trim_end())
}
