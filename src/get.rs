//! Asset retrieval and removal by id.
//!
//! Used by the `kh get` / `kh remove` CLI commands.

use anyhow::{bail, Result};

use crate::models::AssetMetadata;
use crate::store::ContentStore;

/// CLI entry point: fetch an asset and print it to stdout.
pub async fn run_get(store: &dyn ContentStore, id: &str) -> Result<()> {
    let Some(asset) = store.get(id).await? else {
        bail!("asset not found: {}", id);
    };
    let edges = store.relationships(id).await?;

    println!("--- Asset ---");
    println!("id:       {}", asset.id);
    println!("title:    {}", asset.title);
    println!("type:     {}", asset.content_type);
    println!("source:   {}", asset.source);
    if let Some(platform) = asset.metadata.platform() {
        println!("platform: {}", platform);
    }
    if let Some(at) = asset.metadata.extracted_at() {
        println!("extracted_at: {}", at);
    }
    match &asset.metadata {
        AssetMetadata::Component(meta) => {
            println!("file:     {}", meta.file_path);
            println!("elements: {}", meta.jsx_elements.join(", "));
            println!("exports:  {}", meta.exports.join(", "));
            println!("imports:  {}", meta.imports.join(", "));
        }
        AssetMetadata::Document(meta) => {
            println!("file:     {}", meta.file_path);
            println!("words:    {}", meta.word_count);
            println!("sha256:   {}", meta.content_hash);
        }
        AssetMetadata::Open(map) => {
            println!("metadata: {}", serde_json::Value::Object(map.clone()));
        }
    }
    println!();

    println!("--- Content ---");
    println!("{}", asset.content);
    println!();

    if !edges.is_empty() {
        println!("--- Relationships ({}) ---", edges.len());
        for edge in &edges {
            println!("{} -[{}]-> {}", edge.from_id, edge.kind, edge.to_id);
        }
    }
    Ok(())
}

/// CLI entry point: hard-delete an asset and its relationships.
pub async fn run_remove(store: &dyn ContentStore, id: &str) -> Result<()> {
    let existed = store.get(id).await?.is_some();
    store.remove(id).await?;
    if existed {
        println!("removed {}", id);
    } else {
        println!("no asset with id {}", id);
    }
    Ok(())
}
