//! End-to-end extraction into the SQLite store through the public API.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use knowledge_harness::component::ComponentExtractor;
use knowledge_harness::config::{ComponentExtractorConfig, DocumentExtractorConfig, StoreConfig};
use knowledge_harness::controller::{ExtractionController, RunStatus};
use knowledge_harness::document::DocumentExtractor;
use knowledge_harness::models::{AssetMetadata, ContentType, SearchFilters};
use knowledge_harness::store::{ContentStore, SqliteStore, IMPORTS};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn write(root: &Path, rel: &str, body: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, body).unwrap();
}

fn sqlite(tmp: &TempDir) -> Arc<SqliteStore> {
    Arc::new(SqliteStore::open(&StoreConfig {
        path: tmp.path().join("data/kh.sqlite"),
        max_connections: 2,
        acquire_timeout_secs: 5,
    }))
}

#[tokio::test]
async fn test_components_and_documents_share_one_store() {
    let tmp = TempDir::new().unwrap();
    let src = tmp.path().join("src");
    let docs = tmp.path().join("docs");
    write(
        &src,
        "components/Hero.tsx",
        "import { Card } from './Card';\nexport const Hero = () => <><h1>Welcome</h1><p>We build AI tools</p></>;\n",
    );
    write(
        &src,
        "components/Card.tsx",
        "export default function Card() { return <div>Widget card body</div>; }\n",
    );
    write(&docs, "widgets.md", "# Widgets\n\nEvery widget has a card.\n");

    let store = sqlite(&tmp);
    let components = ExtractionController::new(
        Arc::new(ComponentExtractor::new(ComponentExtractorConfig::new(&src))),
        store.clone(),
    );
    let documents = ExtractionController::new(
        Arc::new(DocumentExtractor::new(DocumentExtractorConfig::new(&docs))),
        store.clone(),
    );

    let outcome = components.run().await;
    assert_eq!(outcome.status, RunStatus::Completed);
    assert_eq!(outcome.result.extracted_components, 2);
    let outcome = documents.run().await;
    assert_eq!(outcome.status, RunStatus::Completed);
    assert_eq!(outcome.result.extracted_components, 1);

    let hero = store.get("react_components_Hero_tsx").await.unwrap().unwrap();
    assert_eq!(hero.content, "Welcome We build AI tools");
    match hero.metadata {
        AssetMetadata::Component(ref meta) => {
            assert_eq!(meta.jsx_elements, vec!["h1", "p"]);
            assert!(meta.imports.is_empty());
        }
        ref other => panic!("unexpected metadata: {:?}", other),
    }

    let card = store.get("react_components_Card_tsx").await.unwrap().unwrap();
    match card.metadata {
        AssetMetadata::Component(ref meta) => {
            assert!(meta.has_default_export);
            assert_eq!(meta.exports, vec!["Card"]);
        }
        ref other => panic!("unexpected metadata: {:?}", other),
    }

    let edges = store.relationships("react_components_Card_tsx").await.unwrap();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].from_id, "react_components_Hero_tsx");
    assert_eq!(edges[0].kind, IMPORTS);

    let widgets = store
        .search(
            "idget",
            &SearchFilters {
                content_type: Some(ContentType::BlogPost),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(widgets.items.len(), 1);
    assert_eq!(widgets.items[0].id, "docs_widgets_md");

    let health = store.health_status().await;
    assert!(health.connected);
    assert_eq!(health.content_assets, Some(3));
    let platforms: Vec<String> = health
        .recent_extractions
        .unwrap()
        .into_iter()
        .map(|r| r.platform)
        .collect();
    assert_eq!(platforms, vec!["docs", "react"]);

    store.manager().release().await;
    store.manager().release().await;
}

#[tokio::test]
async fn test_rerun_after_edit_replaces_record() {
    let tmp = TempDir::new().unwrap();
    let src = tmp.path().join("src");
    write(&src, "Banner.tsx", "export const Banner = () => <p>Old banner text</p>;\n");

    let store = sqlite(&tmp);
    let controller = ExtractionController::new(
        Arc::new(ComponentExtractor::new(ComponentExtractorConfig::new(&src))),
        store.clone(),
    );
    controller.run().await;

    write(&src, "Banner.tsx", "export const Banner = () => <p>New banner text</p>;\n");
    controller.run().await;

    let page = store
        .search("banner", &SearchFilters::default())
        .await
        .unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].content, "New banner text");

    let ledger = store.get_extraction_metadata("react").await.unwrap().unwrap();
    assert_eq!(ledger.count("totalFiles"), Some(1));
    assert_eq!(ledger.count("extractedComponents"), Some(1));
    assert_eq!(ledger.count("errors"), Some(0));
}
