use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn kh_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_kh"))
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let components = root.join("src/components");
    fs::create_dir_all(components.join("sections")).unwrap();
    fs::create_dir_all(root.join("src/node_modules/pkg")).unwrap();
    fs::write(
        components.join("sections/Hero.tsx"),
        "import React from 'react';\nimport { Button } from '../Button';\n\nexport const Hero = () => (\n  <>\n    <h1>Welcome</h1>\n    <p>We build AI tools</p>\n    <Button />\n  </>\n);\n",
    )
    .unwrap();
    fs::write(
        components.join("Button.tsx"),
        "export default function Button() {\n  return <button aria-label=\"Start your free trial\">Go</button>;\n}\n",
    )
    .unwrap();
    fs::write(
        components.join("Logo.tsx"),
        "export const Logo = () => <img src=\"/logo.svg\" />;\n",
    )
    .unwrap();
    fs::write(components.join("Broken.tsx"), "export default function (( {\n").unwrap();
    fs::write(
        root.join("src/node_modules/pkg/Ignored.tsx"),
        "export const X = () => <p>Should never be read</p>;\n",
    )
    .unwrap();

    let docs = root.join("docs");
    fs::create_dir_all(&docs).unwrap();
    fs::write(
        docs.join("guide.md"),
        "# Widget Guide\n\nHow to configure the widget.\n",
    )
    .unwrap();

    let config_content = format!(
        r#"[store]
path = "{root}/data/kh.sqlite"

[server]
bind = "127.0.0.1:7341"

[extractors.components]
root = "{root}/src"

[extractors.documents]
root = "{root}/docs"
"#,
        root = root.display()
    );

    let config_path = config_dir.join("kh.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_kh(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = kh_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run kh binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_kh(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/kh.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_kh(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_kh(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_extract_react_counts() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_kh(&config_path, &["extract", "react"]);
    assert!(success, "extract failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("total files: 4"), "stdout={}", stdout);
    assert!(stdout.contains("processed: 3"));
    assert!(stdout.contains("extracted: 2"));
    assert!(stdout.contains("errors: 1"));
    assert!(stdout.contains("Error processing components/Broken.tsx"));
    assert!(stdout.contains("ok"));
}

#[test]
fn test_extract_is_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    run_kh(&config_path, &["extract", "react"]);
    run_kh(&config_path, &["extract", "react"]);

    let (stdout, _, success) = run_kh(&config_path, &["search", "Welcome"]);
    assert!(success);
    assert_eq!(stdout.matches("id: react_components_sections_Hero_tsx").count(), 1);
}

#[test]
fn test_extract_unknown_platform_fails() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_kh(&config_path, &["extract", "firebase"]);
    assert!(!success);
    assert!(stderr.contains("no extractor configured for platform"));
}

#[test]
fn test_search_with_source_filter() {
    let (_tmp, config_path) = setup_test_env();
    run_kh(&config_path, &["extract", "all"]);

    let (stdout, _, success) = run_kh(&config_path, &["search", "Widget"]);
    assert!(success);
    assert!(stdout.contains("docs_guide_md"));

    let (stdout, _, success) = run_kh(
        &config_path,
        &["search", "Widget", "--source", "react_component"],
    );
    assert!(success);
    assert!(stdout.contains("No results."));
}

#[test]
fn test_search_empty_query_fails() {
    let (_tmp, config_path) = setup_test_env();
    let (_, stderr, success) = run_kh(&config_path, &["search", ""]);
    assert!(!success);
    assert!(stderr.contains("must not be empty"));
}

#[test]
fn test_get_shows_component_and_import_edge() {
    let (_tmp, config_path) = setup_test_env();
    run_kh(&config_path, &["extract", "react"]);

    let (stdout, stderr, success) =
        run_kh(&config_path, &["get", "react_components_sections_Hero_tsx"]);
    assert!(success, "get failed: {}", stderr);
    assert!(stdout.contains("React Component: Hero"));
    assert!(stdout.contains("elements: h1, p, Button"));
    assert!(stdout.contains("Welcome We build AI tools"));
    assert!(stdout
        .contains("react_components_sections_Hero_tsx -[IMPORTS]-> react_components_Button_tsx"));
}

#[test]
fn test_get_missing_fails() {
    let (_tmp, config_path) = setup_test_env();
    let (_, stderr, success) = run_kh(&config_path, &["get", "react_nope"]);
    assert!(!success);
    assert!(stderr.contains("asset not found"));
}

#[test]
fn test_remove_then_get() {
    let (_tmp, config_path) = setup_test_env();
    run_kh(&config_path, &["extract", "react"]);

    let (stdout, _, success) = run_kh(&config_path, &["remove", "react_components_Button_tsx"]);
    assert!(success);
    assert!(stdout.contains("removed react_components_Button_tsx"));

    let (_, _, success) = run_kh(&config_path, &["get", "react_components_Button_tsx"]);
    assert!(!success);

    let (stdout, _, success) = run_kh(&config_path, &["remove", "react_components_Button_tsx"]);
    assert!(success);
    assert!(stdout.contains("no asset with id"));
}

#[test]
fn test_status_reports_ledger() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_kh(&config_path, &["status"]);
    assert!(success);
    assert!(stdout.contains("never extracted"));

    run_kh(&config_path, &["extract", "react"]);
    let (stdout, _, success) = run_kh(&config_path, &["status", "react"]);
    assert!(success);
    assert!(stdout.contains("Connected:   yes"));
    assert!(stdout.contains("totalFiles:"));
    assert!(stdout.contains("recent errors:"));
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_kh(&tmp.path().join("nope.toml"), &["status"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}
