//! Component content extractor.
//!
//! Parses TSX/JSX component files with tree-sitter and mines them for
//! human-facing text and structural facts. One pre-order walk over the
//! syntax tree collects:
//!
//! - import specifiers
//! - default/named export facts and exported function names
//! - JSX tag names (deduplicated, first-seen order)
//! - JSX text and string literals that look like prose
//!
//! A file becomes a [`ContentAsset`] only when it carries text or renders a
//! contentful tag (see [`CONTENTFUL_TAGS`]).

use std::io;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::RegexSet;
use tracing::debug;
use tree_sitter::{Node, Parser};

use crate::config::ComponentExtractorConfig;
use crate::error::{ScanError, SourceReadError};
use crate::extractor::{Extraction, SourceExtractor};
use crate::models::{
    iso, iso_now, AssetMetadata, ComponentMetadata, ContentAsset, ContentType, COMPONENT_PLATFORM,
};
use crate::scan::{self, sanitize_locator, CandidateFile};

/// Provenance tag of component assets.
pub const SOURCE: &str = "react_component";

/// Tags whose presence alone makes a file worth storing.
pub const CONTENTFUL_TAGS: &[&str] = &[
    "h1", "h2", "h3", "h4", "h5", "h6", "p", "span", "div", "Card", "Modal", "Button",
];

const MIN_JSX_TEXT_CHARS: usize = 3;
const MIN_STRING_LITERAL_CHARS: usize = 10;

const IMPORT_EXTENSIONS: &[&str] = &["tsx", "jsx", "ts", "js"];

/// Literals matching any of these are code, not prose.
static NOT_PROSE: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new([
        r"^[A-Za-z_][A-Za-z0-9_]*$",
        r"^[./]",
        r"^https?://",
        r"^#[0-9a-fA-F]+$",
        r"^[0-9]+px$",
        r"^(?:className|style|src|href|alt|title)$",
        r"^[A-Za-z0-9_-]+$",
    ])
    .expect("Invalid content filter regex")
});

/// Everything one walk over a component file yields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComponentInfo {
    /// Module specifiers as written, relative and external.
    pub imports: Vec<String>,
    pub exports: Vec<String>,
    pub jsx_elements: Vec<String>,
    pub text_content: Vec<String>,
    pub has_default_export: bool,
    pub has_named_exports: bool,
}

impl ComponentInfo {
    /// Text was found, or a contentful tag is rendered.
    pub fn has_extractable_content(&self) -> bool {
        !self.text_content.is_empty()
            || self
                .jsx_elements
                .iter()
                .any(|tag| CONTENTFUL_TAGS.contains(&tag.as_str()))
    }

    /// Body text of the asset: the collected fragments, or a synthesized
    /// summary of the rendered tags.
    pub fn content(&self) -> String {
        if self.text_content.is_empty() {
            format!(
                "React component with JSX elements: {}",
                self.jsx_elements.join(", ")
            )
        } else {
            self.text_content.join(" ")
        }
    }
}

/// File facts that come from the filesystem rather than the syntax tree.
#[derive(Debug, Clone)]
pub struct FileStats {
    pub line_count: usize,
    pub file_size: u64,
    pub last_modified: String,
}

/// Stable asset id for a root-relative component path.
pub fn component_id(relative: &str) -> String {
    format!("react_{}", sanitize_locator(relative))
}

/// True when a string literal reads like user-facing prose.
pub fn is_meaningful_text(text: &str) -> bool {
    !NOT_PROSE.is_match(text) && text.contains(' ')
}

/// Parse `text` as TSX and collect imports, exports, tags and prose.
///
/// A tree containing syntax errors is a parse failure.
pub fn analyze(path: &Path, text: &str) -> Result<ComponentInfo, SourceReadError> {
    let mut parser = Parser::new();
    parser.set_language(&tree_sitter_typescript::LANGUAGE_TSX.into())?;

    let tree = parser
        .parse(text, None)
        .ok_or_else(|| SourceReadError::Parse {
            path: path.to_path_buf(),
            reason: "parser returned no tree".to_string(),
        })?;

    let root = tree.root_node();
    if root.has_error() {
        let reason = match first_error(root) {
            Some(node) => {
                let pos = node.start_position();
                format!("syntax error at line {}, column {}", pos.row + 1, pos.column + 1)
            }
            None => "syntax error".to_string(),
        };
        return Err(SourceReadError::Parse {
            path: path.to_path_buf(),
            reason,
        });
    }

    let mut info = ComponentInfo::default();
    let src = text.as_bytes();
    let mut cursor = root.walk();
    loop {
        visit(cursor.node(), src, &mut info);
        if cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return Ok(info);
            }
        }
    }
}

fn visit(node: Node<'_>, src: &[u8], info: &mut ComponentInfo) {
    match node.kind() {
        "import_statement" => {
            if let Some(specifier) = node
                .child_by_field_name("source")
                .and_then(|s| string_value(s, src))
            {
                info.imports.push(specifier);
            }
        }
        "export_statement" => visit_export(node, src, info),
        "function_declaration" | "generator_function_declaration" => {
            let exported = node
                .parent()
                .is_some_and(|p| p.kind() == "export_statement");
            if exported {
                if let Some(name) = field_text(node, "name", src) {
                    info.exports.push(name.to_string());
                }
            }
        }
        "jsx_element" => {
            if let Some(name) = node
                .child_by_field_name("open_tag")
                .and_then(|tag| tag.child_by_field_name("name"))
            {
                push_tag(name, src, info);
            }
        }
        "jsx_self_closing_element" => {
            if let Some(name) = node.child_by_field_name("name") {
                push_tag(name, src, info);
            }
        }
        "jsx_text" | "html_character_reference" => {
            if let Some(raw) = text_run(node, src) {
                let text = raw.trim();
                if text.chars().count() > MIN_JSX_TEXT_CHARS {
                    info.text_content.push(text.to_string());
                }
            }
        }
        "string" => {
            if let Some(value) = string_value(node, src) {
                let text = value.trim();
                if text.chars().count() > MIN_STRING_LITERAL_CHARS && is_meaningful_text(text) {
                    info.text_content.push(text.to_string());
                }
            }
        }
        _ => {}
    }
}

fn is_text_piece(node: Node<'_>) -> bool {
    matches!(node.kind(), "jsx_text" | "html_character_reference")
}

/// Raw source of a run of adjacent text and character references, taken
/// from the run's first node. Entities stay undecoded.
fn text_run<'a>(node: Node<'_>, src: &'a [u8]) -> Option<&'a str> {
    if node.prev_sibling().is_some_and(is_text_piece) {
        return None;
    }
    let mut last = node;
    while let Some(next) = last.next_sibling().filter(|n| is_text_piece(*n)) {
        last = next;
    }
    std::str::from_utf8(src.get(node.start_byte()..last.end_byte())?).ok()
}

fn visit_export(node: Node<'_>, src: &[u8], info: &mut ComponentInfo) {
    let mut cursor = node.walk();
    let is_default = node
        .children(&mut cursor)
        .any(|child| child.kind() == "default");

    if !is_default {
        info.has_named_exports = true;
        return;
    }

    info.has_default_export = true;
    if let Some(value) = node.child_by_field_name("value") {
        match value.kind() {
            "identifier" => {
                if let Ok(name) = value.utf8_text(src) {
                    info.exports.push(name.to_string());
                }
            }
            "function_expression" | "function" | "generator_function" => {
                if let Some(name) = field_text(value, "name", src) {
                    info.exports.push(name.to_string());
                }
            }
            _ => {}
        }
    }
}

/// Plain and dotted tag names only; fragments have no name node and
/// namespaced names are skipped.
fn push_tag(name: Node<'_>, src: &[u8], info: &mut ComponentInfo) {
    if !matches!(name.kind(), "identifier" | "member_expression") {
        return;
    }
    let Ok(raw) = name.utf8_text(src) else {
        return;
    };
    let tag: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if !info.jsx_elements.contains(&tag) {
        info.jsx_elements.push(tag);
    }
}

fn field_text<'a>(node: Node<'_>, field: &str, src: &'a [u8]) -> Option<&'a str> {
    node.child_by_field_name(field)
        .and_then(|n| n.utf8_text(src).ok())
}

/// Cooked value of a `string` node, without its quotes.
fn string_value(node: Node<'_>, src: &[u8]) -> Option<String> {
    let mut out = String::new();
    let mut cursor = node.walk();
    for part in node.named_children(&mut cursor) {
        let text = part.utf8_text(src).ok()?;
        if part.kind() == "escape_sequence" {
            out.push_str(&unescape(text));
        } else {
            out.push_str(text);
        }
    }
    Some(out)
}

fn unescape(seq: &str) -> String {
    let body = seq.strip_prefix('\\').unwrap_or(seq);
    let mut chars = body.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };
    let rest = chars.as_str();
    let simple = match first {
        'n' => Some('\n'),
        't' => Some('\t'),
        'r' => Some('\r'),
        'b' => Some('\u{8}'),
        'f' => Some('\u{c}'),
        'v' => Some('\u{b}'),
        '0' if rest.is_empty() => Some('\0'),
        '\n' | '\r' | '\u{2028}' | '\u{2029}' => return String::new(),
        'x' | 'u' => None,
        other => Some(other),
    };
    if let Some(c) = simple {
        return c.to_string();
    }
    let hex = rest.trim_start_matches('{').trim_end_matches('}');
    u32::from_str_radix(hex, 16)
        .ok()
        .and_then(char::from_u32)
        .map(|c| c.to_string())
        .unwrap_or_else(|| seq.to_string())
}

fn first_error(root: Node<'_>) -> Option<Node<'_>> {
    let mut cursor = root.walk();
    loop {
        let node = cursor.node();
        if node.is_error() || node.is_missing() {
            return Some(node);
        }
        if node.has_error() && cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return None;
            }
        }
    }
}

/// Build the stored record for one analyzed file.
pub fn to_asset(file: &CandidateFile, info: ComponentInfo, stats: FileStats) -> ContentAsset {
    let component_name = Path::new(&file.relative)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.relative.clone());

    let content = info.content();
    let external_imports = info
        .imports
        .into_iter()
        .filter(|specifier| !specifier.starts_with('.'))
        .collect();

    ContentAsset {
        id: component_id(&file.relative),
        title: format!("React Component: {}", component_name),
        content,
        content_type: ContentType::Asset,
        source: SOURCE.to_string(),
        metadata: AssetMetadata::Component(ComponentMetadata {
            file_path: file.relative.clone(),
            component_name,
            jsx_elements: info.jsx_elements,
            exports: info.exports,
            imports: external_imports,
            line_count: stats.line_count,
            file_size: stats.file_size,
            last_modified: stats.last_modified,
            has_default_export: info.has_default_export,
            has_named_exports: info.has_named_exports,
            extracted_at: iso_now(),
            platform: COMPONENT_PLATFORM.to_string(),
        }),
    }
}

/// Resolve a relative import against the importing file's directory.
/// Returns `None` for external specifiers and paths escaping the root.
fn resolve_relative(importer: &str, specifier: &str) -> Option<String> {
    if !(specifier.starts_with("./") || specifier.starts_with("../")) {
        return None;
    }
    let mut parts: Vec<&str> = importer.split('/').collect();
    parts.pop();
    for segment in specifier.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    Some(parts.join("/"))
}

fn import_candidates(base: &str) -> Vec<String> {
    let mut candidates = Vec::new();
    let has_known_ext = Path::new(base)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMPORT_EXTENSIONS.contains(&e));
    if has_known_ext {
        candidates.push(base.to_string());
    }
    for ext in IMPORT_EXTENSIONS {
        candidates.push(format!("{}.{}", base, ext));
    }
    for ext in IMPORT_EXTENSIONS {
        candidates.push(format!("{}/index.{}", base, ext));
    }
    candidates
}

/// Extracts [`ContentAsset`]s from a tree of component files.
pub struct ComponentExtractor {
    config: ComponentExtractorConfig,
}

impl ComponentExtractor {
    pub fn new(config: ComponentExtractorConfig) -> Self {
        Self { config }
    }

    /// Ids of the component files that `imports` resolve to under the root.
    async fn resolve_links(&self, file: &CandidateFile, imports: &[String]) -> Vec<String> {
        let mut links = Vec::new();
        for specifier in imports {
            let Some(base) = resolve_relative(&file.relative, specifier) else {
                continue;
            };
            for candidate in import_candidates(&base) {
                let is_file = tokio::fs::metadata(self.config.root.join(&candidate))
                    .await
                    .map(|m| m.is_file())
                    .unwrap_or(false);
                if is_file {
                    let id = component_id(&candidate);
                    if id != component_id(&file.relative) && !links.contains(&id) {
                        links.push(id);
                    }
                    break;
                }
            }
        }
        links
    }
}

#[async_trait]
impl SourceExtractor for ComponentExtractor {
    fn platform(&self) -> &str {
        COMPONENT_PLATFORM
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

        let info = analyze(&file.path, &text)?;
        if !info.has_extractable_content() {
            debug!(file = %file.relative, "no extractable content");
            return Ok(None);
        }

        let links = self.resolve_links(file, &info.imports).await;
        let stats = FileStats {
            line_count: text.split('\n').count(),
            file_size: stat.len(),
            last_modified: stat
                .modified()
                .ok()
                .map(|t| iso(DateTime::<Utc>::from(t)))
                .unwrap_or_else(iso_now),
        };

        Ok(Some(Extraction {
            asset: to_asset(file, info, stats),
            links,
        }))
    }
}
