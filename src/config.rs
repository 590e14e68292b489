//! TOML configuration parsing.
//!
//! ```toml
//! [store]
//! path = "./data/knowledge.sqlite"
//!
//! [server]
//! bind = "127.0.0.1:7340"
//!
//! [extractors.components]
//! root = "./src"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub store: StoreConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub extractors: ExtractorsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub path: PathBuf,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    5
}
fn default_acquire_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7340".to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ExtractorsConfig {
    pub components: Option<ComponentExtractorConfig>,
    pub documents: Option<DocumentExtractorConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ComponentExtractorConfig {
    pub root: PathBuf,
    #[serde(default = "default_component_includes")]
    pub include_patterns: Vec<String>,
    #[serde(default = "default_component_excludes")]
    pub exclude_patterns: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

impl ComponentExtractorConfig {
    /// Config rooted at `root` with the default patterns.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            include_patterns: default_component_includes(),
            exclude_patterns: default_component_excludes(),
            follow_symlinks: false,
        }
    }
}

fn default_component_includes() -> Vec<String> {
    vec!["**/*.{tsx,jsx}".to_string()]
}

fn default_component_excludes() -> Vec<String> {
    vec![
        "**/node_modules/**".to_string(),
        "**/build/**".to_string(),
        "**/dist/**".to_string(),
        "**/.next/**".to_string(),
        "**/out/**".to_string(),
    ]
}

#[derive(Debug, Deserialize, Clone)]
pub struct DocumentExtractorConfig {
    pub root: PathBuf,
    #[serde(default = "default_document_includes")]
    pub include_patterns: Vec<String>,
    #[serde(default = "default_component_excludes")]
    pub exclude_patterns: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

impl DocumentExtractorConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            include_patterns: default_document_includes(),
            exclude_patterns: default_component_excludes(),
            follow_symlinks: false,
        }
    }
}

fn default_document_includes() -> Vec<String> {
    vec!["**/*.md".to_string(), "**/*.txt".to_string()]
}

impl Config {
    /// Config with only a store path; used by tests and embedding callers.
    pub fn with_store_path(path: impl Into<PathBuf>) -> Self {
        Self {
            store: StoreConfig {
                path: path.into(),
                max_connections: default_max_connections(),
                acquire_timeout_secs: default_acquire_timeout_secs(),
            },
            server: ServerConfig::default(),
            extractors: ExtractorsConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.store.max_connections == 0 {
        anyhow::bail!("store.max_connections must be >= 1");
    }
    if config.store.acquire_timeout_secs == 0 {
        anyhow::bail!("store.acquire_timeout_secs must be >= 1");
    }
    if let Some(ref c) = config.extractors.components {
        if c.include_patterns.is_empty() {
            anyhow::bail!("extractors.components.include_patterns must not be empty");
        }
    }
    if let Some(ref d) = config.extractors.documents {
        if d.include_patterns.is_empty() {
            anyhow::bail!("extractors.documents.include_patterns must not be empty");
        }
    }
    Ok(())
}
