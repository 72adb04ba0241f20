//! Configuration loading.
//!
//! Settings come from an optional TOML file, then environment variables
//! override individual keys. Every section and key has a default, so an
//! empty environment and no file yields a usable configuration.
//!
//! | Variable | Effect |
//! |----------|--------|
//! | `KNOWLEDGE_BASES_ROOT_DIR` | root directory holding one subdirectory per knowledge base |
//! | `FAISS_INDEX_PATH` | directory for the persisted index and `model_name.txt` |
//! | `PENDING_URLS_PATH` | JSON file holding suggested URLs |
//! | `EMBEDDING_PROVIDER` | `huggingface` (default), `ollama`, or `openai` |
//! | `HUGGINGFACE_API_KEY` / `HUGGINGFACE_MODEL_NAME` / `HUGGINGFACE_ENDPOINT` | Hugging Face settings |
//! | `OLLAMA_BASE_URL` / `OLLAMA_MODEL` | Ollama settings |
//! | `OPENAI_API_KEY` / `OPENAI_MODEL_NAME` / `OPENAI_BASE_URL` | OpenAI settings |
//!
//! Provider-specific variables are only read for the selected provider.

use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{KbError, Result};

pub const DEFAULT_HUGGINGFACE_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";
pub const DEFAULT_HUGGINGFACE_ENDPOINT: &str = "https://router.huggingface.co/hf-inference/models";
pub const DEFAULT_OLLAMA_MODEL: &str = "dengcao/Qwen3-Embedding-0.6B:Q8_0";
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_OPENAI_MODEL: &str = "text-embedding-ada-002";
pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PathsConfig {
    #[serde(default = "default_root")]
    pub knowledge_bases_root: PathBuf,
    /// Defaults to `<root>/.faiss`.
    #[serde(default)]
    pub index_path: Option<PathBuf>,
    /// Defaults to `<root>/.pending_urls.json`.
    #[serde(default)]
    pub pending_urls_path: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            knowledge_bases_root: default_root(),
            index_path: None,
            pending_urls_path: None,
        }
    }
}

impl PathsConfig {
    pub fn index_dir(&self) -> PathBuf {
        self.index_path
            .clone()
            .unwrap_or_else(|| self.knowledge_bases_root.join(".faiss"))
    }

    pub fn pending_urls_file(&self) -> PathBuf {
        self.pending_urls_path
            .clone()
            .unwrap_or_else(|| self.knowledge_bases_root.join(".pending_urls.json"))
    }
}

fn default_root() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("knowledge_bases")
}

/// The closed set of embedding providers.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    HuggingFace,
    Ollama,
    OpenAI,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::HuggingFace => "huggingface",
            ProviderKind::Ollama => "ollama",
            ProviderKind::OpenAI => "openai",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = KbError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "huggingface" => Ok(ProviderKind::HuggingFace),
            "ollama" => Ok(ProviderKind::Ollama),
            "openai" => Ok(ProviderKind::OpenAI),
            other => Err(KbError::Config(format!(
                "Unknown embedding provider: '{}'. Must be huggingface, ollama, or openai.",
                other
            ))),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub provider: ProviderKind,
    #[serde(default)]
    pub model: Option<String>,
    /// Endpoint override (Ollama base URL, OpenAI base URL, or Hugging Face
    /// models endpoint).
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            model: None,
            base_url: None,
            api_key: None,
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_max_retries() -> u32 {
    3
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    /// Configured model, or the provider's default model.
    pub fn model_name(&self) -> String {
        self.model.clone().unwrap_or_else(|| {
            match self.provider {
                ProviderKind::HuggingFace => DEFAULT_HUGGINGFACE_MODEL,
                ProviderKind::Ollama => DEFAULT_OLLAMA_MODEL,
                ProviderKind::OpenAI => DEFAULT_OPENAI_MODEL,
            }
            .to_string()
        })
    }

    /// Configured endpoint, or the provider's default, without a trailing slash.
    pub fn endpoint(&self) -> String {
        let url = self.base_url.clone().unwrap_or_else(|| {
            match self.provider {
                ProviderKind::HuggingFace => DEFAULT_HUGGINGFACE_ENDPOINT,
                ProviderKind::Ollama => DEFAULT_OLLAMA_URL,
                ProviderKind::OpenAI => DEFAULT_OPENAI_URL,
            }
            .to_string()
        });
        url.trim_end_matches('/').to_string()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_max_filename_len")]
    pub max_filename_len: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: default_fetch_timeout(),
            max_filename_len: default_max_filename_len(),
        }
    }
}

fn default_fetch_timeout() -> u64 {
    30
}
fn default_max_filename_len() -> usize {
    100
}

impl Config {
    /// Apply environment overrides read through `lookup`.
    ///
    /// Empty values are treated as unset.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(root) = get("KNOWLEDGE_BASES_ROOT_DIR") {
            self.paths.knowledge_bases_root = PathBuf::from(root);
        }
        if let Some(index) = get("FAISS_INDEX_PATH") {
            self.paths.index_path = Some(PathBuf::from(index));
        }
        if let Some(pending) = get("PENDING_URLS_PATH") {
            self.paths.pending_urls_path = Some(PathBuf::from(pending));
        }
        if let Some(provider) = get("EMBEDDING_PROVIDER") {
            self.embedding.provider = provider.parse()?;
        }

        let (key_var, model_var, url_var) = match self.embedding.provider {
            ProviderKind::HuggingFace => (
                Some("HUGGINGFACE_API_KEY"),
                "HUGGINGFACE_MODEL_NAME",
                "HUGGINGFACE_ENDPOINT",
            ),
            ProviderKind::Ollama => (None, "OLLAMA_MODEL", "OLLAMA_BASE_URL"),
            ProviderKind::OpenAI => (Some("OPENAI_API_KEY"), "OPENAI_MODEL_NAME", "OPENAI_BASE_URL"),
        };
        if let Some(key) = key_var.and_then(&get) {
            self.embedding.api_key = Some(key);
        }
        if let Some(model) = get(model_var) {
            self.embedding.model = Some(model);
        }
        if let Some(url) = get(url_var) {
            self.embedding.base_url = Some(url);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.embedding.timeout_secs == 0 {
            return Err(KbError::Config("embedding.timeout_secs must be > 0".into()));
        }
        if self.ingest.fetch_timeout_secs == 0 {
            return Err(KbError::Config("ingest.fetch_timeout_secs must be > 0".into()));
        }
        if self.ingest.max_filename_len < 8 {
            return Err(KbError::Config("ingest.max_filename_len must be >= 8".into()));
        }
        Ok(())
    }
}

/// Load configuration from an optional TOML file plus the process environment.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .map_err(|e| KbError::io("read config file", path, e))?;
            toml::from_str(&content).map_err(|e| {
                KbError::Config(format!("Failed to parse {}: {}", path.display(), e))
            })?
        }
        None => Config::default(),
    };

    config.apply_env(|key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}
