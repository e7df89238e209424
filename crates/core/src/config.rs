//! Configuration management for Tabula.
//!
//! Configuration is merged from, lowest to highest precedence:
//! - Built-in defaults
//! - The workspace config file (`.tabula/config.yaml`)
//! - Environment variables
//! - Command-line flags
//!
//! The binary builds one [`AppConfig`] at startup and passes it by reference
//! to every component that needs it. There is no global configuration state.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{AppError, AppResult};

/// Completion providers that Tabula knows how to talk to.
pub const KNOWN_PROVIDERS: [&str; 3] = ["groq", "openai", "ollama"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .tabula/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Completion provider ("groq", "openai", "ollama")
    pub provider: String,

    /// Completion model identifier
    pub model: String,

    /// Explicit API key for the completion provider
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Environment variable holding the provider API key
    pub api_key_env: Option<String>,

    /// Custom completion endpoint (base URL)
    pub endpoint: Option<String>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Retrieval and generation tuning
    pub rag: RagSettings,

    /// Embedding model used by the local vector index
    pub embedding: EmbeddingSettings,

    /// QA log location override
    pub qa_log: Option<PathBuf>,
}

/// Retrieval pipeline settings.
///
/// `temperature`, `max_tokens` and `top_p` are passed through to the
/// completion provider untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RagSettings {
    /// Maximum characters per chunk
    pub chunk_size: usize,

    /// Maximum chunks per index upsert call
    pub batch_size: usize,

    /// Base number of chunks retrieved per query
    pub n_chunks: usize,

    /// Minimum similarity a chunk needs to be used as context
    pub confidence_threshold: f32,

    pub temperature: f32,

    pub max_tokens: u32,

    pub top_p: f32,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            batch_size: 100,
            n_chunks: 2,
            confidence_threshold: 0.6,
            temperature: 0.7,
            max_tokens: 1024,
            top_p: 1.0,
        }
    }
}

/// Embedding provider settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmbeddingSettings {
    /// "hashing" (offline) or "ollama"
    pub provider: String,

    /// Model identifier (provider-specific)
    pub model: String,

    /// Vector dimensions; must match what the model returns
    pub dimensions: usize,

    /// Endpoint for remote providers
    pub endpoint: Option<String>,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "hashing".to_string(),
            model: "hashing-v1".to_string(),
            dimensions: 384,
            endpoint: None,
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    llm: Option<LlmSection>,
    rag: Option<RagSettings>,
    embedding: Option<EmbeddingSettings>,
    logging: Option<LoggingSection>,
    paths: Option<PathsSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LlmSection {
    provider: Option<String>,
    model: Option<String>,
    endpoint: Option<String>,
    #[serde(rename = "apiKeyEnv")]
    api_key_env: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingSection {
    level: Option<String>,
    color: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PathsSection {
    #[serde(rename = "qaLog")]
    qa_log: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            provider: "groq".to_string(),
            model: "llama-3.1-8b-instant".to_string(),
            api_key: None,
            api_key_env: None,
            endpoint: None,
            log_level: None,
            verbose: false,
            no_color: false,
            rag: RagSettings::default(),
            embedding: EmbeddingSettings::default(),
            qa_log: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from the config file and the process environment.
    ///
    /// Environment variables:
    /// - `TABULA_WORKSPACE`, `TABULA_CONFIG`: workspace and config file
    /// - `TABULA_PROVIDER`, `TABULA_MODEL`, `MODEL`, `TABULA_API_KEY`, `TABULA_ENDPOINT`
    /// - `CHUNK_SIZE`, `BATCH_SIZE`, `N_CHUNKS`, `CONFIDENCE_THRESHOLD`,
    ///   `TEMPERATURE`, `MAX_TOKENS`, `TOP_P`
    /// - `TABULA_EMBED_PROVIDER`, `EMBED_MODEL`, `EMBED_DIMENSIONS`
    /// - `TABULA_QA_LOG`, `RUST_LOG`, `NO_COLOR`
    pub fn load() -> AppResult<Self> {
        Self::load_from(None, None)
    }

    /// Like [`AppConfig::load`], with the workspace and config file given
    /// explicitly (CLI flags) taking precedence over the environment.
    pub fn load_from(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        if let Some(workspace) = workspace
            .or_else(|| std::env::var("TABULA_WORKSPACE").ok().map(PathBuf::from))
        {
            config.workspace = workspace;
        }

        if let Some(config_file) =
            config_file.or_else(|| std::env::var("TABULA_CONFIG").ok().map(PathBuf::from))
        {
            config.config_file = Some(config_file);
        }

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = config
            .config_file
            .clone()
            .unwrap_or_else(|| config.tabula_dir().join("config.yaml"));

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        config.apply_env(|name| std::env::var(name).ok())?;

        Ok(config)
    }

    /// Merge a YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        self.merge_yaml_str(&contents)
            .map_err(|e| AppError::Config(format!("Failed to parse config file {:?}: {}", path, e)))
    }

    fn merge_yaml_str(&self, contents: &str) -> AppResult<Self> {
        let config_file: ConfigFile = serde_yaml::from_str(contents)?;
        let mut result = self.clone();

        if let Some(llm) = config_file.llm {
            if let Some(provider) = llm.provider {
                result.provider = provider;
            }
            if let Some(model) = llm.model {
                result.model = model;
            }
            result.endpoint = llm.endpoint.or(result.endpoint);
            result.api_key_env = llm.api_key_env.or(result.api_key_env);
        }

        if let Some(rag) = config_file.rag {
            result.rag = rag;
        }

        if let Some(embedding) = config_file.embedding {
            result.embedding = embedding;
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        if let Some(qa_log) = config_file.paths.and_then(|p| p.qa_log) {
            result.qa_log = Some(PathBuf::from(qa_log));
        }

        Ok(result)
    }

    /// Apply environment overrides using the given variable lookup.
    pub fn apply_env<F>(&mut self, lookup: F) -> AppResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(provider) = lookup("TABULA_PROVIDER") {
            self.provider = provider;
        }

        if let Some(model) = lookup("TABULA_MODEL").or_else(|| lookup("MODEL")) {
            self.model = model;
        }

        if let Some(key) = lookup("TABULA_API_KEY") {
            self.api_key = Some(key);
        }

        if let Some(endpoint) = lookup("TABULA_ENDPOINT") {
            self.endpoint = Some(endpoint);
        }

        let rag = &mut self.rag;
        override_parsed(&lookup, "CHUNK_SIZE", &mut rag.chunk_size)?;
        override_parsed(&lookup, "BATCH_SIZE", &mut rag.batch_size)?;
        override_parsed(&lookup, "N_CHUNKS", &mut rag.n_chunks)?;
        override_parsed(&lookup, "CONFIDENCE_THRESHOLD", &mut rag.confidence_threshold)?;
        override_parsed(&lookup, "TEMPERATURE", &mut rag.temperature)?;
        override_parsed(&lookup, "MAX_TOKENS", &mut rag.max_tokens)?;
        override_parsed(&lookup, "TOP_P", &mut rag.top_p)?;

        if let Some(provider) = lookup("TABULA_EMBED_PROVIDER") {
            self.embedding.provider = provider;
        }

        if let Some(model) = lookup("EMBED_MODEL") {
            self.embedding.model = model;
        }
        override_parsed(&lookup, "EMBED_DIMENSIONS", &mut self.embedding.dimensions)?;

        if let Some(path) = lookup("TABULA_QA_LOG") {
            self.qa_log = Some(PathBuf::from(path));
        }

        if let Some(level) = lookup("RUST_LOG") {
            self.log_level = Some(level);
        }

        if lookup("NO_COLOR").is_some() {
            self.no_color = true;
        }

        Ok(())
    }

    /// Apply CLI overrides to the configuration.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        provider: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(provider) = provider {
            self.provider = provider;
        }

        if let Some(model) = model {
            self.model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .tabula directory.
    pub fn tabula_dir(&self) -> PathBuf {
        self.workspace.join(".tabula")
    }

    /// Ensure the .tabula directory exists.
    pub fn ensure_tabula_dir(&self) -> AppResult<()> {
        let dir = self.tabula_dir();
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| {
                AppError::Config(format!("Failed to create .tabula directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// SQLite vector index location.
    pub fn index_path(&self) -> PathBuf {
        self.tabula_dir().join("index.sqlite")
    }

    /// Durable QA log location.
    pub fn qa_log_path(&self) -> PathBuf {
        self.qa_log
            .clone()
            .unwrap_or_else(|| self.tabula_dir().join("qa_log.json"))
    }

    /// Ingestion manifest location.
    pub fn manifest_path(&self) -> PathBuf {
        self.tabula_dir().join("ingest_manifest.json")
    }

    /// Directory holding prompt overrides.
    pub fn prompts_dir(&self) -> PathBuf {
        self.tabula_dir().join("prompts")
    }

    /// Resolve the API key for the active provider.
    ///
    /// An explicit `TABULA_API_KEY` wins, then the configured `apiKeyEnv`,
    /// then the provider's conventional variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(ref key) = self.api_key {
            return Some(key.clone());
        }

        let env_var = self
            .api_key_env
            .clone()
            .or_else(|| default_api_key_env(&self.provider).map(str::to_string))?;

        std::env::var(env_var).ok()
    }

    /// Validate configuration for the active provider.
    pub fn validate(&self) -> AppResult<()> {
        let provider = self.provider.to_lowercase();
        if !KNOWN_PROVIDERS.contains(&provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                self.provider,
                KNOWN_PROVIDERS.join(", ")
            )));
        }

        if default_api_key_env(&provider).is_some() && self.resolve_api_key().is_none() {
            let env_var = self
                .api_key_env
                .clone()
                .or_else(|| default_api_key_env(&provider).map(str::to_string))
                .unwrap_or_default();
            return Err(AppError::Config(format!(
                "API key not found in environment variable: {}",
                env_var
            )));
        }

        self.rag.validate()
    }
}

impl RagSettings {
    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> AppResult<()> {
        if self.chunk_size == 0 {
            return Err(AppError::Config("CHUNK_SIZE must be positive".to_string()));
        }
        if self.batch_size == 0 {
            return Err(AppError::Config("BATCH_SIZE must be positive".to_string()));
        }
        if self.n_chunks == 0 {
            return Err(AppError::Config("N_CHUNKS must be positive".to_string()));
        }
        if !(-1.0..=1.0).contains(&self.confidence_threshold) {
            return Err(AppError::Config(format!(
                "CONFIDENCE_THRESHOLD must be within [-1, 1], got {}",
                self.confidence_threshold
            )));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(AppError::Config(format!(
                "TEMPERATURE must be within [0, 2], got {}",
                self.temperature
            )));
        }
        if self.top_p <= 0.0 || self.top_p > 1.0 {
            return Err(AppError::Config(format!(
                "TOP_P must be within (0, 1], got {}",
                self.top_p
            )));
        }
        Ok(())
    }
}

/// Conventional API key variable for keyed providers.
pub fn default_api_key_env(provider: &str) -> Option<&'static str> {
    match provider.to_lowercase().as_str() {
        "groq" => Some("GROQ_API_KEY"),
        "openai" => Some("OPENAI_API_KEY"),
        _ => None,
    }
}

fn override_parsed<F, T>(lookup: &F, name: &str, target: &mut T) -> AppResult<()>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(raw) = lookup(name) {
        *target = raw.trim().parse().map_err(|e| {
            AppError::Config(format!("Invalid value for {}: {:?} ({})", name, raw, e))
        })?;
    }
    Ok(())
}
