//! Public configuration types consumed by the rest of the crate.

use std::path::PathBuf;

/// Gemini provider configuration, populated from `[llm.gemini]`.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// API root, e.g. `https://generativelanguage.googleapis.com/v1beta`.
    pub api_base_url: String,
    /// Per-request HTTP timeout in seconds.
    pub timeout_seconds: u64,
}

/// OpenAI / OpenAI-compatible provider configuration, populated from `[llm.openai]`.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Full chat completions endpoint URL.
    pub api_base_url: String,
    /// Sampling temperature (ignored for models that forbid it).
    pub temperature: f32,
    /// Per-request HTTP timeout in seconds.
    pub timeout_seconds: u64,
}

/// LLM provider selection.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Which provider is active (`"gemini"`, `"openai"`, `"dummy"`).
    /// Maps to `default` in `[llm]`.
    pub provider: String,
    pub gemini: GeminiConfig,
    pub openai: OpenAiConfig,
}

/// Conversation-level settings.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Persona name interpolated into the system instruction and greeting.
    pub assistant_name: String,
    /// Model used when the settings store has no `modelName` yet.
    pub default_model: String,
    /// Persist a greeting when the message log is empty at startup.
    pub greeting: bool,
    /// Directory holding the prompt templates.
    pub prompts_dir: PathBuf,
}

/// Memory pipeline settings.
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// Model used by the extraction and retrieval agents.
    pub agent_model: String,
    /// Maximum number of memories injected into a single turn.
    pub retrieval_limit: usize,
    /// Run extraction + storage after each successful turn.
    pub extraction_enabled: bool,
}

/// Which persistent store backend to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// One JSON file per collection.
    Json,
    /// In-process only; lost on exit.
    Tmp,
    /// SQLite database (requires the `isqlite` feature).
    Sqlite,
}

impl StoreBackend {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "json" => Some(Self::Json),
            "tmp" => Some(Self::Tmp),
            "sqlite" => Some(Self::Sqlite),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Tmp => "tmp",
            Self::Sqlite => "sqlite",
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Store directory (already resolved against `work_dir`).
    pub dir: PathBuf,
}

/// Fully-resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub app_name: String,
    /// Working directory for all persistent data (already expanded, no `~`).
    pub work_dir: PathBuf,
    pub log_level: String,
    /// Optional log file; stderr when `None`.
    pub log_file: Option<PathBuf>,
    pub chat: ChatConfig,
    pub llm: LlmConfig,
    pub memory: MemoryConfig,
    pub store: StoreConfig,
    /// Credentials from `SMRITI_API_KEYS`. Never sourced from TOML.
    /// Only used to seed an empty credential list in the settings store.
    pub api_keys: Vec<String>,
}
