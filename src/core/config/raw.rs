//! Raw TOML deserialization types.
//!
//! These structs mirror the TOML file shape and use `serde` defaults.
//! The `load` module converts them into the public `types` structs.

use serde::Deserialize;

// ── Top-level ────────────────────────────────────────────────────────────────

/// Raw TOML shape: serde target before resolution.
#[derive(Deserialize)]
pub(super) struct RawConfig {
    pub app: RawApp,
    #[serde(default)]
    pub chat: RawChat,
    #[serde(default)]
    pub llm: RawLlm,
    #[serde(default)]
    pub memory: RawMemory,
    #[serde(default)]
    pub store: RawStore,
}

impl RawConfig {
    /// Used when no config file exists at all.
    pub fn builtin() -> Self {
        Self {
            app: RawApp {
                name: "smriti".to_string(),
                work_dir: "~/.smriti".to_string(),
                log_level: "info".to_string(),
                log_file: None,
            },
            chat: RawChat::default(),
            llm: RawLlm::default(),
            memory: RawMemory::default(),
            store: RawStore::default(),
        }
    }
}

#[derive(Deserialize)]
pub(super) struct RawApp {
    pub name: String,
    pub work_dir: String,
    pub log_level: String,
    #[serde(default)]
    pub log_file: Option<String>,
}

// ── Chat ─────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct RawChat {
    #[serde(default = "default_assistant_name")]
    pub assistant_name: String,
    #[serde(default = "default_model")]
    pub default_model: String,
    #[serde(default = "default_true")]
    pub greeting: bool,
    #[serde(default = "default_prompts_dir")]
    pub prompts_dir: String,
}

impl Default for RawChat {
    fn default() -> Self {
        Self {
            assistant_name: default_assistant_name(),
            default_model: default_model(),
            greeting: true,
            prompts_dir: default_prompts_dir(),
        }
    }
}

// ── LLM ──────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct RawLlm {
    /// Maps to `default = "..."` in `[llm]`.
    #[serde(rename = "default", default = "default_llm_provider")]
    pub provider: String,
    #[serde(default)]
    pub gemini: RawGemini,
    #[serde(default)]
    pub openai: RawOpenAi,
}

impl Default for RawLlm {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            gemini: RawGemini::default(),
            openai: RawOpenAi::default(),
        }
    }
}

#[derive(Deserialize)]
pub(super) struct RawGemini {
    #[serde(default = "default_gemini_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for RawGemini {
    fn default() -> Self {
        Self {
            api_base_url: default_gemini_api_base_url(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

#[derive(Deserialize)]
pub(super) struct RawOpenAi {
    #[serde(default = "default_openai_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_openai_temperature")]
    pub temperature: f32,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for RawOpenAi {
    fn default() -> Self {
        Self {
            api_base_url: default_openai_api_base_url(),
            temperature: default_openai_temperature(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

// ── Memory ───────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct RawMemory {
    #[serde(default = "default_model")]
    pub agent_model: String,
    #[serde(default = "default_retrieval_limit")]
    pub retrieval_limit: usize,
    #[serde(default = "default_true")]
    pub extraction_enabled: bool,
}

impl Default for RawMemory {
    fn default() -> Self {
        Self {
            agent_model: default_model(),
            retrieval_limit: default_retrieval_limit(),
            extraction_enabled: true,
        }
    }
}

// ── Store ────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct RawStore {
    #[serde(default = "default_store_backend")]
    pub backend: String,
    /// Absolute, or relative to `app.work_dir`.
    #[serde(default)]
    pub dir: Option<String>,
}

impl Default for RawStore {
    fn default() -> Self {
        Self { backend: default_store_backend(), dir: None }
    }
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_true() -> bool {
    true
}

pub(super) fn default_assistant_name() -> String {
    "Gemini".to_string()
}

pub(super) fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}

pub(super) fn default_prompts_dir() -> String {
    "config/prompts".to_string()
}

pub(super) fn default_llm_provider() -> String {
    "dummy".to_string()
}

pub(super) fn default_gemini_api_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

pub(super) fn default_openai_api_base_url() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

pub(super) fn default_openai_temperature() -> f32 {
    0.2
}

pub(super) fn default_timeout_seconds() -> u64 {
    60
}

pub(super) fn default_retrieval_limit() -> usize {
    5
}

pub(super) fn default_store_backend() -> String {
    "json".to_string()
}
