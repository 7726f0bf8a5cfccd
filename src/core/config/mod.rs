//! Configuration: TOML file(s), then env overrides, then resolved paths.
//!
//! - **types**: resolved structs handed to the rest of the crate.
//! - **raw**: serde mirror of the file shape, with defaults. Private.
//! - **load**: base-chain reading, overrides and path resolution.
//!
//! API keys come only from `SMRITI_API_KEYS`, never from a file.

mod load;
mod raw;
mod types;

pub use load::{API_KEYS_ENV, expand_home, load, load_from, parse_api_keys};
pub use types::*;

impl Config {
    /// Offline settings for tests: dummy provider, tmp store, greeting off and
    /// no API keys. Prompts resolve under `work_dir/prompts`.
    pub fn test_default(work_dir: &std::path::Path) -> Self {
        Self {
            app_name: "test".into(),
            work_dir: work_dir.to_path_buf(),
            log_level: "info".into(),
            log_file: None,
            chat: ChatConfig {
                assistant_name: raw::default_assistant_name(),
                default_model: raw::default_model(),
                greeting: false,
                prompts_dir: work_dir.join("prompts"),
            },
            llm: LlmConfig {
                provider: "dummy".into(),
                gemini: GeminiConfig {
                    api_base_url: "http://localhost:0/v1beta".into(),
                    timeout_seconds: 1,
                },
                openai: OpenAiConfig {
                    api_base_url: "http://localhost:0/v1/chat/completions".into(),
                    temperature: 0.0,
                    timeout_seconds: 1,
                },
            },
            memory: MemoryConfig {
                agent_model: raw::default_model(),
                retrieval_limit: raw::default_retrieval_limit(),
                extraction_enabled: true,
            },
            store: StoreConfig {
                backend: StoreBackend::Tmp,
                dir: work_dir.join("store"),
            },
            api_keys: Vec::new(),
        }
    }
}
