//! LLM provider implementations.
//!
//! `build(config)` is the factory, called at startup.
//! Adding a new backend = new module + new match arm.
//!
//! Credentials are not part of a provider: the rotator hands one to every
//! `generate` call, so a single provider value serves the whole key list.

pub mod dummy;
pub mod gemini;
pub mod openai_compatible;

use serde::Deserialize;
use tracing::error;

use crate::config::LlmConfig;
use crate::llm::{LlmProvider, ProviderError};

/// Construct a `LlmProvider` from config.
pub fn build(config: &LlmConfig) -> Result<LlmProvider, ProviderError> {
    match config.provider.as_str() {
        "dummy" => Ok(LlmProvider::Dummy(dummy::DummyProvider)),
        "gemini" => {
            let g = &config.gemini;
            let p = gemini::GeminiProvider::new(g.api_base_url.clone(), g.timeout_seconds)?;
            Ok(LlmProvider::Gemini(p))
        }
        "openai" | "openai-compatible" => {
            let oai = &config.openai;
            let p = openai_compatible::OpenAiCompatibleProvider::new(
                oai.api_base_url.clone(),
                oai.temperature,
                oai.timeout_seconds,
            )?;
            Ok(LlmProvider::OpenAiCompatible(p))
        }
        _ => Err(ProviderError::UnknownProvider(config.provider.clone())),
    }
}

fn http_client(timeout_seconds: u64) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_seconds))
        .build()
        .map_err(|e| ProviderError::Request(format!("failed to build HTTP client: {e}")))
}

// Error envelope shared by the Gemini and OpenAI-style APIs.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    code: Option<serde_json::Value>,
    #[serde(default)]
    status: Option<String>,
}

/// Render an error body, preferring the structured envelope when present.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(env) => {
            let tag = env
                .error
                .status
                .or_else(|| {
                    env.error.code.map(|v| match v {
                        serde_json::Value::String(s) => s,
                        other => other.to_string(),
                    })
                })
                .map(|t| format!("[{t}] "))
                .unwrap_or_default();
            format!("{tag}{}", env.error.message)
        }
        Err(_) => body.trim().to_string(),
    }
}

/// Consume the response and return it if successful, or a structured error.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read error body>".to_string());
    let message = error_message(&body);

    error!(%status, %message, "LLM request returned HTTP error");
    Err(ProviderError::Http { status: status.as_u16(), message })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn build_selects_provider_by_name() {
        let mut cfg = Config::test_default(std::path::Path::new("/tmp")).llm;
        assert_eq!(build(&cfg).unwrap().name(), "dummy");
        cfg.provider = "gemini".into();
        assert_eq!(build(&cfg).unwrap().name(), "gemini");
        cfg.provider = "openai-compatible".into();
        assert_eq!(build(&cfg).unwrap().name(), "openai");
    }

    #[test]
    fn build_rejects_unknown_provider() {
        let mut cfg = Config::test_default(std::path::Path::new("/tmp")).llm;
        cfg.provider = "palm".into();
        assert!(matches!(build(&cfg), Err(ProviderError::UnknownProvider(n)) if n == "palm"));
    }

    #[test]
    fn error_message_reads_gemini_envelope() {
        let body = r#"{"error":{"code":429,"message":"Resource exhausted","status":"RESOURCE_EXHAUSTED"}}"#;
        assert_eq!(error_message(body), "[RESOURCE_EXHAUSTED] Resource exhausted");
    }

    #[test]
    fn error_message_reads_openai_envelope() {
        let body = r#"{"error":{"message":"Incorrect API key","code":"invalid_api_key"}}"#;
        assert_eq!(error_message(body), "[invalid_api_key] Incorrect API key");
    }

    #[test]
    fn error_message_falls_back_to_raw_body() {
        assert_eq!(error_message("  gateway timeout \n"), "gateway timeout");
    }
}
