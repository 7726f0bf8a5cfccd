//! LLM provider abstraction.
//!
//! Every backend turns a [`GenerationRequest`] plus a [`Credential`] into a
//! [`DeltaStream`]: a lazy, finite, pull-based sequence of text fragments.
//! Nothing is fetched past the fragment the caller is currently awaiting, so
//! dropping the stream (or the future polling it) is the cancellation point.
//!
//! `LlmProvider` is an enum over the concrete providers so the binary needs no
//! trait objects; the [`Generate`] trait exists so the chat core and the memory
//! agents can be driven by any generator, scripted ones included.

pub mod providers;
pub mod sse;

use std::fmt;
use std::future::Future;

use futures::StreamExt;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ── Error ─────────────────────────────────────────────────────────────────────

/// Any failure of a single generation call. The rotator treats all variants
/// alike: the credential attempt failed.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    #[error("provider request failed: {0}")]
    Request(String),
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },
    #[error("stream aborted: {0}")]
    Stream(String),
}

// ── Vocabulary ────────────────────────────────────────────────────────────────

/// An opaque secret enabling calls to a provider. `Debug` never prints it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

/// Raw image bytes plus MIME type. Serialised as `{mimeType, data}` with
/// base64-encoded data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineImage {
    pub mime_type: String,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

impl InlineImage {
    pub fn base64(&self) -> String {
        use base64::Engine as _;
        base64::engine::general_purpose::STANDARD.encode(&self.data)
    }
}

mod base64_bytes {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(d)?;
        STANDARD.decode(encoded.as_bytes()).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    Text(String),
    Image(InlineImage),
}

/// One request-shaped conversation entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Turn {
    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self { role, parts: vec![Part::Text(text.into())] }
    }

    /// Concatenation of the turn's text parts.
    pub fn joined_text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Text(t) => Some(t.as_str()),
                Part::Image(_) => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub model: String,
    pub system_instruction: Option<String>,
    /// Prior turns, oldest first. Never includes the new input.
    pub history: Vec<Turn>,
    /// The new user input.
    pub parts: Vec<Part>,
}

impl GenerationRequest {
    /// Single-shot prompt with no history or system instruction.
    pub fn prompt(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system_instruction: None,
            history: Vec::new(),
            parts: vec![Part::Text(prompt.into())],
        }
    }
}

/// Lazy sequence of text deltas from one generation call.
pub type DeltaStream = BoxStream<'static, Result<String, ProviderError>>;

// ── Generate ──────────────────────────────────────────────────────────────────

pub trait Generate: Send + Sync {
    /// Open a streaming generation call. Connection and status errors surface
    /// here; errors after the first byte surface as `Err` items in the stream.
    fn generate(
        &self,
        credential: &Credential,
        request: &GenerationRequest,
    ) -> impl Future<Output = Result<DeltaStream, ProviderError>> + Send;
}

/// Drain a stream into a single string.
pub async fn collect_text(mut stream: DeltaStream) -> Result<String, ProviderError> {
    let mut text = String::new();
    while let Some(delta) = stream.next().await {
        text.push_str(&delta?);
    }
    Ok(text)
}

// ── Provider enum ─────────────────────────────────────────────────────────────

/// All available provider backends.
///
/// Adding a backend = new module + new variant + new `generate` arm.
#[derive(Debug, Clone)]
pub enum LlmProvider {
    Gemini(providers::gemini::GeminiProvider),
    OpenAiCompatible(providers::openai_compatible::OpenAiCompatibleProvider),
    Dummy(providers::dummy::DummyProvider),
}

impl LlmProvider {
    pub fn name(&self) -> &'static str {
        match self {
            LlmProvider::Gemini(_) => "gemini",
            LlmProvider::OpenAiCompatible(_) => "openai",
            LlmProvider::Dummy(_) => "dummy",
        }
    }
}

impl Generate for LlmProvider {
    async fn generate(
        &self,
        credential: &Credential,
        request: &GenerationRequest,
    ) -> Result<DeltaStream, ProviderError> {
        match self {
            LlmProvider::Gemini(p) => p.generate(credential, request).await,
            LlmProvider::OpenAiCompatible(p) => p.generate(credential, request).await,
            LlmProvider::Dummy(p) => p.generate(credential, request).await,
        }
    }
}
