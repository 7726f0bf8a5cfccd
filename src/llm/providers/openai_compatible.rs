//! OpenAI-compatible chat completion provider (`/v1/chat/completions`).
//!
//! Always requests `stream: true` and decodes the SSE body into deltas.
//! Covers OpenAI itself and compatible local servers (Ollama, LM Studio…).
//! All OpenAI wire types are private to this module.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace};

use crate::llm::sse::{self, SseStep};
use crate::llm::{Credential, DeltaStream, GenerationRequest, Part, ProviderError, Role};

use super::{check_status, http_client};

/// Constructed once at startup, then cheaply cloned because
/// `reqwest::Client` is an `Arc` internally.
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleProvider {
    client: Client,
    api_base_url: String,
    temperature: f32,
}

impl OpenAiCompatibleProvider {
    pub fn new(api_base_url: String, temperature: f32, timeout_seconds: u64) -> Result<Self, ProviderError> {
        let client = http_client(timeout_seconds)?;
        Ok(Self { client, api_base_url, temperature })
    }

    pub async fn generate(
        &self,
        credential: &Credential,
        request: &GenerationRequest,
    ) -> Result<DeltaStream, ProviderError> {
        let payload = request_body(request, self.temperature);

        debug!(
            model = %payload.model,
            temperature = ?payload.temperature,
            messages = payload.messages.len(),
            "sending LLM request"
        );
        if tracing::enabled!(tracing::Level::TRACE) {
            let json = serde_json::to_string_pretty(&payload)
                .unwrap_or_else(|e| format!("<serialization failed: {e}>"));
            trace!(payload = %json, "full LLM request payload");
        }

        let mut req = self.client.post(&self.api_base_url).json(&payload);
        // Keyless local servers get an empty credential.
        if !credential.expose().is_empty() {
            req = req.bearer_auth(credential.expose());
        }

        let response = req.send().await.map_err(|e| {
            error!(url = %self.api_base_url, error = %e, "LLM HTTP request failed (transport)");
            ProviderError::Request(e.to_string())
        })?;

        let response = check_status(response).await?;
        Ok(sse::delta_stream(response.bytes_stream(), decode_chunk))
    }
}

fn request_body(request: &GenerationRequest, temperature: f32) -> ChatCompletionRequest {
    // Some models (gpt-5 family) do not accept a temperature parameter.
    let temperature = if request.model.starts_with("gpt-5") { None } else { Some(temperature) };

    let mut messages = Vec::with_capacity(request.history.len() + 2);
    if let Some(sys) = &request.system_instruction {
        messages.push(Message { role: "system", content: MessageContent::Text(sys.clone()) });
    }
    for turn in &request.history {
        messages.push(Message { role: wire_role(turn.role), content: content_of(&turn.parts) });
    }
    messages.push(Message { role: "user", content: content_of(&request.parts) });

    ChatCompletionRequest { model: request.model.clone(), messages, temperature, stream: true }
}

fn wire_role(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Model => "assistant",
    }
}

/// Plain string for text-only input; content-part array when an image rides along.
fn content_of(parts: &[Part]) -> MessageContent {
    let has_image = parts.iter().any(|p| matches!(p, Part::Image(_)));
    if !has_image {
        let text = parts
            .iter()
            .filter_map(|p| match p {
                Part::Text(t) => Some(t.as_str()),
                Part::Image(_) => None,
            })
            .collect::<Vec<_>>()
            .join("\n");
        return MessageContent::Text(text);
    }
    MessageContent::Parts(
        parts
            .iter()
            .map(|p| match p {
                Part::Text(text) => ContentPart::Text { text: text.clone() },
                Part::Image(img) => ContentPart::ImageUrl {
                    image_url: ImageUrl { url: format!("data:{};base64,{}", img.mime_type, img.base64()) },
                },
            })
            .collect(),
    )
}

fn decode_chunk(data: &str) -> Result<Option<SseStep>, ProviderError> {
    if data.trim() == "[DONE]" {
        return Ok(Some(SseStep::Done));
    }
    let chunk: ChatCompletionChunk = serde_json::from_str(data)
        .map_err(|e| ProviderError::Stream(format!("malformed completion chunk: {e}")))?;

    if let Some(err) = chunk.error {
        return Err(ProviderError::Stream(err.message));
    }

    let text = chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .unwrap_or_default();

    Ok((!text.is_empty()).then_some(SseStep::Delta(text)))
}

// ── Private wire types ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: MessageContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    error: Option<ChunkError>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkError {
    message: String,
}
