//! Google Gemini streaming provider (`models/{model}:streamGenerateContent`).
//!
//! Requests are sent with `alt=sse`, so the response body is a Server-Sent
//! Events stream whose `data:` payloads are `GenerateContentResponse` chunks.
//! All wire types are private to this module.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace};

use crate::llm::sse::{self, SseStep};
use crate::llm::{Credential, DeltaStream, GenerationRequest, Part, ProviderError, Role};

use super::{check_status, http_client};

#[derive(Debug, Clone)]
pub struct GeminiProvider {
    client: Client,
    api_base_url: String,
}

impl GeminiProvider {
    pub fn new(api_base_url: String, timeout_seconds: u64) -> Result<Self, ProviderError> {
        let client = http_client(timeout_seconds)?;
        Ok(Self { client, api_base_url: api_base_url.trim_end_matches('/').to_string() })
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{model}:streamGenerateContent?alt=sse", self.api_base_url)
    }

    pub async fn generate(
        &self,
        credential: &Credential,
        request: &GenerationRequest,
    ) -> Result<DeltaStream, ProviderError> {
        let payload = request_body(request);
        let url = self.endpoint(&request.model);

        debug!(
            model = %request.model,
            history = request.history.len(),
            has_system = request.system_instruction.is_some(),
            "sending Gemini request"
        );
        if tracing::enabled!(tracing::Level::TRACE) {
            let json = serde_json::to_string_pretty(&payload)
                .unwrap_or_else(|e| format!("<serialization failed: {e}>"));
            trace!(payload = %json, "full Gemini request payload");
        }

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", credential.expose())
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                error!(url = %url, error = %e, "Gemini HTTP request failed (transport)");
                ProviderError::Request(e.to_string())
            })?;

        let response = check_status(response).await?;
        Ok(sse::delta_stream(response.bytes_stream(), decode_chunk))
    }
}

fn request_body(request: &GenerationRequest) -> GenerateContentRequest {
    let mut contents: Vec<Content> = request
        .history
        .iter()
        .map(|turn| Content { role: turn.role.as_str(), parts: wire_parts(&turn.parts) })
        .collect();
    contents.push(Content { role: Role::User.as_str(), parts: wire_parts(&request.parts) });

    GenerateContentRequest {
        system_instruction: request.system_instruction.as_ref().map(|text| SystemInstruction {
            parts: vec![WirePart::Text { text: text.clone() }],
        }),
        contents,
    }
}

fn wire_parts(parts: &[Part]) -> Vec<WirePart> {
    parts
        .iter()
        .map(|p| match p {
            Part::Text(text) => WirePart::Text { text: text.clone() },
            Part::Image(img) => WirePart::InlineData {
                inline_data: InlineData { mime_type: img.mime_type.clone(), data: img.base64() },
            },
        })
        .collect()
}

/// One SSE payload → the text of its first candidate.
fn decode_chunk(data: &str) -> Result<Option<SseStep>, ProviderError> {
    let chunk: StreamChunk = serde_json::from_str(data)
        .map_err(|e| ProviderError::Stream(format!("malformed Gemini chunk: {e}")))?;

    if let Some(err) = chunk.error {
        return Err(ProviderError::Stream(err.message));
    }

    let text: String = chunk
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    Ok((!text.is_empty()).then_some(SseStep::Delta(text)))
}

// ── Private wire types ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction>,
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<WirePart>,
}

#[derive(Debug, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<WirePart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum WirePart {
    Text { text: String },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    error: Option<ChunkError>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkError {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{InlineImage, Turn};

    #[test]
    fn endpoint_includes_model_and_sse() {
        let p = GeminiProvider::new("https://example.test/v1beta/".into(), 5).unwrap();
        assert_eq!(
            p.endpoint("gemini-2.5-flash"),
            "https://example.test/v1beta/models/gemini-2.5-flash:streamGenerateContent?alt=sse"
        );
    }

    #[test]
    fn body_places_new_input_after_history() {
        let req = GenerationRequest {
            model: "m".into(),
            system_instruction: Some("be kind".into()),
            history: vec![Turn::text(Role::User, "hi"), Turn::text(Role::Model, "hello")],
            parts: vec![
                Part::Text("what is this?".into()),
                Part::Image(InlineImage { mime_type: "image/png".into(), data: vec![0, 1, 2, 255] }),
            ],
        };
        let json = serde_json::to_value(request_body(&req)).unwrap();
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "be kind");
        let contents = json["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[2]["role"], "user");
        assert_eq!(contents[2]["parts"][0]["text"], "what is this?");
        assert_eq!(contents[2]["parts"][1]["inlineData"]["mimeType"], "image/png");
        assert_eq!(contents[2]["parts"][1]["inlineData"]["data"], "AAEC/w==");
    }

    #[test]
    fn body_omits_missing_system_instruction() {
        let json = serde_json::to_value(request_body(&GenerationRequest::prompt("m", "x"))).unwrap();
        assert!(json.get("systemInstruction").is_none());
    }

    #[test]
    fn decode_chunk_extracts_text() {
        let data = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Hel"},{"text":"lo"}]}}]}"#;
        assert_eq!(decode_chunk(data).unwrap(), Some(SseStep::Delta("Hello".into())));
    }

    #[test]
    fn decode_chunk_skips_empty_candidates() {
        let data = r#"{"candidates":[{"finishReason":"STOP"}],"usageMetadata":{"totalTokenCount":3}}"#;
        assert_eq!(decode_chunk(data).unwrap(), None);
    }

    #[test]
    fn decode_chunk_surfaces_inline_error() {
        let data = r#"{"error":{"code":500,"message":"internal"}}"#;
        assert!(matches!(decode_chunk(data), Err(ProviderError::Stream(m)) if m == "internal"));
    }

    #[test]
    fn decode_chunk_rejects_garbage() {
        assert!(decode_chunk("not json").is_err());
    }
}
