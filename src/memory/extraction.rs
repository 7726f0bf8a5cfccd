//! Extraction agent: conversation → newly learned facts.

use serde::Serialize;
use tracing::{debug, warn};

use super::MemoryPipeline;
use super::parse::parse_string_list;
use crate::chat::prompt::PromptBuilder;
use crate::llm::{Credential, Generate, GenerationRequest, Part, Turn, collect_text};

pub const TEMPLATE_FILE: &str = "memory_extraction.txt";
pub const FIELD: &str = "memory";

const DEFAULT_TEMPLATE: &str = r#"You are a memory agent. Your task is to analyze the following conversation and extract key information to be stored in a long-term memory.
Extract facts, user preferences, and any other important details that should be remembered for future conversations.
Return ONLY the information as a valid JSON object with a single key "memory" which contains an array of strings.
If no new information is present, return an empty array.

Conversation:
{{conversation}}"#;

#[derive(Serialize)]
struct TranscriptLine {
    role: &'static str,
    text: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    image: bool,
}

/// Render turns as a compact JSON transcript. Images are flagged, not inlined.
fn transcript(conversation: &[Turn]) -> String {
    let lines: Vec<TranscriptLine> = conversation
        .iter()
        .map(|t| TranscriptLine {
            role: t.role.as_str(),
            text: t.joined_text(),
            image: t.parts.iter().any(|p| matches!(p, Part::Image(_))),
        })
        .collect();
    serde_json::to_string(&lines).unwrap_or_else(|_| "[]".to_string())
}

impl MemoryPipeline {
    pub fn extraction_prompt(&self, conversation: &[Turn]) -> String {
        PromptBuilder::new(self.prompts_dir.clone())
            .layer_or(TEMPLATE_FILE, DEFAULT_TEMPLATE)
            .var("conversation", transcript(conversation))
            .build()
    }

    /// Ask the model which facts `conversation` revealed. Never fails: call or
    /// parse errors yield an empty list.
    pub async fn extract<P: Generate>(
        &self,
        provider: &P,
        credential: &Credential,
        conversation: &[Turn],
    ) -> Vec<String> {
        let request = GenerationRequest::prompt(&self.model, self.extraction_prompt(conversation));

        let reply = match provider.generate(credential, &request).await {
            Ok(stream) => collect_text(stream).await,
            Err(e) => Err(e),
        };
        let reply = match reply {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "extraction agent call failed");
                return Vec::new();
            }
        };

        match parse_string_list(&reply, FIELD) {
            Ok(facts) => {
                debug!(facts = facts.len(), "extraction agent finished");
                facts
            }
            Err(e) => {
                warn!(error = %e, "extraction agent returned a malformed response");
                Vec::new()
            }
        }
    }
}
