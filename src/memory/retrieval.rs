//! Retrieval agent: query → the stored facts that matter for it.

use tracing::{debug, warn};

use super::MemoryPipeline;
use super::parse::parse_string_list;
use crate::chat::prompt::PromptBuilder;
use crate::llm::{Credential, Generate, GenerationRequest, collect_text};
use crate::store::StoreHandle;

pub const TEMPLATE_FILE: &str = "memory_retrieval.txt";
pub const FIELD: &str = "relevant_memories";

const DEFAULT_TEMPLATE: &str = r#"You are a retrieval agent. Your task is to select the most relevant memories from the following list to help answer the user's query.
Return ONLY the most relevant memories as a valid JSON object with a single key "relevant_memories" which contains an array of strings.
Do not return more than {{limit}} memories.

Memories:
{{memories}}

Query:
{{query}}"#;

impl MemoryPipeline {
    pub fn retrieval_prompt(&self, memories: &[String], query: &str) -> String {
        let memories = serde_json::to_string(memories).unwrap_or_else(|_| "[]".to_string());
        PromptBuilder::new(self.prompts_dir.clone())
            .layer_or(TEMPLATE_FILE, DEFAULT_TEMPLATE)
            .var("limit", self.retrieval_limit.to_string())
            .var("memories", memories)
            .var("query", query)
            .build()
    }

    /// Pick at most `retrieval_limit` memories relevant to `query`. Makes no
    /// model call when nothing is stored. Never fails.
    pub async fn retrieve<P: Generate>(
        &self,
        provider: &P,
        credential: &Credential,
        store: &StoreHandle,
        query: &str,
    ) -> Vec<String> {
        let memories: Vec<String> = match store.all_memory().await {
            Ok(items) => items.into_iter().map(|m| m.text).collect(),
            Err(e) => {
                warn!(error = %e, "retrieval agent could not read memories");
                return Vec::new();
            }
        };
        if memories.is_empty() {
            debug!("no memories stored; retrieval skipped");
            return Vec::new();
        }

        let request = GenerationRequest::prompt(&self.model, self.retrieval_prompt(&memories, query));
        let reply = match provider.generate(credential, &request).await {
            Ok(stream) => collect_text(stream).await,
            Err(e) => Err(e),
        };
        let reply = match reply {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "retrieval agent call failed");
                return Vec::new();
            }
        };

        match parse_string_list(&reply, FIELD) {
            Ok(mut relevant) => {
                relevant.truncate(self.retrieval_limit);
                debug!(stored = memories.len(), relevant = relevant.len(), "retrieval agent finished");
                relevant
            }
            Err(e) => {
                warn!(error = %e, "retrieval agent returned a malformed response");
                Vec::new()
            }
        }
    }
}
