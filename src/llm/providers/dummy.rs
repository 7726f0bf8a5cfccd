//! Dummy LLM provider: echoes the input back prefixed with `[echo]`.
//! Streams word by word so the console path is exercised without an API key.

use futures::StreamExt;

use crate::llm::{Credential, DeltaStream, GenerationRequest, Part, ProviderError};

#[derive(Debug, Clone)]
pub struct DummyProvider;

impl DummyProvider {
    pub async fn generate(
        &self,
        _credential: &Credential,
        request: &GenerationRequest,
    ) -> Result<DeltaStream, ProviderError> {
        let content = request
            .parts
            .iter()
            .filter_map(|p| match p {
                Part::Text(t) => Some(t.as_str()),
                Part::Image(_) => None,
            })
            .collect::<Vec<_>>()
            .join("\n");
        let reply = format!("[echo] {content}");
        let deltas: Vec<Result<String, ProviderError>> =
            reply.split_inclusive(' ').map(|w| Ok(w.to_string())).collect();
        Ok(futures::stream::iter(deltas).boxed())
    }
}
