//! Long-term memory pipeline.
//!
//! Three agents, each callable on its own and each fail-soft:
//!
//! - **extraction**: asks the model which new facts a conversation revealed.
//! - **storage**: writes facts into the `memory` collection one by one.
//! - **retrieval**: asks the model which stored facts matter for a query.
//!
//! Extraction and retrieval parse the model's reply with [`parse`]; a
//! malformed reply is logged and treated as "nothing found".

pub mod extraction;
pub mod parse;
pub mod retrieval;
pub mod storage;

use std::path::PathBuf;

use crate::config::{ChatConfig, MemoryConfig};

pub use parse::AgentResponseError;

/// Shared settings for the memory agents.
#[derive(Debug, Clone)]
pub struct MemoryPipeline {
    /// Model the agents call; independent of the chat model.
    pub model: String,
    /// Upper bound on memories returned by retrieval.
    pub retrieval_limit: usize,
    pub prompts_dir: PathBuf,
}

impl MemoryPipeline {
    pub fn new(memory: &MemoryConfig, chat: &ChatConfig) -> Self {
        Self {
            model: memory.agent_model.clone(),
            retrieval_limit: memory.retrieval_limit,
            prompts_dir: chat.prompts_dir.clone(),
        }
    }
}
