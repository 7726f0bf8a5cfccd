//! Chat orchestration: one user turn in, one streamed model reply out.
//!
//! - **orchestrator**: [`ChatOrchestrator`], the owned session state.
//! - **history**: stored log → request turns, with first-user validation.
//! - **context**: ambient context (platform, client, time, timezone).
//! - **prompt**: layered `{{var}}` prompt templates.

pub mod context;
pub mod history;
pub mod orchestrator;
pub mod prompt;

use thiserror::Error;

use crate::credentials::RotateError;
use crate::store::StoreError;

pub use context::{AmbientContext, ContextProvider, FixedContext, SystemContext};
pub use orchestrator::ChatOrchestrator;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("nothing to send: text is empty and no image is attached")]
    EmptyTurn,
    #[error("no API keys configured")]
    NoCredentials,
    #[error("all {attempts} API key(s) failed")]
    AllCredentialsExhausted { attempts: usize },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<RotateError> for ChatError {
    fn from(e: RotateError) -> Self {
        match e {
            RotateError::NoCredentials => ChatError::NoCredentials,
            RotateError::Exhausted { attempts } => ChatError::AllCredentialsExhausted { attempts },
            RotateError::Store(e) => ChatError::Store(e),
        }
    }
}

/// What a successful `send_turn` produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    /// Final model text, as persisted. Empty when the stream ended without text.
    pub text: String,
    /// Credential attempts made, the successful one included.
    pub attempts: usize,
    /// Index of the credential that produced the reply.
    pub credential_index: usize,
    /// Memory items written by the post-turn pipeline.
    pub memories_stored: usize,
}
