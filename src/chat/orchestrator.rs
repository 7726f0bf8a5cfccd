//! [`ChatOrchestrator`]: owns one chat session's transient state.
//!
//! The orchestrator is a single owned value driven through `&mut self`: the
//! credential list, rotation pointer and the in-flight accumulation buffer
//! never live anywhere else, and only one `send_turn` can run at a time.
//!
//! A turn goes like this:
//!
//! 1. persist the user message;
//! 2. per credential attempt: load the model name and the validated history,
//!    retrieve memories with that attempt's credential, build the system
//!    instruction, then stream the reply, reporting the accumulated text to
//!    the caller after every delta;
//! 3. persist the reply, unless the stream ended without text;
//! 4. run extraction and storage fail-soft.
//!
//! Output surfaced during a failed attempt is not retracted; the next attempt
//! restarts from empty. Dropping the `send_turn` future cancels the turn at
//! the current await point.

use futures::StreamExt;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::context::{AmbientContext, ContextProvider};
use super::history::{input_parts, to_turns, validate_history};
use super::prompt::PromptBuilder;
use super::{ChatError, TurnOutcome};
use crate::config::{ChatConfig, Config};
use crate::credentials::CredentialRotator;
use crate::llm::{Credential, Generate, GenerationRequest, InlineImage, ProviderError, Role, Turn};
use crate::memory::MemoryPipeline;
use crate::store::handle::MODEL_NAME;
use crate::store::{MemoryItem, StoreError, StoreHandle, StoredMessage};

pub const SYSTEM_TEMPLATE_FILE: &str = "system_instruction.txt";

const DEFAULT_SYSTEM_TEMPLATE: &str = "You are a helpful and friendly conversational AI. Your name is {{assistant_name}}.
Current user context:
- OS: {{platform}}
- Client: {{client}}
- Current Time: {{local_time}}
- Timezone: {{timezone}}

Here are some relevant memories from past conversations:
{{memories}}

Always format your responses using Markdown. For code, use language-specific code blocks.";

/// Why one credential attempt failed.
#[derive(Debug, Error)]
enum AttemptError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What a successful attempt hands back to `send_turn`.
struct AttemptOutput {
    text: String,
    /// Validated history the request was built from, new user turn included.
    history: Vec<Turn>,
    credential: Credential,
}

pub struct ChatOrchestrator<P: Generate, C: ContextProvider> {
    provider: P,
    context: C,
    store: StoreHandle,
    rotator: CredentialRotator,
    memory: MemoryPipeline,
    chat: ChatConfig,
    extraction_enabled: bool,
}

impl<P: Generate, C: ContextProvider> ChatOrchestrator<P, C> {
    /// Rebuild session state from the store.
    ///
    /// Credentials from the environment (`config.api_keys`) seed the store only
    /// when it holds none. With `chat.greeting` on, an empty log gets a
    /// model-role greeting.
    pub async fn open(config: &Config, provider: P, store: StoreHandle, context: C) -> Result<Self, ChatError> {
        let mut rotator = CredentialRotator::load(store.clone()).await?;
        if rotator.is_empty() && !config.api_keys.is_empty() {
            info!(credentials = config.api_keys.len(), "seeding credentials from environment");
            rotator
                .replace(config.api_keys.iter().map(Credential::new).collect())
                .await?;
        }

        let orchestrator = Self {
            provider,
            context,
            store,
            rotator,
            memory: MemoryPipeline::new(&config.memory, &config.chat),
            chat: config.chat.clone(),
            extraction_enabled: config.memory.extraction_enabled,
        };

        if config.chat.greeting && orchestrator.store.messages().await?.is_empty() {
            let greeting = orchestrator.greeting();
            orchestrator.store.save_message(Role::Model, Some(greeting), None).await?;
        }

        info!(
            credentials = orchestrator.rotator.len(),
            pointer = orchestrator.rotator.pointer(),
            "chat session ready"
        );
        Ok(orchestrator)
    }

    fn greeting(&self) -> String {
        format!(
            "Hello! I am {}, your personal AI assistant. Loaded {} API key(s). \
             Your chat history will be saved. How can I help you today?",
            self.chat.assistant_name,
            self.rotator.len()
        )
    }

    /// Send one user turn and stream the reply.
    ///
    /// `on_delta` receives the accumulated reply text after every delta. On a
    /// retry it starts again from the first delta of the new attempt.
    pub async fn send_turn(
        &mut self,
        text: &str,
        image: Option<InlineImage>,
        mut on_delta: impl FnMut(&str),
    ) -> Result<TurnOutcome, ChatError> {
        let text = text.trim();
        if text.is_empty() && image.is_none() {
            return Err(ChatError::EmptyTurn);
        }
        if self.rotator.is_empty() {
            return Err(ChatError::NoCredentials);
        }

        let user_text = (!text.is_empty()).then(|| text.to_string());
        self.store.save_message(Role::User, user_text, image.clone()).await?;
        let new_parts = input_parts(Some(text), image.as_ref());

        let (provider, context, store, memory, chat) =
            (&self.provider, &self.context, &self.store, &self.memory, &self.chat);
        let rotator = &mut self.rotator;
        info!(
            text_len = text.len(),
            has_image = image.is_some(),
            credentials = rotator.len(),
            "turn started"
        );

        let attempted = rotator
            .attempt(async |credential: &Credential| {
                let turn = Turn { role: Role::User, parts: new_parts.clone() };
                run_attempt(provider, context, store, memory, chat, credential, text, turn, &mut on_delta)
                    .await
            })
            .await?;
        let AttemptOutput { text: reply, mut history, credential } = attempted.value;

        // A clean stream with no text (e.g. a blocked answer) is still a
        // success for the credential, but there is nothing to persist.
        if reply.is_empty() {
            warn!(
                attempts = attempted.attempts,
                credential_index = attempted.index,
                "model returned no text; reply not saved"
            );
        } else {
            self.store.save_message(Role::Model, Some(reply.clone()), None).await?;
            info!(
                attempts = attempted.attempts,
                credential_index = attempted.index,
                reply_len = reply.len(),
                "turn completed"
            );
        }

        let memories_stored = if self.extraction_enabled && !reply.is_empty() {
            history.push(Turn::text(Role::Model, reply.clone()));
            let facts = self.memory.extract(&self.provider, &credential, &history).await;
            self.memory.store(&self.store, &facts).await
        } else {
            0
        };

        Ok(TurnOutcome {
            text: reply,
            attempts: attempted.attempts,
            credential_index: attempted.index,
            memories_stored,
        })
    }

    /// Replace the credential list wholesale; the pointer restarts at 0.
    pub async fn set_credentials(&mut self, keys: Vec<String>) -> Result<(), ChatError> {
        let keys = keys
            .into_iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .map(Credential::new)
            .collect();
        self.rotator.replace(keys).await?;
        Ok(())
    }

    pub async fn set_model(&mut self, name: &str) -> Result<(), ChatError> {
        self.store.save_setting(MODEL_NAME, &name).await?;
        info!(model = name, "model changed");
        Ok(())
    }

    pub async fn model(&self) -> Result<String, ChatError> {
        Ok(self.store.get_setting(MODEL_NAME, self.chat.default_model.clone()).await?)
    }

    pub fn credential_count(&self) -> usize {
        self.rotator.len()
    }

    pub fn rotation_pointer(&self) -> usize {
        self.rotator.pointer()
    }

    pub async fn history(&self) -> Result<Vec<StoredMessage>, ChatError> {
        Ok(self.store.messages().await?)
    }

    pub async fn clear_history(&mut self) -> Result<(), ChatError> {
        self.store.clear_messages().await?;
        Ok(())
    }

    pub async fn memories(&self) -> Result<Vec<MemoryItem>, ChatError> {
        Ok(self.store.all_memory().await?)
    }

    pub async fn clear_memories(&mut self) -> Result<(), ChatError> {
        self.store.clear_memory().await?;
        Ok(())
    }
}

/// Render the system instruction from the template layer.
pub fn system_instruction(chat: &ChatConfig, ambient: &AmbientContext, memories: &[String]) -> String {
    PromptBuilder::new(chat.prompts_dir.clone())
        .layer_or(SYSTEM_TEMPLATE_FILE, DEFAULT_SYSTEM_TEMPLATE)
        .with_vars([
            ("assistant_name", chat.assistant_name.as_str()),
            ("platform", ambient.platform.as_str()),
            ("client", ambient.client.as_str()),
            ("local_time", ambient.local_time.as_str()),
            ("timezone", ambient.timezone.as_str()),
        ])
        .var("memories", memories.join("\n"))
        .build()
}

/// One credential attempt: build the request from fresh state, then stream it
/// to completion.
#[allow(clippy::too_many_arguments)]
async fn run_attempt<P: Generate, C: ContextProvider>(
    provider: &P,
    context: &C,
    store: &StoreHandle,
    memory: &MemoryPipeline,
    chat: &ChatConfig,
    credential: &Credential,
    query: &str,
    new_turn: Turn,
    on_delta: &mut impl FnMut(&str),
) -> Result<AttemptOutput, AttemptError> {
    let model: String = store.get_setting(MODEL_NAME, chat.default_model.clone()).await?;

    // The newest stored entry is the user turn just saved; it goes out as
    // `parts`, not as history.
    let mut history = validate_history(to_turns(&store.messages().await?));
    history.pop();

    let memories = memory.retrieve(provider, credential, store, query).await;
    let system = system_instruction(chat, &context.ambient(), &memories);

    let request = GenerationRequest {
        model,
        system_instruction: Some(system),
        history,
        parts: new_turn.parts.clone(),
    };
    debug!(
        model = %request.model,
        history = request.history.len(),
        memories = memories.len(),
        "generation request built"
    );

    let mut stream = provider.generate(credential, &request).await?;
    let mut accumulated = String::new();
    let mut deltas = 0usize;
    while let Some(delta) = stream.next().await {
        accumulated.push_str(&delta?);
        deltas += 1;
        on_delta(&accumulated);
    }
    debug!(deltas, reply_len = accumulated.len(), "stream finished");

    let mut history = request.history;
    history.push(new_turn);
    Ok(AttemptOutput { text: accumulated, history, credential: credential.clone() })
}
