//! Shared helpers for integration tests: a scripted provider and a session
//! builder over a tmp store.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::StreamExt;
use tempfile::TempDir;

use smriti::chat::{AmbientContext, ChatOrchestrator, FixedContext};
use smriti::config::Config;
use smriti::llm::{Credential, DeltaStream, Generate, GenerationRequest, Part, ProviderError, Role};
use smriti::store::{self, StoreHandle};

/// How the provider answers a chat call made with a given credential.
#[derive(Debug, Clone)]
pub enum Script {
    /// The call is rejected before any byte arrives.
    Reject,
    /// These deltas arrive, then the stream ends cleanly.
    Reply(Vec<&'static str>),
    /// These deltas arrive, then the stream errors.
    Abort(Vec<&'static str>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Chat,
    Extraction,
    Retrieval,
}

/// One recorded `generate` call.
#[derive(Debug, Clone)]
pub struct Call {
    pub kind: CallKind,
    pub credential: String,
    pub model: String,
    pub system_instruction: Option<String>,
    pub history_roles: Vec<Role>,
    pub prompt: String,
}

#[derive(Default)]
struct Inner {
    chat: HashMap<String, Script>,
    extraction_reply: Option<String>,
    retrieval_reply: Option<String>,
    calls: Vec<Call>,
}

/// Deterministic [`Generate`] driven by per-credential scripts.
///
/// Chat calls carry a system instruction; agent calls do not. Agent calls
/// are told apart by the opening line of their prompt and answer with the
/// configured reply, or an empty JSON list when none is set.
#[derive(Clone, Default)]
pub struct ScriptedProvider {
    inner: Arc<Mutex<Inner>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, credential: &str, script: Script) -> Self {
        self.inner.lock().unwrap().chat.insert(credential.to_string(), script);
        self
    }

    pub fn extraction_reply(self, reply: &str) -> Self {
        self.inner.lock().unwrap().extraction_reply = Some(reply.to_string());
        self
    }

    pub fn retrieval_reply(self, reply: &str) -> Self {
        self.inner.lock().unwrap().retrieval_reply = Some(reply.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn calls_of(&self, kind: CallKind) -> Vec<Call> {
        self.calls().into_iter().filter(|c| c.kind == kind).collect()
    }

    pub fn reset_calls(&self) {
        self.inner.lock().unwrap().calls.clear();
    }
}

fn prompt_text(request: &GenerationRequest) -> String {
    request
        .parts
        .iter()
        .filter_map(|p| match p {
            Part::Text(t) => Some(t.as_str()),
            Part::Image(_) => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn deltas(items: Vec<&'static str>, tail: Option<ProviderError>) -> DeltaStream {
    let mut out: Vec<Result<String, ProviderError>> = items.into_iter().map(|s| Ok(s.to_string())).collect();
    if let Some(e) = tail {
        out.push(Err(e));
    }
    futures::stream::iter(out).boxed()
}

impl Generate for ScriptedProvider {
    async fn generate(
        &self,
        credential: &Credential,
        request: &GenerationRequest,
    ) -> Result<DeltaStream, ProviderError> {
        let prompt = prompt_text(request);
        let kind = if request.system_instruction.is_some() {
            CallKind::Chat
        } else if prompt.starts_with("You are a retrieval agent") {
            CallKind::Retrieval
        } else {
            CallKind::Extraction
        };

        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(Call {
            kind,
            credential: credential.expose().to_string(),
            model: request.model.clone(),
            system_instruction: request.system_instruction.clone(),
            history_roles: request.history.iter().map(|t| t.role).collect(),
            prompt,
        });

        match kind {
            CallKind::Chat => match inner.chat.get(credential.expose()).cloned() {
                None | Some(Script::Reject) => Err(ProviderError::Http {
                    status: 429,
                    message: "[RESOURCE_EXHAUSTED] quota exceeded".into(),
                }),
                Some(Script::Reply(items)) => Ok(deltas(items, None)),
                Some(Script::Abort(items)) => {
                    Ok(deltas(items, Some(ProviderError::Stream("connection reset".into()))))
                }
            },
            CallKind::Extraction => {
                let reply = inner.extraction_reply.clone().unwrap_or_else(|| r#"{"memory": []}"#.into());
                Ok(futures::stream::iter([Ok(reply)]).boxed())
            }
            CallKind::Retrieval => {
                let reply = inner
                    .retrieval_reply
                    .clone()
                    .unwrap_or_else(|| r#"{"relevant_memories": []}"#.into());
                Ok(futures::stream::iter([Ok(reply)]).boxed())
            }
        }
    }
}

pub fn ambient() -> AmbientContext {
    AmbientContext {
        platform: "linux x86_64".into(),
        client: "smriti-test".into(),
        local_time: "2025-01-01 09:30:00".into(),
        timezone: "Asia/Kolkata".into(),
    }
}

pub type Session = ChatOrchestrator<ScriptedProvider, FixedContext>;

/// A tmp-store session with `keys` loaded and the pointer at 0.
pub async fn session_with(
    provider: &ScriptedProvider,
    keys: &[&str],
    tweak: impl FnOnce(&mut Config),
) -> (TempDir, Session, StoreHandle) {
    let dir = TempDir::new().expect("tempdir");
    let mut config = Config::test_default(dir.path());
    tweak(&mut config);
    let store = store::open(&config.store).expect("open store");
    let mut session = ChatOrchestrator::open(&config, provider.clone(), store.clone(), FixedContext(ambient()))
        .await
        .expect("open session");
    if !keys.is_empty() {
        session
            .set_credentials(keys.iter().map(|k| k.to_string()).collect())
            .await
            .expect("set credentials");
    }
    (dir, session, store)
}

pub async fn session(provider: &ScriptedProvider, keys: &[&str]) -> (TempDir, Session, StoreHandle) {
    session_with(provider, keys, |_| {}).await
}
