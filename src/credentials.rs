//! Credential rotation with sticky round-robin failover.
//!
//! The rotator owns the credential list and the rotation pointer for the
//! lifetime of a session. [`CredentialRotator::attempt`] tries a unit of work
//! starting at the pointer. Each failure advances the pointer and persists it
//! before the next try. A success returns immediately and leaves the pointer
//! (and its persisted copy) untouched, so the working credential is tried
//! first next time.

use std::fmt::Display;

use thiserror::Error;
use tracing::{info, warn};

use crate::llm::Credential;
use crate::store::handle::{API_KEYS, CURRENT_KEY_INDEX};
use crate::store::{StoreError, StoreHandle};

#[derive(Debug, Error)]
pub enum RotateError {
    #[error("no credentials configured")]
    NoCredentials,
    #[error("all {attempts} credential(s) failed")]
    Exhausted { attempts: usize },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of a successful rotation.
#[derive(Debug)]
pub struct Attempted<T> {
    pub value: T,
    /// Tries made, the successful one included.
    pub attempts: usize,
    /// Index of the credential that succeeded.
    pub index: usize,
}

pub struct CredentialRotator {
    credentials: Vec<Credential>,
    pointer: usize,
    store: StoreHandle,
}

impl CredentialRotator {
    /// Rebuild rotator state from the `settings` collection. A pointer that
    /// does not address a credential is treated as 0.
    pub async fn load(store: StoreHandle) -> Result<Self, StoreError> {
        let credentials: Vec<Credential> = store.get_setting(API_KEYS, Vec::new()).await?;
        let stored: usize = store.get_setting(CURRENT_KEY_INDEX, 0).await?;
        let pointer = if stored < credentials.len() { stored } else { 0 };
        if pointer != stored {
            warn!(stored, credentials = credentials.len(), "rotation pointer out of range; using 0");
        }
        Ok(Self { credentials, pointer, store })
    }

    /// Replace the credential list wholesale and reset the pointer to 0.
    pub async fn replace(&mut self, credentials: Vec<Credential>) -> Result<(), StoreError> {
        self.store.save_setting(API_KEYS, &credentials).await?;
        self.store.save_setting(CURRENT_KEY_INDEX, &0usize).await?;
        info!(credentials = credentials.len(), "credential list replaced");
        self.credentials = credentials;
        self.pointer = 0;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    pub fn pointer(&self) -> usize {
        self.pointer
    }

    /// Run `work` against credentials starting at the pointer, at most once
    /// per credential.
    pub async fn attempt<T, E, F>(&mut self, mut work: F) -> Result<Attempted<T>, RotateError>
    where
        F: AsyncFnMut(&Credential) -> Result<T, E>,
        E: Display,
    {
        let max_tries = self.credentials.len();
        if max_tries == 0 {
            return Err(RotateError::NoCredentials);
        }

        let mut tries = 0;
        while tries < max_tries {
            let index = self.pointer;
            match work(&self.credentials[index]).await {
                Ok(value) => {
                    info!(attempt = tries + 1, credential_index = index, "credential attempt succeeded");
                    return Ok(Attempted { value, attempts: tries + 1, index });
                }
                Err(e) => {
                    tries += 1;
                    self.pointer = (self.pointer + 1) % max_tries;
                    warn!(
                        attempt = tries,
                        credential_index = index,
                        next_index = self.pointer,
                        error = %e,
                        "credential attempt failed; rotating"
                    );
                    self.store.save_setting(CURRENT_KEY_INDEX, &self.pointer).await?;
                }
            }
        }

        warn!(attempts = max_tries, "all credentials exhausted");
        Err(RotateError::Exhausted { attempts: max_tries })
    }
}
