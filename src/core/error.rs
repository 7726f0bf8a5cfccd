//! Application-wide error types.

use thiserror::Error;

use crate::chat::ChatError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("logger error: {0}")]
    Logger(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("chat error: {0}")]
    Chat(#[from] ChatError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
