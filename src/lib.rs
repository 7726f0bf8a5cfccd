//! Smriti: a streaming chat client with credential failover and long-term
//! memory.
//!
//! Library root; the binary entry point is `src/main.rs`. Integration tests
//! drive the chat core through the public modules below.

pub mod bootstrap;
pub mod chat;
pub mod console;
pub mod core;
pub mod credentials;
pub mod llm;
pub mod memory;
pub mod store;

pub use crate::bootstrap::logger;
pub use crate::core::{config, error};
