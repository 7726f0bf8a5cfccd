//! Bootstrap layer: modules that run before the chat session opens.
//!
//! - **logger**: tracing-subscriber initialisation.

pub mod logger;
