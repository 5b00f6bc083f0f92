//! # sekvo-core
//!
//! Core types shared by every sekvo crate: the error taxonomy, chat messages,
//! tool definitions, and the per-environment provider configuration.

pub mod error;
pub mod message;
pub mod tool;
pub mod types;

pub use error::{Result, SekvoError};
pub use message::{ChatMessage, Role};
pub use tool::Tool;
pub use types::*;
