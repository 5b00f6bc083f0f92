//! # sekvo-cli
//!
//! Command-line interface for sekvo.
//!
//! ## Commands
//!
//! - `sekvo <provider> generate` — Generate a full response
//! - `sekvo <provider> stream` — Stream the response token by token
//! - `sekvo providers` — List registered providers
//! - `sekvo config` — Show the resolved configuration
//! - `sekvo completions` — Generate shell completions

pub mod commands;
pub mod output;

pub use commands::Cli;
