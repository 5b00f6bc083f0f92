//! # sekvo-llm
//!
//! One provider interface over many LLM vendors. A registry maps names to
//! provider factories; each instance lazily connects its vendor client and
//! normalizes generation, token streaming and structured responses.

pub mod adapter;
pub mod anthropic;
pub mod bedrock;
pub mod gemini;
pub mod http;
pub mod mock;
pub mod ollama;
pub mod openai;
pub mod profile;
pub mod provider;
pub mod registry;
pub mod stream;
pub mod vendor;

pub use adapter::ProviderAdapter;
pub use http::HttpConnector;
pub use mock::{MockConnector, MockVendor};
pub use profile::{PROFILES, ProviderProfile, SystemPromptStyle};
pub use provider::{BaseProvider, Capabilities, ResponseSchema, TokenStream, structured_response_as};
pub use registry::{ProviderFactory, ProviderRegistry};
pub use stream::STREAM_ERROR_PREFIX;
pub use vendor::{TextRequest, TokenSource, VendorClient, VendorConnector, VendorError};
