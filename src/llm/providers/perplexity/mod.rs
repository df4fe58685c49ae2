//! Perplexity provider module
//! Perplexity exposes an OpenAI-compatible chat completions endpoint for the `sonar` family

pub mod client;
pub mod config;
pub mod types;

pub use client::PerplexityClient;
pub use config::{get_available_models, PerplexityConfig};
pub use types::{PerplexityChatMessage, PerplexityRequest, PerplexityResponse};
