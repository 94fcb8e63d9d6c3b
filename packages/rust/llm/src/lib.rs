//! Text-generation boundary for sitesmith.
//!
//! Stages depend only on the [`TextGenerator`] trait. The production adapter,
//! [`ChatCompletionsClient`], speaks the OpenAI-compatible chat-completions
//! protocol. Every failure is returned as [`SitesmithError::Generation`];
//! nothing here retries.
//!
//! [`SitesmithError::Generation`]: sitesmith_shared::SitesmithError::Generation

mod client;
mod credentials;

use async_trait::async_trait;
use sitesmith_shared::Result;

pub use client::ChatCompletionsClient;
pub use credentials::load_api_key;

/// A single request/response call to a generative text service.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Send `prompt` and return the full response text.
    ///
    /// Exactly one outbound request per call.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Model identity, for logs and the run manifest.
    fn model(&self) -> &str;
}
