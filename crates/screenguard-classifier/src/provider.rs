//! Model provider capability and prompt types.
//!
//! Callers never probe for a model object; they ask a `ModelProvider` for
//! its `availability()` and, when usable, create a `ModelSession`.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Availability of the underlying model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    /// Model can be used immediately
    Ready,
    /// Model exists but must be downloaded first
    Downloadable,
    /// Model cannot be used in this environment
    Unavailable,
}

/// Trait for model backends able to run classification prompts.
///
/// Provider implementations should be thread-safe (Send + Sync) for use in
/// async contexts.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Query whether the model can be used.
    async fn availability(&self) -> Availability;

    /// Create a prompting session, downloading the model if required.
    ///
    /// # Errors
    /// Returns error if the model is unavailable or session creation fails.
    async fn create_session(&self, options: SessionOptions) -> Result<Arc<dyn ModelSession>>;

    /// Get the capabilities of this provider.
    fn capabilities(&self) -> ProviderCapabilities;

    /// Get the unique identifier for this provider.
    fn provider_id(&self) -> &str;
}

/// A live model session.
///
/// Sessions carry no per-call scratch state, so concurrent prompts are safe.
#[async_trait]
pub trait ModelSession: Send + Sync {
    /// Run a prompt and return the raw model output.
    async fn prompt(&self, request: PromptRequest) -> Result<String>;
}

/// Capabilities of a model provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderCapabilities {
    /// Model name or identifier
    pub model_name: String,

    /// Whether this is a local provider (no data leaves the machine)
    pub is_local: bool,

    /// Supports image inputs
    pub supports_vision: bool,

    /// Supports JSON-schema constrained output
    pub supports_structured_output: bool,
}

/// Options used when a session is created.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionOptions {
    /// System prompt applied to every call in the session
    pub system_prompt: String,

    /// Temperature for sampling
    pub temperature: Option<f32>,
}

impl SessionOptions {
    /// Create options with a system prompt.
    #[must_use]
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            temperature: None,
        }
    }

    /// Set the temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// A single prompt sent to a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptRequest {
    /// Prompt text
    pub text: String,

    /// Raw image payloads attached to the prompt
    #[serde(skip)]
    pub images: Vec<Vec<u8>>,

    /// JSON schema the response must follow
    pub response_schema: Option<serde_json::Value>,
}

impl PromptRequest {
    /// Create a text-only prompt.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            images: Vec::new(),
            response_schema: None,
        }
    }

    /// Attach an image payload.
    #[must_use]
    pub fn with_image(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.images.push(bytes.into());
        self
    }

    /// Constrain the response to a JSON schema.
    #[must_use]
    pub fn with_schema(mut self, schema: serde_json::Value) -> Self {
        self.response_schema = Some(schema);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_request_builder() {
        let req = PromptRequest::new("TEXT TO ANALYZE:\nhello")
            .with_image(vec![0x89, 0x50, 0x4e, 0x47])
            .with_schema(serde_json::json!({"type": "object"}));

        assert_eq!(req.images.len(), 1);
        assert_eq!(req.images[0][0], 0x89);
        assert!(req.response_schema.is_some());
    }

    #[test]
    fn test_session_options_builder() {
        let opts = SessionOptions::new("You are a PII detector").with_temperature(0.0);
        assert_eq!(opts.system_prompt, "You are a PII detector");
        assert_eq!(opts.temperature, Some(0.0));
    }

    #[test]
    fn test_availability_serialization() {
        let json = serde_json::to_string(&Availability::Downloadable).expect("serialize");
        assert_eq!(json, "\"downloadable\"");
    }
}
