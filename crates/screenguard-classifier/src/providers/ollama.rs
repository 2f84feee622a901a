//! Ollama local model provider.

use crate::error::{ClassifierError, Result};
use crate::provider::{
    Availability, ModelProvider, ModelSession, PromptRequest, ProviderCapabilities,
    SessionOptions,
};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const PROVIDER_ID: &str = "ollama";

/// Ollama local model provider.
///
/// Connects to a local Ollama instance, so page text and images never leave
/// the machine.
pub struct OllamaProvider {
    model: String,
    client: Client,
    base_url: String,
    temperature: Option<f32>,
}

impl OllamaProvider {
    /// Create a provider for `model` on the default local endpoint.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created.
    pub fn with_model(model: impl Into<String>) -> Result<Self> {
        Self::with_url("http://localhost:11434", model)
    }

    /// Create a provider with custom URL and model.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created.
    pub fn with_url(base_url: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| ClassifierError::Internal(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            model: model.into(),
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            temperature: None,
        })
    }

    /// Default sampling temperature for sessions that do not set one.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Whether a tag listed by the server refers to the configured model.
    ///
    /// Ollama reports `llama3.2-vision:latest` for a model pulled as
    /// `llama3.2-vision`.
    fn is_model_tag(&self, tag: &str) -> bool {
        if tag == self.model {
            return true;
        }
        let Some(rest) = tag.strip_prefix(self.model.as_str()) else {
            return false;
        };
        rest == ":latest" || (!self.model.contains(':') && rest.starts_with(':'))
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(Duration::from_secs(5))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClassifierError::ApiError {
                provider: PROVIDER_ID.to_string(),
                status: status.as_u16(),
                message: "failed to list models".to_string(),
            });
        }

        let tags: TagsResponse = response.json().await.map_err(|e| ClassifierError::Parse {
            provider: PROVIDER_ID.to_string(),
            message: format!("failed to parse model list: {e}"),
        })?;

        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    async fn pull_model(&self) -> Result<()> {
        tracing::info!("Pulling Ollama model {}", self.model);

        let response = self
            .client
            .post(format!("{}/api/pull", self.base_url))
            .json(&PullRequest {
                name: self.model.clone(),
                stream: false,
            })
            .timeout(Duration::from_secs(1800))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClassifierError::ApiError {
                provider: PROVIDER_ID.to_string(),
                status: status.as_u16(),
                message: error_text,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ModelProvider for OllamaProvider {
    async fn availability(&self) -> Availability {
        match self.list_models().await {
            Ok(tags) if tags.iter().any(|t| self.is_model_tag(t)) => Availability::Ready,
            Ok(_) => Availability::Downloadable,
            Err(e) => {
                tracing::debug!("Ollama not reachable at {}: {}", self.base_url, e);
                Availability::Unavailable
            }
        }
    }

    async fn create_session(&self, options: SessionOptions) -> Result<Arc<dyn ModelSession>> {
        match self.availability().await {
            Availability::Ready => {}
            Availability::Downloadable => self.pull_model().await?,
            Availability::Unavailable => {
                return Err(ClassifierError::Unavailable {
                    provider: PROVIDER_ID.to_string(),
                    reason: format!("no Ollama server at {}", self.base_url),
                })
            }
        }

        Ok(Arc::new(OllamaSession {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            system_prompt: options.system_prompt,
            temperature: options.temperature.or(self.temperature),
        }))
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            model_name: self.model.clone(),
            is_local: true,
            supports_vision: self.model.contains("vision") || self.model.contains("llava"),
            supports_structured_output: true,
        }
    }

    fn provider_id(&self) -> &str {
        PROVIDER_ID
    }
}

/// A prompting session against one Ollama model.
struct OllamaSession {
    client: Client,
    base_url: String,
    model: String,
    system_prompt: String,
    temperature: Option<f32>,
}

impl OllamaSession {
    fn to_api_request(&self, request: &PromptRequest) -> GenerateRequest {
        GenerateRequest {
            model: self.model.clone(),
            prompt: request.text.clone(),
            system: (!self.system_prompt.is_empty()).then(|| self.system_prompt.clone()),
            images: (!request.images.is_empty())
                .then(|| request.images.iter().map(|img| STANDARD.encode(img)).collect()),
            format: request.response_schema.clone(),
            stream: false,
            options: GenerateOptions {
                temperature: self.temperature,
            },
        }
    }
}

#[async_trait]
impl ModelSession for OllamaSession {
    async fn prompt(&self, request: PromptRequest) -> Result<String> {
        let api_request = self.to_api_request(&request);

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&api_request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClassifierError::ApiError {
                provider: PROVIDER_ID.to_string(),
                status: status.as_u16(),
                message: error_text,
            });
        }

        let api_response: GenerateResponse =
            response.json().await.map_err(|e| ClassifierError::Parse {
                provider: PROVIDER_ID.to_string(),
                message: format!("Failed to parse response: {e}"),
            })?;

        Ok(api_response.response)
    }
}

// Ollama API types

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

#[derive(Debug, Serialize)]
struct PullRequest {
    name: String,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    images: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<serde_json::Value>,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Default, Serialize)]
struct GenerateOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts;

    fn session() -> OllamaSession {
        OllamaSession {
            client: Client::new(),
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.2-vision".to_string(),
            system_prompt: prompts::TEXT_SYSTEM_PROMPT.to_string(),
            temperature: Some(0.0),
        }
    }

    #[test]
    fn test_provider_with_custom_url() {
        let provider =
            OllamaProvider::with_url("http://custom:11434/", "llava").expect("create provider");
        assert_eq!(provider.base_url, "http://custom:11434");
        assert_eq!(provider.model, "llava");
        assert_eq!(provider.provider_id(), "ollama");
    }

    #[test]
    fn test_capabilities() {
        let provider = OllamaProvider::with_model("llama3.2-vision").expect("create provider");
        let caps = provider.capabilities();
        assert!(caps.is_local);
        assert!(caps.supports_vision);
        assert!(caps.supports_structured_output);

        let text_only = OllamaProvider::with_model("llama3.1:8b").expect("create provider");
        assert!(!text_only.capabilities().supports_vision);
    }

    #[test]
    fn test_model_tag_matching() {
        let provider = OllamaProvider::with_model("llama3.2-vision").expect("create provider");
        assert!(provider.is_model_tag("llama3.2-vision"));
        assert!(provider.is_model_tag("llama3.2-vision:latest"));
        assert!(provider.is_model_tag("llama3.2-vision:11b"));
        assert!(!provider.is_model_tag("llama3.2"));

        let pinned = OllamaProvider::with_model("llama3.1:8b").expect("create provider");
        assert!(pinned.is_model_tag("llama3.1:8b"));
        assert!(!pinned.is_model_tag("llama3.1:70b"));
    }

    #[test]
    fn test_text_request_conversion() {
        let request = PromptRequest::new(prompts::text_prompt("hello"))
            .with_schema(prompts::pii_schema());
        let api_request = session().to_api_request(&request);

        assert_eq!(api_request.model, "llama3.2-vision");
        assert!(!api_request.stream);
        assert!(api_request.images.is_none());
        assert!(api_request.format.is_some());
        assert!(api_request.system.is_some());

        let json = serde_json::to_value(&api_request).expect("serialize");
        assert_eq!(json["prompt"], "TEXT TO ANALYZE:\nhello");
        assert_eq!(json["options"]["temperature"], 0.0);
    }

    #[test]
    fn test_image_request_is_base64() {
        let request = PromptRequest::new(prompts::IMAGE_PROMPT).with_image(b"abc".to_vec());
        let api_request = session().to_api_request(&request);

        assert_eq!(api_request.images, Some(vec!["YWJj".to_string()]));
    }

    #[test]
    fn test_tags_response_parsing() {
        let raw = r#"{"models":[{"name":"llama3.2-vision:latest","size":7900000000}]}"#;
        let tags: TagsResponse = serde_json::from_str(raw).expect("parse tags");
        assert_eq!(tags.models[0].name, "llama3.2-vision:latest");
    }
}
