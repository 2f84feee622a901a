//! Model provider implementations.

pub mod ollama;

pub use ollama::OllamaProvider;

use crate::error::{ClassifierError, Result};
use crate::provider::ModelProvider;
use screenguard_core::ClassifierConfig;
use std::sync::Arc;

/// Build the provider named by `config`.
///
/// Returns `Ok(None)` when the model-backed classifier is disabled, in which
/// case detection runs on pattern fallback only.
pub fn from_config(config: &ClassifierConfig) -> Result<Option<Arc<dyn ModelProvider>>> {
    if !config.use_ai {
        tracing::info!("Model-backed classification disabled by configuration");
        return Ok(None);
    }

    match config.provider.trim().to_ascii_lowercase().as_str() {
        "none" | "" => Ok(None),
        "ollama" => {
            let provider = OllamaProvider::with_url(&config.ollama_url, &config.model)?
                .with_temperature(config.temperature);
            Ok(Some(Arc::new(provider)))
        }
        other => Err(ClassifierError::Unavailable {
            provider: other.to_string(),
            reason: "unknown provider".to_string(),
        }),
    }
}
