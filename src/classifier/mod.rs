use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::info;

use crate::camera::CapturedFrame;
use crate::config::ClassifierConfig;

pub mod providers;

pub use providers::{FaceClassifier, GeminiClassifier, VisionApiClassifier};

/// The literal positive signal in a classification response. Anything else is
/// treated as "no face detected".
pub const FACE_DETECTED_MESSAGE: &str = "Face detected";

/// Outcome of one classification call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    pub face_detected: bool,
    pub message: String,
}

/// Build a classifier from the configured provider name.
pub fn with_provider(
    provider_name: &str,
    config: &ClassifierConfig,
) -> Result<Arc<dyn FaceClassifier>> {
    let classifier: Arc<dyn FaceClassifier> = match provider_name {
        "vision-api" => {
            let endpoint = config
                .api_endpoint
                .clone()
                .context("api_endpoint is required for the vision-api classifier")?;

            Arc::new(VisionApiClassifier::new(
                endpoint,
                config.api_key.clone(),
                config.prompt.clone(),
            ))
        }
        "gemini" => {
            let api_key = config
                .api_key
                .clone()
                .context("api_key is required for the gemini classifier")?;

            Arc::new(GeminiClassifier::new(
                api_key,
                config.model.clone(),
                config.prompt.clone(),
            ))
        }
        _ => bail!(
            "Unknown classifier provider '{}'. Supported providers: vision-api, gemini",
            provider_name
        ),
    };

    info!("Using {} for face classification", classifier.name());

    Ok(classifier)
}

/// Build the classifier from config, or explain what is missing.
pub fn from_config(config: &ClassifierConfig) -> Result<Arc<dyn FaceClassifier>> {
    let provider = config
        .provider
        .as_deref()
        .filter(|p| !p.is_empty())
        .context("No classifier provider configured")?;

    with_provider(provider, config)
}

// ============================================================================
// Provider status and validation
// ============================================================================

/// Status of the configured classifier provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ClassifierStatus {
    /// Provider is configured and ready
    Ready {
        provider: String,
        endpoint: Option<String>,
        model: Option<String>,
    },
    /// Provider is configured but validation failed
    ConfigError { provider: String, error: String },
    /// No provider configured
    NotConfigured,
}

/// Get provider status from a ClassifierConfig.
pub fn status_from_config(config: &ClassifierConfig) -> ClassifierStatus {
    let provider = match &config.provider {
        Some(p) if !p.is_empty() => p.clone(),
        _ => return ClassifierStatus::NotConfigured,
    };

    if let Some(error) = validate_provider_config(&provider, config) {
        return ClassifierStatus::ConfigError { provider, error };
    }

    match with_provider(&provider, config) {
        Ok(_) => ClassifierStatus::Ready {
            provider,
            endpoint: config.api_endpoint.clone(),
            model: config.model.clone(),
        },
        Err(e) => ClassifierStatus::ConfigError {
            provider,
            error: e.to_string(),
        },
    }
}

/// Validate provider configuration and return an error message if invalid.
pub fn validate_provider_config(provider: &str, config: &ClassifierConfig) -> Option<String> {
    match provider {
        "vision-api" => {
            if config.api_endpoint.is_none() {
                Some("API endpoint required for the vision-api classifier".to_string())
            } else {
                None
            }
        }
        "gemini" => {
            if config.api_key.is_none() {
                Some("API key required for the gemini classifier".to_string())
            } else {
                None
            }
        }
        _ => Some(format!("Unknown provider: {}", provider)),
    }
}

/// Classify a frame with the given classifier. Convenience used by the CLI
/// test command; the machine calls the trait directly.
pub async fn classify_frame(
    classifier: &dyn FaceClassifier,
    frame: &CapturedFrame,
) -> Result<Detection> {
    classifier.detect_face(&frame.to_base64()).await
}

#[allow(clippy::type_complexity)]
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;
