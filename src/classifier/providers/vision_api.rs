use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use super::FaceClassifier;
use crate::classifier::{BoxFuture, Detection, FACE_DETECTED_MESSAGE};

const DEFAULT_PROMPT: &str = "Detect whether this image contains a human face. \
     Respond with the exact phrase \"Face detected\" if one is present.";

#[derive(Debug, Serialize)]
struct ClassifyPayload<'a> {
    prompt: &'a str,
    /// Base64-encoded still image.
    image: &'a str,
}

#[derive(Debug, Serialize)]
struct GeneratePayload<'a> {
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct ClassifyResponse {
    status: String,
    message: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
    code: Option<String>,
}

/// Classifier speaking the hosted vision endpoint contract: a prompt plus a
/// base64 image in, `{status, message}` out, where the message literal
/// "Face detected" is the positive signal.
pub struct VisionApiClassifier {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    prompt: String,
}

impl VisionApiClassifier {
    pub fn new(endpoint: String, api_key: Option<String>, prompt: Option<String>) -> Self {
        info!("Initialized vision-api classifier with endpoint: {}", endpoint);

        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
            prompt: prompt.unwrap_or_else(|| DEFAULT_PROMPT.to_string()),
        }
    }

    fn request(&self, json: &impl Serialize) -> reqwest::RequestBuilder {
        let mut req = self.client.post(&self.endpoint).json(json);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        req
    }

    async fn send(&self, json: &impl Serialize) -> Result<String> {
        let response = self
            .request(json)
            .send()
            .await
            .context("Failed to send request to vision API")?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .context("Failed to read response body")?;

        if !status.is_success() {
            error!(
                "Vision API request failed with status {}: {}",
                status, response_text
            );

            if let Ok(error_response) = serde_json::from_str::<ErrorResponse>(&response_text) {
                return Err(anyhow::anyhow!(
                    "Vision API error: {} (code: {:?})",
                    error_response.error.message,
                    error_response.error.code
                ));
            }

            return Err(anyhow::anyhow!(
                "Vision API request failed with status {}: {}",
                status,
                response_text
            ));
        }

        Ok(response_text)
    }
}

/// Interpret a classification response body. A parse failure is a hard error;
/// a well-formed body that does not carry the positive literal is a negative.
fn parse_detection(body: &str) -> Result<Detection> {
    let response: ClassifyResponse =
        serde_json::from_str(body).context("Failed to parse classification response")?;

    let face_detected =
        response.status == "success" && response.message == FACE_DETECTED_MESSAGE;

    Ok(Detection {
        face_detected,
        message: response.message,
    })
}

impl FaceClassifier for VisionApiClassifier {
    fn name(&self) -> &'static str {
        "Vision API"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn detect_face<'a>(&'a self, image_base64: &'a str) -> BoxFuture<'a, Detection> {
        Box::pin(async move {
            debug!("Classifying frame via vision API ({} b64 bytes)", image_base64.len());

            let body = ClassifyPayload {
                prompt: &self.prompt,
                image: image_base64,
            };

            let response_text = self.send(&body).await?;
            let detection = parse_detection(&response_text)?;

            info!(
                "Classification complete: face_detected={} message={:?}",
                detection.face_detected, detection.message
            );

            Ok(detection)
        })
    }

    fn generate<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, String> {
        Box::pin(async move {
            let body = GeneratePayload { prompt };
            let response_text = self.send(&body).await?;

            // Generation responses reuse the same envelope; the completion
            // rides in `message`.
            let response: ClassifyResponse = serde_json::from_str(&response_text)
                .context("Failed to parse generation response")?;

            Ok(response.message.trim().to_string())
        })
    }
}
