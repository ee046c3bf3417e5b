use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use super::FaceClassifier;
use crate::classifier::{BoxFuture, Detection, FACE_DETECTED_MESSAGE};

const DEFAULT_MODEL: &str = "gemini-1.5-flash";
const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

const DEFAULT_PROMPT: &str = "Look at this image and determine whether it contains a \
     human face. If it does, reply with exactly: Face detected. \
     Otherwise briefly describe what you see instead.";

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
enum Part {
    Text(String),
    InlineData(InlineData),
}

#[derive(Debug, Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

/// Classifier backed by a hosted generative model speaking the
/// `generateContent` shape: a text part plus an inline image part in, free
/// text out, compared against the positive literal.
pub struct GeminiClassifier {
    client: reqwest::Client,
    api_key: String,
    model: String,
    prompt: String,
}

impl GeminiClassifier {
    pub fn new(api_key: String, model: Option<String>, prompt: Option<String>) -> Self {
        let model = model.unwrap_or_else(|| DEFAULT_MODEL.to_string());
        info!("Initialized gemini classifier with model: {}", model);

        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            prompt: prompt.unwrap_or_else(|| DEFAULT_PROMPT.to_string()),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/{}:generateContent", API_BASE, self.model)
    }

    async fn generate_content(&self, parts: Vec<Part>) -> Result<String> {
        let body = GenerateContentRequest {
            contents: vec![Content { parts }],
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .context("Failed to send request to generative endpoint")?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .context("Failed to read response body")?;

        if !status.is_success() {
            error!(
                "Generative endpoint request failed with status {}: {}",
                status, response_text
            );
            return Err(anyhow!(
                "Generative endpoint request failed with status {}",
                status
            ));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&response_text)
            .context("Failed to parse generateContent response")?;

        extract_text(&parsed)
    }
}

fn extract_text(response: &GenerateContentResponse) -> Result<String> {
    let text = response
        .candidates
        .first()
        .and_then(|c| c.content.parts.first())
        .and_then(|p| p.text.as_deref())
        .ok_or_else(|| anyhow!("Response contained no text candidate"))?;

    Ok(text.trim().to_string())
}

/// Model output is free text; the positive literal at the start of the answer
/// is the detection signal.
fn detection_from_text(text: String) -> Detection {
    Detection {
        face_detected: text.starts_with(FACE_DETECTED_MESSAGE),
        message: text,
    }
}

impl FaceClassifier for GeminiClassifier {
    fn name(&self) -> &'static str {
        "Gemini"
    }

    fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }

    fn detect_face<'a>(&'a self, image_base64: &'a str) -> BoxFuture<'a, Detection> {
        Box::pin(async move {
            debug!("Classifying frame via {} model", self.model);

            let parts = vec![
                Part::Text(self.prompt.clone()),
                Part::InlineData(InlineData {
                    mime_type: "image/jpeg".to_string(),
                    data: image_base64.to_string(),
                }),
            ];

            let text = self.generate_content(parts).await?;
            let detection = detection_from_text(text);

            info!(
                "Classification complete: face_detected={}",
                detection.face_detected
            );

            Ok(detection)
        })
    }

    fn generate<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, String> {
        Box::pin(async move {
            self.generate_content(vec![Part::Text(prompt.to_string())])
                .await
        })
    }
}
