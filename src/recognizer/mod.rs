//! Speech recognition for the spoken check-in name.
//!
//! One recognition session = one fixed microphone window posted to a hosted
//! transcription endpoint, normalized into a person name.

use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::RecognizerConfig;

pub mod mic;

pub trait SpeechRecognizer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether this platform can capture speech at all.
    fn is_available(&self) -> bool;

    /// Listen once and return the final transcript, normalized into a name.
    /// An empty transcript is an error, never an empty success.
    fn recognize<'a>(&'a self) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;
}

#[derive(Debug, Serialize)]
struct TranscriptionPayload {
    content: String, //base64 WAV
    language: String,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    result: TranscriptionResult,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResult {
    text: String,
}

/// Turns a raw transcript into a person name: collapses whitespace and strips
/// the punctuation transcription engines like to append.
pub struct NameNormalizer {
    whitespace: Regex,
}

impl NameNormalizer {
    pub fn new() -> Result<Self> {
        let whitespace = Regex::new(r"\s+")?;
        Ok(Self { whitespace })
    }

    pub fn normalize(&self, transcript: &str) -> String {
        let collapsed = self.whitespace.replace_all(transcript.trim(), " ");
        collapsed
            .trim_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace())
            .to_string()
    }
}

/// Recognizer that records the default microphone and posts the audio to a
/// transcription endpoint.
pub struct MicRecognizer {
    client: reqwest::Client,
    endpoint: String,
    language: String,
    listen_window: Duration,
    sample_rate: u32,
    normalizer: NameNormalizer,
}

impl MicRecognizer {
    pub fn from_config(config: &RecognizerConfig) -> Result<Self> {
        let endpoint = config
            .api_endpoint
            .clone()
            .context("api_endpoint is required for the speech recognizer")?;

        info!("Initialized speech recognizer with endpoint: {}", endpoint);

        Ok(Self {
            client: reqwest::Client::new(),
            endpoint,
            language: config.language.clone().unwrap_or_else(|| "en".to_string()),
            listen_window: Duration::from_secs(config.listen_seconds.max(1)),
            sample_rate: config.sample_rate,
            normalizer: NameNormalizer::new()?,
        })
    }

    async fn transcribe(&self, samples: Vec<f32>) -> Result<String> {
        let scratch = tempfile::Builder::new()
            .prefix("rollcall-voice-")
            .suffix(".wav")
            .tempfile()
            .context("Failed to create scratch file for voice capture")?;

        mic::write_wav(scratch.path(), &samples, self.sample_rate)?;

        let bytes = tokio::fs::read(scratch.path())
            .await
            .context("Failed to read captured audio")?;

        let body = TranscriptionPayload {
            content: BASE64.encode(&bytes),
            language: self.language.clone(),
        };

        debug!("Sending {} audio bytes for transcription", bytes.len());

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .context("Failed to send request to transcription endpoint")?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .context("Failed to read response body")?;

        if !status.is_success() {
            bail!(
                "Transcription request failed with status {}: {}",
                status,
                response_text
            );
        }

        let transcription: TranscriptionResponse = serde_json::from_str(&response_text)
            .context("Failed to parse transcription response")?;

        Ok(transcription.result.text)
    }
}

impl SpeechRecognizer for MicRecognizer {
    fn name(&self) -> &'static str {
        "Microphone"
    }

    fn is_available(&self) -> bool {
        mic::input_available()
    }

    fn recognize<'a>(&'a self) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(async move {
            if !self.is_available() {
                bail!("speech capture is not supported on this platform");
            }

            let sample_rate = self.sample_rate;
            let window = self.listen_window;

            info!("Listening for spoken name ({:?} window)", window);

            let samples = tokio::task::spawn_blocking(move || {
                mic::capture_samples(sample_rate, window)
            })
            .await
            .context("Voice capture task failed")??;

            if samples.is_empty() {
                bail!("no audio captured");
            }

            let transcript = self.transcribe(samples).await?;
            let name = self.normalizer.normalize(&transcript);

            if name.is_empty() {
                bail!("no speech detected");
            }

            info!("Recognized name: {}", name);
            Ok(name)
        })
    }
}
