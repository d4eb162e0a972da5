
use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::config::{Config, GenerationConfig};
use crate::http::{agent_with_timeout, request_with_retry};

const IMAGE_TRANSCRIPTION_PROMPT: &str = "Transcribe all text visible in this image exactly as \
written, keeping code and line breaks. Reply with the text only.";

/// Blocking client for Ollama text generation
#[derive(Debug, Clone)]
pub struct GenerationClient {
    base_url: Url,
    settings: GenerationConfig,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    raw: bool,
    stream: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>,
    options: SamplingOptions,
}

#[derive(Debug, Serialize, PartialEq)]
struct SamplingOptions {
    temperature: f32,
    top_k: u32,
    top_p: f32,
    repeat_penalty: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

impl GenerationClient {
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        let base_url = config
            .ollama_url()
            .context("Failed to generate Ollama URL from config")?;

        Ok(Self {
            base_url,
            settings: config.generation.clone(),
            agent: agent_with_timeout(Duration::from_secs(config.generation.timeout_seconds)),
        })
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.settings.model
    }

    #[inline]
    pub fn vision_model(&self) -> &str {
        &self.settings.vision_model
    }

    /// Complete an already formatted instruction prompt
    #[inline]
    pub fn generate(&self, prompt: &str) -> Result<String> {
        info!(
            "Generating response with {} (prompt length: {})",
            self.settings.model,
            prompt.len()
        );

        let request = GenerateRequest {
            model: &self.settings.model,
            prompt,
            raw: true,
            stream: false,
            images: Vec::new(),
            options: self.sampling_options(),
        };

        self.send(&request).context("Failed to generate response")
    }

    /// Read the text out of an image with the vision model
    #[inline]
    pub fn describe_image(&self, image: &[u8]) -> Result<String> {
        debug!(
            "Transcribing image of {} bytes with {}",
            image.len(),
            self.settings.vision_model
        );

        let request = GenerateRequest {
            model: &self.settings.vision_model,
            prompt: IMAGE_TRANSCRIPTION_PROMPT,
            raw: false,
            stream: false,
            images: vec![STANDARD.encode(image)],
            options: SamplingOptions {
                temperature: 0.0,
                ..self.sampling_options()
            },
        };

        self.send(&request)
            .map(|text| text.trim().to_string())
            .context("Failed to transcribe image")
    }

    fn sampling_options(&self) -> SamplingOptions {
        SamplingOptions {
            temperature: self.settings.temperature,
            top_k: self.settings.top_k,
            top_p: self.settings.top_p,
            repeat_penalty: self.settings.repetition_penalty,
            num_predict: self.settings.max_new_tokens,
        }
    }

    fn send(&self, request: &GenerateRequest<'_>) -> Result<String> {
        let url = self
            .base_url
            .join("/api/generate")
            .context("Failed to build generate URL")?;

        let request_json =
            serde_json::to_string(request).context("Failed to serialize generate request")?;

        let response_text = request_with_retry(url.as_str(), 1, || {
            self.agent
                .post(url.as_str())
                .header("Content-Type", "application/json")
                .send(&request_json)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })?;

        let response: GenerateResponse =
            serde_json::from_str(&response_text).context("Failed to parse generate response")?;

        debug!("Model returned {} characters", response.response.len());
        Ok(response.response)
    }
}
