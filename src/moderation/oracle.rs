use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::moderation::analysis::{parse_analysis, ImageAnalysis, UNCONFIGURED_REASON};
use crate::moderation::policy::moderation_prompt;

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const MARKETPLACE_NAME: &str = "Kloset Kifayah";

/// Raw image handed to the classifier
#[derive(Debug, Clone)]
pub struct ImageInput {
    pub bytes: Bytes,
    pub mime_type: String,
}

/// Classifies one image against the moderation policy.
///
/// Infallible by contract: transport and parse problems come back as a
/// rejected [`ImageAnalysis`].
#[async_trait]
pub trait ImageClassifier: Send + Sync {
    async fn classify(&self, image: &ImageInput) -> ImageAnalysis;
}

#[derive(Debug, Error)]
enum OracleError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: &'a str },
    InlineData { inline_data: InlineData<'a> },
}

#[derive(Serialize)]
struct InlineData<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<TextPart>,
}

#[derive(Deserialize)]
struct TextPart {
    text: Option<String>,
}

/// Gemini `generateContent` client
pub struct GeminiClassifier {
    client: Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
    prompt: String,
    bypass_unconfigured: bool,
}

impl GeminiClassifier {
    pub fn with_timeout(
        api_key: Option<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            model: model.into(),
            base_url: GEMINI_BASE_URL.to_string(),
            prompt: moderation_prompt(MARKETPLACE_NAME),
            bypass_unconfigured: true,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::with_timeout(
            config.gemini_api_key.clone(),
            config.gemini_model.clone(),
            config.http_timeout,
        )?
        .with_base_url(&config.gemini_base_url)
        .with_bypass_unconfigured(config.moderation_bypass_unconfigured))
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Whether a missing API key approves (`true`) or rejects (`false`) every image
    pub fn with_bypass_unconfigured(mut self, bypass: bool) -> Self {
        self.bypass_unconfigured = bypass;
        self
    }

    async fn generate(&self, api_key: &str, image: &ImageInput) -> Result<String, OracleError> {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text { text: &self.prompt },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: &image.mime_type,
                            data: STANDARD.encode(&image.bytes),
                        },
                    },
                ],
            }],
        };

        let start = std::time::Instant::now();
        let response = self
            .client
            .post(format!("{}/models/{}:generateContent", self.base_url, self.model))
            .header("x-goog-api-key", api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| OracleError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(OracleError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| OracleError::Parse(e.to_string()))?;

        let text: String = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .ok_or_else(|| OracleError::Parse("No candidates in response".into()))?;

        debug!(
            model = %self.model,
            duration_ms = start.elapsed().as_millis() as u64,
            response = %text,
            "Gemini moderation response"
        );
        Ok(text)
    }
}

#[async_trait]
impl ImageClassifier for GeminiClassifier {
    async fn classify(&self, image: &ImageInput) -> ImageAnalysis {
        let Some(api_key) = self.api_key.as_deref() else {
            warn!("Gemini API key not configured, skipping image analysis");
            return if self.bypass_unconfigured {
                ImageAnalysis::skipped()
            } else {
                ImageAnalysis::rejected(UNCONFIGURED_REASON)
            };
        };

        match self.generate(api_key, image).await {
            Ok(text) => {
                let analysis = parse_analysis(&text);
                info!(
                    approved = analysis.is_approved,
                    confidence = analysis.confidence,
                    category = ?analysis.category,
                    "Image analyzed"
                );
                analysis
            }
            Err(e) => {
                error!(error = %e, "Image analysis failed");
                ImageAnalysis::rejected(format!("Analysis error: {}", e))
            }
        }
    }
}
