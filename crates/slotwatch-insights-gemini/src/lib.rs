//! Gemini-backed [`TextSummarizer`] implementation.
//!
//! Boundary glue only: builds the prompt from the derived alert digest,
//! calls the `generateContent` endpoint with a bounded timeout, and maps
//! every failure path to [`AlertError::ExternalService`]. Callers absorb
//! that error; nothing here touches stored data.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use slotwatch_core::{AlertDigest, AlertError, TextSummarizer};
use tracing::warn;

/// Default Gemini model used for trend summaries.
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiSummarizer {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiSummarizer {
    /// Builds a summarizer with the given API key and request timeout.
    ///
    /// # Errors
    /// Returns [`AlertError::ExternalService`] when the HTTP client
    /// cannot be constructed.
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self, AlertError> {
        let client = Client::builder().timeout(timeout).build().map_err(|err| {
            AlertError::ExternalService(format!("failed to build http client: {err}"))
        })?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: GEMINI_BASE_URL.to_string(),
        })
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl TextSummarizer for GeminiSummarizer {
    fn summarize(&self, digest: &[AlertDigest]) -> Result<String, AlertError> {
        if self.api_key.is_empty() {
            return Err(AlertError::ExternalService(
                "no api key configured".to_string(),
            ));
        }

        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: build_prompt(digest)?,
                }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.7,
                top_p: 0.95,
            },
        };

        let response = self.client.post(url).json(&request).send().map_err(|err| {
            warn!(model = %self.model, "gemini request failed: {err}");
            AlertError::ExternalService(format!("gemini request failed: {err}"))
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!(model = %self.model, %status, "gemini returned an error status");
            return Err(AlertError::ExternalService(format!(
                "gemini returned status {status}"
            )));
        }

        let parsed: GenerateContentResponse = response.json().map_err(|err| {
            warn!(model = %self.model, "gemini response was malformed: {err}");
            AlertError::ExternalService(format!("gemini response was malformed: {err}"))
        })?;

        extract_text(parsed)
    }
}

fn build_prompt(digest: &[AlertDigest]) -> Result<String, AlertError> {
    let data = serde_json::to_string(digest).map_err(|err| {
        AlertError::ExternalService(format!("failed to serialize alert digest: {err}"))
    })?;

    Ok(format!(
        "Analyze the following visa slot alert data for \"The Flying Panda\" travel agency. \
         Provide a concise executive summary (3-4 sentences) about current availability trends, \
         identifying high-demand hotspots or potential bottlenecks. \
         Format the response as clear professional advice for the internal team.\n\n\
         Data: {data}"
    ))
}

fn extract_text(response: GenerateContentResponse) -> Result<String, AlertError> {
    response
        .candidates
        .into_iter()
        .flatten()
        .next()
        .and_then(|candidate| candidate.content)
        .and_then(|content| content.parts.into_iter().next())
        .map(|part| part.text)
        .ok_or_else(|| {
            AlertError::ExternalService("gemini response contained no text".to_string())
        })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: String,
}
