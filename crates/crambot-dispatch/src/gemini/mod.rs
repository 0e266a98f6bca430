// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Intent classification through the Gemini `generateContent` API.
//!
//! [`GeminiClassifier`] sends the persona's system instruction and the
//! user's text, asks for a JSON document at temperature 0 and parses it
//! into an [`IntentResult`]. Output that does not parse is downgraded to
//! `unknown` with a clarification question; HTTP failures are returned as
//! provider errors so the caller can decide how to degrade.

pub mod prompt;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use crambot_config::model::GeminiConfig;
use crambot_core::types::{AdapterType, HealthStatus, IntentResult};
use crambot_core::{ClassifierContext, CrambotError, IntentClassifier, PluginAdapter};
use reqwest::header::{HeaderMap, HeaderValue};
use tracing::{debug, warn};

use crate::calendar;
use types::{
    ApiErrorResponse, Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig,
};

/// Clarification asked when the model's answer cannot be used.
pub const UNKNOWN_QUESTION: &str = "抱歉，我沒聽懂，可以再說一次嗎？";

#[derive(Debug, Clone)]
pub struct GeminiClassifier {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl GeminiClassifier {
    pub fn new(config: &GeminiConfig) -> Result<Self, CrambotError> {
        let api_key = config
            .api_key
            .as_deref()
            .ok_or_else(|| CrambotError::Config("gemini.api_key is required".into()))?;

        let mut headers = HeaderMap::new();
        let mut key = HeaderValue::from_str(api_key).map_err(|e| {
            CrambotError::Config(format!("invalid Gemini API key header value: {e}"))
        })?;
        key.set_sensitive(true);
        headers.insert("x-goog-api-key", key);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CrambotError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }

    async fn generate(&self, request: &GenerateContentRequest) -> Result<Option<String>, CrambotError> {
        let response = self
            .client
            .post(self.endpoint())
            .json(request)
            .send()
            .await
            .map_err(|e| CrambotError::Provider {
                message: format!("HTTP request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        debug!(status = %status, model = %self.model, "classification response received");
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            let message = match serde_json::from_str::<ApiErrorResponse>(&body) {
                Ok(err) => format!(
                    "Gemini API error ({} {}): {}",
                    err.error.code, err.error.status, err.error.message
                ),
                Err(_) => format!("API returned {status}: {body}"),
            };
            return Err(CrambotError::Provider {
                message,
                source: None,
            });
        }

        let parsed: GenerateContentResponse =
            serde_json::from_str(&body).map_err(|e| CrambotError::Provider {
                message: format!("failed to parse API response: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(parsed.text())
    }
}

/// Parses the model's JSON answer. Returns `None` when it is unusable.
pub fn parse_intent(text: &str) -> Option<IntentResult> {
    let trimmed = text.trim();
    let json = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed);

    let mut result: IntentResult = serde_json::from_str(json.trim()).ok()?;
    if result.intent.trim().is_empty() {
        return None;
    }
    if result.need_clarification
        && result
            .clarification_question
            .as_deref()
            .is_none_or(|q| q.trim().is_empty())
    {
        result.clarification_question = Some(UNKNOWN_QUESTION.to_string());
    }
    Some(result)
}

/// Classifies `text`, degrading any provider failure to `unknown`.
pub async fn classify_or_unknown(
    classifier: &dyn IntentClassifier,
    text: &str,
    context: &ClassifierContext,
) -> IntentResult {
    match classifier.classify(text, context).await {
        Ok(result) => result,
        Err(e) => {
            warn!(classifier = classifier.name(), error = %e, "classification failed");
            metrics::counter!("crambot_classification_failures_total").increment(1);
            IntentResult::unknown(UNKNOWN_QUESTION)
        }
    }
}

#[async_trait]
impl PluginAdapter for GeminiClassifier {
    fn name(&self) -> &str {
        "gemini"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Classifier
    }

    async fn health_check(&self) -> Result<HealthStatus, CrambotError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), CrambotError> {
        Ok(())
    }
}

#[async_trait]
impl IntentClassifier for GeminiClassifier {
    async fn classify(
        &self,
        text: &str,
        context: &ClassifierContext,
    ) -> Result<IntentResult, CrambotError> {
        let request = GenerateContentRequest {
            contents: vec![Content::user(text)],
            system_instruction: Content::system(prompt::system_prompt(context, calendar::today())),
            generation_config: GenerationConfig::deterministic_json(),
        };

        let answer = self.generate(&request).await?;
        match answer.as_deref().and_then(parse_intent) {
            Some(result) => {
                debug!(intent = %result.intent, confidence = result.confidence, "intent classified");
                Ok(result)
            }
            None => {
                warn!(persona = %context.persona, "unusable classifier output, downgrading to unknown");
                Ok(IntentResult::unknown(UNKNOWN_QUESTION))
            }
        }
    }
}
