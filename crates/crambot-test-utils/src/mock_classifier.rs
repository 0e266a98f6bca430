// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock intent classifier with queued results.
//!
//! Results are popped from a FIFO queue. When the queue is empty the
//! classifier answers `unknown` with a clarification question.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crambot_core::types::{AdapterType, HealthStatus, IntentResult, Params};
use crambot_core::{ClassifierContext, CrambotError, IntentClassifier, PluginAdapter};

pub struct MockClassifier {
    queue: Arc<Mutex<VecDeque<Result<IntentResult, String>>>>,
    seen: Arc<Mutex<Vec<(String, ClassifierContext)>>>,
}

impl MockClassifier {
    pub fn new() -> Self {
        Self {
            queue: Arc::new(Mutex::new(VecDeque::new())),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queues a confident result for `intent` with the given params.
    pub async fn push_intent(&self, intent: &str, params: serde_json::Value) {
        let params: Params = match params {
            serde_json::Value::Object(map) => map,
            _ => Params::new(),
        };
        self.push(IntentResult {
            intent: intent.to_string(),
            confidence: 0.95,
            params,
            need_clarification: false,
            clarification_question: None,
            reply: None,
        })
        .await;
    }

    pub async fn push(&self, result: IntentResult) {
        self.queue.lock().await.push_back(Ok(result));
    }

    /// Queues a provider failure.
    pub async fn push_error(&self, message: &str) {
        self.queue.lock().await.push_back(Err(message.to_string()));
    }

    /// Texts and contexts passed to `classify`, oldest first.
    pub async fn seen(&self) -> Vec<(String, ClassifierContext)> {
        self.seen.lock().await.clone()
    }
}

impl Default for MockClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockClassifier {
    fn name(&self) -> &str {
        "mock-classifier"
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
impl IntentClassifier for MockClassifier {
    async fn classify(
        &self,
        text: &str,
        context: &ClassifierContext,
    ) -> Result<IntentResult, CrambotError> {
        self.seen
            .lock()
            .await
            .push((text.to_string(), context.clone()));
        match self.queue.lock().await.pop_front() {
            Some(Ok(result)) => Ok(result),
            Some(Err(message)) => Err(CrambotError::Provider {
                message,
                source: None,
            }),
            None => Ok(IntentResult::unknown("抱歉，我沒聽懂，可以再說一次嗎？")),
        }
    }
}
