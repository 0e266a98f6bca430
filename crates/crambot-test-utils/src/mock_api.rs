// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock business API that records calls and replays scripted responses.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crambot_core::types::{AdapterType, ApiRequest, ApiResponse, HealthStatus};
use crambot_core::{BusinessApi, CrambotError, PluginAdapter};

/// Responses are keyed by request path. Unscripted paths succeed with no
/// message and no data.
pub struct MockBusinessApi {
    calls: Arc<Mutex<Vec<ApiRequest>>>,
    responses: Arc<Mutex<HashMap<String, ApiResponse>>>,
}

impl MockBusinessApi {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            responses: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub async fn respond(&self, path: &str, response: ApiResponse) {
        self.responses
            .lock()
            .await
            .insert(path.to_string(), response);
    }

    /// Scripts a success carrying `message` and `data`.
    pub async fn respond_ok(&self, path: &str, message: &str, data: serde_json::Value) {
        self.respond(
            path,
            ApiResponse::Success {
                message: Some(message.to_string()),
                data: Some(data),
            },
        )
        .await;
    }

    pub async fn calls(&self) -> Vec<ApiRequest> {
        self.calls.lock().await.clone()
    }

    pub async fn calls_to(&self, path: &str) -> Vec<ApiRequest> {
        self.calls
            .lock()
            .await
            .iter()
            .filter(|c| c.path == path)
            .cloned()
            .collect()
    }
}

impl Default for MockBusinessApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockBusinessApi {
    fn name(&self) -> &str {
        "mock-business-api"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::BusinessApi
    }

    async fn health_check(&self) -> Result<HealthStatus, CrambotError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), CrambotError> {
        Ok(())
    }
}

#[async_trait]
impl BusinessApi for MockBusinessApi {
    async fn call(&self, request: ApiRequest) -> ApiResponse {
        let response = self
            .responses
            .lock()
            .await
            .get(&request.path)
            .cloned()
            .unwrap_or(ApiResponse::Success {
                message: None,
                data: None,
            });
        self.calls.lock().await.push(request);
        response
    }
}
