// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the per-module business APIs.
//!
//! Provides [`BusinessApiClient`], which builds module URLs, attaches the
//! internal key and folds every transport failure into
//! [`ApiResponse::Failure`].

use std::time::Duration;

use async_trait::async_trait;
use crambot_config::model::ApiConfig;
use crambot_core::types::{
    AdapterType, ApiMethod, ApiRequest, ApiResponse, ApiScope, BusinessModule, HealthStatus,
    WireApiResponse,
};
use crambot_core::{BusinessApi, CrambotError, PluginAdapter};
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::Value;
use tracing::{debug, warn};

/// Error code used for every failure that did not come from the API itself.
pub const API_ERROR: &str = "api_error";

#[derive(Debug, Clone)]
pub struct BusinessApiClient {
    client: reqwest::Client,
    manage_url: String,
    inclass_url: String,
    stock_url: String,
}

impl BusinessApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self, CrambotError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = config.internal_api_key.as_deref() {
            let mut value = HeaderValue::from_str(key).map_err(|e| {
                CrambotError::Config(format!("invalid internal API key header value: {e}"))
            })?;
            value.set_sensitive(true);
            headers.insert("x-internal-key", value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CrambotError::Api {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            manage_url: trim_base(&config.manage_url),
            inclass_url: trim_base(&config.inclass_url),
            stock_url: trim_base(&config.stock_url),
        })
    }

    fn base(&self, module: BusinessModule) -> &str {
        match module {
            BusinessModule::Manage => &self.manage_url,
            BusinessModule::Inclass => &self.inclass_url,
            BusinessModule::Stock => &self.stock_url,
        }
    }

    /// Full URL of a request.
    pub fn url_for(&self, request: &ApiRequest) -> String {
        let prefix = match (request.scope, request.module) {
            (ApiScope::Bot, BusinessModule::Manage) => "/api/bot-ext",
            (ApiScope::Bot, _) => "/api/bot",
            (ApiScope::Parent, _) => "/api/parent-ext",
        };
        format!("{}{prefix}{}", self.base(request.module), request.path)
    }

    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, CrambotError> {
        let url = self.url_for(request);
        let mut builder = match request.method {
            ApiMethod::Post => self.client.post(&url).json(&request.body),
            ApiMethod::Get => self.client.get(&url).query(&query_pairs(request)),
        };
        if request.scope == ApiScope::Parent {
            builder = builder.header("x-tenant-id", &request.tenant_id);
        }

        let response = builder.send().await.map_err(|e| CrambotError::Api {
            message: format!("HTTP request failed: {e}"),
            source: Some(Box::new(e)),
        })?;
        let status = response.status();
        debug!(status = %status, url = %url, "business API response received");

        let body = response.text().await.unwrap_or_default();
        // Error statuses usually still carry the `{success:false,...}` envelope.
        match serde_json::from_str::<WireApiResponse>(&body) {
            Ok(wire) => Ok(ApiResponse::from(wire)),
            Err(_) if status.is_success() => Err(CrambotError::Api {
                message: format!("unreadable response body from {url}"),
                source: None,
            }),
            Err(_) => Err(CrambotError::Api {
                message: format!("API returned {status}"),
                source: None,
            }),
        }
    }
}

fn trim_base(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

/// GET bodies travel as query parameters; non-scalar values are skipped.
fn query_pairs(request: &ApiRequest) -> Vec<(String, String)> {
    request
        .body
        .iter()
        .filter_map(|(k, v)| {
            let value = match v {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => return None,
            };
            Some((k.clone(), value))
        })
        .collect()
}

#[async_trait]
impl PluginAdapter for BusinessApiClient {
    fn name(&self) -> &str {
        "business-api"
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
impl BusinessApi for BusinessApiClient {
    async fn call(&self, request: ApiRequest) -> ApiResponse {
        let module = request.module.to_string();
        match self.send(&request).await {
            Ok(response) => {
                let outcome = if response.is_success() { "success" } else { "failure" };
                metrics::counter!("crambot_api_calls_total", "module" => module, "outcome" => outcome)
                    .increment(1);
                response
            }
            Err(e) => {
                warn!(module = %module, path = %request.path, error = %e, "business API call failed");
                metrics::counter!("crambot_api_calls_total", "module" => module, "outcome" => "error")
                    .increment(1);
                ApiResponse::failure(API_ERROR, e.to_string())
            }
        }
    }
}
