// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Downstream business API trait.

use async_trait::async_trait;

use crate::traits::adapter::PluginAdapter;
use crate::types::{ApiRequest, ApiResponse};

/// Client for the per-module business APIs.
///
/// Transport failures are folded into [`ApiResponse::Failure`], so callers
/// always receive a closed result.
#[async_trait]
pub trait BusinessApi: PluginAdapter {
    async fn call(&self, request: ApiRequest) -> ApiResponse;
}
