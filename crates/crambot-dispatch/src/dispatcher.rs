// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Routes classified intents to their business endpoints.

use std::sync::Arc;

use crambot_core::BusinessApi;
use crambot_core::types::{ApiRequest, ApiResponse, Params};
use tracing::{info, warn};

use crate::catalog;

pub const UNKNOWN_INTENT: &str = "unknown_intent";
pub const UNKNOWN_INTENT_MESSAGE: &str = "無法處理此指令";

#[derive(Clone)]
pub struct Dispatcher {
    api: Arc<dyn BusinessApi>,
}

impl Dispatcher {
    pub fn new(api: Arc<dyn BusinessApi>) -> Self {
        Self { api }
    }

    /// The underlying business API, for calls outside the route table.
    pub fn api(&self) -> &Arc<dyn BusinessApi> {
        &self.api
    }

    /// Executes a query or write intent for `tenant_id`.
    pub async fn execute(&self, intent: &str, params: &Params, tenant_id: &str) -> ApiResponse {
        let Some(route) = catalog::route(intent) else {
            warn!(intent, "no route for intent");
            return ApiResponse::failure(UNKNOWN_INTENT, UNKNOWN_INTENT_MESSAGE);
        };

        info!(intent, tenant_id, module = %route.module, path = route.path, "dispatching intent");
        self.api
            .call(ApiRequest::bot(route.module, route.path, tenant_id, params))
            .await
    }
}
