// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prometheus exposition for the `metrics` facade.
//!
//! Components record through `metrics::counter!` and never see the exporter.
//! The binary installs [`PrometheusRecorder`] once and hands its render
//! function to the gateway, which serves it at `GET /metrics`.

pub mod recording;

use async_trait::async_trait;
use crambot_core::types::{AdapterType, HealthStatus};
use crambot_core::{CrambotError, PluginAdapter};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub use recording::{METRIC_NAMES, register_metrics};

/// Process-wide Prometheus recorder.
pub struct PrometheusRecorder {
    handle: PrometheusHandle,
}

impl PrometheusRecorder {
    /// Installs the recorder globally and registers metric descriptions.
    ///
    /// Only one recorder may exist per process; a second install fails.
    pub fn install() -> Result<Self, CrambotError> {
        let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
            CrambotError::Internal(format!("failed to install Prometheus recorder: {e}"))
        })?;
        register_metrics();
        tracing::info!("prometheus recorder installed");
        Ok(Self { handle })
    }

    pub fn handle(&self) -> &PrometheusHandle {
        &self.handle
    }

    /// Current metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

#[async_trait]
impl PluginAdapter for PrometheusRecorder {
    fn name(&self) -> &str {
        "prometheus"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Observability
    }

    async fn health_check(&self) -> Result<HealthStatus, CrambotError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), CrambotError> {
        Ok(())
    }
}
