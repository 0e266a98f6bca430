// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Detached per-tenant usage counting.

use std::sync::Arc;

use crambot_core::types::UsageKind;
use crambot_core::{BackgroundTasks, StorageAdapter};

use crate::calendar;

/// Bumps today's `kind` counter for `tenant_id` without waiting for the store.
pub fn record_usage(
    tasks: &BackgroundTasks,
    store: &Arc<dyn StorageAdapter>,
    tenant_id: &str,
    kind: UsageKind,
) {
    let store = store.clone();
    let tenant_id = tenant_id.to_string();
    let day = calendar::iso(calendar::today());
    tasks.spawn_detached("usage_increment", async move {
        store.increment_usage(&tenant_id, kind, &day).await
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crambot_test_utils::TestHarness;

    #[tokio::test]
    async fn counts_land_in_current_month() {
        let h = TestHarness::new().await;
        let store = h.store();
        record_usage(&h.tasks, &store, "t1", UsageKind::AiCalls);
        record_usage(&h.tasks, &store, "t1", UsageKind::ApiCalls);
        record_usage(&h.tasks, &store, "t1", UsageKind::ApiCalls);
        h.tasks.settle().await;

        let month = calendar::today().format("%Y-%m").to_string();
        let summary = store.usage_summary("t1", &month).await.unwrap();
        assert_eq!(summary.ai_calls, 1);
        assert_eq!(summary.api_calls, 2);
    }
}
