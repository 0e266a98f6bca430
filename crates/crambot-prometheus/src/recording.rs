// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric descriptions.

use metrics::describe_counter;

/// Every counter the workspace records, with its description.
pub const METRIC_NAMES: &[(&str, &str)] = &[
    (
        "crambot_inbound_messages_total",
        "Chat events handled, by persona",
    ),
    (
        "crambot_webhook_updates_total",
        "Webhook deliveries, by persona and outcome",
    ),
    (
        "crambot_tenant_cache_lookups_total",
        "Tenant snapshot lookups, by answering tier",
    ),
    (
        "crambot_rate_limited_total",
        "Denied admissions, by scope",
    ),
    (
        "crambot_telegram_sends_total",
        "Telegram API calls, by persona and outcome",
    ),
    (
        "crambot_api_calls_total",
        "Business API calls, by module and outcome",
    ),
    (
        "crambot_classification_failures_total",
        "Intent classifications that fell back to unknown or keywords",
    ),
    (
        "crambot_pending_actions_total",
        "Pending action lifecycle events",
    ),
    (
        "crambot_crossbot_requests_total",
        "Cross-bot request lifecycle events",
    ),
    ("crambot_broadcast_jobs_total", "Broadcast jobs queued"),
    (
        "crambot_broadcast_sends_total",
        "Broadcast deliveries, by outcome",
    ),
];

/// Registers all descriptions. Called once after the recorder is installed.
pub fn register_metrics() {
    for (name, help) in METRIC_NAMES {
        describe_counter!(*name, *help);
    }
}
