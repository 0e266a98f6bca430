// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Every check runs; the caller receives the full list of problems.

use crate::diagnostic::ConfigError;
use crate::model::{CrambotConfig, KvBackend};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
pub fn validate_config(config: &CrambotConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if !LOG_LEVELS.contains(&config.service.log_level.as_str()) {
        errors.push(ConfigError::validation(format!(
            "service.log_level `{}` must be one of {}",
            config.service.log_level,
            LOG_LEVELS.join(", ")
        )));
    }

    let host = config.server.host.trim();
    if host.is_empty() {
        errors.push(ConfigError::validation("server.host must not be empty"));
    } else if host.parse::<std::net::IpAddr>().is_err()
        && !host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        errors.push(ConfigError::validation(format!(
            "server.host `{host}` is not a valid IP address or hostname"
        )));
    }

    if config.server.port == 0 {
        errors.push(ConfigError::validation("server.port must be non-zero"));
    }

    for (key, value) in [
        ("server.admin_token", &config.server.admin_token),
        ("server.webhook_secret", &config.server.webhook_secret),
        ("telegram.admin_bot_token", &config.telegram.admin_bot_token),
        ("telegram.parent_bot_token", &config.telegram.parent_bot_token),
    ] {
        if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
            errors.push(ConfigError::validation(format!(
                "{key} must not be empty when set"
            )));
        }
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::validation(
            "storage.database_path must not be empty",
        ));
    }

    if config.kv.backend == KvBackend::Upstash {
        if config.kv.url.as_deref().is_none_or(|u| u.trim().is_empty()) {
            errors.push(ConfigError::validation(
                "kv.url is required when kv.backend = \"upstash\"",
            ));
        }
        if config.kv.token.as_deref().is_none_or(|t| t.trim().is_empty()) {
            errors.push(ConfigError::validation(
                "kv.token is required when kv.backend = \"upstash\"",
            ));
        }
    }

    let positives: [(&str, u64); 10] = [
        ("kv.timeout_ms", config.kv.timeout_ms),
        ("cache.memory_ttl_secs", config.cache.memory_ttl_secs),
        ("cache.memory_capacity", config.cache.memory_capacity),
        ("rate_limit.user_capacity", config.rate_limit.user_capacity.into()),
        ("rate_limit.window_secs", config.rate_limit.window_secs),
        (
            "rate_limit.global_per_second",
            config.rate_limit.global_per_second.into(),
        ),
        ("actions.ttl_secs", config.actions.ttl_secs),
        ("bridge.request_ttl_hours", config.bridge.request_ttl_hours),
        (
            "broadcast.sends_per_second",
            config.broadcast.sends_per_second.into(),
        ),
        ("broadcast.flush_every", config.broadcast.flush_every.into()),
    ];
    for (key, value) in positives {
        if value == 0 {
            errors.push(ConfigError::validation(format!(
                "{key} must be greater than zero"
            )));
        }
    }

    if config.rate_limit.block_after_violations > 0 && config.rate_limit.block_duration_secs == 0 {
        errors.push(ConfigError::validation(
            "rate_limit.block_duration_secs must be greater than zero when blocking is enabled",
        ));
    }

    for (key, url) in [
        ("api.manage_url", &config.api.manage_url),
        ("api.inclass_url", &config.api.inclass_url),
        ("api.stock_url", &config.api.stock_url),
        ("gemini.base_url", &config.gemini.base_url),
    ] {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            errors.push(ConfigError::validation(format!(
                "{key} `{url}` must start with http:// or https://"
            )));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(validate_config(&CrambotConfig::default()).is_ok());
    }

    #[test]
    fn collects_every_error() {
        let mut config = CrambotConfig::default();
        config.service.log_level = "loud".into();
        config.server.port = 0;
        config.broadcast.flush_every = 0;
        let errors = validate_config(&config).expect_err("should fail");
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn upstash_requires_url_and_token() {
        let mut config = CrambotConfig::default();
        config.kv.backend = KvBackend::Upstash;
        let errors = validate_config(&config).expect_err("should fail");
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        assert!(messages.iter().any(|m| m.contains("kv.url")));
        assert!(messages.iter().any(|m| m.contains("kv.token")));
    }

    #[test]
    fn blank_tokens_are_rejected() {
        let mut config = CrambotConfig::default();
        config.telegram.admin_bot_token = Some("   ".into());
        let errors = validate_config(&config).expect_err("should fail");
        assert!(errors[0].to_string().contains("telegram.admin_bot_token"));
    }
}
