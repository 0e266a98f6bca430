// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for the Crambot gateway.
//!
//! TOML files are layered with `CRAMBOT_*` environment overrides, rejected on
//! unknown keys and validated after deserialization. Errors render as miette
//! diagnostics with typo suggestions.
//!
//! ```no_run
//! use crambot_config::load_and_validate;
//!
//! let config = load_and_validate().expect("config errors");
//! println!("listening on {}:{}", config.server.host, config.server.port);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

pub use diagnostic::{ConfigError, render_errors};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::CrambotConfig;

/// Load configuration from the file hierarchy and environment, then validate it.
pub fn load_and_validate() -> Result<CrambotConfig, Vec<ConfigError>> {
    match loader::load_config() {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => Err(diagnostic::figment_to_config_errors(
            err,
            &collect_toml_sources(),
        )),
    }
}

/// Load configuration from an explicit file (plus env overrides) and validate it.
pub fn load_and_validate_path(path: &std::path::Path) -> Result<CrambotConfig, Vec<ConfigError>> {
    match loader::load_config_from_path(path) {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => {
            let sources: Vec<(String, String)> = std::fs::read_to_string(path)
                .map(|content| vec![(path.display().to_string(), content)])
                .unwrap_or_default();
            Err(diagnostic::figment_to_config_errors(err, &sources))
        }
    }
}

/// Load configuration from a TOML string and validate it.
pub fn load_and_validate_str(toml_content: &str) -> Result<CrambotConfig, Vec<ConfigError>> {
    match loader::load_config_from_str(toml_content) {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => {
            let sources = vec![("<inline>".to_string(), toml_content.to_string())];
            Err(diagnostic::figment_to_config_errors(err, &sources))
        }
    }
}

/// Serializes the effective configuration with secrets masked.
pub fn to_redacted_toml(config: &CrambotConfig) -> Result<String, toml::ser::Error> {
    let mut shown = config.clone();
    for secret in [
        &mut shown.server.admin_token,
        &mut shown.server.webhook_secret,
        &mut shown.telegram.admin_bot_token,
        &mut shown.telegram.parent_bot_token,
        &mut shown.kv.token,
        &mut shown.api.internal_api_key,
        &mut shown.gemini.api_key,
    ] {
        if secret.is_some() {
            *secret = Some("[REDACTED]".to_string());
        }
    }
    toml::to_string_pretty(&shown)
}

fn collect_toml_sources() -> Vec<(String, String)> {
    let mut candidates = vec![
        std::env::current_dir()
            .map(|d| d.join("crambot.toml"))
            .unwrap_or_else(|_| "crambot.toml".into()),
    ];
    if let Some(config_dir) = dirs::config_dir() {
        candidates.push(config_dir.join("crambot/crambot.toml"));
    }
    candidates.push("/etc/crambot/crambot.toml".into());

    candidates
        .into_iter()
        .filter_map(|path| {
            std::fs::read_to_string(&path)
                .ok()
                .map(|content| (path.display().to_string(), content))
        })
        .collect()
}
