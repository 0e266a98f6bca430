// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Lookup order: `./crambot.toml` > `~/.config/crambot/crambot.toml` >
//! `/etc/crambot/crambot.toml`, with `CRAMBOT_` environment overrides on top.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::CrambotConfig;

/// Section names, longest first so `rate_limit_` wins over any shorter prefix.
const SECTIONS: &[&str] = &[
    "rate_limit",
    "broadcast",
    "telegram",
    "storage",
    "service",
    "actions",
    "server",
    "bridge",
    "gemini",
    "cache",
    "api",
    "kv",
];

/// Load configuration from the standard hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/crambot/crambot.toml`
/// 3. `~/.config/crambot/crambot.toml`
/// 4. `./crambot.toml`
/// 5. `CRAMBOT_*` environment variables
pub fn load_config() -> Result<CrambotConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no file lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<CrambotConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CrambotConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<CrambotConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CrambotConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for config loading, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(CrambotConfig::default()))
        .merge(Toml::file("/etc/crambot/crambot.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("crambot/crambot.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("crambot.toml"))
        .merge(env_provider())
}

/// Environment provider mapping `CRAMBOT_<SECTION>_<KEY>` onto `section.key`.
///
/// Uses `Env::map()` rather than `Env::split("_")` since both section and key
/// names contain underscores.
fn env_provider() -> Env {
    Env::prefixed("CRAMBOT_").map(|key| map_env_key(key.as_str()).into())
}

/// Maps a lowercased, prefix-stripped env var name onto a dotted config path.
pub(crate) fn map_env_key(key: &str) -> String {
    for section in SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|rest| rest.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}
