// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Crambot gateway.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Crambot configuration.
///
/// Every section is optional and falls back to its defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CrambotConfig {
    #[serde(default)]
    pub service: ServiceConfig,

    /// HTTP listener and operator API settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Bot tokens for both personas.
    #[serde(default)]
    pub telegram: TelegramConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    /// Distributed key-value backend.
    #[serde(default)]
    pub kv: KvConfig,

    /// Tenant reference-data cache.
    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Pending-action confirmation settings.
    #[serde(default)]
    pub actions: ActionsConfig,

    /// Cross-bot request settings.
    #[serde(default)]
    pub bridge: BridgeConfig,

    #[serde(default)]
    pub broadcast: BroadcastConfig,

    /// Downstream business API endpoints.
    #[serde(default)]
    pub api: ApiConfig,

    /// Intent classifier settings.
    #[serde(default)]
    pub gemini: GeminiConfig,
}

/// Service identity.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "crambot".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Bearer token for the operator API. `None` disables the operator API.
    #[serde(default)]
    pub admin_token: Option<String>,

    /// Expected `X-Telegram-Bot-Api-Secret-Token` value. `None` skips the check.
    #[serde(default)]
    pub webhook_secret: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            admin_token: None,
            webhook_secret: None,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Telegram bot configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TelegramConfig {
    /// Token of the staff-facing bot.
    #[serde(default)]
    pub admin_bot_token: Option<String>,

    /// Token of the guardian-facing bot.
    #[serde(default)]
    pub parent_bot_token: Option<String>,

    /// Alternate Bot API server URL.
    #[serde(default)]
    pub api_url: Option<String>,

    /// `@username` of the staff bot, without the `@`. Looked up at start-up
    /// when unset; group messages mentioning it are answered.
    #[serde(default)]
    pub admin_bot_username: Option<String>,

    #[serde(default)]
    pub parent_bot_username: Option<String>,
}

/// Durable store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable SQLite WAL mode.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("crambot").join("crambot.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("crambot.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Which distributed key-value backend to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KvBackend {
    /// Process-local map. Correct only for a single instance.
    #[default]
    Memory,
    /// Upstash Redis over its REST interface.
    Upstash,
}

/// Distributed key-value configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct KvConfig {
    #[serde(default)]
    pub backend: KvBackend,

    /// REST endpoint of the KV service.
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub token: Option<String>,

    /// Per-request timeout. Kept short since every caller falls back on error.
    #[serde(default = "default_kv_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for KvConfig {
    fn default() -> Self {
        Self {
            backend: KvBackend::default(),
            url: None,
            token: None,
            timeout_ms: default_kv_timeout_ms(),
        }
    }
}

fn default_kv_timeout_ms() -> u64 {
    1500
}

/// Tenant cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// TTL of the memory and distributed tiers.
    #[serde(default = "default_memory_ttl_secs")]
    pub memory_ttl_secs: u64,

    #[serde(default = "default_memory_capacity")]
    pub memory_capacity: u64,

    /// Age after which a snapshot is reported stale.
    #[serde(default = "default_stale_after_hours")]
    pub stale_after_hours: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory_ttl_secs: default_memory_ttl_secs(),
            memory_capacity: default_memory_capacity(),
            stale_after_hours: default_stale_after_hours(),
        }
    }
}

fn default_memory_ttl_secs() -> u64 {
    300
}

fn default_memory_capacity() -> u64 {
    1000
}

fn default_stale_after_hours() -> u64 {
    24
}

/// Rate limiter configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitConfig {
    /// Admissions per subject per window.
    #[serde(default = "default_user_capacity")]
    pub user_capacity: u32,

    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Ceiling on outbound sends per second across all instances.
    #[serde(default = "default_global_per_second")]
    pub global_per_second: u32,

    /// Denials inside one window after which the subject is blocked. 0 disables blocking.
    #[serde(default = "default_block_after_violations")]
    pub block_after_violations: u32,

    #[serde(default = "default_block_duration_secs")]
    pub block_duration_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            user_capacity: default_user_capacity(),
            window_secs: default_window_secs(),
            global_per_second: default_global_per_second(),
            block_after_violations: default_block_after_violations(),
            block_duration_secs: default_block_duration_secs(),
        }
    }
}

fn default_user_capacity() -> u32 {
    30
}

fn default_window_secs() -> u64 {
    1
}

fn default_global_per_second() -> u32 {
    25
}

fn default_block_after_violations() -> u32 {
    3
}

fn default_block_duration_secs() -> u64 {
    900
}

/// Pending-action configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ActionsConfig {
    #[serde(default = "default_action_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for ActionsConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_action_ttl_secs(),
        }
    }
}

fn default_action_ttl_secs() -> u64 {
    300
}

/// Cross-bot bridge configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BridgeConfig {
    #[serde(default = "default_request_ttl_hours")]
    pub request_ttl_hours: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            request_ttl_hours: default_request_ttl_hours(),
        }
    }
}

fn default_request_ttl_hours() -> u64 {
    72
}

/// Broadcast queue configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BroadcastConfig {
    /// Local pacing of the broadcast worker.
    #[serde(default = "default_sends_per_second")]
    pub sends_per_second: u32,

    /// Persist progress after this many sends.
    #[serde(default = "default_flush_every")]
    pub flush_every: u32,

    #[serde(default = "default_job_ttl_hours")]
    pub job_ttl_hours: u64,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            sends_per_second: default_sends_per_second(),
            flush_every: default_flush_every(),
            job_ttl_hours: default_job_ttl_hours(),
        }
    }
}

fn default_sends_per_second() -> u32 {
    25
}

fn default_flush_every() -> u32 {
    10
}

fn default_job_ttl_hours() -> u64 {
    24
}

/// Downstream business API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ApiConfig {
    #[serde(default = "default_manage_url")]
    pub manage_url: String,

    #[serde(default = "default_inclass_url")]
    pub inclass_url: String,

    #[serde(default = "default_stock_url")]
    pub stock_url: String,

    /// Shared secret sent as `X-Internal-Key`.
    #[serde(default)]
    pub internal_api_key: Option<String>,

    #[serde(default = "default_api_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            manage_url: default_manage_url(),
            inclass_url: default_inclass_url(),
            stock_url: default_stock_url(),
            internal_api_key: None,
            timeout_secs: default_api_timeout_secs(),
        }
    }
}

fn default_manage_url() -> String {
    "http://localhost:3001".to_string()
}

fn default_inclass_url() -> String {
    "http://localhost:3002".to_string()
}

fn default_stock_url() -> String {
    "http://localhost:3003".to_string()
}

fn default_api_timeout_secs() -> u64 {
    10
}

/// Intent classifier configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GeminiConfig {
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_gemini_model")]
    pub model: String,

    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,

    #[serde(default = "default_gemini_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_gemini_model(),
            base_url: default_gemini_base_url(),
            timeout_secs: default_gemini_timeout_secs(),
        }
    }
}

fn default_gemini_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_gemini_timeout_secs() -> u64 {
    15
}
