// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `crambot serve` command implementation.
//!
//! Wires storage, the distributed cache, both Telegram transports, the
//! classifier and business API client into the bot services, starts the
//! broadcast worker and serves the gateway until SIGINT or SIGTERM.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crambot_agent::shutdown::{drain_background, install_signal_handler};
use crambot_agent::{BotServices, Bots};
use crambot_bridge::Transports;
use crambot_config::CrambotConfig;
use crambot_core::types::Persona;
use crambot_core::{BackgroundTasks, CrambotError, PluginAdapter, StorageAdapter};
use crambot_dispatch::{BusinessApiClient, GeminiClassifier};
use crambot_gateway::{AuthConfig, GatewayState, HealthState};
use crambot_prometheus::PrometheusRecorder;
use crambot_storage::SqliteStorage;
use crambot_telegram::TelegramTransport;
use tracing::{error, info, warn};

/// How long shutdown waits for detached work before giving up.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn run_serve(mut config: CrambotConfig) -> Result<(), CrambotError> {
    init_tracing(&config.service.log_level);
    info!(service = %config.service.name, "starting crambot serve");

    let storage = SqliteStorage::new(config.storage.clone());
    storage.initialize().await?;
    let storage: Arc<dyn StorageAdapter> = Arc::new(storage);

    let kv = crambot_cache::kv::from_config(&config.kv)?;
    let tasks = BackgroundTasks::new();

    let admin = transport(Persona::Admin, config.telegram.admin_bot_token.as_deref(), &config)?;
    let parent = transport(Persona::Parent, config.telegram.parent_bot_token.as_deref(), &config)?;
    resolve_username(&admin, &mut config.telegram.admin_bot_username).await;
    resolve_username(&parent, &mut config.telegram.parent_bot_username).await;
    let transports = Transports {
        admin,
        parent,
    };
    let classifier = Arc::new(GeminiClassifier::new(&config.gemini).inspect_err(|e| {
        error!(error = %e, "failed to initialize the Gemini classifier");
    })?);
    let api = Arc::new(BusinessApiClient::new(&config.api)?);

    let services = BotServices::new(
        &config,
        storage.clone(),
        kv,
        classifier,
        api,
        transports.clone(),
        tasks.clone(),
    );
    let bots = Bots::new(services.clone());

    let prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>> =
        match PrometheusRecorder::install() {
            Ok(recorder) => {
                let handle = recorder.handle().clone();
                Some(Arc::new(move || handle.render()))
            }
            Err(e) => {
                warn!(error = %e, "prometheus unavailable, continuing without metrics");
                None
            }
        };

    // The worker takes its own global slot per send, so it gets the bare transport.
    let (queue, worker) = crambot_broadcast::channel(
        &config.broadcast,
        storage.clone(),
        transports.admin.clone(),
        services.limiter.clone(),
    );

    if config.server.admin_token.is_none() {
        warn!("server.admin_token not set; the operator API will reject every request");
    }
    if config.server.webhook_secret.is_none() {
        warn!("server.webhook_secret not set; webhook calls are not authenticated");
    }

    let shutdown = install_signal_handler();
    let worker_handle = tokio::spawn(worker.run(shutdown.clone()));

    let state = GatewayState {
        bots,
        tasks: tasks.clone(),
        store: storage.clone(),
        broadcast: queue,
        webhook_secret: config.server.webhook_secret.clone(),
        auth: AuthConfig {
            bearer_token: config.server.admin_token.clone(),
        },
        health: HealthState {
            start_time: Instant::now(),
            prometheus_render,
        },
    };
    let served = crambot_gateway::serve(&config.server, state, shutdown.clone()).await;
    // A bind failure returns before any signal; stop the worker as well.
    shutdown.cancel();

    if let Err(e) = worker_handle.await {
        warn!(error = %e, "broadcast worker ended abnormally");
    }
    drain_background(&tasks, DRAIN_TIMEOUT).await;

    for (persona, t) in [
        (Persona::Admin, &transports.admin),
        (Persona::Parent, &transports.parent),
    ] {
        if let Err(e) = t.shutdown().await {
            warn!(%persona, error = %e, "transport shutdown failed");
        }
    }
    if let Err(e) = storage.close().await {
        warn!(error = %e, "storage close failed");
    }

    served?;
    info!("crambot stopped");
    Ok(())
}

fn transport(
    persona: Persona,
    token: Option<&str>,
    config: &CrambotConfig,
) -> Result<Arc<TelegramTransport>, CrambotError> {
    let Some(token) = token else {
        let key = match persona {
            Persona::Admin => "telegram.admin_bot_token",
            Persona::Parent => "telegram.parent_bot_token",
        };
        return Err(CrambotError::Config(format!("{key} is required to serve")));
    };
    let transport = TelegramTransport::new(persona, token, config.telegram.api_url.as_deref())?;
    info!(%persona, "telegram transport ready");
    Ok(Arc::new(transport))
}

/// Fills in a bot's `@username` from Telegram unless configured. Without it
/// the bot still answers commands in groups but not mentions.
async fn resolve_username(transport: &TelegramTransport, slot: &mut Option<String>) {
    if slot.is_some() {
        return;
    }
    match transport.username().await {
        Ok(Some(username)) => {
            info!(bot = transport.name(), %username, "bot username resolved");
            *slot = Some(username);
        }
        Ok(None) => warn!(bot = transport.name(), "bot has no username; group mentions ignored"),
        Err(e) => warn!(bot = transport.name(), error = %e, "bot username lookup failed; group mentions ignored"),
    }
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("crambot={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serving_requires_both_bot_tokens() {
        let config = CrambotConfig::default();
        let err = transport(Persona::Parent, None, &config).err().expect("missing token");
        assert!(err.to_string().contains("telegram.parent_bot_token"));
    }
}
