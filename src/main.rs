// Entry point of the chat spam filter.
//
// **Architecture Overview:**
// - `core/` = Business logic (platform-agnostic scoring and rate limiting)
// - `infra/` = Implementations of core traits (settings file, action executor)
// - `chat/` = Chat adapter (inbound message parsing, applying actions)
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Feed inbound chat lines from stdin through the engine
// 4. Print one JSON outcome per line on stdout

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "chat/chat_layer.rs"]
mod chat;
#[path = "core/core_layer.rs"]
mod core;
#[path = "infra/infra_layer.rs"]
mod infra;

use crate::chat::{handle_message_for_spam, parse_line};
use crate::core::moderation::{FilterConfig, FilterSettingsStore, ModerationEngine};
use crate::infra::moderation::{JsonFilterSettingsStore, TracingExecutor};
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_PATH: &str = "data/filter_config.json";
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_RELOAD_SECS: u64 = 30;

/// Read the saved filter settings, seeding the file with defaults on first run.
async fn load_filter_config<S: FilterSettingsStore>(store: &S) -> anyhow::Result<FilterConfig> {
    match store.load().await.context("Failed to read filter settings")? {
        Some(config) => Ok(config),
        None => {
            let config = FilterConfig::default();
            store
                .save(&config)
                .await
                .context("Failed to write default filter settings")?;
            tracing::info!("No filter settings found, wrote defaults");
            Ok(config)
        }
    }
}

/// Push an edited settings file into the engine. Invalid edits are logged and
/// the running configuration is kept.
async fn reload_filter_config(store: &JsonFilterSettingsStore, engine: &ModerationEngine) {
    match store.reload().await {
        Ok(Some(config)) if config != engine.configuration() => {
            if let Err(e) = engine.update_configuration(config) {
                tracing::warn!("Ignoring edited filter settings: {}", e);
            }
        }
        Ok(_) => {}
        Err(e) => tracing::warn!("Failed to reload filter settings: {}", e),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    // Logs go to stderr so stdout stays one JSON outcome per line
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config_path =
        std::env::var("FILTER_CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================

    let reload_every = std::env::var("FILTER_RELOAD_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|&secs| secs > 0)
        .unwrap_or(DEFAULT_RELOAD_SECS);

    let store = Arc::new(
        JsonFilterSettingsStore::open(&config_path)
            .with_context(|| format!("Failed to open filter settings at {}", config_path))?,
    );
    let config = load_filter_config(store.as_ref()).await?;

    let engine = Arc::new(ModerationEngine::new(config).context("Invalid filter settings")?);
    let executor = Arc::new(TracingExecutor::new());

    tracing::info!(path = %store.path().display(), "Spam filter ready, reading messages from stdin");

    // Drop rate-limit windows for senders that went quiet
    let sweeper = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                interval.tick().await;
                let removed = engine.sweep_idle(chrono::Utc::now().timestamp_millis());
                if removed > 0 {
                    tracing::debug!(removed, "Swept idle senders");
                }
            }
        })
    };

    // Pick up edits to the settings file without a restart
    let reloader = {
        let engine = Arc::clone(&engine);
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(reload_every));
            // First tick fires immediately; the config was just loaded
            interval.tick().await;
            loop {
                interval.tick().await;
                reload_filter_config(&store, &engine).await;
            }
        })
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        if line.trim().is_empty() {
            continue;
        }

        let msg = match parse_line(&line, chrono::Utc::now().timestamp_millis()) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::warn!("Skipping malformed line: {}", e);
                continue;
            }
        };

        let outcome = handle_message_for_spam(&engine, executor.as_ref(), &msg).await;

        let mut json = serde_json::to_string(&outcome)?;
        json.push('\n');
        stdout.write_all(json.as_bytes()).await?;
        stdout.flush().await?;
    }

    sweeper.abort();
    reloader.abort();

    tracing::info!(
        deleted = executor.deleted_count(),
        notified = executor.notified_count(),
        "Input closed, shutting down"
    );

    Ok(())
}
