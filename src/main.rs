//! PADDOCK: horse-racing odds watcher
//!
//! Entry point. Loads configuration, initialises structured logging,
//! restores notification state from disk, and runs the poll loop with
//! graceful shutdown.

use anyhow::{Context, Result};
use chrono::Utc;
use secrecy::SecretString;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use paddock::config::{self, AppConfig};
use paddock::engine::executor::AlertExecutor;
use paddock::engine::scanner::OperatingHours;
use paddock::engine::RaceMonitor;
use paddock::jockey::{JockeyTable, JockeyTierLookup};
use paddock::notify::{LogSink, MessageSink, NotificationStateMachine, TelegramSink};
use paddock::sources::HttpRaceSource;
use paddock::storage::{AlertStore, FileStore};
use paddock::strategy::StrategyEngine;

const BANNER: &str = r#"
 ____   _    ____  ____   ___   ____ _  __
|  _ \ / \  |  _ \|  _ \ / _ \ / ___| |/ /
| |_) / _ \ | | | | | | | | | | |   | ' /
|  __/ ___ \| |_| | |_| | |_| | |___| . \
|_| /_/   \_\____/|____/ \___/ \____|_|\_\

  Odds watcher & betting alerts
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cfg = config::AppConfig::load("config.toml")?;

    init_logging();

    println!("{BANNER}");
    info!(
        agent_name = %cfg.agent.name,
        poll_interval_secs = cfg.agent.poll_interval_secs,
        hours = format!("{:02}:00-{:02}:00", cfg.agent.start_hour, cfg.agent.end_hour),
        utc_offset = cfg.agent.utc_offset_hours,
        dry_run = cfg.agent.dry_run,
        "PADDOCK starting up"
    );

    let mut monitor = build_monitor(&cfg)?;

    // -- Main loop -------------------------------------------------------

    let mut interval = tokio::time::interval(Duration::from_secs(cfg.agent.poll_interval_secs));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(
        interval_secs = cfg.agent.poll_interval_secs,
        "Entering main loop. Press Ctrl+C to stop."
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match monitor.run_cycle(Utc::now()).await {
                    Ok(report) => report.log(),
                    Err(e) => error!(error = %e, "Cycle failed, continuing to next"),
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                break;
            }
        }
    }

    info!(
        cycles = monitor.cycle_count(),
        races_tracked = monitor.notifier().states().len(),
        "PADDOCK shut down cleanly."
    );
    Ok(())
}

/// Wire source, store, sink and jockey table into a monitor.
fn build_monitor(cfg: &AppConfig) -> Result<RaceMonitor> {
    let offset = cfg.utc_offset()?;

    let source = HttpRaceSource::new(&cfg.source.base_url, &cfg.source.odds_page_template)?
        .with_odds_paths(&cfg.source.odds_paths);

    let store = FileStore::open(&cfg.storage.dir)?;
    let states = if cfg.agent.dry_run {
        Default::default()
    } else {
        store.load_notified_state()?
    };
    info!(races = states.len(), "Notification state restored");
    let notifier = NotificationStateMachine::new(cfg.ttl(), cfg.cooldown()).with_states(states);

    let table = match cfg.source.jockey_table.as_deref() {
        Some(path) => JockeyTable::load(Path::new(path))?,
        None => {
            warn!("No jockey table configured, every jockey resolves to tier C");
            JockeyTable::default()
        }
    };
    let tiers = JockeyTierLookup::new(table);

    let sink: Arc<dyn MessageSink> = if cfg.agent.dry_run {
        info!("Dry run: alerts are logged, not sent");
        Arc::new(LogSink)
    } else {
        let env = cfg
            .alerts
            .telegram_bot_token_env
            .as_deref()
            .context("alerts.telegram_bot_token_env not set")?;
        let token = AppConfig::resolve_env(env)?;
        Arc::new(TelegramSink::new(SecretString::new(token))?)
    };

    let store: Arc<dyn AlertStore> = Arc::new(store);
    let executor = AlertExecutor::new(
        sink,
        store.clone(),
        cfg.alerts.recipients.clone(),
        cfg.betting.clone(),
        offset,
        cfg.agent.dry_run,
    );

    Ok(RaceMonitor::new(
        Arc::new(source),
        store,
        Arc::new(tiers),
        StrategyEngine::default(),
        notifier,
        executor,
        OperatingHours::new(cfg.agent.start_hour, cfg.agent.end_hour, offset),
        cfg.window(),
        cfg.betting.unit_stake,
    ))
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("paddock=info"));

    let json_logging = std::env::var("PADDOCK_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
