//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Every section has defaults, so a minimal file only needs the source
//! URLs and recipients. Secrets (the bot token) are referenced by env-var
//! name in the config and resolved at runtime via `std::env::var`.

use anyhow::{Context, Result};
use chrono::{Duration, FixedOffset};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;

use crate::notify::EvaluationWindow;
use crate::types::{BetKind, PaddockError, StrategyId};

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub betting: BettingConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AgentConfig {
    pub name: String,
    pub poll_interval_secs: u64,
    /// Local hour the watch starts (inclusive).
    pub start_hour: u32,
    /// Local hour the watch ends (exclusive, at most 23); the daily
    /// summary follows.
    pub end_hour: u32,
    /// Offset of the racing time zone from UTC.
    pub utc_offset_hours: i32,
    /// Log alerts instead of sending them; nothing is persisted.
    pub dry_run: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "PADDOCK-01".to_string(),
            poll_interval_secs: 60,
            start_hour: 9,
            end_hour: 17,
            utc_offset_hours: 9,
            dry_run: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct NotifyConfig {
    pub ttl_secs: i64,
    pub cooldown_secs: i64,
    pub window_before_mins: i64,
    /// Negative closes the window before post time.
    pub window_after_mins: i64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 12 * 3600,
            cooldown_secs: 900,
            window_before_mins: 15,
            window_after_mins: -2,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BettingConfig {
    pub unit_stake: Decimal,
    /// Strategy number ("1".."4") → pool. Missing entries use the default.
    pub bet_kinds: BTreeMap<String, BetKind>,
}

impl Default for BettingConfig {
    fn default() -> Self {
        Self {
            unit_stake: dec!(100),
            bet_kinds: BTreeMap::new(),
        }
    }
}

impl BettingConfig {
    /// Default pool per strategy.
    pub fn default_bet_kind(strategy: StrategyId) -> BetKind {
        match strategy {
            StrategyId::TopThreeBox => BetKind::Quinella,
            StrategyId::FavouriteFirst => BetKind::Exacta,
            StrategyId::FavouriteWithLongshots => BetKind::Trifecta,
            StrategyId::TwinFavourites => BetKind::Trio,
        }
    }

    pub fn bet_kind(&self, strategy: StrategyId) -> BetKind {
        self.bet_kinds
            .get(&strategy.number().to_string())
            .copied()
            .unwrap_or_else(|| Self::default_bet_kind(strategy))
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SourceConfig {
    pub base_url: String,
    /// Public odds page linked from alerts; `{race_id}` is substituted.
    pub odds_page_template: String,
    /// Odds endpoints tried in order. Empty uses the gateway default.
    pub odds_paths: Vec<String>,
    pub jockey_table: Option<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8600/v1".to_string(),
            odds_page_template: "http://localhost:8600/odds/{race_id}".to_string(),
            odds_paths: Vec::new(),
            jockey_table: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AlertsConfig {
    pub telegram_bot_token_env: Option<String>,
    /// Telegram chat ids.
    pub recipients: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: "paddock_data".to_string(),
        }
    }
}

impl AppConfig {
    /// Load and validate configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config = Self::from_toml(&contents)
            .with_context(|| format!("Invalid config file: {path}"))?;
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents).context("Failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the monitor cannot run with.
    pub fn validate(&self) -> Result<(), PaddockError> {
        let bad = |msg: String| -> Result<(), PaddockError> { Err(PaddockError::Config(msg)) };
        let a = &self.agent;
        let n = &self.notify;

        // The summary goes out in the closed hour after `end_hour`, which
        // must fall on the same local date.
        if a.start_hour >= a.end_hour || a.end_hour > 23 {
            return bad(format!(
                "operating hours must satisfy start < end <= 23 (got {}..{})",
                a.start_hour, a.end_hour
            ));
        }
        if !(-12..=14).contains(&a.utc_offset_hours) {
            return bad(format!("utc_offset_hours out of range: {}", a.utc_offset_hours));
        }
        if a.poll_interval_secs == 0 {
            return bad("poll_interval_secs must be positive".into());
        }
        if n.ttl_secs <= 0 || n.cooldown_secs <= 0 {
            return bad("ttl_secs and cooldown_secs must be positive".into());
        }
        if n.window_before_mins < 0 || -n.window_before_mins > n.window_after_mins {
            return bad(format!(
                "evaluation window is empty (before={} after={})",
                n.window_before_mins, n.window_after_mins
            ));
        }
        if self.betting.unit_stake <= Decimal::ZERO {
            return bad("unit_stake must be positive".into());
        }
        for key in self.betting.bet_kinds.keys() {
            let valid = key
                .parse::<u8>()
                .ok()
                .and_then(|n| StrategyId::try_from(n).ok())
                .is_some();
            if !valid {
                return bad(format!("unknown strategy in bet_kinds: {key}"));
            }
        }
        if !a.dry_run {
            if self.alerts.recipients.is_empty() {
                return bad("alerts.recipients is empty".into());
            }
            if self.alerts.telegram_bot_token_env.is_none() {
                return bad("alerts.telegram_bot_token_env is required unless dry_run".into());
            }
        }
        Ok(())
    }

    /// Racing time zone.
    pub fn utc_offset(&self) -> Result<FixedOffset, PaddockError> {
        FixedOffset::east_opt(self.agent.utc_offset_hours * 3600).ok_or_else(|| {
            PaddockError::Config(format!("bad utc offset: {}", self.agent.utc_offset_hours))
        })
    }

    pub fn ttl(&self) -> Duration {
        Duration::seconds(self.notify.ttl_secs)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::seconds(self.notify.cooldown_secs)
    }

    pub fn window(&self) -> EvaluationWindow {
        EvaluationWindow::from_minutes(self.notify.window_before_mins, self.notify.window_after_mins)
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }
}
