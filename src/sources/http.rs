//! JSON odds gateway client.
//!
//! Endpoints (relative to the configured base URL):
//! - `GET /races?date=YYYY-MM-DD`    race cards for the day
//! - `GET /races/{id}`               race card (post time)
//! - odds paths, tried in order      win odds
//! - `GET /races/{id}/payouts`       official payouts
//!
//! Several odds paths can be configured; the first that answers with a
//! usable runner list wins. 404 means "not available".

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use super::RaceSource;
use crate::types::{BetKind, OddsEntry, OddsSnapshot, PayoutTable, RaceCard, RunnerOdds};

const SOURCE_NAME: &str = "odds-gateway";

/// Placeholder substituted with the URL-encoded race id.
const RACE_ID_PLACEHOLDER: &str = "{race_id}";

const DEFAULT_ODDS_PATHS: &[&str] = &["/races/{race_id}/odds"];

// ---------------------------------------------------------------------------
// API response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct GatewayRunner {
    #[serde(default)]
    post_number: Option<u32>,
    win_odds: Option<Decimal>,
    /// Present when the gateway ranks runners itself.
    #[serde(default)]
    popularity: Option<u32>,
    #[serde(default)]
    jockey: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GatewayOdds {
    #[serde(default)]
    observed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    runners: Vec<GatewayRunner>,
}

/// Payouts keyed by pool name as published; unknown pools are skipped.
type GatewayPayouts = HashMap<String, HashMap<String, Decimal>>;

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct HttpRaceSource {
    http: Client,
    base_url: String,
    odds_paths: Vec<String>,
    odds_page_template: String,
}

impl HttpRaceSource {
    /// `odds_page_template` is the public odds page, with `{race_id}`
    /// where the race id goes.
    pub fn new(base_url: &str, odds_page_template: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(20))
            .user_agent("PADDOCK/0.1.0 (odds-watcher)")
            .build()
            .context("Failed to build HTTP client for odds gateway")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            odds_paths: DEFAULT_ODDS_PATHS.iter().map(|p| p.to_string()).collect(),
            odds_page_template: odds_page_template.to_string(),
        })
    }

    /// Replace the odds path fallback list. Empty input keeps the default.
    pub fn with_odds_paths(mut self, paths: &[String]) -> Self {
        if !paths.is_empty() {
            self.odds_paths = paths.to_vec();
        }
        self
    }

    fn url(&self, path: &str, race_id: &str) -> String {
        let path = path.replace(RACE_ID_PLACEHOLDER, &urlencoding::encode(race_id));
        format!("{}{}", self.base_url, path)
    }

    /// GET and decode JSON. 404 → `None`.
    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<Option<T>> {
        debug!(url = %url, "Fetching from odds gateway");

        let resp = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("Odds gateway request failed: {url}"))?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Odds gateway error {status}: {body}");
        }

        let value = resp
            .json()
            .await
            .with_context(|| format!("Failed to parse odds gateway response: {url}"))?;
        Ok(Some(value))
    }

    async fn fetch_card(&self, race_id: &str) -> Result<Option<RaceCard>> {
        self.get_json(&self.url("/races/{race_id}", race_id)).await
    }
}

/// Build a snapshot from gateway runners.
///
/// Uses the gateway's popularity ranks when every priced runner has one,
/// otherwise ranks by odds.
fn to_snapshot(odds: GatewayOdds) -> OddsSnapshot {
    let priced: Vec<GatewayRunner> = odds
        .runners
        .into_iter()
        .filter(|r| r.win_odds.is_some())
        .collect();

    let snapshot = if !priced.is_empty() && priced.iter().all(|r| r.popularity.is_some()) {
        OddsSnapshot::new(
            priced
                .into_iter()
                .filter_map(|r| {
                    Some(OddsEntry {
                        popularity_rank: r.popularity?,
                        post_number: r.post_number,
                        win_odds: r.win_odds?,
                        jockey_name: r.jockey,
                    })
                })
                .collect(),
        )
    } else {
        OddsSnapshot::rank_by_odds(
            priced
                .into_iter()
                .filter_map(|r| {
                    Some(RunnerOdds {
                        post_number: r.post_number,
                        win_odds: r.win_odds?,
                        jockey_name: r.jockey,
                    })
                })
                .collect(),
        )
    };

    match odds.observed_at {
        Some(at) => snapshot.with_observed_at(at),
        None => snapshot,
    }
}

fn to_payout_table(raw: GatewayPayouts) -> PayoutTable {
    let mut table = PayoutTable::new();
    for (pool, combos) in raw {
        match pool.parse::<BetKind>() {
            Ok(kind) => {
                table.insert(kind, combos);
            }
            Err(_) => debug!(pool = %pool, "Skipping unsupported payout pool"),
        }
    }
    table
}

// ---------------------------------------------------------------------------
// RaceSource trait implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl RaceSource for HttpRaceSource {
    async fn list_races(&self, date: NaiveDate) -> Result<Vec<RaceCard>> {
        let url = format!("{}/races?date={}", self.base_url, date.format("%Y-%m-%d"));
        let races: Vec<RaceCard> = self.get_json(&url).await?.unwrap_or_default();
        info!(date = %date, count = races.len(), "Race cards fetched");
        Ok(races)
    }

    async fn fetch_odds(&self, race_id: &str) -> Result<Option<OddsSnapshot>> {
        for path in &self.odds_paths {
            let url = self.url(path, race_id);
            match self.get_json::<GatewayOdds>(&url).await {
                Ok(Some(odds)) if odds.runners.iter().any(|r| r.win_odds.is_some()) => {
                    let snapshot = to_snapshot(odds);
                    debug!(race_id, path = %path, runners = snapshot.len(), "Odds fetched");
                    return Ok(Some(snapshot));
                }
                Ok(_) => debug!(race_id, path = %path, "No odds at path, trying next"),
                Err(e) => warn!(race_id, path = %path, error = %e, "Odds path failed, trying next"),
            }
        }
        Ok(None)
    }

    async fn fetch_post_time(&self, race_id: &str) -> Result<Option<DateTime<Utc>>> {
        Ok(self.fetch_card(race_id).await?.and_then(|c| c.post_time))
    }

    async fn fetch_payouts(&self, race_id: &str) -> Result<Option<PayoutTable>> {
        let raw: Option<GatewayPayouts> = self
            .get_json(&self.url("/races/{race_id}/payouts", race_id))
            .await?;
        Ok(raw.map(to_payout_table).filter(|t| !t.is_empty()))
    }

    fn odds_url(&self, race_id: &str) -> String {
        self.odds_page_template
            .replace(RACE_ID_PLACEHOLDER, &urlencoding::encode(race_id))
    }

    fn name(&self) -> &str {
        SOURCE_NAME
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
