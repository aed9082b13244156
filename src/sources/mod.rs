//! Race data sources.
//!
//! Defines the `RaceSource` trait and the `HttpRaceSource` implementation
//! that reads a JSON odds gateway. "Not available" is `Ok(None)`; `Err`
//! means the source itself failed.

pub mod http;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::types::{OddsSnapshot, PayoutTable, RaceCard};

pub use http::HttpRaceSource;

/// Abstraction over wherever race cards, odds and payouts come from.
#[async_trait]
pub trait RaceSource: Send + Sync {
    /// Races run on `date` (local racing day).
    async fn list_races(&self, date: NaiveDate) -> Result<Vec<RaceCard>>;

    /// Current win odds, or `None` if not published yet.
    async fn fetch_odds(&self, race_id: &str) -> Result<Option<OddsSnapshot>>;

    /// Scheduled post time, if known.
    async fn fetch_post_time(&self, race_id: &str) -> Result<Option<DateTime<Utc>>>;

    /// Official payouts, or `None` before the result is confirmed.
    async fn fetch_payouts(&self, race_id: &str) -> Result<Option<PayoutTable>>;

    /// Public odds page for the race, linked from alerts.
    fn odds_url(&self, race_id: &str) -> String;

    /// Source name for logging.
    fn name(&self) -> &str;
}
