//! Accountant: per-cycle counters and the end-of-day summary.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::collections::{BTreeSet, HashMap};
use tracing::{info, warn};

use crate::sources::RaceSource;
use crate::summary::{summarize, SummaryReport};
use crate::types::{BetRecord, PayoutTable};

// ---------------------------------------------------------------------------
// Cycle report
// ---------------------------------------------------------------------------

/// What one poll cycle did.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub cycle_number: u64,
    pub local_date: NaiveDate,
    /// Outside operating hours; no race was looked at.
    pub closed: bool,
    pub races_seen: usize,
    pub skipped_window: usize,
    pub skipped_notified: usize,
    /// Odds or post time not available.
    pub no_data: usize,
    pub evaluated: usize,
    pub matched: usize,
    pub sent: usize,
    pub failed: usize,
    pub summary_sent: bool,
    pub timestamp: DateTime<Utc>,
}

impl CycleReport {
    pub fn new(cycle_number: u64, local_date: NaiveDate, timestamp: DateTime<Utc>) -> Self {
        Self {
            cycle_number,
            local_date,
            closed: false,
            races_seen: 0,
            skipped_window: 0,
            skipped_notified: 0,
            no_data: 0,
            evaluated: 0,
            matched: 0,
            sent: 0,
            failed: 0,
            summary_sent: false,
            timestamp,
        }
    }

    pub fn log(&self) {
        info!(
            cycle = self.cycle_number,
            date = %self.local_date,
            closed = self.closed,
            races = self.races_seen,
            window_skips = self.skipped_window,
            already_sent = self.skipped_notified,
            no_data = self.no_data,
            evaluated = self.evaluated,
            matched = self.matched,
            sent = self.sent,
            failed = self.failed,
            summary = self.summary_sent,
            "Cycle complete"
        );
    }
}

// ---------------------------------------------------------------------------
// Daily summary
// ---------------------------------------------------------------------------

pub struct Accountant;

impl Accountant {
    /// Fetch payouts for every race with a bet and roll the day up.
    ///
    /// A payout fetch error counts the race as missing rather than failing
    /// the whole summary.
    pub async fn daily_summary(
        source: &dyn RaceSource,
        records: &[BetRecord],
        date: NaiveDate,
        unit_stake: Decimal,
    ) -> SummaryReport {
        let race_ids: BTreeSet<&str> = records
            .iter()
            .filter(|r| r.date == date)
            .map(|r| r.race_id.as_str())
            .collect();

        let mut payouts: HashMap<String, PayoutTable> = HashMap::new();
        for race_id in race_ids {
            match source.fetch_payouts(race_id).await {
                Ok(Some(table)) => {
                    payouts.insert(race_id.to_string(), table);
                }
                Ok(None) => warn!(race_id, "Payouts not published yet"),
                Err(e) => warn!(race_id, error = %e, "Failed to fetch payouts"),
            }
        }

        let todays: Vec<BetRecord> = records.iter().filter(|r| r.date == date).cloned().collect();
        let report = summarize(&todays, &payouts, unit_stake);

        info!(
            date = %date,
            races = report.total.races,
            tickets = report.total.tickets,
            hits = report.total.hits,
            stake = %report.total.stake,
            payout = %report.total.payout,
            roi_pct = %report.total.roi_pct(),
            "Daily summary computed"
        );
        report
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
