//! Core engine: the poll → evaluate → alert loop.
//!
//! `RaceMonitor::run_cycle` is called on every tick. It walks today's
//! races in race-id order, gates each through the evaluation window and
//! the notification state machine, evaluates the odds and dispatches
//! alerts. Once the operating hours close, the daily summary goes out.

pub mod accountant;
pub mod executor;
pub mod scanner;

use anyhow::Result;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::jockey::TierSource;
use crate::notify::{EvaluationWindow, NotificationStateMachine};
use crate::sources::RaceSource;
use crate::storage::AlertStore;
use crate::strategy::StrategyEngine;
use crate::types::{BetRecord, RaceCard, RaceContext};
use accountant::{Accountant, CycleReport};
use executor::{AlertExecutor, DispatchOutcome};
use scanner::{check_window, order_races, OperatingHours, SkipReason};

/// Ties the collaborators together and owns per-day state.
pub struct RaceMonitor {
    source: Arc<dyn RaceSource>,
    store: Arc<dyn AlertStore>,
    tiers: Arc<dyn TierSource>,
    engine: StrategyEngine,
    notifier: NotificationStateMachine,
    executor: AlertExecutor,
    hours: OperatingHours,
    window: EvaluationWindow,
    unit_stake: Decimal,
    cycle_count: u64,
    /// Race cards cached for the local date they were fetched for.
    races: Option<(NaiveDate, Vec<RaceCard>)>,
    summary_sent_for: Option<NaiveDate>,
    /// Bets the store does not hold: dry-run alerts and failed writes.
    session_bets: Vec<BetRecord>,
}

impl RaceMonitor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: Arc<dyn RaceSource>,
        store: Arc<dyn AlertStore>,
        tiers: Arc<dyn TierSource>,
        engine: StrategyEngine,
        notifier: NotificationStateMachine,
        executor: AlertExecutor,
        hours: OperatingHours,
        window: EvaluationWindow,
        unit_stake: Decimal,
    ) -> Self {
        Self {
            source,
            store,
            tiers,
            engine,
            notifier,
            executor,
            hours,
            window,
            unit_stake,
            cycle_count: 0,
            races: None,
            summary_sent_for: None,
            session_bets: Vec::new(),
        }
    }

    pub fn notifier(&self) -> &NotificationStateMachine {
        &self.notifier
    }

    pub fn cycle_count(&self) -> u64 {
        self.cycle_count
    }

    /// Run one poll cycle at `now`.
    ///
    /// Per-race failures are logged and counted; only a failure to list
    /// the day's races fails the cycle.
    pub async fn run_cycle(&mut self, now: DateTime<Utc>) -> Result<CycleReport> {
        self.cycle_count += 1;
        let date = self.hours.local_date(now);
        let mut report = CycleReport::new(self.cycle_count, date, now);

        if !self.hours.is_open(now) {
            report.closed = true;
            if self.hours.is_after_close(now) && self.summary_sent_for != Some(date) {
                report.summary_sent = self.send_daily_summary(date).await?;
            }
            return Ok(report);
        }

        let races = self.races_for(date).await?;
        report.races_seen = races.len();

        for card in races {
            if let Err(e) = self.process_race(&card, date, now, &mut report).await {
                warn!(race_id = %card.race_id, error = %e, "Race failed");
                report.failed += 1;
            }
        }

        Ok(report)
    }

    async fn process_race(
        &mut self,
        card: &RaceCard,
        date: NaiveDate,
        now: DateTime<Utc>,
        report: &mut CycleReport,
    ) -> Result<()> {
        let race_id = card.race_id.as_str();

        let post_time = match card.post_time {
            Some(t) => Some(t),
            None => self.source.fetch_post_time(race_id).await?,
        };
        match check_window(&self.window, race_id, post_time, now) {
            Ok(_) => {}
            Err(SkipReason::NoPostTime) => {
                report.no_data += 1;
                return Ok(());
            }
            Err(SkipReason::OutsideWindow) => {
                report.skipped_window += 1;
                return Ok(());
            }
        }

        if !self.notifier.may_notify(race_id, now) {
            debug!(race_id, state = ?self.notifier.state_at(race_id, now), "Already handled");
            report.skipped_notified += 1;
            return Ok(());
        }

        let Some(snapshot) = self.source.fetch_odds(race_id).await? else {
            debug!(race_id, "Odds not available");
            report.no_data += 1;
            return Ok(());
        };

        report.evaluated += 1;
        let Some(matched) = self.engine.evaluate(&snapshot) else {
            return Ok(());
        };
        report.matched += 1;

        let race = RaceContext::from_card(card, post_time, self.source.odds_url(race_id));
        let outcome = self
            .executor
            .dispatch(
                &mut self.notifier,
                self.tiers.as_ref(),
                &matched,
                &snapshot,
                &race,
                date,
                now,
            )
            .await?;

        match outcome {
            DispatchOutcome::Sent { record, persisted } => {
                report.sent += 1;
                if !persisted {
                    self.session_bets.push(record);
                }
            }
            DispatchOutcome::Failed { .. } => report.failed += 1,
        }
        Ok(())
    }

    /// Today's race cards, fetched once per local date.
    async fn races_for(&mut self, date: NaiveDate) -> Result<Vec<RaceCard>> {
        if let Some((cached, races)) = &self.races {
            if *cached == date && !races.is_empty() {
                return Ok(races.clone());
            }
        }

        // Also runs on the first load, so state restored from disk is pruned.
        if self.races.as_ref().map_or(true, |(d, _)| *d != date) {
            self.start_new_day(date);
        }

        let races = order_races(self.source.list_races(date).await?);
        info!(date = %date, count = races.len(), source = self.source.name(), "Race card loaded");
        self.races = Some((date, races.clone()));
        Ok(races)
    }

    fn start_new_day(&mut self, date: NaiveDate) {
        let cutoff = date
            .and_hms_opt(0, 0, 0)
            .map(|midnight| midnight.and_utc() - Duration::days(1));
        if let Some(cutoff) = cutoff {
            let pruned = self.notifier.prune_before(cutoff);
            debug!(date = %date, pruned, "New racing day");
            if pruned > 0 && !self.executor.is_dry_run() {
                if let Err(e) = self.store.replace_notified_state(self.notifier.states()) {
                    warn!(error = %e, "Failed to persist pruned notification state");
                }
            }
        }
        self.session_bets.retain(|b| b.date >= date - Duration::days(1));
    }

    /// Compute and broadcast the summary for `date`.
    ///
    /// Returns whether it was delivered. The date is marked done, in memory
    /// and in the store, even when delivery fails, so a restart after close
    /// does not send it again.
    pub async fn send_daily_summary(&mut self, date: NaiveDate) -> Result<bool> {
        let dry_run = self.executor.is_dry_run();
        if !dry_run && self.store.last_summary_date()? == Some(date) {
            debug!(date = %date, "Summary already sent before restart");
            self.summary_sent_for = Some(date);
            return Ok(false);
        }

        let mut records = if dry_run {
            Vec::new()
        } else {
            self.store.load_bet_records(date)?
        };
        records.extend(self.session_bets.iter().filter(|b| b.date == date).cloned());

        self.summary_sent_for = Some(date);
        if !dry_run {
            if let Err(e) = self.store.mark_summary_sent(date) {
                warn!(date = %date, error = %e, "Failed to persist summary marker");
            }
        }
        if records.is_empty() {
            info!(date = %date, "No bets today, skipping summary");
            return Ok(false);
        }

        let report = Accountant::daily_summary(self.source.as_ref(), &records, date, self.unit_stake).await;
        let delivery = self.executor.broadcast(&report.render(date)).await?;
        info!(date = %date, report = %delivery, "Daily summary sent");
        Ok(delivery.is_success())
    }
}
