//! Alert executor.
//!
//! Renders a matched race, pushes it through the message sink, records
//! the attempt in the notification state machine and, on success, logs
//! the implied bet. In dry-run mode nothing touches the store.

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::BettingConfig;
use crate::format::{to_post_numbers, TicketFormatter};
use crate::jockey::TierSource;
use crate::notify::{MessageSink, NotificationStateMachine, NotifiedState};
use crate::storage::AlertStore;
use crate::types::{BetRecord, DeliveryReport, OddsSnapshot, RaceContext, StrategyMatch};

// ---------------------------------------------------------------------------
// Dispatch result
// ---------------------------------------------------------------------------

/// Result of alerting one race.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// At least one recipient got the message. `persisted` is false in
    /// dry-run mode or when the store rejected the bet record.
    Sent { record: BetRecord, persisted: bool },
    Failed { rate_limited: bool },
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

pub struct AlertExecutor {
    sink: Arc<dyn MessageSink>,
    store: Arc<dyn AlertStore>,
    recipients: Vec<String>,
    betting: BettingConfig,
    utc_offset: FixedOffset,
    dry_run: bool,
}

impl AlertExecutor {
    pub fn new(
        sink: Arc<dyn MessageSink>,
        store: Arc<dyn AlertStore>,
        recipients: Vec<String>,
        betting: BettingConfig,
        utc_offset: FixedOffset,
        dry_run: bool,
    ) -> Self {
        Self {
            sink,
            store,
            recipients,
            betting,
            utc_offset,
            dry_run,
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Send free-form text (daily summary) to every recipient.
    pub async fn broadcast(&self, text: &str) -> Result<DeliveryReport> {
        self.sink
            .send(&self.recipients, text)
            .await
            .with_context(|| format!("{} sink failed", self.sink.name()))
    }

    /// Alert one matched race.
    ///
    /// Delivery failures are an outcome. Once a message has gone out,
    /// storage errors are logged rather than returned so the bet is
    /// never dropped along with the error.
    #[allow(clippy::too_many_arguments)]
    pub async fn dispatch(
        &self,
        notifier: &mut NotificationStateMachine,
        tiers: &dyn TierSource,
        matched: &StrategyMatch,
        snapshot: &OddsSnapshot,
        race: &RaceContext,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<DispatchOutcome> {
        let text = TicketFormatter::new(tiers, self.utc_offset).render_message(matched, snapshot, race);

        let report = match self.sink.send(&self.recipients, &text).await {
            Ok(r) => r,
            Err(e) => {
                warn!(race_id = %race.race_id, sink = self.sink.name(), error = %e, "Sink error");
                DeliveryReport {
                    failed: self.recipients.len(),
                    ..DeliveryReport::default()
                }
            }
        };

        let success = report.is_success();
        let state = notifier.record_attempt(&race.race_id, now, success, report.rate_limited);

        if !success {
            self.persist_state(&race.race_id, &state);
            warn!(
                race_id = %race.race_id,
                strategy = %matched.strategy,
                report = %report,
                "Alert not delivered"
            );
            return Ok(DispatchOutcome::Failed {
                rate_limited: report.rate_limited,
            });
        }

        let record = BetRecord::new(
            date,
            &race.race_id,
            matched.strategy,
            self.betting.bet_kind(matched.strategy),
            to_post_numbers(&matched.tickets, snapshot),
            self.betting.unit_stake,
            now,
        );
        let persisted = !self.dry_run
            && match self.store.append_bet_record(&record) {
                Ok(()) => true,
                Err(e) => {
                    warn!(race_id = %race.race_id, error = %e, "Failed to log bet, keeping it in memory");
                    false
                }
            };
        self.persist_state(&race.race_id, &state);

        info!(
            race_id = %race.race_id,
            strategy = %matched.strategy,
            bet = %record,
            report = %report,
            dry_run = self.dry_run,
            "Alert sent"
        );
        Ok(DispatchOutcome::Sent { record, persisted })
    }

    /// Save a race's state. The in-memory machine stays authoritative for
    /// this process if the write fails.
    fn persist_state(&self, race_id: &str, state: &NotifiedState) {
        if self.dry_run {
            return;
        }
        if let Err(e) = self.store.save_notified_state(race_id, state) {
            warn!(race_id, error = %e, "Failed to persist notification state");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
