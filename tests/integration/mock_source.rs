//! In-memory collaborators for integration testing.
//!
//! A race source with scripted odds and payouts, a store, and a sink
//! that records every message; all controllable from test code.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use paddock::notify::{MessageSink, NotifiedState};
use paddock::sources::RaceSource;
use paddock::storage::AlertStore;
use paddock::types::*;

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockRaceSource {
    races: Mutex<Vec<RaceCard>>,
    odds: Mutex<HashMap<String, OddsSnapshot>>,
    payouts: Mutex<HashMap<String, PayoutTable>>,
    /// If set, every fetch fails with this message.
    force_error: Mutex<Option<String>>,
    odds_fetches: Mutex<usize>,
}

impl MockRaceSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_race(&self, card: RaceCard) {
        self.races.lock().unwrap().push(card);
    }

    pub fn set_odds(&self, race_id: &str, snapshot: OddsSnapshot) {
        self.odds.lock().unwrap().insert(race_id.to_string(), snapshot);
    }

    pub fn set_payouts(&self, race_id: &str, table: PayoutTable) {
        self.payouts.lock().unwrap().insert(race_id.to_string(), table);
    }

    pub fn set_error(&self, msg: &str) {
        *self.force_error.lock().unwrap() = Some(msg.to_string());
    }

    pub fn odds_fetches(&self) -> usize {
        *self.odds_fetches.lock().unwrap()
    }

    fn check_error(&self) -> Result<()> {
        match self.force_error.lock().unwrap().as_ref() {
            Some(msg) => Err(anyhow!("{msg}")),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RaceSource for MockRaceSource {
    async fn list_races(&self, _date: NaiveDate) -> Result<Vec<RaceCard>> {
        self.check_error()?;
        Ok(self.races.lock().unwrap().clone())
    }

    async fn fetch_odds(&self, race_id: &str) -> Result<Option<OddsSnapshot>> {
        self.check_error()?;
        *self.odds_fetches.lock().unwrap() += 1;
        Ok(self.odds.lock().unwrap().get(race_id).cloned())
    }

    async fn fetch_post_time(&self, race_id: &str) -> Result<Option<DateTime<Utc>>> {
        self.check_error()?;
        Ok(self
            .races
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.race_id == race_id)
            .and_then(|c| c.post_time))
    }

    async fn fetch_payouts(&self, race_id: &str) -> Result<Option<PayoutTable>> {
        self.check_error()?;
        Ok(self.payouts.lock().unwrap().get(race_id).cloned())
    }

    fn odds_url(&self, race_id: &str) -> String {
        format!("https://odds.example.com/race/{race_id}")
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryStore {
    pub states: Mutex<HashMap<String, NotifiedState>>,
    pub bets: Mutex<Vec<BetRecord>>,
    pub summary_date: Mutex<Option<NaiveDate>>,
}

impl AlertStore for MemoryStore {
    fn load_notified_state(&self) -> Result<HashMap<String, NotifiedState>> {
        Ok(self.states.lock().unwrap().clone())
    }

    fn save_notified_state(&self, race_id: &str, state: &NotifiedState) -> Result<()> {
        self.states.lock().unwrap().insert(race_id.to_string(), *state);
        Ok(())
    }

    fn replace_notified_state(&self, states: &HashMap<String, NotifiedState>) -> Result<()> {
        *self.states.lock().unwrap() = states.clone();
        Ok(())
    }

    fn last_summary_date(&self) -> Result<Option<NaiveDate>> {
        Ok(*self.summary_date.lock().unwrap())
    }

    fn mark_summary_sent(&self, date: NaiveDate) -> Result<()> {
        *self.summary_date.lock().unwrap() = Some(date);
        Ok(())
    }

    fn append_bet_record(&self, record: &BetRecord) -> Result<()> {
        self.bets.lock().unwrap().push(record.clone());
        Ok(())
    }

    fn load_bet_records(&self, date: NaiveDate) -> Result<Vec<BetRecord>> {
        Ok(self
            .bets
            .lock()
            .unwrap()
            .iter()
            .filter(|b| b.date == date)
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Sink
// ---------------------------------------------------------------------------

/// Records every message. Scripted reports are returned in order; once
/// they run out every send is delivered to all recipients.
#[derive(Default)]
pub struct RecordingSink {
    pub sent: Mutex<Vec<String>>,
    script: Mutex<VecDeque<DeliveryReport>>,
}

impl RecordingSink {
    pub fn push_report(&self, report: DeliveryReport) {
        self.script.lock().unwrap().push_back(report);
    }

    pub fn messages(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageSink for RecordingSink {
    async fn send(&self, recipients: &[String], text: &str) -> Result<DeliveryReport> {
        self.sent.lock().unwrap().push(text.to_string());
        let scripted = self.script.lock().unwrap().pop_front();
        Ok(scripted.unwrap_or(DeliveryReport {
            delivered: recipients.len(),
            ..DeliveryReport::default()
        }))
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}
