//! Race-day simulation: full cycles through `RaceMonitor` with a
//! simulated clock and in-memory collaborators.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, TimeZone, Utc};
use rust_decimal_macros::dec;
use std::sync::Arc;

use paddock::config::BettingConfig;
use paddock::engine::executor::AlertExecutor;
use paddock::engine::scanner::OperatingHours;
use paddock::engine::RaceMonitor;
use paddock::jockey::{JockeyTable, JockeyTierLookup};
use paddock::notify::{EvaluationWindow, NotificationStateMachine, NotifiedState};
use paddock::storage::AlertStore;
use paddock::strategy::StrategyEngine;
use paddock::types::*;

use crate::mock_source::{MemoryStore, MockRaceSource, RecordingSink};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn jst() -> FixedOffset {
    FixedOffset::east_opt(9 * 3600).unwrap()
}

/// 2026-05-03 at the given UTC time (JST = UTC+9).
fn at(hour: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 3, hour, min, 0).unwrap()
}

fn race_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 5, 3).unwrap()
}

fn card(id: &str, number: u32, post_time: DateTime<Utc>) -> RaceCard {
    RaceCard {
        race_id: id.to_string(),
        venue: "Tokyo".to_string(),
        race_number: number,
        post_time: Some(post_time),
    }
}

fn snapshot(odds: [rust_decimal::Decimal; 4], jockeys: [&str; 4]) -> OddsSnapshot {
    let posts = [5, 12, 3, 7];
    OddsSnapshot::new(
        (0..4)
            .map(|i| OddsEntry::new(i as u32 + 1, Some(posts[i]), odds[i], Some(jockeys[i])))
            .collect(),
    )
    .with_observed_at(at(6, 25))
}

fn tiers() -> JockeyTierLookup {
    let mut table = JockeyTable::default();
    table.tiers.insert("Lemaire".into(), JockeyTier::A);
    table.rankings.insert("Kawada".into(), 120);
    JockeyTierLookup::new(table)
}

struct Harness {
    source: Arc<MockRaceSource>,
    store: Arc<MemoryStore>,
    sink: Arc<RecordingSink>,
}

impl Harness {
    fn new() -> Self {
        Self {
            source: Arc::new(MockRaceSource::new()),
            store: Arc::new(MemoryStore::default()),
            sink: Arc::new(RecordingSink::default()),
        }
    }

    fn monitor(&self, cooldown: Duration, dry_run: bool) -> RaceMonitor {
        let states = self.store.load_notified_state().unwrap();
        let notifier = NotificationStateMachine::new(Duration::hours(12), cooldown).with_states(states);
        let executor = AlertExecutor::new(
            self.sink.clone(),
            self.store.clone(),
            vec!["1001".into(), "1002".into()],
            BettingConfig::default(),
            jst(),
            dry_run,
        );
        RaceMonitor::new(
            self.source.clone(),
            self.store.clone(),
            Arc::new(tiers()),
            StrategyEngine::default(),
            notifier,
            executor,
            OperatingHours::new(9, 17, jst()),
            EvaluationWindow::from_minutes(15, -2),
            dec!(100),
        )
    }

    /// R1 fires ②, R2 matches nothing, R3 is hours away.
    fn standard_card(&self) {
        self.source.add_race(card("202605030511", 11, at(6, 40)));
        self.source.add_race(card("202605030510", 10, at(6, 35)));
        self.source.add_race(card("202605030512", 12, at(8, 0)));

        self.source.set_odds(
            "202605030511",
            snapshot(
                [dec!(1.8), dec!(4.0), dec!(7.0), dec!(13.0)],
                ["Lemaire", "Kawada", "Nobody", "Nobody"],
            ),
        );
        self.source.set_odds(
            "202605030510",
            snapshot(
                [dec!(4.0), dec!(4.5), dec!(5.0), dec!(6.0)],
                ["Nobody", "Nobody", "Nobody", "Nobody"],
            ),
        );
    }
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_cycle_alerts_matching_race_once() {
    let h = Harness::new();
    h.standard_card();
    let mut monitor = h.monitor(Duration::minutes(15), false);

    let report = monitor.run_cycle(at(6, 30)).await.unwrap();
    assert!(!report.closed);
    assert_eq!(report.races_seen, 3);
    assert_eq!(report.skipped_window, 1);
    assert_eq!(report.evaluated, 2);
    assert_eq!(report.matched, 1);
    assert_eq!(report.sent, 1);
    assert_eq!(report.failed, 0);

    let messages = h.sink.messages();
    assert_eq!(messages.len(), 1);
    let text = &messages[0];
    assert!(text.contains("Strategy ② Favourite first"));
    assert!(text.contains("Tokyo 11R | post 15:40"));
    assert!(text.contains("Odds as of 15:25:00"));
    assert!(text.contains("① 5(A)-12(B)-3(C)"));
    assert!(text.contains("② 5(A)-3(C)-12(B)"));
    assert!(text.contains("https://odds.example.com/race/202605030511"));

    let bets = h.store.bets.lock().unwrap().clone();
    assert_eq!(bets.len(), 1);
    assert_eq!(bets[0].race_id, "202605030511");
    assert_eq!(bets[0].bet_kind, BetKind::Exacta);
    assert_eq!(bets[0].tickets, vec![Ticket::posts(5, 12, 3), Ticket::posts(5, 3, 12)]);

    // Same race inside the TTL: no second alert.
    let report = monitor.run_cycle(at(6, 33)).await.unwrap();
    assert_eq!(report.skipped_notified, 1);
    assert_eq!(report.sent, 0);
    assert_eq!(h.sink.messages().len(), 1);
}

#[tokio::test]
async fn test_races_processed_in_race_id_order() {
    let h = Harness::new();
    // Both races fire; R10 must be alerted before R11.
    h.source.add_race(card("202605030511", 11, at(6, 40)));
    h.source.add_race(card("202605030510", 10, at(6, 35)));
    let odds = [dec!(3.0), dec!(5.0), dec!(8.0), dec!(16.0)];
    let jockeys = ["Nobody"; 4];
    h.source.set_odds("202605030511", snapshot(odds, jockeys));
    h.source.set_odds("202605030510", snapshot(odds, jockeys));

    let mut monitor = h.monitor(Duration::minutes(15), false);
    let report = monitor.run_cycle(at(6, 30)).await.unwrap();
    assert_eq!(report.sent, 2);

    let messages = h.sink.messages();
    assert!(messages[0].contains("Tokyo 10R"));
    assert!(messages[1].contains("Tokyo 11R"));
    assert!(messages[0].contains("Strategy ① Top-3 box"));
    assert!(messages[0].contains("⑥ 3(C)-12(C)-5(C)"));
}

#[tokio::test]
async fn test_rate_limit_defers_until_cooldown() {
    let h = Harness::new();
    h.standard_card();
    h.sink.push_report(DeliveryReport {
        delivered: 0,
        failed: 2,
        rate_limited: true,
    });
    let mut monitor = h.monitor(Duration::minutes(5), false);

    let report = monitor.run_cycle(at(6, 26)).await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(report.sent, 0);
    assert!(h.store.bets.lock().unwrap().is_empty());

    let report = monitor.run_cycle(at(6, 29)).await.unwrap();
    assert_eq!(report.skipped_notified, 1);

    let report = monitor.run_cycle(at(6, 31)).await.unwrap();
    assert_eq!(report.sent, 1);
    assert_eq!(h.sink.messages().len(), 2);
    assert_eq!(h.store.bets.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_state_survives_restart() {
    let h = Harness::new();
    h.standard_card();

    let mut first = h.monitor(Duration::minutes(15), false);
    first.run_cycle(at(6, 30)).await.unwrap();
    assert_eq!(h.sink.messages().len(), 1);

    let mut second = h.monitor(Duration::minutes(15), false);
    let report = second.run_cycle(at(6, 32)).await.unwrap();
    assert_eq!(report.skipped_notified, 1);
    assert_eq!(h.sink.messages().len(), 1);
}

#[tokio::test]
async fn test_missing_odds_is_skipped_silently() {
    let h = Harness::new();
    h.source.add_race(card("202605030501", 1, at(1, 10)));
    let mut monitor = h.monitor(Duration::minutes(15), false);

    let report = monitor.run_cycle(at(1, 0)).await.unwrap();
    assert_eq!(report.no_data, 1);
    assert_eq!(report.evaluated, 0);
    assert!(h.sink.messages().is_empty());
}

#[tokio::test]
async fn test_closed_hours_do_nothing_before_open() {
    let h = Harness::new();
    h.standard_card();
    let mut monitor = h.monitor(Duration::minutes(15), false);

    // 08:30 JST
    let report = monitor.run_cycle(at(23, 30) - Duration::days(1)).await.unwrap();
    assert!(report.closed);
    assert!(!report.summary_sent);
    assert_eq!(h.source.odds_fetches(), 0);
}

#[tokio::test]
async fn test_daily_summary_sent_once_after_close() {
    let h = Harness::new();
    h.standard_card();
    let mut exacta = PayoutTable::new();
    exacta
        .entry(BetKind::Exacta)
        .or_default()
        .insert("5-3".to_string(), dec!(1210));
    h.source.set_payouts("202605030511", exacta);

    let mut monitor = h.monitor(Duration::minutes(15), false);
    monitor.run_cycle(at(6, 30)).await.unwrap();

    // 17:30 JST
    let report = monitor.run_cycle(at(8, 30)).await.unwrap();
    assert!(report.closed);
    assert!(report.summary_sent);

    let messages = h.sink.messages();
    assert_eq!(messages.len(), 2);
    let summary = &messages[1];
    assert!(summary.starts_with("📊 Daily summary 2026-05-03"));
    assert!(summary.contains("races 1 | tickets 2 | hits 1 (50.0%) | stake 200 | payout 1210 | ROI 605.0%"));

    let report = monitor.run_cycle(at(8, 45)).await.unwrap();
    assert!(!report.summary_sent);
    assert_eq!(h.sink.messages().len(), 2);
}

#[tokio::test]
async fn test_dry_run_keeps_store_clean_but_summarises() {
    let h = Harness::new();
    h.standard_card();
    let mut monitor = h.monitor(Duration::minutes(15), true);

    let report = monitor.run_cycle(at(6, 30)).await.unwrap();
    assert_eq!(report.sent, 1);
    assert!(h.store.bets.lock().unwrap().is_empty());
    assert!(h.store.states.lock().unwrap().is_empty());

    let report = monitor.run_cycle(at(8, 30)).await.unwrap();
    assert!(report.summary_sent);
    assert!(h.sink.messages()[1].contains("No payouts for: 202605030511"));
}

#[tokio::test]
async fn test_source_outage_fails_the_cycle() {
    let h = Harness::new();
    h.standard_card();
    h.source.set_error("gateway unreachable");
    let mut monitor = h.monitor(Duration::minutes(15), false);

    let err = monitor.run_cycle(at(6, 30)).await.unwrap_err();
    assert!(err.to_string().contains("gateway unreachable"));
    assert_eq!(monitor.cycle_count(), 1);
}

#[tokio::test]
async fn test_stored_bets_round_trip_for_summary() {
    let h = Harness::new();
    h.standard_card();
    let mut monitor = h.monitor(Duration::minutes(15), false);
    monitor.run_cycle(at(6, 30)).await.unwrap();

    let records = h.store.load_bet_records(race_day()).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].strategy, StrategyId::FavouriteFirst);
    assert_eq!(records[0].stake, dec!(200));
}

#[tokio::test]
async fn test_restored_state_is_pruned_on_first_cycle() {
    let h = Harness::new();
    h.standard_card();
    let stale = NotifiedState {
        last_sent_epoch: Some((at(6, 30) - Duration::days(3)).timestamp()),
        cooldown_until_epoch: None,
    };
    let fresh = NotifiedState {
        last_sent_epoch: Some((at(6, 30) - Duration::hours(1)).timestamp()),
        cooldown_until_epoch: None,
    };
    h.store.states.lock().unwrap().insert("202604300501".into(), stale);
    h.store.states.lock().unwrap().insert("202605030501".into(), fresh);

    let mut monitor = h.monitor(Duration::minutes(15), false);
    assert_eq!(monitor.notifier().states().len(), 2);
    monitor.run_cycle(at(6, 30)).await.unwrap();

    assert!(!monitor.notifier().states().contains_key("202604300501"));
    assert!(monitor.notifier().states().contains_key("202605030501"));
    let stored = h.store.states.lock().unwrap().clone();
    assert!(!stored.contains_key("202604300501"));
    assert!(stored.contains_key("202605030501"));
    assert!(stored.contains_key("202605030511"));
}

#[tokio::test]
async fn test_summary_not_repeated_after_restart() {
    let h = Harness::new();
    h.standard_card();

    let mut first = h.monitor(Duration::minutes(15), false);
    first.run_cycle(at(6, 30)).await.unwrap();
    let report = first.run_cycle(at(8, 30)).await.unwrap();
    assert!(report.summary_sent);
    assert_eq!(h.sink.messages().len(), 2);

    let mut second = h.monitor(Duration::minutes(15), false);
    let report = second.run_cycle(at(8, 40)).await.unwrap();
    assert!(report.closed);
    assert!(!report.summary_sent);
    assert_eq!(h.sink.messages().len(), 2);
}
