//! End-of-day rollup of logged bets against official payouts.
//!
//! Pure arithmetic: the caller fetches payouts and hands them in.
//! Rates are percentages and read 0 when their denominator is 0.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::Write as _;

use crate::types::{BetKind, BetRecord, PayoutTable, StrategyId, Ticket};

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Figures for one strategy (or the whole day).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StrategySummary {
    pub races: usize,
    pub tickets: usize,
    pub stake: Decimal,
    pub hits: usize,
    pub payout: Decimal,
}

impl StrategySummary {
    /// hits / tickets, in percent.
    pub fn hit_rate_pct(&self) -> Decimal {
        if self.tickets == 0 {
            return Decimal::ZERO;
        }
        (Decimal::from(self.hits as u64) * dec!(100) / Decimal::from(self.tickets as u64)).round_dp(1)
    }

    /// payout / stake, in percent.
    pub fn roi_pct(&self) -> Decimal {
        if self.stake.is_zero() {
            return Decimal::ZERO;
        }
        (self.payout * dec!(100) / self.stake).round_dp(1)
    }

    pub fn profit(&self) -> Decimal {
        self.payout - self.stake
    }
}

/// Per-strategy rows (all four, in numeric order) plus a total row.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryReport {
    pub rows: BTreeMap<StrategyId, StrategySummary>,
    pub total: StrategySummary,
    /// Races with bets but no payout table; their tickets count as misses.
    pub missing_payouts: Vec<String>,
}

impl SummaryReport {
    pub fn row(&self, strategy: StrategyId) -> Option<&StrategySummary> {
        self.rows.get(&strategy)
    }

    /// Message text for the day.
    pub fn render(&self, date: NaiveDate) -> String {
        let mut out = format!("📊 Daily summary {}\n", date.format("%Y-%m-%d"));
        for (strategy, row) in &self.rows {
            let _ = write!(out, "\n{strategy}\n");
            let _ = writeln!(out, "  {}", render_row(row));
        }
        let _ = write!(out, "\nTotal\n  {}", render_row(&self.total));
        if !self.missing_payouts.is_empty() {
            let _ = write!(
                out,
                "\n\n⚠ No payouts for: {}",
                self.missing_payouts.join(", ")
            );
        }
        out
    }
}

fn render_row(row: &StrategySummary) -> String {
    format!(
        "races {} | tickets {} | hits {} ({:.1}%) | stake {} | payout {} | ROI {:.1}%",
        row.races,
        row.tickets,
        row.hits,
        row.hit_rate_pct(),
        row.stake.normalize(),
        row.payout.normalize(),
        row.roi_pct(),
    )
}

// ---------------------------------------------------------------------------
// Ticket matching
// ---------------------------------------------------------------------------

/// Key a post-number ticket under a pool's combination format.
///
/// Two-horse pools use the first two legs. Order-insensitive pools sort the
/// legs. Rank tickets have no key and can never hit.
pub fn ticket_key(kind: BetKind, ticket: &Ticket) -> Option<String> {
    if !ticket.is_post_based() {
        return None;
    }
    Some(combination_key(kind, &ticket.legs[..kind.legs()]))
}

/// Normalise a combination string as published (`"12-5"`, `"5 - 12"`).
pub fn normalize_key(kind: BetKind, raw: &str) -> Option<String> {
    let legs: Option<Vec<u32>> = raw
        .split(['-', '>', ' '])
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().ok())
        .collect();
    let legs = legs?;
    if legs.len() != kind.legs() {
        return None;
    }
    Some(combination_key(kind, &legs))
}

fn combination_key(kind: BetKind, legs: &[u32]) -> String {
    let mut legs = legs.to_vec();
    if kind.is_order_insensitive() {
        legs.sort_unstable();
    }
    legs.iter()
        .map(|l| l.to_string())
        .collect::<Vec<_>>()
        .join("-")
}

fn payout_for(table: &PayoutTable, kind: BetKind, ticket: &Ticket) -> Option<Decimal> {
    let key = ticket_key(kind, ticket)?;
    table
        .get(&kind)?
        .iter()
        .find(|(raw, _)| normalize_key(kind, raw).as_deref() == Some(key.as_str()))
        .map(|(_, amount)| *amount)
}

/// A record's tickets with repeated pool combinations removed, first
/// occurrence kept. Rank tickets have no combination and are all kept.
fn distinct_tickets(record: &BetRecord) -> Vec<&Ticket> {
    let mut seen = HashSet::new();
    record
        .tickets
        .iter()
        .filter(|t| match ticket_key(record.bet_kind, t) {
            Some(key) => seen.insert(key),
            None => true,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Roll up a day's bet records.
///
/// `payouts` maps race id to its official payout table. Stake is
/// `tickets × unit_stake`, so records logged under a different unit are
/// re-based to today's. Tickets that collapse to the same combination in
/// the record's pool (a trio listed in two orders) count once.
pub fn summarize(
    records: &[BetRecord],
    payouts: &HashMap<String, PayoutTable>,
    unit_stake: Decimal,
) -> SummaryReport {
    let mut rows: BTreeMap<StrategyId, StrategySummary> = StrategyId::ALL
        .into_iter()
        .map(|s| (s, StrategySummary::default()))
        .collect();
    let mut races: HashMap<StrategyId, HashSet<&str>> = HashMap::new();
    let mut all_races: HashSet<&str> = HashSet::new();
    let mut missing: Vec<String> = Vec::new();

    for record in records {
        let row = rows.entry(record.strategy).or_default();
        races.entry(record.strategy).or_default().insert(&record.race_id);
        all_races.insert(&record.race_id);

        let tickets = distinct_tickets(record);
        let count = tickets.len();
        row.tickets += count;
        row.stake += unit_stake * Decimal::from(count as u64);

        let Some(table) = payouts.get(&record.race_id) else {
            if !missing.contains(&record.race_id) {
                missing.push(record.race_id.clone());
            }
            continue;
        };
        for ticket in tickets {
            if let Some(amount) = payout_for(table, record.bet_kind, ticket) {
                row.hits += 1;
                row.payout += amount;
            }
        }
    }

    for (strategy, set) in &races {
        if let Some(row) = rows.get_mut(strategy) {
            row.races = set.len();
        }
    }

    let mut total = rows.values().fold(StrategySummary::default(), |mut acc, r| {
        acc.tickets += r.tickets;
        acc.stake += r.stake;
        acc.hits += r.hits;
        acc.payout += r.payout;
        acc
    });
    total.races = all_races.len();
    missing.sort();

    SummaryReport {
        rows,
        total,
        missing_payouts: missing,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, 3).unwrap()
    }

    fn record(race: &str, strategy: StrategyId, kind: BetKind, tickets: Vec<Ticket>) -> BetRecord {
        BetRecord::new(
            day(),
            race,
            strategy,
            kind,
            tickets,
            dec!(100),
            Utc.with_ymd_and_hms(2026, 5, 3, 6, 30, 0).unwrap(),
        )
    }

    fn table(kind: BetKind, combo: &str, amount: Decimal) -> PayoutTable {
        let mut t = PayoutTable::new();
        t.entry(kind).or_default().insert(combo.to_string(), amount);
        t
    }

    #[test]
    fn test_empty_day_reports_zero_rates() {
        let report = summarize(&[], &HashMap::new(), dec!(100));
        assert_eq!(report.rows.len(), 4);
        for row in report.rows.values() {
            assert_eq!(row.hit_rate_pct(), Decimal::ZERO);
            assert_eq!(row.roi_pct(), Decimal::ZERO);
        }
        assert_eq!(report.total.tickets, 0);
    }

    #[test]
    fn test_trio_matches_in_any_order() {
        let records = vec![record(
            "R1",
            StrategyId::TwinFavourites,
            BetKind::Trio,
            vec![Ticket::posts(5, 12, 3), Ticket::posts(12, 5, 7)],
        )];
        let mut payouts = HashMap::new();
        payouts.insert("R1".to_string(), table(BetKind::Trio, "3-5-12", dec!(1450)));

        let report = summarize(&records, &payouts, dec!(100));
        let row = report.row(StrategyId::TwinFavourites).unwrap();
        assert_eq!(row.races, 1);
        assert_eq!(row.tickets, 2);
        assert_eq!(row.stake, dec!(200));
        assert_eq!(row.hits, 1);
        assert_eq!(row.payout, dec!(1450));
        assert_eq!(row.hit_rate_pct(), dec!(50.0));
        assert_eq!(row.roi_pct(), dec!(725.0));
    }

    #[test]
    fn test_trifecta_is_order_sensitive() {
        let records = vec![record(
            "R1",
            StrategyId::FavouriteWithLongshots,
            BetKind::Trifecta,
            vec![Ticket::posts(5, 12, 3), Ticket::posts(5, 3, 12)],
        )];
        let mut payouts = HashMap::new();
        payouts.insert("R1".to_string(), table(BetKind::Trifecta, "5-3-12", dec!(8800)));

        let report = summarize(&records, &payouts, dec!(100));
        let row = report.row(StrategyId::FavouriteWithLongshots).unwrap();
        assert_eq!(row.hits, 1);
        assert_eq!(row.payout, dec!(8800));
    }

    #[test]
    fn test_two_horse_pools_use_first_two_legs() {
        let records = vec![
            record("R1", StrategyId::TopThreeBox, BetKind::Quinella, vec![Ticket::posts(12, 5, 3)]),
            record("R2", StrategyId::FavouriteFirst, BetKind::Exacta, vec![Ticket::posts(12, 5, 3)]),
        ];
        let mut payouts = HashMap::new();
        payouts.insert("R1".to_string(), table(BetKind::Quinella, "5-12", dec!(640)));
        payouts.insert("R2".to_string(), table(BetKind::Exacta, "5-12", dec!(900)));

        let report = summarize(&records, &payouts, dec!(100));
        assert_eq!(report.row(StrategyId::TopThreeBox).unwrap().hits, 1);
        // Exacta 5-12 does not pay 12-5.
        assert_eq!(report.row(StrategyId::FavouriteFirst).unwrap().hits, 0);
    }

    #[test]
    fn test_repeated_combination_pays_once() {
        // Top-3 permutations under quinella repeat every pair.
        let records = vec![record(
            "R1",
            StrategyId::TopThreeBox,
            BetKind::Quinella,
            vec![
                Ticket::posts(5, 12, 3),
                Ticket::posts(5, 3, 12),
                Ticket::posts(12, 5, 3),
                Ticket::posts(12, 3, 5),
                Ticket::posts(3, 5, 12),
                Ticket::posts(3, 12, 5),
            ],
        )];
        let mut payouts = HashMap::new();
        payouts.insert("R1".to_string(), table(BetKind::Quinella, "5-12", dec!(640)));

        let row = summarize(&records, &payouts, dec!(100)).row(StrategyId::TopThreeBox).cloned().unwrap();
        assert_eq!(row.tickets, 3);
        assert_eq!(row.stake, dec!(300));
        assert_eq!(row.hits, 1);
        assert_eq!(row.payout, dec!(640));
    }

    #[test]
    fn test_twin_favourite_trio_orders_collapse() {
        let records = vec![record(
            "R1",
            StrategyId::TwinFavourites,
            BetKind::Trio,
            vec![Ticket::posts(5, 12, 3), Ticket::posts(12, 5, 3)],
        )];
        let mut payouts = HashMap::new();
        payouts.insert("R1".to_string(), table(BetKind::Trio, "3-5-12", dec!(1450)));

        let report = summarize(&records, &payouts, dec!(100));
        let row = report.row(StrategyId::TwinFavourites).unwrap();
        assert_eq!(row.tickets, 1);
        assert_eq!(row.hits, 1);
        assert_eq!(row.payout, dec!(1450));
    }

    #[test]
    fn test_rank_tickets_never_hit() {
        let records = vec![record(
            "R1",
            StrategyId::TwinFavourites,
            BetKind::Trio,
            vec![Ticket::ranks(1, 2, 3)],
        )];
        let mut payouts = HashMap::new();
        payouts.insert("R1".to_string(), table(BetKind::Trio, "1-2-3", dec!(500)));

        let report = summarize(&records, &payouts, dec!(100));
        assert_eq!(report.row(StrategyId::TwinFavourites).unwrap().hits, 0);
    }

    #[test]
    fn test_missing_payouts_are_misses() {
        let records = vec![
            record("R2", StrategyId::TopThreeBox, BetKind::Quinella, vec![Ticket::posts(1, 2, 3)]),
            record("R1", StrategyId::TopThreeBox, BetKind::Quinella, vec![Ticket::posts(1, 2, 3)]),
        ];
        let report = summarize(&records, &HashMap::new(), dec!(100));
        let row = report.row(StrategyId::TopThreeBox).unwrap();
        assert_eq!(row.races, 2);
        assert_eq!(row.hits, 0);
        assert_eq!(report.missing_payouts, vec!["R1", "R2"]);
    }

    #[test]
    fn test_totals_and_distinct_races() {
        let records = vec![
            record("R1", StrategyId::TopThreeBox, BetKind::Quinella, vec![Ticket::posts(1, 2, 3)]),
            record("R1", StrategyId::TopThreeBox, BetKind::Quinella, vec![Ticket::posts(1, 3, 2)]),
            record("R2", StrategyId::FavouriteFirst, BetKind::Exacta, vec![Ticket::posts(4, 5, 6)]),
        ];
        let mut payouts = HashMap::new();
        payouts.insert("R1".to_string(), table(BetKind::Quinella, "1-2", dec!(300)));
        payouts.insert("R2".to_string(), table(BetKind::Exacta, "9-8", dec!(2000)));

        let report = summarize(&records, &payouts, dec!(100));
        assert_eq!(report.row(StrategyId::TopThreeBox).unwrap().races, 1);
        assert_eq!(report.total.races, 2);
        assert_eq!(report.total.tickets, 3);
        assert_eq!(report.total.stake, dec!(300));
        assert_eq!(report.total.payout, dec!(300));
        assert_eq!(report.total.roi_pct(), dec!(100.0));
        assert_eq!(report.total.profit(), Decimal::ZERO);
    }

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key(BetKind::Trio, "12 - 5 - 3").as_deref(), Some("3-5-12"));
        assert_eq!(normalize_key(BetKind::Trifecta, "12>5>3").as_deref(), Some("12-5-3"));
        assert_eq!(normalize_key(BetKind::Quinella, "1-2-3"), None);
        assert_eq!(normalize_key(BetKind::Exacta, "x-2"), None);
    }

    #[test]
    fn test_render_lists_every_strategy() {
        let records = vec![record(
            "R1",
            StrategyId::TwinFavourites,
            BetKind::Trio,
            vec![Ticket::posts(5, 12, 3)],
        )];
        let mut payouts = HashMap::new();
        payouts.insert("R1".to_string(), table(BetKind::Trio, "3-5-12", dec!(1450)));
        let text = summarize(&records, &payouts, dec!(100)).render(day());

        assert!(text.starts_with("📊 Daily summary 2026-05-03"));
        for s in StrategyId::ALL {
            assert!(text.contains(&s.to_string()));
        }
        assert!(text.contains("races 1 | tickets 1 | hits 1 (100.0%) | stake 100 | payout 1450 | ROI 1450.0%"));
        assert!(!text.contains("No payouts"));
    }
}
