//! Strategy engine: odds-band rules and ticket generation.
//!
//! Pure and stateless: a snapshot goes in, at most one `StrategyMatch`
//! comes out. Rules are tried in `StrategyId::PRIORITY` order and the
//! first one that fires wins, since the odds windows overlap.

pub mod bands;
pub mod tickets;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;

use crate::types::{AxisSelection, OddsSnapshot, StrategyId, StrategyMatch};
use bands::{OddsBand, RankBands};

/// Ranks 1–4 must all be present before any rule is tried.
const REQUIRED_RANKS: u32 = 4;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Odds windows for every strategy.
#[derive(Debug, Clone)]
pub struct StrategyConfig {
    /// ① o1 in [2, 10), o2 < 10, o3 < 10, o4 >= 15.
    pub top_three_box: RankBands,
    /// ② o1 < 2, o2 < 10, o3 < 10, o4 >= 12.
    pub favourite_first: RankBands,
    /// ③ gate: o1 <= 2, o2 >= 10.
    pub longshot_gate: RankBands,
    /// ③ outsider window applied to every rank except the favourite.
    pub longshot_band: OddsBand,
    pub min_longshots: usize,
    pub max_longshots: usize,
    /// ④ o1 <= 3, o2 <= 3, o3 in [6, 10], o4 >= 15.
    pub twin_favourites: RankBands,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            top_three_box: RankBands {
                first: OddsBand::half_open(dec!(2.0), dec!(10.0)),
                second: OddsBand::below(dec!(10.0)),
                third: OddsBand::below(dec!(10.0)),
                fourth: OddsBand::at_least(dec!(15.0)),
            },
            favourite_first: RankBands {
                first: OddsBand::below(dec!(2.0)),
                second: OddsBand::below(dec!(10.0)),
                third: OddsBand::below(dec!(10.0)),
                fourth: OddsBand::at_least(dec!(12.0)),
            },
            longshot_gate: RankBands {
                first: OddsBand::at_most(dec!(2.0)),
                second: OddsBand::at_least(dec!(10.0)),
                third: OddsBand::ANY,
                fourth: OddsBand::ANY,
            },
            longshot_band: OddsBand::closed(dec!(10.0), dec!(20.0)),
            min_longshots: 2,
            max_longshots: 4,
            twin_favourites: RankBands {
                first: OddsBand::at_most(dec!(3.0)),
                second: OddsBand::at_most(dec!(3.0)),
                third: OddsBand::closed(dec!(6.0), dec!(10.0)),
                fourth: OddsBand::at_least(dec!(15.0)),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Evaluates odds snapshots against the strategy rules.
pub struct StrategyEngine {
    config: StrategyConfig,
}

impl Default for StrategyEngine {
    fn default() -> Self {
        Self::new(StrategyConfig::default())
    }
}

impl StrategyEngine {
    pub fn new(config: StrategyConfig) -> Self {
        Self { config }
    }

    /// Access the rule configuration.
    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    /// Return the highest-priority rule that fires, with its tickets.
    ///
    /// Snapshots missing any of ranks 1–4 never match.
    pub fn evaluate(&self, snapshot: &OddsSnapshot) -> Option<StrategyMatch> {
        let odds = self.top_odds(snapshot)?;

        let found = StrategyId::PRIORITY
            .into_iter()
            .find_map(|strategy| self.try_rule(strategy, snapshot, odds));

        match &found {
            Some(m) => debug!(
                strategy = %m.strategy,
                tickets = m.tickets.len(),
                o1 = %odds[0],
                o2 = %odds[1],
                o3 = %odds[2],
                o4 = %odds[3],
                "Strategy matched"
            ),
            None => debug!(
                o1 = %odds[0],
                o2 = %odds[1],
                o3 = %odds[2],
                o4 = %odds[3],
                "No strategy matched"
            ),
        }

        found
    }

    /// Every rule whose conditions hold, in priority order.
    pub fn matching_rules(&self, snapshot: &OddsSnapshot) -> Vec<StrategyId> {
        let Some(odds) = self.top_odds(snapshot) else {
            return Vec::new();
        };
        StrategyId::PRIORITY
            .into_iter()
            .filter(|&s| self.try_rule(s, snapshot, odds).is_some())
            .collect()
    }

    fn top_odds(&self, snapshot: &OddsSnapshot) -> Option<[Decimal; 4]> {
        if !snapshot.has_top_ranks(REQUIRED_RANKS) {
            debug!(
                entries = snapshot.len(),
                "Snapshot lacks ranks 1-4, skipping evaluation"
            );
            return None;
        }
        Some([
            snapshot.odds_at(1)?,
            snapshot.odds_at(2)?,
            snapshot.odds_at(3)?,
            snapshot.odds_at(4)?,
        ])
    }

    fn try_rule(
        &self,
        strategy: StrategyId,
        snapshot: &OddsSnapshot,
        odds: [Decimal; 4],
    ) -> Option<StrategyMatch> {
        let odds = odds.map(Some);
        let cfg = &self.config;

        let tickets = match strategy {
            StrategyId::FavouriteFirst => {
                if !cfg.favourite_first.matches(odds) {
                    return None;
                }
                tickets::fixed(&[[1, 2, 3], [1, 3, 2]])
            }
            StrategyId::TopThreeBox => {
                if !cfg.top_three_box.matches(odds) {
                    return None;
                }
                tickets::permutations([1, 2, 3])
            }
            StrategyId::FavouriteWithLongshots => {
                if !cfg.longshot_gate.matches(odds) {
                    return None;
                }
                return self.longshot_match(snapshot);
            }
            StrategyId::TwinFavourites => {
                if !cfg.twin_favourites.matches(odds) {
                    return None;
                }
                tickets::fixed(&[[1, 2, 3], [2, 1, 3]])
            }
        };

        Some(StrategyMatch {
            strategy,
            tickets,
            axis: None,
        })
    }

    /// Strategy ③: favourite as axis, mid-priced outsiders behind it.
    fn longshot_match(&self, snapshot: &OddsSnapshot) -> Option<StrategyMatch> {
        let candidates: Vec<u32> = snapshot
            .entries()
            .iter()
            .filter(|e| e.popularity_rank != 1 && self.config.longshot_band.contains(e.win_odds))
            .map(|e| e.popularity_rank)
            .take(self.config.max_longshots)
            .collect();

        if candidates.len() < self.config.min_longshots {
            debug!(
                candidates = candidates.len(),
                required = self.config.min_longshots,
                "Longshot gate passed but too few candidates"
            );
            return None;
        }

        Some(StrategyMatch {
            strategy: StrategyId::FavouriteWithLongshots,
            tickets: tickets::axis_first(1, &candidates),
            axis: Some(AxisSelection {
                axis_rank: 1,
                candidate_ranks: candidates,
            }),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
