//! Shared types for the PADDOCK watcher.
//!
//! These types form the data model used across all modules.
//! They are designed to be stable so that source, strategy, formatting
//! and engine modules can depend on them without circular references.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::{debug, warn};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Odds
// ---------------------------------------------------------------------------

/// One horse's line in an odds snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OddsEntry {
    /// 1 = favourite. Unique within a snapshot.
    pub popularity_rank: u32,
    #[serde(default)]
    pub post_number: Option<u32>,
    /// Decimal win odds (payout multiplier).
    pub win_odds: Decimal,
    #[serde(default)]
    pub jockey_name: Option<String>,
}

impl OddsEntry {
    pub fn new(
        popularity_rank: u32,
        post_number: Option<u32>,
        win_odds: Decimal,
        jockey_name: Option<&str>,
    ) -> Self {
        Self {
            popularity_rank,
            post_number,
            win_odds,
            jockey_name: jockey_name.map(String::from),
        }
    }
}

impl fmt::Display for OddsEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let post = self
            .post_number
            .map(|p| format!("#{p}"))
            .unwrap_or_else(|| "#?".to_string());
        write!(
            f,
            "{post} fav{} {:.1}x ({})",
            self.popularity_rank,
            self.win_odds,
            self.jockey_name.as_deref().unwrap_or("unknown jockey"),
        )
    }
}

/// Raw runner odds before popularity ranks are assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerOdds {
    #[serde(default)]
    pub post_number: Option<u32>,
    pub win_odds: Decimal,
    #[serde(default)]
    pub jockey_name: Option<String>,
}

/// Win odds for every runner in one race at one point in time.
///
/// Built fresh from each fetch, immutable afterwards. Entries are kept
/// sorted by popularity rank with O(1) lookup by rank and by post number.
#[derive(Debug, Clone, Default)]
pub struct OddsSnapshot {
    entries: Vec<OddsEntry>,
    by_rank: HashMap<u32, usize>,
    by_post: HashMap<u32, usize>,
    observed_at: Option<DateTime<Utc>>,
}

impl OddsSnapshot {
    /// Build a snapshot from ranked entries.
    ///
    /// Entries with rank 0 or non-positive odds are dropped. When two
    /// entries claim the same rank the first one wins.
    pub fn new(entries: Vec<OddsEntry>) -> Self {
        let mut seen = HashSet::new();
        let mut kept: Vec<OddsEntry> = Vec::with_capacity(entries.len());

        for entry in entries {
            if entry.popularity_rank == 0 || entry.win_odds <= Decimal::ZERO {
                debug!(
                    rank = entry.popularity_rank,
                    odds = %entry.win_odds,
                    "Dropping unusable odds entry"
                );
                continue;
            }
            if !seen.insert(entry.popularity_rank) {
                warn!(rank = entry.popularity_rank, "Duplicate popularity rank, keeping first");
                continue;
            }
            kept.push(entry);
        }

        kept.sort_by_key(|e| e.popularity_rank);

        let mut by_rank = HashMap::with_capacity(kept.len());
        let mut by_post = HashMap::with_capacity(kept.len());
        for (idx, entry) in kept.iter().enumerate() {
            by_rank.insert(entry.popularity_rank, idx);
            if let Some(post) = entry.post_number {
                by_post.entry(post).or_insert(idx);
            }
        }

        Self {
            entries: kept,
            by_rank,
            by_post,
            observed_at: None,
        }
    }

    /// Assign popularity ranks by ascending win odds (ties broken by post
    /// number) and build a snapshot. Scratched runners (odds <= 0) are skipped.
    pub fn rank_by_odds(runners: Vec<RunnerOdds>) -> Self {
        let mut runners: Vec<RunnerOdds> = runners
            .into_iter()
            .filter(|r| r.win_odds > Decimal::ZERO)
            .collect();

        runners.sort_by(|a, b| {
            a.win_odds
                .cmp(&b.win_odds)
                .then_with(|| match (a.post_number, b.post_number) {
                    (Some(x), Some(y)) => x.cmp(&y),
                    (Some(_), None) => std::cmp::Ordering::Less,
                    (None, Some(_)) => std::cmp::Ordering::Greater,
                    (None, None) => std::cmp::Ordering::Equal,
                })
        });

        let entries = runners
            .into_iter()
            .enumerate()
            .map(|(i, r)| OddsEntry {
                popularity_rank: i as u32 + 1,
                post_number: r.post_number,
                win_odds: r.win_odds,
                jockey_name: r.jockey_name,
            })
            .collect();

        Self::new(entries)
    }

    /// Attach the time the odds were observed on the source.
    pub fn with_observed_at(mut self, observed_at: DateTime<Utc>) -> Self {
        self.observed_at = Some(observed_at);
        self
    }

    pub fn by_rank(&self, rank: u32) -> Option<&OddsEntry> {
        self.by_rank.get(&rank).map(|&i| &self.entries[i])
    }

    pub fn by_post(&self, post_number: u32) -> Option<&OddsEntry> {
        self.by_post.get(&post_number).map(|&i| &self.entries[i])
    }

    /// Win odds at a popularity rank.
    pub fn odds_at(&self, rank: u32) -> Option<Decimal> {
        self.by_rank(rank).map(|e| e.win_odds)
    }

    /// Whether every rank in `1..=n` is present.
    pub fn has_top_ranks(&self, n: u32) -> bool {
        (1..=n).all(|r| self.by_rank.contains_key(&r))
    }

    /// Entries in ascending rank order.
    pub fn entries(&self) -> &[OddsEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn observed_at(&self) -> Option<DateTime<Utc>> {
        self.observed_at
    }
}

// ---------------------------------------------------------------------------
// Strategies & tickets
// ---------------------------------------------------------------------------

/// The four alert strategies, numbered as they appear in messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum StrategyId {
    /// ① Top three tightly bunched, fourth drifting: box the top three.
    TopThreeBox,
    /// ② Odds-on favourite with a clear top three: favourite first.
    FavouriteFirst,
    /// ③ Strong favourite over a spread of mid-priced outsiders.
    FavouriteWithLongshots,
    /// ④ Two short-priced favourites with a settled third.
    TwinFavourites,
}

impl StrategyId {
    /// Numeric order (1–4), useful for iteration and reports.
    pub const ALL: [StrategyId; 4] = [
        StrategyId::TopThreeBox,
        StrategyId::FavouriteFirst,
        StrategyId::FavouriteWithLongshots,
        StrategyId::TwinFavourites,
    ];

    /// Evaluation precedence: the first matching rule wins.
    pub const PRIORITY: [StrategyId; 4] = [
        StrategyId::FavouriteFirst,
        StrategyId::TopThreeBox,
        StrategyId::FavouriteWithLongshots,
        StrategyId::TwinFavourites,
    ];

    pub fn number(&self) -> u8 {
        match self {
            StrategyId::TopThreeBox => 1,
            StrategyId::FavouriteFirst => 2,
            StrategyId::FavouriteWithLongshots => 3,
            StrategyId::TwinFavourites => 4,
        }
    }

    /// Circled numeral used in alert text.
    pub fn symbol(&self) -> &'static str {
        match self {
            StrategyId::TopThreeBox => "①",
            StrategyId::FavouriteFirst => "②",
            StrategyId::FavouriteWithLongshots => "③",
            StrategyId::TwinFavourites => "④",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StrategyId::TopThreeBox => "Top-3 box",
            StrategyId::FavouriteFirst => "Favourite first",
            StrategyId::FavouriteWithLongshots => "Favourite + longshots",
            StrategyId::TwinFavourites => "Twin favourites",
        }
    }
}

impl fmt::Display for StrategyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.symbol(), self.label())
    }
}

impl From<StrategyId> for u8 {
    fn from(id: StrategyId) -> u8 {
        id.number()
    }
}

impl TryFrom<u8> for StrategyId {
    type Error = PaddockError;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        StrategyId::ALL
            .into_iter()
            .find(|s| s.number() == n)
            .ok_or(PaddockError::UnknownStrategy(n))
    }
}

/// What the three legs of a ticket refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketBasis {
    Rank,
    PostNumber,
}

/// One finish-order combination (1st-2nd-3rd).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ticket {
    pub basis: TicketBasis,
    pub legs: [u32; 3],
}

impl Ticket {
    pub fn ranks(first: u32, second: u32, third: u32) -> Self {
        Self {
            basis: TicketBasis::Rank,
            legs: [first, second, third],
        }
    }

    pub fn posts(first: u32, second: u32, third: u32) -> Self {
        Self {
            basis: TicketBasis::PostNumber,
            legs: [first, second, third],
        }
    }

    pub fn is_post_based(&self) -> bool {
        self.basis == TicketBasis::PostNumber
    }

    /// The three legs refer to three different horses.
    pub fn is_distinct(&self) -> bool {
        let [a, b, c] = self.legs;
        a != b && b != c && a != c
    }

    pub fn sorted_legs(&self) -> [u32; 3] {
        let mut legs = self.legs;
        legs.sort_unstable();
        legs
    }
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c] = self.legs;
        write!(f, "{a}-{b}-{c}")
    }
}

/// Axis horse and outsider candidates picked by strategy ③.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AxisSelection {
    pub axis_rank: u32,
    /// Candidate popularity ranks, ascending.
    pub candidate_ranks: Vec<u32>,
}

impl AxisSelection {
    /// n·(n−1) ordered pairs of candidates behind the axis.
    pub fn point_count(&self) -> usize {
        let n = self.candidate_ranks.len();
        n * n.saturating_sub(1)
    }
}

/// A fired strategy with the tickets it implies.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyMatch {
    pub strategy: StrategyId,
    pub tickets: Vec<Ticket>,
    pub axis: Option<AxisSelection>,
}

// ---------------------------------------------------------------------------
// Bets & payouts
// ---------------------------------------------------------------------------

/// Pool a set of tickets is bought in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BetKind {
    Quinella,
    Exacta,
    Trio,
    Trifecta,
}

impl BetKind {
    /// Box-style pools pay regardless of finishing order.
    pub fn is_order_insensitive(&self) -> bool {
        matches!(self, BetKind::Quinella | BetKind::Trio)
    }

    /// Number of finishers a combination in this pool names.
    pub fn legs(&self) -> usize {
        match self {
            BetKind::Quinella | BetKind::Exacta => 2,
            BetKind::Trio | BetKind::Trifecta => 3,
        }
    }
}

impl fmt::Display for BetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BetKind::Quinella => write!(f, "quinella"),
            BetKind::Exacta => write!(f, "exacta"),
            BetKind::Trio => write!(f, "trio"),
            BetKind::Trifecta => write!(f, "trifecta"),
        }
    }
}

impl std::str::FromStr for BetKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "quinella" => Ok(BetKind::Quinella),
            "exacta" => Ok(BetKind::Exacta),
            "trio" => Ok(BetKind::Trio),
            "trifecta" => Ok(BetKind::Trifecta),
            _ => Err(anyhow::anyhow!("Unknown bet kind: {s}")),
        }
    }
}

/// Official payouts for one race: bet kind → combination ("5-12-3") → amount
/// returned for one ticket at unit stake.
pub type PayoutTable = HashMap<BetKind, HashMap<String, Decimal>>;

/// A bet logged after a successful alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetRecord {
    pub id: Uuid,
    pub date: NaiveDate,
    pub race_id: String,
    pub strategy: StrategyId,
    pub bet_kind: BetKind,
    /// Post-number tickets where resolvable, rank tickets otherwise.
    pub tickets: Vec<Ticket>,
    pub stake: Decimal,
    pub recorded_at: DateTime<Utc>,
}

impl BetRecord {
    pub fn new(
        date: NaiveDate,
        race_id: &str,
        strategy: StrategyId,
        bet_kind: BetKind,
        tickets: Vec<Ticket>,
        unit_stake: Decimal,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        let stake = unit_stake * Decimal::from(tickets.len() as u64);
        Self {
            id: Uuid::new_v4(),
            date,
            race_id: race_id.to_string(),
            strategy,
            bet_kind,
            tickets,
            stake,
            recorded_at,
        }
    }
}

impl fmt::Display for BetRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {} x{} stake={}",
            self.race_id,
            self.strategy.symbol(),
            self.bet_kind,
            self.tickets.len(),
            self.stake,
        )
    }
}

// ---------------------------------------------------------------------------
// Races
// ---------------------------------------------------------------------------

/// A race on today's card as listed by the source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceCard {
    pub race_id: String,
    pub venue: String,
    pub race_number: u32,
    #[serde(default)]
    pub post_time: Option<DateTime<Utc>>,
}

impl RaceCard {
    pub fn label(&self) -> String {
        format!("{}R", self.race_number)
    }
}

impl fmt::Display for RaceCard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.venue, self.label(), self.race_id)
    }
}

/// Everything a message needs to know about the race besides the odds.
#[derive(Debug, Clone)]
pub struct RaceContext {
    pub race_id: String,
    pub venue: String,
    pub race_label: String,
    pub post_time: Option<DateTime<Utc>>,
    pub odds_url: String,
}

impl RaceContext {
    pub fn from_card(card: &RaceCard, post_time: Option<DateTime<Utc>>, odds_url: String) -> Self {
        Self {
            race_id: card.race_id.clone(),
            venue: card.venue.clone(),
            race_label: card.label(),
            post_time: post_time.or(card.post_time),
            odds_url,
        }
    }
}

// ---------------------------------------------------------------------------
// Jockeys
// ---------------------------------------------------------------------------

/// Coarse jockey-strength class, used for display only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JockeyTier {
    A,
    B,
    C,
    /// No name, or a name that could not be read.
    Unknown,
    /// Rider from another discipline; tiers do not apply.
    NotApplicable,
}

impl JockeyTier {
    pub fn marker(&self) -> &'static str {
        match self {
            JockeyTier::A => "A",
            JockeyTier::B => "B",
            JockeyTier::C => "C",
            JockeyTier::Unknown => "?",
            JockeyTier::NotApplicable => "-",
        }
    }
}

impl fmt::Display for JockeyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.marker())
    }
}

// ---------------------------------------------------------------------------
// Delivery
// ---------------------------------------------------------------------------

/// Outcome of pushing one message to a recipient list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: usize,
    /// The transport told us to slow down.
    pub rate_limited: bool,
}

impl DeliveryReport {
    pub fn is_success(&self) -> bool {
        self.delivered > 0
    }
}

impl fmt::Display for DeliveryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "delivered={} failed={}{}",
            self.delivered,
            self.failed,
            if self.rate_limited { " (rate limited)" } else { "" },
        )
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for PADDOCK.
#[derive(Debug, thiserror::Error)]
pub enum PaddockError {
    #[error("Source error ({source_name}): {message}")]
    Source { source_name: String, message: String },

    #[error("Delivery error ({sink}): {message}")]
    Delivery { sink: String, message: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown strategy number: {0}")]
    UnknownStrategy(u8),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
