//! Ticket formatting and alert text.
//!
//! Turns rank-based tickets into post-number tickets, adds jockey tier
//! annotations and renders the message pushed to subscribers. Nothing
//! here fails: missing post numbers or jockeys degrade to placeholders.

use chrono::{DateTime, FixedOffset, Utc};

use crate::jockey::TierSource;
use crate::types::{
    OddsEntry, OddsSnapshot, RaceContext, StrategyId, StrategyMatch, Ticket, TicketBasis,
};

// ---------------------------------------------------------------------------
// Post-number conversion
// ---------------------------------------------------------------------------

/// Rewrite rank legs as post numbers.
///
/// A ticket with any leg lacking a post number is returned unchanged.
/// Tickets already in post-number form pass through, so applying this
/// twice is the same as applying it once.
pub fn to_post_numbers(tickets: &[Ticket], snapshot: &OddsSnapshot) -> Vec<Ticket> {
    tickets
        .iter()
        .map(|ticket| {
            if ticket.is_post_based() {
                return *ticket;
            }
            let posts: Option<Vec<u32>> = ticket
                .legs
                .iter()
                .map(|&rank| snapshot.by_rank(rank).and_then(|e| e.post_number))
                .collect();
            match posts.as_deref() {
                Some(&[a, b, c]) => Ticket::posts(a, b, c),
                _ => *ticket,
            }
        })
        .collect()
}

/// Circled running index: ① for 1 up to ⑳ for 20, `(n)` beyond.
pub fn circled_index(n: usize) -> String {
    if (1..=20).contains(&n) {
        if let Some(c) = char::from_u32(0x2460 + n as u32 - 1) {
            return c.to_string();
        }
    }
    format!("({n})")
}

// ---------------------------------------------------------------------------
// Formatter
// ---------------------------------------------------------------------------

/// Renders tickets and alert messages for one tier source and time zone.
pub struct TicketFormatter<'a> {
    tiers: &'a dyn TierSource,
    utc_offset: FixedOffset,
}

impl<'a> TicketFormatter<'a> {
    pub fn new(tiers: &'a dyn TierSource, utc_offset: FixedOffset) -> Self {
        Self { tiers, utc_offset }
    }

    /// Each ticket as `post(tier)` legs, e.g. `5(A)-12(B)-R3(?)`.
    ///
    /// Legs without a known post number fall back to `R{rank}`.
    pub fn annotate_with_jockey_tier(&self, tickets: &[Ticket], snapshot: &OddsSnapshot) -> Vec<String> {
        tickets
            .iter()
            .map(|ticket| {
                ticket
                    .legs
                    .iter()
                    .map(|&leg| self.annotate_leg(ticket.basis, leg, snapshot))
                    .collect::<Vec<_>>()
                    .join("-")
            })
            .collect()
    }

    fn annotate_leg(&self, basis: TicketBasis, leg: u32, snapshot: &OddsSnapshot) -> String {
        let entry = match basis {
            TicketBasis::Rank => snapshot.by_rank(leg),
            TicketBasis::PostNumber => snapshot.by_post(leg),
        };
        let label = match (basis, entry.and_then(|e| e.post_number)) {
            (_, Some(post)) => post.to_string(),
            (TicketBasis::Rank, None) => format!("R{leg}"),
            (TicketBasis::PostNumber, None) => leg.to_string(),
        };
        let tier = self.tiers.tier(entry.and_then(|e| e.jockey_name.as_deref()));
        format!("{label}({tier})")
    }

    /// Alert text for a matched strategy.
    pub fn render_message(
        &self,
        matched: &StrategyMatch,
        snapshot: &OddsSnapshot,
        race: &RaceContext,
    ) -> String {
        let mut lines = self.header(matched.strategy, snapshot, race);
        lines.push(String::new());

        match (&matched.strategy, &matched.axis) {
            (StrategyId::FavouriteWithLongshots, Some(axis)) => {
                let axis_entry = snapshot.by_rank(axis.axis_rank);
                lines.push(format!("Axis: {}", self.describe(axis_entry, axis.axis_rank)));
                lines.push(format!("Candidates ({}):", axis.candidate_ranks.len()));
                for &rank in &axis.candidate_ranks {
                    lines.push(format!("  • {}", self.describe(snapshot.by_rank(rank), rank)));
                }

                let axis_label = self.post_label(axis_entry, axis.axis_rank);
                let field = axis
                    .candidate_ranks
                    .iter()
                    .map(|&r| self.post_label(snapshot.by_rank(r), r))
                    .collect::<Vec<_>>()
                    .join(",");
                let n = axis.candidate_ranks.len();
                lines.push(format!("Formation: {axis_label} → {field} → {field}"));
                lines.push(format!(
                    "{} pts ({n}×{})",
                    axis.point_count(),
                    n.saturating_sub(1)
                ));
            }
            _ => {
                lines.push(format!("Tickets ({} pts):", matched.tickets.len()));
                let tickets = to_post_numbers(&matched.tickets, snapshot);
                let annotated = self.annotate_with_jockey_tier(&tickets, snapshot);
                for (i, ticket) in annotated.iter().enumerate() {
                    lines.push(format!("{} {ticket}", circled_index(i + 1)));
                }
            }
        }

        lines.push(String::new());
        lines.push(format!("🔗 {}", race.odds_url));
        lines.join("\n")
    }

    fn header(&self, strategy: StrategyId, snapshot: &OddsSnapshot, race: &RaceContext) -> Vec<String> {
        let mut lines = vec![
            format!("🏇 Strategy {} {}", strategy.symbol(), strategy.label()),
            format!("{} {} | post {}", race.venue, race.race_label, self.time_label(race.post_time)),
        ];
        if let Some(observed) = snapshot.observed_at() {
            lines.push(format!("Odds as of {}", self.local(observed).format("%H:%M:%S")));
        }
        lines
    }

    fn time_label(&self, at: Option<DateTime<Utc>>) -> String {
        match at {
            Some(t) => self.local(t).format("%H:%M").to_string(),
            None => "TBC".to_string(),
        }
    }

    fn local(&self, at: DateTime<Utc>) -> DateTime<FixedOffset> {
        at.with_timezone(&self.utc_offset)
    }

    fn post_label(&self, entry: Option<&OddsEntry>, rank: u32) -> String {
        entry
            .and_then(|e| e.post_number)
            .map(|p| p.to_string())
            .unwrap_or_else(|| format!("R{rank}"))
    }

    /// `#5 Lemaire [A] 1.5x (fav 1)`
    fn describe(&self, entry: Option<&OddsEntry>, rank: u32) -> String {
        let Some(entry) = entry else {
            return format!("R{rank} (no odds)");
        };
        let post = entry
            .post_number
            .map(|p| format!("#{p}"))
            .unwrap_or_else(|| "#?".to_string());
        let jockey = entry.jockey_name.as_deref().unwrap_or("unknown");
        let tier = self.tiers.tier(entry.jockey_name.as_deref());
        format!(
            "{post} {jockey} [{tier}] {:.1}x (fav {})",
            entry.win_odds, entry.popularity_rank
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
