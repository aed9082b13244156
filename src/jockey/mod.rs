//! Jockey strength tiers.
//!
//! Tiers are display annotations only; they never influence strategy
//! matching. The lookup table is loaded once at start-up and injected,
//! so tests can swap in small fixtures.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{debug, info};

use crate::types::JockeyTier;

/// Honorific suffixes stripped from the end of a name.
const HONORIFICS: &[&str] = &["ジョッキー", "騎手", "Jockey", "jockey", "J"];

/// Race-card markers for weight allowances (apprentices and the like).
const ALLOWANCE_MARKERS: &[char] = &['▲', '△', '☆', '◇', '★'];

/// Ranking cut-offs for the secondary table.
const DEFAULT_TIER_A_MAX_RANK: u32 = 70;
const DEFAULT_TIER_B_MAX_RANK: u32 = 200;

// ---------------------------------------------------------------------------
// Table source
// ---------------------------------------------------------------------------

/// Raw tier data as stored on disk (JSON).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JockeyTable {
    /// Explicit tiers, checked first.
    #[serde(default)]
    pub tiers: HashMap<String, JockeyTier>,
    /// Leading-rider ranking (1 = best), used when no explicit tier exists.
    #[serde(default)]
    pub rankings: HashMap<String, u32>,
    /// Riders from another discipline; resolve to `NotApplicable`.
    #[serde(default)]
    pub excluded: Vec<String>,
}

impl JockeyTable {
    /// Load a table from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read jockey table {}", path.display()))?;
        let table: JockeyTable = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse jockey table {}", path.display()))?;
        info!(
            path = %path.display(),
            tiers = table.tiers.len(),
            rankings = table.rankings.len(),
            excluded = table.excluded.len(),
            "Jockey table loaded"
        );
        Ok(table)
    }
}

// ---------------------------------------------------------------------------
// Name normalisation
// ---------------------------------------------------------------------------

/// Fold a jockey name into its lookup key.
///
/// Full-width ASCII becomes half-width, whitespace (including the
/// ideographic space) is removed, allowance markers and a trailing
/// honorific are stripped, and Latin letters are lower-cased.
pub fn normalize_name(raw: &str) -> String {
    let folded: String = raw
        .chars()
        .map(|c| match c {
            '\u{FF01}'..='\u{FF5E}' => char::from_u32(c as u32 - 0xFEE0).unwrap_or(c),
            '\u{3000}' => ' ',
            _ => c,
        })
        .filter(|c| !c.is_whitespace())
        .collect();

    let mut name = folded.trim_start_matches(ALLOWANCE_MARKERS);
    for suffix in HONORIFICS {
        if let Some(stripped) = name.strip_suffix(suffix) {
            if !stripped.is_empty() {
                name = stripped;
                break;
            }
        }
    }

    name.to_lowercase()
}

// ---------------------------------------------------------------------------
// Lookup
// ---------------------------------------------------------------------------

/// Anything that can classify a jockey by name.
pub trait TierSource: Send + Sync {
    fn tier(&self, name: Option<&str>) -> JockeyTier;
}

/// Table-backed tier lookup.
#[derive(Debug, Clone)]
pub struct JockeyTierLookup {
    tiers: HashMap<String, JockeyTier>,
    rankings: HashMap<String, u32>,
    excluded: HashSet<String>,
    tier_a_max_rank: u32,
    tier_b_max_rank: u32,
}

impl Default for JockeyTierLookup {
    fn default() -> Self {
        Self::new(JockeyTable::default())
    }
}

impl JockeyTierLookup {
    pub fn new(table: JockeyTable) -> Self {
        Self {
            tiers: table
                .tiers
                .into_iter()
                .map(|(name, tier)| (normalize_name(&name), tier))
                .collect(),
            rankings: table
                .rankings
                .into_iter()
                .map(|(name, rank)| (normalize_name(&name), rank))
                .collect(),
            excluded: table.excluded.iter().map(|n| normalize_name(n)).collect(),
            tier_a_max_rank: DEFAULT_TIER_A_MAX_RANK,
            tier_b_max_rank: DEFAULT_TIER_B_MAX_RANK,
        }
    }

    /// Override the ranking cut-offs.
    pub fn with_rank_cutoffs(mut self, tier_a_max: u32, tier_b_max: u32) -> Self {
        self.tier_a_max_rank = tier_a_max;
        self.tier_b_max_rank = tier_b_max;
        self
    }

    /// Tier implied by a leading-rider ranking.
    pub fn tier_for_rank(&self, rank: u32) -> JockeyTier {
        if rank >= 1 && rank <= self.tier_a_max_rank {
            JockeyTier::A
        } else if rank > self.tier_a_max_rank && rank <= self.tier_b_max_rank {
            JockeyTier::B
        } else {
            JockeyTier::C
        }
    }
}

impl TierSource for JockeyTierLookup {
    fn tier(&self, name: Option<&str>) -> JockeyTier {
        let Some(raw) = name else {
            return JockeyTier::Unknown;
        };
        let key = normalize_name(raw);
        if key.is_empty() {
            return JockeyTier::Unknown;
        }

        if self.excluded.contains(&key) {
            return JockeyTier::NotApplicable;
        }
        if let Some(&tier) = self.tiers.get(&key) {
            return tier;
        }
        if let Some(&rank) = self.rankings.get(&key) {
            return self.tier_for_rank(rank);
        }

        debug!(jockey = raw, "Jockey not in table, defaulting to tier C");
        JockeyTier::C
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
