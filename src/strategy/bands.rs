//! Declarative odds windows.
//!
//! Each strategy rule is a set of bands over the win odds at fixed
//! popularity ranks. A band is a pair of optional bounds, each either
//! inclusive or exclusive.

use rust_decimal::Decimal;
use std::fmt;

/// One side of an odds band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Inclusive(Decimal),
    Exclusive(Decimal),
}

/// An interval on win odds. `None` on either side means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OddsBand {
    pub lower: Option<Bound>,
    pub upper: Option<Bound>,
}

impl OddsBand {
    /// Matches any odds.
    pub const ANY: OddsBand = OddsBand {
        lower: None,
        upper: None,
    };

    /// `odds < max`
    pub fn below(max: Decimal) -> Self {
        Self {
            lower: None,
            upper: Some(Bound::Exclusive(max)),
        }
    }

    /// `odds <= max`
    pub fn at_most(max: Decimal) -> Self {
        Self {
            lower: None,
            upper: Some(Bound::Inclusive(max)),
        }
    }

    /// `odds >= min`
    pub fn at_least(min: Decimal) -> Self {
        Self {
            lower: Some(Bound::Inclusive(min)),
            upper: None,
        }
    }

    /// `min <= odds < max`
    pub fn half_open(min: Decimal, max: Decimal) -> Self {
        Self {
            lower: Some(Bound::Inclusive(min)),
            upper: Some(Bound::Exclusive(max)),
        }
    }

    /// `min <= odds <= max`
    pub fn closed(min: Decimal, max: Decimal) -> Self {
        Self {
            lower: Some(Bound::Inclusive(min)),
            upper: Some(Bound::Inclusive(max)),
        }
    }

    pub fn contains(&self, odds: Decimal) -> bool {
        let lower_ok = match self.lower {
            None => true,
            Some(Bound::Inclusive(min)) => odds >= min,
            Some(Bound::Exclusive(min)) => odds > min,
        };
        let upper_ok = match self.upper {
            None => true,
            Some(Bound::Inclusive(max)) => odds <= max,
            Some(Bound::Exclusive(max)) => odds < max,
        };
        lower_ok && upper_ok
    }

    /// Missing odds never satisfy a bounded band.
    pub fn contains_opt(&self, odds: Option<Decimal>) -> bool {
        match odds {
            Some(o) => self.contains(o),
            None => *self == OddsBand::ANY,
        }
    }
}

impl fmt::Display for OddsBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lower = match self.lower {
            None => "(-inf".to_string(),
            Some(Bound::Inclusive(v)) => format!("[{v}"),
            Some(Bound::Exclusive(v)) => format!("({v}"),
        };
        let upper = match self.upper {
            None => "inf)".to_string(),
            Some(Bound::Inclusive(v)) => format!("{v}]"),
            Some(Bound::Exclusive(v)) => format!("{v})"),
        };
        write!(f, "{lower}, {upper}")
    }
}

/// Bands over the odds at ranks 1–4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankBands {
    pub first: OddsBand,
    pub second: OddsBand,
    pub third: OddsBand,
    pub fourth: OddsBand,
}

impl RankBands {
    /// Check the four bands against `o1..o4`.
    pub fn matches(&self, odds: [Option<Decimal>; 4]) -> bool {
        self.first.contains_opt(odds[0])
            && self.second.contains_opt(odds[1])
            && self.third.contains_opt(odds[2])
            && self.fourth.contains_opt(odds[3])
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
