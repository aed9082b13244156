//! Ticket generation for fired strategies.
//!
//! All tickets produced here are rank-based; post numbers are filled in
//! later by the formatter.

use crate::types::Ticket;

/// Every ordering of three ranks, in lexicographic order.
pub fn permutations(ranks: [u32; 3]) -> Vec<Ticket> {
    let [a, b, c] = ranks;
    vec![
        Ticket::ranks(a, b, c),
        Ticket::ranks(a, c, b),
        Ticket::ranks(b, a, c),
        Ticket::ranks(b, c, a),
        Ticket::ranks(c, a, b),
        Ticket::ranks(c, b, a),
    ]
}

/// `axis` fixed first, every ordered pair of distinct candidates behind it.
///
/// Produces n·(n−1) tickets for n distinct candidates. A candidate equal to
/// the axis is skipped.
pub fn axis_first(axis: u32, candidates: &[u32]) -> Vec<Ticket> {
    let mut tickets = Vec::with_capacity(candidates.len() * candidates.len());
    for &second in candidates {
        for &third in candidates {
            if second == third || second == axis || third == axis {
                continue;
            }
            tickets.push(Ticket::ranks(axis, second, third));
        }
    }
    tickets
}

/// Fixed rank tickets, e.g. `[[1, 2, 3], [1, 3, 2]]`.
pub fn fixed(orders: &[[u32; 3]]) -> Vec<Ticket> {
    orders
        .iter()
        .map(|&[a, b, c]| Ticket::ranks(a, b, c))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
