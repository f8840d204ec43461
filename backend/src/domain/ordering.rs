//! Fractional sort-key arithmetic.
//!
//! Keys are `f64`. Appends step by [`ORDER_STEP`]; repositioning bisects the
//! gap between neighbours. Bisection eventually exhausts float precision, at
//! which point the caller rewrites the whole list to evenly spaced keys
//! (compaction) and bisects again. Everything here is pure; the item service
//! performs the writes.

use chrono::{DateTime, Utc};

use super::{ItemId, ListItem, sort_effective};

/// Distance between consecutive keys after an append or a compaction.
pub const ORDER_STEP: f64 = 1000.0;
/// Smallest neighbour gap that may still be bisected.
pub const ORDER_EPSILON: f64 = 1e-7;

/// Where a client wants an item to go.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Placement {
    /// Between two neighbours, given by their current keys.
    Between { prev: f64, next: f64 },
    /// Immediately after one neighbour.
    After(f64),
    /// Immediately before one neighbour.
    Before(f64),
    /// At the end of the list.
    End,
}

/// Outcome of planning a key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KeyPlan {
    /// Use this key directly.
    Key(f64),
    /// The neighbour gap is exhausted; compact, then bisect the new keys.
    CompactFirst,
}

/// Key for an item appended to a list whose largest key is `max_existing`.
///
/// An empty list seeds from the clock's nanosecond timestamp.
pub fn append_key(max_existing: Option<f64>, now: DateTime<Utc>) -> f64 {
    match max_existing {
        Some(max) => max + ORDER_STEP,
        None => seed_key(now),
    }
}

fn seed_key(now: DateTime<Utc>) -> f64 {
    now.timestamp_nanos_opt()
        .map_or_else(|| now.timestamp_millis() as f64 * 1e6, |nanos| nanos as f64)
}

/// Largest key in `items`, if any.
pub fn max_key(items: &[ListItem]) -> Option<f64> {
    items.iter().map(|item| item.order).reduce(f64::max)
}

/// Midpoint strictly inside the open interval spanned by `a` and `b`.
///
/// Returns `None` when the gap is below [`ORDER_EPSILON`] or when float
/// rounding would land the midpoint on one of the endpoints. Argument order
/// does not matter.
///
/// # Examples
/// ```
/// use household::domain::ordering::midpoint;
///
/// assert_eq!(midpoint(1000.0, 2000.0), Some(1500.0));
/// assert_eq!(midpoint(1000.0, 1000.0 + 1e-9), None);
/// ```
pub fn midpoint(a: f64, b: f64) -> Option<f64> {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let gap = hi - lo;
    if !gap.is_finite() || gap < ORDER_EPSILON {
        return None;
    }
    let mid = lo + gap / 2.0;
    (lo < mid && mid < hi).then_some(mid)
}

/// Plan a key for `placement` in a list whose largest key is `max_existing`.
pub fn plan_key(placement: Placement, max_existing: Option<f64>, now: DateTime<Utc>) -> KeyPlan {
    match placement {
        Placement::Between { prev, next } => {
            midpoint(prev, next).map_or(KeyPlan::CompactFirst, KeyPlan::Key)
        }
        Placement::After(prev) => KeyPlan::Key(prev + ORDER_STEP),
        Placement::Before(next) => KeyPlan::Key(next - ORDER_STEP),
        Placement::End => KeyPlan::Key(append_key(max_existing, now)),
    }
}

/// Evenly spaced keys for every item, in effective order: `STEP, 2·STEP, …`.
pub fn compaction_keys(items: &[ListItem]) -> Vec<(ItemId, f64)> {
    let mut sorted = items.to_vec();
    sort_effective(&mut sorted);
    let mut key = 0.0;
    sorted
        .into_iter()
        .map(|item| {
            key += ORDER_STEP;
            (item.id, key)
        })
        .collect()
}
