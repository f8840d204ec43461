//! Unanimous-agreement counter shared by room and list deletion.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::UserId;

/// Deletion votes keyed by voter.
///
/// Quorum is never cached: [`DeletionVotes::covers`] is always evaluated
/// against the member set the caller just read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeletionVotes(BTreeMap<UserId, DateTime<Utc>>);

impl DeletionVotes {
    /// No votes cast.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record (or refresh) a vote.
    pub fn record(&mut self, voter: UserId, at: DateTime<Utc>) {
        self.0.insert(voter, at);
    }

    /// Withdraw a vote. Returns whether one was present.
    pub fn withdraw(&mut self, voter: &UserId) -> bool {
        self.0.remove(voter).is_some()
    }

    /// Whether `voter` has voted.
    pub fn contains(&self, voter: &UserId) -> bool {
        self.0.contains_key(voter)
    }

    /// When `voter` voted, if they did.
    pub fn voted_at(&self, voter: &UserId) -> Option<DateTime<Utc>> {
        self.0.get(voter).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Voters in id order.
    pub fn voters(&self) -> impl Iterator<Item = &UserId> {
        self.0.keys()
    }

    /// True when `members` is non-empty and every member has voted.
    ///
    /// Votes from users outside `members` do not count.
    ///
    /// # Examples
    /// ```
    /// use chrono::Utc;
    /// use household::domain::{DeletionVotes, UserId};
    ///
    /// let (alice, bob) = (UserId::random(), UserId::random());
    /// let mut votes = DeletionVotes::new();
    /// votes.record(alice, Utc::now());
    /// assert!(!votes.covers(&[alice, bob]));
    /// assert!(votes.covers(&[alice]));
    /// ```
    pub fn covers(&self, members: &[UserId]) -> bool {
        !members.is_empty() && members.iter().all(|member| self.contains(member))
    }

    /// Drop votes from anyone not in `members`.
    pub fn retain_members(&mut self, members: &[UserId]) {
        self.0.retain(|voter, _| members.contains(voter));
    }
}
