use std::ops::Deref;

use chrono::{DateTime, Datelike, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::model::{db::candidate::Candidate, mongodb::Id};

/// One recorded ballot: a voter's choice of one candidate for one position
/// within an election. Never mutated once written.
///
/// The `(user_id, election_id, position)` unique index on the collection is
/// the true guard against duplicate votes; see
/// [`ensure_indexes_exist`](crate::model::mongodb::ensure_indexes_exist).
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct VoteCore {
    pub user_id: Id,
    pub candidate_id: Id,
    pub election_id: Id,
    /// Snapshot of the candidate's position at cast time, so later edits to
    /// the candidate cannot rewrite what the ballot meant.
    pub position: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub timestamp: DateTime<Utc>,
    /// Proof of submission, shared by every row of one cast operation.
    pub receipt_id: String,
}

impl VoteCore {
    /// Record a ballot for the given candidate under a shared receipt.
    pub fn new(user_id: Id, candidate: &Candidate, receipt_id: String, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            candidate_id: candidate.id,
            election_id: candidate.election_id,
            position: candidate.position.clone(),
            timestamp: now,
            receipt_id,
        }
    }
}

/// A vote without an ID.
pub type NewVote = VoteCore;

/// A vote from the database, with its unique ID.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub vote: VoteCore,
}

impl Deref for Vote {
    type Target = VoteCore;

    fn deref(&self) -> &Self::Target {
        &self.vote
    }
}

/// Generate a fresh receipt ID: `VOTE-<year>-<10 uppercase hex chars>`.
///
/// One receipt covers every ballot row of a single cast operation; the
/// voter can present it to locate all of them.
pub fn new_receipt_id(now: DateTime<Utc>) -> String {
    let suffix = rand::thread_rng().gen_range(0..1_u64 << 40);
    format!("VOTE-{}-{:010X}", now.year(), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashSet;

    #[test]
    fn receipt_format() {
        let now = Utc::now();
        let receipt = new_receipt_id(now);
        let mut parts = receipt.split('-');
        assert_eq!(parts.next(), Some("VOTE"));
        assert_eq!(parts.next(), Some(now.year().to_string().as_str()));
        let suffix = parts.next().unwrap();
        assert_eq!(suffix.len(), 10);
        assert!(suffix
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
        assert_eq!(parts.next(), None);
    }

    #[test]
    fn receipts_do_not_collide_in_practice() {
        let now = Utc::now();
        let receipts = (0..1000).map(|_| new_receipt_id(now)).collect::<HashSet<_>>();
        assert_eq!(receipts.len(), 1000);
    }

    #[test]
    fn vote_snapshots_its_own_candidates_position() {
        let election_id = Id::new();
        let president = Candidate::example(election_id, "President");
        let secretary = Candidate::example(election_id, "Secretary");

        let user_id = Id::new();
        let now = Utc::now();
        let receipt = new_receipt_id(now);
        let first = VoteCore::new(user_id, &president, receipt.clone(), now);
        let second = VoteCore::new(user_id, &secretary, receipt.clone(), now);

        // Both rows share the receipt, but each carries its own candidate's
        // position, not a shared value.
        assert_eq!(first.receipt_id, second.receipt_id);
        assert_eq!(first.position, "President");
        assert_eq!(second.position, "Secretary");
        assert_eq!(first.election_id, election_id);
        assert_eq!(second.candidate_id, secretary.id);
    }
}
