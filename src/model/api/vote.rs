use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{api::id::ApiId, mongodb::Id};

/// A vote cast request: the candidates the voter has chosen, at most one
/// per position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteRequest {
    pub candidate_ids: Vec<ApiId>,
}

impl VoteRequest {
    /// Validate that the ballot selects at least one candidate and contains
    /// no duplicates, returning the distinct IDs in submission order.
    pub fn into_candidate_ids(self) -> Result<Vec<Id>> {
        if self.candidate_ids.is_empty() {
            return Err(Error::bad_request(
                "candidate_ids must be a non-empty list",
            ));
        }
        let mut seen = HashSet::new();
        if !self.candidate_ids.iter().all(|id| seen.insert(**id)) {
            return Err(Error::bad_request(
                "candidate_ids must not contain duplicates",
            ));
        }
        Ok(self.candidate_ids.into_iter().map(|id| *id).collect())
    }
}

/// The voter's proof of submission.
#[derive(Debug, Serialize, Deserialize)]
pub struct VoteReceipt {
    pub status: String,
    pub receipt_id: String,
}

impl VoteReceipt {
    pub fn success(receipt_id: String) -> Self {
        Self {
            status: "success".to_string(),
            receipt_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_ballot_is_rejected() {
        let request = VoteRequest {
            candidate_ids: vec![],
        };
        assert!(matches!(
            request.into_candidate_ids(),
            Err(Error::BadRequest(_))
        ));
    }

    #[test]
    fn duplicate_candidates_are_rejected() {
        let id: ApiId = Id::new().into();
        let request = VoteRequest {
            candidate_ids: vec![id, id],
        };
        assert!(request.into_candidate_ids().is_err());
    }

    #[test]
    fn distinct_candidates_pass_in_order() {
        let first = Id::new();
        let second = Id::new();
        let request = VoteRequest {
            candidate_ids: vec![first.into(), second.into()],
        };
        assert_eq!(request.into_candidate_ids().unwrap(), vec![first, second]);
    }
}
