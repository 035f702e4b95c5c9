use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Core candidate data, as stored in the database.
/// A candidate belongs to exactly one election and runs for exactly one
/// position (contest) within it.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct CandidateCore {
    pub election_id: Id,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    pub position: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifesto: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

/// A candidate without an ID.
pub type NewCandidate = CandidateCore;

/// A candidate from the database, with its unique ID.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub candidate: CandidateCore,
}

impl Deref for Candidate {
    type Target = CandidateCore;

    fn deref(&self) -> &Self::Target {
        &self.candidate
    }
}

impl DerefMut for Candidate {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.candidate
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl Candidate {
        pub fn example(election_id: Id, position: &str) -> Self {
            Self {
                id: Id::new(),
                candidate: CandidateCore {
                    election_id,
                    name: "Jane Smith".to_string(),
                    level: Some("HND1".to_string()),
                    position: position.to_string(),
                    manifesto: Some("Transparency and accountability".to_string()),
                    photo_url: None,
                },
            }
        }
    }
}
