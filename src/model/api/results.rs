use serde::{Deserialize, Serialize};

use crate::model::api::id::ApiId;

/// Live tally of votes, visible to any authenticated user.
/// Field names follow the frontend's camelCase convention.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveResults {
    pub total_votes: u64,
    pub candidates: Vec<CandidateResult>,
}

/// Per-candidate tally within the live results.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateResult {
    pub candidate_id: ApiId,
    pub name: String,
    pub position: String,
    pub votes: u64,
}
