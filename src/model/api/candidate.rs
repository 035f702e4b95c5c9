use rocket::fs::TempFile;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    api::id::ApiId,
    db::candidate::{Candidate, CandidateCore, NewCandidate},
    mongodb::Id,
};

/// Multipart form for creating a candidate. The photo, if any, is uploaded
/// alongside the text fields.
#[derive(Debug, FromForm)]
pub struct CandidateForm<'r> {
    pub name: String,
    pub level: Option<String>,
    pub position: String,
    pub manifesto: Option<String>,
    pub photo: Option<TempFile<'r>>,
}

impl CandidateForm<'_> {
    /// Validate the text fields and convert into a candidate record. The
    /// photo is persisted separately; its URL is passed in here.
    pub fn into_new_candidate(
        self,
        election_id: Id,
        photo_url: Option<String>,
    ) -> Result<NewCandidate> {
        if self.name.trim().is_empty() {
            return Err(Error::bad_request("Candidate name must not be empty"));
        }
        if self.position.trim().is_empty() {
            return Err(Error::bad_request("Candidate position must not be empty"));
        }
        Ok(CandidateCore {
            election_id,
            name: self.name,
            level: self.level,
            position: self.position,
            manifesto: self.manifesto,
            photo_url,
        })
    }
}

/// The public view of a candidate.
#[derive(Debug, Serialize, Deserialize)]
pub struct CandidateResponse {
    pub id: ApiId,
    pub election_id: ApiId,
    pub name: String,
    pub level: Option<String>,
    pub position: String,
    pub manifesto: Option<String>,
    pub photo_url: Option<String>,
}

impl From<Candidate> for CandidateResponse {
    fn from(candidate: Candidate) -> Self {
        Self {
            id: candidate.id.into(),
            election_id: candidate.candidate.election_id.into(),
            name: candidate.candidate.name,
            level: candidate.candidate.level,
            position: candidate.candidate.position,
            manifesto: candidate.candidate.manifesto,
            photo_url: candidate.candidate.photo_url,
        }
    }
}
