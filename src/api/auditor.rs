use chrono::Utc;
use mongodb::{
    bson::{doc, Bson, DateTime as BsonDateTime, Regex},
    options::{FindOneOptions, FindOptions},
};
use rocket::{futures::TryStreamExt, serde::json::Json, Route};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    api::{
        audit::AuditLogResponse,
        auth::{AuditorAccess, AuthToken},
        id::ApiId,
        results::CandidateResult,
    },
    db::{audit::AuditEntry, candidate::Candidate, election::Election, vote::Vote},
    mongodb::Coll,
};

pub fn routes() -> Vec<Route> {
    routes![audit_logs, auditor_live_results]
}

/// Search the audit trail, newest entries first. The query is a plain
/// substring match on the details field, not a pattern.
#[get("/audit-logs?<q>")]
async fn audit_logs(
    _token: AuthToken<AuditorAccess>,
    q: Option<String>,
    logs: Coll<AuditEntry>,
) -> Result<Json<Vec<AuditLogResponse>>> {
    let filter = q.filter(|q| !q.is_empty()).map(|q| {
        doc! {
            "details": Bson::RegularExpression(Regex {
                pattern: escape_regex(&q),
                options: "i".to_string(),
            }),
        }
    });
    let newest_first = FindOptions::builder()
        .sort(doc! { "timestamp": -1 })
        .build();

    let entries = logs
        .find(filter, newest_first)
        .await?
        .try_collect::<Vec<_>>()
        .await?;
    Ok(Json(entries.into_iter().map(Into::into).collect()))
}

/// Escape a user-supplied string for use inside a regular expression, so it
/// only ever matches literally.
fn escape_regex(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(
            c,
            '.' | '^' | '$' | '*' | '+' | '?' | '(' | ')' | '[' | ']' | '{' | '}' | '|' | '\\'
                | '/'
        ) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Live tallies of the currently running election, for independent
/// observation while voting is underway.
#[get("/auditor/results/live")]
async fn auditor_live_results(
    _token: AuthToken<AuditorAccess>,
    elections: Coll<Election>,
    candidates: Coll<Candidate>,
    votes: Coll<Vote>,
) -> Result<Json<AuditorResults>> {
    let now = BsonDateTime::from_chrono(Utc::now());
    let ongoing = doc! {
        "start_date": { "$lte": now },
        "end_date": { "$gte": now },
    };
    let earliest_first = FindOneOptions::builder()
        .sort(doc! { "start_date": 1 })
        .build();
    let election = elections
        .find_one(ongoing, earliest_first)
        .await?
        .ok_or_else(|| Error::not_found("No ongoing election"))?;

    let election_candidates = candidates
        .find(doc! { "election_id": *election.id }, None)
        .await?
        .try_collect::<Vec<_>>()
        .await?;

    let mut total_votes = 0;
    let mut tallies = Vec::with_capacity(election_candidates.len());
    for candidate in election_candidates {
        let count = votes
            .count_documents(doc! { "candidate_id": *candidate.id }, None)
            .await?;
        total_votes += count;
        tallies.push(CandidateResult {
            candidate_id: candidate.id.into(),
            name: candidate.candidate.name,
            position: candidate.candidate.position,
            votes: count,
        });
    }

    Ok(Json(AuditorResults {
        election_id: election.id.into(),
        title: election.election.title.clone(),
        total_votes,
        candidates: tallies,
    }))
}

/// Election-scoped live tallies in the frontend's camelCase convention.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuditorResults {
    election_id: ApiId,
    title: String,
    total_votes: u64,
    candidates: Vec<CandidateResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regex_metacharacters_are_escaped() {
        assert_eq!(escape_regex("a.b"), "a\\.b");
        assert_eq!(escape_regex("(vote)*"), "\\(vote\\)\\*");
        assert_eq!(escape_regex("plain words"), "plain words");
        assert_eq!(escape_regex("back\\slash"), "back\\\\slash");
    }
}
