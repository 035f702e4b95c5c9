use chrono::Utc;
use mongodb::{
    bson::{doc, DateTime as BsonDateTime},
    options::FindOneOptions,
    Client,
};
use rocket::{futures::TryStreamExt, serde::json::Json, Route, State};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    api::{
        auth::{AdminAccess, AnyUser, AuthToken},
        election::ElectionResponse,
        results::{CandidateResult, LiveResults},
        vote::{VoteReceipt, VoteRequest},
    },
    common::{election::ElectionPhase, role::Role},
    db::{
        audit::{self, AuditEntryCore, NewAuditEntry},
        candidate::Candidate,
        election::Election,
        user::User,
        vote::{self, NewVote, Vote, VoteCore},
    },
    mongodb::{is_duplicate_key_error, Coll, Id},
};

pub fn routes() -> Vec<Route> {
    routes![current_election, cast_vote, live_results, voter_stats]
}

/// Fetch the nearest election that has not yet ended (upcoming or active).
#[get("/elections/current")]
async fn current_election(
    _token: AuthToken<AnyUser>,
    elections: Coll<Election>,
    candidates: Coll<Candidate>,
) -> Result<Json<ElectionResponse>> {
    let now = Utc::now();

    let not_yet_ended = doc! {
        "end_date": { "$gte": BsonDateTime::from_chrono(now) },
    };
    let earliest_first = FindOneOptions::builder()
        .sort(doc! { "start_date": 1 })
        .build();
    let election = elections
        .find_one(not_yet_ended, earliest_first)
        .await?
        .ok_or_else(|| Error::not_found("No active or upcoming election"))?;

    let election_candidates = candidates
        .find(doc! { "election_id": *election.id }, None)
        .await?
        .try_collect::<Vec<_>>()
        .await?;

    Ok(Json(ElectionResponse::new(election, election_candidates, now)))
}

/// Cast a ballot: one chosen candidate per position, all recorded
/// atomically under a single receipt.
#[post("/elections/<election_id>/vote", data = "<request>", format = "json")]
#[allow(clippy::too_many_arguments)]
async fn cast_vote(
    token: AuthToken<AnyUser>,
    election_id: Id,
    request: Json<VoteRequest>,
    elections: Coll<Election>,
    candidates: Coll<Candidate>,
    votes: Coll<Vote>,
    new_votes: Coll<NewVote>,
    logs: Coll<NewAuditEntry>,
    db_client: &State<Client>,
) -> Result<Json<VoteReceipt>> {
    let result = try_cast_vote(
        &token, election_id, request.0, &elections, &candidates, &votes, &new_votes, &logs,
        db_client,
    )
    .await;

    match result {
        Ok(receipt_id) => Ok(Json(VoteReceipt::success(receipt_id))),
        Err(err) => {
            // The rejection itself is security-relevant; the ledger was not
            // touched. The success-path audit entry is written inside the
            // voting transaction instead.
            audit::record(
                &logs,
                AuditEntryCore::failure(token.user_id, &token.email, "Submit Vote", err.to_string()),
            )
            .await;
            Err(err)
        }
    }
}

/// The voting engine proper. Validation order is fixed: role, election
/// existence, phase, prior vote, ballot shape, candidate ownership — the
/// first violation wins.
#[allow(clippy::too_many_arguments)]
async fn try_cast_vote(
    token: &AuthToken<AnyUser>,
    election_id: Id,
    request: VoteRequest,
    elections: &Coll<Election>,
    candidates: &Coll<Candidate>,
    votes: &Coll<Vote>,
    new_votes: &Coll<NewVote>,
    logs: &Coll<NewAuditEntry>,
    db_client: &Client,
) -> Result<String> {
    // Only voters may vote; there is deliberately no superadmin override here.
    if token.role != Role::Voter {
        return Err(Error::forbidden("Only voters can cast votes"));
    }

    // The election must exist and be open. The phase comes from the clock;
    // the stored status field is never consulted.
    let election = elections
        .find_one(election_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election with ID '{election_id}'")))?;
    let now = Utc::now();
    if election.phase_at(now) != ElectionPhase::Active {
        return Err(Error::bad_request("Election is not active"));
    }

    // Coarse duplicate check: one cast per election, over all positions.
    // Not race-safe on its own; the unique vote index is the backstop.
    let prior_vote = doc! {
        "user_id": *token.user_id,
        "election_id": *election_id,
    };
    if votes.find_one(prior_vote, None).await?.is_some() {
        return Err(Error::conflict("User already voted in this election"));
    }

    // The ballot must be non-empty, duplicate-free, and reference only
    // candidates of this election.
    let candidate_ids = request.into_candidate_ids()?;
    let members = candidate_ids.iter().map(|id| **id).collect::<Vec<_>>();
    let of_this_election = doc! {
        "_id": { "$in": members },
        "election_id": *election_id,
    };
    let chosen = candidates
        .find(of_this_election, None)
        .await?
        .try_collect::<Vec<_>>()
        .await?;
    if chosen.len() != candidate_ids.len() {
        return Err(Error::bad_request("One or more candidates are invalid"));
    }

    // Record all ballot rows and the audit entry atomically: either the
    // whole cast commits, or none of it does.
    let receipt_id = vote::new_receipt_id(now);
    let ballot_rows = chosen
        .iter()
        .map(|candidate| VoteCore::new(token.user_id, candidate, receipt_id.clone(), now))
        .collect::<Vec<_>>();
    let entry = AuditEntryCore::success(
        token.user_id,
        &token.email,
        "Submit Vote",
        format!(
            "Voted for candidates [{}] in election {election_id}",
            candidate_ids
                .iter()
                .map(Id::to_string)
                .collect::<Vec<_>>()
                .join(", "),
        ),
    );

    let mut session = db_client.start_session(None).await?;
    session.start_transaction(None).await?;

    if let Err(err) = new_votes
        .insert_many_with_session(&ballot_rows, None, &mut session)
        .await
    {
        // A concurrent cast got in between the pre-check and this insert;
        // the unique index resolves the race in their favour.
        let _ = session.abort_transaction().await;
        return Err(translate_duplicate_vote(err));
    }
    if let Err(err) = logs.insert_one_with_session(&entry, None, &mut session).await {
        let _ = session.abort_transaction().await;
        return Err(err.into());
    }
    session.commit_transaction().await.map_err(translate_duplicate_vote)?;

    Ok(receipt_id)
}

/// Translate a storage-level duplicate key violation into the domain
/// conflict; anything else passes through untouched.
fn translate_duplicate_vote(err: mongodb::error::Error) -> Error {
    if is_duplicate_key_error(&err) {
        Error::conflict("User already voted in this election")
    } else {
        err.into()
    }
}

/// Return the live tally, visible to any logged-in user.
#[get("/elections/results/live")]
async fn live_results(
    _token: AuthToken<AnyUser>,
    votes: Coll<Vote>,
    candidates: Coll<Candidate>,
) -> Result<Json<LiveResults>> {
    let total_votes = votes.count_documents(None, None).await?;

    let all_candidates = candidates
        .find(None, None)
        .await?
        .try_collect::<Vec<_>>()
        .await?;

    let mut tallies = Vec::with_capacity(all_candidates.len());
    for candidate in all_candidates {
        let count = votes
            .count_documents(doc! { "candidate_id": *candidate.id }, None)
            .await?;
        tallies.push(CandidateResult {
            candidate_id: candidate.id.into(),
            name: candidate.candidate.name,
            position: candidate.candidate.position,
            votes: count,
        });
    }

    Ok(Json(LiveResults {
        total_votes,
        candidates: tallies,
    }))
}

/// Voter participation stats, for admins.
#[get("/elections/stats/voters")]
async fn voter_stats(
    _token: AuthToken<AdminAccess>,
    users: Coll<User>,
    votes: Coll<Vote>,
) -> Result<Json<VoterStats>> {
    let total_voters = users
        .count_documents(doc! { "role": Role::Voter }, None)
        .await?;
    let total_votes_cast = votes.count_documents(None, None).await?;
    Ok(Json(VoterStats {
        total_voters,
        total_votes_cast,
    }))
}

/// Participation statistics in the frontend's camelCase convention.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VoterStats {
    total_voters: u64,
    total_votes_cast: u64,
}
