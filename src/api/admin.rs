use std::path::Path;

use chrono::Utc;
use mongodb::{bson::doc, Client};
use rocket::{form::Form, futures::TryStreamExt, serde::json::Json, Route, State};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{
    api::{
        auth::{AdminAccess, AuthToken},
        candidate::{CandidateForm, CandidateResponse},
        election::{ElectionResponse, ElectionSpec, ElectionUpdate},
        user::{StaffRequest, UserResponse},
    },
    common::role::Role,
    db::{
        audit::{self, AuditEntryCore, NewAuditEntry},
        candidate::{Candidate, NewCandidate},
        election::{Election, NewElection},
        user::{NewUser, User},
        vote::Vote,
    },
    mongodb::{is_duplicate_key_error, Coll, Id},
};

pub fn routes() -> Vec<Route> {
    routes![
        overview,
        create_election,
        list_elections,
        update_election,
        delete_election,
        add_candidate,
        list_auditors,
        create_auditor,
        delete_auditor,
    ]
}

/// High-level system counts for the admin dashboard.
#[get("/admin/overview")]
async fn overview(
    _token: AuthToken<AdminAccess>,
    users: Coll<User>,
    elections: Coll<Election>,
    candidates: Coll<Candidate>,
    votes: Coll<Vote>,
) -> Result<Json<OverviewStats>> {
    Ok(Json(OverviewStats {
        total_voters: users
            .count_documents(doc! { "role": Role::Voter }, None)
            .await?,
        total_elections: elections.count_documents(None, None).await?,
        total_candidates: candidates.count_documents(None, None).await?,
        total_votes_cast: votes.count_documents(None, None).await?,
    }))
}

/// Create a new election. Timestamps are normalised to UTC and the initial
/// status is derived from the clock.
#[post("/admin/elections", data = "<spec>", format = "json")]
async fn create_election(
    token: AuthToken<AdminAccess>,
    spec: Json<ElectionSpec>,
    new_elections: Coll<NewElection>,
    logs: Coll<NewAuditEntry>,
) -> Result<Json<ElectionResponse>> {
    let new_election = spec.0.into_new_election()?;
    let new_id: Id = new_elections
        .insert_one(&new_election, None)
        .await?
        .inserted_id
        .as_object_id()
        .expect("The ID comes directly from the database")
        .into();

    audit::record(
        &logs,
        AuditEntryCore::success(
            token.user_id,
            &token.email,
            "Create Election",
            format!("Created election '{}' ({new_id})", new_election.title),
        ),
    )
    .await;

    let election = Election {
        id: new_id,
        election: new_election,
    };
    Ok(Json(ElectionResponse::new(election, vec![], Utc::now())))
}

/// List all elections, with their status freshly recomputed.
#[get("/admin/elections")]
async fn list_elections(
    _token: AuthToken<AdminAccess>,
    elections: Coll<Election>,
    candidates: Coll<Candidate>,
) -> Result<Json<Vec<ElectionResponse>>> {
    let now = Utc::now();
    let all = elections
        .find(None, None)
        .await?
        .try_collect::<Vec<_>>()
        .await?;

    let mut responses = Vec::with_capacity(all.len());
    for election in all {
        let election_candidates = candidates
            .find(doc! { "election_id": *election.id }, None)
            .await?
            .try_collect::<Vec<_>>()
            .await?;
        responses.push(ElectionResponse::new(election, election_candidates, now));
    }
    Ok(Json(responses))
}

/// Partially update an election, revalidating the merged date bounds.
#[put("/admin/elections/<election_id>", data = "<update>", format = "json")]
async fn update_election(
    token: AuthToken<AdminAccess>,
    election_id: Id,
    update: Json<ElectionUpdate>,
    elections: Coll<Election>,
    candidates: Coll<Candidate>,
    logs: Coll<NewAuditEntry>,
) -> Result<Json<ElectionResponse>> {
    let mut election = elections
        .find_one(election_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election with ID '{election_id}'")))?;

    update.0.apply_to(&mut election.election)?;
    elections
        .replace_one(election_id.as_doc(), &election, None)
        .await?;

    audit::record(
        &logs,
        AuditEntryCore::success(
            token.user_id,
            &token.email,
            "Update Election",
            format!("Updated election '{}' ({election_id})", election.title),
        ),
    )
    .await;

    let election_candidates = candidates
        .find(doc! { "election_id": *election_id }, None)
        .await?
        .try_collect::<Vec<_>>()
        .await?;
    Ok(Json(ElectionResponse::new(
        election,
        election_candidates,
        Utc::now(),
    )))
}

/// Delete an election along with its candidates and votes, atomically.
#[delete("/admin/elections/<election_id>")]
async fn delete_election(
    token: AuthToken<AdminAccess>,
    election_id: Id,
    elections: Coll<Election>,
    candidates: Coll<Candidate>,
    votes: Coll<Vote>,
    logs: Coll<NewAuditEntry>,
    db_client: &State<Client>,
) -> Result<()> {
    let election = elections
        .find_one(election_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election with ID '{election_id}'")))?;

    let entry = AuditEntryCore::success(
        token.user_id,
        &token.email,
        "Delete Election",
        format!("Deleted election '{}' ({election_id})", election.title),
    );

    let owned_by_election = doc! { "election_id": *election_id };
    let mut session = db_client.start_session(None).await?;
    session.start_transaction(None).await?;
    let result: Result<()> = async {
        votes
            .delete_many_with_session(owned_by_election.clone(), None, &mut session)
            .await?;
        candidates
            .delete_many_with_session(owned_by_election, None, &mut session)
            .await?;
        elections
            .delete_one_with_session(election_id.as_doc(), None, &mut session)
            .await?;
        logs.insert_one_with_session(&entry, None, &mut session)
            .await?;
        Ok(())
    }
    .await;
    if let Err(err) = result {
        let _ = session.abort_transaction().await;
        return Err(err);
    }
    session.commit_transaction().await?;
    Ok(())
}

/// Add a candidate to an election, optionally storing an uploaded photo
/// under the configured uploads directory.
#[post("/admin/elections/<election_id>/candidates", data = "<form>")]
async fn add_candidate(
    token: AuthToken<AdminAccess>,
    election_id: Id,
    mut form: Form<CandidateForm<'_>>,
    elections: Coll<Election>,
    new_candidates: Coll<NewCandidate>,
    logs: Coll<NewAuditEntry>,
    config: &State<Config>,
) -> Result<Json<CandidateResponse>> {
    elections
        .find_one(election_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election with ID '{election_id}'")))?;

    let photo_url = match form.photo.take() {
        Some(mut photo) => Some(store_photo(&mut photo, config).await?),
        None => None,
    };

    let new_candidate = form
        .into_inner()
        .into_new_candidate(election_id, photo_url)?;
    let new_id: Id = new_candidates
        .insert_one(&new_candidate, None)
        .await?
        .inserted_id
        .as_object_id()
        .expect("The ID comes directly from the database")
        .into();

    audit::record(
        &logs,
        AuditEntryCore::success(
            token.user_id,
            &token.email,
            "Add Candidate",
            format!(
                "Added candidate '{}' for position '{}' to election {election_id}",
                new_candidate.name, new_candidate.position,
            ),
        ),
    )
    .await;

    Ok(Json(
        Candidate {
            id: new_id,
            candidate: new_candidate,
        }
        .into(),
    ))
}

/// Write an uploaded photo to the uploads directory under a random name,
/// returning the URL path it will be served from.
async fn store_photo(photo: &mut rocket::fs::TempFile<'_>, config: &Config) -> Result<String> {
    let extension = photo
        .content_type()
        .and_then(|ct| ct.extension())
        .map(|ext| ext.as_str().to_string())
        .unwrap_or_else(|| "bin".to_string());
    let filename = format!("{:032x}.{extension}", rand::random::<u128>());

    rocket::tokio::fs::create_dir_all(config.upload_dir()).await?;
    let path = Path::new(config.upload_dir()).join(&filename);
    photo.copy_to(&path).await?;

    Ok(format!("/{}/{filename}", config.upload_dir().trim_matches('/')))
}

/// List all auditor accounts.
#[get("/admin/auditors")]
async fn list_auditors(
    _token: AuthToken<AdminAccess>,
    users: Coll<User>,
) -> Result<Json<Vec<UserResponse>>> {
    let auditors = users
        .find(doc! { "role": Role::Auditor }, None)
        .await?
        .try_collect::<Vec<_>>()
        .await?;
    Ok(Json(auditors.into_iter().map(Into::into).collect()))
}

/// Create an auditor account.
#[post("/admin/auditors", data = "<request>", format = "json")]
async fn create_auditor(
    token: AuthToken<AdminAccess>,
    request: Json<StaffRequest>,
    users: Coll<User>,
    new_users: Coll<NewUser>,
    logs: Coll<NewAuditEntry>,
) -> Result<Json<UserResponse>> {
    let user = create_staff(request.0, Role::Auditor, &users, &new_users).await?;

    audit::record(
        &logs,
        AuditEntryCore::success(
            token.user_id,
            &token.email,
            "Create Auditor",
            format!("Created auditor {}", user.email),
        ),
    )
    .await;

    Ok(Json(user.into()))
}

/// Delete an auditor account.
#[delete("/admin/auditors/<user_id>")]
async fn delete_auditor(
    token: AuthToken<AdminAccess>,
    user_id: Id,
    users: Coll<User>,
    logs: Coll<NewAuditEntry>,
) -> Result<()> {
    let deleted = delete_staff(user_id, Role::Auditor, &users).await?;

    audit::record(
        &logs,
        AuditEntryCore::success(
            token.user_id,
            &token.email,
            "Delete Auditor",
            format!("Deleted auditor {}", deleted.email),
        ),
    )
    .await;

    Ok(())
}

/// Create a staff account with the given role, translating email collisions
/// into conflicts.
pub async fn create_staff(
    request: StaffRequest,
    role: Role,
    users: &Coll<User>,
    new_users: &Coll<NewUser>,
) -> Result<User> {
    let new_user = request.into_new_user(role)?;

    let existing = users
        .find_one(doc! { "email": &new_user.email }, None)
        .await?;
    if existing.is_some() {
        return Err(Error::conflict("Email already registered"));
    }

    let new_id: Id = match new_users.insert_one(&new_user, None).await {
        Ok(result) => result
            .inserted_id
            .as_object_id()
            .expect("The ID comes directly from the database")
            .into(),
        Err(ref err) if is_duplicate_key_error(err) => {
            return Err(Error::conflict("Email already registered"));
        }
        Err(err) => return Err(err.into()),
    };

    Ok(User {
        id: new_id,
        user: new_user,
    })
}

/// Delete a staff account, requiring that it actually holds the given role.
pub async fn delete_staff(user_id: Id, role: Role, users: &Coll<User>) -> Result<User> {
    let filter = doc! {
        "_id": *user_id,
        "role": role,
    };
    users
        .find_one_and_delete(filter, None)
        .await?
        .ok_or_else(|| Error::not_found(format!("{role} with ID '{user_id}'")))
}

/// Dashboard counts in the frontend's camelCase convention.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OverviewStats {
    total_voters: u64,
    total_elections: u64,
    total_candidates: u64,
    total_votes_cast: u64,
}
