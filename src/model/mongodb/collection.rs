use std::ops::Deref;

use mongodb::{
    bson::doc, error::Error as DbError, options::IndexOptions, Collection, Database, IndexModel,
};
use rocket::{
    request::{self, FromRequest, Request},
    State,
};

use crate::model::db::{
    audit::{AuditEntry, NewAuditEntry},
    candidate::{Candidate, NewCandidate},
    election::{Election, NewElection},
    user::{NewUser, User},
    vote::{NewVote, Vote},
};

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[rocket::async_trait]
impl<'r, T> FromRequest<'r> for Coll<T>
where
    T: MongoCollection,
{
    type Error = ();

    /// Get the database connection from the managed state and wrap it in a collection.
    ///
    /// Panics iff the [`Database`] is not managed by [`rocket::Rocket`].
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let db = req.guard::<&State<Database>>().await.unwrap();
        request::Outcome::Success(Coll::from_db(db))
    }
}

// User collections
const USERS: &str = "users";
impl MongoCollection for User {
    const NAME: &'static str = USERS;
}
impl MongoCollection for NewUser {
    const NAME: &'static str = USERS;
}

// Election collections
const ELECTIONS: &str = "elections";
impl MongoCollection for Election {
    const NAME: &'static str = ELECTIONS;
}
impl MongoCollection for NewElection {
    const NAME: &'static str = ELECTIONS;
}

// Candidate collections
const CANDIDATES: &str = "candidates";
impl MongoCollection for Candidate {
    const NAME: &'static str = CANDIDATES;
}
impl MongoCollection for NewCandidate {
    const NAME: &'static str = CANDIDATES;
}

// Vote collections
const VOTES: &str = "votes";
impl MongoCollection for Vote {
    const NAME: &'static str = VOTES;
}
impl MongoCollection for NewVote {
    const NAME: &'static str = VOTES;
}

// Audit log collections
const AUDIT_LOGS: &str = "audit_logs";
impl MongoCollection for AuditEntry {
    const NAME: &'static str = AUDIT_LOGS;
}
impl MongoCollection for NewAuditEntry {
    const NAME: &'static str = AUDIT_LOGS;
}

/// Ensure that all the required indexes exist on the given database.
///
/// This operation is idempotent. The unique index on
/// `(user_id, election_id, position)` in the votes collection is the
/// linearization point for duplicate vote casts: concurrent submissions may
/// both pass the application-level existence check, but only one of them
/// can commit.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let unique = IndexOptions::builder().unique(true).build();
    let unique_sparse = IndexOptions::builder().unique(true).sparse(true).build();

    // User collection.
    let email_index = IndexModel::builder()
        .keys(doc! {"email": 1})
        .options(unique.clone())
        .build();
    // Sparse: student IDs are optional, but must be unique when present.
    let student_id_index = IndexModel::builder()
        .keys(doc! {"student_id": 1})
        .options(unique_sparse)
        .build();
    Coll::<User>::from_db(db)
        .create_indexes([email_index, student_id_index], None)
        .await?;

    // Vote collection. One ballot per voter per position per election; the
    // receipt index is for lookup only and is deliberately not unique, as
    // one receipt covers every row of a multi-position cast.
    let one_vote_per_position = IndexModel::builder()
        .keys(doc! {"user_id": 1, "election_id": 1, "position": 1})
        .options(unique)
        .build();
    let receipt_index = IndexModel::builder().keys(doc! {"receipt_id": 1}).build();
    Coll::<Vote>::from_db(db)
        .create_indexes([one_vote_per_position, receipt_index], None)
        .await?;

    // Candidate collection.
    let candidate_election_index = IndexModel::builder().keys(doc! {"election_id": 1}).build();
    Coll::<Candidate>::from_db(db)
        .create_index(candidate_election_index, None)
        .await?;

    // Audit log collection.
    let audit_timestamp_index = IndexModel::builder().keys(doc! {"timestamp": -1}).build();
    Coll::<AuditEntry>::from_db(db)
        .create_index(audit_timestamp_index, None)
        .await?;

    Ok(())
}
