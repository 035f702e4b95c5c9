use mongodb::bson::doc;
use rocket::{serde::json::Json, Route};

use crate::error::{Error, Result};
use crate::model::{
    api::{
        auth::{AnyUser, AuthToken},
        user::{RegisterRequest, UserResponse},
    },
    db::{
        audit::{self, AuditEntryCore, NewAuditEntry},
        user::{NewUser, User},
    },
    mongodb::{is_duplicate_key_error, Coll},
};

pub fn routes() -> Vec<Route> {
    routes![register, me]
}

/// Register a new voter. The role is always voter, regardless of what the
/// request claims.
#[post("/users/register", data = "<request>", format = "json")]
async fn register(
    request: Json<RegisterRequest>,
    users: Coll<User>,
    new_users: Coll<NewUser>,
    logs: Coll<NewAuditEntry>,
) -> Result<Json<UserResponse>> {
    let email = request.email.clone();
    let result = try_register(request.0, &users, &new_users).await;

    // Mirror the outcome into the audit trail either way.
    let entry = match &result {
        Ok(user) => AuditEntryCore::success(
            user.id,
            &user.email,
            "User Registration",
            format!("Registered voter {}", user.email),
        ),
        Err(err) => AuditEntryCore::failure(None, &email, "User Registration", err.to_string()),
    };
    audit::record(&logs, entry).await;

    result.map(|user| Json(user.into()))
}

async fn try_register(
    request: RegisterRequest,
    users: &Coll<User>,
    new_users: &Coll<NewUser>,
) -> Result<User> {
    let new_user = request.into_new_user()?;

    // Cheap early reject; the unique indexes are the real guard.
    let mut collisions = vec![doc! { "email": &new_user.email }];
    if let Some(ref student_id) = new_user.student_id {
        collisions.push(doc! { "student_id": student_id });
    }
    let existing = users.find_one(doc! { "$or": collisions }, None).await?;
    if existing.is_some() {
        return Err(Error::conflict("Email or Student ID already registered"));
    }

    let new_id = match new_users.insert_one(&new_user, None).await {
        Ok(result) => result
            .inserted_id
            .as_object_id()
            .expect("The ID comes directly from the database")
            .into(),
        Err(ref err) if is_duplicate_key_error(err) => {
            // Lost a race with a concurrent registration.
            return Err(Error::conflict("Email or Student ID already registered"));
        }
        Err(err) => return Err(err.into()),
    };

    Ok(User {
        id: new_id,
        user: new_user,
    })
}

/// Get the current logged-in user's profile.
#[get("/users/me")]
async fn me(token: AuthToken<AnyUser>, users: Coll<User>) -> Result<Json<UserResponse>> {
    let user = users
        .find_one(token.user_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("User with ID '{}'", token.user_id)))?;
    Ok(Json(user.into()))
}
