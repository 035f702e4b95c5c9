use mongodb::bson::doc;
use rocket::{form::Form, serde::json::Json, Route, State};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{
    api::auth::{AnyUser, AuthToken, Credentials, TokenResponse},
    db::{
        audit::{self, AuditEntryCore, NewAuditEntry},
        user::User,
    },
    mongodb::Coll,
};

pub fn routes() -> Vec<Route> {
    routes![token]
}

/// Log in with an email or student ID plus password, receiving a bearer
/// token on success. Unknown identifier and wrong password produce the
/// same response, so the two cannot be told apart.
#[post("/auth/token", data = "<credentials>")]
async fn token(
    credentials: Form<Credentials>,
    users: Coll<User>,
    logs: Coll<NewAuditEntry>,
    config: &State<Config>,
) -> Result<Json<TokenResponse>> {
    let identifier = doc! {
        "$or": [
            { "email": &credentials.username },
            { "student_id": &credentials.username },
        ],
    };

    let user = users
        .find_one(identifier, None)
        .await?
        .filter(|user| user.verify_password(&credentials.password));

    let user = match user {
        Some(user) => user,
        None => {
            audit::record(
                &logs,
                AuditEntryCore::failure(
                    None,
                    &credentials.username,
                    "Login",
                    "Invalid email/student_id or password",
                ),
            )
            .await;
            return Err(Error::unauthorized("Incorrect email/student_id or password"));
        }
    };

    audit::record(
        &logs,
        AuditEntryCore::success(
            user.id,
            &user.email,
            "Login",
            format!("User {} logged in successfully", user.email),
        ),
    )
    .await;

    let jwt = AuthToken::<AnyUser>::new(&user).into_jwt(config);
    Ok(Json(TokenResponse::bearer(jwt, user.into())))
}
