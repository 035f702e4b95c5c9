use mongodb::bson::doc;
use rocket::{futures::TryStreamExt, serde::json::Json, Route};

use crate::api::admin::{create_staff, delete_staff};
use crate::error::Result;
use crate::model::{
    api::{
        auth::{AuthToken, SuperadminAccess},
        user::{StaffRequest, UserResponse},
    },
    common::role::Role,
    db::{
        audit::{self, AuditEntryCore, NewAuditEntry},
        user::{NewUser, User},
    },
    mongodb::{Coll, Id},
};

pub fn routes() -> Vec<Route> {
    routes![list_admins, create_admin, delete_admin]
}

/// List all admin accounts.
#[get("/superadmin/admins")]
async fn list_admins(
    _token: AuthToken<SuperadminAccess>,
    users: Coll<User>,
) -> Result<Json<Vec<UserResponse>>> {
    let admins = users
        .find(doc! { "role": Role::Admin }, None)
        .await?
        .try_collect::<Vec<_>>()
        .await?;
    Ok(Json(admins.into_iter().map(Into::into).collect()))
}

/// Create an admin account.
#[post("/superadmin/admins", data = "<request>", format = "json")]
async fn create_admin(
    token: AuthToken<SuperadminAccess>,
    request: Json<StaffRequest>,
    users: Coll<User>,
    new_users: Coll<NewUser>,
    logs: Coll<NewAuditEntry>,
) -> Result<Json<UserResponse>> {
    let user = create_staff(request.0, Role::Admin, &users, &new_users).await?;

    audit::record(
        &logs,
        AuditEntryCore::success(
            token.user_id,
            &token.email,
            "Create Admin",
            format!("Created admin {}", user.email),
        ),
    )
    .await;

    Ok(Json(user.into()))
}

/// Delete an admin account.
#[delete("/superadmin/admins/<user_id>")]
async fn delete_admin(
    token: AuthToken<SuperadminAccess>,
    user_id: Id,
    users: Coll<User>,
    logs: Coll<NewAuditEntry>,
) -> Result<()> {
    let deleted = delete_staff(user_id, Role::Admin, &users).await?;

    audit::record(
        &logs,
        AuditEntryCore::success(
            token.user_id,
            &token.email,
            "Delete Admin",
            format!("Deleted admin {}", deleted.email),
        ),
    )
    .await;

    Ok(())
}
