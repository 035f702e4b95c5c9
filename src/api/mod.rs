use rocket::Route;

mod admin;
mod auditor;
mod auth;
mod elections;
mod superadmin;
mod users;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(auth::routes());
    routes.extend(users::routes());
    routes.extend(elections::routes());
    routes.extend(admin::routes());
    routes.extend(superadmin::routes());
    routes.extend(auditor::routes());
    routes
}
