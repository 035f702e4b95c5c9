use chrono::Duration;
use mongodb::{bson::doc, Client as MongoClient};
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::model::{
    common::role::Role,
    db::user::{NewUser, UserCore},
    mongodb::{ensure_indexes_exist, Coll},
};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Deserialize)]
pub struct Config {
    // non-secrets
    auth_ttl: u32,
    upload_dir: String,
    superadmin_email: String,
    // secrets
    jwt_secret: String,
    superadmin_password: String,
}

impl Config {
    /// Valid lifetime of auth tokens in seconds.
    pub fn auth_ttl(&self) -> Duration {
        Duration::seconds(self.auth_ttl.into())
    }

    /// Directory candidate photos are stored under.
    pub fn upload_dir(&self) -> &str {
        &self.upload_dir
    }

    /// Email of the bootstrap superadmin account.
    pub fn superadmin_email(&self) -> &str {
        &self.superadmin_email
    }

    /// Initial password of the bootstrap superadmin account.
    pub fn superadmin_password(&self) -> &str {
        &self.superadmin_password
    }

    /// Secret key used to sign JWTs.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }
}

/// A fairing that loads the application config and puts it in managed state.
/// This could easily be achieved using `AdHoc::config`, but is written out
/// explicitly for symmetry with the other fairings and control over error
/// messages.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        // Manage the state.
        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// Configuration for the database.
#[derive(Deserialize)]
struct DbConfig {
    // secrets
    db_uri: String,
}

/// A fairing that loads the MongoDB config, connects to the database,
/// performs any setup necessary, and places both a `Client` and a `Database`
/// into managed state.
pub struct DatabaseFairing;

#[rocket::async_trait]
impl Fairing for DatabaseFairing {
    fn info(&self) -> Info {
        Info {
            name: "MongoDB",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<DbConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load database config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        info!("Loaded database config, connecting...");
        // Construct the connection.
        let client = match MongoClient::with_uri_str(config.db_uri).await {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to connect to database: {e}");
                return Err(rocket);
            }
        };
        let db = client.database(&get_database_name());

        // Ensure the required indexes exist.
        if let Err(e) = ensure_indexes_exist(&db).await {
            error!("Failed to connect to database: {e}");
            return Err(rocket);
        }

        // Ensure there is at least one superadmin to manage the system with.
        let app_config = rocket
            .state::<Config>()
            .expect("ConfigFairing must be attached before DatabaseFairing");
        let users = Coll::from_db(&db);
        if let Err(e) = ensure_superadmin_exists(&users, app_config).await {
            error!("Failed to connect to database: {e}");
            return Err(rocket);
        }
        info!("...database connection online!");

        // Manage the state.
        rocket = rocket.manage(client).manage(db);
        Ok(rocket)
    }
}

/// Create the bootstrap superadmin account if no superadmin exists yet.
///
/// This operation is idempotent.
async fn ensure_superadmin_exists(
    users: &Coll<NewUser>,
    config: &Config,
) -> Result<(), mongodb::error::Error> {
    let filter = doc! { "role": Role::Superadmin };
    if users.find_one(filter, None).await?.is_none() {
        let superadmin = UserCore::new(
            "Super Admin".to_string(),
            config.superadmin_email().to_string(),
            config.superadmin_password(),
            Role::Superadmin,
        );
        users.insert_one(superadmin, None).await?;
        warn!(
            "Created bootstrap superadmin '{}'; change its password",
            config.superadmin_email()
        );
    }
    Ok(())
}

/// Get the name of the database to use (production version).
#[cfg(not(test))]
fn get_database_name() -> String {
    "evoting".to_string()
}

/// Get the name of the database to use (test version).
/// Use a random name to avoid collisions between tests.
#[cfg(test)]
fn get_database_name() -> String {
    let random: u32 = rand::random();
    let db = format!("test{random}");
    info!("Using database {db}");
    db
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl Config {
        pub fn example() -> Self {
            Self {
                auth_ttl: 3600,
                upload_dir: "uploads/candidates".to_string(),
                superadmin_email: "superadmin@example.com".to_string(),
                superadmin_password: "admin123admin123".to_string(),
                jwt_secret: "an example jwt signing secret".to_string(),
            }
        }
    }
}
