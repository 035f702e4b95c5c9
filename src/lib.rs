#[macro_use]
extern crate rocket;

#[macro_use]
extern crate log;

use rocket::{Build, Rocket};

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;

use config::{ConfigFairing, DatabaseFairing};
use logging::LoggerFairing;

/// Construct the rocket instance: all routes mounted at the root, with the
/// config, database, and logging fairings attached. `ConfigFairing` must
/// run before `DatabaseFairing`, which needs the loaded config.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .attach(ConfigFairing)
        .attach(DatabaseFairing)
        .attach(LoggerFairing)
}
