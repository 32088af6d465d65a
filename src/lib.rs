#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

use crate::config::{ConfigFairing, IdentitySourceFairing, LedgerFairing};
use crate::ledger::Ledger;
use crate::logging::LoggerFairing;
use crate::source::IdentitySource;

pub mod api;
pub mod config;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod model;
pub mod source;

/// The server as configured from `Rocket.toml` and the environment.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .attach(ConfigFairing)
        .attach(LedgerFairing)
        .attach(IdentitySourceFairing)
        .attach(LoggerFairing)
}

/// The server around an already opened ledger and identity source.
pub fn rocket_for_ledger(ledger: Ledger, source: Box<dyn IdentitySource>) -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .manage(ledger)
        .manage(source)
        .attach(LoggerFairing)
}
