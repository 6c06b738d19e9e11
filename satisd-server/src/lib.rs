//! # satisd server
//!
//! HTTP control surface and process lifecycle for the satisd daemon.
//!
//! ## Endpoints
//!
//! - `GET|POST /register?package=&version=&repo=&repoType=` queues a package
//!   update and schedules a configuration rewrite
//! - `POST /generate` schedules a rebuild of the current configuration
//! - `GET /config.json` serves the persisted configuration
//! - `GET /health` reports pipeline state
//! - everything else is served from the generated repository directory
//!
//! ## Operational notes
//!
//! The control endpoints carry no authentication, rate limiting or body size
//! limits. Registrations that have not been merged, and rebuilds that have
//! not run, are dropped when the daemon stops.

pub mod handlers;
pub mod infra;
pub mod routes;

pub use infra::{
    app_state::AppState,
    config::{Cli, DaemonConfig},
    daemon::Daemon,
};
