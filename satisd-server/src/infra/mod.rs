pub mod app_state;
pub mod config;
pub mod daemon;
pub mod errors;
pub mod startup;
pub mod supervisor;
