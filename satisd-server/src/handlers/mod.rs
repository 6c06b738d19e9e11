//! HTTP request handlers organized by functionality

pub mod handle_config;
pub mod handle_generate;
pub mod handle_health;
pub mod handle_register;

pub use handle_config::config_file_handler;
pub use handle_generate::generate_handler;
pub use handle_health::health_handler;
pub use handle_register::register_handler;
