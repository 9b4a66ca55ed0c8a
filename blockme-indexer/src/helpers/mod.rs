pub mod app_config;
pub mod config;
pub mod hex;
pub mod logging;
