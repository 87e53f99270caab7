//! Configuration for the submit queue
//!
//! This crate provides:
//! - Config file lookup (CWD, then the user config dir)
//! - The queue configuration ([`SubmitQueueConfig`]) with defaults
//! - Operator whitelist file parsing

pub mod config;
pub mod config_file;
pub mod error;
pub mod paths;
pub mod whitelist;

pub use config::SubmitQueueConfig;
pub use config_file::load_config_file;
pub use error::ConfigError;
pub use whitelist::{load_whitelist_file, parse_whitelist};
