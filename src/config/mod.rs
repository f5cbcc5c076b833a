//! Configuration module for craft-runner.
//!
//! This module handles parsing, validation, and access to configuration
//! settings: where server directories live, how the HTTP front end binds,
//! and how processes are supervised. Configurations load from JSON or YAML
//! files, and every field has a default.
//!
//! # Examples
//!
//! Loading a configuration from a file:
//!
//! ```no_run
//! use craft_runner::config::Config;
//!
//! let config = Config::from_file("craft-runner.json").unwrap();
//! println!("Managing servers under {}", config.servers_dir.display());
//! ```
//!
//! Creating a configuration programmatically:
//!
//! ```
//! use craft_runner::config::{Config, SupervisorConfig, validate_config};
//!
//! let config = Config {
//!     servers_dir: "/srv/minecraft".into(),
//!     supervisor: SupervisorConfig {
//!         grace_period_secs: 30,
//!         ..SupervisorConfig::default()
//!     },
//!     ..Config::default()
//! };
//! validate_config(&config).unwrap();
//! ```
mod parser;
pub mod validator;

pub use parser::{Config, DEFAULT_WORKERS, HttpConfig, SupervisorConfig};
pub use validator::validate_config;
