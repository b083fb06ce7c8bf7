//! Configuration loading and parsing for tarsnap-bridge.
//!
//! This module handles:
//! - TOML config file parsing
//! - tarsnap's own `key value` configuration files

pub mod parser;
pub mod rc;
pub mod types;

pub use parser::{default_config_path, load_config, parse_config_file, parse_config_str};
pub use rc::{Rc, default_rc_paths};
pub use types::{Config, DEFAULT_TOOL};
