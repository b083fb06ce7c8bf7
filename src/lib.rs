//! tarsnap-bridge - typed access to the tarsnap command-line tool.
//!
//! This library provides the core functionality for tsbridge, including:
//! - Translating `-s` path substitution rules from POSIX BRE syntax
//! - Parsing archive listings, entry listings and storage statistics
//! - Running tarsnap with a configuration and streaming its output
//! - Reading tarsnap's own configuration files
//!
//! # Example
//!
//! ```no_run
//! use tarsnap_bridge::exec::Tarsnap;
//! use tarsnap_bridge::rules::Rule;
//!
//! let rule = Rule::parse(r"/^home.\(.*\)/\1/").unwrap();
//! assert_eq!(rule.apply("home/notes.txt"), ("notes.txt".to_string(), true));
//!
//! let tarsnap = Tarsnap::new(None);
//! for archive in tarsnap.list().unwrap().iter() {
//!     println!("{} {}", archive.name, archive.created);
//! }
//! ```

pub mod config;
pub mod error;
pub mod exec;
pub mod listing;
pub mod rules;

pub use error::{BridgeError, Result};
