//! Path substitution rules for tarsnap.
//!
//! This module handles:
//! - Translating POSIX basic regular expressions into `regex` syntax
//! - Translating `~` / `\N` replacement strings into expansion templates
//! - Parsing and applying `/old/new/flags` rules

pub mod rule;
pub mod translate;

pub use rule::{Rule, apply_first};
pub use translate::{translate_pattern, translate_template};
