use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Binary run when no tool is configured.
pub const DEFAULT_TOOL: &str = "tarsnap";

/// Settings for running tarsnap, read from `config.toml`.
///
/// `Config::default()` is ready for use: it runs `tarsnap` from `PATH` with
/// whatever key file tarsnap's own configuration names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
	/// Name or path of the tarsnap binary.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub tool: Option<String>,

	/// Key file passed with `--keyfile`.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub keyfile: Option<PathBuf>,

	/// Directory to change into when creating or extracting, unless the
	/// operation names its own.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub work_dir: Option<PathBuf>,
}

impl Config {
	/// The binary to run.
	pub fn tool(&self) -> &str {
		self.tool.as_deref().unwrap_or(DEFAULT_TOOL)
	}

	/// Overlay the settings present in `other` onto this config.
	pub fn merge(&mut self, other: Config) {
		if other.tool.is_some() {
			self.tool = other.tool;
		}
		if other.keyfile.is_some() {
			self.keyfile = other.keyfile;
		}
		if other.work_dir.is_some() {
			self.work_dir = other.work_dir;
		}
	}

	/// Validate the settings that tarsnap cannot be asked to check itself.
	pub fn validate(&self) -> Result<(), crate::error::BridgeError> {
		if self.tool.as_deref().is_some_and(|t| t.trim().is_empty()) {
			return Err(crate::error::BridgeError::InvalidRequest {
				message: "tool must not be empty".to_string(),
			});
		}
		Ok(())
	}
}
