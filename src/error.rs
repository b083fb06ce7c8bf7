use std::path::PathBuf;

/// Library-level structured errors for tarsnap-bridge.
///
/// Use `thiserror` for structured errors that library consumers can match on.
/// The CLI binary wraps these with `anyhow` for rich context chains.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
	#[error("Invalid rule format (want /old/new/flags): {rule}")]
	InvalidRuleFormat { rule: String },

	#[error("Unknown flag {flag:?} in rule: {rule}")]
	UnknownFlag { flag: char, rule: String },

	#[error("Invalid match pattern: {pattern}")]
	InvalidPattern {
		pattern: String,
		#[source]
		source: regex::Error,
	},

	#[error("Malformed entry line ({reason}): {line}")]
	MalformedEntry { line: String, reason: String },

	#[error("line {line}: unexpected continuation line")]
	UnexpectedContinuation { line: usize },

	#[error("line {line}: invalid {field} size")]
	InvalidSize {
		line: usize,
		field: &'static str,
		#[source]
		source: std::num::ParseIntError,
	},

	#[error("Failed to read config file: {path}")]
	ConfigReadError {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("Failed to parse config file: {path}")]
	ConfigParseError {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},

	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },

	#[error("Command execution failed: {command}")]
	CommandFailed {
		command: String,
		#[source]
		source: std::io::Error,
	},

	#[error("Command not found: {command}")]
	CommandNotFound { command: String },

	#[error("{command} failed (exit code: {exit_code}): {message}")]
	ToolFailed {
		command: String,
		exit_code: i32,
		message: String,
	},

	#[error("Failed to create directory: {path}")]
	CreateDirFailed {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("Failed reading output of {command}")]
	LineRead {
		command: String,
		#[source]
		source: std::io::Error,
	},

	#[error("Failed to resolve home directory")]
	HomeDirectoryNotFound,
}

impl BridgeError {
	/// Reports whether this error describes malformed input text, as opposed to
	/// a failure of the tool or the environment.
	pub fn is_format_error(&self) -> bool {
		matches!(
			self,
			BridgeError::InvalidRuleFormat { .. }
				| BridgeError::MalformedEntry { .. }
				| BridgeError::UnexpectedContinuation { .. }
		)
	}
}

/// Result type alias using BridgeError.
pub type Result<T> = std::result::Result<T, BridgeError>;
