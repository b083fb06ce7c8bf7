use crate::config::types::Config;
use crate::error::{BridgeError, Result};
use std::path::{Path, PathBuf};

/// Parse a config file from the given path.
pub fn parse_config_file(path: &Path) -> Result<Config> {
	let content = std::fs::read_to_string(path).map_err(|source| BridgeError::ConfigReadError {
		path: path.to_path_buf(),
		source,
	})?;

	parse_config_str(&content, path)
}

/// Parse a config from a string (useful for testing).
pub fn parse_config_str(content: &str, path: &Path) -> Result<Config> {
	let config: Config =
		toml::from_str(content).map_err(|source| BridgeError::ConfigParseError {
			path: path.to_path_buf(),
			source,
		})?;

	config.validate()?;

	Ok(config)
}

/// Get the path of the default config file, `<config dir>/tsbridge/config.toml`.
pub fn default_config_path() -> Result<PathBuf> {
	let config_dir = dirs::config_dir().ok_or(BridgeError::HomeDirectoryNotFound)?;
	Ok(config_dir.join("tsbridge").join("config.toml"))
}

/// Load the config named on the command line, or the default config file.
///
/// An explicitly named file must exist. A missing default file yields the
/// default config.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
	if let Some(path) = explicit {
		return parse_config_file(path);
	}

	let path = default_config_path()?;
	if path.exists() {
		parse_config_file(&path)
	} else {
		Ok(Config::default())
	}
}
