use crate::error::{BridgeError, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// System-wide tarsnap configuration file.
pub const SYSTEM_RC: &str = "/usr/local/etc/tarsnap.conf";

/// Per-user tarsnap configuration file, relative to the home directory.
pub const USER_RC: &str = ".tarsnaprc";

/// Settings from tarsnap's own `key value` configuration files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rc(BTreeMap<String, String>);

impl Rc {
	/// Parse settings from the contents of a tarsnap configuration file.
	///
	/// Blank lines and `#` comments are skipped. A key is separated from its
	/// value by the first space or tab; a bare key has an empty value.
	pub fn parse(content: &str) -> Self {
		let mut rc = Rc::default();
		for line in content.lines() {
			let line = line.trim();
			if line.is_empty() || line.starts_with('#') {
				continue;
			}
			match line.split_once([' ', '\t']) {
				Some((key, value)) => rc.insert(key.trim(), value.trim()),
				None => rc.insert(line, ""),
			}
		}
		rc
	}

	/// Read, parse and merge the given files in order. Missing files are
	/// skipped, so later files override earlier ones.
	pub fn load<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
		let mut rc = Rc::default();
		for path in paths {
			let path = path.as_ref();
			let content = match std::fs::read_to_string(path) {
				Ok(content) => content,
				Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
				Err(source) => {
					return Err(BridgeError::ConfigReadError {
						path: path.to_path_buf(),
						source,
					});
				}
			};
			rc.merge(Rc::parse(&content));
		}
		Ok(rc)
	}

	/// Update this configuration with the keys and values from `other`.
	pub fn merge(&mut self, other: Rc) {
		self.0.extend(other.0);
	}

	pub fn insert(&mut self, key: &str, value: &str) {
		self.0.insert(key.to_string(), value.to_string());
	}

	pub fn get(&self, key: &str) -> Option<&str> {
		self.0.get(key).map(String::as_str)
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
		self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
	}

	/// The value of `key` as a path, with a leading `~` expanded to the home
	/// directory. The expansion applies whether or not the key is meant to
	/// hold a path.
	pub fn path(&self, key: &str) -> Option<PathBuf> {
		self.path_with_home(key, dirs::home_dir().as_deref())
	}

	fn path_with_home(&self, key: &str, home: Option<&Path>) -> Option<PathBuf> {
		let value = self.get(key)?;
		if let (Some(rest), Some(home)) = (value.strip_prefix('~'), home)
			&& (rest.is_empty() || rest.starts_with('/'))
		{
			return Some(home.join(rest.trim_start_matches('/')));
		}
		Some(PathBuf::from(value))
	}
}

/// The configuration files tarsnap itself reads, in the order it reads them.
pub fn default_rc_paths() -> Vec<PathBuf> {
	let mut paths = vec![PathBuf::from(SYSTEM_RC)];
	if let Some(home) = dirs::home_dir() {
		paths.push(home.join(USER_RC));
	}
	paths
}
