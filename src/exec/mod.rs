//! Running tarsnap.
//!
//! This module handles:
//! - Assembling argument lists for each tarsnap operation
//! - Executing tarsnap and capturing or streaming its output
//! - Cancelling a streaming listing that the caller stops early

pub mod lines;
pub mod options;

pub use lines::{State, ToolLines};
pub use options::{CreateOptions, ExtractOptions};

use crate::config::{Config, Rc, default_rc_paths};
use crate::error::{BridgeError, Result};
use crate::listing::{
	Archives, Entry, EntryStream, SizeInfo, parse_archive_listing, parse_size_statistics,
	scan_entries,
};
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::debug;

/// Arguments passed on every invocation.
const BASE_ARGS: [&str; 2] = ["--quiet", "--no-print-stats"];

/// A handle for running tarsnap with a given configuration.
#[derive(Debug, Clone, Default)]
pub struct Tarsnap {
	config: Config,
}

impl Tarsnap {
	/// Create a runner. `None` uses the default configuration.
	pub fn new(config: Option<Config>) -> Self {
		Tarsnap {
			config: config.unwrap_or_default(),
		}
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	/// The full argument list for an operation.
	pub fn command_line(&self, rest: Vec<String>) -> Vec<String> {
		let mut args: Vec<String> = BASE_ARGS.iter().map(|s| s.to_string()).collect();
		if let Some(ref keyfile) = self.config.keyfile {
			args.push("--keyfile".to_string());
			args.push(keyfile.to_string_lossy().into_owned());
		}
		args.extend(rest);
		args
	}

	fn command(&self, rest: Vec<String>) -> Command {
		let tool = self.config.tool();
		let args = self.command_line(rest);
		debug!(command = tool, args = ?args, "running");

		let mut cmd = Command::new(tool);
		cmd.args(args).stdin(Stdio::null());
		cmd
	}

	fn spawn_error(&self, source: std::io::Error) -> BridgeError {
		let command = self.config.tool().to_string();
		if source.kind() == std::io::ErrorKind::NotFound {
			BridgeError::CommandNotFound { command }
		} else {
			BridgeError::CommandFailed { command, source }
		}
	}

	/// Run tarsnap to completion and return its standard output.
	pub fn run_output(&self, rest: Vec<String>) -> Result<Vec<u8>> {
		let output = self
			.command(rest)
			.output()
			.map_err(|source| self.spawn_error(source))?;

		if !output.status.success() {
			return Err(lines::tool_failed(
				self.config.tool(),
				output.status.code(),
				&String::from_utf8_lossy(&output.stderr),
			));
		}
		Ok(output.stdout)
	}

	fn run(&self, rest: Vec<String>) -> Result<()> {
		self.run_output(rest).map(|_| ())
	}

	/// Start tarsnap and stream its standard output line by line.
	pub fn spawn_lines(&self, rest: Vec<String>) -> Result<ToolLines> {
		let child = self
			.command(rest)
			.stdout(Stdio::piped())
			.stderr(Stdio::piped())
			.spawn()
			.map_err(|source| self.spawn_error(source))?;
		Ok(ToolLines::new(self.config.tool().to_string(), child))
	}

	/// List the known archives, ordered by creation time and then by name.
	pub fn list(&self) -> Result<Archives> {
		let raw = self.run_output(vec!["--list-archives".to_string(), "-v".to_string()])?;
		Ok(parse_archive_listing(&String::from_utf8_lossy(&raw)))
	}

	/// Call `f` with each entry of the named archive as tarsnap lists it.
	///
	/// If `f` fails, or a line cannot be parsed, tarsnap is killed instead of
	/// being read to the end and the error is returned as is.
	pub fn entries<F, E>(&self, archive: &str, f: F) -> std::result::Result<(), E>
	where
		F: FnMut(Entry) -> std::result::Result<(), E>,
		E: From<BridgeError>,
	{
		let mut lines = self.spawn_lines(options::entries_args(archive)?)?;
		let mut stream = EntryStream::new(&mut lines);
		let scanned = scan_entries(&mut stream, f);
		drop(stream);

		match scanned {
			Ok(()) => Ok(lines.finish()?),
			Err(e) => {
				lines.cancel();
				Err(e)
			}
		}
	}

	/// Report storage sizes for the named archives. With no names only the
	/// account-wide totals are reported.
	pub fn size<S: AsRef<str>>(&self, archives: &[S]) -> Result<SizeInfo> {
		let raw = self.run_output(options::size_args(archives))?;
		parse_size_statistics(&String::from_utf8_lossy(&raw))
	}

	/// Create an archive; equivalent to `tarsnap -c -f name ...`.
	pub fn create(&self, name: &str, opts: &CreateOptions) -> Result<()> {
		self.run(options::create_args(
			name,
			opts,
			self.config.work_dir.as_deref(),
		)?)
	}

	/// Extract from an archive; equivalent to `tarsnap -x -f name ...`.
	///
	/// The target directory is created first, since tarsnap will not.
	pub fn extract(&self, name: &str, opts: &ExtractOptions) -> Result<()> {
		let args = options::extract_args(name, opts, self.config.work_dir.as_deref())?;
		if let Some(dir) = opts.target_dir(self.config.work_dir.as_deref()) {
			create_private_dir(dir)?;
		}
		self.run(args)
	}

	/// Delete the named archives.
	pub fn delete<S: AsRef<str>>(&self, archives: &[S]) -> Result<()> {
		self.run(options::delete_args(archives)?)
	}

	/// Load tarsnap's own configuration files, with the configured key file
	/// taking precedence.
	pub fn rc(&self) -> Result<Rc> {
		let mut rc = Rc::load(&default_rc_paths())?;
		if let Some(ref keyfile) = self.config.keyfile {
			rc.insert("keyfile", &keyfile.to_string_lossy());
		}
		Ok(rc)
	}

	/// The current cache sequence tag, or `None` when no cache directory is
	/// configured.
	pub fn cache_tag(&self) -> Result<Option<String>> {
		cache_tag(&self.rc()?)
	}
}

/// Read the cache sequence tag from the `cseq` link in the cache directory.
pub fn cache_tag(rc: &Rc) -> Result<Option<String>> {
	let Some(cache_dir) = rc.path("cachedir") else {
		return Ok(None);
	};
	let link = cache_dir.join("cseq");
	let target = std::fs::read_link(&link)
		.map_err(|source| BridgeError::ConfigReadError { path: link, source })?;
	Ok(Some(target.to_string_lossy().into_owned()))
}

fn create_private_dir(dir: &Path) -> Result<()> {
	let mut builder = std::fs::DirBuilder::new();
	builder.recursive(true);
	#[cfg(unix)]
	{
		use std::os::unix::fs::DirBuilderExt;
		builder.mode(0o700);
	}
	builder
		.create(dir)
		.map_err(|source| BridgeError::CreateDirFailed {
			path: dir.to_path_buf(),
			source,
		})
}
