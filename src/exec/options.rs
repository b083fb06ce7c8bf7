use crate::error::{BridgeError, Result};
use crate::rules::Rule;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// Options controlling the creation of an archive.
#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
	/// Files or directories to put in the archive.
	pub include: Vec<String>,

	/// Change to this directory before adding entries.
	pub work_dir: Option<PathBuf>,

	/// Rename entries with these `/old/new/flags` rules.
	pub modify: Vec<String>,

	/// Skip files or directories matching these patterns.
	pub exclude: Vec<String>,

	/// Follow symlinks, storing the target rather than the link.
	pub follow_symlinks: bool,

	/// Store access times.
	pub store_access_time: bool,

	/// Preserve absolute pathnames.
	pub preserve_paths: bool,

	/// Record this as the archive's creation time.
	pub creation_time: Option<DateTime<Utc>>,

	/// Simulate creating the archive.
	pub dry_run: bool,
}

/// Options controlling the extraction of an archive.
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
	/// Extract only entries matching these patterns. Everything is extracted
	/// when this is empty, modulo exclusions.
	pub include: Vec<String>,

	/// Skip files or directories matching these patterns.
	pub exclude: Vec<String>,

	/// Rename entries with these `/old/new/flags` rules.
	pub modify: Vec<String>,

	/// Change to this directory before extracting entries.
	pub work_dir: Option<PathBuf>,

	/// Restore permissions, owner, flags and ACLs.
	pub restore_permissions: bool,

	/// Ignore owner and group stored in the archive. Only meaningful with
	/// `restore_permissions`.
	pub ignore_owners: bool,

	/// Stop reading after the first match for each included pattern.
	pub fast_read: bool,
}

impl ExtractOptions {
	/// The directory extraction happens in, if any.
	pub fn target_dir<'a>(&'a self, default: Option<&'a Path>) -> Option<&'a Path> {
		self.work_dir.as_deref().or(default)
	}
}

fn invalid(message: &str) -> BridgeError {
	BridgeError::InvalidRequest {
		message: message.to_string(),
	}
}

/// Parse every rule up front so a bad rule fails here rather than inside
/// tarsnap, and pass each one on in normalized form.
fn push_rules(args: &mut Vec<String>, rules: &[String]) -> Result<()> {
	for raw in rules {
		let rule = Rule::parse(raw)?;
		args.push("-s".to_string());
		args.push(rule.to_string());
	}
	Ok(())
}

fn push_dir(args: &mut Vec<String>, dir: Option<&Path>) {
	if let Some(dir) = dir {
		args.push("-C".to_string());
		args.push(dir.to_string_lossy().into_owned());
	}
}

fn push_excludes(args: &mut Vec<String>, patterns: &[String]) {
	for pattern in patterns {
		args.push("--exclude".to_string());
		args.push(pattern.clone());
	}
}

/// Arguments for `tarsnap -c`.
pub fn create_args(
	name: &str,
	opts: &CreateOptions,
	default_dir: Option<&Path>,
) -> Result<Vec<String>> {
	if name.is_empty() {
		return Err(invalid("empty archive name"));
	}
	if opts.include.is_empty() {
		return Err(invalid("empty include list"));
	}

	let mut args = vec!["-c".to_string(), "-f".to_string(), name.to_string()];
	push_dir(&mut args, opts.work_dir.as_deref().or(default_dir));
	if opts.follow_symlinks {
		args.push("-H".to_string());
	}
	if opts.store_access_time {
		args.push("--store-atime".to_string());
	}
	if opts.preserve_paths {
		args.push("-P".to_string());
	}
	if let Some(when) = opts.creation_time {
		args.push("--creationtime".to_string());
		args.push(when.timestamp().to_string());
	}
	if opts.dry_run {
		args.push("--dry-run".to_string());
	}
	push_rules(&mut args, &opts.modify)?;
	push_excludes(&mut args, &opts.exclude);

	args.push("--".to_string());
	args.extend(opts.include.iter().cloned());
	Ok(args)
}

/// Arguments for `tarsnap -x`.
pub fn extract_args(
	name: &str,
	opts: &ExtractOptions,
	default_dir: Option<&Path>,
) -> Result<Vec<String>> {
	if name.is_empty() {
		return Err(invalid("empty archive name"));
	}

	let mut args = vec!["-x".to_string(), "-f".to_string(), name.to_string()];
	push_dir(&mut args, opts.target_dir(default_dir));
	if opts.restore_permissions {
		args.push("-p".to_string());
		if opts.ignore_owners {
			args.push("-o".to_string());
		}
	}
	if opts.fast_read {
		args.push("--fast-read".to_string());
	}
	push_rules(&mut args, &opts.modify)?;
	push_excludes(&mut args, &opts.exclude);

	if !opts.include.is_empty() {
		args.push("--".to_string());
		args.extend(opts.include.iter().cloned());
	}
	Ok(args)
}

/// Arguments for `tarsnap -d`.
pub fn delete_args<S: AsRef<str>>(archives: &[S]) -> Result<Vec<String>> {
	if archives.is_empty() {
		return Err(invalid("no archives to delete"));
	}
	let mut args = vec!["-d".to_string()];
	for name in archives {
		let name = name.as_ref();
		if name.is_empty() {
			return Err(invalid("empty archive name"));
		}
		args.push("-f".to_string());
		args.push(name.to_string());
	}
	Ok(args)
}

/// Arguments for listing the entries of one archive.
pub fn entries_args(name: &str) -> Result<Vec<String>> {
	if name.is_empty() {
		return Err(invalid("empty archive name"));
	}
	Ok(["-t", "-v", "--numeric-owner", "--iso-dates", "-f", name]
		.map(String::from)
		.to_vec())
}

/// Arguments for the storage statistics of the given archives, or of the
/// whole account when none are named.
pub fn size_args<S: AsRef<str>>(archives: &[S]) -> Vec<String> {
	let mut args = vec![
		"--print-stats".to_string(),
		"--no-humanize-numbers".to_string(),
	];
	for name in archives {
		args.push("-f".to_string());
		args.push(name.as_ref().to_string());
	}
	args
}
