#![allow(deprecated)] // assert_cmd::Command::cargo_bin is deprecated but replacement requires nightly

use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

fn tsbridge_cmd() -> assert_cmd::Command {
	assert_cmd::Command::cargo_bin("tsbridge").unwrap()
}

/// A tsbridge command isolated from the user's config and time zone.
fn isolated_cmd(home: &Path) -> assert_cmd::Command {
	let mut cmd = tsbridge_cmd();
	cmd.env("HOME", home)
		.env("XDG_CONFIG_HOME", home.join(".config"))
		.env("TZ", "UTC")
		.env_remove("TSBRIDGE_LOG");
	cmd
}

/// Stand-in for tarsnap: records its arguments in `calls.log` next to itself
/// and prints canned output for the operation it recognizes.
#[cfg(unix)]
const FAKE_TARSNAP: &str = r#"#!/bin/sh
echo "$@" >> "$(dirname "$0")/calls.log"
case " $* " in
*" --list-archives "*)
	printf 'home.2\t2024-02-01 00:00:00\n'
	printf 'home.1\t2024-01-01 00:00:00\n'
	printf 'badline\n'
	printf 'work\t2024-01-15 12:30:00\n'
	;;
*" --print-stats "*)
	printf '                Total size  Compressed size\n'
	printf 'All archives         100               50\n'
	printf '  (unique data)       40               20\n'
	printf 'home.1                10                5\n'
	;;
*" -f nope "*)
	echo "tarsnap: Archive does not exist" >&2
	echo "tarsnap: Error reading archive" >&2
	exit 1
	;;
*" -t "*)
	printf '%s\n' '-rw-r--r--   0 1000   1000        12 2024-01-01 10:00:00 notes/read me.txt'
	printf '%s\n' 'drwxr-xr-x   0 0      0            0 2024-01-01 10:00:00 docs/'
	;;
esac
"#;

/// A tarsnap whose listing never ends.
#[cfg(unix)]
const ENDLESS_TARSNAP: &str = r#"#!/bin/sh
while :; do
	echo '-rw-r--r-- 0 0 0 1 2024-01-01 10:00:00 f'
done
"#;

/// A tarsnap that writes far more than a pipe buffer to stderr before
/// listing anything, and fails when asked for the `broken` archive.
#[cfg(unix)]
const NOISY_TARSNAP: &str = r#"#!/bin/sh
echo "tarsnap: noisy warning" >&2
i=0
while [ $i -lt 4000 ]; do
	echo "tarsnap: padding padding padding padding padding padding padding" >&2
	i=$((i + 1))
done
echo '-rw-r--r-- 0 0 0 1 2024-01-01 10:00:00 kept'
case " $* " in
*" -f broken "*) exit 2 ;;
esac
"#;

#[cfg(unix)]
fn write_tool(dir: &Path, script: &str) -> PathBuf {
	use std::os::unix::fs::PermissionsExt;

	let path = dir.join("tarsnap");
	fs::write(&path, script).unwrap();
	fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
	path
}

#[cfg(unix)]
fn calls(dir: &Path) -> String {
	fs::read_to_string(dir.join("calls.log")).unwrap_or_default()
}

// ============================================================================
// CLI flag tests
// ============================================================================

#[test]
fn test_help_flag() {
	tsbridge_cmd()
		.arg("--help")
		.assert()
		.success()
		.stdout(predicate::str::contains("tarsnap command-line tool"));
}

#[test]
fn test_version_flag() {
	tsbridge_cmd()
		.arg("--version")
		.assert()
		.success()
		.stdout(predicate::str::contains("tsbridge"));
}

// ============================================================================
// translate / rewrite tests
// ============================================================================

#[test]
fn test_translate_pattern() {
	tsbridge_cmd()
		.args(["translate", "smoke|eh?"])
		.assert()
		.success()
		.stdout(r"smoke\|eh\?".to_string() + "\n");

	tsbridge_cmd()
		.args(["translate", r"(a\(bc\)d)"])
		.assert()
		.success()
		.stdout(r"\(a(bc)d\)".to_string() + "\n");
}

#[test]
fn test_translate_template() {
	tsbridge_cmd()
		.args(["translate", "--template", r"\1.md ~ $x"])
		.assert()
		.success()
		.stdout("${1}.md ${0} $$x\n");
}

#[test]
fn test_rewrite_paths() {
	tsbridge_cmd()
		.args(["rewrite", r"/^\.//", "nothing", ".dot"])
		.assert()
		.success()
		.stdout("nothing\ndot\n");

	tsbridge_cmd()
		.args(["rewrite", r"/a\(b*c\).txt/\1.md/", "abbbc.txt"])
		.assert()
		.success()
		.stdout("bbbc.md\n");
}

#[test]
fn test_rewrite_print_flag_reports_on_stderr() {
	tsbridge_cmd()
		.args(["rewrite", "/^old/new/p", "old/file", "other"])
		.assert()
		.success()
		.stdout("new/file\nother\n")
		.stderr(predicate::str::contains("old/file >> new/file"));
}

#[test]
fn test_rewrite_json() {
	tsbridge_cmd()
		.args(["--json", "rewrite", "/x/y/", "axb", "c"])
		.assert()
		.success()
		.stdout(predicate::str::contains(r#""output": "ayb""#))
		.stdout(predicate::str::contains(r#""matched": false"#));
}

#[test]
fn test_rewrite_rejects_bad_rules() {
	tsbridge_cmd()
		.args(["rewrite", "/a/b/z", "a"])
		.assert()
		.failure()
		.stderr(predicate::str::contains("Unknown flag"));

	tsbridge_cmd()
		.args(["rewrite", "a/b/", "a"])
		.assert()
		.failure()
		.stderr(predicate::str::contains("Invalid rule format"));

	tsbridge_cmd()
		.args(["rewrite", r"/\(/x/", "a"])
		.assert()
		.failure()
		.stderr(predicate::str::contains("Invalid match pattern"));
}

// ============================================================================
// Commands that run tarsnap (Unix only - they use a fake tarsnap script)
// ============================================================================

#[test]
fn test_missing_tool() {
	let temp_dir = tempfile::tempdir().unwrap();
	isolated_cmd(temp_dir.path())
		.args(["--tool", "/nonexistent/tarsnap-12345", "list"])
		.assert()
		.failure()
		.stderr(predicate::str::contains("Command not found"));
}

#[cfg(unix)]
#[test]
fn test_list_archives() {
	let temp_dir = tempfile::tempdir().unwrap();
	let tool = write_tool(temp_dir.path(), FAKE_TARSNAP);

	isolated_cmd(temp_dir.path())
		.arg("--tool")
		.arg(&tool)
		.arg("list")
		.assert()
		.success()
		.stdout(
			"home.1\t2024-01-01T00:00:00+00:00\n\
			 work\t2024-01-15T12:30:00+00:00\n\
			 home.2\t2024-02-01T00:00:00+00:00\n",
		)
		.stderr(predicate::str::contains("invalid archive spec"));

	assert!(calls(temp_dir.path()).contains("--quiet --no-print-stats --list-archives -v"));
}

#[cfg(unix)]
#[test]
fn test_list_latest_for_base() {
	let temp_dir = tempfile::tempdir().unwrap();
	let tool = write_tool(temp_dir.path(), FAKE_TARSNAP);

	isolated_cmd(temp_dir.path())
		.arg("--tool")
		.arg(&tool)
		.args(["list", "--base", "home"])
		.assert()
		.success()
		.stdout("home.2\t2024-02-01T00:00:00+00:00\n");

	isolated_cmd(temp_dir.path())
		.arg("--tool")
		.arg(&tool)
		.args(["list", "--base", "nothing"])
		.assert()
		.failure()
		.stderr(predicate::str::contains("No archive with base"));
}

#[cfg(unix)]
#[test]
fn test_size_json() {
	let temp_dir = tempfile::tempdir().unwrap();
	let tool = write_tool(temp_dir.path(), FAKE_TARSNAP);

	isolated_cmd(temp_dir.path())
		.arg("--tool")
		.arg(&tool)
		.args(["--json", "size", "home.1"])
		.assert()
		.success()
		.stdout(predicate::str::contains(r#""unique_bytes": 40"#))
		.stdout(predicate::str::contains(r#""home.1""#));

	assert!(calls(temp_dir.path()).contains("--print-stats --no-humanize-numbers -f home.1"));
}

#[cfg(unix)]
#[test]
fn test_entries() {
	let temp_dir = tempfile::tempdir().unwrap();
	let tool = write_tool(temp_dir.path(), FAKE_TARSNAP);

	isolated_cmd(temp_dir.path())
		.arg("--tool")
		.arg(&tool)
		.args(["entries", "home.1"])
		.assert()
		.success()
		.stdout(predicate::str::contains("-rw-r--r--"))
		.stdout(predicate::str::contains("notes/read me.txt"))
		.stdout(predicate::str::contains("drwxr-xr-x"))
		.stdout(predicate::str::contains("docs/").not());
}

#[cfg(unix)]
#[test]
fn test_entries_tool_failure_reports_first_stderr_line() {
	let temp_dir = tempfile::tempdir().unwrap();
	let tool = write_tool(temp_dir.path(), FAKE_TARSNAP);

	isolated_cmd(temp_dir.path())
		.arg("--tool")
		.arg(&tool)
		.args(["entries", "nope"])
		.assert()
		.failure()
		.stderr(predicate::str::contains("Archive does not exist"))
		.stderr(predicate::str::contains("Error reading archive").not());
}

#[cfg(unix)]
#[test]
fn test_delete_and_keyfile() {
	let temp_dir = tempfile::tempdir().unwrap();
	let tool = write_tool(temp_dir.path(), FAKE_TARSNAP);

	isolated_cmd(temp_dir.path())
		.arg("--tool")
		.arg(&tool)
		.args(["--keyfile", "/k.key", "delete", "a", "b"])
		.assert()
		.success();

	assert!(calls(temp_dir.path()).contains("--quiet --no-print-stats --keyfile /k.key -d -f a -f b"));
}

#[cfg(unix)]
#[test]
fn test_create_passes_normalized_rules() {
	let temp_dir = tempfile::tempdir().unwrap();
	let tool = write_tool(temp_dir.path(), FAKE_TARSNAP);

	isolated_cmd(temp_dir.path())
		.arg("--tool")
		.arg(&tool)
		.args(["create", "nightly", "-C", "/srv", "-s", "/^srv/data/G", "--dry-run", "etc"])
		.assert()
		.success();

	assert!(
		calls(temp_dir.path())
			.contains("-c -f nightly -C /srv --dry-run -s /^srv/data/g -- etc")
	);
}

#[cfg(unix)]
#[test]
fn test_create_bad_rule_never_runs_tool() {
	let temp_dir = tempfile::tempdir().unwrap();
	let tool = write_tool(temp_dir.path(), FAKE_TARSNAP);

	isolated_cmd(temp_dir.path())
		.arg("--tool")
		.arg(&tool)
		.args(["create", "nightly", "-s", "/a/b/x", "etc"])
		.assert()
		.failure()
		.stderr(predicate::str::contains("Unknown flag"));

	assert_eq!(calls(temp_dir.path()), "");
}

#[cfg(unix)]
#[test]
fn test_config_file_selects_tool() {
	let temp_dir = tempfile::tempdir().unwrap();
	let tool = write_tool(temp_dir.path(), FAKE_TARSNAP);
	let config_path = temp_dir.path().join("config.toml");
	fs::write(&config_path, format!("tool = {:?}\n", tool.to_string_lossy())).unwrap();

	isolated_cmd(temp_dir.path())
		.arg("--config")
		.arg(&config_path)
		.args(["config", "show"])
		.assert()
		.success()
		.stdout(predicate::str::contains(format!("tool: {}", tool.display())));

	isolated_cmd(temp_dir.path())
		.arg("--config")
		.arg(&config_path)
		.args(["list", "--base", "work"])
		.assert()
		.success()
		.stdout(predicate::str::contains("work\t"));
}

#[test]
fn test_invalid_config_file() {
	let temp_dir = tempfile::tempdir().unwrap();
	let config_path = temp_dir.path().join("config.toml");
	fs::write(&config_path, "invalid toml [[[").unwrap();

	isolated_cmd(temp_dir.path())
		.arg("--config")
		.arg(&config_path)
		.arg("list")
		.assert()
		.failure()
		.stderr(predicate::str::contains("Failed to load configuration"));
}

#[test]
fn test_cache_tag_without_tarsnaprc() {
	let temp_dir = tempfile::tempdir().unwrap();

	// Only meaningful when the system-wide tarsnap.conf does not name a cache.
	if Path::new("/usr/local/etc/tarsnap.conf").exists() {
		return;
	}
	isolated_cmd(temp_dir.path())
		.arg("cache-tag")
		.assert()
		.success()
		.stdout(predicate::str::contains("No cache directory configured"));
}

#[cfg(unix)]
#[test]
fn test_cache_tag_from_tarsnaprc() {
	let temp_dir = tempfile::tempdir().unwrap();
	if Path::new("/usr/local/etc/tarsnap.conf").exists() {
		return;
	}
	let cache = temp_dir.path().join("cache");
	fs::create_dir(&cache).unwrap();
	std::os::unix::fs::symlink("0000000007", cache.join("cseq")).unwrap();
	fs::write(temp_dir.path().join(".tarsnaprc"), "cachedir ~/cache\n").unwrap();

	isolated_cmd(temp_dir.path())
		.arg("cache-tag")
		.assert()
		.success()
		.stdout("0000000007\n");
}

// ============================================================================
// Library-level streaming tests (Unix only)
// ============================================================================

#[cfg(unix)]
mod streaming {
	use super::*;
	use tarsnap_bridge::BridgeError;
	use tarsnap_bridge::config::Config;
	use tarsnap_bridge::exec::{State, Tarsnap};
	use tarsnap_bridge::listing::EntryStream;

	fn tarsnap_with(tool: &Path) -> Tarsnap {
		Tarsnap::new(Some(Config {
			tool: Some(tool.to_string_lossy().into_owned()),
			..Default::default()
		}))
	}

	#[test]
	fn test_callback_error_cancels_endless_listing() {
		let temp_dir = tempfile::tempdir().unwrap();
		let tarsnap = tarsnap_with(&write_tool(temp_dir.path(), ENDLESS_TARSNAP));

		let mut seen = 0;
		let result = tarsnap.entries("any", |_| {
			seen += 1;
			if seen == 3 {
				return Err(BridgeError::InvalidRequest {
					message: "enough".to_string(),
				});
			}
			Ok(())
		});

		match result {
			Err(BridgeError::InvalidRequest { message }) => assert_eq!(message, "enough"),
			other => panic!("Expected the callback's error, got {other:?}"),
		}
		assert_eq!(seen, 3);
	}

	#[test]
	fn test_partial_stream_then_cancel() {
		let temp_dir = tempfile::tempdir().unwrap();
		let tarsnap = tarsnap_with(&write_tool(temp_dir.path(), ENDLESS_TARSNAP));

		let mut lines = tarsnap.spawn_lines(vec!["-t".to_string()]).unwrap();
		let taken: Vec<_> = EntryStream::new(&mut lines).take(5).collect();
		assert_eq!(taken.len(), 5);
		assert!(taken.iter().all(|e| e.as_ref().is_ok_and(|e| e.path == "f")));

		assert_eq!(lines.state(), State::Running);
		lines.cancel();
		assert_eq!(lines.state(), State::Cancelled);
		assert!(lines.next().is_none());
	}

	#[test]
	fn test_entries_collects_whole_listing() {
		let temp_dir = tempfile::tempdir().unwrap();
		let tarsnap = tarsnap_with(&write_tool(temp_dir.path(), FAKE_TARSNAP));

		let mut paths = Vec::new();
		tarsnap
			.entries("home.1", |entry| -> Result<(), BridgeError> {
				paths.push(entry.path);
				Ok(())
			})
			.unwrap();
		assert_eq!(paths, ["notes/read me.txt", "docs"]);
	}

	#[test]
	fn test_entries_tool_failure() {
		let temp_dir = tempfile::tempdir().unwrap();
		let tarsnap = tarsnap_with(&write_tool(temp_dir.path(), FAKE_TARSNAP));

		let result: Result<(), BridgeError> = tarsnap.entries("nope", |_| Ok(()));
		match result {
			Err(BridgeError::ToolFailed {
				exit_code, message, ..
			}) => {
				assert_eq!(exit_code, 1);
				assert_eq!(message, "tarsnap: Archive does not exist");
			}
			other => panic!("Expected ToolFailed error, got {other:?}"),
		}
	}

	#[test]
	fn test_entries_with_large_stderr() {
		let temp_dir = tempfile::tempdir().unwrap();
		let tarsnap = tarsnap_with(&write_tool(temp_dir.path(), NOISY_TARSNAP));

		let mut paths = Vec::new();
		tarsnap
			.entries("fine", |entry| -> Result<(), BridgeError> {
				paths.push(entry.path);
				Ok(())
			})
			.unwrap();
		assert_eq!(paths, ["kept"]);

		let result: Result<(), BridgeError> = tarsnap.entries("broken", |_| Ok(()));
		match result {
			Err(BridgeError::ToolFailed {
				exit_code, message, ..
			}) => {
				assert_eq!(exit_code, 2);
				assert_eq!(message, "tarsnap: noisy warning");
			}
			other => panic!("Expected ToolFailed error, got {other:?}"),
		}
	}

	#[test]
	fn test_list_and_size_through_library() {
		let temp_dir = tempfile::tempdir().unwrap();
		let tarsnap = tarsnap_with(&write_tool(temp_dir.path(), FAKE_TARSNAP));

		let archives = tarsnap.list().unwrap();
		assert_eq!(archives.len(), 3);
		assert!(archives.windows(2).all(|w| w[0] <= w[1]));

		let info = tarsnap.size::<&str>(&[]).unwrap();
		let all = info.all.unwrap();
		assert_eq!((all.input_bytes, all.compressed_unique_bytes), (100, 20));
		assert_eq!(info.archives["home.1"].input_bytes, 10);
	}
}
