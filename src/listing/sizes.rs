use crate::error::{BridgeError, Result};
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

/// Name of the block summarizing every archive.
const ALL_ARCHIVES: &str = "All archives";

/// Name of the line completing the block above it with deduplicated sizes.
const UNIQUE_DATA: &str = "(unique data)";

/// `<name>  <total>  <compressed>`. The name may contain spaces, so
/// everything up to the last two numbers belongs to it. Only ASCII digits
/// count as a number; `\d` would also accept other scripts.
static SIZE_LINE: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"^\s*(.*?)\s+([0-9]+)\s+([0-9]+)$").expect("size line pattern is valid")
});

/// Storage sizes, in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Sizes {
	/// Total size of the original input.
	pub input_bytes: u64,
	/// Size after compression.
	pub compressed_bytes: u64,
	/// Size after deduplication.
	pub unique_bytes: u64,
	/// Size after deduplication and compression.
	pub compressed_unique_bytes: u64,
}

impl fmt::Display for Sizes {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"input={} compressed={} unique={} compressed-unique={}",
			self.input_bytes, self.compressed_bytes, self.unique_bytes, self.compressed_unique_bytes
		)
	}
}

/// Storage size information reported by `tarsnap --print-stats`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SizeInfo {
	/// Sizes for all archives together, if reported.
	pub all: Option<Sizes>,

	/// Sizes for individual archives, by name.
	pub archives: BTreeMap<String, Sizes>,
}

/// The block a `(unique data)` line would complete.
enum Block {
	Idle,
	AwaitingUnique(Slot),
}

enum Slot {
	All,
	Archive(String),
}

/// Parse the output of `tarsnap --print-stats --no-humanize-numbers`.
///
/// Each block starts with a named line (`All archives` or an archive name)
/// and may be completed by a `(unique data)` line right after it. Lines that
/// do not end in two numbers, such as the column headers, are ignored.
pub fn parse_size_statistics(text: &str) -> Result<SizeInfo> {
	let mut info = SizeInfo::default();
	let mut block = Block::Idle;

	for (i, line) in text.lines().enumerate() {
		let line_no = i + 1;
		let Some(caps) = SIZE_LINE.captures(line) else {
			continue;
		};

		let total = parse_size(&caps[2], line_no, "total")?;
		let compressed = parse_size(&caps[3], line_no, "compressed")?;

		block = match &caps[1] {
			ALL_ARCHIVES => {
				info.all = Some(Sizes {
					input_bytes: total,
					compressed_bytes: compressed,
					..Sizes::default()
				});
				Block::AwaitingUnique(Slot::All)
			}
			UNIQUE_DATA => {
				let Block::AwaitingUnique(slot) = block else {
					return Err(BridgeError::UnexpectedContinuation { line: line_no });
				};
				let sizes = match slot {
					Slot::All => info.all.as_mut(),
					Slot::Archive(name) => info.archives.get_mut(&name),
				};
				if let Some(sizes) = sizes {
					sizes.unique_bytes = total;
					sizes.compressed_unique_bytes = compressed;
				}
				Block::Idle
			}
			name => {
				info.archives.insert(
					name.to_string(),
					Sizes {
						input_bytes: total,
						compressed_bytes: compressed,
						..Sizes::default()
					},
				);
				Block::AwaitingUnique(Slot::Archive(name.to_string()))
			}
		};
	}

	Ok(info)
}

fn parse_size(digits: &str, line: usize, field: &'static str) -> Result<u64> {
	digits
		.parse()
		.map_err(|source| BridgeError::InvalidSize { line, field, source })
}
