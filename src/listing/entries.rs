use crate::error::{BridgeError, Result};
use crate::listing::local_to_utc;
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::Serialize;
use std::fmt;

/// Number of fields in a `tarsnap -tv` line. The last one is the path and
/// may itself contain spaces.
const ENTRY_FIELDS: usize = 8;

const ENTRY_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Kind of filesystem object an entry describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
	Regular,
	Directory,
	Symlink,
}

impl FileType {
	fn from_char(c: u8) -> Option<Self> {
		match c {
			b'-' => Some(FileType::Regular),
			b'd' => Some(FileType::Directory),
			b'L' => Some(FileType::Symlink),
			_ => None,
		}
	}

	fn as_char(self) -> char {
		match self {
			FileType::Regular => '-',
			FileType::Directory => 'd',
			FileType::Symlink => 'L',
		}
	}
}

/// Permission bits in the usual Unix layout: three rwx triplets plus the
/// setuid (0o4000) and setgid (0o2000) bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Mode(u32);

impl Mode {
	pub const SETUID: u32 = 0o4000;
	pub const SETGID: u32 = 0o2000;

	pub fn bits(self) -> u32 {
		self.0
	}

	pub fn is_setuid(self) -> bool {
		self.0 & Self::SETUID != 0
	}

	pub fn is_setgid(self) -> bool {
		self.0 & Self::SETGID != 0
	}

	/// Decode the nine permission characters following the type character,
	/// e.g. `rwsr-x---`.
	fn decode(perm: &[u8]) -> Self {
		let mut bits = 0;
		for (triplet, shift) in perm.chunks(3).zip([6u32, 3, 0]) {
			if triplet[0] == b'r' {
				bits |= 0o4 << shift;
			}
			if triplet[1] == b'w' {
				bits |= 0o2 << shift;
			}
			match (triplet[2], shift) {
				(b'x', _) => bits |= 0o1 << shift,
				(b's', 6) => bits |= 0o1 << shift | Self::SETUID,
				(b's', 3) => bits |= 0o1 << shift | Self::SETGID,
				_ => {}
			}
		}
		Mode(bits)
	}
}

impl fmt::Display for Mode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for (shift, special) in [(6u32, Self::SETUID), (3, Self::SETGID), (0, 0)] {
			let r = if self.0 & (0o4 << shift) != 0 { 'r' } else { '-' };
			let w = if self.0 & (0o2 << shift) != 0 { 'w' } else { '-' };
			let x = match (self.0 & (0o1 << shift) != 0, self.0 & special != 0) {
				(_, true) => 's',
				(true, false) => 'x',
				(false, false) => '-',
			};
			write!(f, "{r}{w}{x}")?;
		}
		Ok(())
	}
}

/// One file recorded in an archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
	pub file_type: FileType,
	pub mode: Mode,
	pub owner_id: u32,
	pub group_id: u32,
	pub size: u64,

	/// Modification time in UTC.
	pub modified: DateTime<Utc>,

	/// Path within the archive; directories carry no trailing `/`.
	pub path: String,
}

impl fmt::Display for Entry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"{}{} {:>5} {:>5} {:>10} {} {}",
			self.file_type.as_char(),
			self.mode,
			self.owner_id,
			self.group_id,
			self.size,
			self.modified.format("%Y-%m-%dT%H:%M:%SZ"),
			self.path
		)
	}
}

/// Parse one line of `tarsnap -tv --numeric-owner --iso-dates` output,
/// reading its time in the local time zone.
pub fn parse_entry_line(line: &str) -> Result<Entry> {
	parse_entry_line_in(line, &Local)
}

/// Parse one entry line whose time is in the given zone.
pub fn parse_entry_line_in<Tz: TimeZone>(line: &str, tz: &Tz) -> Result<Entry> {
	let line = line.trim_end_matches(['\r', '\n']);
	let malformed = |reason: &str| BridgeError::MalformedEntry {
		line: line.to_string(),
		reason: reason.to_string(),
	};

	let fields = split_fields(line, ENTRY_FIELDS);
	let [perm, _links, owner, group, size, date, time, path] = fields[..] else {
		return Err(malformed("too few fields"));
	};

	let perm = perm.as_bytes();
	if perm.len() != 10 {
		return Err(malformed("permission string is not 10 characters"));
	}
	let file_type = FileType::from_char(perm[0]).ok_or_else(|| malformed("unknown file type"))?;
	let mode = Mode::decode(&perm[1..]);

	let owner_id = owner.parse().map_err(|_| malformed("invalid owner id"))?;
	let group_id = group.parse().map_err(|_| malformed("invalid group id"))?;
	let size = size.parse().map_err(|_| malformed("invalid size"))?;

	let modified = NaiveDateTime::parse_from_str(&format!("{date}T{time}"), ENTRY_TIME_FORMAT)
		.ok()
		.and_then(|naive| local_to_utc(&naive, tz))
		.ok_or_else(|| malformed("invalid timestamp"))?;

	let path = match file_type {
		FileType::Directory => path.strip_suffix('/').unwrap_or(path),
		_ => path,
	};

	Ok(Entry {
		file_type,
		mode,
		owner_id,
		group_id,
		size,
		modified,
		path: path.to_string(),
	})
}

/// Split on runs of spaces into at most `max` fields; the last field keeps
/// the rest of the line verbatim.
fn split_fields(line: &str, max: usize) -> Vec<&str> {
	let mut fields = Vec::with_capacity(max);
	let mut rest = line.trim_start_matches(' ');
	while !rest.is_empty() {
		if fields.len() + 1 == max {
			fields.push(rest);
			break;
		}
		match rest.find(' ') {
			Some(i) => {
				fields.push(&rest[..i]);
				rest = rest[i..].trim_start_matches(' ');
			}
			None => {
				fields.push(rest);
				break;
			}
		}
	}
	fields
}

/// A lazy stream of entries parsed from a source of lines.
///
/// The stream pulls one line at a time and stops for good at the first error,
/// whether it comes from the line source or from a malformed line. Blank
/// lines are ignored. Nothing is read beyond what the consumer asks for.
pub struct EntryStream<I, Tz: TimeZone = Local> {
	lines: I,
	tz: Tz,
	lines_read: usize,
	done: bool,
}

impl<I> EntryStream<I, Local> {
	pub fn new(lines: I) -> Self {
		EntryStream::with_time_zone(lines, Local)
	}
}

impl<I, Tz: TimeZone> EntryStream<I, Tz> {
	pub fn with_time_zone(lines: I, tz: Tz) -> Self {
		EntryStream {
			lines,
			tz,
			lines_read: 0,
			done: false,
		}
	}

	/// Number of lines pulled from the source so far.
	pub fn lines_read(&self) -> usize {
		self.lines_read
	}

	/// Reports whether the stream has ended, by exhaustion or by error.
	pub fn is_done(&self) -> bool {
		self.done
	}
}

impl<I, S, Tz> Iterator for EntryStream<I, Tz>
where
	I: Iterator<Item = Result<S>>,
	S: AsRef<str>,
	Tz: TimeZone,
{
	type Item = Result<Entry>;

	fn next(&mut self) -> Option<Self::Item> {
		while !self.done {
			let Some(line) = self.lines.next() else {
				self.done = true;
				break;
			};
			self.lines_read += 1;

			let parsed = match line {
				Ok(line) if line.as_ref().trim().is_empty() => continue,
				Ok(line) => parse_entry_line_in(line.as_ref(), &self.tz),
				Err(e) => Err(e),
			};
			if parsed.is_err() {
				self.done = true;
			}
			return Some(parsed);
		}
		None
	}
}

impl<I, S, Tz> std::iter::FusedIterator for EntryStream<I, Tz>
where
	I: Iterator<Item = Result<S>>,
	S: AsRef<str>,
	Tz: TimeZone,
{
}

/// Feed every entry of `entries` to `f`.
///
/// Scanning stops at the first parse error or the first error returned by
/// `f`, and that error is returned unchanged. Lines after the failing one are
/// never read.
pub fn scan_entries<I, S, Tz, F, E>(
	entries: &mut EntryStream<I, Tz>,
	mut f: F,
) -> std::result::Result<(), E>
where
	I: Iterator<Item = Result<S>>,
	S: AsRef<str>,
	Tz: TimeZone,
	F: FnMut(Entry) -> std::result::Result<(), E>,
	E: From<BridgeError>,
{
	while let Some(entry) = entries.next() {
		if let Err(e) = f(entry?) {
			entries.done = true;
			return Err(e);
		}
	}
	Ok(())
}
