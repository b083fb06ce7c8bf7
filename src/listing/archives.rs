use crate::listing::local_to_utc;
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::Serialize;
use std::cmp::Ordering;
use std::ops::Deref;
use tracing::warn;

/// Layout of the creation time in `tarsnap --list-archives -v`.
const LIST_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The name and metadata known about an archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Archive {
	/// Full archive name, `base` followed by `tag`.
	#[serde(rename = "archive")]
	pub name: String,

	/// Name up to the first `.`.
	#[serde(skip_serializing_if = "String::is_empty")]
	pub base: String,

	/// Remainder of the name including its leading `.`, possibly empty.
	#[serde(skip_serializing_if = "String::is_empty")]
	pub tag: String,

	/// Creation time in UTC.
	pub created: DateTime<Utc>,
}

impl Archive {
	fn new(name: &str, created: DateTime<Utc>) -> Self {
		let (base, tag) = name.split_at(name.find('.').unwrap_or(name.len()));
		Archive {
			name: name.to_string(),
			base: base.to_string(),
			tag: tag.to_string(),
			created,
		}
	}
}

impl Ord for Archive {
	fn cmp(&self, other: &Self) -> Ordering {
		self.created
			.cmp(&other.created)
			.then_with(|| self.name.cmp(&other.name))
	}
}

impl PartialOrd for Archive {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

/// Archives ordered non-decreasing by creation time, ties broken by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Archives(Vec<Archive>);

impl Archives {
	/// The most recently created archive with the given base.
	pub fn latest(&self, base: &str) -> Option<&Archive> {
		self.latest_as_of(base, Utc::now())
	}

	/// The most recently created archive with the given base, created at or
	/// before `when`.
	pub fn latest_as_of(&self, base: &str, when: DateTime<Utc>) -> Option<&Archive> {
		self.0
			.iter()
			.rev()
			.find(|a| a.base == base && a.created <= when)
	}

	pub fn into_vec(self) -> Vec<Archive> {
		self.0
	}
}

impl Deref for Archives {
	type Target = [Archive];

	fn deref(&self) -> &[Archive] {
		&self.0
	}
}

impl From<Vec<Archive>> for Archives {
	fn from(mut archives: Vec<Archive>) -> Self {
		archives.sort();
		Archives(archives)
	}
}

impl IntoIterator for Archives {
	type Item = Archive;
	type IntoIter = std::vec::IntoIter<Archive>;

	fn into_iter(self) -> Self::IntoIter {
		self.0.into_iter()
	}
}

/// Parse the output of `tarsnap --list-archives -v`, reading times in the
/// local time zone as tarsnap prints them.
pub fn parse_archive_listing(text: &str) -> Archives {
	parse_archive_listing_in(text, &Local)
}

/// Parse an archive listing whose times are in the given zone.
///
/// Lines that are not `name<TAB>time` are skipped. A line whose time cannot be
/// read is kept with the Unix epoch as its creation time.
pub fn parse_archive_listing_in<Tz: TimeZone>(text: &str, tz: &Tz) -> Archives {
	let text = text.trim();
	if text.is_empty() {
		return Archives::default();
	}

	let mut archives = Vec::new();
	for line in text.lines() {
		let parts: Vec<&str> = line.splitn(2, '\t').collect();
		let [name, when] = parts[..] else {
			warn!(line, "invalid archive spec (skipped)");
			continue;
		};

		let created = NaiveDateTime::parse_from_str(when, LIST_TIME_FORMAT)
			.ok()
			.and_then(|naive| local_to_utc(&naive, tz))
			.unwrap_or_else(|| {
				warn!(archive = name, timestamp = when, "invalid archive timestamp");
				DateTime::<Utc>::default()
			});
		archives.push(Archive::new(name, created));
	}
	archives.into()
}
