//! Parsers for the text tarsnap prints.
//!
//! This module handles:
//! - Archive listings (`--list-archives -v`)
//! - Per-entry listings (`-tv`), including a streaming form
//! - Storage statistics (`--print-stats`)

pub mod archives;
pub mod entries;
pub mod sizes;

pub use archives::{Archive, Archives, parse_archive_listing, parse_archive_listing_in};
pub use entries::{
	Entry, EntryStream, FileType, Mode, parse_entry_line, parse_entry_line_in, scan_entries,
};
pub use sizes::{SizeInfo, Sizes, parse_size_statistics};

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

/// Interpret a wall-clock time printed by tarsnap in `tz`. An ambiguous time
/// resolves to its earlier instant; a time skipped by a DST gap has none.
pub(crate) fn local_to_utc<Tz: TimeZone>(naive: &NaiveDateTime, tz: &Tz) -> Option<DateTime<Utc>> {
	tz.from_local_datetime(naive)
		.earliest()
		.map(|t| t.with_timezone(&Utc))
}
