//! Rockbox `.scrobbler.log` parsing.
//!
//! One listen per line, eight tab-separated fields:
//! artist, album, title, track number, duration, status (`L`/`S`),
//! timestamp, MusicBrainz id. Lines starting with `#` are comments.

use chrono::{DateTime, Local, TimeZone};

use crate::error::{Error, Result};

/// Number of tab-separated fields in a log line.
pub const FIELD_COUNT: usize = 8;

/// Whether the player counted a track as listened to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenStatus {
    Listened,
    Skipped,
}

impl ListenStatus {
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "L" => Some(ListenStatus::Listened),
            "S" => Some(ListenStatus::Skipped),
            _ => None,
        }
    }
}

/// A parsed log line. Empty source fields are `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrobbleEvent {
    pub artist: Option<String>,
    pub album: Option<String>,
    pub title: Option<String>,
    pub track_number: Option<String>,
    /// Track length in seconds, as written by the player.
    pub duration: Option<String>,
    pub status: ListenStatus,
    /// Unix timestamp of the listen, corrected to the local timezone.
    pub timestamp: i64,
    pub mbid: Option<String>,
}

impl ScrobbleEvent {
    /// Parses one non-comment line; `line_no` is only used in errors.
    pub fn parse_line(line: &str, line_no: usize) -> Result<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != FIELD_COUNT {
            return Err(Error::scrobbler(format!(
                "misformed scrobble log: line {line_no} has {} fields, expected {FIELD_COUNT}",
                fields.len()
            )));
        }

        let field = |i: usize| Some(fields[i]).filter(|f| !f.is_empty()).map(str::to_string);

        let status = ListenStatus::from_code(fields[5]).ok_or_else(|| {
            Error::scrobbler(format!(
                "misformed scrobble log: line {line_no} has unknown status '{}'",
                fields[5]
            ))
        })?;
        let epoch: i64 = fields[6].parse().map_err(|_| {
            Error::scrobbler(format!(
                "misformed scrobble log: line {line_no} has invalid timestamp '{}'",
                fields[6]
            ))
        })?;

        Ok(Self {
            artist: field(0),
            album: field(1),
            title: field(2),
            track_number: field(3),
            duration: field(4),
            status,
            timestamp: normalize_timestamp(epoch),
            mbid: field(7),
        })
    }

    pub fn is_listened(&self) -> bool {
        self.status == ListenStatus::Listened
    }
}

/// Converts a player timestamp into a real Unix timestamp.
///
/// The player has no timezone and records local wall-clock time as if it were
/// UTC. The value is reinterpreted as local time; ambiguous times resolve to
/// the earliest instant and nonexistent ones (DST gaps) are kept unchanged.
pub fn normalize_timestamp(epoch: i64) -> i64 {
    DateTime::from_timestamp(epoch, 0)
        .and_then(|utc| Local.from_local_datetime(&utc.naive_utc()).earliest())
        .map_or(epoch, |local| local.timestamp())
}

/// Raw log content; events are parsed lazily on iteration.
#[derive(Debug, Clone)]
pub struct ScrobbleLog {
    content: String,
}

impl ScrobbleLog {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }

    /// Parses each event line in order, skipping comments and blank lines.
    pub fn events(&self) -> impl Iterator<Item = Result<ScrobbleEvent>> + '_ {
        self.content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.starts_with('#') && !line.trim().is_empty())
            .map(|(i, line)| ScrobbleEvent::parse_line(line, i + 1))
    }
}
