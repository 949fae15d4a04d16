//! Canonical per-day keys.
//!
//! Log dates and summary dates both go through [`DateKeyFormatter`], which
//! formats in one fixed offset as `YYYY-MM-DD`. Two values share a key iff
//! they fall on the same calendar day in that offset.

use crate::Result;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

const KEY_FORMAT: &str = "%Y-%m-%d";

/// `YYYY-MM-DD` string identifying a calendar day
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DateKey(String);

impl DateKey {
    /// Accept an already-canonical key, e.g. a stored summary cell
    pub fn parse(s: &str) -> Option<Self> {
        let trimmed = s.trim();
        NaiveDate::parse_from_str(trimmed, KEY_FORMAT)
            .ok()
            .map(Self::from_naive)
    }

    pub fn from_naive(date: NaiveDate) -> Self {
        DateKey(date.format(KEY_FORMAT).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Formats dates in the process-wide offset.
#[derive(Clone, Copy, Debug)]
pub struct DateKeyFormatter {
    offset: FixedOffset,
}

impl DateKeyFormatter {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn from_config(config: &crate::Config) -> Result<Self> {
        Ok(Self::new(config.dates.offset()?))
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn key_for<Tz: TimeZone>(&self, moment: &DateTime<Tz>) -> DateKey {
        DateKey::from_naive(moment.with_timezone(&self.offset).date_naive())
    }

    pub fn today(&self, now: DateTime<Utc>) -> DateKey {
        self.key_for(&now)
    }

    /// Read a stored date cell.
    ///
    /// Accepts RFC 3339 timestamps, `YYYY-MM-DD HH:MM[:SS]` and bare
    /// `YYYY-MM-DD`. Values without an offset are taken as local to the
    /// configured offset.
    pub fn parse_moment(&self, s: &str) -> Option<DateTime<FixedOffset>> {
        let s = s.trim();
        if s.is_empty() {
            return None;
        }

        if let Ok(moment) = DateTime::parse_from_rfc3339(s) {
            return Some(moment);
        }

        for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
                return self.offset.from_local_datetime(&naive).single();
            }
        }

        let date = NaiveDate::parse_from_str(s, KEY_FORMAT).ok()?;
        self.offset
            .from_local_datetime(&date.and_hms_opt(0, 0, 0)?)
            .single()
    }
}
