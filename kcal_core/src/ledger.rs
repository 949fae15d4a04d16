//! Food log reading and per-day aggregation.
//!
//! Log rows are decoded leniently: a cell that cannot be read becomes `None`
//! on the entry and the aggregator drops that entry, so one dirty row never
//! blocks a recomputation.

use crate::date_key::DateKeyFormatter;
use crate::store::{Row, TabularStore};
use crate::{round_calories, DailyTotals, LogEntry, MealType, Result};
use chrono::NaiveTime;

/// Header of the log collection
pub const LOG_HEADER: [&str; 5] = ["date", "time", "meal_type", "description", "calories"];

const DATE_COL: usize = 0;
const TIME_COL: usize = 1;
const MEAL_COL: usize = 2;
const DESCRIPTION_COL: usize = 3;
const CALORIES_COL: usize = 4;

impl LogEntry {
    /// Decode a data row of the log collection. Never fails.
    pub fn from_row(row: &[String], keys: &DateKeyFormatter) -> Self {
        let cell = |index: usize| row.get(index).map(|s| s.trim()).unwrap_or("");

        LogEntry {
            date: keys.parse_moment(cell(DATE_COL)),
            time: parse_time(cell(TIME_COL)),
            meal_type: MealType::parse(cell(MEAL_COL)),
            description: cell(DESCRIPTION_COL).to_string(),
            calories: parse_calories(cell(CALORIES_COL)),
        }
    }

    /// Encode as a log row; the date is written as its DateKey
    pub fn to_row(&self, keys: &DateKeyFormatter) -> Row {
        vec![
            self.date
                .map(|d| keys.key_for(&d).to_string())
                .unwrap_or_default(),
            self.time
                .map(|t| t.format("%H:%M").to_string())
                .unwrap_or_default(),
            self.meal_type
                .map(|m| m.as_str().to_string())
                .unwrap_or_default(),
            self.description.clone(),
            self.calories.map(|c| c.to_string()).unwrap_or_default(),
        ]
    }
}

/// Blank is zero-equivalent; anything else must be a finite, non-negative number
fn parse_calories(s: &str) -> Option<f64> {
    if s.is_empty() {
        return Some(0.0);
    }
    s.parse::<f64>()
        .ok()
        .filter(|value| value.is_finite() && *value >= 0.0)
}

fn parse_time(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .ok()
}

/// Read every entry of the log collection, header excluded
pub fn read_entries(
    store: &dyn TabularStore,
    collection: &str,
    keys: &DateKeyFormatter,
) -> Result<Vec<LogEntry>> {
    let rows = store.read_all(collection)?;
    let entries: Vec<LogEntry> = rows
        .iter()
        .skip(1)
        .map(|row| LogEntry::from_row(row, keys))
        .collect();
    tracing::debug!("Read {} entries from log {}", entries.len(), collection);
    Ok(entries)
}

/// Append one entry to the log. The caller commits.
pub fn append_entry(
    store: &mut dyn TabularStore,
    collection: &str,
    entry: &LogEntry,
    keys: &DateKeyFormatter,
) -> Result<()> {
    store.append_row(collection, entry.to_row(keys))?;
    tracing::info!(
        "Appended {} kcal ({}) to log",
        entry.calories.unwrap_or_default(),
        entry.description
    );
    Ok(())
}

/// Sum valid entries into per-day totals.
///
/// Entries without a readable date or calorie value are skipped. The result
/// does not depend on entry order, and every date of a valid entry appears
/// exactly once.
pub fn aggregate(entries: &[LogEntry], keys: &DateKeyFormatter) -> DailyTotals {
    let mut totals = DailyTotals::new();
    let mut skipped = 0usize;

    for (index, entry) in entries.iter().enumerate() {
        let (date, calories) = match (entry.date, entry.calories) {
            (Some(date), Some(calories)) => (date, calories),
            (None, _) => {
                tracing::warn!("Skipping log entry {}: missing or unreadable date", index + 1);
                skipped += 1;
                continue;
            }
            (_, None) => {
                tracing::warn!("Skipping log entry {}: calories are not a number", index + 1);
                skipped += 1;
                continue;
            }
        };

        *totals.entry(keys.key_for(&date)).or_insert(0.0) += calories;
    }

    // Drop float noise from the summation before totals are graded or stored
    for total in totals.values_mut() {
        *total = round_calories(*total);
    }

    tracing::info!(
        "Aggregated {} entries into {} days ({} skipped)",
        entries.len() - skipped,
        totals.len(),
        skipped
    );
    totals
}
