//! Per-day summary store and its idempotent upsert.
//!
//! The summary collection holds one row per DateKey:
//! `date,total_calories,goal_limit,status`, where `status` is the display
//! text and carries an Under/Over style annotation. Rows are matched by
//! date, never by position, and updated in place; a date seen for the first
//! time is appended. Re-running with the same totals and goal produces no
//! writes at all.

use crate::config::DisplayConfig;
use crate::date_key::DateKey;
use crate::store::{CellRef, Row, StyleHint, TabularStore};
use crate::{DailySummaryRecord, DailyTotals, Error, GoalStatus, Result};
use serde::Serialize;
use std::collections::HashMap;

/// Header of the summary collection
pub const SUMMARY_HEADER: [&str; 4] = ["date", "total_calories", "goal_limit", "status"];

const DATE_COL: usize = 0;
const TOTAL_COL: usize = 1;
const GOAL_COL: usize = 2;
const STATUS_COL: usize = 3;

/// A data row of the summary collection with a readable date
#[derive(Clone, Debug, PartialEq)]
pub struct StoredSummary {
    pub row: usize,
    pub date: DateKey,
    pub cells: Row,
}

impl StoredSummary {
    pub fn total_calories(&self) -> Option<f64> {
        self.cells
            .get(TOTAL_COL)
            .and_then(|c| c.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite())
    }

    pub fn goal_limit(&self) -> Option<f64> {
        self.cells
            .get(GOAL_COL)
            .and_then(|c| c.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite())
    }

    /// Rebuild the record from its stored total and goal
    pub fn to_record(&self) -> Option<DailySummaryRecord> {
        Some(DailySummaryRecord::compute(
            self.date.clone(),
            self.total_calories()?,
            self.goal_limit()?,
        ))
    }
}

/// Snapshot of the summary collection
#[derive(Clone, Debug, Default)]
pub struct SummaryTable {
    pub rows: Vec<StoredSummary>,
    /// Index the next appended row will get
    pub next_row: usize,
}

/// Read the summary collection; fails if it was never initialized
pub fn read_summary(store: &dyn TabularStore, collection: &str) -> Result<SummaryTable> {
    if !store.has_collection(collection) {
        return Err(Error::StoreNotInitialized(collection.to_string()));
    }

    let raw = store.read_all(collection)?;
    let next_row = raw.len().max(1);
    let rows = raw
        .into_iter()
        .enumerate()
        .skip(1)
        .filter_map(|(row, cells)| {
            let date = cells.get(DATE_COL).and_then(|c| DateKey::parse(c));
            match date {
                Some(date) => Some(StoredSummary { row, date, cells }),
                None => {
                    tracing::warn!("Ignoring summary row {} without a valid date", row);
                    None
                }
            }
        })
        .collect();

    Ok(SummaryTable { rows, next_row })
}

/// Encode a record as a summary row
pub fn record_to_row(record: &DailySummaryRecord) -> Row {
    vec![
        record.date.to_string(),
        record.total_calories.to_string(),
        record.goal_limit.to_string(),
        record.display_text.clone(),
    ]
}

/// A single write the upsert needs
#[derive(Clone, Debug, PartialEq)]
pub enum UpsertOp {
    Update { row: usize, record: DailySummaryRecord },
    Append { row: usize, record: DailySummaryRecord },
}

/// Outcome of planning an upsert, before anything is written
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UpsertPlan {
    /// Every record the run covers, with its row, in row order
    pub placed: Vec<(usize, DailySummaryRecord)>,
    pub ops: Vec<UpsertOp>,
    pub unchanged: usize,
}

impl UpsertPlan {
    pub fn created(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, UpsertOp::Append { .. }))
            .count()
    }

    pub fn rewritten(&self) -> usize {
        self.ops.len() - self.created()
    }

    pub fn records(&self) -> Vec<DailySummaryRecord> {
        self.placed.iter().map(|(_, record)| record.clone()).collect()
    }
}

/// Counts reported after an upsert is applied
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct UpsertReport {
    pub records: Vec<DailySummaryRecord>,
    pub created: usize,
    pub rewritten: usize,
    pub unchanged: usize,
}

/// Reconciles daily totals into the summary collection
#[derive(Clone, Debug)]
pub struct SummaryUpserter {
    collection: String,
    display: DisplayConfig,
}

impl SummaryUpserter {
    pub fn new(collection: impl Into<String>, display: DisplayConfig) -> Self {
        Self {
            collection: collection.into(),
            display,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Style hint tied to a status
    pub fn marker(&self, status: GoalStatus) -> StyleHint {
        match status {
            GoalStatus::Under => StyleHint(self.display.under_marker.clone()),
            GoalStatus::Over => StyleHint(self.display.over_marker.clone()),
        }
    }

    /// Decide what to write. Pure: the store is not touched.
    ///
    /// Dates in `totals` are graded against `goal_limit` and matched to
    /// existing rows by date. Existing rows whose date has no total any more
    /// are re-graded from their stored total, so a new goal reaches every
    /// row. Rows are never removed.
    pub fn plan(&self, existing: &SummaryTable, totals: &DailyTotals, goal_limit: f64) -> UpsertPlan {
        let mut by_date: HashMap<&DateKey, &StoredSummary> = HashMap::new();
        for stored in &existing.rows {
            if by_date.contains_key(&stored.date) {
                tracing::warn!(
                    "Duplicate summary row {} for {}; only the first is maintained",
                    stored.row,
                    stored.date
                );
                continue;
            }
            by_date.insert(&stored.date, stored);
        }

        let mut plan = UpsertPlan::default();
        let mut next_row = existing.next_row;

        for (date, total) in totals {
            let record = DailySummaryRecord::compute(date.clone(), *total, goal_limit);
            match by_date.get(date) {
                Some(stored) => self.plan_update(&mut plan, stored, record),
                None => {
                    tracing::debug!("Creating summary row {} for {}", next_row, date);
                    plan.ops.push(UpsertOp::Append {
                        row: next_row,
                        record: record.clone(),
                    });
                    plan.placed.push((next_row, record));
                    next_row += 1;
                }
            }
        }

        for stored in existing.rows.iter() {
            let is_first = by_date
                .get(&stored.date)
                .map_or(false, |first| first.row == stored.row);
            if !is_first || totals.contains_key(&stored.date) {
                continue;
            }
            match stored.total_calories() {
                Some(total) => {
                    let record = DailySummaryRecord::compute(stored.date.clone(), total, goal_limit);
                    self.plan_update(&mut plan, stored, record);
                }
                None => tracing::warn!(
                    "Summary row {} for {} has no readable total; leaving it as is",
                    stored.row,
                    stored.date
                ),
            }
        }

        plan.placed.sort_by_key(|(row, _)| *row);
        plan
    }

    fn plan_update(&self, plan: &mut UpsertPlan, stored: &StoredSummary, record: DailySummaryRecord) {
        if stored.cells == record_to_row(&record) {
            plan.unchanged += 1;
        } else {
            tracing::debug!("Updating summary row {} for {}", stored.row, stored.date);
            plan.ops.push(UpsertOp::Update {
                row: stored.row,
                record: record.clone(),
            });
        }
        plan.placed.push((stored.row, record));
    }

    /// Write a plan to the store and refresh the status annotations.
    ///
    /// Writes are buffered by the store; the caller commits.
    pub fn apply(&self, store: &mut dyn TabularStore, plan: &UpsertPlan) -> Result<()> {
        for op in &plan.ops {
            match op {
                UpsertOp::Update { row, record } => {
                    store.write_row(&self.collection, *row, record_to_row(record))?
                }
                UpsertOp::Append { record, .. } => {
                    store.append_row(&self.collection, record_to_row(record))?
                }
            }
        }

        for (row, record) in &plan.placed {
            let cell = CellRef {
                collection: self.collection.clone(),
                row: *row,
                column: STATUS_COL,
            };
            let hint = self.marker(record.status);
            if store.annotation(&cell)?.as_ref() != Some(&hint) {
                store.annotate(cell, hint)?;
            }
        }
        Ok(())
    }

    /// Read, plan and apply in one step
    pub fn upsert(
        &self,
        store: &mut dyn TabularStore,
        totals: &DailyTotals,
        goal_limit: f64,
    ) -> Result<UpsertReport> {
        let existing = read_summary(store, &self.collection)?;
        let plan = self.plan(&existing, totals, goal_limit);
        self.apply(store, &plan)?;

        let report = UpsertReport {
            records: plan.records(),
            created: plan.created(),
            rewritten: plan.rewritten(),
            unchanged: plan.unchanged,
        };
        tracing::info!(
            created = report.created,
            rewritten = report.rewritten,
            unchanged = report.unchanged,
            "Upserted {} summary records against goal {}",
            report.records.len(),
            goal_limit
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn key(s: &str) -> DateKey {
        DateKey::parse(s).unwrap()
    }

    fn upserter() -> SummaryUpserter {
        SummaryUpserter::new("summary", DisplayConfig::default())
    }

    fn initialized_store() -> MemoryStore {
        let mut store = MemoryStore::new();
        store.create_collection("summary", &SUMMARY_HEADER).unwrap();
        store
    }

    fn totals(pairs: &[(&str, f64)]) -> DailyTotals {
        pairs.iter().map(|(d, t)| (key(d), *t)).collect()
    }

    fn status_hint(store: &MemoryStore, row: usize) -> Option<StyleHint> {
        store
            .annotation(&CellRef {
                collection: "summary".into(),
                row,
                column: STATUS_COL,
            })
            .unwrap()
    }

    #[test]
    fn test_creates_records() {
        let mut store = initialized_store();
        let report = upserter()
            .upsert(
                &mut store,
                &totals(&[("2024-01-15", 1600.0), ("2024-01-16", 2300.0)]),
                2056.0,
            )
            .unwrap();

        assert_eq!(report.created, 2);
        let rows = store.read_all("summary").unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1], vec!["2024-01-15", "1600", "2056", "Under Goal (+456)"]);
        assert_eq!(rows[2], vec!["2024-01-16", "2300", "2056", "Over Goal (-244)"]);
        assert_eq!(status_hint(&store, 1), Some(StyleHint("green".into())));
        assert_eq!(status_hint(&store, 2), Some(StyleHint("red".into())));

        let table = read_summary(&store, "summary").unwrap();
        assert_eq!(table.rows[1].to_record(), Some(report.records[1].clone()));
    }

    #[test]
    fn test_rerun_is_idempotent() {
        let mut store = initialized_store();
        let daily = totals(&[("2024-01-15", 1600.0)]);

        let first = upserter().upsert(&mut store, &daily, 2056.0).unwrap();
        let snapshot = store.table("summary").cloned();

        let second = upserter().upsert(&mut store, &daily, 2056.0).unwrap();

        assert_eq!(first.records, second.records);
        assert_eq!(second.created, 0);
        assert_eq!(second.rewritten, 0);
        assert_eq!(second.unchanged, 1);
        assert_eq!(store.table("summary").cloned(), snapshot);
    }

    #[test]
    fn test_updates_in_place_by_date() {
        let mut store = initialized_store();
        store
            .append_row("summary", vec!["2024-01-10".into(), "900".into(), "2000".into(), "Under Goal (+1100)".into()])
            .unwrap();
        store
            .append_row("summary", vec!["2024-01-15".into(), "100".into(), "2000".into(), "Under Goal (+1900)".into()])
            .unwrap();

        let report = upserter()
            .upsert(&mut store, &totals(&[("2024-01-15", 2100.0)]), 2000.0)
            .unwrap();

        assert_eq!(report.created, 0);
        assert_eq!(report.rewritten, 1);
        let rows = store.read_all("summary").unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2], vec!["2024-01-15", "2100", "2000", "Over Goal (-100)"]);
        assert_eq!(status_hint(&store, 2), Some(StyleHint("red".into())));
    }

    #[test]
    fn test_new_goal_regrades_rows_without_totals() {
        let mut store = initialized_store();
        upserter()
            .upsert(&mut store, &totals(&[("2024-01-10", 1900.0)]), 2056.0)
            .unwrap();

        // 2024-01-10 no longer has entries but keeps its stored total
        let report = upserter()
            .upsert(&mut store, &totals(&[("2024-01-15", 1600.0)]), 1800.0)
            .unwrap();

        assert_eq!(report.records.len(), 2);
        let rows = store.read_all("summary").unwrap();
        assert_eq!(rows[1], vec!["2024-01-10", "1900", "1800", "Over Goal (-100)"]);
        assert_eq!(rows[2], vec!["2024-01-15", "1600", "1800", "Under Goal (+200)"]);
    }

    #[test]
    fn test_uninitialized_store_is_fatal() {
        let mut store = MemoryStore::new();
        let result = upserter().upsert(&mut store, &totals(&[("2024-01-15", 1.0)]), 2000.0);
        assert!(matches!(result, Err(Error::StoreNotInitialized(_))));
        assert!(!store.has_collection("summary"));
    }

    #[test]
    fn test_empty_totals_is_noop() {
        let mut store = initialized_store();
        let report = upserter().upsert(&mut store, &DailyTotals::new(), 2000.0).unwrap();
        assert!(report.records.is_empty());
        assert_eq!(store.read_all("summary").unwrap().len(), 1);
    }

    #[test]
    fn test_duplicate_rows_are_not_multiplied() {
        let mut store = initialized_store();
        for _ in 0..2 {
            store
                .append_row("summary", vec!["2024-01-15".into(), "1".into(), "1".into(), "x".into()])
                .unwrap();
        }

        upserter()
            .upsert(&mut store, &totals(&[("2024-01-15", 1600.0)]), 2056.0)
            .unwrap();

        let rows = store.read_all("summary").unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1][3], "Under Goal (+456)");
    }

    #[test]
    fn test_plan_skips_malformed_rows_but_keeps_positions() {
        let mut store = initialized_store();
        store
            .append_row("summary", vec!["garbage".into()])
            .unwrap();

        let table = read_summary(&store, "summary").unwrap();
        assert!(table.rows.is_empty());
        assert_eq!(table.next_row, 2);

        let plan = upserter().plan(&table, &totals(&[("2024-01-15", 10.0)]), 20.0);
        assert_eq!(
            plan.ops,
            vec![UpsertOp::Append {
                row: 2,
                record: DailySummaryRecord::compute(key("2024-01-15"), 10.0, 20.0),
            }]
        );
    }
}
