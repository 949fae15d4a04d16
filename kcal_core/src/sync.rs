//! Orchestrates recomputation when the ledger or the profile changes.
//!
//! Every trigger runs the whole pipeline to completion before returning:
//!
//! 1. **EntryChanged**: aggregate the full log, upsert against the cached
//!    goal (computed from the profile if nothing is cached yet)
//! 2. **ProfileChanged** / **ExplicitRefresh**: recompute the goal, then
//!    aggregate and upsert, which rewrites the goal of every summary row
//!
//! Totals are always rebuilt from the full log, so repeated or reordered
//! triggers converge on the same summary. Fatal errors discard buffered
//! writes and replace the today projection with a failure.

use crate::config::CollectionsConfig;
use crate::date_key::{DateKey, DateKeyFormatter};
use crate::error::Failure;
use crate::profile::ProfileField;
use crate::store::TabularStore;
use crate::summary::{read_summary, SummaryTable, SummaryUpserter};
use crate::{ledger, metrics, profile, Config, DailySummaryRecord, Error, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Source of "now" for the today projection
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at one instant
#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// What the host reports when a collection is edited
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EditEvent {
    pub collection: String,
    /// Field names (profile) or column names (log) touched by the edit
    pub fields: Vec<String>,
}

/// Typed trigger for the orchestrator
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChangeSignal {
    EntryChanged,
    ProfileChanged(Vec<ProfileField>),
    ExplicitRefresh,
}

impl ChangeSignal {
    /// Classify a raw edit.
    ///
    /// Edits to the log are entry changes; edits to the profile that name at
    /// least one profile field are profile changes; anything else is treated
    /// as an explicit refresh.
    pub fn classify(event: &EditEvent, collections: &CollectionsConfig) -> Self {
        if event.collection == collections.log {
            return ChangeSignal::EntryChanged;
        }

        if event.collection == collections.profile {
            let fields: Vec<ProfileField> = event
                .fields
                .iter()
                .filter_map(|f| ProfileField::parse(f))
                .collect();
            if !fields.is_empty() {
                return ChangeSignal::ProfileChanged(fields);
            }
        }

        ChangeSignal::ExplicitRefresh
    }

    fn recomputes_goal(&self) -> bool {
        !matches!(self, ChangeSignal::EntryChanged)
    }
}

/// Result of one pipeline run
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RecomputeReport {
    pub updated_date_count: usize,
    pub created: usize,
    pub rewritten: usize,
    pub unchanged: usize,
    pub goal_limit: f64,
}

/// What the display surface shows for the current day
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TodayView {
    Ready(DailySummaryRecord),
    Failed(Failure),
}

/// Runs the aggregation and upsert pipeline over a store
pub struct SyncOrchestrator<S: TabularStore, C: Clock = SystemClock> {
    store: S,
    clock: C,
    collections: CollectionsConfig,
    keys: DateKeyFormatter,
    upserter: SummaryUpserter,
    goal_limit: Option<f64>,
    today: Option<TodayView>,
}

impl<S: TabularStore> SyncOrchestrator<S, SystemClock> {
    pub fn new(store: S, config: &Config) -> Result<Self> {
        Self::with_clock(store, config, SystemClock)
    }
}

impl<S: TabularStore, C: Clock> SyncOrchestrator<S, C> {
    pub fn with_clock(store: S, config: &Config, clock: C) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            clock,
            collections: config.collections.clone(),
            keys: DateKeyFormatter::from_config(config)?,
            upserter: SummaryUpserter::new(config.collections.summary.clone(), config.display.clone()),
            goal_limit: None,
            today: None,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Mutable access for hosts that edit collections directly
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn keys(&self) -> &DateKeyFormatter {
        &self.keys
    }

    /// Goal used by the last successful run
    pub fn goal_limit(&self) -> Option<f64> {
        self.goal_limit
    }

    /// Last projection handed to the display surface
    pub fn today_view(&self) -> Option<&TodayView> {
        self.today.as_ref()
    }

    /// Trigger hook: classify a raw edit and run the matching pipeline
    pub fn on_edit(&mut self, event: &EditEvent) -> Result<RecomputeReport> {
        let signal = ChangeSignal::classify(event, &self.collections);
        tracing::debug!(?event, ?signal, "Classified edit");
        self.handle(signal)
    }

    /// Full refresh: recompute the goal and every summary row
    pub fn recompute_all(&mut self) -> Result<RecomputeReport> {
        self.handle(ChangeSignal::ExplicitRefresh)
    }

    pub fn handle(&mut self, signal: ChangeSignal) -> Result<RecomputeReport> {
        tracing::info!("Running pipeline for {:?}", signal);

        match self.run(&signal) {
            Ok(report) => Ok(report),
            Err(err) => {
                tracing::error!("Pipeline failed: {}", err);
                self.store.discard();
                self.today = Some(TodayView::Failed(Failure::from(&err)));
                Err(err)
            }
        }
    }

    fn run(&mut self, signal: &ChangeSignal) -> Result<RecomputeReport> {
        // Checked first so an uninitialized store fails before anything else is read
        if !self.store.has_collection(&self.collections.summary) {
            return Err(Error::StoreNotInitialized(self.collections.summary.clone()));
        }

        let cached = match (signal.recomputes_goal(), self.goal_limit) {
            (true, _) => None,
            (false, Some(goal)) => Some(goal),
            (false, None) => self.stored_goal()?,
        };
        let goal_limit = match cached {
            Some(goal) => goal,
            None => self.compute_goal()?,
        };

        let entries = ledger::read_entries(&self.store, &self.collections.log, &self.keys)?;
        let totals = ledger::aggregate(&entries, &self.keys);
        let upsert = self.upserter.upsert(&mut self.store, &totals, goal_limit)?;
        self.store.commit()?;

        self.goal_limit = Some(goal_limit);

        let today = self.keys.today(self.clock.now());
        let record = match upsert.records.iter().find(|record| record.date == today) {
            Some(record) => record.clone(),
            None => {
                if let Ok(table) = read_summary(&self.store, &self.collections.summary) {
                    warn_if_unreadable(&table, &today);
                }
                DailySummaryRecord::compute(today, 0.0, goal_limit)
            }
        };
        self.today = Some(TodayView::Ready(record));

        let report = RecomputeReport {
            updated_date_count: upsert.records.len(),
            created: upsert.created,
            rewritten: upsert.rewritten,
            unchanged: upsert.unchanged,
            goal_limit,
        };
        tracing::info!(?report, "Pipeline finished");
        Ok(report)
    }

    /// Goal recorded by an earlier run, taken from the first summary row that has one
    fn stored_goal(&self) -> Result<Option<f64>> {
        let table = read_summary(&self.store, &self.collections.summary)?;
        let goal = table.rows.iter().find_map(|stored| stored.goal_limit());
        if let Some(goal) = goal {
            tracing::debug!("Using stored goal {} from the summary", goal);
        }
        Ok(goal)
    }

    fn compute_goal(&self) -> Result<f64> {
        let profile = profile::load_profile(&self.store, &self.collections.profile)?;
        metrics::compute(&profile)
    }

    /// Current-day record from the summary store.
    ///
    /// If no row exists for today yet, a zero-total record against the
    /// current goal is synthesized; it is not persisted.
    pub fn today_summary(&mut self) -> Result<DailySummaryRecord> {
        match self.locate_today() {
            Ok(record) => {
                self.today = Some(TodayView::Ready(record.clone()));
                Ok(record)
            }
            Err(err) => {
                self.today = Some(TodayView::Failed(Failure::from(&err)));
                Err(err)
            }
        }
    }

    fn locate_today(&mut self) -> Result<DailySummaryRecord> {
        let today = self.keys.today(self.clock.now());
        let table = read_summary(&self.store, &self.collections.summary)?;

        if let Some(record) = table
            .rows
            .iter()
            .find(|stored| stored.date == today)
            .and_then(|stored| stored.to_record())
        {
            return Ok(record);
        }
        warn_if_unreadable(&table, &today);

        let goal_limit = match self.goal_limit {
            Some(goal) => goal,
            None => {
                let goal = self.compute_goal()?;
                self.goal_limit = Some(goal);
                goal
            }
        };
        tracing::debug!("No summary row for {}, synthesizing one", today);
        Ok(DailySummaryRecord::compute(today, 0.0, goal_limit))
    }

    /// Every summary record in stored order
    pub fn summary_records(&self) -> Result<Vec<DailySummaryRecord>> {
        let table = read_summary(&self.store, &self.collections.summary)?;
        Ok(table
            .rows
            .iter()
            .filter_map(|stored| stored.to_record())
            .collect())
    }
}

/// Today's row exists but cannot be read; the projection falls back to zero
fn warn_if_unreadable(table: &SummaryTable, today: &DateKey) {
    if let Some(stored) = table.rows.iter().find(|stored| &stored.date == today) {
        tracing::warn!(
            "Summary row {} for {} has no readable total; showing zero for today",
            stored.row,
            today
        );
    }
}

/// Create the log, profile and summary collections when absent.
///
/// Existing collections are left untouched. Commits on success.
pub fn initialize_store(store: &mut dyn TabularStore, collections: &CollectionsConfig) -> Result<()> {
    store.create_collection(&collections.log, &ledger::LOG_HEADER)?;
    store.create_collection(&collections.profile, &profile::PROFILE_HEADER)?;
    store.create_collection(&collections.summary, &crate::summary::SUMMARY_HEADER)?;
    store.commit()?;
    tracing::info!("Initialized store collections");
    Ok(())
}
