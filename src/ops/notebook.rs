use chrono::NaiveDate;
use log::debug;

use crate::io::buckets::{self, day_keys, read_bucket, write_bucket};
use crate::io::store::{Store, StoreError};
use crate::model::category::Category;
use crate::model::config::Config;
use crate::model::day::{is_day_key, parse_day};
use crate::model::note::{Note, NoteField};
use crate::ops::export::{self, ExportOptions, ExportRow};
use crate::ops::numbering::{DisplayIndex, display_indexes, next_available_id, renumber};
use crate::ops::search::{self, SearchResult};
use crate::ops::stats::{self, ProjectRate, StatsScope, StatsSnapshot, Tally};
use crate::ops::ticker::{TickOwner, TickSchedule};
use crate::ops::timers::{CategoryTimerSet, TimerRegistry};
use crate::util::time::TimeSource;

/// Error type for notebook operations
#[derive(Debug, thiserror::Error)]
pub enum NotebookError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("note not found: {0}")]
    NoteNotFound(u32),
    #[error("invalid day: {0} (expected YYYY-MM-DD)")]
    InvalidDay(String),
}

/// Presentation and export knobs
#[derive(Debug, Clone)]
pub struct NotebookSettings {
    pub canceled_label: String,
    pub tick_interval_ms: i64,
    pub include_canceled_in_export: bool,
}

impl Default for NotebookSettings {
    fn default() -> Self {
        NotebookSettings::from(&Config::default())
    }
}

impl From<&Config> for NotebookSettings {
    fn from(config: &Config) -> Self {
        NotebookSettings {
            canceled_label: config.display.canceled_label.clone(),
            tick_interval_ms: config.display.tick_seconds.max(1) as i64 * 1000,
            include_canceled_in_export: config.export.include_canceled,
        }
    }
}

/// A recomputed display value for one ticking owner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickUpdate {
    pub owner: TickOwner,
    pub seconds: i64,
}

/// Owns the selected day's notes and routes every lifecycle transition,
/// persisting each one to the store.
///
/// Illegal transitions (completing or canceling a draft, editing a
/// completed note, reopening an open one) are not errors: the operation
/// returns `Ok(false)` and nothing changes.
pub struct Notebook<S: Store> {
    store: S,
    time: Box<dyn TimeSource>,
    day: String,
    notes: Vec<Note>,
    timers: CategoryTimerSet,
    ticks: TickSchedule,
    settings: NotebookSettings,
}

impl<S: Store> Notebook<S> {
    /// Open `day` using the timer registry persisted in `store`.
    pub fn open(
        store: S,
        time: Box<dyn TimeSource>,
        day: &str,
        settings: NotebookSettings,
    ) -> Result<Self, NotebookError> {
        let timers = CategoryTimerSet::load(&store);
        Self::with_timers(store, time, timers, day, settings)
    }

    /// Open `day` with an injected registry.
    pub fn with_registry(
        store: S,
        time: Box<dyn TimeSource>,
        registry: Box<dyn TimerRegistry>,
        day: &str,
        settings: NotebookSettings,
    ) -> Result<Self, NotebookError> {
        Self::with_timers(store, time, CategoryTimerSet::new(registry), day, settings)
    }

    fn with_timers(
        store: S,
        time: Box<dyn TimeSource>,
        timers: CategoryTimerSet,
        day: &str,
        settings: NotebookSettings,
    ) -> Result<Self, NotebookError> {
        if !is_day_key(day) {
            return Err(NotebookError::InvalidDay(day.to_string()));
        }
        let ticks = TickSchedule::new(settings.tick_interval_ms);
        let mut notebook = Notebook {
            store,
            time,
            day: day.to_string(),
            notes: Vec::new(),
            timers,
            ticks,
            settings,
        };
        let now = notebook.now();
        notebook.timers.load_timer_state(&mut notebook.store, day, now)?;
        notebook.load_notes()?;
        Ok(notebook)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn day(&self) -> &str {
        &self.day
    }

    pub fn settings(&self) -> &NotebookSettings {
        &self.settings
    }

    pub fn now(&self) -> i64 {
        self.time.now_ms()
    }

    pub fn timers(&self) -> &CategoryTimerSet {
        &self.timers
    }

    pub fn ticks(&self) -> &TickSchedule {
        &self.ticks
    }

    // -----------------------------------------------------------------------
    // Day selection and loading
    // -----------------------------------------------------------------------

    /// Switch the selected day. Category timers running in the old day keep
    /// running; every tick is rebuilt for the new day.
    pub fn select_day(&mut self, day: &str) -> Result<(), NotebookError> {
        if !is_day_key(day) {
            return Err(NotebookError::InvalidDay(day.to_string()));
        }
        if day == self.day {
            return Ok(());
        }
        let now = self.now();
        let previous = std::mem::replace(&mut self.day, day.to_string());
        self.timers.save_timer_state(&mut self.store, &previous)?;
        self.timers.load_timer_state(&mut self.store, day, now)?;
        debug!("switched day {} -> {}", previous, day);
        self.load_notes()
    }

    fn load_notes(&mut self) -> Result<(), NotebookError> {
        let bucket = read_bucket(&mut self.store, &self.day)?;
        self.notes = bucket
            .into_iter()
            .map(|(id, record)| Note::from_record(&self.day, id, record))
            .collect();
        self.ensure_trailing_draft()?;
        self.rebuild_ticks();
        Ok(())
    }

    /// Append a fresh draft if every note of the day is completed (or the day
    /// is empty). Returns the new draft's id.
    pub fn ensure_trailing_draft(&mut self) -> Result<Option<u32>, NotebookError> {
        if self.notes.iter().all(|n| n.completed) {
            let id = self.create_note()?;
            return Ok(Some(id));
        }
        Ok(None)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Notes of the selected day in id order
    pub fn list_notes(&self) -> &[Note] {
        &self.notes
    }

    /// Notes of any day, read from the store
    pub fn notes_in(&mut self, day: &str) -> Result<Vec<Note>, NotebookError> {
        if day == self.day {
            return Ok(self.notes.clone());
        }
        if !is_day_key(day) {
            return Err(NotebookError::InvalidDay(day.to_string()));
        }
        let bucket = read_bucket(&mut self.store, day)?;
        Ok(bucket
            .into_iter()
            .map(|(id, record)| Note::from_record(day, id, record))
            .collect())
    }

    pub fn note(&self, id: u32) -> Option<&Note> {
        self.notes.iter().find(|n| n.id == id)
    }

    fn position(&self, id: u32) -> Result<usize, NotebookError> {
        self.notes
            .iter()
            .position(|n| n.id == id)
            .ok_or(NotebookError::NoteNotFound(id))
    }

    /// Position among non-canceled notes, recomputed on every call.
    pub fn display_index(&self, id: u32) -> Option<DisplayIndex> {
        let flags: Vec<(u32, bool)> = self.notes.iter().map(|n| (n.id, n.canceled)).collect();
        display_indexes(&flags)
            .into_iter()
            .find(|(nid, _)| *nid == id)
            .map(|(_, index)| index)
    }

    pub fn display_label(&self, id: u32) -> Option<String> {
        self.display_index(id)
            .map(|index| index.render(&self.settings.canceled_label))
    }

    /// Smallest positive id unused by the stored bucket or the loaded notes.
    pub fn next_available_id(&mut self) -> Result<u32, NotebookError> {
        let stored = read_bucket(&mut self.store, &self.day)?;
        let taken = stored.keys().copied().chain(self.notes.iter().map(|n| n.id));
        Ok(next_available_id(taken))
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Create and persist a blank draft. Returns its id.
    pub fn create_note(&mut self) -> Result<u32, NotebookError> {
        let id = self.next_available_id()?;
        let note = Note::blank(&self.day, id);
        note.save(&mut self.store)?;
        self.notes.push(note);
        self.notes.sort_by_key(|n| n.id);
        debug!("created note {} in {}", id, self.day);
        Ok(id)
    }

    /// Set a field. The first edit of a draft starts its clock.
    pub fn edit_field(&mut self, id: u32, field: NoteField, value: &str) -> Result<bool, NotebookError> {
        let idx = self.position(id)?;
        if self.notes[idx].completed {
            debug!("rejected edit of completed note {}", id);
            return Ok(false);
        }
        let now = self.now();
        let note = &mut self.notes[idx];
        note.edit(&mut self.store, field, value, now)?;
        if note.clock.is_running() {
            self.ticks.start(TickOwner::Note(id), now);
        }
        Ok(true)
    }

    /// Complete (or cancel) a started, open note, then make sure a trailing
    /// draft exists.
    pub fn complete_note(&mut self, id: u32, canceled: bool) -> Result<bool, NotebookError> {
        let idx = self.position(id)?;
        let note = &self.notes[idx];
        if !note.has_started || note.completed {
            debug!("rejected completion of note {} (canceled={})", id, canceled);
            return Ok(false);
        }
        let now = self.now();
        self.notes[idx].complete(&mut self.store, canceled, now)?;
        self.ticks.cancel(&TickOwner::Note(id));
        debug!("completed note {} (canceled={})", id, canceled);
        self.ensure_trailing_draft()?;
        Ok(true)
    }

    pub fn cancel_note(&mut self, id: u32) -> Result<bool, NotebookError> {
        self.complete_note(id, true)
    }

    /// Reopen a completed note for editing. Its clock resumes from the
    /// accumulated total and a prior cancel is remembered.
    pub fn reopen_note(&mut self, id: u32) -> Result<bool, NotebookError> {
        let idx = self.position(id)?;
        if !self.notes[idx].completed {
            debug!("rejected reopen of open note {}", id);
            return Ok(false);
        }
        let now = self.now();
        self.notes[idx].reopen(&mut self.store, now)?;
        self.ticks.start(TickOwner::Note(id), now);
        debug!("reopened note {}", id);
        Ok(true)
    }

    /// Delete a note and renumber the day so ids are `1..=n` again.
    pub fn delete_note(&mut self, id: u32) -> Result<bool, NotebookError> {
        let in_memory = self.notes.iter().any(|n| n.id == id);
        let in_store = buckets::remove_record(&mut self.store, &self.day, id)?;
        if !in_memory && !in_store {
            return Err(NotebookError::NoteNotFound(id));
        }
        self.ticks.cancel(&TickOwner::Note(id));

        let bucket = read_bucket(&mut self.store, &self.day)?;
        let (renumbered, moved) = renumber(bucket);
        if !moved.is_empty() {
            write_bucket(&mut self.store, &self.day, &renumbered)?;
        }
        debug!("deleted note {} in {}; renumbered {:?}", id, self.day, moved);
        self.load_notes()?;
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Search, statistics, export
    // -----------------------------------------------------------------------

    pub fn search(&mut self, query: &str) -> Result<Vec<SearchResult>, NotebookError> {
        let now = self.now();
        Ok(search::search_days(&mut self.store, query, now)?)
    }

    /// Days in scope, read from the store, oldest first
    fn scoped_buckets(&mut self, scope: StatsScope) -> Result<Vec<buckets::Bucket>, NotebookError> {
        let mut days: Vec<(NaiveDate, String)> = day_keys(&self.store)
            .into_iter()
            .filter_map(|k| parse_day(&k).map(|d| (d, k)))
            .filter(|(d, _)| scope.includes(*d))
            .collect();
        days.sort();
        let mut out = Vec::with_capacity(days.len());
        for (_, day) in days {
            out.push(read_bucket(&mut self.store, &day)?);
        }
        Ok(out)
    }

    pub fn compute_stats(&mut self, scope: StatsScope) -> Result<StatsSnapshot, NotebookError> {
        let now = self.now();
        if scope == StatsScope::Day {
            return Ok(stats::compute_stats(self.notes.iter().map(|n| Tally::from_note(n, now))));
        }
        let buckets = self.scoped_buckets(scope)?;
        Ok(stats::compute_stats(
            buckets
                .iter()
                .flat_map(|b| b.values())
                .map(|r| Tally::from_record(r, now)),
        ))
    }

    pub fn compute_project_rates(&mut self, scope: StatsScope) -> Result<Vec<ProjectRate>, NotebookError> {
        let now = self.now();
        if scope == StatsScope::Day {
            return Ok(stats::compute_project_rates(
                self.notes.iter().map(|n| Tally::from_note(n, now)),
            ));
        }
        let buckets = self.scoped_buckets(scope)?;
        Ok(stats::compute_project_rates(
            buckets
                .iter()
                .flat_map(|b| b.values())
                .map(|r| Tally::from_record(r, now)),
        ))
    }

    pub fn export_rows(
        &mut self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<ExportRow>, NotebookError> {
        let now = self.now();
        let opts = ExportOptions {
            from,
            to,
            include_canceled: self.settings.include_canceled_in_export,
            canceled_label: &self.settings.canceled_label,
        };
        Ok(export::export_rows(&mut self.store, &opts, now)?)
    }

    // -----------------------------------------------------------------------
    // Category timers (selected day)
    // -----------------------------------------------------------------------

    pub fn start_category(&mut self, category: Category) -> Result<(), NotebookError> {
        let now = self.now();
        self.timers.start_timer(&mut self.store, &self.day, category, now)?;
        self.refresh_category_ticks(now);
        Ok(())
    }

    pub fn stop_category(&mut self, category: Category) -> Result<bool, NotebookError> {
        let now = self.now();
        let stopped = self.timers.stop_timer(&mut self.store, &self.day, category, now)?;
        self.refresh_category_ticks(now);
        Ok(stopped)
    }

    pub fn edit_category(
        &mut self,
        category: Category,
        hours: i64,
        minutes: i64,
        seconds: i64,
    ) -> Result<(), NotebookError> {
        let now = self.now();
        self.timers
            .edit_timer(&mut self.store, &self.day, category, hours, minutes, seconds, now)?;
        self.refresh_category_ticks(now);
        Ok(())
    }

    /// Stop every category timer in every day.
    pub fn stop_all_categories(&mut self) -> Result<Vec<(String, Category)>, NotebookError> {
        let now = self.now();
        let stopped = self.timers.stop_all_timers(&mut self.store, now)?;
        self.refresh_category_ticks(now);
        Ok(stopped)
    }

    pub fn category_seconds(&self, category: Category) -> i64 {
        self.timers
            .get_seconds(&self.store, &self.day, category, self.now())
    }

    pub fn running_category(&self) -> Option<Category> {
        self.timers.running_category(&self.store, &self.day)
    }

    /// Off-platform seconds for the selected day
    pub fn category_total(&self) -> i64 {
        self.timers.bucket_total(&self.store, &self.day, self.now())
    }

    // -----------------------------------------------------------------------
    // Ticks
    // -----------------------------------------------------------------------

    fn rebuild_ticks(&mut self) {
        let now = self.now();
        self.ticks.cancel_all();
        for note in &self.notes {
            if note.clock.is_running() && !note.completed {
                self.ticks.start(TickOwner::Note(note.id), now);
            }
        }
        self.refresh_category_ticks(now);
    }

    /// Tick exactly the categories running in the selected day.
    fn refresh_category_ticks(&mut self, now: i64) {
        let running = self.timers.running_category(&self.store, &self.day);
        for category in Category::ALL {
            let owner = TickOwner::Category(self.day.clone(), category);
            if Some(category) == running {
                self.ticks.start(owner, now);
            } else {
                self.ticks.cancel(&owner);
            }
        }
    }

    /// Poll the tick schedule and recompute every owner that fired.
    pub fn tick(&mut self) -> Vec<TickUpdate> {
        let now = self.now();
        let mut updates = Vec::new();
        for owner in self.ticks.due(now) {
            let seconds = match &owner {
                TickOwner::Note(id) => match self.note(*id) {
                    Some(note) => note.elapsed_seconds(now),
                    None => {
                        self.ticks.cancel(&owner);
                        continue;
                    }
                },
                TickOwner::Category(day, category) => {
                    self.timers.get_seconds(&self.store, day, *category, now)
                }
            };
            updates.push(TickUpdate { owner, seconds });
        }
        updates
    }
}
