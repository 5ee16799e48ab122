use std::collections::BTreeMap;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::io::store::{Store, StoreError, read_json, write_json};
use crate::model::category::{BucketTimers, Category, CategoryTimer};
use crate::model::day::{ACTIVE_TIMERS_KEY, timers_key};

// ---------------------------------------------------------------------------
// Active-timer registry
// ---------------------------------------------------------------------------

/// Records every running `(day, category)` pair and its session start,
/// regardless of which day is currently selected.
pub trait TimerRegistry {
    fn started_at(&self, day: &str, category: Category) -> Option<i64>;
    fn register(&mut self, day: &str, category: Category, start: i64);
    fn unregister(&mut self, day: &str, category: Category) -> Option<i64>;
    /// Every running pair, ordered by day then category
    fn entries(&self) -> Vec<(String, Category, i64)>;
    /// Write the registry to durable storage, if it has any.
    fn persist(&self, _store: &mut dyn Store) -> Result<(), StoreError> {
        Ok(())
    }
}

type RegistryMap = BTreeMap<String, BTreeMap<Category, i64>>;

fn map_register(map: &mut RegistryMap, day: &str, category: Category, start: i64) {
    map.entry(day.to_string()).or_default().insert(category, start);
}

fn map_unregister(map: &mut RegistryMap, day: &str, category: Category) -> Option<i64> {
    let per_day = map.get_mut(day)?;
    let start = per_day.remove(&category);
    if per_day.is_empty() {
        map.remove(day);
    }
    start
}

fn map_entries(map: &RegistryMap) -> Vec<(String, Category, i64)> {
    map.iter()
        .flat_map(|(day, cats)| cats.iter().map(move |(c, s)| (day.clone(), *c, *s)))
        .collect()
}

/// Registry persisted under `offPlatform_activeTimers`, surviving restarts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoredTimers {
    map: RegistryMap,
}

impl StoredTimers {
    pub fn load(store: &dyn Store) -> Self {
        read_json(store, ACTIVE_TIMERS_KEY).unwrap_or_default()
    }
}

impl TimerRegistry for StoredTimers {
    fn started_at(&self, day: &str, category: Category) -> Option<i64> {
        self.map.get(day)?.get(&category).copied()
    }

    fn register(&mut self, day: &str, category: Category, start: i64) {
        map_register(&mut self.map, day, category, start);
    }

    fn unregister(&mut self, day: &str, category: Category) -> Option<i64> {
        map_unregister(&mut self.map, day, category)
    }

    fn entries(&self) -> Vec<(String, Category, i64)> {
        map_entries(&self.map)
    }

    fn persist(&self, store: &mut dyn Store) -> Result<(), StoreError> {
        write_json(store, ACTIVE_TIMERS_KEY, self)
    }
}

/// Registry that lives only as long as the process.
#[derive(Debug, Clone, Default)]
pub struct MemoryTimers {
    map: RegistryMap,
}

impl TimerRegistry for MemoryTimers {
    fn started_at(&self, day: &str, category: Category) -> Option<i64> {
        self.map.get(day)?.get(&category).copied()
    }

    fn register(&mut self, day: &str, category: Category, start: i64) {
        map_register(&mut self.map, day, category, start);
    }

    fn unregister(&mut self, day: &str, category: Category) -> Option<i64> {
        map_unregister(&mut self.map, day, category)
    }

    fn entries(&self) -> Vec<(String, Category, i64)> {
        map_entries(&self.map)
    }
}

// ---------------------------------------------------------------------------
// Category timer set
// ---------------------------------------------------------------------------

/// Per-day category timers. At most one category runs within a day; timers
/// in days other than the selected one keep running until stopped.
pub struct CategoryTimerSet {
    registry: Box<dyn TimerRegistry>,
    active_day: Option<String>,
}

impl CategoryTimerSet {
    pub fn new(registry: Box<dyn TimerRegistry>) -> Self {
        CategoryTimerSet {
            registry,
            active_day: None,
        }
    }

    /// Timer set backed by the registry persisted in `store`.
    pub fn load(store: &dyn Store) -> Self {
        Self::new(Box::new(StoredTimers::load(store)))
    }

    pub fn active_day(&self) -> Option<&str> {
        self.active_day.as_deref()
    }

    /// Every running `(day, category, start)` across all days
    pub fn running_everywhere(&self) -> Vec<(String, Category, i64)> {
        self.registry.entries()
    }

    /// The day's stored timers; missing or corrupt reads as empty.
    pub fn read(&self, store: &dyn Store, day: &str) -> BucketTimers {
        read_json(store, &timers_key(day)).unwrap_or_default()
    }

    fn write(&self, store: &mut dyn Store, day: &str, timers: &BucketTimers) -> Result<(), StoreError> {
        write_json(store, &timers_key(day), timers)?;
        self.registry.persist(store)
    }

    /// The live session start: the registry wins over the stored snapshot.
    fn live_start(&self, day: &str, category: Category, timer: &CategoryTimer) -> Option<i64> {
        self.registry.started_at(day, category).or(timer.start_time)
    }

    fn live_timer(&self, day: &str, category: Category, timer: CategoryTimer) -> CategoryTimer {
        CategoryTimer {
            start_time: self.live_start(day, category, &timer),
            ..timer
        }
    }

    /// Stored total plus live elapsed time if running.
    pub fn get_seconds(&self, store: &dyn Store, day: &str, category: Category, now: i64) -> i64 {
        let timer = self.read(store, day).get(category);
        self.live_timer(day, category, timer).seconds(now)
    }

    /// Sum over all categories of a day
    pub fn bucket_total(&self, store: &dyn Store, day: &str, now: i64) -> i64 {
        Category::ALL
            .iter()
            .map(|&c| self.get_seconds(store, day, c, now))
            .sum()
    }

    pub fn running_category(&self, store: &dyn Store, day: &str) -> Option<Category> {
        let timers = self.read(store, day);
        Category::ALL
            .into_iter()
            .find(|&c| self.live_start(day, c, &timers.get(c)).is_some())
    }

    /// Stop whichever other category runs in `day`, then start `category`.
    pub fn start_timer(
        &mut self,
        store: &mut dyn Store,
        day: &str,
        category: Category,
        now: i64,
    ) -> Result<(), StoreError> {
        let mut timers = self.read(store, day);
        for other in Category::ALL {
            if other == category {
                continue;
            }
            let timer = timers.get(other);
            if self.live_start(day, other, &timer).is_some() {
                let mut live = self.live_timer(day, other, timer);
                live.stop(now);
                timers.timers.insert(other, live);
                self.registry.unregister(day, other);
                debug!("stopped {} in {} to start {}", other, day, category);
            }
        }

        let away = self.active_day.as_deref() != Some(day);
        let current = timers.get(category);
        if self.live_start(day, category, &current).is_none() {
            let timer = timers.entry(category);
            timer.start_time = Some(now);
            timer.should_be_running = away;
            self.registry.register(day, category, now);
            debug!("started {} in {}", category, day);
        }
        self.write(store, day, &timers)
    }

    /// Fold the running session into the total. Returns false if the
    /// category wasn't running.
    pub fn stop_timer(
        &mut self,
        store: &mut dyn Store,
        day: &str,
        category: Category,
        now: i64,
    ) -> Result<bool, StoreError> {
        let mut timers = self.read(store, day);
        let timer = timers.get(category);
        if self.live_start(day, category, &timer).is_none() {
            return Ok(false);
        }
        let mut live = self.live_timer(day, category, timer);
        live.stop(now);
        timers.timers.insert(category, live);
        self.registry.unregister(day, category);
        debug!("stopped {} in {}", category, day);
        self.write(store, day, &timers)?;
        Ok(true)
    }

    /// Overwrite a category's total. A running timer is stopped first and
    /// resumed with a fresh session afterwards.
    #[allow(clippy::too_many_arguments)]
    pub fn edit_timer(
        &mut self,
        store: &mut dyn Store,
        day: &str,
        category: Category,
        hours: i64,
        minutes: i64,
        seconds: i64,
        now: i64,
    ) -> Result<(), StoreError> {
        let was_running = self.stop_timer(store, day, category, now)?;
        let mut timers = self.read(store, day);
        timers.entry(category).total_seconds = (hours * 3600 + minutes * 60 + seconds).max(0);
        self.write(store, day, &timers)?;
        if was_running {
            self.start_timer(store, day, category, now)?;
        }
        Ok(())
    }

    /// Mark the day's running category as live-elsewhere before the day is
    /// switched away from. Totals are left untouched; the session keeps
    /// running through the registry.
    pub fn save_timer_state(&mut self, store: &mut dyn Store, day: &str) -> Result<(), StoreError> {
        let mut timers = self.read(store, day);
        let mut changed = false;
        for (category, timer) in timers.timers.iter_mut() {
            let Some(start) = self.registry.started_at(day, *category).or(timer.start_time) else {
                continue;
            };
            if self.registry.started_at(day, *category).is_none() {
                self.registry.register(day, *category, start);
            }
            timer.start_time = Some(start);
            timer.should_be_running = true;
            changed = true;
        }
        if changed {
            self.write(store, day, &timers)?;
        }
        Ok(())
    }

    /// Select `day`: fold the previous day's live-elsewhere timers into its
    /// stored totals, then resume `day`'s flagged timers and re-register them.
    pub fn load_timer_state(&mut self, store: &mut dyn Store, day: &str, now: i64) -> Result<(), StoreError> {
        if let Some(prev) = self.active_day.clone().filter(|p| p != day) {
            let mut timers = self.read(store, &prev);
            let mut changed = false;
            for (category, timer) in timers.timers.iter_mut() {
                if !timer.should_be_running {
                    continue;
                }
                if let Some(start) = self.registry.started_at(&prev, *category) {
                    timer.start_time = Some(start);
                }
                if let Some(start) = timer.fold(now) {
                    self.registry.register(&prev, *category, start);
                    changed = true;
                }
            }
            if changed {
                self.write(store, &prev, &timers)?;
            }
        }

        let mut timers = self.read(store, day);
        let mut changed = false;
        for (category, timer) in timers.timers.iter_mut() {
            let registered = self.registry.started_at(day, *category);
            if !timer.should_be_running && registered.is_none() && timer.start_time.is_none() {
                continue;
            }
            match registered {
                Some(start) => {
                    timer.start_time = Some(start);
                    timer.fold(now);
                }
                None if timer.should_be_running => timer.start_time = Some(now),
                None => {}
            }
            if let Some(start) = timer.start_time {
                self.registry.register(day, *category, start);
            }
            timer.should_be_running = false;
            changed = true;
            debug!("resumed {} in {}", category, day);
        }
        if changed {
            self.write(store, day, &timers)?;
        } else {
            self.registry.persist(store)?;
        }
        self.active_day = Some(day.to_string());
        Ok(())
    }

    /// Stop every running timer in every day, folding live time into the
    /// stored totals. Returns the pairs that were stopped.
    pub fn stop_all_timers(&mut self, store: &mut dyn Store, now: i64) -> Result<Vec<(String, Category)>, StoreError> {
        let mut stopped = Vec::new();
        let mut by_day: BTreeMap<String, Vec<(Category, i64)>> = BTreeMap::new();
        for (day, category, start) in self.registry.entries() {
            by_day.entry(day).or_default().push((category, start));
        }
        if let Some(active) = &self.active_day {
            by_day.entry(active.clone()).or_default();
        }

        for (day, registered) in by_day {
            let mut timers = self.read(store, &day);
            for (category, start) in registered {
                timers.entry(category).start_time = Some(start);
            }
            let mut changed = false;
            for (category, timer) in timers.timers.iter_mut() {
                if timer.is_running() {
                    timer.stop(now);
                    self.registry.unregister(&day, *category);
                    stopped.push((day.clone(), *category));
                    changed = true;
                }
            }
            if changed {
                self.write(store, &day, &timers)?;
            }
        }
        self.registry.persist(store)?;
        Ok(stopped)
    }
}
