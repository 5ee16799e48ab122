use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Off-platform time that can't be attributed to a single note
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    Training,
    Meeting,
    Review,
    Tooling,
    Other,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Training,
        Category::Meeting,
        Category::Review,
        Category::Tooling,
        Category::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Training => "training",
            Category::Meeting => "meeting",
            Category::Review => "review",
            Category::Tooling => "tooling",
            Category::Other => "other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == lower)
            .ok_or_else(|| format!("unknown category: {}", s))
    }
}

/// One category's stored state within a day
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryTimer {
    #[serde(default)]
    pub start_time: Option<i64>,
    #[serde(default)]
    pub total_seconds: i64,
    /// Set while the day is not selected but the timer keeps running
    #[serde(default, skip_serializing_if = "is_false")]
    pub should_be_running: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl CategoryTimer {
    pub fn is_running(&self) -> bool {
        self.start_time.is_some()
    }

    /// Stored total plus the live part of a running session.
    pub fn seconds(&self, now: i64) -> i64 {
        match self.start_time {
            Some(start) => self.total_seconds + (now - start).max(0) / 1000,
            None => self.total_seconds,
        }
    }

    /// Close the running session into `total_seconds`.
    pub fn stop(&mut self, now: i64) {
        if let Some(start) = self.start_time.take() {
            self.total_seconds += (now - start).max(0) / 1000;
        }
        self.should_be_running = false;
    }

    /// Move whole elapsed seconds into `total_seconds` while keeping the
    /// timer running; the sub-second remainder stays in the session so no
    /// time is lost. Returns the new session start.
    pub fn fold(&mut self, now: i64) -> Option<i64> {
        let start = self.start_time?;
        let whole = (now - start).max(0) / 1000;
        self.total_seconds += whole;
        let new_start = start + whole * 1000;
        self.start_time = Some(new_start);
        Some(new_start)
    }
}

/// The `offPlatform_<day>` record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketTimers {
    #[serde(default)]
    pub timers: BTreeMap<Category, CategoryTimer>,
}

impl BucketTimers {
    pub fn get(&self, category: Category) -> CategoryTimer {
        self.timers.get(&category).copied().unwrap_or_default()
    }

    pub fn entry(&mut self, category: Category) -> &mut CategoryTimer {
        self.timers.entry(category).or_default()
    }

    /// Categories with an open session
    pub fn running(&self) -> Vec<Category> {
        self.timers
            .iter()
            .filter(|(_, t)| t.is_running())
            .map(|(c, _)| *c)
            .collect()
    }
}
