use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::model::note::{Note, NoteRecord, Outcome, outcome_of};

/// Which notes a statistics query covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsScope {
    /// The selected day, using live in-memory clocks
    Day,
    /// Every day in the store
    AllDays,
    /// Days from `from` through `to`, inclusive
    Range { from: NaiveDate, to: NaiveDate },
}

impl StatsScope {
    pub fn includes(&self, day: NaiveDate) -> bool {
        match self {
            StatsScope::Day | StatsScope::AllDays => true,
            StatsScope::Range { from, to } => *from <= day && day <= *to,
        }
    }
}

/// The fields statistics read from a note, whether live or persisted
#[derive(Debug, Clone, Copy)]
pub struct Tally<'a> {
    pub project_id: &'a str,
    pub failing_issues: &'a str,
    pub non_failing_issues: &'a str,
    pub completed: bool,
    pub canceled: bool,
    pub seconds: i64,
}

impl<'a> Tally<'a> {
    pub fn from_note(note: &'a Note, now: i64) -> Self {
        Tally {
            project_id: &note.project_id,
            failing_issues: &note.failing_issues,
            non_failing_issues: &note.non_failing_issues,
            completed: note.completed,
            canceled: note.canceled,
            seconds: note.elapsed_seconds(now),
        }
    }

    pub fn from_record(record: &'a NoteRecord, now: i64) -> Self {
        Tally {
            project_id: &record.project_id,
            failing_issues: &record.failing_issues,
            non_failing_issues: &record.non_failing_issues,
            completed: record.completed,
            canceled: record.canceled,
            seconds: record.elapsed_seconds(now),
        }
    }

    fn outcome(&self) -> Outcome {
        outcome_of(self.failing_issues, self.non_failing_issues)
    }

    /// Completed and never canceled
    fn counts(&self) -> bool {
        self.completed && !self.canceled
    }
}

/// Completed, non-canceled notes by outcome
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub failing: usize,
    pub non_failing: usize,
    pub no_issue: usize,
}

impl StatsSnapshot {
    pub fn total(&self) -> usize {
        self.failing + self.non_failing + self.no_issue
    }
}

pub fn compute_stats<'a>(items: impl IntoIterator<Item = Tally<'a>>) -> StatsSnapshot {
    let mut stats = StatsSnapshot::default();
    for item in items {
        if !item.counts() {
            continue;
        }
        match item.outcome() {
            Outcome::Failing => stats.failing += 1,
            Outcome::NonFailing => stats.non_failing += 1,
            Outcome::NoIssue => stats.no_issue += 1,
        }
    }
    stats
}

/// Per-project aggregate over completed, non-canceled notes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectRate {
    pub project_id: String,
    pub count: usize,
    pub fail_count: usize,
    pub non_fail_count: usize,
    pub total_seconds: i64,
    pub fail_rate: f64,
    pub non_fail_rate: f64,
}

/// Aggregates keyed by trimmed project id, sorted by id. Notes without a
/// project id are skipped.
pub fn compute_project_rates<'a>(items: impl IntoIterator<Item = Tally<'a>>) -> Vec<ProjectRate> {
    let mut by_project: BTreeMap<String, ProjectRate> = BTreeMap::new();
    for item in items {
        let project = item.project_id.trim();
        if project.is_empty() || !item.counts() {
            continue;
        }
        let entry = by_project
            .entry(project.to_string())
            .or_insert_with(|| ProjectRate {
                project_id: project.to_string(),
                count: 0,
                fail_count: 0,
                non_fail_count: 0,
                total_seconds: 0,
                fail_rate: 0.0,
                non_fail_rate: 0.0,
            });
        entry.count += 1;
        entry.total_seconds += item.seconds;
        match item.outcome() {
            Outcome::Failing => entry.fail_count += 1,
            Outcome::NonFailing => entry.non_fail_count += 1,
            Outcome::NoIssue => {}
        }
    }

    by_project
        .into_values()
        .map(|mut rate| {
            if rate.count > 0 {
                rate.fail_rate = rate.fail_count as f64 / rate.count as f64;
                rate.non_fail_rate = rate.non_fail_count as f64 / rate.count as f64;
            }
            rate
        })
        .collect()
}
