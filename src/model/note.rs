use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::io::buckets;
use crate::io::store::{Store, StoreError};
use crate::model::clock::Clock;

/// Editable text fields of a note
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NoteField {
    FailingIssues,
    NonFailingIssues,
    Discussion,
    ProjectId,
    AttemptId,
    OperationId,
}

impl NoteField {
    pub const ALL: [NoteField; 6] = [
        NoteField::FailingIssues,
        NoteField::NonFailingIssues,
        NoteField::Discussion,
        NoteField::ProjectId,
        NoteField::AttemptId,
        NoteField::OperationId,
    ];

    /// The identifier fields searched across days
    pub const IDENTIFIERS: [NoteField; 3] =
        [NoteField::ProjectId, NoteField::AttemptId, NoteField::OperationId];

    pub fn is_identifier(self) -> bool {
        Self::IDENTIFIERS.contains(&self)
    }

    /// Key used in the persisted record
    pub fn record_key(self) -> &'static str {
        match self {
            NoteField::FailingIssues => "failingIssues",
            NoteField::NonFailingIssues => "nonFailingIssues",
            NoteField::Discussion => "discussion",
            NoteField::ProjectId => "projectID",
            NoteField::AttemptId => "attemptID",
            NoteField::OperationId => "operationID",
        }
    }

    /// Human label used in summaries and listings
    pub fn label(self) -> &'static str {
        match self {
            NoteField::FailingIssues => "Failing issues",
            NoteField::NonFailingIssues => "Non-failing issues",
            NoteField::Discussion => "Discussion",
            NoteField::ProjectId => "Project ID",
            NoteField::AttemptId => "Attempt ID",
            NoteField::OperationId => "Operation ID",
        }
    }
}

impl fmt::Display for NoteField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NoteField::FailingIssues => "failing",
            NoteField::NonFailingIssues => "non-failing",
            NoteField::Discussion => "discussion",
            NoteField::ProjectId => "project",
            NoteField::AttemptId => "attempt",
            NoteField::OperationId => "operation",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for NoteField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "failing" | "failing-issues" | "failingissues" => Ok(NoteField::FailingIssues),
            "non-failing" | "nonfailing" | "non-failing-issues" | "nonfailingissues" => {
                Ok(NoteField::NonFailingIssues)
            }
            "discussion" => Ok(NoteField::Discussion),
            "project" | "project-id" | "projectid" => Ok(NoteField::ProjectId),
            "attempt" | "attempt-id" | "attemptid" => Ok(NoteField::AttemptId),
            "operation" | "operation-id" | "operationid" => Ok(NoteField::OperationId),
            other => Err(format!("unknown field: {}", other)),
        }
    }
}

/// Lifecycle position derived from the two completion bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteStatus {
    /// Never edited
    Draft,
    /// Started and not completed, including a reopened note
    Running,
    Completed,
    Canceled,
}

impl fmt::Display for NoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoteStatus::Draft => write!(f, "draft"),
            NoteStatus::Running => write!(f, "running"),
            NoteStatus::Completed => write!(f, "completed"),
            NoteStatus::Canceled => write!(f, "canceled"),
        }
    }
}

/// Outcome bucket of a completed note
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Outcome {
    Failing,
    NonFailing,
    NoIssue,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Failing => write!(f, "failing"),
            Outcome::NonFailing => write!(f, "non-failing"),
            Outcome::NoIssue => write!(f, "no-issue"),
        }
    }
}

/// Persisted shape of a note inside its day bucket
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteRecord {
    #[serde(default)]
    pub failing_issues: String,
    #[serde(default)]
    pub non_failing_issues: String,
    #[serde(default)]
    pub discussion: String,
    #[serde(rename = "projectID", default)]
    pub project_id: String,
    #[serde(rename = "attemptID", default)]
    pub attempt_id: String,
    #[serde(rename = "operationID", default)]
    pub operation_id: String,
    #[serde(default)]
    pub start_timestamp: Option<i64>,
    #[serde(default)]
    pub end_timestamp: Option<i64>,
    #[serde(default)]
    pub additional_time: i64,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub canceled: bool,
    #[serde(default)]
    pub has_started: bool,
}

impl NoteRecord {
    pub fn clock(&self) -> Clock {
        Clock::new(self.start_timestamp, self.end_timestamp, self.additional_time)
    }

    pub fn field(&self, field: NoteField) -> &str {
        match field {
            NoteField::FailingIssues => &self.failing_issues,
            NoteField::NonFailingIssues => &self.non_failing_issues,
            NoteField::Discussion => &self.discussion,
            NoteField::ProjectId => &self.project_id,
            NoteField::AttemptId => &self.attempt_id,
            NoteField::OperationId => &self.operation_id,
        }
    }

    /// Elapsed seconds from the stored timestamps; a record with no end is
    /// still running and measures up to `now`.
    pub fn elapsed_seconds(&self, now: i64) -> i64 {
        self.clock().elapsed_seconds(now)
    }

    pub fn outcome(&self) -> Outcome {
        outcome_of(&self.failing_issues, &self.non_failing_issues)
    }
}

/// Classify issue text: any failing text wins, then non-failing, else none.
pub fn outcome_of(failing: &str, non_failing: &str) -> Outcome {
    if !failing.trim().is_empty() {
        Outcome::Failing
    } else if !non_failing.trim().is_empty() {
        Outcome::NonFailing
    } else {
        Outcome::NoIssue
    }
}

/// One work item in a day bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub day: String,
    pub id: u32,
    pub failing_issues: String,
    pub non_failing_issues: String,
    pub discussion: String,
    pub project_id: String,
    pub attempt_id: String,
    pub operation_id: String,
    pub has_started: bool,
    pub completed: bool,
    pub canceled: bool,
    pub clock: Clock,
}

impl Note {
    /// A fresh draft
    pub fn blank(day: &str, id: u32) -> Self {
        Note::from_record(day, id, NoteRecord::default())
    }

    pub fn from_record(day: &str, id: u32, record: NoteRecord) -> Self {
        let clock = record.clock();
        Note {
            day: day.to_string(),
            id,
            failing_issues: record.failing_issues,
            non_failing_issues: record.non_failing_issues,
            discussion: record.discussion,
            project_id: record.project_id,
            attempt_id: record.attempt_id,
            operation_id: record.operation_id,
            has_started: record.has_started,
            completed: record.completed,
            canceled: record.canceled,
            clock,
        }
    }

    pub fn to_record(&self) -> NoteRecord {
        NoteRecord {
            failing_issues: self.failing_issues.clone(),
            non_failing_issues: self.non_failing_issues.clone(),
            discussion: self.discussion.clone(),
            project_id: self.project_id.clone(),
            attempt_id: self.attempt_id.clone(),
            operation_id: self.operation_id.clone(),
            start_timestamp: self.clock.start_timestamp,
            end_timestamp: self.clock.end_timestamp,
            additional_time: self.clock.additional_time,
            completed: self.completed,
            canceled: self.canceled,
            has_started: self.has_started,
        }
    }

    /// Hydrate `(day, id)` from the store, or start blank if no record exists.
    pub fn load(store: &mut dyn Store, day: &str, id: u32) -> Result<Self, StoreError> {
        let bucket = buckets::read_bucket(store, day)?;
        Ok(match bucket.get(&id) {
            Some(record) => Note::from_record(day, id, record.clone()),
            None => Note::blank(day, id),
        })
    }

    /// Rewrite this note's record inside its bucket.
    pub fn save(&self, store: &mut dyn Store) -> Result<(), StoreError> {
        buckets::write_record(store, &self.day, self.id, self.to_record())
    }

    pub fn field(&self, field: NoteField) -> &str {
        match field {
            NoteField::FailingIssues => &self.failing_issues,
            NoteField::NonFailingIssues => &self.non_failing_issues,
            NoteField::Discussion => &self.discussion,
            NoteField::ProjectId => &self.project_id,
            NoteField::AttemptId => &self.attempt_id,
            NoteField::OperationId => &self.operation_id,
        }
    }

    fn field_mut(&mut self, field: NoteField) -> &mut String {
        match field {
            NoteField::FailingIssues => &mut self.failing_issues,
            NoteField::NonFailingIssues => &mut self.non_failing_issues,
            NoteField::Discussion => &mut self.discussion,
            NoteField::ProjectId => &mut self.project_id,
            NoteField::AttemptId => &mut self.attempt_id,
            NoteField::OperationId => &mut self.operation_id,
        }
    }

    /// Replace a field's text and run the edit hook.
    pub fn edit(
        &mut self,
        store: &mut dyn Store,
        field: NoteField,
        value: &str,
        now: i64,
    ) -> Result<(), StoreError> {
        *self.field_mut(field) = value.to_string();
        self.on_field_edit(store, now)
    }

    /// First edit of a draft starts its clock. Always persists.
    pub fn on_field_edit(&mut self, store: &mut dyn Store, now: i64) -> Result<(), StoreError> {
        if !self.has_started && !self.completed {
            self.has_started = true;
            self.clock.start(now);
        }
        self.save(store)
    }

    /// Stop the clock and mark completed. Cancellation is sticky: a later
    /// non-canceling completion keeps an earlier cancel.
    pub fn complete(&mut self, store: &mut dyn Store, canceled: bool, now: i64) -> Result<(), StoreError> {
        self.clock.stop(now);
        self.completed = true;
        self.canceled = canceled || self.canceled;
        self.save(store)
    }

    /// Reopen a completed note for editing; the clock continues from its
    /// accumulated total and `canceled` is left as is.
    pub fn reopen(&mut self, store: &mut dyn Store, now: i64) -> Result<(), StoreError> {
        if !self.completed {
            return Ok(());
        }
        self.completed = false;
        self.clock.restart(now);
        self.save(store)
    }

    pub fn status(&self) -> NoteStatus {
        if self.completed && self.canceled {
            NoteStatus::Canceled
        } else if self.completed {
            NoteStatus::Completed
        } else if self.has_started {
            NoteStatus::Running
        } else {
            NoteStatus::Draft
        }
    }

    /// Canceled at some point, even if currently reopened
    pub fn was_canceled(&self) -> bool {
        self.canceled
    }

    pub fn elapsed_seconds(&self, now: i64) -> i64 {
        self.clock.elapsed_seconds(now)
    }

    pub fn outcome(&self) -> Outcome {
        outcome_of(&self.failing_issues, &self.non_failing_issues)
    }

    /// Issue and discussion text for the clipboard
    pub fn formatted_summary(&self) -> String {
        join_sections(
            &[NoteField::FailingIssues, NoteField::NonFailingIssues, NoteField::Discussion],
            self,
            |label, text| format!("{}:\n{}", label, text),
            "\n\n",
        )
    }

    /// Identifier lines for the clipboard
    pub fn formatted_identifiers(&self) -> String {
        join_sections(
            &NoteField::IDENTIFIERS,
            self,
            |label, text| format!("{}: {}", label, text),
            "\n",
        )
    }
}

fn join_sections(
    fields: &[NoteField],
    note: &Note,
    render: impl Fn(&str, &str) -> String,
    separator: &str,
) -> String {
    fields
        .iter()
        .filter_map(|&f| {
            let text = note.field(f).trim();
            (!text.is_empty()).then(|| render(f.label(), text))
        })
        .collect::<Vec<_>>()
        .join(separator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::store::MemoryStore;

    const DAY: &str = "2024-01-15";

    #[test]
    fn first_edit_starts_clock_once() {
        let mut store = MemoryStore::new();
        let mut note = Note::blank(DAY, 1);
        note.edit(&mut store, NoteField::FailingIssues, "x", 1_000).unwrap();
        assert!(note.has_started);
        assert_eq!(note.clock.start_timestamp, Some(1_000));

        note.edit(&mut store, NoteField::Discussion, "more", 9_000).unwrap();
        assert_eq!(note.clock.start_timestamp, Some(1_000));
    }

    #[test]
    fn edits_persist_full_record() {
        let mut store = MemoryStore::new();
        let mut note = Note::blank(DAY, 3);
        note.edit(&mut store, NoteField::ProjectId, "P-9", 0).unwrap();

        let loaded = Note::load(&mut store, DAY, 3).unwrap();
        assert_eq!(loaded, note);
    }

    #[test]
    fn load_missing_record_is_blank() {
        let mut store = MemoryStore::new();
        let note = Note::load(&mut store, DAY, 4).unwrap();
        assert_eq!(note, Note::blank(DAY, 4));
        assert_eq!(note.status(), NoteStatus::Draft);
    }

    #[test]
    fn complete_stops_clock() {
        let mut store = MemoryStore::new();
        let mut note = Note::blank(DAY, 1);
        note.edit(&mut store, NoteField::FailingIssues, "x", 0).unwrap();
        note.complete(&mut store, false, 5_000).unwrap();
        assert_eq!(note.clock.end_timestamp, Some(5_000));
        assert_eq!(note.status(), NoteStatus::Completed);
        assert_eq!(note.elapsed_seconds(100_000), 5);
    }

    #[test]
    fn cancel_survives_reopen_and_plain_recomplete() {
        let mut store = MemoryStore::new();
        let mut note = Note::blank(DAY, 1);
        note.edit(&mut store, NoteField::Discussion, "d", 0).unwrap();
        note.complete(&mut store, true, 1_000).unwrap();
        note.reopen(&mut store, 2_000).unwrap();
        assert!(note.canceled);
        assert_eq!(note.status(), NoteStatus::Running);
        note.complete(&mut store, false, 3_000).unwrap();
        assert!(note.completed && note.canceled);
        assert_eq!(note.status(), NoteStatus::Canceled);
    }

    #[test]
    fn reopen_continues_accumulating() {
        let mut store = MemoryStore::new();
        let mut note = Note::blank(DAY, 1);
        note.edit(&mut store, NoteField::FailingIssues, "x", 0).unwrap();
        note.complete(&mut store, false, 4_000).unwrap();
        note.reopen(&mut store, 60_000).unwrap();
        assert_eq!(note.elapsed_seconds(62_000), 6);
    }

    #[test]
    fn reopen_requires_completion() {
        let mut store = MemoryStore::new();
        let mut note = Note::blank(DAY, 1);
        note.edit(&mut store, NoteField::FailingIssues, "x", 0).unwrap();
        note.reopen(&mut store, 5_000).unwrap();
        assert_eq!(note.clock.start_timestamp, Some(0));
        assert_eq!(note.clock.additional_time, 0);
    }

    #[test]
    fn summary_skips_empty_sections() {
        let mut note = Note::blank(DAY, 1);
        note.failing_issues = "  broken link \n".into();
        note.discussion = "checked twice".into();
        assert_eq!(
            note.formatted_summary(),
            "Failing issues:\nbroken link\n\nDiscussion:\nchecked twice"
        );
    }

    #[test]
    fn identifiers_are_one_per_line() {
        let mut note = Note::blank(DAY, 1);
        note.project_id = "P1".into();
        note.operation_id = " op-7 ".into();
        assert_eq!(note.formatted_identifiers(), "Project ID: P1\nOperation ID: op-7");
        assert_eq!(Note::blank(DAY, 2).formatted_identifiers(), "");
    }

    #[test]
    fn outcome_classification() {
        assert_eq!(outcome_of("x", "y"), Outcome::Failing);
        assert_eq!(outcome_of(" ", "y"), Outcome::NonFailing);
        assert_eq!(outcome_of("", ""), Outcome::NoIssue);
    }

    #[test]
    fn field_names_parse() {
        assert_eq!("failing".parse::<NoteField>(), Ok(NoteField::FailingIssues));
        assert_eq!("Project".parse::<NoteField>(), Ok(NoteField::ProjectId));
        assert!("title".parse::<NoteField>().is_err());
    }

    #[test]
    fn record_uses_camel_case_keys() {
        let mut note = Note::blank(DAY, 1);
        note.project_id = "P".into();
        note.has_started = true;
        let json = serde_json::to_value(note.to_record()).unwrap();
        assert_eq!(json["projectID"], "P");
        assert_eq!(json["hasStarted"], true);
        assert!(json["endTimestamp"].is_null());
        assert_eq!(json["additionalTime"], 0);
    }
}
