use std::ops::Range;

use regex::{Regex, RegexBuilder};
use serde::Serialize;

use crate::io::buckets::{day_keys, read_bucket};
use crate::io::store::{Store, StoreError};
use crate::model::day::sort_newest_first;
use crate::model::note::{NoteField, NoteRecord, NoteStatus};

/// One matched identifier field with the byte ranges that matched
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldMatch {
    pub field: NoteField,
    #[serde(skip)]
    pub spans: Vec<Range<usize>>,
}

/// A note from any day whose identifiers contain the query
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchResult {
    pub day: String,
    pub note_id: u32,
    pub project_id: String,
    pub attempt_id: String,
    pub operation_id: String,
    pub status: NoteStatus,
    pub elapsed_seconds: i64,
    pub matches: Vec<FieldMatch>,
}

/// Case-insensitive literal matcher for `query`.
pub fn query_regex(query: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(&regex::escape(query))
        .case_insensitive(true)
        .build()
}

/// Collect all non-overlapping match byte-ranges for a regex in the given text.
fn find_matches(re: &Regex, text: &str) -> Vec<Range<usize>> {
    re.find_iter(text).map(|m| m.start()..m.end()).collect()
}

fn record_status(record: &NoteRecord) -> NoteStatus {
    match (record.completed, record.canceled, record.has_started) {
        (true, true, _) => NoteStatus::Canceled,
        (true, false, _) => NoteStatus::Completed,
        (false, _, true) => NoteStatus::Running,
        (false, _, false) => NoteStatus::Draft,
    }
}

/// Match one record's identifier fields.
fn search_record(re: &Regex, day: &str, id: u32, record: &NoteRecord, now: i64) -> Option<SearchResult> {
    let matches: Vec<FieldMatch> = NoteField::IDENTIFIERS
        .iter()
        .filter_map(|&field| {
            let spans = find_matches(re, record.field(field));
            (!spans.is_empty()).then_some(FieldMatch { field, spans })
        })
        .collect();
    if matches.is_empty() {
        return None;
    }
    Some(SearchResult {
        day: day.to_string(),
        note_id: id,
        project_id: record.project_id.clone(),
        attempt_id: record.attempt_id.clone(),
        operation_id: record.operation_id.clone(),
        status: record_status(record),
        elapsed_seconds: record.elapsed_seconds(now),
        matches,
    })
}

/// Search every day bucket in the store. Days come newest-first, notes
/// within a day in id order. A blank query matches nothing.
pub fn search_days(store: &mut dyn Store, query: &str, now: i64) -> Result<Vec<SearchResult>, StoreError> {
    let query = query.trim();
    if query.is_empty() {
        return Ok(Vec::new());
    }
    let Ok(re) = query_regex(query) else {
        return Ok(Vec::new());
    };

    let mut days = day_keys(store);
    sort_newest_first(&mut days);

    let mut results = Vec::new();
    for day in days {
        let bucket = read_bucket(store, &day)?;
        for (id, record) in &bucket {
            if let Some(hit) = search_record(&re, &day, *id, record, now) {
                results.push(hit);
            }
        }
    }
    Ok(results)
}
