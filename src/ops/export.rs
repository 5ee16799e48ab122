use chrono::NaiveDate;
use serde::Serialize;

use crate::io::buckets::{day_keys, read_bucket};
use crate::io::store::{Store, StoreError};
use crate::model::day::parse_day;
use crate::ops::numbering::display_indexes;
use crate::util::time::{format_hms, format_utc};

/// One completed note, flattened for pay and spreadsheet consumers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportRow {
    pub date: String,
    pub note_id: u32,
    pub label: String,
    pub project_id: String,
    pub attempt_id: String,
    pub operation_id: String,
    pub started_at: String,
    pub ended_at: String,
    pub duration: String,
    pub seconds: i64,
    pub outcome: String,
}

/// Options for `export_rows`
#[derive(Debug, Clone)]
pub struct ExportOptions<'a> {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub include_canceled: bool,
    pub canceled_label: &'a str,
}

/// One row per completed note in the date range, oldest day first, then by id.
pub fn export_rows(store: &mut dyn Store, opts: &ExportOptions<'_>, now: i64) -> Result<Vec<ExportRow>, StoreError> {
    let mut days: Vec<(NaiveDate, String)> = day_keys(store)
        .into_iter()
        .filter_map(|k| parse_day(&k).map(|d| (d, k)))
        .filter(|(d, _)| opts.from.is_none_or(|f| *d >= f) && opts.to.is_none_or(|t| *d <= t))
        .collect();
    days.sort();

    let mut rows = Vec::new();
    for (_, day) in days {
        let bucket = read_bucket(store, &day)?;
        let flags: Vec<(u32, bool)> = bucket.iter().map(|(id, r)| (*id, r.canceled)).collect();
        for (id, index) in display_indexes(&flags) {
            let Some(record) = bucket.get(&id) else {
                continue;
            };
            if !record.completed || (record.canceled && !opts.include_canceled) {
                continue;
            }
            let seconds = record.elapsed_seconds(now);
            let outcome = if record.canceled {
                "canceled".to_string()
            } else {
                record.outcome().to_string()
            };
            rows.push(ExportRow {
                date: day.clone(),
                note_id: id,
                label: index.render(opts.canceled_label),
                project_id: record.project_id.trim().to_string(),
                attempt_id: record.attempt_id.trim().to_string(),
                operation_id: record.operation_id.trim().to_string(),
                started_at: record.start_timestamp.map(format_utc).unwrap_or_default(),
                ended_at: record.end_timestamp.map(format_utc).unwrap_or_default(),
                duration: format_hms(seconds),
                seconds,
                outcome,
            });
        }
    }
    Ok(rows)
}

/// Error type for CSV rendering
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("csv write failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("csv output is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Render rows as CSV. The header comes from the `ExportRow` field names.
pub fn rows_to_csv(rows: &[ExportRow]) -> Result<String, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    if rows.is_empty() {
        writer.write_record(CSV_HEADER)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    Ok(String::from_utf8(bytes)?)
}

// serialize() only emits a header alongside the first row
const CSV_HEADER: [&str; 11] = [
    "date",
    "note_id",
    "label",
    "project_id",
    "attempt_id",
    "operation_id",
    "started_at",
    "ended_at",
    "duration",
    "seconds",
    "outcome",
];
