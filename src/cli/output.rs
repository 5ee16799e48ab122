use serde::Serialize;

use crate::model::category::Category;
use crate::model::note::{Note, NoteField, NoteStatus};
use crate::ops::export::ExportRow;
use crate::ops::search::SearchResult;
use crate::ops::stats::{ProjectRate, StatsSnapshot};
use crate::util::time::{format_hms, format_local};
use crate::util::unicode::{first_line, pad_to_width, truncate_to_width};

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct NoteJson {
    pub id: u32,
    pub label: String,
    pub status: NoteStatus,
    pub failing_issues: String,
    pub non_failing_issues: String,
    pub discussion: String,
    pub project_id: String,
    pub attempt_id: String,
    pub operation_id: String,
    pub elapsed: String,
    pub seconds: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub was_canceled: bool,
}

#[derive(Serialize)]
pub struct NoteListJson {
    pub day: String,
    pub notes: Vec<NoteJson>,
    pub off_platform_seconds: i64,
}

#[derive(Serialize)]
pub struct TransitionJson {
    pub id: u32,
    pub applied: bool,
    pub status: NoteStatus,
}

#[derive(Serialize)]
pub struct DayJson {
    pub day: String,
    pub days: Vec<String>,
}

#[derive(Serialize)]
pub struct StatsJson {
    pub failing: usize,
    pub non_failing: usize,
    pub no_issue: usize,
    pub total: usize,
}

#[derive(Serialize)]
pub struct TimerJson {
    pub category: Category,
    pub running: bool,
    pub seconds: i64,
    pub elapsed: String,
}

#[derive(Serialize)]
pub struct TimerStatusJson {
    pub day: String,
    pub timers: Vec<TimerJson>,
    pub total_seconds: i64,
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

pub fn note_to_json(note: &Note, label: String, now: i64) -> NoteJson {
    let seconds = note.elapsed_seconds(now);
    NoteJson {
        id: note.id,
        label,
        status: note.status(),
        failing_issues: note.failing_issues.clone(),
        non_failing_issues: note.non_failing_issues.clone(),
        discussion: note.discussion.clone(),
        project_id: note.project_id.clone(),
        attempt_id: note.attempt_id.clone(),
        operation_id: note.operation_id.clone(),
        elapsed: format_hms(seconds),
        seconds,
        started_at: note.clock.start_timestamp.map(format_local),
        ended_at: note.clock.end_timestamp.map(format_local),
        was_canceled: note.was_canceled() && note.status() != NoteStatus::Canceled,
    }
}

pub fn stats_to_json(stats: &StatsSnapshot) -> StatsJson {
    StatsJson {
        failing: stats.failing,
        non_failing: stats.non_failing,
        no_issue: stats.no_issue,
        total: stats.total(),
    }
}

// ---------------------------------------------------------------------------
// Human-readable formatting
// ---------------------------------------------------------------------------

const LABEL_WIDTH: usize = 8;
const PROJECT_WIDTH: usize = 14;
const PREVIEW_WIDTH: usize = 48;

fn status_char(status: NoteStatus) -> char {
    match status {
        NoteStatus::Draft => ' ',
        NoteStatus::Running => '>',
        NoteStatus::Completed => 'x',
        NoteStatus::Canceled => '-',
    }
}

/// First non-empty text field, for the one-line preview
fn preview(note: &Note) -> &str {
    [
        NoteField::FailingIssues,
        NoteField::NonFailingIssues,
        NoteField::Discussion,
    ]
    .into_iter()
    .map(|f| first_line(note.field(f)))
    .find(|s| !s.is_empty())
    .unwrap_or("")
}

/// Format a single note as a one-line summary
pub fn format_note_line(note: &Note, label: &str, now: i64) -> String {
    let project = if note.project_id.trim().is_empty() {
        "-"
    } else {
        note.project_id.trim()
    };
    format!(
        "[{}] {:>3} {} {}  {} {}",
        status_char(note.status()),
        note.id,
        pad_to_width(label, LABEL_WIDTH),
        format_hms(note.elapsed_seconds(now)),
        pad_to_width(project, PROJECT_WIDTH),
        truncate_to_width(preview(note), PREVIEW_WIDTH),
    )
    .trim_end()
    .to_string()
}

/// Format detailed note view
pub fn format_note_detail(note: &Note, label: &str, now: i64) -> Vec<String> {
    let mut lines = Vec::new();
    lines.push(format!(
        "[{}] {} #{} ({})",
        status_char(note.status()),
        note.day,
        note.id,
        label
    ));
    lines.push(format!("status: {}", note.status()));
    if note.was_canceled() && note.status() != NoteStatus::Canceled {
        lines.push("previously canceled".to_string());
    }
    lines.push(format!("elapsed: {}", format_hms(note.elapsed_seconds(now))));
    if let Some(start) = note.clock.start_timestamp {
        lines.push(format!("started: {}", format_local(start)));
    }
    if let Some(end) = note.clock.end_timestamp {
        lines.push(format!("ended: {}", format_local(end)));
    }

    for field in NoteField::ALL {
        let text = note.field(field);
        if text.trim().is_empty() {
            continue;
        }
        if field.is_identifier() {
            lines.push(format!("{}: {}", field.label(), text.trim()));
        } else {
            lines.push(format!("{}:", field.label()));
            for line in text.lines() {
                lines.push(format!("  {}", line));
            }
        }
    }
    lines
}

pub fn format_search_hit(hit: &SearchResult) -> String {
    let fields: Vec<String> = hit.matches.iter().map(|m| m.field.to_string()).collect();
    let project = if hit.project_id.is_empty() {
        "-"
    } else {
        hit.project_id.as_str()
    };
    format!(
        "{} #{}  {}  {}  {}  [{}]",
        hit.day,
        hit.note_id,
        hit.status,
        format_hms(hit.elapsed_seconds),
        project,
        fields.join(", ")
    )
}

pub fn format_stats(stats: &StatsSnapshot) -> Vec<String> {
    vec![
        format!("failing:      {}", stats.failing),
        format!("non-failing:  {}", stats.non_failing),
        format!("no issue:     {}", stats.no_issue),
        format!("total:        {}", stats.total()),
    ]
}

fn percent(rate: f64) -> String {
    format!("{:.0}%", rate * 100.0)
}

pub fn format_project_rates(rates: &[ProjectRate]) -> Vec<String> {
    let mut lines = Vec::new();
    lines.push(format!(
        "{} {:>5} {:>5} {:>5} {:>6} {:>6} {:>10}",
        pad_to_width("project", PROJECT_WIDTH + 6),
        "notes",
        "fail",
        "nonf",
        "fail%",
        "nonf%",
        "time"
    ));
    for rate in rates {
        lines.push(format!(
            "{} {:>5} {:>5} {:>5} {:>6} {:>6} {:>10}",
            pad_to_width(&rate.project_id, PROJECT_WIDTH + 6),
            rate.count,
            rate.fail_count,
            rate.non_fail_count,
            percent(rate.fail_rate),
            percent(rate.non_fail_rate),
            format_hms(rate.total_seconds)
        ));
    }
    lines
}

pub fn format_timer_line(category: Category, running: bool, seconds: i64) -> String {
    format!(
        "[{}] {} {}",
        if running { '>' } else { ' ' },
        pad_to_width(category.as_str(), 10),
        format_hms(seconds)
    )
}

pub fn format_export_json(rows: &[ExportRow]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(rows)
}

/// Parse `HH:MM:SS` (or `MM:SS`, or plain seconds) into hours, minutes, seconds
pub fn parse_duration(s: &str) -> Result<(i64, i64, i64), String> {
    let parts: Vec<&str> = s.trim().split(':').collect();
    let nums: Result<Vec<i64>, _> = parts.iter().map(|p| p.parse::<i64>()).collect();
    let nums = nums.map_err(|_| format!("invalid duration '{}' (expected HH:MM:SS)", s))?;
    if nums.iter().any(|n| *n < 0) {
        return Err(format!("invalid duration '{}' (negative)", s));
    }
    match nums.as_slice() {
        [h, m, sec] => Ok((*h, *m, *sec)),
        [m, sec] => Ok((0, *m, *sec)),
        [sec] => Ok((0, 0, *sec)),
        _ => Err(format!("invalid duration '{}' (expected HH:MM:SS)", s)),
    }
}
