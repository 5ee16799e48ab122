use std::cell::Cell;
use std::rc::Rc;

use chrono::{DateTime, Local, TimeZone, Utc};

/// Source of wall-clock time in epoch milliseconds.
///
/// Every engine operation reads "now" through this trait so tests can drive
/// time explicitly.
pub trait TimeSource {
    fn now_ms(&self) -> i64;
}

/// Real wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTime;

impl TimeSource for SystemTime {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// A settable clock shared between clones, for tests and replays.
#[derive(Debug, Clone, Default)]
pub struct ManualTime {
    now: Rc<Cell<i64>>,
}

impl ManualTime {
    pub fn new(start_ms: i64) -> Self {
        ManualTime {
            now: Rc::new(Cell::new(start_ms)),
        }
    }

    pub fn set(&self, ms: i64) {
        self.now.set(ms);
    }

    pub fn advance_ms(&self, ms: i64) {
        self.now.set(self.now.get() + ms);
    }

    pub fn advance_secs(&self, secs: i64) {
        self.advance_ms(secs * 1000);
    }
}

impl TimeSource for ManualTime {
    fn now_ms(&self) -> i64 {
        self.now.get()
    }
}

/// Format whole seconds as `HH:MM:SS`. Hours grow past two digits as needed;
/// negative input clamps to zero.
pub fn format_hms(seconds: i64) -> String {
    let s = seconds.max(0);
    format!("{:02}:{:02}:{:02}", s / 3600, (s % 3600) / 60, s % 60)
}

/// Render an epoch-ms timestamp as RFC 3339 in local time.
pub fn format_local(ms: i64) -> String {
    match Local.timestamp_millis_opt(ms).single() {
        Some(dt) => dt.to_rfc3339_opts(chrono::SecondsFormat::Secs, false),
        None => String::new(),
    }
}

/// Render an epoch-ms timestamp as RFC 3339 in UTC.
pub fn format_utc(ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|dt| dt.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_hms_pads_components() {
        assert_eq!(format_hms(0), "00:00:00");
        assert_eq!(format_hms(65), "00:01:05");
        assert_eq!(format_hms(3600 * 12 + 61), "12:01:01");
        assert_eq!(format_hms(3600 * 125), "125:00:00");
    }

    #[test]
    fn format_hms_clamps_negative() {
        assert_eq!(format_hms(-5), "00:00:00");
    }

    #[test]
    fn manual_time_is_shared_between_clones() {
        let t = ManualTime::new(1_000);
        let other = t.clone();
        t.advance_secs(2);
        assert_eq!(other.now_ms(), 3_000);
        other.set(10);
        assert_eq!(t.now_ms(), 10);
    }

    #[test]
    fn format_utc_renders_epoch() {
        assert_eq!(format_utc(0), "1970-01-01T00:00:00Z");
    }
}
