use chrono::{Local, NaiveDate};

/// Store-key prefix for a day's category timers.
pub const TIMERS_KEY_PREFIX: &str = "offPlatform_";

/// Store key of the persisted active-timer registry.
pub const ACTIVE_TIMERS_KEY: &str = "offPlatform_activeTimers";

/// True if `key` is a `YYYY-MM-DD` day-bucket key naming a real date.
pub fn is_day_key(key: &str) -> bool {
    parse_day(key).is_some()
}

/// Parse a day-bucket key into a date.
pub fn parse_day(key: &str) -> Option<NaiveDate> {
    let shaped = key.len() == 10
        && key.bytes().enumerate().all(|(i, b)| match i {
            4 | 7 => b == b'-',
            _ => b.is_ascii_digit(),
        });
    if !shaped {
        return None;
    }
    NaiveDate::parse_from_str(key, "%Y-%m-%d").ok()
}

/// The day-bucket key for a date.
pub fn day_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Today's bucket, in local time.
pub fn today_key() -> String {
    day_key(Local::now().date_naive())
}

/// Store key holding the category timers for `day`.
pub fn timers_key(day: &str) -> String {
    format!("{}{}", TIMERS_KEY_PREFIX, day)
}

/// Sort day keys newest-first. Keys that don't parse sort last.
pub fn sort_newest_first(days: &mut [String]) {
    days.sort_by(|a, b| parse_day(b).cmp(&parse_day(a)));
}
