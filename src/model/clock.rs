use serde::{Deserialize, Serialize};

/// One countable interval plus seconds carried over from earlier sessions.
///
/// All operations take the current time in epoch milliseconds and are no-ops
/// when their precondition does not hold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clock {
    pub start_timestamp: Option<i64>,
    pub end_timestamp: Option<i64>,
    /// Whole seconds folded in from previous sessions
    pub additional_time: i64,
}

impl Clock {
    pub fn new(start_timestamp: Option<i64>, end_timestamp: Option<i64>, additional_time: i64) -> Self {
        Clock {
            start_timestamp,
            end_timestamp,
            additional_time,
        }
    }

    pub fn is_started(&self) -> bool {
        self.start_timestamp.is_some()
    }

    /// Started and not yet stopped
    pub fn is_running(&self) -> bool {
        self.start_timestamp.is_some() && self.end_timestamp.is_none()
    }

    pub fn start(&mut self, now: i64) {
        if self.is_started() {
            return;
        }
        self.start_timestamp = Some(now);
        self.end_timestamp = None;
    }

    pub fn stop(&mut self, now: i64) {
        if self.is_running() {
            self.end_timestamp = Some(now);
        }
    }

    /// Fold the last session into `additional_time` and open a new one.
    pub fn restart(&mut self, now: i64) {
        let Some(start) = self.start_timestamp else {
            self.start(now);
            return;
        };
        let end = self.end_timestamp.unwrap_or(now);
        self.additional_time += (end - start).max(0) / 1000;
        self.start_timestamp = Some(now);
        self.end_timestamp = None;
    }

    pub fn elapsed_seconds(&self, now: i64) -> i64 {
        match self.start_timestamp {
            Some(start) => {
                let end = self.end_timestamp.unwrap_or(now);
                self.additional_time + (end - start).max(0) / 1000
            }
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unstarted_clock_reports_zero() {
        let clock = Clock::default();
        assert_eq!(clock.elapsed_seconds(99_000), 0);
        assert!(!clock.is_started());
    }

    #[test]
    fn start_is_idempotent() {
        let mut clock = Clock::default();
        clock.start(1_000);
        clock.start(5_000);
        assert_eq!(clock.start_timestamp, Some(1_000));
        assert_eq!(clock.elapsed_seconds(4_500), 3);
    }

    #[test]
    fn stop_freezes_elapsed() {
        let mut clock = Clock::default();
        clock.start(0);
        clock.stop(7_900);
        assert_eq!(clock.elapsed_seconds(60_000), 7);
        // second stop is a no-op
        clock.stop(20_000);
        assert_eq!(clock.end_timestamp, Some(7_900));
    }

    #[test]
    fn stop_without_start_is_noop() {
        let mut clock = Clock::default();
        clock.stop(5_000);
        assert_eq!(clock, Clock::default());
    }

    #[test]
    fn restart_on_fresh_clock_starts_it() {
        let mut clock = Clock::default();
        clock.restart(2_000);
        assert_eq!(clock.start_timestamp, Some(2_000));
        assert_eq!(clock.additional_time, 0);
    }

    #[test]
    fn restart_carries_previous_session() {
        let mut clock = Clock::default();
        clock.start(0);
        clock.stop(10_000);
        clock.restart(50_000);
        assert_eq!(clock.additional_time, 10);
        assert_eq!(clock.end_timestamp, None);
        assert_eq!(clock.elapsed_seconds(53_000), 13);
    }

    #[test]
    fn restart_then_stop_conserves_elapsed() {
        let mut clock = Clock::new(Some(1_000), Some(9_700), 4);
        let before = clock.elapsed_seconds(20_000);
        clock.restart(20_000);
        clock.stop(20_000);
        assert_eq!(clock.elapsed_seconds(20_000), before);
    }
}
