use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Maximum number of remembered searches
pub const SEARCH_HISTORY_LIMIT: usize = 50;

/// Persisted CLI view state (written to .state.json next to the store)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ViewState {
    /// Selected day bucket
    #[serde(default)]
    pub active_day: Option<String>,
    /// Last search query
    #[serde(default)]
    pub last_search: Option<String>,
    /// Search history (most recent first)
    #[serde(default)]
    pub search_history: Vec<String>,
}

impl ViewState {
    /// Record a query at the front of the history, without duplicates.
    pub fn remember_search(&mut self, query: &str) {
        self.last_search = Some(query.to_string());
        self.search_history.retain(|q| q != query);
        self.search_history.insert(0, query.to_string());
        self.search_history.truncate(SEARCH_HISTORY_LIMIT);
    }
}

/// Read .state.json from the store directory
pub fn read_view_state(dir: &Path) -> Option<ViewState> {
    let content = fs::read_to_string(dir.join(".state.json")).ok()?;
    serde_json::from_str(&content).ok()
}

/// Write .state.json to the store directory
pub fn write_view_state(dir: &Path, state: &ViewState) -> Result<(), std::io::Error> {
    let content = serde_json::to_string_pretty(state)?;
    fs::write(dir.join(".state.json"), content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn write_and_read_round_trip() {
        let dir = TempDir::new().unwrap();
        let mut state = ViewState {
            active_day: Some("2024-01-15".into()),
            ..Default::default()
        };
        state.remember_search("p-1");
        write_view_state(dir.path(), &state).unwrap();
        let loaded = read_view_state(dir.path()).unwrap();
        assert_eq!(loaded.active_day.as_deref(), Some("2024-01-15"));
        assert_eq!(loaded.last_search.as_deref(), Some("p-1"));
        assert_eq!(loaded.search_history, vec!["p-1"]);
    }

    #[test]
    fn read_missing_file_returns_none() {
        let dir = TempDir::new().unwrap();
        assert!(read_view_state(dir.path()).is_none());
    }

    #[test]
    fn read_malformed_json_returns_none() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(".state.json"), "not json {{{").unwrap();
        assert!(read_view_state(dir.path()).is_none());
    }

    #[test]
    fn search_history_dedups_and_caps() {
        let mut state = ViewState::default();
        for i in 0..60 {
            state.remember_search(&format!("q{}", i));
        }
        state.remember_search("q10");
        assert_eq!(state.search_history.len(), SEARCH_HISTORY_LIMIT);
        assert_eq!(state.search_history[0], "q10");
        assert_eq!(state.search_history.iter().filter(|q| *q == "q10").count(), 1);
    }

    #[test]
    fn serde_defaults_on_empty_object() {
        let state: ViewState = serde_json::from_str("{}").unwrap();
        assert!(state.active_day.is_none());
        assert!(state.search_history.is_empty());
    }
}
