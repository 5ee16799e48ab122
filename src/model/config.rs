use serde::{Deserialize, Serialize};

/// Configuration from config.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Store file location. If unset, `$XDG_DATA_HOME/daylog/store.json`.
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Label shown instead of a number for canceled notes
    #[serde(default = "default_canceled_label")]
    pub canceled_label: String,
    /// Refresh period of running clocks and timers
    #[serde(default = "default_tick_seconds")]
    pub tick_seconds: u64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        DisplayConfig {
            canceled_label: default_canceled_label(),
            tick_seconds: default_tick_seconds(),
        }
    }
}

fn default_canceled_label() -> String {
    "Canceled".to_string()
}

fn default_tick_seconds() -> u64 {
    1
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Emit rows for canceled notes too
    #[serde(default)]
    pub include_canceled: bool,
}
