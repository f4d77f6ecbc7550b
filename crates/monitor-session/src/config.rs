//! Session configuration

use monitor_common::{DEFAULT_COMPACT_THRESHOLD, DEFAULT_HISTORY_LIMIT};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-viewer session settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Full reconciliation period
    pub poll_interval_ms: u64,
    /// Subscribe to the store's change feeds
    pub push_enabled: bool,
    pub alert_check_interval_ms: u64,
    /// Length of one audible alert
    pub alert_duration_ms: u64,
    pub history_limit: usize,
    pub compact_threshold: usize,
    pub log_level: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 15_000,
            push_enabled: true,
            alert_check_interval_ms: 5_000,
            alert_duration_ms: 5_000,
            history_limit: DEFAULT_HISTORY_LIMIT,
            compact_threshold: DEFAULT_COMPACT_THRESHOLD,
            log_level: "info".into(),
        }
    }
}

impl SessionConfig {
    /// Load from file
    pub fn load(path: &str) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Save to file
    pub fn save(&self, path: &str) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn alert_check_interval(&self) -> Duration {
        Duration::from_millis(self.alert_check_interval_ms.max(1))
    }

    pub fn alert_duration(&self) -> Duration {
        Duration::from_millis(self.alert_duration_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: SessionConfig =
            serde_json::from_str(r#"{"poll_interval_ms": 2000, "push_enabled": false}"#).unwrap();
        assert_eq!(config.poll_interval(), Duration::from_secs(2));
        assert!(!config.push_enabled);
        assert_eq!(config.alert_duration(), Duration::from_secs(5));
        assert_eq!(config.history_limit, 50);
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("monitor-session-{}.json", std::process::id()));
        let path = path.to_string_lossy().to_string();
        let config = SessionConfig { compact_threshold: 8, ..Default::default() };
        config.save(&path).unwrap();
        let loaded = SessionConfig::load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, config);
    }
}
