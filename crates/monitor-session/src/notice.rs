//! Transient notices shown to the viewer

use monitor_common::MonitorError;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// Short-lived message; nothing is persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl From<&MonitorError> for Notice {
    fn from(err: &MonitorError) -> Self {
        let level = match err {
            MonitorError::Sync(_) => NoticeLevel::Error,
            _ => NoticeLevel::Warning,
        };
        Self { level, message: err.to_string() }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.level, self.message)
    }
}
