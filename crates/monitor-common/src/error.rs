//! Error types for the ticket monitor

use crate::ticket::TicketId;
use thiserror::Error;

/// Monitor error type
///
/// None of these are fatal: the viewer stays usable on its last good replica.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MonitorError {
    /// An active ticket with the same id already exists in some branch
    #[error("ticket {ticket_id} is already active in branch {branch}")]
    Conflict {
        /// Colliding ticket id
        ticket_id: TicketId,
        /// Display name of the branch already tracking it
        branch: String,
    },

    /// Actor may not touch tickets outside its own branch
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// No active ticket with this id
    #[error("ticket not found: {0}")]
    NotFound(TicketId),

    /// Missing or malformed input, caught before any network call
    #[error("validation failed: {0}")]
    Validation(String),

    /// Backing store read/write failure
    #[error("sync failure: {0}")]
    Sync(String),
}

impl MonitorError {
    /// Whether the next poll cycle may clear this error on its own
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Sync(_))
    }
}

/// Result type for monitor operations
pub type MonitorResult<T> = Result<T, MonitorError>;
