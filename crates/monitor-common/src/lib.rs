//! Ticket Monitor Common - Domain model for the multi-branch ticket monitor
//!
//! Everything in this crate is pure: no I/O, no timers, no shared state.
//! Time always comes in as an explicit `now` so the same inputs give the
//! same answer on every viewer.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          TICKET MONITOR DOMAIN                          │
//! │                                                                         │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐  ┌─────────────┐ │
//! │  │   Catalog    │  │   Urgency    │  │    Ticket    │  │    Audit    │ │
//! │  │  (branches,  │  │    Engine    │  │    Ledger    │  │    Trail    │ │
//! │  │  cats, techs)│  │  (pure fn)   │  │ (uniqueness) │  │ (append-only│ │
//! │  └──────┬───────┘  └──────┬───────┘  └──────┬───────┘  └──────┬──────┘ │
//! │         │                 │                 │                 │        │
//! │  ┌──────▼─────────────────▼─────────────────▼─────────────────▼──────┐ │
//! │  │               Visibility & Ordering Policy (per viewer)            │ │
//! │  └──────────────────────────────┬────────────────────────────────────┘ │
//! │                                 │                                      │
//! │  ┌──────────────────────────────▼───────┐  ┌─────────────────────────┐ │
//! │  │            Board (display model)     │  │  Escalation Notifier    │ │
//! │  └──────────────────────────────────────┘  └─────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod board;
pub mod catalog;
pub mod error;
pub mod history;
pub mod ledger;
pub mod notifier;
pub mod ticket;
pub mod urgency;
pub mod viewer;
pub mod visibility;

pub use board::{Board, BoardCard, DEFAULT_COMPACT_THRESHOLD};
pub use catalog::{
    require_name, Branch, BranchId, Catalog, Category, CategoryId, MonitorUser, NewCategory, NewUser,
    Technician, TechnicianId, UserId, ALL_BRANCHES, UNKNOWN_BRANCH_LABEL,
};
pub use error::{MonitorError, MonitorResult};
pub use history::{AuditQuery, AuditTrail, HistoryEntry, DEFAULT_HISTORY_LIMIT};
pub use ledger::{ClearScope, TicketLedger};
pub use notifier::{AlertBurst, EscalationNotifier};
pub use ticket::{Assignee, Ticket, TicketDraft, TicketId, PENDING};
pub use urgency::{elapsed_label, urgency_level, Thresholds, UrgencyLevel};
pub use viewer::{Role, Viewer};
pub use visibility::{BranchFilter, RankedTicket, VisibilityPolicy};

/// Milliseconds since the Unix epoch, the unit every persisted timestamp uses.
pub type TimestampMillis = i64;

/// Milliseconds in one minute.
pub const MILLIS_PER_MINUTE: i64 = 60_000;

/// Current wall-clock time in epoch milliseconds.
#[inline]
pub fn now_millis() -> TimestampMillis {
    chrono::Utc::now().timestamp_millis()
}
