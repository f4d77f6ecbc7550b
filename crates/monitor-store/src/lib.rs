//! Ticket Monitor Store - Shared backing store behind every viewer
//!
//! The store is the single source of truth. Viewers keep a replica and
//! learn about changes through a per-collection change feed.
//!
//! - [`BackingStore`]: persistence abstraction the session talks to
//! - [`InMemoryStore`]: process-local implementation with JSON snapshots
//! - [`seed_defaults`]: first-run reference data

#![warn(clippy::all)]

pub mod memory;
pub mod seed;
pub mod snapshot;

pub use memory::InMemoryStore;
pub use seed::seed_defaults;
pub use snapshot::StoreSnapshot;

use async_trait::async_trait;
use monitor_common::{
    Branch, BranchId, Category, CategoryId, ClearScope, HistoryEntry, MonitorError, MonitorUser, NewCategory,
    NewUser, Technician, TechnicianId, Ticket, TicketId, TimestampMillis,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

/// Store result type
pub type StoreResult<T> = Result<T, StoreError>;

/// Store errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("ticket {0} is already active")]
    DuplicateTicket(TicketId),

    #[error("name already in use: {0}")]
    DuplicateName(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    Invalid(String),

    #[error("snapshot error: {0}")]
    Snapshot(String),
}

impl From<StoreError> for MonitorError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => MonitorError::Sync(msg),
            StoreError::Snapshot(msg) => MonitorError::Sync(msg),
            StoreError::DuplicateName(name) => {
                MonitorError::Validation(format!("name already in use: {name}"))
            }
            StoreError::NotFound(what) => MonitorError::Validation(format!("not found: {what}")),
            StoreError::Invalid(msg) => MonitorError::Validation(msg),
            // Callers that know the catalog map this to a branch-naming conflict first
            StoreError::DuplicateTicket(id) => MonitorError::Conflict {
                ticket_id: id,
                branch: monitor_common::UNKNOWN_BRANCH_LABEL.to_string(),
            },
        }
    }
}

/// Collections the store publishes change events for
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Branches,
    Technicians,
    Categories,
    Tickets,
    History,
    Users,
}

impl EntityKind {
    /// Every collection, in refresh order
    pub const ALL: [EntityKind; 6] = [
        EntityKind::Branches,
        EntityKind::Technicians,
        EntityKind::Categories,
        EntityKind::Users,
        EntityKind::Tickets,
        EntityKind::History,
    ];
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Branches => "branches",
            EntityKind::Technicians => "technicians",
            EntityKind::Categories => "categories",
            EntityKind::Tickets => "tickets",
            EntityKind::History => "history",
            EntityKind::Users => "users",
        };
        f.write_str(name)
    }
}

/// What happened to a row
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

/// Notification that a collection changed. Carries no payload: subscribers
/// re-read the collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: EntityKind,
    pub op: ChangeOp,
    pub at: TimestampMillis,
}

/// Shared backing store
#[async_trait]
pub trait BackingStore: Send + Sync {
    async fn list_branches(&self) -> StoreResult<Vec<Branch>>;
    async fn insert_branch(&self, name: &str) -> StoreResult<Branch>;
    /// Tickets that reference the branch are left alone
    async fn delete_branch(&self, id: BranchId) -> StoreResult<()>;

    async fn list_technicians(&self) -> StoreResult<Vec<Technician>>;
    async fn insert_technician(&self, name: &str) -> StoreResult<Technician>;
    async fn delete_technician(&self, id: TechnicianId) -> StoreResult<()>;

    async fn list_categories(&self) -> StoreResult<Vec<Category>>;
    async fn insert_category(&self, category: NewCategory) -> StoreResult<Category>;
    async fn delete_category(&self, id: CategoryId) -> StoreResult<()>;

    async fn list_users(&self) -> StoreResult<Vec<MonitorUser>>;
    /// Fails with `DuplicateName` when the name is taken
    async fn insert_user(&self, user: NewUser) -> StoreResult<MonitorUser>;
    /// Replace the user currently called `original_name`
    async fn update_user(&self, original_name: &str, user: NewUser) -> StoreResult<MonitorUser>;
    async fn delete_user(&self, name: &str) -> StoreResult<()>;

    async fn list_tickets(&self) -> StoreResult<Vec<Ticket>>;

    /// Add an active ticket. Fails with `DuplicateTicket` when the id is
    /// already active, whichever viewer got there first.
    async fn insert_ticket(&self, ticket: Ticket) -> StoreResult<Ticket>;

    /// Move tickets to history in one step. Ids that are no longer active
    /// are skipped and the entries actually written are returned.
    async fn archive_tickets(
        &self,
        ids: &[TicketId],
        closed_by: &str,
        closed_at: TimestampMillis,
    ) -> StoreResult<Vec<HistoryEntry>>;

    /// Move every active ticket in `scope` to history in one step, including
    /// tickets the caller has not seen yet
    async fn archive_scope(
        &self,
        scope: ClearScope,
        closed_by: &str,
        closed_at: TimestampMillis,
    ) -> StoreResult<Vec<HistoryEntry>>;

    /// Most recently closed first
    async fn list_history(&self, limit: usize) -> StoreResult<Vec<HistoryEntry>>;

    /// Change feed for one collection
    fn subscribe(&self, kind: EntityKind) -> broadcast::Receiver<ChangeEvent>;
}
