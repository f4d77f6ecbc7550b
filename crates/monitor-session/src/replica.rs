//! Local replica of the shared store
//!
//! Replaced wholesale on every refresh and swapped atomically, so readers
//! always see one consistent version and a failed refresh leaves the previous
//! one in place.

use monitor_common::{
    Branch, Catalog, Category, HistoryEntry, MonitorUser, Technician, Ticket, TicketLedger,
    TimestampMillis,
};
use monitor_store::EntityKind;

/// One viewer's copy of catalog, active tickets and history
#[derive(Debug, Clone, Default)]
pub struct Replica {
    pub catalog: Catalog,
    pub ledger: TicketLedger,
    /// When the last full refresh completed; `None` until the first one
    pub loaded_at: Option<TimestampMillis>,
}

/// A freshly fetched collection
#[derive(Debug, Clone)]
pub enum Fetched {
    Branches(Vec<Branch>),
    Technicians(Vec<Technician>),
    Categories(Vec<Category>),
    Users(Vec<MonitorUser>),
    Tickets(Vec<Ticket>),
    History(Vec<HistoryEntry>),
}

impl Fetched {
    pub fn kind(&self) -> EntityKind {
        match self {
            Fetched::Branches(_) => EntityKind::Branches,
            Fetched::Technicians(_) => EntityKind::Technicians,
            Fetched::Categories(_) => EntityKind::Categories,
            Fetched::Users(_) => EntityKind::Users,
            Fetched::Tickets(_) => EntityKind::Tickets,
            Fetched::History(_) => EntityKind::History,
        }
    }

    pub(crate) fn len(&self) -> usize {
        match self {
            Fetched::Branches(v) => v.len(),
            Fetched::Technicians(v) => v.len(),
            Fetched::Categories(v) => v.len(),
            Fetched::Users(v) => v.len(),
            Fetched::Tickets(v) => v.len(),
            Fetched::History(v) => v.len(),
        }
    }
}

impl Replica {
    /// Replica built from a complete fetch of every collection
    pub fn loaded(
        catalog: Catalog,
        tickets: Vec<Ticket>,
        history: Vec<HistoryEntry>,
        at: TimestampMillis,
    ) -> Self {
        Self { catalog, ledger: TicketLedger::from_parts(tickets, history), loaded_at: Some(at) }
    }

    /// Copy with one collection replaced
    pub fn with(&self, fetched: Fetched) -> Self {
        let mut next = self.clone();
        match fetched {
            Fetched::Branches(v) => next.catalog.branches = v,
            Fetched::Technicians(v) => next.catalog.technicians = v,
            Fetched::Categories(v) => next.catalog.categories = v,
            Fetched::Users(v) => next.catalog.users = v,
            Fetched::Tickets(v) => next.ledger.replace_active(v),
            Fetched::History(v) => next.ledger.replace_history(v),
        }
        next
    }

    /// Copy with `edit` applied to the catalog
    pub fn with_catalog(&self, edit: impl FnOnce(&mut Catalog)) -> Self {
        let mut next = self.clone();
        edit(&mut next.catalog);
        next
    }

    /// Copy with `edit` applied to the ledger
    pub fn with_ledger(&self, edit: impl FnOnce(&mut TicketLedger)) -> Self {
        let mut next = self.clone();
        edit(&mut next.ledger);
        next
    }
}
