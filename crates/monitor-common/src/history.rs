//! Audit Trail - append-only record of closed tickets

use crate::catalog::{BranchId, CategoryId};
use crate::ticket::{Assignee, Ticket, TicketId};
use crate::TimestampMillis;
use serde::{Deserialize, Serialize};

/// Rows fetched and shown by default, newest first.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Snapshot of a ticket at the moment it was closed
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub ticket_id: TicketId,
    #[serde(rename = "technicianName")]
    pub assignee: Assignee,
    pub category_id: CategoryId,
    #[serde(rename = "creatorName")]
    pub creator: String,
    pub branch_id: BranchId,
    #[serde(rename = "startTimestampMillis")]
    pub started_at: TimestampMillis,
    #[serde(rename = "closedByName")]
    pub closed_by: String,
    #[serde(rename = "closedAtTimestampMillis")]
    pub closed_at: TimestampMillis,
}

impl HistoryEntry {
    /// Record the closure of `ticket`
    pub fn closed(ticket: Ticket, closed_by: impl Into<String>, closed_at: TimestampMillis) -> Self {
        Self {
            ticket_id: ticket.id,
            assignee: ticket.assignee,
            category_id: ticket.category_id,
            creator: ticket.creator,
            branch_id: ticket.branch_id,
            started_at: ticket.started_at,
            closed_by: closed_by.into(),
            closed_at,
        }
    }

    /// How long the ticket stayed active
    pub fn active_millis(&self) -> i64 {
        self.closed_at.saturating_sub(self.started_at)
    }
}

/// Filter for audit lookups. Empty query matches everything.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuditQuery {
    /// Exact ticket number, as typed in the audit search box
    pub ticket_id: Option<TicketId>,
    pub branch_id: Option<BranchId>,
    pub closed_by: Option<String>,
    /// Defaults to [`DEFAULT_HISTORY_LIMIT`]
    pub limit: Option<usize>,
}

impl AuditQuery {
    /// Query by ticket number
    pub fn ticket(id: TicketId) -> Self {
        Self { ticket_id: Some(id), ..Self::default() }
    }

    fn matches(&self, entry: &HistoryEntry) -> bool {
        self.ticket_id.map_or(true, |id| entry.ticket_id == id)
            && self.branch_id.map_or(true, |b| entry.branch_id == b)
            && self.closed_by.as_deref().map_or(true, |n| entry.closed_by == n)
    }
}

/// Closed-ticket log, kept in append order
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuditTrail {
    entries: Vec<HistoryEntry>,
}

impl AuditTrail {
    /// Empty trail
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from rows in any order; kept sorted by closing time
    pub fn from_entries(mut entries: Vec<HistoryEntry>) -> Self {
        entries.sort_by_key(|e| e.closed_at);
        Self { entries }
    }

    /// Append one closure
    pub fn append(&mut self, entry: HistoryEntry) {
        self.entries.push(entry);
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing has been closed yet
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries, oldest first
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Most recent entries first, up to `limit`
    pub fn recent(&self, limit: usize) -> Vec<HistoryEntry> {
        self.entries.iter().rev().take(limit).cloned().collect()
    }

    /// Newest-first search. The limit applies before filtering, like the
    /// audit screen, which searches the rows it has on hand.
    pub fn search(&self, query: &AuditQuery) -> Vec<HistoryEntry> {
        let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
        self.entries
            .iter()
            .rev()
            .take(limit)
            .filter(|e| query.matches(e))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ticket::TicketDraft;

    fn entry(id: u64, branch: u64, by: &str, closed_at: TimestampMillis) -> HistoryEntry {
        let draft = TicketDraft::new(TicketId::new(id), Some("ana"), CategoryId::new(1));
        let ticket = Ticket::open(draft, "caja", BranchId::new(branch), 0).unwrap();
        HistoryEntry::closed(ticket, by, closed_at)
    }

    #[test]
    fn test_recent_is_newest_first() {
        let trail = AuditTrail::from_entries(vec![
            entry(2, 1, "admin", 200),
            entry(1, 1, "admin", 100),
            entry(3, 2, "caja", 300),
        ]);
        let ids: Vec<_> = trail.recent(2).iter().map(|e| e.ticket_id.value()).collect();
        assert_eq!(ids, vec![3, 2]);
    }

    #[test]
    fn test_search_filters() {
        let mut trail = AuditTrail::new();
        trail.append(entry(7, 1, "admin", 100));
        trail.append(entry(8, 2, "caja", 200));
        trail.append(entry(7, 2, "caja", 300));

        assert_eq!(trail.search(&AuditQuery::ticket(TicketId::new(7))).len(), 2);

        let by_branch = AuditQuery { branch_id: Some(BranchId::new(2)), ..Default::default() };
        assert_eq!(trail.search(&by_branch).len(), 2);

        let by_closer = AuditQuery { closed_by: Some("admin".into()), ..Default::default() };
        let found = trail.search(&by_closer);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].closed_at, 100);
    }

    #[test]
    fn test_persisted_shape() {
        let json = serde_json::to_value(entry(5, 3, "admin", 900)).unwrap();
        assert_eq!(json["ticketId"], 5);
        assert_eq!(json["technicianName"], "ana");
        assert_eq!(json["closedByName"], "admin");
        assert_eq!(json["closedAtTimestampMillis"], 900);
    }
}
