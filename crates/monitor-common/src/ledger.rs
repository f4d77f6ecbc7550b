//! Ticket Ledger
//!
//! Active tickets plus the audit trail they move into when closed. A ledger is
//! the unit of atomicity: every method that takes `&mut self` either completes
//! entirely or leaves the ledger untouched, so a closed ticket is always in
//! exactly one of the active set or the history.
//!
//! Rules enforced here:
//! - one active ticket per id across all branches
//! - only admins or members of the ticket's branch may close it
//! - every closure appends exactly one [`HistoryEntry`]

use crate::catalog::{BranchId, Catalog};
use crate::error::{MonitorError, MonitorResult};
use crate::history::{AuditTrail, HistoryEntry};
use crate::ticket::{Ticket, TicketDraft, TicketId};
use crate::viewer::Viewer;
use crate::TimestampMillis;
use std::collections::BTreeMap;

/// Which tickets a bulk clear removes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClearScope {
    /// Every active ticket (admin only)
    All,
    /// Tickets of one branch
    Branch(BranchId),
}

impl ClearScope {
    /// Work out the clear scope for `actor`.
    ///
    /// Admins clear whatever `requested` names (`None` = everything). Anyone
    /// else is pinned to their own branch.
    pub fn resolve(actor: &Viewer, requested: Option<BranchId>) -> MonitorResult<Self> {
        if actor.is_admin() {
            return Ok(requested.map_or(Self::All, Self::Branch));
        }
        let own = actor.branch_id.ok_or_else(|| {
            MonitorError::PermissionDenied(format!("{} has no branch to clear", actor.name))
        })?;
        match requested {
            Some(branch) if branch != own => Err(MonitorError::PermissionDenied(format!(
                "{} may only clear branch {own}",
                actor.name
            ))),
            _ => Ok(Self::Branch(own)),
        }
    }

    fn covers(&self, ticket: &Ticket) -> bool {
        match self {
            Self::All => true,
            Self::Branch(b) => ticket.branch_id == *b,
        }
    }
}

/// Active tickets and their audit trail
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TicketLedger {
    active: BTreeMap<TicketId, Ticket>,
    history: AuditTrail,
}

impl TicketLedger {
    /// Empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger from fetched collections. Later duplicates of an id are dropped.
    pub fn from_parts(tickets: Vec<Ticket>, history: Vec<HistoryEntry>) -> Self {
        let mut ledger = Self { active: BTreeMap::new(), history: AuditTrail::from_entries(history) };
        ledger.replace_active(tickets);
        ledger
    }

    /// Swap the active set wholesale
    pub fn replace_active(&mut self, tickets: Vec<Ticket>) {
        self.active.clear();
        for t in tickets {
            self.active.entry(t.id).or_insert(t);
        }
    }

    /// Swap the history wholesale
    pub fn replace_history(&mut self, entries: Vec<HistoryEntry>) {
        self.history = AuditTrail::from_entries(entries);
    }

    /// Active tickets, in id order
    pub fn active(&self) -> impl Iterator<Item = &Ticket> {
        self.active.values()
    }

    /// Active tickets, cloned
    pub fn active_tickets(&self) -> Vec<Ticket> {
        self.active.values().cloned().collect()
    }

    /// Look up an active ticket
    pub fn get(&self, id: TicketId) -> Option<&Ticket> {
        self.active.get(&id)
    }

    /// Number of active tickets
    pub fn len(&self) -> usize {
        self.active.len()
    }

    /// True when no ticket is active
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Closed tickets
    pub fn history(&self) -> &AuditTrail {
        &self.history
    }

    /// Fail with `Conflict` if `id` is active anywhere
    pub fn ensure_unique(&self, id: TicketId, catalog: &Catalog) -> MonitorResult<()> {
        match self.active.get(&id) {
            Some(existing) => {
                let branch = catalog.branch_label(existing.branch_id).to_string();
                tracing::debug!(ticket_id = %id, branch = %branch, "Duplicate ticket rejected");
                Err(MonitorError::Conflict { ticket_id: id, branch })
            }
            None => Ok(()),
        }
    }

    /// Validate the draft, check uniqueness and open the ticket
    pub fn create(
        &mut self,
        draft: TicketDraft,
        creator: &str,
        branch_id: BranchId,
        catalog: &Catalog,
        now: TimestampMillis,
    ) -> MonitorResult<Ticket> {
        let ticket = Ticket::open(draft, creator, branch_id, now)?;
        self.ensure_unique(ticket.id, catalog)?;
        self.active.insert(ticket.id, ticket.clone());
        Ok(ticket)
    }

    /// Insert an already-built ticket. On collision the active one is
    /// returned and nothing changes.
    pub fn insert(&mut self, ticket: Ticket) -> Result<(), Ticket> {
        if let Some(existing) = self.active.get(&ticket.id) {
            return Err(existing.clone());
        }
        self.active.insert(ticket.id, ticket);
        Ok(())
    }

    /// Check `actor` may close ticket `id`
    pub fn authorize_close(&self, id: TicketId, actor: &Viewer) -> MonitorResult<&Ticket> {
        let ticket = self.active.get(&id).ok_or(MonitorError::NotFound(id))?;
        if !actor.may_close_in(ticket.branch_id) {
            return Err(MonitorError::PermissionDenied(format!(
                "{} cannot close ticket {id} of branch {}",
                actor.name, ticket.branch_id
            )));
        }
        Ok(ticket)
    }

    /// Close one ticket on behalf of `actor`
    pub fn close(
        &mut self,
        id: TicketId,
        actor: &Viewer,
        now: TimestampMillis,
    ) -> MonitorResult<HistoryEntry> {
        self.authorize_close(id, actor)?;
        self.archive(&[id], &actor.name, now)
            .pop()
            .ok_or(MonitorError::NotFound(id))
    }

    /// Ids a clear with this scope would close
    pub fn ids_in_scope(&self, scope: ClearScope) -> Vec<TicketId> {
        self.active.values().filter(|t| scope.covers(t)).map(|t| t.id).collect()
    }

    /// Close every ticket in scope, one history entry each
    pub fn clear(
        &mut self,
        actor: &Viewer,
        requested: Option<BranchId>,
        now: TimestampMillis,
    ) -> MonitorResult<Vec<HistoryEntry>> {
        let scope = ClearScope::resolve(actor, requested)?;
        let ids = self.ids_in_scope(scope);
        Ok(self.archive(&ids, &actor.name, now))
    }

    /// Apply closures that happened elsewhere: drop the tickets from the
    /// active set and record each entry once, even if a history refresh
    /// already brought it in.
    pub fn record_closed(&mut self, entries: &[HistoryEntry]) {
        for entry in entries {
            self.active.remove(&entry.ticket_id);
            if !self.history.entries().contains(entry) {
                self.history.append(entry.clone());
            }
        }
    }

    /// Move the named tickets to history. Ids that are not active are
    /// skipped. No permission check: callers have done it already.
    pub fn archive(
        &mut self,
        ids: &[TicketId],
        closed_by: &str,
        now: TimestampMillis,
    ) -> Vec<HistoryEntry> {
        let mut closed = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(ticket) = self.active.remove(id) {
                let entry = HistoryEntry::closed(ticket, closed_by, now);
                self.history.append(entry.clone());
                closed.push(entry);
            }
        }
        closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Branch, CategoryId};

    const NOW: TimestampMillis = 1_700_000_000_000;

    fn catalog() -> Catalog {
        Catalog {
            branches: vec![
                Branch { id: BranchId::new(1), name: "Huérfanos".into() },
                Branch { id: BranchId::new(2), name: "Mojitas".into() },
                Branch { id: BranchId::new(3), name: "Apumanque".into() },
            ],
            ..Default::default()
        }
    }

    fn draft(id: u64) -> TicketDraft {
        TicketDraft::new(TicketId::new(id), None, CategoryId::new(1))
    }

    #[test]
    fn test_duplicate_across_branches_conflicts() {
        let cat = catalog();
        let mut ledger = TicketLedger::new();
        ledger.create(draft(42), "caja1", BranchId::new(1), &cat, NOW).unwrap();

        let err = ledger
            .create(draft(42), "caja2", BranchId::new(2), &cat, NOW)
            .unwrap_err();
        assert_eq!(
            err,
            MonitorError::Conflict { ticket_id: TicketId::new(42), branch: "Huérfanos".into() }
        );
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.get(TicketId::new(42)).unwrap().branch_id, BranchId::new(1));
    }

    #[test]
    fn test_conflict_names_unknown_branch() {
        let mut ledger = TicketLedger::new();
        ledger.create(draft(5), "x", BranchId::new(77), &Catalog::default(), NOW).unwrap();
        let err = ledger.ensure_unique(TicketId::new(5), &catalog()).unwrap_err();
        assert!(matches!(err, MonitorError::Conflict { branch, .. } if branch == "??"));
    }

    #[test]
    fn test_pending_assignment() {
        let mut ledger = TicketLedger::new();
        let t = ledger.create(draft(1), "caja", BranchId::new(1), &catalog(), NOW).unwrap();
        assert!(t.assignee.is_pending());
        assert_eq!(t.started_at, NOW);
    }

    #[test]
    fn test_operator_cannot_close_other_branch() {
        let cat = catalog();
        let mut ledger = TicketLedger::new();
        ledger.create(draft(9), "caja", BranchId::new(2), &cat, NOW).unwrap();

        let op = Viewer::operator("caja1", BranchId::new(1));
        let err = ledger.close(TicketId::new(9), &op, NOW).unwrap_err();
        assert!(matches!(err, MonitorError::PermissionDenied(_)));
        assert_eq!(ledger.len(), 1);
        assert!(ledger.history().is_empty());
    }

    #[test]
    fn test_close_moves_to_history() {
        let cat = catalog();
        let mut ledger = TicketLedger::new();
        ledger.create(draft(9), "caja", BranchId::new(2), &cat, NOW).unwrap();

        let op = Viewer::operator("caja2", BranchId::new(2));
        let entry = ledger.close(TicketId::new(9), &op, NOW + 1000).unwrap();

        assert_eq!(entry.closed_by, "caja2");
        assert_eq!(entry.closed_at, NOW + 1000);
        assert!(ledger.get(TicketId::new(9)).is_none());
        assert_eq!(ledger.history().len(), 1);
        assert!(matches!(
            ledger.close(TicketId::new(9), &op, NOW),
            Err(MonitorError::NotFound(_))
        ));
    }

    #[test]
    fn test_admin_clear_all() {
        let cat = catalog();
        let mut ledger = TicketLedger::new();
        for (id, branch) in [(1, 1), (2, 1), (3, 2), (4, 3), (5, 3)] {
            ledger.create(draft(id), "caja", BranchId::new(branch), &cat, NOW).unwrap();
        }

        let closed = ledger.clear(&Viewer::admin("admin"), None, NOW).unwrap();
        assert_eq!(closed.len(), 5);
        assert!(ledger.is_empty());
        assert_eq!(ledger.history().len(), 5);
        assert!(ledger.history().entries().iter().all(|e| e.closed_by == "admin"));
    }

    #[test]
    fn test_operator_clear_is_branch_scoped() {
        let cat = catalog();
        let mut ledger = TicketLedger::new();
        for (id, branch) in [(1, 1), (2, 1), (3, 2)] {
            ledger.create(draft(id), "caja", BranchId::new(branch), &cat, NOW).unwrap();
        }

        let op = Viewer::operator("caja1", BranchId::new(1));
        assert!(matches!(
            ledger.clear(&op, Some(BranchId::new(2)), NOW),
            Err(MonitorError::PermissionDenied(_))
        ));

        let closed = ledger.clear(&op, None, NOW).unwrap();
        assert_eq!(closed.len(), 2);
        assert_eq!(ledger.active_tickets().len(), 1);
        assert_eq!(ledger.active_tickets()[0].branch_id, BranchId::new(2));
    }

    #[test]
    fn test_record_closed_includes_unseen_tickets() {
        let cat = catalog();
        let mut ledger = TicketLedger::new();
        ledger.create(draft(1), "caja", BranchId::new(1), &cat, NOW).unwrap();

        // Ticket 2 was opened and closed without this ledger ever seeing it
        let unseen = Ticket::open(draft(2), "caja2", BranchId::new(2), NOW).unwrap();
        let seen = ledger.get(TicketId::new(1)).cloned().unwrap();
        let entries = vec![
            HistoryEntry::closed(seen, "admin", NOW + 10),
            HistoryEntry::closed(unseen, "admin", NOW + 10),
        ];

        ledger.record_closed(&entries);
        ledger.record_closed(&entries);
        assert!(ledger.is_empty());
        assert_eq!(ledger.history().len(), 2);
        assert!(ledger.history().entries().iter().any(|e| e.ticket_id == TicketId::new(2)));
    }

    #[test]
    fn test_replace_active_drops_duplicates() {
        let a = Ticket::open(draft(1), "a", BranchId::new(1), NOW).unwrap();
        let b = Ticket::open(draft(1), "b", BranchId::new(2), NOW).unwrap();
        let ledger = TicketLedger::from_parts(vec![a.clone(), b], vec![]);
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.get(TicketId::new(1)), Some(&a));
    }
}
