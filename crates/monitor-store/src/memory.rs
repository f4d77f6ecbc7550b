//! In-memory backing store
//!
//! All collections sit behind one lock, so uniqueness checks and the
//! active-to-history move are atomic with respect to every other writer.
//! Change events go out after the lock is released.

use crate::snapshot::{NextIds, StoreSnapshot};
use crate::{BackingStore, ChangeEvent, ChangeOp, EntityKind, StoreError, StoreResult};
use async_trait::async_trait;
use monitor_common::{
    now_millis, Branch, BranchId, Catalog, Category, CategoryId, ClearScope, HistoryEntry, MonitorUser,
    NewCategory, NewUser, Technician, TechnicianId, Ticket, TicketId, TicketLedger,
    TimestampMillis, UserId,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;

/// Buffered events per collection before slow subscribers start lagging
pub const FEED_CAPACITY: usize = 64;

#[derive(Debug, Default)]
struct StoreState {
    catalog: Catalog,
    ledger: TicketLedger,
    next: NextIds,
}

/// Process-local store shared by every session in the process
pub struct InMemoryStore {
    state: RwLock<StoreState>,
    feeds: HashMap<EntityKind, broadcast::Sender<ChangeEvent>>,
    available: AtomicBool,
}

impl InMemoryStore {
    /// Empty store
    pub fn new() -> Self {
        Self::with_state(StoreState::default())
    }

    fn with_state(state: StoreState) -> Self {
        let feeds = EntityKind::ALL
            .iter()
            .map(|kind| (*kind, broadcast::channel(FEED_CAPACITY).0))
            .collect();
        Self { state: RwLock::new(state), feeds, available: AtomicBool::new(true) }
    }

    /// Rebuild a store from a snapshot
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        let next = snapshot.next_ids();
        let ledger = TicketLedger::from_parts(snapshot.tickets, snapshot.history);
        Self::with_state(StoreState { catalog: snapshot.catalog, ledger, next })
    }

    /// Copy of everything the store holds
    pub fn snapshot(&self) -> StoreSnapshot {
        let state = self.state.read();
        StoreSnapshot {
            catalog: state.catalog.clone(),
            tickets: state.ledger.active_tickets(),
            history: state.ledger.history().entries().to_vec(),
            next: Some(state.next),
        }
    }

    /// Load a store from a JSON snapshot file
    pub fn load_snapshot(path: impl AsRef<Path>) -> StoreResult<Self> {
        let snapshot = StoreSnapshot::load(path)?;
        tracing::info!(
            tickets = snapshot.tickets.len(),
            history = snapshot.history.len(),
            "Store restored from snapshot"
        );
        Ok(Self::from_snapshot(snapshot))
    }

    /// Write the current contents to a JSON snapshot file
    pub fn save_snapshot(&self, path: impl AsRef<Path>) -> StoreResult<()> {
        self.snapshot().save(path)
    }

    /// Simulate the store going away and coming back
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
        tracing::warn!(available, "Store availability changed");
    }

    /// Number of live subscribers on a feed
    pub fn subscriber_count(&self, kind: EntityKind) -> usize {
        self.feeds.get(&kind).map_or(0, |tx| tx.receiver_count())
    }

    fn ensure_available(&self) -> StoreResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("backing store offline".into()))
        }
    }

    fn publish_archived(&self, closed: &[HistoryEntry], closed_by: &str) {
        if !closed.is_empty() {
            tracing::debug!(count = closed.len(), closed_by, "Tickets archived");
            self.publish(EntityKind::Tickets, ChangeOp::Delete);
            self.publish(EntityKind::History, ChangeOp::Insert);
        }
    }

    fn publish(&self, kind: EntityKind, op: ChangeOp) {
        if let Some(tx) = self.feeds.get(&kind) {
            // No subscribers is fine
            let _ = tx.send(ChangeEvent { kind, op, at: now_millis() });
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn trimmed(name: &str, kind: &str) -> StoreResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(StoreError::Invalid(format!("{kind} name is required")));
    }
    Ok(name.to_string())
}

#[async_trait]
impl BackingStore for InMemoryStore {
    async fn list_branches(&self) -> StoreResult<Vec<Branch>> {
        self.ensure_available()?;
        Ok(self.state.read().catalog.branches.clone())
    }

    async fn insert_branch(&self, name: &str) -> StoreResult<Branch> {
        self.ensure_available()?;
        let name = trimmed(name, "branch")?;
        let branch = {
            let mut state = self.state.write();
            let branch = Branch { id: BranchId::new(state.next.bump_branch()), name };
            state.catalog.branches.push(branch.clone());
            branch
        };
        self.publish(EntityKind::Branches, ChangeOp::Insert);
        Ok(branch)
    }

    async fn delete_branch(&self, id: BranchId) -> StoreResult<()> {
        self.ensure_available()?;
        {
            let mut state = self.state.write();
            let before = state.catalog.branches.len();
            state.catalog.branches.retain(|b| b.id != id);
            if state.catalog.branches.len() == before {
                return Err(StoreError::NotFound(format!("branch {id}")));
            }
        }
        self.publish(EntityKind::Branches, ChangeOp::Delete);
        Ok(())
    }

    async fn list_technicians(&self) -> StoreResult<Vec<Technician>> {
        self.ensure_available()?;
        Ok(self.state.read().catalog.technicians.clone())
    }

    async fn insert_technician(&self, name: &str) -> StoreResult<Technician> {
        self.ensure_available()?;
        let name = trimmed(name, "technician")?;
        let tech = {
            let mut state = self.state.write();
            let tech = Technician { id: TechnicianId::new(state.next.bump_technician()), name };
            state.catalog.technicians.push(tech.clone());
            tech
        };
        self.publish(EntityKind::Technicians, ChangeOp::Insert);
        Ok(tech)
    }

    async fn delete_technician(&self, id: TechnicianId) -> StoreResult<()> {
        self.ensure_available()?;
        {
            let mut state = self.state.write();
            let before = state.catalog.technicians.len();
            state.catalog.technicians.retain(|t| t.id != id);
            if state.catalog.technicians.len() == before {
                return Err(StoreError::NotFound(format!("technician {id}")));
            }
        }
        self.publish(EntityKind::Technicians, ChangeOp::Delete);
        Ok(())
    }

    async fn list_categories(&self) -> StoreResult<Vec<Category>> {
        self.ensure_available()?;
        Ok(self.state.read().catalog.categories.clone())
    }

    async fn insert_category(&self, category: NewCategory) -> StoreResult<Category> {
        self.ensure_available()?;
        trimmed(&category.name, "category")?;
        let category = {
            let mut state = self.state.write();
            let category = category.with_id(CategoryId::new(state.next.bump_category()));
            state.catalog.categories.push(category.clone());
            category
        };
        self.publish(EntityKind::Categories, ChangeOp::Insert);
        Ok(category)
    }

    async fn delete_category(&self, id: CategoryId) -> StoreResult<()> {
        self.ensure_available()?;
        {
            let mut state = self.state.write();
            let before = state.catalog.categories.len();
            state.catalog.categories.retain(|c| c.id != id);
            if state.catalog.categories.len() == before {
                return Err(StoreError::NotFound(format!("category {id}")));
            }
        }
        self.publish(EntityKind::Categories, ChangeOp::Delete);
        Ok(())
    }

    async fn list_users(&self) -> StoreResult<Vec<MonitorUser>> {
        self.ensure_available()?;
        Ok(self.state.read().catalog.users.clone())
    }

    async fn insert_user(&self, user: NewUser) -> StoreResult<MonitorUser> {
        self.ensure_available()?;
        let name = trimmed(&user.name, "user")?;
        let user = {
            let mut state = self.state.write();
            if state.catalog.user_named(&name).is_some() {
                return Err(StoreError::DuplicateName(name));
            }
            let user = user.with_id(UserId::new(state.next.bump_user()));
            state.catalog.users.push(user.clone());
            user
        };
        self.publish(EntityKind::Users, ChangeOp::Insert);
        Ok(user)
    }

    async fn update_user(&self, original_name: &str, user: NewUser) -> StoreResult<MonitorUser> {
        self.ensure_available()?;
        let name = trimmed(&user.name, "user")?;
        let updated = {
            let mut state = self.state.write();
            let users = &mut state.catalog.users;
            if name != original_name && users.iter().any(|u| u.name == name) {
                return Err(StoreError::DuplicateName(name));
            }
            let slot = users
                .iter_mut()
                .find(|u| u.name == original_name)
                .ok_or_else(|| StoreError::NotFound(format!("user {original_name}")))?;
            *slot = user.with_id(slot.id);
            slot.clone()
        };
        self.publish(EntityKind::Users, ChangeOp::Update);
        Ok(updated)
    }

    async fn delete_user(&self, name: &str) -> StoreResult<()> {
        self.ensure_available()?;
        {
            let mut state = self.state.write();
            let before = state.catalog.users.len();
            state.catalog.users.retain(|u| u.name != name);
            if state.catalog.users.len() == before {
                return Err(StoreError::NotFound(format!("user {name}")));
            }
        }
        self.publish(EntityKind::Users, ChangeOp::Delete);
        Ok(())
    }

    async fn list_tickets(&self) -> StoreResult<Vec<Ticket>> {
        self.ensure_available()?;
        Ok(self.state.read().ledger.active_tickets())
    }

    async fn insert_ticket(&self, ticket: Ticket) -> StoreResult<Ticket> {
        self.ensure_available()?;
        let id = ticket.id;
        self.state
            .write()
            .ledger
            .insert(ticket.clone())
            .map_err(|_| StoreError::DuplicateTicket(id))?;
        tracing::debug!(ticket_id = %id, branch_id = %ticket.branch_id, "Ticket stored");
        self.publish(EntityKind::Tickets, ChangeOp::Insert);
        Ok(ticket)
    }

    async fn archive_tickets(
        &self,
        ids: &[TicketId],
        closed_by: &str,
        closed_at: TimestampMillis,
    ) -> StoreResult<Vec<HistoryEntry>> {
        self.ensure_available()?;
        let closed = self.state.write().ledger.archive(ids, closed_by, closed_at);
        self.publish_archived(&closed, closed_by);
        Ok(closed)
    }

    async fn archive_scope(
        &self,
        scope: ClearScope,
        closed_by: &str,
        closed_at: TimestampMillis,
    ) -> StoreResult<Vec<HistoryEntry>> {
        self.ensure_available()?;
        let closed = {
            let mut state = self.state.write();
            let ids = state.ledger.ids_in_scope(scope);
            state.ledger.archive(&ids, closed_by, closed_at)
        };
        self.publish_archived(&closed, closed_by);
        Ok(closed)
    }

    async fn list_history(&self, limit: usize) -> StoreResult<Vec<HistoryEntry>> {
        self.ensure_available()?;
        Ok(self.state.read().ledger.history().recent(limit))
    }

    fn subscribe(&self, kind: EntityKind) -> broadcast::Receiver<ChangeEvent> {
        match self.feeds.get(&kind) {
            Some(tx) => tx.subscribe(),
            // Every kind gets a feed in `with_state`; this arm only keeps the
            // signature total.
            None => broadcast::channel(1).1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use monitor_common::{CategoryId, Role, TicketDraft};
    use std::sync::Arc;
    use tokio_test::{assert_err, assert_ok};

    fn ticket(id: u64, branch: u64) -> Ticket {
        let draft = TicketDraft::new(TicketId::new(id), None, CategoryId::new(1));
        Ticket::open(draft, "caja", BranchId::new(branch), 1_000).unwrap()
    }

    #[tokio::test]
    async fn test_ids_are_assigned_in_order() {
        let store = InMemoryStore::new();
        let a = assert_ok!(store.insert_branch("Huérfanos").await);
        let b = assert_ok!(store.insert_branch("Mojitas").await);
        assert_eq!(a.id, BranchId::new(1));
        assert_eq!(b.id, BranchId::new(2));

        assert_ok!(store.delete_branch(b.id).await);
        let c = assert_ok!(store.insert_branch("Apumanque").await);
        assert_eq!(c.id, BranchId::new(3));
    }

    #[tokio::test]
    async fn test_duplicate_ticket_rejected() {
        let store = InMemoryStore::new();
        assert_ok!(store.insert_ticket(ticket(42, 1)).await);
        let err = assert_err!(store.insert_ticket(ticket(42, 2)).await);
        assert_eq!(err, StoreError::DuplicateTicket(TicketId::new(42)));
        assert_eq!(store.list_tickets().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_inserts_one_winner() {
        let store = Arc::new(InMemoryStore::new());
        let mut handles = Vec::new();
        for branch in 1..=8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move { store.insert_ticket(ticket(7, branch)).await }));
        }
        let mut winners = 0;
        for h in handles {
            if h.await.unwrap().is_ok() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_archive_moves_atomically() {
        let store = InMemoryStore::new();
        for id in 1..=3 {
            store.insert_ticket(ticket(id, 1)).await.unwrap();
        }
        let closed = store
            .archive_tickets(&[TicketId::new(1), TicketId::new(3), TicketId::new(99)], "admin", 5_000)
            .await
            .unwrap();
        assert_eq!(closed.len(), 2);
        assert_eq!(store.list_tickets().await.unwrap().len(), 1);

        let history = store.list_history(50).await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|h| h.closed_by == "admin" && h.closed_at == 5_000));
    }

    #[tokio::test]
    async fn test_archive_scope_uses_store_state() {
        let store = InMemoryStore::new();
        for (id, branch) in [(1, 1), (2, 2), (3, 2), (4, 3)] {
            store.insert_ticket(ticket(id, branch)).await.unwrap();
        }

        let closed = assert_ok!(store.archive_scope(ClearScope::Branch(BranchId::new(2)), "admin", 7_000).await);
        let mut ids: Vec<u64> = closed.iter().map(|e| e.ticket_id.value()).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![2, 3]);
        assert_eq!(store.list_tickets().await.unwrap().len(), 2);

        let closed = assert_ok!(store.archive_scope(ClearScope::All, "admin", 8_000).await);
        assert_eq!(closed.len(), 2);
        assert!(store.list_tickets().await.unwrap().is_empty());
        assert_eq!(store.list_history(50).await.unwrap().len(), 4);

        let closed = assert_ok!(store.archive_scope(ClearScope::All, "admin", 9_000).await);
        assert!(closed.is_empty());
    }

    #[tokio::test]
    async fn test_change_feed_per_kind() {
        let store = InMemoryStore::new();
        let mut tickets = store.subscribe(EntityKind::Tickets);
        let mut history = store.subscribe(EntityKind::History);
        let mut branches = store.subscribe(EntityKind::Branches);

        store.insert_ticket(ticket(1, 1)).await.unwrap();
        let ev = tickets.recv().await.unwrap();
        assert_eq!((ev.kind, ev.op), (EntityKind::Tickets, ChangeOp::Insert));

        store.archive_tickets(&[TicketId::new(1)], "ana", 2_000).await.unwrap();
        assert_eq!(tickets.recv().await.unwrap().op, ChangeOp::Delete);
        assert_eq!(history.recv().await.unwrap().op, ChangeOp::Insert);

        assert!(branches.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_reads_and_writes() {
        let store = InMemoryStore::new();
        store.set_available(false);
        assert!(matches!(store.list_tickets().await, Err(StoreError::Unavailable(_))));
        assert!(matches!(store.insert_ticket(ticket(1, 1)).await, Err(StoreError::Unavailable(_))));

        store.set_available(true);
        assert_ok!(store.insert_ticket(ticket(1, 1)).await);
    }

    #[tokio::test]
    async fn test_user_names_unique() {
        let store = InMemoryStore::new();
        let user = |name: &str| NewUser { name: name.into(), role: Role::Operator, branch_id: Some(BranchId::new(1)) };

        assert_ok!(store.insert_user(user("caja1")).await);
        assert_ok!(store.insert_user(user("caja2")).await);
        assert_eq!(
            assert_err!(store.insert_user(user("caja1")).await),
            StoreError::DuplicateName("caja1".into())
        );
        assert_err!(store.update_user("caja2", user("caja1")).await);

        let renamed = assert_ok!(store.update_user("caja2", user("caja3")).await);
        assert_eq!(renamed.id, UserId::new(2));
        assert_ok!(store.delete_user("caja3").await);
        assert_err!(store.delete_user("caja3").await);
    }

    #[tokio::test]
    async fn test_snapshot_restores_counters() {
        let store = InMemoryStore::new();
        store.insert_branch("Huérfanos").await.unwrap();
        store.insert_ticket(ticket(5, 1)).await.unwrap();
        store.archive_tickets(&[TicketId::new(5)], "admin", 10).await.unwrap();

        let restored = InMemoryStore::from_snapshot(store.snapshot());
        assert_eq!(restored.list_history(10).await.unwrap().len(), 1);
        let next = restored.insert_branch("Mojitas").await.unwrap();
        assert_eq!(next.id, BranchId::new(2));
    }
}
