//! Viewer session
//!
//! One connected monitor screen. Holds the replica, runs the sync and alert
//! timers, and is the only write path to the store for its viewer.
//!
//! Writes go straight to the store. When the store accepts one, the session
//! applies it to its own replica right away; other viewers pick it up on their
//! next push notification or poll.

use crate::alert::{spawn_alert_task, AlertSink, LogAlertSink};
use crate::clock::{Clock, SystemClock};
use crate::config::SessionConfig;
use crate::notice::Notice;
use crate::replica::Replica;
use crate::sync::{spawn_poll_task, spawn_push_task};
use arc_swap::ArcSwap;
use monitor_common::{
    require_name, AlertBurst, AuditQuery, Board, Branch, BranchFilter, BranchId, Catalog, Category,
    CategoryId, ClearScope, EscalationNotifier, HistoryEntry, MonitorError, MonitorResult,
    MonitorUser, NewCategory, NewUser, RankedTicket, Technician, TechnicianId, Ticket,
    TicketDraft, TicketId, TimestampMillis, Viewer, VisibilityPolicy,
};
use monitor_store::{BackingStore, EntityKind, StoreError};
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

const NOTICE_CAPACITY: usize = 32;

/// State shared between the session handle and its background tasks
pub(crate) struct SessionInner {
    pub(crate) id: Uuid,
    pub(crate) viewer: Viewer,
    pub(crate) config: SessionConfig,
    pub(crate) store: Arc<dyn BackingStore>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) replica: ArcSwap<Replica>,
    pub(crate) filter: RwLock<BranchFilter>,
    pub(crate) notifier: Mutex<EscalationNotifier>,
    pub(crate) sink: Arc<dyn AlertSink>,
    notices: broadcast::Sender<Notice>,
    /// Set by a failed store read or write, cleared by the next full refresh
    pub(crate) degraded: AtomicBool,
    /// Ticket ids this session is currently writing
    pending: Mutex<HashSet<TicketId>>,
}

impl SessionInner {
    pub(crate) fn notify(&self, notice: Notice) {
        // Nobody listening is fine
        let _ = self.notices.send(notice);
    }

    /// Visible tickets in display order at `now`
    pub(crate) fn visible(&self, now: TimestampMillis) -> Vec<RankedTicket> {
        let replica = self.replica.load();
        let filter = *self.filter.read();
        VisibilityPolicy::new(&self.viewer, &replica.catalog, filter).apply(replica.ledger.active(), now)
    }

    /// Map a failed store write onto the monitor error taxonomy
    fn write_failed(&self, what: &str, err: StoreError) -> MonitorError {
        match err {
            StoreError::Unavailable(_) | StoreError::Snapshot(_) => self.sync_failed(what, err),
            other => {
                let err = MonitorError::from(other);
                tracing::info!(session = %self.id, error = %err, "{what} rejected by store");
                self.notify((&err).into());
                err
            }
        }
    }
}

/// Marks a ticket id as being written by this session until dropped
struct PendingCreate<'a> {
    pending: &'a Mutex<HashSet<TicketId>>,
    id: TicketId,
}

impl<'a> PendingCreate<'a> {
    fn claim(pending: &'a Mutex<HashSet<TicketId>>, id: TicketId) -> Option<Self> {
        pending.lock().insert(id).then_some(Self { pending, id })
    }
}

impl Drop for PendingCreate<'_> {
    fn drop(&mut self) {
        self.pending.lock().remove(&self.id);
    }
}

/// Builder for [`ViewerSession`]
pub struct SessionBuilder {
    viewer: Viewer,
    store: Arc<dyn BackingStore>,
    config: SessionConfig,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn AlertSink>,
}

impl SessionBuilder {
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn alert_sink(mut self, sink: Arc<dyn AlertSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Load the replica and start the background tasks.
    ///
    /// A failed first load is not fatal: the session starts empty and the
    /// poll timer keeps retrying.
    pub async fn start(self) -> ViewerSession {
        let SessionBuilder { viewer, store, config, clock, sink } = self;
        let id = Uuid::new_v4();
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        let notifier = EscalationNotifier::for_viewer(&viewer, config.alert_duration());

        let inner = Arc::new(SessionInner {
            id,
            viewer,
            config,
            store,
            clock,
            replica: ArcSwap::from_pointee(Replica::default()),
            filter: RwLock::new(BranchFilter::All),
            notifier: Mutex::new(notifier),
            sink,
            notices,
            degraded: AtomicBool::new(false),
            pending: Mutex::new(HashSet::new()),
        });

        // Subscribe before the first load so no change slips in between
        let feeds: Vec<_> = if inner.config.push_enabled {
            EntityKind::ALL.iter().map(|kind| (*kind, inner.store.subscribe(*kind))).collect()
        } else {
            Vec::new()
        };

        if inner.refresh_all().await.is_err() {
            tracing::warn!(session = %id, "Initial load failed, starting with an empty replica");
        }

        let (shutdown, shutdown_rx) = watch::channel(false);
        let mut tasks: Vec<JoinHandle<()>> = feeds
            .into_iter()
            .map(|(kind, feed)| spawn_push_task(inner.clone(), kind, feed, shutdown_rx.clone()))
            .collect();
        tasks.push(spawn_poll_task(inner.clone(), shutdown_rx.clone()));
        if inner.notifier.lock().is_enabled() {
            tasks.push(spawn_alert_task(inner.clone(), shutdown_rx));
        }

        tracing::info!(
            session = %id,
            viewer = %inner.viewer.name,
            role = %inner.viewer.role,
            push = inner.config.push_enabled,
            "Viewer session started"
        );

        ViewerSession { inner, shutdown, tasks: Mutex::new(tasks) }
    }
}

/// One viewer's live monitor.
///
/// Dropping the session stops its timers too; [`ViewerSession::shutdown`]
/// additionally waits for them to finish.
pub struct ViewerSession {
    inner: Arc<SessionInner>,
    shutdown: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ViewerSession {
    /// Session for `viewer` with default config, system clock and log alerts
    pub fn builder(viewer: Viewer, store: Arc<dyn BackingStore>) -> SessionBuilder {
        SessionBuilder {
            viewer,
            store,
            config: SessionConfig::default(),
            clock: Arc::new(SystemClock),
            sink: Arc::new(LogAlertSink),
        }
    }

    /// Stop timers and unsubscribe. In-flight writes are left to complete.
    pub async fn shutdown(&self) {
        let _ = self.shutdown.send(true);
        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            if let Err(e) = task.await {
                tracing::warn!(session = %self.inner.id, error = %e, "Session task ended abnormally");
            }
        }
        tracing::info!(session = %self.inner.id, "Viewer session stopped");
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn viewer(&self) -> &Viewer {
        &self.inner.viewer
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Current replica
    pub fn replica(&self) -> Arc<Replica> {
        self.inner.replica.load_full()
    }

    /// Transient notices (sync failures, conflicts)
    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.inner.notices.subscribe()
    }

    /// Re-read everything now instead of waiting for the poll timer
    pub async fn refresh(&self) -> MonitorResult<()> {
        self.inner.refresh_all().await
    }

    pub fn branch_filter(&self) -> BranchFilter {
        *self.inner.filter.read()
    }

    /// Narrow an admin's view to one branch, or widen it back to all
    pub fn set_branch_filter(&self, filter: BranchFilter) -> MonitorResult<()> {
        if !self.inner.viewer.is_admin() {
            return Err(MonitorError::PermissionDenied(format!(
                "{} cannot pick a branch filter",
                self.inner.viewer.name
            )));
        }
        *self.inner.filter.write() = filter;
        tracing::debug!(session = %self.inner.id, ?filter, "Branch filter changed");
        Ok(())
    }

    /// Visible tickets with their urgency, in display order
    pub fn visible_at(&self, now: TimestampMillis) -> Vec<RankedTicket> {
        self.inner.visible(now)
    }

    /// Board as of now
    pub fn board(&self) -> Board {
        self.board_at(self.inner.clock.now())
    }

    pub fn board_at(&self, now: TimestampMillis) -> Board {
        let replica = self.inner.replica.load();
        Board::build(
            &self.inner.viewer,
            &replica.catalog,
            self.branch_filter(),
            replica.ledger.active(),
            now,
            self.inner.config.compact_threshold,
        )
    }

    /// Run the escalation check immediately
    pub fn check_alerts(&self) -> Option<AlertBurst> {
        self.inner.check_alerts()
    }

    /// Closed tickets from the replica, newest first. Admin only.
    pub fn audit(&self, mut query: AuditQuery) -> MonitorResult<Vec<HistoryEntry>> {
        self.require_admin("view the audit trail")?;
        if query.limit.is_none() {
            query.limit = Some(self.inner.config.history_limit);
        }
        Ok(self.inner.replica.load().ledger.history().search(&query))
    }

    // ---- tickets ----

    fn creation_branch(&self) -> MonitorResult<BranchId> {
        let viewer = &self.inner.viewer;
        if viewer.is_admin() {
            if let Some(branch) = self.branch_filter().branch() {
                return Ok(branch);
            }
        }
        viewer
            .branch_id
            .ok_or_else(|| MonitorError::Validation("select a branch before creating tickets".into()))
    }

    /// Open a ticket in the viewer's branch
    pub async fn create_ticket(&self, draft: TicketDraft) -> MonitorResult<Ticket> {
        let inner = &self.inner;
        let branch_id = self.creation_branch()?;
        let ticket = Ticket::open(draft, &inner.viewer.name, branch_id, inner.clock.now())?;
        let id = ticket.id;

        {
            let replica = inner.replica.load();
            if let Err(err) = replica.ledger.ensure_unique(id, &replica.catalog) {
                inner.notify((&err).into());
                return Err(err);
            }
        }

        let Some(_marker) = PendingCreate::claim(&inner.pending, id) else {
            let err = MonitorError::Conflict {
                ticket_id: id,
                branch: self.replica().catalog.branch_label(branch_id).to_string(),
            };
            inner.notify((&err).into());
            return Err(err);
        };

        match inner.store.insert_ticket(ticket).await {
            Ok(stored) => {
                inner.replica.rcu(|r| {
                    r.with_ledger(|ledger| {
                        // A push refresh may already have brought it in
                        let _ = ledger.insert(stored.clone());
                    })
                });
                tracing::info!(session = %inner.id, ticket_id = %id, %branch_id, "Ticket created");
                Ok(stored)
            }
            Err(StoreError::DuplicateTicket(_)) => Err(self.conflict_from_store(id).await),
            Err(e) => Err(inner.write_failed("create ticket", e)),
        }
    }

    /// The store saw a duplicate our replica missed: re-read tickets so the
    /// conflict can name the branch
    async fn conflict_from_store(&self, id: TicketId) -> MonitorError {
        let _ = self.inner.refresh_kind(EntityKind::Tickets).await;
        let err = {
            let replica = self.inner.replica.load();
            match replica.ledger.ensure_unique(id, &replica.catalog) {
                Err(err) => err,
                Ok(()) => StoreError::DuplicateTicket(id).into(),
            }
        };
        self.inner.notify((&err).into());
        err
    }

    /// Close one ticket
    pub async fn close_ticket(&self, id: TicketId) -> MonitorResult<HistoryEntry> {
        let inner = &self.inner;
        inner.replica.load().ledger.authorize_close(id, &inner.viewer)?;

        let closed = inner
            .store
            .archive_tickets(&[id], &inner.viewer.name, inner.clock.now())
            .await
            .map_err(|e| inner.write_failed("close ticket", e))?;

        let Some(entry) = closed.into_iter().next() else {
            // Someone else closed it first
            let _ = inner.refresh_kind(EntityKind::Tickets).await;
            return Err(MonitorError::NotFound(id));
        };

        inner.replica.rcu(|r| r.with_ledger(|ledger| ledger.record_closed(std::slice::from_ref(&entry))));
        tracing::info!(session = %inner.id, ticket_id = %id, closed_by = %entry.closed_by, "Ticket closed");
        Ok(entry)
    }

    /// Close every active ticket in the viewer's clear scope. Admins clear
    /// what their branch filter shows.
    ///
    /// The store picks the tickets, so ones this replica has not seen yet
    /// are closed too.
    pub async fn clear_tickets(&self) -> MonitorResult<usize> {
        let inner = &self.inner;
        let requested = if inner.viewer.is_admin() { self.branch_filter().branch() } else { None };
        let scope = ClearScope::resolve(&inner.viewer, requested)?;

        let closed = inner
            .store
            .archive_scope(scope, &inner.viewer.name, inner.clock.now())
            .await
            .map_err(|e| inner.write_failed("clear tickets", e))?;

        if !closed.is_empty() {
            inner.replica.rcu(|r| r.with_ledger(|ledger| ledger.record_closed(&closed)));
        }
        tracing::info!(session = %inner.id, ?scope, count = closed.len(), "Tickets cleared");
        Ok(closed.len())
    }

    // ---- catalog administration ----

    fn require_admin(&self, action: &str) -> MonitorResult<()> {
        if self.inner.viewer.is_admin() {
            Ok(())
        } else {
            Err(MonitorError::PermissionDenied(format!(
                "{} cannot {action}",
                self.inner.viewer.name
            )))
        }
    }

    fn edit_catalog(&self, edit: impl Fn(&mut Catalog)) {
        self.inner.replica.rcu(|r| r.with_catalog(&edit));
    }

    pub async fn add_branch(&self, name: &str) -> MonitorResult<Branch> {
        self.require_admin("add branches")?;
        require_name("branch", name)?;
        let branch = self
            .inner
            .store
            .insert_branch(name)
            .await
            .map_err(|e| self.inner.write_failed("add branch", e))?;
        self.edit_catalog(|c| c.branches.push(branch.clone()));
        Ok(branch)
    }

    /// Tickets of the branch stay active and show an unknown branch label
    pub async fn delete_branch(&self, id: BranchId) -> MonitorResult<()> {
        self.require_admin("delete branches")?;
        self.inner
            .store
            .delete_branch(id)
            .await
            .map_err(|e| self.inner.write_failed("delete branch", e))?;
        self.edit_catalog(|c| c.branches.retain(|b| b.id != id));
        Ok(())
    }

    pub async fn add_technician(&self, name: &str) -> MonitorResult<Technician> {
        self.require_admin("add technicians")?;
        require_name("technician", name)?;
        let tech = self
            .inner
            .store
            .insert_technician(name)
            .await
            .map_err(|e| self.inner.write_failed("add technician", e))?;
        self.edit_catalog(|c| c.technicians.push(tech.clone()));
        Ok(tech)
    }

    pub async fn delete_technician(&self, id: TechnicianId) -> MonitorResult<()> {
        self.require_admin("delete technicians")?;
        self.inner
            .store
            .delete_technician(id)
            .await
            .map_err(|e| self.inner.write_failed("delete technician", e))?;
        self.edit_catalog(|c| c.technicians.retain(|t| t.id != id));
        Ok(())
    }

    pub async fn add_category(&self, category: NewCategory) -> MonitorResult<Category> {
        self.require_admin("add categories")?;
        category.validate()?;
        let category = self
            .inner
            .store
            .insert_category(category)
            .await
            .map_err(|e| self.inner.write_failed("add category", e))?;
        self.edit_catalog(|c| c.categories.push(category.clone()));
        Ok(category)
    }

    /// Tickets of the category fall back to default thresholds
    pub async fn delete_category(&self, id: CategoryId) -> MonitorResult<()> {
        self.require_admin("delete categories")?;
        self.inner
            .store
            .delete_category(id)
            .await
            .map_err(|e| self.inner.write_failed("delete category", e))?;
        self.edit_catalog(|c| c.categories.retain(|x| x.id != id));
        Ok(())
    }

    // ---- user roster ----

    fn ensure_name_free(&self, name: &str, except: Option<&str>) -> MonitorResult<()> {
        let name = name.trim();
        let taken = self
            .replica()
            .catalog
            .users
            .iter()
            .any(|u| u.name == name && Some(u.name.as_str()) != except);
        if taken {
            return Err(MonitorError::Validation(format!("user {name} already exists")));
        }
        Ok(())
    }

    pub async fn add_user(&self, user: NewUser) -> MonitorResult<MonitorUser> {
        self.require_admin("add users")?;
        user.validate()?;
        self.ensure_name_free(&user.name, None)?;
        let user = self
            .inner
            .store
            .insert_user(user)
            .await
            .map_err(|e| self.inner.write_failed("add user", e))?;
        self.edit_catalog(|c| c.users.push(user.clone()));
        tracing::info!(session = %self.inner.id, user = %user.name, role = %user.role, "User added");
        Ok(user)
    }

    /// Replace the user currently named `original_name`
    pub async fn update_user(&self, original_name: &str, user: NewUser) -> MonitorResult<MonitorUser> {
        self.require_admin("edit users")?;
        user.validate()?;
        self.ensure_name_free(&user.name, Some(original_name))?;
        let updated = self
            .inner
            .store
            .update_user(original_name, user)
            .await
            .map_err(|e| self.inner.write_failed("update user", e))?;
        self.edit_catalog(|c| {
            if let Some(slot) = c.users.iter_mut().find(|u| u.id == updated.id) {
                *slot = updated.clone();
            }
        });
        Ok(updated)
    }

    pub async fn delete_user(&self, name: &str) -> MonitorResult<()> {
        self.require_admin("delete users")?;
        if name == self.inner.viewer.name {
            return Err(MonitorError::PermissionDenied("cannot delete your own user".into()));
        }
        self.inner
            .store
            .delete_user(name)
            .await
            .map_err(|e| self.inner.write_failed("delete user", e))?;
        self.edit_catalog(|c| c.users.retain(|u| u.name != name));
        Ok(())
    }
}
