//! Synchronization Layer
//!
//! Two independent repeating tasks keep the replica fresh:
//!
//! - push: one task per collection, re-reading that collection whenever the
//!   store announces a change
//! - poll: a full re-read on a fixed interval, covering missed notifications
//!
//! Both replace data wholesale, so it does not matter which one lands first.

use crate::notice::{Notice, NoticeLevel};
use crate::replica::{Fetched, Replica};
use crate::session::SessionInner;
use monitor_common::{Catalog, MonitorError, MonitorResult};
use monitor_store::{ChangeEvent, EntityKind, StoreError};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

impl SessionInner {
    /// Re-read every collection. On failure the previous replica stays.
    pub(crate) async fn refresh_all(&self) -> MonitorResult<()> {
        let store = &self.store;
        let fetched = tokio::try_join!(
            store.list_branches(),
            store.list_technicians(),
            store.list_categories(),
            store.list_users(),
            store.list_tickets(),
            store.list_history(self.config.history_limit),
        );

        let (branches, technicians, categories, users, tickets, history) =
            fetched.map_err(|e| self.sync_failed("full refresh", e))?;
        let catalog = Catalog { branches, technicians, categories, users };
        let replica = Replica::loaded(catalog, tickets, history, self.clock.now());
        tracing::debug!(
            session = %self.id,
            tickets = replica.ledger.len(),
            history = replica.ledger.history().len(),
            "Replica refreshed"
        );
        self.replica.store(Arc::new(replica));

        if self.degraded.swap(false, Ordering::SeqCst) {
            tracing::info!(session = %self.id, "Store reachable again");
            self.notify(Notice { level: NoticeLevel::Info, message: "store reachable again".into() });
        }
        Ok(())
    }

    /// Re-read one collection
    pub(crate) async fn refresh_kind(&self, kind: EntityKind) -> MonitorResult<()> {
        let store = &self.store;
        let result = match kind {
            EntityKind::Branches => store.list_branches().await.map(Fetched::Branches),
            EntityKind::Technicians => store.list_technicians().await.map(Fetched::Technicians),
            EntityKind::Categories => store.list_categories().await.map(Fetched::Categories),
            EntityKind::Users => store.list_users().await.map(Fetched::Users),
            EntityKind::Tickets => store.list_tickets().await.map(Fetched::Tickets),
            EntityKind::History => {
                store.list_history(self.config.history_limit).await.map(Fetched::History)
            }
        };
        let fetched = result.map_err(|e| self.sync_failed(&format!("refresh {kind}"), e))?;

        tracing::trace!(session = %self.id, kind = %fetched.kind(), rows = fetched.len(), "Collection refreshed");
        self.replica.rcu(|current| current.with(fetched.clone()));
        Ok(())
    }

    /// Log and announce a store failure
    pub(crate) fn sync_failed(&self, what: &str, err: StoreError) -> MonitorError {
        let err = MonitorError::Sync(format!("{what}: {err}"));
        self.degraded.store(true, Ordering::SeqCst);
        tracing::warn!(session = %self.id, error = %err, "Store sync failed, keeping last replica");
        self.notify((&err).into());
        err
    }
}

/// Follow one collection's change feed until shutdown
pub(crate) fn spawn_push_task(
    inner: Arc<SessionInner>,
    kind: EntityKind,
    mut feed: broadcast::Receiver<ChangeEvent>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                event = feed.recv() => match event {
                    Ok(event) => {
                        tracing::trace!(session = %inner.id, kind = %event.kind, op = ?event.op, "Change notification");
                    }
                    // Events were dropped; a re-read covers them all
                    Err(RecvError::Lagged(missed)) => {
                        tracing::debug!(session = %inner.id, %kind, missed, "Change feed lagged");
                    }
                    Err(RecvError::Closed) => {
                        tracing::warn!(session = %inner.id, %kind, "Change feed closed, polling only");
                        break;
                    }
                },
            }
            // Failures are already logged and announced
            let _ = inner.refresh_kind(kind).await;
        }
        tracing::debug!(session = %inner.id, %kind, "Unsubscribed from change feed");
    })
}

/// Full refresh on a fixed interval until shutdown
pub(crate) fn spawn_poll_task(
    inner: Arc<SessionInner>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(inner.config.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires at once and the session has just loaded
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {
                    let _ = inner.refresh_all().await;
                }
            }
        }
        tracing::debug!(session = %inner.id, "Poll timer stopped");
    })
}
