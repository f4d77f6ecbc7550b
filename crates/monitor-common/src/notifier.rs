//! Escalation Notifier state
//!
//! Remembers which tickets already triggered the audible alert for one
//! viewer. Lives in memory only; a fresh session alerts again for tickets
//! that are still high.

use crate::ticket::TicketId;
use crate::viewer::Viewer;
use crate::visibility::RankedTicket;
use std::collections::HashSet;
use std::time::Duration;

/// One audible alert covering every newly escalated ticket
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AlertBurst {
    pub ticket_ids: Vec<TicketId>,
    /// How long the sound plays
    pub duration: Duration,
}

/// Alerted-set for one viewer
#[derive(Debug, Clone)]
pub struct EscalationNotifier {
    enabled: bool,
    duration: Duration,
    alerted: HashSet<TicketId>,
}

impl EscalationNotifier {
    /// Notifier for `viewer`; silent unless the viewer is a technician
    pub fn for_viewer(viewer: &Viewer, duration: Duration) -> Self {
        Self { enabled: viewer.is_technician(), duration, alerted: HashSet::new() }
    }

    /// Whether this viewer gets alerts at all
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Tickets already alerted for
    pub fn alerted_count(&self) -> usize {
        self.alerted.len()
    }

    /// Look at the visible tickets and return a burst for those that reached
    /// High or above for the first time.
    pub fn check(&mut self, visible: &[RankedTicket]) -> Option<AlertBurst> {
        if !self.enabled {
            return None;
        }

        let fresh: Vec<TicketId> = visible
            .iter()
            .filter(|r| r.level.is_alarming() && !self.alerted.contains(&r.ticket.id))
            .map(|r| r.ticket.id)
            .collect();

        if fresh.is_empty() {
            return None;
        }

        self.alerted.extend(fresh.iter().copied());
        Some(AlertBurst { ticket_ids: fresh, duration: self.duration })
    }
}
