//! Urgency Engine
//!
//! Level is derived on every tick from the ticket's start time and the wall
//! clock. It is never stored on the ticket.

use crate::catalog::Category;
use crate::ticket::Ticket;
use crate::{TimestampMillis, MILLIS_PER_MINUTE};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Urgency level, ordered from calm to critical
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrgencyLevel {
    Normal,
    Elevated,
    High,
    Critical,
}

impl UrgencyLevel {
    /// Whether the audible alert should fire at this level
    pub fn is_alarming(&self) -> bool {
        *self >= Self::High
    }
}

impl fmt::Display for UrgencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Normal => "normal",
            Self::Elevated => "elevated",
            Self::High => "high",
            Self::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// Breakpoints in minutes. Expected increasing, not enforced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Thresholds {
    pub orange_minutes: u32,
    pub red_minutes: u32,
    pub critical_minutes: u32,
}

impl Thresholds {
    /// Used when a ticket's category cannot be resolved
    pub const FALLBACK: Thresholds = Thresholds {
        orange_minutes: 2,
        red_minutes: 5,
        critical_minutes: 10,
    };

    /// Level after `elapsed_ms` milliseconds
    pub fn level_after(&self, elapsed_ms: i64) -> UrgencyLevel {
        let reached = |minutes: u32| elapsed_ms >= i64::from(minutes) * MILLIS_PER_MINUTE;

        if reached(self.critical_minutes) {
            UrgencyLevel::Critical
        } else if reached(self.red_minutes) {
            UrgencyLevel::High
        } else if reached(self.orange_minutes) {
            UrgencyLevel::Elevated
        } else {
            UrgencyLevel::Normal
        }
    }
}

/// Urgency of `ticket` at `now`, falling back to default breakpoints when its
/// category is unknown.
pub fn urgency_level(
    ticket: &Ticket,
    category: Option<&Category>,
    now: TimestampMillis,
) -> UrgencyLevel {
    let thresholds = category.map(Category::thresholds).unwrap_or(Thresholds::FALLBACK);
    thresholds.level_after(now.saturating_sub(ticket.started_at))
}

/// Elapsed time as `MM:SS`; minutes keep growing past 99
pub fn elapsed_label(started_at: TimestampMillis, now: TimestampMillis) -> String {
    let secs = (now.saturating_sub(started_at) / 1000).max(0);
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{BranchId, CategoryId};
    use crate::ticket::{TicketDraft, TicketId};
    use proptest::prelude::*;

    const T0: TimestampMillis = 1_700_000_000_000;

    fn general() -> Category {
        Category {
            id: CategoryId::new(1),
            name: "General".into(),
            orange_minutes: 2,
            red_minutes: 5,
            critical_minutes: 10,
        }
    }

    fn ticket_at(start: TimestampMillis, category: CategoryId) -> Ticket {
        let draft = TicketDraft::new(TicketId::new(1), None, category);
        Ticket::open(draft, "caja", BranchId::new(1), start).unwrap()
    }

    #[test]
    fn test_escalation_scenario() {
        let cat = general();
        let t = ticket_at(T0, cat.id);

        assert_eq!(urgency_level(&t, Some(&cat), T0), UrgencyLevel::Normal);
        assert_eq!(urgency_level(&t, Some(&cat), T0 + 3 * MILLIS_PER_MINUTE), UrgencyLevel::Elevated);
        assert_eq!(urgency_level(&t, Some(&cat), T0 + 6 * MILLIS_PER_MINUTE), UrgencyLevel::High);
        assert_eq!(urgency_level(&t, Some(&cat), T0 + 11 * MILLIS_PER_MINUTE), UrgencyLevel::Critical);
    }

    #[test]
    fn test_boundaries_are_inclusive() {
        let cat = general();
        let t = ticket_at(T0, cat.id);
        assert_eq!(urgency_level(&t, Some(&cat), T0 + 2 * MILLIS_PER_MINUTE - 1), UrgencyLevel::Normal);
        assert_eq!(urgency_level(&t, Some(&cat), T0 + 2 * MILLIS_PER_MINUTE), UrgencyLevel::Elevated);
        assert_eq!(urgency_level(&t, Some(&cat), T0 + 10 * MILLIS_PER_MINUTE), UrgencyLevel::Critical);
    }

    #[test]
    fn test_unknown_category_uses_fallback() {
        let t = ticket_at(T0, CategoryId::new(99));
        assert_eq!(urgency_level(&t, None, T0 + 5 * MILLIS_PER_MINUTE), UrgencyLevel::High);
        assert_eq!(urgency_level(&t, None, T0 + 10 * MILLIS_PER_MINUTE), UrgencyLevel::Critical);
    }

    #[test]
    fn test_clock_skew_is_normal() {
        let t = ticket_at(T0, CategoryId::new(1));
        assert_eq!(urgency_level(&t, Some(&general()), T0 - 60_000), UrgencyLevel::Normal);
        assert_eq!(elapsed_label(T0, T0 - 60_000), "00:00");
    }

    #[test]
    fn test_elapsed_label() {
        assert_eq!(elapsed_label(T0, T0 + 65_000), "01:05");
        assert_eq!(elapsed_label(T0, T0 + 125 * MILLIS_PER_MINUTE), "125:00");
    }

    proptest! {
        #[test]
        fn prop_level_never_decreases(
            orange in 0u32..120,
            red in 0u32..240,
            critical in 0u32..480,
            start in -1_000_000_000i64..1_000_000_000,
            a in 0i64..50_000_000,
            b in 0i64..50_000_000,
        ) {
            let cat = Category {
                id: CategoryId::new(1),
                name: "p".into(),
                orange_minutes: orange,
                red_minutes: red,
                critical_minutes: critical,
            };
            let t = ticket_at(start, cat.id);
            let (early, late) = if a <= b { (a, b) } else { (b, a) };
            let l1 = urgency_level(&t, Some(&cat), start + early);
            let l2 = urgency_level(&t, Some(&cat), start + late);
            prop_assert!(l1 <= l2);
        }
    }
}
