//! Visibility & Ordering Policy
//!
//! One place for every role-dependent decision about what a viewer sees and
//! in which order. Urgency moves with the clock, so the ordering is computed
//! fresh for every refresh and never cached.

use crate::catalog::{BranchId, Catalog};
use crate::ticket::Ticket;
use crate::urgency::{urgency_level, UrgencyLevel};
use crate::viewer::Viewer;
use crate::TimestampMillis;
use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};

/// Branch narrowing an admin picks on the monitor screen
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BranchFilter {
    #[default]
    All,
    Branch(BranchId),
}

impl BranchFilter {
    /// Branch named by the filter, if any
    pub fn branch(&self) -> Option<BranchId> {
        match self {
            Self::All => None,
            Self::Branch(b) => Some(*b),
        }
    }
}

/// Ticket paired with its urgency at evaluation time
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RankedTicket {
    pub ticket: Ticket,
    pub level: UrgencyLevel,
}

/// Technician bucket: own work, then the unassigned pool, then everyone else's
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Ownership {
    Mine,
    Pending,
    Others,
}

/// Per-viewer filter and comparator
#[derive(Clone, Copy, Debug)]
pub struct VisibilityPolicy<'a> {
    viewer: &'a Viewer,
    catalog: &'a Catalog,
    filter: BranchFilter,
}

impl<'a> VisibilityPolicy<'a> {
    /// Policy for `viewer`. `filter` only narrows an admin's view.
    pub fn new(viewer: &'a Viewer, catalog: &'a Catalog, filter: BranchFilter) -> Self {
        Self { viewer, catalog, filter }
    }

    /// Whether the viewer can see this ticket
    pub fn admits(&self, ticket: &Ticket) -> bool {
        if self.viewer.is_admin() {
            return match self.filter {
                BranchFilter::All => true,
                BranchFilter::Branch(b) => ticket.branch_id == b,
            };
        }
        match self.viewer.branch_id {
            Some(own) if self.catalog.is_all_branch(own) => true,
            Some(own) => ticket.branch_id == own,
            None => false,
        }
    }

    fn ownership(&self, ticket: &Ticket) -> Ownership {
        if ticket.assignee.is(&self.viewer.name) {
            Ownership::Mine
        } else if ticket.assignee.is_pending() {
            Ownership::Pending
        } else {
            Ownership::Others
        }
    }

    /// Display order; `Less` is shown first
    pub fn compare(&self, a: &RankedTicket, b: &RankedTicket) -> Ordering {
        let urgency = |r: &RankedTicket| (Reverse(r.level), r.ticket.started_at, r.ticket.id);

        if self.viewer.is_technician() {
            self.ownership(&a.ticket)
                .cmp(&self.ownership(&b.ticket))
                .then_with(|| urgency(a).cmp(&urgency(b)))
        } else {
            urgency(a).cmp(&urgency(b))
        }
    }

    /// Rank a single ticket at `now`
    pub fn rank(&self, ticket: &Ticket, now: TimestampMillis) -> RankedTicket {
        let level = urgency_level(ticket, self.catalog.category(ticket.category_id), now);
        RankedTicket { ticket: ticket.clone(), level }
    }

    /// Visible subset in display order
    pub fn apply<'t>(
        &self,
        tickets: impl IntoIterator<Item = &'t Ticket>,
        now: TimestampMillis,
    ) -> Vec<RankedTicket> {
        let mut ranked: Vec<_> = tickets
            .into_iter()
            .filter(|t| self.admits(t))
            .map(|t| self.rank(t, now))
            .collect();
        ranked.sort_by(|a, b| self.compare(a, b));
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Branch, Category, CategoryId};
    use crate::ticket::{TicketDraft, TicketId};
    use crate::MILLIS_PER_MINUTE;
    use proptest::prelude::*;

    const NOW: TimestampMillis = 1_700_000_000_000;

    fn catalog() -> Catalog {
        Catalog {
            branches: vec![
                Branch { id: BranchId::new(1), name: "Huérfanos".into() },
                Branch { id: BranchId::new(2), name: "Mojitas".into() },
                Branch { id: BranchId::new(4), name: "all".into() },
            ],
            categories: vec![Category {
                id: CategoryId::new(1),
                name: "General".into(),
                orange_minutes: 2,
                red_minutes: 5,
                critical_minutes: 10,
            }],
            ..Default::default()
        }
    }

    fn ticket(id: u64, branch: u64, tech: Option<&str>, minutes_ago: i64) -> Ticket {
        let draft = TicketDraft::new(TicketId::new(id), tech, CategoryId::new(1));
        Ticket::open(draft, "caja", BranchId::new(branch), NOW - minutes_ago * MILLIS_PER_MINUTE)
            .unwrap()
    }

    fn ids(ranked: &[RankedTicket]) -> Vec<u64> {
        ranked.iter().map(|r| r.ticket.id.value()).collect()
    }

    #[test]
    fn test_operator_sees_own_branch_only() {
        let cat = catalog();
        let viewer = Viewer::operator("caja1", BranchId::new(1));
        let tickets = vec![ticket(1, 1, None, 0), ticket(2, 2, None, 0)];
        let visible = VisibilityPolicy::new(&viewer, &cat, BranchFilter::Branch(BranchId::new(2)))
            .apply(&tickets, NOW);
        assert_eq!(ids(&visible), vec![1]);
    }

    #[test]
    fn test_all_branch_member_sees_everything() {
        let cat = catalog();
        let viewer = Viewer::technician("ana", BranchId::new(4));
        let tickets = vec![ticket(1, 1, None, 0), ticket(2, 2, None, 0), ticket(3, 99, None, 0)];
        let visible = VisibilityPolicy::new(&viewer, &cat, BranchFilter::All).apply(&tickets, NOW);
        assert_eq!(visible.len(), 3);
    }

    #[test]
    fn test_admin_branch_filter() {
        let cat = catalog();
        let admin = Viewer::admin("admin");
        let tickets = vec![ticket(1, 1, None, 0), ticket(2, 2, None, 0)];

        let all = VisibilityPolicy::new(&admin, &cat, BranchFilter::All).apply(&tickets, NOW);
        assert_eq!(all.len(), 2);

        let one = VisibilityPolicy::new(&admin, &cat, BranchFilter::Branch(BranchId::new(2)))
            .apply(&tickets, NOW);
        assert_eq!(ids(&one), vec![2]);
    }

    #[test]
    fn test_admin_order_is_urgency_then_age() {
        let cat = catalog();
        let admin = Viewer::admin("admin");
        let tickets = vec![
            ticket(1, 1, Some("ana"), 1),  // normal
            ticket(2, 1, None, 6),         // high
            ticket(3, 1, Some("luis"), 3), // elevated
            ticket(4, 1, None, 4),         // elevated, older
            ticket(5, 1, Some("ana"), 12), // critical
        ];
        let ranked = VisibilityPolicy::new(&admin, &cat, BranchFilter::All).apply(&tickets, NOW);
        assert_eq!(ids(&ranked), vec![5, 2, 4, 3, 1]);
    }

    #[test]
    fn test_technician_order() {
        let cat = catalog();
        let ana = Viewer::technician("ana", BranchId::new(1));
        let tickets = vec![
            ticket(1, 1, Some("luis"), 12), // others, critical
            ticket(2, 1, None, 1),          // pending, normal
            ticket(3, 1, Some("ana"), 1),   // mine, normal
            ticket(4, 1, None, 6),          // pending, high
            ticket(5, 1, Some("ana"), 3),   // mine, elevated
            ticket(6, 1, Some("luis"), 1),  // others, normal
        ];
        let ranked = VisibilityPolicy::new(&ana, &cat, BranchFilter::All).apply(&tickets, NOW);
        assert_eq!(ids(&ranked), vec![5, 3, 4, 2, 1, 6]);
    }

    #[test]
    fn test_levels_are_attached() {
        let cat = catalog();
        let admin = Viewer::admin("admin");
        let tickets = vec![ticket(1, 1, None, 6)];
        let ranked = VisibilityPolicy::new(&admin, &cat, BranchFilter::All).apply(&tickets, NOW);
        assert_eq!(ranked[0].level, UrgencyLevel::High);
    }

    fn arb_ticket() -> impl Strategy<Value = Ticket> {
        (
            1u64..500,
            1u64..4,
            prop_oneof![Just(None), Just(Some("ana")), Just(Some("luis"))],
            0i64..30,
        )
            .prop_map(|(id, branch, tech, ago)| ticket(id, branch, tech, ago))
    }

    proptest! {
        #[test]
        fn prop_operator_never_sees_foreign_branch(
            tickets in proptest::collection::vec(arb_ticket(), 0..40),
            branch in 1u64..3,
        ) {
            let cat = catalog();
            let viewer = Viewer::operator("caja", BranchId::new(branch));
            let visible = VisibilityPolicy::new(&viewer, &cat, BranchFilter::All).apply(&tickets, NOW);
            prop_assert!(visible.iter().all(|r| r.ticket.branch_id == BranchId::new(branch)));
        }

        #[test]
        fn prop_technician_buckets_are_contiguous(
            tickets in proptest::collection::vec(arb_ticket(), 0..40),
        ) {
            let cat = catalog();
            let ana = Viewer::technician("ana", BranchId::new(4));
            let ranked = VisibilityPolicy::new(&ana, &cat, BranchFilter::All).apply(&tickets, NOW);
            let buckets: Vec<u8> = ranked
                .iter()
                .map(|r| {
                    if r.ticket.assignee.is("ana") { 0 }
                    else if r.ticket.assignee.is_pending() { 1 }
                    else { 2 }
                })
                .collect();
            prop_assert!(buckets.windows(2).all(|w| w[0] <= w[1]));
        }
    }
}
