//! Board display model
//!
//! What one viewer's monitor shows on a refresh. Styling is left to the
//! renderer; a card carries only the facts and the urgency level.

use crate::catalog::{BranchId, Catalog};
use crate::ticket::{Ticket, TicketId};
use crate::urgency::{elapsed_label, UrgencyLevel};
use crate::viewer::Viewer;
use crate::visibility::{BranchFilter, VisibilityPolicy};
use crate::TimestampMillis;
use serde::Serialize;

/// Board switches to compact cards above this many tickets by default.
pub const DEFAULT_COMPACT_THRESHOLD: usize = 15;

/// One ticket card
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BoardCard {
    pub ticket_id: TicketId,
    pub technician: String,
    pub creator: String,
    pub branch_id: BranchId,
    pub branch: String,
    pub category: String,
    /// `MM:SS` since the ticket was opened
    pub elapsed: String,
    pub level: UrgencyLevel,
    /// Whether this viewer gets a close button
    pub can_close: bool,
}

/// Ordered cards for one viewer at one instant
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Board {
    pub cards: Vec<BoardCard>,
    pub compact: bool,
    pub generated_at: TimestampMillis,
}

impl Board {
    /// Build the board for `viewer` at `now`
    pub fn build<'t>(
        viewer: &Viewer,
        catalog: &Catalog,
        filter: BranchFilter,
        tickets: impl IntoIterator<Item = &'t Ticket>,
        now: TimestampMillis,
        compact_threshold: usize,
    ) -> Self {
        let policy = VisibilityPolicy::new(viewer, catalog, filter);
        let cards: Vec<BoardCard> = policy
            .apply(tickets, now)
            .into_iter()
            .map(|r| BoardCard {
                ticket_id: r.ticket.id,
                technician: r.ticket.assignee.label().to_string(),
                branch: catalog.branch_label(r.ticket.branch_id).to_string(),
                category: catalog.category_label(r.ticket.category_id).to_string(),
                elapsed: elapsed_label(r.ticket.started_at, now),
                can_close: viewer.may_close_in(r.ticket.branch_id),
                branch_id: r.ticket.branch_id,
                creator: r.ticket.creator,
                level: r.level,
            })
            .collect();

        Self { compact: cards.len() > compact_threshold, cards, generated_at: now }
    }

    /// Number of cards
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    /// True when nothing is visible
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Cards at or above `level`
    pub fn at_least(&self, level: UrgencyLevel) -> impl Iterator<Item = &BoardCard> {
        self.cards.iter().filter(move |c| c.level >= level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Branch, CategoryId};
    use crate::ticket::TicketDraft;
    use crate::MILLIS_PER_MINUTE;

    const NOW: TimestampMillis = 1_700_000_000_000;

    fn ticket(id: u64, branch: u64, minutes_ago: i64) -> Ticket {
        let draft = TicketDraft::new(TicketId::new(id), None, CategoryId::new(3));
        Ticket::open(draft, "caja", BranchId::new(branch), NOW - minutes_ago * MILLIS_PER_MINUTE)
            .unwrap()
    }

    #[test]
    fn test_card_labels_with_missing_catalog_rows() {
        let catalog = Catalog {
            branches: vec![Branch { id: BranchId::new(1), name: "Mojitas".into() }],
            ..Default::default()
        };
        let tickets = vec![ticket(1, 1, 6), ticket(2, 8, 0)];
        let board = Board::build(
            &Viewer::admin("admin"),
            &catalog,
            BranchFilter::All,
            &tickets,
            NOW,
            DEFAULT_COMPACT_THRESHOLD,
        );

        assert_eq!(board.len(), 2);
        let first = &board.cards[0];
        assert_eq!(first.ticket_id, TicketId::new(1));
        assert_eq!(first.branch, "Mojitas");
        assert_eq!(first.category, "Sin categoría");
        assert_eq!(first.technician, "PEND");
        assert_eq!(first.elapsed, "06:00");
        assert_eq!(first.level, UrgencyLevel::High);
        assert_eq!(board.cards[1].branch, "??");
        assert!(!board.compact);
    }

    #[test]
    fn test_close_button_follows_branch() {
        let tickets = vec![ticket(1, 1, 0), ticket(2, 2, 0)];
        let board = Board::build(
            &Viewer::technician("ana", BranchId::new(1)),
            &Catalog::default(),
            BranchFilter::All,
            &tickets,
            NOW,
            DEFAULT_COMPACT_THRESHOLD,
        );
        assert_eq!(board.len(), 1);
        assert!(board.cards[0].can_close);
    }

    #[test]
    fn test_compact_above_threshold() {
        let tickets: Vec<_> = (1..=16).map(|id| ticket(id, 1, 0)).collect();
        let board = Board::build(
            &Viewer::admin("admin"),
            &Catalog::default(),
            BranchFilter::All,
            &tickets,
            NOW,
            15,
        );
        assert!(board.compact);
    }
}
