//! Active tickets
//!
//! A ticket's id is not generated here: it is the number printed on the
//! physical stub, typed in by whoever opens it. Nothing about a ticket changes
//! after creation; it only leaves the active set by being closed.

use crate::catalog::{BranchId, CategoryId};
use crate::error::{MonitorError, MonitorResult};
use crate::TimestampMillis;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Technician label stored for unassigned tickets.
pub const PENDING: &str = "PEND";

/// Ticket number shared across every branch
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(u64);

impl TicketId {
    /// Wrap a raw ticket number
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Raw number
    pub fn value(&self) -> u64 {
        self.0
    }

    /// Parse the number typed into the entry form.
    ///
    /// Only digits are accepted and zero is not a ticket number.
    pub fn parse(raw: &str) -> MonitorResult<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(MonitorError::Validation("ticket number is required".into()));
        }
        if !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(MonitorError::Validation(format!(
                "ticket number must be numeric: {raw}"
            )));
        }
        match raw.parse::<u64>() {
            Ok(0) => Err(MonitorError::Validation("ticket number cannot be zero".into())),
            Ok(id) => Ok(Self(id)),
            Err(_) => Err(MonitorError::Validation(format!(
                "ticket number out of range: {raw}"
            ))),
        }
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Who a ticket is assigned to. Fixed at creation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Assignee {
    /// Nobody yet, stored as `PEND`
    Pending,
    /// A technician, by name
    Technician(String),
}

impl Assignee {
    /// Build from an optional technician name; blank means unassigned
    pub fn from_name(name: Option<&str>) -> Self {
        match name.map(str::trim) {
            Some(n) if !n.is_empty() && n != PENDING => Self::Technician(n.to_string()),
            _ => Self::Pending,
        }
    }

    /// Label shown on the board
    pub fn label(&self) -> &str {
        match self {
            Self::Pending => PENDING,
            Self::Technician(name) => name,
        }
    }

    /// True when nobody is assigned
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// True when assigned to exactly this technician name
    pub fn is(&self, name: &str) -> bool {
        matches!(self, Self::Technician(n) if n == name)
    }
}

impl From<String> for Assignee {
    fn from(s: String) -> Self {
        Self::from_name(Some(&s))
    }
}

impl From<Assignee> for String {
    fn from(a: Assignee) -> Self {
        match a {
            Assignee::Pending => PENDING.to_string(),
            Assignee::Technician(name) => name,
        }
    }
}

/// Active ticket on the monitor
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: TicketId,
    #[serde(rename = "technicianName")]
    pub assignee: Assignee,
    pub category_id: CategoryId,
    #[serde(rename = "creatorName")]
    pub creator: String,
    pub branch_id: BranchId,
    #[serde(rename = "startTimestampMillis")]
    pub started_at: TimestampMillis,
}

impl Ticket {
    /// Open a ticket now
    pub fn open(
        draft: TicketDraft,
        creator: impl Into<String>,
        branch_id: BranchId,
        now: TimestampMillis,
    ) -> MonitorResult<Self> {
        let (id, assignee, category_id) = draft.validate()?;
        Ok(Self {
            id,
            assignee,
            category_id,
            creator: creator.into(),
            branch_id,
            started_at: now,
        })
    }
}

/// Entry-form input for a new ticket, before validation
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketDraft {
    pub id: Option<TicketId>,
    pub technician: Option<String>,
    pub category_id: Option<CategoryId>,
}

impl TicketDraft {
    /// Draft from already-typed values
    pub fn new(id: TicketId, technician: Option<&str>, category_id: CategoryId) -> Self {
        Self {
            id: Some(id),
            technician: technician.map(str::to_string),
            category_id: Some(category_id),
        }
    }

    /// Draft straight from the entry form fields
    pub fn from_form(
        raw_id: &str,
        technician: Option<&str>,
        category_id: Option<CategoryId>,
    ) -> MonitorResult<Self> {
        Ok(Self {
            id: Some(TicketId::parse(raw_id)?),
            technician: technician.map(str::to_string),
            category_id,
        })
    }

    /// Required fields present
    pub fn validate(&self) -> MonitorResult<(TicketId, Assignee, CategoryId)> {
        let id = self
            .id
            .ok_or_else(|| MonitorError::Validation("ticket number is required".into()))?;
        let category_id = self
            .category_id
            .ok_or_else(|| MonitorError::Validation("category is required".into()))?;
        Ok((id, Assignee::from_name(self.technician.as_deref()), category_id))
    }
}
