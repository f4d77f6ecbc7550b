//! Catalog Store types - branches, technicians, categories, users
//!
//! Low-churn reference data. Ids are assigned by the backing store.

use crate::error::{MonitorError, MonitorResult};
use crate::urgency::Thresholds;
use crate::viewer::Role;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Branch name that grants cross-branch visibility to whoever belongs to it.
pub const ALL_BRANCHES: &str = "all";

/// Label shown for a branch id that no longer resolves.
pub const UNKNOWN_BRANCH_LABEL: &str = "??";

macro_rules! catalog_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Wrap a raw id
            pub const fn new(id: u64) -> Self {
                Self(id)
            }

            /// Raw id
            pub fn value(&self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

catalog_id!(
    /// Branch identifier
    BranchId
);
catalog_id!(
    /// Category identifier
    CategoryId
);
catalog_id!(
    /// Technician identifier
    TechnicianId
);
catalog_id!(
    /// Monitor user identifier
    UserId
);

/// Physical location scoping ticket visibility
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub id: BranchId,
    pub name: String,
}

impl Branch {
    /// Whether this is the cross-branch sentinel
    pub fn is_all(&self) -> bool {
        self.name.trim().eq_ignore_ascii_case(ALL_BRANCHES)
    }
}

/// Name in the technician pool. No ownership or capacity semantics.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Technician {
    pub id: TechnicianId,
    pub name: String,
}

/// Escalation breakpoints, in minutes
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    #[serde(rename = "orangeMin")]
    pub orange_minutes: u32,
    #[serde(rename = "redMin")]
    pub red_minutes: u32,
    #[serde(rename = "criticalMin")]
    pub critical_minutes: u32,
}

impl Category {
    /// Name shown when a ticket's category no longer resolves
    pub const FALLBACK_NAME: &'static str = "Sin categoría";

    /// Breakpoints of this category
    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            orange_minutes: self.orange_minutes,
            red_minutes: self.red_minutes,
            critical_minutes: self.critical_minutes,
        }
    }
}

/// Category as entered in the admin form, before the store assigns an id
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCategory {
    pub name: String,
    pub orange_minutes: u32,
    pub red_minutes: u32,
    pub critical_minutes: u32,
}

impl NewCategory {
    /// Name must be present. Threshold ordering is left to the admin.
    pub fn validate(&self) -> MonitorResult<()> {
        require_name("category", &self.name)
    }

    /// Attach a store-assigned id
    pub fn with_id(self, id: CategoryId) -> Category {
        Category {
            id,
            name: self.name.trim().to_string(),
            orange_minutes: self.orange_minutes,
            red_minutes: self.red_minutes,
            critical_minutes: self.critical_minutes,
        }
    }
}

/// Roster entry for someone allowed to open the monitor.
///
/// Credentials live with the identity provider, not here.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorUser {
    pub id: UserId,
    pub name: String,
    pub role: Role,
    pub branch_id: Option<BranchId>,
}

/// Roster entry as entered in the admin form
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub name: String,
    pub role: Role,
    pub branch_id: Option<BranchId>,
}

impl NewUser {
    /// Name is required, and everyone but admins needs a branch
    pub fn validate(&self) -> MonitorResult<()> {
        require_name("user", &self.name)?;
        if self.role != Role::Admin && self.branch_id.is_none() {
            return Err(MonitorError::Validation(format!(
                "{} users need a branch",
                self.role
            )));
        }
        Ok(())
    }

    /// Attach a store-assigned id
    pub fn with_id(self, id: UserId) -> MonitorUser {
        MonitorUser {
            id,
            name: self.name.trim().to_string(),
            role: self.role,
            branch_id: self.branch_id,
        }
    }
}

/// Reject blank names for any catalog entity
pub fn require_name(kind: &str, name: &str) -> MonitorResult<()> {
    if name.trim().is_empty() {
        return Err(MonitorError::Validation(format!("{kind} name is required")));
    }
    Ok(())
}

/// Local copy of all reference collections
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    pub branches: Vec<Branch>,
    pub technicians: Vec<Technician>,
    pub categories: Vec<Category>,
    pub users: Vec<MonitorUser>,
}

impl Catalog {
    /// Look up a branch
    pub fn branch(&self, id: BranchId) -> Option<&Branch> {
        self.branches.iter().find(|b| b.id == id)
    }

    /// Branch display name, `??` when the branch was deleted
    pub fn branch_label(&self, id: BranchId) -> &str {
        self.branch(id)
            .map(|b| b.name.as_str())
            .unwrap_or(UNKNOWN_BRANCH_LABEL)
    }

    /// Whether the branch id points at the cross-branch sentinel
    pub fn is_all_branch(&self, id: BranchId) -> bool {
        self.branch(id).is_some_and(Branch::is_all)
    }

    /// Look up a category
    pub fn category(&self, id: CategoryId) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == id)
    }

    /// Category display name with fallback
    pub fn category_label(&self, id: CategoryId) -> &str {
        self.category(id)
            .map(|c| c.name.as_str())
            .unwrap_or(Category::FALLBACK_NAME)
    }

    /// Look up a roster user by name
    pub fn user_named(&self, name: &str) -> Option<&MonitorUser> {
        self.users.iter().find(|u| u.name == name)
    }
}
