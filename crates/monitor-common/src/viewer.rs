//! Viewer identity, as handed over by the identity provider

use crate::catalog::BranchId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Viewer role
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Sees and manages everything
    Admin,
    /// Opens and closes tickets for one branch
    #[serde(alias = "creator", alias = "branch-operator")]
    Operator,
    /// Works tickets; the only role that gets audible alerts
    Technician,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Admin => write!(f, "admin"),
            Self::Operator => write!(f, "operator"),
            Self::Technician => write!(f, "technician"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "operator" | "creator" | "branch-operator" => Ok(Self::Operator),
            "technician" => Ok(Self::Technician),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// One connected user of the monitor screen
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewer {
    pub name: String,
    pub role: Role,
    /// `None` only for admins
    pub branch_id: Option<BranchId>,
}

impl Viewer {
    /// Administrator, not tied to a branch
    pub fn admin(name: impl Into<String>) -> Self {
        Self { name: name.into(), role: Role::Admin, branch_id: None }
    }

    /// Branch-scoped operator
    pub fn operator(name: impl Into<String>, branch_id: BranchId) -> Self {
        Self { name: name.into(), role: Role::Operator, branch_id: Some(branch_id) }
    }

    /// Technician at a branch
    pub fn technician(name: impl Into<String>, branch_id: BranchId) -> Self {
        Self { name: name.into(), role: Role::Technician, branch_id: Some(branch_id) }
    }

    /// Admin role check
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Technician role check
    pub fn is_technician(&self) -> bool {
        self.role == Role::Technician
    }

    /// Whether this viewer may close tickets of the given branch
    pub fn may_close_in(&self, branch_id: BranchId) -> bool {
        self.is_admin() || self.branch_id == Some(branch_id)
    }
}
