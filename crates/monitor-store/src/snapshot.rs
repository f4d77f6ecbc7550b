//! JSON snapshots of the whole store

use crate::{StoreError, StoreResult};
use monitor_common::{Catalog, HistoryEntry, Ticket};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Next id to hand out per catalog collection
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextIds {
    pub branch: u64,
    pub technician: u64,
    pub category: u64,
    pub user: u64,
}

impl Default for NextIds {
    fn default() -> Self {
        Self { branch: 1, technician: 1, category: 1, user: 1 }
    }
}

fn bump(slot: &mut u64) -> u64 {
    let id = *slot;
    *slot += 1;
    id
}

impl NextIds {
    pub(crate) fn bump_branch(&mut self) -> u64 {
        bump(&mut self.branch)
    }

    pub(crate) fn bump_technician(&mut self) -> u64 {
        bump(&mut self.technician)
    }

    pub(crate) fn bump_category(&mut self) -> u64 {
        bump(&mut self.category)
    }

    pub(crate) fn bump_user(&mut self) -> u64 {
        bump(&mut self.user)
    }
}

/// Everything the store holds, in persisted shape
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub catalog: Catalog,
    pub tickets: Vec<Ticket>,
    pub history: Vec<HistoryEntry>,
    /// Absent in hand-written snapshots; derived from the catalog then
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<NextIds>,
}

impl StoreSnapshot {
    /// Id counters, never lower than one past the largest id in use
    pub fn next_ids(&self) -> NextIds {
        let after = |max: Option<u64>| max.map_or(1, |m| m + 1);
        let c = &self.catalog;
        let derived = NextIds {
            branch: after(c.branches.iter().map(|b| b.id.value()).max()),
            technician: after(c.technicians.iter().map(|t| t.id.value()).max()),
            category: after(c.categories.iter().map(|x| x.id.value()).max()),
            user: after(c.users.iter().map(|u| u.id.value()).max()),
        };
        match self.next {
            Some(n) => NextIds {
                branch: n.branch.max(derived.branch),
                technician: n.technician.max(derived.technician),
                category: n.category.max(derived.category),
                user: n.user.max(derived.user),
            },
            None => derived,
        }
    }

    /// Load from file
    pub fn load(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| StoreError::Snapshot(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&content)
            .map_err(|e| StoreError::Snapshot(format!("{}: {e}", path.display())))
    }

    /// Save to file
    pub fn save(&self, path: impl AsRef<Path>) -> StoreResult<()> {
        let path = path.as_ref();
        let content =
            serde_json::to_string_pretty(self).map_err(|e| StoreError::Snapshot(e.to_string()))?;
        std::fs::write(path, content)
            .map_err(|e| StoreError::Snapshot(format!("{}: {e}", path.display())))
    }
}
