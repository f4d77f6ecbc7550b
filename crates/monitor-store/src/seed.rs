//! First-run reference data

use crate::{BackingStore, StoreResult};
use monitor_common::{NewCategory, NewUser, Role};

const DEFAULT_BRANCHES: [&str; 3] = ["Huérfanos", "Mojitas", "Apumanque"];
const DEFAULT_TECHNICIAN: &str = "fulanito";
const DEFAULT_ADMIN: &str = "admin";

/// Populate an empty store. Returns `false` and writes nothing when the
/// store already has branches.
pub async fn seed_defaults<S: BackingStore + ?Sized>(store: &S) -> StoreResult<bool> {
    if !store.list_branches().await?.is_empty() {
        return Ok(false);
    }

    let mut first_branch = None;
    for name in DEFAULT_BRANCHES {
        let branch = store.insert_branch(name).await?;
        first_branch.get_or_insert(branch.id);
    }

    store
        .insert_category(NewCategory {
            name: "General".into(),
            orange_minutes: 2,
            red_minutes: 5,
            critical_minutes: 10,
        })
        .await?;
    store.insert_technician(DEFAULT_TECHNICIAN).await?;

    if store.list_users().await?.iter().all(|u| u.name != DEFAULT_ADMIN) {
        store
            .insert_user(NewUser {
                name: DEFAULT_ADMIN.into(),
                role: Role::Admin,
                branch_id: first_branch,
            })
            .await?;
    }

    tracing::info!(branches = DEFAULT_BRANCHES.len(), "Seeded default catalog");
    Ok(true)
}
