//! # Capability Lookup
//!
//! Single-key roles (admin, rate updater) are answered by a
//! [`PermissionEngine`]. The vault never stores roles itself; it only asks.
//! Quorum signers are a separate class governed by votes inside the vault
//! and are deliberately not a [`Capability`].

use std::collections::{BTreeSet, HashMap};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::types::Address;

/// A single-key privilege.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Configuration setters and rate updates.
    Admin,
    /// Exchange-rate updates only.
    RateUpdater,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Capability::Admin => write!(f, "admin"),
            Capability::RateUpdater => write!(f, "rate_updater"),
        }
    }
}

/// Answers "does `principal` hold `capability`?".
pub trait PermissionEngine: Send + Sync + std::fmt::Debug {
    /// Returns `true` when `principal` holds `capability`.
    fn has_capability(&self, principal: &Address, capability: Capability) -> bool;

    /// Returns `true` when `principal` holds at least one of `capabilities`.
    fn has_any(&self, principal: &Address, capabilities: &[Capability]) -> bool {
        capabilities
            .iter()
            .any(|c| self.has_capability(principal, *c))
    }
}

/// In-memory role table. Interior mutability so a shared handle can be
/// granted to after the vault has been built.
#[derive(Debug, Default)]
pub struct RoleTable {
    roles: RwLock<HashMap<Capability, BTreeSet<Address>>>,
}

impl RoleTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Grants `capability` to `principal`. Returns `false` if it was
    /// already held.
    pub fn grant(&self, capability: Capability, principal: Address) -> bool {
        let granted = self
            .roles
            .write()
            .entry(capability)
            .or_default()
            .insert(principal);
        if granted {
            tracing::info!(%principal, %capability, "capability granted");
        }
        granted
    }

    /// Revokes `capability` from `principal`. Returns `false` if it was not
    /// held.
    pub fn revoke(&self, capability: Capability, principal: &Address) -> bool {
        let revoked = self
            .roles
            .write()
            .get_mut(&capability)
            .map(|holders| holders.remove(principal))
            .unwrap_or(false);
        if revoked {
            tracing::info!(%principal, %capability, "capability revoked");
        }
        revoked
    }

    /// All holders of `capability`, sorted.
    pub fn holders(&self, capability: Capability) -> Vec<Address> {
        self.roles
            .read()
            .get(&capability)
            .map(|h| h.iter().copied().collect())
            .unwrap_or_default()
    }
}

impl PermissionEngine for RoleTable {
    fn has_capability(&self, principal: &Address, capability: Capability) -> bool {
        self.roles
            .read()
            .get(&capability)
            .is_some_and(|holders| holders.contains(principal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grant_and_revoke() {
        let table = RoleTable::new();
        let alice = Address::from_low_u8(1);

        assert!(!table.has_capability(&alice, Capability::Admin));
        assert!(table.grant(Capability::Admin, alice));
        assert!(!table.grant(Capability::Admin, alice));
        assert!(table.has_capability(&alice, Capability::Admin));
        assert!(!table.has_capability(&alice, Capability::RateUpdater));

        assert!(table.revoke(Capability::Admin, &alice));
        assert!(!table.revoke(Capability::Admin, &alice));
        assert!(!table.has_capability(&alice, Capability::Admin));
    }

    #[test]
    fn has_any_matches_either_role() {
        let table = RoleTable::new();
        let bot = Address::from_low_u8(9);
        table.grant(Capability::RateUpdater, bot);

        assert!(table.has_any(&bot, &[Capability::RateUpdater, Capability::Admin]));
        assert!(!table.has_any(&bot, &[Capability::Admin]));
    }

    #[test]
    fn holders_are_sorted() {
        let table = RoleTable::new();
        table.grant(Capability::Admin, Address::from_low_u8(3));
        table.grant(Capability::Admin, Address::from_low_u8(1));
        assert_eq!(
            table.holders(Capability::Admin),
            vec![Address::from_low_u8(1), Address::from_low_u8(3)]
        );
    }
}
