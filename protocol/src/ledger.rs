//! # Asset Ledger
//!
//! The vault does not own token balances. It moves them through an
//! [`AssetLedger`]: a multi-asset balance book keyed by `(asset, holder)`.
//! The underlying deposit asset, any other token the vault happens to hold,
//! and the treasury's cut all go through the same two calls.
//!
//! [`InMemoryLedger`] is the implementation the node runs on and the tests
//! use. It enforces non-negative balances and checked credits.

use im::OrdMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Address, Amount};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur when moving balances.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Debit exceeds the holder's balance.
    #[error("insufficient balance of {asset} for {holder}: available {available}, requested {requested}")]
    InsufficientBalance {
        /// Asset being moved.
        asset: Address,
        /// Account being debited.
        holder: Address,
        /// Balance before the debit.
        available: Amount,
        /// Requested debit.
        requested: Amount,
    },

    /// Credit would overflow the holder's balance.
    #[error("balance overflow of {asset} for {holder}")]
    Overflow {
        /// Asset being moved.
        asset: Address,
        /// Account being credited.
        holder: Address,
    },
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// A fungible-token balance book.
pub trait AssetLedger: Send + Sync {
    /// Balance of `asset` held by `holder`. Unknown pairs are zero.
    fn balance_of(&self, asset: &Address, holder: &Address) -> Amount;

    /// Moves `amount` of `asset` from `from` to `to`. Either the whole
    /// transfer happens or nothing does.
    fn transfer(
        &mut self,
        asset: &Address,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<(), LedgerError>;
}

// ---------------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------------

/// Ledger over persistent ordered maps. Clones share structure, and the
/// ordering keeps serialised snapshots stable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InMemoryLedger {
    /// `asset -> holder -> balance`.
    balances: OrdMap<Address, OrdMap<Address, Amount>>,
}

impl InMemoryLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates `amount` of `asset` out of thin air for `holder`. Used for
    /// seeding balances from configuration and in tests.
    pub fn credit(&mut self, asset: Address, holder: Address, amount: Amount) -> Result<(), LedgerError> {
        let balance = self
            .balance_of(&asset, &holder)
            .checked_add(amount)
            .ok_or(LedgerError::Overflow { asset, holder })?;
        self.set(asset, holder, balance);
        Ok(())
    }

    fn set(&mut self, asset: Address, holder: Address, balance: Amount) {
        let mut holders = self.balances.get(&asset).cloned().unwrap_or_default();
        holders.insert(holder, balance);
        self.balances.insert(asset, holders);
    }

    /// Total of `asset` across all holders.
    pub fn total_of(&self, asset: &Address) -> Amount {
        self.balances
            .get(asset)
            .map(|holders| holders.values().sum())
            .unwrap_or(0)
    }

    /// All non-zero `(asset, balance)` pairs held by `holder`.
    pub fn holdings(&self, holder: &Address) -> Vec<(Address, Amount)> {
        self.balances
            .iter()
            .filter_map(|(asset, holders)| {
                holders
                    .get(holder)
                    .filter(|b| **b > 0)
                    .map(|b| (*asset, *b))
            })
            .collect()
    }
}

impl AssetLedger for InMemoryLedger {
    fn balance_of(&self, asset: &Address, holder: &Address) -> Amount {
        self.balances
            .get(asset)
            .and_then(|holders| holders.get(holder))
            .copied()
            .unwrap_or(0)
    }

    fn transfer(
        &mut self,
        asset: &Address,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        if amount == 0 || from == to {
            return Ok(());
        }

        let available = self.balance_of(asset, from);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                asset: *asset,
                holder: *from,
                available,
                requested: amount,
            });
        }

        // Validate the credit before touching either side.
        let credited = self
            .balance_of(asset, to)
            .checked_add(amount)
            .ok_or(LedgerError::Overflow {
                asset: *asset,
                holder: *to,
            })?;

        let mut holders = self.balances.get(asset).cloned().unwrap_or_default();
        holders.insert(*from, available - amount);
        holders.insert(*to, credited);
        self.balances.insert(*asset, holders);

        tracing::trace!(%asset, %from, %to, amount, "ledger transfer");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usdc() -> Address {
        Address::from_low_u8(0xa0)
    }

    #[test]
    fn transfer_moves_balance() {
        let mut ledger = InMemoryLedger::new();
        let (alice, bob) = (Address::from_low_u8(1), Address::from_low_u8(2));
        ledger.credit(usdc(), alice, 100).unwrap();

        ledger.transfer(&usdc(), &alice, &bob, 40).unwrap();

        assert_eq!(ledger.balance_of(&usdc(), &alice), 60);
        assert_eq!(ledger.balance_of(&usdc(), &bob), 40);
        assert_eq!(ledger.total_of(&usdc()), 100);
    }

    #[test]
    fn overdraft_leaves_state_untouched() {
        let mut ledger = InMemoryLedger::new();
        let (alice, bob) = (Address::from_low_u8(1), Address::from_low_u8(2));
        ledger.credit(usdc(), alice, 10).unwrap();

        let err = ledger.transfer(&usdc(), &alice, &bob, 11).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance { available: 10, requested: 11, .. }));
        assert_eq!(ledger.balance_of(&usdc(), &alice), 10);
        assert_eq!(ledger.balance_of(&usdc(), &bob), 0);
    }

    #[test]
    fn credit_overflow_rejected() {
        let mut ledger = InMemoryLedger::new();
        let alice = Address::from_low_u8(1);
        ledger.credit(usdc(), alice, u128::MAX).unwrap();
        assert!(ledger.credit(usdc(), alice, 1).is_err());
    }

    #[test]
    fn holdings_lists_non_zero_assets() {
        let mut ledger = InMemoryLedger::new();
        let vault = Address::from_low_u8(0xee);
        let other = Address::from_low_u8(0xb0);
        ledger.credit(usdc(), vault, 5).unwrap();
        ledger.credit(other, vault, 0).unwrap();
        assert_eq!(ledger.holdings(&vault), vec![(usdc(), 5)]);
    }

    #[test]
    fn clone_is_independent_and_serialises_the_same() {
        let mut ledger = InMemoryLedger::new();
        let (alice, bob) = (Address::from_low_u8(1), Address::from_low_u8(2));
        ledger.credit(usdc(), alice, 100).unwrap();
        let before = ledger.clone();

        ledger.transfer(&usdc(), &alice, &bob, 30).unwrap();
        assert_eq!(before.balance_of(&usdc(), &alice), 100);
        assert_eq!(before.balance_of(&usdc(), &bob), 0);

        let json = serde_json::to_string(&ledger).unwrap();
        let back: InMemoryLedger = serde_json::from_str(&json).unwrap();
        assert_eq!(back.balance_of(&usdc(), &alice), 70);
        assert_eq!(back.balance_of(&usdc(), &bob), 30);
    }
}
