//! # Share Ledger
//!
//! Supply and per-holder balances of the vault share. Minting happens on
//! deposit, burning on withdrawal request (never on claim), and transfers
//! move shares between holders. Principal bookkeeping is the vault's job;
//! this module only counts shares.

use im::OrdMap;
use meridian_protocol::types::{Address, Amount};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during share operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShareError {
    /// Minting would overflow the supply.
    #[error("share supply overflow: minting {amount} would exceed u128::MAX")]
    SupplyOverflow {
        /// Amount that was attempted.
        amount: Amount,
    },

    /// Holder does not have enough shares.
    #[error("insufficient shares: account has {balance}, tried to move {amount}")]
    InsufficientBalance {
        /// Current balance of the account.
        balance: Amount,
        /// Amount the caller tried to burn or transfer.
        amount: Amount,
    },
}

/// Share supply and balances.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareLedger {
    total_supply: Amount,
    balances: OrdMap<Address, Amount>,
}

impl ShareLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Outstanding shares.
    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    /// Shares held by `holder`.
    pub fn balance_of(&self, holder: &Address) -> Amount {
        self.balances.get(holder).copied().unwrap_or(0)
    }

    /// Number of holders with a non-zero balance.
    pub fn holder_count(&self) -> usize {
        self.balances.len()
    }

    /// Mints `amount` to `to`.
    pub fn mint(&mut self, to: Address, amount: Amount) -> Result<(), ShareError> {
        let new_supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(ShareError::SupplyOverflow { amount })?;
        // Balance <= supply, so this cannot overflow once supply didn't.
        let balance = self.balance_of(&to) + amount;

        self.total_supply = new_supply;
        self.set(to, balance);
        Ok(())
    }

    /// Burns `amount` from `from`.
    pub fn burn(&mut self, from: Address, amount: Amount) -> Result<(), ShareError> {
        let balance = self.balance_of(&from);
        if balance < amount {
            return Err(ShareError::InsufficientBalance { balance, amount });
        }

        self.set(from, balance - amount);
        self.total_supply -= amount;
        Ok(())
    }

    /// Moves `amount` from `from` to `to`.
    pub fn transfer(&mut self, from: Address, to: Address, amount: Amount) -> Result<(), ShareError> {
        let balance = self.balance_of(&from);
        if balance < amount {
            return Err(ShareError::InsufficientBalance { balance, amount });
        }
        if from == to || amount == 0 {
            return Ok(());
        }

        let to_balance = self.balance_of(&to) + amount;
        self.set(from, balance - amount);
        self.set(to, to_balance);
        Ok(())
    }

    fn set(&mut self, holder: Address, balance: Amount) {
        if balance == 0 {
            self.balances.remove(&holder);
        } else {
            self.balances.insert(holder, balance);
        }
    }
}
