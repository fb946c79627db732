//! # Cost-Basis Ledger
//!
//! Tracks, per holder, how many assets they are deemed to have put in. The
//! performance fee only ever applies to value above this principal.
//!
//! Principal moves in three ways:
//!
//! - **Deposit**: `principal += assets`.
//! - **Withdrawal request**: the burned fraction of principal is removed,
//!   `principal * burned / balance_before`.
//! - **Share transfer**: the transferred fraction follows the shares,
//!   `principal * shares / balance_of(from)`.
//!
//! Both proportional cases take the holder's share balance *before* the
//! mutation as denominator. The caller passes it in; this module never
//! reads balances itself, so the fee computation and the ledger mutation
//! cannot disagree about the denominator.

use im::OrdMap;
use meridian_protocol::math::{mul_div, MathError, Rounding};
use meridian_protocol::types::{Address, Amount};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced by principal bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CostBasisError {
    /// The holder's balance is smaller than the shares being moved.
    #[error("insufficient shares: balance {balance}, requested {requested}")]
    InsufficientShares {
        /// Holder's share balance.
        balance: Amount,
        /// Shares being moved or burned.
        requested: Amount,
    },

    /// Checked arithmetic failed.
    #[error(transparent)]
    Math(#[from] MathError),
}

/// `holder -> principal` in asset units.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostBasisLedger {
    principal: OrdMap<Address, Amount>,
}

impl CostBasisLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Principal attributed to `holder`.
    pub fn principal_of(&self, holder: &Address) -> Amount {
        self.principal.get(holder).copied().unwrap_or(0)
    }

    /// Sum of all principal.
    pub fn total_principal(&self) -> Amount {
        self.principal.values().sum()
    }

    /// Credits `assets` of principal to `holder`.
    pub fn on_deposit(&mut self, holder: Address, assets: Amount) -> Result<(), CostBasisError> {
        let current = self.principal_of(&holder);
        let updated = current.checked_add(assets).ok_or(MathError::Overflow)?;
        self.set(holder, updated);
        Ok(())
    }

    /// Principal that a burn of `shares_burned` out of `shares_before`
    /// would remove. Pure; used to quote the fee before committing.
    pub fn quote_removal(
        &self,
        holder: &Address,
        shares_burned: Amount,
        shares_before: Amount,
    ) -> Result<Amount, CostBasisError> {
        if shares_burned > shares_before {
            return Err(CostBasisError::InsufficientShares {
                balance: shares_before,
                requested: shares_burned,
            });
        }
        if shares_burned == 0 {
            return Ok(0);
        }
        Ok(mul_div(
            self.principal_of(holder),
            shares_burned,
            shares_before,
            Rounding::Floor,
        )?)
    }

    /// Removes the burned fraction of `holder`'s principal and returns the
    /// amount removed. `shares_before` is the balance prior to the burn.
    pub fn on_withdraw_request(
        &mut self,
        holder: Address,
        shares_burned: Amount,
        shares_before: Amount,
    ) -> Result<Amount, CostBasisError> {
        let removed = self.quote_removal(&holder, shares_burned, shares_before)?;
        let remaining = self.principal_of(&holder) - removed;
        self.set(holder, remaining);
        Ok(removed)
    }

    /// Moves the transferred fraction of principal from `from` to `to`.
    /// `from_balance` is the sender's share balance before the transfer.
    /// Returns the principal moved.
    pub fn on_transfer(
        &mut self,
        from: Address,
        to: Address,
        shares: Amount,
        from_balance: Amount,
    ) -> Result<Amount, CostBasisError> {
        if from == to || shares == 0 {
            return Ok(0);
        }
        if from_balance < shares {
            return Err(CostBasisError::InsufficientShares {
                balance: from_balance,
                requested: shares,
            });
        }

        let from_principal = self.principal_of(&from);
        let moved = mul_div(from_principal, shares, from_balance, Rounding::Floor)?;
        let to_principal = self
            .principal_of(&to)
            .checked_add(moved)
            .ok_or(MathError::Overflow)?;

        self.set(from, from_principal - moved);
        self.set(to, to_principal);
        Ok(moved)
    }

    fn set(&mut self, holder: Address, principal: Amount) {
        if principal == 0 {
            self.principal.remove(&holder);
        } else {
            self.principal.insert(holder, principal);
        }
    }
}
