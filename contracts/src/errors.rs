//! # Vault Errors
//!
//! [`VaultError`] is what every vault entry point returns. It wraps the
//! per-module errors and adds the checks only the facade performs. Each
//! variant belongs to exactly one [`ErrorKind`]; callers that only need the
//! class (the JSON-RPC layer, metrics) match on [`VaultError::kind`].
//!
//! Every error aborts the whole operation. Nothing here is retryable: a
//! stale rate or a full cap is resolved by a separate privileged call.

use meridian_protocol::config::ConfigError;
use meridian_protocol::ledger::LedgerError;
use meridian_protocol::math::MathError;
use meridian_protocol::permissions::Capability;
use meridian_protocol::types::{Address, Amount};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::conversion::ConversionError;
use crate::cost_basis::CostBasisError;
use crate::governance::GovernanceError;
use crate::quorum::{QuorumError, SignerSetError};
use crate::shares::ShareError;
use crate::withdrawal_queue::QueueError;

/// Failure class of a [`VaultError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Missing capability, not whitelisted, not a signer, not the owner.
    Authorization,
    /// Bad input: zero amounts or addresses, minimums, cap, stale rate.
    Validation,
    /// The call conflicts with current state.
    State,
    /// Checked arithmetic failed.
    Arithmetic,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Authorization => write!(f, "authorization"),
            ErrorKind::Validation => write!(f, "validation"),
            ErrorKind::State => write!(f, "state"),
            ErrorKind::Arithmetic => write!(f, "arithmetic"),
        }
    }
}

/// Every way a vault operation can fail.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VaultError {
    // -- Authorization ------------------------------------------------------
    /// The caller lacks a required capability.
    #[error("{caller} lacks the {capability} capability")]
    Unauthorized {
        /// Address that made the call.
        caller: Address,
        /// Capability that was required.
        capability: Capability,
    },

    /// Protocol withdrawals are reserved for signers.
    #[error("{0} is not a signer")]
    NotSigner(Address),

    /// The destination of a protocol withdrawal is not whitelisted.
    #[error("destination {0} is not whitelisted")]
    NotWhitelisted(Address),

    // -- Validation ---------------------------------------------------------
    /// An amount argument is zero.
    #[error("amount must be greater than zero")]
    ZeroAmount,

    /// An address argument is the zero address.
    #[error("{0} cannot be the zero address")]
    ZeroAddress(&'static str),

    /// Deposit below the configured minimum.
    #[error("deposit of {assets} is below the minimum of {min}")]
    BelowMinDeposit {
        /// Assets offered.
        assets: Amount,
        /// Configured minimum.
        min: Amount,
    },

    /// Withdrawal below the configured minimum.
    #[error("withdrawal of {shares} shares is below the minimum of {min}")]
    BelowMinWithdrawal {
        /// Shares offered.
        shares: Amount,
        /// Configured minimum.
        min: Amount,
    },

    /// The deposit would push total assets over the cap.
    #[error("deposit would bring total assets to {total_after}, above the cap of {cap}")]
    CapExceeded {
        /// Total assets after the deposit.
        total_after: Amount,
        /// Current cap.
        cap: Amount,
    },

    /// More shares requested than the owner can redeem.
    #[error("requested {requested} shares but at most {max} are redeemable")]
    ExceedsRedeemable {
        /// Shares requested.
        requested: Amount,
        /// Owner's redeemable shares.
        max: Amount,
    },

    /// The deposit is too small to mint a single share unit.
    #[error("deposit converts to zero shares")]
    ZeroShares,

    /// The withdrawal is too small to be worth a single asset unit.
    #[error("withdrawal converts to zero assets")]
    ZeroAssets,

    /// Fee above 10 000 bps.
    #[error("fee of {0} bps exceeds the maximum of 10000")]
    FeeTooHigh(u16),

    /// Protocol withdrawal larger than the unreserved balance.
    #[error("requested {requested} of {asset} but only {available} is available")]
    InsufficientAvailable {
        /// Asset requested.
        asset: Address,
        /// Amount requested.
        requested: Amount,
        /// Balance minus reserves.
        available: Amount,
    },

    /// Start-up configuration is inconsistent.
    #[error(transparent)]
    Config(#[from] ConfigError),

    // -- State --------------------------------------------------------------
    /// The vault's asset balance cannot cover a claim or a new reservation.
    #[error("vault holds {available} but {required} is needed")]
    InsufficientVaultBalance {
        /// Assets needed for the payout.
        required: Amount,
        /// Vault's balance of the underlying asset.
        available: Amount,
    },

    // -- Module errors ------------------------------------------------------
    /// Rate update or conversion failed.
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// Principal bookkeeping failed.
    #[error(transparent)]
    CostBasis(#[from] CostBasisError),

    /// Share ledger rejected the mutation.
    #[error(transparent)]
    Shares(#[from] ShareError),

    /// Withdrawal queue rejected the call.
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// Governance rejected the call.
    #[error(transparent)]
    Governance(#[from] GovernanceError),

    /// The asset ledger rejected a transfer.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Checked arithmetic failed.
    #[error(transparent)]
    Math(#[from] MathError),
}

impl From<QuorumError> for VaultError {
    fn from(err: QuorumError) -> Self {
        VaultError::Governance(err.into())
    }
}

impl From<SignerSetError> for VaultError {
    fn from(err: SignerSetError) -> Self {
        VaultError::Governance(err.into())
    }
}

impl VaultError {
    /// The failure class.
    pub fn kind(&self) -> ErrorKind {
        use ErrorKind::*;
        match self {
            VaultError::Unauthorized { .. }
            | VaultError::NotSigner(_)
            | VaultError::NotWhitelisted(_) => Authorization,

            VaultError::ZeroAmount
            | VaultError::ZeroAddress(_)
            | VaultError::BelowMinDeposit { .. }
            | VaultError::BelowMinWithdrawal { .. }
            | VaultError::CapExceeded { .. }
            | VaultError::ExceedsRedeemable { .. }
            | VaultError::ZeroShares
            | VaultError::ZeroAssets
            | VaultError::FeeTooHigh(_)
            | VaultError::InsufficientAvailable { .. }
            | VaultError::Config(_) => Validation,

            VaultError::InsufficientVaultBalance { .. } => State,

            VaultError::Conversion(e) => match e {
                ConversionError::RateBelowFloor { .. } | ConversionError::RateStale { .. } => {
                    Validation
                }
                ConversionError::Math(_) => Arithmetic,
            },
            VaultError::CostBasis(e) => match e {
                CostBasisError::InsufficientShares { .. } => State,
                CostBasisError::Math(_) => Arithmetic,
            },
            VaultError::Shares(e) => match e {
                ShareError::InsufficientBalance { .. } => State,
                ShareError::SupplyOverflow { .. } => Arithmetic,
            },
            VaultError::Queue(e) => match e {
                QueueError::NotOwner { .. } => Authorization,
                QueueError::RequestNotFound(_)
                | QueueError::EmptyBatch
                | QueueError::InvalidRange { .. } => Validation,
                QueueError::AlreadyClaimed(_) | QueueError::RedemptionPending { .. } => State,
                QueueError::Math(_) => Arithmetic,
            },
            VaultError::Governance(e) => match e {
                GovernanceError::ZeroTarget => Validation,
                GovernanceError::Quorum(q) => match q {
                    QuorumError::NotSigner(_) => Authorization,
                    QuorumError::InvalidProposal(_) => Validation,
                    QuorumError::AlreadyApproved(_)
                    | QuorumError::AlreadyExecuted(_)
                    | QuorumError::ConflictingPayload(_) => State,
                },
                GovernanceError::SignerSet(s) => match s {
                    SignerSetError::ZeroAddress => Validation,
                    SignerSetError::AlreadySigner(_)
                    | SignerSetError::UnknownSigner(_)
                    | SignerSetError::BelowFloor { .. }
                    | SignerSetError::FloorTooLow(_) => State,
                },
            },
            VaultError::Ledger(e) => match e {
                LedgerError::InsufficientBalance { .. } => State,
                LedgerError::Overflow { .. } => Arithmetic,
            },
            VaultError::Math(_) => Arithmetic,
        }
    }
}
