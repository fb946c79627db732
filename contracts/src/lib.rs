//! # Meridian Vault Contracts
//!
//! A pooled-capital vault priced by an externally pushed exchange rate.
//! Depositors receive shares, withdrawals go through a time-locked request
//! queue, and a fixed committee of signers governs the sensitive knobs by
//! N-of-M vote.
//!
//! - **Conversion**: shares to assets and back through one scaled rate,
//!   refused once the rate goes stale.
//! - **Cost Basis**: per-holder principal, so fees only touch profit.
//! - **Fees**: performance fee on the profit part of a withdrawal.
//! - **Shares**: share supply and balances.
//! - **Withdrawal Queue**: request log, claim guards, running totals.
//! - **Quorum**: generic keyed and singleton approval tracking.
//! - **Governance**: whitelist, signer set and deposit cap under quorum.
//! - **Vault**: the facade tying all of the above together.
//! - **Service**: single-writer, copy-on-write access from many threads.
//!
//! ## Design Principles
//!
//! 1. All monetary operations are checked. `u128` plus `mul_div` with an
//!    explicit rounding direction, always against the caller.
//! 2. An operation validates everything before it mutates anything, and
//!    updates its own books before it moves tokens.
//! 3. Every public type is serializable (serde) for the API and for state
//!    snapshots.

pub mod conversion;
pub mod cost_basis;
pub mod errors;
pub mod events;
pub mod fees;
pub mod governance;
pub mod quorum;
pub mod service;
pub mod shares;
pub mod vault;
pub mod withdrawal_queue;

pub use errors::{ErrorKind, VaultError};
pub use events::VaultEvent;
pub use service::{Committed, VaultService};
pub use vault::{AccountView, Vault, VaultState, VaultStatus};
