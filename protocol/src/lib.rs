// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Meridian Protocol: Core Primitives
//!
//! The vault in `meridian-contracts` is built on a handful of small,
//! dependency-light building blocks. They live here so that the node, the
//! contracts, and any tooling agree on exactly one definition of each:
//!
//! - **config**: Constants (scales, decimals, floors) and [`config::VaultConfig`].
//! - **math**: `mul_div` with a 256-bit intermediate and explicit rounding.
//!   Every share/asset conversion goes through it.
//! - **types**: [`types::Address`] and the amount/time aliases.
//! - **clock**: Where "now" comes from. Real clock in production, a manual
//!   one in tests.
//! - **permissions**: The capability lookup ("does P hold C?") that gates
//!   admin and rate-updater entry points.
//! - **ledger**: The fungible-token ledger the vault moves assets through.
//!
//! ## Design Philosophy
//!
//! 1. Money is `u128` and every operation on it is checked.
//! 2. Rounding is never implicit. Callers say which way they want it.
//! 3. External collaborators are traits; the in-memory implementations are
//!    real enough to run a node against.

pub mod clock;
pub mod config;
pub mod ledger;
pub mod math;
pub mod permissions;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use math::{mul_div, MathError, Rounding};
pub use types::{Address, Amount, RequestId, Timestamp};
