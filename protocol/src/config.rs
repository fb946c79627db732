//! # Vault Configuration & Constants
//!
//! Every magic number in Meridian lives here. If you're hardcoding a scale
//! factor somewhere else, you are about to ship a decimals bug.
//!
//! The vault supports exactly one precision profile: a 6-decimal underlying
//! asset and an 18-decimal share. The conversion scale below bakes that in.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Address, Amount};

// ---------------------------------------------------------------------------
// Precision
// ---------------------------------------------------------------------------

/// Fixed-point scale of the exchange rate. A rate of `RATE_SCALE` means one
/// whole share is worth one whole asset.
pub const RATE_SCALE: u128 = 1_000_000_000_000_000_000;

/// Decimals of the underlying asset (USDC-style).
pub const ASSET_DECIMALS: u8 = 6;

/// Decimals of the vault share.
pub const SHARE_DECIMALS: u8 = 18;

/// `10^(SHARE_DECIMALS - ASSET_DECIMALS)`.
pub const DECIMALS_OFFSET_SCALE: u128 = 1_000_000_000_000;

/// Denominator for share/asset conversion: `RATE_SCALE * DECIMALS_OFFSET_SCALE`.
///
/// `assets = shares * rate / CONVERSION_SCALE`
/// `shares = assets * CONVERSION_SCALE / rate`
pub const CONVERSION_SCALE: u128 = RATE_SCALE * DECIMALS_OFFSET_SCALE;

/// One whole unit of the underlying asset.
pub const ONE_ASSET: Amount = 1_000_000;

/// One whole share.
pub const ONE_SHARE: Amount = 1_000_000_000_000_000_000;

// ---------------------------------------------------------------------------
// Fees
// ---------------------------------------------------------------------------

/// Basis-point denominator. 10 000 bps = 100%.
pub const BPS_DENOMINATOR: u128 = 10_000;

/// Highest configurable performance fee. A 100% fee takes all profit and
/// never touches principal, so this is also the hard ceiling.
pub const MAX_FEE_BPS: u16 = 10_000;

// ---------------------------------------------------------------------------
// Governance
// ---------------------------------------------------------------------------

/// The signer set can never shrink below this many members, regardless of
/// what the configuration asks for.
pub const MIN_SIGNER_FLOOR: usize = 2;

// ---------------------------------------------------------------------------
// Timing defaults
// ---------------------------------------------------------------------------

/// Default delay between a withdrawal request and its claim: 7 days.
pub const DEFAULT_REDEMPTION_PERIOD_SECS: u64 = 7 * 24 * 60 * 60;

/// Default maximum age of the exchange rate before rate-dependent calls are
/// refused: 1 day.
pub const DEFAULT_RATE_EXPIRE_SECS: u64 = 24 * 60 * 60;

// ---------------------------------------------------------------------------
// VaultConfig
// ---------------------------------------------------------------------------

/// Errors found while validating a [`VaultConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A required address is zero.
    #[error("{0} must be a non-zero address")]
    ZeroAddress(&'static str),

    /// The initial rate sits below the configured floor.
    #[error("initial rate {rate} is below the minimum rate {min_rate}")]
    RateBelowFloor {
        /// Configured starting rate.
        rate: u128,
        /// Configured floor.
        min_rate: u128,
    },

    /// The performance fee exceeds [`MAX_FEE_BPS`].
    #[error("fee of {0} bps exceeds the maximum of 10000")]
    FeeTooHigh(u16),

    /// The signer floor is below [`MIN_SIGNER_FLOOR`].
    #[error("signer floor {0} is below the hard minimum of 2")]
    SignerFloorTooLow(usize),
}

/// Start-up parameters of a vault. Everything here except the addresses can
/// be changed later by an admin or by signer quorum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// The vault's own account in the asset ledger.
    pub vault_address: Address,
    /// The underlying deposit asset.
    pub asset: Address,
    /// Receives performance fees at claim time.
    pub treasury: Address,
    /// Exchange rate at genesis, scaled by [`RATE_SCALE`].
    #[serde(with = "crate::types::amount_serde")]
    pub initial_rate: u128,
    /// Lowest rate an updater may ever set.
    #[serde(with = "crate::types::amount_serde")]
    pub min_rate: u128,
    /// Seconds after an update at which the rate is considered stale.
    pub rate_expire_secs: u64,
    /// Seconds between a withdrawal request and its claim.
    pub redemption_period_secs: u64,
    /// Performance fee on profit, in basis points.
    pub fee_bps: u16,
    /// Smallest accepted deposit in asset units.
    #[serde(with = "crate::types::amount_serde")]
    pub min_deposit: Amount,
    /// Smallest accepted withdrawal in shares. Zero disables the check.
    #[serde(with = "crate::types::amount_serde")]
    pub min_withdrawal_shares: Amount,
    /// Upper bound on `total_assets()` after a deposit.
    #[serde(with = "crate::types::amount_serde")]
    pub assets_cap: Amount,
    /// Minimum size of the signer set.
    pub signer_floor: usize,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            vault_address: Address::from_low_u8(0xee),
            asset: Address::from_low_u8(0xa0),
            treasury: Address::from_low_u8(0xfe),
            initial_rate: RATE_SCALE,
            min_rate: RATE_SCALE / 2,
            rate_expire_secs: DEFAULT_RATE_EXPIRE_SECS,
            redemption_period_secs: DEFAULT_REDEMPTION_PERIOD_SECS,
            fee_bps: 2_000,
            min_deposit: ONE_ASSET,
            min_withdrawal_shares: 0,
            assets_cap: 1_000_000_000 * ONE_ASSET,
            signer_floor: MIN_SIGNER_FLOOR,
        }
    }
}

impl VaultConfig {
    /// Checks internal consistency. Does not look at signers; the signer set
    /// validates itself against `signer_floor`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.vault_address.is_zero() {
            return Err(ConfigError::ZeroAddress("vault_address"));
        }
        if self.asset.is_zero() {
            return Err(ConfigError::ZeroAddress("asset"));
        }
        if self.treasury.is_zero() {
            return Err(ConfigError::ZeroAddress("treasury"));
        }
        if self.initial_rate < self.min_rate || self.initial_rate == 0 {
            return Err(ConfigError::RateBelowFloor {
                rate: self.initial_rate,
                min_rate: self.min_rate,
            });
        }
        if self.fee_bps > MAX_FEE_BPS {
            return Err(ConfigError::FeeTooHigh(self.fee_bps));
        }
        if self.signer_floor < MIN_SIGNER_FLOOR {
            return Err(ConfigError::SignerFloorTooLow(self.signer_floor));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversion_scale_matches_decimals() {
        assert_eq!(
            DECIMALS_OFFSET_SCALE,
            10u128.pow(u32::from(SHARE_DECIMALS - ASSET_DECIMALS))
        );
        assert_eq!(CONVERSION_SCALE, 10u128.pow(30));
        assert_eq!(ONE_SHARE, RATE_SCALE);
    }

    #[test]
    fn default_config_is_valid() {
        VaultConfig::default().validate().unwrap();
    }

    #[test]
    fn rate_below_floor_rejected() {
        let cfg = VaultConfig {
            initial_rate: 1,
            min_rate: 2,
            ..VaultConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::RateBelowFloor { .. })));
    }

    #[test]
    fn zero_rate_rejected_even_with_zero_floor() {
        let cfg = VaultConfig {
            initial_rate: 0,
            min_rate: 0,
            ..VaultConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn excessive_fee_rejected() {
        let cfg = VaultConfig {
            fee_bps: 10_001,
            ..VaultConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::FeeTooHigh(10_001)));
    }

    #[test]
    fn signer_floor_has_hard_minimum() {
        let cfg = VaultConfig {
            signer_floor: 1,
            ..VaultConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::SignerFloorTooLow(1)));
    }

    #[test]
    fn zero_treasury_rejected() {
        let cfg = VaultConfig {
            treasury: Address::ZERO,
            ..VaultConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroAddress("treasury")));
    }
}
