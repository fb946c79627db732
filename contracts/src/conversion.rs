//! # Conversion Engine
//!
//! Maps shares to assets and back through a single exchange rate that an
//! off-chain updater pushes in. The engine never moves the rate on its own.
//!
//! ```text
//! assets = shares * rate / 1e30      (1e18 rate scale * 1e12 decimals offset)
//! shares = assets * 1e30 / rate
//! ```
//!
//! The rate also carries a freshness window. Once `now - update_time`
//! exceeds `expire_interval`, every rate-dependent vault call is refused
//! until an updater pushes a new value.

use meridian_protocol::config::CONVERSION_SCALE;
use meridian_protocol::math::{mul_div, MathError, Rounding};
use meridian_protocol::types::{Amount, Timestamp};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors produced by rate updates and conversions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    /// The proposed rate is below the floor.
    #[error("rate {rate} is below the floor {min_rate}")]
    RateBelowFloor {
        /// Rejected rate.
        rate: u128,
        /// Configured floor.
        min_rate: u128,
    },

    /// The rate has not been refreshed within the expire interval.
    #[error("exchange rate is stale: updated at {updated_at}, expires after {expire_interval}s, now {now}")]
    RateStale {
        /// Time of the last update.
        updated_at: Timestamp,
        /// Allowed age in seconds.
        expire_interval: u64,
        /// Time of the check.
        now: Timestamp,
    },

    /// Checked arithmetic failed.
    #[error(transparent)]
    Math(#[from] MathError),
}

// ---------------------------------------------------------------------------
// ExchangeRateState
// ---------------------------------------------------------------------------

/// The current rate and its freshness bookkeeping.
///
/// Invariant: `rate >= min_rate` and `rate > 0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeRateState {
    rate: u128,
    update_time: Timestamp,
    expire_interval: u64,
    min_rate: u128,
}

impl ExchangeRateState {
    /// Creates the rate state, stamping `now` as the first update.
    ///
    /// # Errors
    ///
    /// Returns [`ConversionError::RateBelowFloor`] if `rate < min_rate` or
    /// `rate == 0`.
    pub fn new(
        rate: u128,
        min_rate: u128,
        expire_interval: u64,
        now: Timestamp,
    ) -> Result<Self, ConversionError> {
        check_floor(rate, min_rate)?;
        Ok(Self {
            rate,
            update_time: now,
            expire_interval,
            min_rate,
        })
    }

    /// Current rate, scaled by 1e18.
    pub fn rate(&self) -> u128 {
        self.rate
    }

    /// Time of the last successful update.
    pub fn update_time(&self) -> Timestamp {
        self.update_time
    }

    /// Allowed rate age in seconds.
    pub fn expire_interval(&self) -> u64 {
        self.expire_interval
    }

    /// Lowest rate that can ever be set.
    pub fn min_rate(&self) -> u128 {
        self.min_rate
    }

    /// `true` once the rate is older than the expire interval.
    pub fn is_stale(&self, now: Timestamp) -> bool {
        now.saturating_sub(self.update_time) > self.expire_interval
    }

    /// Fails with [`ConversionError::RateStale`] if the rate is stale.
    pub fn ensure_fresh(&self, now: Timestamp) -> Result<(), ConversionError> {
        if self.is_stale(now) {
            return Err(ConversionError::RateStale {
                updated_at: self.update_time,
                expire_interval: self.expire_interval,
                now,
            });
        }
        Ok(())
    }

    /// Overwrites the rate and stamps `now`. Returns the previous rate.
    ///
    /// # Errors
    ///
    /// Returns [`ConversionError::RateBelowFloor`] if `new_rate < min_rate`.
    pub fn set_rate(&mut self, new_rate: u128, now: Timestamp) -> Result<u128, ConversionError> {
        check_floor(new_rate, self.min_rate)?;
        let previous = std::mem::replace(&mut self.rate, new_rate);
        self.update_time = now;
        Ok(previous)
    }

    /// Replaces the expire interval. Returns the previous value.
    pub fn set_expire_interval(&mut self, secs: u64) -> u64 {
        std::mem::replace(&mut self.expire_interval, secs)
    }

    /// Converts shares to assets at the current rate.
    pub fn to_assets(&self, shares: Amount, rounding: Rounding) -> Result<Amount, ConversionError> {
        Ok(mul_div(shares, self.rate, CONVERSION_SCALE, rounding)?)
    }

    /// Converts assets to shares at the current rate.
    pub fn to_shares(&self, assets: Amount, rounding: Rounding) -> Result<Amount, ConversionError> {
        Ok(mul_div(assets, CONVERSION_SCALE, self.rate, rounding)?)
    }
}

fn check_floor(rate: u128, min_rate: u128) -> Result<(), ConversionError> {
    if rate < min_rate || rate == 0 {
        return Err(ConversionError::RateBelowFloor { rate, min_rate });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_protocol::config::{ONE_ASSET, ONE_SHARE, RATE_SCALE};
    use proptest::prelude::*;

    fn state(rate: u128) -> ExchangeRateState {
        ExchangeRateState::new(rate, RATE_SCALE / 2, 3_600, 1_000).unwrap()
    }

    #[test]
    fn par_rate_converts_whole_units() {
        let s = state(RATE_SCALE);
        assert_eq!(s.to_assets(100 * ONE_SHARE, Rounding::Floor).unwrap(), 100 * ONE_ASSET);
        assert_eq!(s.to_shares(100 * ONE_ASSET, Rounding::Floor).unwrap(), 100 * ONE_SHARE);
    }

    #[test]
    fn appreciated_rate_pays_more_assets() {
        let s = state(RATE_SCALE + RATE_SCALE / 10);
        assert_eq!(s.to_assets(100 * ONE_SHARE, Rounding::Floor).unwrap(), 110 * ONE_ASSET);
    }

    #[test]
    fn rounding_direction_is_respected() {
        let s = state(RATE_SCALE);
        // One wei of share is worth 1e-12 asset units.
        assert_eq!(s.to_assets(1, Rounding::Floor).unwrap(), 0);
        assert_eq!(s.to_assets(1, Rounding::Ceil).unwrap(), 1);
    }

    #[test]
    fn set_rate_below_floor_rejected() {
        let mut s = state(RATE_SCALE);
        let err = s.set_rate(RATE_SCALE / 4, 2_000).unwrap_err();
        assert!(matches!(err, ConversionError::RateBelowFloor { .. }));
        assert_eq!(s.rate(), RATE_SCALE);
        assert_eq!(s.update_time(), 1_000);
    }

    #[test]
    fn set_rate_stamps_time_and_returns_previous() {
        let mut s = state(RATE_SCALE);
        let previous = s.set_rate(2 * RATE_SCALE, 5_000).unwrap();
        assert_eq!(previous, RATE_SCALE);
        assert_eq!(s.rate(), 2 * RATE_SCALE);
        assert_eq!(s.update_time(), 5_000);
    }

    #[test]
    fn staleness_boundary() {
        let s = state(RATE_SCALE);
        assert!(s.ensure_fresh(1_000 + 3_600).is_ok());
        assert!(matches!(
            s.ensure_fresh(1_000 + 3_601),
            Err(ConversionError::RateStale { .. })
        ));
    }

    #[test]
    fn clock_behind_update_is_not_stale() {
        let s = state(RATE_SCALE);
        assert!(!s.is_stale(0));
    }

    proptest! {
        #[test]
        fn round_trip_never_creates_value(
            shares in 0u128..(1u128 << 100),
            rate in (RATE_SCALE / 2)..(RATE_SCALE * 100),
        ) {
            let s = state(rate);
            let assets = s.to_assets(shares, Rounding::Floor).unwrap();
            let back = s.to_shares(assets, Rounding::Ceil).unwrap();
            prop_assert!(back <= shares);
        }
    }
}
