//! # Performance Fee Engine
//!
//! A withdrawal pays a fee only on the part of its gross value that exceeds
//! the principal it retires:
//!
//! ```text
//! profit = max(assets_gross - cost_basis, 0)
//! fee    = profit * fee_bps / 10_000          (floor)
//! net    = assets_gross - fee
//! ```
//!
//! With `fee_bps <= 10_000` the fee can never exceed the profit, so a
//! holder never pays out of principal.

use meridian_protocol::config::{BPS_DENOMINATOR, MAX_FEE_BPS};
use meridian_protocol::math::{mul_div, MathError, Rounding};
use meridian_protocol::types::{amount_serde, Amount};
use serde::{Deserialize, Serialize};

/// Full breakdown of a withdrawal's fee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeQuote {
    /// Floor-rounded asset value of the burned shares.
    #[serde(with = "amount_serde")]
    pub assets_gross: Amount,
    /// Principal retired by the burn.
    #[serde(with = "amount_serde")]
    pub cost_basis: Amount,
    /// `assets_gross - cost_basis`, or zero.
    #[serde(with = "amount_serde")]
    pub profit: Amount,
    /// Fee owed to the treasury.
    #[serde(with = "amount_serde")]
    pub fee: Amount,
    /// What the receiver gets.
    #[serde(with = "amount_serde")]
    pub assets_net: Amount,
}

/// Computes the fee quote for a withdrawal.
///
/// `fee_bps` above [`MAX_FEE_BPS`] is clamped; configuration setters reject
/// such values before they get here.
pub fn quote(assets_gross: Amount, cost_basis: Amount, fee_bps: u16) -> Result<FeeQuote, MathError> {
    let profit = assets_gross.saturating_sub(cost_basis);
    let bps = u128::from(fee_bps.min(MAX_FEE_BPS));

    let fee = if profit == 0 || bps == 0 {
        0
    } else {
        mul_div(profit, bps, BPS_DENOMINATOR, Rounding::Floor)?
    };

    Ok(FeeQuote {
        assets_gross,
        cost_basis,
        profit,
        fee,
        assets_net: assets_gross - fee,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_protocol::config::ONE_ASSET;
    use proptest::prelude::*;

    #[test]
    fn twenty_percent_of_ten_profit() {
        let q = quote(110 * ONE_ASSET, 100 * ONE_ASSET, 2_000).unwrap();
        assert_eq!(q.profit, 10 * ONE_ASSET);
        assert_eq!(q.fee, 2 * ONE_ASSET);
        assert_eq!(q.assets_net, 108 * ONE_ASSET);
    }

    #[test]
    fn loss_pays_no_fee() {
        let q = quote(90, 100, 2_000).unwrap();
        assert_eq!(q.profit, 0);
        assert_eq!(q.fee, 0);
        assert_eq!(q.assets_net, 90);
    }

    #[test]
    fn break_even_pays_no_fee() {
        let q = quote(100, 100, 10_000).unwrap();
        assert_eq!(q.fee, 0);
    }

    #[test]
    fn full_fee_takes_only_profit() {
        let q = quote(150, 100, 10_000).unwrap();
        assert_eq!(q.fee, 50);
        assert_eq!(q.assets_net, 100);
    }

    #[test]
    fn out_of_range_bps_is_clamped() {
        let q = quote(150, 100, u16::MAX).unwrap();
        assert_eq!(q.fee, 50);
    }

    proptest! {
        #[test]
        fn fee_bounded_by_profit_and_gross(
            gross in 0u128..(1u128 << 96),
            basis in 0u128..(1u128 << 96),
            bps in 0u16..=10_000,
        ) {
            let q = quote(gross, basis, bps).unwrap();
            prop_assert!(q.fee <= q.assets_gross);
            prop_assert!(q.fee <= q.profit);
            prop_assert_eq!(q.fee + q.assets_net, q.assets_gross);
            if gross <= basis {
                prop_assert_eq!(q.fee, 0);
            }
        }
    }
}
