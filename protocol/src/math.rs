//! # Fixed-Point Multiply-Divide
//!
//! Share/asset conversion multiplies an 18-decimal share amount by an
//! 18-decimal rate before dividing by 1e30. The intermediate product blows
//! through `u128` for perfectly ordinary balances (1 000 shares is already
//! 1e39), so [`mul_div`] widens both operands to [`U256`] before
//! multiplying. Only the *quotient* has to fit in `u128`.
//!
//! Rounding is always chosen by the caller. The vault rounds against the
//! user on both sides of the book: deposits floor the shares minted, mints
//! ceil the assets charged, redemptions floor the assets paid out.

use primitive_types::U256;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced by checked fixed-point arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MathError {
    /// The denominator was zero.
    #[error("division by zero")]
    DivisionByZero,

    /// The result does not fit in 128 bits.
    #[error("arithmetic overflow")]
    Overflow,
}

/// Direction in which a non-exact quotient is rounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rounding {
    /// Toward zero.
    Floor,
    /// Away from zero.
    Ceil,
}

/// Computes `a * b / denominator` with a full-width intermediate product.
///
/// # Errors
///
/// Returns [`MathError::DivisionByZero`] when `denominator == 0`, and
/// [`MathError::Overflow`] when the rounded quotient exceeds `u128::MAX`.
pub fn mul_div(a: u128, b: u128, denominator: u128, rounding: Rounding) -> Result<u128, MathError> {
    if denominator == 0 {
        return Err(MathError::DivisionByZero);
    }

    // Two u128 factors cannot overflow 256 bits.
    let product = U256::from(a) * U256::from(b);
    let (quotient, remainder) = product.div_mod(U256::from(denominator));
    if quotient > U256::from(u128::MAX) {
        return Err(MathError::Overflow);
    }
    let quotient = quotient.low_u128();

    match rounding {
        Rounding::Ceil if !remainder.is_zero() => {
            quotient.checked_add(1).ok_or(MathError::Overflow)
        }
        _ => Ok(quotient),
    }
}
