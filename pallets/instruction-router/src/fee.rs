//! Basis-point fee arithmetic.
//!
//! Fees round down, so splitting an amount never charges more than the combined amount would.

use primitives::{Balance, params::BPS_BASE};
use sp_arithmetic::{Rounding, helpers_128bit::multiply_by_rational_with_rounding};

/// `floor(amount * bps / 10_000)`, saturating when `bps` exceeds the base.
pub fn mul_bps_floor(amount: Balance, bps: u16) -> Balance {
  multiply_by_rational_with_rounding(
    amount,
    Balance::from(bps),
    Balance::from(BPS_BASE),
    Rounding::Down,
  )
  .unwrap_or(Balance::MAX)
}

/// Protocol fee owed on `amount` at `fee_rate` basis points.
pub fn calc_fee_from_amount(amount: Balance, fee_rate: u16) -> Balance {
  mul_bps_floor(amount, fee_rate)
}

/// `amount` plus its protocol fee.
pub fn calc_amount_with_fee(amount: Balance, fee_rate: u16) -> Balance {
  amount.saturating_add(calc_fee_from_amount(amount, fee_rate))
}
