//! Input resolution shared by top-level and nested batches.
//!
//! Resolution only reads balances. Patching mutates the in-flight copy of a call payload,
//! never the submitted instruction.

use crate::{
  fee::mul_bps_floor,
  types::{AssetKind, Balance, InputAmount, InputSpec},
};
use primitives::params::{BPS_BASE, PATCHED_AMOUNT_LEN};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResolveError {
  /// Share outside `1..=10_000` basis points
  InvalidBps,
  /// Patch window does not fit inside the call payload
  PatchOutOfBounds,
}

fn check_bps(bps: u16) -> Result<(), ResolveError> {
  if bps == 0 || bps > BPS_BASE {
    return Err(ResolveError::InvalidBps);
  }
  Ok(())
}

fn patch_window(offset: u32) -> Option<core::ops::Range<usize>> {
  let start = usize::try_from(offset).ok()?;
  let end = start.checked_add(PATCHED_AMOUNT_LEN as usize)?;
  Some(start..end)
}

/// Checks an input against the payload it belongs to, before anything executes.
pub fn validate(spec: &InputSpec, call_data_len: usize) -> Result<(), ResolveError> {
  match spec.amount {
    InputAmount::Fixed(_) => Ok(()),
    InputAmount::BalanceShare(bps) => check_bps(bps),
    InputAmount::PatchedShare { bps, offset } => {
      check_bps(bps)?;
      match patch_window(offset) {
        Some(window) if window.end <= call_data_len => Ok(()),
        _ => Err(ResolveError::PatchOutOfBounds),
      }
    }
  }
}

/// Concrete amount for `spec`, reading the current balance through `balance_of`.
pub fn resolve(
  spec: &InputSpec,
  balance_of: impl FnOnce(&AssetKind) -> Balance,
) -> Result<Balance, ResolveError> {
  match spec.amount {
    InputAmount::Fixed(amount) => Ok(amount),
    InputAmount::BalanceShare(bps) | InputAmount::PatchedShare { bps, .. } => {
      check_bps(bps)?;
      Ok(mul_bps_floor(balance_of(&spec.asset), bps))
    }
  }
}

/// Writes `amount` as a little-endian `u128` at `offset`.
pub fn patch_amount(call_data: &mut [u8], offset: u32, amount: Balance) -> Result<(), ResolveError> {
  let window = patch_window(offset).ok_or(ResolveError::PatchOutOfBounds)?;
  let slot = call_data
    .get_mut(window)
    .ok_or(ResolveError::PatchOutOfBounds)?;
  slot.copy_from_slice(&amount.to_le_bytes());
  Ok(())
}
