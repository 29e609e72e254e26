//! Ecosystem constants shared by the instruction router and its collaborators.
//!
//! Pallet IDs and basis-point parameters live here so that runtime configuration and
//! tests agree on a single definition.

/// Balance type alias for consistency across the workspace
pub type Balance = u128;

/// Pallet identifiers for deriving pallet-owned accounts.
///
/// Used by `PalletId::into_account_truncating()`. With compact `AccountId` types only the
/// first four bytes survive truncation, so every identifier differs within that prefix.
pub mod pallet_ids {
  /// Instruction router pallet ID (router and flash-loan callback adapter account)
  pub const INSTRUCTION_ROUTER_PALLET_ID: &[u8; 8] = b"py/irout";

  /// Flash vault pallet ID (liquidity provider account)
  pub const FLASH_VAULT_PALLET_ID: &[u8; 8] = b"py/flvlt";
}

/// Fee and input-resolution parameters.
pub mod params {
  use super::Balance;
  use sp_arithmetic::Permill;

  /// Denominator of every basis-point rate (100% = 10_000 bps).
  pub const BPS_BASE: u16 = 10_000;

  /// Protocol fee charged on flash-loan principal (0.05%).
  pub const DEFAULT_FEE_RATE_BPS: u16 = 5;

  /// Sentinel for `amount_or_offset` meaning "no payload patch" on a share input.
  pub const OFFSET_NOT_USED: Balance = Balance::MAX;

  /// Width in bytes of a patched amount (little-endian `u128`).
  pub const PATCHED_AMOUNT_LEN: u32 = 16;

  /// Provider fee charged by the flash vault (0.01%).
  pub const DEFAULT_FLASH_LOAN_FEE: Permill = Permill::from_parts(100);

  /// Audit tag attached to every `Charged` event: protocol and venue identifiers.
  pub const FLASH_LOAN_FEE_METADATA: [u8; 32] = *b"instruction-router:flash-vault\0\0";
}
