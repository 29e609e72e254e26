//! Flash-loan collaboration interface.
//!
//! A provider advances `amounts` of `assets` to `receiver`, then hands control to the
//! recipient exactly once before checking its own repayment.

use crate::{AssetKind, Balance};
use alloc::vec::Vec;
use polkadot_sdk::sp_runtime::{DispatchResult, Weight};

/// Implemented by whoever accepts flash-loan callbacks from a provider.
pub trait FlashLoanRecipient<AccountId> {
  /// Called by the provider after the loaned assets reached `receiver`.
  ///
  /// `fees` holds the provider's own fee per asset, owed on top of the principal.
  fn on_flash_loan(
    provider: &AccountId,
    receiver: &AccountId,
    assets: &[AssetKind],
    amounts: &[Balance],
    fees: &[Balance],
    user_data: Vec<u8>,
  ) -> DispatchResult;

  /// Upper bound of the work `on_flash_loan` does for a loan of `assets` carrying `user_data`.
  ///
  /// Providers add it to the weight of the call that issues the loan.
  fn on_flash_loan_weight(assets: u32, user_data: &[u8]) -> Weight;
}
