//! Flash-loan callback adapter.
//!
//! The pallet account receives the loan, forwards it to the agent of the running batch,
//! runs the nested batch and settles fees and repayment. Settlement either completes for every
//! loaned asset or the whole extrinsic fails.

use crate::{
  CallbackSession, Config, CurrentExecution, Error, Event, FeeCollector, FlashLoanSession,
  LOG_TARGET, MAX_CALL_DECODE_DEPTH, Pallet, WeightInfo, fee, types::Instruction,
};
use alloc::vec::Vec;
use codec::DecodeLimit;
use polkadot_sdk::frame_support::{ensure, traits::Get};
use polkadot_sdk::frame_system::RawOrigin;
use polkadot_sdk::sp_runtime::{DispatchResult, Weight};
use primitives::{AssetKind, Balance, FlashLoanRecipient};

impl<T: Config> Pallet<T> {
  fn decode_nested(user_data: &[u8]) -> Option<Vec<Instruction<T::AccountId>>> {
    Vec::<Instruction<T::AccountId>>::decode_all_with_depth_limit(
      MAX_CALL_DECODE_DEPTH,
      &mut &user_data[..],
    )
    .ok()
  }

  /// Settlement plus the nested batch carried by `user_data`.
  pub fn callback_weight(assets: u32, user_data: &[u8]) -> Weight {
    let nested = Self::decode_nested(user_data).unwrap_or_default();
    T::WeightInfo::receive_flash_loan(assets)
      .saturating_add(T::WeightInfo::execute(nested.len() as u32, 0))
      .saturating_add(Self::payloads_weight(&[], &nested))
  }

  pub(crate) fn settle_flash_loan(
    provider: &T::AccountId,
    assets: Vec<AssetKind>,
    amounts: Vec<Balance>,
    provider_fees: Vec<Balance>,
    user_data: Vec<u8>,
  ) -> DispatchResult {
    let adapter = Self::account_id();
    let agent = match FlashLoanSession::<T>::get() {
      CallbackSession::LoanRequested { agent, callback } if callback == adapter => agent,
      _ => return Err(Error::<T>::InvalidCallbackState.into()),
    };
    let context = CurrentExecution::<T>::get()
      .filter(|context| context.agent == agent)
      .ok_or(Error::<T>::InvalidCallbackState)?;

    ensure!(
      assets.len() == amounts.len() && assets.len() == provider_fees.len(),
      Error::<T>::InvalidInput
    );
    for (i, asset) in assets.iter().enumerate() {
      ensure!(!assets[..i].contains(asset), Error::<T>::InvalidInput);
    }
    let instructions = Self::decode_nested(&user_data).ok_or(Error::<T>::InvalidInput)?;
    Self::validate_instructions(&instructions)?;

    FlashLoanSession::<T>::put(CallbackSession::CallbackActive {
      agent: agent.clone(),
    });
    let mut initial_balances = Vec::with_capacity(assets.len());
    for (asset, amount) in assets.iter().zip(amounts.iter()) {
      initial_balances.push(Self::balance_of(asset, &adapter));
      Self::snapshot_residual(asset, &agent);
      Self::transfer_asset(asset, &adapter, &agent, *amount)?;
    }
    for instruction in instructions.iter() {
      for input in instruction.inputs.iter() {
        Self::snapshot_residual(&input.asset, &agent);
      }
    }

    log::debug!(
      target: LOG_TARGET,
      "running {} nested instruction(s) for agent {:?}",
      instructions.len(),
      agent,
    );
    Self::run_instructions(&agent, instructions)?;

    let collector = FeeCollector::<T>::get();
    let metadata = T::FlashLoanFeeMetadata::get();
    for (i, asset) in assets.iter().enumerate() {
      let amount = amounts[i];
      let provider_fee = provider_fees[i];
      let protocol_fee = fee::calc_fee_from_amount(amount, context.fee_rate);
      // Pre-loan balance plus principal, protocol fee and provider fee
      let required = initial_balances[i]
        .saturating_sub(amount)
        .saturating_add(fee::calc_amount_with_fee(amount, context.fee_rate))
        .saturating_add(provider_fee);
      ensure!(
        Self::balance_of(asset, &adapter) >= required,
        Error::<T>::InsufficientFlashLoanRepayment
      );
      if protocol_fee > 0 {
        Self::transfer_asset(asset, &adapter, &collector, protocol_fee)?;
        Self::deposit_event(Event::Charged {
          asset: *asset,
          amount: protocol_fee,
          metadata,
        });
      }
      Self::transfer_asset(asset, &adapter, provider, amount.saturating_add(provider_fee))?;
      ensure!(
        Self::balance_of(asset, &adapter) == initial_balances[i].saturating_sub(amount),
        Error::<T>::UnexpectedCallbackBalance
      );
    }

    FlashLoanSession::<T>::put(CallbackSession::Settled {
      agent: agent.clone(),
    });
    Self::deposit_event(Event::FlashLoanSettled { agent, assets });
    Ok(())
  }
}

impl<T: Config> FlashLoanRecipient<T::AccountId> for Pallet<T> {
  fn on_flash_loan(
    provider: &T::AccountId,
    receiver: &T::AccountId,
    assets: &[AssetKind],
    amounts: &[Balance],
    fees: &[Balance],
    user_data: Vec<u8>,
  ) -> DispatchResult {
    ensure!(
      *receiver == Self::account_id(),
      Error::<T>::InvalidCallbackState
    );
    Self::receive_flash_loan(
      RawOrigin::Signed(provider.clone()).into(),
      assets.to_vec(),
      amounts.to_vec(),
      fees.to_vec(),
      user_data,
    )
  }

  fn on_flash_loan_weight(assets: u32, user_data: &[u8]) -> Weight {
    Self::callback_weight(assets, user_data)
  }
}
