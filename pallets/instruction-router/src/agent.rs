//! Agent execution loop.
//!
//! Only reachable from `execute` and from the flash-loan adapter acting for the agent of the
//! running batch; there is no dispatchable that runs instructions on an arbitrary agent.

use crate::{
  CallbackSession, Config, Error, FlashLoanSession, LOG_TARGET, MAX_CALL_DECODE_DEPTH, Pallet,
  resolver,
  types::{InputAmount, Instruction, NativeWrapper, WrapMode},
};
use alloc::vec::Vec;
use codec::DecodeLimit;
use polkadot_sdk::frame_support::{ensure, traits::Contains};
use polkadot_sdk::frame_system::RawOrigin;
use polkadot_sdk::sp_runtime::{DispatchResult, traits::Dispatchable};
use primitives::{AssetInspector, AssetKind, Balance};

type RuntimeCallOf<T> = <T as polkadot_sdk::frame_system::Config>::RuntimeCall;

impl<T: Config> Pallet<T> {
  pub(crate) fn decode_call(payload: &[u8]) -> Option<RuntimeCallOf<T>> {
    RuntimeCallOf::<T>::decode_all_with_depth_limit(MAX_CALL_DECODE_DEPTH, &mut &payload[..]).ok()
  }

  /// Dispatches auxiliary payloads as `user`, then runs `instructions` on `agent`.
  pub(crate) fn run(
    user: &T::AccountId,
    agent: &T::AccountId,
    datas: Vec<Vec<u8>>,
    instructions: Vec<Instruction<T::AccountId>>,
  ) -> DispatchResult {
    for data in datas.iter() {
      let call = Self::decode_call(data).ok_or(Error::<T>::InvalidInput)?;
      ensure!(
        T::AuxiliaryCallFilter::contains(&call),
        Error::<T>::AuxiliaryCallFiltered
      );
      call
        .dispatch(RawOrigin::Signed(user.clone()).into())
        .map_err(|e| e.error)?;
    }
    Self::run_instructions(agent, instructions)
  }

  /// Runs `instructions` strictly in order; the first failure aborts the batch.
  pub(crate) fn run_instructions(
    agent: &T::AccountId,
    instructions: Vec<Instruction<T::AccountId>>,
  ) -> DispatchResult {
    for (index, instruction) in instructions.into_iter().enumerate() {
      log::debug!(
        target: LOG_TARGET,
        "agent {:?} instruction #{} -> {:?}",
        agent,
        index,
        instruction.target,
      );
      Self::run_instruction(agent, instruction)?;
    }
    Ok(())
  }

  fn run_instruction(agent: &T::AccountId, instruction: Instruction<T::AccountId>) -> DispatchResult {
    let Instruction {
      target,
      mut call_data,
      inputs,
      wrap_mode,
      approval_target,
      callback,
    } = instruction;
    let wrapped = T::Wrapper::wrapped_asset();

    let mut value: Balance = 0;
    let mut wrap_amount: Balance = 0;
    for input in inputs.iter() {
      let wrapping = wrap_mode == WrapMode::WrapBefore && Some(input.asset) == wrapped;
      let amount = resolver::resolve(input, |asset| {
        // Wrapped inputs are sized from the native balance that is about to be wrapped
        if wrapping {
          Self::balance_of(&AssetKind::Native, agent)
        } else {
          Self::balance_of(asset, agent)
        }
      })
      .map_err(Error::<T>::from)?;
      if let InputAmount::PatchedShare { offset, .. } = input.amount {
        resolver::patch_amount(&mut call_data, offset, amount).map_err(Error::<T>::from)?;
      }
      if input.asset.is_native() {
        value = value.saturating_add(amount);
        continue;
      }
      if wrapping {
        wrap_amount = wrap_amount.saturating_add(amount);
      }
      if let Some(spender) = approval_target.as_ref() {
        Self::approve_asset(&input.asset, agent, spender, amount)?;
      }
    }

    if wrap_amount > 0 {
      T::Wrapper::wrap(agent, wrap_amount)?;
    }
    let unwrap_from = match (wrap_mode, wrapped) {
      (WrapMode::UnwrapAfter, Some(asset)) => Some((asset, Self::balance_of(&asset, agent))),
      _ => None,
    };

    if let Some(adapter) = callback.as_ref() {
      ensure!(
        FlashLoanSession::<T>::get() == CallbackSession::Idle,
        Error::<T>::InvalidCallbackState
      );
      FlashLoanSession::<T>::put(CallbackSession::LoanRequested {
        agent: agent.clone(),
        callback: adapter.clone(),
      });
    }

    Self::transfer_asset(&AssetKind::Native, agent, &target, value)?;
    if !call_data.is_empty() {
      let call = Self::decode_call(&call_data).ok_or(Error::<T>::InstructionFailed)?;
      call
        .dispatch(RawOrigin::Signed(agent.clone()).into())
        .map_err(|e| e.error)?;
    }

    if callback.is_some() {
      match FlashLoanSession::<T>::get() {
        CallbackSession::Settled { agent: settled } if settled == *agent => {
          FlashLoanSession::<T>::kill();
        }
        _ => return Err(Error::<T>::CallbackNotConsumed.into()),
      }
    }

    if let Some((asset, before)) = unwrap_from {
      let received = Self::balance_of(&asset, agent).saturating_sub(before);
      if received > 0 {
        T::Wrapper::unwrap(agent, received)?;
      }
    }
    Ok(())
  }
}
