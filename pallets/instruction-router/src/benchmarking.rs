#![cfg(feature = "runtime-benchmarks")]

extern crate alloc;

use crate::*;
use alloc::vec;
use alloc::vec::Vec;
use codec::Encode;
use frame::prelude::*;
use polkadot_sdk::frame_benchmarking::v2::*;
use polkadot_sdk::frame_system::{self, RawOrigin};
use primitives::AssetKind;

#[benchmarks]
mod benches {
  use super::*;

  #[benchmark]
  fn new_agent() {
    let caller: T::AccountId = whitelisted_caller();

    #[extrinsic_call]
    _(RawOrigin::Signed(caller.clone()));

    assert!(Agents::<T>::contains_key(&caller));
  }

  #[benchmark]
  fn execute(
    n: Linear<0, { T::MaxInstructions::get() }>,
    d: Linear<0, { T::MaxAuxiliaryPayloads::get() }>,
  ) {
    let caller: T::AccountId = whitelisted_caller();
    let instructions: Vec<Instruction<T::AccountId>> = (0..n)
      .map(|_| Instruction::call(caller.clone(), Vec::new()))
      .collect();
    let remark: <T as frame_system::Config>::RuntimeCall =
      frame_system::Call::<T>::remark { remark: Vec::new() }.into();
    let datas: Vec<Vec<u8>> = (0..d).map(|_| remark.encode()).collect();

    #[extrinsic_call]
    _(
      RawOrigin::Signed(caller.clone()),
      datas,
      instructions,
      vec![AssetKind::Native],
      0,
      0u128,
    );

    assert!(CurrentExecution::<T>::get().is_none());
    assert!(Agents::<T>::contains_key(&caller));
  }

  #[benchmark]
  fn receive_flash_loan(a: Linear<1, 8>) {
    let user: T::AccountId = whitelisted_caller();
    let agent = Pallet::<T>::agent_account_id(&user);
    let provider = T::FlashLoanProvider::get();
    CurrentExecution::<T>::put(ExecutionContext {
      user,
      agent: agent.clone(),
      fee_rate: 0,
    });
    FlashLoanSession::<T>::put(CallbackSession::LoanRequested {
      agent: agent.clone(),
      callback: Pallet::<T>::account_id(),
    });
    let assets: Vec<AssetKind> = (0..a)
      .map(|i| if i == 0 { AssetKind::Native } else { AssetKind::Local(i) })
      .collect();
    let zeros = vec![0u128; a as usize];
    let nested: Vec<Instruction<T::AccountId>> = Vec::new();

    #[extrinsic_call]
    _(
      RawOrigin::Signed(provider),
      assets,
      zeros.clone(),
      zeros,
      nested.encode(),
    );

    assert_eq!(
      FlashLoanSession::<T>::get(),
      CallbackSession::Settled { agent }
    );
  }

  #[benchmark]
  fn set_fee_rate() {
    #[extrinsic_call]
    _(RawOrigin::Root, 30u16);

    assert_eq!(FeeRate::<T>::get(), 30);
  }

  #[cfg(test)]
  use crate::mock::{Test, new_test_ext};
  #[cfg(test)]
  impl_benchmark_test_suite!(Pallet, new_test_ext(), Test);
}
