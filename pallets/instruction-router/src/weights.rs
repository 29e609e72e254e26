#![cfg_attr(rustfmt, rustfmt_skip)]
#![allow(unused_parens)]
#![allow(unused_imports)]
#![allow(missing_docs)]

use core::marker::PhantomData;
use polkadot_sdk::frame_support::{
  traits::Get,
  weights::{constants::RocksDbWeight, Weight},
};

pub trait WeightInfo {
  fn execute(instructions: u32, datas: u32) -> Weight;
  fn new_agent() -> Weight;
  fn receive_flash_loan(assets: u32) -> Weight;
  fn set_fee_rate() -> Weight;
}

pub struct SubstrateWeight<T>(PhantomData<T>);
impl<T: polkadot_sdk::frame_system::Config + crate::Config> WeightInfo for SubstrateWeight<T> {
  /// Excludes the weight of the dispatched payloads, which callers add separately.
  fn execute(instructions: u32, datas: u32) -> Weight {
    let per_instruction = u64::from(T::MaxInputsPerInstruction::get()).saturating_mul(2).saturating_add(2);
    Weight::from_parts(40_000_000, 4000)
      .saturating_add(Weight::from_parts(18_000_000, 1500).saturating_mul(u64::from(instructions)))
      .saturating_add(Weight::from_parts(6_000_000, 500).saturating_mul(u64::from(datas)))
      .saturating_add(T::DbWeight::get().reads(u64::from(instructions).saturating_mul(per_instruction).saturating_add(8)))
      .saturating_add(T::DbWeight::get().writes(u64::from(instructions).saturating_mul(per_instruction).saturating_add(6)))
  }

  fn new_agent() -> Weight {
    Weight::from_parts(20_000_000, 2500)
      .saturating_add(T::DbWeight::get().reads(3))
      .saturating_add(T::DbWeight::get().writes(3))
  }

  fn receive_flash_loan(assets: u32) -> Weight {
    let per_asset = u64::from(assets);
    Weight::from_parts(35_000_000, 3500)
      .saturating_add(Weight::from_parts(45_000_000, 4000).saturating_mul(per_asset))
      .saturating_add(T::DbWeight::get().reads(per_asset.saturating_mul(6).saturating_add(4)))
      .saturating_add(T::DbWeight::get().writes(per_asset.saturating_mul(6).saturating_add(2)))
  }

  fn set_fee_rate() -> Weight {
    Weight::from_parts(9_000_000, 600)
      .saturating_add(T::DbWeight::get().reads(1))
      .saturating_add(T::DbWeight::get().writes(1))
  }
}

// Assumes four inputs per instruction
impl WeightInfo for () {
  fn execute(instructions: u32, datas: u32) -> Weight {
    let per_instruction = 10u64;
    Weight::from_parts(40_000_000, 4000)
      .saturating_add(Weight::from_parts(18_000_000, 1500).saturating_mul(u64::from(instructions)))
      .saturating_add(Weight::from_parts(6_000_000, 500).saturating_mul(u64::from(datas)))
      .saturating_add(RocksDbWeight::get().reads(u64::from(instructions).saturating_mul(per_instruction).saturating_add(8)))
      .saturating_add(RocksDbWeight::get().writes(u64::from(instructions).saturating_mul(per_instruction).saturating_add(6)))
  }

  fn new_agent() -> Weight {
    Weight::from_parts(20_000_000, 2500)
      .saturating_add(RocksDbWeight::get().reads(3))
      .saturating_add(RocksDbWeight::get().writes(3))
  }

  fn receive_flash_loan(assets: u32) -> Weight {
    let per_asset = u64::from(assets);
    Weight::from_parts(35_000_000, 3500)
      .saturating_add(Weight::from_parts(45_000_000, 4000).saturating_mul(per_asset))
      .saturating_add(RocksDbWeight::get().reads(per_asset.saturating_mul(6).saturating_add(4)))
      .saturating_add(RocksDbWeight::get().writes(per_asset.saturating_mul(6).saturating_add(2)))
  }

  fn set_fee_rate() -> Weight {
    Weight::from_parts(9_000_000, 600)
      .saturating_add(RocksDbWeight::get().reads(1))
      .saturating_add(RocksDbWeight::get().writes(1))
  }
}
