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
  fn flash_loan(assets: u32) -> Weight;
}

pub struct SubstrateWeight<T>(PhantomData<T>);
impl<T: polkadot_sdk::frame_system::Config + crate::Config> WeightInfo for SubstrateWeight<T> {
  fn flash_loan(assets: u32) -> Weight {
    let per_asset = u64::from(assets);
    Weight::from_parts(30_000_000, 3000)
      .saturating_add(Weight::from_parts(22_000_000, 2600).saturating_mul(per_asset))
      .saturating_add(T::DbWeight::get().reads(per_asset.saturating_mul(4)))
      .saturating_add(T::DbWeight::get().writes(per_asset.saturating_mul(4)))
  }
}

impl WeightInfo for () {
  fn flash_loan(assets: u32) -> Weight {
    Weight::from_parts(30_000_000, 3000)
      .saturating_add(Weight::from_parts(22_000_000, 2600).saturating_mul(u64::from(assets)))
      .saturating_add(RocksDbWeight::get().reads(u64::from(assets).saturating_mul(4)))
  }
}
