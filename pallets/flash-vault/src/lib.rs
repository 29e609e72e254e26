//! Flash Vault Pallet
//!
//! Pooled liquidity lent out within a single extrinsic. The vault transfers the requested
//! assets to a receiver, hands control to the configured [`FlashLoanRecipient`] exactly once,
//! and then requires its own balance of every loaned asset to have grown by the provider fee.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub use pallet::*;

#[cfg(test)]
pub mod mock;

pub mod weights;
pub use weights::WeightInfo;

pub const LOG_TARGET: &str = "runtime::flash-vault";

#[frame::pallet]
pub mod pallet {
  use super::{LOG_TARGET, WeightInfo};
  use alloc::vec::Vec;
  use frame::deps::{
    frame_support::traits::{
      fungible::{Inspect as NativeInspect, Mutate as NativeMutate},
      fungibles::{Inspect as FungiblesInspect, Mutate as FungiblesMutate},
      tokens::Preservation,
    },
    sp_runtime::traits::AccountIdConversion,
  };
  use frame::prelude::*;
  use polkadot_sdk::sp_runtime::{PerThing, Permill};
  use primitives::{AssetInspector, AssetKind, Balance, FlashLoanRecipient};

  #[pallet::config]
  pub trait Config: frame_system::Config {
    /// Native currency interface
    type Currency: NativeInspect<Self::AccountId, Balance = Balance>
      + NativeMutate<Self::AccountId, Balance = Balance>;
    /// Asset management interface for fungible tokens
    type Assets: FungiblesInspect<Self::AccountId, AssetId = u32, Balance = Balance>
      + FungiblesMutate<Self::AccountId, AssetId = u32, Balance = Balance>;
    /// Pallet ID for account derivation
    #[pallet::constant]
    type PalletId: Get<PalletId>;
    /// Provider fee charged on every loaned amount
    #[pallet::constant]
    type FlashLoanFee: Get<Permill>;
    /// Receiver of the single callback issued per loan
    type Recipient: FlashLoanRecipient<Self::AccountId>;
    /// Maximum number of distinct assets in one loan
    #[pallet::constant]
    type MaxLoanAssets: Get<u32>;
    /// Weight information for extrinsics
    type WeightInfo: WeightInfo;
  }

  #[pallet::pallet]
  pub struct Pallet<T>(_);

  #[pallet::event]
  #[pallet::generate_deposit(pub(super) fn deposit_event)]
  pub enum Event<T: Config> {
    /// A loan of one asset was advanced and repaid with its fee
    FlashLoan {
      borrower: T::AccountId,
      receiver: T::AccountId,
      asset: AssetKind,
      amount: Balance,
      fee: Balance,
    },
  }

  #[pallet::error]
  pub enum Error<T> {
    /// No assets were requested
    EmptyLoan,
    /// More assets requested than `MaxLoanAssets`
    TooManyAssets,
    /// `assets` and `amounts` differ in length
    LengthMismatch,
    /// The same asset appears twice in one loan
    DuplicateAsset,
    /// The vault does not hold the requested amount
    InsufficientLiquidity,
    /// Principal plus fee did not come back before the callback returned
    RepaymentShortfall,
  }

  #[pallet::call]
  impl<T: Config> Pallet<T> {
    /// Lend `amounts` of `assets` to `receiver` for the duration of one callback.
    ///
    /// `amounts` stays a plain (non-compact) vector so callers can patch values into an
    /// encoded call at fixed byte offsets. The weight includes the recipient's callback.
    #[pallet::call_index(0)]
    #[pallet::weight(
      T::WeightInfo::flash_loan(assets.len() as u32)
        .saturating_add(T::Recipient::on_flash_loan_weight(assets.len() as u32, user_data))
    )]
    pub fn flash_loan(
      origin: OriginFor<T>,
      receiver: T::AccountId,
      assets: Vec<AssetKind>,
      amounts: Vec<Balance>,
      user_data: Vec<u8>,
    ) -> DispatchResult {
      let borrower = ensure_signed(origin)?;
      ensure!(!assets.is_empty(), Error::<T>::EmptyLoan);
      ensure!(
        assets.len() <= T::MaxLoanAssets::get() as usize,
        Error::<T>::TooManyAssets
      );
      ensure!(assets.len() == amounts.len(), Error::<T>::LengthMismatch);
      for (i, asset) in assets.iter().enumerate() {
        ensure!(!assets[..i].contains(asset), Error::<T>::DuplicateAsset);
      }

      let vault = Self::account_id();
      let rate = T::FlashLoanFee::get();
      let mut pre_balances = Vec::with_capacity(assets.len());
      let mut fees = Vec::with_capacity(assets.len());
      for (asset, amount) in assets.iter().zip(amounts.iter()) {
        let available = Self::balance_of(asset, &vault);
        ensure!(available >= *amount, Error::<T>::InsufficientLiquidity);
        pre_balances.push(available);
        fees.push(rate.mul_floor(*amount));
      }
      for (asset, amount) in assets.iter().zip(amounts.iter()) {
        Self::transfer_asset(asset, &vault, &receiver, *amount)?;
      }

      log::debug!(
        target: LOG_TARGET,
        "lending {} asset(s) to {:?} for {:?}",
        assets.len(),
        receiver,
        borrower,
      );
      T::Recipient::on_flash_loan(&vault, &receiver, &assets, &amounts, &fees, user_data)?;

      for (i, asset) in assets.iter().enumerate() {
        let required = pre_balances[i].saturating_add(fees[i]);
        ensure!(
          Self::balance_of(asset, &vault) >= required,
          Error::<T>::RepaymentShortfall
        );
        Self::deposit_event(Event::FlashLoan {
          borrower: borrower.clone(),
          receiver: receiver.clone(),
          asset: *asset,
          amount: amounts[i],
          fee: fees[i],
        });
      }
      Ok(())
    }
  }

  impl<T: Config> Pallet<T> {
    /// Get the pallet's account ID (derived from PalletId)
    pub fn account_id() -> T::AccountId {
      T::PalletId::get().into_account_truncating()
    }

    /// Free balance of `asset` held by `who`
    pub fn balance_of(asset: &AssetKind, who: &T::AccountId) -> Balance {
      match asset.asset_id() {
        None => <T::Currency as NativeInspect<T::AccountId>>::balance(who),
        Some(id) => T::Assets::balance(id, who),
      }
    }

    fn transfer_asset(
      asset: &AssetKind,
      from: &T::AccountId,
      to: &T::AccountId,
      amount: Balance,
    ) -> DispatchResult {
      if amount == 0 {
        return Ok(());
      }
      match asset.asset_id() {
        None => {
          <T::Currency as NativeMutate<T::AccountId>>::transfer(
            from,
            to,
            amount,
            Preservation::Expendable,
          )?;
        }
        Some(id) => {
          T::Assets::transfer(id, from, to, amount, Preservation::Expendable)?;
        }
      }
      Ok(())
    }
  }

  #[pallet::genesis_config]
  #[derive(frame::prelude::DefaultNoBound)]
  pub struct GenesisConfig<T: Config> {
    #[serde(skip)]
    pub _marker: core::marker::PhantomData<T>,
  }

  #[pallet::genesis_build]
  impl<T: Config> BuildGenesisConfig for GenesisConfig<T> {
    fn build(&self) {
      // Vault account survives zero native balance via provider reference
      frame_system::Pallet::<T>::inc_providers(&Pallet::<T>::account_id());
    }
  }
}
