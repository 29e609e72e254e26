//! Instruction Router Pallet
//!
//! Caller-isolated instruction execution engine. Every caller gets a keyless agent account;
//! a batch of instructions runs on that agent inside one extrinsic, with inputs sized from
//! live balances, and must leave the agent holding exactly what it held before.
//!
//! ## Flash loans
//!
//! An instruction may call a flash-loan provider and name this pallet's account as its
//! callback. The provider advances the loan to the pallet account and calls back into
//! [`Pallet::receive_flash_loan`] exactly once; the embedded nested batch runs on the same
//! agent, after which the protocol fee is routed to the fee collector and the provider is
//! repaid. The round trip is tracked by [`FlashLoanSession`]:
//! `Idle -> LoanRequested -> CallbackActive -> Settled -> Idle`.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub use pallet::*;

pub mod agent;
pub mod callback;
pub mod fee;
pub mod resolver;
pub mod types;
pub use types::*;

#[cfg(test)]
pub mod mock;

#[cfg(feature = "runtime-benchmarks")]
mod benchmarking;

pub mod weights;
pub use weights::WeightInfo;

pub const LOG_TARGET: &str = "runtime::instruction-router";

/// Nesting limit when decoding runtime calls carried in payloads.
pub const MAX_CALL_DECODE_DEPTH: u32 = 64;

#[frame::pallet]
pub mod pallet {
  use super::{LOG_TARGET, WeightInfo};
  use crate::{
    resolver::{self, ResolveError},
    types::{CallbackSession, ExecutionContext, Instruction, NativeWrapper, WrapMode},
  };
  use alloc::{collections::BTreeSet, vec::Vec};
  use frame::deps::{
    frame_support::{
      dispatch::GetDispatchInfo,
      traits::{
        Contains, EnsureOrigin,
        fungible::{Inspect as NativeInspect, Mutate as NativeMutate},
        fungibles::{
          Inspect as FungiblesInspect, Mutate as FungiblesMutate,
          approvals::Mutate as ApprovalsMutate,
        },
        tokens::Preservation,
      },
    },
    sp_runtime::traits::AccountIdConversion,
  };
  use frame::prelude::*;
  use primitives::{AssetInspector, AssetKind, Balance, params::BPS_BASE};

  #[pallet::config]
  pub trait Config: frame_system::Config {
    /// Native currency interface
    type Currency: NativeInspect<Self::AccountId, Balance = Balance>
      + NativeMutate<Self::AccountId, Balance = Balance>;
    /// Asset management interface, including allowances granted by agents
    type Assets: FungiblesInspect<Self::AccountId, AssetId = u32, Balance = Balance>
      + FungiblesMutate<Self::AccountId, AssetId = u32, Balance = Balance>
      + ApprovalsMutate<Self::AccountId>;
    /// Native token wrapping used by `WrapMode`
    type Wrapper: NativeWrapper<Self::AccountId>;
    /// Origin that can change fee configuration
    type AdminOrigin: EnsureOrigin<Self::RuntimeOrigin>;
    /// Calls a caller may dispatch through auxiliary payloads before the batch.
    /// Benchmarks measure payloads with `frame_system::remark`, which must pass.
    type AuxiliaryCallFilter: Contains<<Self as frame_system::Config>::RuntimeCall>;
    /// Pallet ID for the router account and agent derivation
    #[pallet::constant]
    type PalletId: Get<PalletId>;
    /// The only account allowed to invoke the flash-loan callback
    #[pallet::constant]
    type FlashLoanProvider: Get<Self::AccountId>;
    /// Protocol and venue tag attached to `Charged` events
    #[pallet::constant]
    type FlashLoanFeeMetadata: Get<[u8; 32]>;
    /// Protocol fee rate in basis points used until governance sets one
    #[pallet::constant]
    type DefaultFeeRate: Get<u16>;
    /// Fee collector used until governance sets one
    #[pallet::constant]
    type DefaultFeeCollector: Get<Self::AccountId>;
    /// Maximum instructions in one batch
    #[pallet::constant]
    type MaxInstructions: Get<u32>;
    /// Maximum inputs per instruction
    #[pallet::constant]
    type MaxInputsPerInstruction: Get<u32>;
    /// Maximum encoded call length of one instruction
    #[pallet::constant]
    type MaxCallDataLen: Get<u32>;
    /// Maximum auxiliary payloads dispatched before a batch
    #[pallet::constant]
    type MaxAuxiliaryPayloads: Get<u32>;
    /// Maximum assets swept back to the caller after a batch
    #[pallet::constant]
    type MaxReturnAssets: Get<u32>;
    /// Weight information for extrinsics
    type WeightInfo: WeightInfo;
  }

  #[pallet::pallet]
  pub struct Pallet<T>(_);

  /// Agent account of every caller that has one
  #[pallet::storage]
  pub type Agents<T: Config> = StorageMap<_, Blake2_128Concat, T::AccountId, T::AccountId>;

  /// Reverse index: agent account to its owning caller
  #[pallet::storage]
  pub type AgentOwners<T: Config> = StorageMap<_, Blake2_128Concat, T::AccountId, T::AccountId>;

  /// Protocol fee rate in basis points for batches without a referral tier
  #[pallet::storage]
  pub type FeeRate<T: Config> = StorageValue<_, u16, ValueQuery, T::DefaultFeeRate>;

  /// Fee rate overrides keyed by referral identifier
  #[pallet::storage]
  pub type ReferralFeeRates<T: Config> = StorageMap<_, Twox64Concat, u32, u16>;

  /// Receiver of protocol fees
  #[pallet::storage]
  pub type FeeCollector<T: Config> =
    StorageValue<_, T::AccountId, ValueQuery, T::DefaultFeeCollector>;

  /// Batch currently executing; present only inside `execute`
  #[pallet::storage]
  pub type CurrentExecution<T: Config> = StorageValue<_, ExecutionContext<T::AccountId>>;

  /// Flash-loan round trip state
  #[pallet::storage]
  pub type FlashLoanSession<T: Config> =
    StorageValue<_, CallbackSession<T::AccountId>, ValueQuery>;

  /// Agent balances captured before the current batch, drained when it completes
  #[pallet::storage]
  pub type ResidualSnapshot<T: Config> = StorageMap<_, Blake2_128Concat, AssetKind, Balance>;

  #[pallet::event]
  #[pallet::generate_deposit(pub(super) fn deposit_event)]
  pub enum Event<T: Config> {
    /// An agent account was provisioned for `user`
    AgentCreated { user: T::AccountId, agent: T::AccountId },
    /// A batch ran to completion
    BatchExecuted {
      user: T::AccountId,
      agent: T::AccountId,
      instructions: u32,
      fee_rate: u16,
    },
    /// Protocol fee routed to the fee collector during a flash-loan callback
    Charged {
      asset: AssetKind,
      amount: Balance,
      metadata: [u8; 32],
    },
    /// Flash loan repaid to the provider
    FlashLoanSettled {
      agent: T::AccountId,
      assets: Vec<AssetKind>,
    },
    /// Default fee rate updated
    FeeRateUpdated { old_rate: u16, new_rate: u16 },
    /// Referral tier set or removed
    ReferralFeeRateUpdated { referral: u32, rate: Option<u16> },
    /// Fee collector updated
    FeeCollectorUpdated { collector: T::AccountId },
  }

  #[pallet::error]
  pub enum Error<T> {
    /// Malformed input, payload or callback data
    InvalidInput,
    /// An instruction payload is not a decodable runtime call
    InstructionFailed,
    /// Flash-loan callback invoked by someone other than the provider
    UnauthorizedCallback,
    /// Flash-loan callback outside a requested loan session
    InvalidCallbackState,
    /// Adapter balance after the nested batch cannot cover principal and fees
    InsufficientFlashLoanRepayment,
    /// Agent balance after the batch differs from its balance before
    ResidualBalanceViolation,
    /// Caller already has an agent
    AgentAlreadyCreated,
    /// Derived agent account is already taken
    AgentAccountCollision,
    /// Batch exceeds `MaxInstructions`
    TooManyInstructions,
    /// Instruction exceeds `MaxInputsPerInstruction`
    TooManyInputs,
    /// Batch exceeds `MaxAuxiliaryPayloads`
    TooManyAuxiliaryPayloads,
    /// Return list exceeds `MaxReturnAssets`
    TooManyReturnAssets,
    /// Instruction payload exceeds `MaxCallDataLen`
    CallDataTooLarge,
    /// Auxiliary payload is not an allowed call
    AuxiliaryCallFiltered,
    /// `execute` entered while a batch is running
    ReentrantExecution,
    /// A callback instruction returned without the loan being settled
    CallbackNotConsumed,
    /// Adapter kept more than its pre-loan balance after repayment
    UnexpectedCallbackBalance,
    /// Fee rate above 10_000 basis points
    InvalidFeeRate,
  }

  impl<T: Config> From<ResolveError> for Error<T> {
    fn from(_: ResolveError) -> Self {
      Error::<T>::InvalidInput
    }
  }

  #[pallet::call]
  impl<T: Config> Pallet<T> {
    /// Run a batch on the caller's agent.
    ///
    /// `datas` are dispatched first with the caller's own origin (funding the agent,
    /// approvals). `value` native moves from the caller to the agent before the batch.
    /// Afterwards every asset in `tokens_return` above its pre-batch balance is swept back to
    /// the caller, and every tracked asset must be back at its pre-batch balance.
    ///
    /// Tracked assets are Native, the wrapped asset, `tokens_return` and instruction inputs.
    /// Any other asset the agent receives (from `datas` or a call output) is not checked and
    /// stays on the agent unless it is listed in `tokens_return`.
    #[pallet::call_index(0)]
    #[pallet::weight(
      T::WeightInfo::execute(instructions.len() as u32, datas.len() as u32)
        .saturating_add(Pallet::<T>::payloads_weight(datas, instructions))
    )]
    pub fn execute(
      origin: OriginFor<T>,
      datas: Vec<Vec<u8>>,
      instructions: Vec<Instruction<T::AccountId>>,
      tokens_return: Vec<AssetKind>,
      referral: u32,
      #[pallet::compact] value: Balance,
    ) -> DispatchResult {
      let user = ensure_signed(origin)?;
      ensure!(
        CurrentExecution::<T>::get().is_none(),
        Error::<T>::ReentrantExecution
      );
      ensure!(
        datas.len() <= T::MaxAuxiliaryPayloads::get() as usize,
        Error::<T>::TooManyAuxiliaryPayloads
      );
      ensure!(
        tokens_return.len() <= T::MaxReturnAssets::get() as usize,
        Error::<T>::TooManyReturnAssets
      );
      Self::validate_instructions(&instructions)?;

      let agent = Self::ensure_agent(&user)?;
      let fee_rate = Self::fee_rate_for(referral);
      let count = instructions.len() as u32;
      CurrentExecution::<T>::put(ExecutionContext {
        user: user.clone(),
        agent: agent.clone(),
        fee_rate,
      });
      for asset in Self::tracked_assets(&instructions, &tokens_return) {
        Self::snapshot_residual(&asset, &agent);
      }

      Self::transfer_asset(&AssetKind::Native, &user, &agent, value)?;
      Self::run(&user, &agent, datas, instructions)?;

      for asset in tokens_return.iter() {
        let before = ResidualSnapshot::<T>::get(asset).unwrap_or_default();
        let surplus = Self::balance_of(asset, &agent).saturating_sub(before);
        Self::transfer_asset(asset, &agent, &user, surplus)?;
      }
      for (asset, before) in ResidualSnapshot::<T>::drain() {
        if Self::balance_of(&asset, &agent) != before {
          log::debug!(target: LOG_TARGET, "agent {:?} left residual {:?}", agent, asset);
          return Err(Error::<T>::ResidualBalanceViolation.into());
        }
      }
      CurrentExecution::<T>::kill();

      Self::deposit_event(Event::BatchExecuted {
        user,
        agent,
        instructions: count,
        fee_rate,
      });
      Ok(())
    }

    /// Provision an agent for the caller.
    #[pallet::call_index(1)]
    #[pallet::weight(T::WeightInfo::new_agent())]
    pub fn new_agent(origin: OriginFor<T>) -> DispatchResult {
      let user = ensure_signed(origin)?;
      Self::create_agent(&user)?;
      Ok(())
    }

    /// Provision an agent on behalf of `user`.
    #[pallet::call_index(2)]
    #[pallet::weight(T::WeightInfo::new_agent())]
    pub fn new_agent_for(origin: OriginFor<T>, user: T::AccountId) -> DispatchResult {
      ensure_signed(origin)?;
      Self::create_agent(&user)?;
      Ok(())
    }

    /// Flash-loan callback entry point, callable only by `FlashLoanProvider`.
    ///
    /// The loaned assets are already held by the pallet account. `user_data` carries the
    /// SCALE-encoded nested batch (`Vec<Instruction>`).
    #[pallet::call_index(3)]
    #[pallet::weight(Pallet::<T>::callback_weight(assets.len() as u32, user_data))]
    pub fn receive_flash_loan(
      origin: OriginFor<T>,
      assets: Vec<AssetKind>,
      amounts: Vec<Balance>,
      provider_fees: Vec<Balance>,
      user_data: Vec<u8>,
    ) -> DispatchResult {
      let who = ensure_signed(origin)?;
      let provider = T::FlashLoanProvider::get();
      if who != provider {
        log::warn!(target: LOG_TARGET, "flash-loan callback from {:?} rejected", who);
        return Err(Error::<T>::UnauthorizedCallback.into());
      }
      Self::settle_flash_loan(&provider, assets, amounts, provider_fees, user_data)
    }

    /// Set the default protocol fee rate (governance only)
    #[pallet::call_index(4)]
    #[pallet::weight(T::WeightInfo::set_fee_rate())]
    pub fn set_fee_rate(origin: OriginFor<T>, new_rate: u16) -> DispatchResult {
      T::AdminOrigin::ensure_origin(origin)?;
      ensure!(new_rate <= BPS_BASE, Error::<T>::InvalidFeeRate);
      let old_rate = FeeRate::<T>::get();
      FeeRate::<T>::put(new_rate);
      Self::deposit_event(Event::FeeRateUpdated { old_rate, new_rate });
      Ok(())
    }

    /// Set or clear the fee rate of a referral tier (governance only)
    #[pallet::call_index(5)]
    #[pallet::weight(T::WeightInfo::set_fee_rate())]
    pub fn set_referral_fee_rate(
      origin: OriginFor<T>,
      referral: u32,
      rate: Option<u16>,
    ) -> DispatchResult {
      T::AdminOrigin::ensure_origin(origin)?;
      match rate {
        Some(r) => {
          ensure!(r <= BPS_BASE, Error::<T>::InvalidFeeRate);
          ReferralFeeRates::<T>::insert(referral, r);
        }
        None => ReferralFeeRates::<T>::remove(referral),
      }
      Self::deposit_event(Event::ReferralFeeRateUpdated { referral, rate });
      Ok(())
    }

    /// Set the fee collector (governance only)
    #[pallet::call_index(6)]
    #[pallet::weight(T::WeightInfo::set_fee_rate())]
    pub fn set_fee_collector(origin: OriginFor<T>, collector: T::AccountId) -> DispatchResult {
      T::AdminOrigin::ensure_origin(origin)?;
      FeeCollector::<T>::put(collector.clone());
      Self::deposit_event(Event::FeeCollectorUpdated { collector });
      Ok(())
    }
  }

  impl<T: Config> Pallet<T> {
    /// Router account; also the flash-loan callback adapter
    pub fn account_id() -> T::AccountId {
      T::PalletId::get().into_account_truncating()
    }

    /// Deterministic agent account of `user`.
    pub fn agent_account_id(user: &T::AccountId) -> T::AccountId {
      let mut seed_input = user.encode();
      seed_input.extend_from_slice(b"agent");
      let seed = frame::hashing::blake2_256(&seed_input);
      // Fold seed bytes into PalletId so compact AccountId types keep per-user uniqueness
      let mut id_bytes = T::PalletId::get().0;
      for (i, b) in seed.iter().enumerate() {
        id_bytes[i % 8] ^= b;
      }
      PalletId(id_bytes).into_sub_account_truncating(b"agent")
    }

    /// Existing agent of `user`, if provisioned
    pub fn agent_of(user: &T::AccountId) -> Option<T::AccountId> {
      Agents::<T>::get(user)
    }

    /// Fee rate applied to batches submitted with `referral`
    pub fn fee_rate_for(referral: u32) -> u16 {
      ReferralFeeRates::<T>::get(referral).unwrap_or_else(FeeRate::<T>::get)
    }

    fn create_agent(user: &T::AccountId) -> Result<T::AccountId, DispatchError> {
      ensure!(
        !Agents::<T>::contains_key(user),
        Error::<T>::AgentAlreadyCreated
      );
      let agent = Self::agent_account_id(user);
      ensure!(
        !AgentOwners::<T>::contains_key(&agent) && agent != Self::account_id(),
        Error::<T>::AgentAccountCollision
      );
      Agents::<T>::insert(user, &agent);
      AgentOwners::<T>::insert(&agent, user);
      // Agent survives zero native balance via provider reference
      frame_system::Pallet::<T>::inc_providers(&agent);
      Self::deposit_event(Event::AgentCreated {
        user: user.clone(),
        agent: agent.clone(),
      });
      Ok(agent)
    }

    fn ensure_agent(user: &T::AccountId) -> Result<T::AccountId, DispatchError> {
      match Agents::<T>::get(user) {
        Some(agent) => Ok(agent),
        None => Self::create_agent(user),
      }
    }

    /// Rejects batches that exceed configured bounds or carry malformed inputs.
    pub(crate) fn validate_instructions(
      instructions: &[Instruction<T::AccountId>],
    ) -> DispatchResult {
      ensure!(
        instructions.len() <= T::MaxInstructions::get() as usize,
        Error::<T>::TooManyInstructions
      );
      for instruction in instructions {
        ensure!(
          instruction.inputs.len() <= T::MaxInputsPerInstruction::get() as usize,
          Error::<T>::TooManyInputs
        );
        ensure!(
          instruction.call_data.len() <= T::MaxCallDataLen::get() as usize,
          Error::<T>::CallDataTooLarge
        );
        if instruction.wrap_mode != WrapMode::None {
          ensure!(
            T::Wrapper::wrapped_asset().is_some(),
            Error::<T>::InvalidInput
          );
        }
        for input in instruction.inputs.iter() {
          resolver::validate(input, instruction.call_data.len()).map_err(Error::<T>::from)?;
        }
      }
      Ok(())
    }

    fn tracked_assets(
      instructions: &[Instruction<T::AccountId>],
      tokens_return: &[AssetKind],
    ) -> BTreeSet<AssetKind> {
      let mut assets: BTreeSet<AssetKind> = tokens_return.iter().copied().collect();
      assets.insert(AssetKind::Native);
      if let Some(wrapped) = T::Wrapper::wrapped_asset() {
        assets.insert(wrapped);
      }
      for instruction in instructions {
        assets.extend(instruction.inputs.iter().map(|input| input.asset));
      }
      assets
    }

    /// Records the agent's balance of `asset` unless already captured for this batch.
    pub(crate) fn snapshot_residual(asset: &AssetKind, agent: &T::AccountId) {
      if !ResidualSnapshot::<T>::contains_key(asset) {
        ResidualSnapshot::<T>::insert(asset, Self::balance_of(asset, agent));
      }
    }

    /// Weight of every decodable call carried by a batch. A call that issues a flash loan
    /// reports the nested batch of its callback through the provider's own weight.
    pub fn payloads_weight(
      datas: &[Vec<u8>],
      instructions: &[Instruction<T::AccountId>],
    ) -> Weight {
      datas
        .iter()
        .chain(instructions.iter().map(|instruction| &instruction.call_data))
        .filter_map(|payload| Self::decode_call(payload))
        .fold(Weight::zero(), |acc, call| {
          acc.saturating_add(call.get_dispatch_info().call_weight)
        })
    }

    /// Free balance of `asset` held by `who`
    pub fn balance_of(asset: &AssetKind, who: &T::AccountId) -> Balance {
      match asset.asset_id() {
        None => <T::Currency as NativeInspect<T::AccountId>>::balance(who),
        Some(id) => <T::Assets as FungiblesInspect<T::AccountId>>::balance(id, who),
      }
    }

    pub(crate) fn transfer_asset(
      asset: &AssetKind,
      from: &T::AccountId,
      to: &T::AccountId,
      amount: Balance,
    ) -> DispatchResult {
      if amount == 0 || from == to {
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
          <T::Assets as FungiblesMutate<T::AccountId>>::transfer(
            id,
            from,
            to,
            amount,
            Preservation::Expendable,
          )?;
        }
      }
      Ok(())
    }

    pub(crate) fn approve_asset(
      asset: &AssetKind,
      owner: &T::AccountId,
      spender: &T::AccountId,
      amount: Balance,
    ) -> DispatchResult {
      match asset.asset_id() {
        Some(id) if amount > 0 => {
          <T::Assets as ApprovalsMutate<T::AccountId>>::approve(id, owner, spender, amount)
        }
        _ => Ok(()),
      }
    }
  }

  #[pallet::genesis_config]
  #[derive(frame::prelude::DefaultNoBound)]
  pub struct GenesisConfig<T: Config> {
    /// Initial default fee rate; `DefaultFeeRate` when unset
    pub fee_rate: Option<u16>,
    /// Initial referral tiers
    pub referral_fee_rates: Vec<(u32, u16)>,
    /// Initial fee collector; `DefaultFeeCollector` when unset
    pub fee_collector: Option<T::AccountId>,
    #[serde(skip)]
    pub _marker: core::marker::PhantomData<T>,
  }

  #[pallet::genesis_build]
  impl<T: Config> BuildGenesisConfig for GenesisConfig<T> {
    fn build(&self) {
      if let Some(rate) = self.fee_rate {
        assert!(rate <= BPS_BASE, "fee rate above 10_000 bps");
        FeeRate::<T>::put(rate);
      }
      for (referral, rate) in self.referral_fee_rates.iter() {
        assert!(*rate <= BPS_BASE, "referral fee rate above 10_000 bps");
        ReferralFeeRates::<T>::insert(referral, rate);
      }
      if let Some(collector) = self.fee_collector.as_ref() {
        FeeCollector::<T>::put(collector);
      }
      // Adapter account survives zero native balance via provider reference
      frame_system::Pallet::<T>::inc_providers(&Pallet::<T>::account_id());
    }
  }
}
