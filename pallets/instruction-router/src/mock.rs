use crate as pallet_instruction_router;

use polkadot_sdk::frame_support::traits::fungible::Mutate as FungibleMutate;
use polkadot_sdk::frame_support::traits::fungibles::Mutate as FungiblesMutate;
use polkadot_sdk::frame_support::traits::tokens::{Fortitude, Precision, Preservation};
use polkadot_sdk::frame_support::{
  PalletId, construct_runtime, derive_impl,
  traits::{ConstU16, ConstU32, ConstU128, Contains, Currency, Get},
};
use polkadot_sdk::frame_system::{self, EnsureRoot};
use polkadot_sdk::sp_runtime::{
  BuildStorage, DispatchResult, Permill,
  testing::H256,
  traits::{BlakeTwo256, IdentityLookup},
};

use primitives::{AssetKind, Balance};
use std::cell::RefCell;

pub type AccountId = u64;

pub const ALICE: AccountId = 1;
pub const BOB: AccountId = 2;
pub const CHARLIE: AccountId = 3;
pub const FEE_COLLECTOR: AccountId = 9;
pub const WRAP_RESERVE: AccountId = 777;

pub const TOKEN: u32 = 1;
pub const WRAPPED: u32 = 100;
pub const INITIAL_BALANCE: Balance = 1_000_000;
pub const VAULT_LIQUIDITY: Balance = 10_000_000;

thread_local! {
  pub static VAULT_FEE: RefCell<Permill> = const { RefCell::new(Permill::zero()) };
}

pub fn set_vault_fee(fee: Permill) {
  VAULT_FEE.with(|f| *f.borrow_mut() = fee);
}

type Block = frame_system::mocking::MockBlock<Test>;

construct_runtime!(
  pub struct Test {
    System: frame_system,
    Balances: polkadot_sdk::pallet_balances,
    Assets: polkadot_sdk::pallet_assets,
    FlashVault: pallet_flash_vault,
    InstructionRouter: pallet_instruction_router,
  }
);

#[derive_impl(frame_system::config_preludes::TestDefaultConfig)]
impl frame_system::Config for Test {
  type Block = Block;
  type AccountId = AccountId;
  type Lookup = IdentityLookup<Self::AccountId>;
  type Hash = H256;
  type Hashing = BlakeTwo256;
  type AccountData = polkadot_sdk::pallet_balances::AccountData<u128>;
}

impl polkadot_sdk::pallet_balances::Config for Test {
  type MaxLocks = ();
  type MaxReserves = ();
  type ReserveIdentifier = [u8; 8];
  type Balance = u128;
  type DustRemoval = ();
  type RuntimeEvent = RuntimeEvent;
  type ExistentialDeposit = ConstU128<1>;
  type AccountStore = System;
  type WeightInfo = ();
  type FreezeIdentifier = ();
  type MaxFreezes = ();
  type RuntimeHoldReason = ();
  type RuntimeFreezeReason = ();
  type DoneSlashHandler = ();
}

impl polkadot_sdk::pallet_assets::Config for Test {
  type RuntimeEvent = RuntimeEvent;
  type Balance = u128;
  type AssetId = u32;
  type AssetIdParameter = u32;
  type Currency = Balances;
  type CreateOrigin = polkadot_sdk::frame_support::traits::AsEnsureOriginWithArg<
    frame_system::EnsureSigned<Self::AccountId>,
  >;
  type ForceOrigin = frame_system::EnsureRoot<Self::AccountId>;
  type AssetDeposit = ConstU128<1>;
  type AssetAccountDeposit = ConstU128<1>;
  type MetadataDepositBase = ConstU128<1>;
  type MetadataDepositPerByte = ConstU128<1>;
  // Agents hold no native reserve for allowances
  type ApprovalDeposit = ConstU128<0>;
  type StringLimit = ConstU32<50>;
  type Freezer = ();
  type Extra = ();
  type ReserveData = ();
  type CallbackHandle = ();
  type WeightInfo = ();
  type RemoveItemsLimit = ConstU32<5>;
  type Holder = ();
  #[cfg(feature = "runtime-benchmarks")]
  type BenchmarkHelper = AssetBenchmarkHelper;
}

#[cfg(feature = "runtime-benchmarks")]
pub struct AssetBenchmarkHelper;

#[cfg(feature = "runtime-benchmarks")]
impl polkadot_sdk::pallet_assets::BenchmarkHelper<u32, ()> for AssetBenchmarkHelper {
  fn create_asset_id_parameter(id: u32) -> u32 {
    id
  }
  fn create_reserve_id_parameter(_id: u32) -> () {
    ()
  }
}

pub struct VaultPalletId;
impl Get<PalletId> for VaultPalletId {
  fn get() -> PalletId {
    PalletId(*primitives::pallet_ids::FLASH_VAULT_PALLET_ID)
  }
}

pub struct VaultFee;
impl Get<Permill> for VaultFee {
  fn get() -> Permill {
    VAULT_FEE.with(|f| *f.borrow())
  }
}

impl pallet_flash_vault::Config for Test {
  type Currency = Balances;
  type Assets = Assets;
  type PalletId = VaultPalletId;
  type FlashLoanFee = VaultFee;
  type Recipient = InstructionRouter;
  type MaxLoanAssets = ConstU32<4>;
  type WeightInfo = ();
}

/// Wraps native 1:1 into `WRAPPED`, backed by the native held in `WRAP_RESERVE`.
pub struct MockWrapper;

impl pallet_instruction_router::NativeWrapper<AccountId> for MockWrapper {
  fn wrapped_asset() -> Option<AssetKind> {
    Some(AssetKind::Local(WRAPPED))
  }

  fn wrap(who: &AccountId, amount: Balance) -> DispatchResult {
    <Balances as FungibleMutate<AccountId>>::transfer(
      who,
      &WRAP_RESERVE,
      amount,
      Preservation::Expendable,
    )?;
    <Assets as FungiblesMutate<AccountId>>::mint_into(WRAPPED, who, amount)?;
    Ok(())
  }

  fn unwrap(who: &AccountId, amount: Balance) -> DispatchResult {
    <Assets as FungiblesMutate<AccountId>>::burn_from(
      WRAPPED,
      who,
      amount,
      Preservation::Expendable,
      Precision::Exact,
      Fortitude::Polite,
    )?;
    <Balances as FungibleMutate<AccountId>>::transfer(
      &WRAP_RESERVE,
      who,
      amount,
      Preservation::Expendable,
    )?;
    Ok(())
  }
}

/// Plain transfers, approvals and remarks only.
pub struct AuxiliaryCalls;

impl Contains<RuntimeCall> for AuxiliaryCalls {
  fn contains(call: &RuntimeCall) -> bool {
    matches!(
      call,
      RuntimeCall::System(frame_system::Call::remark { .. })
        | RuntimeCall::Assets(polkadot_sdk::pallet_assets::Call::transfer { .. })
        | RuntimeCall::Assets(polkadot_sdk::pallet_assets::Call::approve_transfer { .. })
        | RuntimeCall::Balances(polkadot_sdk::pallet_balances::Call::transfer_allow_death { .. })
        | RuntimeCall::Balances(polkadot_sdk::pallet_balances::Call::transfer_keep_alive { .. })
    )
  }
}

pub struct RouterPalletId;
impl Get<PalletId> for RouterPalletId {
  fn get() -> PalletId {
    PalletId(*primitives::pallet_ids::INSTRUCTION_ROUTER_PALLET_ID)
  }
}

pub struct VaultAccount;
impl Get<AccountId> for VaultAccount {
  fn get() -> AccountId {
    FlashVault::account_id()
  }
}

pub struct FeeMetadata;
impl Get<[u8; 32]> for FeeMetadata {
  fn get() -> [u8; 32] {
    primitives::params::FLASH_LOAN_FEE_METADATA
  }
}

pub struct DefaultCollector;
impl Get<AccountId> for DefaultCollector {
  fn get() -> AccountId {
    FEE_COLLECTOR
  }
}

impl pallet_instruction_router::Config for Test {
  type Currency = Balances;
  type Assets = Assets;
  type Wrapper = MockWrapper;
  type AdminOrigin = EnsureRoot<AccountId>;
  type AuxiliaryCallFilter = AuxiliaryCalls;
  type PalletId = RouterPalletId;
  type FlashLoanProvider = VaultAccount;
  type FlashLoanFeeMetadata = FeeMetadata;
  type DefaultFeeRate = ConstU16<{ primitives::params::DEFAULT_FEE_RATE_BPS }>;
  type DefaultFeeCollector = DefaultCollector;
  type MaxInstructions = ConstU32<16>;
  type MaxInputsPerInstruction = ConstU32<4>;
  type MaxCallDataLen = ConstU32<4096>;
  type MaxAuxiliaryPayloads = ConstU32<4>;
  type MaxReturnAssets = ConstU32<4>;
  type WeightInfo = ();
}

pub fn new_test_ext() -> polkadot_sdk::sp_io::TestExternalities {
  let mut storage = frame_system::GenesisConfig::<Test>::default()
    .build_storage()
    .unwrap();
  pallet_flash_vault::GenesisConfig::<Test>::default()
    .assimilate_storage(&mut storage)
    .unwrap();
  pallet_instruction_router::GenesisConfig::<Test>::default()
    .assimilate_storage(&mut storage)
    .unwrap();
  let mut ext: polkadot_sdk::sp_io::TestExternalities = storage.into();

  // Reset thread locals
  VAULT_FEE.with(|f| *f.borrow_mut() = Permill::zero());

  ext.execute_with(|| {
    System::set_block_number(1);
    for acc in [ALICE, BOB, CHARLIE, FEE_COLLECTOR, WRAP_RESERVE] {
      let _ = Balances::deposit_creating(&acc, INITIAL_BALANCE);
    }
    let vault = FlashVault::account_id();
    let _ = Balances::deposit_creating(&vault, VAULT_LIQUIDITY);
    for id in [TOKEN, WRAPPED] {
      assert!(Assets::create(RuntimeOrigin::signed(ALICE), id, ALICE, 1).is_ok());
    }
    let _ = Assets::mint_into(TOKEN, &vault, VAULT_LIQUIDITY);
    let _ = Assets::mint_into(TOKEN, &ALICE, INITIAL_BALANCE);
    let _ = Assets::mint_into(WRAPPED, &ALICE, INITIAL_BALANCE);
  });
  ext
}
