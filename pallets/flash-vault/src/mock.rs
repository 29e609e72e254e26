use crate as pallet_flash_vault;

use polkadot_sdk::frame_support::traits::fungible::Mutate as FungibleMutate;
use polkadot_sdk::frame_support::traits::fungibles::Mutate as FungiblesMutate;
use polkadot_sdk::frame_support::traits::tokens::Preservation;
use polkadot_sdk::frame_support::{
  PalletId, construct_runtime, derive_impl,
  traits::{ConstU32, ConstU128, Currency, Get},
  weights::Weight,
};
use polkadot_sdk::frame_system;
use polkadot_sdk::sp_runtime::{
  BuildStorage, DispatchResult, Permill,
  testing::H256,
  traits::{BlakeTwo256, IdentityLookup},
};

use primitives::{AssetInspector, AssetKind, Balance, FlashLoanRecipient};
use std::cell::RefCell;

pub type AccountId = u64;

pub const ALICE: AccountId = 1;
pub const BORROWER: AccountId = 42;
pub const TOKEN: u32 = 1;
pub const VAULT_LIQUIDITY: Balance = 1_000_000;
pub const BORROWER_FUNDS: Balance = 10_000;

/// How the mock recipient reacts to a loan
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RepayMode {
  /// Return principal plus provider fee
  Full,
  /// Return principal only
  PrincipalOnly,
  /// Keep everything
  Nothing,
  /// Fail inside the callback
  Fail,
}

/// One observed callback: (provider, receiver, assets, amounts, fees, user_data)
pub type CallbackRecord = (AccountId, AccountId, Vec<AssetKind>, Vec<Balance>, Vec<Balance>, Vec<u8>);

thread_local! {
  pub static REPAY_MODE: RefCell<RepayMode> = const { RefCell::new(RepayMode::Full) };
  pub static CALLBACKS: RefCell<Vec<CallbackRecord>> = const { RefCell::new(Vec::new()) };
}

pub fn set_repay_mode(mode: RepayMode) {
  REPAY_MODE.with(|m| *m.borrow_mut() = mode);
}

pub fn callbacks() -> Vec<CallbackRecord> {
  CALLBACKS.with(|c| c.borrow().clone())
}

type Block = frame_system::mocking::MockBlock<Test>;

construct_runtime!(
  pub struct Test {
    System: frame_system,
    Balances: polkadot_sdk::pallet_balances,
    Assets: polkadot_sdk::pallet_assets,
    FlashVault: pallet_flash_vault,
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
  type ApprovalDeposit = ConstU128<1>;
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
    // 0.1%
    Permill::from_parts(1_000)
  }
}

/// Records every callback and repays according to `REPAY_MODE`.
pub struct MockRecipient;

impl FlashLoanRecipient<AccountId> for MockRecipient {
  fn on_flash_loan(
    provider: &AccountId,
    receiver: &AccountId,
    assets: &[AssetKind],
    amounts: &[Balance],
    fees: &[Balance],
    user_data: Vec<u8>,
  ) -> DispatchResult {
    CALLBACKS.with(|c| {
      c.borrow_mut().push((
        *provider,
        *receiver,
        assets.to_vec(),
        amounts.to_vec(),
        fees.to_vec(),
        user_data,
      ))
    });
    let mode = REPAY_MODE.with(|m| *m.borrow());
    if mode == RepayMode::Fail {
      return Err(polkadot_sdk::sp_runtime::DispatchError::Other("RecipientFailed"));
    }
    for ((asset, amount), fee) in assets.iter().zip(amounts).zip(fees) {
      let repay = match mode {
        RepayMode::Full => amount + fee,
        RepayMode::PrincipalOnly => *amount,
        _ => 0,
      };
      if repay == 0 {
        continue;
      }
      match asset.asset_id() {
        None => {
          <Balances as FungibleMutate<AccountId>>::transfer(
            receiver,
            provider,
            repay,
            Preservation::Expendable,
          )?;
        }
        Some(id) => {
          <Assets as FungiblesMutate<AccountId>>::transfer(
            id,
            receiver,
            provider,
            repay,
            Preservation::Expendable,
          )?;
        }
      }
    }
    Ok(())
  }

  fn on_flash_loan_weight(assets: u32, _user_data: &[u8]) -> Weight {
    Weight::from_parts(1_000_000, 0).saturating_mul(u64::from(assets))
  }
}

impl pallet_flash_vault::Config for Test {
  type Currency = Balances;
  type Assets = Assets;
  type PalletId = VaultPalletId;
  type FlashLoanFee = VaultFee;
  type Recipient = MockRecipient;
  type MaxLoanAssets = ConstU32<4>;
  type WeightInfo = ();
}

pub fn new_test_ext() -> polkadot_sdk::sp_io::TestExternalities {
  let mut storage = frame_system::GenesisConfig::<Test>::default()
    .build_storage()
    .unwrap();
  pallet_flash_vault::GenesisConfig::<Test>::default()
    .assimilate_storage(&mut storage)
    .unwrap();
  let mut ext: polkadot_sdk::sp_io::TestExternalities = storage.into();

  // Reset thread locals
  REPAY_MODE.with(|m| *m.borrow_mut() = RepayMode::Full);
  CALLBACKS.with(|c| c.borrow_mut().clear());

  ext.execute_with(|| {
    System::set_block_number(1);
    let vault = FlashVault::account_id();
    for acc in [ALICE, BORROWER] {
      let _ = Balances::deposit_creating(&acc, BORROWER_FUNDS);
    }
    let _ = Balances::deposit_creating(&vault, VAULT_LIQUIDITY);
    assert!(Assets::create(RuntimeOrigin::signed(ALICE), TOKEN, ALICE, 1).is_ok());
    let _ = Assets::mint_into(TOKEN, &vault, VAULT_LIQUIDITY);
    let _ = Assets::mint_into(TOKEN, &BORROWER, BORROWER_FUNDS);
  });
  ext
}
