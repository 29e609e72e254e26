use polkadot_sdk::frame_support::{DefaultNoBound, pallet_prelude::*};
use scale_info::prelude::vec::Vec;

use crate::resolver::ResolveError;
use primitives::params::{BPS_BASE, OFFSET_NOT_USED};
pub use primitives::{AssetKind, Balance};

/// How an input amount is obtained at execution time.
#[derive(
  Clone,
  Copy,
  Debug,
  Decode,
  DecodeWithMemTracking,
  Encode,
  Eq,
  PartialEq,
  TypeInfo,
  MaxEncodedLen,
)]
pub enum InputAmount {
  /// Literal amount
  Fixed(Balance),
  /// `floor(balance * bps / 10_000)` of the executing agent's balance
  BalanceShare(u16),
  /// Share as above, also written into the call payload at `offset` as a little-endian `u128`
  PatchedShare { bps: u16, offset: u32 },
}

/// One asset consumed by an instruction.
#[derive(
  Clone,
  Copy,
  Debug,
  Decode,
  DecodeWithMemTracking,
  Encode,
  Eq,
  PartialEq,
  TypeInfo,
  MaxEncodedLen,
)]
pub struct InputSpec {
  pub asset: AssetKind,
  pub amount: InputAmount,
}

impl InputSpec {
  pub fn fixed(asset: AssetKind, amount: Balance) -> Self {
    Self {
      asset,
      amount: InputAmount::Fixed(amount),
    }
  }

  pub fn share(asset: AssetKind, bps: u16) -> Self {
    Self {
      asset,
      amount: InputAmount::BalanceShare(bps),
    }
  }

  pub fn patched(asset: AssetKind, bps: u16, offset: u32) -> Self {
    Self {
      asset,
      amount: InputAmount::PatchedShare { bps, offset },
    }
  }

  /// Builds an input from the flat `(balance_bps, amount_or_offset)` wire pair.
  ///
  /// Zero bps selects a literal amount. Otherwise `amount_or_offset` is either
  /// [`OFFSET_NOT_USED`] or the byte offset of the amount inside the call payload.
  pub fn from_raw(
    asset: AssetKind,
    balance_bps: u16,
    amount_or_offset: Balance,
  ) -> Result<Self, ResolveError> {
    if balance_bps == 0 {
      return Ok(Self::fixed(asset, amount_or_offset));
    }
    if balance_bps > BPS_BASE {
      return Err(ResolveError::InvalidBps);
    }
    if amount_or_offset == OFFSET_NOT_USED {
      return Ok(Self::share(asset, balance_bps));
    }
    let offset = u32::try_from(amount_or_offset).map_err(|_| ResolveError::PatchOutOfBounds)?;
    Ok(Self::patched(asset, balance_bps, offset))
  }
}

/// Conversion between the native token and its wrapped asset around a call.
#[derive(
  Clone,
  Copy,
  Debug,
  Default,
  Decode,
  DecodeWithMemTracking,
  Encode,
  Eq,
  PartialEq,
  TypeInfo,
  MaxEncodedLen,
)]
pub enum WrapMode {
  #[default]
  None,
  /// Wrapped-asset inputs are sized from the native balance and wrapped before the call
  WrapBefore,
  /// Wrapped asset received during the call is unwrapped afterwards
  UnwrapAfter,
}

/// A single step of a batch: inputs, an optional approval, native value and a call.
#[derive(Clone, Debug, Decode, DecodeWithMemTracking, Encode, Eq, PartialEq, TypeInfo)]
pub struct Instruction<AccountId> {
  /// Receiver of the native value carried by native inputs
  pub target: AccountId,
  /// SCALE-encoded runtime call dispatched as the agent; empty means value transfer only
  pub call_data: Vec<u8>,
  /// Inputs, resolved strictly in order
  pub inputs: Vec<InputSpec>,
  pub wrap_mode: WrapMode,
  /// Account granted an allowance of every resolved non-native input
  pub approval_target: Option<AccountId>,
  /// Adapter account expected to receive a flash-loan callback during the call
  pub callback: Option<AccountId>,
}

impl<AccountId> Instruction<AccountId> {
  /// Instruction that only dispatches `call_data`.
  pub fn call(target: AccountId, call_data: Vec<u8>) -> Self {
    Self {
      target,
      call_data,
      inputs: Vec::new(),
      wrap_mode: WrapMode::None,
      approval_target: None,
      callback: None,
    }
  }

  pub fn with_inputs(mut self, inputs: Vec<InputSpec>) -> Self {
    self.inputs = inputs;
    self
  }

  pub fn with_wrap_mode(mut self, wrap_mode: WrapMode) -> Self {
    self.wrap_mode = wrap_mode;
    self
  }

  pub fn with_approval(mut self, spender: AccountId) -> Self {
    self.approval_target = Some(spender);
    self
  }

  pub fn with_callback(mut self, adapter: AccountId) -> Self {
    self.callback = Some(adapter);
    self
  }
}

/// Flash-loan round trip state. A single session may be in flight at a time.
#[derive(
  Clone,
  Debug,
  DefaultNoBound,
  Decode,
  DecodeWithMemTracking,
  Encode,
  Eq,
  PartialEq,
  TypeInfo,
  MaxEncodedLen,
)]
pub enum CallbackSession<AccountId> {
  #[default]
  Idle,
  /// An agent instruction called a provider and expects `callback` to be invoked
  LoanRequested { agent: AccountId, callback: AccountId },
  /// The nested batch is running on `agent`
  CallbackActive { agent: AccountId },
  /// Fees and repayment were settled; the requesting instruction may continue
  Settled { agent: AccountId },
}

/// Context of the top-level batch currently executing.
#[derive(
  Clone, Debug, Decode, DecodeWithMemTracking, Encode, Eq, PartialEq, TypeInfo, MaxEncodedLen,
)]
pub struct ExecutionContext<AccountId> {
  pub user: AccountId,
  pub agent: AccountId,
  /// Protocol fee rate in basis points selected by the batch referral
  pub fee_rate: u16,
}

/// Native token wrapping used by [`WrapMode`].
pub trait NativeWrapper<AccountId> {
  /// The asset representing wrapped native, `None` when wrapping is unsupported
  fn wrapped_asset() -> Option<AssetKind>;
  /// Convert `amount` native held by `who` into the wrapped asset
  fn wrap(who: &AccountId, amount: Balance) -> DispatchResult;
  /// Convert `amount` wrapped asset held by `who` back into native
  fn unwrap(who: &AccountId, amount: Balance) -> DispatchResult;
}
