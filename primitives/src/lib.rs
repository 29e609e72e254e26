#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod assets;
pub mod ecosystem;
pub mod flash_loan;

pub use assets::*;
pub use ecosystem::*;
pub use flash_loan::*;
