//! `re2wasm-abi`: the cre2 ABI as seen from the host side of the sandbox.
//!
//! This crate describes the contract between the host bridge and a re2
//! build compiled to WebAssembly, without depending on any WASM runtime:
//!
//! - export and import names with their expected signatures
//! - `GuestPtr`: typed addresses into guest linear memory
//! - decoding of `cre2_match` return values and `cre2_string_t` views
//! - `AllocationLedger`: host-side bookkeeping of live guest allocations
//! - `AbiError`: errors raised while interpreting guest values
//!
//! The sandbox crate consumes these definitions when validating, linking
//! and calling into a module.

pub mod error;
pub mod exports;
pub mod ptr;
pub mod decode;
pub mod ledger;

// Re-export commonly used types at the crate root.
pub use error::AbiError;
pub use exports::{ExportSpec, REQUIRED_EXPORTS};
pub use ptr::GuestPtr;
pub use decode::{decode_match_result, StringView, STRING_VIEW_SIZE};
pub use ledger::AllocationLedger;
