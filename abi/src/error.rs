//! Errors raised while interpreting values crossing the guest boundary.

use crate::ptr::GuestPtr;

/// Error produced when a guest value violates the cre2 ABI contract or
/// when allocation bookkeeping detects a broken pairing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AbiError {
    /// `cre2_match` returned something other than 0 or 1.
    #[error("unexpected match result {0} (expected 0 or 1)")]
    UnexpectedMatchResult(i32),

    /// A `cre2_string_t` view points outside the subject it was taken from.
    #[error("string view {data}+{len} lies outside subject {base}+{base_len}")]
    ViewOutOfSubject {
        data: GuestPtr,
        len: i32,
        base: GuestPtr,
        base_len: usize,
    },

    /// The same address was handed out twice without being released.
    #[error("allocation at {0} is already live")]
    DuplicateAllocation(GuestPtr),

    /// A release was requested for an address that is not live.
    #[error("release of unknown allocation at {0}")]
    UnknownAllocation(GuestPtr),

    /// A length does not fit in the 32-bit guest address space.
    #[error("length {0} exceeds the wasm32 address space")]
    LengthOverflow(usize),
}
