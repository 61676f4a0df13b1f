//! Typed guest addresses.
//!
//! Guest addresses are 32-bit offsets into linear memory but travel through
//! the wasm32 ABI as `i32`. `GuestPtr` keeps the unsigned interpretation on
//! the host side and converts at the call boundary only.

use std::fmt;

use crate::error::AbiError;

/// An address inside guest linear memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GuestPtr(u32);

impl GuestPtr {
    /// The null pointer as returned by a failing `malloc` or `cre2_new`.
    pub const NULL: GuestPtr = GuestPtr(0);

    /// Wrap a raw `i32` returned by a guest export.
    pub fn from_abi(raw: i32) -> Self {
        Self(raw as u32)
    }

    /// The `i32` representation passed to guest exports.
    pub fn to_abi(self) -> i32 {
        self.0 as i32
    }

    /// Returns true for the null address.
    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Byte offset into linear memory.
    pub fn offset(self) -> usize {
        self.0 as usize
    }

    /// Address `bytes` past this one.
    pub fn add(self, bytes: usize) -> Result<Self, AbiError> {
        let delta = u32::try_from(bytes).map_err(|_| AbiError::LengthOverflow(bytes))?;
        self.0
            .checked_add(delta)
            .map(Self)
            .ok_or(AbiError::LengthOverflow(bytes))
    }
}

impl fmt::Display for GuestPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

/// Convert a host length into the `i32` the ABI expects.
pub fn abi_len(len: usize) -> Result<i32, AbiError> {
    i32::try_from(len).map_err(|_| AbiError::LengthOverflow(len))
}
