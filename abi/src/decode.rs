//! Decoding of values the guest hands back to the host.

use std::ops::Range;

use crate::error::AbiError;
use crate::ptr::GuestPtr;

/// Size in bytes of a wasm32 `cre2_string_t { const char *data; int length; }`.
pub const STRING_VIEW_SIZE: usize = 8;

/// Interpret the return value of `cre2_match`.
///
/// Anything other than 0 or 1 is reported rather than coerced to a boolean.
pub fn decode_match_result(raw: i32) -> Result<bool, AbiError> {
    match raw {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(AbiError::UnexpectedMatchResult(other)),
    }
}

/// A `cre2_string_t` read back from guest memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StringView {
    pub data: GuestPtr,
    pub len: i32,
}

impl StringView {
    /// Parse the little-endian wasm32 layout.
    pub fn from_le_bytes(bytes: [u8; STRING_VIEW_SIZE]) -> Self {
        let data = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let len = i32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        Self {
            data: GuestPtr::from_abi(data),
            len,
        }
    }

    /// Translate the view into a byte range of the subject that starts at
    /// `base` and spans `base_len` bytes.
    pub fn range_within(&self, base: GuestPtr, base_len: usize) -> Result<Range<usize>, AbiError> {
        let out_of_subject = || AbiError::ViewOutOfSubject {
            data: self.data,
            len: self.len,
            base,
            base_len,
        };
        if self.len < 0 || self.data < base {
            return Err(out_of_subject());
        }
        let start = self.data.offset() - base.offset();
        let end = start
            .checked_add(self.len as usize)
            .ok_or_else(out_of_subject)?;
        if end > base_len {
            return Err(out_of_subject());
        }
        Ok(start..end)
    }
}
