//! Safe WASM linear memory read/write helpers with bounds checking.
//!
//! All functions validate the address range against the guest's linear
//! memory size before accessing it. An out-of-bounds range means the
//! bridge's own bookkeeping is wrong and is reported as
//! `SandboxError::MemoryError`.

use std::ops::Range;

use re2wasm_abi::GuestPtr;

use crate::error::SandboxError;

/// Validate that `[ptr, ptr+len)` lies within a memory of `mem_size` bytes
/// and return it as a host range.
pub fn validate_range(mem_size: usize, ptr: GuestPtr, len: usize) -> Result<Range<usize>, SandboxError> {
    let start = ptr.offset();
    let end = start.checked_add(len).ok_or_else(|| {
        SandboxError::MemoryError(format!("range {}+{} overflows", ptr, len))
    })?;
    if end > mem_size {
        return Err(SandboxError::MemoryError(format!(
            "range {}+{} exceeds linear memory of {} bytes",
            ptr, len, mem_size
        )));
    }
    Ok(start..end)
}

/// Read `len` bytes from guest memory at `ptr`.
pub fn read_bytes(mem: &[u8], ptr: GuestPtr, len: usize) -> Result<Vec<u8>, SandboxError> {
    let range = validate_range(mem.len(), ptr, len)?;
    Ok(mem[range].to_vec())
}

/// Write `data` to guest memory at `ptr`.
pub fn write_bytes(mem: &mut [u8], ptr: GuestPtr, data: &[u8]) -> Result<(), SandboxError> {
    let range = validate_range(mem.len(), ptr, data.len())?;
    mem[range].copy_from_slice(data);
    Ok(())
}

/// Round `len` up to a multiple of 4.
pub fn align4(len: usize) -> usize {
    (len + 3) & !3
}

/// Size requested from the guest allocator for a `len`-byte buffer.
///
/// Zero-length buffers still get one byte so every region has its own
/// non-null address.
pub fn alloc_size(len: usize) -> usize {
    len.max(1)
}
