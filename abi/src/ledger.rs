//! Host-side ledger of live guest allocations.
//!
//! The `AllocationLedger` is the authoritative record of which transient
//! regions the host currently holds in guest memory. Every successful
//! `malloc` is recorded and every `free` is checked against it, so a broken
//! allocate/release pairing surfaces as an error instead of a silent leak
//! or double free.

use std::collections::BTreeMap;

use crate::error::AbiError;
use crate::ptr::GuestPtr;

/// Bookkeeping for allocations the host made inside guest memory.
///
/// On error the ledger is left unchanged.
#[derive(Debug, Clone, Default)]
pub struct AllocationLedger {
    live: BTreeMap<GuestPtr, usize>,
    total_allocations: u64,
    total_releases: u64,
}

impl AllocationLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful allocation of `size` bytes at `ptr`.
    pub fn record_alloc(&mut self, ptr: GuestPtr, size: usize) -> Result<(), AbiError> {
        if self.live.contains_key(&ptr) {
            return Err(AbiError::DuplicateAllocation(ptr));
        }
        self.live.insert(ptr, size);
        self.total_allocations += 1;
        Ok(())
    }

    /// Record the release of `ptr`, returning the size it was allocated with.
    pub fn record_release(&mut self, ptr: GuestPtr) -> Result<usize, AbiError> {
        let size = self
            .live
            .remove(&ptr)
            .ok_or(AbiError::UnknownAllocation(ptr))?;
        self.total_releases += 1;
        Ok(size)
    }

    /// Returns true if `ptr` is currently live.
    pub fn is_live(&self, ptr: GuestPtr) -> bool {
        self.live.contains_key(&ptr)
    }

    /// Number of allocations not yet released.
    pub fn outstanding(&self) -> usize {
        self.live.len()
    }

    /// Total bytes held by allocations not yet released.
    pub fn outstanding_bytes(&self) -> usize {
        self.live.values().sum()
    }

    /// Allocations recorded since creation.
    pub fn total_allocations(&self) -> u64 {
        self.total_allocations
    }

    /// Releases recorded since creation.
    pub fn total_releases(&self) -> u64 {
        self.total_releases
    }

    /// Returns true if every allocation has been released.
    pub fn is_balanced(&self) -> bool {
        self.live.is_empty()
    }
}
