//! Memory bridge: the allocate → write → call → free protocol.
//!
//! `MemoryBridge` owns a module's `Store` and resolved exports and is the
//! only place that handles raw guest addresses. Variable-length arguments
//! travel through transient regions obtained from the guest's own
//! allocator; [`MemoryBridge::with_region`] scopes each region to a single
//! operation and releases it on every exit path.

use wasmtime::{Instance, Memory, Store, TypedFunc};

use re2wasm_abi::exports::{CRE2_DELETE, CRE2_MATCH, CRE2_NEW, FREE, MALLOC, MEMORY};
use re2wasm_abi::ptr::abi_len;
use re2wasm_abi::GuestPtr;

use crate::error::{guest_call_error, SandboxError};
use crate::host_impl::HostState;
use crate::memory;

type MatchParams = (i32, i32, i32, i32, i32, i32, i32, i32);

/// Typed handles to the exports the bridge calls.
pub(crate) struct Exports {
    cre2_new: TypedFunc<(i32, i32, i32), i32>,
    cre2_delete: TypedFunc<i32, ()>,
    cre2_match: TypedFunc<MatchParams, i32>,
    malloc: TypedFunc<i32, i32>,
    free: TypedFunc<i32, ()>,
    memory: Memory,
}

impl Exports {
    /// Resolve every required export on a fresh instance.
    pub(crate) fn resolve(
        instance: &Instance,
        store: &mut Store<HostState>,
    ) -> Result<Self, SandboxError> {
        let memory = instance
            .get_memory(&mut *store, MEMORY)
            .ok_or_else(|| SandboxError::ValidationError(format!("no '{}' export", MEMORY)))?;

        Ok(Self {
            cre2_new: typed(instance, store, CRE2_NEW)?,
            cre2_delete: typed(instance, store, CRE2_DELETE)?,
            cre2_match: typed(instance, store, CRE2_MATCH)?,
            malloc: typed(instance, store, MALLOC)?,
            free: typed(instance, store, FREE)?,
            memory,
        })
    }
}

fn typed<P, R>(
    instance: &Instance,
    store: &mut Store<HostState>,
    name: &str,
) -> Result<TypedFunc<P, R>, SandboxError>
where
    P: wasmtime::WasmParams,
    R: wasmtime::WasmResults,
{
    instance
        .get_typed_func::<P, R>(&mut *store, name)
        .map_err(|e| SandboxError::ValidationError(format!("export '{}': {}", name, e)))
}

/// A short-lived allocation in guest memory holding one marshalled argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransientRegion {
    ptr: GuestPtr,
    len: usize,
}

impl TransientRegion {
    /// Address of the first data byte.
    pub fn ptr(&self) -> GuestPtr {
        self.ptr
    }

    /// Number of host bytes copied into the region.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the region carries no data bytes.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Arguments of one `cre2_match` call.
#[derive(Debug, Clone, Copy)]
pub(crate) struct MatchCall {
    pub re: GuestPtr,
    pub text: GuestPtr,
    pub text_len: i32,
    pub start: i32,
    pub end: i32,
    pub anchor: i32,
    pub out: GuestPtr,
    pub nmatch: i32,
}

/// The allocate/write/call/free engine for one module instance.
pub struct MemoryBridge {
    store: Store<HostState>,
    exports: Exports,
    fuel_per_call: Option<u64>,
}

impl MemoryBridge {
    pub(crate) fn new(
        store: Store<HostState>,
        exports: Exports,
        fuel_per_call: Option<u64>,
    ) -> Self {
        Self {
            store,
            exports,
            fuel_per_call,
        }
    }

    /// Host state of the underlying store.
    pub fn state(&self) -> &HostState {
        self.store.data()
    }

    pub(crate) fn state_mut(&mut self) -> &mut HostState {
        self.store.data_mut()
    }

    /// Current size of linear memory in bytes.
    pub fn memory_size(&self) -> usize {
        self.exports.memory.data_size(&self.store)
    }

    fn refuel(&mut self) -> Result<(), SandboxError> {
        if let Some(fuel) = self.fuel_per_call {
            self.store.set_fuel(fuel)?;
        }
        Ok(())
    }

    // ── Primitives ──

    /// Request `size` bytes from the guest allocator.
    ///
    /// A null result or a trap means the guest heap is exhausted or broken;
    /// both are fatal for the module.
    pub fn allocate(&mut self, size: usize) -> Result<GuestPtr, SandboxError> {
        let request = memory::alloc_size(size);
        let raw_size = abi_len(request)?;
        self.refuel()?;
        let raw = self
            .exports
            .malloc
            .call(&mut self.store, raw_size)
            .map_err(|e| SandboxError::AllocationFailed {
                size: request,
                reason: format!("{e:#}"),
            })?;

        let ptr = GuestPtr::from_abi(raw);
        if ptr.is_null() {
            return Err(SandboxError::AllocationFailed {
                size: request,
                reason: "allocator returned null".into(),
            });
        }

        if let Err(e) = self.store.data_mut().ledger.record_alloc(ptr, request) {
            // the guest handed the block out regardless; give it back
            if let Err(free_err) = self.call_free(ptr) {
                tracing::warn!(%ptr, error = %free_err, "free of unrecorded block failed");
            }
            return Err(e.into());
        }
        tracing::trace!(%ptr, size = request, "allocated guest region");
        Ok(ptr)
    }

    /// Copy `data` into guest memory at `ptr`.
    pub fn write(&mut self, ptr: GuestPtr, data: &[u8]) -> Result<(), SandboxError> {
        let mem = self.exports.memory.data_mut(&mut self.store);
        memory::write_bytes(mem, ptr, data)
    }

    /// Copy `len` bytes out of guest memory at `ptr`.
    pub fn read(&self, ptr: GuestPtr, len: usize) -> Result<Vec<u8>, SandboxError> {
        let mem = self.exports.memory.data(&self.store);
        memory::read_bytes(mem, ptr, len)
    }

    /// Return `ptr` to the guest allocator.
    ///
    /// The ledger entry is removed before `free` runs, so a trapping `free`
    /// is reported but never retried.
    pub fn release(&mut self, ptr: GuestPtr) -> Result<(), SandboxError> {
        self.store.data_mut().ledger.record_release(ptr)?;
        self.call_free(ptr)?;
        tracing::trace!(%ptr, "released guest region");
        Ok(())
    }

    fn call_free(&mut self, ptr: GuestPtr) -> Result<(), SandboxError> {
        self.refuel()?;
        self.exports
            .free
            .call(&mut self.store, ptr.to_abi())
            .map_err(|e| SandboxError::ReleaseFailed {
                ptr,
                reason: format!("{e:#}"),
            })
    }

    // ── Scoped acquisition ──

    /// Run `f` with `data` copied into a fresh transient region.
    ///
    /// The region is `data.len() + reserve` bytes long; the reserved tail is
    /// left for the guest to write into. It is released exactly once whether
    /// the write, `f`, or nothing fails. When both `f` and the release fail,
    /// `f`'s error wins.
    pub fn with_region<R>(
        &mut self,
        data: &[u8],
        reserve: usize,
        f: impl FnOnce(&mut Self, TransientRegion) -> Result<R, SandboxError>,
    ) -> Result<R, SandboxError> {
        let size = data.len().checked_add(reserve).ok_or_else(|| {
            SandboxError::Abi(re2wasm_abi::AbiError::LengthOverflow(data.len()))
        })?;
        let ptr = self.allocate(size)?;
        let region = TransientRegion {
            ptr,
            len: data.len(),
        };

        let result = self.write(ptr, data).and_then(|()| f(self, region));
        let released = self.release(ptr);

        match (result, released) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(release_err)) => {
                tracing::warn!(%ptr, error = %release_err, "region release failed after earlier error");
                Err(e)
            }
        }
    }

    // ── Foreign calls ──

    /// `cre2_new(pattern, len, options)`.
    pub(crate) fn cre2_new(
        &mut self,
        pattern: TransientRegion,
        options: i32,
    ) -> Result<GuestPtr, SandboxError> {
        let len = abi_len(pattern.len())?;
        self.refuel()?;
        let raw = self
            .exports
            .cre2_new
            .call(&mut self.store, (pattern.ptr().to_abi(), len, options))
            .map_err(|e| guest_call_error(CRE2_NEW, e))?;
        Ok(GuestPtr::from_abi(raw))
    }

    /// `cre2_delete(re)`.
    pub(crate) fn cre2_delete(&mut self, re: GuestPtr) -> Result<(), SandboxError> {
        self.refuel()?;
        self.exports
            .cre2_delete
            .call(&mut self.store, re.to_abi())
            .map_err(|e| guest_call_error(CRE2_DELETE, e))
    }

    /// `cre2_match(...)`, returning the raw status.
    pub(crate) fn cre2_match(&mut self, call: MatchCall) -> Result<i32, SandboxError> {
        self.refuel()?;
        self.exports
            .cre2_match
            .call(
                &mut self.store,
                (
                    call.re.to_abi(),
                    call.text.to_abi(),
                    call.text_len,
                    call.start,
                    call.end,
                    call.anchor,
                    call.out.to_abi(),
                    call.nmatch,
                ),
            )
            .map_err(|e| guest_call_error(CRE2_MATCH, e))
    }
}
