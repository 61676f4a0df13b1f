//! Sandbox runtime: module bootstrap and the module handle.
//!
//! A `Re2Module` is one running instance of a [`CodeImage`]: its own store,
//! linear memory and guest heap. Every compiled pattern lives in that heap
//! and borrows the module, so a module cannot be dropped while patterns
//! created from it are still reachable.
//!
//! All bridge operations on a module are serialized behind one mutex; a
//! pattern's allocate → write → call → release sequence completes before
//! the next one starts. Callers that want parallel matching create one
//! module per worker from the same image.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use wasmtime::{Instance, Store};

use re2wasm_abi::exports::INITIALIZERS;

use crate::bridge::{Exports, MemoryBridge};
use crate::error::SandboxError;
use crate::host_impl::HostState;
use crate::image::CodeImage;
use crate::regex::Regex;

static NEXT_MODULE_ID: AtomicU64 = AtomicU64::new(1);

/// Snapshot of a module's resource usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleStats {
    /// Transient regions currently allocated by the host.
    pub outstanding_regions: usize,
    /// Bytes held by those regions.
    pub outstanding_bytes: usize,
    /// Regions allocated since the module was created.
    pub total_allocations: u64,
    /// Patterns constructed and not yet closed.
    pub live_patterns: usize,
    /// Current size of linear memory in bytes.
    pub memory_bytes: usize,
}

/// One running instance of the re2 code image.
pub struct Re2Module {
    id: u64,
    bridge: Mutex<MemoryBridge>,
}

impl Re2Module {
    /// Instantiate a new module from `image`.
    ///
    /// Runs the image's library initializer and resolves every export the
    /// bridge needs. Any failure is fatal for this instance.
    pub fn new(image: &CodeImage) -> Result<Self, SandboxError> {
        let config = image.config();
        let mut store = Store::new(image.engine(), HostState::new(config));
        store.limiter(|state| &mut state.limits);
        if let Some(fuel) = config.fuel_per_call {
            store.set_fuel(fuel)?;
        }

        let instance = image.instance_pre().instantiate(&mut store)?;
        run_initializer(&instance, &mut store)?;
        let exports = Exports::resolve(&instance, &mut store)?;

        let id = NEXT_MODULE_ID.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(module = id, "instantiated re2 module");

        Ok(Self {
            id,
            bridge: Mutex::new(MemoryBridge::new(store, exports, config.fuel_per_call)),
        })
    }

    /// Instantiate a new module from the process-wide image.
    pub fn from_global() -> Result<Self, SandboxError> {
        Self::new(CodeImage::global()?)
    }

    /// Process-unique identifier of this module.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Compile `pattern` inside this module.
    ///
    /// A pattern re2 cannot parse still compiles; it simply never matches.
    pub fn compile(&self, pattern: &str) -> Result<Regex<'_>, SandboxError> {
        Regex::construct(self, pattern.as_bytes())
    }

    /// Compile a pattern given as raw bytes.
    pub fn compile_bytes(&self, pattern: &[u8]) -> Result<Regex<'_>, SandboxError> {
        Regex::construct(self, pattern)
    }

    /// Current resource usage.
    pub fn stats(&self) -> ModuleStats {
        let bridge = self.bridge.lock();
        let state = bridge.state();
        ModuleStats {
            outstanding_regions: state.ledger.outstanding(),
            outstanding_bytes: state.ledger.outstanding_bytes(),
            total_allocations: state.ledger.total_allocations(),
            live_patterns: state.live_patterns,
            memory_bytes: bridge.memory_size(),
        }
    }

    /// Run `f` with exclusive access to the bridge.
    pub(crate) fn with_bridge<R>(&self, f: impl FnOnce(&mut MemoryBridge) -> R) -> R {
        let mut bridge = self.bridge.lock();
        f(&mut bridge)
    }
}

impl std::fmt::Debug for Re2Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Re2Module").field("id", &self.id).finish_non_exhaustive()
    }
}

/// Run the first library initializer the instance exports, if any.
fn run_initializer(instance: &Instance, store: &mut Store<HostState>) -> Result<(), SandboxError> {
    for &name in INITIALIZERS {
        let Some(func) = instance.get_func(&mut *store, name) else {
            continue;
        };
        let init = func
            .typed::<(), ()>(&*store)
            .map_err(|e| SandboxError::ValidationError(format!("initializer '{}': {}", name, e)))?;
        init.call(&mut *store, ()).map_err(|e| SandboxError::InitFailed {
            export: name,
            message: format!("{e:#}"),
        })?;
        tracing::debug!(initializer = name, "ran module initializer");
        return Ok(());
    }
    Ok(())
}
