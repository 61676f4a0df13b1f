//! Per-module mutable state held in the Wasmtime Store.
//!
//! `HostState` combines the WASI context the code image's libc needs, the
//! store resource limits and the host's allocation bookkeeping into a
//! single struct that lives inside `Store<HostState>` for the lifetime of a
//! `Re2Module`.

use re2wasm_abi::AllocationLedger;
use wasmtime::{StoreLimits, StoreLimitsBuilder};
use wasmtime_wasi::preview1::WasiP1Ctx;
use wasmtime_wasi::WasiCtxBuilder;

use crate::config::SandboxConfig;

/// Per-module mutable state held in the Wasmtime `Store`.
pub struct HostState {
    /// WASI preview1 context (no preopens, no env, optional stdio).
    pub wasi: WasiP1Ctx,
    /// Linear memory growth limits.
    pub limits: StoreLimits,
    /// Transient regions currently held in guest memory.
    pub ledger: AllocationLedger,
    /// Patterns constructed and not yet closed.
    pub live_patterns: usize,
}

impl HostState {
    /// Create the host state for a new module instance.
    pub fn new(config: &SandboxConfig) -> Self {
        let mut builder = WasiCtxBuilder::new();
        if config.inherit_stdio {
            builder.inherit_stdio();
        }

        let limits = StoreLimitsBuilder::new()
            .memory_size(config.max_memory_bytes)
            .build();

        Self {
            wasi: builder.build_p1(),
            limits,
            ledger: AllocationLedger::new(),
            live_patterns: 0,
        }
    }
}
