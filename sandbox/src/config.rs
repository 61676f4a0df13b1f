//! Sandbox configuration.

/// Configuration for the WASM sandbox.
///
/// Applied when a [`CodeImage`](crate::CodeImage) is compiled and inherited
/// by every module instantiated from it.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Upper bound on a module's linear memory in bytes.
    /// Default: 256 MiB.
    pub max_memory_bytes: usize,

    /// Wasmtime fuel granted to every foreign call. `None` disables fuel
    /// metering; the store is refuelled before each call otherwise.
    pub fuel_per_call: Option<u64>,

    /// Whether the guest's WASI stdio is wired to the host process.
    pub inherit_stdio: bool,

    /// Compile with Cranelift speed optimizations.
    pub optimize: bool,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            max_memory_bytes: 256 * 1024 * 1024,
            fuel_per_call: None,
            inherit_stdio: false,
            optimize: true,
        }
    }
}
