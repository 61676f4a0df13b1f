//! Host import registration via Wasmtime linker.
//!
//! A cre2 code image is a libc program built as a library. Its startup code
//! calls `env.__main_argc_argv`, and its libc reaches the outside world only
//! through WASI preview1. The linker provides both:
//!
//! - the startup shim, a stateless stub that reports success so the image
//!   can be initialized as a reactor instead of run as a program
//! - WASI preview1 backed by the per-module `WasiP1Ctx`
//!
//! Registration happens once per `CodeImage`; every module instantiated
//! from the image reuses the pre-linked imports.

use wasmtime::{Engine, Linker};

use re2wasm_abi::exports::{STARTUP_IMPORT_MODULE, STARTUP_IMPORT_NAME, STARTUP_STATUS_OK};

use crate::error::SandboxError;
use crate::host_impl::HostState;

/// Build a linker carrying every import a cre2 code image may need.
pub fn build_linker(engine: &Engine) -> Result<Linker<HostState>, SandboxError> {
    let mut linker: Linker<HostState> = Linker::new(engine);
    wasmtime_wasi::preview1::add_to_linker_sync(&mut linker, |state| &mut state.wasi)?;
    register_startup_shim(&mut linker)?;
    Ok(linker)
}

/// Register `env.__main_argc_argv(argc, argv) -> status`.
pub fn register_startup_shim(linker: &mut Linker<HostState>) -> Result<(), SandboxError> {
    linker.func_wrap(
        STARTUP_IMPORT_MODULE,
        STARTUP_IMPORT_NAME,
        |_argc: i32, _argv: i32| -> i32 { STARTUP_STATUS_OK },
    )?;
    Ok(())
}
