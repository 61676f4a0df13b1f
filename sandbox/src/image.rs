//! Code image: the compiled re2 WASM binary shared by every module.
//!
//! A `CodeImage` is compiled, validated and pre-linked once. It is
//! immutable afterwards and cheap to clone; every [`Re2Module`] created from
//! it shares the same compiled code and gets its own store and memory.
//!
//! A process may additionally install one image into a global slot with
//! [`CodeImage::install_global`]. The slot can be written exactly once;
//! a second installation fails instead of replacing the image.
//!
//! [`Re2Module`]: crate::Re2Module

use std::path::Path;
use std::sync::{Arc, OnceLock};

use wasmtime::{Config, Engine, InstancePre, Module, OptLevel};

use crate::config::SandboxConfig;
use crate::error::SandboxError;
use crate::host_impl::HostState;
use crate::linker::build_linker;
use crate::validation::validate_module;

static GLOBAL_IMAGE: OnceLock<CodeImage> = OnceLock::new();

/// A validated, pre-linked code image.
#[derive(Clone)]
pub struct CodeImage {
    inner: Arc<ImageInner>,
}

struct ImageInner {
    engine: Engine,
    module: Module,
    instance_pre: InstancePre<HostState>,
    config: SandboxConfig,
}

impl CodeImage {
    /// Compile a code image from WASM bytecode (or WAT text).
    pub fn from_bytes(wasm_bytes: &[u8], config: SandboxConfig) -> Result<Self, SandboxError> {
        let engine = create_engine(&config)?;
        let module = Module::new(&engine, wasm_bytes)?;
        Self::link(engine, module, config)
    }

    /// Load a code image from a `.wasm` file path.
    pub fn from_file(path: impl AsRef<Path>, config: SandboxConfig) -> Result<Self, SandboxError> {
        let path = path.as_ref();
        let engine = create_engine(&config)?;
        let module = Module::from_file(&engine, path)?;
        tracing::debug!(path = %path.display(), "loaded code image");
        Self::link(engine, module, config)
    }

    fn link(engine: Engine, module: Module, config: SandboxConfig) -> Result<Self, SandboxError> {
        validate_module(&module)?;
        let linker = build_linker(&engine)?;
        let instance_pre = linker.instantiate_pre(&module)?;
        Ok(Self {
            inner: Arc::new(ImageInner {
                engine,
                module,
                instance_pre,
                config,
            }),
        })
    }

    /// Install this image as the process-wide image.
    ///
    /// Fails with `ImageAlreadyInstalled` if any image was installed before.
    pub fn install_global(self) -> Result<&'static CodeImage, SandboxError> {
        GLOBAL_IMAGE
            .set(self)
            .map_err(|_| SandboxError::ImageAlreadyInstalled)?;
        Self::global()
    }

    /// The process-wide image.
    pub fn global() -> Result<&'static CodeImage, SandboxError> {
        GLOBAL_IMAGE.get().ok_or(SandboxError::ImageNotInstalled)
    }

    /// Configuration every module from this image runs with.
    pub fn config(&self) -> &SandboxConfig {
        &self.inner.config
    }

    /// Names of the image's function exports.
    pub fn exports(&self) -> impl Iterator<Item = &str> {
        self.inner
            .module
            .exports()
            .filter(|e| e.ty().func().is_some())
            .map(|e| e.name())
    }

    pub(crate) fn engine(&self) -> &Engine {
        &self.inner.engine
    }

    pub(crate) fn instance_pre(&self) -> &InstancePre<HostState> {
        &self.inner.instance_pre
    }
}

impl std::fmt::Debug for CodeImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeImage")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

/// Create a Wasmtime engine for the given configuration.
fn create_engine(config: &SandboxConfig) -> Result<Engine, SandboxError> {
    let mut wasm_config = Config::new();

    wasm_config.consume_fuel(config.fuel_per_call.is_some());
    wasm_config.cranelift_opt_level(if config.optimize {
        OptLevel::Speed
    } else {
        OptLevel::None
    });

    Ok(Engine::new(&wasm_config)?)
}
