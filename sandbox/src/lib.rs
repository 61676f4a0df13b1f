//! `re2wasm-sandbox`: re2 patterns compiled and matched inside a Wasmtime sandbox.
//!
//! This crate loads a re2 build compiled to WebAssembly (the cre2 C ABI),
//! instantiates it as a library and lets host code compile, match and
//! destroy patterns that live entirely in guest memory:
//!
//! - **Code image:** compiled, validated and pre-linked once, shared by
//!   every module ([`CodeImage`])
//! - **Startup shim:** `env.__main_argc_argv` stub so the image initializes
//!   as a reactor
//! - **Memory bridge:** every variable-length argument is copied into a
//!   transient guest allocation that is freed on every exit path
//! - **Handles:** [`Regex`] borrows its [`Re2Module`] and rejects use after
//!   close
//! - **Serialization:** all calls into one module are serialized by a mutex
//!
//! ```rust,ignore
//! use re2wasm_sandbox::{CodeImage, Re2Module, SandboxConfig};
//!
//! let image = CodeImage::from_file("libre2.wasm", SandboxConfig::default())?;
//! let module = Re2Module::new(&image)?;
//! let mut re = module.compile("foo.?")?;
//! assert!(re.is_match("seafood fool")?);
//! re.close()?;
//! ```

pub mod error;
pub mod config;
pub mod memory;
pub mod host_impl;
pub mod validation;
pub mod linker;
pub mod image;
pub mod bridge;
pub mod runtime;
pub mod regex;

pub use error::{ErrorKind, SandboxError};
pub use config::SandboxConfig;
pub use image::CodeImage;
pub use runtime::{ModuleStats, Re2Module};
pub use regex::{PatternState, Regex};
