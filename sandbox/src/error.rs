//! Sandbox error types.

use re2wasm_abi::{AbiError, GuestPtr};

/// Broad category of a [`SandboxError`], deciding how a caller reacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The embedding environment is broken; discard the module.
    Fatal,
    /// A foreign call trapped or returned garbage. Sandbox state after a
    /// trap is undefined, so retrying is not safe in general.
    Call,
    /// The caller misused a handle (closed, double close).
    Usage,
    /// Destroying a pattern failed. The rest of the module is unaffected.
    Destroy,
}

/// Top-level error type for the sandbox crate.
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    /// Wasmtime engine, compilation, linking or instantiation error.
    #[error("wasmtime error: {0}")]
    Wasmtime(#[from] anyhow::Error),

    /// Module validation failed (missing exports, bad imports, etc.).
    #[error("validation error: {0}")]
    ValidationError(String),

    /// A process-wide code image was installed twice.
    #[error("a code image is already installed")]
    ImageAlreadyInstalled,

    /// No process-wide code image has been installed.
    #[error("no code image installed")]
    ImageNotInstalled,

    /// The module's library initializer trapped.
    #[error("initializer `{export}` failed: {message}")]
    InitFailed {
        export: &'static str,
        message: String,
    },

    /// The guest allocator returned null or trapped.
    #[error("guest allocation of {size} bytes failed: {reason}")]
    AllocationFailed { size: usize, reason: String },

    /// The guest `free` export trapped.
    #[error("guest release of {ptr} failed: {reason}")]
    ReleaseFailed { ptr: GuestPtr, reason: String },

    /// Memory operation outside linear memory bounds.
    #[error("memory error: {0}")]
    MemoryError(String),

    /// A guest value or allocation pairing violated the ABI.
    #[error("abi error: {0}")]
    Abi(#[from] AbiError),

    /// The per-call fuel budget ran out.
    #[error("fuel exhausted in `{export}`")]
    FuelExhausted { export: &'static str },

    /// WASM guest trapped during a foreign call.
    #[error("guest trapped in `{export}`: {message}")]
    GuestTrapped {
        export: &'static str,
        message: String,
    },

    /// `cre2_new` returned a null object.
    #[error("failed to compile pattern {pattern:?}")]
    CompileFailed { pattern: String },

    /// Operation on a closed pattern.
    #[error("pattern {0} is closed")]
    PatternClosed(GuestPtr),

    /// Second close of the same pattern.
    #[error("pattern {0} is already closed")]
    AlreadyClosed(GuestPtr),

    /// `cre2_delete` trapped.
    #[error("failed to delete compiled pattern {ptr}: {source}")]
    DestroyFailed {
        ptr: GuestPtr,
        #[source]
        source: Box<SandboxError>,
    },
}

impl SandboxError {
    /// The category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Wasmtime(_)
            | Self::ValidationError(_)
            | Self::ImageAlreadyInstalled
            | Self::ImageNotInstalled
            | Self::InitFailed { .. }
            | Self::AllocationFailed { .. }
            | Self::ReleaseFailed { .. }
            | Self::MemoryError(_) => ErrorKind::Fatal,
            Self::Abi(e) => match e {
                AbiError::UnexpectedMatchResult(_) | AbiError::ViewOutOfSubject { .. } => {
                    ErrorKind::Call
                }
                AbiError::LengthOverflow(_) => ErrorKind::Usage,
                AbiError::DuplicateAllocation(_) | AbiError::UnknownAllocation(_) => {
                    ErrorKind::Fatal
                }
            },
            Self::FuelExhausted { .. } | Self::GuestTrapped { .. } | Self::CompileFailed { .. } => {
                ErrorKind::Call
            }
            Self::PatternClosed(_) | Self::AlreadyClosed(_) => ErrorKind::Usage,
            Self::DestroyFailed { .. } => ErrorKind::Destroy,
        }
    }

    /// Returns true if the module this error came from should be discarded.
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Fatal
    }
}

/// Convert a failed guest call into a `SandboxError`.
///
/// Fuel exhaustion → `SandboxError::FuelExhausted`
/// Other traps → `SandboxError::GuestTrapped`
pub(crate) fn guest_call_error(export: &'static str, err: anyhow::Error) -> SandboxError {
    match err.downcast_ref::<wasmtime::Trap>() {
        Some(wasmtime::Trap::OutOfFuel) => SandboxError::FuelExhausted { export },
        _ => SandboxError::GuestTrapped {
            export,
            message: format!("{err:#}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taxonomy() {
        let ptr = GuestPtr::from_abi(64);
        assert!(SandboxError::ValidationError("x".into()).is_fatal());
        assert!(SandboxError::AllocationFailed { size: 4, reason: "null".into() }.is_fatal());
        assert!(SandboxError::MemoryError("oob".into()).is_fatal());
        assert_eq!(
            SandboxError::GuestTrapped { export: "cre2_match", message: "unreachable".into() }.kind(),
            ErrorKind::Call
        );
        assert_eq!(SandboxError::PatternClosed(ptr).kind(), ErrorKind::Usage);
        assert_eq!(SandboxError::AlreadyClosed(ptr).kind(), ErrorKind::Usage);
        assert_eq!(
            SandboxError::DestroyFailed {
                ptr,
                source: Box::new(SandboxError::GuestTrapped {
                    export: "cre2_delete",
                    message: "unreachable".into(),
                }),
            }
            .kind(),
            ErrorKind::Destroy
        );
    }

    #[test]
    fn test_abi_errors_split_by_cause() {
        let ptr = GuestPtr::from_abi(64);
        assert_eq!(
            SandboxError::from(AbiError::UnexpectedMatchResult(7)).kind(),
            ErrorKind::Call
        );
        assert_eq!(
            SandboxError::from(AbiError::UnknownAllocation(ptr)).kind(),
            ErrorKind::Fatal
        );
        assert_eq!(
            SandboxError::from(AbiError::LengthOverflow(usize::MAX)).kind(),
            ErrorKind::Usage
        );
    }

    #[test]
    fn test_plain_anyhow_is_a_trap() {
        let err = guest_call_error("cre2_match", anyhow::anyhow!("boom"));
        match err {
            SandboxError::GuestTrapped { export, message } => {
                assert_eq!(export, "cre2_match");
                assert!(message.contains("boom"));
            }
            other => panic!("expected GuestTrapped, got {other:?}"),
        }
    }

    #[test]
    fn test_out_of_fuel_is_classified() {
        let err = guest_call_error("cre2_match", anyhow::Error::new(wasmtime::Trap::OutOfFuel));
        assert!(matches!(err, SandboxError::FuelExhausted { export: "cre2_match" }));
    }
}
