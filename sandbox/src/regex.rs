//! Compiled patterns: the handle lifecycle wrapper.
//!
//! A [`Regex`] pairs the sandbox-side address of a compiled re2 object with
//! the module that owns it. It starts *Constructed* and becomes *Closed*
//! after [`Regex::close`]; every operation on a closed pattern is rejected
//! before any foreign call is made.
//!
//! Dropping a pattern does not destroy it. The guest object then lives
//! until the module is torn down, and a warning is logged.

use std::fmt;
use std::ops::Range;

use re2wasm_abi::decode::{decode_match_result, StringView, STRING_VIEW_SIZE};
use re2wasm_abi::exports::{DEFAULT_OPTIONS, MATCH_UNANCHORED};
use re2wasm_abi::ptr::abi_len;
use re2wasm_abi::GuestPtr;

use crate::bridge::{MatchCall, MemoryBridge, TransientRegion};
use crate::error::SandboxError;
use crate::memory::align4;
use crate::runtime::Re2Module;

/// Lifecycle state of a [`Regex`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternState {
    /// Usable for matching.
    Constructed,
    /// Destroy has been issued; every further operation is a usage error.
    Closed,
}

/// A re2 pattern compiled inside a [`Re2Module`].
pub struct Regex<'m> {
    module: &'m Re2Module,
    ptr: GuestPtr,
    state: PatternState,
    source: String,
}

impl<'m> Regex<'m> {
    /// Compile `pattern` in `module`.
    ///
    /// The pattern is copied into a transient region for the duration of
    /// `cre2_new` only; the engine keeps its own copy.
    ///
    /// Only a null object is reported as [`SandboxError::CompileFailed`].
    /// re2 returns a live object for a pattern that fails to parse, and the
    /// exported ABI has no way to query its error, so such a pattern
    /// constructs normally and never matches.
    pub(crate) fn construct(module: &'m Re2Module, pattern: &[u8]) -> Result<Self, SandboxError> {
        let source = String::from_utf8_lossy(pattern).into_owned();

        let ptr = module.with_bridge(|bridge| -> Result<GuestPtr, SandboxError> {
            let re = bridge.with_region(pattern, 0, |bridge, region| {
                bridge.cre2_new(region, DEFAULT_OPTIONS)
            })?;
            if re.is_null() {
                return Err(SandboxError::CompileFailed {
                    pattern: source.clone(),
                });
            }
            bridge.state_mut().live_patterns += 1;
            Ok(re)
        })?;

        tracing::debug!(module = module.id(), %ptr, pattern = %source, "compiled pattern");
        Ok(Self {
            module,
            ptr,
            state: PatternState::Constructed,
            source,
        })
    }

    /// Returns true if `subject` contains a match anywhere.
    pub fn is_match(&self, subject: impl AsRef<[u8]>) -> Result<bool, SandboxError> {
        self.ensure_constructed()?;
        let subject = subject.as_ref();
        let text_len = abi_len(subject.len())?;
        let re = self.ptr;

        let raw = self.module.with_bridge(|bridge| {
            bridge.with_region(subject, 0, |bridge, region| {
                bridge.cre2_match(MatchCall {
                    re,
                    text: region.ptr(),
                    text_len,
                    start: 0,
                    end: text_len,
                    anchor: MATCH_UNANCHORED,
                    out: GuestPtr::NULL,
                    nmatch: 0,
                })
            })
        })?;

        Ok(decode_match_result(raw)?)
    }

    /// Byte range of the leftmost match in `subject`, if any.
    ///
    /// Only the overall match is reported; capture groups are not exposed.
    pub fn find(&self, subject: impl AsRef<[u8]>) -> Result<Option<Range<usize>>, SandboxError> {
        self.ensure_constructed()?;
        let subject = subject.as_ref();
        let text_len = abi_len(subject.len())?;
        let slot_offset = align4(subject.len());
        let reserve = slot_offset - subject.len() + STRING_VIEW_SIZE;
        let re = self.ptr;

        self.module.with_bridge(|bridge| {
            bridge.with_region(subject, reserve, |bridge, region| {
                let slot = region.ptr().add(slot_offset)?;
                let raw = bridge.cre2_match(MatchCall {
                    re,
                    text: region.ptr(),
                    text_len,
                    start: 0,
                    end: text_len,
                    anchor: MATCH_UNANCHORED,
                    out: slot,
                    nmatch: 1,
                })?;
                if !decode_match_result(raw)? {
                    return Ok(None);
                }
                read_span(bridge, region, slot).map(Some)
            })
        })
    }

    /// Destroy the sandbox object.
    ///
    /// A second call is rejected without touching the sandbox. If
    /// `cre2_delete` traps the pattern is still marked closed, since
    /// issuing destroy again could free the object twice.
    pub fn close(&mut self) -> Result<(), SandboxError> {
        if self.state == PatternState::Closed {
            return Err(SandboxError::AlreadyClosed(self.ptr));
        }
        self.state = PatternState::Closed;

        let ptr = self.ptr;
        let result = self.module.with_bridge(|bridge| {
            bridge.state_mut().live_patterns -= 1;
            bridge.cre2_delete(ptr)
        });

        match result {
            Ok(()) => {
                tracing::debug!(module = self.module.id(), %ptr, "closed pattern");
                Ok(())
            }
            Err(e) => Err(SandboxError::DestroyFailed {
                ptr,
                source: Box::new(e),
            }),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PatternState {
        self.state
    }

    /// Returns true once `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.state == PatternState::Closed
    }

    /// The pattern source, lossily decoded as UTF-8.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// The module that owns this pattern.
    pub fn module(&self) -> &'m Re2Module {
        self.module
    }

    fn ensure_constructed(&self) -> Result<(), SandboxError> {
        match self.state {
            PatternState::Constructed => Ok(()),
            PatternState::Closed => Err(SandboxError::PatternClosed(self.ptr)),
        }
    }
}

/// Read the `cre2_string_t` the guest wrote at `slot` and turn it into a
/// range of the subject held in `region`.
fn read_span(
    bridge: &MemoryBridge,
    region: TransientRegion,
    slot: GuestPtr,
) -> Result<Range<usize>, SandboxError> {
    let bytes = bridge.read(slot, STRING_VIEW_SIZE)?;
    let mut raw = [0u8; STRING_VIEW_SIZE];
    raw.copy_from_slice(&bytes);
    let view = StringView::from_le_bytes(raw);
    Ok(view.range_within(region.ptr(), region.len())?)
}

impl fmt::Debug for Regex<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Regex")
            .field("module", &self.module.id())
            .field("ptr", &self.ptr)
            .field("state", &self.state)
            .field("source", &self.source)
            .finish()
    }
}

impl fmt::Display for Regex<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl Drop for Regex<'_> {
    fn drop(&mut self) {
        if self.state == PatternState::Constructed {
            tracing::warn!(
                module = self.module.id(),
                ptr = %self.ptr,
                pattern = %self.source,
                "pattern dropped without close; guest object lives until module teardown"
            );
        }
    }
}
