//! Export and import surface of a cre2 WASM build.
//!
//! Every function in the cre2 ABI takes and returns `i32` on wasm32, so a
//! signature is fully described by its parameter and result counts.

/// `cre2_new(pattern_ptr, pattern_len, options_ptr) -> re_ptr`
pub const CRE2_NEW: &str = "cre2_new";
/// `cre2_delete(re_ptr)`
pub const CRE2_DELETE: &str = "cre2_delete";
/// `cre2_match(re, text, text_len, start, end, anchor, match_ptr, nmatch) -> i32`
pub const CRE2_MATCH: &str = "cre2_match";
/// `malloc(size) -> ptr`
pub const MALLOC: &str = "malloc";
/// `free(ptr)`
pub const FREE: &str = "free";
/// Linear memory export.
pub const MEMORY: &str = "memory";

/// Module name of the startup shim import.
pub const STARTUP_IMPORT_MODULE: &str = "env";
/// The `main` entry point the libc startup code calls into.
pub const STARTUP_IMPORT_NAME: &str = "__main_argc_argv";
/// Status returned by the startup shim.
pub const STARTUP_STATUS_OK: i32 = 0;

/// WASI preview1 import module.
pub const WASI_PREVIEW1_MODULE: &str = "wasi_snapshot_preview1";

/// Library initializers, in order of preference. A reactor build exports
/// `_initialize`; a command build only exports `_start`, whose `main`
/// resolves to the startup shim.
pub const INITIALIZERS: &[&str] = &["_initialize", "_start"];

/// Null options pointer: compile with engine defaults.
pub const DEFAULT_OPTIONS: i32 = 0;

/// Anchor argument the engine treats as unanchored.
pub const MATCH_UNANCHORED: i32 = 0;

/// Number of `i32` parameters of `cre2_match`.
pub const MATCH_ARITY: usize = 8;

/// Expected shape of a function export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportSpec {
    pub name: &'static str,
    pub params: usize,
    pub results: usize,
}

impl ExportSpec {
    const fn new(name: &'static str, params: usize, results: usize) -> Self {
        Self { name, params, results }
    }
}

/// Function exports a module must provide to be usable by the bridge.
pub const REQUIRED_EXPORTS: &[ExportSpec] = &[
    ExportSpec::new(CRE2_NEW, 3, 1),
    ExportSpec::new(CRE2_DELETE, 1, 0),
    ExportSpec::new(CRE2_MATCH, MATCH_ARITY, 1),
    ExportSpec::new(MALLOC, 1, 1),
    ExportSpec::new(FREE, 1, 0),
];

/// Import modules a code image may reference.
pub const ALLOWED_IMPORT_MODULES: &[&str] = &[STARTUP_IMPORT_MODULE, WASI_PREVIEW1_MODULE];

/// Look up the expected shape of an export by name.
pub fn required_export(name: &str) -> Option<&'static ExportSpec> {
    REQUIRED_EXPORTS.iter().find(|spec| spec.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_exports_are_unique() {
        for (i, a) in REQUIRED_EXPORTS.iter().enumerate() {
            for b in &REQUIRED_EXPORTS[i + 1..] {
                assert_ne!(a.name, b.name);
            }
        }
    }

    #[test]
    fn test_lookup() {
        let spec = required_export(CRE2_MATCH).unwrap();
        assert_eq!(spec.params, 8);
        assert_eq!(spec.results, 1);
        assert!(required_export("cre2_replace").is_none());
    }

    #[test]
    fn test_shim_module_is_allowed() {
        assert!(ALLOWED_IMPORT_MODULES.contains(&STARTUP_IMPORT_MODULE));
        assert!(ALLOWED_IMPORT_MODULES.contains(&WASI_PREVIEW1_MODULE));
    }
}
