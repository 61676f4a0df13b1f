//! WASM module validation: cre2 ABI compatibility checks.
//!
//! Validates that a compiled code image can back a `Re2Module` before any
//! instance is created. Checks:
//!
//! 1. `memory` export present
//! 2. Required function exports present with `i32` signatures
//! 3. Imports come only from the startup shim module or WASI preview1
//! 4. The startup import, if present, has the `(i32, i32) -> i32` shape

use wasmtime::{ExternType, FuncType, Module, ValType};

use re2wasm_abi::exports::{
    ALLOWED_IMPORT_MODULES, MEMORY, REQUIRED_EXPORTS, STARTUP_IMPORT_MODULE, STARTUP_IMPORT_NAME,
};

use crate::error::SandboxError;

/// Check if a ValType is i32.
fn is_i32(vt: &ValType) -> bool {
    matches!(vt, ValType::I32)
}

/// Validate that a WASM module meets the cre2 ABI requirements.
pub fn validate_module(module: &Module) -> Result<(), SandboxError> {
    validate_exports(module)?;
    validate_imports(module)?;
    Ok(())
}

fn check_i32_shape(
    what: &str,
    func_ty: &FuncType,
    expected_params: usize,
    expected_results: usize,
) -> Result<(), SandboxError> {
    let params: Vec<ValType> = func_ty.params().collect();
    let results: Vec<ValType> = func_ty.results().collect();

    if params.len() != expected_params || !params.iter().all(is_i32) {
        return Err(SandboxError::ValidationError(format!(
            "{} has wrong param signature: expected {} i32 params, got {} params",
            what,
            expected_params,
            params.len()
        )));
    }

    if results.len() != expected_results || !results.iter().all(is_i32) {
        return Err(SandboxError::ValidationError(format!(
            "{} has wrong result signature: expected {} i32 results, got {} results",
            what,
            expected_results,
            results.len()
        )));
    }

    Ok(())
}

/// Check that all required exports are present with correct signatures.
fn validate_exports(module: &Module) -> Result<(), SandboxError> {
    let has_memory = module
        .exports()
        .any(|e| e.name() == MEMORY && matches!(e.ty(), ExternType::Memory(_)));
    if !has_memory {
        return Err(SandboxError::ValidationError(format!(
            "module must export '{}'",
            MEMORY
        )));
    }

    for spec in REQUIRED_EXPORTS {
        let export = module
            .exports()
            .find(|e| e.name() == spec.name)
            .ok_or_else(|| {
                SandboxError::ValidationError(format!("missing required export: {}", spec.name))
            })?;

        let func_ty = match export.ty() {
            ExternType::Func(ft) => ft,
            _ => {
                return Err(SandboxError::ValidationError(format!(
                    "export '{}' must be a function",
                    spec.name
                )));
            }
        };

        check_i32_shape(
            &format!("export '{}'", spec.name),
            &func_ty,
            spec.params,
            spec.results,
        )?;
    }

    Ok(())
}

/// Check that imports stay within the shim and WASI surface.
fn validate_imports(module: &Module) -> Result<(), SandboxError> {
    for import in module.imports() {
        let module_name = import.module();

        if !ALLOWED_IMPORT_MODULES.contains(&module_name) {
            return Err(SandboxError::ValidationError(format!(
                "import from unknown module '{}': {}",
                module_name,
                import.name()
            )));
        }

        let func_ty = match import.ty() {
            ExternType::Func(ft) => ft,
            _ => {
                return Err(SandboxError::ValidationError(format!(
                    "non-function import not allowed: {}::{}",
                    module_name,
                    import.name()
                )));
            }
        };

        if module_name == STARTUP_IMPORT_MODULE {
            if import.name() != STARTUP_IMPORT_NAME {
                return Err(SandboxError::ValidationError(format!(
                    "unsupported host import: {}::{}",
                    module_name,
                    import.name()
                )));
            }
            check_i32_shape(
                &format!("import '{}::{}'", module_name, STARTUP_IMPORT_NAME),
                &func_ty,
                2,
                1,
            )?;
        }
    }

    Ok(())
}
