//! Shared test helpers for integration tests.
//!
//! Provides a WAT guest implementing the cre2 ABI, loaders for the real re2
//! image, and the pseudo-random text generator used by the match tests.

#![allow(dead_code)]

use std::path::PathBuf;

use re2wasm_sandbox::{CodeImage, Re2Module, SandboxConfig};

/// A guest speaking the cre2 ABI with a literal substring matcher.
///
/// - `malloc` is a bump allocator over 4 pages that returns null when the
///   heap is exhausted
/// - `_start` must run (and the startup shim must return 0) before
///   `cre2_new` accepts patterns
/// - `cre2_new` returns null for an empty pattern and traps on a pattern
///   starting with `!`
/// - `cre2_delete` traps on a pattern starting with `~`
/// - `cre2_match` traps on a subject starting with 0xFF and returns 7 on a
///   subject starting with 0xFE
pub const FIXTURE_WAT: &str = r#"
(module
  (import "env" "__main_argc_argv" (func $main (param i32 i32) (result i32)))
  (memory (export "memory") 4)
  (global $heap (mut i32) (i32.const 1024))
  (global $started (mut i32) (i32.const 0))

  (func (export "_start")
    (if (call $main (i32.const 0) (i32.const 0)) (then unreachable))
    (global.set $started (i32.const 1)))

  (func $malloc (export "malloc") (param $size i32) (result i32)
    (local $p i32) (local $next i32)
    (local.set $p (global.get $heap))
    (local.set $next
      (i32.and
        (i32.add (i32.add (local.get $p) (local.get $size)) (i32.const 7))
        (i32.const -8)))
    (if (i32.gt_u (local.get $next) (i32.const 262144))
      (then (return (i32.const 0))))
    (global.set $heap (local.get $next))
    (local.get $p))

  (func $free (export "free") (param $p i32))

  ;; object layout: [len: i32][pattern bytes]
  (func (export "cre2_new") (param $pat i32) (param $len i32) (param $opts i32) (result i32)
    (local $re i32)
    (if (i32.eqz (global.get $started)) (then unreachable))
    (if (i32.eqz (local.get $len)) (then (return (i32.const 0))))
    (if (i32.eq (i32.load8_u (local.get $pat)) (i32.const 33)) (then unreachable))
    (local.set $re (call $malloc (i32.add (local.get $len) (i32.const 4))))
    (if (i32.eqz (local.get $re)) (then (return (i32.const 0))))
    (i32.store (local.get $re) (local.get $len))
    (memory.copy (i32.add (local.get $re) (i32.const 4)) (local.get $pat) (local.get $len))
    (local.get $re))

  (func (export "cre2_delete") (param $re i32)
    (if (i32.eq (i32.load8_u offset=4 (local.get $re)) (i32.const 126)) (then unreachable))
    (call $free (local.get $re)))

  (func (export "cre2_match")
    (param $re i32) (param $text i32) (param $tlen i32) (param $start i32) (param $end i32)
    (param $anchor i32) (param $m i32) (param $n i32) (result i32)
    (local $plen i32) (local $i i32) (local $j i32)
    (if (local.get $tlen)
      (then
        (if (i32.eq (i32.load8_u (local.get $text)) (i32.const 255)) (then unreachable))
        (if (i32.eq (i32.load8_u (local.get $text)) (i32.const 254))
          (then (return (i32.const 7))))))
    (local.set $plen (i32.load (local.get $re)))
    (local.set $i (local.get $start))
    (block $done
      (loop $scan
        (br_if $done (i32.gt_u (i32.add (local.get $i) (local.get $plen)) (local.get $end)))
        (local.set $j (i32.const 0))
        (block $mismatch
          (loop $cmp
            (if (i32.ge_u (local.get $j) (local.get $plen))
              (then
                (if (local.get $n)
                  (then
                    (i32.store (local.get $m) (i32.add (local.get $text) (local.get $i)))
                    (i32.store offset=4 (local.get $m) (local.get $plen))))
                (return (i32.const 1))))
            (br_if $mismatch
              (i32.ne
                (i32.load8_u (i32.add (local.get $text) (i32.add (local.get $i) (local.get $j))))
                (i32.load8_u offset=4 (i32.add (local.get $re) (local.get $j)))))
            (local.set $j (i32.add (local.get $j) (i32.const 1)))
            (br $cmp)))
        (local.set $i (i32.add (local.get $i) (i32.const 1)))
        (br $scan)))
    (i32.const 0))
)
"#;

/// A guest whose `malloc` hands out a block two bytes short of the end of
/// its single page.
///
/// Only one block may be live at a time: `malloc` traps while a block is
/// outstanding and `free` traps unless it receives that block. A second
/// successful allocation therefore proves the first was freed exactly once.
pub const EDGE_OF_MEMORY_WAT: &str = r#"
(module
  (memory (export "memory") 1)
  (global $live (mut i32) (i32.const 0))

  (func (export "malloc") (param $size i32) (result i32)
    (if (global.get $live) (then unreachable))
    (global.set $live (i32.const 1))
    (i32.const 65534))

  (func (export "free") (param $p i32)
    (if (i32.eqz (global.get $live)) (then unreachable))
    (if (i32.ne (local.get $p) (i32.const 65534)) (then unreachable))
    (global.set $live (i32.const 0)))

  (func (export "cre2_new") (param i32 i32 i32) (result i32) (i32.const 4096))
  (func (export "cre2_delete") (param i32))
  (func (export "cre2_match") (param i32 i32 i32 i32 i32 i32 i32 i32) (result i32)
    (i32.const 0))
)
"#;

/// Heap capacity of the fixture guest in bytes.
pub const FIXTURE_HEAP_LIMIT: usize = 4 * 65536;

// ── Fixture Loaders ──

/// Compile the fixture guest with a custom SandboxConfig.
pub fn fixture_image_with_config(config: SandboxConfig) -> CodeImage {
    CodeImage::from_bytes(FIXTURE_WAT.as_bytes(), config).expect("fixture must compile")
}

/// Compile the fixture guest with default config.
pub fn fixture_image() -> CodeImage {
    fixture_image_with_config(SandboxConfig::default())
}

/// Instantiate the edge-of-memory guest.
pub fn edge_of_memory_module() -> Re2Module {
    let image = CodeImage::from_bytes(EDGE_OF_MEMORY_WAT.as_bytes(), SandboxConfig::default())
        .expect("edge-of-memory guest must compile");
    Re2Module::new(&image).expect("edge-of-memory guest must instantiate")
}

/// Instantiate a fresh module of the fixture guest.
pub fn fixture_module() -> Re2Module {
    Re2Module::new(&fixture_image()).expect("fixture must instantiate")
}

// ── Real Image Loaders ──

/// Location of the real re2 image: `$RE2_WASM`, else `testdata/libre2.wasm`.
pub fn real_image_path() -> PathBuf {
    match std::env::var_os("RE2_WASM") {
        Some(path) => PathBuf::from(path),
        None => PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("testdata/libre2.wasm"),
    }
}

/// Load the real re2 image with default config.
pub fn real_image() -> CodeImage {
    let path = real_image_path();
    assert!(
        path.exists(),
        "re2 image not found at {:?}. Place libre2.wasm there or set RE2_WASM",
        path
    );
    CodeImage::from_file(&path, SandboxConfig::default()).expect("failed to load re2 image")
}

// ── Assertions ──

/// Assert that no transient region is outstanding.
pub fn assert_no_outstanding_regions(module: &Re2Module) {
    let stats = module.stats();
    assert_eq!(stats.outstanding_regions, 0, "leaked regions: {:?}", stats);
    assert_eq!(stats.outstanding_bytes, 0, "leaked bytes: {:?}", stats);
}

// ── Text Generation ──

/// Deterministic pseudo-random printable text with sporadic newlines.
pub fn make_text(n: usize) -> Vec<u8> {
    let mut text = Vec::with_capacity(n);
    let mut x: u32 = !0;
    for _ in 0..n {
        x = x.wrapping_add(x);
        x ^= 1;
        if (x as i32) < 0 {
            x ^= 0x8888_8eef;
        }
        if x % 31 == 0 {
            text.push(b'\n');
        } else {
            text.push((x % (0x7E + 1 - 0x20) + 0x20) as u8);
        }
    }
    text
}
