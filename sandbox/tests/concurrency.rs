//! Concurrency tests: shared modules are serialized, images are shared.

mod common;

use std::thread;

use re2wasm_sandbox::Re2Module;

use common::*;

#[test]
fn test_shared_module_across_threads() {
    let module = fixture_module();

    thread::scope(|s| {
        for worker in 0..4 {
            let module = &module;
            s.spawn(move || {
                let needle = format!("worker-{}", worker);
                let mut re = module.compile(&needle).unwrap();
                for i in 0..50 {
                    let hit = format!("item {} for {}", i, needle);
                    let miss = format!("item {} for nobody", i);
                    assert!(re.is_match(&hit).unwrap());
                    assert!(!re.is_match(&miss).unwrap());
                }
                re.close().unwrap();
            });
        }
    });

    let stats = module.stats();
    assert_eq!(stats.outstanding_regions, 0);
    assert_eq!(stats.live_patterns, 0);
    assert_eq!(stats.total_allocations, 4 * (1 + 100));
}

#[test]
fn test_module_per_worker_from_one_image() {
    let image = fixture_image();

    let ids: Vec<u64> = thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let image = image.clone();
                s.spawn(move || {
                    let module = Re2Module::new(&image).unwrap();
                    let mut re = module.compile("shared").unwrap();
                    assert!(re.is_match("one shared image").unwrap());
                    re.close().unwrap();
                    assert_no_outstanding_regions(&module);
                    module.id()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let mut unique = ids.clone();
    unique.sort_unstable();
    unique.dedup();
    assert_eq!(unique.len(), ids.len());
}

#[test]
fn test_pattern_usable_from_another_thread() {
    let module = fixture_module();
    let mut re = module.compile("moved").unwrap();

    thread::scope(|s| {
        s.spawn(|| {
            assert!(re.is_match("it moved").unwrap());
        });
    });

    re.close().unwrap();
}
