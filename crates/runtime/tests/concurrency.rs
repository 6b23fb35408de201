//! Concurrency tests for the signal store and the worker fan-out.
//!
//! Each test spawns real OS threads and checks that the join barrier leaves
//! exactly one signal per worker, with nothing lost or duplicated.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use cosmic_runtime::run::generate_concurrently;
use cosmic_runtime::{Signal, SignalGenerator, SignalParams, SignalStore};

fn tagged(tag: usize) -> Signal {
    Signal::from_parts(SignalParams::new(1, 1, 1.0, 0), vec![tag as f64]).unwrap()
}

fn tags(store: &SignalStore) -> Vec<usize> {
    store
        .snapshot()
        .iter()
        .map(|signal| signal.data()[0] as usize)
        .collect()
}

/// K workers each adding one signal yield exactly K distinct signals.
#[test]
fn test_fan_out_adds_exactly_one_signal_per_worker() {
    for workers in [1, 2, 4, 64, 250, 1000] {
        let store = SignalStore::new();
        let outcome = generate_concurrently(&store, workers, |worker| Ok(tagged(worker)));

        assert_eq!(outcome.generated, workers);
        assert!(outcome.failures.is_empty());

        let seen = tags(&store);
        assert_eq!(seen.len(), workers);
        let unique: HashSet<usize> = seen.into_iter().collect();
        assert_eq!(unique, (0..workers).collect::<HashSet<_>>());
    }
}

/// Generated signals from many workers all honour the requested length.
#[test]
fn test_fan_out_with_real_generator() {
    let store = SignalStore::new();
    let generator = SignalGenerator::default();
    let params = SignalParams::new(20, 5, 0.25, 3);

    let outcome = generate_concurrently(&store, 32, |worker| {
        let mut rng = ChaCha8Rng::seed_from_u64(1_000 + worker as u64);
        generator.signal(params, &mut rng)
    });

    assert_eq!(outcome.generated, 32);
    let snapshot = store.snapshot();
    assert_eq!(snapshot.len(), 32);
    assert!(snapshot.iter().all(|s| s.data().len() == 20 && s.params() == &params));
}

/// Snapshots taken while writers are active only ever grow and are never torn.
#[test]
fn test_snapshots_observe_consistent_prefixes() {
    let store = Arc::new(SignalStore::new());
    let writers: Vec<_> = (0..8)
        .map(|writer| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..200 {
                    store.add(tagged(writer * 1_000 + i));
                }
            })
        })
        .collect();

    let mut previous = 0;
    while writers.iter().any(|w| !w.is_finished()) {
        let snapshot = store.snapshot();
        assert!(snapshot.len() >= previous);
        assert!(snapshot.iter().all(|s| s.data().len() == 1));
        previous = snapshot.len();
    }
    for writer in writers {
        writer.join().unwrap();
    }

    assert_eq!(store.len(), 8 * 200);
}

/// A snapshot taken after `add` returns always contains that signal.
#[test]
fn test_add_happens_before_snapshot() {
    let store = Arc::new(SignalStore::new());
    let handles: Vec<_> = (0..16)
        .map(|tag| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                store.add(tagged(tag));
                assert!(tags(&store).contains(&tag));
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
}
