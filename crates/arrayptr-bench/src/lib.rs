//! Benchmark workloads and utilities for arrayptr.
//!
//! - [`random_indices`]: deterministic random access pattern via seed
//! - [`filled`]: handle whose element `i` holds `i`

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use arrayptr::ArrayPtr;
use rand_chacha::rand_core::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Element count used by the fixed-size benchmarks.
pub const BENCH_LEN: usize = 10_000;

/// Generate `count` indices in `0..len`, identical for identical seeds.
///
/// Returns an empty pattern when `len` is zero.
pub fn random_indices(len: usize, count: usize, seed: u64) -> Vec<usize> {
    if len == 0 {
        return Vec::new();
    }
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..count)
        .map(|_| (rng.next_u64() % len as u64) as usize)
        .collect()
}

/// Allocate `len` elements where element `i` holds `i`.
pub fn filled(len: usize) -> ArrayPtr<u64> {
    ArrayPtr::from_fn(len, |i| i as u64)
}
