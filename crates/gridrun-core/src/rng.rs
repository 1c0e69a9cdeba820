//! Deterministic seed-derivation helpers.

use std::hash::Hasher;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use siphasher::sip::SipHasher13;

static FRESH_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Derives the deterministic seed for a specific substream.
///
/// Substreams are derived by hashing `(master_seed, substream)` with
/// SipHash-1-3 configured with fixed zero keys. This rule is stable across
/// platforms and must be used whenever deterministic branching is required.
pub fn derive_seed(master_seed: u64, substream: u64) -> u64 {
    let mut hasher = SipHasher13::new_with_keys(0, 0);
    hasher.write_u64(master_seed);
    hasher.write_u64(substream);
    hasher.finish()
}

/// Returns a fresh seed derived from wall-clock time and a process-local
/// counter, for seed fields the caller chose not to pin.
pub fn fresh_seed() -> u64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos() as u64)
        .unwrap_or(0);
    let count = FRESH_COUNTER.fetch_add(1, Ordering::Relaxed);
    let mut hasher = SipHasher13::new_with_keys(0, 0);
    hasher.write_u64(nanos);
    hasher.write_u64(count);
    hasher.finish()
}
