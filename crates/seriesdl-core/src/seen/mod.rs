//! Probabilistic "already produced" set (Bloom filter).
//!
//! Download workers ask the cache before touching the filesystem or network.
//! A negative answer is definitive; a positive one still needs a real
//! existence check because of false positives.

mod sizing;

pub use sizing::{SizingParams, DEFAULT_FALSE_POSITIVE_RATE};

use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::{PoisonError, RwLock};

/// Fixed-capacity Bloom filter, safe to share between worker threads.
///
/// Bits live in 64-bit words; `add` takes the write lock, `contains` the read
/// lock. Bits are never cleared.
pub struct MembershipCache {
    words: RwLock<Vec<u64>>,
    bits: usize,
    hashes: u32,
    expected_items: usize,
    false_positive_rate: f64,
}

impl MembershipCache {
    pub fn new(expected_items: usize, false_positive_rate: f64) -> Self {
        if sizing::effective_rate(false_positive_rate) != false_positive_rate {
            tracing::warn!(
                "invalid false-positive rate {}, using {}",
                false_positive_rate,
                DEFAULT_FALSE_POSITIVE_RATE
            );
        }
        let params = SizingParams::for_capacity(expected_items, false_positive_rate);
        tracing::debug!(
            expected_items,
            bits = params.bits,
            hashes = params.hashes,
            "membership cache sized"
        );
        Self {
            words: RwLock::new(vec![0u64; params.words()]),
            bits: params.bits,
            hashes: params.hashes,
            expected_items: expected_items.max(1),
            false_positive_rate: sizing::effective_rate(false_positive_rate),
        }
    }

    pub fn add(&self, key: &[u8]) {
        let mut words = self.words.write().unwrap_or_else(PoisonError::into_inner);
        for pos in self.positions(key) {
            words[pos / 64] |= 1u64 << (pos % 64);
        }
    }

    /// False means never added. True means probably added.
    pub fn contains(&self, key: &[u8]) -> bool {
        let words = self.words.read().unwrap_or_else(PoisonError::into_inner);
        self.positions(key)
            .all(|pos| words[pos / 64] & (1u64 << (pos % 64)) != 0)
    }

    pub fn bit_count(&self) -> usize {
        self.bits
    }

    pub fn hash_count(&self) -> u32 {
        self.hashes
    }

    pub fn expected_items(&self) -> usize {
        self.expected_items
    }

    pub fn false_positive_rate(&self) -> f64 {
        self.false_positive_rate
    }

    /// Double hashing over one 64-bit digest: `(h1 + i·h2) mod m` for `i in 0..k`.
    fn positions(&self, key: &[u8]) -> impl Iterator<Item = usize> {
        let hash = key_hash(key);
        let h1 = hash & 0xFFFF_FFFF;
        // Odd so successive bit positions never collapse onto one.
        let h2 = (hash >> 32) | 1;
        let m = self.bits as u64;
        (0..u64::from(self.hashes)).map(move |i| (h1.wrapping_add(i.wrapping_mul(h2)) % m) as usize)
    }
}

fn key_hash(key: &[u8]) -> u64 {
    let digest = Sha256::digest(key);
    let mut word = [0u8; 8];
    word.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(word)
}

impl fmt::Debug for MembershipCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MembershipCache")
            .field("bits", &self.bits)
            .field("hashes", &self.hashes)
            .field("expected_items", &self.expected_items)
            .field("false_positive_rate", &self.false_positive_rate)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn added_keys_are_always_present() {
        let cache = MembershipCache::new(100, 0.05);
        for i in 1..=50 {
            cache.add(format!("f{}", i).as_bytes());
        }
        for i in 1..=50 {
            assert!(cache.contains(format!("f{}", i).as_bytes()), "f{} missing", i);
        }
    }

    #[test]
    fn empty_cache_contains_nothing() {
        let cache = MembershipCache::new(100, 0.05);
        assert!(!cache.contains(b"unrelated-key-xyz"));
        assert!(!cache.contains(b""));
    }

    #[test]
    fn unrelated_key_is_usually_absent() {
        // Different populations so a single unlucky collision cannot fail the test.
        let mut positives = 0;
        for trial in 0..20 {
            let cache = MembershipCache::new(100, 0.05);
            for i in 1..=50 {
                cache.add(format!("t{}-f{}", trial, i).as_bytes());
            }
            if cache.contains(b"unrelated-key-xyz") {
                positives += 1;
            }
        }
        assert!(positives < 10, "{} of 20 trials were positive", positives);
    }

    #[test]
    fn false_positive_rate_matches_configuration() {
        let n = 1000;
        let p = 0.05;
        let mut total = 0.0;
        let trials = 5;
        for trial in 0..trials {
            let cache = MembershipCache::new(n, p);
            for i in 0..n {
                cache.add(format!("trial{}/present/{}", trial, i).as_bytes());
            }
            let lookups = 10_000;
            let hits = (0..lookups)
                .filter(|i| cache.contains(format!("trial{}/absent/{}", trial, i).as_bytes()))
                .count();
            total += hits as f64 / lookups as f64;
        }
        let rate = total / trials as f64;
        assert!(rate < 2.0 * p, "empirical rate {} too high for p={}", rate, p);
        assert!(rate > p / 5.0, "empirical rate {} implausibly low for p={}", rate, p);
    }

    #[test]
    fn invalid_rate_falls_back_to_default() {
        let cache = MembershipCache::new(10, 1.5);
        assert_eq!(cache.false_positive_rate(), DEFAULT_FALSE_POSITIVE_RATE);
        let zero = MembershipCache::new(0, 0.1);
        assert_eq!(zero.expected_items(), 1);
        zero.add(b"x");
        assert!(zero.contains(b"x"));
    }

    #[test]
    fn concurrent_adds_and_reads() {
        let cache = Arc::new(MembershipCache::new(4000, 0.01));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for i in 0..1000 {
                        let key = format!("{}/{}", t, i);
                        cache.add(key.as_bytes());
                        assert!(cache.contains(key.as_bytes()));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        for t in 0..4 {
            for i in 0..1000 {
                assert!(cache.contains(format!("{}/{}", t, i).as_bytes()));
            }
        }
    }
}
