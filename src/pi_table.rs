//! # PiTable — Compressed PrimePi(n) Lookup
//!
//! A sliding, segmented lookup table for `PrimePi(n)` (the count of primes
//! `<= n`) over a window `[low, high)` that grows toward a `max_high` ceiling
//! one `segment_size` chunk at a time. Used by the "easy" special-leaf path
//! (`S2_easy` in `kernels.rs`), where `phi(n, b) = PrimePi(n) - b + 1` once
//! `n` is known to sit between `p[b+1]` and `p[b+1]^2`.
//!
//! Storage is one 128-bit "bucket" per 128 consecutive integers: a 64-bit
//! `prime_count` (the value of `PrimePi` at the bucket's left edge) plus a
//! 64-bit `bits` field, one bit per odd integer in the bucket, flagging
//! primality. Even integers are never represented directly, except for `2`:
//! the table's very first bit (which would otherwise flag the always-composite
//! `n=1`) is repurposed to flag `2` instead, so every bucket's running
//! `prime_count` and popcount already account for it. `get` also
//! short-circuits `n <= 2` directly, without touching the buckets at all.
//!
//! Construction proceeds in two rayon passes per segment: a **bit pass**
//! (each worker independently sieves its sub-range and sets bits, recording
//! a local prime count) and a **prefix pass** (each worker, now knowing every
//! other worker's local count, fills in the cumulative `prime_count` field
//! for its own buckets). This mirrors the teacher's `BitSieve` packed-word
//! layout in `sieve.rs`, generalized from a single flat bitmap to a bucketed
//! one that carries its own running prefix sum.

use rayon::prelude::*;

use crate::error::PrimeCountError;
use crate::primes::PrimeList;

const BUCKET_SPAN: u64 = 128;
const MIN_SEGMENT_SIZE: u64 = 256 * 1024 * 8;

#[derive(Clone, Copy, Default)]
struct Bucket {
    prime_count: u64,
    bits: u64,
}

/// Sliding compressed `PrimePi` table over `[low, high)`, growing toward
/// `max_high`.
pub struct PiTable {
    low: u64,
    high: u64,
    max_high: u64,
    segment_size: u64,
    pi_low: u64,
    buckets: Vec<Bucket>,
}

impl PiTable {
    /// Build the first window starting at `low = 0`. `segment_size` is
    /// clamped to `>= 256 KiB * 8` and rounded up to a multiple of 128.
    pub fn new(primes: &PrimeList, max_high: u64, segment_size: u64) -> Result<Self, PrimeCountError> {
        if max_high > (1u64 << 63) {
            return Err(PrimeCountError::NumericOverflow {
                context: "PiTable max_high".to_string(),
            });
        }
        let segment_size = round_segment_size(segment_size);
        let low = 0u64;
        let high = segment_size.min(max_high);
        let buckets = build_window(primes, low, high, 0);
        Ok(PiTable {
            low,
            high,
            max_high,
            segment_size,
            pi_low: 0,
            buckets,
        })
    }

    pub fn low(&self) -> u64 {
        self.low
    }

    pub fn high(&self) -> u64 {
        self.high
    }

    /// `PrimePi(n)` for `n` in `[low, high)`. `n < 2` returns 0; `n == 2`
    /// is a constant-time special case.
    pub fn get(&self, n: u64) -> u64 {
        if n < 2 {
            return 0;
        }
        if n == 2 {
            return 1;
        }
        debug_assert!(n >= self.low && n < self.high, "PiTable::get out of window");
        let offset = n - self.low;
        let idx = (offset / BUCKET_SPAN) as usize;
        let bucket = &self.buckets[idx];
        let within = offset % BUCKET_SPAN;
        // bit i represents bucket_base + 2*i + 1; include every bit whose
        // represented value is <= n.
        let included_bits = (within / 2) + 1;
        let mask = if included_bits >= 64 {
            u64::MAX
        } else {
            (1u64 << included_bits) - 1
        };
        bucket.prime_count + (bucket.bits & mask).count_ones() as u64
    }

    /// Slide the window forward by `segment_size`, capped at `max_high`.
    /// Returns `false` (and leaves the table unchanged) once `high ==
    /// max_high` already.
    pub fn advance(&mut self, primes: &PrimeList) -> bool {
        if self.high >= self.max_high {
            return false;
        }
        self.pi_low = total_count(&self.buckets, self.low, self.high);
        self.low = self.high;
        self.high = (self.low + self.segment_size).min(self.max_high);
        self.buckets = build_window(primes, self.low, self.high, self.pi_low);
        true
    }
}

fn round_segment_size(requested: u64) -> u64 {
    let clamped = requested.max(MIN_SEGMENT_SIZE);
    clamped.div_ceil(BUCKET_SPAN) * BUCKET_SPAN
}

fn total_count(buckets: &[Bucket], low: u64, high: u64) -> u64 {
    if buckets.is_empty() {
        return 0;
    }
    let last = buckets.len() - 1;
    let bucket_base = low + (last as u64) * BUCKET_SPAN;
    let within = (high - 1 - bucket_base).min(BUCKET_SPAN - 1);
    let included_bits = (within / 2) + 1;
    let mask = if included_bits >= 64 {
        u64::MAX
    } else {
        (1u64 << included_bits) - 1
    };
    buckets[last].prime_count + (buckets[last].bits & mask).count_ones() as u64
}

/// Build the bucket array for `[low, high)`, given `pi_low = PrimePi(low - 1)`.
fn build_window(primes: &PrimeList, low: u64, high: u64, pi_low: u64) -> Vec<Bucket> {
    if high <= low {
        return Vec::new();
    }
    let num_buckets = ((high - low).div_ceil(BUCKET_SPAN)) as usize;
    let num_workers = rayon::current_num_threads().max(1);
    let chunk = num_buckets.div_ceil(num_workers).max(1);

    // Pass 1: each worker sieves its own slice of buckets independently and
    // records its local prime count.
    let mut buckets = vec![Bucket::default(); num_buckets];
    let sqrt_high = (high as f64).sqrt() as u64 + 2;
    let sieving_primes: Vec<u64> = primes.iter_range(2, sqrt_high + 1).collect();

    let local_counts: Vec<u64> = buckets
        .par_chunks_mut(chunk)
        .enumerate()
        .map(|(worker, slice)| {
            let start = low + (worker * chunk) as u64 * BUCKET_SPAN;
            sieve_bit_pass(&sieving_primes, start, slice)
        })
        .collect();

    // Pass 2: compute each worker's prefix offset and fill prime_count.
    let mut offsets = vec![0u64; local_counts.len()];
    let mut running = pi_low;
    for (w, &c) in local_counts.iter().enumerate() {
        offsets[w] = running;
        running += c;
    }

    buckets
        .par_chunks_mut(chunk)
        .zip(offsets.par_iter())
        .for_each(|(slice, &base)| {
            let mut running = base;
            for bucket in slice.iter_mut() {
                bucket.prime_count = running;
                running += bucket.bits.count_ones() as u64;
            }
        });

    buckets
}

/// Sieve `[start, start + slice.len()*128)` by trial division against
/// `sieving_primes` (all primes `<= sqrt(high)`), filling `bits` for each
/// bucket in `slice`. Returns the total number of primes found.
fn sieve_bit_pass(sieving_primes: &[u64], start: u64, slice: &mut [Bucket]) -> u64 {
    let mut count = 0u64;
    for (i, bucket) in slice.iter_mut().enumerate() {
        let bucket_base = start + (i as u64) * BUCKET_SPAN;
        let mut bits = 0u64;
        for bit in 0..64u32 {
            // bit 0 of the table's very first bucket represents n=1, which
            // is never prime and so would otherwise sit forever unset;
            // repurpose it to flag 2 instead, the one prime this odd-only
            // encoding can't otherwise represent.
            let is_prime = if bucket_base == 0 && bit == 0 {
                true
            } else {
                let n = bucket_base + 2 * bit as u64 + 1;
                n >= 2 && is_prime_by_trial(n, sieving_primes)
            };
            if is_prime {
                bits |= 1u64 << bit;
                count += 1;
            }
        }
        bucket.bits = bits;
    }
    count
}

fn is_prime_by_trial(n: u64, sieving_primes: &[u64]) -> bool {
    if n < 2 {
        return false;
    }
    if n % 2 == 0 {
        return n == 2;
    }
    for &p in sieving_primes {
        if p * p > n {
            break;
        }
        if n % p == 0 {
            return false;
        }
    }
    true
}
