//! # Sieve — Segmented Bit Sieve with Adaptive Counters
//!
//! The heart of the engine. One instance covers a single segment `[low,
//! high)`; HardLeaves workers (`hard_leaves.rs`) repeatedly call
//! [`Sieve::cross_off_count`] as `b` advances through the sieving primes,
//! interleaved with [`Sieve::count`] queries that answer "how many survivors
//! (numbers with no prime factor `<= p[b]`) lie at or before this offset".
//!
//! Storage is one bit per *odd* integer in the segment (even integers are
//! never represented — 2 is the only even prime and is handled outside this
//! structure). The bits are partitioned into `counters[]` buckets of
//! adaptive width `D`, so that `count(stop)` only has to popcount a
//! fractional bucket at the tail instead of scanning the whole prefix;
//! `D` is reselected once per segment, scaling with `segment_low^(1/4)`, so
//! the bucket count neither explodes for tiny segments nor collapses to one
//! giant bucket for huge ones.
//!
//! Adapted from the teacher's packed-word `BitSieve` in the original
//! `src/sieve.rs` (the `Vec<u64>` bit-array layout and `count_ones`-based
//! popcounting is reused directly); the counters-cursor incremental-count
//! machinery has no counterpart in the teacher and is built fresh from the
//! contract this engine needs.

use crate::primes::PrimeList;

/// One bit per odd integer in `[low, high)`. Bit `i` represents the odd
/// integer `low + 2*i + 1`.
pub struct Sieve {
    low: u64,
    high: u64,
    words: Vec<u64>,
    num_odds: u64,
    total_count: u64,
    /// Counter bucket width, in odd-index units.
    d: u64,
    counters: Vec<u32>,
    counters_i: usize,
    counters_count: u64,
    /// Odd-index boundary already folded into `counters_count`.
    counters_stop: u64,
    prev_stop: u64,
}

impl Sieve {
    /// Build a fresh sieve over `[low, high)`, mark every odd position as a
    /// survivor, then cross off multiples of the first `c` sieving primes
    /// (skipping `p[1] = 2`, which is never represented).
    pub fn pre_sieve(primes: &PrimeList, c: usize, low: u64, high: u64) -> Self {
        debug_assert!(high > low);
        let num_odds = odd_count(low, high);
        let num_words = (num_odds as usize).div_ceil(64).max(1);
        let words = vec![u64::MAX; num_words];

        let d = adaptive_d(low, num_odds);
        let num_counters = (num_odds.div_ceil(d)).max(2) as usize;
        let counters = vec![0u32; num_counters];

        let mut sieve = Sieve {
            low,
            high,
            words,
            num_odds,
            total_count: num_odds,
            d,
            counters,
            counters_i: 0,
            counters_count: 0,
            counters_stop: 0,
            prev_stop: 0,
        };
        sieve.clear_tail_bits();
        sieve.rebuild_counters();

        for b in 2..=c {
            let p = primes.get(b);
            sieve.cross_off(p);
        }
        sieve
    }

    /// Cross off every odd multiple of the sieving prime `p = p[b]` in
    /// `[low, high)` (other than `p` itself), updating `total_count` and the
    /// relevant `counters[]` bucket for each bit cleared.
    pub fn cross_off_count(&mut self, p: u64, _b: usize) {
        self.cross_off(p);
    }

    fn cross_off(&mut self, p: u64) {
        if p == 2 {
            return; // even numbers are not represented
        }
        let mut m = first_odd_multiple_past_self(p, self.low);
        while m < self.high {
            let idx = self.idx_of(m);
            if self.get_bit(idx) {
                self.clear_bit(idx);
                self.total_count -= 1;
                let bucket = (idx / self.d) as usize;
                self.counters[bucket] -= 1;
            }
            m += 2 * p;
        }
    }

    /// Cumulative count of survivors at odd-index `<= stop / 2`, i.e. over
    /// all positions whose represented integer is `<= low + stop`. Calls
    /// within one segment must be made with non-decreasing `stop`.
    pub fn count(&mut self, stop: u64) -> u64 {
        debug_assert!(stop >= self.prev_stop, "count() called with decreasing stop");
        let stop_idx = stop / 2;
        let target_idx = stop_idx.min(self.num_odds.saturating_sub(1));

        while self.counters_i < self.counters.len() && self.counters_stop + self.d <= target_idx + 1 {
            self.counters_count += self.counters[self.counters_i] as u64;
            self.counters_stop += self.d;
            self.counters_i += 1;
        }

        let extra = if self.counters_stop <= target_idx {
            self.popcount_range(self.counters_stop, target_idx)
        } else {
            0
        };

        self.prev_stop = stop;
        self.counters_count + extra
    }

    pub fn get_total_count(&self) -> u64 {
        self.total_count
    }

    pub fn low(&self) -> u64 {
        self.low
    }

    pub fn high(&self) -> u64 {
        self.high
    }

    fn idx_of(&self, n: u64) -> u64 {
        (n - self.low) / 2
    }

    #[inline]
    fn get_bit(&self, idx: u64) -> bool {
        let word = (idx / 64) as usize;
        let bit = idx % 64;
        self.words[word] & (1u64 << bit) != 0
    }

    #[inline]
    fn clear_bit(&mut self, idx: u64) {
        let word = (idx / 64) as usize;
        let bit = idx % 64;
        self.words[word] &= !(1u64 << bit);
    }

    fn clear_tail_bits(&mut self) {
        let used_in_last_word = self.num_odds % 64;
        if used_in_last_word != 0 {
            let last = self.words.len() - 1;
            let mask = (1u64 << used_in_last_word) - 1;
            self.words[last] &= mask;
        }
    }

    fn rebuild_counters(&mut self) {
        let new_counters: Vec<u32> = (0..self.counters.len())
            .map(|i| {
                let start = i as u64 * self.d;
                let end = (start + self.d).min(self.num_odds);
                if start < end {
                    self.popcount_range(start, end - 1) as u32
                } else {
                    0
                }
            })
            .collect();
        self.counters.copy_from_slice(&new_counters);
    }

    fn popcount_range(&self, from: u64, to_inclusive: u64) -> u64 {
        if from > to_inclusive {
            return 0;
        }
        let from_word = (from / 64) as usize;
        let to_word = (to_inclusive / 64) as usize;
        let from_bit = from % 64;
        let to_bit = to_inclusive % 64;

        if from_word == to_word {
            let width = to_bit - from_bit + 1;
            let mask = if width >= 64 {
                u64::MAX
            } else {
                ((1u64 << width) - 1) << from_bit
            };
            return (self.words[from_word] & mask).count_ones() as u64;
        }

        let mut total = 0u64;
        let head_mask = u64::MAX << from_bit;
        total += (self.words[from_word] & head_mask).count_ones() as u64;
        for w in &self.words[from_word + 1..to_word] {
            total += w.count_ones() as u64;
        }
        let tail_width = to_bit + 1;
        let tail_mask = if tail_width >= 64 {
            u64::MAX
        } else {
            (1u64 << tail_width) - 1
        };
        total += (self.words[to_word] & tail_mask).count_ones() as u64;
        total
    }
}

fn odd_count(low: u64, high: u64) -> u64 {
    (high.saturating_sub(low) + 1) / 2
}

/// Smallest odd multiple of `p` that is both `> p` (so `p` itself survives)
/// and `>= low`.
fn first_odd_multiple_past_self(p: u64, low: u64) -> u64 {
    let start = 3 * p;
    if start >= low {
        return start;
    }
    let mut k = low.div_ceil(p).max(1);
    if (k * p) % 2 == 0 {
        k += 1;
    }
    (k * p).max(start)
}

/// `D = round_to_power_of_two(sqrt(sqrt(segment_low)))`, the adaptive
/// counter-bucket width reselected once per segment.
fn adaptive_d(segment_low: u64, num_odds: u64) -> u64 {
    let base = (segment_low.max(16) as f64).sqrt().sqrt();
    let mut d = round_to_power_of_two(base.max(1.0) as u64).max(1);
    while num_odds / d < 2 && d > 1 {
        d /= 2;
    }
    d.max(1)
}

fn round_to_power_of_two(n: u64) -> u64 {
    if n <= 1 {
        return 1;
    }
    1u64 << (64 - (n - 1).leading_zeros())
}
