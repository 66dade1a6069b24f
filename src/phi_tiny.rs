//! # PhiTiny — Closed-Form phi(x, a) for Small a
//!
//! `phi(x, a)` counts integers in `[1, x]` with no prime factor among the
//! first `a` primes. For `a <= 7` (primes 2,3,5,7,11,13,17, primorial
//! 510510) the count is periodic in `x` with period equal to the primorial,
//! so the whole function reduces to one table lookup plus a remainder
//! lookup — no recursion, no cache. Every call into the general recursive
//! `phi` in `kernels.rs` bottoms out here, so this table is on the hottest
//! path in the engine and is built exactly once via `OnceLock`.
//!
//! Grounded on the teacher's `sieve::MontgomeryCtx`-style "precompute once,
//! reuse forever" pattern in `src/sieve.rs`, adapted from modular-arithmetic
//! tables to a primorial-periodicity table.

use std::sync::OnceLock;

const MAX_A: usize = 7;
/// Primorial of the first 7 primes: 2*3*5*7*11*13*17.
const PRIMORIAL: u64 = 510_510;
const SMALL_PRIMES: [u64; MAX_A] = [2, 3, 5, 7, 11, 13, 17];

struct PhiTinyTable {
    /// `phi_table[a][r]` = number of integers in `[0, r]` coprime to the
    /// first `a` primes, for `r` in `[0, PRIMORIAL)`. Row 0 is the identity.
    phi_table: Vec<Vec<u32>>,
    /// Running product of the first `a` primes, i.e. the period for row `a`.
    primorial: [u64; MAX_A + 1],
}

static TABLE: OnceLock<PhiTinyTable> = OnceLock::new();

fn table() -> &'static PhiTinyTable {
    TABLE.get_or_init(build_table)
}

fn build_table() -> PhiTinyTable {
    let mut primorial = [1u64; MAX_A + 1];
    for a in 1..=MAX_A {
        primorial[a] = primorial[a - 1] * SMALL_PRIMES[a - 1];
    }

    let mut phi_table: Vec<Vec<u32>> = Vec::with_capacity(MAX_A + 1);
    phi_table.push((0..=0).map(|_| 0u32).collect());
    // row 0: phi(r, 0) == r + 1 for r in [0, PRIMORIAL), stored lazily below
    // instead we special-case a == 0 in `phi`, so row 0 is unused filler.
    let mut row0 = vec![0u32; 1];
    row0[0] = 1;
    phi_table[0] = row0;

    for a in 1..=MAX_A {
        let period = primorial[a] as usize;
        let mut row = vec![0u32; period];
        let mut sieve = vec![true; period];
        for &p in &SMALL_PRIMES[..a] {
            let p = p as usize;
            let mut m = 0;
            while m < period {
                sieve[m] = false;
                m += p;
            }
        }
        let mut count = 0u32;
        for (r, slot) in row.iter_mut().enumerate() {
            if sieve[r] {
                count += 1;
            }
            *slot = count;
        }
        phi_table.push(row);
    }

    PhiTinyTable { phi_table, primorial }
}

/// Whether `a` is small enough for the closed-form table (`a <= 7`).
pub fn is_tiny(a: usize) -> bool {
    a <= MAX_A
}

/// `phi(x, a)` for `a <= 7`, via primorial periodicity: counts integers in
/// `[1, x]` coprime to the first `a` primes as
/// `(x / period) * phi(period - 1, a) + phi(x % period, a)`.
pub fn phi(x: u64, a: usize) -> u64 {
    debug_assert!(is_tiny(a), "phi_tiny::phi called with a={a} > {MAX_A}");
    if a == 0 {
        return x;
    }
    let t = table();
    let period = t.primorial[a];
    let row = &t.phi_table[a];
    let full_periods = x / period;
    let remainder = (x % period) as usize;
    full_periods * row[period as usize - 1] as u64 + row[remainder] as u64
}
