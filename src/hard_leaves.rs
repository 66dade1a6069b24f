//! # HardLeaves — S2_hard / Gourdon-D Engine
//!
//! The "hard" special leaves are the ones too large for a closed-form
//! `PiTable` lookup: `n = x / (p * m) >= p[b+1]^2`, so the only way to learn
//! `phi(n, b)` is to actually sieve out every number with a prime factor
//! `<= p[b]` and count what survives. This module walks the sieving prime
//! index `b` upward through a single segment while keeping a running
//! `phi[b]` (leftover survivor count carried from earlier segments), in two
//! regimes:
//!
//! - **Square-free-leaf regime** (`b <= pi(sqrt(y))`): `m` ranges over
//!   square-free numbers with `lpf(m) > p[b]`, each contributing a signed
//!   `mu[m]`-weighted term.
//! - **Two-prime-leaf regime** (`pi(sqrt(y)) < b < pi(y)`): `m` is itself a
//!   single prime `p[l]`, walked downward.
//!
//! Grounded in the teacher's `twin.rs` per-segment worker loop (claim a
//! range, process every candidate in it, report back) for the outer
//! structure; the two-regime leaf walk itself is this engine's own, built
//! directly from the combinatorial contract (no teacher counterpart — the
//! teacher never iterates sieving primes against a sieve this way).

use crate::error::PrimeCountError;
use crate::mu_lpf::MuLpf;
use crate::primes::PrimeList;
use crate::sieve::Sieve;

/// Per-thread state that survives across segments: the running survivor
/// count for every sieving-prime layer `b` the thread has crossed.
pub struct HardLeavesState {
    phi: Vec<u64>,
}

impl HardLeavesState {
    pub fn new(b_max: usize) -> Self {
        HardLeavesState {
            phi: vec![0u64; b_max + 1],
        }
    }
}

/// Process one segment `[low, high)` of the `S2_hard` / Gourdon-`D` sum,
/// mutating `state.phi` in place and returning this segment's signed
/// contribution.
#[allow(clippy::too_many_arguments)]
pub fn process_segment(
    primes: &PrimeList,
    mu_lpf: &MuLpf,
    x: u128,
    y: u64,
    c: usize,
    low: u64,
    high: u64,
    state: &mut HardLeavesState,
) -> Result<i128, PrimeCountError> {
    let mut sieve = Sieve::pre_sieve(primes, c, low, high);
    let mut sum: i128 = 0;

    let b_max = primes.pi(y).saturating_sub(1);
    let sqrt_y = isqrt(y);
    let b_sqrt_y = primes.pi(sqrt_y);

    for b in (c + 1)..=b_max {
        let p = primes.get(b);
        if p as u64 >= high {
            break;
        }

        if b <= b_sqrt_y {
            square_free_leaf_step(primes, mu_lpf, x, y, p, b, low, high, state, &mut sieve, &mut sum)?;
        } else {
            two_prime_leaf_step(primes, x, y, p, b, low, high, state, &mut sieve, &mut sum)?;
        }

        state.phi[b] += sieve.get_total_count();
        sieve.cross_off_count(p, b);
    }

    Ok(sum)
}

#[allow(clippy::too_many_arguments)]
fn square_free_leaf_step(
    primes: &PrimeList,
    mu_lpf: &MuLpf,
    x: u128,
    y: u64,
    p: u64,
    b: usize,
    low: u64,
    high: u64,
    state: &mut HardLeavesState,
    sieve: &mut Sieve,
    sum: &mut i128,
) -> Result<(), PrimeCountError> {
    let m_lo = std::cmp::max(x / (p as u128 * high as u128), (y / p) as u128).max(1) as u64;
    let m_hi = std::cmp::min(x / (p as u128 * low.max(1) as u128), y as u128) as u64;
    if m_hi < m_lo || m_hi as usize >= mu_lpf.len() {
        return Ok(());
    }

    for m in (m_lo..=m_hi).rev() {
        let mu_m = mu_lpf.mu(m as usize);
        if mu_m == 0 {
            continue;
        }
        if (p as u64) >= mu_lpf.lpf(m as usize) as u64 {
            continue;
        }
        let n = x / (p as u128 * m as u128);
        let n = n as u64;
        if n < low || n >= high {
            continue;
        }
        let offset = n - low;
        let cnt = sieve.count(offset) as i128;
        let phi_b = state.phi[b] as i128;
        let term = phi_b
            .checked_add(cnt)
            .ok_or_else(|| overflow("phi[b] + sieve.count"))?
            .checked_mul(mu_m as i128)
            .ok_or_else(|| overflow("mu[m] * (phi[b] + sieve.count)"))?;
        *sum = sum
            .checked_sub(term)
            .ok_or_else(|| overflow("S2_hard partial sum"))?;
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn two_prime_leaf_step(
    primes: &PrimeList,
    x: u128,
    y: u64,
    p: u64,
    b: usize,
    low: u64,
    high: u64,
    state: &mut HardLeavesState,
    sieve: &mut Sieve,
    sum: &mut i128,
) -> Result<(), PrimeCountError> {
    let hi_n = std::cmp::min(x / (p as u128 * low.max(1) as u128), y as u128) as u64;
    let bound = std::cmp::max(x / (p as u128 * high as u128), p as u128) as u64;

    let mut l = primes.pi(hi_n);
    while l > 0 {
        let pl = primes.get(l);
        if pl <= bound {
            break;
        }
        let n = x / (p as u128 * pl as u128);
        let n = n as u64;
        if n >= low && n < high {
            let offset = n - low;
            let cnt = sieve.count(offset) as i128;
            let phi_b = state.phi[b] as i128;
            let term = phi_b
                .checked_add(cnt)
                .ok_or_else(|| overflow("phi[b] + sieve.count"))?;
            *sum = sum
                .checked_add(term)
                .ok_or_else(|| overflow("S2_hard partial sum"))?;
        }
        l -= 1;
    }
    Ok(())
}

fn overflow(context: &str) -> PrimeCountError {
    PrimeCountError::NumericOverflow {
        context: context.to_string(),
    }
}

fn isqrt(n: u64) -> u64 {
    if n == 0 {
        return 0;
    }
    let mut x = (n as f64).sqrt() as u64 + 1;
    while x * x > n {
        x -= 1;
    }
    while (x + 1) * (x + 1) <= n {
        x += 1;
    }
    x
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn isqrt_matches_known_values() {
        assert_eq!(isqrt(0), 0);
        assert_eq!(isqrt(1), 1);
        assert_eq!(isqrt(3), 1);
        assert_eq!(isqrt(4), 2);
        assert_eq!(isqrt(99), 9);
        assert_eq!(isqrt(100), 10);
        assert_eq!(isqrt(1_000_000), 1000);
    }

    #[test]
    fn process_segment_does_not_panic_on_small_input() {
        let primes = PrimeList::new(200);
        let mu_lpf = MuLpf::build(200);
        let mut state = HardLeavesState::new(primes.pi(50) + 1);
        let result = process_segment(&primes, &mu_lpf, 10_000u128, 50, 3, 0, 64, &mut state);
        assert!(result.is_ok());
    }

    #[test]
    fn phi_state_is_monotone_non_decreasing() {
        let primes = PrimeList::new(200);
        let mu_lpf = MuLpf::build(200);
        let mut state = HardLeavesState::new(primes.pi(50) + 1);
        let before: Vec<u64> = state.phi.clone();
        let _ = process_segment(&primes, &mu_lpf, 10_000u128, 50, 3, 0, 64, &mut state);
        for (b, &v) in state.phi.iter().enumerate() {
            assert!(v >= before[b]);
        }
    }
}
