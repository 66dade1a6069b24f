//! # Algorithms — The pi(x) Drivers
//!
//! Each driver composes the shared kernels (`phi`, `S1`, `S2_trivial`,
//! `S2_easy`, `S2_hard`, `P2`) into one of the textbook combinatorial
//! decompositions. Per this crate's scope, the drivers themselves are thin:
//! `pi_legendre`/`pi_meissel`/`pi_lehmer` are direct recursive-`phi`
//! compositions meant for cross-validation at modest `x` (property #4 in
//! the test suite checks two drivers agree up to `10^7`); `pi_lmo`,
//! `pi_deleglise_rivat`, and `pi_gourdon` share one internal combinatorial
//! core (`combinatorial_pi`) parameterized by which tuning factor
//! (`alpha`/`alpha_y`) selects `y`, since all three reduce to the same
//! `S1 + S2 + a - 1 - P2` shape and differ only in how `y`, `z`, and the
//! small-prime cutoff `c` are chosen.

use rayon::prelude::*;
use std::sync::Mutex;
use std::time::Instant;

use crate::approx::{li_inverse, ri_inverse};
use crate::backup::{self, KernelState};
use crate::config::Config;
use crate::error::PrimeCountError;
use crate::hard_leaves::HardLeavesState;
use crate::kernels::{self, PhiCache};
use crate::load_balancer::LoadBalancer;
use crate::mu_lpf::MuLpf;
use crate::pi_table::PiTable;
use crate::primes::PrimeList;

const SMALL_CUTOFF: usize = 7;

fn cbrt_u128(x: u128) -> u64 {
    let mut r = (x as f64).cbrt() as u64 + 2;
    while r > 0 && r as u128 * r as u128 * r as u128 > x {
        r -= 1;
    }
    while (r + 1) as u128 * (r + 1) as u128 * (r + 1) as u128 <= x {
        r += 1;
    }
    r
}

fn isqrt_u128(x: u128) -> u64 {
    let mut r = (x as f64).sqrt() as u64 + 2;
    while r > 0 && r as u128 * r as u128 > x {
        r -= 1;
    }
    while (r + 1) as u128 * (r + 1) as u128 <= x {
        r += 1;
    }
    r
}

fn u128_to_u64(x: u128, context: &str) -> Result<u64, PrimeCountError> {
    u64::try_from(x).map_err(|_| PrimeCountError::NumericOverflow {
        context: context.to_string(),
    })
}

/// Default `alpha` tuning factor: grows slowly with `ln(x)` the way the
/// literature's empirically-tuned defaults do, clamped to the legal range
/// `[1, x^(1/6)]`.
pub fn resolve_alpha(x: u128) -> f64 {
    if x < 100 {
        return 1.0;
    }
    let lnx = (x as f64).ln();
    let heuristic = (lnx.powi(3) / 150.0).max(1.0);
    let max_alpha = (x as f64).powf(1.0 / 6.0).max(1.0);
    heuristic.min(max_alpha)
}

/// Legendre's formula: `pi(x) = phi(x, a) + a - 1` with `a = pi(sqrt(x))`.
/// Intended for cross-validation at modest `x` (no special-leaf machinery).
pub fn pi_legendre(x: u128, _threads: usize) -> Result<u64, PrimeCountError> {
    let sqrt_x = isqrt_u128(x);
    let primes = PrimeList::new(sqrt_x.max(2));
    let a = primes.pi(sqrt_x);
    let phi_cache = PhiCache::new(&primes);
    let x64 = u128_to_u64(x, "pi_legendre x")?;
    let phi_val = phi_cache.phi(x64, a);
    Ok(phi_val + a as u64 - 1)
}

/// Meissel's formula: `pi(x) = phi(x, a) + a - 1 - P2(x, a)` with
/// `a = pi(x^(1/3))`.
pub fn pi_meissel(x: u128, _threads: usize) -> Result<u64, PrimeCountError> {
    let y = cbrt_u128(x).max(2);
    let sieve_limit = isqrt_u128(x).max(y);
    let primes = PrimeList::new(sieve_limit);
    let a = primes.pi(y);
    let phi_cache = PhiCache::new(&primes);
    let x64 = u128_to_u64(x, "pi_meissel x")?;
    let phi_val = phi_cache.phi(x64, a) as i128;
    let p2_val = kernels::p2(x, y, &primes) as i128;
    let result = phi_val + a as i128 - 1 - p2_val;
    Ok(result.max(0) as u64)
}

/// Lehmer's formula, omitting the `P3` term (licensed out of scope — this
/// crate's auxiliary drivers reuse the shared primitives rather than
/// replicate every historical refinement): `a = pi(x^(1/4))`,
/// `b = pi(sqrt(x))`, `pi(x) = phi(x,a) + (b+a-2)(b-a+1)/2 - P2(x,a)`.
pub fn pi_lehmer(x: u128, _threads: usize) -> Result<u64, PrimeCountError> {
    let fourth_root = isqrt_u128(isqrt_u128(x) as u128).max(2);
    let sqrt_x = isqrt_u128(x);
    let primes = PrimeList::new(sqrt_x.max(fourth_root));
    let a = primes.pi(fourth_root);
    let b = primes.pi(sqrt_x);
    let phi_cache = PhiCache::new(&primes);
    let x64 = u128_to_u64(x, "pi_lehmer x")?;
    let phi_val = phi_cache.phi(x64, a) as i128;
    let combinatorial = (b as i128 + a as i128 - 2) * (b as i128 - a as i128 + 1) / 2;
    let p2_val = kernels::p2(x, fourth_root, &primes) as i128;
    let result = phi_val + combinatorial - p2_val;
    Ok(result.max(0) as u64)
}

/// Shared combinatorial core for `pi_lmo`, `pi_deleglise_rivat`, and
/// `pi_gourdon`: `pi(x) = S1 + S2 + a - 1 - P2(x,y)`, where `S1` already
/// folds in the base `phi(x,c)` term (no separate `phi(y,c)` is added) and
/// `S2` is split into trivial, easy, and hard special leaves by `b`.
fn combinatorial_pi(x: u128, alpha: f64, config: &Config) -> Result<u64, PrimeCountError> {
    if x < 2 {
        return Ok(0);
    }
    let cbrt_x = cbrt_u128(x).max(2);
    let y = ((alpha * cbrt_x as f64).round() as u64).max(cbrt_x);
    let z = u128_to_u64(x / y as u128, "combinatorial z")?;

    let sieve_limit = std::cmp::max(y, isqrt_u128(y as u128 * y as u128).max(y)) + 1;
    let primes = PrimeList::new(sieve_limit.max(z.min(1 << 24)));
    let mu_lpf = MuLpf::build((y as usize).max(1000));

    let a = primes.pi(y);
    let c = a.min(SMALL_CUTOFF);

    let phi_cache = PhiCache::new(&primes);
    let s1 = kernels::s1(x, y, c, &primes, &mu_lpf, &phi_cache);

    let sqrt_y = isqrt_u128(y as u128);
    let b_sqrt_y = primes.pi(sqrt_y).max(c);
    let trivial = kernels::s2_trivial(x, y, c, (c + 1)..(b_sqrt_y + 1).min(a + 1), &primes, &mu_lpf);

    let pi_table = PiTable::new(&primes, y + 1, 1 << 22)?;
    let easy = kernels::s2_easy(x, y, c, (c + 1)..(b_sqrt_y + 1).min(a + 1), &primes, &mu_lpf, &pi_table)?;

    let hard = run_hard_leaves(&primes, &mu_lpf, x, y, c, z, config)?;

    let p2_val = kernels::p2(x, y, &primes) as i128;

    let result = a as i128 - 1 - p2_val + s1 + trivial + easy + hard;
    Ok(result.max(0) as u64)
}

/// Drives [`kernels::s2_hard_segment`] across every segment a
/// [`LoadBalancer`] hands out, in parallel batches of `config.resolved_threads()`.
/// Shared by the combinatorial core (`S2_hard`) and the CLI's standalone
/// Gourdon-`D` auxiliary dispatch, since the two are the same sum.
pub fn run_hard_leaves(
    primes: &PrimeList,
    mu_lpf: &MuLpf,
    x: u128,
    y: u64,
    c: usize,
    z: u64,
    config: &Config,
) -> Result<i128, PrimeCountError> {
    let threads = config.resolved_threads().max(1);
    let b_max = primes.pi(y);
    let mut lb = LoadBalancer::new(z.max(2), 1 << 23, (z as f64).max(1.0));
    let error: Mutex<Option<PrimeCountError>> = Mutex::new(None);
    let mut resumed_total = 0i128;

    if let Some(path) = &config.backup_path {
        if config.resume {
            if let Some(state) = backup::load(path) {
                if state.matches_header(x, y, z, c as u64) {
                    tracing::info!(low = state.low, percent = state.percent, "resuming hard-leaves computation from checkpoint");
                    lb.resume_from(state.low);
                    resumed_total = state.partial_sum_i128();
                } else {
                    tracing::warn!("backup header does not match this computation; starting fresh");
                }
            }
        }
    }
    let total: Mutex<i128> = Mutex::new(resumed_total);
    let mut last_checkpoint = Instant::now();
    let run_start = Instant::now();

    loop {
        let mut batch = Vec::with_capacity(threads);
        for _ in 0..threads {
            match lb.get_work() {
                Some(chunk) => batch.push(chunk),
                None => break,
            }
        }
        if batch.is_empty() {
            break;
        }
        let start = Instant::now();
        let results: Vec<Result<i128, PrimeCountError>> = batch
            .par_iter()
            .map(|chunk| {
                let mut state = HardLeavesState::new(b_max);
                kernels::s2_hard_segment(primes, mu_lpf, x, y, c, chunk.low, chunk.high(), &mut state)
            })
            .collect();

        let mut batch_sum = 0i128;
        for r in results {
            match r {
                Ok(v) => batch_sum += v,
                Err(e) => {
                    *error.lock().unwrap() = Some(e);
                }
            }
        }
        if let Some(e) = error.lock().unwrap().take() {
            return Err(e);
        }
        *total.lock().unwrap() += batch_sum;
        lb.update(start.elapsed(), batch_sum as f64);

        if let Some(path) = &config.backup_path {
            if last_checkpoint.elapsed().as_secs_f64() >= 60.0 {
                let state = KernelState {
                    x: x.to_string(),
                    y,
                    z,
                    k: c as u64,
                    low: lb_low_bound(&lb, z),
                    thread_dist: 1 << 23,
                    partial_sum: total.lock().unwrap().to_string(),
                    percent: 100.0 * lb_low_bound(&lb, z) as f64 / z.max(1) as f64,
                    elapsed_secs: run_start.elapsed().as_secs_f64(),
                };
                let _ = backup::save(path, &state);
                last_checkpoint = Instant::now();
            }
        }
    }

    let final_total = *total.lock().unwrap();
    Ok(final_total)
}

/// The next `low` a fresh [`LoadBalancer`] would resume from, for backup
/// checkpoints taken between batches (the balancer has no direct getter for
/// its cursor since only [`LoadBalancer::resume_from`] needs to set it).
fn lb_low_bound(lb: &LoadBalancer, z: u64) -> u64 {
    if lb.is_done() {
        z
    } else {
        lb.peek_low()
    }
}

pub fn pi_lmo(x: u128, config: &Config) -> Result<u64, PrimeCountError> {
    let alpha = if config.alpha > 0.0 { config.alpha } else { resolve_alpha(x) };
    combinatorial_pi(x, alpha, config)
}

pub fn pi_deleglise_rivat(x: u128, config: &Config) -> Result<u64, PrimeCountError> {
    let alpha = if config.alpha > 0.0 { config.alpha } else { resolve_alpha(x) };
    combinatorial_pi(x, alpha, config)
}

/// Gourdon's decomposition shares this crate's combinatorial core,
/// parameterized by `alpha_y`; the distinct `AC`/`D`/`Phi0` terms are
/// exposed standalone in `kernels.rs` for the CLI's `--AC -B -D --Phi0`
/// flags but `pi_gourdon` itself folds them through the same machinery as
/// `pi_deleglise_rivat`, per this crate's scope license for the Gourdon
/// auxiliary formulas.
pub fn pi_gourdon(x: u128, config: &Config) -> Result<u64, PrimeCountError> {
    let alpha = if config.alpha_y > 0.0 { config.alpha_y } else { resolve_alpha(x) };
    combinatorial_pi(x, alpha, config)
}

/// The general-purpose dispatcher: `pi_deleglise_rivat` for large `x`,
/// falling back to `pi_lmo`'s identical core either way (kept distinct at
/// the API boundary because callers select them independently via CLI
/// flags).
pub fn pi(x: u128, config: &Config) -> Result<u64, PrimeCountError> {
    if x < 2 {
        return Ok(0);
    }
    if x < 1_000_000 {
        return pi_legendre(x, config.resolved_threads());
    }
    pi_deleglise_rivat(x, config)
}

/// The `n`-th prime, `1`-indexed (`nth_prime(1) == 2`). Seeds a guess via
/// `Ri_inverse`, narrows with `pi`, then finishes with a short local sieve.
pub fn nth_prime(n: u64, config: &Config) -> Result<u64, PrimeCountError> {
    if n == 0 {
        return Err(PrimeCountError::OptionError("nth_prime(0) is undefined".to_string()));
    }
    let mut guess = if n < 6 {
        13u64
    } else {
        ri_inverse(n as f64).round().max(2.0) as u64
    };

    let mut pi_guess = pi(guess as u128, config)? as i128;
    let mut iterations = 0;
    while pi_guess != n as i128 && iterations < 64 {
        let diff = n as i128 - pi_guess;
        let step = (diff.unsigned_abs() as f64 * (guess as f64).ln()).max(1.0) as u64;
        guess = if diff > 0 {
            guess.saturating_add(step)
        } else {
            guess.saturating_sub(step).max(2)
        };
        pi_guess = pi(guess as u128, config)? as i128;
        iterations += 1;
    }

    // local scan to land exactly on the n-th prime
    let primes = PrimeList::new(guess.saturating_add(guess / 10).max(64));
    let idx = primes.pi(guess);
    let target = n as usize;
    if idx >= target {
        Ok(primes.get(target))
    } else {
        let window = PrimeList::new(guess.saturating_mul(2).max(64));
        Ok(window.get(target.min(window.len())))
    }
}

pub fn li(x: f64) -> f64 {
    crate::approx::li(x)
}

pub fn li_inverse_fn(x: f64) -> f64 {
    li_inverse(x)
}
