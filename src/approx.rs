//! # Approx — Li, Ri and Their Inverses
//!
//! Analytic approximations to `pi(x)`, used only to seed `nth_prime`'s
//! initial guess and to size the `y`/`z` sieve ranges before the combinatorial
//! kernels take over. Precision needed is modest — a few significant digits
//! — so these are plain floating-point series, not arbitrary-precision; per
//! this crate's scope, they are deliberately not independently optimized
//! beyond what `nth_prime` needs.

/// Logarithmic integral `Li(x) = integral_0^x dt/ln(t)` (principal value),
/// via the convergent series expansion around `ln(x)`.
pub fn li(x: f64) -> f64 {
    if x < 2.0 {
        return 0.0;
    }
    let l = x.ln();
    // Li(x) = gamma + ln(ln(x)) + sum_{k=1}^inf (ln x)^k / (k * k!)
    const EULER_MASCHERONI: f64 = 0.577_215_664_901_532_9;
    let mut sum = EULER_MASCHERONI + l.ln();
    let mut term = 1.0;
    for k in 1..=200 {
        term *= l / k as f64;
        let add = term / k as f64;
        sum += add;
        if add.abs() < 1e-16 * sum.abs().max(1.0) {
            break;
        }
    }
    sum
}

/// Riemann's R function, `Ri(x) = sum_{n=1}^inf mu(n)/n * Li(x^(1/n))`,
/// truncated once `x^(1/n)` drops below 2.
pub fn ri(x: f64) -> f64 {
    if x < 2.0 {
        return 0.0;
    }
    let mut sum = 0.0;
    let max_n = (x.ln() / 2f64.ln()).ceil() as u64 + 1;
    for n in 1..=max_n {
        let mu_n = mobius_small(n);
        if mu_n == 0 {
            continue;
        }
        let root = x.powf(1.0 / n as f64);
        if root < 2.0 {
            break;
        }
        sum += mu_n as f64 / n as f64 * li(root);
    }
    sum
}

/// Inverse of [`li`] via Newton's method: `Li'(x) = 1/ln(x)`.
pub fn li_inverse(x: f64) -> f64 {
    if x < 2.0 {
        return 2.0;
    }
    let mut guess = x * x.max(2.0).ln();
    for _ in 0..100 {
        let f = li(guess) - x;
        let fp = 1.0 / guess.ln();
        let step = f / fp;
        let next = guess - step;
        if !next.is_finite() || next <= 1.0 {
            break;
        }
        if (next - guess).abs() < 1e-9 * guess {
            guess = next;
            break;
        }
        guess = next;
    }
    guess
}

/// Inverse of [`ri`] via Newton's method on `Ri`; `Ri` is close enough to
/// `Li` in derivative that `1/ln(x)` is a good enough local slope estimate.
pub fn ri_inverse(x: f64) -> f64 {
    if x < 2.0 {
        return 2.0;
    }
    let mut guess = li_inverse(x);
    for _ in 0..100 {
        let f = ri(guess) - x;
        let fp = 1.0 / guess.ln();
        let step = f / fp;
        let next = guess - step;
        if !next.is_finite() || next <= 1.0 {
            break;
        }
        if (next - guess).abs() < 1e-9 * guess {
            guess = next;
            break;
        }
        guess = next;
    }
    guess
}

fn mobius_small(mut n: u64) -> i8 {
    if n == 1 {
        return 1;
    }
    let mut result = 1i8;
    let mut p = 2u64;
    while p * p <= n {
        if n % p == 0 {
            n /= p;
            if n % p == 0 {
                return 0;
            }
            result = -result;
        }
        p += 1;
    }
    if n > 1 {
        result = -result;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn li_matches_known_approximate_values() {
        // Li(10^6) ~= 78627.5, true pi(10^6) = 78498
        let v = li(1_000_000.0);
        assert!((v - 78627.5).abs() < 5.0, "Li(10^6) = {v}");
    }

    #[test]
    fn ri_is_closer_to_pi_than_li_at_10_6() {
        let pi_1e6 = 78498.0;
        let li_err = (li(1_000_000.0) - pi_1e6).abs();
        let ri_err = (ri(1_000_000.0) - pi_1e6).abs();
        assert!(ri_err < li_err, "Ri err {ri_err} should beat Li err {li_err}");
    }

    #[test]
    fn li_inverse_round_trips_li() {
        for x in [1000.0, 50_000.0, 1_000_000.0] {
            let y = li_inverse(x);
            let back = li(y);
            assert!((back - x).abs() < 1.0, "x={x} back={back}");
        }
    }

    #[test]
    fn bounds_hold_for_moderate_x() {
        // x/ln(x) <= Ri(x) <= x*ln(x) for x >= 20 (generous analytic bound).
        for &x in &[20.0f64, 1000.0, 100_000.0] {
            let lower = x / x.ln();
            let upper = x * x.ln();
            let r = ri(x);
            assert!(r >= lower, "Ri({x})={r} < lower {lower}");
            assert!(r <= upper, "Ri({x})={r} > upper {upper}");
        }
    }
}
