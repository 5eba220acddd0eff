#![allow(non_snake_case)]
use libm::erf;
use std::f64::consts::PI;

// Below this argument the Boys function is summed as a series and recursed downward,
// above it the asymptotic erf form is recursed upward.
const BOYS_SERIES_LIMIT: f64 = 30.0;
const BOYS_SERIES_MAX_TERMS: usize = 1000;

/// Boys function table F_0(T) ..= F_nmax(T).
///
/// F_n(T) = ∫_0^1 t^{2n} exp(-T t^2) dt
pub fn boys_table(nmax: usize, T: f64) -> Vec<f64> {
    let mut f = vec![0.0; nmax + 1];
    let exp_t = (-T).exp();

    if T <= BOYS_SERIES_LIMIT {
        // F_n(T) = exp(-T) Σ_k (2T)^k / ((2n+1)(2n+3)...(2n+2k+1))
        let n = nmax as f64;
        let mut term = 1.0 / (2.0 * n + 1.0);
        let mut sum = term;
        for k in 1..BOYS_SERIES_MAX_TERMS {
            term *= 2.0 * T / (2.0 * n + 2.0 * k as f64 + 1.0);
            sum += term;
            if term < sum * 1e-17 {
                break;
            }
        }
        f[nmax] = exp_t * sum;
        for m in (1..=nmax).rev() {
            f[m - 1] = (2.0 * T * f[m] + exp_t) / (2 * m - 1) as f64;
        }
    } else {
        f[0] = 0.5 * (PI / T).sqrt() * erf(T.sqrt());
        for m in 0..nmax {
            f[m + 1] = ((2 * m + 1) as f64 * f[m] - exp_t) / (2.0 * T);
        }
    }
    f
}

pub fn boys_function(n: usize, x: f64) -> f64 {
    boys_table(n, x)[n]
}

pub(crate) fn double_factorial(n: i32) -> f64 {
    // (-1)!! = 1
    let mut acc = 1.0;
    let mut k = n;
    while k > 1 {
        acc *= k as f64;
        k -= 2;
    }
    acc
}

// Simpson's rule integration
#[cfg(test)]
pub(crate) fn simpson_integration<F>(f: F, a: f64, b: f64, n: usize) -> f64
where
    F: Fn(f64) -> f64,
{
    let n = if n % 2 == 0 { n } else { n + 1 };
    let h = (b - a) / n as f64;

    let mut sum = f(a) + f(b);
    for i in 1..n {
        let x = a + i as f64 * h;
        sum += if i % 2 == 0 { 2.0 * f(x) } else { 4.0 * f(x) };
    }
    sum * h / 3.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boys_at_zero() {
        let f = boys_table(6, 0.0);
        for (n, v) in f.iter().enumerate() {
            let expected = 1.0 / (2 * n + 1) as f64;
            assert!((v - expected).abs() < 1e-14, "F_{}(0) = {}, expected {}", n, v, expected);
        }
    }

    #[test]
    fn test_boys_against_quadrature() {
        for &t in &[0.1, 1.3, 7.5, 29.0, 31.0, 55.0] {
            for n in 0..5 {
                let integrand = |x: f64| x.powi(2 * n as i32) * (-t * x * x).exp();
                let reference = simpson_integration(integrand, 0.0, 1.0, 20_000);
                let value = boys_function(n, t);
                assert!(
                    (value - reference).abs() < 1e-10,
                    "F_{}({}) = {}, quadrature gives {}",
                    n,
                    t,
                    value,
                    reference
                );
            }
        }
    }

    #[test]
    fn test_boys_branches_agree_at_limit() {
        // series value at the limit against the erf closed form at the same T
        let below = boys_table(4, BOYS_SERIES_LIMIT);
        let t = BOYS_SERIES_LIMIT;
        let exp_t = (-t).exp();
        let mut above = vec![0.5 * (PI / t).sqrt() * erf(t.sqrt())];
        for m in 0..4 {
            let next = ((2 * m + 1) as f64 * above[m] - exp_t) / (2.0 * t);
            above.push(next);
        }
        for n in 0..=4 {
            assert!((below[n] - above[n]).abs() < 1e-12, "branch mismatch at n = {}", n);
        }
        // just past the limit the table switches branch; dF_n/dT = -F_{n+1}
        let past = boys_table(4, BOYS_SERIES_LIMIT + 1e-9);
        for n in 0..4 {
            let slope = below[n + 1];
            assert!((below[n] - past[n]).abs() < 2e-9 * slope + 1e-13, "discontinuity at n = {}", n);
        }
    }

    #[test]
    fn test_double_factorial() {
        assert_eq!(double_factorial(-1), 1.0);
        assert_eq!(double_factorial(0), 1.0);
        assert_eq!(double_factorial(5), 15.0);
        assert_eq!(double_factorial(6), 48.0);
    }
}
