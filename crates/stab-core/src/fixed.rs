//! Fixed-point helpers shared by every component.
//!
//! All functions are integer-only and floor their results, so independent
//! evaluations of the same inputs agree bit-for-bit.

use crate::constants::PPM;

/// `floor(a * b / denom)` with a `u128` intermediate, saturating at `u64::MAX`.
///
/// Returns `None` when `denom == 0`.
///
/// # Examples
///
/// ```
/// use stab_core::fixed::mul_div;
///
/// assert_eq!(mul_div(1_000, 3, 4), Some(750));
/// assert_eq!(mul_div(u64::MAX, u64::MAX, 1), Some(u64::MAX));
/// assert_eq!(mul_div(1, 1, 0), None);
/// ```
pub fn mul_div(a: u64, b: u64, denom: u64) -> Option<u64> {
    if denom == 0 {
        return None;
    }
    let v = a as u128 * b as u128 / denom as u128;
    Some(v.min(u64::MAX as u128) as u64)
}

/// Ratio `observed / target` in ppm, capped at [`PPM`] (1.0).
///
/// A zero target is treated as fully satisfied.
///
/// # Examples
///
/// ```
/// use stab_core::fixed::capped_ratio_ppm;
///
/// assert_eq!(capped_ratio_ppm(50, 200), 250_000);
/// assert_eq!(capped_ratio_ppm(500, 200), 1_000_000);
/// assert_eq!(capped_ratio_ppm(0, 0), 1_000_000);
/// ```
pub fn capped_ratio_ppm(observed: u64, target: u64) -> u64 {
    if target == 0 {
        return PPM;
    }
    let r = observed as u128 * PPM as u128 / target as u128;
    r.min(PPM as u128) as u64
}

/// Uncapped ratio `observed / target` in ppm, saturating at `u64::MAX`.
///
/// A zero target yields [`PPM`].
pub fn ratio_ppm(observed: u64, target: u64) -> u64 {
    mul_div(observed, PPM, target).unwrap_or(PPM)
}

/// Fixed-point exponentiation: `(base / precision)^exp`, scaled by `precision`.
///
/// Binary exponentiation, `O(log exp)` multiplications. Intermediates that
/// would overflow `u128` saturate, which is only reachable for bases far
/// above `precision`.
///
/// # Examples
///
/// ```
/// use stab_core::fixed::fixed_pow;
///
/// // 1.25^2 = 1.5625 in basis points
/// assert_eq!(fixed_pow(12_500, 2, 10_000), 15_625);
/// assert_eq!(fixed_pow(12_500, 0, 10_000), 10_000);
/// ```
pub fn fixed_pow(base: u64, exp: u32, precision: u64) -> u128 {
    let p = precision as u128;
    if exp == 0 {
        return p;
    }
    let mut result: u128 = p;
    let mut b: u128 = base as u128;
    let mut e = exp;

    while e > 0 {
        if e & 1 == 1 {
            result = result.saturating_mul(b) / p;
        }
        e >>= 1;
        if e > 0 {
            b = b.saturating_mul(b) / p;
        }
    }
    result
}

/// `floor(sqrt(n))` by Newton's method from an overestimate.
///
/// # Examples
///
/// ```
/// use stab_core::fixed::isqrt;
///
/// assert_eq!(isqrt(0), 0);
/// assert_eq!(isqrt(99), 9);
/// assert_eq!(isqrt(1_000_000_000_000), 1_000_000);
/// ```
pub fn isqrt(n: u128) -> u128 {
    if n < 2 {
        return n;
    }
    let bits = 128 - n.leading_zeros();
    let mut x = 1u128 << bits.div_ceil(2);
    loop {
        let x_next = (x + n / x) / 2;
        if x_next >= x {
            return x;
        }
        x = x_next;
    }
}

/// Square root of a ppm-scaled value, result also in ppm.
///
/// `sqrt_ppm(250_000) == 500_000` (sqrt(0.25) = 0.5).
pub fn sqrt_ppm(value_ppm: u64) -> u64 {
    let r = isqrt(value_ppm as u128 * PPM as u128);
    r.min(u64::MAX as u128) as u64
}
