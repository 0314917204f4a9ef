//! Checked integer math helpers
//!
//! All financial arithmetic is u128 with truncating division. Overflow is
//! surfaced to callers as `None`, never wrapped.

/// Compute `a * b / denominator` with truncating division.
///
/// Returns `None` on overflow of the intermediate product or when
/// `denominator` is zero.
pub fn mul_div(a: u128, b: u128, denominator: u128) -> Option<u128> {
    if denominator == 0 {
        return None;
    }
    a.checked_mul(b).map(|p| p / denominator)
}

/// Integer square root (largest `r` with `r * r <= n`).
pub fn isqrt(n: u128) -> u128 {
    if n < 2 {
        return n;
    }
    // Newton's method, seeded above the root
    let mut x = n;
    let mut y = (x + 1) / 2;
    while y < x {
        x = y;
        y = (x + n / x) / 2;
    }
    x
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mul_div_truncates() {
        // 10 * 3 / 4 = 7.5 -> 7
        assert_eq!(mul_div(10, 3, 4), Some(7));
    }

    #[test]
    fn test_mul_div_zero_denominator() {
        assert_eq!(mul_div(1, 1, 0), None);
    }

    #[test]
    fn test_mul_div_overflow() {
        assert_eq!(mul_div(u128::MAX, 2, 1), None);
    }

    #[test]
    fn test_isqrt_exact_and_floor() {
        assert_eq!(isqrt(0), 0);
        assert_eq!(isqrt(1), 1);
        assert_eq!(isqrt(4), 2);
        assert_eq!(isqrt(15), 3);
        assert_eq!(isqrt(16), 4);
        assert_eq!(isqrt(1_000_000), 1_000);
        assert_eq!(isqrt(999_999), 999);
    }

    #[test]
    fn test_isqrt_large() {
        let n = (1u128 << 64) - 1;
        let r = isqrt(n * n);
        assert_eq!(r, n);
    }
}
