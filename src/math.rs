/// Log-probabilities below this value are treated as exactly zero probability
/// when accumulating expectations.
#[cfg(feature = "train")]
pub const LOG_PROB_CUTOFF: f64 = -400.0;

#[cfg(test)]
#[inline(always)]
pub fn logsumexp(a: f64, b: f64) -> f64 {
    if a == f64::NEG_INFINITY && b == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    if a > b {
        a + (b - a).exp().ln_1p()
    } else {
        b + (a - b).exp().ln_1p()
    }
}

/// Computes `log(sum(exp(x)))` over a slice, subtracting the maximum first.
pub fn logsumexp_slice(xs: &[f64]) -> f64 {
    let max = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    if max == f64::INFINITY {
        return f64::INFINITY;
    }
    let mut sum = 0.0;
    for &x in xs {
        sum += (x - max).exp();
    }
    max + sum.ln()
}

/// Relative absolute difference `|x - y| / (|x| + |y|)`, zero if both are zero.
#[cfg(feature = "train")]
#[inline(always)]
pub fn relative_absolute_difference(x: f64, y: f64) -> f64 {
    let denom = x.abs() + y.abs();
    if denom == 0.0 {
        0.0
    } else {
        (x - y).abs() / denom
    }
}
