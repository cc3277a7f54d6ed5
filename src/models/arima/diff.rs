//! Differencing and differencing polynomials.

/// Difference a series `d` times at lag 1.
///
/// Each pass shortens the series by one; differencing stops early once a
/// single point remains.
pub fn difference(series: &[f64], d: usize) -> Vec<f64> {
    lag_difference(series, d, 1)
}

/// Difference a series `d` times at lag `period`.
pub fn seasonal_difference(series: &[f64], d: usize, period: usize) -> Vec<f64> {
    if period == 0 {
        return series.to_vec();
    }
    lag_difference(series, d, period)
}

fn lag_difference(series: &[f64], d: usize, lag: usize) -> Vec<f64> {
    let mut out = series.to_vec();
    for _ in 0..d {
        if out.len() <= lag {
            break;
        }
        out = out[lag..]
            .iter()
            .zip(out.iter())
            .map(|(curr, prev)| curr - prev)
            .collect();
    }
    out
}

/// Coefficients of `(1 − B)^d · (1 − B^s)^D`, lowest power first.
pub fn differencing_polynomial(d: usize, seasonal_d: usize, period: usize) -> Vec<f64> {
    let mut poly = vec![1.0];
    for _ in 0..d {
        poly = poly_mul(&poly, &[1.0, -1.0]);
    }
    if period > 0 {
        let mut seasonal = vec![0.0; period + 1];
        seasonal[0] = 1.0;
        seasonal[period] = -1.0;
        for _ in 0..seasonal_d {
            poly = poly_mul(&poly, &seasonal);
        }
    }
    poly
}

/// Product of two polynomials given lowest power first.
pub(crate) fn poly_mul(a: &[f64], b: &[f64]) -> Vec<f64> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }
    let mut out = vec![0.0; a.len() + b.len() - 1];
    for (i, x) in a.iter().enumerate() {
        for (j, y) in b.iter().enumerate() {
            out[i + j] += x * y;
        }
    }
    out
}
