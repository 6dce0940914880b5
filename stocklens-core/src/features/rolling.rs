//! Trailing-window statistics.
//!
//! Output is index-aligned with the input: `result[i]` covers
//! `values[i + 1 - window ..= i]`, and is `None` until the window is full.
//! Windows are summed directly rather than rolled, so every value matches a
//! from-scratch computation over its own window.

/// Mean over each trailing window.
pub fn trailing_mean(values: &[f64], window: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; values.len()];
    if window == 0 {
        return result;
    }

    for i in (window - 1)..values.len() {
        let slice = &values[(i + 1 - window)..=i];
        result[i] = Some(slice.iter().sum::<f64>() / window as f64);
    }

    result
}

/// Sample standard deviation (n - 1 denominator) over each trailing window.
///
/// Deviations are taken from the window's first value before squaring, which
/// keeps the sums small and makes a constant window exactly zero.
pub fn trailing_sample_std(values: &[f64], window: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; values.len()];
    if window < 2 {
        return result;
    }

    let n = window as f64;
    for i in (window - 1)..values.len() {
        let slice = &values[(i + 1 - window)..=i];
        let shift = slice[0];
        let (sum, sum_sq) = slice.iter().fold((0.0, 0.0), |(s, q), &x| {
            let d = x - shift;
            (s + d, q + d * d)
        });
        let variance = (sum_sq - sum * sum / n) / (n - 1.0);
        result[i] = Some(variance.max(0.0).sqrt());
    }

    result
}
