// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::OceError;

/// Arithmetic mean.
pub fn mean(values: &[f64]) -> Result<f64, OceError> {
    if values.is_empty() {
        return Err(OceError::invalid_input("mean requires at least 1 value"));
    }
    Ok(values.iter().sum::<f64>() / values.len() as f64)
}

/// Unbiased sample variance (n - 1 denominator).
pub fn sample_variance(values: &[f64]) -> Result<f64, OceError> {
    if values.len() < 2 {
        return Err(OceError::invalid_input(
            "sample variance requires at least 2 values",
        ));
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    Ok(ss / (values.len() - 1) as f64)
}

/// Unbiased sample standard deviation.
pub fn sample_std(values: &[f64]) -> Result<f64, OceError> {
    Ok(sample_variance(values)?.sqrt())
}

/// Linear-interpolation quantile (the `(n - 1) * q` positional method).
///
/// Sorts an internal copy; `q` must lie in `[0, 1]`.
pub fn quantile(values: &[f64], q: f64) -> Result<f64, OceError> {
    if values.is_empty() {
        return Err(OceError::invalid_input("quantile requires at least 1 value"));
    }
    if !(0.0..=1.0).contains(&q) || !q.is_finite() {
        return Err(OceError::invalid_input(format!(
            "quantile level must lie in [0, 1]; got {q}"
        )));
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let frac = pos - lo as f64;
    if lo + 1 >= sorted.len() || frac == 0.0 {
        return Ok(sorted[lo]);
    }
    Ok(sorted[lo] + frac * (sorted[lo + 1] - sorted[lo]))
}

/// Median via the interpolated 0.5 quantile.
pub fn median(values: &[f64]) -> Result<f64, OceError> {
    quantile(values, 0.5)
}

/// Median absolute deviation from the median (unscaled).
pub fn mad(values: &[f64]) -> Result<f64, OceError> {
    let m = median(values)?;
    let deviations: Vec<f64> = values.iter().map(|v| (v - m).abs()).collect();
    median(&deviations)
}
