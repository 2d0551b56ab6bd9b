// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Shapiro-Wilk W test, Royston's AS R94 approximation. Valid for sample
//! sizes 3 to 5000; n = 3 uses the exact p-value.

use crate::NormalityTestOutcome;
use oce_core::dist::{norm_cdf, norm_quantile};
use oce_core::OceError;

const MIN_SAMPLE: usize = 3;
const MAX_SAMPLE: usize = 5000;

// Royston 1995 weight and p-value polynomials.
const C1: [f64; 6] = [0.0, 0.221_157, -0.147_981, -2.071_190, 4.434_685, -2.706_056];
const C2: [f64; 6] = [0.0, 0.042_981, -0.293_762, -1.752_461, 5.682_633, -3.582_633];
const C3: [f64; 4] = [0.544_0, -0.399_78, 0.025_054, -6.714e-4];
const C4: [f64; 4] = [1.382_2, -0.778_57, 0.062_767, -0.002_032_2];
const C5: [f64; 4] = [-1.586_1, -0.310_82, -0.083_751, 0.003_891_5];
const C6: [f64; 3] = [-0.480_3, -0.082_676, 0.003_030_2];
const G: [f64; 2] = [-2.273, 0.459];

fn polynomial(coefficients: &[f64], x: f64) -> f64 {
    coefficients
        .iter()
        .rev()
        .fold(0.0, |acc, c| acc * x + c)
}

/// Royston's approximation to the optimal linear-estimator weights.
fn weights(n: usize) -> Result<Vec<f64>, OceError> {
    let mut a = vec![0.0; n];
    if n == 3 {
        a[0] = -std::f64::consts::FRAC_1_SQRT_2;
        a[2] = std::f64::consts::FRAC_1_SQRT_2;
        return Ok(a);
    }

    let nf = n as f64;
    let mut m = vec![0.0; n];
    let mut summ2 = 0.0;
    for (i, mi) in m.iter_mut().enumerate() {
        *mi = norm_quantile((i as f64 + 1.0 - 0.375) / (nf + 0.25))?;
        summ2 += *mi * *mi;
    }

    let rsn = 1.0 / nf.sqrt();
    let a_n = polynomial(&C1, rsn) + m[n - 1] / summ2.sqrt();

    if n > 5 {
        let a_n1 = polynomial(&C2, rsn) + m[n - 2] / summ2.sqrt();
        let phi = (summ2 - 2.0 * m[n - 1] * m[n - 1] - 2.0 * m[n - 2] * m[n - 2])
            / (1.0 - 2.0 * a_n * a_n - 2.0 * a_n1 * a_n1);
        if phi <= 0.0 {
            return Err(OceError::numerical_issue(
                "Shapiro-Wilk weight normalization failed",
            ));
        }
        for i in 2..n - 2 {
            a[i] = m[i] / phi.sqrt();
        }
        a[n - 1] = a_n;
        a[n - 2] = a_n1;
        a[0] = -a_n;
        a[1] = -a_n1;
    } else {
        let phi = (summ2 - 2.0 * m[n - 1] * m[n - 1]) / (1.0 - 2.0 * a_n * a_n);
        if phi <= 0.0 {
            return Err(OceError::numerical_issue(
                "Shapiro-Wilk weight normalization failed",
            ));
        }
        for i in 1..n - 1 {
            a[i] = m[i] / phi.sqrt();
        }
        a[n - 1] = a_n;
        a[0] = -a_n;
    }
    Ok(a)
}

fn p_value(w: f64, n: usize) -> Result<f64, OceError> {
    let nf = n as f64;
    if n == 3 {
        // Exact for three observations.
        let p = 6.0 / std::f64::consts::PI
            * (w.sqrt().min(1.0).asin() - 0.75_f64.sqrt().asin());
        return Ok(p.clamp(0.0, 1.0));
    }

    let w1 = 1.0 - w;
    if w1 <= 0.0 {
        return Ok(1.0);
    }
    let y = w1.ln();

    let (z, valid) = if n <= 11 {
        let gamma = polynomial(&G, nf);
        if y >= gamma {
            // W too small for the transformation; evidence is overwhelming.
            return Ok(0.0);
        }
        let transformed = -(gamma - y).ln();
        let mu = polynomial(&C3, nf);
        let sigma = polynomial(&C4, nf).exp();
        ((transformed - mu) / sigma, sigma > 0.0)
    } else {
        let log_n = nf.ln();
        let mu = polynomial(&C5, log_n);
        let sigma = polynomial(&C6, log_n).exp();
        ((y - mu) / sigma, sigma > 0.0)
    };
    if !valid || !z.is_finite() {
        return Err(OceError::numerical_issue(
            "Shapiro-Wilk p-value transformation failed",
        ));
    }
    Ok((1.0 - norm_cdf(z)).clamp(0.0, 1.0))
}

/// Runs the test on the raw (unsorted) sample.
pub fn shapiro_wilk(values: &[f64]) -> Result<NormalityTestOutcome, OceError> {
    let n = values.len();
    if !(MIN_SAMPLE..=MAX_SAMPLE).contains(&n) {
        return Err(OceError::invalid_input(format!(
            "Shapiro-Wilk supports {MIN_SAMPLE} to {MAX_SAMPLE} values; got {n}"
        )));
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    if sorted[n - 1] - sorted[0] == 0.0 {
        return Err(OceError::invalid_input("zero range"));
    }

    let a = weights(n)?;
    let mean = sorted.iter().sum::<f64>() / n as f64;
    let numerator: f64 = a.iter().zip(&sorted).map(|(ai, x)| ai * x).sum();
    let denominator: f64 = sorted.iter().map(|x| (x - mean) * (x - mean)).sum();
    let w = (numerator * numerator / denominator).min(1.0);
    if !w.is_finite() || w <= 0.0 {
        return Err(OceError::numerical_issue(format!(
            "Shapiro-Wilk statistic out of range: {w}"
        )));
    }

    Ok(NormalityTestOutcome {
        statistic: w,
        p_value: p_value(w, n)?,
    })
}
