// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use oce_core::dist::{t_cdf, t_quantile};
use oce_core::stats::{mean, sample_std};
use oce_core::{
    Dataset, DetectionRequest, DetectionResult, DetectorFailure, ExecutionContext, MethodKind,
    OceError, OutlierDetector, OutlierFlag,
};

const DEFAULT_ALPHA: f64 = 0.05;
const MIN_SAMPLE: usize = 3;

/// Configuration for [`GrubbsDetector`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GrubbsConfig {
    /// Two-sided significance level.
    pub alpha: f64,
}

impl Default for GrubbsConfig {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
        }
    }
}

impl GrubbsConfig {
    fn validate(&self) -> Result<(), OceError> {
        if !self.alpha.is_finite() || self.alpha <= 0.0 || self.alpha >= 1.0 {
            return Err(OceError::invalid_input(format!(
                "GrubbsConfig.alpha must be in (0, 1); got {}",
                self.alpha
            )));
        }
        Ok(())
    }
}

/// Two-sided single-outlier Grubbs test, run once per variable (no
/// iterative re-testing; Rosner covers the multi-outlier case). Flags at
/// most one record per variable: the one farthest from the mean, and only
/// when its statistic exceeds the t-based critical value.
#[derive(Clone, Debug)]
pub struct GrubbsDetector {
    config: GrubbsConfig,
}

impl GrubbsDetector {
    pub fn new(config: GrubbsConfig) -> Result<Self, OceError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &GrubbsConfig {
        &self.config
    }
}

/// G_crit = ((n-1)/sqrt(n)) * sqrt(t^2 / (n-2+t^2)) with
/// t = t-quantile(1 - alpha/(2n), n-2).
fn critical_value(n: usize, alpha: f64) -> Result<f64, OceError> {
    let nf = n as f64;
    let t = t_quantile(1.0 - alpha / (2.0 * nf), nf - 2.0)?;
    Ok((nf - 1.0) / nf.sqrt() * (t * t / (nf - 2.0 + t * t)).sqrt())
}

/// Inverts the statistic back onto the t distribution:
/// t_G^2 = n(n-2)G^2 / ((n-1)^2 - nG^2), p = min(1, 2n * P(T > t_G)).
fn p_value(g: f64, n: usize) -> Result<f64, OceError> {
    let nf = n as f64;
    let denominator = (nf - 1.0) * (nf - 1.0) - nf * g * g;
    if denominator <= 0.0 {
        // G at its algebraic maximum (n-1)/sqrt(n); the evidence is as
        // strong as the statistic can express.
        return Ok(0.0);
    }
    let t_g = (nf * (nf - 2.0) * g * g / denominator).sqrt();
    let tail = 1.0 - t_cdf(t_g, nf - 2.0)?;
    Ok((2.0 * nf * tail).min(1.0))
}

impl OutlierDetector for GrubbsDetector {
    fn kind(&self) -> MethodKind {
        MethodKind::Grubbs
    }

    fn detect(
        &self,
        data: &Dataset,
        request: &DetectionRequest,
        ctx: &ExecutionContext<'_>,
    ) -> Result<DetectionResult, OceError> {
        let mut flags = Vec::new();
        let mut failures = Vec::new();

        for (i, variable) in request.variables.iter().enumerate() {
            ctx.check_cancelled_every(i, 1)?;

            let pairs = data.numeric_with_ids(variable, &request.id_column)?;
            let n = pairs.len();
            if n < MIN_SAMPLE {
                failures.push(DetectorFailure::precondition(
                    Some(variable.clone()),
                    format!("Grubbs requires at least {MIN_SAMPLE} non-missing values; got {n}"),
                ));
                continue;
            }

            let values: Vec<f64> = pairs.iter().map(|(_, v)| *v).collect();
            let m = mean(&values)?;
            let s = sample_std(&values)?;
            if s == 0.0 {
                failures.push(DetectorFailure::precondition(
                    Some(variable.clone()),
                    "zero variance",
                ));
                continue;
            }

            // Farthest point from the mean; first occurrence wins ties.
            let (suspect_idx, g) = values
                .iter()
                .map(|v| (v - m).abs() / s)
                .enumerate()
                .fold((0, f64::NEG_INFINITY), |best, (idx, stat)| {
                    if stat > best.1 {
                        (idx, stat)
                    } else {
                        best
                    }
                });

            let g_crit = match critical_value(n, self.config.alpha) {
                Ok(v) => v,
                Err(err) => {
                    failures.push(DetectorFailure::numerical(
                        Some(variable.clone()),
                        format!("critical value: {err}"),
                    ));
                    continue;
                }
            };

            if g > g_crit {
                let p = match p_value(g, n) {
                    Ok(p) => p,
                    Err(err) => {
                        failures.push(DetectorFailure::numerical(
                            Some(variable.clone()),
                            format!("p-value: {err}"),
                        ));
                        continue;
                    }
                };
                let (id, value) = &pairs[suspect_idx];
                flags.push(OutlierFlag {
                    subject_id: id.clone(),
                    variable: Some(variable.clone()),
                    value: Some(*value),
                    score: Some(g),
                    p_value: Some(p),
                });
            }
        }

        Ok(DetectionResult::new(
            MethodKind::Grubbs,
            flags,
            failures,
            request.variables.clone(),
        ))
    }
}
