// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use oce_core::dist::{t_cdf, t_quantile};
use oce_core::stats::{mean, sample_std};
use oce_core::{
    Dataset, DetectionRequest, DetectionResult, DetectorFailure, ExecutionContext, MethodKind,
    OceError, OutlierDetector, OutlierFlag,
};

const DEFAULT_ALPHA: f64 = 0.05;
const DEFAULT_MAX_OUTLIERS: usize = 10;
const MIN_SAMPLE: usize = 25;

/// Configuration for [`RosnerDetector`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RosnerConfig {
    pub alpha: f64,
    /// Upper bound on removals; clamped to half the sample at run time.
    pub max_outliers: usize,
}

impl Default for RosnerConfig {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
            max_outliers: DEFAULT_MAX_OUTLIERS,
        }
    }
}

impl RosnerConfig {
    fn validate(&self) -> Result<(), OceError> {
        if !self.alpha.is_finite() || self.alpha <= 0.0 || self.alpha >= 1.0 {
            return Err(OceError::invalid_input(format!(
                "RosnerConfig.alpha must be in (0, 1); got {}",
                self.alpha
            )));
        }
        if self.max_outliers == 0 {
            return Err(OceError::invalid_input(
                "RosnerConfig.max_outliers must be >= 1; got 0",
            ));
        }
        Ok(())
    }
}

/// Rosner's generalized ESD test, run once per variable. Unlike repeated
/// Grubbs it is robust to masking: it removes up to `max_outliers` extreme
/// values first and the outlier count is the LARGEST step i whose statistic
/// R_i exceeds its critical value lambda_i, so an early masked step cannot
/// end the search.
#[derive(Clone, Debug)]
pub struct RosnerDetector {
    config: RosnerConfig,
}

impl RosnerDetector {
    pub fn new(config: RosnerConfig) -> Result<Self, OceError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &RosnerConfig {
        &self.config
    }
}

/// lambda_i = (n-i) * t / sqrt((n-i-1+t^2)(n-i+1)) with
/// t = t-quantile(1 - alpha/(2(n-i+1)), n-i-1), i 1-based.
fn critical_value(n: usize, step: usize, alpha: f64) -> Result<f64, OceError> {
    let nf = n as f64;
    let i = step as f64;
    let df = nf - i - 1.0;
    let p = 1.0 - alpha / (2.0 * (nf - i + 1.0));
    let t = t_quantile(p, df)?;
    Ok((nf - i) * t / ((df + t * t) * (nf - i + 1.0)).sqrt())
}

/// Same statistic inversion as Grubbs, over the surviving sample of size m.
fn p_value(r: f64, m: usize) -> Result<f64, OceError> {
    let mf = m as f64;
    let denominator = (mf - 1.0) * (mf - 1.0) - mf * r * r;
    if denominator <= 0.0 {
        return Ok(0.0);
    }
    let t_r = (mf * (mf - 2.0) * r * r / denominator).sqrt();
    let tail = 1.0 - t_cdf(t_r, mf - 2.0)?;
    Ok((2.0 * mf * tail).min(1.0))
}

struct Candidate {
    id: String,
    value: f64,
    statistic: f64,
    exceeds: bool,
    p_value: f64,
}

impl OutlierDetector for RosnerDetector {
    fn kind(&self) -> MethodKind {
        MethodKind::Rosner
    }

    fn detect(
        &self,
        data: &Dataset,
        request: &DetectionRequest,
        ctx: &ExecutionContext<'_>,
    ) -> Result<DetectionResult, OceError> {
        let mut flags = Vec::new();
        let mut failures = Vec::new();

        'variables: for (vi, variable) in request.variables.iter().enumerate() {
            ctx.check_cancelled_every(vi, 1)?;

            let pairs = data.numeric_with_ids(variable, &request.id_column)?;
            let n = pairs.len();
            if n < MIN_SAMPLE {
                failures.push(DetectorFailure::precondition(
                    Some(variable.clone()),
                    format!("Rosner ESD requires at least {MIN_SAMPLE} non-missing values; got {n}"),
                ));
                continue;
            }

            let values: Vec<f64> = pairs.iter().map(|(_, v)| *v).collect();
            if sample_std(&values)? == 0.0 {
                failures.push(DetectorFailure::precondition(
                    Some(variable.clone()),
                    "zero variance",
                ));
                continue;
            }

            let k = self.config.max_outliers.min(n / 2).max(1);
            let mut working = pairs;
            let mut candidates: Vec<Candidate> = Vec::with_capacity(k);

            for step in 1..=k {
                let survivors: Vec<f64> = working.iter().map(|(_, v)| *v).collect();
                let m = mean(&survivors)?;
                let s = sample_std(&survivors)?;
                if s == 0.0 {
                    // Remaining values are identical; no further extremes.
                    break;
                }

                let (idx, statistic) = survivors
                    .iter()
                    .map(|v| (v - m).abs() / s)
                    .enumerate()
                    .fold((0, f64::NEG_INFINITY), |best, (i, stat)| {
                        if stat > best.1 {
                            (i, stat)
                        } else {
                            best
                        }
                    });

                let lambda = match critical_value(n, step, self.config.alpha) {
                    Ok(v) => v,
                    Err(err) => {
                        failures.push(DetectorFailure::numerical(
                            Some(variable.clone()),
                            format!("critical value at step {step}: {err}"),
                        ));
                        continue 'variables;
                    }
                };
                let p = match p_value(statistic, survivors.len()) {
                    Ok(p) => p,
                    Err(err) => {
                        failures.push(DetectorFailure::numerical(
                            Some(variable.clone()),
                            format!("p-value at step {step}: {err}"),
                        ));
                        continue 'variables;
                    }
                };

                let (id, value) = working.remove(idx);
                candidates.push(Candidate {
                    id,
                    value,
                    statistic,
                    exceeds: statistic > lambda,
                    p_value: p,
                });
            }

            // The outlier count is the largest step whose statistic exceeds
            // its critical value; every removal up to it is an outlier.
            let outliers = candidates
                .iter()
                .rposition(|c| c.exceeds)
                .map_or(0, |last| last + 1);
            for candidate in candidates.into_iter().take(outliers) {
                flags.push(OutlierFlag {
                    subject_id: candidate.id,
                    variable: Some(variable.clone()),
                    value: Some(candidate.value),
                    score: Some(candidate.statistic),
                    p_value: Some(candidate.p_value),
                });
            }
        }

        Ok(DetectionResult::new(
            MethodKind::Rosner,
            flags,
            failures,
            request.variables.clone(),
        ))
    }
}
