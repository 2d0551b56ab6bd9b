// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::matrix::{covariance_matrix, invert, mean_vector, quadratic_form};
use oce_core::{
    Dataset, DetectionRequest, DetectionResult, DetectorFailure, ExecutionContext, MethodKind,
    OceError, OutlierDetector, OutlierFlag,
};

/// Raw-distance cutoff. The threshold compares the Mahalanobis distance
/// itself, not the squared distance and not a chi-square critical value.
const DEFAULT_DISTANCE_THRESHOLD: f64 = 3.0;
const CANCEL_CHECK_EVERY: usize = 256;

/// Configuration for [`MahalanobisDetector`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MahalanobisConfig {
    pub distance_threshold: f64,
}

impl Default for MahalanobisConfig {
    fn default() -> Self {
        Self {
            distance_threshold: DEFAULT_DISTANCE_THRESHOLD,
        }
    }
}

impl MahalanobisConfig {
    fn validate(&self) -> Result<(), OceError> {
        if !self.distance_threshold.is_finite() || self.distance_threshold <= 0.0 {
            return Err(OceError::invalid_input(format!(
                "MahalanobisConfig.distance_threshold must be finite and > 0; got {}",
                self.distance_threshold
            )));
        }
        Ok(())
    }
}

/// Mahalanobis-distance detector over the joint distribution of the
/// selected variables. Parametric: relies on the sample mean and an
/// invertible sample covariance matrix.
#[derive(Clone, Debug)]
pub struct MahalanobisDetector {
    config: MahalanobisConfig,
}

impl MahalanobisDetector {
    pub fn new(config: MahalanobisConfig) -> Result<Self, OceError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &MahalanobisConfig {
        &self.config
    }
}

impl OutlierDetector for MahalanobisDetector {
    fn kind(&self) -> MethodKind {
        MethodKind::Mahalanobis
    }

    fn detect(
        &self,
        data: &Dataset,
        request: &DetectionRequest,
        ctx: &ExecutionContext<'_>,
    ) -> Result<DetectionResult, OceError> {
        ctx.check_cancelled()?;

        let fail = |failure: DetectorFailure| {
            Ok(DetectionResult::new(
                MethodKind::Mahalanobis,
                vec![],
                vec![failure],
                request.variables.clone(),
            ))
        };

        if request.variables.len() < 2 {
            return fail(DetectorFailure::precondition(
                None,
                format!(
                    "Mahalanobis requires at least 2 variables; got {}",
                    request.variables.len()
                ),
            ));
        }

        let (ids, rows) = data.numeric_matrix(&request.variables, &request.id_column)?;
        let n = rows.len();
        let d = request.variables.len();
        if n <= d {
            return fail(DetectorFailure::precondition(
                None,
                format!(
                    "Mahalanobis requires more complete records than variables; got n={n}, d={d}"
                ),
            ));
        }

        let mean = mean_vector(&rows)?;
        let cov = covariance_matrix(&rows, &mean)?;
        let inv = match invert(&cov) {
            Ok(inv) => inv,
            Err(_) => {
                return fail(DetectorFailure::precondition(
                    None,
                    "singular covariance matrix",
                ));
            }
        };

        let mut flags = Vec::new();
        for (i, (id, row)) in ids.iter().zip(&rows).enumerate() {
            ctx.check_cancelled_every(i, CANCEL_CHECK_EVERY)?;

            let diff: Vec<f64> = row.iter().zip(&mean).map(|(x, m)| x - m).collect();
            let mut dist_sq = quadratic_form(&diff, &inv);
            if dist_sq < 0.0 {
                if dist_sq < -1.0e-8 {
                    return fail(DetectorFailure::numerical(
                        None,
                        format!("negative squared distance {dist_sq} for record '{id}'"),
                    ));
                }
                dist_sq = 0.0;
            }
            let distance = dist_sq.sqrt();
            if !distance.is_finite() {
                return fail(DetectorFailure::numerical(
                    None,
                    format!("non-finite distance for record '{id}'"),
                ));
            }

            if distance > self.config.distance_threshold {
                flags.push(OutlierFlag {
                    subject_id: id.clone(),
                    variable: None,
                    value: None,
                    score: Some(distance),
                    p_value: None,
                });
            }
        }

        Ok(DetectionResult::new(
            MethodKind::Mahalanobis,
            flags,
            vec![],
            request.variables.clone(),
        ))
    }
}
