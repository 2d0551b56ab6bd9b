// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use oce_core::stats::{mean, sample_std};
use oce_core::{
    Dataset, DetectionRequest, DetectionResult, DetectorFailure, ExecutionContext, MethodKind,
    OceError, OutlierDetector, OutlierFlag,
};

const DEFAULT_THRESHOLD: f64 = 3.0;

/// Configuration for [`ZScoreDetector`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ZScoreConfig {
    /// Values with `|x - mean| / std` above this are flagged.
    pub threshold: f64,
}

impl Default for ZScoreConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl ZScoreConfig {
    fn validate(&self) -> Result<(), OceError> {
        if !self.threshold.is_finite() || self.threshold <= 0.0 {
            return Err(OceError::invalid_input(format!(
                "ZScoreConfig.threshold must be finite and > 0; got {}",
                self.threshold
            )));
        }
        Ok(())
    }
}

/// Standard-score detector. Parametric: assumes roughly normal data and
/// requires non-zero sample variance.
#[derive(Clone, Debug)]
pub struct ZScoreDetector {
    config: ZScoreConfig,
}

impl ZScoreDetector {
    pub fn new(config: ZScoreConfig) -> Result<Self, OceError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ZScoreConfig {
        &self.config
    }
}

impl OutlierDetector for ZScoreDetector {
    fn kind(&self) -> MethodKind {
        MethodKind::ZScore
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
            if pairs.len() < 2 {
                failures.push(DetectorFailure::precondition(
                    Some(variable.clone()),
                    format!(
                        "Z-Score requires at least 2 non-missing values; got {}",
                        pairs.len()
                    ),
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

            for (id, value) in &pairs {
                let z = (*value - m) / s;
                if z.abs() > self.config.threshold {
                    flags.push(OutlierFlag {
                        subject_id: id.clone(),
                        variable: Some(variable.clone()),
                        value: Some(*value),
                        score: Some(z.abs()),
                        p_value: None,
                    });
                }
            }
        }

        Ok(DetectionResult::new(
            MethodKind::ZScore,
            flags,
            failures,
            request.variables.clone(),
        ))
    }
}
