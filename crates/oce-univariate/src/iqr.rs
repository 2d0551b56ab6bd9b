// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use oce_core::stats::quantile;
use oce_core::{
    Dataset, DetectionRequest, DetectionResult, DetectorFailure, ExecutionContext, MethodKind,
    OceError, OutlierDetector, OutlierFlag,
};

const DEFAULT_FENCE_MULTIPLIER: f64 = 1.5;
const MIN_SAMPLE: usize = 4;

/// Configuration for [`IqrDetector`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IqrConfig {
    /// Tukey fence multiplier; values outside
    /// `[Q1 - k*IQR, Q3 + k*IQR]` are flagged.
    pub fence_multiplier: f64,
}

impl Default for IqrConfig {
    fn default() -> Self {
        Self {
            fence_multiplier: DEFAULT_FENCE_MULTIPLIER,
        }
    }
}

impl IqrConfig {
    fn validate(&self) -> Result<(), OceError> {
        if !self.fence_multiplier.is_finite() || self.fence_multiplier <= 0.0 {
            return Err(OceError::invalid_input(format!(
                "IqrConfig.fence_multiplier must be finite and > 0; got {}",
                self.fence_multiplier
            )));
        }
        Ok(())
    }
}

/// Interquartile-range detector (Tukey fences).
///
/// Quartiles use the linear-interpolation quantile method. Makes no
/// normality assumption.
#[derive(Clone, Debug)]
pub struct IqrDetector {
    config: IqrConfig,
}

impl IqrDetector {
    pub fn new(config: IqrConfig) -> Result<Self, OceError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &IqrConfig {
        &self.config
    }
}

impl OutlierDetector for IqrDetector {
    fn kind(&self) -> MethodKind {
        MethodKind::Iqr
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
            if pairs.len() < MIN_SAMPLE {
                failures.push(DetectorFailure::precondition(
                    Some(variable.clone()),
                    format!(
                        "IQR requires at least {MIN_SAMPLE} non-missing values; got {}",
                        pairs.len()
                    ),
                ));
                continue;
            }

            let values: Vec<f64> = pairs.iter().map(|(_, v)| *v).collect();
            let q1 = quantile(&values, 0.25)?;
            let q3 = quantile(&values, 0.75)?;
            let iqr = q3 - q1;
            let lower = q1 - self.config.fence_multiplier * iqr;
            let upper = q3 + self.config.fence_multiplier * iqr;

            for (id, value) in &pairs {
                if *value < lower || *value > upper {
                    let distance = if *value < lower {
                        lower - *value
                    } else {
                        *value - upper
                    };
                    flags.push(OutlierFlag {
                        subject_id: id.clone(),
                        variable: Some(variable.clone()),
                        value: Some(*value),
                        score: Some(distance),
                        p_value: None,
                    });
                }
            }
        }

        Ok(DetectionResult::new(
            MethodKind::Iqr,
            flags,
            failures,
            request.variables.clone(),
        ))
    }
}
