// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use oce_core::{
    Dataset, DetectionRequest, DetectionResult, DetectorFailure, ExecutionContext, MethodKind,
    OceError, OutlierDetector, OutlierFlag,
};

const MIN_SAMPLE: usize = 3;
const MAX_SAMPLE: usize = 30;

/// Two-sided 95% critical values for the r10 ratio, n = 3..=30
/// (Rorabacher 1991, Table 1).
const R10_CRITICAL_95: [f64; 28] = [
    0.970, 0.829, 0.710, 0.625, 0.568, 0.526, 0.493, 0.466, 0.444, 0.426, 0.410, 0.396, 0.384,
    0.374, 0.365, 0.356, 0.349, 0.342, 0.337, 0.331, 0.326, 0.321, 0.317, 0.312, 0.308, 0.305,
    0.301, 0.298,
];

fn critical_value(n: usize) -> Option<f64> {
    if (MIN_SAMPLE..=MAX_SAMPLE).contains(&n) {
        Some(R10_CRITICAL_95[n - MIN_SAMPLE])
    } else {
        None
    }
}

/// Dixon's Q test (r10 ratio, two-sided at 95%), run once per variable.
/// Tests both extremes: Q = gap/range, where the gap is the distance from
/// the suspect extreme to its nearest neighbor. Table-based, so only
/// samples of 3 to 30 values are supported.
#[derive(Clone, Copy, Debug, Default)]
pub struct DixonDetector;

impl DixonDetector {
    pub fn new() -> Self {
        Self
    }
}

impl OutlierDetector for DixonDetector {
    fn kind(&self) -> MethodKind {
        MethodKind::Dixon
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

            let mut pairs = data.numeric_with_ids(variable, &request.id_column)?;
            let n = pairs.len();
            let Some(q_crit) = critical_value(n) else {
                failures.push(DetectorFailure::precondition(
                    Some(variable.clone()),
                    format!(
                        "Dixon Q is tabulated for {MIN_SAMPLE} to {MAX_SAMPLE} values; got {n}"
                    ),
                ));
                continue;
            };

            pairs.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
            let range = pairs[n - 1].1 - pairs[0].1;
            if range == 0.0 {
                failures.push(DetectorFailure::precondition(
                    Some(variable.clone()),
                    "zero range",
                ));
                continue;
            }

            let q_low = (pairs[1].1 - pairs[0].1) / range;
            if q_low > q_crit {
                let (id, value) = &pairs[0];
                flags.push(OutlierFlag {
                    subject_id: id.clone(),
                    variable: Some(variable.clone()),
                    value: Some(*value),
                    score: Some(q_low),
                    p_value: None,
                });
            }

            let q_high = (pairs[n - 1].1 - pairs[n - 2].1) / range;
            if q_high > q_crit {
                let (id, value) = &pairs[n - 1];
                flags.push(OutlierFlag {
                    subject_id: id.clone(),
                    variable: Some(variable.clone()),
                    value: Some(*value),
                    score: Some(q_high),
                    p_value: None,
                });
            }
        }

        Ok(DetectionResult::new(
            MethodKind::Dixon,
            flags,
            failures,
            request.variables.clone(),
        ))
    }
}
