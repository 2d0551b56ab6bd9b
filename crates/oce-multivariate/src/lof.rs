// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use oce_core::{
    Dataset, DetectionRequest, DetectionResult, DetectorFailure, ExecutionContext, MethodKind,
    OceError, OutlierDetector, OutlierFlag,
};

const DEFAULT_NEIGHBORS: usize = 20;
/// Scores meaningfully above 1 mark lower-than-neighborhood density; the
/// fixed cutoff used here is 1.5.
const DEFAULT_SCORE_THRESHOLD: f64 = 1.5;
/// Stored in place of an infinite density ratio so scores stay serializable.
const SCORE_CAP: f64 = 1.0e12;
const CANCEL_CHECK_EVERY: usize = 64;

/// Configuration for [`LofDetector`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LofConfig {
    /// Requested neighborhood size; clamped to `n - 1` at run time.
    pub neighbors: usize,
    pub score_threshold: f64,
}

impl Default for LofConfig {
    fn default() -> Self {
        Self {
            neighbors: DEFAULT_NEIGHBORS,
            score_threshold: DEFAULT_SCORE_THRESHOLD,
        }
    }
}

impl LofConfig {
    fn validate(&self) -> Result<(), OceError> {
        if self.neighbors == 0 {
            return Err(OceError::invalid_input(
                "LofConfig.neighbors must be >= 1; got 0",
            ));
        }
        if !self.score_threshold.is_finite() || self.score_threshold <= 1.0 {
            return Err(OceError::invalid_input(format!(
                "LofConfig.score_threshold must be finite and > 1; got {}",
                self.score_threshold
            )));
        }
        Ok(())
    }
}

/// Local Outlier Factor: flags records whose local density is much lower
/// than that of their k nearest neighbors. Exact O(n²) neighbor search;
/// distance ties break by record order so runs are deterministic.
#[derive(Clone, Debug)]
pub struct LofDetector {
    config: LofConfig,
}

impl LofDetector {
    pub fn new(config: LofConfig) -> Result<Self, OceError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &LofConfig {
        &self.config
    }
}

fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

fn density_ratio(lrd_neighbor: f64, lrd_self: f64) -> f64 {
    match (lrd_neighbor.is_infinite(), lrd_self.is_infinite()) {
        (true, true) => 1.0,
        (false, true) => 0.0,
        (true, false) => f64::INFINITY,
        (false, false) => lrd_neighbor / lrd_self,
    }
}

impl OutlierDetector for LofDetector {
    fn kind(&self) -> MethodKind {
        MethodKind::Lof
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
                MethodKind::Lof,
                vec![],
                vec![failure],
                request.variables.clone(),
            ))
        };

        if request.variables.len() < 2 {
            return fail(DetectorFailure::precondition(
                None,
                format!(
                    "LOF requires at least 2 variables; got {}",
                    request.variables.len()
                ),
            ));
        }

        let (ids, rows) = data.numeric_matrix(&request.variables, &request.id_column)?;
        let n = rows.len();
        if n < 2 {
            return fail(DetectorFailure::precondition(
                None,
                format!("LOF requires at least 2 complete records; got {n}"),
            ));
        }
        let k = self.config.neighbors.min(n - 1);

        // Neighbor lists: for each record, the k nearest others by
        // (distance, index).
        let mut neighbor_lists: Vec<Vec<(f64, usize)>> = Vec::with_capacity(n);
        for i in 0..n {
            ctx.check_cancelled_every(i, CANCEL_CHECK_EVERY)?;
            let mut candidates: Vec<(f64, usize)> = (0..n)
                .filter(|&j| j != i)
                .map(|j| (euclidean(&rows[i], &rows[j]), j))
                .collect();
            candidates.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
            candidates.truncate(k);
            neighbor_lists.push(candidates);
        }

        let k_distances: Vec<f64> = neighbor_lists
            .iter()
            .map(|neighbors| neighbors.last().map_or(0.0, |(d, _)| *d))
            .collect();

        // Local reachability density; duplicate-heavy neighborhoods with a
        // zero average reachability get an infinite density.
        let mut lrd = vec![0.0_f64; n];
        for i in 0..n {
            let total_reach: f64 = neighbor_lists[i]
                .iter()
                .map(|(d, j)| d.max(k_distances[*j]))
                .sum();
            let avg_reach = total_reach / k as f64;
            lrd[i] = if avg_reach == 0.0 {
                f64::INFINITY
            } else {
                1.0 / avg_reach
            };
        }

        let mut flags = Vec::new();
        for i in 0..n {
            let score = neighbor_lists[i]
                .iter()
                .map(|(_, j)| density_ratio(lrd[*j], lrd[i]))
                .sum::<f64>()
                / k as f64;
            if score.is_nan() {
                return fail(DetectorFailure::numerical(
                    None,
                    format!("non-finite LOF score for record '{}'", ids[i]),
                ));
            }
            if score > self.config.score_threshold {
                flags.push(OutlierFlag {
                    subject_id: ids[i].clone(),
                    variable: None,
                    value: None,
                    score: Some(score.min(SCORE_CAP)),
                    p_value: None,
                });
            }
        }

        Ok(DetectionResult::new(
            MethodKind::Lof,
            flags,
            vec![],
            request.variables.clone(),
        ))
    }
}
