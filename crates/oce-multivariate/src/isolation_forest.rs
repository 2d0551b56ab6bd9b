// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use oce_core::{
    Dataset, DetectionRequest, DetectionResult, DetectorFailure, ExecutionContext, MethodKind,
    OceError, OutlierDetector, OutlierFlag, StableRng,
};

const DEFAULT_TREES: usize = 100;
const DEFAULT_SUBSAMPLE: usize = 256;
const DEFAULT_SCORE_THRESHOLD: f64 = 0.6;
const DEFAULT_SEED: u64 = 42;
const MIN_RECORDS: usize = 8;
const EULER_MASCHERONI: f64 = 0.577_215_664_901_532_9;
const CANCEL_CHECK_EVERY_TREES: usize = 8;
const CANCEL_CHECK_EVERY_RECORDS: usize = 256;

/// Configuration for [`IsolationForestDetector`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IsolationForestConfig {
    pub n_trees: usize,
    /// Per-tree sample size; clamped to `n` at run time.
    pub subsample: usize,
    /// Anomaly scores live in (0, 1); values above this flag the record.
    pub score_threshold: f64,
    /// Run seed. A fixed seed gives bit-identical results across runs.
    pub seed: u64,
}

impl Default for IsolationForestConfig {
    fn default() -> Self {
        Self {
            n_trees: DEFAULT_TREES,
            subsample: DEFAULT_SUBSAMPLE,
            score_threshold: DEFAULT_SCORE_THRESHOLD,
            seed: DEFAULT_SEED,
        }
    }
}

impl IsolationForestConfig {
    fn validate(&self) -> Result<(), OceError> {
        if self.n_trees == 0 {
            return Err(OceError::invalid_input(
                "IsolationForestConfig.n_trees must be >= 1; got 0",
            ));
        }
        if self.subsample < 2 {
            return Err(OceError::invalid_input(format!(
                "IsolationForestConfig.subsample must be >= 2; got {}",
                self.subsample
            )));
        }
        if !self.score_threshold.is_finite()
            || self.score_threshold <= 0.0
            || self.score_threshold >= 1.0
        {
            return Err(OceError::invalid_input(format!(
                "IsolationForestConfig.score_threshold must be in (0, 1); got {}",
                self.score_threshold
            )));
        }
        Ok(())
    }
}

/// Isolation Forest: anomalies isolate in few random axis-parallel splits,
/// so short average path lengths over the ensemble mean outlying records.
/// All randomness comes from a seeded [`StableRng`] with one substream per
/// tree, keeping results reproducible for a fixed seed.
#[derive(Clone, Debug)]
pub struct IsolationForestDetector {
    config: IsolationForestConfig,
}

impl IsolationForestDetector {
    pub fn new(config: IsolationForestConfig) -> Result<Self, OceError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &IsolationForestConfig {
        &self.config
    }
}

enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

/// Expected path length of an unsuccessful BST search over `size` records;
/// normalizes raw depths into the (0, 1) anomaly score.
fn average_path_length(size: usize) -> f64 {
    match size {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let s = size as f64;
            2.0 * ((s - 1.0).ln() + EULER_MASCHERONI) - 2.0 * (s - 1.0) / s
        }
    }
}

fn build_tree(
    rows: &[Vec<f64>],
    indices: &[usize],
    depth: usize,
    max_depth: usize,
    rng: &mut StableRng,
) -> Result<Node, OceError> {
    if indices.len() <= 1 || depth >= max_depth {
        return Ok(Node::Leaf {
            size: indices.len(),
        });
    }

    let d = rows[indices[0]].len();
    // Only features with spread in this partition can split it.
    let splittable: Vec<usize> = (0..d)
        .filter(|&f| {
            let (min, max) = feature_range(rows, indices, f);
            max > min
        })
        .collect();
    if splittable.is_empty() {
        return Ok(Node::Leaf {
            size: indices.len(),
        });
    }

    let feature = splittable[rng.gen_range(splittable.len())?];
    let (min, max) = feature_range(rows, indices, feature);
    let threshold = min + rng.next_f64() * (max - min);

    let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
        .iter()
        .partition(|&&i| rows[i][feature] < threshold);

    Ok(Node::Split {
        feature,
        threshold,
        left: Box::new(build_tree(rows, &left_idx, depth + 1, max_depth, rng)?),
        right: Box::new(build_tree(rows, &right_idx, depth + 1, max_depth, rng)?),
    })
}

fn feature_range(rows: &[Vec<f64>], indices: &[usize], feature: usize) -> (f64, f64) {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for &i in indices {
        let v = rows[i][feature];
        min = min.min(v);
        max = max.max(v);
    }
    (min, max)
}

fn path_length(tree: &Node, row: &[f64]) -> f64 {
    let mut node = tree;
    let mut depth = 0.0;
    loop {
        match node {
            Node::Leaf { size } => return depth + average_path_length(*size),
            Node::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                node = if row[*feature] < *threshold {
                    left
                } else {
                    right
                };
                depth += 1.0;
            }
        }
    }
}

impl OutlierDetector for IsolationForestDetector {
    fn kind(&self) -> MethodKind {
        MethodKind::IsolationForest
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
                MethodKind::IsolationForest,
                vec![],
                vec![failure],
                request.variables.clone(),
            ))
        };

        if request.variables.len() < 2 {
            return fail(DetectorFailure::precondition(
                None,
                format!(
                    "Isolation Forest requires at least 2 variables; got {}",
                    request.variables.len()
                ),
            ));
        }

        let (ids, rows) = data.numeric_matrix(&request.variables, &request.id_column)?;
        let n = rows.len();
        if n < MIN_RECORDS {
            return fail(DetectorFailure::precondition(
                None,
                format!(
                    "Isolation Forest requires at least {MIN_RECORDS} complete records; got {n}"
                ),
            ));
        }

        let psi = self.config.subsample.min(n);
        let max_depth = (psi as f64).log2().ceil() as usize;
        let normalizer = average_path_length(psi);
        let base_rng = StableRng::new(self.config.seed);

        let mut trees = Vec::with_capacity(self.config.n_trees);
        for t in 0..self.config.n_trees {
            ctx.check_cancelled_every(t, CANCEL_CHECK_EVERY_TREES)?;
            let mut rng = base_rng.substream(t as u64);
            let indices = rng.sample_indices(n, psi)?;
            trees.push(build_tree(&rows, &indices, 0, max_depth, &mut rng)?);
        }

        let mut flags = Vec::new();
        for (i, (id, row)) in ids.iter().zip(&rows).enumerate() {
            ctx.check_cancelled_every(i, CANCEL_CHECK_EVERY_RECORDS)?;

            let mean_path = trees
                .iter()
                .map(|tree| path_length(tree, row))
                .sum::<f64>()
                / self.config.n_trees as f64;
            let score = 2.0_f64.powf(-mean_path / normalizer);
            if !score.is_finite() {
                return fail(DetectorFailure::numerical(
                    None,
                    format!("non-finite anomaly score for record '{id}'"),
                ));
            }

            if score > self.config.score_threshold {
                flags.push(OutlierFlag {
                    subject_id: id.clone(),
                    variable: None,
                    value: None,
                    score: Some(score),
                    p_value: None,
                });
            }
        }

        Ok(DetectionResult::new(
            MethodKind::IsolationForest,
            flags,
            vec![],
            request.variables.clone(),
        ))
    }
}
