// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use oce_core::OceError;

const THRESHOLD_RANGE: std::ops::RangeInclusive<usize> = 1..=10;
const DEFAULT_SEED: u64 = 42;
const DEFAULT_ROSNER_MAX_OUTLIERS: usize = 10;

/// Combination strategy; see [`crate::ConsensusEngine`] for the semantics.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StrategyKind {
    Union,
    Intersection,
    Voting,
    Adaptive,
}

impl StrategyKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Union => "union",
            Self::Intersection => "intersection",
            Self::Voting => "voting",
            Self::Adaptive => "adaptive",
        }
    }

    /// Parses a configuration-boundary strategy name.
    pub fn parse(name: &str) -> Result<Self, OceError> {
        match name {
            "union" => Ok(Self::Union),
            "intersection" => Ok(Self::Intersection),
            "voting" => Ok(Self::Voting),
            "adaptive" => Ok(Self::Adaptive),
            other => Err(OceError::invalid_input(format!(
                "unknown strategy '{other}' (expected union, intersection, voting or adaptive)"
            ))),
        }
    }
}

/// Run configuration for the consensus engine.
///
/// Validation is fail-fast: a bad configuration is rejected before any
/// detector executes.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct ConsensusConfig {
    pub strategy: StrategyKind,
    /// Univariate vote threshold for the voting strategy (1..=10).
    pub min_univariate: usize,
    /// Multivariate vote threshold for the voting strategy (1..=10).
    pub min_multivariate: usize,
    /// Name of the subject-id column; must exist in the dataset.
    pub id_column: String,
    /// Seed for the Isolation Forest; fixed seed means bit-identical runs.
    pub seed: u64,
    /// Maximum number of outliers the Rosner ESD test may remove.
    pub rosner_max_outliers: usize,
}

impl ConsensusConfig {
    pub fn new(strategy: StrategyKind, id_column: impl Into<String>) -> Self {
        Self {
            strategy,
            min_univariate: 1,
            min_multivariate: 1,
            id_column: id_column.into(),
            seed: DEFAULT_SEED,
            rosner_max_outliers: DEFAULT_ROSNER_MAX_OUTLIERS,
        }
    }

    pub fn validate(&self) -> Result<(), OceError> {
        if !THRESHOLD_RANGE.contains(&self.min_univariate) {
            return Err(OceError::invalid_input(format!(
                "ConsensusConfig.min_univariate must be in 1..=10; got {}",
                self.min_univariate
            )));
        }
        if !THRESHOLD_RANGE.contains(&self.min_multivariate) {
            return Err(OceError::invalid_input(format!(
                "ConsensusConfig.min_multivariate must be in 1..=10; got {}",
                self.min_multivariate
            )));
        }
        if self.id_column.is_empty() {
            return Err(OceError::invalid_input(
                "ConsensusConfig.id_column must not be empty",
            ));
        }
        if self.rosner_max_outliers == 0 {
            return Err(OceError::invalid_input(
                "ConsensusConfig.rosner_max_outliers must be >= 1; got 0",
            ));
        }
        Ok(())
    }
}
