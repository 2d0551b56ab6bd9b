// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Multi-method outlier consensus engine. Runs three univariate detectors
//! (IQR, Z-Score, MAD), three multivariate detectors (Mahalanobis, LOF,
//! Isolation Forest) and three hypothesis tests (Grubbs, Dixon Q, Rosner
//! ESD) over a tabular dataset, then combines the per-method verdicts into
//! one final outlier label per record under a selectable strategy.

mod config;
mod engine;
mod strategy;

pub use config::{ConsensusConfig, StrategyKind};
pub use engine::{
    CombinedResult, ConsensusEngine, MethodBreakdown, HIGH_OUTLIER_WARNING_PERCENT,
};
