// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Multivariate outlier detectors. All operate on the row-complete numeric
//! matrix over the selected quantitative variables (listwise deletion of
//! rows with any missing value — dropped records are ineligible for
//! multivariate flagging).

mod isolation_forest;
mod lof;
mod mahalanobis;
mod matrix;

pub use isolation_forest::{IsolationForestConfig, IsolationForestDetector};
pub use lof::{LofConfig, LofDetector};
pub use mahalanobis::{MahalanobisConfig, MahalanobisDetector};
