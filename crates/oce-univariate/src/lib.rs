// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Univariate outlier detectors. Each runs independently per quantitative
//! variable on the non-missing values and merges its per-variable flags
//! into one method-level [`oce_core::DetectionResult`].

mod iqr;
mod mad;
mod zscore;

pub use iqr::{IqrConfig, IqrDetector};
pub use mad::{MadConfig, MadDetector};
pub use zscore::{ZScoreConfig, ZScoreDetector};
