// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Formal hypothesis tests for outliers. All run per variable at a
//! configured significance level; a run whose preconditions hold but which
//! flags nothing is a success, not a failure.

mod dixon;
mod grubbs;
mod rosner;

pub use dixon::DixonDetector;
pub use grubbs::{GrubbsConfig, GrubbsDetector};
pub use rosner::{RosnerConfig, RosnerDetector};
