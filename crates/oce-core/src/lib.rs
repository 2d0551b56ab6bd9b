// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Core shared types and numerics for the outlier consensus engine:
//! the dataset model, the detector contract and result schema, the error
//! type, cancellation/progress plumbing, a deterministic RNG, and the
//! scalar statistics and distribution functions the detectors build on.

mod context;
mod dataset;
mod detection;
mod diagnostics;
mod error;
mod rng;

pub mod dist;
pub mod stats;

pub use context::{CancelToken, ExecutionContext, ProgressSink};
pub use dataset::{Column, ColumnValues, Dataset, VariableKind};
pub use detection::{
    DetectionRequest, DetectionResult, DetectorFailure, FailureKind, MethodFamily, MethodKind,
    OutlierDetector, OutlierFlag,
};
pub use diagnostics::{DIAGNOSTICS_SCHEMA_VERSION, Diagnostics};
pub use error::OceError;
pub use rng::StableRng;
