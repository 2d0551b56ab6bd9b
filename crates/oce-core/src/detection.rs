// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::{Dataset, ExecutionContext, OceError};
use std::collections::BTreeSet;

/// Closed set of detection methods.
///
/// Combination logic switches on this enum; strings appear only at the
/// configuration-parsing boundary.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MethodKind {
    Iqr,
    ZScore,
    Mad,
    Mahalanobis,
    Lof,
    IsolationForest,
    Grubbs,
    Dixon,
    Rosner,
}

/// Detector family, used for grouping and voting.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MethodFamily {
    Univariate,
    Multivariate,
    HypothesisTest,
}

impl MethodKind {
    pub fn family(self) -> MethodFamily {
        match self {
            Self::Iqr | Self::ZScore | Self::Mad => MethodFamily::Univariate,
            Self::Mahalanobis | Self::Lof | Self::IsolationForest => MethodFamily::Multivariate,
            Self::Grubbs | Self::Dixon | Self::Rosner => MethodFamily::HypothesisTest,
        }
    }

    /// Stable lowercase name for reports.
    pub fn name(self) -> &'static str {
        match self {
            Self::Iqr => "iqr",
            Self::ZScore => "zscore",
            Self::Mad => "mad",
            Self::Mahalanobis => "mahalanobis",
            Self::Lof => "lof",
            Self::IsolationForest => "isolation_forest",
            Self::Grubbs => "grubbs",
            Self::Dixon => "dixon",
            Self::Rosner => "rosner",
        }
    }

    /// All methods in the fixed reporting order.
    pub fn all() -> [MethodKind; 9] {
        [
            Self::Iqr,
            Self::ZScore,
            Self::Mad,
            Self::Mahalanobis,
            Self::Lof,
            Self::IsolationForest,
            Self::Grubbs,
            Self::Dixon,
            Self::Rosner,
        ]
    }
}

/// One flagged observation with the audit metadata of why it was flagged.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct OutlierFlag {
    pub subject_id: String,
    /// Originating variable; `None` for joint multivariate flags.
    pub variable: Option<String>,
    /// Raw observed value, when the flag comes from a single variable.
    pub value: Option<f64>,
    /// Method-specific score (distance, |z|, LOF ratio, anomaly score, ...).
    pub score: Option<f64>,
    pub p_value: Option<f64>,
}

/// Why a detector (or one of its per-variable runs) could not run.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    /// The data does not satisfy the method's preconditions
    /// (zero variance, singular covariance, sample size out of range, ...).
    Precondition,
    /// Unexpected numerical failure (NaN propagation and the like);
    /// treated like a precondition failure for combination, logged apart.
    Numerical,
}

/// Recorded failure of a detector run; a first-class value, never an
/// exception used for control flow.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct DetectorFailure {
    /// Variable the failure applies to; `None` when it concerns the whole
    /// joint run of a multivariate method.
    pub variable: Option<String>,
    pub kind: FailureKind,
    pub reason: String,
}

impl DetectorFailure {
    pub fn precondition(variable: Option<String>, reason: impl Into<String>) -> Self {
        Self {
            variable,
            kind: FailureKind::Precondition,
            reason: reason.into(),
        }
    }

    pub fn numerical(variable: Option<String>, reason: impl Into<String>) -> Self {
        Self {
            variable,
            kind: FailureKind::Numerical,
            reason: reason.into(),
        }
    }
}

/// Terminal result of one method over the whole detection request.
///
/// "Ran and found nothing" (empty `flags`, empty `failures`) and "could not
/// run" (non-empty `failures`) are distinguishable states; callers and the
/// combination engine must treat them differently.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct DetectionResult {
    pub method: MethodKind,
    pub flags: Vec<OutlierFlag>,
    pub failures: Vec<DetectorFailure>,
    /// Variables the method was asked to evaluate.
    pub evaluated_variables: Vec<String>,
}

impl DetectionResult {
    /// Builds a result with flags sorted and de-duplicated by
    /// (subject id, variable) for deterministic reporting.
    pub fn new(
        method: MethodKind,
        mut flags: Vec<OutlierFlag>,
        failures: Vec<DetectorFailure>,
        evaluated_variables: Vec<String>,
    ) -> Self {
        flags.sort_by(|a, b| {
            a.subject_id
                .cmp(&b.subject_id)
                .then_with(|| a.variable.cmp(&b.variable))
        });
        flags.dedup_by(|a, b| a.subject_id == b.subject_id && a.variable == b.variable);
        Self {
            method,
            flags,
            failures,
            evaluated_variables,
        }
    }

    /// True iff every requested run completed.
    pub fn success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Distinct flagged subject ids, sorted.
    pub fn flagged_ids(&self) -> BTreeSet<&str> {
        self.flags.iter().map(|f| f.subject_id.as_str()).collect()
    }

    pub fn outlier_count(&self) -> usize {
        self.flagged_ids().len()
    }
}

/// What a detector is asked to run over.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectionRequest {
    pub id_column: String,
    pub variables: Vec<String>,
}

/// Uniform detector contract.
///
/// Per-detector precondition and numerical failures are values inside the
/// returned `DetectionResult`; `Err` is reserved for malformed requests and
/// cancellation.
pub trait OutlierDetector {
    fn kind(&self) -> MethodKind;

    fn detect(
        &self,
        data: &Dataset,
        request: &DetectionRequest,
        ctx: &ExecutionContext<'_>,
    ) -> Result<DetectionResult, OceError>;
}

#[cfg(test)]
mod tests {
    use super::{
        DetectionResult, DetectorFailure, FailureKind, MethodFamily, MethodKind, OutlierFlag,
    };

    fn flag(id: &str, variable: Option<&str>) -> OutlierFlag {
        OutlierFlag {
            subject_id: id.to_string(),
            variable: variable.map(str::to_string),
            value: None,
            score: None,
            p_value: None,
        }
    }

    #[test]
    fn families_partition_all_methods() {
        let methods = MethodKind::all();
        assert_eq!(methods.len(), 9);
        let univariate = methods
            .iter()
            .filter(|m| m.family() == MethodFamily::Univariate)
            .count();
        let multivariate = methods
            .iter()
            .filter(|m| m.family() == MethodFamily::Multivariate)
            .count();
        let hypothesis = methods
            .iter()
            .filter(|m| m.family() == MethodFamily::HypothesisTest)
            .count();
        assert_eq!((univariate, multivariate, hypothesis), (3, 3, 3));
    }

    #[test]
    fn method_names_are_stable() {
        assert_eq!(MethodKind::IsolationForest.name(), "isolation_forest");
        assert_eq!(MethodKind::ZScore.name(), "zscore");
    }

    #[test]
    fn new_sorts_flags_for_deterministic_reporting() {
        let result = DetectionResult::new(
            MethodKind::Iqr,
            vec![flag("B", Some("x")), flag("A", Some("y")), flag("A", Some("x"))],
            vec![],
            vec!["x".to_string(), "y".to_string()],
        );
        let order: Vec<(&str, Option<&str>)> = result
            .flags
            .iter()
            .map(|f| (f.subject_id.as_str(), f.variable.as_deref()))
            .collect();
        assert_eq!(
            order,
            vec![("A", Some("x")), ("A", Some("y")), ("B", Some("x"))]
        );
    }

    #[test]
    fn success_distinguishes_empty_from_failed() {
        let clean = DetectionResult::new(MethodKind::Mad, vec![], vec![], vec!["x".to_string()]);
        assert!(clean.success());
        assert_eq!(clean.outlier_count(), 0);

        let failed = DetectionResult::new(
            MethodKind::ZScore,
            vec![],
            vec![DetectorFailure::precondition(
                Some("x".to_string()),
                "zero variance",
            )],
            vec!["x".to_string()],
        );
        assert!(!failed.success());
        assert_eq!(failed.failures[0].kind, FailureKind::Precondition);
    }

    #[test]
    fn new_drops_repeated_subject_variable_pairs() {
        let result = DetectionResult::new(
            MethodKind::Grubbs,
            vec![flag("A", Some("x")), flag("A", Some("x")), flag("A", Some("y"))],
            vec![],
            vec!["x".to_string(), "y".to_string()],
        );
        assert_eq!(result.flags.len(), 2);
        assert_eq!(result.flags[0].variable.as_deref(), Some("x"));
        assert_eq!(result.flags[1].variable.as_deref(), Some("y"));
    }

    #[test]
    fn flagged_ids_deduplicate_across_variables() {
        let result = DetectionResult::new(
            MethodKind::Iqr,
            vec![flag("A", Some("x")), flag("A", Some("y")), flag("B", Some("x"))],
            vec![],
            vec!["x".to_string(), "y".to_string()],
        );
        assert_eq!(result.outlier_count(), 2);
        assert!(result.flagged_ids().contains("A"));
        assert!(result.flagged_ids().contains("B"));
    }
}
