// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

/// Engine-wide error type.
///
/// Only configuration-level problems and cancellation surface as `Err`
/// values; per-detector precondition and numerical failures are recorded as
/// values inside `DetectionResult` instead.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OceError {
    /// Malformed input or configuration; rejected before any detector runs.
    InvalidInput(String),
    /// Unexpected numerical failure outside a detector's own run.
    NumericalIssue(String),
    /// Requested operation is not supported for the given data.
    NotSupported(String),
    /// The caller cancelled the run.
    Cancelled,
}

impl OceError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn numerical_issue(msg: impl Into<String>) -> Self {
        Self::NumericalIssue(msg.into())
    }

    pub fn not_supported(msg: impl Into<String>) -> Self {
        Self::NotSupported(msg.into())
    }

    pub fn cancelled() -> Self {
        Self::Cancelled
    }
}

impl std::fmt::Display for OceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            Self::NumericalIssue(msg) => write!(f, "numerical issue: {msg}"),
            Self::NotSupported(msg) => write!(f, "not supported: {msg}"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::error::Error for OceError {}

#[cfg(test)]
mod tests {
    use super::OceError;

    #[test]
    fn display_formats_each_variant() {
        assert_eq!(
            OceError::invalid_input("bad strategy").to_string(),
            "invalid input: bad strategy"
        );
        assert_eq!(
            OceError::numerical_issue("NaN in covariance").to_string(),
            "numerical issue: NaN in covariance"
        );
        assert_eq!(
            OceError::not_supported("mixed dtypes").to_string(),
            "not supported: mixed dtypes"
        );
        assert_eq!(OceError::cancelled().to_string(), "cancelled");
    }

    #[test]
    fn constructors_produce_matching_variants() {
        assert!(matches!(
            OceError::invalid_input("x"),
            OceError::InvalidInput(_)
        ));
        assert!(matches!(
            OceError::numerical_issue("x"),
            OceError::NumericalIssue(_)
        ));
        assert!(matches!(
            OceError::not_supported("x"),
            OceError::NotSupported(_)
        ));
        assert!(matches!(OceError::cancelled(), OceError::Cancelled));
    }
}
