// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Normality assessment over a dataset's quantitative variables. Every
//! eligible variable is tested in full (no sampling): Shapiro-Wilk for small
//! samples, Anderson-Darling for large ones. The aggregate verdict drives
//! the adaptive combination strategy.

mod anderson_darling;
mod shapiro_wilk;

pub use anderson_darling::anderson_darling;
pub use shapiro_wilk::shapiro_wilk;

use oce_core::{ColumnValues, Dataset, ExecutionContext, OceError};

/// Significance level below which normality is rejected.
pub const NORMALITY_ALPHA: f64 = 0.05;
/// Percentage of normal variables at or above which the dataset as a whole
/// is treated as normal.
pub const GENERALLY_NORMAL_PERCENT: f64 = 60.0;
/// Shapiro-Wilk handles samples up to this size; larger ones use
/// Anderson-Darling.
pub const SHAPIRO_WILK_MAX_N: usize = 50;
const MIN_SAMPLE: usize = 3;

/// Statistic and p-value of one normality test run.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NormalityTestOutcome {
    pub statistic: f64,
    pub p_value: f64,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NormalityTestKind {
    ShapiroWilk,
    AndersonDarling,
}

/// Verdict for one evaluated variable.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct VariableNormality {
    pub variable: String,
    pub n: usize,
    pub test: NormalityTestKind,
    pub statistic: f64,
    pub p_value: f64,
    pub is_normal: bool,
}

/// A variable that could not be tested, with the reason it was excluded.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct SkippedVariable {
    pub variable: String,
    pub reason: String,
}

/// Aggregate normality verdict over the evaluated variables.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct NormalityAssessment {
    pub evaluated: Vec<VariableNormality>,
    pub skipped: Vec<SkippedVariable>,
    /// Percentage (0..=100) of evaluated variables that tested normal.
    pub normal_ratio: f64,
    pub data_is_generally_normal: bool,
    pub notes: Vec<String>,
}

impl NormalityAssessment {
    /// Per-variable lookup; skipped and unknown variables count as
    /// not normal.
    pub fn variable_is_normal(&self, variable: &str) -> bool {
        self.evaluated
            .iter()
            .any(|v| v.variable == variable && v.is_normal)
    }
}

fn non_missing(data: &Dataset, variable: &str) -> Result<Vec<f64>, OceError> {
    let column = data
        .column(variable)
        .ok_or_else(|| OceError::invalid_input(format!("variable '{variable}' not found")))?;
    let ColumnValues::Numeric(values) = column.values() else {
        return Err(OceError::invalid_input(format!(
            "variable '{variable}' is not numeric"
        )));
    };
    Ok(values.iter().flatten().copied().collect())
}

/// Tests every listed variable with at least 3 non-missing values and
/// non-zero variance; the rest are recorded as skipped. With zero evaluated
/// variables the dataset is reported not normal, with a note.
pub fn assess_normality(
    data: &Dataset,
    variables: &[String],
    ctx: &ExecutionContext<'_>,
) -> Result<NormalityAssessment, OceError> {
    let mut evaluated = Vec::new();
    let mut skipped = Vec::new();
    let mut notes = Vec::new();

    for (i, variable) in variables.iter().enumerate() {
        ctx.check_cancelled_every(i, 1)?;

        let values = non_missing(data, variable)?;
        let n = values.len();
        if n < MIN_SAMPLE {
            skipped.push(SkippedVariable {
                variable: variable.clone(),
                reason: format!("fewer than {MIN_SAMPLE} non-missing values ({n})"),
            });
            continue;
        }
        if oce_core::stats::sample_std(&values)? == 0.0 {
            skipped.push(SkippedVariable {
                variable: variable.clone(),
                reason: "zero variance".to_string(),
            });
            continue;
        }

        let (kind, outcome) = if n <= SHAPIRO_WILK_MAX_N {
            (NormalityTestKind::ShapiroWilk, shapiro_wilk(&values))
        } else {
            (NormalityTestKind::AndersonDarling, anderson_darling(&values))
        };
        match outcome {
            Ok(outcome) => evaluated.push(VariableNormality {
                variable: variable.clone(),
                n,
                test: kind,
                statistic: outcome.statistic,
                p_value: outcome.p_value,
                is_normal: outcome.p_value >= NORMALITY_ALPHA,
            }),
            Err(err) => skipped.push(SkippedVariable {
                variable: variable.clone(),
                reason: err.to_string(),
            }),
        }
    }

    let normal_count = evaluated.iter().filter(|v| v.is_normal).count();
    let normal_ratio = if evaluated.is_empty() {
        notes.push("no variable was eligible for normality testing".to_string());
        0.0
    } else {
        100.0 * normal_count as f64 / evaluated.len() as f64
    };

    Ok(NormalityAssessment {
        evaluated,
        skipped,
        normal_ratio,
        data_is_generally_normal: normal_ratio >= GENERALLY_NORMAL_PERCENT,
        notes,
    })
}
