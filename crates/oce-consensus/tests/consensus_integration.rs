// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use oce_consensus::{CombinedResult, ConsensusConfig, ConsensusEngine, StrategyKind};
use oce_core::{
    CancelToken, Column, Dataset, ExecutionContext, MethodKind, OceError, VariableKind,
};

fn subject_ids(n: usize) -> Vec<Option<String>> {
    (0..n).map(|i| Some(format!("S{i:03}"))).collect()
}

fn single_variable_dataset(values: &[f64]) -> Dataset {
    Dataset::new(vec![
        Column::categorical(
            "subject",
            VariableKind::NominalCategorical,
            subject_ids(values.len()),
        )
        .expect("id column"),
        Column::numeric(
            "x",
            VariableKind::ContinuousQuantitative,
            values.iter().map(|v| Some(*v)).collect(),
        )
        .expect("x column"),
    ])
    .expect("dataset")
}

fn engine(strategy: StrategyKind) -> ConsensusEngine {
    ConsensusEngine::new(ConsensusConfig::new(strategy, "subject")).expect("engine")
}

fn run(strategy: StrategyKind, data: &Dataset) -> CombinedResult {
    engine(strategy)
        .run(data, &ExecutionContext::new())
        .expect("run")
}

fn method<'a>(result: &'a CombinedResult, kind: MethodKind) -> &'a oce_core::DetectionResult {
    result
        .methods
        .all()
        .find(|r| r.method == kind)
        .expect("method result present")
}

#[test]
fn small_skewed_sample_is_caught_by_iqr_but_not_zscore() {
    // [1..5, 100]: 100 sits far beyond Q3 + 1.5*IQR, yet the spike inflates
    // the standard deviation enough that no |z| exceeds 3.
    let data = single_variable_dataset(&[1.0, 2.0, 3.0, 4.0, 5.0, 100.0]);
    let result = run(StrategyKind::Union, &data);

    let iqr = method(&result, MethodKind::Iqr);
    assert!(iqr.success());
    assert_eq!(iqr.flags.len(), 1);
    assert_eq!(iqr.flags[0].subject_id, "S005");

    let zscore = method(&result, MethodKind::ZScore);
    assert!(zscore.success());
    assert!(zscore.flags.is_empty());

    assert_eq!(result.final_outliers, vec!["S005".to_string()]);
    assert_eq!(result.outliers_detected, 1);
    assert_eq!(result.normal_data, 5);
    assert_eq!(result.total_records, 6);
    assert!(!result.high_outlier_warning);
}

#[test]
fn zero_variance_column_fails_zscore_and_mad_without_crashing() {
    let data = single_variable_dataset(&[5.0, 5.0, 5.0, 5.0, 5.0]);
    let result = run(StrategyKind::Union, &data);

    let zscore = method(&result, MethodKind::ZScore);
    assert!(!zscore.success());
    assert!(zscore.flags.is_empty());

    let mad = method(&result, MethodKind::Mad);
    assert!(!mad.success());
    assert!(mad.flags.is_empty());

    assert!(result.final_outliers.is_empty());
    assert_eq!(result.normal_data, result.total_records);
    assert!(!result.diagnostics.notes.is_empty());
}

#[test]
fn intersection_short_circuits_when_a_hypothesis_test_cannot_run() {
    // The second variable has only two non-missing values, below Dixon's
    // tabulated range: the all-methods requirement is unsatisfiable even
    // though IQR clearly flags the extreme record on the first variable.
    let mut sparse: Vec<Option<f64>> = vec![Some(1.0), Some(2.0)];
    sparse.extend(std::iter::repeat(None).take(4));
    let data = Dataset::new(vec![
        Column::categorical("subject", VariableKind::NominalCategorical, subject_ids(6))
            .expect("id column"),
        Column::numeric(
            "x",
            VariableKind::ContinuousQuantitative,
            [1.0, 2.0, 3.0, 4.0, 5.0, 100.0]
                .iter()
                .map(|v| Some(*v))
                .collect(),
        )
        .expect("x column"),
        Column::numeric("y", VariableKind::ContinuousQuantitative, sparse).expect("y column"),
    ])
    .expect("dataset");

    let result = run(StrategyKind::Intersection, &data);

    let dixon = method(&result, MethodKind::Dixon);
    assert!(!dixon.success());

    let iqr = method(&result, MethodKind::Iqr);
    assert!(iqr.flagged_ids().contains("S005"));

    assert!(result.final_outliers.is_empty());
    assert_eq!(result.normal_data, result.total_records);
}

#[test]
fn out_of_range_threshold_fails_before_any_detector_runs() {
    let mut config = ConsensusConfig::new(StrategyKind::Voting, "subject");
    config.min_univariate = 15;
    let err = ConsensusEngine::new(config).expect_err("validation must fail");
    assert!(matches!(err, OceError::InvalidInput(_)));
    assert!(err.to_string().contains("1..=10"));
}

#[test]
fn missing_id_column_is_rejected_before_detection() {
    let data = single_variable_dataset(&[1.0, 2.0, 3.0, 4.0]);
    let bad = ConsensusEngine::new(ConsensusConfig::new(StrategyKind::Union, "id"))
        .expect("engine builds; the column check happens at run time");
    let err = bad
        .run(&data, &ExecutionContext::new())
        .expect_err("unknown id column must fail fast");
    assert!(err.to_string().contains("not found"));
}

#[test]
fn union_flags_a_joint_outlier_across_methods() {
    // 5x5 grid plus one far point: univariate and multivariate methods all
    // see it, and union reports it exactly once.
    let mut xs: Vec<f64> = (0..25).map(|i| (i % 5) as f64).collect();
    let mut ys: Vec<f64> = (0..25).map(|i| (i / 5) as f64).collect();
    xs.push(100.0);
    ys.push(100.0);
    let data = Dataset::new(vec![
        Column::categorical("subject", VariableKind::NominalCategorical, subject_ids(26))
            .expect("id column"),
        Column::numeric(
            "x",
            VariableKind::ContinuousQuantitative,
            xs.iter().map(|v| Some(*v)).collect(),
        )
        .expect("x column"),
        Column::numeric(
            "y",
            VariableKind::ContinuousQuantitative,
            ys.iter().map(|v| Some(*v)).collect(),
        )
        .expect("y column"),
    ])
    .expect("dataset");

    let result = run(StrategyKind::Union, &data);

    assert!(result.final_outliers.contains(&"S025".to_string()));
    let lof = method(&result, MethodKind::Lof);
    assert!(lof.flagged_ids().contains("S025"));
    assert_eq!(
        result.outliers_detected + result.normal_data,
        result.total_records
    );
    assert!(!result.high_outlier_warning);
}

#[test]
fn high_outlier_percentage_raises_the_warning() {
    // MAD flags 2 of 5 records: 40% is past the 20% warning cutoff.
    let data = single_variable_dataset(&[1.0, 2.0, 3.0, 100.0, 200.0]);
    let result = run(StrategyKind::Union, &data);

    assert!(result.outlier_percentage > 20.0);
    assert!(result.high_outlier_warning);
    assert!(!result.diagnostics.warnings.is_empty());
}

#[test]
fn adaptive_run_reports_normality_and_a_description() {
    let spread: Vec<f64> = (0..40)
        .map(|i| {
            let u = (i as f64 + 0.5) / 40.0;
            // Roughly normal scores, so the assessment accepts the variable.
            oce_core::dist::norm_quantile(u).expect("quantile")
        })
        .collect();
    let doubled: Vec<f64> = spread.iter().map(|v| 2.0 * v + 1.0).collect();
    let data = Dataset::new(vec![
        Column::categorical("subject", VariableKind::NominalCategorical, subject_ids(40))
            .expect("id column"),
        Column::numeric(
            "a",
            VariableKind::ContinuousQuantitative,
            spread.iter().map(|v| Some(*v)).collect(),
        )
        .expect("a column"),
        Column::numeric(
            "b",
            VariableKind::ContinuousQuantitative,
            doubled.iter().map(|v| Some(*v)).collect(),
        )
        .expect("b column"),
    ])
    .expect("dataset");

    let result = run(StrategyKind::Adaptive, &data);

    let assessment = result.normality.as_ref().expect("assessment present");
    assert!(assessment.data_is_generally_normal);
    assert!((0.0..=100.0).contains(&assessment.normal_ratio));
    assert!(result
        .strategy_description
        .as_deref()
        .expect("description present")
        .contains("generally normal"));
    assert_eq!(
        result.outliers_detected + result.normal_data,
        result.total_records
    );
}

#[test]
fn non_adaptive_runs_carry_no_normality_payload() {
    let data = single_variable_dataset(&[1.0, 2.0, 3.0, 4.0, 5.0, 100.0]);
    let result = run(StrategyKind::Union, &data);
    assert!(result.normality.is_none());
    assert!(result.strategy_description.is_none());
}

#[test]
fn cancelled_runs_return_no_partial_result() {
    let data = single_variable_dataset(&[1.0, 2.0, 3.0, 4.0, 5.0, 100.0]);
    let cancel = CancelToken::new();
    cancel.cancel();
    let ctx = ExecutionContext::new().with_cancel(&cancel);
    let err = engine(StrategyKind::Union)
        .run(&data, &ctx)
        .expect_err("cancelled run must fail");
    assert!(matches!(err, OceError::Cancelled));
}

#[test]
fn identical_runs_with_a_fixed_seed_are_bit_identical() {
    let mut xs: Vec<f64> = (0..20).map(|i| (i % 5) as f64 * 1.5).collect();
    let mut ys: Vec<f64> = (0..20).map(|i| (i / 5) as f64 - 2.0).collect();
    xs.push(60.0);
    ys.push(60.0);
    let data = Dataset::new(vec![
        Column::categorical("subject", VariableKind::NominalCategorical, subject_ids(21))
            .expect("id column"),
        Column::numeric(
            "x",
            VariableKind::ContinuousQuantitative,
            xs.iter().map(|v| Some(*v)).collect(),
        )
        .expect("x column"),
        Column::numeric(
            "y",
            VariableKind::ContinuousQuantitative,
            ys.iter().map(|v| Some(*v)).collect(),
        )
        .expect("y column"),
    ])
    .expect("dataset");

    let first = run(StrategyKind::Union, &data);
    let second = run(StrategyKind::Union, &data);
    assert_eq!(first.final_outliers, second.final_outliers);
    assert_eq!(first.methods, second.methods);
}

#[cfg(feature = "serde")]
#[test]
fn combined_result_serializes_with_the_full_method_breakdown() {
    let data = single_variable_dataset(&[1.0, 2.0, 3.0, 4.0, 5.0, 100.0]);
    let result = run(StrategyKind::Union, &data);
    let encoded = serde_json::to_string(&result).expect("serialize");
    assert!(encoded.contains("\"final_outliers\""));
    assert!(encoded.contains("\"hypothesis_tests\""));
    let decoded: CombinedResult = serde_json::from_str(&encoded).expect("deserialize");
    assert_eq!(decoded.final_outliers, result.final_outliers);
}
