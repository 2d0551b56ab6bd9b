// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::config::{ConsensusConfig, StrategyKind};
use crate::strategy;
use oce_core::{
    Dataset, DetectionRequest, DetectionResult, Diagnostics, ExecutionContext, MethodFamily,
    OceError, OutlierDetector,
};
use oce_hypothesis::{DixonDetector, GrubbsConfig, GrubbsDetector, RosnerConfig, RosnerDetector};
use oce_multivariate::{
    IsolationForestConfig, IsolationForestDetector, LofConfig, LofDetector, MahalanobisConfig,
    MahalanobisDetector,
};
use oce_normality::{assess_normality, NormalityAssessment};
use oce_univariate::{IqrConfig, IqrDetector, MadConfig, MadDetector, ZScoreConfig, ZScoreDetector};
use std::time::Instant;

/// Final outlier percentage above which the run carries a data-quality
/// warning.
pub const HIGH_OUTLIER_WARNING_PERCENT: f64 = 20.0;

/// Per-family method results, in the fixed reporting order.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct MethodBreakdown {
    pub univariate: Vec<DetectionResult>,
    pub multivariate: Vec<DetectionResult>,
    pub hypothesis_tests: Vec<DetectionResult>,
}

impl MethodBreakdown {
    fn from_results(results: Vec<DetectionResult>) -> Self {
        let mut univariate = Vec::new();
        let mut multivariate = Vec::new();
        let mut hypothesis_tests = Vec::new();
        for result in results {
            match result.method.family() {
                MethodFamily::Univariate => univariate.push(result),
                MethodFamily::Multivariate => multivariate.push(result),
                MethodFamily::HypothesisTest => hypothesis_tests.push(result),
            }
        }
        Self {
            univariate,
            multivariate,
            hypothesis_tests,
        }
    }

    pub fn all(&self) -> impl Iterator<Item = &DetectionResult> {
        self.univariate
            .iter()
            .chain(&self.multivariate)
            .chain(&self.hypothesis_tests)
    }
}

/// Complete outcome of one consensus run.
///
/// Every record ends up in exactly one of {final outliers, normals}:
/// `outliers_detected + normal_data == total_records`.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct CombinedResult {
    pub total_records: usize,
    pub outliers_detected: usize,
    pub normal_data: usize,
    pub outlier_percentage: f64,
    /// Final outlier subject ids, sorted.
    pub final_outliers: Vec<String>,
    pub strategy: StrategyKind,
    /// Human-readable explanation of which adaptive branch applied.
    pub strategy_description: Option<String>,
    /// Present when the strategy is adaptive.
    pub normality: Option<NormalityAssessment>,
    pub methods: MethodBreakdown,
    pub high_outlier_warning: bool,
    pub diagnostics: Diagnostics,
}

/// Runs the nine detectors over a dataset and combines their verdicts.
///
/// Stateless between runs: each `run` call reads the dataset, produces a
/// fresh [`CombinedResult`] and leaves nothing behind.
#[derive(Clone, Debug)]
pub struct ConsensusEngine {
    config: ConsensusConfig,
}

type BoxedDetector = Box<dyn OutlierDetector + Send + Sync>;

impl ConsensusEngine {
    pub fn new(config: ConsensusConfig) -> Result<Self, OceError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ConsensusConfig {
        &self.config
    }

    fn detectors(&self) -> Result<Vec<BoxedDetector>, OceError> {
        Ok(vec![
            Box::new(IqrDetector::new(IqrConfig::default())?),
            Box::new(ZScoreDetector::new(ZScoreConfig::default())?),
            Box::new(MadDetector::new(MadConfig::default())?),
            Box::new(MahalanobisDetector::new(MahalanobisConfig::default())?),
            Box::new(LofDetector::new(LofConfig::default())?),
            Box::new(IsolationForestDetector::new(IsolationForestConfig {
                seed: self.config.seed,
                ..IsolationForestConfig::default()
            })?),
            Box::new(GrubbsDetector::new(GrubbsConfig::default())?),
            Box::new(DixonDetector::new()),
            Box::new(RosnerDetector::new(RosnerConfig {
                max_outliers: self.config.rosner_max_outliers,
                ..RosnerConfig::default()
            })?),
        ])
    }

    #[cfg(feature = "rayon")]
    fn run_detectors(
        &self,
        data: &Dataset,
        request: &DetectionRequest,
        ctx: &ExecutionContext<'_>,
    ) -> Result<Vec<DetectionResult>, OceError> {
        use rayon::prelude::*;
        // Indexed parallel iteration keeps the merge order fixed, so
        // parallelism never changes the result.
        self.detectors()?
            .par_iter()
            .map(|detector| detector.detect(data, request, ctx))
            .collect()
    }

    #[cfg(not(feature = "rayon"))]
    fn run_detectors(
        &self,
        data: &Dataset,
        request: &DetectionRequest,
        ctx: &ExecutionContext<'_>,
    ) -> Result<Vec<DetectionResult>, OceError> {
        self.detectors()?
            .iter()
            .map(|detector| detector.detect(data, request, ctx))
            .collect()
    }

    fn describe_adaptive(assessment: &NormalityAssessment) -> String {
        if assessment.data_is_generally_normal {
            format!(
                "data generally normal ({:.1}% of evaluated variables): parametric \
                 agreement accepted alongside non-parametric consensus",
                assessment.normal_ratio
            )
        } else {
            format!(
                "data not generally normal ({:.1}% of evaluated variables): \
                 non-parametric consensus, parametric flags only where the \
                 affected variables individually tested normal",
                assessment.normal_ratio
            )
        }
    }

    /// Runs the full pipeline. A cancelled run returns
    /// `Err(OceError::Cancelled)`, never a partial result.
    pub fn run(
        &self,
        data: &Dataset,
        ctx: &ExecutionContext<'_>,
    ) -> Result<CombinedResult, OceError> {
        let started = Instant::now();
        self.config.validate()?;
        ctx.check_cancelled()?;

        // Fail fast on the id column before any detector executes.
        data.subject_ids(&self.config.id_column)?;

        let variables = data.quantitative_variables(&self.config.id_column);
        if variables.is_empty() {
            return Err(OceError::invalid_input(
                "dataset has no quantitative variables to evaluate",
            ));
        }

        let normality = if self.config.strategy == StrategyKind::Adaptive {
            Some(assess_normality(data, &variables, ctx)?)
        } else {
            None
        };

        let request = DetectionRequest {
            id_column: self.config.id_column.clone(),
            variables: variables.clone(),
        };
        let results = self.run_detectors(data, &request, ctx)?;
        ctx.check_cancelled()?;
        ctx.report_progress(1.0);

        let final_set = strategy::combine(
            self.config.strategy,
            &results,
            self.config.min_univariate,
            self.config.min_multivariate,
            normality.as_ref(),
        );
        let final_outliers: Vec<String> = final_set.into_iter().collect();

        let total_records = data.n_records();
        let outliers_detected = final_outliers.len();
        let outlier_percentage = 100.0 * outliers_detected as f64 / total_records as f64;
        let high_outlier_warning = outlier_percentage > HIGH_OUTLIER_WARNING_PERCENT;

        let mut diagnostics = Diagnostics {
            n_records: total_records,
            n_variables_evaluated: variables.len(),
            runtime_ms: Some(u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)),
            seed: Some(self.config.seed),
            ..Diagnostics::default()
        };
        for result in &results {
            if !result.success() {
                diagnostics.notes.push(format!(
                    "{} recorded {} failure(s) and contributed no flags for the affected runs",
                    result.method.name(),
                    result.failures.len()
                ));
            }
        }
        if high_outlier_warning {
            diagnostics.warnings.push(format!(
                "{outlier_percentage:.1}% of records flagged as outliers"
            ));
        }

        let strategy_description = normality.as_ref().map(Self::describe_adaptive);

        Ok(CombinedResult {
            total_records,
            outliers_detected,
            normal_data: total_records - outliers_detected,
            outlier_percentage,
            final_outliers,
            strategy: self.config.strategy,
            strategy_description,
            normality,
            methods: MethodBreakdown::from_results(results),
            high_outlier_warning,
            diagnostics,
        })
    }
}
