// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Combination rules. Inputs are the nine terminal method results; the
//! output is the final outlier id set. A detector that could not run
//! contributes nothing under union/voting/adaptive; under intersection it
//! short-circuits the final set to empty, because a failed method can never
//! satisfy an all-methods requirement.

use crate::config::StrategyKind;
use oce_core::{DetectionResult, MethodKind};
use oce_normality::NormalityAssessment;
use std::collections::{BTreeMap, BTreeSet};

const UNIVARIATE: [MethodKind; 3] = [MethodKind::Iqr, MethodKind::ZScore, MethodKind::Mad];
const MULTIVARIATE: [MethodKind; 3] = [
    MethodKind::Mahalanobis,
    MethodKind::Lof,
    MethodKind::IsolationForest,
];
const HYPOTHESIS: [MethodKind; 3] = [MethodKind::Grubbs, MethodKind::Dixon, MethodKind::Rosner];

fn result_for<'a>(
    results: &'a [DetectionResult],
    kind: MethodKind,
) -> Option<&'a DetectionResult> {
    results.iter().find(|r| r.method == kind)
}

fn flagged<'a>(results: &'a [DetectionResult], kind: MethodKind) -> BTreeSet<&'a str> {
    result_for(results, kind).map_or_else(BTreeSet::new, DetectionResult::flagged_ids)
}

fn union_of<'a>(results: &'a [DetectionResult], kinds: &[MethodKind]) -> BTreeSet<&'a str> {
    let mut out = BTreeSet::new();
    for &kind in kinds {
        out.extend(flagged(results, kind));
    }
    out
}

fn vote_counts<'a>(
    results: &'a [DetectionResult],
    kinds: &[MethodKind],
) -> BTreeMap<&'a str, usize> {
    let mut counts = BTreeMap::new();
    for &kind in kinds {
        for id in flagged(results, kind) {
            *counts.entry(id).or_insert(0) += 1;
        }
    }
    counts
}

fn to_owned_set(ids: BTreeSet<&str>) -> BTreeSet<String> {
    ids.into_iter().map(str::to_string).collect()
}

fn union(results: &[DetectionResult]) -> BTreeSet<String> {
    to_owned_set(union_of(results, &MethodKind::all()))
}

fn intersection(results: &[DetectionResult]) -> BTreeSet<String> {
    let all = MethodKind::all();
    if all
        .iter()
        .any(|&kind| !result_for(results, kind).is_some_and(DetectionResult::success))
    {
        return BTreeSet::new();
    }

    let mut kinds = all.iter();
    let Some(&first) = kinds.next() else {
        return BTreeSet::new();
    };
    let mut acc = flagged(results, first);
    for &kind in kinds {
        let next = flagged(results, kind);
        acc = acc.intersection(&next).copied().collect();
        if acc.is_empty() {
            break;
        }
    }
    to_owned_set(acc)
}

fn voting(
    results: &[DetectionResult],
    min_univariate: usize,
    min_multivariate: usize,
) -> BTreeSet<String> {
    let uni = vote_counts(results, &UNIVARIATE);
    let multi = vote_counts(results, &MULTIVARIATE);

    let mut out: BTreeSet<&str> = BTreeSet::new();
    for (id, count) in &uni {
        if *count >= min_univariate && multi.get(id).copied().unwrap_or(0) >= min_multivariate {
            out.insert(*id);
        }
    }
    out.extend(union_of(results, &HYPOTHESIS));
    to_owned_set(out)
}

/// Non-parametric consensus shared by both adaptive branches: hypothesis
/// flags, agreement of IQR and MAD, or any density/ensemble flag.
fn adaptive_nonparametric<'a>(results: &'a [DetectionResult]) -> BTreeSet<&'a str> {
    let mut out = union_of(results, &HYPOTHESIS);
    let iqr = flagged(results, MethodKind::Iqr);
    let mad = flagged(results, MethodKind::Mad);
    out.extend(iqr.intersection(&mad).copied());
    out.extend(flagged(results, MethodKind::Lof));
    out.extend(flagged(results, MethodKind::IsolationForest));
    out
}

fn adaptive(
    results: &[DetectionResult],
    assessment: &NormalityAssessment,
) -> BTreeSet<String> {
    let mut out = adaptive_nonparametric(results);

    let zscore = flagged(results, MethodKind::ZScore);
    let mahalanobis = flagged(results, MethodKind::Mahalanobis);
    if assessment.data_is_generally_normal {
        out.extend(zscore.intersection(&mahalanobis).copied());
    } else {
        // Parametric methods are only trusted where normality held for the
        // variables they actually used: a Z-Score flag needs its own
        // variable to have tested normal, and a Mahalanobis flag needs every
        // variable of the joint run to have tested normal.
        let zscore_validated: BTreeSet<&str> = result_for(results, MethodKind::ZScore)
            .map_or_else(BTreeSet::new, |r| {
                r.flags
                    .iter()
                    .filter(|f| {
                        f.variable
                            .as_deref()
                            .is_some_and(|v| assessment.variable_is_normal(v))
                    })
                    .map(|f| f.subject_id.as_str())
                    .collect()
            });
        let mahalanobis_validated = result_for(results, MethodKind::Mahalanobis)
            .filter(|r| {
                r.evaluated_variables
                    .iter()
                    .all(|v| assessment.variable_is_normal(v))
            })
            .map_or_else(BTreeSet::new, |_| mahalanobis);
        out.extend(zscore_validated.intersection(&mahalanobis_validated).copied());
    }
    to_owned_set(out)
}

/// Applies the configured strategy to the nine method results.
pub(crate) fn combine(
    strategy: StrategyKind,
    results: &[DetectionResult],
    min_univariate: usize,
    min_multivariate: usize,
    normality: Option<&NormalityAssessment>,
) -> BTreeSet<String> {
    match strategy {
        StrategyKind::Union => union(results),
        StrategyKind::Intersection => intersection(results),
        StrategyKind::Voting => voting(results, min_univariate, min_multivariate),
        StrategyKind::Adaptive => match normality {
            Some(assessment) => adaptive(results, assessment),
            // Without an assessment nothing parametric can be validated.
            None => to_owned_set(adaptive_nonparametric(results)),
        },
    }
}
