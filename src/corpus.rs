//! Corpus-level aggregation of sample scores.
//!
//! [`CorpusAccumulator`] is a commutative monoid: workers each fold their
//! share of samples into an accumulator, the partial accumulators are
//! merged in any order, and [`CorpusAccumulator::finish`] sorts everything
//! it collected so the resulting [`CorpusReport`] does not depend on
//! scheduling.

#![allow(clippy::missing_const_for_fn)]

use crate::config::{ComparisonStrategy, FieldTable};
use crate::matcher::{ErrorKind, MatchTier, Presence};
use crate::metrics::{bootstrap_ci, StatConfig};
use crate::record::AnnotationField;
use crate::sample::{ParseDiagnostic, SampleScore};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Aggregate below which a sample is listed as difficult
pub const DIFFICULT_THRESHOLD: f64 = 0.5;
/// Field score below which a field is named in a difficult sample
pub const WEAK_FIELD_THRESHOLD: f64 = 0.3;
/// Number of difficult samples kept in the report
pub const MAX_DIFFICULT_SAMPLES: usize = 10;

/// A pair that could not be scored at all
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SkippedSample {
    /// Where the pair came from (`file:line`)
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub article_id: Option<String>,
    pub reason: String,
}

/// Fuzzy-set tier counts for one field
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierCounts {
    pub exact: usize,
    pub partial: usize,
    pub none: usize,
}

impl TierCounts {
    fn record(&mut self, tier: MatchTier) {
        match tier {
            MatchTier::Exact => self.exact += 1,
            MatchTier::Partial => self.partial += 1,
            MatchTier::None => self.none += 1,
        }
    }

    fn merge(&mut self, other: Self) {
        self.exact += other.exact;
        self.partial += other.partial;
        self.none += other.none;
    }
}

/// Aggregate bucket counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreDistribution {
    /// aggregate >= 0.9
    pub excellent: usize,
    /// 0.7 <= aggregate < 0.9
    pub good: usize,
    /// 0.5 <= aggregate < 0.7
    pub fair: usize,
    /// aggregate < 0.5
    pub poor: usize,
}

impl ScoreDistribution {
    fn record(&mut self, aggregate: f64) {
        if aggregate >= 0.9 {
            self.excellent += 1;
        } else if aggregate >= 0.7 {
            self.good += 1;
        } else if aggregate >= 0.5 {
            self.fair += 1;
        } else {
            self.poor += 1;
        }
    }
}

/// Per-field statistics across the batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSummary {
    pub field: AnnotationField,
    pub strategy: ComparisonStrategy,
    pub weight: f64,
    /// Samples where the field entered the aggregate
    pub evaluated: usize,
    /// Samples where the field was excluded (both missing or failed to compare)
    pub excluded: usize,
    /// Mean score over evaluated samples; `None` if never evaluated
    pub mean_score: Option<f64>,
    /// Evaluated samples scoring below the mismatch threshold
    pub mismatches: usize,
    /// Evaluated samples scoring 1.0
    pub exact_matches: usize,
    /// `exact_matches / evaluated`; `None` if never evaluated
    pub exact_match_rate: Option<f64>,
    /// Why evaluated samples fell short of 1.0
    #[serde(default)]
    pub error_kinds: BTreeMap<ErrorKind, usize>,
    /// Ground truth present, prediction missing
    pub ground_truth_only: usize,
    /// Ground truth missing, prediction present
    pub prediction_only: usize,
    /// Fields excluded because comparison failed
    pub errors: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tiers: Option<TierCounts>,
}

impl FieldSummary {
    /// Share of evaluated samples that were mismatches
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn mismatch_rate(&self) -> Option<f64> {
        (self.evaluated > 0).then(|| self.mismatches as f64 / self.evaluated as f64)
    }
}

/// Low-scoring sample listed for manual review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifficultSample {
    pub article_id: String,
    pub aggregate: f64,
    /// Included fields scoring below the weak-field threshold
    pub weak_fields: Vec<AnnotationField>,
}

/// Summary of one evaluation batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusReport {
    /// Pairs seen, including skipped ones
    pub total_samples: usize,
    /// Pairs with a defined aggregate
    pub scored_samples: usize,
    /// Pairs scored but with nothing comparable
    pub unscorable_samples: usize,
    pub mismatch_threshold: f64,
    /// Mean of sample aggregates
    pub mean_aggregate: Option<f64>,
    /// Percentile-bootstrap interval for `mean_aggregate`
    pub aggregate_ci: Option<(f64, f64)>,
    /// Lowest and highest sample aggregate
    pub min_aggregate: Option<f64>,
    pub max_aggregate: Option<f64>,
    /// Mean of unweighted sample means
    pub mean_score: Option<f64>,
    pub score_distribution: ScoreDistribution,
    pub fields: Vec<FieldSummary>,
    pub difficult_samples: Vec<DifficultSample>,
    pub diagnostics: Vec<ParseDiagnostic>,
    pub skipped_samples: Vec<SkippedSample>,
}

impl CorpusReport {
    /// Summary for one field
    #[must_use]
    pub fn field(&self, field: AnnotationField) -> Option<&FieldSummary> {
        self.fields.iter().find(|f| f.field == field)
    }
}

#[derive(Debug, Clone)]
struct FieldAccumulator {
    strategy: ComparisonStrategy,
    weight: f64,
    scores: Vec<f64>,
    excluded: usize,
    mismatches: usize,
    exact_matches: usize,
    error_kinds: BTreeMap<ErrorKind, usize>,
    ground_truth_only: usize,
    prediction_only: usize,
    errors: usize,
    tiers: TierCounts,
}

impl FieldAccumulator {
    fn new(strategy: ComparisonStrategy, weight: f64) -> Self {
        Self {
            strategy,
            weight,
            scores: Vec::new(),
            excluded: 0,
            mismatches: 0,
            exact_matches: 0,
            error_kinds: BTreeMap::new(),
            ground_truth_only: 0,
            prediction_only: 0,
            errors: 0,
            tiers: TierCounts::default(),
        }
    }

    fn merge(&mut self, other: Self) {
        self.scores.extend(other.scores);
        self.excluded += other.excluded;
        self.mismatches += other.mismatches;
        self.exact_matches += other.exact_matches;
        for (kind, count) in other.error_kinds {
            *self.error_kinds.entry(kind).or_default() += count;
        }
        self.ground_truth_only += other.ground_truth_only;
        self.prediction_only += other.prediction_only;
        self.errors += other.errors;
        self.tiers.merge(other.tiers);
    }

    #[allow(clippy::cast_precision_loss)]
    fn finish(mut self, field: AnnotationField) -> FieldSummary {
        self.scores.sort_by(f64::total_cmp);
        let evaluated = self.scores.len();
        FieldSummary {
            field,
            strategy: self.strategy,
            weight: self.weight,
            evaluated,
            excluded: self.excluded,
            mean_score: mean(&self.scores),
            mismatches: self.mismatches,
            exact_matches: self.exact_matches,
            exact_match_rate: (evaluated > 0)
                .then(|| self.exact_matches as f64 / evaluated as f64),
            error_kinds: self.error_kinds,
            ground_truth_only: self.ground_truth_only,
            prediction_only: self.prediction_only,
            errors: self.errors,
            tiers: (self.strategy == ComparisonStrategy::FuzzySet).then_some(self.tiers),
        }
    }
}

/// Mergeable running state of a corpus aggregation
#[derive(Debug, Clone)]
pub struct CorpusAccumulator {
    order: Vec<AnnotationField>,
    threshold: f64,
    fields: BTreeMap<AnnotationField, FieldAccumulator>,
    aggregates: Vec<f64>,
    means: Vec<f64>,
    unscorable: usize,
    difficult: Vec<DifficultSample>,
    diagnostics: Vec<ParseDiagnostic>,
    skipped: Vec<SkippedSample>,
}

impl CorpusAccumulator {
    /// Empty accumulator for a field table
    #[must_use]
    pub fn new(table: &FieldTable) -> Self {
        Self {
            order: table.iter().map(|s| s.field).collect(),
            threshold: table.settings().mismatch_threshold,
            fields: table
                .iter()
                .map(|s| (s.field, FieldAccumulator::new(s.strategy, s.weight)))
                .collect(),
            aggregates: Vec::new(),
            means: Vec::new(),
            unscorable: 0,
            difficult: Vec::new(),
            diagnostics: Vec::new(),
            skipped: Vec::new(),
        }
    }

    /// Fold in one sample
    pub fn add(&mut self, sample: SampleScore) {
        for score in &sample.field_scores {
            let Some(acc) = self.fields.get_mut(&score.field) else {
                tracing::warn!(field = %score.field, "sample carries a field outside the table");
                continue;
            };
            match score.presence {
                Presence::GroundTruthOnly => acc.ground_truth_only += 1,
                Presence::PredictionOnly => acc.prediction_only += 1,
                Presence::Both | Presence::Neither => {}
            }
            if score.note.is_some() {
                acc.errors += 1;
            }
            if !score.included {
                acc.excluded += 1;
                continue;
            }
            acc.scores.push(score.score);
            if score.score < self.threshold {
                acc.mismatches += 1;
            }
            if score.score >= 1.0 {
                acc.exact_matches += 1;
            }
            if let Some(kind) = score.error_kind {
                *acc.error_kinds.entry(kind).or_default() += 1;
            }
            if let Some(tier) = score.tier {
                acc.tiers.record(tier);
            }
        }

        match sample.aggregate {
            Some(aggregate) => {
                self.aggregates.push(aggregate);
                if aggregate < DIFFICULT_THRESHOLD {
                    self.difficult.push(DifficultSample {
                        article_id: sample.article_id.clone(),
                        aggregate,
                        weak_fields: sample.fields_below(WEAK_FIELD_THRESHOLD),
                    });
                }
            }
            None => self.unscorable += 1,
        }
        if let Some(mean) = sample.mean_score {
            self.means.push(mean);
        }
        self.diagnostics.extend(sample.diagnostics);
    }

    /// Record a pair that never reached the scorer
    pub fn skip(&mut self, skipped: SkippedSample) {
        self.skipped.push(skipped);
    }

    /// Combine two partial accumulations
    #[must_use]
    pub fn merge(mut self, other: Self) -> Self {
        for (field, acc) in other.fields {
            match self.fields.get_mut(&field) {
                Some(mine) => mine.merge(acc),
                None => {
                    self.order.push(field);
                    self.fields.insert(field, acc);
                }
            }
        }
        self.aggregates.extend(other.aggregates);
        self.means.extend(other.means);
        self.unscorable += other.unscorable;
        self.difficult.extend(other.difficult);
        self.diagnostics.extend(other.diagnostics);
        self.skipped.extend(other.skipped);
        self
    }

    /// Number of samples folded in so far (scored or not)
    #[must_use]
    pub fn samples_seen(&self) -> usize {
        self.aggregates.len() + self.unscorable + self.skipped.len()
    }

    /// Produce the final report
    #[must_use]
    pub fn finish(mut self, stats: &StatConfig) -> CorpusReport {
        self.aggregates.sort_by(f64::total_cmp);
        self.means.sort_by(f64::total_cmp);
        self.diagnostics.sort();
        self.skipped.sort();
        self.difficult.sort_by(|a, b| {
            a.aggregate
                .total_cmp(&b.aggregate)
                .then_with(|| a.article_id.cmp(&b.article_id))
        });
        self.difficult.truncate(MAX_DIFFICULT_SAMPLES);

        let mut score_distribution = ScoreDistribution::default();
        for aggregate in &self.aggregates {
            score_distribution.record(*aggregate);
        }

        let fields = self
            .order
            .iter()
            .filter_map(|field| {
                self.fields
                    .remove(field)
                    .map(|acc| acc.finish(*field))
            })
            .collect();

        let mean_aggregate = mean(&self.aggregates);
        let aggregate_ci = mean_aggregate.map(|_| bootstrap_ci(&self.aggregates, stats));

        CorpusReport {
            total_samples: self.aggregates.len() + self.unscorable + self.skipped.len(),
            scored_samples: self.aggregates.len(),
            unscorable_samples: self.unscorable,
            mismatch_threshold: self.threshold,
            mean_aggregate,
            aggregate_ci,
            min_aggregate: self.aggregates.first().copied(),
            max_aggregate: self.aggregates.last().copied(),
            mean_score: mean(&self.means),
            score_distribution,
            fields,
            difficult_samples: self.difficult,
            diagnostics: self.diagnostics,
            skipped_samples: self.skipped,
        }
    }
}

/// Aggregate a finished batch of sample scores
#[must_use]
pub fn aggregate(samples: Vec<SampleScore>, table: &FieldTable) -> CorpusReport {
    let mut acc = CorpusAccumulator::new(table);
    for sample in samples {
        acc.add(sample);
    }
    acc.finish(&StatConfig::from(table.settings()))
}

#[allow(clippy::cast_precision_loss)]
fn mean(sorted: &[f64]) -> Option<f64> {
    (!sorted.is_empty()).then(|| sorted.iter().sum::<f64>() / sorted.len() as f64)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::config::{EvalSettings, FieldSpec};
    use crate::record::{AnnotationRecord, FieldValue};
    use crate::sample::SampleScorer;
    use crate::record::AnnotationField as F;

    fn record(values: &[(F, &str)]) -> AnnotationRecord {
        values
            .iter()
            .fold(AnnotationRecord::default(), |r, (f, v)| r.with(*f, FieldValue::text(*v)))
    }

    fn small_table() -> FieldTable {
        FieldTable::new(
            vec![
                FieldSpec::new(F::Significance, ComparisonStrategy::Exact, 1.0),
                FieldSpec::new(F::Alleles, ComparisonStrategy::FuzzySet, 1.0),
            ],
            EvalSettings::default(),
        )
        .unwrap()
    }

    fn samples(table: &FieldTable) -> Vec<SampleScore> {
        let scorer = SampleScorer::new(table.clone());
        vec![
            scorer.score_sample(
                "A",
                &record(&[(F::Significance, "yes"), (F::Alleles, "*1/*2")]),
                &record(&[(F::Significance, "yes"), (F::Alleles, "*2/*1")]),
            ),
            scorer.score_sample(
                "B",
                &record(&[(F::Significance, "yes"), (F::Alleles, "*1/*2")]),
                &record(&[(F::Significance, "no"), (F::Alleles, "*2")]),
            ),
            scorer.score_sample(
                "C",
                &record(&[(F::Alleles, "TT")]),
                &record(&[(F::Significance, "yes")]),
            ),
            scorer.score_sample("D", &AnnotationRecord::default(), &AnnotationRecord::default()),
        ]
    }

    // =========================================================================
    // Field statistics
    // =========================================================================

    #[test]
    fn test_field_means_and_mismatches() {
        let table = small_table();
        let report = aggregate(samples(&table), &table);

        let sig = report.field(F::Significance).unwrap();
        // A: 1.0, B: 0.0, C: 0.0 (prediction only); D excluded
        assert_eq!(sig.evaluated, 3);
        assert_eq!(sig.excluded, 1);
        assert!((sig.mean_score.unwrap() - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(sig.mismatches, 2);
        assert_eq!(sig.prediction_only, 1);
        assert_eq!(sig.ground_truth_only, 0);
        assert!(sig.tiers.is_none());

        let alleles = report.field(F::Alleles).unwrap();
        assert_eq!(alleles.ground_truth_only, 1);
        let tiers = alleles.tiers.unwrap();
        assert_eq!(tiers.exact, 1);
        assert_eq!(tiers.partial, 1);
        assert_eq!(tiers.none, 0);
    }

    #[test]
    fn test_exact_match_rate_and_error_kinds() {
        let table = small_table();
        let report = aggregate(samples(&table), &table);

        let sig = report.field(F::Significance).unwrap();
        assert_eq!(sig.exact_matches, 1);
        assert!((sig.exact_match_rate.unwrap() - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(sig.error_kinds.get(&ErrorKind::ContentMismatch), Some(&1));
        assert_eq!(sig.error_kinds.get(&ErrorKind::UnexpectedPrediction), Some(&1));
        assert_eq!(sig.error_kinds.values().sum::<usize>(), 2);

        // B predicts "*2" for "*1/*2"; C has no prediction
        let alleles = report.field(F::Alleles).unwrap();
        assert_eq!(alleles.error_kinds.get(&ErrorKind::IncompleteExtraction), Some(&1));
        assert_eq!(alleles.error_kinds.get(&ErrorKind::MissingPrediction), Some(&1));
        assert_eq!(alleles.exact_match_rate, Some(1.0 / 3.0));
    }

    #[test]
    fn test_min_max_aggregate() {
        let table = small_table();
        let report = aggregate(samples(&table), &table);
        assert_eq!(report.min_aggregate, Some(0.0));
        assert_eq!(report.max_aggregate, Some(1.0));

        let empty = aggregate(Vec::new(), &table);
        assert_eq!(empty.min_aggregate, None);
        assert_eq!(empty.max_aggregate, None);
    }

    #[test]
    fn test_sample_counts_and_distribution() {
        let table = small_table();
        let report = aggregate(samples(&table), &table);

        assert_eq!(report.total_samples, 4);
        assert_eq!(report.scored_samples, 3);
        assert_eq!(report.unscorable_samples, 1);
        // A = 1.0, B = 0.25, C = 0.0
        assert_eq!(report.score_distribution.excellent, 1);
        assert_eq!(report.score_distribution.poor, 2);
        assert!((report.mean_aggregate.unwrap() - 1.25 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_difficult_samples_sorted() {
        let table = small_table();
        let report = aggregate(samples(&table), &table);

        let ids: Vec<&str> = report
            .difficult_samples
            .iter()
            .map(|d| d.article_id.as_str())
            .collect();
        assert_eq!(ids, vec!["C", "B"]);
        assert_eq!(report.difficult_samples[1].weak_fields, vec![F::Significance]);
    }

    #[test]
    fn test_threshold_controls_mismatch() {
        let table = small_table()
            .with_settings(EvalSettings {
                mismatch_threshold: 0.5,
                ..EvalSettings::default()
            })
            .unwrap();
        let report = aggregate(samples(&table), &table);
        // partial match at 0.5 is no longer a mismatch
        assert_eq!(report.field(F::Alleles).unwrap().mismatches, 1);
    }

    // =========================================================================
    // Merge
    // =========================================================================

    #[test]
    fn test_merge_is_order_independent() {
        let table = small_table();
        let stats = StatConfig::from(table.settings());
        let all = samples(&table);

        let mut left = CorpusAccumulator::new(&table);
        let mut right = CorpusAccumulator::new(&table);
        for (i, s) in all.iter().cloned().enumerate() {
            if i % 2 == 0 {
                left.add(s);
            } else {
                right.add(s);
            }
        }
        right.skip(SkippedSample {
            source: "pairs.jsonl:9".into(),
            article_id: None,
            reason: "not an object".into(),
        });

        let a = left.clone().merge(right.clone()).finish(&stats);
        let b = right.merge(left).finish(&stats);
        assert_eq!(a, b);
        assert_eq!(a.total_samples, 5);
        assert_eq!(a.skipped_samples.len(), 1);
    }

    #[test]
    fn test_empty_batch() {
        let table = small_table();
        let report = aggregate(Vec::new(), &table);
        assert_eq!(report.total_samples, 0);
        assert!(report.mean_aggregate.is_none());
        assert!(report.aggregate_ci.is_none());
        assert_eq!(report.fields.len(), 2);
        assert!(report.fields.iter().all(|f| f.mean_score.is_none()));
    }

    #[test]
    fn test_mismatch_rate() {
        let table = small_table();
        let report = aggregate(samples(&table), &table);
        let rate = report.field(F::Significance).unwrap().mismatch_rate().unwrap();
        assert!((rate - 2.0 / 3.0).abs() < 1e-12);
    }
}
