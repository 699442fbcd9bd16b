//! Per-sample scoring.
//!
//! Runs the field matcher over every configured field of one
//! ground-truth/prediction pair and folds the included fields into a
//! weighted aggregate. A field that fails to compare is excluded with a
//! note; it never invalidates the rest of the sample.

use crate::config::{FieldSpec, FieldTable};
use crate::matcher::{
    ErrorKind, FieldMatcher, Genes, MatchError, MatchTier, ParseIssue, Presence, Side,
};
use crate::record::{AnnotationField, AnnotationRecord, EvalPair};
use serde::{Deserialize, Serialize};

/// Score of one field within one sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldScore {
    pub field: AnnotationField,
    /// Score in [0, 1]; meaningful only when `included`
    pub score: f64,
    pub weight: f64,
    pub included: bool,
    pub presence: Presence,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<MatchTier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    /// Why the field was excluded, when it failed to compare
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// A parse or comparison problem, attributed to its sample and field
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParseDiagnostic {
    pub article_id: String,
    pub field: AnnotationField,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub side: Option<Side>,
    pub raw: String,
    pub error: String,
}

/// Full result for one evaluated pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleScore {
    pub article_id: String,
    /// Weighted mean over included fields; `None` when nothing was comparable
    pub aggregate: Option<f64>,
    /// Unweighted mean over included fields
    pub mean_score: Option<f64>,
    pub field_scores: Vec<FieldScore>,
    #[serde(default)]
    pub diagnostics: Vec<ParseDiagnostic>,
}

impl SampleScore {
    /// Score of one field, if configured
    #[must_use]
    pub fn field(&self, field: AnnotationField) -> Option<&FieldScore> {
        self.field_scores.iter().find(|s| s.field == field)
    }

    /// Number of fields that entered the aggregate
    #[must_use]
    pub fn included_count(&self) -> usize {
        self.field_scores.iter().filter(|s| s.included).count()
    }

    /// Included fields scoring strictly below `threshold`
    #[must_use]
    pub fn fields_below(&self, threshold: f64) -> Vec<AnnotationField> {
        self.field_scores
            .iter()
            .filter(|s| s.included && s.score < threshold)
            .map(|s| s.field)
            .collect()
    }
}

/// Scores annotation pairs against a fixed field table
#[derive(Debug, Clone)]
pub struct SampleScorer {
    table: FieldTable,
    matcher: FieldMatcher,
}

impl Default for SampleScorer {
    fn default() -> Self {
        Self::new(FieldTable::default())
    }
}

impl SampleScorer {
    /// Scorer with the default matcher for the table's settings
    #[must_use]
    pub fn new(table: FieldTable) -> Self {
        let matcher = FieldMatcher::new(table.settings());
        Self { table, matcher }
    }

    /// Replace the field matcher
    #[must_use]
    pub fn with_matcher(mut self, matcher: FieldMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    /// Field table in use
    #[must_use]
    pub const fn table(&self) -> &FieldTable {
        &self.table
    }

    #[must_use]
    pub const fn matcher(&self) -> &FieldMatcher {
        &self.matcher
    }

    /// Score a joined pair
    #[must_use]
    pub fn score_pair(&self, pair: &EvalPair) -> SampleScore {
        self.score_sample(&pair.article_id, &pair.ground_truth, &pair.prediction)
    }

    /// Score one ground-truth/prediction pair over every configured field
    #[must_use]
    pub fn score_sample(
        &self,
        article_id: &str,
        ground_truth: &AnnotationRecord,
        prediction: &AnnotationRecord,
    ) -> SampleScore {
        let gt_gene = ground_truth.gene.as_text();
        let pred_gene = prediction.gene.as_text();
        let genes = Genes {
            ground_truth: gt_gene.as_deref(),
            prediction: pred_gene.as_deref(),
        };

        let mut field_scores = Vec::with_capacity(self.table.len());
        let mut diagnostics = Vec::new();

        for spec in &self.table {
            let gt = ground_truth.get(spec.field);
            let pred = prediction.get(spec.field);

            let field_score = match self.matcher.score(spec, gt, pred, genes) {
                Ok(outcome) => {
                    diagnostics.extend(
                        outcome
                            .issues
                            .into_iter()
                            .map(|issue| diagnostic(article_id, spec.field, issue)),
                    );
                    FieldScore {
                        field: spec.field,
                        score: outcome.score,
                        weight: spec.weight,
                        included: outcome.included,
                        presence: outcome.presence,
                        tier: outcome.tier,
                        similarity: outcome.similarity,
                        error_kind: outcome.error_kind,
                        note: None,
                    }
                }
                Err(err) => {
                    tracing::debug!(article_id, field = %spec.field, error = %err, "field excluded");
                    diagnostics.extend(error_diagnostics(article_id, spec, &err, gt.raw(), pred.raw()));
                    FieldScore {
                        field: spec.field,
                        score: 0.0,
                        weight: spec.weight,
                        included: false,
                        presence: Presence::of(gt, pred),
                        tier: None,
                        similarity: None,
                        error_kind: None,
                        note: Some(err.to_string()),
                    }
                }
            };
            field_scores.push(field_score);
        }

        let (aggregate, mean_score) = aggregate(&field_scores);
        if aggregate.is_none() {
            tracing::debug!(article_id, "no comparable fields");
        }

        SampleScore {
            article_id: article_id.to_string(),
            aggregate,
            mean_score,
            field_scores,
            diagnostics,
        }
    }
}

/// Weighted and unweighted means over included fields
#[allow(clippy::cast_precision_loss)]
fn aggregate(scores: &[FieldScore]) -> (Option<f64>, Option<f64>) {
    let included: Vec<&FieldScore> = scores.iter().filter(|s| s.included).collect();
    if included.is_empty() {
        return (None, None);
    }

    let weight_sum: f64 = included.iter().map(|s| s.weight).sum();
    let weighted: f64 = included.iter().map(|s| s.weight * s.score).sum();
    let mean = included.iter().map(|s| s.score).sum::<f64>() / included.len() as f64;

    let aggregate = (weight_sum > 0.0).then(|| (weighted / weight_sum).clamp(0.0, 1.0));
    (aggregate, Some(mean.clamp(0.0, 1.0)))
}

fn diagnostic(article_id: &str, field: AnnotationField, issue: ParseIssue) -> ParseDiagnostic {
    ParseDiagnostic {
        article_id: article_id.to_string(),
        field,
        side: Some(issue.side),
        raw: issue.raw,
        error: issue.error,
    }
}

fn error_diagnostics(
    article_id: &str,
    spec: &FieldSpec,
    err: &MatchError,
    gt_raw: String,
    pred_raw: String,
) -> Vec<ParseDiagnostic> {
    let make = |side, raw| ParseDiagnostic {
        article_id: article_id.to_string(),
        field: spec.field,
        side: Some(side),
        raw,
        error: err.to_string(),
    };
    match err {
        MatchError::InvalidValue { side, raw } => vec![make(*side, raw.clone())],
        MatchError::NoComparableTokens => vec![
            make(Side::GroundTruth, gt_raw),
            make(Side::Prediction, pred_raw),
        ],
    }
}
