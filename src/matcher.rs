//! Per-field comparison.
//!
//! The missing-value policy runs first and is identical for every strategy:
//!
//! | Ground truth | Prediction | Outcome                    |
//! |--------------|------------|----------------------------|
//! | missing      | missing    | excluded                   |
//! | present      | missing    | included, score 0.0        |
//! | missing      | present    | included, score 0.0        |
//! | present      | present    | strategy decides the score |
//!
//! Strategies are resolved from [`ComparisonStrategy`] once per field spec.

use crate::config::{ComparisonStrategy, EvalSettings, FieldSpec};
use crate::record::FieldValue;
use crate::variant::{self, ParsedVariant};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Words ignored by the text scorer when stop-word filtering is on
pub const STOP_WORDS: &[&str] = &[
    "is", "are", "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with",
    "by",
];

/// Field comparison errors
///
/// These never abort a sample; the scorer excludes the field and records the
/// message as a diagnostic.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MatchError {
    #[error("{side} value is not comparable: {raw}")]
    InvalidValue { side: Side, raw: String },

    #[error("no variant tokens could be parsed from either value")]
    NoComparableTokens,
}

/// Which record a value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    GroundTruth,
    Prediction,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::GroundTruth => "ground truth",
            Self::Prediction => "prediction",
        })
    }
}

/// Which side carried a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Presence {
    Both,
    GroundTruthOnly,
    PredictionOnly,
    Neither,
}

impl Presence {
    /// Classify a value pair (blank counts as missing)
    #[must_use]
    pub const fn of(ground_truth: &FieldValue, prediction: &FieldValue) -> Self {
        match (ground_truth.is_missing(), prediction.is_missing()) {
            (false, false) => Self::Both,
            (false, true) => Self::GroundTruthOnly,
            (true, false) => Self::PredictionOnly,
            (true, true) => Self::Neither,
        }
    }
}

/// Discrete outcome of a fuzzy-set comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    Exact,
    Partial,
    None,
}

impl MatchTier {
    /// Classify two token sets
    #[must_use]
    pub fn classify(ground_truth: &BTreeSet<String>, prediction: &BTreeSet<String>) -> Self {
        if ground_truth == prediction {
            Self::Exact
        } else if ground_truth.intersection(prediction).next().is_some() {
            Self::Partial
        } else {
            Self::None
        }
    }

    /// Score assigned to the tier
    #[must_use]
    pub const fn score(self) -> f64 {
        match self {
            Self::Exact => 1.0,
            Self::Partial => 0.5,
            Self::None => 0.0,
        }
    }
}

impl fmt::Display for MatchTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Exact => "Exact Match",
            Self::Partial => "Partial Match",
            Self::None => "No Match",
        })
    }
}

/// Why an included field fell short of a perfect score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Ground truth present, prediction missing
    MissingPrediction,
    /// Ground truth missing, prediction present
    UnexpectedPrediction,
    /// Prediction less than half the length of the ground truth
    IncompleteExtraction,
    /// Prediction more than twice the length of the ground truth
    OverExtraction,
    ContentMismatch,
}

impl ErrorKind {
    /// Classify a mismatch between two present values by their lengths
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn classify(ground_truth: &str, prediction: &str) -> Self {
        let expected = ground_truth.trim().chars().count() as f64;
        let predicted = prediction.trim().chars().count() as f64;
        if predicted < expected * 0.5 {
            Self::IncompleteExtraction
        } else if predicted > expected * 2.0 {
            Self::OverExtraction
        } else {
            Self::ContentMismatch
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MissingPrediction => "missing_prediction",
            Self::UnexpectedPrediction => "unexpected_prediction",
            Self::IncompleteExtraction => "incomplete_extraction",
            Self::OverExtraction => "over_extraction",
            Self::ContentMismatch => "content_mismatch",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A token-level problem found while comparing, kept for the corpus report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseIssue {
    pub side: Side,
    pub raw: String,
    pub error: String,
}

/// Result of comparing one field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldOutcome {
    /// Score in [0, 1]; 0.0 when excluded
    pub score: f64,
    pub included: bool,
    pub presence: Presence,
    /// Set only for fuzzy-set comparisons of two present values
    pub tier: Option<MatchTier>,
    /// Continuous similarity where the strategy has one
    pub similarity: Option<f64>,
    /// Set for included fields scoring below 1.0
    pub error_kind: Option<ErrorKind>,
    pub issues: Vec<ParseIssue>,
}

impl FieldOutcome {
    fn excluded(presence: Presence) -> Self {
        Self {
            score: 0.0,
            included: false,
            presence,
            tier: None,
            similarity: None,
            error_kind: None,
            issues: Vec::new(),
        }
    }

    /// Non-finite scores count as 0.0
    fn scored(presence: Presence, score: f64) -> Self {
        let error_kind = match presence {
            Presence::GroundTruthOnly => Some(ErrorKind::MissingPrediction),
            Presence::PredictionOnly => Some(ErrorKind::UnexpectedPrediction),
            Presence::Both | Presence::Neither => None,
        };
        Self {
            score: bounded(score),
            included: true,
            presence,
            tier: None,
            similarity: None,
            error_kind,
            issues: Vec::new(),
        }
    }
}

/// Gene context used to back-fill bare star alleles
#[derive(Debug, Clone, Copy, Default)]
pub struct Genes<'a> {
    pub ground_truth: Option<&'a str>,
    pub prediction: Option<&'a str>,
}

/// Pluggable free-text similarity
///
/// Implementations must return a value in [0, 1] and be symmetric.
pub trait TextSimilarity: Send + Sync {
    /// Similarity of two non-empty texts
    fn similarity(&self, a: &str, b: &str) -> f64;

    /// Short name for reports
    fn name(&self) -> &str;
}

/// Word-set Jaccard similarity
#[derive(Debug, Clone, Copy, Default)]
pub struct JaccardSimilarity {
    /// Drop stop words and tokens of two characters or fewer
    pub drop_stop_words: bool,
}

impl JaccardSimilarity {
    #[must_use]
    pub const fn new(drop_stop_words: bool) -> Self {
        Self { drop_stop_words }
    }

    /// Lowercased word set, split on anything non-alphanumeric
    #[must_use]
    pub fn words(&self, text: &str) -> BTreeSet<String> {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase)
            .filter(|w| !self.drop_stop_words || (w.chars().count() > 2 && !STOP_WORDS.contains(&w.as_str())))
            .collect()
    }
}

impl TextSimilarity for JaccardSimilarity {
    fn similarity(&self, a: &str, b: &str) -> f64 {
        let wa = self.words(a);
        let wb = self.words(b);
        if wa.is_empty() && wb.is_empty() {
            return if normalize_text(a) == normalize_text(b) {
                1.0
            } else {
                0.0
            };
        }
        jaccard(&wa, &wb)
    }

    fn name(&self) -> &str {
        "jaccard"
    }
}

/// `|A ∩ B| / |A ∪ B|`, 0.0 when both are empty
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Trim, collapse internal whitespace, lowercase
#[must_use]
pub fn normalize_text(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Compares field values according to their strategy
#[derive(Clone)]
pub struct FieldMatcher {
    text: Arc<dyn TextSimilarity>,
}

impl fmt::Debug for FieldMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldMatcher")
            .field("text", &self.text.name())
            .finish()
    }
}

impl Default for FieldMatcher {
    fn default() -> Self {
        Self::new(&EvalSettings::default())
    }
}

impl FieldMatcher {
    /// Matcher with the default Jaccard text scorer
    #[must_use]
    pub fn new(settings: &EvalSettings) -> Self {
        Self {
            text: Arc::new(JaccardSimilarity::new(settings.drop_stop_words)),
        }
    }

    /// Swap in another text scorer (e.g. an embedding model)
    #[must_use]
    pub fn with_similarity(mut self, text: impl TextSimilarity + 'static) -> Self {
        self.text = Arc::new(text);
        self
    }

    /// Name of the active text scorer
    #[must_use]
    pub fn similarity_name(&self) -> &str {
        self.text.name()
    }

    /// Compare one value pair
    ///
    /// # Errors
    ///
    /// Returns `MatchError` when a present value cannot be compared at all;
    /// the caller excludes the field.
    pub fn score(
        &self,
        spec: &FieldSpec,
        ground_truth: &FieldValue,
        prediction: &FieldValue,
        genes: Genes<'_>,
    ) -> Result<FieldOutcome, MatchError> {
        let presence = Presence::of(ground_truth, prediction);
        match presence {
            Presence::Neither => return Ok(FieldOutcome::excluded(presence)),
            Presence::GroundTruthOnly | Presence::PredictionOnly => {
                return Ok(FieldOutcome::scored(presence, 0.0));
            }
            Presence::Both => {}
        }

        let gt = comparable(ground_truth, Side::GroundTruth)?;
        let pred = comparable(prediction, Side::Prediction)?;

        let mut outcome = match spec.strategy {
            ComparisonStrategy::Exact => FieldOutcome::scored(
                presence,
                if normalize_text(&gt) == normalize_text(&pred) {
                    1.0
                } else {
                    0.0
                },
            ),
            ComparisonStrategy::FuzzySet => {
                let genes = if spec.backfill_gene {
                    genes
                } else {
                    Genes::default()
                };
                fuzzy_set(&gt, &pred, genes)?
            }
            ComparisonStrategy::SemanticText => {
                let raw = self.text.similarity(&gt, &pred);
                if !raw.is_finite() {
                    tracing::debug!(scorer = self.text.name(), raw, "non-finite text similarity");
                }
                let similarity = bounded(raw);
                let mut outcome = FieldOutcome::scored(presence, similarity);
                outcome.similarity = Some(similarity);
                outcome
            }
        };

        if outcome.score < 1.0 {
            outcome.error_kind = Some(ErrorKind::classify(&gt, &pred));
        }
        Ok(outcome)
    }
}

/// Clamp into [0, 1], mapping NaN and infinities to 0.0
fn bounded(score: f64) -> f64 {
    if score.is_finite() {
        score.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

fn comparable(value: &FieldValue, side: Side) -> Result<String, MatchError> {
    value.as_text().ok_or_else(|| MatchError::InvalidValue {
        side,
        raw: value.raw(),
    })
}

fn fuzzy_set(gt: &str, pred: &str, genes: Genes<'_>) -> Result<FieldOutcome, MatchError> {
    let gt_parsed = variant::parse(gt, genes.ground_truth);
    let pred_parsed = variant::parse(pred, genes.prediction);
    let gt_tokens = gt_parsed.normalized().into_tokens();
    let pred_tokens = pred_parsed.normalized().into_tokens();

    if gt_tokens.is_empty() && pred_tokens.is_empty() {
        return Err(MatchError::NoComparableTokens);
    }

    let mut issues = Vec::new();
    collect_issues(&mut issues, Side::GroundTruth, gt, &gt_parsed);
    collect_issues(&mut issues, Side::Prediction, pred, &pred_parsed);

    let tier = MatchTier::classify(&gt_tokens, &pred_tokens);
    let mut outcome = FieldOutcome::scored(Presence::Both, tier.score());
    outcome.tier = Some(tier);
    outcome.similarity = Some(jaccard(&gt_tokens, &pred_tokens));
    outcome.issues = issues;
    Ok(outcome)
}

fn collect_issues(issues: &mut Vec<ParseIssue>, side: Side, raw: &str, parsed: &ParsedVariant) {
    if parsed.is_unparseable() {
        issues.push(ParseIssue {
            side,
            raw: raw.to_string(),
            error: "no variant tokens could be parsed".to_string(),
        });
        return;
    }
    for rejected in &parsed.rejected {
        issues.push(ParseIssue {
            side,
            raw: raw.to_string(),
            error: format!("dropped token {rejected}"),
        });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::record::AnnotationField;

    fn spec(strategy: ComparisonStrategy) -> FieldSpec {
        FieldSpec::new(AnnotationField::Alleles, strategy, 1.0)
    }

    fn text(s: &str) -> FieldValue {
        FieldValue::text(s)
    }

    fn score(strategy: ComparisonStrategy, gt: &FieldValue, pred: &FieldValue) -> FieldOutcome {
        FieldMatcher::default()
            .score(&spec(strategy), gt, pred, Genes::default())
            .unwrap()
    }

    // =========================================================================
    // Missing-value policy
    // =========================================================================

    #[test]
    fn test_both_missing_excluded() {
        for strategy in [
            ComparisonStrategy::Exact,
            ComparisonStrategy::FuzzySet,
            ComparisonStrategy::SemanticText,
        ] {
            let outcome = score(strategy, &FieldValue::Absent, &FieldValue::Blank);
            assert!(!outcome.included);
            assert_eq!(outcome.presence, Presence::Neither);
        }
    }

    #[test]
    fn test_one_side_missing_scores_zero() {
        let outcome = score(ComparisonStrategy::FuzzySet, &text("TT"), &FieldValue::Absent);
        assert!(outcome.included);
        assert_eq!(outcome.score, 0.0);
        assert_eq!(outcome.presence, Presence::GroundTruthOnly);

        let outcome = score(ComparisonStrategy::Exact, &FieldValue::Blank, &text("yes"));
        assert!(outcome.included);
        assert_eq!(outcome.score, 0.0);
        assert_eq!(outcome.presence, Presence::PredictionOnly);
    }

    #[test]
    fn test_invalid_value_is_error() {
        let err = FieldMatcher::default()
            .score(
                &spec(ComparisonStrategy::Exact),
                &text("yes"),
                &FieldValue::Invalid("{\"a\":1}".into()),
                Genes::default(),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            MatchError::InvalidValue {
                side: Side::Prediction,
                ..
            }
        ));
    }

    // =========================================================================
    // Exact
    // =========================================================================

    #[test]
    fn test_exact_case_and_whitespace() {
        let outcome = score(
            ComparisonStrategy::Exact,
            &text("  Not   stated "),
            &text("not stated"),
        );
        assert_eq!(outcome.score, 1.0);
        assert!(outcome.tier.is_none());
    }

    #[test]
    fn test_exact_mismatch() {
        let outcome = score(ComparisonStrategy::Exact, &text("yes"), &text("no"));
        assert_eq!(outcome.score, 0.0);
        assert!(outcome.included);
    }

    #[test]
    fn test_exact_number_against_text() {
        let outcome = score(ComparisonStrategy::Exact, &FieldValue::Number(2.0), &text("2"));
        assert_eq!(outcome.score, 1.0);
    }

    // =========================================================================
    // Fuzzy set
    // =========================================================================

    #[test]
    fn test_fuzzy_exact_reordered() {
        let outcome = score(ComparisonStrategy::FuzzySet, &text("*1/*2"), &text("*2/*1"));
        assert_eq!(outcome.tier, Some(MatchTier::Exact));
        assert_eq!(outcome.score, 1.0);
        assert_eq!(outcome.similarity, Some(1.0));
    }

    #[test]
    fn test_fuzzy_partial() {
        let outcome = score(
            ComparisonStrategy::FuzzySet,
            &text("rs1, rs2, rs3, rs4"),
            &text("rs1"),
        );
        assert_eq!(outcome.tier, Some(MatchTier::Partial));
        assert_eq!(outcome.score, 0.5);
        assert_eq!(outcome.similarity, Some(0.25));
    }

    #[test]
    fn test_fuzzy_no_match() {
        let outcome = score(ComparisonStrategy::FuzzySet, &text("rs1"), &text("rs2"));
        assert_eq!(outcome.tier, Some(MatchTier::None));
        assert_eq!(outcome.score, 0.0);
    }

    #[test]
    fn test_fuzzy_gene_backfill_per_side() {
        let genes = Genes {
            ground_truth: Some("CYP2C19"),
            prediction: None,
        };
        let outcome = FieldMatcher::default()
            .score(
                &spec(ComparisonStrategy::FuzzySet),
                &text("*2"),
                &text("CYP2C19*2"),
                genes,
            )
            .unwrap();
        assert_eq!(outcome.tier, Some(MatchTier::Exact));
    }

    #[test]
    fn test_fuzzy_backfill_disabled() {
        let genes = Genes {
            ground_truth: Some("CYP2C19"),
            prediction: Some("CYP2C19"),
        };
        let outcome = FieldMatcher::default()
            .score(
                &spec(ComparisonStrategy::FuzzySet).without_backfill(),
                &text("*2"),
                &text("CYP2C19*2"),
                genes,
            )
            .unwrap();
        assert_eq!(outcome.tier, Some(MatchTier::None));
    }

    #[test]
    fn test_fuzzy_both_unparseable_is_error() {
        let err = FieldMatcher::default()
            .score(
                &spec(ComparisonStrategy::FuzzySet),
                &text("???"),
                &text("!!"),
                Genes::default(),
            )
            .unwrap_err();
        assert_eq!(err, MatchError::NoComparableTokens);
    }

    #[test]
    fn test_fuzzy_one_side_unparseable() {
        let outcome = score(ComparisonStrategy::FuzzySet, &text("rs1"), &text("??"));
        assert!(outcome.included);
        assert_eq!(outcome.tier, Some(MatchTier::None));
        assert_eq!(outcome.issues.len(), 1);
        assert_eq!(outcome.issues[0].side, Side::Prediction);
    }

    #[test]
    fn test_fuzzy_dropped_token_reported() {
        let outcome = score(ComparisonStrategy::FuzzySet, &text("rs1, rs1x"), &text("rs1"));
        assert_eq!(outcome.tier, Some(MatchTier::Exact));
        assert_eq!(outcome.issues.len(), 1);
        assert!(outcome.issues[0].error.contains("rs1x"));
    }

    #[test]
    fn test_tier_symmetric() {
        let a = text("CYP2C9*2, CYP2C9*3");
        let b = text("CYP2C9*3");
        let ab = score(ComparisonStrategy::FuzzySet, &a, &b);
        let ba = score(ComparisonStrategy::FuzzySet, &b, &a);
        assert_eq!(ab.tier, ba.tier);
        assert_eq!(ab.score, ba.score);
    }

    // =========================================================================
    // Semantic text
    // =========================================================================

    #[test]
    fn test_semantic_partial_overlap() {
        let outcome = score(
            ComparisonStrategy::SemanticText,
            &text("CYP2C9*2 decreases warfarin clearance"),
            &text("CYP2C9*2 is linked to lower warfarin clearance"),
        );
        assert!(outcome.score > 0.0 && outcome.score < 1.0);
        assert_eq!(outcome.similarity, Some(outcome.score));
    }

    #[test]
    fn test_jaccard_stop_words() {
        let plain = JaccardSimilarity::new(false);
        let filtered = JaccardSimilarity::new(true);
        assert!(plain.words("the drug is ok").contains("the"));
        let words = filtered.words("The drug is OK for CYP2D6 poor metabolizers");
        assert!(!words.contains("the"));
        assert!(!words.contains("ok"));
        assert!(words.contains("cyp2d6"));
        assert!(words.contains("metabolizers"));
    }

    #[test]
    fn test_jaccard_empty_word_sets() {
        let sim = JaccardSimilarity::new(true);
        assert_eq!(sim.similarity("a an", "A  AN"), 1.0);
        assert_eq!(sim.similarity("a an", "to"), 0.0);
    }

    struct Always(f64);

    impl TextSimilarity for Always {
        fn similarity(&self, _a: &str, _b: &str) -> f64 {
            self.0
        }

        fn name(&self) -> &str {
            "always"
        }
    }

    #[test]
    fn test_custom_similarity_is_clamped() {
        let matcher = FieldMatcher::default().with_similarity(Always(1.7));
        assert_eq!(matcher.similarity_name(), "always");
        let outcome = matcher
            .score(
                &spec(ComparisonStrategy::SemanticText),
                &text("a"),
                &text("b"),
                Genes::default(),
            )
            .unwrap();
        assert_eq!(outcome.score, 1.0);
    }

    #[test]
    fn test_non_finite_similarity_scores_zero() {
        for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let outcome = FieldMatcher::default()
                .with_similarity(Always(value))
                .score(
                    &spec(ComparisonStrategy::SemanticText),
                    &text("zero vector"),
                    &text("other zero vector"),
                    Genes::default(),
                )
                .unwrap();
            assert!(outcome.included);
            assert_eq!(outcome.score, 0.0);
            assert_eq!(outcome.similarity, Some(0.0));
        }
    }

    // =========================================================================
    // Error kinds
    // =========================================================================

    #[test]
    fn test_error_kind_missing_sides() {
        let outcome = score(ComparisonStrategy::Exact, &text("yes"), &FieldValue::Absent);
        assert_eq!(outcome.error_kind, Some(ErrorKind::MissingPrediction));
        let outcome = score(ComparisonStrategy::Exact, &FieldValue::Blank, &text("yes"));
        assert_eq!(outcome.error_kind, Some(ErrorKind::UnexpectedPrediction));
        let outcome = score(ComparisonStrategy::Exact, &FieldValue::Absent, &FieldValue::Absent);
        assert_eq!(outcome.error_kind, None);
    }

    #[test]
    fn test_error_kind_by_length() {
        let outcome = score(
            ComparisonStrategy::FuzzySet,
            &text("CYP2C9*2, CYP2C9*3, rs1799853"),
            &text("CYP2C9*2"),
        );
        assert_eq!(outcome.error_kind, Some(ErrorKind::IncompleteExtraction));

        let outcome = score(
            ComparisonStrategy::FuzzySet,
            &text("rs1"),
            &text("rs1, rs2, rs3"),
        );
        assert_eq!(outcome.error_kind, Some(ErrorKind::OverExtraction));

        let outcome = score(ComparisonStrategy::Exact, &text("increased"), &text("decreased"));
        assert_eq!(outcome.error_kind, Some(ErrorKind::ContentMismatch));
    }

    #[test]
    fn test_perfect_score_has_no_error_kind() {
        let outcome = score(ComparisonStrategy::FuzzySet, &text("*1/*2"), &text("*2, *1"));
        assert_eq!(outcome.score, 1.0);
        assert_eq!(outcome.error_kind, None);
    }

    #[test]
    fn test_error_kind_names() {
        assert_eq!(ErrorKind::IncompleteExtraction.to_string(), "incomplete_extraction");
        assert_eq!(
            serde_json::to_string(&ErrorKind::OverExtraction).unwrap(),
            "\"over_extraction\""
        );
    }

    #[test]
    fn test_side_ordering() {
        assert!(Side::GroundTruth < Side::Prediction);
    }

    #[test]
    fn test_tier_display() {
        assert_eq!(MatchTier::Exact.to_string(), "Exact Match");
        assert_eq!(MatchTier::Partial.to_string(), "Partial Match");
        assert_eq!(MatchTier::None.to_string(), "No Match");
    }
}
