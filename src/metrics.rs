//! Contingency counts and summary statistics.
//!
//! Set-based extraction is scored the way classifiers are:
//! - `tp = |G ∩ E|`, `fp = |E \ G|`, `fn = |G \ E|`
//! - `tn = 0` always, since free-form identifier extraction has no negative universe
//! - precision / recall / F1 with every division guarded
//!
//! The seeded percentile bootstrap is used for the corpus-level interval.

use crate::config::EvalSettings;
use crate::variant;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::ops::{Add, AddAssign};

/// Confusion counts for one set comparison
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contingency {
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
    /// Always 0 for set extraction
    pub true_negatives: usize,
}

impl Contingency {
    /// Count agreement between a ground-truth set and an extracted set
    #[must_use]
    pub fn between(ground_truth: &BTreeSet<String>, extracted: &BTreeSet<String>) -> Self {
        let true_positives = ground_truth.intersection(extracted).count();
        Self {
            true_positives,
            false_positives: extracted.len() - true_positives,
            false_negatives: ground_truth.len() - true_positives,
            true_negatives: 0,
        }
    }

    /// Derived precision, recall and F1
    #[must_use]
    pub fn metrics(&self) -> Metrics {
        Metrics::from(*self)
    }

    /// Nothing on either side
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.true_positives == 0 && self.false_positives == 0 && self.false_negatives == 0
    }
}

impl Add for Contingency {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            true_positives: self.true_positives + rhs.true_positives,
            false_positives: self.false_positives + rhs.false_positives,
            false_negatives: self.false_negatives + rhs.false_negatives,
            true_negatives: self.true_negatives + rhs.true_negatives,
        }
    }
}

impl AddAssign for Contingency {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl std::iter::Sum for Contingency {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

/// Count agreement between two token sets
#[must_use]
pub fn contingency(ground_truth: &BTreeSet<String>, extracted: &BTreeSet<String>) -> Contingency {
    Contingency::between(ground_truth, extracted)
}

/// Precision, recall and F1
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

impl From<Contingency> for Metrics {
    #[allow(clippy::cast_precision_loss)]
    fn from(c: Contingency) -> Self {
        let precision = ratio(c.true_positives, c.true_positives + c.false_positives);
        let recall = ratio(c.true_positives, c.true_positives + c.false_negatives);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        Self {
            precision,
            recall,
            f1,
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Normalize two raw variant lists and count agreement
///
/// Each entry may itself hold several variants (`"*1/*2"`); all tokens from
/// all entries form one set per side.
#[must_use]
pub fn evaluate_variant_lists<S: AsRef<str>>(
    ground_truth: &[S],
    extracted: &[S],
    gene: Option<&str>,
) -> Contingency {
    let gt = token_union(ground_truth, gene);
    let ex = token_union(extracted, gene);
    Contingency::between(&gt, &ex)
}

fn token_union<S: AsRef<str>>(raw: &[S], gene: Option<&str>) -> BTreeSet<String> {
    raw.iter()
        .flat_map(|entry| variant::normalize(entry.as_ref(), gene).into_tokens())
        .collect()
}

/// One article of a variant-list extraction batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantListCase {
    #[serde(deserialize_with = "deserialize_article_id")]
    pub article_id: String,
    #[serde(default)]
    pub ground_truth: Vec<String>,
    #[serde(default)]
    pub extracted: Vec<String>,
    /// Gene used to back-fill bare star alleles on both sides
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gene: Option<String>,
}

fn deserialize_article_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(D::Error::custom(format!(
            "article_id must be a non-empty string or number, found {}",
            crate::record::json_kind(&other)
        ))),
    }
}

/// Per-article result of a variant-list batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantListResult {
    pub article_id: String,
    pub contingency: Contingency,
    pub metrics: Metrics,
    /// Ground-truth tokens the extractor missed
    pub missed: Vec<String>,
    /// Extracted tokens absent from ground truth
    pub spurious: Vec<String>,
}

impl VariantListResult {
    /// Score one case
    #[must_use]
    pub fn evaluate(case: &VariantListCase) -> Self {
        let gene = case.gene.as_deref();
        let gt = token_union(&case.ground_truth, gene);
        let ex = token_union(&case.extracted, gene);
        let contingency = Contingency::between(&gt, &ex);
        Self {
            article_id: case.article_id.clone(),
            contingency,
            metrics: contingency.metrics(),
            missed: gt.difference(&ex).cloned().collect(),
            spurious: ex.difference(&gt).cloned().collect(),
        }
    }
}

/// Variant-list batch summary with micro and macro averages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantListReport {
    pub articles: Vec<VariantListResult>,
    /// Counts summed over all articles
    pub total: Contingency,
    /// Metrics of the summed counts
    pub micro: Metrics,
    /// Mean of per-article metrics
    pub macro_avg: Metrics,
}

impl VariantListReport {
    /// Score every case and summarize
    #[must_use]
    pub fn from_cases(cases: &[VariantListCase]) -> Self {
        let articles: Vec<VariantListResult> =
            cases.iter().map(VariantListResult::evaluate).collect();
        let total: Contingency = articles.iter().map(|a| a.contingency).sum();

        let precision: Vec<f64> = articles.iter().map(|a| a.metrics.precision).collect();
        let recall: Vec<f64> = articles.iter().map(|a| a.metrics.recall).collect();
        let f1: Vec<f64> = articles.iter().map(|a| a.metrics.f1).collect();

        Self {
            articles,
            total,
            micro: total.metrics(),
            macro_avg: Metrics {
                precision: compute_mean(&precision),
                recall: compute_mean(&recall),
                f1: compute_mean(&f1),
            },
        }
    }
}

/// Compute mean of samples
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn compute_mean(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().sum::<f64>() / samples.len() as f64
}

/// Bootstrap configuration
#[derive(Debug, Clone)]
pub struct StatConfig {
    /// Number of bootstrap resamples
    pub bootstrap_n: usize,
    /// Confidence level (e.g., 0.95)
    pub confidence: f64,
    /// Random seed for reproducibility
    pub seed: u64,
}

impl Default for StatConfig {
    fn default() -> Self {
        Self::from(&EvalSettings::default())
    }
}

impl From<&EvalSettings> for StatConfig {
    fn from(settings: &EvalSettings) -> Self {
        Self {
            bootstrap_n: settings.bootstrap_n,
            confidence: settings.confidence,
            seed: settings.seed,
        }
    }
}

/// Percentile bootstrap interval for the mean
///
/// Samples are sorted before resampling, so the interval does not depend on
/// the order in which parallel workers produced them.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_sign_loss,
    clippy::cast_possible_truncation
)]
pub fn bootstrap_ci(samples: &[f64], config: &StatConfig) -> (f64, f64) {
    if samples.len() < 2 || config.bootstrap_n == 0 {
        let mean = compute_mean(samples);
        return (mean, mean);
    }

    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);

    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let mut bootstrap_means = Vec::with_capacity(config.bootstrap_n);

    for _ in 0..config.bootstrap_n {
        let resample_sum: f64 = (0..sorted.len())
            .map(|_| {
                let idx = rng.next_u64() as usize % sorted.len();
                sorted[idx]
            })
            .sum();
        bootstrap_means.push(resample_sum / sorted.len() as f64);
    }

    bootstrap_means.sort_by(f64::total_cmp);

    let alpha = 1.0 - config.confidence;
    let lower_idx = (config.bootstrap_n as f64 * (alpha / 2.0)).floor() as usize;
    let upper_idx = (config.bootstrap_n as f64 * (1.0 - alpha / 2.0)).ceil() as usize;
    let last = bootstrap_means.len() - 1;

    (
        bootstrap_means[lower_idx.min(last)],
        bootstrap_means[upper_idx.min(last)],
    )
}
