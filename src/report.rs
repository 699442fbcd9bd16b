//! Report generation for evaluation results.
//!
//! Renders a [`CorpusReport`] as:
//! - JSON (full detail, machine-readable)
//! - Markdown (summary, per-field table, missing-value and error-type tables,
//!   difficult samples)
//! - Plain text (terminal summary)
//!
//! Per-sample scores are written separately as JSON Lines.

use crate::config::{EvalSettings, FieldTable};
use crate::corpus::{CorpusReport, FieldSummary};
use crate::matcher::ErrorKind;
use crate::metrics::VariantListReport;
use crate::sample::SampleScore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as FmtWrite;
use std::io::Write;
use tabled::{Table, Tabled};
use thiserror::Error;

/// Diagnostics listed in full before the markdown report truncates
const MAX_LISTED_DIAGNOSTICS: usize = 25;

/// Report rendering errors
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Unknown report format: {0} (expected json, markdown or text)")]
    UnknownFormat(String),
}

/// Output format for the corpus report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    Json,
    #[default]
    Markdown,
    Text,
}

impl std::str::FromStr for ReportFormat {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "markdown" | "md" => Ok(Self::Markdown),
            "text" | "txt" => Ok(Self::Text),
            _ => Err(ReportError::UnknownFormat(s.to_string())),
        }
    }
}

/// Report metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Report title
    pub title: String,
    /// Report generation timestamp
    pub generated_at: DateTime<Utc>,
    /// Crate version
    pub framework_version: String,
    /// Settings the batch was scored with
    pub settings: EvalSettings,
    /// Fields configured for the run
    pub field_count: usize,
    /// Free-text similarity in use
    pub text_similarity: String,
}

/// Corpus report with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub metadata: ReportMetadata,
    pub corpus: CorpusReport,
}

#[derive(Tabled)]
struct FieldRow {
    #[tabled(rename = "Field")]
    field: String,
    #[tabled(rename = "Strategy")]
    strategy: String,
    #[tabled(rename = "Weight")]
    weight: String,
    #[tabled(rename = "Evaluated")]
    evaluated: usize,
    #[tabled(rename = "Mean")]
    mean: String,
    #[tabled(rename = "Exact")]
    exact_rate: String,
    #[tabled(rename = "Mismatches")]
    mismatches: usize,
    #[tabled(rename = "Tiers (E/P/N)")]
    tiers: String,
}

#[derive(Tabled)]
struct MissingRow {
    #[tabled(rename = "Field")]
    field: String,
    #[tabled(rename = "GT only")]
    ground_truth_only: usize,
    #[tabled(rename = "Prediction only")]
    prediction_only: usize,
    #[tabled(rename = "Excluded")]
    excluded: usize,
    #[tabled(rename = "Errors")]
    errors: usize,
}

#[derive(Tabled)]
struct ErrorRow {
    #[tabled(rename = "Field")]
    field: String,
    #[tabled(rename = "Missing")]
    missing_prediction: usize,
    #[tabled(rename = "Unexpected")]
    unexpected_prediction: usize,
    #[tabled(rename = "Incomplete")]
    incomplete_extraction: usize,
    #[tabled(rename = "Over-extracted")]
    over_extraction: usize,
    #[tabled(rename = "Content")]
    content_mismatch: usize,
}

impl From<&FieldSummary> for ErrorRow {
    fn from(f: &FieldSummary) -> Self {
        let count = |kind| f.error_kinds.get(&kind).copied().unwrap_or(0);
        Self {
            field: f.field.to_string(),
            missing_prediction: count(ErrorKind::MissingPrediction),
            unexpected_prediction: count(ErrorKind::UnexpectedPrediction),
            incomplete_extraction: count(ErrorKind::IncompleteExtraction),
            over_extraction: count(ErrorKind::OverExtraction),
            content_mismatch: count(ErrorKind::ContentMismatch),
        }
    }
}

#[derive(Tabled)]
struct VariantRow {
    #[tabled(rename = "Article")]
    article: String,
    #[tabled(rename = "TP")]
    tp: usize,
    #[tabled(rename = "FP")]
    fp: usize,
    #[tabled(rename = "FN")]
    fn_: usize,
    #[tabled(rename = "Precision")]
    precision: String,
    #[tabled(rename = "Recall")]
    recall: String,
    #[tabled(rename = "F1")]
    f1: String,
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.3}"))
}

fn fmt_pct(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.1}%", v * 100.0))
}

impl EvaluationReport {
    /// Wrap a corpus report with metadata for the given table
    #[must_use]
    pub fn new(title: &str, table: &FieldTable, text_similarity: &str, corpus: CorpusReport) -> Self {
        Self {
            metadata: ReportMetadata {
                title: title.to_string(),
                generated_at: Utc::now(),
                framework_version: env!("CARGO_PKG_VERSION").to_string(),
                settings: table.settings().clone(),
                field_count: table.len(),
                text_similarity: text_similarity.to_string(),
            },
            corpus,
        }
    }

    /// Render in the requested format
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render(&self, format: ReportFormat) -> Result<String, ReportError> {
        Ok(match format {
            ReportFormat::Json => self.to_json()?,
            ReportFormat::Markdown => self.to_markdown(),
            ReportFormat::Text => self.to_text(),
        })
    }

    /// Render report as JSON
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    fn field_rows(&self) -> Vec<FieldRow> {
        self.corpus
            .fields
            .iter()
            .map(|f| FieldRow {
                field: f.field.to_string(),
                strategy: f.strategy.to_string(),
                weight: format!("{:.2}", f.weight),
                evaluated: f.evaluated,
                mean: fmt_opt(f.mean_score),
                exact_rate: fmt_pct(f.exact_match_rate),
                mismatches: f.mismatches,
                tiers: f.tiers.map_or_else(
                    || "-".to_string(),
                    |t| format!("{}/{}/{}", t.exact, t.partial, t.none),
                ),
            })
            .collect()
    }

    fn missing_rows(&self) -> Vec<MissingRow> {
        self.corpus
            .fields
            .iter()
            .map(|f| MissingRow {
                field: f.field.to_string(),
                ground_truth_only: f.ground_truth_only,
                prediction_only: f.prediction_only,
                excluded: f.excluded,
                errors: f.errors,
            })
            .collect()
    }

    fn error_rows(&self) -> Vec<ErrorRow> {
        self.corpus
            .fields
            .iter()
            .filter(|f| !f.error_kinds.is_empty())
            .map(ErrorRow::from)
            .collect()
    }

    fn ci_text(&self) -> String {
        self.corpus.aggregate_ci.map_or_else(
            || "-".to_string(),
            |(lo, hi)| format!("[{lo:.3}, {hi:.3}]"),
        )
    }

    /// Render report as markdown
    #[must_use]
    #[allow(clippy::too_many_lines)]
    pub fn to_markdown(&self) -> String {
        let mut output = String::new();
        let corpus = &self.corpus;

        writeln!(output, "# {}", self.metadata.title).ok();
        writeln!(output).ok();
        writeln!(
            output,
            "**Generated:** {}",
            self.metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        )
        .ok();
        writeln!(
            output,
            "**Framework Version:** {}",
            self.metadata.framework_version
        )
        .ok();
        writeln!(output).ok();

        writeln!(output, "## Summary").ok();
        writeln!(output).ok();
        writeln!(output, "| Metric | Value |").ok();
        writeln!(output, "|--------|-------|").ok();
        writeln!(output, "| Total Samples | {} |", corpus.total_samples).ok();
        writeln!(output, "| Scored Samples | {} |", corpus.scored_samples).ok();
        writeln!(
            output,
            "| Nothing Comparable | {} |",
            corpus.unscorable_samples
        )
        .ok();
        writeln!(output, "| Skipped Samples | {} |", corpus.skipped_samples.len()).ok();
        writeln!(
            output,
            "| Mean Weighted Score | {} |",
            fmt_opt(corpus.mean_aggregate)
        )
        .ok();
        writeln!(
            output,
            "| {:.0}% CI | {} |",
            self.metadata.settings.confidence * 100.0,
            self.ci_text()
        )
        .ok();
        writeln!(
            output,
            "| Score Range | {} - {} |",
            fmt_opt(corpus.min_aggregate),
            fmt_opt(corpus.max_aggregate)
        )
        .ok();
        writeln!(
            output,
            "| Mean Unweighted Score | {} |",
            fmt_opt(corpus.mean_score)
        )
        .ok();
        writeln!(output).ok();

        let dist = &corpus.score_distribution;
        writeln!(output, "## Score Distribution").ok();
        writeln!(output).ok();
        writeln!(output, "| Bucket | Samples |").ok();
        writeln!(output, "|--------|---------|").ok();
        writeln!(output, "| Excellent (>= 0.9) | {} |", dist.excellent).ok();
        writeln!(output, "| Good (0.7-0.9) | {} |", dist.good).ok();
        writeln!(output, "| Fair (0.5-0.7) | {} |", dist.fair).ok();
        writeln!(output, "| Poor (< 0.5) | {} |", dist.poor).ok();
        writeln!(output).ok();

        writeln!(output, "## Field Scores").ok();
        writeln!(output).ok();
        writeln!(
            output,
            "Mismatch threshold: score < {}",
            corpus.mismatch_threshold
        )
        .ok();
        writeln!(output).ok();
        let mut table = Table::new(self.field_rows());
        table.with(tabled::settings::Style::markdown());
        writeln!(output, "{table}").ok();
        writeln!(output).ok();

        writeln!(output, "## Missing Values").ok();
        writeln!(output).ok();
        let mut table = Table::new(self.missing_rows());
        table.with(tabled::settings::Style::markdown());
        writeln!(output, "{table}").ok();
        writeln!(output).ok();

        let error_rows = self.error_rows();
        if !error_rows.is_empty() {
            writeln!(output, "## Error Types").ok();
            writeln!(output).ok();
            let mut table = Table::new(error_rows);
            table.with(tabled::settings::Style::markdown());
            writeln!(output, "{table}").ok();
            writeln!(output).ok();
        }

        if !corpus.difficult_samples.is_empty() {
            writeln!(output, "## Difficult Samples").ok();
            writeln!(output).ok();
            for d in &corpus.difficult_samples {
                let weak: Vec<String> = d.weak_fields.iter().map(ToString::to_string).collect();
                writeln!(
                    output,
                    "- `{}` ({:.3}): {}",
                    d.article_id,
                    d.aggregate,
                    if weak.is_empty() {
                        "-".to_string()
                    } else {
                        weak.join(", ")
                    }
                )
                .ok();
            }
            writeln!(output).ok();
        }

        if !corpus.diagnostics.is_empty() {
            writeln!(output, "## Parse Diagnostics").ok();
            writeln!(output).ok();
            writeln!(output, "| Sample | Field | Side | Raw | Error |").ok();
            writeln!(output, "|--------|-------|------|-----|-------|").ok();
            for d in corpus.diagnostics.iter().take(MAX_LISTED_DIAGNOSTICS) {
                writeln!(
                    output,
                    "| {} | {} | {} | `{}` | {} |",
                    d.article_id,
                    d.field,
                    d.side.map_or_else(|| "-".to_string(), |s| s.to_string()),
                    d.raw.replace('|', "\\|"),
                    d.error.replace('|', "\\|")
                )
                .ok();
            }
            if corpus.diagnostics.len() > MAX_LISTED_DIAGNOSTICS {
                writeln!(
                    output,
                    "\n_{} more in the JSON report._",
                    corpus.diagnostics.len() - MAX_LISTED_DIAGNOSTICS
                )
                .ok();
            }
            writeln!(output).ok();
        }

        if !corpus.skipped_samples.is_empty() {
            writeln!(output, "## Skipped Samples").ok();
            writeln!(output).ok();
            for s in &corpus.skipped_samples {
                writeln!(
                    output,
                    "- {} {}: {}",
                    s.source,
                    s.article_id.as_deref().unwrap_or(""),
                    s.reason
                )
                .ok();
            }
            writeln!(output).ok();
        }

        writeln!(output, "## Configuration").ok();
        writeln!(output).ok();
        writeln!(output, "- Fields: {}", self.metadata.field_count).ok();
        writeln!(
            output,
            "- Text similarity: {}",
            self.metadata.text_similarity
        )
        .ok();
        writeln!(
            output,
            "- Stop words dropped: {}",
            self.metadata.settings.drop_stop_words
        )
        .ok();
        writeln!(
            output,
            "- Bootstrap resamples: {} (seed {})",
            self.metadata.settings.bootstrap_n, self.metadata.settings.seed
        )
        .ok();

        output
    }

    /// Render report as plain text table
    #[must_use]
    pub fn to_text(&self) -> String {
        let mut output = String::new();
        let corpus = &self.corpus;

        writeln!(
            output,
            "═══════════════════════════════════════════════════════════════"
        )
        .ok();
        writeln!(output, "  {}", self.metadata.title).ok();
        writeln!(
            output,
            "═══════════════════════════════════════════════════════════════"
        )
        .ok();
        writeln!(output).ok();

        writeln!(output, "SUMMARY").ok();
        writeln!(
            output,
            "───────────────────────────────────────────────────────────────"
        )
        .ok();
        writeln!(
            output,
            "  Samples:          {} scored / {} total ({} skipped)",
            corpus.scored_samples,
            corpus.total_samples,
            corpus.skipped_samples.len()
        )
        .ok();
        writeln!(
            output,
            "  Weighted score:   {} {}",
            fmt_opt(corpus.mean_aggregate),
            self.ci_text()
        )
        .ok();
        writeln!(
            output,
            "  Range:            {} - {}",
            fmt_opt(corpus.min_aggregate),
            fmt_opt(corpus.max_aggregate)
        )
        .ok();
        writeln!(
            output,
            "  Unweighted score: {}",
            fmt_opt(corpus.mean_score)
        )
        .ok();
        writeln!(output, "  Diagnostics:      {}", corpus.diagnostics.len()).ok();
        writeln!(output).ok();

        writeln!(output, "FIELDS").ok();
        writeln!(
            output,
            "───────────────────────────────────────────────────────────────"
        )
        .ok();
        let table = Table::new(self.field_rows()).to_string();
        writeln!(output, "{table}").ok();

        output
    }
}

/// Write per-sample scores as JSON Lines
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_samples_jsonl<W: Write>(mut writer: W, samples: &[SampleScore]) -> Result<(), ReportError> {
    for sample in samples {
        serde_json::to_writer(&mut writer, sample)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

/// Render a variant-list report
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn render_variant_lists(
    report: &VariantListReport,
    format: ReportFormat,
) -> Result<String, ReportError> {
    if format == ReportFormat::Json {
        return Ok(serde_json::to_string_pretty(report)?);
    }

    let rows: Vec<VariantRow> = report
        .articles
        .iter()
        .map(|a| VariantRow {
            article: a.article_id.clone(),
            tp: a.contingency.true_positives,
            fp: a.contingency.false_positives,
            fn_: a.contingency.false_negatives,
            precision: format!("{:.3}", a.metrics.precision),
            recall: format!("{:.3}", a.metrics.recall),
            f1: format!("{:.3}", a.metrics.f1),
        })
        .collect();

    let mut table = Table::new(rows);
    if format == ReportFormat::Markdown {
        table.with(tabled::settings::Style::markdown());
    }

    let mut output = String::new();
    writeln!(output, "{table}").ok();
    writeln!(output).ok();
    writeln!(
        output,
        "Micro: P={:.3} R={:.3} F1={:.3} (TP={} FP={} FN={})",
        report.micro.precision,
        report.micro.recall,
        report.micro.f1,
        report.total.true_positives,
        report.total.false_positives,
        report.total.false_negatives
    )
    .ok();
    writeln!(
        output,
        "Macro: P={:.3} R={:.3} F1={:.3}",
        report.macro_avg.precision, report.macro_avg.recall, report.macro_avg.f1
    )
    .ok();
    Ok(output)
}
