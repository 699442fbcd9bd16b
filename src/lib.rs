//! # PGx Eval
//!
//! Field-level evaluation of LLM-extracted pharmacogenomic variant
//! annotations against curated ground truth.
//!
//! ## Scoring Model
//!
//! Every configured field is compared with one of three strategies:
//! - **exact**: case-insensitive, whitespace-normalized equality
//! - **fuzzy set**: variant strings normalized into canonical token sets,
//!   tiered as Exact (1.0), Partial (0.5) or No Match (0.0)
//! - **semantic text**: word-set similarity for narrative fields
//!
//! A field missing on both sides is excluded; a field missing on one side
//! scores 0.0. Included fields are combined into a weighted sample score,
//! and samples are rolled up into per-field corpus statistics.
//!
//! ## Architecture
//!
//! ```text
//! Joined pairs (JSONL: article_id, ground_truth, prediction)
//!        ↓
//! AnnotationRecord (typed fields, explicit absent/blank)
//!        ↓
//! Variant normalization (rsIDs, star alleles, genotypes)
//!        ↓
//! FieldMatcher (exact | fuzzy set | semantic text)
//!        ↓
//! SampleScorer (weighted aggregate + diagnostics)
//!        ↓
//! CorpusAccumulator (parallel fold, order-independent merge)
//!        ↓
//! Report (JSON | markdown | text, per-sample JSONL)
//! ```

pub mod config;
pub mod corpus;
pub mod matcher;
pub mod metrics;
pub mod record;
pub mod report;
pub mod runner;
pub mod sample;
pub mod variant;

pub use config::{ComparisonStrategy, ConfigError, EvalSettings, FieldSpec, FieldTable};
pub use corpus::{
    aggregate, CorpusAccumulator, CorpusReport, DifficultSample, FieldSummary, ScoreDistribution,
    SkippedSample, TierCounts,
};
pub use matcher::{
    ErrorKind, FieldMatcher, FieldOutcome, Genes, JaccardSimilarity, MatchError, MatchTier,
    Presence, Side, TextSimilarity,
};
pub use metrics::{
    bootstrap_ci, contingency, evaluate_variant_lists, Contingency, Metrics, StatConfig,
    VariantListCase, VariantListReport, VariantListResult,
};
pub use record::{AnnotationField, AnnotationRecord, EvalPair, FieldValue, RecordError};
pub use report::{
    render_variant_lists, write_samples_jsonl, EvaluationReport, ReportError, ReportFormat,
    ReportMetadata,
};
pub use runner::{load_variant_cases, BatchOutcome, BatchRunner, PairSet, RunnerConfig, RunnerError};
pub use sample::{FieldScore, ParseDiagnostic, SampleScore, SampleScorer};
pub use variant::{normalize, parse, NormalizedVariant, ParsedVariant, RejectReason, VariantToken};
