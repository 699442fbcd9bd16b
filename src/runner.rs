//! Batch execution: loading joined pairs and scoring them in parallel.
//!
//! Scoring is a map over independent pairs followed by a reduce into
//! [`CorpusAccumulator`]. A pair that cannot be decoded is recorded as a
//! skipped sample and the run carries on.

use crate::config::FieldTable;
use crate::corpus::{CorpusAccumulator, CorpusReport, SkippedSample};
use crate::metrics::{StatConfig, VariantListCase, VariantListReport};
use crate::record::EvalPair;
use crate::sample::{SampleScore, SampleScorer};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Errors that abort a batch run
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Invalid glob pattern: {0}")]
    InvalidPattern(String),

    #[error("No input files matched: {0}")]
    NoInputs(String),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to start worker pool: {0}")]
    ThreadPool(String),
}

/// Runner configuration
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Maximum concurrent scoring workers
    pub max_concurrent: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self { max_concurrent: 4 }
    }
}

/// Decoded pairs plus the lines that could not be decoded
#[derive(Debug, Default)]
pub struct PairSet {
    pub pairs: Vec<EvalPair>,
    pub skipped: Vec<SkippedSample>,
}

impl PairSet {
    /// Decode JSONL text; `source` names the input in skip records
    #[must_use]
    pub fn from_jsonl(source: &str, content: &str) -> Self {
        Self::from_jsonl_bytes(source, content.as_bytes())
    }

    /// Decode raw JSONL bytes; a line that is not valid UTF-8 is skipped on
    /// its own
    #[must_use]
    pub fn from_jsonl_bytes(source: &str, content: &[u8]) -> Self {
        let mut set = Self::default();
        for (number, line) in numbered_lines(content) {
            let location = format!("{source}:{number}");
            match line {
                Ok(line) => set.decode_line(location, line),
                Err(e) => {
                    tracing::warn!(%location, error = %e, "skipping line with invalid UTF-8");
                    set.skipped.push(SkippedSample {
                        source: location,
                        article_id: None,
                        reason: format!("invalid UTF-8: {e}"),
                    });
                }
            }
        }
        set
    }

    fn decode_line(&mut self, location: String, line: &str) {
        let value = match serde_json::from_str::<serde_json::Value>(line) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(%location, error = %e, "skipping undecodable line");
                self.skipped.push(SkippedSample {
                    source: location,
                    article_id: None,
                    reason: format!("invalid JSON: {e}"),
                });
                return;
            }
        };
        let article_id = value
            .get("article_id")
            .and_then(|id| id.as_str().map(str::to_string).or_else(|| id.as_u64().map(|n| n.to_string())));
        match EvalPair::from_json(value) {
            Ok(pair) => self.pairs.push(pair),
            Err(e) => {
                tracing::warn!(%location, error = %e, "skipping malformed pair");
                self.skipped.push(SkippedSample {
                    source: location,
                    article_id,
                    reason: e.to_string(),
                });
            }
        }
    }

    /// Load one JSONL file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Self, RunnerError> {
        let path = path.as_ref();
        let content = read_bytes(path)?;
        Ok(Self::from_jsonl_bytes(&path.display().to_string(), &content))
    }

    /// Load every file matching a glob pattern (e.g. "pairs/*.jsonl")
    ///
    /// # Errors
    ///
    /// Returns an error if the pattern is invalid, matches nothing, or a
    /// matched file cannot be read.
    pub fn load_glob(pattern: &str) -> Result<Self, RunnerError> {
        let mut set = Self::default();
        for path in expand_glob(pattern)? {
            set.extend(Self::load_file(&path)?);
        }
        Ok(set)
    }

    fn extend(&mut self, other: Self) {
        self.pairs.extend(other.pairs);
        self.skipped.extend(other.skipped);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len() + self.skipped.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn read_bytes(path: &Path) -> Result<Vec<u8>, RunnerError> {
    std::fs::read(path).map_err(|source| RunnerError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Non-blank lines with 1-based line numbers, trimmed; UTF-8 is checked per
/// line
fn numbered_lines(
    content: &[u8],
) -> impl Iterator<Item = (usize, Result<&str, std::str::Utf8Error>)> {
    content
        .split(|b| *b == b'\n')
        .enumerate()
        .map(|(idx, line)| (idx + 1, std::str::from_utf8(line).map(str::trim)))
        .filter(|(_, line)| !matches!(line, Ok(l) if l.is_empty()))
}

fn expand_glob(pattern: &str) -> Result<Vec<PathBuf>, RunnerError> {
    let paths = glob::glob(pattern).map_err(|e| RunnerError::InvalidPattern(e.to_string()))?;
    let mut files = Vec::new();
    for entry in paths {
        match entry {
            Ok(path) if path.is_file() => files.push(path),
            Ok(_) => {}
            Err(e) => {
                return Err(RunnerError::Read {
                    path: e.path().to_path_buf(),
                    source: std::io::Error::from(e),
                })
            }
        }
    }
    if files.is_empty() {
        return Err(RunnerError::NoInputs(pattern.to_string()));
    }
    files.sort();
    Ok(files)
}

/// Load variant-list cases from JSONL files matching a glob pattern
///
/// # Errors
///
/// Returns an error if the pattern is invalid, matches nothing, or a file
/// cannot be read. Undecodable lines are returned as skipped samples.
pub fn load_variant_cases(
    pattern: &str,
) -> Result<(Vec<VariantListCase>, Vec<SkippedSample>), RunnerError> {
    let mut cases = Vec::new();
    let mut skipped = Vec::new();
    for path in expand_glob(pattern)? {
        let content = read_bytes(&path)?;
        for (number, line) in numbered_lines(&content) {
            let reason = match line {
                Ok(line) => match serde_json::from_str::<VariantListCase>(line) {
                    Ok(case) => {
                        cases.push(case);
                        continue;
                    }
                    Err(e) => e.to_string(),
                },
                Err(e) => format!("invalid UTF-8: {e}"),
            };
            skipped.push(SkippedSample {
                source: format!("{}:{number}", path.display()),
                article_id: None,
                reason,
            });
        }
    }
    Ok((cases, skipped))
}

/// Output of a batch run
#[derive(Debug)]
pub struct BatchOutcome {
    /// Sample scores in input order
    pub samples: Vec<SampleScore>,
    pub report: CorpusReport,
    pub elapsed: Duration,
}

/// Scores batches of pairs on a bounded worker pool
#[derive(Debug, Clone)]
pub struct BatchRunner {
    scorer: SampleScorer,
    config: RunnerConfig,
}

impl BatchRunner {
    /// Runner with default configuration
    #[must_use]
    pub fn new(table: FieldTable) -> Self {
        Self::with_scorer(SampleScorer::new(table), RunnerConfig::default())
    }

    /// Runner around a prepared scorer
    #[must_use]
    pub const fn with_scorer(scorer: SampleScorer, config: RunnerConfig) -> Self {
        Self { scorer, config }
    }

    #[must_use]
    pub const fn scorer(&self) -> &SampleScorer {
        &self.scorer
    }

    /// Score every pair and aggregate the batch
    ///
    /// # Errors
    ///
    /// Returns an error only if the worker pool cannot be created.
    pub fn run(&self, input: PairSet) -> Result<BatchOutcome, RunnerError> {
        let start = Instant::now();
        let table = self.scorer.table();
        let workers = self.config.max_concurrent.max(1);

        tracing::info!(
            pairs = input.pairs.len(),
            skipped = input.skipped.len(),
            workers,
            "scoring batch"
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|e| RunnerError::ThreadPool(e.to_string()))?;

        let (samples, mut acc) = pool.install(|| {
            let samples: Vec<SampleScore> = input
                .pairs
                .par_iter()
                .map(|pair| self.scorer.score_pair(pair))
                .collect();

            let acc = samples
                .par_iter()
                .cloned()
                .fold(
                    || CorpusAccumulator::new(table),
                    |mut acc, sample| {
                        acc.add(sample);
                        acc
                    },
                )
                .reduce(|| CorpusAccumulator::new(table), CorpusAccumulator::merge);

            (samples, acc)
        });

        for skipped in input.skipped {
            acc.skip(skipped);
        }
        let report = acc.finish(&StatConfig::from(table.settings()));
        let elapsed = start.elapsed();

        tracing::info!(
            scored = report.scored_samples,
            total = report.total_samples,
            mean_aggregate = report.mean_aggregate.unwrap_or(f64::NAN),
            elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            "batch complete"
        );

        Ok(BatchOutcome {
            samples,
            report,
            elapsed,
        })
    }

    /// Score a variant-list batch
    #[must_use]
    pub fn run_variant_lists(cases: &[VariantListCase]) -> VariantListReport {
        let report = VariantListReport::from_cases(cases);
        tracing::info!(
            articles = report.articles.len(),
            precision = report.micro.precision,
            recall = report.micro.recall,
            f1 = report.micro.f1,
            "variant lists scored"
        );
        report
    }
}
