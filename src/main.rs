//! PGx Eval CLI
//!
//! Scores extracted pharmacogenomic annotations against ground truth

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pgx_eval::{
    load_variant_cases, render_variant_lists, write_samples_jsonl, BatchRunner, EvalSettings,
    EvaluationReport, FieldTable, PairSet, ReportFormat, RunnerConfig, SampleScorer,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pgx-eval")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Score annotation pairs and build a corpus report
    Evaluate {
        /// Pair files, JSONL (glob pattern)
        #[arg(long, default_value = "pairs/*.jsonl")]
        pairs: String,

        /// Field table (YAML); built-in table when omitted
        #[arg(long)]
        fields: Option<PathBuf>,

        /// Mismatch threshold (overrides the field table)
        #[arg(long)]
        threshold: Option<f64>,

        /// Drop stop words in free-text comparison
        #[arg(long)]
        drop_stop_words: bool,

        /// Number of scoring workers
        #[arg(long, default_value = "4")]
        workers: usize,

        /// Write per-sample scores here as JSONL
        #[arg(long)]
        samples_out: Option<PathBuf>,

        /// Output report file; stdout when omitted
        #[arg(long)]
        output: Option<PathBuf>,

        /// Report format: json, markdown or text
        #[arg(long, default_value = "markdown")]
        format: ReportFormat,

        /// Report title
        #[arg(long, default_value = "PGx Annotation Evaluation")]
        title: String,
    },

    /// Precision/recall/F1 for variant-list extraction
    VariantLists {
        /// Case files, JSONL (glob pattern)
        #[arg(long)]
        cases: String,

        /// Output file; stdout when omitted
        #[arg(long)]
        output: Option<PathBuf>,

        /// Report format: json, markdown or text
        #[arg(long, default_value = "text")]
        format: ReportFormat,
    },

    /// Show how a variant string is normalized
    Normalize {
        /// Raw variant string
        value: String,

        /// Gene used to back-fill bare star alleles
        #[arg(long)]
        gene: Option<String>,
    },

    /// Print the resolved field table
    Fields {
        /// Field table (YAML); built-in table when omitted
        #[arg(long)]
        fields: Option<PathBuf>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if cli.verbose {
        tracing::info!("Verbose mode enabled");
    }

    if let Err(e) = run(cli.command) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Evaluate {
            pairs,
            fields,
            threshold,
            drop_stop_words,
            workers,
            samples_out,
            output,
            format,
            title,
        } => {
            let mut table = load_table(fields.as_deref())?;
            if threshold.is_some() || drop_stop_words {
                let settings = EvalSettings {
                    mismatch_threshold: threshold.unwrap_or(table.settings().mismatch_threshold),
                    drop_stop_words: drop_stop_words || table.settings().drop_stop_words,
                    ..table.settings().clone()
                };
                table = table.with_settings(settings)?;
            }

            tracing::info!(pairs = %pairs, fields = table.len(), workers, "Starting evaluation");

            let input = PairSet::load_glob(&pairs)?;
            let scorer = SampleScorer::new(table.clone());
            let similarity = scorer.matcher().similarity_name().to_string();
            let runner = BatchRunner::with_scorer(
                scorer,
                RunnerConfig {
                    max_concurrent: workers,
                },
            );
            let outcome = runner.run(input)?;

            if let Some(path) = samples_out {
                let file = std::fs::File::create(&path)
                    .with_context(|| format!("creating {}", path.display()))?;
                write_samples_jsonl(std::io::BufWriter::new(file), &outcome.samples)?;
                tracing::info!(path = %path.display(), samples = outcome.samples.len(), "Wrote sample scores");
            }

            let report = EvaluationReport::new(&title, &table, &similarity, outcome.report);
            emit(&report.render(format)?, output.as_deref())
        }

        Commands::VariantLists {
            cases,
            output,
            format,
        } => {
            let (cases, skipped) = load_variant_cases(&cases)?;
            for s in &skipped {
                tracing::warn!(source = %s.source, reason = %s.reason, "Skipped case");
            }
            let report = BatchRunner::run_variant_lists(&cases);
            emit(&render_variant_lists(&report, format)?, output.as_deref())
        }

        Commands::Normalize { value, gene } => {
            let parsed = pgx_eval::parse(&value, gene.as_deref());
            if let Some(gene) = &parsed.gene {
                println!("gene: {gene}");
            }
            for token in &parsed.tokens {
                println!("{}", token.canonical());
            }
            for rejected in &parsed.rejected {
                eprintln!("dropped {rejected}");
            }
            Ok(())
        }

        Commands::Fields { fields } => {
            let table = load_table(fields.as_deref())?;
            print!("{}", table.to_yaml()?);
            Ok(())
        }
    }
}

fn load_table(path: Option<&Path>) -> Result<FieldTable> {
    path.map_or_else(
        || Ok(FieldTable::default()),
        |p| FieldTable::load(p).with_context(|| format!("loading field table {}", p.display())),
    )
}

fn emit(content: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, content).with_context(|| format!("writing {}", path.display()))?;
            tracing::info!(path = %path.display(), "Report written");
        }
        None => print!("{content}"),
    }
    Ok(())
}
