//! Integration tests for the pgx-eval CLI and library.
//!
//! These tests verify end-to-end functionality including:
//! - Library scoring from raw JSON pairs to a corpus report
//! - Field tables loaded from YAML
//! - CLI commands against temporary input files

#![allow(clippy::needless_raw_string_hashes)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::float_cmp)]

use pgx_eval::{
    aggregate, normalize, AnnotationField, BatchRunner, EvalPair, FieldTable, MatchTier, PairSet,
    ErrorKind, Presence, ReportFormat, SampleScorer, VariantListCase, VariantListReport,
};
use serde_json::json;
use std::process::Command;

const PAIRS: &str = r#"{"article_id": "PMC5508045", "ground_truth": {"Gene": "CYP2C19", "Drug(s)": "clopidogrel", "Variant/Haplotypes": "*2, *3", "Significance": "yes", "Direction of effect": "decreased", "Sentence": "CYP2C19*2 is associated with decreased response to clopidogrel"}, "prediction": {"gene": "cyp2c19", "drugs": "Clopidogrel", "variant_haplotypes": "CYP2C19*2", "significance": "Yes", "direction_of_effect": "decreased", "sentence": "CYP2C19*2 carriers show decreased clopidogrel response"}}
{"article_id": 28008242, "ground_truth": {"gene": "CYP2C9", "alleles": "AA + AT", "significance": "no"}, "prediction": {"gene": "CYP2C9", "alleles": "AT", "significance": "no", "specialty_population": "Pediatric"}}
{"article_id": "PMC_BAD", "ground_truth": "n/a", "prediction": {}}
"#;

fn bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_pgx-eval"))
}

fn jsonl_glob(dir: &tempfile::TempDir) -> String {
    format!("{}/*.jsonl", dir.path().display())
}

// ============================================================================
// Library Integration Tests
// ============================================================================

#[test]
fn test_end_to_end_library() {
    let input = PairSet::from_jsonl("pairs.jsonl", PAIRS);
    assert_eq!(input.pairs.len(), 2);
    assert_eq!(input.skipped.len(), 1);

    let outcome = BatchRunner::new(FieldTable::default()).run(input).unwrap();
    let first = &outcome.samples[0];

    let variants = first.field(AnnotationField::VariantHaplotypes).unwrap();
    assert_eq!(variants.tier, Some(MatchTier::Partial));
    assert_eq!(variants.score, 0.5);
    assert_eq!(variants.error_kind, Some(ErrorKind::ContentMismatch));
    assert_eq!(first.field(AnnotationField::Gene).unwrap().score, 1.0);
    assert_eq!(first.field(AnnotationField::Drugs).unwrap().score, 1.0);

    let second = &outcome.samples[1];
    let population = second.field(AnnotationField::SpecialtyPopulation).unwrap();
    assert_eq!(population.presence, Presence::PredictionOnly);
    assert_eq!(population.score, 0.0);
    assert!(population.included);

    let report = outcome.report;
    assert_eq!(report.total_samples, 3);
    assert_eq!(report.scored_samples, 2);
    assert_eq!(report.skipped_samples[0].article_id.as_deref(), Some("PMC_BAD"));
    assert_eq!(
        report
            .field(AnnotationField::SpecialtyPopulation)
            .unwrap()
            .prediction_only,
        1
    );
}

#[test]
fn test_pair_with_alias_and_canonical_keys_is_scored() {
    let line = r#"{"article_id": "PMC1", "ground_truth": {"gene": "CYP2D6", "Gene": "CYP2D6", "Alleles": "*1/*4"}, "prediction": {"gene": "CYP2D6", "alleles": "CYP2D6*4, CYP2D6*1"}}"#;
    let input = PairSet::from_jsonl("pairs.jsonl", line);
    assert!(input.skipped.is_empty());

    let outcome = BatchRunner::new(FieldTable::default()).run(input).unwrap();
    let alleles = outcome.samples[0].field(AnnotationField::Alleles).unwrap();
    assert_eq!(alleles.tier, Some(MatchTier::Exact));
    assert_eq!(outcome.report.min_aggregate, outcome.report.max_aggregate);
}

#[test]
fn test_spec_scenario_from_json() {
    let pair = EvalPair::from_json(json!({
        "article_id": "PMC1",
        "ground_truth": {
            "significance": "yes",
            "alleles": "*1/*2",
            "sentence": "CYP2C9*2 decreases warfarin clearance"
        },
        "prediction": {
            "significance": "yes",
            "alleles": "*2/*1",
            "sentence": "CYP2C9*2 is linked to lower warfarin clearance"
        }
    }))
    .unwrap();

    let table = FieldTable::default();
    let sample = SampleScorer::new(table.clone()).score_pair(&pair);
    assert_eq!(sample.included_count(), 3);

    let report = aggregate(vec![sample], &table);
    assert_eq!(report.scored_samples, 1);
    assert_eq!(
        report.field(AnnotationField::Alleles).unwrap().mean_score,
        Some(1.0)
    );
}

#[test]
fn test_custom_field_table() {
    let table = FieldTable::from_yaml(
        r#"
settings:
  mismatch_threshold: 0.5
fields:
  - name: alleles
    strategy: fuzzy_set
    weight: 2.0
  - name: significance
    strategy: exact
    weight: 1.0
"#,
    )
    .unwrap();
    let outcome = BatchRunner::new(table)
        .run(PairSet::from_jsonl("pairs.jsonl", PAIRS))
        .unwrap();

    assert_eq!(outcome.report.fields.len(), 2);
    // alleles is absent from the first pair but still reported as excluded
    assert_eq!(outcome.samples[0].field_scores.len(), 2);
    // second pair: alleles partial (0.5), significance exact (1.0)
    let second = outcome.samples[1].aggregate.unwrap();
    assert!((second - (2.0 * 0.5 + 1.0) / 3.0).abs() < 1e-12);
    assert_eq!(
        outcome.report.field(AnnotationField::Alleles).unwrap().mismatches,
        0
    );
}

#[test]
fn test_variant_lists_library() {
    let report = VariantListReport::from_cases(&[
        VariantListCase {
            article_id: "A".into(),
            ground_truth: vec!["rs1799853".into(), "rs4244285".into()],
            extracted: vec!["rs1799853".into(), "rs1045642".into()],
            gene: None,
        },
        VariantListCase {
            article_id: "B".into(),
            ground_truth: vec!["*2".into()],
            extracted: vec!["CYP2D6*2".into()],
            gene: Some("CYP2D6".into()),
        },
    ]);
    assert_eq!(report.total.true_positives, 2);
    assert!((report.micro.f1 - 2.0 / 3.0).abs() < 1e-12);
    assert!((report.macro_avg.f1 - 0.75).abs() < 1e-12);
}

#[test]
fn test_normalize_examples() {
    let tokens: Vec<String> = normalize("*1/*18", Some("CYP2C19")).iter().cloned().collect();
    assert_eq!(tokens, vec!["CYP2C19*1", "CYP2C19*18"]);
}

#[test]
fn test_bundled_field_table_loads() {
    let table = FieldTable::load(concat!(env!("CARGO_MANIFEST_DIR"), "/fields/pgx-default.yaml"))
        .unwrap();
    assert_eq!(table, FieldTable::default());
}

// ============================================================================
// CLI Integration Tests
// ============================================================================

#[test]
fn test_cli_help_command() {
    let output = bin().arg("--help").output().unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("pgx-eval"), "Help should mention binary name");
    assert!(stdout.contains("evaluate"), "Help should list evaluate command");
    assert!(stdout.contains("normalize"), "Help should list normalize command");
}

#[test]
fn test_cli_evaluate_writes_reports() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("pairs.jsonl"), PAIRS).unwrap();
    let report_path = dir.path().join("report.json");
    let samples_path = dir.path().join("samples.jsonl");

    let output = bin()
        .args([
            "evaluate",
            "--pairs",
            jsonl_glob(&dir).as_str(),
            "--format",
            "json",
            "--workers",
            "2",
            "--output",
            report_path.to_str().unwrap(),
            "--samples-out",
            samples_path.to_str().unwrap(),
        ])
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(report["corpus"]["total_samples"], 3);
    assert_eq!(report["corpus"]["scored_samples"], 2);

    let samples = std::fs::read_to_string(&samples_path).unwrap();
    assert_eq!(samples.lines().count(), 2);
}

#[test]
fn test_cli_evaluate_markdown_to_stdout() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("pairs.jsonl"), PAIRS).unwrap();

    let output = bin()
        .args([
            "evaluate",
            "--pairs",
            jsonl_glob(&dir).as_str(),
            "--title",
            "Smoke",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("# Smoke"));
    assert!(stdout.contains("## Field Scores"));
}

#[test]
fn test_cli_evaluate_no_inputs_fails() {
    let dir = tempfile::tempdir().unwrap();
    let output = bin()
        .args([
            "evaluate",
            "--pairs",
            jsonl_glob(&dir).as_str(),
        ])
        .output()
        .unwrap();
    assert!(!output.status.success());
}

#[test]
fn test_cli_normalize() {
    let output = bin()
        .args(["normalize", "CYP2C19*2-1234G>A, *3", "--gene", "CYP2C19"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("CYP2C19*2"));
    assert!(stdout.contains("1234G>A"));
    assert!(stdout.contains("CYP2C19*3"));
}

#[test]
fn test_cli_fields_prints_table() {
    let output = bin().arg("fields").output().unwrap();
    assert!(output.status.success());
    let yaml = String::from_utf8_lossy(&output.stdout);
    let table = FieldTable::from_yaml(&yaml).unwrap();
    assert_eq!(table, FieldTable::default());
}

#[test]
fn test_cli_variant_lists() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("cases.jsonl"),
        r#"{"article_id": "PMC1", "ground_truth": ["rs1799853", "rs4244285"], "extracted": ["rs1799853", "rs1045642"]}
"#,
    )
    .unwrap();

    let output = bin()
        .args([
            "variant-lists",
            "--cases",
            jsonl_glob(&dir).as_str(),
        ])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("F1=0.500"));
}

#[test]
fn test_report_format_flag_rejects_unknown() {
    assert!("pdf".parse::<ReportFormat>().is_err());
    let output = bin()
        .args(["evaluate", "--format", "pdf"])
        .output()
        .unwrap();
    assert!(!output.status.success());
}
