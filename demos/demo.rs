//! Demo: pgx-eval library in action
use pgx_eval::{
    aggregate, evaluate_variant_lists, parse, AnnotationField as F, AnnotationRecord,
    EvaluationReport, FieldTable, FieldValue, SampleScorer,
};

fn record(values: &[(F, &str)]) -> AnnotationRecord {
    values
        .iter()
        .fold(AnnotationRecord::default(), |r, (f, v)| r.with(*f, FieldValue::text(*v)))
}

fn main() {
    println!("=== PGx Eval Demo ===\n");

    // 1. Variant normalization
    println!("🧬 Normalizing variant strings...\n");
    for (raw, gene) in [
        ("*1/*18", Some("CYP2C19")),
        ("CYP2C19*2-681G>A + rs4244285", None),
        ("HLA-B*58:01", None),
        ("AA + AT", None),
        ("CYP2D6**4, ???", None),
    ] {
        let parsed = parse(raw, gene);
        let tokens: Vec<String> = parsed.tokens.iter().map(|t| t.canonical()).collect();
        println!("  {raw:<32} → {}", tokens.join(", "));
        for rejected in &parsed.rejected {
            println!("  {:<32}   dropped {rejected}", "");
        }
    }

    // 2. Variant-list contingency
    println!("\n📊 Variant-list extraction...\n");
    let c = evaluate_variant_lists(
        &["rs1799853", "rs4244285"],
        &["RS1799853", "rs1045642"],
        None,
    );
    let m = c.metrics();
    println!(
        "  TP={} FP={} FN={}  P={:.2} R={:.2} F1={:.2}",
        c.true_positives, c.false_positives, c.false_negatives, m.precision, m.recall, m.f1
    );

    // 3. Score annotation pairs
    println!("\n🔬 Scoring annotation pairs...\n");
    let table = FieldTable::default();
    let scorer = SampleScorer::new(table.clone());
    let samples = vec![
        scorer.score_sample(
            "PMC1",
            &record(&[
                (F::Gene, "CYP2C9"),
                (F::Significance, "yes"),
                (F::Alleles, "*1/*2"),
                (F::Sentence, "CYP2C9*2 decreases warfarin clearance"),
            ]),
            &record(&[
                (F::Gene, "CYP2C9"),
                (F::Significance, "yes"),
                (F::Alleles, "*2/*1"),
                (F::Sentence, "CYP2C9*2 is linked to lower warfarin clearance"),
            ]),
        ),
        scorer.score_sample(
            "PMC2",
            &record(&[
                (F::Gene, "CYP2C19"),
                (F::VariantHaplotypes, "*2, *3"),
                (F::DirectionOfEffect, "decreased"),
            ]),
            &record(&[
                (F::Gene, "CYP2C19"),
                (F::VariantHaplotypes, "CYP2C19*2"),
                (F::DirectionOfEffect, "increased"),
                (F::SpecialtyPopulation, "Pediatric"),
            ]),
        ),
    ];

    for sample in &samples {
        println!(
            "  {}: weighted {}",
            sample.article_id,
            sample
                .aggregate
                .map_or_else(|| "-".to_string(), |a| format!("{a:.3}"))
        );
        for score in sample.field_scores.iter().filter(|s| s.included) {
            println!(
                "    {:<22} {:.2}{}",
                score.field.to_string(),
                score.score,
                score.tier.map(|t| format!(" ({t})")).unwrap_or_default()
            );
        }
    }

    // 4. Corpus report
    println!("\n📋 Corpus report\n");
    let corpus = aggregate(samples, &table);
    let report = EvaluationReport::new("Demo", &table, "jaccard", corpus);
    println!("{}", report.to_text());

    println!("=== Demo Complete ===");
}
