//! Field-specification table and evaluation settings.
//!
//! Handles YAML loading of the per-field comparison strategy and weight.
//! The table is resolved and validated once per run; every later stage
//! works with the typed [`FieldTable`] and never re-reads configuration.

use crate::record::{AnnotationField, UnknownField};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML configuration: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Field table is empty")]
    EmptyFieldTable,

    #[error(transparent)]
    UnknownField(#[from] UnknownField),

    #[error("Field listed more than once: {0}")]
    DuplicateField(AnnotationField),

    #[error("Weight for field {field} must be a positive finite number, got {weight}")]
    InvalidWeight { field: String, weight: f64 },

    #[error("Invalid comparison strategy: {0}")]
    InvalidStrategy(String),

    #[error("Invalid setting {name}: {reason}")]
    InvalidSetting { name: &'static str, reason: String },
}

/// How a field's two values are compared
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonStrategy {
    /// Case-insensitive, whitespace-normalized equality
    Exact,
    /// Variant token sets, tiered Exact / Partial / No Match
    FuzzySet,
    /// Word-set similarity for free text
    SemanticText,
}

impl std::str::FromStr for ComparisonStrategy {
    type Err = ConfigError;

    /// Parse strategy from string
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidStrategy` if the string doesn't match a known strategy.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "exact" | "exact_match" => Ok(Self::Exact),
            "fuzzy_set" | "fuzzy-set" | "fuzzy" => Ok(Self::FuzzySet),
            "semantic_text" | "semantic-text" | "semantic" => Ok(Self::SemanticText),
            _ => Err(ConfigError::InvalidStrategy(s.to_string())),
        }
    }
}

impl std::fmt::Display for ComparisonStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Exact => "exact",
            Self::FuzzySet => "fuzzy_set",
            Self::SemanticText => "semantic_text",
        })
    }
}

/// Run-wide evaluation settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvalSettings {
    /// A field "appears in mismatch" when its score is below this
    #[serde(default = "default_mismatch_threshold")]
    pub mismatch_threshold: f64,
    /// Drop stop words and very short tokens in free-text comparison
    #[serde(default)]
    pub drop_stop_words: bool,
    /// Bootstrap resamples for the corpus score interval (0 disables)
    #[serde(default = "default_bootstrap_n")]
    pub bootstrap_n: usize,
    /// Confidence level of the interval
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    /// Random seed for reproducibility
    #[serde(default = "default_seed")]
    pub seed: u64,
}

const fn default_mismatch_threshold() -> f64 {
    1.0
}
const fn default_bootstrap_n() -> usize {
    1000
}
const fn default_confidence() -> f64 {
    0.95
}
const fn default_seed() -> u64 {
    42
}
const fn default_backfill_gene() -> bool {
    true
}

impl Default for EvalSettings {
    fn default() -> Self {
        Self {
            mismatch_threshold: default_mismatch_threshold(),
            drop_stop_words: false,
            bootstrap_n: default_bootstrap_n(),
            confidence: default_confidence(),
            seed: default_seed(),
        }
    }
}

impl EvalSettings {
    /// Check value ranges
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidSetting` for out-of-range values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.mismatch_threshold > 0.0 && self.mismatch_threshold <= 1.0) {
            return Err(ConfigError::InvalidSetting {
                name: "mismatch_threshold",
                reason: format!("must be in (0, 1], got {}", self.mismatch_threshold),
            });
        }
        if !(self.confidence > 0.0 && self.confidence < 1.0) {
            return Err(ConfigError::InvalidSetting {
                name: "confidence",
                reason: format!("must be in (0, 1), got {}", self.confidence),
            });
        }
        Ok(())
    }
}

/// One resolved field specification
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FieldSpec {
    /// Field being compared
    pub field: AnnotationField,
    /// Comparison strategy
    pub strategy: ComparisonStrategy,
    /// Relative weight in the sample aggregate
    pub weight: f64,
    /// Rewrite bare star alleles with the record's gene (fuzzy-set only)
    pub backfill_gene: bool,
}

impl FieldSpec {
    /// Create a spec with gene back-fill enabled
    #[must_use]
    pub const fn new(field: AnnotationField, strategy: ComparisonStrategy, weight: f64) -> Self {
        Self {
            field,
            strategy,
            weight,
            backfill_gene: true,
        }
    }

    /// Disable gene back-fill
    #[must_use]
    pub const fn without_backfill(mut self) -> Self {
        self.backfill_gene = false;
        self
    }
}

/// Field entry as written in YAML
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct FieldEntry {
    name: String,
    strategy: String,
    weight: f64,
    #[serde(default = "default_backfill_gene")]
    backfill_gene: bool,
}

/// Field table file layout
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct FieldTableFile {
    #[serde(default)]
    settings: EvalSettings,
    #[serde(default)]
    fields: Vec<FieldEntry>,
}

/// Validated, immutable field configuration for one run
#[derive(Debug, Clone, PartialEq)]
pub struct FieldTable {
    specs: Vec<FieldSpec>,
    settings: EvalSettings,
}

impl FieldTable {
    /// Build a table from resolved specs
    ///
    /// # Errors
    ///
    /// Returns an error if the table is empty, lists a field twice, carries
    /// a non-positive weight, or the settings are out of range.
    pub fn new(specs: Vec<FieldSpec>, settings: EvalSettings) -> Result<Self, ConfigError> {
        if specs.is_empty() {
            return Err(ConfigError::EmptyFieldTable);
        }
        let mut seen = HashSet::new();
        for spec in &specs {
            if !seen.insert(spec.field) {
                return Err(ConfigError::DuplicateField(spec.field));
            }
            if !(spec.weight.is_finite() && spec.weight > 0.0) {
                return Err(ConfigError::InvalidWeight {
                    field: spec.field.to_string(),
                    weight: spec.weight,
                });
            }
        }
        settings.validate()?;
        Ok(Self { specs, settings })
    }

    /// Load a field table from a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load a field table from a YAML string
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML cannot be parsed or validated.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let file: FieldTableFile = serde_yaml::from_str(yaml)?;
        let specs = file
            .fields
            .into_iter()
            .map(|entry| {
                let field: AnnotationField = entry.name.parse()?;
                let strategy: ComparisonStrategy = entry.strategy.parse()?;
                Ok(FieldSpec {
                    field,
                    strategy,
                    weight: entry.weight,
                    backfill_gene: entry.backfill_gene,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;
        Self::new(specs, file.settings)
    }

    /// Render back to YAML
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        let file = FieldTableFile {
            settings: self.settings.clone(),
            fields: self
                .specs
                .iter()
                .map(|s| FieldEntry {
                    name: s.field.to_string(),
                    strategy: s.strategy.to_string(),
                    weight: s.weight,
                    backfill_gene: s.backfill_gene,
                })
                .collect(),
        };
        Ok(serde_yaml::to_string(&file)?)
    }

    /// Replace the settings, keeping the specs
    ///
    /// # Errors
    ///
    /// Returns an error if the new settings are out of range.
    pub fn with_settings(mut self, settings: EvalSettings) -> Result<Self, ConfigError> {
        settings.validate()?;
        self.settings = settings;
        Ok(self)
    }

    /// Field specs in table order
    #[must_use]
    pub fn specs(&self) -> &[FieldSpec] {
        &self.specs
    }

    /// Run settings
    #[must_use]
    pub const fn settings(&self) -> &EvalSettings {
        &self.settings
    }

    /// Look up the spec for one field
    #[must_use]
    pub fn spec(&self, field: AnnotationField) -> Option<&FieldSpec> {
        self.specs.iter().find(|s| s.field == field)
    }

    /// Number of configured fields
    #[must_use]
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// Always false for a validated table
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Iterate over specs
    pub fn iter(&self) -> impl Iterator<Item = &FieldSpec> {
        self.specs.iter()
    }
}

impl Default for FieldTable {
    /// Built-in pharmacogenomic variant-annotation table
    fn default() -> Self {
        use AnnotationField as F;
        use ComparisonStrategy::{Exact, FuzzySet, SemanticText};

        Self {
            specs: vec![
                FieldSpec::new(F::Gene, FuzzySet, 1.0).without_backfill(),
                FieldSpec::new(F::Drugs, FuzzySet, 1.0).without_backfill(),
                FieldSpec::new(F::VariantHaplotypes, FuzzySet, 0.8),
                FieldSpec::new(F::Alleles, FuzzySet, 0.8),
                FieldSpec::new(F::ComparisonAllelesOrGenotypes, FuzzySet, 0.6),
                FieldSpec::new(F::MetabolizerTypes, Exact, 0.6),
                FieldSpec::new(F::Significance, Exact, 1.2),
                FieldSpec::new(F::DirectionOfEffect, Exact, 1.2),
                FieldSpec::new(F::IsIsNotAssociated, Exact, 1.0),
                FieldSpec::new(F::PhenotypeCategory, Exact, 1.0),
                FieldSpec::new(F::SpecialtyPopulation, Exact, 0.6),
                FieldSpec::new(F::PopulationPhenotypesOrDiseases, SemanticText, 0.6),
                FieldSpec::new(F::Sentence, SemanticText, 0.1),
                FieldSpec::new(F::Notes, SemanticText, 0.1),
            ],
            settings: EvalSettings::default(),
        }
    }
}

impl<'a> IntoIterator for &'a FieldTable {
    type Item = &'a FieldSpec;
    type IntoIter = std::slice::Iter<'a, FieldSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.specs.iter()
    }
}
