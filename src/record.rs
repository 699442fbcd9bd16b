//! Annotation records and the closed field schema.
//!
//! Records arrive from the ingestion side as flat JSON objects. They are
//! converted once into [`AnnotationRecord`], a struct with one explicit
//! [`FieldValue`] per schema field, so that "absent", "blank" and
//! "present" are distinct states rather than conventions on strings.

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Errors raised while turning raw JSON into records
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Record is not a JSON object (found {0})")]
    NotAMapping(&'static str),

    #[error("Pair is missing required key: {0}")]
    MissingKey(&'static str),

    #[error("Article identifier must be a non-empty string or number")]
    InvalidArticleId,
}

/// Unknown field name in configuration or on the command line
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown annotation field: {0}")]
pub struct UnknownField(pub String);

/// Every field of the schema-v1 variant annotation record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationField {
    Gene,
    Drugs,
    VariantHaplotypes,
    Alleles,
    ComparisonAllelesOrGenotypes,
    MetabolizerTypes,
    ComparisonMetabolizerTypes,
    Significance,
    DirectionOfEffect,
    IsIsNotAssociated,
    PhenotypeCategory,
    PdPkTerms,
    SpecialtyPopulation,
    PopulationTypes,
    PopulationPhenotypesOrDiseases,
    MultipleDrugsAndOr,
    IsPlural,
    Sentence,
    Notes,
}

impl AnnotationField {
    /// All fields in schema order
    pub const ALL: [Self; 19] = [
        Self::Gene,
        Self::Drugs,
        Self::VariantHaplotypes,
        Self::Alleles,
        Self::ComparisonAllelesOrGenotypes,
        Self::MetabolizerTypes,
        Self::ComparisonMetabolizerTypes,
        Self::Significance,
        Self::DirectionOfEffect,
        Self::IsIsNotAssociated,
        Self::PhenotypeCategory,
        Self::PdPkTerms,
        Self::SpecialtyPopulation,
        Self::PopulationTypes,
        Self::PopulationPhenotypesOrDiseases,
        Self::MultipleDrugsAndOr,
        Self::IsPlural,
        Self::Sentence,
        Self::Notes,
    ];

    /// Canonical snake_case name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gene => "gene",
            Self::Drugs => "drugs",
            Self::VariantHaplotypes => "variant_haplotypes",
            Self::Alleles => "alleles",
            Self::ComparisonAllelesOrGenotypes => "comparison_alleles_or_genotypes",
            Self::MetabolizerTypes => "metabolizer_types",
            Self::ComparisonMetabolizerTypes => "comparison_metabolizer_types",
            Self::Significance => "significance",
            Self::DirectionOfEffect => "direction_of_effect",
            Self::IsIsNotAssociated => "is_is_not_associated",
            Self::PhenotypeCategory => "phenotype_category",
            Self::PdPkTerms => "pd_pk_terms",
            Self::SpecialtyPopulation => "specialty_population",
            Self::PopulationTypes => "population_types",
            Self::PopulationPhenotypesOrDiseases => "population_phenotypes_or_diseases",
            Self::MultipleDrugsAndOr => "multiple_drugs_and_or",
            Self::IsPlural => "is_plural",
            Self::Sentence => "sentence",
            Self::Notes => "notes",
        }
    }
}

impl AnnotationField {
    /// Column headers of the curated annotation tables that name this field
    #[must_use]
    pub const fn aliases(self) -> &'static [&'static str] {
        match self {
            Self::Gene => &["Gene"],
            Self::Drugs => &["Drug(s)", "drug(s)"],
            Self::VariantHaplotypes => &["Variant/Haplotypes", "variant/haplotypes"],
            Self::Alleles => &["Alleles"],
            Self::ComparisonAllelesOrGenotypes => &["Comparison Allele(s) or Genotype(s)"],
            Self::MetabolizerTypes => &["Metabolizer types", "metabolizer types"],
            Self::ComparisonMetabolizerTypes => &["Comparison Metabolizer types"],
            Self::Significance => &["Significance"],
            Self::DirectionOfEffect => &["Direction of effect"],
            Self::IsIsNotAssociated => &["Is/Is Not associated"],
            Self::PhenotypeCategory => &["Phenotype Category", "phenotype category"],
            Self::PdPkTerms => &["PD/PK terms"],
            Self::SpecialtyPopulation => &["Specialty Population", "specialty population"],
            Self::PopulationTypes => &["Population types"],
            Self::PopulationPhenotypesOrDiseases => &["Population Phenotypes or diseases"],
            Self::MultipleDrugsAndOr => &["Multiple drugs And/or"],
            Self::IsPlural => &["isPlural"],
            Self::Sentence => &["Sentence"],
            Self::Notes => &["Notes"],
        }
    }

    /// Resolve a record key, exact snake_case name or column header
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|f| f.as_str() == key || f.aliases().contains(&key))
    }
}

impl fmt::Display for AnnotationField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AnnotationField {
    type Err = UnknownField;

    /// Parse a field from its snake_case name (case-insensitive, `-` accepted for `_`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('-', "_");
        Self::ALL
            .iter()
            .copied()
            .find(|f| f.as_str() == wanted)
            .ok_or_else(|| UnknownField(s.to_string()))
    }
}

/// One field value as handed over by ingestion
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FieldValue {
    /// Key missing or JSON null
    #[default]
    Absent,
    /// Empty or whitespace-only string
    Blank,
    /// Non-empty text
    Text(String),
    /// Numeric value
    Number(f64),
    /// A JSON value the engine cannot compare (objects, nested arrays)
    Invalid(String),
}

impl FieldValue {
    /// Build a text value, classifying blank strings
    #[must_use]
    pub fn text(s: impl Into<String>) -> Self {
        let s = s.into();
        if s.trim().is_empty() {
            Self::Blank
        } else {
            Self::Text(s)
        }
    }

    /// Convert a raw JSON value
    #[must_use]
    pub fn from_json(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Self::Absent,
            Value::String(s) => Self::text(s),
            Value::Bool(b) => Self::Text(b.to_string()),
            Value::Number(n) => n
                .as_f64()
                .map_or_else(|| Self::Invalid(n.to_string()), Self::Number),
            Value::Array(items) => {
                let mut parts = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::Null => {}
                        Value::String(s) if s.trim().is_empty() => {}
                        Value::String(s) => parts.push(s.trim().to_string()),
                        Value::Bool(b) => parts.push(b.to_string()),
                        Value::Number(n) => parts.push(n.to_string()),
                        other => return Self::Invalid(other.to_string()),
                    }
                }
                if parts.is_empty() {
                    Self::Blank
                } else {
                    Self::Text(parts.join(", "))
                }
            }
            Value::Object(_) => Self::Invalid(value.to_string()),
        }
    }

    /// Whether the value counts as missing for scoring purposes
    #[must_use]
    pub const fn is_missing(&self) -> bool {
        matches!(self, Self::Absent | Self::Blank)
    }

    /// Comparable text form; `None` for missing or invalid values
    #[must_use]
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Text(s) => Some(s.clone()),
            Self::Number(n) => Some(format_number(*n)),
            Self::Absent | Self::Blank | Self::Invalid(_) => None,
        }
    }

    /// Raw representation for diagnostics
    #[must_use]
    pub fn raw(&self) -> String {
        match self {
            Self::Absent | Self::Blank => String::new(),
            Self::Text(s) | Self::Invalid(s) => s.clone(),
            Self::Number(n) => format_number(*n),
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(Self::from_json(value))
    }
}

impl Serialize for FieldValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Absent => serializer.serialize_none(),
            Self::Blank => serializer.serialize_str(""),
            Self::Text(s) | Self::Invalid(s) => serializer.serialize_str(s),
            Self::Number(n) => serializer.serialize_f64(*n),
        }
    }
}

/// A schema-v1 variant annotation, ground truth or prediction
///
/// Accepts snake_case keys as well as the column headers of the curated
/// annotation tables (see [`AnnotationField::aliases`]). Keys outside the
/// schema are ignored. When several keys name the same field, a present
/// value beats a missing one, and among present values the snake_case key
/// wins over column headers, then headers in key order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnnotationRecord {
    pub gene: FieldValue,
    pub drugs: FieldValue,
    pub variant_haplotypes: FieldValue,
    pub alleles: FieldValue,
    pub comparison_alleles_or_genotypes: FieldValue,
    pub metabolizer_types: FieldValue,
    pub comparison_metabolizer_types: FieldValue,
    pub significance: FieldValue,
    pub direction_of_effect: FieldValue,
    pub is_is_not_associated: FieldValue,
    pub phenotype_category: FieldValue,
    pub pd_pk_terms: FieldValue,
    pub specialty_population: FieldValue,
    pub population_types: FieldValue,
    pub population_phenotypes_or_diseases: FieldValue,
    pub multiple_drugs_and_or: FieldValue,
    pub is_plural: FieldValue,
    pub sentence: FieldValue,
    pub notes: FieldValue,
}

impl AnnotationRecord {
    /// Decode a record from a raw JSON value
    ///
    /// # Errors
    ///
    /// Returns `RecordError::NotAMapping` if the value is not a JSON object.
    pub fn from_json(value: serde_json::Value) -> Result<Self, RecordError> {
        let serde_json::Value::Object(map) = value else {
            return Err(RecordError::NotAMapping(json_kind(&value)));
        };

        let mut candidates: BTreeMap<AnnotationField, Vec<(bool, FieldValue)>> = BTreeMap::new();
        for (key, raw) in map {
            if let Some(field) = AnnotationField::from_key(&key) {
                let canonical = key == field.as_str();
                candidates
                    .entry(field)
                    .or_default()
                    .push((canonical, FieldValue::from_json(raw)));
            }
        }

        let mut record = Self::default();
        for (field, values) in candidates {
            if values.len() > 1 {
                tracing::debug!(%field, keys = values.len(), "field named by several keys");
            }
            if let Some((_, value)) = values
                .into_iter()
                .min_by_key(|(canonical, value)| (value.is_missing(), !canonical))
            {
                *record.get_mut(field) = value;
            }
        }
        Ok(record)
    }

    /// Look up a field value
    #[must_use]
    pub const fn get(&self, field: AnnotationField) -> &FieldValue {
        match field {
            AnnotationField::Gene => &self.gene,
            AnnotationField::Drugs => &self.drugs,
            AnnotationField::VariantHaplotypes => &self.variant_haplotypes,
            AnnotationField::Alleles => &self.alleles,
            AnnotationField::ComparisonAllelesOrGenotypes => &self.comparison_alleles_or_genotypes,
            AnnotationField::MetabolizerTypes => &self.metabolizer_types,
            AnnotationField::ComparisonMetabolizerTypes => &self.comparison_metabolizer_types,
            AnnotationField::Significance => &self.significance,
            AnnotationField::DirectionOfEffect => &self.direction_of_effect,
            AnnotationField::IsIsNotAssociated => &self.is_is_not_associated,
            AnnotationField::PhenotypeCategory => &self.phenotype_category,
            AnnotationField::PdPkTerms => &self.pd_pk_terms,
            AnnotationField::SpecialtyPopulation => &self.specialty_population,
            AnnotationField::PopulationTypes => &self.population_types,
            AnnotationField::PopulationPhenotypesOrDiseases => {
                &self.population_phenotypes_or_diseases
            }
            AnnotationField::MultipleDrugsAndOr => &self.multiple_drugs_and_or,
            AnnotationField::IsPlural => &self.is_plural,
            AnnotationField::Sentence => &self.sentence,
            AnnotationField::Notes => &self.notes,
        }
    }

    /// Builder-style setter, mostly for tests and demos
    #[must_use]
    pub fn with(mut self, field: AnnotationField, value: FieldValue) -> Self {
        *self.get_mut(field) = value;
        self
    }

    fn get_mut(&mut self, field: AnnotationField) -> &mut FieldValue {
        match field {
            AnnotationField::Gene => &mut self.gene,
            AnnotationField::Drugs => &mut self.drugs,
            AnnotationField::VariantHaplotypes => &mut self.variant_haplotypes,
            AnnotationField::Alleles => &mut self.alleles,
            AnnotationField::ComparisonAllelesOrGenotypes => {
                &mut self.comparison_alleles_or_genotypes
            }
            AnnotationField::MetabolizerTypes => &mut self.metabolizer_types,
            AnnotationField::ComparisonMetabolizerTypes => &mut self.comparison_metabolizer_types,
            AnnotationField::Significance => &mut self.significance,
            AnnotationField::DirectionOfEffect => &mut self.direction_of_effect,
            AnnotationField::IsIsNotAssociated => &mut self.is_is_not_associated,
            AnnotationField::PhenotypeCategory => &mut self.phenotype_category,
            AnnotationField::PdPkTerms => &mut self.pd_pk_terms,
            AnnotationField::SpecialtyPopulation => &mut self.specialty_population,
            AnnotationField::PopulationTypes => &mut self.population_types,
            AnnotationField::PopulationPhenotypesOrDiseases => {
                &mut self.population_phenotypes_or_diseases
            }
            AnnotationField::MultipleDrugsAndOr => &mut self.multiple_drugs_and_or,
            AnnotationField::IsPlural => &mut self.is_plural,
            AnnotationField::Sentence => &mut self.sentence,
            AnnotationField::Notes => &mut self.notes,
        }
    }

    /// Number of fields carrying a non-missing value
    #[must_use]
    pub fn populated_fields(&self) -> usize {
        AnnotationField::ALL
            .iter()
            .filter(|f| !self.get(**f).is_missing())
            .count()
    }
}

impl<'de> Deserialize<'de> for AnnotationRecord {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Error;
        let value = serde_json::Value::deserialize(deserializer)?;
        Self::from_json(value).map_err(D::Error::custom)
    }
}

/// Ground truth and prediction for one article, already joined
#[derive(Debug, Clone, PartialEq)]
pub struct EvalPair {
    /// Article identifier (PMID or PMCID)
    pub article_id: String,
    /// Curated reference annotation
    pub ground_truth: AnnotationRecord,
    /// Extraction output under evaluation
    pub prediction: AnnotationRecord,
}

impl EvalPair {
    /// Create a pair from already-decoded records
    #[must_use]
    pub fn new(
        article_id: impl Into<String>,
        ground_truth: AnnotationRecord,
        prediction: AnnotationRecord,
    ) -> Self {
        Self {
            article_id: article_id.into(),
            ground_truth,
            prediction,
        }
    }

    /// Decode a pair object `{article_id, ground_truth, prediction}`
    ///
    /// # Errors
    ///
    /// Returns an error if the pair or either record is malformed.
    pub fn from_json(value: serde_json::Value) -> Result<Self, RecordError> {
        let serde_json::Value::Object(mut map) = value else {
            return Err(RecordError::NotAMapping(json_kind(&value)));
        };

        let article_id = match map.remove("article_id") {
            Some(serde_json::Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            Some(serde_json::Value::Number(n)) => n.to_string(),
            Some(_) => return Err(RecordError::InvalidArticleId),
            None => return Err(RecordError::MissingKey("article_id")),
        };
        let ground_truth = map
            .remove("ground_truth")
            .ok_or(RecordError::MissingKey("ground_truth"))?;
        let prediction = map
            .remove("prediction")
            .ok_or(RecordError::MissingKey("prediction"))?;

        Ok(Self {
            article_id,
            ground_truth: AnnotationRecord::from_json(ground_truth)?,
            prediction: AnnotationRecord::from_json(prediction)?,
        })
    }
}

/// Human name of a JSON value's kind, for error messages
#[must_use]
pub const fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
