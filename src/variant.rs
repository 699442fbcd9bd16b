//! Variant string normalization.
//!
//! Turns free-form variant, haplotype, and genotype strings into sets of
//! canonical tokens that can be compared as sets:
//!
//! | Input                    | Tokens                          |
//! |--------------------------|---------------------------------|
//! | `"*1/*18"` + `CYP2C19`   | `CYP2C19*1`, `CYP2C19*18`       |
//! | `"CYP2C19*1, CYP2C19*2"` | `CYP2C19*1`, `CYP2C19*2`        |
//! | `"CYP2C19*2-1234G>A"`    | `CYP2C19*2`, `1234G>A`          |
//! | `"RS4244285"`            | `rs4244285`                     |
//! | `"AA + AT"`              | `AA`, `AT`                      |
//! | `"HLA-B*58:01"`          | `HLA-B*58:01`                   |
//!
//! Parsing is a pure function of `(raw, gene)`. Malformed tokens are dropped
//! one at a time and reported; they never abort the whole value.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

#[allow(clippy::expect_used)]
static SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[,;|/+\s]+").expect("static regex"));

#[allow(clippy::expect_used)]
static RSID: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^rs(\d+)$").expect("static regex"));

#[allow(clippy::expect_used)]
static RSID_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^rs\d").expect("static regex"));

#[allow(clippy::expect_used)]
static GENE_SYMBOL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9-]*$").expect("static regex"));

#[allow(clippy::expect_used)]
static STAR_ALLELE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9]+(?::[A-Za-z0-9]+)*$").expect("static regex"));

#[allow(clippy::expect_used)]
static PLAIN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9.\-][A-Za-z0-9._:>()\[\]=\-]*$").expect("static regex")
});

#[allow(clippy::expect_used)]
static GENOTYPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:[ACGTU]+|del|ins|dup)$").expect("static regex"));

/// Characters stripped from both ends of every candidate token
const WRAPPERS: &[char] = &['"', '\'', '(', ')', '[', ']', '{', '}'];

/// A classified canonical token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum VariantToken {
    /// dbSNP identifier, lowercase `rs` prefix
    RsId(String),
    /// Star allele, with gene prefix when known
    StarAllele {
        gene: Option<String>,
        allele: String,
    },
    /// Positional change such as `1234G>A` or `C.681G>A`
    Change(String),
    /// Zygosity/genotype letters such as `TT` or `DEL`
    Genotype(String),
    /// Anything else that is well-formed (gene symbols, drug names)
    Plain(String),
}

impl VariantToken {
    /// Canonical comparable string
    #[must_use]
    pub fn canonical(&self) -> String {
        match self {
            Self::RsId(s) | Self::Change(s) | Self::Genotype(s) | Self::Plain(s) => s.clone(),
            Self::StarAllele {
                gene: Some(gene),
                allele,
            } => format!("{gene}*{allele}"),
            Self::StarAllele { gene: None, allele } => format!("*{allele}"),
        }
    }

    /// Whether this is a star allele without a gene prefix
    #[must_use]
    pub const fn is_bare_star(&self) -> bool {
        matches!(self, Self::StarAllele { gene: None, .. })
    }

    fn backfilled(self, gene: Option<&str>) -> Self {
        match (self, gene) {
            (Self::StarAllele { gene: None, allele }, Some(gene)) => Self::StarAllele {
                gene: Some(gene.to_string()),
                allele,
            },
            (token, _) => token,
        }
    }
}

/// Why a candidate token was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Only punctuation
    NoContent,
    /// `rs` followed by digits and then junk
    MalformedRsId,
    /// `*` with nothing usable after it
    MissingAlleleNumber,
    /// More than one `*`
    MultipleStars,
    /// Allele designation with unexpected characters
    MalformedStarAllele,
    /// Text before `*` is not a gene symbol
    MalformedGenePrefix,
    /// Characters outside the accepted token alphabet
    UnexpectedCharacters,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NoContent => "no alphanumeric content",
            Self::MalformedRsId => "malformed rsID",
            Self::MissingAlleleNumber => "star allele without allele designation",
            Self::MultipleStars => "more than one '*' in token",
            Self::MalformedStarAllele => "malformed star-allele designation",
            Self::MalformedGenePrefix => "gene prefix is not a gene symbol",
            Self::UnexpectedCharacters => "unexpected characters",
        })
    }
}

/// A dropped token and the reason
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedToken {
    pub token: String,
    pub reason: RejectReason,
}

impl fmt::Display for RejectedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}': {}", self.token, self.reason)
    }
}

/// Canonical token set for one raw value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedVariant(BTreeSet<String>);

impl NormalizedVariant {
    /// Borrow the token set
    #[must_use]
    pub const fn tokens(&self) -> &BTreeSet<String> {
        &self.0
    }

    /// Take the token set
    #[must_use]
    pub fn into_tokens(self) -> BTreeSet<String> {
        self.0
    }

    #[must_use]
    pub fn contains(&self, token: &str) -> bool {
        self.0.contains(token)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }
}

impl FromIterator<String> for NormalizedVariant {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Full parse result: classified tokens plus rejections
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedVariant {
    /// Classified tokens in input order (duplicates removed)
    pub tokens: Vec<VariantToken>,
    /// Candidate tokens that were dropped
    pub rejected: Vec<RejectedToken>,
    /// Gene used to back-fill bare star alleles, if any
    pub gene: Option<String>,
}

impl ParsedVariant {
    /// Canonical token set
    #[must_use]
    pub fn normalized(&self) -> NormalizedVariant {
        self.tokens.iter().map(VariantToken::canonical).collect()
    }

    /// No token survived, including blank or delimiter-only input
    #[must_use]
    pub fn is_unparseable(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Normalize a raw variant string into its canonical token set
#[must_use]
pub fn normalize(raw: &str, gene: Option<&str>) -> NormalizedVariant {
    parse(raw, gene).normalized()
}

/// Parse a raw variant string, keeping classification and rejections
///
/// Bare star alleles take their gene from the string itself when every
/// prefixed star allele in it names the same gene (`CYP2D6*1/*4`), and
/// from `gene` otherwise.
#[must_use]
pub fn parse(raw: &str, gene: Option<&str>) -> ParsedVariant {
    let mut classified = Vec::new();
    let mut parsed = ParsedVariant::default();

    for piece in SPLIT.split(raw) {
        let piece = piece.trim_matches(|c: char| WRAPPERS.contains(&c) || c.is_whitespace());
        if piece.is_empty() {
            continue;
        }
        match classify(piece) {
            Ok(tokens) => classified.extend(tokens),
            Err(reason) => {
                tracing::debug!(token = piece, %reason, "dropping malformed variant token");
                parsed.rejected.push(RejectedToken {
                    token: piece.to_string(),
                    reason,
                });
            }
        }
    }

    parsed.gene = backfill_gene(&classified).or_else(|| gene.and_then(canonical_gene));
    for token in classified {
        let token = token.backfilled(parsed.gene.as_deref());
        if !parsed.tokens.contains(&token) {
            parsed.tokens.push(token);
        }
    }

    if parsed.is_unparseable() {
        if parsed.rejected.is_empty() {
            tracing::debug!(raw, "variant string has no tokens");
        } else {
            tracing::warn!(raw, rejected = parsed.rejected.len(), "variant string is unparseable");
        }
    }

    parsed
}

/// The single gene named by prefixed star alleles, if exactly one is
fn backfill_gene(tokens: &[VariantToken]) -> Option<String> {
    let genes: BTreeSet<&str> = tokens
        .iter()
        .filter_map(|t| match t {
            VariantToken::StarAllele {
                gene: Some(gene), ..
            } => Some(gene.as_str()),
            _ => None,
        })
        .collect();
    match genes.len() {
        1 => genes.into_iter().next().map(str::to_string),
        _ => None,
    }
}

/// Uppercased gene symbol, or `None` if the value is not a single symbol
#[must_use]
pub fn canonical_gene(gene: &str) -> Option<String> {
    let gene = gene.trim();
    GENE_SYMBOL
        .is_match(gene)
        .then(|| gene.to_ascii_uppercase())
}

fn classify(token: &str) -> Result<Vec<VariantToken>, RejectReason> {
    if !token.chars().any(char::is_alphanumeric) {
        return Err(if token.contains('*') {
            RejectReason::MissingAlleleNumber
        } else {
            RejectReason::NoContent
        });
    }

    if let Some(caps) = RSID.captures(token) {
        return Ok(vec![VariantToken::RsId(format!("rs{}", &caps[1]))]);
    }
    if RSID_PREFIX.is_match(token) {
        return Err(RejectReason::MalformedRsId);
    }

    if token.contains('*') {
        return classify_star(token);
    }

    plain_token(token).map(|t| vec![t])
}

fn classify_star(token: &str) -> Result<Vec<VariantToken>, RejectReason> {
    if token.matches('*').count() > 1 {
        return Err(RejectReason::MultipleStars);
    }
    let (prefix, rest) = token.split_once('*').ok_or(RejectReason::MalformedStarAllele)?;

    // GENE*N-position-change: the change hangs off the first '-' after the star
    let (allele, change) = match rest.split_once('-') {
        Some((allele, change)) => (allele.trim(), Some(change.trim())),
        None => (rest.trim(), None),
    };

    if allele.is_empty() {
        return Err(RejectReason::MissingAlleleNumber);
    }
    if !STAR_ALLELE.is_match(allele) {
        return Err(RejectReason::MalformedStarAllele);
    }

    let prefix = prefix.trim();
    let star_gene = if prefix.is_empty() {
        None
    } else if GENE_SYMBOL.is_match(prefix) {
        Some(prefix.to_ascii_uppercase())
    } else {
        return Err(RejectReason::MalformedGenePrefix);
    };

    let mut tokens = vec![VariantToken::StarAllele {
        gene: star_gene,
        allele: allele.to_ascii_uppercase(),
    }];

    if let Some(change) = change {
        let change = change.trim_matches(|c: char| WRAPPERS.contains(&c) || c.is_whitespace());
        if !change.is_empty() {
            match classify_change(change) {
                Ok(t) => tokens.push(t),
                Err(reason) => {
                    tracing::debug!(token, change, %reason, "dropping positional change of compound allele");
                }
            }
        }
    }

    Ok(tokens)
}

fn classify_change(change: &str) -> Result<VariantToken, RejectReason> {
    if !change.chars().any(char::is_alphanumeric) {
        return Err(RejectReason::NoContent);
    }
    if let Some(caps) = RSID.captures(change) {
        return Ok(VariantToken::RsId(format!("rs{}", &caps[1])));
    }
    if RSID_PREFIX.is_match(change) {
        return Err(RejectReason::MalformedRsId);
    }
    match plain_token(change)? {
        VariantToken::Plain(s) | VariantToken::Genotype(s) => Ok(VariantToken::Change(s)),
        other => Ok(other),
    }
}

fn plain_token(token: &str) -> Result<VariantToken, RejectReason> {
    if !PLAIN.is_match(token) {
        return Err(RejectReason::UnexpectedCharacters);
    }
    let upper = token.to_ascii_uppercase();
    Ok(if GENOTYPE.is_match(token) {
        VariantToken::Genotype(upper)
    } else if token.contains('>') {
        VariantToken::Change(upper)
    } else {
        VariantToken::Plain(upper)
    })
}
