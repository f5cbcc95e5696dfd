use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_valid::Validate;

use crate::reconcile::AmbiguityPolicy;

#[derive(Deserialize, Debug, Clone, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub input: Input,
    pub analysis: Analysis,
    #[serde(default)]
    pub columns: Columns,
    pub output: Output,
}

#[derive(Deserialize, Debug, Clone, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Input {
    /// Working directory with one delimiter-normalized csv per sample.
    /// Mutated in place (renames, merges, splits, column extensions).
    pub directory: String,
    /// Reference protein membership table. Must expose an `Accession` column.
    pub reference_proteins: String,
    /// Single-column allow-list of canonical modification names.
    pub modifications_of_interest: String,
}

fn validate_vocabularies(
    techniques: &[String],
    pools: &[String],
) -> Result<(), serde_valid::validation::Error> {
    if techniques
        .iter()
        .chain(pools.iter())
        .any(|e| e.trim().is_empty())
    {
        Err(serde_valid::validation::Error::Custom(
            "vocabulary entries must not be empty".to_string(),
        ))
    } else {
        Ok(())
    }
}

#[derive(Deserialize, Debug, Clone, Serialize, Validate)]
#[serde(deny_unknown_fields)]
#[validate(custom = |a| validate_vocabularies(&a.techniques, &a.pools))]
pub struct Analysis {
    pub pooled: bool,
    /// Ordered technique vocabulary. Empty means no technique distinction;
    /// the first entry sorts first in every summary table.
    #[serde(default)]
    pub techniques: Vec<String>,
    #[serde(default = "default_pools")]
    pub pools: Vec<String>,
    #[serde(default)]
    pub ambiguity: AmbiguityPolicy,
    /// Column holding the per-row pool index of a combined file (split only).
    #[serde(default)]
    pub pool_column: Option<String>,
    #[serde(default = "default_pool_pattern")]
    pub pool_pattern: String,
}

#[derive(Deserialize, Debug, Clone, Serialize)]
#[serde(deny_unknown_fields)]
#[serde(default)]
pub struct Columns {
    pub accession: String,
    pub protein_name: String,
    pub peptide: String,
    pub peptide_sequence: String,
    pub modification: String,
    pub category: String,
    pub group_by: String,
    pub accession_pattern: String,
    pub peptide_pattern: String,
    /// Columns projected into the filtered artifacts.
    pub interest: Vec<String>,
    /// Columns the value-count reports run over.
    pub counted: Vec<String>,
}

impl Default for Columns {
    fn default() -> Self {
        Columns {
            accession: "Accession".to_string(),
            protein_name: "Prot Name".to_string(),
            peptide: "Peptide".to_string(),
            peptide_sequence: "Peptide Sequence".to_string(),
            modification: "PTM".to_string(),
            category: "PTM cluster".to_string(),
            group_by: "Prot Name".to_string(),
            accession_pattern: DEFAULT_ACCESSION_PATTERN.to_string(),
            peptide_pattern: r"\([^)]*\)".to_string(),
            interest: [
                "Peptide Sequence",
                "Prot Name",
                "PTM",
                "Accession",
                "Peptide",
                "PTM cluster",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            counted: ["Prot Name", "PTM", "Peptide Sequence", "PTM cluster"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// UniProt-style accessions, e.g. P12345, Q9XYZ0, including isoform suffixes.
pub const DEFAULT_ACCESSION_PATTERN: &str =
    r"([A-Z]\d[A-Z0-9]{3}[0-9]-?\d*|[A-NR-Z][0-9][A-Z][A-Z0-9]{2}[0-9][A-Z]?[A-Z0-9]+[0-9])";

fn default_pools() -> Vec<String> {
    ["POOL_1", "POOL_2", "POOL_3", "NO_POOL", "POOLS_123"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_pool_pattern() -> String {
    r"(\d+)".to_string()
}

#[derive(Deserialize, Debug, Clone, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Output {
    pub directory: String,
}

/// The two configuration booleans collapsed into one variant, dispatched by
/// `match` wherever the file grouping or summary slicing differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum AnalysisMode {
    Unpooled,
    UnpooledByTechnique,
    PooledGeneric,
    PooledByTechnique,
}

impl AnalysisMode {
    pub fn from_flags(pooled: bool, has_techniques: bool) -> AnalysisMode {
        match (pooled, has_techniques) {
            (false, false) => AnalysisMode::Unpooled,
            (false, true) => AnalysisMode::UnpooledByTechnique,
            (true, false) => AnalysisMode::PooledGeneric,
            (true, true) => AnalysisMode::PooledByTechnique,
        }
    }

    pub fn is_pooled(&self) -> bool {
        matches!(
            self,
            AnalysisMode::PooledGeneric | AnalysisMode::PooledByTechnique
        )
    }

    /// One-line code written to the output root for downstream consumers.
    pub fn code(&self) -> &'static str {
        if self.is_pooled() { "1" } else { "2" }
    }
}

impl Config {
    pub fn mode(&self) -> AnalysisMode {
        AnalysisMode::from_flags(self.analysis.pooled, !self.analysis.techniques.is_empty())
    }

    pub fn check(&self) -> Result<()> {
        self.analysis.validate().map_err(|e| anyhow::anyhow!(e))?;
        if self.analysis.pooled && self.analysis.pools.is_empty() {
            bail!("Analysis is pooled but the pool vocabulary is empty");
        }
        for (name, pattern) in [
            ("pool_pattern", &self.analysis.pool_pattern),
            ("accession_pattern", &self.columns.accession_pattern),
            ("peptide_pattern", &self.columns.peptide_pattern),
        ] {
            regex::Regex::new(pattern)
                .with_context(|| format!("Invalid regex in {name}: {pattern}"))?;
        }
        if !std::path::Path::new(&self.input.directory).is_dir() {
            bail!("Input directory does not exist: {}", self.input.directory);
        }
        Ok(())
    }
}
