use anyhow::Result;
use log::{info, warn};
use regex::Regex;
use std::path::Path;

use crate::samples;
use crate::table::Table;

/// Fixed modification taxonomy. Ordered rules, first match wins; the
/// fucose/sialic combinations are mutually exclusive by complementary
/// negation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
pub enum PtmCategory {
    Fucosialylated,
    Fucosylated,
    Sialylated,
    Oligomannose,
    #[strum(to_string = "No PTM")]
    NoPtm,
    Other,
}

pub struct PtmClassifier {
    fucose: Regex,
    sialic: Regex,
    glycan_core: Regex,
    site_prefix: Regex,
    trailing_qualifier: Regex,
}

impl PtmClassifier {
    pub fn new() -> PtmClassifier {
        PtmClassifier {
            fucose: Regex::new(r"dHex|Fucos|Biantennary").expect("static regex"),
            sialic: Regex::new(r"NeuGc|NeuAc|Kdn|Neuraminic").expect("static regex"),
            glycan_core: Regex::new(r"HexNAc|N\-linked\sglycan\score").expect("static regex"),
            site_prefix: Regex::new(r"^\s*\d+\s*:\s*").expect("static regex"),
            trailing_qualifier: Regex::new(r"[\s,;]*(?i:true|false)\s*$").expect("static regex"),
        }
    }

    /// Strip the site-index prefix and the trailing true/false qualifier the
    /// search engine appends, leaving the canonical modification string.
    pub fn clean(&self, raw: &str) -> String {
        let no_prefix = self.site_prefix.replace(raw.trim(), "");
        self.trailing_qualifier
            .replace(&no_prefix, "")
            .trim()
            .to_string()
    }

    pub fn classify(&self, cleaned: &str) -> PtmCategory {
        if cleaned.trim().is_empty() || cleaned == "nan" {
            return PtmCategory::NoPtm;
        }
        let fucose = self.fucose.is_match(cleaned);
        let sialic = self.sialic.is_match(cleaned);
        match (fucose, sialic) {
            (true, true) => PtmCategory::Fucosialylated,
            (true, false) => PtmCategory::Fucosylated,
            (false, true) => PtmCategory::Sialylated,
            (false, false) => {
                if self.glycan_core.is_match(cleaned) {
                    PtmCategory::Oligomannose
                } else {
                    PtmCategory::Other
                }
            }
        }
    }
}

impl Default for PtmClassifier {
    fn default() -> Self {
        PtmClassifier::new()
    }
}

/// Rewrite every csv in the directory with the modification column cleaned
/// in place and the category appended as `new_col`. A file without the
/// modification column is wholly `No PTM`, not an error.
pub fn classify_files(dir: &Path, target_col: &str, new_col: &str) -> Result<()> {
    let classifier = PtmClassifier::new();
    for path in samples::csv_files(dir)? {
        let mut table = match Table::read(&path) {
            Ok(table) => table,
            Err(e) => {
                warn!("Skipping {:?} during classification: {}", path, e);
                continue;
            }
        };
        if table.column_index(new_col).is_some() {
            info!("{:?} already has '{}'", path, new_col);
            continue;
        }
        let categories = match table.column_index(target_col) {
            Some(column) => {
                let mut categories = Vec::with_capacity(table.len());
                for row in &mut table.rows {
                    let cleaned = classifier.clean(&row[column]);
                    categories.push(classifier.classify(&cleaned).to_string());
                    row[column] = cleaned;
                }
                categories
            }
            None => {
                warn!(
                    "Column '{}' not found in {:?}, classifying all rows as No PTM",
                    target_col, path
                );
                vec![PtmCategory::NoPtm.to_string(); table.len()]
            }
        };
        table.push_column(new_col, categories)?;
        table.write(&path)?;
        info!("{:?} overwritten with '{}'", path, new_col);
    }
    Ok(())
}
