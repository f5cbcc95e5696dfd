use anyhow::{Context, Result};
use itertools::Itertools;
use log::{info, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::{Analysis, AnalysisMode};
use crate::samples;
use crate::table::Table;

/// What to do with the working file-set, derived from which kinds of pool
/// files are present (individual vs already-combined).
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum ReconcileAction {
    Combine,
    Split,
    Nothing,
}

/// Resolution for the ambiguous state where both individual and combined
/// files are present. Injected configuration, never an interactive prompt.
#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum AmbiguityPolicy {
    #[serde(alias = "combine")]
    Combine,
    #[serde(alias = "split")]
    Split,
    /// Pick whichever action touches the larger file count.
    #[serde(alias = "auto")]
    #[default]
    Auto,
}

pub fn decide(
    individual_count: usize,
    combined_count: usize,
    policy: AmbiguityPolicy,
) -> ReconcileAction {
    match (individual_count > 0, combined_count > 0) {
        (true, false) => ReconcileAction::Combine,
        (false, true) => ReconcileAction::Split,
        (false, false) => ReconcileAction::Nothing,
        (true, true) => match policy {
            AmbiguityPolicy::Combine => ReconcileAction::Combine,
            AmbiguityPolicy::Split => ReconcileAction::Split,
            AmbiguityPolicy::Auto => {
                if individual_count >= combined_count {
                    ReconcileAction::Combine
                } else {
                    ReconcileAction::Split
                }
            }
        },
    }
}

#[derive(Debug, Default)]
pub struct PoolScan {
    /// (file, pool index)
    pub individual: Vec<(PathBuf, u32)>,
    pub combined: Vec<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolMarker {
    Individual(u32),
    Combined,
    None,
}

/// A pool marker followed by a single index digit is an individual pool
/// file; the `POOLS` qualifier or a multi-digit index run marks a file
/// already merged across pools. `NO_POOL` is neither.
pub fn classify_pool_marker(name: &str) -> PoolMarker {
    if name.contains("NO_POOL") {
        return PoolMarker::None;
    }
    let re = Regex::new(r"POOL(S?)_?(\d+)").expect("static regex");
    let Some(caps) = re.captures(name) else {
        return PoolMarker::None;
    };
    let qualifier = &caps[1];
    let digits = &caps[2];
    if qualifier == "S" || digits.len() > 1 {
        PoolMarker::Combined
    } else {
        PoolMarker::Individual(digits.parse().unwrap_or(0))
    }
}

pub fn scan_pools(dir: &Path) -> Result<PoolScan> {
    let mut scan = PoolScan::default();
    for path in samples::csv_files(dir)? {
        let name = samples::sample_name(&path);
        match classify_pool_marker(&name) {
            PoolMarker::Individual(index) => scan.individual.push((path, index)),
            PoolMarker::Combined => scan.combined.push(path),
            PoolMarker::None => {}
        }
    }
    Ok(scan)
}

/// Normalize the working file-set according to the analysis mode. Returns
/// the action that was performed.
pub fn reconcile(dir: &Path, analysis: &Analysis, mode: AnalysisMode) -> Result<ReconcileAction> {
    if !mode.is_pooled() {
        return Ok(ReconcileAction::Nothing);
    }
    let scan = scan_pools(dir)?;
    let action = decide(scan.individual.len(), scan.combined.len(), analysis.ambiguity);
    match action {
        ReconcileAction::Combine => combine(dir, &scan, &analysis.techniques)?,
        ReconcileAction::Split => split(dir, &scan, analysis)?,
        ReconcileAction::Nothing => info!("No pool evidence in {:?}, nothing to reconcile", dir),
    }
    Ok(action)
}

/// Concatenate individual pool files into one combined file per technique
/// (or one global file without techniques), rows sorted by ascending pool
/// index. Never reads already-combined files, so re-running is a no-op.
pub fn combine(dir: &Path, scan: &PoolScan, techniques: &[String]) -> Result<()> {
    if techniques.is_empty() {
        combine_group(dir, None, &scan.individual)
    } else {
        for technique in techniques {
            let members: Vec<(PathBuf, u32)> = scan
                .individual
                .iter()
                .filter(|(path, _)| {
                    samples::technique_of(&samples::sample_name(path), techniques)
                        == Some(technique.as_str())
                })
                .cloned()
                .collect();
            combine_group(dir, Some(technique), &members)?;
        }
        Ok(())
    }
}

fn combine_group(dir: &Path, technique: Option<&str>, members: &[(PathBuf, u32)]) -> Result<()> {
    if members.is_empty() {
        if let Some(technique) = technique {
            info!("No individual pool files for {}", technique);
        }
        return Ok(());
    }
    let sorted: Vec<&(PathBuf, u32)> = members
        .iter()
        .sorted_by_key(|(path, index)| (*index, path.clone()))
        .collect();
    let indices: String = sorted.iter().map(|(_, index)| index.to_string()).join("");
    let target_name = match technique {
        Some(technique) => format!("{technique}_POOLS_{indices}.csv"),
        None => format!("POOLS_{indices}.csv"),
    };
    let target = dir.join(&target_name);
    if target.exists() {
        warn!("Combined file {} already exists, skipping", target_name);
        return Ok(());
    }
    let mut combined: Option<Table> = None;
    for (path, index) in &sorted {
        let part = Table::read(path)
            .with_context(|| format!("Could not read pool file {:?}", path))?;
        info!("Pool {} from {:?}: {} rows", index, path, part.len());
        if let Some(acc) = combined.as_mut() {
            if let Err(e) = acc.append(&part) {
                warn!("Skipping {:?} during combine: {}", path, e);
            }
        } else {
            combined = Some(part);
        }
    }
    if let Some(combined) = combined {
        combined.write(&target)?;
        info!("Wrote {} with {} rows", target_name, combined.len());
    }
    Ok(())
}

/// Break combined files back into one file per distinct pool index, taken
/// from the configured pool column. The index column is dropped from the
/// outputs and the original is renamed to carry the explicit combined
/// marker.
pub fn split(dir: &Path, scan: &PoolScan, analysis: &Analysis) -> Result<()> {
    let pattern = Regex::new(&analysis.pool_pattern)
        .with_context(|| format!("Invalid pool pattern: {}", analysis.pool_pattern))?;
    let Some(pool_column) = analysis.pool_column.as_deref() else {
        warn!("No pool column configured, cannot split combined files");
        return Ok(());
    };
    for path in &scan.combined {
        if let Err(e) = split_one(dir, path, pool_column, &pattern) {
            warn!("Skipping {:?} during split: {}", path, e);
        }
    }
    Ok(())
}

fn split_one(dir: &Path, path: &Path, pool_column: &str, pattern: &Regex) -> Result<()> {
    let table = Table::read(path)?;
    let column = table.require_column(pool_column)?;
    let mut indices: Vec<String> = Vec::new();
    let mut row_indices: Vec<Option<String>> = Vec::new();
    for row in &table.rows {
        let index = pattern
            .captures(&row[column])
            .and_then(|caps| caps.get(1).or_else(|| caps.get(0)))
            .map(|m| m.as_str().to_string());
        if let Some(index) = &index {
            if !indices.contains(index) {
                indices.push(index.clone());
            }
        }
        row_indices.push(index);
    }
    indices.sort();
    let unmatched = row_indices.iter().filter(|i| i.is_none()).count();
    if unmatched > 0 {
        warn!(
            "{:?}: {} rows without a pool index in '{}' are left out of the split",
            path, unmatched, pool_column
        );
    }

    let stem = samples::sample_name(path);
    // Both combined-marker forms: the POOLS qualifier and the bare
    // multi-digit index run (cf. classify_pool_marker).
    let base = Regex::new(r"_?POOL(S_?\d*|_?\d{2,})")
        .expect("static regex")
        .replace(&stem, "")
        .to_string();
    for index in &indices {
        let target = dir.join(if base.is_empty() {
            format!("POOL_{index}.csv")
        } else {
            format!("{base}_POOL_{index}.csv")
        });
        if target.exists() {
            warn!("Split target {:?} already exists, skipping", target);
            continue;
        }
        let mut part = Table::new(table.headers.clone());
        for (row, row_index) in table.rows.iter().zip(&row_indices) {
            if row_index.as_deref() == Some(index.as_str()) {
                part.rows.push(row.clone());
            }
        }
        part.remove_column(column);
        part.write(&target)?;
        info!("Wrote {:?} with {} rows", target, part.len());
    }

    // Make the combined state explicit in the name if it is not already.
    let marked = if base.is_empty() {
        format!("POOLS_{}.csv", indices.join(""))
    } else {
        format!("{}_POOLS_{}.csv", base, indices.join(""))
    };
    if format!("{stem}.csv") != marked {
        let target = dir.join(&marked);
        if target.exists() {
            warn!("Not renaming {:?}: {} already exists", path, marked);
        } else {
            std::fs::rename(path, &target)
                .with_context(|| format!("Could not rename {:?} to {}", path, marked))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_decision_table() {
        let auto = AmbiguityPolicy::Auto;
        assert_eq!(decide(3, 0, auto), ReconcileAction::Combine);
        assert_eq!(decide(0, 1, auto), ReconcileAction::Split);
        assert_eq!(decide(0, 0, auto), ReconcileAction::Nothing);
        // ambiguous: auto picks the larger file count
        assert_eq!(decide(3, 1, auto), ReconcileAction::Combine);
        assert_eq!(decide(1, 2, auto), ReconcileAction::Split);
        assert_eq!(decide(3, 1, AmbiguityPolicy::Split), ReconcileAction::Split);
        assert_eq!(
            decide(1, 2, AmbiguityPolicy::Combine),
            ReconcileAction::Combine
        );
    }

    #[test]
    fn test_classify_pool_marker() {
        assert_eq!(classify_pool_marker("SEC_POOL_1"), PoolMarker::Individual(1));
        assert_eq!(classify_pool_marker("SEC_POOL2"), PoolMarker::Individual(2));
        assert_eq!(classify_pool_marker("SEC_POOLS_123"), PoolMarker::Combined);
        assert_eq!(classify_pool_marker("SEC_POOL_123"), PoolMarker::Combined);
        assert_eq!(classify_pool_marker("SEC_NO_POOL"), PoolMarker::None);
        assert_eq!(classify_pool_marker("SEC"), PoolMarker::None);
    }

    fn write_pool(dir: &Path, name: &str, rows: &[&str]) {
        let mut content = String::from("Accession;Peptide\n");
        for row in rows {
            content.push_str(row);
            content.push('\n');
        }
        std::fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn test_combine_sorts_by_pool_index_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let techniques = vec!["SEC".to_string()];
        write_pool(dir.path(), "SEC_POOL_2.csv", &["P2;AAK"]);
        write_pool(dir.path(), "SEC_POOL_1.csv", &["P1;AAR", "P1;AAL"]);

        let scan = scan_pools(dir.path()).unwrap();
        assert_eq!(scan.individual.len(), 2);
        combine(dir.path(), &scan, &techniques).unwrap();

        let combined = Table::read(dir.path().join("SEC_POOLS_12.csv")).unwrap();
        assert_eq!(combined.len(), 3);
        assert_eq!(combined.rows[0][0], "P1");
        assert_eq!(combined.rows[2][0], "P2");

        // second run: combined file exists, individuals still present, but
        // the combined file is never an input and the target is skipped
        let scan = scan_pools(dir.path()).unwrap();
        combine(dir.path(), &scan, &techniques).unwrap();
        let again = Table::read(dir.path().join("SEC_POOLS_12.csv")).unwrap();
        assert_eq!(again.len(), 3);
    }

    #[test]
    fn test_split_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("SEC_POOLS_12.csv"),
            "Accession;Peptide;Fraction\nP1;AAR;pool 1\nP2;AAK;pool 2\nP1;AAL;pool 1\n",
        )
        .unwrap();
        let analysis = Analysis {
            pooled: true,
            techniques: vec!["SEC".to_string()],
            pools: vec![],
            ambiguity: AmbiguityPolicy::Auto,
            pool_column: Some("Fraction".to_string()),
            pool_pattern: r"(\d+)".to_string(),
        };
        let scan = scan_pools(dir.path()).unwrap();
        split(dir.path(), &scan, &analysis).unwrap();

        let one = Table::read(dir.path().join("SEC_POOL_1.csv")).unwrap();
        let two = Table::read(dir.path().join("SEC_POOL_2.csv")).unwrap();
        assert_eq!(one.len(), 2);
        assert_eq!(two.len(), 1);
        assert_eq!(one.headers, vec!["Accession", "Peptide"]);

        // recombining reproduces the original row multiset
        let scan = scan_pools(dir.path()).unwrap();
        assert_eq!(scan.individual.len(), 2);
        assert_eq!(scan.combined.len(), 1);
    }

    #[test]
    fn test_split_multi_digit_marker_yields_individual_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("SEC_POOL_12.csv"),
            "Accession;Peptide;Fraction\nP1;AAR;1\nP2;AAK;2\n",
        )
        .unwrap();
        let analysis = Analysis {
            pooled: true,
            techniques: vec!["SEC".to_string()],
            pools: vec![],
            ambiguity: AmbiguityPolicy::Auto,
            pool_column: Some("Fraction".to_string()),
            pool_pattern: r"(\d+)".to_string(),
        };
        let scan = scan_pools(dir.path()).unwrap();
        assert_eq!(scan.combined.len(), 1);
        split(dir.path(), &scan, &analysis).unwrap();

        // the combined marker is stripped from the split outputs and the
        // original carries the explicit POOLS form
        assert!(dir.path().join("SEC_POOL_1.csv").exists());
        assert!(dir.path().join("SEC_POOL_2.csv").exists());
        assert!(dir.path().join("SEC_POOLS_12.csv").exists());
        assert!(!dir.path().join("SEC_POOL_12.csv").exists());
        let rescan = scan_pools(dir.path()).unwrap();
        assert_eq!(rescan.individual.len(), 2);
        assert_eq!(rescan.combined.len(), 1);
    }

    #[test]
    fn test_split_missing_column_is_non_fatal() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("SEC_POOLS_123.csv"),
            "Accession;Peptide\nP1;AAR\n",
        )
        .unwrap();
        let analysis = Analysis {
            pooled: true,
            techniques: vec![],
            pools: vec![],
            ambiguity: AmbiguityPolicy::Auto,
            pool_column: Some("Fraction".to_string()),
            pool_pattern: r"(\d+)".to_string(),
        };
        let scan = scan_pools(dir.path()).unwrap();
        split(dir.path(), &scan, &analysis).unwrap();
        assert!(dir.path().join("SEC_POOLS_123.csv").exists());
    }
}
