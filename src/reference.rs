use anyhow::{Context, Result};
use log::info;
use std::collections::HashSet;
use std::path::Path;

use crate::table::Table;

/// Reference protein membership table. Must expose an `Accession` column;
/// its absence is a configuration error, not a per-file one.
pub fn load_accession_set(path: &Path) -> Result<HashSet<String>> {
    let table = Table::read(path)
        .with_context(|| format!("Could not read reference protein table {:?}", path))?;
    let column = table
        .require_column("Accession")
        .with_context(|| format!("Reference protein table {:?}", path))?;
    let set: HashSet<String> = table
        .rows
        .iter()
        .map(|row| row[column].trim().to_string())
        .filter(|v| !v.is_empty())
        .collect();
    info!("Loaded {} reference accessions from {:?}", set.len(), path);
    Ok(set)
}

/// Modification-of-interest allow-list: first column of a single-column
/// table, empties dropped, deduplicated.
pub fn load_modification_set(path: &Path) -> Result<HashSet<String>> {
    let table = Table::read(path)
        .with_context(|| format!("Could not read modification list {:?}", path))?;
    if table.headers.is_empty() {
        anyhow::bail!("Modification list {:?} has no columns", path);
    }
    let set: HashSet<String> = table
        .rows
        .iter()
        .map(|row| row[0].trim().to_string())
        .filter(|v| !v.is_empty() && v != "nan")
        .collect();
    info!("Loaded {} modifications of interest from {:?}", set.len(), path);
    Ok(set)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_load_accession_set_requires_column() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("ref.csv");
        std::fs::write(&good, "Accession;Species\nP12345;human\nP12345;human\n;x\n").unwrap();
        let set = load_accession_set(&good).unwrap();
        assert_eq!(set.len(), 1);
        assert!(set.contains("P12345"));

        let bad = dir.path().join("bad.csv");
        std::fs::write(&bad, "Id\nP12345\n").unwrap();
        assert!(load_accession_set(&bad).is_err());
    }

    #[test]
    fn test_load_modification_set_dedupes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mods.csv");
        std::fs::write(&path, "PTM\ndHex(1)\ndHex(1)\nnan\n\n").unwrap();
        let set = load_modification_set(&path).unwrap();
        assert_eq!(set.len(), 1);
    }
}
