use anyhow::{Context, Result};
use log::{info, warn};
use regex::Regex;
use std::path::Path;

use crate::samples;
use crate::table::Table;

/// Pull every accession matching `pattern` out of the raw accession column
/// and append them as `new_col`. A row with N matches explodes into N rows;
/// a row without a match is kept once with an empty value.
pub fn extract_accessions(dir: &Path, target_col: &str, new_col: &str, pattern: &str) -> Result<()> {
    let regex =
        Regex::new(pattern).with_context(|| format!("Invalid accession pattern: {pattern}"))?;
    for path in samples::csv_files(dir)? {
        let table = match Table::read(&path) {
            Ok(table) => table,
            Err(e) => {
                warn!("Skipping {:?} during accession extraction: {}", path, e);
                continue;
            }
        };
        if table.column_index(new_col).is_some() {
            info!("{:?} already has '{}'", path, new_col);
            continue;
        }
        let Some(column) = table.column_index(target_col) else {
            warn!("Column '{}' not found in {:?}", target_col, path);
            continue;
        };
        let mut exploded = Table::new(table.headers.clone());
        exploded.headers.push(new_col.to_string());
        for row in &table.rows {
            let matches: Vec<&str> = regex
                .find_iter(&row[column])
                .map(|m| m.as_str())
                .collect();
            if matches.is_empty() {
                let mut new_row = row.clone();
                new_row.push(String::new());
                exploded.rows.push(new_row);
            } else {
                for accession in matches {
                    let mut new_row = row.clone();
                    new_row.push(accession.to_string());
                    exploded.rows.push(new_row);
                }
            }
        }
        exploded.write(&path)?;
        info!("{:?} overwritten with new column '{}'", path, new_col);
    }
    Ok(())
}

/// Append a cleaned peptide column with everything matching `pattern`
/// (modification annotations in parentheses) removed.
pub fn clean_peptides(dir: &Path, target_col: &str, new_col: &str, pattern: &str) -> Result<()> {
    let regex =
        Regex::new(pattern).with_context(|| format!("Invalid peptide pattern: {pattern}"))?;
    for path in samples::csv_files(dir)? {
        let mut table = match Table::read(&path) {
            Ok(table) => table,
            Err(e) => {
                warn!("Skipping {:?} during peptide cleaning: {}", path, e);
                continue;
            }
        };
        if table.column_index(new_col).is_some() {
            info!("{:?} already has '{}'", path, new_col);
            continue;
        }
        let Some(column) = table.column_index(target_col) else {
            warn!("Column '{}' not found in {:?}", target_col, path);
            continue;
        };
        let cleaned: Vec<String> = table
            .rows
            .iter()
            .map(|row| regex.replace_all(&row[column], "").to_string())
            .collect();
        table.push_column(new_col, cleaned)?;
        table.write(&path)?;
        info!("{:?} overwritten with '{}'", path, new_col);
    }
    Ok(())
}
