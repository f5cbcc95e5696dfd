use anyhow::Result;
use itertools::Itertools;
use log::{info, warn};
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;

use crate::samples;
use crate::table::Table;

fn counts_to_table(counts: HashMap<String, usize>) -> Table {
    let total: usize = counts.values().sum();
    let mut table = Table::new(
        ["Value", "Count", "Percentage"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
    );
    for (value, count) in counts
        .into_iter()
        .sorted_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)))
    {
        let percentage = if total == 0 {
            0.0
        } else {
            100.0 * count as f64 / total as f64
        };
        table
            .rows
            .push(vec![value, count.to_string(), format!("{}", percentage)]);
    }
    table
}

/// Per (file, column): value frequencies with percentage-of-total, one
/// artifact per pair.
pub fn value_counts(input_dir: &Path, output_dir: &Path, columns: &[String]) -> Result<()> {
    for path in samples::csv_files(input_dir)? {
        let sample = samples::sample_name(&path);
        if sample.contains("summary") {
            continue;
        }
        let table = match Table::read(&path) {
            Ok(table) => table,
            Err(e) => {
                warn!("Skipping {:?} during value counts: {}", path, e);
                continue;
            }
        };
        for column in columns {
            let Some(index) = table.column_index(column) else {
                warn!("Column '{}' not found in {}", column, sample);
                continue;
            };
            let mut counts: HashMap<String, usize> = HashMap::new();
            for row in &table.rows {
                let value = row[index].trim();
                if value.is_empty() {
                    continue;
                }
                *counts.entry(value.to_string()).or_insert(0) += 1;
            }
            counts_to_table(counts).write(output_dir.join(format!("{sample}_{column}.csv")))?;
        }
        info!("Wrote value counts for {}", sample);
    }
    Ok(())
}

/// Second-order count: how many distinct groups (proteins) exhibit each
/// modification category. Every group contributes exactly once, through its
/// most frequent category, so the counts sum to the number of groups.
pub fn category_by_group(
    input_dir: &Path,
    output_dir: &Path,
    group_col: &str,
    category_col: &str,
) -> Result<()> {
    let non_word = Regex::new(r"\W").expect("static regex");
    for path in samples::csv_files(input_dir)? {
        let sample = samples::sample_name(&path);
        if sample.contains("summary") {
            continue;
        }
        let table = match Table::read(&path) {
            Ok(table) => table,
            Err(e) => {
                warn!("Skipping {:?} during grouped counts: {}", path, e);
                continue;
            }
        };
        let Some(group_index) = table.column_index(group_col) else {
            warn!("Grouping column '{}' not found in {}", group_col, sample);
            continue;
        };
        let Some(category_index) = table.column_index(category_col) else {
            warn!("Category column '{}' not found in {}", category_col, sample);
            continue;
        };

        // per-group category tallies, empty group keys dropped
        let mut per_group: HashMap<String, HashMap<String, usize>> = HashMap::new();
        for row in &table.rows {
            let group = row[group_index].trim();
            if group.is_empty() {
                continue;
            }
            *per_group
                .entry(group.to_string())
                .or_default()
                .entry(row[category_index].trim().to_string())
                .or_insert(0) += 1;
        }
        let mut group_counts: HashMap<String, usize> = HashMap::new();
        for tallies in per_group.values() {
            // most frequent category wins; ties go to the lexicographically
            // smallest name so reruns agree
            let winner = tallies
                .iter()
                .sorted_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)))
                .next()
                .map(|(category, _)| category.clone());
            if let Some(winner) = winner {
                let cleaned = non_word.replace_all(&winner, "").to_string();
                *group_counts.entry(cleaned).or_insert(0) += 1;
            }
        }
        counts_to_table(group_counts)
            .write(output_dir.join(format!("{sample}_PTM_types_by_protein.csv")))?;
        info!("Wrote grouped category counts for {}", sample);
    }
    Ok(())
}
