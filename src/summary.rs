use anyhow::Result;
use itertools::Itertools;
use std::path::Path;

use crate::config::AnalysisMode;
use crate::reconcile::{classify_pool_marker, PoolMarker};
use crate::table::Table;

/// One row of the filter summary: per-sample totals, filtered counts and
/// the derived percentage ratios.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    pub sample: String,
    pub technique: String,
    pub pool: String,
    pub n_proteins_total: usize,
    pub n_ptms_total: usize,
    pub n_peptides_total: usize,
    pub n_proteins_filtered: usize,
    pub n_ptms_filtered: usize,
    pub n_peptides_filtered: usize,
    pub pct_proteins: f64,
    pub pct_peptides: f64,
}

impl SummaryRow {
    /// Ratios are 0 exactly when the corresponding total is 0.
    pub fn ratio(filtered: usize, total: usize) -> f64 {
        if total == 0 {
            0.0
        } else {
            100.0 * filtered as f64 / total as f64
        }
    }
}

const HEADERS: [&str; 11] = [
    "Sample",
    "Technique",
    "Pool",
    "n Proteins Total",
    "n PTM Total",
    "n Peptides Total",
    "n Proteins Filtered",
    "n PTM Filtered",
    "n Peptides Filtered",
    "% Proteins with PTM / Total",
    "% Peptides with PTM / Total",
];

fn to_table(rows: &[&SummaryRow]) -> Table {
    let mut table = Table::new(HEADERS.iter().map(|s| s.to_string()).collect());
    for row in rows {
        table.rows.push(vec![
            row.sample.clone(),
            row.technique.clone(),
            row.pool.clone(),
            row.n_proteins_total.to_string(),
            row.n_ptms_total.to_string(),
            row.n_peptides_total.to_string(),
            row.n_proteins_filtered.to_string(),
            row.n_ptms_filtered.to_string(),
            row.n_peptides_filtered.to_string(),
            format!("{}", row.pct_proteins),
            format!("{}", row.pct_peptides),
        ]);
    }
    table
}

/// Grouped-ness comes from the filename marker, not the vocabulary tag: a
/// combined index run outside the pool vocabulary still slices as grouped.
fn is_grouped(row: &SummaryRow) -> bool {
    matches!(classify_pool_marker(&row.sample), PoolMarker::Combined)
}

fn is_unpooled(row: &SummaryRow) -> bool {
    matches!(classify_pool_marker(&row.sample), PoolMarker::None)
}

/// Sort the summary: the designated technique (first vocabulary entry)
/// first, the rest alphabetical, then by pool tag.
pub fn sort_rows(rows: &mut Vec<SummaryRow>, techniques: &[String]) {
    let designated = techniques.first().cloned().unwrap_or_default();
    rows.sort_by_key(|row| {
        (
            !(row.technique == designated && !designated.is_empty()),
            row.technique.clone(),
            row.pool.clone(),
            row.sample.clone(),
        )
    });
}

/// Write `summary_all.csv` plus the slices the analysis mode calls for.
pub fn write_summaries(
    rows: &mut Vec<SummaryRow>,
    mode: AnalysisMode,
    techniques: &[String],
    out_dir: &Path,
) -> Result<()> {
    sort_rows(rows, techniques);
    let all: Vec<&SummaryRow> = rows.iter().collect();
    to_table(&all).write(out_dir.join("summary_all.csv"))?;

    let slice = |keep: &dyn Fn(&SummaryRow) -> bool| -> Vec<&SummaryRow> {
        rows.iter().filter(|r| keep(r)).collect()
    };

    match mode {
        AnalysisMode::PooledByTechnique => {
            to_table(&slice(&is_grouped)).write(out_dir.join("summary_pools_123.csv"))?;
            to_table(&slice(&|r| is_grouped(r) || is_unpooled(r)))
                .write(out_dir.join("summary_123nopool.csv"))?;
            to_table(&slice(&|r| !is_grouped(r) && !is_unpooled(r)))
                .write(out_dir.join("summary_individual_pools.csv"))?;
        }
        AnalysisMode::PooledGeneric => {
            to_table(&slice(&is_grouped)).write(out_dir.join("summary_pools_combined.csv"))?;
            to_table(&slice(&|r| !is_grouped(r) && !is_unpooled(r)))
                .write(out_dir.join("summary_individual_pools.csv"))?;
        }
        AnalysisMode::UnpooledByTechnique => {
            for technique in techniques.iter().unique() {
                to_table(&slice(&|r| &r.technique == technique))
                    .write(out_dir.join(format!("summary_{technique}.csv")))?;
            }
        }
        AnalysisMode::Unpooled => {}
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    fn row(sample: &str, technique: &str, pool: &str) -> SummaryRow {
        SummaryRow {
            sample: sample.to_string(),
            technique: technique.to_string(),
            pool: pool.to_string(),
            n_proteins_total: 10,
            n_ptms_total: 5,
            n_peptides_total: 20,
            n_proteins_filtered: 5,
            n_ptms_filtered: 2,
            n_peptides_filtered: 10,
            pct_proteins: 50.0,
            pct_peptides: 50.0,
        }
    }

    #[test]
    fn test_ratio_zero_total() {
        assert_eq!(SummaryRow::ratio(0, 0), 0.0);
        assert_eq!(SummaryRow::ratio(5, 10), 50.0);
        assert_eq!(SummaryRow::ratio(10, 10), 100.0);
    }

    #[test]
    fn test_designated_technique_sorts_first() {
        let techniques: Vec<String> = ["ExoGAG", "SEC", "IP_CD9", "UC"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mut rows = vec![
            row("a", "SEC", "POOL_1"),
            row("b", "ExoGAG", "POOL_2"),
            row("c", "IP_CD9", "POOL_1"),
            row("d", "ExoGAG", "POOL_1"),
        ];
        sort_rows(&mut rows, &techniques);
        assert_eq!(rows[0].sample, "d");
        assert_eq!(rows[1].sample, "b");
        assert_eq!(rows[2].sample, "c");
        assert_eq!(rows[3].sample, "a");
    }

    #[test]
    fn test_pooled_by_technique_slices() {
        let dir = tempfile::tempdir().unwrap();
        let mut rows = vec![
            row("SEC_POOLS_123", "SEC", "POOLS_123"),
            row("SEC_NO_POOL", "SEC", "NO_POOL"),
            row("SEC_POOL_1", "SEC", "POOL_1"),
        ];
        write_summaries(
            &mut rows,
            AnalysisMode::PooledByTechnique,
            &["SEC".to_string()],
            dir.path(),
        )
        .unwrap();
        let grouped = Table::read(dir.path().join("summary_pools_123.csv")).unwrap();
        assert_eq!(grouped.len(), 1);
        let grouped_nopool = Table::read(dir.path().join("summary_123nopool.csv")).unwrap();
        assert_eq!(grouped_nopool.len(), 2);
        let individual = Table::read(dir.path().join("summary_individual_pools.csv")).unwrap();
        assert_eq!(individual.len(), 1);
        let all = Table::read(dir.path().join("summary_all.csv")).unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_combined_file_outside_pool_vocabulary_is_grouped() {
        let dir = tempfile::tempdir().unwrap();
        // POOLS_12 is not in the default pool vocabulary, so its tag is empty
        let mut rows = vec![
            row("SEC_POOLS_12", "SEC", ""),
            row("SEC_POOL_1", "SEC", "POOL_1"),
        ];
        write_summaries(
            &mut rows,
            AnalysisMode::PooledByTechnique,
            &["SEC".to_string()],
            dir.path(),
        )
        .unwrap();
        let grouped = Table::read(dir.path().join("summary_pools_123.csv")).unwrap();
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped.rows[0][0], "SEC_POOLS_12");
        let individual = Table::read(dir.path().join("summary_individual_pools.csv")).unwrap();
        assert_eq!(individual.len(), 1);
        assert_eq!(individual.rows[0][0], "SEC_POOL_1");
    }

    #[test]
    fn test_unpooled_modes() {
        let dir = tempfile::tempdir().unwrap();
        let mut rows = vec![
            row("SEC_NO_POOL", "SEC", "NO_POOL"),
            row("UC_NO_POOL", "UC", "NO_POOL"),
        ];
        write_summaries(
            &mut rows,
            AnalysisMode::UnpooledByTechnique,
            &["SEC".to_string(), "UC".to_string()],
            dir.path(),
        )
        .unwrap();
        assert!(dir.path().join("summary_SEC.csv").exists());
        assert!(dir.path().join("summary_UC.csv").exists());

        let dir2 = tempfile::tempdir().unwrap();
        let mut rows = vec![row("sample_NO_POOL", "", "NO_POOL")];
        write_summaries(&mut rows, AnalysisMode::Unpooled, &[], dir2.path()).unwrap();
        assert!(dir2.path().join("summary_all.csv").exists());
        assert!(!dir2.path().join("summary_individual_pools.csv").exists());
    }
}
