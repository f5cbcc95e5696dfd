use anyhow::Result;
use log::{info, warn};
use std::collections::HashSet;
use std::path::Path;

use crate::config::{AnalysisMode, Columns};
use crate::samples;
use crate::summary::{self, SummaryRow};
use crate::table::Table;

/// One membership-filter pass: keep the rows whose `column` value is in
/// `allowed`, project the interest columns, write one artifact per input
/// file and a layered summary for the whole directory.
pub struct FilterPass<'a> {
    /// Appended to the sample name of each filtered artifact.
    pub suffix: &'a str,
    /// Column the membership test runs on.
    pub column: &'a str,
    pub allowed: &'a HashSet<String>,
}

pub struct FilterContext<'a> {
    pub columns: &'a Columns,
    pub mode: AnalysisMode,
    pub techniques: &'a [String],
    pub pools: &'a [String],
}

pub fn run_pass(
    input_dir: &Path,
    output_dir: &Path,
    pass: &FilterPass,
    ctx: &FilterContext,
) -> Result<Vec<SummaryRow>> {
    let mut rows = Vec::new();
    for path in samples::csv_files(input_dir)? {
        let name = samples::sample_name(&path);
        if name.contains("summary") {
            continue;
        }
        match filter_one(&path, output_dir, pass, ctx) {
            Ok(row) => rows.push(row),
            Err(e) => warn!("Skipping {:?} during filtering: {}", path, e),
        }
    }
    // Degenerate-but-valid: an empty input directory still writes its
    // (empty) summary tables.
    summary::write_summaries(&mut rows, ctx.mode, ctx.techniques, output_dir)?;
    Ok(rows)
}

fn filter_one(
    path: &Path,
    output_dir: &Path,
    pass: &FilterPass,
    ctx: &FilterContext,
) -> Result<SummaryRow> {
    let table = Table::read(path)?;
    let sample = samples::sample_name(path);
    let technique = samples::technique_of(&sample, ctx.techniques).unwrap_or("");
    let pool = samples::pool_of(&sample, ctx.pools).unwrap_or("");

    let filter_column = table.require_column(pass.column)?;
    let mut kept = Table::new(table.headers.clone());
    for row in &table.rows {
        if pass.allowed.contains(row[filter_column].trim()) {
            kept.rows.push(row.clone());
        }
    }
    let projected = kept.project(&ctx.columns.interest)?;
    let artifact = output_dir.join(format!("{}{}.csv", sample, pass.suffix));
    projected.write(&artifact)?;
    info!(
        "{}: {} of {} rows kept by '{}' membership",
        sample,
        projected.len(),
        table.len(),
        pass.column
    );

    let distinct = |t: &Table, column: &str| -> Result<usize> {
        Ok(t.distinct_count(t.require_column(column)?))
    };
    let n_proteins_total = distinct(&table, &ctx.columns.protein_name)?;
    let n_ptms_total = distinct(&table, &ctx.columns.modification)?;
    let n_peptides_total = distinct(&table, &ctx.columns.peptide_sequence)?;
    let n_proteins_filtered = distinct(&projected, &ctx.columns.protein_name)?;
    let n_ptms_filtered = distinct(&projected, &ctx.columns.modification)?;
    let n_peptides_filtered = distinct(&projected, &ctx.columns.peptide_sequence)?;

    Ok(SummaryRow {
        sample,
        technique: technique.to_string(),
        pool: pool.to_string(),
        n_proteins_total,
        n_ptms_total,
        n_peptides_total,
        n_proteins_filtered,
        n_ptms_filtered,
        n_peptides_filtered,
        pct_proteins: SummaryRow::ratio(n_proteins_filtered, n_proteins_total),
        pct_peptides: SummaryRow::ratio(n_peptides_filtered, n_peptides_total),
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::Columns;

    fn write_sample(dir: &Path, name: &str) {
        std::fs::write(
            dir.join(name),
            "Peptide Sequence;Prot Name;PTM;Accession;Peptide;PTM cluster\n\
             AAR;P12345;dHex(1);P12345;AA(x)R;Fucosylated\n\
             AAK;Q9XYZ0;;Q9XYZ0;AAK;No PTM\n\
             AAL;P12345;dHex(1);P12345;AAL;Fucosylated\n",
        )
        .unwrap();
    }

    fn ctx<'a>(
        columns: &'a Columns,
        techniques: &'a [String],
        pools: &'a [String],
    ) -> FilterContext<'a> {
        FilterContext {
            columns,
            mode: AnalysisMode::Unpooled,
            techniques,
            pools,
        }
    }

    #[test]
    fn test_membership_pass_and_summary() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write_sample(input.path(), "SEC_NO_POOL.csv");
        let columns = Columns::default();
        let techniques = vec!["SEC".to_string()];
        let pools = vec!["NO_POOL".to_string()];
        let allowed: HashSet<String> = ["P12345".to_string()].into_iter().collect();
        let pass = FilterPass {
            suffix: "_filtered_vcp",
            column: "Prot Name",
            allowed: &allowed,
        };
        let rows = run_pass(
            input.path(),
            output.path(),
            &pass,
            &ctx(&columns, &techniques, &pools),
        )
        .unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.technique, "SEC");
        assert_eq!(row.pool, "NO_POOL");
        assert_eq!(row.n_proteins_total, 2);
        assert_eq!(row.n_proteins_filtered, 1);
        assert_eq!(row.n_peptides_total, 3);
        assert_eq!(row.n_peptides_filtered, 2);
        // filter conservation
        assert!(row.n_proteins_filtered <= row.n_proteins_total);
        assert!(row.pct_proteins >= 0.0 && row.pct_proteins <= 100.0);

        let artifact = output.path().join("SEC_NO_POOL_filtered_vcp.csv");
        let filtered = Table::read(&artifact).unwrap();
        assert_eq!(filtered.len(), 2);
        assert!(output.path().join("summary_all.csv").exists());
    }

    #[test]
    fn test_empty_directory_writes_empty_summary() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let columns = Columns::default();
        let allowed = HashSet::new();
        let pass = FilterPass {
            suffix: "_filtered_vcp",
            column: "Prot Name",
            allowed: &allowed,
        };
        let rows = run_pass(input.path(), output.path(), &pass, &ctx(&columns, &[], &[])).unwrap();
        assert!(rows.is_empty());
        let summary = Table::read(output.path().join("summary_all.csv")).unwrap();
        assert!(summary.is_empty());
    }

    #[test]
    fn test_missing_filter_column_skips_file() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        std::fs::write(input.path().join("SEC_NO_POOL.csv"), "Other\nx\n").unwrap();
        let columns = Columns::default();
        let allowed = HashSet::new();
        let pass = FilterPass {
            suffix: "_filtered_vcp",
            column: "Prot Name",
            allowed: &allowed,
        };
        let rows = run_pass(input.path(), output.path(), &pass, &ctx(&columns, &[], &[])).unwrap();
        assert!(rows.is_empty());
    }
}
