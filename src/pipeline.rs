use anyhow::{Context, Result};
use log::info;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::filter::{self, FilterContext, FilterPass};
use crate::{classify, counts, extract, reconcile, reference, samples};

struct OutputLayout {
    root: PathBuf,
    filtered_reference: PathBuf,
    filtered_glycosylated: PathBuf,
    counts_total: PathBuf,
    counts_reference: PathBuf,
    counts_glycosylated: PathBuf,
}

/// Three-branch output scaffold: filtered data, value counts, figures
/// placeholder for the downstream plotting stage.
fn create_output_layout(root: &Path) -> Result<OutputLayout> {
    let layout = OutputLayout {
        root: root.to_path_buf(),
        filtered_reference: root.join("1_filtered_dfs/vesiclepedia"),
        filtered_glycosylated: root.join("1_filtered_dfs/vesiclepedia_glycosylated"),
        counts_total: root.join("2_value_counts/total"),
        counts_reference: root.join("2_value_counts/vesiclepedia"),
        counts_glycosylated: root.join("2_value_counts/vesiclepedia_glycosylated"),
    };
    for dir in [&layout.filtered_reference, &layout.filtered_glycosylated] {
        ex::fs::create_dir_all(dir)
            .with_context(|| format!("Could not create output directory {:?}", dir))?;
    }
    for dir in [
        &layout.counts_total,
        &layout.counts_reference,
        &layout.counts_glycosylated,
    ] {
        for branch in ["peptides", "proteins"] {
            ex::fs::create_dir_all(dir.join(branch))
                .with_context(|| format!("Could not create output directory {:?}", dir))?;
        }
    }
    ex::fs::create_dir_all(root.join("3_figures"))
        .context("Could not create figures directory")?;
    Ok(layout)
}

pub fn run(config: &Config) -> Result<()> {
    let mode = config.mode();
    info!("Analysis mode: {}", mode);

    // Fatal if the reference artifacts are absent or malformed.
    let reference_set = reference::load_accession_set(Path::new(&config.input.reference_proteins))?;
    let modification_set =
        reference::load_modification_set(Path::new(&config.input.modifications_of_interest))?;

    let working_dir = Path::new(&config.input.directory);
    let columns = &config.columns;

    // Reconcile the file-set before any per-row work.
    samples::repair_known_misnames(working_dir)?;
    samples::simplify_filenames(working_dir)?;
    samples::tag_unpooled_files(working_dir)?;
    let action = reconcile::reconcile(working_dir, &config.analysis, mode)?;
    info!("Pool reconciliation: {}", action);

    // Column extensions, rewriting the working files in place.
    extract::extract_accessions(
        working_dir,
        &columns.accession,
        &columns.protein_name,
        &columns.accession_pattern,
    )?;
    extract::clean_peptides(
        working_dir,
        &columns.peptide,
        &columns.peptide_sequence,
        &columns.peptide_pattern,
    )?;
    classify::classify_files(working_dir, &columns.modification, &columns.category)?;

    let layout = create_output_layout(Path::new(&config.output.directory))?;
    std::fs::write(layout.root.join("analysis_mode.txt"), mode.code())
        .context("Could not write analysis mode file")?;

    let ctx = FilterContext {
        columns,
        mode,
        techniques: &config.analysis.techniques,
        pools: &config.analysis.pools,
    };

    // Pass 1: reference protein membership.
    let pass = FilterPass {
        suffix: "_filtered_vcp",
        column: &columns.protein_name,
        allowed: &reference_set,
    };
    filter::run_pass(working_dir, &layout.filtered_reference, &pass, &ctx)?;

    // Pass 2: modification-of-interest membership, chained on pass 1.
    let pass = FilterPass {
        suffix: "_filtered_glyc",
        column: &columns.modification,
        allowed: &modification_set,
    };
    filter::run_pass(
        &layout.filtered_reference,
        &layout.filtered_glycosylated,
        &pass,
        &ctx,
    )?;

    // Value counts and grouped category counts over all three layers.
    for (input_dir, counts_dir) in [
        (working_dir, layout.counts_total.as_path()),
        (
            layout.filtered_reference.as_path(),
            layout.counts_reference.as_path(),
        ),
        (
            layout.filtered_glycosylated.as_path(),
            layout.counts_glycosylated.as_path(),
        ),
    ] {
        counts::value_counts(input_dir, &counts_dir.join("peptides"), &columns.counted)?;
        counts::category_by_group(
            input_dir,
            &counts_dir.join("proteins"),
            &columns.group_by,
            &columns.category,
        )?;
    }

    info!(
        "All tables saved under {:?} (1_filtered_dfs, 2_value_counts)",
        layout.root
    );
    Ok(())
}
