use anyhow::{Context, Result};
use itertools::Itertools;
use log::{info, warn};
use std::path::{Path, PathBuf};

/// The one historical misnaming the exporter produced: `ID_CD9` instead of
/// the immunoprecipitation technique tag `IP_CD9`. Repaired unconditionally
/// before any classification looks at the name.
const MISNAME_FROM: &str = "ID_CD9";
const MISNAME_TO: &str = "IP_CD9";

/// Exporter prefix stripped from filenames and sample names.
const EXPORT_PREFIX: &str = "DB_search_psm_";

pub fn csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("Could not read directory {:?}", dir))?
    {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|e| e == "csv") {
            files.push(path);
        }
    }
    Ok(files.into_iter().sorted().collect())
}

fn rename_skipping_collisions(path: &Path, new_name: &str) -> Result<()> {
    let target = path.with_file_name(new_name);
    if target.exists() {
        warn!(
            "Not renaming {:?}: target {} already exists",
            path, new_name
        );
        return Ok(());
    }
    std::fs::rename(path, &target)
        .with_context(|| format!("Could not rename {:?} to {}", path, new_name))?;
    info!("Renamed {:?} to {}", path, new_name);
    Ok(())
}

pub fn repair_known_misnames(dir: &Path) -> Result<()> {
    for path in csv_files(dir)? {
        let name = file_name(&path);
        if name.contains(MISNAME_FROM) {
            rename_skipping_collisions(&path, &name.replace(MISNAME_FROM, MISNAME_TO))?;
        }
    }
    Ok(())
}

/// Strip the exporter prefix and normalize separators, on disk.
pub fn simplify_filenames(dir: &Path) -> Result<()> {
    let mut counter = 0;
    for path in csv_files(dir)? {
        let name = file_name(&path);
        let simplified = simplify_name(&name);
        if simplified != name {
            counter += 1;
            rename_skipping_collisions(&path, &simplified)?;
        }
    }
    info!("Renamed {} files", counter);
    Ok(())
}

fn simplify_name(name: &str) -> String {
    let mut out = name.replace(' ', "_");
    while out.contains("__") {
        out = out.replace("__", "_");
    }
    out.strip_prefix(EXPORT_PREFIX).unwrap_or(&out).to_string()
}

/// Tag every csv without a pool marker as `NO_POOL`, so the pool vocabulary
/// classifies each file exactly once.
pub fn tag_unpooled_files(dir: &Path) -> Result<()> {
    for path in csv_files(dir)? {
        let name = file_name(&path);
        if !name.contains("POOL") {
            let stem = name.strip_suffix(".csv").unwrap_or(&name);
            rename_skipping_collisions(&path, &format!("{stem}_NO_POOL.csv"))?;
        }
    }
    Ok(())
}

/// Sample identifier of a file: the stem, separator-normalized, exporter
/// prefix removed.
pub fn sample_name(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    simplify_name(&stem)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// First vocabulary entry matching the name, in vocabulary iteration order.
pub fn first_tag<'a>(name: &str, vocabulary: &'a [String]) -> Option<&'a str> {
    vocabulary
        .iter()
        .find(|tag| match regex::Regex::new(tag) {
            Ok(re) => re.is_match(name),
            Err(_) => name.contains(tag.as_str()),
        })
        .map(|s| s.as_str())
}

pub fn technique_of<'a>(name: &str, techniques: &'a [String]) -> Option<&'a str> {
    first_tag(name, techniques)
}

pub fn pool_of<'a>(name: &str, pools: &'a [String]) -> Option<&'a str> {
    first_tag(name, pools)
}
