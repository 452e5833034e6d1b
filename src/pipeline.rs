use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::aggregate::{merge, MergeOutcome};
use crate::artifact::ArtifactStore;
use crate::config::GenreSource;
use crate::db::StoreLoader;
use crate::parser::GenreExtract;

#[derive(Debug, PartialEq)]
pub enum LoadOutcome {
    Loaded {
        rows: usize,
        dropped: usize,
        artifact: PathBuf,
    },
    /// Merge produced no rows; the store was not touched.
    SkippedEmpty { input_rows: usize },
}

/// Genres whose artifacts feed the merge after a scrape: every configured
/// genre except the ones that failed in this run, whose files are stale.
/// Genres not scraped this time keep contributing their last extract.
pub fn merge_inputs(configured: &[GenreSource], failed: &[String]) -> Vec<String> {
    configured
        .iter()
        .filter(|g| !failed.iter().any(|f| f.eq_ignore_ascii_case(&g.name)))
        .map(|g| g.name.clone())
        .collect()
}

/// Read back the per-genre artifacts for `genres`, in that order. Missing or
/// unreadable artifacts are skipped with a warning.
pub fn collect_extracts(artifacts: &ArtifactStore, genres: &[String]) -> Vec<GenreExtract> {
    let mut extracts = Vec::with_capacity(genres.len());
    for genre in genres {
        let path = artifacts.genre_path(genre);
        if !path.exists() {
            warn!("No extract for {} at {}; skipping", genre, path.display());
            continue;
        }
        match artifacts.read_genre(genre) {
            Ok(extract) => extracts.push(extract),
            Err(e) => warn!("Skipping {}: {}", genre, e),
        }
    }
    extracts
}

/// Merge, persist the merged artifact, then replace the store table.
/// The artifact is written before the load so a failed load loses nothing.
pub fn merge_and_load(
    extracts: Vec<GenreExtract>,
    artifacts: &ArtifactStore,
    loader: &StoreLoader,
) -> Result<LoadOutcome> {
    info!("Merging {} genre extracts", extracts.len());
    let (table, dropped) = match merge(extracts) {
        MergeOutcome::Merged { table, dropped } => (table, dropped),
        MergeOutcome::Empty { input_rows } => {
            warn!("Skipping store load: merged table is empty");
            return Ok(LoadOutcome::SkippedEmpty { input_rows });
        }
    };

    let artifact = artifacts
        .write_merged(&table)
        .context("failed to persist merged table")?;
    let rows = loader.load(&table).with_context(|| {
        format!(
            "store load failed; merged data kept at {} (retry with `load`)",
            artifact.display()
        )
    })?;
    Ok(LoadOutcome::Loaded {
        rows,
        dropped,
        artifact,
    })
}

/// Load the persisted merged artifact as-is. Used to retry a failed load
/// without scraping again.
pub fn load_persisted(artifacts: &ArtifactStore, loader: &StoreLoader) -> Result<usize> {
    let path = artifacts.merged_path();
    let table = artifacts
        .read_merged()
        .with_context(|| format!("cannot read merged table {}", path.display()))?;
    if table.is_empty() {
        warn!("{} has no rows; store left unchanged", path.display());
        return Ok(0);
    }
    info!("Reloading {} rows from {}", table.len(), path.display());
    Ok(loader.load(&table)?)
}
