use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::commands::prepare::count_dataset_rows;
use crate::model::{PageInventoryManifest, PrepareRunManifest};
use crate::util::read_json;

pub fn run(args: StatusArgs) -> Result<()> {
    let manifest_dir = args.cache_root.join("manifests");
    let inventory_path = manifest_dir.join("page_inventory.json");
    let dataset_path = args.cache_root.join("dataset").join("layout_chunks.csv");

    info!(cache_root = %args.cache_root.display(), "status requested");

    if inventory_path.exists() {
        let inventory: PageInventoryManifest = read_json(&inventory_path)?;
        info!(
            doc_id = %inventory.doc_id,
            generated_at = %inventory.generated_at,
            page_count = inventory.page_count,
            "loaded inventory manifest"
        );
    } else {
        warn!(path = %inventory_path.display(), "inventory manifest missing");
    }

    match latest_prepare_manifest(&manifest_dir)? {
        Some(manifest_path) => {
            let manifest: PrepareRunManifest = read_json(&manifest_path)?;
            info!(
                run_id = %manifest.run_id,
                status = %manifest.status,
                pages = manifest.counts.page_count,
                empty_pages = manifest.counts.empty_page_count,
                failed_pages = manifest.counts.failed_page_count,
                chunks = manifest.counts.chunk_count,
                tokens = manifest.counts.token_count,
                warnings = manifest.warnings.len(),
                "loaded prepare run manifest"
            );
        }
        None => {
            warn!(path = %manifest_dir.display(), "no prepare run manifest found");
        }
    }

    if dataset_path.exists() {
        let rows = count_dataset_rows(&dataset_path)?;
        info!(path = %dataset_path.display(), rows = rows, "dataset status");
    } else {
        warn!(path = %dataset_path.display(), "dataset file missing");
    }

    Ok(())
}

fn latest_prepare_manifest(manifest_dir: &Path) -> Result<Option<PathBuf>> {
    if !manifest_dir.exists() {
        return Ok(None);
    }

    let entries = fs::read_dir(manifest_dir)
        .with_context(|| format!("failed to read {}", manifest_dir.display()))?;

    let mut candidates = Vec::<PathBuf>::new();
    for entry in entries {
        let entry =
            entry.with_context(|| format!("failed to read entry in {}", manifest_dir.display()))?;
        let path = entry.path();

        let is_prepare_manifest = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.starts_with("prepare_run_") && name.ends_with(".json"))
            .unwrap_or(false);

        if is_prepare_manifest {
            candidates.push(path);
        }
    }

    // Run timestamps embed in the filename, so the lexicographic maximum is
    // the most recent run.
    candidates.sort();
    Ok(candidates.pop())
}
