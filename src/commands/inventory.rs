use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::info;

use crate::cli::InventoryArgs;
use crate::model::{PageEntry, PageInventoryManifest};
use crate::util::{now_utc_string, sanitize_identifier, sha256_file, write_json_pretty};

const PAGE_IMAGE_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "tif", "tiff", "bmp"];

pub fn run(args: InventoryArgs) -> Result<()> {
    let manifest = build_manifest(&args.pages_dir, args.doc_id.as_deref())?;

    if args.dry_run {
        info!(
            page_count = manifest.page_count,
            doc_id = %manifest.doc_id,
            source = %manifest.source_directory,
            "inventory dry-run complete"
        );
        return Ok(());
    }

    let manifest_path = args
        .manifest_path
        .unwrap_or_else(|| args.cache_root.join("manifests").join("page_inventory.json"));

    write_json_pretty(&manifest_path, &manifest)?;
    info!(path = %manifest_path.display(), "wrote inventory manifest");
    info!(page_count = manifest.page_count, "inventory completed");

    Ok(())
}

pub fn build_manifest(pages_dir: &Path, doc_id: Option<&str>) -> Result<PageInventoryManifest> {
    let mut image_paths = discover_page_images(pages_dir)?;
    image_paths.sort();

    if image_paths.is_empty() {
        bail!("no page images found in {}", pages_dir.display());
    }

    let doc_id = match doc_id {
        Some(value) => value.to_string(),
        None => derive_doc_id(pages_dir),
    };

    let mut pages = Vec::with_capacity(image_paths.len());
    for (page_index, path) in image_paths.iter().enumerate() {
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(ToOwned::to_owned)
            .with_context(|| format!("invalid UTF-8 filename: {}", path.display()))?;

        let sha256 = sha256_file(path)?;

        pages.push(PageEntry {
            filename,
            page_index,
            sha256,
        });
    }

    Ok(PageInventoryManifest {
        manifest_version: 1,
        generated_at: now_utc_string(),
        source_directory: pages_dir.display().to_string(),
        doc_id,
        page_count: pages.len(),
        pages,
    })
}

fn derive_doc_id(pages_dir: &Path) -> String {
    let stem = pages_dir
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("document");

    sanitize_identifier(stem)
}

fn discover_page_images(pages_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut images = Vec::new();

    let entries = fs::read_dir(pages_dir)
        .with_context(|| format!("failed to read {}", pages_dir.display()))?;

    for entry in entries {
        let entry =
            entry.with_context(|| format!("failed to read entry in {}", pages_dir.display()))?;
        let path = entry.path();

        if !entry
            .file_type()
            .with_context(|| format!("failed to inspect file type: {}", path.display()))?
            .is_file()
        {
            continue;
        }

        let is_page_image = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                PAGE_IMAGE_EXTENSIONS
                    .iter()
                    .any(|candidate| ext.eq_ignore_ascii_case(candidate))
            })
            .unwrap_or(false);

        if is_page_image {
            images.push(path);
        }
    }

    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doc_id_derives_from_the_pages_directory_name() {
        assert_eq!(derive_doc_id(Path::new("scans/Quarterly Report")), "quarterly_report");
        assert_eq!(derive_doc_id(Path::new("pages")), "pages");
    }
}
