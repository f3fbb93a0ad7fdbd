use std::path::Path;
use std::process::{Command, Output};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use rayon::prelude::*;
use tracing::{info, warn};

use crate::cli::PrepareArgs;
use crate::commands::inventory;
use crate::detect::{HeaderDetector, SidecarTableDetector};
use crate::highlight::render_page_highlights;
use crate::labels::BioLabel;
use crate::model::{
    PageInventoryManifest, PrepareCounts, PreparePaths, PrepareRunManifest, ToolVersions,
};
use crate::ocr::TesseractOcr;
use crate::tokenize::HfWordTokenizer;
use crate::util::{
    ensure_directory, now_utc_string, read_json, utc_compact_string, write_json_pretty,
};

use super::dataset::{ChunkRecord, write_dataset};
use super::page::{PageContext, PageResult, process_page};

enum PageOutcome {
    Completed(PageResult),
    Failed { page_index: usize, error: String },
}

impl PageOutcome {
    fn page_index(&self) -> usize {
        match self {
            PageOutcome::Completed(result) => result.page_index,
            PageOutcome::Failed { page_index, .. } => *page_index,
        }
    }
}

pub fn run(args: PrepareArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("run-{}", utc_compact_string(started_ts));

    if args.max_seq_len == 0 {
        bail!("--max-seq-len must be positive");
    }
    if args.window_overlap >= args.max_seq_len {
        bail!("--window-overlap must be smaller than --max-seq-len");
    }
    let stride = args.max_seq_len - args.window_overlap;
    if args.workers == 0 {
        bail!("--workers must be positive");
    }

    let cache_root = args.cache_root.clone();
    let manifest_dir = cache_root.join("manifests");
    ensure_directory(&manifest_dir)?;

    let inventory_manifest_path = args
        .inventory_manifest_path
        .clone()
        .unwrap_or_else(|| manifest_dir.join("page_inventory.json"));
    let prepare_manifest_path = args.prepare_manifest_path.clone().unwrap_or_else(|| {
        manifest_dir.join(format!(
            "prepare_run_{}.json",
            utc_compact_string(started_ts)
        ))
    });
    let dataset_path = args
        .dataset_path
        .clone()
        .unwrap_or_else(|| cache_root.join("dataset").join("layout_chunks.csv"));
    let highlight_dir =
        (!args.skip_highlights).then(|| cache_root.join("highlights").join(&run_id));

    info!(cache_root = %cache_root.display(), run_id = %run_id, "starting prepare");

    let inventory_manifest = load_or_refresh_inventory(&args, &inventory_manifest_path)?;
    let doc_id = args
        .doc_id
        .clone()
        .unwrap_or_else(|| inventory_manifest.doc_id.clone());

    let mut warnings = Vec::<String>::new();
    if !command_available("tesseract") {
        let message = "tesseract is unavailable; OCR will fail for every page".to_string();
        warn!(warning = %message, "tool preflight warning");
        warnings.push(message);
    }

    // Collaborators are constructed once here and shared read-only by every
    // page worker.
    let tokenizer = HfWordTokenizer::from_file(&args.tokenizer_path)?;
    let headers = HeaderDetector::new()?;
    let ocr = TesseractOcr::new(&args.ocr_lang, args.ocr_min_confidence);
    let tables = SidecarTableDetector;

    let mut pages = inventory_manifest.pages.clone();
    if let Some(max_pages) = args.max_pages {
        pages.truncate(max_pages);
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(args.workers)
        .build()
        .context("failed to build page worker pool")?;

    let mut outcomes = pool.install(|| {
        pages
            .par_iter()
            .map(|entry| {
                let image_path = args.pages_dir.join(&entry.filename);
                let ctx = PageContext {
                    doc_id: &doc_id,
                    page_index: entry.page_index,
                    image_path: &image_path,
                    ocr: &ocr,
                    tables: &tables,
                    headers: &headers,
                    tokenizer: &tokenizer,
                    max_seq_len: args.max_seq_len,
                    stride,
                    min_table_rows: args.min_table_rows,
                };

                match process_page(&ctx) {
                    Ok(result) => PageOutcome::Completed(result),
                    Err(err) => PageOutcome::Failed {
                        page_index: entry.page_index,
                        error: format!("{err:#}"),
                    },
                }
            })
            .collect::<Vec<PageOutcome>>()
    });
    outcomes.sort_by_key(|outcome| outcome.page_index());

    let mut counts = PrepareCounts {
        page_count: pages.len(),
        ..PrepareCounts::default()
    };
    let mut all_records = Vec::<ChunkRecord>::new();
    let mut completed = Vec::<PageResult>::new();

    for outcome in outcomes {
        match outcome {
            PageOutcome::Completed(result) => {
                counts.processed_page_count += 1;
                if result.counts.words == 0 {
                    counts.empty_page_count += 1;
                }
                counts.word_count += result.counts.words;
                counts.header_word_count += result.counts.header_words;
                counts.table_word_count += result.counts.table_words;
                counts.table_region_count += result.counts.table_regions;
                counts.filtered_table_region_count += result.counts.filtered_table_regions;
                counts.token_count += result.counts.tokens;
                counts.chunk_count += result.counts.chunks;
                warnings.extend(result.warnings.iter().cloned());
                all_records.extend(result.records.iter().cloned());
                completed.push(result);
            }
            PageOutcome::Failed { page_index, error } => {
                counts.failed_page_count += 1;
                let warning = format!("page {page_index} failed: {error}");
                warn!(page = page_index, warning = %warning, "page processing warning");
                warnings.push(warning);
            }
        }
    }

    write_dataset(&dataset_path, &all_records)?;
    info!(path = %dataset_path.display(), rows = all_records.len(), "wrote chunk dataset");

    if let Some(highlight_dir) = &highlight_dir {
        ensure_directory(highlight_dir)?;

        for result in &completed {
            if result.records.is_empty() {
                continue;
            }
            let Some(entry) = pages
                .iter()
                .find(|entry| entry.page_index == result.page_index)
            else {
                continue;
            };

            let image_path = args.pages_dir.join(&entry.filename);
            let labeled_boxes = result.records.iter().flat_map(|record| {
                record
                    .labels
                    .iter()
                    .copied()
                    .zip(record.bboxes.iter().copied())
            });

            match render_page_highlights(&image_path, labeled_boxes, highlight_dir) {
                Ok(path) => {
                    counts.highlight_count += 1;
                    info!(path = %path.display(), page = result.page_index, "wrote highlight image");
                }
                Err(err) => {
                    let warning = format!(
                        "highlight rendering failed for page {}: {err:#}",
                        result.page_index
                    );
                    warn!(warning = %warning, "highlight warning");
                    warnings.push(warning);
                }
            }
        }
    }

    let updated_at = now_utc_string();
    let manifest = PrepareRunManifest {
        manifest_version: 1,
        run_id: run_id.clone(),
        status: "completed".to_string(),
        started_at,
        updated_at,
        command: render_prepare_command(&args),
        tool_versions: collect_tool_versions()?,
        paths: PreparePaths {
            cache_root: cache_root.display().to_string(),
            manifest_dir: manifest_dir.display().to_string(),
            inventory_manifest_path: inventory_manifest_path.display().to_string(),
            dataset_path: dataset_path.display().to_string(),
            highlight_dir: highlight_dir.as_ref().map(|path| path.display().to_string()),
        },
        label_schema: BioLabel::ALL
            .iter()
            .map(|label| label.as_str().to_string())
            .collect(),
        counts,
        source_hashes: pages,
        warnings,
        notes: vec![
            "Chunks advance by a stride of max-seq-len minus window-overlap; the final chunk of a page may be shorter.".to_string(),
            "Special tokens carry the ignore label and a zero bounding box.".to_string(),
        ],
    };

    write_json_pretty(&prepare_manifest_path, &manifest)?;
    info!(path = %prepare_manifest_path.display(), "wrote prepare run manifest");
    info!(
        pages = manifest.counts.page_count,
        chunks = manifest.counts.chunk_count,
        failed_pages = manifest.counts.failed_page_count,
        "prepare completed"
    );

    Ok(())
}

fn load_or_refresh_inventory(
    args: &PrepareArgs,
    inventory_manifest_path: &Path,
) -> Result<PageInventoryManifest> {
    if args.refresh_inventory || !inventory_manifest_path.exists() {
        let manifest = inventory::build_manifest(&args.pages_dir, args.doc_id.as_deref())?;
        write_json_pretty(inventory_manifest_path, &manifest)?;
        info!(
            path = %inventory_manifest_path.display(),
            page_count = manifest.page_count,
            "refreshed inventory manifest"
        );
        return Ok(manifest);
    }

    let manifest: PageInventoryManifest = read_json(inventory_manifest_path)?;
    info!(
        path = %inventory_manifest_path.display(),
        page_count = manifest.page_count,
        "loaded existing inventory manifest"
    );

    Ok(manifest)
}

fn command_available(program: &str) -> bool {
    Command::new(program).arg("--version").output().is_ok()
}

fn collect_tool_versions() -> Result<ToolVersions> {
    Ok(ToolVersions {
        rustc: command_version("rustc", &["--version"])?,
        cargo: command_version("cargo", &["--version"])?,
        tesseract: command_version_optional("tesseract", &["--version"]),
    })
}

fn command_version(program: &str, args: &[&str]) -> Result<String> {
    let output = Command::new(program)
        .args(args)
        .output()
        .with_context(|| format!("failed to run {} {}", program, args.join(" ")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("{} {} failed: {}", program, args.join(" "), stderr.trim());
    }

    Ok(first_version_line(&output).unwrap_or_else(|| "unknown".to_string()))
}

fn command_version_optional(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    first_version_line(&output)
}

fn first_version_line(output: &Output) -> Option<String> {
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let source = if stdout.trim().is_empty() {
        stderr
    } else {
        stdout
    };

    source
        .lines()
        .next()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ToOwned::to_owned)
}

fn render_prepare_command(args: &PrepareArgs) -> String {
    let mut command = vec![
        "layoutprep".to_string(),
        "prepare".to_string(),
        "--pages-dir".to_string(),
        args.pages_dir.display().to_string(),
        "--tokenizer-path".to_string(),
        args.tokenizer_path.display().to_string(),
        "--cache-root".to_string(),
        args.cache_root.display().to_string(),
        "--max-seq-len".to_string(),
        args.max_seq_len.to_string(),
        "--window-overlap".to_string(),
        args.window_overlap.to_string(),
        "--workers".to_string(),
        args.workers.to_string(),
    ];

    if let Some(path) = &args.dataset_path {
        command.push("--dataset-path".to_string());
        command.push(path.display().to_string());
    }
    if let Some(doc_id) = &args.doc_id {
        command.push("--doc-id".to_string());
        command.push(doc_id.clone());
    }
    if args.refresh_inventory {
        command.push("--refresh-inventory".to_string());
    }
    if let Some(max_pages) = args.max_pages {
        command.push("--max-pages".to_string());
        command.push(max_pages.to_string());
    }
    if args.min_table_rows != 3 {
        command.push("--min-table-rows".to_string());
        command.push(args.min_table_rows.to_string());
    }
    if args.skip_highlights {
        command.push("--skip-highlights".to_string());
    }

    command.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn rendered_command_reflects_non_default_flags() {
        let args = PrepareArgs {
            pages_dir: PathBuf::from("scans/report"),
            tokenizer_path: PathBuf::from("models/tokenizer.json"),
            cache_root: PathBuf::from(".cache/layoutprep"),
            inventory_manifest_path: None,
            prepare_manifest_path: None,
            dataset_path: None,
            doc_id: Some("report".to_string()),
            refresh_inventory: true,
            max_seq_len: 512,
            window_overlap: 128,
            workers: 4,
            ocr_lang: "eng".to_string(),
            ocr_min_confidence: 0.0,
            min_table_rows: 3,
            max_pages: Some(10),
            skip_highlights: false,
        };

        let rendered = render_prepare_command(&args);
        assert!(rendered.starts_with("layoutprep prepare"));
        assert!(rendered.contains("--pages-dir scans/report"));
        assert!(rendered.contains("--doc-id report"));
        assert!(rendered.contains("--refresh-inventory"));
        assert!(rendered.contains("--max-pages 10"));
        assert!(!rendered.contains("--skip-highlights"));
        assert!(!rendered.contains("--min-table-rows"));
    }
}
