use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "layoutprep",
    version,
    about = "Prepare labeled layout-model training chunks from scanned document pages"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Inventory(InventoryArgs),
    Prepare(PrepareArgs),
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct InventoryArgs {
    #[arg(long)]
    pub pages_dir: PathBuf,

    #[arg(long, default_value = ".cache/layoutprep")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    #[arg(long)]
    pub doc_id: Option<String>,

    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone)]
pub struct PrepareArgs {
    #[arg(long)]
    pub pages_dir: PathBuf,

    #[arg(long)]
    pub tokenizer_path: PathBuf,

    #[arg(long, default_value = ".cache/layoutprep")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub inventory_manifest_path: Option<PathBuf>,

    #[arg(long)]
    pub prepare_manifest_path: Option<PathBuf>,

    #[arg(long)]
    pub dataset_path: Option<PathBuf>,

    #[arg(long)]
    pub doc_id: Option<String>,

    #[arg(long, default_value_t = false)]
    pub refresh_inventory: bool,

    #[arg(long, default_value_t = 512)]
    pub max_seq_len: usize,

    #[arg(long, default_value_t = 128)]
    pub window_overlap: usize,

    #[arg(long, default_value_t = 4)]
    pub workers: usize,

    #[arg(long, default_value = "eng")]
    pub ocr_lang: String,

    #[arg(long, default_value_t = 0.0)]
    pub ocr_min_confidence: f64,

    #[arg(long, default_value_t = 3)]
    pub min_table_rows: usize,

    #[arg(long)]
    pub max_pages: Option<usize>,

    #[arg(long, default_value_t = false)]
    pub skip_highlights: bool,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = ".cache/layoutprep")]
    pub cache_root: PathBuf,
}
