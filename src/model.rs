use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageEntry {
    pub filename: String,
    pub page_index: usize,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageInventoryManifest {
    pub manifest_version: u32,
    pub generated_at: String,
    pub source_directory: String,
    pub doc_id: String,
    pub page_count: usize,
    pub pages: Vec<PageEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolVersions {
    pub rustc: String,
    pub cargo: String,
    pub tesseract: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreparePaths {
    pub cache_root: String,
    pub manifest_dir: String,
    pub inventory_manifest_path: String,
    pub dataset_path: String,
    pub highlight_dir: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrepareCounts {
    pub page_count: usize,
    pub processed_page_count: usize,
    pub empty_page_count: usize,
    pub failed_page_count: usize,
    pub word_count: usize,
    pub header_word_count: usize,
    pub table_word_count: usize,
    pub table_region_count: usize,
    pub filtered_table_region_count: usize,
    pub token_count: usize,
    pub chunk_count: usize,
    pub highlight_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrepareRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub command: String,
    pub tool_versions: ToolVersions,
    pub paths: PreparePaths,
    pub label_schema: Vec<String>,
    pub counts: PrepareCounts,
    pub source_hashes: Vec<PageEntry>,
    pub warnings: Vec<String>,
    pub notes: Vec<String>,
}
