use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::geometry::BBox;
use crate::util::ensure_directory;

#[derive(Debug, Clone)]
pub struct ChunkRecord {
    pub id: String,
    pub image_path: String,
    pub page: usize,
    pub words: Vec<String>,
    pub input_ids: Vec<u32>,
    pub attention_mask: Vec<u32>,
    pub labels: Vec<i64>,
    pub bboxes: Vec<BBox>,
}

// One CSV row per chunk; sequence-valued columns are rendered as literal
// JSON list text so the file stays flat.
#[derive(Debug, Serialize)]
struct ChunkRow<'a> {
    id: &'a str,
    image_path: &'a str,
    page: usize,
    words: String,
    input_ids: String,
    attention_mask: String,
    labels: String,
    bboxes: String,
}

impl ChunkRecord {
    fn to_row(&self) -> Result<ChunkRow<'_>> {
        let bbox_arrays = self
            .bboxes
            .iter()
            .map(|bbox| bbox.as_array())
            .collect::<Vec<[i32; 4]>>();

        Ok(ChunkRow {
            id: &self.id,
            image_path: &self.image_path,
            page: self.page,
            words: render_list(&self.words)?,
            input_ids: render_list(&self.input_ids)?,
            attention_mask: render_list(&self.attention_mask)?,
            labels: render_list(&self.labels)?,
            bboxes: render_list(&bbox_arrays)?,
        })
    }
}

fn render_list<T: Serialize>(values: &[T]) -> Result<String> {
    serde_json::to_string(values).context("failed to render sequence column")
}

pub fn write_dataset(path: &Path, records: &[ChunkRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_directory(parent)?;
    }

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create dataset file: {}", path.display()))?;

    for record in records {
        let row = record.to_row()?;
        writer
            .serialize(row)
            .with_context(|| format!("failed to write dataset row {}", record.id))?;
    }

    writer
        .flush()
        .with_context(|| format!("failed to finalize dataset file: {}", path.display()))
}

pub fn count_dataset_rows(path: &Path) -> Result<usize> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open dataset file: {}", path.display()))?;

    let mut rows = 0usize;
    for record in reader.records() {
        record.with_context(|| format!("failed to read dataset row in {}", path.display()))?;
        rows += 1;
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> ChunkRecord {
        ChunkRecord {
            id: "report_page0_chunk0".to_string(),
            image_path: "pages/report_page_000.png".to_string(),
            page: 0,
            words: vec!["[SPECIAL]".to_string(), "1.".to_string()],
            input_ids: vec![0, 3202],
            attention_mask: vec![1, 1],
            labels: vec![-100, 1],
            bboxes: vec![BBox::ZERO, BBox::new(31, 30, 55, 48)],
        }
    }

    #[test]
    fn sequence_columns_render_as_json_list_text() {
        let record = sample_record();
        let row = record.to_row().unwrap();

        assert_eq!(row.words, r#"["[SPECIAL]","1."]"#);
        assert_eq!(row.input_ids, "[0,3202]");
        assert_eq!(row.attention_mask, "[1,1]");
        assert_eq!(row.labels, "[-100,1]");
        assert_eq!(row.bboxes, "[[0,0,0,0],[31,30,55,48]]");
    }

    #[test]
    fn scalar_columns_pass_through() {
        let record = sample_record();
        let row = record.to_row().unwrap();

        assert_eq!(row.id, "report_page0_chunk0");
        assert_eq!(row.image_path, "pages/report_page_000.png");
        assert_eq!(row.page, 0);
    }
}
