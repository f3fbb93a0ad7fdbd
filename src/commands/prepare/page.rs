use std::path::Path;

use anyhow::{Context, Result};
use image::GrayImage;
use tracing::warn;

use crate::chunk::split_into_chunks;
use crate::detect::{
    HEADER_LINE_MAX_CHARS, HeaderDetector, TableDetector, TableRegion, filter_table_regions,
    word_in_table,
};
use crate::labels::{SpanCategory, synthesize_labels};
use crate::ocr::{OcrEngine, PageWord};
use crate::tokenize::{WordTokenizer, align_word_labels};

use super::dataset::ChunkRecord;

pub struct PageContext<'a> {
    pub doc_id: &'a str,
    pub page_index: usize,
    pub image_path: &'a Path,
    pub ocr: &'a dyn OcrEngine,
    pub tables: &'a dyn TableDetector,
    pub headers: &'a HeaderDetector,
    pub tokenizer: &'a dyn WordTokenizer,
    pub max_seq_len: usize,
    pub stride: usize,
    pub min_table_rows: usize,
}

#[derive(Debug, Default)]
pub struct PageCounts {
    pub words: usize,
    pub header_words: usize,
    pub table_words: usize,
    pub table_regions: usize,
    pub filtered_table_regions: usize,
    pub tokens: usize,
    pub chunks: usize,
}

#[derive(Debug)]
pub struct PageResult {
    pub page_index: usize,
    pub records: Vec<ChunkRecord>,
    pub counts: PageCounts,
    pub warnings: Vec<String>,
}

pub fn process_page(ctx: &PageContext) -> Result<PageResult> {
    let mut counts = PageCounts::default();
    let mut warnings = Vec::new();

    let mut words = ctx.ocr.extract_words(ctx.image_path)?;
    if words.is_empty() {
        // A page without recognized words yields zero chunks, not an error.
        return Ok(PageResult {
            page_index: ctx.page_index,
            records: Vec::new(),
            counts,
            warnings,
        });
    }

    let page_gray = image::open(ctx.image_path)
        .with_context(|| format!("failed to open page image {}", ctx.image_path.display()))?
        .to_luma8();
    let (page_width, page_height) = page_gray.dimensions();

    let table_regions = match ctx.tables.detect(ctx.image_path) {
        Ok(regions) => regions,
        Err(err) => {
            // Fail open: a broken detector means no tables on this page.
            let warning = format!(
                "table detection failed for {}: {err:#}",
                ctx.image_path.display()
            );
            warn!(warning = %warning, "table detector warning");
            warnings.push(warning);
            Vec::new()
        }
    };
    counts.table_regions = table_regions.len();
    let table_regions = filter_table_regions(table_regions, ctx.min_table_rows);
    counts.filtered_table_regions = counts.table_regions - table_regions.len();

    apply_structural_flags(&mut words, &table_regions, ctx.headers, &page_gray);

    counts.words = words.len();
    counts.header_words = words
        .iter()
        .filter(|word| word.header == Some(true))
        .count();
    counts.table_words = words
        .iter()
        .filter(|word| word.in_table == Some(true))
        .count();

    let (records, token_count) = assemble_records(
        ctx.doc_id,
        ctx.page_index,
        ctx.image_path,
        &words,
        page_width,
        page_height,
        ctx.tokenizer,
        ctx.max_seq_len,
        ctx.stride,
    )?;
    counts.tokens = token_count;
    counts.chunks = records.len();

    Ok(PageResult {
        page_index: ctx.page_index,
        records,
        counts,
        warnings,
    })
}

// Flags precomputed by the OCR collaborator are trusted; missing ones are
// derived here. Header verdicts are computed once per source line.
fn apply_structural_flags(
    words: &mut [PageWord],
    tables: &[TableRegion],
    headers: &HeaderDetector,
    page: &GrayImage,
) {
    let mut cached_line = None;

    for word in words.iter_mut() {
        if word.in_table.is_none() {
            word.in_table = Some(word_in_table(word.bbox, tables));
        }

        if word.header.is_none() {
            let verdict = match cached_line {
                Some((line_bbox, verdict)) if line_bbox == word.line_bbox => verdict,
                _ => {
                    let verdict = word.line_text.chars().count() < HEADER_LINE_MAX_CHARS
                        && headers.classify(&word.line_text, word.line_bbox, page);
                    cached_line = Some((word.line_bbox, verdict));
                    verdict
                }
            };
            word.header = Some(verdict);
        }
    }
}

fn assemble_records(
    doc_id: &str,
    page_index: usize,
    image_path: &Path,
    words: &[PageWord],
    page_width: u32,
    page_height: u32,
    tokenizer: &dyn WordTokenizer,
    max_seq_len: usize,
    stride: usize,
) -> Result<(Vec<ChunkRecord>, usize)> {
    let categories = words
        .iter()
        .map(|word| {
            SpanCategory::from_flags(
                word.header.unwrap_or(false),
                word.in_table.unwrap_or(false),
            )
        })
        .collect::<Vec<Option<SpanCategory>>>();
    let word_labels = synthesize_labels(&categories);

    let texts = words
        .iter()
        .map(|word| word.text.clone())
        .collect::<Vec<String>>();
    let norm_boxes = words
        .iter()
        .map(|word| word.bbox.normalize(page_width, page_height))
        .collect::<Vec<_>>();

    let encoding = tokenizer
        .encode_words(&texts, &norm_boxes)
        .with_context(|| format!("tokenization failed for page {page_index}"))?;
    let aligned = align_word_labels(&texts, &norm_boxes, &word_labels, &encoding)
        .with_context(|| {
            format!(
                "token alignment failed for page {page_index} ({})",
                image_path.display()
            )
        })?;
    let token_count = aligned.input_ids.len();

    let image_path_str = image_path.display().to_string();
    let records = split_into_chunks(&aligned, max_seq_len, stride)
        .into_iter()
        .enumerate()
        .map(|(chunk_index, chunk)| ChunkRecord {
            id: format!("{doc_id}_page{page_index}_chunk{chunk_index}"),
            image_path: image_path_str.clone(),
            page: page_index,
            words: aligned.words[chunk.window.start..chunk.window.end].to_vec(),
            input_ids: chunk.input_ids,
            attention_mask: chunk.attention_mask,
            labels: chunk.labels.into_iter().map(|label| label.id()).collect(),
            bboxes: chunk.bboxes,
        })
        .collect();

    Ok((records, token_count))
}
