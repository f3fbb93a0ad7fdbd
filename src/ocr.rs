use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result, bail};

use crate::geometry::BBox;

#[derive(Debug, Clone)]
pub struct PageWord {
    pub text: String,
    pub bbox: BBox,
    pub line_text: String,
    pub line_bbox: BBox,
    pub header: Option<bool>,
    pub in_table: Option<bool>,
}

pub trait OcrEngine: Send + Sync {
    fn extract_words(&self, image_path: &Path) -> Result<Vec<PageWord>>;
}

pub struct TesseractOcr {
    lang: String,
    min_confidence: f64,
}

impl TesseractOcr {
    pub fn new(lang: &str, min_confidence: f64) -> Self {
        Self {
            lang: lang.to_string(),
            min_confidence,
        }
    }
}

impl OcrEngine for TesseractOcr {
    fn extract_words(&self, image_path: &Path) -> Result<Vec<PageWord>> {
        let output = Command::new("tesseract")
            .arg(image_path)
            .arg("stdout")
            .arg("-l")
            .arg(&self.lang)
            .arg("tsv")
            .output()
            .with_context(|| format!("failed to execute tesseract for {}", image_path.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "tesseract returned non-zero exit status for {}: {}",
                image_path.display(),
                stderr.trim()
            );
        }

        let tsv = String::from_utf8_lossy(&output.stdout).replace('\u{0000}', "");
        Ok(parse_word_tsv(&tsv, self.min_confidence))
    }
}

const WORD_LEVEL: u32 = 5;

#[derive(Debug)]
struct RawWord {
    block: u32,
    paragraph: u32,
    line: u32,
    text: String,
    bbox: BBox,
}

impl RawWord {
    fn line_key(&self) -> (u32, u32, u32) {
        (self.block, self.paragraph, self.line)
    }
}

// Tesseract TSV columns: level page_num block_num par_num line_num word_num
// left top width height conf text.
fn parse_word_tsv(tsv: &str, min_confidence: f64) -> Vec<PageWord> {
    let mut raw_words = Vec::<RawWord>::new();

    for line in tsv.lines().skip(1) {
        let columns = line.split('\t').collect::<Vec<&str>>();
        if columns.len() < 12 {
            continue;
        }

        let Ok(level) = columns[0].parse::<u32>() else {
            continue;
        };
        if level != WORD_LEVEL {
            continue;
        }

        let text = columns[11].trim();
        if text.is_empty() {
            continue;
        }

        let confidence = columns[10].parse::<f64>().unwrap_or(-1.0);
        if confidence < min_confidence {
            continue;
        }

        let (Ok(block), Ok(paragraph), Ok(line_number)) = (
            columns[2].parse::<u32>(),
            columns[3].parse::<u32>(),
            columns[4].parse::<u32>(),
        ) else {
            continue;
        };
        let (Ok(left), Ok(top), Ok(width), Ok(height)) = (
            columns[6].parse::<i32>(),
            columns[7].parse::<i32>(),
            columns[8].parse::<i32>(),
            columns[9].parse::<i32>(),
        ) else {
            continue;
        };

        raw_words.push(RawWord {
            block,
            paragraph,
            line: line_number,
            text: text.to_string(),
            bbox: BBox::new(left, top, left + width, top + height),
        });
    }

    group_into_lines(raw_words)
}

fn group_into_lines(raw_words: Vec<RawWord>) -> Vec<PageWord> {
    let mut words = Vec::with_capacity(raw_words.len());
    let mut index = 0;

    while index < raw_words.len() {
        let key = raw_words[index].line_key();
        let mut end = index;
        while end < raw_words.len() && raw_words[end].line_key() == key {
            end += 1;
        }

        let line_words = &raw_words[index..end];
        let line_text = line_words
            .iter()
            .map(|word| word.text.as_str())
            .collect::<Vec<&str>>()
            .join(" ");
        let line_bbox = union_bbox(line_words.iter().map(|word| word.bbox));

        for word in line_words {
            words.push(PageWord {
                text: word.text.clone(),
                bbox: word.bbox,
                line_text: line_text.clone(),
                line_bbox,
                header: None,
                in_table: None,
            });
        }

        index = end;
    }

    words
}

fn union_bbox(boxes: impl Iterator<Item = BBox>) -> BBox {
    boxes
        .reduce(|a, b| {
            BBox::new(
                a.x0.min(b.x0),
                a.y0.min(b.y0),
                a.x1.max(b.x1),
                a.y1.max(b.y1),
            )
        })
        .unwrap_or(BBox::ZERO)
}
