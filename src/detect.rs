use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::GrayImage;
use regex::Regex;
use serde::Deserialize;

use crate::geometry::BBox;

const BOLD_DARK_FRACTION: f64 = 0.15;
const DARK_LUMA_THRESHOLD: u8 = 128;
const UPPERCASE_LINE_MAX_CHARS: usize = 60;
pub const HEADER_LINE_MAX_CHARS: usize = 80;

pub struct HeaderDetector {
    numeric_enumeration: Regex,
    roman_enumeration: Regex,
    letter_enumeration: Regex,
}

impl HeaderDetector {
    pub fn new() -> Result<Self> {
        Ok(Self {
            numeric_enumeration: Regex::new(r"^\d+(?:\.\d+)*[.)]?\s")
                .context("failed to compile numeric enumeration regex")?,
            roman_enumeration: Regex::new(
                r"^(?i)(M{0,4}(?:CM|CD|D?C{0,3})(?:XC|XL|L?X{0,3})(?:IX|IV|V?I{0,3}))[.)\-]\s",
            )
            .context("failed to compile roman enumeration regex")?,
            letter_enumeration: Regex::new(r"^[A-Z][.)\-]\s")
                .context("failed to compile letter enumeration regex")?,
        })
    }

    // Rules are checked in fixed precedence; the first match decides.
    pub fn classify(&self, line_text: &str, line_bbox: BBox, page: &GrayImage) -> bool {
        let text = line_text.trim();
        if text.chars().count() < 2 {
            return false;
        }

        if line_has_bold_strokes(page, line_bbox) && starts_with_uppercase(text) {
            return true;
        }
        if self.is_numeric_enumeration(text) {
            return true;
        }
        if self.is_roman_enumeration(text) {
            return true;
        }
        if self.is_letter_enumeration(text) {
            return true;
        }

        is_short_uppercase_line(text)
    }

    pub fn is_numeric_enumeration(&self, text: &str) -> bool {
        self.numeric_enumeration.is_match(text)
    }

    pub fn is_roman_enumeration(&self, text: &str) -> bool {
        self.roman_enumeration
            .captures(text)
            .and_then(|captures| captures.get(1))
            .is_some_and(|numeral| !numeral.as_str().is_empty())
    }

    pub fn is_letter_enumeration(&self, text: &str) -> bool {
        self.letter_enumeration.is_match(text)
    }
}

fn starts_with_uppercase(text: &str) -> bool {
    text.chars().next().is_some_and(char::is_uppercase)
}

pub fn is_short_uppercase_line(text: &str) -> bool {
    if text.chars().count() >= UPPERCASE_LINE_MAX_CHARS {
        return false;
    }

    text.chars().any(char::is_alphabetic) && !text.chars().any(char::is_lowercase)
}

pub fn line_has_bold_strokes(page: &GrayImage, line_bbox: BBox) -> bool {
    let (width, height) = page.dimensions();
    let x0 = line_bbox.x0.clamp(0, width as i32) as u32;
    let y0 = line_bbox.y0.clamp(0, height as i32) as u32;
    let x1 = line_bbox.x1.clamp(0, width as i32) as u32;
    let y1 = line_bbox.y1.clamp(0, height as i32) as u32;
    if x1 <= x0 || y1 <= y0 {
        return false;
    }

    let mut dark = 0u64;
    let mut total = 0u64;
    for y in y0..y1 {
        for x in x0..x1 {
            if page.get_pixel(x, y)[0] < DARK_LUMA_THRESHOLD {
                dark += 1;
            }
            total += 1;
        }
    }

    total > 0 && dark as f64 / total as f64 > BOLD_DARK_FRACTION
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableRegion {
    pub bbox: BBox,
    pub row_count: usize,
}

pub fn filter_table_regions(regions: Vec<TableRegion>, min_rows: usize) -> Vec<TableRegion> {
    regions
        .into_iter()
        .filter(|region| region.row_count >= min_rows)
        .collect()
}

pub fn word_in_table(word_bbox: BBox, tables: &[TableRegion]) -> bool {
    tables.iter().any(|table| table.bbox.contains(word_bbox))
}

pub trait TableDetector: Send + Sync {
    fn detect(&self, image_path: &Path) -> Result<Vec<TableRegion>>;
}

#[derive(Debug, Deserialize)]
struct SidecarTable {
    bbox: [i32; 4],
    rows: usize,
}

// Reads the `<page>.tables.json` sidecar an external table-detection model
// leaves next to each page image.
pub struct SidecarTableDetector;

impl SidecarTableDetector {
    fn sidecar_path(image_path: &Path) -> PathBuf {
        image_path.with_extension("tables.json")
    }
}

impl TableDetector for SidecarTableDetector {
    fn detect(&self, image_path: &Path) -> Result<Vec<TableRegion>> {
        let sidecar = Self::sidecar_path(image_path);
        if !sidecar.exists() {
            return Ok(Vec::new());
        }

        let raw = fs::read(&sidecar)
            .with_context(|| format!("failed to read {}", sidecar.display()))?;
        parse_table_sidecar(&raw)
            .with_context(|| format!("failed to parse {}", sidecar.display()))
    }
}

fn parse_table_sidecar(raw: &[u8]) -> Result<Vec<TableRegion>> {
    let tables: Vec<SidecarTable> =
        serde_json::from_slice(raw).context("invalid table sidecar json")?;

    Ok(tables
        .into_iter()
        .map(|table| TableRegion {
            bbox: BBox::from(table.bbox),
            row_count: table.rows,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn blank_page() -> GrayImage {
        GrayImage::from_pixel(400, 200, Luma([255]))
    }

    fn detector() -> HeaderDetector {
        HeaderDetector::new().expect("rules compile")
    }

    #[test]
    fn numeric_enumeration_rule_matches_leading_numerals() {
        let detector = detector();
        assert!(detector.is_numeric_enumeration("1. Scope"));
        assert!(detector.is_numeric_enumeration("2.3 Safety goals"));
        assert!(detector.is_numeric_enumeration("3) Overview"));
        assert!(!detector.is_numeric_enumeration("1.Introduction"));
        assert!(!detector.is_numeric_enumeration("Figure 3 shows"));
    }

    #[test]
    fn roman_enumeration_rule_matches_valid_numerals() {
        let detector = detector();
        assert!(detector.is_roman_enumeration("IV. Results"));
        assert!(detector.is_roman_enumeration("ii) Methods"));
        assert!(detector.is_roman_enumeration("X- Annex"));
        assert!(!detector.is_roman_enumeration("Info. for readers"));
        assert!(!detector.is_roman_enumeration(". nothing"));
    }

    #[test]
    fn letter_enumeration_rule_requires_single_capital() {
        let detector = detector();
        assert!(detector.is_letter_enumeration("A. Scope"));
        assert!(detector.is_letter_enumeration("B) Rationale"));
        assert!(detector.is_letter_enumeration("C- Terms"));
        assert!(!detector.is_letter_enumeration("a. scope"));
        assert!(!detector.is_letter_enumeration("AB. Acronyms"));
    }

    #[test]
    fn short_uppercase_rule_caps_line_length() {
        assert!(is_short_uppercase_line("ABSTRACT"));
        assert!(is_short_uppercase_line("TABLE OF CONTENTS"));
        assert!(!is_short_uppercase_line("Abstract"));
        assert!(!is_short_uppercase_line("1234"));
        assert!(!is_short_uppercase_line(&"LONG HEADER ".repeat(6)));
    }

    #[test]
    fn lines_under_two_characters_are_never_headers() {
        let detector = detector();
        assert!(!detector.classify("A", BBox::new(0, 0, 400, 40), &blank_page()));
        assert!(!detector.classify(" ", BBox::new(0, 0, 400, 40), &blank_page()));
        assert!(!detector.classify("", BBox::ZERO, &blank_page()));
    }

    #[test]
    fn bold_region_with_uppercase_start_is_a_header() {
        let mut page = blank_page();
        for y in 10..30 {
            for x in 10..200 {
                page.put_pixel(x, y, Luma([0]));
            }
        }

        let line_bbox = BBox::new(10, 10, 200, 30);
        let detector = detector();
        assert!(detector.classify("Functional safety", line_bbox, &page));
        assert!(!detector.classify("functional safety", line_bbox, &page));
    }

    #[test]
    fn light_region_falls_through_to_pattern_rules() {
        let detector = detector();
        let line_bbox = BBox::new(10, 10, 200, 30);
        assert!(!detector.classify("Plain body text here", line_bbox, &blank_page()));
        assert!(detector.classify("1.2 Normative references", line_bbox, &blank_page()));
    }

    #[test]
    fn bold_sampling_tolerates_out_of_bounds_boxes() {
        let page = blank_page();
        assert!(!line_has_bold_strokes(&page, BBox::new(-50, -50, 5000, 5000)));
        assert!(!line_has_bold_strokes(&page, BBox::new(120, 40, 120, 40)));
        assert!(!line_has_bold_strokes(&page, BBox::new(300, 100, 200, 80)));
    }

    #[test]
    fn table_regions_below_minimum_rows_are_discarded() {
        let regions = vec![
            TableRegion {
                bbox: BBox::new(0, 0, 100, 100),
                row_count: 1,
            },
            TableRegion {
                bbox: BBox::new(0, 200, 100, 400),
                row_count: 5,
            },
        ];

        let kept = filter_table_regions(regions, 3);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].row_count, 5);
    }

    #[test]
    fn table_sidecar_rows_become_regions() {
        let raw = br#"[
            {"bbox": [120, 340, 1100, 900], "rows": 6},
            {"bbox": [80, 1000, 600, 1040], "rows": 1}
        ]"#;

        let regions = parse_table_sidecar(raw).unwrap();
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].bbox, BBox::new(120, 340, 1100, 900));
        assert_eq!(regions[0].row_count, 6);
        assert_eq!(regions[1].row_count, 1);

        assert!(parse_table_sidecar(b"{\"bbox\": 3}").is_err());
    }

    #[test]
    fn sidecar_path_sits_next_to_the_page_image() {
        let path = SidecarTableDetector::sidecar_path(Path::new("pages/report_page_003.png"));
        assert_eq!(path, Path::new("pages/report_page_003.tables.json"));
    }

    #[test]
    fn word_membership_requires_full_containment() {
        let tables = vec![TableRegion {
            bbox: BBox::new(100, 100, 500, 400),
            row_count: 4,
        }];

        assert!(word_in_table(BBox::new(150, 120, 300, 160), &tables));
        assert!(!word_in_table(BBox::new(90, 120, 300, 160), &tables));
        assert!(!word_in_table(BBox::new(150, 390, 300, 420), &tables));
        assert!(!word_in_table(BBox::new(150, 120, 300, 160), &[]));
    }
}
