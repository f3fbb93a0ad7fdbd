use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use image::{Pixel, Rgba, RgbaImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use crate::geometry::BBox;
use crate::labels::{BioLabel, SpanCategory};

const HEADER_FILL: Rgba<u8> = Rgba([0, 0, 255, 60]);
const HEADER_OUTLINE: Rgba<u8> = Rgba([0, 0, 255, 200]);
const TABLE_FILL: Rgba<u8> = Rgba([0, 255, 0, 60]);
const TABLE_OUTLINE: Rgba<u8> = Rgba([0, 180, 0, 200]);
const OUTLINE_THICKNESS: i32 = 2;

pub fn render_page_highlights(
    image_path: &Path,
    labeled_boxes: impl IntoIterator<Item = (i64, BBox)>,
    out_dir: &Path,
) -> Result<PathBuf> {
    let mut page = image::open(image_path)
        .with_context(|| format!("failed to open page image {}", image_path.display()))?
        .to_rgba8();
    let (page_width, page_height) = page.dimensions();

    for (label_id, bbox) in labeled_boxes {
        let Some((fill, outline)) = overlay_colors(label_id) else {
            continue;
        };

        let rect = bbox.denormalize(page_width, page_height);
        blend_fill(&mut page, rect, fill);
        draw_outline(&mut page, rect, outline);
    }

    let Some(filename) = image_path.file_name() else {
        bail!("page image path has no filename: {}", image_path.display());
    };
    let out_path = out_dir.join(filename).with_extension("png");

    image::DynamicImage::ImageRgba8(page)
        .to_rgb8()
        .save(&out_path)
        .with_context(|| format!("failed to write highlight image {}", out_path.display()))?;

    Ok(out_path)
}

fn overlay_colors(label_id: i64) -> Option<(Rgba<u8>, Rgba<u8>)> {
    match BioLabel::from_id(label_id)?.category()? {
        SpanCategory::Header => Some((HEADER_FILL, HEADER_OUTLINE)),
        SpanCategory::Table => Some((TABLE_FILL, TABLE_OUTLINE)),
    }
}

fn blend_fill(page: &mut RgbaImage, rect: BBox, color: Rgba<u8>) {
    let (width, height) = page.dimensions();
    let x0 = rect.x0.clamp(0, width as i32) as u32;
    let y0 = rect.y0.clamp(0, height as i32) as u32;
    let x1 = rect.x1.clamp(0, width as i32) as u32;
    let y1 = rect.y1.clamp(0, height as i32) as u32;

    for y in y0..y1 {
        for x in x0..x1 {
            page.get_pixel_mut(x, y).blend(&color);
        }
    }
}

fn draw_outline(page: &mut RgbaImage, rect: BBox, color: Rgba<u8>) {
    for inset in 0..OUTLINE_THICKNESS {
        let width = rect.x1 - rect.x0 - 2 * inset;
        let height = rect.y1 - rect.y0 - 2 * inset;
        if width <= 0 || height <= 0 {
            return;
        }

        draw_hollow_rect_mut(
            page,
            Rect::at(rect.x0 + inset, rect.y0 + inset).of_size(width as u32, height as u32),
            color,
        );
    }
}
