pub const NORM_RANGE: i32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BBox {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

impl BBox {
    pub const ZERO: BBox = BBox {
        x0: 0,
        y0: 0,
        x1: 0,
        y1: 0,
    };

    pub fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn as_array(self) -> [i32; 4] {
        [self.x0, self.y0, self.x1, self.y1]
    }

    pub fn normalize(self, page_width: u32, page_height: u32) -> BBox {
        BBox {
            x0: scale_to_norm(self.x0, page_width),
            y0: scale_to_norm(self.y0, page_height),
            x1: scale_to_norm(self.x1, page_width),
            y1: scale_to_norm(self.y1, page_height),
        }
    }

    pub fn denormalize(self, page_width: u32, page_height: u32) -> BBox {
        BBox {
            x0: scale_to_pixels(self.x0, page_width),
            y0: scale_to_pixels(self.y0, page_height),
            x1: scale_to_pixels(self.x1, page_width),
            y1: scale_to_pixels(self.y1, page_height),
        }
    }

    pub fn contains(self, other: BBox) -> bool {
        other.x0 >= self.x0 && other.y0 >= self.y0 && other.x1 <= self.x1 && other.y1 <= self.y1
    }
}

impl From<[i32; 4]> for BBox {
    fn from(values: [i32; 4]) -> Self {
        BBox::new(values[0], values[1], values[2], values[3])
    }
}

fn scale_to_norm(value: i32, dim: u32) -> i32 {
    if dim == 0 {
        return 0;
    }

    let scaled = (f64::from(value) / f64::from(dim) * f64::from(NORM_RANGE)).round() as i32;
    scaled.clamp(0, NORM_RANGE)
}

fn scale_to_pixels(value: i32, dim: u32) -> i32 {
    (f64::from(value) / f64::from(NORM_RANGE) * f64::from(dim)).round() as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_scales_to_thousandths() {
        let bbox = BBox::new(100, 50, 300, 120).normalize(1000, 500);
        assert_eq!(bbox, BBox::new(100, 100, 300, 240));
    }

    #[test]
    fn normalize_clamps_out_of_range_coordinates() {
        let bbox = BBox::new(-40, 10, 2400, 900).normalize(1200, 800);
        assert_eq!(bbox.x0, 0);
        assert_eq!(bbox.x1, NORM_RANGE);
        assert_eq!(bbox.y1, NORM_RANGE);
    }

    #[test]
    fn normalize_tolerates_degenerate_boxes() {
        let zero_area = BBox::new(250, 400, 250, 400).normalize(1000, 1000);
        assert_eq!(zero_area, BBox::new(250, 400, 250, 400));

        let inverted = BBox::new(300, 100, 100, 50).normalize(1000, 500);
        assert_eq!(inverted, BBox::new(300, 200, 100, 100));
    }

    #[test]
    fn normalize_with_zero_page_dimensions_yields_zero() {
        let bbox = BBox::new(10, 20, 30, 40).normalize(0, 0);
        assert_eq!(bbox, BBox::ZERO);
    }

    #[test]
    fn denormalize_round_trips_within_one_unit() {
        let page_width = 1275;
        let page_height = 1650;
        let boxes = [
            BBox::new(33, 47, 512, 91),
            BBox::new(0, 0, 1275, 1650),
            BBox::new(641, 1203, 1190, 1248),
        ];

        for original in boxes {
            let restored = original
                .normalize(page_width, page_height)
                .denormalize(page_width, page_height);
            for (a, b) in original.as_array().into_iter().zip(restored.as_array()) {
                assert!((a - b).abs() <= 1, "{a} vs {b}");
            }
        }
    }

    #[test]
    fn contains_requires_all_four_coordinates_inside() {
        let table = BBox::new(100, 100, 500, 400);
        assert!(table.contains(BBox::new(150, 120, 300, 160)));
        assert!(table.contains(BBox::new(100, 100, 500, 400)));
        assert!(!table.contains(BBox::new(90, 120, 300, 160)));
        assert!(!table.contains(BBox::new(150, 120, 520, 160)));
    }
}
