//! Detection value types.

use serde::{Deserialize, Serialize};

/// Axis-aligned box as `(x_min, y_min, x_max, y_max)`.
///
/// `x` runs along columns and `y` along rows. The same type holds
/// normalized (`[0, 1]`) and pixel coordinates; which one applies depends on
/// the producing stage.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge
    pub x_min: f32,
    /// Top edge
    pub y_min: f32,
    /// Right edge
    pub x_max: f32,
    /// Bottom edge
    pub y_max: f32,
}

impl BoundingBox {
    /// Create a new box
    pub fn new(x_min: f32, y_min: f32, x_max: f32, y_max: f32) -> Self {
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }

    /// Box width (zero for inverted boxes)
    pub fn width(&self) -> f32 {
        (self.x_max - self.x_min).max(0.0)
    }

    /// Box height (zero for inverted boxes)
    pub fn height(&self) -> f32 {
        (self.y_max - self.y_min).max(0.0)
    }

    /// Box area
    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Centre as `(x, y)`.
    pub fn center(&self) -> (f32, f32) {
        (
            (self.x_min + self.x_max) * 0.5,
            (self.y_min + self.y_max) * 0.5,
        )
    }

    /// Corners as a 4-vector `[x_min, y_min, x_max, y_max]`.
    pub fn corners(&self) -> [f32; 4] {
        [self.x_min, self.y_min, self.x_max, self.y_max]
    }

    /// Intersection over union; 0.0 when either box is empty.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let ix = (self.x_max.min(other.x_max) - self.x_min.max(other.x_min)).max(0.0);
        let iy = (self.y_max.min(other.y_max) - self.y_min.max(other.y_min)).max(0.0);
        let inter = ix * iy;
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }

    /// Clip every coordinate into `[0, 1]` and order each pair so that
    /// `min <= max`.
    pub fn clipped_unit(&self) -> Self {
        let c = |v: f32| v.clamp(0.0, 1.0);
        let (x0, x1) = (c(self.x_min), c(self.x_max));
        let (y0, y1) = (c(self.y_min), c(self.y_max));
        Self::new(x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1))
    }

    /// Scale a normalized box to pixel coordinates, truncating to integers.
    ///
    /// Products within `PIXEL_SNAP` below an integer are taken as that
    /// integer, so `col / width * width` lands back on `col`.
    pub fn denormalize(&self, width: usize, height: usize) -> Self {
        let (w, h) = (width as f32, height as f32);
        let px = |v: f32, dim: f32| (v * dim + PIXEL_SNAP).trunc();
        Self::new(
            px(self.x_min, w),
            px(self.y_min, h),
            px(self.x_max, w),
            px(self.y_max, h),
        )
    }
}

/// Tolerance absorbing `f32` round-off when scaling back to pixels.
const PIXEL_SNAP: f32 = 1e-3;

/// One detected object: a box and its confidence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Box location
    pub bbox: BoundingBox,
    /// Confidence (peak activation, or fused score)
    pub score: f32,
}

impl Detection {
    /// Create a new detection
    pub fn new(bbox: BoundingBox, score: f32) -> Self {
        Self { bbox, score }
    }

    /// Same detection in pixel coordinates.
    pub fn denormalize(&self, width: usize, height: usize) -> Self {
        Self {
            bbox: self.bbox.denormalize(width, height),
            score: self.score,
        }
    }
}

/// Pixels grouped by clustering, before box construction.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateRegion {
    /// Member pixels as `(row, col)`.
    pub points: Vec<(usize, usize)>,
    /// Largest activation among the members.
    pub peak_score: f32,
}

impl CandidateRegion {
    /// Normalized bounding box of the member pixels.
    ///
    /// Columns are divided by `width` and rows by `height`.
    pub fn bbox(&self, height: usize, width: usize) -> BoundingBox {
        let mut rows = (usize::MAX, 0usize);
        let mut cols = (usize::MAX, 0usize);
        for &(r, c) in &self.points {
            rows = (rows.0.min(r), rows.1.max(r));
            cols = (cols.0.min(c), cols.1.max(c));
        }
        if self.points.is_empty() {
            return BoundingBox::default();
        }
        let (w, h) = (width as f32, height as f32);
        BoundingBox::new(
            cols.0 as f32 / w,
            rows.0 as f32 / h,
            cols.1 as f32 / w,
            rows.1 as f32 / h,
        )
    }

    /// Convert to a normalized [`Detection`].
    pub fn to_detection(&self, height: usize, width: usize) -> Detection {
        Detection::new(self.bbox(height, width), self.peak_score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_iou() {
        let a = BoundingBox::new(0.0, 0.0, 2.0, 2.0);
        let b = BoundingBox::new(1.0, 0.0, 3.0, 2.0);
        assert_abs_diff_eq!(a.iou(&a), 1.0);
        assert_abs_diff_eq!(a.iou(&b), 2.0 / 6.0, epsilon = 1e-6);
        let far = BoundingBox::new(5.0, 5.0, 6.0, 6.0);
        assert_eq!(a.iou(&far), 0.0);
        let empty = BoundingBox::new(1.0, 1.0, 1.0, 1.0);
        assert_eq!(empty.iou(&empty), 0.0);
    }

    #[test]
    fn test_clipped_unit_orders_coordinates() {
        let b = BoundingBox::new(0.8, 1.4, -0.2, 0.5).clipped_unit();
        assert_eq!(b, BoundingBox::new(0.0, 0.5, 0.8, 1.0));
    }

    #[test]
    fn test_denormalize_truncates() {
        let b = BoundingBox::new(0.1, 0.25, 0.5, 0.999).denormalize(346, 260);
        assert_eq!(b, BoundingBox::new(34.0, 65.0, 173.0, 259.0));
    }

    #[test]
    fn test_region_round_trips_to_exact_pixels() {
        let region = CandidateRegion {
            points: (10..16)
                .flat_map(|r| (58..64).map(move |c| (r, c)))
                .collect(),
            peak_score: 3.0,
        };
        let px = region.to_detection(180, 240).denormalize(240, 180).bbox;
        assert_eq!(px, BoundingBox::new(58.0, 10.0, 63.0, 15.0));

        for (width, height) in [(240usize, 180usize), (346, 260), (640, 480), (1280, 720)] {
            for col in 0..width {
                let region = CandidateRegion {
                    points: vec![(0, col), (height - 1, col)],
                    peak_score: 1.0,
                };
                let px = region.to_detection(height, width).denormalize(width, height).bbox;
                assert_eq!(px.x_min, col as f32, "col {col} width {width}");
                assert_eq!(px.x_max, col as f32, "col {col} width {width}");
                assert_eq!(px.y_max, (height - 1) as f32);
            }
        }
    }

    #[test]
    fn test_region_bbox_uses_column_for_x() {
        let region = CandidateRegion {
            points: vec![(2, 10), (4, 12), (3, 11)],
            peak_score: 9.0,
        };
        let det = region.to_detection(20, 40);
        assert_abs_diff_eq!(det.bbox.x_min, 10.0 / 40.0);
        assert_abs_diff_eq!(det.bbox.x_max, 12.0 / 40.0);
        assert_abs_diff_eq!(det.bbox.y_min, 2.0 / 20.0);
        assert_abs_diff_eq!(det.bbox.y_max, 4.0 / 20.0);
        assert_eq!(det.score, 9.0);
    }
}
