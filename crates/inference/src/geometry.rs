/// Axis-aligned box in corner form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub xmin: f32,
    pub ymin: f32,
    pub xmax: f32,
    pub ymax: f32,
}

impl BoundingBox {
    pub fn new(xmin: f32, ymin: f32, xmax: f32, ymax: f32) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    pub fn width(&self) -> f32 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f32 {
        self.ymax - self.ymin
    }

    /// Area, zero for inverted boxes.
    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    /// Scale each axis, e.g. from normalized to pixel coordinates.
    pub fn scale(&self, sx: f32, sy: f32) -> Self {
        Self::new(
            self.xmin * sx,
            self.ymin * sy,
            self.xmax * sx,
            self.ymax * sy,
        )
    }
}

/// Intersection over union of two boxes.
///
/// Each overlap axis is clamped at zero before multiplying, so boxes that are
/// disjoint on either axis score exactly 0. A zero (or non-finite) union also
/// scores 0.
pub fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let overlap_w = (a.xmax.min(b.xmax) - a.xmin.max(b.xmin)).max(0.0);
    let overlap_h = (a.ymax.min(b.ymax) - a.ymin.max(b.ymin)).max(0.0);
    let intersection = overlap_w * overlap_h;

    let union = a.area() + b.area() - intersection;
    if union <= 0.0 || !union.is_finite() {
        return 0.0;
    }
    intersection / union
}
