use super::decode::RawBox;
use crate::geometry::BoundingBox;
use preprocess::LetterboxMetadata;

/// Final detection, normalized to `[0, 1]` against the source image.
///
/// Always satisfies `0 <= xmin < xmax <= 1` and `0 <= ymin < ymax <= 1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub xmin: f32,
    pub ymin: f32,
    pub xmax: f32,
    pub ymax: f32,
    pub score: f32,
    pub class_id: usize,
}

impl Detection {
    pub fn bbox(&self) -> BoundingBox {
        BoundingBox::new(self.xmin, self.ymin, self.xmax, self.ymax)
    }

    /// Corners in a `width x height` pixel space.
    pub fn to_pixels(&self, width: u32, height: u32) -> BoundingBox {
        self.bbox().scale(width as f32, height as f32)
    }
}

pub struct CoordinateMapper;

impl CoordinateMapper {
    /// Normalize a kept box by the source image size and clamp into the unit
    /// square. Returns `None` when clamping leaves no area.
    pub fn map(&self, raw: &RawBox, metadata: &LetterboxMetadata) -> Option<Detection> {
        let width = metadata.source_width as f32;
        let height = metadata.source_height as f32;

        // f32::max/min swallow NaN, so reject non-finite input up front
        if ![raw.left, raw.top, raw.width, raw.height]
            .iter()
            .all(|v| v.is_finite())
        {
            tracing::trace!(?raw, "Dropping non-finite box");
            return None;
        }

        let xmin = (raw.left / width).max(0.0);
        let ymin = (raw.top / height).max(0.0);
        let xmax = ((raw.left + raw.width) / width).min(1.0);
        let ymax = ((raw.top + raw.height) / height).min(1.0);

        if xmin >= xmax || ymin >= ymax {
            tracing::trace!(?raw, "Dropping degenerate box");
            return None;
        }

        Some(Detection {
            xmin,
            ymin,
            xmax,
            ymax,
            score: raw.score,
            class_id: raw.class_id,
        })
    }

    pub fn map_all(&self, boxes: &[RawBox], metadata: &LetterboxMetadata) -> Vec<Detection> {
        boxes
            .iter()
            .filter_map(|raw| self.map(raw, metadata))
            .collect()
    }
}
