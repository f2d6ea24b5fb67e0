use crate::geometry::BoundingBox;
use crate::tensor::TensorView;
use preprocess::LetterboxMetadata;

/// Candidate box in source-image pixels, before suppression.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawBox {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
    pub score: f32,
    pub class_id: usize,
}

impl RawBox {
    pub fn bbox(&self) -> BoundingBox {
        BoundingBox::new(
            self.left,
            self.top,
            self.left + self.width,
            self.top + self.height,
        )
    }
}

pub struct BoxDecoder {
    pub confidence_threshold: f32,
}

impl BoxDecoder {
    pub fn new(confidence_threshold: f32) -> Self {
        Self {
            confidence_threshold,
        }
    }

    /// Scan every anchor and keep those whose best class score reaches the
    /// threshold, with coordinates mapped back through the letterbox.
    ///
    /// Boxes whose corrected width or height is not positive are dropped.
    #[tracing::instrument(level = "debug", skip_all, fields(anchors = tensor.num_anchors()))]
    pub fn decode(&self, tensor: &TensorView, metadata: &LetterboxMetadata) -> Vec<RawBox> {
        let ratio_x = metadata.ratio_x();
        let ratio_y = metadata.ratio_y();
        let pad_left = metadata.pad_left as f32;
        let pad_top = metadata.pad_top as f32;

        let mut boxes = Vec::new();
        let mut degenerate = 0usize;

        for anchor in 0..tensor.num_anchors() {
            let Some((class_id, score)) = tensor.class_scores(anchor).and_then(|s| argmax(s.iter()))
            else {
                continue;
            };

            if score < self.confidence_threshold {
                continue;
            }

            let Some([cx, cy, w, h]) = tensor.box_attributes(anchor) else {
                continue;
            };

            let x = (cx - pad_left) * ratio_x;
            let y = (cy - pad_top) * ratio_y;
            let width = w * ratio_x;
            let height = h * ratio_y;

            if !(width > 0.0 && height > 0.0) || !x.is_finite() || !y.is_finite() {
                degenerate += 1;
                continue;
            }

            boxes.push(RawBox {
                left: (x - width / 2.0).max(0.0),
                top: (y - height / 2.0).max(0.0),
                width,
                height,
                score,
                class_id,
            });
        }

        tracing::trace!(
            candidates = boxes.len(),
            degenerate,
            "Decoded candidate boxes"
        );

        boxes
    }
}

/// Index and value of the largest score; ties keep the lowest index and NaN
/// never wins.
fn argmax<'a>(scores: impl Iterator<Item = &'a f32>) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &score) in scores.enumerate() {
        match best {
            Some((_, current)) if score <= current || score.is_nan() => {}
            None if score.is_nan() => {}
            _ => best = Some((i, score)),
        }
    }
    best
}
