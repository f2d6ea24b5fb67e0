use super::decode::RawBox;
use crate::geometry::iou;

/// Greedy non-maximum suppression.
pub struct NmsEngine {
    pub iou_threshold: f32,
    /// When false, boxes only suppress boxes of their own class.
    pub class_agnostic: bool,
}

impl NmsEngine {
    pub fn new(iou_threshold: f32, class_agnostic: bool) -> Self {
        Self {
            iou_threshold,
            class_agnostic,
        }
    }

    /// Keep the highest-scoring box, drop every remaining box overlapping it by
    /// more than the threshold, and repeat.
    ///
    /// The sort is stable, so equal scores keep their input order and the
    /// earlier box wins. Output is in descending score order.
    #[tracing::instrument(level = "debug", skip_all, fields(candidates = boxes.len()))]
    pub fn suppress(&self, mut boxes: Vec<RawBox>) -> Vec<RawBox> {
        boxes.sort_by(|a, b| b.score.total_cmp(&a.score));

        let bboxes: Vec<_> = boxes.iter().map(RawBox::bbox).collect();
        let mut suppressed = vec![false; boxes.len()];
        let mut kept = Vec::new();

        for i in 0..boxes.len() {
            if suppressed[i] {
                continue;
            }
            kept.push(boxes[i]);

            for j in (i + 1)..boxes.len() {
                if suppressed[j] {
                    continue;
                }
                if !self.class_agnostic && boxes[i].class_id != boxes[j].class_id {
                    continue;
                }
                if iou(&bboxes[i], &bboxes[j]) > self.iou_threshold {
                    suppressed[j] = true;
                }
            }
        }

        tracing::trace!(kept = kept.len(), "Suppression complete");
        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(left: f32, top: f32, width: f32, height: f32, score: f32, class_id: usize) -> RawBox {
        RawBox {
            left,
            top,
            width,
            height,
            score,
            class_id,
        }
    }

    /// Two boxes with IoU 0.6 at threshold 0.45: only the stronger survives
    #[test]
    fn test_overlapping_pair_keeps_higher_score() {
        // 100x100 boxes shifted by 25 on x: intersection 7500, union 12500 -> 0.6
        let a = raw(0.0, 0.0, 100.0, 100.0, 0.7, 0);
        let b = raw(25.0, 0.0, 100.0, 100.0, 0.9, 0);
        assert!((iou(&a.bbox(), &b.bbox()) - 0.6).abs() < 1e-6);

        let kept = NmsEngine::new(0.45, true).suppress(vec![a, b]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].score, 0.9);
    }

    /// Overlap equal to the threshold is not suppressed
    #[test]
    fn test_threshold_is_exclusive() {
        // Intersection 50 of union 150 -> 1/3
        let a = raw(0.0, 0.0, 10.0, 10.0, 0.9, 0);
        let b = raw(5.0, 0.0, 10.0, 10.0, 0.8, 0);
        let threshold = iou(&a.bbox(), &b.bbox());
        let kept = NmsEngine::new(threshold, true).suppress(vec![a, b]);
        assert_eq!(kept.len(), 2);
    }

    /// Equal scores keep the first-seen box
    #[test]
    fn test_ties_broken_by_insertion_order() {
        let first = raw(0.0, 0.0, 10.0, 10.0, 0.8, 1);
        let second = raw(1.0, 1.0, 10.0, 10.0, 0.8, 2);
        let kept = NmsEngine::new(0.45, true).suppress(vec![first, second]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].class_id, 1, "First inserted box should win the tie");
    }

    /// Per-class mode lets overlapping boxes of different classes coexist
    #[test]
    fn test_class_aware_mode() {
        let a = raw(0.0, 0.0, 10.0, 10.0, 0.9, 0);
        let b = raw(0.0, 0.0, 10.0, 10.0, 0.8, 1);
        let c = raw(0.0, 0.0, 10.0, 10.0, 0.7, 0);

        let kept = NmsEngine::new(0.45, false).suppress(vec![a, b, c]);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].class_id, 0);
        assert_eq!(kept[1].class_id, 1);

        let kept = NmsEngine::new(0.45, true).suppress(vec![a, b, c]);
        assert_eq!(kept.len(), 1);
    }

    /// Output is pairwise below threshold, a subset of the input, contains the
    /// best box, and re-running is a no-op
    #[test]
    fn test_suppression_properties() {
        let mut boxes = Vec::new();
        for i in 0..40 {
            let offset = (i * 7 % 50) as f32;
            let score = ((i * 37) % 100) as f32 / 100.0;
            boxes.push(raw(offset, offset / 2.0, 30.0, 20.0, score, i % 3));
        }
        let best = boxes
            .iter()
            .copied()
            .max_by(|a, b| a.score.total_cmp(&b.score))
            .unwrap();

        let nms = NmsEngine::new(0.45, true);
        let kept = nms.suppress(boxes.clone());

        for (i, a) in kept.iter().enumerate() {
            assert!(boxes.contains(a), "Output must be a subset of the input");
            for b in kept.iter().skip(i + 1) {
                assert!(iou(&a.bbox(), &b.bbox()) <= 0.45);
            }
        }
        assert!(kept.contains(&best), "Highest-scoring box must survive");
        assert_eq!(nms.suppress(kept.clone()), kept, "NMS should be idempotent");
    }

    #[test]
    fn test_empty_input() {
        assert!(NmsEngine::new(0.45, true).suppress(Vec::new()).is_empty());
    }
}
