use crate::confusion::{ConfusionMatrix, Outcome};
use crate::ground_truth::GroundTruthBox;
use inference::{Detection, DetectorConfig, iou};
use std::collections::BTreeMap;

/// Scope that every image contributes to.
pub const OVERALL_SCOPE: &str = "overall";

/// Greedy IoU matcher between one image's detections and its ground truth.
///
/// Predictions are visited in the order given (the detector emits them by
/// descending score). Each takes the still-unmatched ground-truth box with
/// the highest IoU at or above the threshold. This is not a globally optimal
/// assignment: an early prediction can take a box that a later one overlaps
/// better.
#[derive(Debug, Clone, Copy)]
pub struct Evaluator {
    match_threshold: f32,
    reference: (u32, u32),
}

impl Evaluator {
    /// `reference` is the pixel space ground truth is expressed in;
    /// detections are scaled into it before matching.
    pub fn new(match_threshold: f32, reference: (u32, u32)) -> Self {
        Self {
            match_threshold,
            reference,
        }
    }

    pub fn from_config(config: &DetectorConfig) -> Self {
        Self::new(config.match_iou_threshold, config.reference_size())
    }

    pub fn assign(
        &self,
        detections: &[Detection],
        ground_truth: &[GroundTruthBox],
    ) -> Vec<Outcome> {
        let gt_boxes: Vec<_> = ground_truth.iter().map(GroundTruthBox::bbox).collect();
        let mut gt_used = vec![false; ground_truth.len()];
        let mut outcomes = Vec::with_capacity(detections.len() + ground_truth.len());

        for det in detections {
            let pred = det.to_pixels(self.reference.0, self.reference.1);

            let mut best: Option<(usize, f32)> = None;
            for (j, gt) in gt_boxes.iter().enumerate() {
                if gt_used[j] {
                    continue;
                }
                let overlap = iou(&pred, gt);
                if overlap >= self.match_threshold && best.is_none_or(|(_, b)| overlap > b) {
                    best = Some((j, overlap));
                }
            }

            match best {
                Some((j, _)) => {
                    gt_used[j] = true;
                    outcomes.push(Outcome::Matched {
                        gt_class: ground_truth[j].class_id,
                        pred_class: det.class_id,
                    });
                }
                None => outcomes.push(Outcome::FalsePositive {
                    pred_class: det.class_id,
                }),
            }
        }

        outcomes.extend(
            ground_truth
                .iter()
                .zip(&gt_used)
                .filter(|(_, used)| !**used)
                .map(|(gt, _)| Outcome::Missed {
                    gt_class: gt.class_id,
                }),
        );

        outcomes
    }
}

/// Where an image's outcomes are accumulated.
///
/// Directory scopes live in their own namespace, so a folder called
/// `overall` gets its own matrix instead of merging into the aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope<'a> {
    Overall,
    Directory(&'a str),
}

impl Scope<'_> {
    pub fn name(&self) -> &str {
        match self {
            Scope::Overall => OVERALL_SCOPE,
            Scope::Directory(dir) => dir,
        }
    }
}

/// The run-wide confusion matrix plus one per directory scope.
#[derive(Debug, Clone)]
pub struct ScopedConfusion {
    num_classes: usize,
    overall: ConfusionMatrix,
    directories: BTreeMap<String, ConfusionMatrix>,
}

impl ScopedConfusion {
    pub fn new(num_classes: usize) -> Self {
        Self {
            num_classes,
            overall: ConfusionMatrix::new(num_classes),
            directories: BTreeMap::new(),
        }
    }

    /// Apply one image's outcomes to the overall matrix and to each directory
    /// scope, creating scopes on first use. Repeated directories count once.
    pub fn record<S: AsRef<str>>(&mut self, directories: &[S], outcomes: &[Outcome]) {
        for outcome in outcomes {
            self.overall.record(outcome);
        }

        let mut seen: Vec<&str> = Vec::with_capacity(directories.len());
        for dir in directories {
            let dir = dir.as_ref();
            if seen.contains(&dir) {
                continue;
            }
            seen.push(dir);

            let matrix = self
                .directories
                .entry(dir.to_string())
                .or_insert_with(|| ConfusionMatrix::new(self.num_classes));
            for outcome in outcomes {
                matrix.record(outcome);
            }
        }
    }

    pub fn overall(&self) -> &ConfusionMatrix {
        &self.overall
    }

    /// Matrix of a directory scope.
    pub fn get(&self, directory: &str) -> Option<&ConfusionMatrix> {
        self.directories.get(directory)
    }

    /// Number of scopes, the overall one included.
    pub fn len(&self) -> usize {
        self.directories.len() + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// The overall scope first, then directories in lexical order.
    pub fn iter(&self) -> impl Iterator<Item = (Scope<'_>, &ConfusionMatrix)> {
        std::iter::once((Scope::Overall, &self.overall)).chain(
            self.directories
                .iter()
                .map(|(dir, matrix)| (Scope::Directory(dir.as_str()), matrix)),
        )
    }
}
