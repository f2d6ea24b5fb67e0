use serde::Serialize;

/// Where one ground-truth or predicted box ended up after matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Matched { gt_class: usize, pred_class: usize },
    Missed { gt_class: usize },
    FalsePositive { pred_class: usize },
}

/// Square `(C+1) x (C+1)` count grid indexed by (ground-truth class,
/// predicted class); the last row and column are background.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfusionMatrix {
    size: usize,
    cells: Vec<u64>,
}

/// Precision, recall and F1 derived from a matrix, background excluded from
/// the true positives.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    pub true_positives: u64,
    pub false_positives: u64,
    pub false_negatives: u64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

impl Summary {
    fn from_counts(true_positives: u64, false_positives: u64, false_negatives: u64) -> Self {
        let ratio = |num: u64, den: u64| if den == 0 { 0.0 } else { num as f64 / den as f64 };

        let precision = ratio(true_positives, true_positives + false_positives);
        let recall = ratio(true_positives, true_positives + false_negatives);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Self {
            true_positives,
            false_positives,
            false_negatives,
            precision,
            recall,
            f1,
        }
    }
}

impl ConfusionMatrix {
    pub fn new(num_classes: usize) -> Self {
        let size = num_classes + 1;
        Self {
            size,
            cells: vec![0; size * size],
        }
    }

    /// Side length, background included.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn background_index(&self) -> usize {
        self.size - 1
    }

    pub fn get(&self, gt_class: usize, pred_class: usize) -> u64 {
        if gt_class >= self.size || pred_class >= self.size {
            return 0;
        }
        self.cells[gt_class * self.size + pred_class]
    }

    /// Add one to a cell.
    ///
    /// An out-of-range index is a caller bug: it panics in debug builds and
    /// is logged and dropped otherwise.
    pub fn increment(&mut self, gt_class: usize, pred_class: usize) {
        debug_assert!(
            gt_class < self.size && pred_class < self.size,
            "confusion cell ({gt_class}, {pred_class}) outside {0}x{0} matrix",
            self.size
        );
        if gt_class >= self.size || pred_class >= self.size {
            tracing::warn!(
                gt_class,
                pred_class,
                size = self.size,
                "Ignoring out-of-range confusion cell"
            );
            return;
        }
        self.cells[gt_class * self.size + pred_class] += 1;
    }

    pub fn record(&mut self, outcome: &Outcome) {
        let background = self.background_index();
        match *outcome {
            Outcome::Matched {
                gt_class,
                pred_class,
            } => self.increment(gt_class, pred_class),
            Outcome::Missed { gt_class } => self.increment(gt_class, background),
            Outcome::FalsePositive { pred_class } => self.increment(background, pred_class),
        }
    }

    pub fn rows(&self) -> impl Iterator<Item = &[u64]> {
        self.cells.chunks_exact(self.size)
    }

    /// Largest cell value, zero for an empty matrix.
    pub fn max(&self) -> u64 {
        self.cells.iter().copied().max().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.cells.iter().sum()
    }

    pub fn to_rows(&self) -> Vec<Vec<u64>> {
        self.rows().map(<[u64]>::to_vec).collect()
    }

    /// Each row divided by its sum; rows that sum to zero stay zero.
    pub fn probabilities(&self) -> Vec<Vec<f64>> {
        self.rows()
            .map(|row| {
                let sum: u64 = row.iter().sum();
                row.iter()
                    .map(|&c| if sum == 0 { 0.0 } else { c as f64 / sum as f64 })
                    .collect()
            })
            .collect()
    }

    /// Totals over every real class.
    ///
    /// False positives are the off-diagonal entries of each predicted-class
    /// column (background row included); false negatives are the
    /// off-diagonal entries of each ground-truth row (background column
    /// included).
    pub fn summary(&self) -> Summary {
        let (mut tp, mut fp, mut fn_) = (0, 0, 0);
        for class in 0..self.background_index() {
            let (t, p, n) = self.class_counts(class);
            tp += t;
            fp += p;
            fn_ += n;
        }
        Summary::from_counts(tp, fp, fn_)
    }

    /// Summary restricted to one class, `None` for background or out of
    /// range.
    pub fn class_summary(&self, class: usize) -> Option<Summary> {
        if class >= self.background_index() {
            return None;
        }
        let (tp, fp, fn_) = self.class_counts(class);
        Some(Summary::from_counts(tp, fp, fn_))
    }

    fn class_counts(&self, class: usize) -> (u64, u64, u64) {
        let tp = self.get(class, class);
        let column: u64 = (0..self.size).map(|row| self.get(row, class)).sum();
        let row: u64 = (0..self.size).map(|col| self.get(class, col)).sum();
        (tp, column - tp, row - tp)
    }
}

/// Serializable snapshot of one scope's matrix.
#[derive(Debug, Clone, Serialize)]
pub struct ConfusionReport {
    pub scope: String,
    pub labels: Vec<String>,
    pub matrix: Vec<Vec<u64>>,
    pub probabilities: Vec<Vec<f64>>,
    pub summary: Summary,
    pub per_class: Vec<ClassReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassReport {
    pub label: String,
    #[serde(flatten)]
    pub summary: Summary,
}

impl ConfusionReport {
    /// `labels` must list every class followed by background.
    pub fn new(scope: &str, labels: &[&str], matrix: &ConfusionMatrix) -> Self {
        let per_class = (0..matrix.background_index())
            .filter_map(|class| {
                Some(ClassReport {
                    label: labels.get(class)?.to_string(),
                    summary: matrix.class_summary(class)?,
                })
            })
            .collect();

        Self {
            scope: scope.to_string(),
            labels: labels.iter().map(|l| l.to_string()).collect(),
            matrix: matrix.to_rows(),
            probabilities: matrix.probabilities(),
            summary: matrix.summary(),
            per_class,
        }
    }
}
