use crate::error::ConfigError;
use crate::labels::LabelSet;
use preprocess::Normalization;
use serde::Deserialize;

/// Immutable detection and evaluation settings shared by every stage.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Class names in model output order.
    pub labels: Vec<String>,
    /// Expected anchor count of the output tensor; `None` accepts any.
    pub num_anchors: Option<usize>,
    pub confidence_threshold: f32,
    pub nms_iou_threshold: f32,
    /// Suppress across classes (`true`) or only within a class.
    pub class_agnostic_nms: bool,
    pub input_width: u32,
    pub input_height: u32,
    /// Resolution ground-truth annotations are expressed in.
    pub reference_width: u32,
    pub reference_height: u32,
    /// Minimum IoU for a prediction to match a ground-truth box.
    pub match_iou_threshold: f32,
    pub normalization: Normalization,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            labels: ["person", "cat", "dog", "catface", "dogface", "hand"]
                .into_iter()
                .map(String::from)
                .collect(),
            num_anchors: Some(1260),
            confidence_threshold: 0.5,
            nms_iou_threshold: 0.45,
            class_agnostic_nms: true,
            input_width: 320,
            input_height: 192,
            reference_width: 1280,
            reference_height: 720,
            match_iou_threshold: 0.5,
            normalization: Normalization::Unit,
        }
    }
}

impl DetectorConfig {
    pub fn input_size(&self) -> (u32, u32) {
        (self.input_width, self.input_height)
    }

    pub fn reference_size(&self) -> (u32, u32) {
        (self.reference_width, self.reference_height)
    }

    pub fn label_set(&self) -> Result<LabelSet, ConfigError> {
        LabelSet::new(self.labels.iter().cloned())
    }

    /// Check every field once, before any image is processed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.label_set()?;

        for (name, value) in [
            ("confidence_threshold", self.confidence_threshold),
            ("nms_iou_threshold", self.nms_iou_threshold),
            ("match_iou_threshold", self.match_iou_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::ThresholdOutOfRange { name, value });
            }
        }

        for (name, width, height) in [
            ("input size", self.input_width, self.input_height),
            ("reference size", self.reference_width, self.reference_height),
        ] {
            if width == 0 || height == 0 {
                return Err(ConfigError::ZeroSize {
                    name,
                    width,
                    height,
                });
            }
        }

        if self.num_anchors == Some(0) {
            return Err(ConfigError::ZeroAnchors);
        }

        Ok(())
    }

    /// Create a small configuration for tests
    #[cfg(test)]
    pub fn test_default() -> Self {
        Self {
            num_anchors: None,
            ..Self::default()
        }
    }
}
