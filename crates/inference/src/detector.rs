use crate::{
    backend::InferenceBackend,
    config::DetectorConfig,
    error::{ConfigError, PipelineError},
    labels::LabelSet,
    processing::{BoxDecoder, CoordinateMapper, Detection, NmsEngine},
    tensor::TensorView,
};
use common::span;
use ndarray::ArrayViewD;
use preprocess::{LetterboxMetadata, LetterboxPreprocessor, Preprocess};

/// Runs one image through letterbox, inference, decoding, suppression and
/// normalization.
pub struct Detector {
    config: DetectorConfig,
    labels: LabelSet,
    preprocessor: LetterboxPreprocessor,
    decoder: BoxDecoder,
    nms: NmsEngine,
    mapper: CoordinateMapper,
}

impl Detector {
    pub fn new(config: DetectorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let labels = config.label_set()?;

        Ok(Self {
            preprocessor: LetterboxPreprocessor::new(config.input_size(), config.normalization),
            decoder: BoxDecoder::new(config.confidence_threshold),
            nms: NmsEngine::new(config.nms_iou_threshold, config.class_agnostic_nms),
            mapper: CoordinateMapper,
            labels,
            config,
        })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    /// Detect objects in an RGB (HWC) image.
    ///
    /// The backend must already be prepared for this image. An empty result is
    /// a valid outcome; errors mean the image could not be processed at all.
    pub fn detect<B: InferenceBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<Detection>, PipelineError> {
        let _s = span!("detect", width, height);

        let prepared = self.preprocessor.preprocess(pixels, width, height)?;

        let output = {
            let _infer_span = span!("model_inference");
            backend
                .infer(&prepared.tensor)
                .map_err(PipelineError::Backend)?
        };

        self.postprocess(output.view(), &prepared.metadata)
    }

    /// Turn a raw output tensor into detections for an image letterboxed with
    /// `metadata`.
    pub fn postprocess(
        &self,
        output: ArrayViewD<f32>,
        metadata: &LetterboxMetadata,
    ) -> Result<Vec<Detection>, PipelineError> {
        let _s = span!("postprocess");

        let tensor = TensorView::new(output, self.labels.num_classes(), self.config.num_anchors)?;

        let candidates = self.decoder.decode(&tensor, metadata);
        let kept = self.nms.suppress(candidates);
        let detections = self.mapper.map_all(&kept, metadata);

        tracing::debug!(
            kept = kept.len(),
            detections = detections.len(),
            "Postprocessing complete"
        );

        Ok(detections)
    }
}
