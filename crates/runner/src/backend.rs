use crate::config::RunnerConfig;
use inference::{InferenceBackend, ReplayBackend, tensor::BOX_ATTRIBUTES};

#[cfg(feature = "ort-backend")]
use inference::backend::ort::{ExecutionProvider, OrtBackend};

/// ONNX Runtime when a model is configured, otherwise replay of the tensors
/// recorded next to each image.
pub fn build_backend(config: &RunnerConfig) -> anyhow::Result<Box<dyn InferenceBackend>> {
    match &config.model_path {
        #[cfg(feature = "ort-backend")]
        Some(path) => {
            let provider = if config.use_cuda {
                ExecutionProvider::Cuda
            } else {
                ExecutionProvider::Cpu
            };
            tracing::info!(model = %path.display(), ?provider, "Loading inference model");
            Ok(Box::new(OrtBackend::load_model_with_provider(path, provider)?))
        }
        #[cfg(not(feature = "ort-backend"))]
        Some(path) => anyhow::bail!(
            "Model {} given but detect-eval was built without the `ort-backend` feature",
            path.display()
        ),
        None => {
            if config.use_cuda {
                tracing::warn!("use_cuda has no effect without a model");
            }
            let attributes = BOX_ATTRIBUTES + config.detector.labels.len();
            tracing::info!(attributes, "No model configured, replaying recorded tensors");
            Ok(Box::new(ReplayBackend::new(attributes)))
        }
    }
}
