use super::InferenceBackend;
use ndarray::{Array, ArrayD, IxDyn};
use ort::{
    session::{Session, builder::GraphOptimizationLevel},
    value::TensorRef,
};
use std::path::Path;

#[derive(Debug, Clone, Copy)]
pub enum ExecutionProvider {
    Cpu,
    Cuda,
}

/// ONNX Runtime session for a YOLOv8-style export with one image input and
/// one `[1, 4+C, N]` output.
pub struct OrtBackend {
    session: Session,
    input_name: String,
    output_name: String,
}

impl OrtBackend {
    pub fn load_model(path: &Path) -> anyhow::Result<Self> {
        Self::load_model_with_provider(path, ExecutionProvider::Cpu)
    }

    /// Load model with specified execution provider
    pub fn load_model_with_provider(
        path: &Path,
        provider: ExecutionProvider,
    ) -> anyhow::Result<Self> {
        // Initialize ORT environment (idempotent)
        let _ = ort::init().commit();

        let mut builder = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?;

        match provider {
            ExecutionProvider::Cuda => {
                tracing::info!("Initializing ONNX Runtime with CUDA execution provider");
                builder = builder.with_execution_providers([
                    ort::execution_providers::CUDAExecutionProvider::default()
                        .with_device_id(0)
                        .build()
                        .error_on_failure(),
                ])?;
            }
            ExecutionProvider::Cpu => {
                tracing::info!("Initializing ONNX Runtime with CPU execution provider");
            }
        }

        let session = builder.commit_from_file(path)?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .ok_or_else(|| anyhow::anyhow!("Model has no inputs"))?;
        let output_name = session
            .outputs
            .first()
            .map(|o| o.name.clone())
            .ok_or_else(|| anyhow::anyhow!("Model has no outputs"))?;

        tracing::info!(
            path = %path.display(),
            input = %input_name,
            output = %output_name,
            "Model loaded"
        );

        Ok(Self {
            session,
            input_name,
            output_name,
        })
    }
}

impl InferenceBackend for OrtBackend {
    fn infer(&mut self, input: &Array<f32, IxDyn>) -> anyhow::Result<ArrayD<f32>> {
        let outputs = self.session.run(ort::inputs![
            self.input_name.as_str() => TensorRef::from_array_view(input.view())?
        ])?;

        let output = outputs[self.output_name.as_str()].try_extract_array::<f32>()?;
        Ok(output.into_owned())
    }
}
