use ndarray::{Array, ArrayD, IxDyn};
use std::path::Path;

#[cfg(feature = "ort-backend")]
pub mod ort;

pub mod replay;

pub use replay::ReplayBackend;

/// Opaque synchronous inference engine: preprocessed tensor in, raw detection
/// head output out.
pub trait InferenceBackend {
    /// Called with the source image path before each [`InferenceBackend::infer`].
    ///
    /// Backends that execute a model ignore it; backends that replay recorded
    /// outputs use it to locate the matching tensor.
    fn prepare(&mut self, _source: &Path) -> anyhow::Result<()> {
        Ok(())
    }

    /// Run inference on a `[1, 3, H, W]` input.
    fn infer(&mut self, input: &Array<f32, IxDyn>) -> anyhow::Result<ArrayD<f32>>;
}

impl<B: InferenceBackend + ?Sized> InferenceBackend for Box<B> {
    fn prepare(&mut self, source: &Path) -> anyhow::Result<()> {
        (**self).prepare(source)
    }

    fn infer(&mut self, input: &Array<f32, IxDyn>) -> anyhow::Result<ArrayD<f32>> {
        (**self).infer(input)
    }
}
