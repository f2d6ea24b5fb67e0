use super::InferenceBackend;
use anyhow::Context;
use ndarray::{Array, ArrayD, IxDyn};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Extension of recorded output tensors stored next to their images.
pub const TENSOR_EXTENSION: &str = "bin";

/// Replays output tensors recorded on the target device.
///
/// For an image `dir/frame.jpg` the tensor is read from `dir/frame.bin`: raw
/// native-endian `f32` values laid out as `[attributes, anchors]`.
pub struct ReplayBackend {
    attributes: usize,
    pending: Option<PathBuf>,
}

impl ReplayBackend {
    /// `attributes` is the row count of the recorded tensor (`4 + classes`).
    pub fn new(attributes: usize) -> Self {
        Self {
            attributes,
            pending: None,
        }
    }

    /// Path of the tensor recorded for `source`.
    pub fn tensor_path(source: &Path) -> PathBuf {
        source.with_extension(TENSOR_EXTENSION)
    }

    fn load(&self, path: &Path) -> anyhow::Result<ArrayD<f32>> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read tensor {}", path.display()))?;

        let value_size = std::mem::size_of::<f32>();
        if bytes.len() % value_size != 0 {
            anyhow::bail!(
                "Tensor {} has {} bytes, not a multiple of {}",
                path.display(),
                bytes.len(),
                value_size
            );
        }

        let values: Vec<f32> = bytemuck::pod_collect_to_vec(&bytes);
        if self.attributes == 0 || values.len() % self.attributes != 0 {
            anyhow::bail!(
                "Tensor {} holds {} values, not divisible into {} attribute rows",
                path.display(),
                values.len(),
                self.attributes
            );
        }

        let anchors = values.len() / self.attributes;
        Ok(Array::from_shape_vec(
            IxDyn(&[1, self.attributes, anchors]),
            values,
        )?)
    }
}

impl InferenceBackend for ReplayBackend {
    fn prepare(&mut self, source: &Path) -> anyhow::Result<()> {
        self.pending = Some(Self::tensor_path(source));
        Ok(())
    }

    fn infer(&mut self, _input: &Array<f32, IxDyn>) -> anyhow::Result<ArrayD<f32>> {
        let path = self
            .pending
            .take()
            .context("No recorded tensor selected; call prepare() first")?;
        self.load(&path)
    }
}

/// Write `values` in the format [`ReplayBackend`] reads.
pub fn write_tensor(path: &Path, values: &[f32]) -> anyhow::Result<()> {
    let mut f = File::create(path)
        .with_context(|| format!("Failed to create tensor {}", path.display()))?;
    f.write_all(bytemuck::cast_slice(values))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn dummy_input() -> Array<f32, IxDyn> {
        Array::zeros(IxDyn(&[1, 3, 2, 2]))
    }

    #[test]
    fn test_replays_tensor_next_to_image() {
        let dir = tempdir().unwrap();
        let image = dir.path().join("frame_001.jpg");
        let values: Vec<f32> = (0..12).map(|v| v as f32).collect();
        write_tensor(&ReplayBackend::tensor_path(&image), &values).unwrap();

        let mut backend = ReplayBackend::new(6);
        backend.prepare(&image).unwrap();
        let output = backend.infer(&dummy_input()).unwrap();

        assert_eq!(output.shape(), &[1, 6, 2]);
        assert_eq!(output[[0, 5, 1]], 11.0);
    }

    /// Each prepared tensor is consumed once
    #[test]
    fn test_infer_without_prepare_fails() {
        let mut backend = ReplayBackend::new(6);
        let err = backend.infer(&dummy_input()).unwrap_err();
        assert!(err.to_string().contains("prepare"));
    }

    #[test]
    fn test_missing_tensor_reports_path() {
        let dir = tempdir().unwrap();
        let image = dir.path().join("missing.png");

        let mut backend = ReplayBackend::new(6);
        backend.prepare(&image).unwrap();
        let err = backend.infer(&dummy_input()).unwrap_err();
        assert!(
            err.to_string().contains("missing.bin"),
            "Error should name the tensor path: {}",
            err
        );
    }

    #[test]
    fn test_rejects_ragged_tensor() {
        let dir = tempdir().unwrap();
        let image = dir.path().join("ragged.jpg");
        write_tensor(&ReplayBackend::tensor_path(&image), &[0.0; 7]).unwrap();

        let mut backend = ReplayBackend::new(6);
        backend.prepare(&image).unwrap();
        assert!(backend.infer(&dummy_input()).is_err());
    }
}
