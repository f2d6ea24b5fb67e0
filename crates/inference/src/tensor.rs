use crate::error::PipelineError;
use ndarray::{ArrayView1, ArrayView2, ArrayViewD, Axis, Ix2, s};

/// Number of box rows (`cx, cy, w, h`) ahead of the class scores.
pub const BOX_ATTRIBUTES: usize = 4;

/// Validated view over a detection head output laid out as
/// `[4 + num_classes, num_anchors]`: one column per anchor, box attributes in
/// the first four rows and class scores below.
#[derive(Debug, Clone, Copy)]
pub struct TensorView<'a> {
    data: ArrayView2<'a, f32>,
}

impl<'a> TensorView<'a> {
    /// Wrap a backend output shaped `[4+C, N]` or `[1, 4+C, N]`.
    ///
    /// `num_anchors` of `None` accepts whatever anchor count the tensor carries.
    pub fn new(
        tensor: ArrayViewD<'a, f32>,
        num_classes: usize,
        num_anchors: Option<usize>,
    ) -> Result<Self, PipelineError> {
        let shape = tensor.shape().to_vec();
        let shape_error = || PipelineError::TensorShape {
            actual: shape.clone(),
            attributes: BOX_ATTRIBUTES + num_classes,
            anchors: num_anchors.map_or_else(|| "N".to_string(), |n| n.to_string()),
        };

        let squeezed = match tensor.ndim() {
            2 => tensor,
            3 if shape[0] == 1 => tensor.index_axis_move(Axis(0), 0),
            _ => return Err(shape_error()),
        };
        let data = squeezed
            .into_dimensionality::<Ix2>()
            .map_err(|_| shape_error())?;

        let (rows, cols) = data.dim();
        if rows != BOX_ATTRIBUTES + num_classes || num_anchors.is_some_and(|n| n != cols) {
            return Err(shape_error());
        }

        Ok(Self { data })
    }

    /// Wrap a flat buffer holding `[4+C, N]` values in row-major order.
    pub fn from_slice(
        data: &'a [f32],
        num_classes: usize,
        num_anchors: usize,
    ) -> Result<Self, PipelineError> {
        let attributes = BOX_ATTRIBUTES + num_classes;
        let view = ArrayView2::from_shape((attributes, num_anchors), data).map_err(|_| {
            PipelineError::TensorShape {
                actual: vec![data.len()],
                attributes,
                anchors: num_anchors.to_string(),
            }
        })?;
        Self::new(view.into_dyn(), num_classes, Some(num_anchors))
    }

    pub fn num_anchors(&self) -> usize {
        self.data.ncols()
    }

    pub fn num_classes(&self) -> usize {
        self.data.nrows() - BOX_ATTRIBUTES
    }

    /// Single value, `None` when out of bounds.
    pub fn get(&self, attribute: usize, anchor: usize) -> Option<f32> {
        self.data.get((attribute, anchor)).copied()
    }

    /// `[cx, cy, w, h]` of one anchor in model-input pixels.
    pub fn box_attributes(&self, anchor: usize) -> Option<[f32; 4]> {
        if anchor >= self.num_anchors() {
            return None;
        }
        Some([
            self.data[(0, anchor)],
            self.data[(1, anchor)],
            self.data[(2, anchor)],
            self.data[(3, anchor)],
        ])
    }

    /// Per-class scores of one anchor.
    pub fn class_scores(&self, anchor: usize) -> Option<ArrayView1<'_, f32>> {
        if anchor >= self.num_anchors() {
            return None;
        }
        Some(self.data.slice(s![BOX_ATTRIBUTES.., anchor]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array, IxDyn};

    fn sample(num_classes: usize, num_anchors: usize) -> Vec<f32> {
        (0..(BOX_ATTRIBUTES + num_classes) * num_anchors)
            .map(|v| v as f32)
            .collect()
    }

    /// Attributes are rows, anchors are columns
    #[test]
    fn test_column_major_by_anchor() {
        let data = sample(2, 3);
        let view = TensorView::from_slice(&data, 2, 3).unwrap();

        assert_eq!(view.num_anchors(), 3);
        assert_eq!(view.num_classes(), 2);
        // Anchor 1: column 1 of each row
        assert_eq!(view.box_attributes(1), Some([1.0, 4.0, 7.0, 10.0]));
        assert_eq!(
            view.class_scores(1).unwrap().to_vec(),
            vec![13.0, 16.0],
            "Scores are rows 4.. of the anchor's column"
        );
    }

    #[test]
    fn test_out_of_bounds_access_is_none() {
        let data = sample(2, 3);
        let view = TensorView::from_slice(&data, 2, 3).unwrap();
        assert_eq!(view.box_attributes(3), None);
        assert!(view.class_scores(3).is_none());
        assert_eq!(view.get(6, 0), None);
        assert_eq!(view.get(5, 2), Some(17.0));
    }

    /// Leading batch dimension of 1 is accepted
    #[test]
    fn test_accepts_batched_shape() {
        let tensor = Array::from_shape_vec(IxDyn(&[1, 6, 3]), sample(2, 3)).unwrap();
        let view = TensorView::new(tensor.view(), 2, Some(3)).unwrap();
        assert_eq!(view.get(4, 2), Some(14.0));
    }

    #[test]
    fn test_rejects_wrong_shapes() {
        let tensor = Array::from_shape_vec(IxDyn(&[1, 6, 3]), sample(2, 3)).unwrap();
        assert!(
            TensorView::new(tensor.view(), 3, None).is_err(),
            "Attribute count must match classes + 4"
        );
        assert!(
            TensorView::new(tensor.view(), 2, Some(4)).is_err(),
            "Anchor count must match configuration"
        );

        let batched = Array::from_shape_vec(IxDyn(&[2, 6, 3]), sample(2, 6)).unwrap();
        assert!(TensorView::new(batched.view(), 2, None).is_err());

        let data = sample(2, 3);
        assert!(TensorView::from_slice(&data[1..], 2, 3).is_err());
    }
}
