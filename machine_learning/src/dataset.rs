use ndarray::{Array2, ArrayView2};

use crate::{MlErr, Result, encoding::EncodedSample};

/// An ordered batch of encoded samples sharing the same input and output widths.
///
/// The samples are laid out row-wise, one sample per row, so the batch can be forwarded
/// through a model in a single pass.
#[derive(Debug, Clone)]
pub struct TrainingBatch {
    x: Array2<f32>,
    y: Array2<f32>,
}

impl TrainingBatch {
    /// Creates a new `TrainingBatch`.
    ///
    /// # Arguments
    /// * `samples` - The encoded samples, in order.
    ///
    /// # Returns
    /// A new batch or an error if there are no samples or their widths differ.
    pub fn new(samples: &[EncodedSample]) -> Result<Self> {
        let first = samples.first().ok_or(MlErr::EmptyBatch)?;
        let x_size = first.input.len();
        let y_size = first.output.len();

        let mut x = Vec::with_capacity(samples.len() * x_size);
        let mut y = Vec::with_capacity(samples.len() * y_size);

        for sample in samples {
            if sample.input.len() != x_size {
                return Err(MlErr::DimensionMismatch {
                    what: "sample input",
                    got: sample.input.len(),
                    expected: x_size,
                });
            }

            if sample.output.len() != y_size {
                return Err(MlErr::DimensionMismatch {
                    what: "sample output",
                    got: sample.output.len(),
                    expected: y_size,
                });
            }

            x.extend_from_slice(&sample.input);
            y.extend_from_slice(&sample.output);
        }

        let rows = samples.len();
        let shape_err = |_| MlErr::SizeMismatch {
            what: "batch buffer",
            got: rows,
            expected: samples.len(),
        };

        Ok(Self {
            x: Array2::from_shape_vec((rows, x_size), x).map_err(shape_err)?,
            y: Array2::from_shape_vec((rows, y_size), y).map_err(shape_err)?,
        })
    }

    /// Returns the amount of samples in the batch.
    pub fn len(&self) -> usize {
        self.x.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn input_width(&self) -> usize {
        self.x.ncols()
    }

    pub fn output_width(&self) -> usize {
        self.y.ncols()
    }

    /// Returns a view of the inputs and expected outputs, `(x, y)`.
    pub fn views(&self) -> (ArrayView2<'_, f32>, ArrayView2<'_, f32>) {
        (self.x.view(), self.y.view())
    }
}
