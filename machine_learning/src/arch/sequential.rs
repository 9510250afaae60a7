use std::{cell::RefCell, rc::Rc};

use ndarray::{Array2, ArrayView2};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{activations::ActFn, layers::Layer, loss::LossFn};
use crate::{
    MlErr, Result,
    initialization::{ParamGen, RandParamGen},
};

/// A sequential model: information flows forward when computing an output and backward when
/// computing the *deltas* of its layers.
///
/// The model owns a single flat buffer with the parameters of every layer, in layer order.
#[derive(Debug, Clone)]
pub struct Sequential {
    layers: Vec<Layer>,
    params: Vec<f32>,
}

/// The shape of a single layer inside a `ModelSnapshot`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayerShape {
    pub inputs: usize,
    pub outputs: usize,
    pub act_fn: Option<ActFn>,
}

/// The serializable state of a `Sequential`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSnapshot {
    pub layers: Vec<LayerShape>,
    pub params: Vec<f32>,
}

impl Sequential {
    /// Creates a new `Sequential`.
    ///
    /// # Arguments
    /// * `layers` - The layers the sequential is composed of.
    /// * `params` - The parameters of every layer, in layer order.
    ///
    /// # Returns
    /// A new `Sequential` instance or an error if the layers don't chain or the amount of
    /// parameters doesn't match.
    pub fn new<I>(layers: I, params: Vec<f32>) -> Result<Self>
    where
        I: IntoIterator<Item = Layer>,
    {
        let layers: Vec<Layer> = layers.into_iter().collect();

        if layers.is_empty() {
            return Err(MlErr::SizeMismatch {
                what: "layers",
                got: 0,
                expected: 1,
            });
        }

        for pair in layers.windows(2) {
            let (outputs, inputs) = (pair[0].dim().1, pair[1].dim().0);
            if outputs != inputs {
                return Err(MlErr::DimensionMismatch {
                    what: "chained layer inputs",
                    got: inputs,
                    expected: outputs,
                });
            }
        }

        let size = layers.iter().map(Layer::size).sum();
        if params.len() != size {
            return Err(MlErr::SizeMismatch {
                what: "parameters",
                got: params.len(),
                expected: size,
            });
        }

        Ok(Self { layers, params })
    }

    /// Creates a fully connected network with a sigmoid activation on every layer, the
    /// weights initialized with Xavier uniform initialization and the biases at zero.
    ///
    /// # Arguments
    /// * `widths` - The width of every layer including the input, e.g. `[inputs, hidden, outputs]`.
    /// * `rng` - A random number generator.
    pub fn sigmoid_perceptron<R: Rng>(widths: &[usize], rng: R) -> Result<Self> {
        if widths.len() < 2 || widths.contains(&0) {
            return Err(MlErr::SizeMismatch {
                what: "layer widths",
                got: widths.len(),
                expected: 2,
            });
        }

        let rng = Rc::new(RefCell::new(rng));
        let mut layers = Vec::with_capacity(widths.len().saturating_sub(1));
        let mut params = Vec::new();

        for pair in widths.windows(2) {
            let (fan_in, fan_out) = (pair[0], pair[1]);
            let weights = fan_in * fan_out;

            let mut param_gen =
                RandParamGen::xavier_uniform(Rc::clone(&rng), weights, fan_in, fan_out)
                    .map_err(|e| MlErr::Initialization(e.to_string()))?;

            let sampled = param_gen.sample(weights).ok_or_else(|| {
                MlErr::Initialization(format!("generator ran out before {weights} weights"))
            })?;
            params.extend(sampled);
            params.extend(std::iter::repeat_n(0., fan_out));
            layers.push(Layer::dense((fan_in, fan_out), Some(ActFn::sigmoid(1.))));
        }

        Self::new(layers, params)
    }

    /// Returns the amount of parameters in the model.
    pub fn size(&self) -> usize {
        self.params.len()
    }

    pub fn input_width(&self) -> usize {
        self.layers.first().map_or(0, |l| l.dim().0)
    }

    pub fn output_width(&self) -> usize {
        self.layers.last().map_or(0, |l| l.dim().1)
    }

    /// Returns whether every parameter is a finite number.
    pub fn is_finite(&self) -> bool {
        self.params.iter().all(|p| p.is_finite())
    }

    pub fn params(&self) -> &[f32] {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut [f32] {
        &mut self.params
    }

    /// Makes a forward pass through the network.
    ///
    /// # Arguments
    /// * `x` - The input data, one sample per row.
    ///
    /// # Returns
    /// The prediction for the given input or an error if occurred.
    pub fn forward(&mut self, x: ArrayView2<f32>) -> Result<Array2<f32>> {
        let Self { layers, params } = self;
        let mut offset = 0;
        let mut a = x.to_owned();

        for layer in layers.iter_mut() {
            let size = layer.size();
            a = layer.forward(&params[offset..offset + size], a.view())?;
            offset += size;
        }

        Ok(a)
    }

    /// Computes the gradient of the loss function with respect to the parameters of the model
    /// over a single batch. The parameters are left untouched.
    ///
    /// # Arguments
    /// * `x` - The input data, one sample per row.
    /// * `y` - The expected output, one sample per row.
    /// * `loss_fn` - The loss function.
    /// * `grad` - Where the gradient is written, must have the model's size.
    ///
    /// # Returns
    /// The loss of the batch before any update.
    pub fn backprop<L: LossFn>(
        &mut self,
        x: ArrayView2<f32>,
        y: ArrayView2<f32>,
        loss_fn: &L,
        grad: &mut [f32],
    ) -> Result<f32> {
        if grad.len() != self.params.len() {
            return Err(MlErr::SizeMismatch {
                what: "gradient",
                got: grad.len(),
                expected: self.params.len(),
            });
        }

        let y_pred = self.forward(x)?;
        if y_pred.dim() != y.dim() {
            return Err(MlErr::DimensionMismatch {
                what: "expected output",
                got: y.ncols(),
                expected: y_pred.ncols(),
            });
        }

        let loss = loss_fn.loss(y_pred.view(), y);
        let mut d = loss_fn.loss_prime(y_pred.view(), y);

        let Self { layers, params } = self;
        let mut end = params.len();

        for layer in layers.iter().rev() {
            let start = end - layer.size();
            d = layer.backward(&params[start..end], &mut grad[start..end], d)?;
            end = start;
        }

        Ok(loss)
    }

    /// Returns the serializable state of this model.
    pub fn snapshot(&self) -> ModelSnapshot {
        let layers = self
            .layers
            .iter()
            .map(|layer| {
                let (inputs, outputs) = layer.dim();
                LayerShape {
                    inputs,
                    outputs,
                    act_fn: layer.act_fn(),
                }
            })
            .collect();

        ModelSnapshot {
            layers,
            params: self.params.clone(),
        }
    }

    /// Rebuilds a model from its snapshot.
    pub fn from_snapshot(snapshot: ModelSnapshot) -> Result<Self> {
        let layers = snapshot
            .layers
            .iter()
            .map(|shape| Layer::dense((shape.inputs, shape.outputs), shape.act_fn));

        Self::new(layers, snapshot.params)
    }

    /// Serializes this model into an opaque blob.
    pub fn to_blob(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.snapshot())?)
    }

    /// Deserializes a model from a blob made by `to_blob`.
    pub fn from_blob(blob: &str) -> Result<Self> {
        let snapshot: ModelSnapshot = serde_json::from_str(blob)?;
        Self::from_snapshot(snapshot)
    }
}
