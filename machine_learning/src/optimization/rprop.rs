use super::Optimizer;
use crate::{MlErr, Result};

const ETA_PLUS: f32 = 1.2;
const ETA_MINUS: f32 = 0.5;
const INITIAL_STEP: f32 = 0.1;
const MIN_STEP: f32 = 1e-6;
const MAX_STEP: f32 = 50.;

/// Resilient propagation (iRPROP-).
///
/// Every parameter keeps its own step size, only the sign of the gradient is used. The step
/// grows while the sign of the gradient holds and shrinks when it flips, in which case that
/// parameter is left alone for the current update.
///
/// The per parameter state is sized on the first update.
#[derive(Debug, Clone, Default)]
pub struct Rprop {
    steps: Vec<f32>,
    prev_grad: Vec<f32>,
}

impl Rprop {
    /// Creates a new `Rprop` optimizer.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Optimizer for Rprop {
    fn update_params(&mut self, params: &mut [f32], grad: &[f32]) -> Result<()> {
        if grad.len() != params.len() {
            return Err(MlErr::SizeMismatch {
                what: "gradient",
                got: grad.len(),
                expected: params.len(),
            });
        }

        if self.steps.is_empty() {
            self.steps = vec![INITIAL_STEP; params.len()];
            self.prev_grad = vec![0.; params.len()];
        }

        if self.steps.len() != params.len() {
            return Err(MlErr::SizeMismatch {
                what: "rprop state",
                got: self.steps.len(),
                expected: params.len(),
            });
        }

        params
            .iter_mut()
            .zip(grad)
            .zip(self.steps.iter_mut())
            .zip(self.prev_grad.iter_mut())
            .for_each(|(((p, &g), step), prev)| {
                let change = *prev * g;
                let mut g = g;

                if change > 0. {
                    *step = (*step * ETA_PLUS).min(MAX_STEP);
                } else if change < 0. {
                    *step = (*step * ETA_MINUS).max(MIN_STEP);
                    g = 0.;
                }

                if g != 0. {
                    *p -= g.signum() * *step;
                }

                *prev = g;
            });

        Ok(())
    }
}
