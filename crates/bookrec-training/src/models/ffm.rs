//! Field-aware factorization machine.

use crate::network::Network;
use bookrec_data::Batch;
use bookrec_layers::{FeaturesLinear, FieldAwareInteraction, LayerResult, Tensor};
use rand::rngs::StdRng;

#[derive(Debug, Clone)]
pub struct FfmModel {
    linear: FeaturesLinear,
    ffm: FieldAwareInteraction,
}

impl FfmModel {
    pub fn new(field_dims: &[usize], embed_dim: usize, rng: &mut StdRng) -> LayerResult<Self> {
        Ok(Self {
            linear: FeaturesLinear::new(field_dims, 1, rng)?,
            ffm: FieldAwareInteraction::new(field_dims, embed_dim, rng)?,
        })
    }
}

impl Network for FfmModel {
    fn name(&self) -> &str {
        "FFM"
    }

    fn output_dim(&self) -> usize {
        1
    }

    fn forward(&self, batch: &Batch) -> LayerResult<Tensor> {
        Ok(self
            .linear
            .forward(&batch.fields)?
            .add(&self.ffm.forward(&batch.fields)?))
    }

    fn forward_train(&mut self, batch: &Batch) -> LayerResult<Tensor> {
        let linear = self.linear.forward_train(&batch.fields)?;
        Ok(linear.add(&self.ffm.forward_train(&batch.fields)?))
    }

    fn backward(&mut self, grad: &Tensor) -> LayerResult<()> {
        self.linear.backward(grad)?;
        self.ffm.backward(grad)
    }

    fn parameters(&self) -> Vec<&Tensor> {
        let mut params = self.linear.parameters();
        params.extend(self.ffm.parameters());
        params
    }

    fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        let mut params = self.linear.parameters_mut();
        params.extend(self.ffm.parameters_mut());
        params
    }

    fn params_and_grads(&mut self) -> Vec<(&mut Tensor, &Tensor)> {
        let mut pairs = self.linear.params_and_grads();
        pairs.extend(self.ffm.params_and_grads());
        pairs
    }

    fn set_training(&mut self, _training: bool) {}
}
