//! Factorization machine: first-order feature weights plus pairwise
//! interactions of field embeddings.

use crate::network::{add_column, row_sums, Network};
use bookrec_data::Batch;
use bookrec_layers::{FactorizationMachine, FeaturesEmbedding, FeaturesLinear, Layer, LayerResult, Tensor};
use rand::rngs::StdRng;

#[derive(Debug, Clone)]
pub struct FmModel {
    linear: FeaturesLinear,
    embedding: FeaturesEmbedding,
    fm: FactorizationMachine,
    output_dim: usize,
}

impl FmModel {
    /// With `output_dim > 1` the interaction term is shared by every class score.
    pub fn new(
        field_dims: &[usize],
        embed_dim: usize,
        output_dim: usize,
        rng: &mut StdRng,
    ) -> LayerResult<Self> {
        Ok(Self {
            linear: FeaturesLinear::new(field_dims, output_dim, rng)?,
            embedding: FeaturesEmbedding::new(field_dims, embed_dim, rng)?,
            fm: FactorizationMachine::new(field_dims.len(), embed_dim),
            output_dim,
        })
    }
}

impl Network for FmModel {
    fn name(&self) -> &str {
        "FM"
    }

    fn output_dim(&self) -> usize {
        self.output_dim
    }

    fn forward(&self, batch: &Batch) -> LayerResult<Tensor> {
        let linear = self.linear.forward(&batch.fields)?;
        let pairs = self.fm.forward(&self.embedding.forward(&batch.fields)?)?;
        Ok(add_column(&linear, &pairs))
    }

    fn forward_train(&mut self, batch: &Batch) -> LayerResult<Tensor> {
        let linear = self.linear.forward_train(&batch.fields)?;
        let embedded = self.embedding.forward_train(&batch.fields)?;
        let pairs = self.fm.forward_train(&embedded)?;
        Ok(add_column(&linear, &pairs))
    }

    fn backward(&mut self, grad: &Tensor) -> LayerResult<()> {
        self.linear.backward(grad)?;
        let embed_grad = self.fm.backward(&row_sums(grad))?;
        self.embedding.backward(&embed_grad)
    }

    fn parameters(&self) -> Vec<&Tensor> {
        let mut params = self.linear.parameters();
        params.extend(self.embedding.parameters());
        params
    }

    fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        let mut params = self.linear.parameters_mut();
        params.extend(self.embedding.parameters_mut());
        params
    }

    fn params_and_grads(&mut self) -> Vec<(&mut Tensor, &Tensor)> {
        let mut pairs = self.linear.params_and_grads();
        pairs.extend(self.embedding.params_and_grads());
        pairs
    }

    fn set_training(&mut self, _training: bool) {}
}
