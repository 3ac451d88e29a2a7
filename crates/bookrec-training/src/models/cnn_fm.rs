//! Image-augmented factorization machine. The precomputed image vector
//! of the book is projected to the embedding width and interacts with the
//! user and item embeddings.

use crate::network::{dense_input, leading_fields, Network};
use bookrec_data::Batch;
use bookrec_layers::activation::ReLU;
use bookrec_layers::{
    Dense, DenseFactorizationMachine, FeaturesEmbedding, Layer, LayerError, LayerResult, Tensor,
};
use rand::rngs::StdRng;

#[derive(Debug, Clone)]
pub struct CnnFmModel {
    embedding: FeaturesEmbedding,
    image: Dense,
    relu: ReLU,
    fm: DenseFactorizationMachine,
}

impl CnnFmModel {
    /// `field_dims` must start with the user and item cardinalities.
    pub fn new(
        field_dims: &[usize],
        image_dim: usize,
        embed_dim: usize,
        latent_dim: usize,
        rng: &mut StdRng,
    ) -> LayerResult<Self> {
        if field_dims.len() < 2 || image_dim == 0 {
            return Err(LayerError::ConfigError {
                message: format!(
                    "CNN_FM needs user/item fields and image vectors, got {} fields and width {image_dim}",
                    field_dims.len()
                ),
            });
        }
        Ok(Self {
            embedding: FeaturesEmbedding::new(&field_dims[..2], embed_dim, rng)?,
            image: Dense::new(image_dim, embed_dim, rng),
            relu: ReLU::new(),
            fm: DenseFactorizationMachine::new(3 * embed_dim, latent_dim, rng),
        })
    }
}

impl Network for CnnFmModel {
    fn name(&self) -> &str {
        "CNN_FM"
    }

    fn output_dim(&self) -> usize {
        1
    }

    fn forward(&self, batch: &Batch) -> LayerResult<Tensor> {
        let ids = self.embedding.forward(&leading_fields(batch, 2))?;
        let image = self.relu.forward(&self.image.forward(&dense_input(batch)?)?)?;
        self.fm.forward(&Tensor::concat_cols(&[&ids, &image]))
    }

    fn forward_train(&mut self, batch: &Batch) -> LayerResult<Tensor> {
        let ids = self.embedding.forward_train(&leading_fields(batch, 2))?;
        let projected = self.image.forward_train(&dense_input(batch)?)?;
        let image = self.relu.forward_train(&projected)?;
        self.fm.forward_train(&Tensor::concat_cols(&[&ids, &image]))
    }

    fn backward(&mut self, grad: &Tensor) -> LayerResult<()> {
        let g = self.fm.backward(grad)?;
        let d = self.embedding.embed_dim();
        let parts = g.split_cols(&[2 * d, d]);
        self.embedding.backward(&parts[0])?;
        let g_image = self.relu.backward(&parts[1])?;
        self.image.backward(&g_image)?;
        Ok(())
    }

    fn parameters(&self) -> Vec<&Tensor> {
        let mut params = self.embedding.parameters();
        params.extend(self.image.parameters());
        params.extend(self.fm.parameters());
        params
    }

    fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        let mut params = self.embedding.parameters_mut();
        params.extend(self.image.parameters_mut());
        params.extend(self.fm.parameters_mut());
        params
    }

    fn params_and_grads(&mut self) -> Vec<(&mut Tensor, &Tensor)> {
        let mut pairs = self.embedding.params_and_grads();
        pairs.extend(self.image.params_and_grads());
        pairs.extend(self.fm.params_and_grads());
        pairs
    }

    fn set_training(&mut self, _training: bool) {}
}
