//! DeepCoNN: review-text vectors of the user and the book, each mapped
//! through a dense ReLU layer, joined with the user and item embeddings
//! in a factorization machine.

use crate::network::{dense_input, leading_fields, Network};
use bookrec_data::Batch;
use bookrec_layers::activation::ReLU;
use bookrec_layers::{
    Dense, DenseFactorizationMachine, FeaturesEmbedding, Layer, LayerError, LayerResult, Tensor,
};
use rand::rngs::StdRng;

#[derive(Debug, Clone)]
struct TextTower {
    dense: Dense,
    relu: ReLU,
}

impl TextTower {
    fn new(input_dim: usize, out_dim: usize, rng: &mut StdRng) -> Self {
        Self {
            dense: Dense::new(input_dim, out_dim, rng),
            relu: ReLU::new(),
        }
    }

    fn forward(&self, x: &Tensor) -> LayerResult<Tensor> {
        self.relu.forward(&self.dense.forward(x)?)
    }

    fn forward_train(&mut self, x: &Tensor) -> LayerResult<Tensor> {
        let h = self.dense.forward_train(x)?;
        self.relu.forward_train(&h)
    }

    fn backward(&mut self, grad: &Tensor) -> LayerResult<()> {
        let g = self.relu.backward(grad)?;
        self.dense.backward(&g)?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct DeepConnModel {
    embedding: FeaturesEmbedding,
    user_text: TextTower,
    item_text: TextTower,
    text_dims: [usize; 2],
    out_dim: usize,
    fm: DenseFactorizationMachine,
}

impl DeepConnModel {
    /// Dense rows are the user text vector followed by the book text vector.
    pub fn new(
        field_dims: &[usize],
        user_text_dim: usize,
        item_text_dim: usize,
        embed_dim: usize,
        out_dim: usize,
        latent_dim: usize,
        rng: &mut StdRng,
    ) -> LayerResult<Self> {
        if field_dims.len() < 2 || user_text_dim == 0 || item_text_dim == 0 {
            return Err(LayerError::ConfigError {
                message: "DeepCoNN needs user/item fields and both text vectors".to_string(),
            });
        }
        Ok(Self {
            embedding: FeaturesEmbedding::new(&field_dims[..2], embed_dim, rng)?,
            user_text: TextTower::new(user_text_dim, out_dim, rng),
            item_text: TextTower::new(item_text_dim, out_dim, rng),
            text_dims: [user_text_dim, item_text_dim],
            out_dim,
            fm: DenseFactorizationMachine::new(2 * embed_dim + 2 * out_dim, latent_dim, rng),
        })
    }

    fn texts(&self, batch: &Batch) -> LayerResult<(Tensor, Tensor)> {
        let dense = dense_input(batch)?;
        if dense.cols() != self.text_dims[0] + self.text_dims[1] {
            return Err(LayerError::InvalidInputDimension {
                expected: self.text_dims[0] + self.text_dims[1],
                actual: dense.cols(),
            });
        }
        let parts = dense.split_cols(&self.text_dims);
        Ok((parts[0].clone(), parts[1].clone()))
    }
}

impl Network for DeepConnModel {
    fn name(&self) -> &str {
        "DeepCoNN"
    }

    fn output_dim(&self) -> usize {
        1
    }

    fn forward(&self, batch: &Batch) -> LayerResult<Tensor> {
        let ids = self.embedding.forward(&leading_fields(batch, 2))?;
        let (user, item) = self.texts(batch)?;
        let user = self.user_text.forward(&user)?;
        let item = self.item_text.forward(&item)?;
        self.fm.forward(&Tensor::concat_cols(&[&ids, &user, &item]))
    }

    fn forward_train(&mut self, batch: &Batch) -> LayerResult<Tensor> {
        let ids = self.embedding.forward_train(&leading_fields(batch, 2))?;
        let (user, item) = self.texts(batch)?;
        let user = self.user_text.forward_train(&user)?;
        let item = self.item_text.forward_train(&item)?;
        self.fm.forward_train(&Tensor::concat_cols(&[&ids, &user, &item]))
    }

    fn backward(&mut self, grad: &Tensor) -> LayerResult<()> {
        let g = self.fm.backward(grad)?;
        let d = self.embedding.embed_dim();
        let parts = g.split_cols(&[2 * d, self.out_dim, self.out_dim]);
        self.embedding.backward(&parts[0])?;
        self.user_text.backward(&parts[1])?;
        self.item_text.backward(&parts[2])
    }

    fn parameters(&self) -> Vec<&Tensor> {
        let mut params = self.embedding.parameters();
        params.extend(self.user_text.dense.parameters());
        params.extend(self.item_text.dense.parameters());
        params.extend(self.fm.parameters());
        params
    }

    fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        let mut params = self.embedding.parameters_mut();
        params.extend(self.user_text.dense.parameters_mut());
        params.extend(self.item_text.dense.parameters_mut());
        params.extend(self.fm.parameters_mut());
        params
    }

    fn params_and_grads(&mut self) -> Vec<(&mut Tensor, &Tensor)> {
        let mut pairs = self.embedding.params_and_grads();
        pairs.extend(self.user_text.dense.params_and_grads());
        pairs.extend(self.item_text.dense.params_and_grads());
        pairs.extend(self.fm.params_and_grads());
        pairs
    }

    fn set_training(&mut self, _training: bool) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_deepconn_forward_backward() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut model = DeepConnModel::new(&[2, 2], 3, 5, 4, 6, 2, &mut rng).unwrap();
        let batch = Batch {
            fields: vec![0, 1, 1, 0],
            num_fields: 2,
            dense: (0..16).map(|v| (v % 5) as f32 * 0.1).collect(),
            dense_dim: 8,
            targets: None,
        };
        let out = model.forward_train(&batch).unwrap();
        assert_eq!(out.shape(), &[2, 1]);
        model.backward(&Tensor::ones(&[2, 1])).unwrap();
        assert_eq!(model.parameters().len(), model.params_and_grads().len());
    }

    #[test]
    fn test_deepconn_rejects_wrong_text_width() {
        let mut rng = StdRng::seed_from_u64(9);
        let model = DeepConnModel::new(&[2, 2], 3, 5, 4, 6, 2, &mut rng).unwrap();
        let batch = Batch {
            fields: vec![0, 1],
            num_fields: 2,
            dense: vec![0.0; 7],
            dense_dim: 7,
            targets: None,
        };
        assert!(model.forward(&batch).is_err());
    }
}
