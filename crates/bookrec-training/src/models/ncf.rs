//! Neural collaborative filtering: a generalized matrix factorization
//! branch over the user and item embeddings beside an MLP over every
//! field embedding, joined by a linear head.

use crate::network::Network;
use bookrec_data::Batch;
use bookrec_layers::{Dense, FeaturesEmbedding, Layer, LayerError, LayerResult, MLP, Tensor};
use rand::rngs::StdRng;

#[derive(Debug, Clone)]
pub struct NcfModel {
    embedding: FeaturesEmbedding,
    mlp: MLP,
    fc: Dense,
    /// User and item embeddings of the last training pass.
    cached_pair: Option<(Tensor, Tensor)>,
}

impl NcfModel {
    pub fn new(
        field_dims: &[usize],
        embed_dim: usize,
        mlp_dims: &[usize],
        dropout: f32,
        output_dim: usize,
        rng: &mut StdRng,
    ) -> LayerResult<Self> {
        if field_dims.len() < 2 {
            return Err(LayerError::ConfigError {
                message: "NCF needs user and item fields".to_string(),
            });
        }
        let embedding = FeaturesEmbedding::new(field_dims, embed_dim, rng)?;
        let mlp = MLP::new(embedding.output_dim(), mlp_dims, dropout, None, rng)?;
        let fc = Dense::new(embed_dim + mlp.output_dim(), output_dim, rng);
        Ok(Self {
            embedding,
            mlp,
            fc,
            cached_pair: None,
        })
    }

    /// User and item columns of a `[rows, nf * d]` embedding.
    fn user_item(&self, embedded: &Tensor) -> (Tensor, Tensor) {
        let d = self.embedding.embed_dim();
        let parts = embedded.split_cols(&[d, d, embedded.cols() - 2 * d]);
        (parts[0].clone(), parts[1].clone())
    }
}

impl Network for NcfModel {
    fn name(&self) -> &str {
        "NCF"
    }

    fn output_dim(&self) -> usize {
        self.fc.out_features()
    }

    fn forward(&self, batch: &Batch) -> LayerResult<Tensor> {
        let embedded = self.embedding.forward(&batch.fields)?;
        let (user, item) = self.user_item(&embedded);
        let gmf = user.mul(&item);
        let deep = self.mlp.forward(&embedded)?;
        self.fc.forward(&Tensor::concat_cols(&[&gmf, &deep]))
    }

    fn forward_train(&mut self, batch: &Batch) -> LayerResult<Tensor> {
        let embedded = self.embedding.forward_train(&batch.fields)?;
        let (user, item) = self.user_item(&embedded);
        let gmf = user.mul(&item);
        let deep = self.mlp.forward_train(&embedded)?;
        self.cached_pair = Some((user, item));
        self.fc.forward_train(&Tensor::concat_cols(&[&gmf, &deep]))
    }

    fn backward(&mut self, grad: &Tensor) -> LayerResult<()> {
        let (user, item) = self.cached_pair.take().ok_or(LayerError::NotInitialized)?;
        let d = self.embedding.embed_dim();
        let head = self.fc.backward(grad)?;
        let parts = head.split_cols(&[d, head.cols() - d]);
        let (gmf_grad, deep_grad) = (&parts[0], &parts[1]);

        let mut embed_grad = self.mlp.backward(deep_grad)?;
        let user_grad = gmf_grad.mul(&item);
        let item_grad = gmf_grad.mul(&user);
        let width = embed_grad.cols();
        let g = embed_grad.data_mut();
        for b in 0..user.rows() {
            for k in 0..d {
                g[b * width + k] += user_grad.data()[b * d + k];
                g[b * width + d + k] += item_grad.data()[b * d + k];
            }
        }
        self.embedding.backward(&embed_grad)
    }

    fn parameters(&self) -> Vec<&Tensor> {
        let mut params = self.embedding.parameters();
        params.extend(self.mlp.parameters());
        params.extend(self.fc.parameters());
        params
    }

    fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        let mut params = self.embedding.parameters_mut();
        params.extend(self.mlp.parameters_mut());
        params.extend(self.fc.parameters_mut());
        params
    }

    fn params_and_grads(&mut self) -> Vec<(&mut Tensor, &Tensor)> {
        let mut pairs = self.embedding.params_and_grads();
        pairs.extend(self.mlp.params_and_grads());
        pairs.extend(self.fc.params_and_grads());
        pairs
    }

    fn set_training(&mut self, training: bool) {
        self.mlp.set_training(training);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn batch(num_fields: usize) -> Batch {
        Batch {
            fields: (0..2 * num_fields as u32).map(|i| i % 2).collect(),
            num_fields,
            dense: Vec::new(),
            dense_dim: 0,
            targets: None,
        }
    }

    #[test]
    fn test_ncf_with_context() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut model = NcfModel::new(&[2, 2, 2], 4, &[8, 8], 0.2, 1, &mut rng).unwrap();
        let out = model.forward_train(&batch(3)).unwrap();
        assert_eq!(out.shape(), &[2, 1]);
        model.backward(&Tensor::ones(&[2, 1])).unwrap();
        assert!(model.backward(&Tensor::ones(&[2, 1])).is_err());
    }

    #[test]
    fn test_ncf_user_item_only_classifier() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut model = NcfModel::new(&[2, 2], 4, &[8], 0.0, 3, &mut rng).unwrap();
        model.set_training(false);
        let out = model.forward(&batch(2)).unwrap();
        assert_eq!(out.shape(), &[2, 3]);
        assert_eq!(model.output_dim(), 3);
    }
}
