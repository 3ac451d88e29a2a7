//! Deep & Cross Network: explicit feature crosses of the field
//! embeddings, then an MLP, then a linear head.

use crate::network::Network;
use bookrec_data::Batch;
use bookrec_layers::{CrossNetwork, Dense, FeaturesEmbedding, Layer, LayerResult, MLP, Tensor};
use rand::rngs::StdRng;

#[derive(Debug, Clone)]
pub struct DcnModel {
    embedding: FeaturesEmbedding,
    cross: CrossNetwork,
    mlp: MLP,
    head: Dense,
}

impl DcnModel {
    pub fn new(
        field_dims: &[usize],
        embed_dim: usize,
        num_layers: usize,
        mlp_dims: &[usize],
        dropout: f32,
        output_dim: usize,
        rng: &mut StdRng,
    ) -> LayerResult<Self> {
        let embedding = FeaturesEmbedding::new(field_dims, embed_dim, rng)?;
        let width = embedding.output_dim();
        let cross = CrossNetwork::new(width, num_layers, rng)?;
        let mlp = MLP::new(width, mlp_dims, dropout, None, rng)?;
        let head = Dense::new(mlp.output_dim(), output_dim, rng);
        Ok(Self {
            embedding,
            cross,
            mlp,
            head,
        })
    }
}

impl Network for DcnModel {
    fn name(&self) -> &str {
        "DCN"
    }

    fn output_dim(&self) -> usize {
        self.head.out_features()
    }

    fn forward(&self, batch: &Batch) -> LayerResult<Tensor> {
        let x = self.embedding.forward(&batch.fields)?;
        let x = self.cross.forward(&x)?;
        self.head.forward(&self.mlp.forward(&x)?)
    }

    fn forward_train(&mut self, batch: &Batch) -> LayerResult<Tensor> {
        let x = self.embedding.forward_train(&batch.fields)?;
        let x = self.cross.forward_train(&x)?;
        let x = self.mlp.forward_train(&x)?;
        self.head.forward_train(&x)
    }

    fn backward(&mut self, grad: &Tensor) -> LayerResult<()> {
        let g = self.head.backward(grad)?;
        let g = self.mlp.backward(&g)?;
        let g = self.cross.backward(&g)?;
        self.embedding.backward(&g)
    }

    fn parameters(&self) -> Vec<&Tensor> {
        let mut params = self.embedding.parameters();
        params.extend(self.cross.parameters());
        params.extend(self.mlp.parameters());
        params.extend(self.head.parameters());
        params
    }

    fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        let mut params = self.embedding.parameters_mut();
        params.extend(self.cross.parameters_mut());
        params.extend(self.mlp.parameters_mut());
        params.extend(self.head.parameters_mut());
        params
    }

    fn params_and_grads(&mut self) -> Vec<(&mut Tensor, &Tensor)> {
        let mut pairs = self.embedding.params_and_grads();
        pairs.extend(self.cross.params_and_grads());
        pairs.extend(self.mlp.params_and_grads());
        pairs.extend(self.head.params_and_grads());
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

    #[test]
    fn test_dcn_forward_backward() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut model = DcnModel::new(&[2, 3, 2], 4, 3, &[8, 8], 0.2, 3, &mut rng).unwrap();
        let batch = Batch {
            fields: vec![0, 2, 1, 1, 0, 0],
            num_fields: 3,
            dense: Vec::new(),
            dense_dim: 0,
            targets: None,
        };
        let out = model.forward_train(&batch).unwrap();
        assert_eq!(out.shape(), &[2, 3]);
        model.backward(&Tensor::ones(&[2, 3])).unwrap();
        assert_eq!(model.parameters().len(), model.params_and_grads().len());
    }
}
