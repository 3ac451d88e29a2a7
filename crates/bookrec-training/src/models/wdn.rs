//! Wide and deep: features linear (wide) plus an MLP over the field
//! embeddings (deep).

use crate::network::Network;
use bookrec_data::Batch;
use bookrec_layers::{FeaturesEmbedding, FeaturesLinear, Layer, LayerResult, MLP, Tensor};
use rand::rngs::StdRng;

#[derive(Debug, Clone)]
pub struct WdnModel {
    linear: FeaturesLinear,
    embedding: FeaturesEmbedding,
    mlp: MLP,
    output_dim: usize,
}

impl WdnModel {
    pub fn new(
        field_dims: &[usize],
        embed_dim: usize,
        mlp_dims: &[usize],
        dropout: f32,
        output_dim: usize,
        rng: &mut StdRng,
    ) -> LayerResult<Self> {
        let linear = FeaturesLinear::new(field_dims, output_dim, rng)?;
        let embedding = FeaturesEmbedding::new(field_dims, embed_dim, rng)?;
        let mlp = MLP::new(embedding.output_dim(), mlp_dims, dropout, Some(output_dim), rng)?;
        Ok(Self {
            linear,
            embedding,
            mlp,
            output_dim,
        })
    }
}

impl Network for WdnModel {
    fn name(&self) -> &str {
        "WDN"
    }

    fn output_dim(&self) -> usize {
        self.output_dim
    }

    fn forward(&self, batch: &Batch) -> LayerResult<Tensor> {
        let wide = self.linear.forward(&batch.fields)?;
        let deep = self.mlp.forward(&self.embedding.forward(&batch.fields)?)?;
        Ok(wide.add(&deep))
    }

    fn forward_train(&mut self, batch: &Batch) -> LayerResult<Tensor> {
        let wide = self.linear.forward_train(&batch.fields)?;
        let embedded = self.embedding.forward_train(&batch.fields)?;
        Ok(wide.add(&self.mlp.forward_train(&embedded)?))
    }

    fn backward(&mut self, grad: &Tensor) -> LayerResult<()> {
        self.linear.backward(grad)?;
        let embed_grad = self.mlp.backward(grad)?;
        self.embedding.backward(&embed_grad)
    }

    fn parameters(&self) -> Vec<&Tensor> {
        let mut params = self.linear.parameters();
        params.extend(self.embedding.parameters());
        params.extend(self.mlp.parameters());
        params
    }

    fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        let mut params = self.linear.parameters_mut();
        params.extend(self.embedding.parameters_mut());
        params.extend(self.mlp.parameters_mut());
        params
    }

    fn params_and_grads(&mut self) -> Vec<(&mut Tensor, &Tensor)> {
        let mut pairs = self.linear.params_and_grads();
        pairs.extend(self.embedding.params_and_grads());
        pairs.extend(self.mlp.params_and_grads());
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
    fn test_wdn_forward_backward() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut model = WdnModel::new(&[3, 3], 4, &[8, 8], 0.2, 1, &mut rng).unwrap();
        let batch = Batch {
            fields: vec![0, 2, 1, 1, 2, 0, 0, 0],
            num_fields: 2,
            dense: Vec::new(),
            dense_dim: 0,
            targets: None,
        };
        let out = model.forward_train(&batch).unwrap();
        assert_eq!(out.shape(), &[4, 1]);
        model.backward(&Tensor::ones(&[4, 1])).unwrap();
        // linear 2 + embedding 1 + three dense layers of 2
        assert_eq!(model.params_and_grads().len(), 9);
    }
}
