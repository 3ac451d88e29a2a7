//! Embedding tables over encoded field vectors.
//!
//! A field vector holds one integer per field; field `i` takes values in
//! `[0, field_dims[i])`. All fields share one table and a field's rows start
//! at the prefix sum of the preceding cardinalities.

use crate::error::{LayerError, LayerResult};
use crate::initializer::Initializer;
use crate::tensor::Tensor;
use rand::rngs::StdRng;

/// Row offsets of each field inside a shared table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldOffsets {
    field_dims: Vec<usize>,
    offsets: Vec<usize>,
    total: usize,
}

impl FieldOffsets {
    pub fn new(field_dims: &[usize]) -> LayerResult<Self> {
        if field_dims.is_empty() || field_dims.iter().any(|&d| d == 0) {
            return Err(LayerError::ConfigError {
                message: format!("field_dims must be non-empty and positive, got {field_dims:?}"),
            });
        }
        let mut offsets = Vec::with_capacity(field_dims.len());
        let mut total = 0;
        for &d in field_dims {
            offsets.push(total);
            total += d;
        }
        Ok(Self {
            field_dims: field_dims.to_vec(),
            offsets,
            total,
        })
    }

    pub fn num_fields(&self) -> usize {
        self.field_dims.len()
    }

    /// Total number of rows across all fields.
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn field_dims(&self) -> &[usize] {
        &self.field_dims
    }

    /// Maps a flat `[rows * num_fields]` id buffer to table rows, checking
    /// every id against its field's cardinality.
    pub fn rows(&self, ids: &[u32]) -> LayerResult<Vec<usize>> {
        let nf = self.num_fields();
        if ids.len() % nf != 0 {
            return Err(LayerError::InvalidInputDimension {
                expected: nf,
                actual: ids.len() % nf,
            });
        }
        ids.iter()
            .enumerate()
            .map(|(i, &id)| {
                let field = i % nf;
                let cardinality = self.field_dims[field];
                if (id as usize) < cardinality {
                    Ok(self.offsets[field] + id as usize)
                } else {
                    Err(LayerError::IndexOutOfRange {
                        field,
                        index: id,
                        cardinality,
                    })
                }
            })
            .collect()
    }
}

/// Per-field dense embeddings: `[rows, num_fields]` ids to
/// `[rows, num_fields * embed_dim]` vectors.
#[derive(Debug, Clone)]
pub struct FeaturesEmbedding {
    offsets: FieldOffsets,
    embed_dim: usize,
    weight: Tensor,
    weight_grad: Tensor,
    cached_rows: Option<Vec<usize>>,
}

impl FeaturesEmbedding {
    pub fn new(field_dims: &[usize], embed_dim: usize, rng: &mut StdRng) -> LayerResult<Self> {
        if embed_dim == 0 {
            return Err(LayerError::ConfigError {
                message: "embed_dim must be positive".to_string(),
            });
        }
        let offsets = FieldOffsets::new(field_dims)?;
        let shape = [offsets.total(), embed_dim];
        Ok(Self {
            weight: Initializer::GlorotUniform.initialize(&shape, rng),
            weight_grad: Tensor::zeros(&shape),
            offsets,
            embed_dim,
            cached_rows: None,
        })
    }

    pub fn embed_dim(&self) -> usize {
        self.embed_dim
    }

    pub fn num_fields(&self) -> usize {
        self.offsets.num_fields()
    }

    /// Width of one output row.
    pub fn output_dim(&self) -> usize {
        self.num_fields() * self.embed_dim
    }

    pub fn forward(&self, ids: &[u32]) -> LayerResult<Tensor> {
        let rows = self.offsets.rows(ids)?;
        Ok(self.gather(&rows))
    }

    pub fn forward_train(&mut self, ids: &[u32]) -> LayerResult<Tensor> {
        let rows = self.offsets.rows(ids)?;
        let out = self.gather(&rows);
        self.cached_rows = Some(rows);
        Ok(out)
    }

    /// Scatters `grad` (shaped like the forward output) into the table gradient.
    pub fn backward(&mut self, grad: &Tensor) -> LayerResult<()> {
        let rows = self.cached_rows.as_ref().ok_or(LayerError::NotInitialized)?;
        let d = self.embed_dim;
        if grad.numel() != rows.len() * d {
            return Err(LayerError::ShapeMismatch {
                expected: vec![rows.len() / self.num_fields(), self.output_dim()],
                actual: grad.shape().to_vec(),
            });
        }
        self.weight_grad.fill_zero();
        self.weight_grad.scatter_add_rows(rows, grad.data());
        Ok(())
    }

    pub fn parameters(&self) -> Vec<&Tensor> {
        vec![&self.weight]
    }

    pub fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        vec![&mut self.weight]
    }

    pub fn params_and_grads(&mut self) -> Vec<(&mut Tensor, &Tensor)> {
        vec![(&mut self.weight, &self.weight_grad)]
    }

    fn gather(&self, rows: &[usize]) -> Tensor {
        self.weight.gather_rows(rows, self.num_fields())
    }
}

/// First-order term: the sum of one learned weight vector per active
/// feature plus a bias, giving `[rows, output_dim]`.
#[derive(Debug, Clone)]
pub struct FeaturesLinear {
    offsets: FieldOffsets,
    output_dim: usize,
    weight: Tensor,
    bias: Tensor,
    weight_grad: Tensor,
    bias_grad: Tensor,
    cached_rows: Option<Vec<usize>>,
}

impl FeaturesLinear {
    pub fn new(field_dims: &[usize], output_dim: usize, rng: &mut StdRng) -> LayerResult<Self> {
        let offsets = FieldOffsets::new(field_dims)?;
        let shape = [offsets.total(), output_dim];
        Ok(Self {
            weight: Initializer::Normal(0.01).initialize(&shape, rng),
            bias: Tensor::zeros(&[output_dim]),
            weight_grad: Tensor::zeros(&shape),
            bias_grad: Tensor::zeros(&[output_dim]),
            offsets,
            output_dim,
            cached_rows: None,
        })
    }

    pub fn forward(&self, ids: &[u32]) -> LayerResult<Tensor> {
        let rows = self.offsets.rows(ids)?;
        Ok(self.sum_rows(&rows))
    }

    pub fn forward_train(&mut self, ids: &[u32]) -> LayerResult<Tensor> {
        let rows = self.offsets.rows(ids)?;
        let out = self.sum_rows(&rows);
        self.cached_rows = Some(rows);
        Ok(out)
    }

    pub fn backward(&mut self, grad: &Tensor) -> LayerResult<()> {
        let rows = self.cached_rows.as_ref().ok_or(LayerError::NotInitialized)?;
        let nf = self.offsets.num_fields();
        let o = self.output_dim;
        let batch = rows.len() / nf;
        if grad.shape() != [batch, o] {
            return Err(LayerError::ShapeMismatch {
                expected: vec![batch, o],
                actual: grad.shape().to_vec(),
            });
        }
        self.weight_grad.fill_zero();
        let g = grad.data();
        let wg = self.weight_grad.data_mut();
        for (slot, &row) in rows.iter().enumerate() {
            let b = slot / nf;
            for k in 0..o {
                wg[row * o + k] += g[b * o + k];
            }
        }
        self.bias_grad = grad.sum_axis(0);
        Ok(())
    }

    pub fn parameters(&self) -> Vec<&Tensor> {
        vec![&self.weight, &self.bias]
    }

    pub fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        vec![&mut self.weight, &mut self.bias]
    }

    pub fn params_and_grads(&mut self) -> Vec<(&mut Tensor, &Tensor)> {
        vec![
            (&mut self.weight, &self.weight_grad),
            (&mut self.bias, &self.bias_grad),
        ]
    }

    fn sum_rows(&self, rows: &[usize]) -> Tensor {
        let nf = self.offsets.num_fields();
        let o = self.output_dim;
        let batch = rows.len() / nf;
        let w = self.weight.data();
        let mut data = vec![0.0; batch * o];
        for (slot, &row) in rows.iter().enumerate() {
            let b = slot / nf;
            for k in 0..o {
                data[b * o + k] += w[row * o + k];
            }
        }
        Tensor::from_data(&[batch, o], data).add(&self.bias)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_offsets_and_bounds() {
        let offsets = FieldOffsets::new(&[3, 2, 4]).unwrap();
        assert_eq!(offsets.total(), 9);
        assert_eq!(offsets.rows(&[2, 1, 3]).unwrap(), vec![2, 4, 8]);
        let err = offsets.rows(&[0, 2, 0]).unwrap_err();
        assert!(matches!(
            err,
            LayerError::IndexOutOfRange {
                field: 1,
                index: 2,
                cardinality: 2
            }
        ));
        assert!(offsets.rows(&[0, 1]).is_err());
        assert!(FieldOffsets::new(&[3, 0]).is_err());
    }

    #[test]
    fn test_embedding_gather_and_scatter() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut emb = FeaturesEmbedding::new(&[2, 3], 2, &mut rng).unwrap();
        let ids = [1, 0, 1, 2];
        let out = emb.forward_train(&ids).unwrap();
        assert_eq!(out.shape(), &[2, 4]);
        let w = emb.parameters()[0].clone();
        assert_eq!(&out.data()[0..2], &w.data()[2..4]);
        assert_eq!(&out.data()[2..4], &w.data()[4..6]);

        emb.backward(&Tensor::ones(&[2, 4])).unwrap();
        let pairs = emb.params_and_grads();
        let grad = pairs[0].1.data();
        // row 1 (field 0, id 1) used twice
        assert_eq!(&grad[2..4], &[2.0, 2.0]);
        assert_eq!(&grad[0..2], &[0.0, 0.0]);
    }

    #[test]
    fn test_linear_sums_fields() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut lin = FeaturesLinear::new(&[2, 2], 1, &mut rng).unwrap();
        lin.weight = Tensor::from_data(&[4, 1], vec![1.0, 2.0, 10.0, 20.0]);
        let out = lin.forward_train(&[1, 0, 0, 1]).unwrap();
        assert_eq!(out.data(), &[12.0, 21.0]);
        lin.backward(&Tensor::ones(&[2, 1])).unwrap();
        assert_eq!(lin.weight_grad.data(), &[1.0, 1.0, 1.0, 1.0]);
        assert_eq!(lin.bias_grad.data(), &[2.0]);
    }
}
