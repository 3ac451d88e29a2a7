//! Field-aware factorization machine interaction.
//!
//! Every field owns a table that embeds features *as seen from* that field.
//! For a field vector `x` the interaction is
//!
//! ```text
//! y = sum_{i<j} <W_j[x_i], W_i[x_j]>
//! ```

use crate::embedding::FieldOffsets;
use crate::error::{LayerError, LayerResult};
use crate::initializer::Initializer;
use crate::tensor::Tensor;
use rand::rngs::StdRng;

#[derive(Debug, Clone)]
pub struct FieldAwareInteraction {
    offsets: FieldOffsets,
    embed_dim: usize,
    /// One `[total_rows, embed_dim]` table per field.
    tables: Vec<Tensor>,
    grads: Vec<Tensor>,
    cached_rows: Option<Vec<usize>>,
}

impl FieldAwareInteraction {
    pub fn new(field_dims: &[usize], embed_dim: usize, rng: &mut StdRng) -> LayerResult<Self> {
        if embed_dim == 0 {
            return Err(LayerError::ConfigError {
                message: "embed_dim must be positive".to_string(),
            });
        }
        let offsets = FieldOffsets::new(field_dims)?;
        let shape = [offsets.total(), embed_dim];
        let tables = (0..offsets.num_fields())
            .map(|_| Initializer::GlorotUniform.initialize(&shape, rng))
            .collect();
        let grads = (0..offsets.num_fields())
            .map(|_| Tensor::zeros(&shape))
            .collect();
        Ok(Self {
            offsets,
            embed_dim,
            tables,
            grads,
            cached_rows: None,
        })
    }

    pub fn forward(&self, ids: &[u32]) -> LayerResult<Tensor> {
        let rows = self.offsets.rows(ids)?;
        Ok(self.interact(&rows))
    }

    pub fn forward_train(&mut self, ids: &[u32]) -> LayerResult<Tensor> {
        let rows = self.offsets.rows(ids)?;
        let out = self.interact(&rows);
        self.cached_rows = Some(rows);
        Ok(out)
    }

    pub fn backward(&mut self, grad: &Tensor) -> LayerResult<()> {
        let rows = self.cached_rows.as_ref().ok_or(LayerError::NotInitialized)?;
        let nf = self.offsets.num_fields();
        let d = self.embed_dim;
        let batch = rows.len() / nf;
        if grad.numel() != batch {
            return Err(LayerError::ShapeMismatch {
                expected: vec![batch, 1],
                actual: grad.shape().to_vec(),
            });
        }
        for g in self.grads.iter_mut() {
            g.fill_zero();
        }
        for b in 0..batch {
            let g = grad.data()[b];
            let r = &rows[b * nf..(b + 1) * nf];
            for i in 0..nf {
                for j in (i + 1)..nf {
                    for k in 0..d {
                        let a = self.tables[j].data()[r[i] * d + k];
                        let c = self.tables[i].data()[r[j] * d + k];
                        self.grads[j].data_mut()[r[i] * d + k] += g * c;
                        self.grads[i].data_mut()[r[j] * d + k] += g * a;
                    }
                }
            }
        }
        Ok(())
    }

    pub fn parameters(&self) -> Vec<&Tensor> {
        self.tables.iter().collect()
    }

    pub fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        self.tables.iter_mut().collect()
    }

    pub fn params_and_grads(&mut self) -> Vec<(&mut Tensor, &Tensor)> {
        self.tables.iter_mut().zip(self.grads.iter()).collect()
    }

    fn interact(&self, rows: &[usize]) -> Tensor {
        let nf = self.offsets.num_fields();
        let d = self.embed_dim;
        let batch = rows.len() / nf;
        let out = (0..batch)
            .map(|b| {
                let r = &rows[b * nf..(b + 1) * nf];
                let mut acc = 0.0;
                for i in 0..nf {
                    for j in (i + 1)..nf {
                        let a = &self.tables[j].data()[r[i] * d..(r[i] + 1) * d];
                        let c = &self.tables[i].data()[r[j] * d..(r[j] + 1) * d];
                        acc += a.iter().zip(c).map(|(x, y)| x * y).sum::<f32>();
                    }
                }
                acc
            })
            .collect();
        Tensor::from_data(&[batch, 1], out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_two_field_interaction() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut ffm = FieldAwareInteraction::new(&[1, 1], 2, &mut rng).unwrap();
        // field 0 table, rows: [f0 id0, f1 id0]
        ffm.tables[0] = Tensor::from_data(&[2, 2], vec![0.0, 0.0, 1.0, 2.0]);
        ffm.tables[1] = Tensor::from_data(&[2, 2], vec![3.0, 4.0, 0.0, 0.0]);
        let out = ffm.forward_train(&[0, 0]).unwrap();
        // <W_1[x_0], W_0[x_1]> = <(3,4), (1,2)> = 11
        assert_eq!(out.data(), &[11.0]);

        ffm.backward(&Tensor::ones(&[1, 1])).unwrap();
        assert_eq!(ffm.grads[1].data(), &[1.0, 2.0, 0.0, 0.0]);
        assert_eq!(ffm.grads[0].data(), &[0.0, 0.0, 3.0, 4.0]);
    }

    #[test]
    fn test_one_table_per_field() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut ffm = FieldAwareInteraction::new(&[3, 4, 2], 4, &mut rng).unwrap();
        assert_eq!(ffm.parameters().len(), 3);
        assert_eq!(ffm.params_and_grads().len(), 3);
        assert_eq!(ffm.forward(&[0, 3, 1]).unwrap().shape(), &[1, 1]);
    }
}
