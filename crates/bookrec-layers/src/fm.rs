//! Second-order factorization machine interaction.
//!
//! Input is the `[batch, num_fields * embed_dim]` output of a
//! [`crate::embedding::FeaturesEmbedding`]; output is `[batch, 1]` with
//!
//! ```text
//! y = 0.5 * sum_k ((sum_f v_fk)^2 - sum_f v_fk^2)
//! ```

use crate::dense::Dense;
use crate::error::LayerError;
use crate::initializer::Initializer;
use crate::layer::Layer;
use crate::tensor::Tensor;
use rand::rngs::StdRng;

#[derive(Debug, Clone)]
pub struct FactorizationMachine {
    num_fields: usize,
    embed_dim: usize,
    cached_input: Option<Tensor>,
}

impl FactorizationMachine {
    pub fn new(num_fields: usize, embed_dim: usize) -> Self {
        Self {
            num_fields,
            embed_dim,
            cached_input: None,
        }
    }

    fn check(&self, input: &Tensor) -> Result<(), LayerError> {
        let width = self.num_fields * self.embed_dim;
        if input.ndim() != 2 || input.cols() != width {
            return Err(LayerError::ShapeMismatch {
                expected: vec![input.rows(), width],
                actual: input.shape().to_vec(),
            });
        }
        Ok(())
    }

    /// Per-row sum over fields, `[batch, embed_dim]` flattened.
    fn field_sums(&self, input: &Tensor) -> Vec<f32> {
        let (nf, d) = (self.num_fields, self.embed_dim);
        let mut sums = vec![0.0; input.rows() * d];
        for b in 0..input.rows() {
            let row = input.row(b);
            for f in 0..nf {
                for k in 0..d {
                    sums[b * d + k] += row[f * d + k];
                }
            }
        }
        sums
    }
}

impl Layer for FactorizationMachine {
    fn forward(&self, input: &Tensor) -> Result<Tensor, LayerError> {
        self.check(input)?;
        let (nf, d) = (self.num_fields, self.embed_dim);
        let sums = self.field_sums(input);
        let out = (0..input.rows())
            .map(|b| {
                let row = input.row(b);
                let mut acc = 0.0;
                for k in 0..d {
                    let s = sums[b * d + k];
                    let sq: f32 = (0..nf).map(|f| row[f * d + k] * row[f * d + k]).sum();
                    acc += s * s - sq;
                }
                0.5 * acc
            })
            .collect();
        Ok(Tensor::from_data(&[input.rows(), 1], out))
    }

    fn forward_train(&mut self, input: &Tensor) -> Result<Tensor, LayerError> {
        let out = self.forward(input)?;
        self.cached_input = Some(input.clone());
        Ok(out)
    }

    fn backward(&mut self, grad: &Tensor) -> Result<Tensor, LayerError> {
        let input = self
            .cached_input
            .as_ref()
            .ok_or(LayerError::NotInitialized)?;
        if grad.numel() != input.rows() {
            return Err(LayerError::ShapeMismatch {
                expected: vec![input.rows(), 1],
                actual: grad.shape().to_vec(),
            });
        }
        let (nf, d) = (self.num_fields, self.embed_dim);
        let sums = self.field_sums(input);
        let mut out = vec![0.0; input.numel()];
        for b in 0..input.rows() {
            let g = grad.data()[b];
            let row = input.row(b);
            for f in 0..nf {
                for k in 0..d {
                    out[b * nf * d + f * d + k] = g * (sums[b * d + k] - row[f * d + k]);
                }
            }
        }
        Ok(Tensor::from_data(input.shape(), out))
    }

    fn parameters(&self) -> Vec<&Tensor> {
        Vec::new()
    }

    fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        Vec::new()
    }

    fn name(&self) -> &str {
        "FactorizationMachine"
    }
}

/// Factorization machine over a dense feature vector `x` of width `n`
/// with latent factors `V: [n, k]`:
///
/// ```text
/// y = w.x + b + 0.5 * sum_k ((xV)_k^2 - (x^2 V^2)_k)
/// ```
#[derive(Debug, Clone)]
pub struct DenseFactorizationMachine {
    linear: Dense,
    v: Tensor,
    v_grad: Tensor,
    cached_input: Option<Tensor>,
}

impl DenseFactorizationMachine {
    pub fn new(input_dim: usize, latent_dim: usize, rng: &mut StdRng) -> Self {
        let shape = [input_dim, latent_dim];
        Self {
            linear: Dense::new(input_dim, 1, rng),
            v: Initializer::GlorotUniform.initialize(&shape, rng),
            v_grad: Tensor::zeros(&shape),
            cached_input: None,
        }
    }

    pub fn input_dim(&self) -> usize {
        self.v.rows()
    }

    fn interaction(&self, input: &Tensor) -> Tensor {
        let xv = input.matmul(&self.v);
        let x2v2 = input.map(|x| x * x).matmul(&self.v.map(|x| x * x));
        xv.mul(&xv).sub(&x2v2).sum_axis(1).scale(0.5)
    }
}

impl Layer for DenseFactorizationMachine {
    fn forward(&self, input: &Tensor) -> Result<Tensor, LayerError> {
        let linear = self.linear.forward(input)?;
        let inter = self.interaction(input);
        Ok(linear.add(&inter.reshape(&[input.rows(), 1])))
    }

    fn forward_train(&mut self, input: &Tensor) -> Result<Tensor, LayerError> {
        let linear = self.linear.forward_train(input)?;
        let inter = self.interaction(input);
        self.cached_input = Some(input.clone());
        Ok(linear.add(&inter.reshape(&[input.rows(), 1])))
    }

    fn backward(&mut self, grad: &Tensor) -> Result<Tensor, LayerError> {
        let input = self
            .cached_input
            .as_ref()
            .ok_or(LayerError::NotInitialized)?;
        let (rows, n, k) = (input.rows(), self.v.rows(), self.v.cols());
        if grad.numel() != rows {
            return Err(LayerError::ShapeMismatch {
                expected: vec![rows, 1],
                actual: grad.shape().to_vec(),
            });
        }
        let mut dx = self.linear.backward(grad)?;
        let xv = input.matmul(&self.v);
        let v = self.v.data();
        let x = input.data();
        let g = grad.data();
        let dxd = dx.data_mut();
        let mut dv = vec![0.0; n * k];
        for b in 0..rows {
            for i in 0..n {
                let xi = x[b * n + i];
                let mut acc = 0.0;
                for j in 0..k {
                    let vij = v[i * k + j];
                    let s = xv.data()[b * k + j];
                    acc += s * vij - xi * vij * vij;
                    dv[i * k + j] += g[b] * (xi * s - xi * xi * vij);
                }
                dxd[b * n + i] += g[b] * acc;
            }
        }
        self.v_grad = Tensor::from_data(&[n, k], dv);
        Ok(dx)
    }

    fn parameters(&self) -> Vec<&Tensor> {
        let mut params = self.linear.parameters();
        params.push(&self.v);
        params
    }

    fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        let mut params = self.linear.parameters_mut();
        params.push(&mut self.v);
        params
    }

    fn params_and_grads(&mut self) -> Vec<(&mut Tensor, &Tensor)> {
        let mut pairs = self.linear.params_and_grads();
        pairs.push((&mut self.v, &self.v_grad));
        pairs
    }

    fn name(&self) -> &str {
        "DenseFactorizationMachine"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fm_matches_pairwise_dot_products() {
        let fm = FactorizationMachine::new(3, 2);
        let v = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let input = Tensor::from_data(&[1, 6], v);
        // <v0,v1> + <v0,v2> + <v1,v2> = 11 + 17 + 39
        let out = fm.forward(&input).unwrap();
        assert!((out.data()[0] - 67.0).abs() < 1e-4);
    }

    #[test]
    fn test_fm_gradient_is_sum_of_other_fields() {
        let mut fm = FactorizationMachine::new(2, 1);
        let input = Tensor::from_data(&[1, 2], vec![3.0, 5.0]);
        fm.forward_train(&input).unwrap();
        let g = fm.backward(&Tensor::ones(&[1, 1])).unwrap();
        assert_eq!(g.data(), &[5.0, 3.0]);
    }

    #[test]
    fn test_dense_fm_interaction_and_grad() {
        use rand::SeedableRng;
        let mut rng = StdRng::seed_from_u64(0);
        let mut fm = DenseFactorizationMachine::new(2, 1, &mut rng);
        for p in fm.linear.parameters_mut() {
            p.fill_zero();
        }
        fm.v = Tensor::from_data(&[2, 1], vec![2.0, 3.0]);
        let x = Tensor::from_data(&[1, 2], vec![1.0, 4.0]);
        // pairwise term x0 x1 <v0, v1> = 1 * 4 * 6
        let out = fm.forward_train(&x).unwrap();
        assert!((out.data()[0] - 24.0).abs() < 1e-4);
        let dx = fm.backward(&Tensor::ones(&[1, 1])).unwrap();
        // d/dx0 = x1 v0 v1, d/dx1 = x0 v0 v1
        assert!((dx.data()[0] - 24.0).abs() < 1e-4);
        assert!((dx.data()[1] - 6.0).abs() < 1e-4);
        // d/dv0 = x0 x1 v1, d/dv1 = x0 x1 v0
        assert_eq!(fm.v_grad.data(), &[12.0, 8.0]);
        assert_eq!(fm.params_and_grads().len(), 3);
    }

    #[test]
    fn test_fm_rejects_wrong_width() {
        let fm = FactorizationMachine::new(3, 2);
        assert!(fm.forward(&Tensor::zeros(&[1, 5])).is_err());
    }
}
