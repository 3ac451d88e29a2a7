//! Cross network of the Deep & Cross Network model.
//!
//! Each cross layer computes `x_{l+1} = x_0 * (x_l . w_l) + b_l + x_l`,
//! where `w_l` and `b_l` are vectors of the input width.

use crate::error::LayerError;
use crate::initializer::Initializer;
use crate::layer::Layer;
use crate::tensor::Tensor;
use rand::rngs::StdRng;

#[derive(Debug, Clone)]
pub struct CrossNetwork {
    input_dim: usize,
    weights: Vec<Tensor>,
    biases: Vec<Tensor>,
    weight_grads: Vec<Tensor>,
    bias_grads: Vec<Tensor>,
    /// Inputs `x_0..x_{L-1}` and scalars `s_l = x_l . w_l` of the last training pass.
    cache: Option<(Vec<Tensor>, Vec<Vec<f32>>)>,
}

impl CrossNetwork {
    pub fn new(input_dim: usize, num_layers: usize, rng: &mut StdRng) -> Result<Self, LayerError> {
        if input_dim == 0 || num_layers == 0 {
            return Err(LayerError::ConfigError {
                message: format!(
                    "cross network needs positive width and depth, got {input_dim}x{num_layers}"
                ),
            });
        }
        let weights = (0..num_layers)
            .map(|_| Initializer::GlorotUniform.initialize(&[input_dim, 1], rng))
            .collect();
        Ok(Self {
            input_dim,
            weights,
            biases: vec![Tensor::zeros(&[input_dim]); num_layers],
            weight_grads: vec![Tensor::zeros(&[input_dim, 1]); num_layers],
            bias_grads: vec![Tensor::zeros(&[input_dim]); num_layers],
            cache: None,
        })
    }

    pub fn num_layers(&self) -> usize {
        self.weights.len()
    }

    fn check(&self, input: &Tensor) -> Result<(), LayerError> {
        if input.ndim() != 2 || input.cols() != self.input_dim {
            return Err(LayerError::InvalidInputDimension {
                expected: self.input_dim,
                actual: input.cols(),
            });
        }
        Ok(())
    }

    fn run(&self, x0: &Tensor, mut record: Option<&mut (Vec<Tensor>, Vec<Vec<f32>>)>) -> Tensor {
        let mut x = x0.clone();
        for (w, b) in self.weights.iter().zip(self.biases.iter()) {
            let s: Vec<f32> = x.matmul(w).into_data();
            let mut next = x.add(b);
            let n = self.input_dim;
            {
                let data = next.data_mut();
                for (row, &sv) in s.iter().enumerate() {
                    for k in 0..n {
                        data[row * n + k] += x0.data()[row * n + k] * sv;
                    }
                }
            }
            if let Some(cache) = record.as_deref_mut() {
                cache.0.push(x.clone());
                cache.1.push(s);
            }
            x = next;
        }
        x
    }
}

impl Layer for CrossNetwork {
    fn forward(&self, input: &Tensor) -> Result<Tensor, LayerError> {
        self.check(input)?;
        Ok(self.run(input, None))
    }

    fn forward_train(&mut self, input: &Tensor) -> Result<Tensor, LayerError> {
        self.check(input)?;
        let mut cache = (Vec::new(), Vec::new());
        let out = self.run(input, Some(&mut cache));
        self.cache = Some(cache);
        Ok(out)
    }

    fn backward(&mut self, grad: &Tensor) -> Result<Tensor, LayerError> {
        let (inputs, scalars) = self.cache.as_ref().ok_or(LayerError::NotInitialized)?;
        let x0 = &inputs[0];
        if grad.shape() != x0.shape() {
            return Err(LayerError::ShapeMismatch {
                expected: x0.shape().to_vec(),
                actual: grad.shape().to_vec(),
            });
        }
        let n = self.input_dim;
        let rows = x0.rows();
        let mut g = grad.clone();
        let mut dx0 = Tensor::zeros(x0.shape());

        for l in (0..self.weights.len()).rev() {
            let xl = &inputs[l];
            let s = &scalars[l];
            // ds_r = sum_k g_rk * x0_rk
            let ds: Vec<f32> = (0..rows)
                .map(|r| g.row(r).iter().zip(x0.row(r)).map(|(a, b)| a * b).sum())
                .collect();

            self.bias_grads[l] = g.sum_axis(0);
            let mut wg = vec![0.0; n];
            for r in 0..rows {
                for k in 0..n {
                    wg[k] += ds[r] * xl.data()[r * n + k];
                }
            }
            self.weight_grads[l] = Tensor::from_data(&[n, 1], wg);

            {
                let d0 = dx0.data_mut();
                for r in 0..rows {
                    for k in 0..n {
                        d0[r * n + k] += g.data()[r * n + k] * s[r];
                    }
                }
            }

            let w = self.weights[l].data();
            let mut prev = g.clone();
            {
                let p = prev.data_mut();
                for r in 0..rows {
                    for k in 0..n {
                        p[r * n + k] += ds[r] * w[k];
                    }
                }
            }
            g = prev;
        }

        Ok(g.add(&dx0))
    }

    fn parameters(&self) -> Vec<&Tensor> {
        self.weights.iter().chain(self.biases.iter()).collect()
    }

    fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        self.weights.iter_mut().chain(self.biases.iter_mut()).collect()
    }

    fn params_and_grads(&mut self) -> Vec<(&mut Tensor, &Tensor)> {
        self.weights
            .iter_mut()
            .zip(self.weight_grads.iter())
            .chain(self.biases.iter_mut().zip(self.bias_grads.iter()))
            .collect()
    }

    fn name(&self) -> &str {
        "CrossNetwork"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_single_cross_layer() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut cn = CrossNetwork::new(2, 1, &mut rng).unwrap();
        cn.weights[0] = Tensor::from_data(&[2, 1], vec![1.0, 1.0]);
        let x = Tensor::from_data(&[1, 2], vec![1.0, 2.0]);
        // s = 3, out = x0 * 3 + x = [4, 8]
        let out = cn.forward_train(&x).unwrap();
        assert_eq!(out.data(), &[4.0, 8.0]);

        let dx = cn.backward(&Tensor::ones(&[1, 2])).unwrap();
        // ds = 3; dx_l = g + ds*w = [4,4]; dx0 = g*s = [3,3]
        assert_eq!(dx.data(), &[7.0, 7.0]);
        assert_eq!(cn.weight_grads[0].data(), &[3.0, 6.0]);
        assert_eq!(cn.bias_grads[0].data(), &[1.0, 1.0]);
    }

    #[test]
    fn test_depth_and_params() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut cn = CrossNetwork::new(8, 3, &mut rng).unwrap();
        assert_eq!(cn.num_layers(), 3);
        assert_eq!(cn.parameters().len(), 6);
        assert_eq!(cn.params_and_grads().len(), 6);
        assert!(CrossNetwork::new(8, 0, &mut rng).is_err());
    }
}
