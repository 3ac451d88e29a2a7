//! Dense (fully connected) layer implementation.
//!
//! This module provides the [`Dense`] layer, which performs a linear transformation
//! `y = xW + b` where W is the weight matrix and b is the bias vector.

use crate::error::LayerError;
use crate::initializer::Initializer;
use crate::layer::Layer;
use crate::tensor::Tensor;
use rand::rngs::StdRng;

/// A dense (fully connected) neural network layer.
///
/// Performs the transformation `y = xW + b` where:
/// - `x` is the input tensor of shape `[batch_size, in_features]`
/// - `W` is the weight matrix of shape `[in_features, out_features]`
/// - `b` is the bias vector of shape `[out_features]`
#[derive(Debug, Clone)]
pub struct Dense {
    /// Weight matrix of shape [in_features, out_features]
    weights: Tensor,
    /// Bias vector of shape [out_features]
    bias: Tensor,
    /// Gradient of weights
    weights_grad: Tensor,
    /// Gradient of bias
    bias_grad: Tensor,
    /// Cached input for backward pass
    cached_input: Option<Tensor>,
    in_features: usize,
    out_features: usize,
    use_bias: bool,
}

impl Dense {
    /// Creates a dense layer with Glorot uniform weights and zero bias.
    pub fn new(in_features: usize, out_features: usize, rng: &mut StdRng) -> Self {
        Self::new_with_initializer(
            in_features,
            out_features,
            Initializer::GlorotUniform,
            true,
            rng,
        )
    }

    /// Creates a new dense layer without bias.
    pub fn new_no_bias(in_features: usize, out_features: usize, rng: &mut StdRng) -> Self {
        Self::new_with_initializer(
            in_features,
            out_features,
            Initializer::GlorotUniform,
            false,
            rng,
        )
    }

    /// Creates a new dense layer with a custom weight initializer.
    pub fn new_with_initializer(
        in_features: usize,
        out_features: usize,
        weight_init: Initializer,
        use_bias: bool,
        rng: &mut StdRng,
    ) -> Self {
        Self {
            weights: weight_init.initialize(&[in_features, out_features], rng),
            bias: Tensor::zeros(&[out_features]),
            weights_grad: Tensor::zeros(&[in_features, out_features]),
            bias_grad: Tensor::zeros(&[out_features]),
            cached_input: None,
            in_features,
            out_features,
            use_bias,
        }
    }

    /// Returns the input feature dimension.
    pub fn in_features(&self) -> usize {
        self.in_features
    }

    /// Returns the output feature dimension.
    pub fn out_features(&self) -> usize {
        self.out_features
    }

    /// Returns a reference to the weight matrix.
    pub fn weights(&self) -> &Tensor {
        &self.weights
    }

    /// Returns the weight gradient of the last backward pass.
    pub fn weights_grad(&self) -> &Tensor {
        &self.weights_grad
    }

    /// Returns the bias gradient of the last backward pass.
    pub fn bias_grad(&self) -> &Tensor {
        &self.bias_grad
    }

    fn check_input(&self, input: &Tensor) -> Result<(), LayerError> {
        if input.ndim() != 2 {
            return Err(LayerError::ShapeMismatch {
                expected: vec![0, self.in_features],
                actual: input.shape().to_vec(),
            });
        }
        if input.shape()[1] != self.in_features {
            return Err(LayerError::InvalidInputDimension {
                expected: self.in_features,
                actual: input.shape()[1],
            });
        }
        Ok(())
    }
}

impl Layer for Dense {
    fn forward(&self, input: &Tensor) -> Result<Tensor, LayerError> {
        self.check_input(input)?;
        let output = input.matmul(&self.weights);
        if self.use_bias {
            Ok(output.add(&self.bias))
        } else {
            Ok(output)
        }
    }

    fn forward_train(&mut self, input: &Tensor) -> Result<Tensor, LayerError> {
        let output = self.forward(input)?;
        self.cached_input = Some(input.clone());
        Ok(output)
    }

    fn backward(&mut self, grad: &Tensor) -> Result<Tensor, LayerError> {
        let input = self
            .cached_input
            .as_ref()
            .ok_or(LayerError::NotInitialized)?;
        if grad.shape() != [input.rows(), self.out_features] {
            return Err(LayerError::ShapeMismatch {
                expected: vec![input.rows(), self.out_features],
                actual: grad.shape().to_vec(),
            });
        }

        // dW = x^T * grad, db = sum(grad, axis=0), dx = grad * W^T
        self.weights_grad = input.transpose().matmul(grad);
        if self.use_bias {
            self.bias_grad = grad.sum_axis(0);
        }
        Ok(grad.matmul(&self.weights.transpose()))
    }

    fn parameters(&self) -> Vec<&Tensor> {
        if self.use_bias {
            vec![&self.weights, &self.bias]
        } else {
            vec![&self.weights]
        }
    }

    fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        if self.use_bias {
            vec![&mut self.weights, &mut self.bias]
        } else {
            vec![&mut self.weights]
        }
    }

    fn params_and_grads(&mut self) -> Vec<(&mut Tensor, &Tensor)> {
        if self.use_bias {
            vec![
                (&mut self.weights, &self.weights_grad),
                (&mut self.bias, &self.bias_grad),
            ]
        } else {
            vec![(&mut self.weights, &self.weights_grad)]
        }
    }

    fn name(&self) -> &str {
        "Dense"
    }
}
