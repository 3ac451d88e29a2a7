//! Layer trait definition for neural network layers.
//!
//! Every dense building block of the rating models implements [`Layer`]:
//! a forward pass for inference, a caching forward pass for training,
//! a backward pass that records parameter gradients, and access to the
//! `(parameter, gradient)` pairs an optimizer steps over.

use crate::error::LayerError;
use crate::tensor::Tensor;

/// A neural network layer that supports forward and backward propagation.
///
/// # Example
///
/// ```
/// use bookrec_layers::dense::Dense;
/// use bookrec_layers::layer::Layer;
/// use bookrec_layers::tensor::Tensor;
/// use rand::SeedableRng;
///
/// let mut rng = rand::rngs::StdRng::seed_from_u64(0);
/// let layer = Dense::new(16, 4, &mut rng);
/// let input = Tensor::zeros(&[8, 16]);
/// let output = layer.forward(&input).unwrap();
/// assert_eq!(output.shape(), &[8, 4]);
/// ```
pub trait Layer: Send + Sync {
    /// Performs an inference forward pass.
    ///
    /// # Errors
    ///
    /// Returns a [`LayerError`] if the input shape is incompatible with the layer
    fn forward(&self, input: &Tensor) -> Result<Tensor, LayerError>;

    /// Performs a forward pass that caches what [`Layer::backward`] needs.
    ///
    /// Layers without state fall back to [`Layer::forward`].
    fn forward_train(&mut self, input: &Tensor) -> Result<Tensor, LayerError> {
        self.forward(input)
    }

    /// Takes the gradient of the loss with respect to the layer's output,
    /// stores parameter gradients, and returns the gradient with respect
    /// to the layer's input.
    ///
    /// # Errors
    ///
    /// Returns [`LayerError::NotInitialized`] when no training forward pass
    /// preceded this call.
    fn backward(&mut self, grad: &Tensor) -> Result<Tensor, LayerError>;

    /// Returns references to the layer's learnable parameters.
    fn parameters(&self) -> Vec<&Tensor>;

    /// Returns mutable references to the layer's learnable parameters.
    fn parameters_mut(&mut self) -> Vec<&mut Tensor>;

    /// Pairs each parameter with the gradient of the last backward pass.
    fn params_and_grads(&mut self) -> Vec<(&mut Tensor, &Tensor)> {
        Vec::new()
    }

    /// Returns the name of the layer for debugging and logging purposes.
    fn name(&self) -> &str {
        "Layer"
    }

    /// Returns whether the layer is in training mode.
    fn is_training(&self) -> bool {
        true
    }

    /// Sets the layer's training mode.
    fn set_training(&mut self, _training: bool) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ScaleLayer {
        weight: Tensor,
        weight_grad: Tensor,
        cached: Option<Tensor>,
        training: bool,
    }

    impl ScaleLayer {
        fn new() -> Self {
            Self {
                weight: Tensor::from_data(&[1], vec![2.0]),
                weight_grad: Tensor::zeros(&[1]),
                cached: None,
                training: true,
            }
        }
    }

    impl Layer for ScaleLayer {
        fn forward(&self, input: &Tensor) -> Result<Tensor, LayerError> {
            Ok(input.scale(self.weight.data()[0]))
        }

        fn forward_train(&mut self, input: &Tensor) -> Result<Tensor, LayerError> {
            self.cached = Some(input.clone());
            self.forward(input)
        }

        fn backward(&mut self, grad: &Tensor) -> Result<Tensor, LayerError> {
            let input = self.cached.as_ref().ok_or(LayerError::NotInitialized)?;
            self.weight_grad.data_mut()[0] = input.mul(grad).sum();
            Ok(grad.scale(self.weight.data()[0]))
        }

        fn parameters(&self) -> Vec<&Tensor> {
            vec![&self.weight]
        }

        fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
            vec![&mut self.weight]
        }

        fn params_and_grads(&mut self) -> Vec<(&mut Tensor, &Tensor)> {
            vec![(&mut self.weight, &self.weight_grad)]
        }

        fn name(&self) -> &str {
            "ScaleLayer"
        }

        fn is_training(&self) -> bool {
            self.training
        }

        fn set_training(&mut self, training: bool) {
            self.training = training;
        }
    }

    #[test]
    fn test_backward_requires_training_forward() {
        let mut layer = ScaleLayer::new();
        let grad = Tensor::ones(&[2, 1]);
        assert!(matches!(
            layer.backward(&grad),
            Err(LayerError::NotInitialized)
        ));
    }

    #[test]
    fn test_layer_gradients() {
        let mut layer = ScaleLayer::new();
        let input = Tensor::from_data(&[2, 1], vec![1.0, 3.0]);
        let out = layer.forward_train(&input).unwrap();
        assert_eq!(out.data(), &[2.0, 6.0]);

        let input_grad = layer.backward(&Tensor::ones(&[2, 1])).unwrap();
        assert_eq!(input_grad.data(), &[2.0, 2.0]);

        let pairs = layer.params_and_grads();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].1.data(), &[4.0]);
    }

    #[test]
    fn test_training_mode() {
        let mut layer = ScaleLayer::new();
        assert!(layer.is_training());
        layer.set_training(false);
        assert!(!layer.is_training());
        assert_eq!(layer.name(), "ScaleLayer");
    }
}
