//! Feed-forward tower used on top of concatenated field embeddings.
//!
//! The deep models (Wide & Deep, NCF, DCN) flatten a row's embeddings into
//! one vector and pass it through a stack of blocks. A block is a [`Dense`]
//! projection, an activation and, for activated blocks, dropout. A final
//! linear block turns the tower into a scoring head.

use crate::activation::{ActivationType, ReLU, Sigmoid, Tanh};
use crate::dense::Dense;
use crate::dropout::Dropout;
use crate::error::LayerError;
use crate::layer::Layer;
use crate::tensor::Tensor;
use rand::rngs::StdRng;
use rand::Rng;

#[derive(Debug, Clone)]
enum Activation {
    Relu(ReLU),
    Sigmoid(Sigmoid),
    Tanh(Tanh),
}

impl Activation {
    fn build(kind: ActivationType) -> Option<Self> {
        match kind {
            ActivationType::ReLU => Some(Self::Relu(ReLU::new())),
            ActivationType::Sigmoid => Some(Self::Sigmoid(Sigmoid::new())),
            ActivationType::Tanh => Some(Self::Tanh(Tanh::new())),
            ActivationType::None => None,
        }
    }

    fn layer(&self) -> &dyn Layer {
        match self {
            Self::Relu(a) => a,
            Self::Sigmoid(a) => a,
            Self::Tanh(a) => a,
        }
    }

    fn layer_mut(&mut self) -> &mut dyn Layer {
        match self {
            Self::Relu(a) => a,
            Self::Sigmoid(a) => a,
            Self::Tanh(a) => a,
        }
    }
}

/// `Dense -> activation -> dropout`, where a linear block has neither of
/// the last two.
#[derive(Debug, Clone)]
struct Block {
    dense: Dense,
    activation: Option<Activation>,
    dropout: Option<Dropout>,
}

impl Block {
    fn new(
        input_dim: usize,
        width: usize,
        kind: ActivationType,
        dropout: f32,
        rng: &mut StdRng,
    ) -> Result<Self, LayerError> {
        let activation = Activation::build(kind);
        let dropout = match (&activation, dropout > 0.0) {
            (Some(_), true) => Some(Dropout::new(dropout, rng.gen())?),
            _ => None,
        };
        Ok(Self {
            dense: Dense::new(input_dim, width, rng),
            activation,
            dropout,
        })
    }

    fn width(&self) -> usize {
        self.dense.out_features()
    }
}

/// Stack of blocks mapping `[batch, input_dim]` to `[batch, output_dim]`.
///
/// ```
/// use bookrec_layers::{Layer, Tensor, MLP};
/// use rand::{rngs::StdRng, SeedableRng};
///
/// let mut rng = StdRng::seed_from_u64(0);
/// // two fields of 8-wide embeddings, one hidden layer, one score
/// let tower = MLP::new(16, &[8], 0.2, Some(1), &mut rng).unwrap();
/// let scores = tower.forward(&Tensor::ones(&[3, 16])).unwrap();
/// assert_eq!(scores.shape(), &[3, 1]);
/// ```
#[derive(Debug, Clone)]
pub struct MLP {
    input_dim: usize,
    blocks: Vec<Block>,
    training: bool,
}

impl MLP {
    /// ReLU blocks of `hidden_dims` widths with `dropout`, then an optional
    /// linear head of width `output_dim`.
    pub fn new(
        input_dim: usize,
        hidden_dims: &[usize],
        dropout: f32,
        output_dim: Option<usize>,
        rng: &mut StdRng,
    ) -> Result<Self, LayerError> {
        let mut layers: Vec<(usize, ActivationType)> = hidden_dims
            .iter()
            .map(|&w| (w, ActivationType::ReLU))
            .collect();
        layers.extend(output_dim.map(|w| (w, ActivationType::None)));
        Self::with_layers(input_dim, &layers, dropout, rng)
    }

    /// One block per `(width, activation)` pair.
    pub fn with_layers(
        input_dim: usize,
        layers: &[(usize, ActivationType)],
        dropout: f32,
        rng: &mut StdRng,
    ) -> Result<Self, LayerError> {
        let invalid = |message: String| -> Result<Self, LayerError> {
            Err(LayerError::ConfigError { message })
        };
        if input_dim == 0 {
            return invalid("MLP input width must be positive".to_string());
        }
        if layers.is_empty() {
            return invalid("MLP needs at least one layer".to_string());
        }
        if let Some(i) = layers.iter().position(|&(w, _)| w == 0) {
            return invalid(format!("MLP layer {i} has zero width"));
        }
        if !(0.0..1.0).contains(&dropout) {
            return invalid(format!("dropout must be in [0, 1), got {dropout}"));
        }

        let mut blocks = Vec::with_capacity(layers.len());
        let mut width = input_dim;
        for &(next, kind) in layers {
            blocks.push(Block::new(width, next, kind, dropout, rng)?);
            width = next;
        }
        Ok(Self {
            input_dim,
            blocks,
            training: true,
        })
    }

    pub fn num_layers(&self) -> usize {
        self.blocks.len()
    }

    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    pub fn output_dim(&self) -> usize {
        self.blocks.last().map_or(self.input_dim, Block::width)
    }
}

impl Layer for MLP {
    fn forward(&self, input: &Tensor) -> Result<Tensor, LayerError> {
        self.blocks.iter().try_fold(input.clone(), |x, block| {
            let x = block.dense.forward(&x)?;
            match &block.activation {
                Some(a) => a.layer().forward(&x),
                None => Ok(x),
            }
        })
    }

    fn forward_train(&mut self, input: &Tensor) -> Result<Tensor, LayerError> {
        let mut x = input.clone();
        for block in &mut self.blocks {
            x = block.dense.forward_train(&x)?;
            if let Some(a) = &mut block.activation {
                x = a.layer_mut().forward_train(&x)?;
            }
            if let Some(d) = &mut block.dropout {
                x = d.forward_train(&x)?;
            }
        }
        Ok(x)
    }

    fn backward(&mut self, grad: &Tensor) -> Result<Tensor, LayerError> {
        let mut g = grad.clone();
        for block in self.blocks.iter_mut().rev() {
            if let Some(d) = &mut block.dropout {
                g = d.backward(&g)?;
            }
            if let Some(a) = &mut block.activation {
                g = a.layer_mut().backward(&g)?;
            }
            g = block.dense.backward(&g)?;
        }
        Ok(g)
    }

    fn parameters(&self) -> Vec<&Tensor> {
        self.blocks
            .iter()
            .flat_map(|b| b.dense.parameters())
            .collect()
    }

    fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        self.blocks
            .iter_mut()
            .flat_map(|b| b.dense.parameters_mut())
            .collect()
    }

    fn params_and_grads(&mut self) -> Vec<(&mut Tensor, &Tensor)> {
        self.blocks
            .iter_mut()
            .flat_map(|b| b.dense.params_and_grads())
            .collect()
    }

    fn name(&self) -> &str {
        "MLP"
    }

    fn is_training(&self) -> bool {
        self.training
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
        for d in self.blocks.iter_mut().filter_map(|b| b.dropout.as_mut()) {
            d.set_training(training);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn rng(seed: u64) -> StdRng {
        StdRng::seed_from_u64(seed)
    }

    #[test]
    fn test_tower_with_head() {
        let tower = MLP::new(12, &[16, 16], 0.2, Some(1), &mut rng(0)).unwrap();
        assert_eq!((tower.num_layers(), tower.input_dim(), tower.output_dim()), (3, 12, 1));
        assert!(tower.blocks[2].activation.is_none());
        assert!(tower.blocks[2].dropout.is_none());
        assert!(tower.blocks[0].dropout.is_some());
        let out = tower.forward(&Tensor::ones(&[5, 12])).unwrap();
        assert_eq!(out.shape(), &[5, 1]);
    }

    #[test]
    fn test_headless_tower_ends_activated() {
        let tower = MLP::new(6, &[4, 3], 0.0, None, &mut rng(0)).unwrap();
        assert_eq!(tower.output_dim(), 3);
        let out = tower.forward(&Tensor::randn(&[4, 6], 0.0, 1.0, &mut rng(9))).unwrap();
        assert!(out.data().iter().all(|&v| v >= 0.0));
    }

    #[test]
    fn test_backward_reaches_input() {
        let mut tower = MLP::new(4, &[8], 0.0, Some(2), &mut rng(1)).unwrap();
        tower.forward_train(&Tensor::ones(&[3, 4])).unwrap();
        let dx = tower.backward(&Tensor::ones(&[3, 2])).unwrap();
        assert_eq!(dx.shape(), &[3, 4]);
        assert_eq!(tower.params_and_grads().len(), 4);
    }

    #[test]
    fn test_mixed_activations() {
        let layers = [(5, ActivationType::Tanh), (2, ActivationType::Sigmoid)];
        let mut tower = MLP::with_layers(3, &layers, 0.0, &mut rng(4)).unwrap();
        let out = tower.forward_train(&Tensor::ones(&[2, 3])).unwrap();
        assert!(out.data().iter().all(|&v| v > 0.0 && v < 1.0));
        assert!(tower.backward(&Tensor::ones(&[2, 2])).is_ok());
    }

    #[test]
    fn test_rejects_bad_shapes() {
        let relu = [(2, ActivationType::ReLU)];
        assert!(MLP::with_layers(0, &relu, 0.0, &mut rng(0)).is_err());
        assert!(MLP::with_layers(4, &[], 0.0, &mut rng(0)).is_err());
        assert!(MLP::with_layers(4, &[(0, ActivationType::None)], 0.0, &mut rng(0)).is_err());
        assert!(MLP::new(4, &[2], 1.0, None, &mut rng(0)).is_err());
    }

    #[test]
    fn test_eval_mode_disables_dropout() {
        let mut tower = MLP::new(4, &[8], 0.5, Some(1), &mut rng(2)).unwrap();
        tower.set_training(false);
        let x = Tensor::ones(&[2, 4]);
        assert_eq!(tower.forward_train(&x).unwrap(), tower.forward(&x).unwrap());
    }
}
