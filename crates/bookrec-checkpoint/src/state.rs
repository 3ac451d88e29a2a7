//! Model state representation for checkpointing.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One named parameter tensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorState {
    pub name: String,
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

/// Everything needed to rebuild a trained model of one fold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelState {
    /// Model family name.
    pub model: String,
    pub fold: usize,
    /// Epochs completed when the state was captured.
    pub epoch: usize,
    /// Validation score at `epoch`.
    pub score: f64,
    /// Parameters in the order the model yields them.
    pub tensors: Vec<TensorState>,
    pub metadata: BTreeMap<String, String>,
}

impl ModelState {
    pub fn new(model: impl Into<String>, fold: usize) -> Self {
        Self {
            model: model.into(),
            fold,
            epoch: 0,
            score: f64::MAX,
            tensors: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn add_tensor(&mut self, name: impl Into<String>, shape: Vec<usize>, data: Vec<f32>) {
        self.tensors.push(TensorState {
            name: name.into(),
            shape,
            data,
        });
    }

    pub fn tensor(&self, name: &str) -> Option<&TensorState> {
        self.tensors.iter().find(|t| t.name == name)
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Total number of parameters across all tensors.
    pub fn num_parameters(&self) -> usize {
        self.tensors.iter().map(|t| t.data.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tensor_lookup() {
        let mut state = ModelState::new("FM", 1).with_metadata("embed_dim", "16");
        state.add_tensor("a", vec![2], vec![1.0, 2.0]);
        state.add_tensor("b", vec![1, 3], vec![0.0; 3]);
        assert_eq!(state.tensor("b").map(|t| t.shape.clone()), Some(vec![1, 3]));
        assert!(state.tensor("c").is_none());
        assert_eq!(state.num_parameters(), 5);
        assert_eq!(state.metadata["embed_dim"], "16");
    }
}
