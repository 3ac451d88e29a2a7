//! The trainable network contract and its checkpoint bridge.

use bookrec_checkpoint::{CheckpointError, ModelState};
use bookrec_data::Batch;
use bookrec_layers::{LayerError, LayerResult, Tensor};

/// A rating model: field codes (and optional dense side features) in,
/// `[rows, output_dim]` scores out.
///
/// The shape mirrors [`bookrec_layers::Layer`], but inputs are whole
/// batches since most models start from embedding lookups.
pub trait Network: Send {
    fn name(&self) -> &str;

    /// 1 for regression, the number of classes in classifier mode.
    fn output_dim(&self) -> usize;

    fn forward(&self, batch: &Batch) -> LayerResult<Tensor>;

    /// Forward pass that caches what [`Network::backward`] needs.
    fn forward_train(&mut self, batch: &Batch) -> LayerResult<Tensor>;

    /// Takes `d loss / d output` and records every parameter gradient.
    fn backward(&mut self, grad: &Tensor) -> LayerResult<()>;

    fn parameters(&self) -> Vec<&Tensor>;

    fn parameters_mut(&mut self) -> Vec<&mut Tensor>;

    fn params_and_grads(&mut self) -> Vec<(&mut Tensor, &Tensor)>;

    fn set_training(&mut self, training: bool);
}

/// Dense side features of a batch as a `[rows, dense_dim]` tensor.
pub(crate) fn dense_input(batch: &Batch) -> LayerResult<Tensor> {
    let rows = batch.rows();
    if batch.dense_dim == 0 || batch.dense.len() != rows * batch.dense_dim {
        return Err(LayerError::InvalidInputDimension {
            expected: rows * batch.dense_dim.max(1),
            actual: batch.dense.len(),
        });
    }
    Ok(Tensor::from_data(&[rows, batch.dense_dim], batch.dense.clone()))
}

/// The first `n` field codes of every row.
pub(crate) fn leading_fields(batch: &Batch, n: usize) -> Vec<u32> {
    batch
        .fields
        .chunks(batch.num_fields.max(1))
        .flat_map(|row| row[..n.min(row.len())].iter().copied())
        .collect()
}

/// Adds a `[rows, 1]` column to every column of `wide`.
pub(crate) fn add_column(wide: &Tensor, column: &Tensor) -> Tensor {
    let cols = wide.cols();
    let mut data = wide.data().to_vec();
    for (b, v) in column.data().iter().enumerate() {
        for x in &mut data[b * cols..(b + 1) * cols] {
            *x += v;
        }
    }
    Tensor::from_data(wide.shape(), data)
}

/// Row sums of `grad` as a `[rows, 1]` tensor.
pub(crate) fn row_sums(grad: &Tensor) -> Tensor {
    grad.sum_axis(1).reshape(&[grad.rows(), 1])
}

/// Snapshots every parameter tensor in order.
pub fn export_state(network: &dyn Network, fold: usize) -> ModelState {
    let mut state = ModelState::new(network.name(), fold);
    for (i, p) in network.parameters().into_iter().enumerate() {
        state.add_tensor(format!("param_{i}"), p.shape().to_vec(), p.data().to_vec());
    }
    state
}

/// Copies checkpointed tensors back into the network's parameters.
pub fn load_state(network: &mut dyn Network, state: &ModelState) -> Result<(), CheckpointError> {
    if state.model != network.name() {
        return Err(CheckpointError::Mismatch(format!(
            "checkpoint is for {}, network is {}",
            state.model,
            network.name()
        )));
    }
    let mut params = network.parameters_mut();
    if params.len() != state.tensors.len() {
        return Err(CheckpointError::Mismatch(format!(
            "checkpoint has {} tensors, network has {}",
            state.tensors.len(),
            params.len()
        )));
    }
    for (p, saved) in params.iter_mut().zip(&state.tensors) {
        if p.shape() != saved.shape.as_slice() {
            return Err(CheckpointError::Mismatch(format!(
                "{}: expected shape {:?}, found {:?}",
                saved.name,
                p.shape(),
                saved.shape
            )));
        }
        if p.data().len() != saved.data.len() {
            return Err(CheckpointError::Mismatch(format!(
                "{}: shape {:?} needs {} values, found {}",
                saved.name,
                saved.shape,
                p.data().len(),
                saved.data.len()
            )));
        }
        p.data_mut().copy_from_slice(&saved.data);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FmModel;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn batch() -> Batch {
        Batch {
            fields: vec![0, 1, 2, 1, 0, 0],
            num_fields: 3,
            dense: vec![1.0, 2.0, 3.0, 4.0],
            dense_dim: 2,
            targets: None,
        }
    }

    #[test]
    fn test_batch_helpers() {
        let b = batch();
        assert_eq!(leading_fields(&b, 2), vec![0, 1, 1, 0]);
        assert_eq!(dense_input(&b).unwrap().shape(), &[2, 2]);

        let wide = Tensor::from_data(&[2, 2], vec![1.0, 2.0, 3.0, 4.0]);
        let col = Tensor::from_data(&[2, 1], vec![10.0, 20.0]);
        assert_eq!(add_column(&wide, &col).data(), &[11.0, 12.0, 23.0, 24.0]);
        assert_eq!(row_sums(&wide).data(), &[3.0, 7.0]);
    }

    #[test]
    fn test_state_round_trip() {
        let mut rng = StdRng::seed_from_u64(0);
        let a = FmModel::new(&[2, 2, 3], 4, 1, &mut rng).unwrap();
        let mut b = FmModel::new(&[2, 2, 3], 4, 1, &mut rng).unwrap();
        let state = export_state(&a, 3);
        assert_eq!(state.fold, 3);
        load_state(&mut b, &state).unwrap();
        let x = batch();
        assert_eq!(a.forward(&x).unwrap(), b.forward(&x).unwrap());
    }

    #[test]
    fn test_state_shape_mismatch() {
        let mut rng = StdRng::seed_from_u64(0);
        let a = FmModel::new(&[2, 2, 3], 4, 1, &mut rng).unwrap();
        let mut b = FmModel::new(&[2, 2, 3], 8, 1, &mut rng).unwrap();
        assert!(matches!(
            load_state(&mut b, &export_state(&a, 0)),
            Err(CheckpointError::Mismatch(_))
        ));
    }

    #[test]
    fn test_state_truncated_data() {
        let mut rng = StdRng::seed_from_u64(0);
        let a = FmModel::new(&[2, 2, 3], 4, 1, &mut rng).unwrap();
        let mut b = FmModel::new(&[2, 2, 3], 4, 1, &mut rng).unwrap();
        let mut state = export_state(&a, 0);
        state.tensors[0].data.pop();
        let err = load_state(&mut b, &state).unwrap_err();
        assert!(matches!(err, CheckpointError::Mismatch(ref msg) if msg.contains("found")));
    }
}
