//! Row-major `f32` buffers shaped as vectors or `[rows, cols]` batches.
//!
//! Every model input is a batch of encoded (user, book) rows, so almost
//! everything here works on 2D tensors: embedding lookups gather rows out
//! of a table, interaction layers multiply and sum across columns, and the
//! heads reduce a batch to one column of scores.

use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    shape: Vec<usize>,
    data: Vec<f32>,
}

fn volume(shape: &[usize]) -> usize {
    shape.iter().product()
}

impl Tensor {
    /// Builds a tensor whose `i`-th element is `value(i)`.
    fn filled(shape: &[usize], value: impl FnMut(usize) -> f32) -> Self {
        Self {
            shape: shape.to_vec(),
            data: (0..volume(shape)).map(value).collect(),
        }
    }

    /// ```
    /// use bookrec_layers::tensor::Tensor;
    ///
    /// let scores = Tensor::zeros(&[4, 1]);
    /// assert_eq!((scores.rows(), scores.cols()), (4, 1));
    /// ```
    pub fn zeros(shape: &[usize]) -> Self {
        Self::filled(shape, |_| 0.0)
    }

    pub fn ones(shape: &[usize]) -> Self {
        Self::filled(shape, |_| 1.0)
    }

    /// Wraps `data` as a tensor of `shape`.
    ///
    /// # Panics
    ///
    /// If `data.len()` is not the product of `shape`.
    pub fn from_data(shape: &[usize], data: Vec<f32>) -> Self {
        assert!(
            data.len() == volume(shape),
            "{} values cannot fill shape {:?}",
            data.len(),
            shape
        );
        Self {
            shape: shape.to_vec(),
            data,
        }
    }

    /// Samples from `U[low, high)`.
    pub fn uniform(shape: &[usize], low: f32, high: f32, rng: &mut StdRng) -> Self {
        Self::filled(shape, |_| rng.gen_range(low..high))
    }

    /// Samples from `N(mean, std^2)`; a `std` of zero or less gives a
    /// tensor of `mean`.
    pub fn randn(shape: &[usize], mean: f32, std: f32, rng: &mut StdRng) -> Self {
        match Normal::new(mean, std) {
            Ok(normal) if std > 0.0 => Self::filled(shape, |_| normal.sample(rng)),
            _ => Self::filled(shape, |_| mean),
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn numel(&self) -> usize {
        self.data.len()
    }

    /// Batch size: the leading dimension, or 0 for a scalar shape.
    pub fn rows(&self) -> usize {
        self.shape.first().copied().unwrap_or(0)
    }

    /// Width of one row; trailing dimensions are flattened and a vector
    /// counts as one column.
    pub fn cols(&self) -> usize {
        match self.shape.as_slice() {
            [] | [_] => 1,
            [_, rest @ ..] => volume(rest),
        }
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<f32> {
        self.data
    }

    pub fn row(&self, i: usize) -> &[f32] {
        let width = self.cols();
        &self.data[i * width..(i + 1) * width]
    }

    pub fn fill_zero(&mut self) {
        self.data.fill(0.0);
    }

    /// Copies table rows into a batch. Every `group` consecutive entries of
    /// `rows` become one output row, so `[batch * fields]` lookups into a
    /// `[n, d]` table give a `[batch, fields * d]` tensor.
    ///
    /// ```
    /// use bookrec_layers::tensor::Tensor;
    ///
    /// let table = Tensor::from_data(&[3, 2], vec![0.0, 0.5, 1.0, 1.5, 2.0, 2.5]);
    /// let batch = table.gather_rows(&[2, 0, 1, 1], 2);
    /// assert_eq!(batch.shape(), &[2, 4]);
    /// assert_eq!(batch.row(0), &[2.0, 2.5, 0.0, 0.5]);
    /// ```
    pub fn gather_rows(&self, rows: &[usize], group: usize) -> Tensor {
        let group = group.max(1);
        let width = self.cols();
        let mut data = Vec::with_capacity(rows.len() * width);
        for &r in rows {
            data.extend_from_slice(self.row(r));
        }
        Tensor::from_data(&[rows.len() / group, group * width], data)
    }

    /// Adds consecutive `cols()`-wide chunks of `updates` into the listed
    /// rows; the inverse of [`Tensor::gather_rows`] for gradients. A row
    /// listed twice accumulates both chunks.
    pub fn scatter_add_rows(&mut self, rows: &[usize], updates: &[f32]) {
        let width = self.cols();
        for (&r, chunk) in rows.iter().zip(updates.chunks(width)) {
            let target = &mut self.data[r * width..(r + 1) * width];
            for (t, u) in target.iter_mut().zip(chunk) {
                *t += u;
            }
        }
    }

    /// `[m, k] x [k, n] -> [m, n]`.
    ///
    /// # Panics
    ///
    /// If either side is not 2D or the inner dimensions differ.
    pub fn matmul(&self, other: &Tensor) -> Tensor {
        let (m, k) = self.dims2("matmul");
        let (k2, n) = other.dims2("matmul");
        assert!(k == k2, "matmul of {:?} by {:?}", self.shape, other.shape);

        let mut out = vec![0.0; m * n];
        for (lhs, acc) in self.data.chunks(k.max(1)).zip(out.chunks_mut(n.max(1))) {
            for (&a, rhs) in lhs.iter().zip(other.data.chunks(n.max(1))) {
                if a != 0.0 {
                    acc.iter_mut().zip(rhs).for_each(|(o, &b)| *o += a * b);
                }
            }
        }
        Tensor::from_data(&[m, n], out)
    }

    pub fn transpose(&self) -> Tensor {
        let (m, n) = self.dims2("transpose");
        let mut out = Tensor::zeros(&[n, m]);
        for (i, row) in self.data.chunks(n.max(1)).enumerate() {
            for (j, &v) in row.iter().enumerate() {
                out.data[j * m + i] = v;
            }
        }
        out
    }

    /// Sum with broadcasting of a single value or of a bias vector across
    /// every row of a batch.
    ///
    /// # Panics
    ///
    /// For any other pair of shapes.
    pub fn add(&self, other: &Tensor) -> Tensor {
        if self.shape == other.shape {
            return self.zip_with(other, |a, b| a + b);
        }
        if other.numel() == 1 {
            let value = other.data[0];
            return self.map(|a| a + value);
        }
        let is_bias = self.ndim() == 2 && other.ndim() == 1 && other.numel() == self.cols();
        assert!(is_bias, "cannot add {:?} to {:?}", other.shape, self.shape);
        let mut out = self.clone();
        for row in out.data.chunks_mut(other.numel().max(1)) {
            row.iter_mut().zip(&other.data).for_each(|(a, b)| *a += b);
        }
        out
    }

    pub fn sub(&self, other: &Tensor) -> Tensor {
        assert!(
            self.shape == other.shape,
            "cannot subtract {:?} from {:?}",
            other.shape,
            self.shape
        );
        self.zip_with(other, |a, b| a - b)
    }

    /// Element-wise product; `other` may also be a single value.
    pub fn mul(&self, other: &Tensor) -> Tensor {
        if self.shape != other.shape && other.numel() == 1 {
            return self.scale(other.data[0]);
        }
        assert!(
            self.shape == other.shape,
            "cannot multiply {:?} by {:?}",
            self.shape,
            other.shape
        );
        self.zip_with(other, |a, b| a * b)
    }

    pub fn scale(&self, factor: f32) -> Tensor {
        self.map(|a| a * factor)
    }

    pub fn sum(&self) -> f32 {
        self.data.iter().sum()
    }

    /// Column totals (`axis == 0`, shape `[cols]`) or row totals
    /// (`axis == 1`, shape `[rows]`) of a 2D tensor.
    pub fn sum_axis(&self, axis: usize) -> Tensor {
        let (m, n) = self.dims2("sum_axis");
        let rows = self.data.chunks(n.max(1));
        match axis {
            0 => {
                let mut totals = vec![0.0; n];
                for row in rows {
                    totals.iter_mut().zip(row).for_each(|(t, v)| *t += v);
                }
                Tensor::from_data(&[n], totals)
            }
            1 => Tensor::from_data(&[m], rows.map(|row| row.iter().sum()).collect()),
            _ => panic!("sum_axis({axis}) on a 2D tensor"),
        }
    }

    pub fn map(&self, f: impl Fn(f32) -> f32) -> Tensor {
        Tensor {
            shape: self.shape.clone(),
            data: self.data.iter().map(|&x| f(x)).collect(),
        }
    }

    /// Same values under a new shape of equal volume.
    pub fn reshape(&self, shape: &[usize]) -> Tensor {
        Tensor::from_data(shape, self.data.clone())
    }

    /// Joins batches side by side: `[b, n1] ++ [b, n2] -> [b, n1 + n2]`.
    pub fn concat_cols(parts: &[&Tensor]) -> Tensor {
        let rows = parts.first().map_or(0, |t| t.rows());
        assert!(
            parts.iter().all(|t| t.rows() == rows),
            "concat_cols over different batch sizes"
        );
        let width: usize = parts.iter().map(|t| t.cols()).sum();
        let mut data = Vec::with_capacity(rows * width);
        for i in 0..rows {
            parts.iter().for_each(|t| data.extend_from_slice(t.row(i)));
        }
        Tensor::from_data(&[rows, width], data)
    }

    /// Cuts a batch into column blocks; `widths` must add up to `cols()`.
    pub fn split_cols(&self, widths: &[usize]) -> Vec<Tensor> {
        assert!(
            widths.iter().sum::<usize>() == self.cols(),
            "widths {widths:?} do not cover {} columns",
            self.cols()
        );
        let mut start = 0;
        widths
            .iter()
            .map(|&w| {
                let data = (0..self.rows())
                    .flat_map(|i| self.row(i)[start..start + w].iter().copied())
                    .collect();
                start += w;
                Tensor::from_data(&[self.rows(), w], data)
            })
            .collect()
    }

    /// Class probabilities per row, shifted by the row maximum for
    /// stability.
    pub fn softmax_rows(&self) -> Tensor {
        let mut out = self.clone();
        for row in out.data.chunks_mut(self.cols().max(1)) {
            let top = row.iter().fold(f32::NEG_INFINITY, |m, &x| m.max(x));
            row.iter_mut().for_each(|x| *x = (*x - top).exp());
            let total: f32 = row.iter().sum();
            row.iter_mut().for_each(|x| *x /= total);
        }
        out
    }

    /// Predicted class per row; ties go to the lowest index.
    pub fn argmax_rows(&self) -> Vec<usize> {
        (0..self.rows())
            .map(|i| {
                self.row(i)
                    .iter()
                    .enumerate()
                    .fold((0, f32::NEG_INFINITY), |(best, top), (j, &x)| {
                        if x > top {
                            (j, x)
                        } else {
                            (best, top)
                        }
                    })
                    .0
            })
            .collect()
    }

    fn zip_with(&self, other: &Tensor, f: impl Fn(f32, f32) -> f32) -> Tensor {
        Tensor {
            shape: self.shape.clone(),
            data: self.data.iter().zip(&other.data).map(|(&a, &b)| f(a, b)).collect(),
        }
    }

    fn dims2(&self, op: &str) -> (usize, usize) {
        match self.shape[..] {
            [m, n] => (m, n),
            _ => panic!("{op} needs a 2D tensor, got {:?}", self.shape),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn batch() -> Tensor {
        Tensor::from_data(&[2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0])
    }

    #[test]
    fn test_constructors_and_dims() {
        let t = Tensor::ones(&[3, 2]);
        assert_eq!((t.rows(), t.cols(), t.numel()), (3, 2, 6));
        assert_eq!(t.sum(), 6.0);
        assert_eq!(Tensor::zeros(&[5]).cols(), 1);
        assert_eq!(Tensor::zeros(&[2, 3, 4]).cols(), 12);
    }

    #[test]
    #[should_panic(expected = "cannot fill shape")]
    fn test_from_data_checks_volume() {
        Tensor::from_data(&[2, 2], vec![1.0; 3]);
    }

    #[test]
    fn test_gather_and_scatter_rows() {
        let table = Tensor::from_data(&[3, 2], vec![0.0, 0.1, 1.0, 1.1, 2.0, 2.1]);
        let looked_up = table.gather_rows(&[1, 2, 1, 0], 2);
        assert_eq!(looked_up.shape(), &[2, 4]);
        assert_eq!(looked_up.data(), &[1.0, 1.1, 2.0, 2.1, 1.0, 1.1, 0.0, 0.1]);

        let mut grad = Tensor::zeros(&[3, 2]);
        grad.scatter_add_rows(&[1, 2, 1, 0], &[1.0; 8]);
        assert_eq!(grad.data(), &[1.0, 1.0, 2.0, 2.0, 1.0, 1.0]);
    }

    #[test]
    fn test_matmul_and_transpose() {
        let a = batch();
        let c = a.matmul(&a.transpose());
        assert_eq!(c.shape(), &[2, 2]);
        assert_eq!(c.data(), &[14.0, 32.0, 32.0, 77.0]);
        assert_eq!(a.transpose().data(), &[1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
    }

    #[test]
    fn test_broadcasting() {
        let a = batch();
        let bias = Tensor::from_data(&[3], vec![10.0, 20.0, 30.0]);
        assert_eq!(a.add(&bias).data(), &[11.0, 22.0, 33.0, 14.0, 25.0, 36.0]);
        let one = Tensor::from_data(&[1], vec![2.0]);
        assert_eq!(a.add(&one).row(0), &[3.0, 4.0, 5.0]);
        assert_eq!(a.mul(&one).row(1), &[8.0, 10.0, 12.0]);
        assert_eq!(a.mul(&a).sub(&a).row(0), &[0.0, 2.0, 6.0]);
    }

    #[test]
    fn test_sum_axis() {
        let a = batch();
        assert_eq!(a.sum_axis(0).data(), &[5.0, 7.0, 9.0]);
        assert_eq!(a.sum_axis(1).data(), &[6.0, 15.0]);
    }

    #[test]
    fn test_concat_and_split_cols() {
        let user = Tensor::from_data(&[2, 1], vec![1.0, 2.0]);
        let book = Tensor::from_data(&[2, 2], vec![3.0, 4.0, 5.0, 6.0]);
        let joined = Tensor::concat_cols(&[&user, &book]);
        assert_eq!(joined.data(), &[1.0, 3.0, 4.0, 2.0, 5.0, 6.0]);
        assert_eq!(joined.split_cols(&[1, 2]), vec![user, book]);
    }

    #[test]
    fn test_softmax_and_argmax() {
        let logits = Tensor::from_data(&[3, 3], vec![1.0, 3.0, 2.0, 0.0, 0.0, 5.0, 4.0, 4.0, 1.0]);
        let probs = logits.softmax_rows();
        for i in 0..3 {
            assert!((probs.row(i).iter().sum::<f32>() - 1.0).abs() < 1e-6);
        }
        assert_eq!(logits.argmax_rows(), vec![1, 2, 0]);
    }

    #[test]
    fn test_seeded_sampling_is_reproducible() {
        let draw = |seed| Tensor::randn(&[4, 4], 0.0, 1.0, &mut StdRng::seed_from_u64(seed));
        assert_eq!(draw(7), draw(7));
        assert_ne!(draw(7), draw(8));
        let flat = Tensor::randn(&[2], 0.5, 0.0, &mut StdRng::seed_from_u64(0));
        assert_eq!(flat.data(), &[0.5, 0.5]);
    }
}
