//! Tensor Storage for Dense Layers
//!
//! A minimal row-major `f64` container with the few kernels a fully
//! connected network needs. Weight matrices have shape `[out_dim, in_dim]`,
//! bias vectors and gradients of biases have shape `[out_dim]`.
//!
//! ## Kernels
//!
//! ```text
//! matvec:            y = W · x          [m, k] · [k] -> [m]
//! transpose_matvec:  x = Wᵀ · y         [m, k]ᵀ · [m] -> [k]
//! outer:             G = a ⊗ b          [m] ⊗ [k] -> [m, k]
//! add_scaled:        A += s · B
//! ```
//!
//! ## Performance
//!
//! Matrix-vector products split the output across Rayon workers once the
//! work crosses [`PARALLEL_THRESHOLD`] multiply-adds. Every output element is
//! still accumulated by one thread in a fixed order, so results are
//! bit-identical whether or not the parallel path is taken.

use rayon::prelude::*;

/// Minimum number of multiply-adds before a product is split across threads.
pub const PARALLEL_THRESHOLD: usize = 4_096;

/// Row-major `f64` tensor of rank 1 or 2.
#[derive(Clone, Debug, PartialEq)]
pub struct Tensor {
    /// Flat storage of all elements
    pub data: Vec<f64>,
    /// Dimensions, `[len]` for vectors or `[rows, cols]` for matrices
    pub shape: Vec<usize>,
}

impl Tensor {
    /// Create a new tensor with given data and shape
    ///
    /// # Panics
    ///
    /// Panics if the product of shape dimensions doesn't equal data length.
    /// Use [`Tensor::from_vec`] for untrusted input.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use synapses::Tensor;
    /// let tensor = Tensor::new(vec![1.0, 2.0, 3.0, 4.0], vec![2, 2]);
    /// assert_eq!(tensor.rows(), 2);
    /// ```
    pub fn new(data: Vec<f64>, shape: Vec<usize>) -> Self {
        let expected_size: usize = shape.iter().product();
        assert_eq!(
            data.len(),
            expected_size,
            "Data length ({}) doesn't match shape {:?} (expected {})",
            data.len(),
            shape,
            expected_size
        );
        Self { data, shape }
    }

    /// Checked constructor, returns `None` when data and shape disagree.
    ///
    /// The deserializer builds every weight tensor through this.
    pub fn from_vec(data: Vec<f64>, shape: Vec<usize>) -> Option<Self> {
        let expected_size: usize = shape.iter().product();
        (data.len() == expected_size).then_some(Self { data, shape })
    }

    /// Create a tensor filled with zeros
    pub fn zeros(shape: Vec<usize>) -> Self {
        let size: usize = shape.iter().product();
        Self::new(vec![0.0; size], shape)
    }


    /// Rank-1 tensor wrapping a vector
    pub fn vector(data: Vec<f64>) -> Self {
        let len = data.len();
        Self::new(data, vec![len])
    }

    /// Outer product `a ⊗ b` with shape `[a.len(), b.len()]`
    pub fn outer(a: &[f64], b: &[f64]) -> Self {
        let mut data = Vec::with_capacity(a.len() * b.len());
        for &a_val in a {
            data.extend(b.iter().map(|&b_val| a_val * b_val));
        }
        Self::new(data, vec![a.len(), b.len()])
    }

    /// Number of rows (first dimension)
    pub fn rows(&self) -> usize {
        self.shape.first().copied().unwrap_or(0)
    }

    /// Number of columns; 1 for vectors
    pub fn cols(&self) -> usize {
        self.shape.get(1).copied().unwrap_or(1)
    }

    /// Total number of elements
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Borrow one row of a matrix
    pub fn row(&self, i: usize) -> &[f64] {
        let cols = self.cols();
        &self.data[i * cols..(i + 1) * cols]
    }

    /// Matrix-vector product `self · x`
    ///
    /// # Panics
    ///
    /// Panics if `x.len()` differs from the column count; layers check this
    /// before calling.
    pub fn matvec(&self, x: &[f64]) -> Vec<f64> {
        let (m, k) = (self.rows(), self.cols());
        assert_eq!(k, x.len(), "matvec: [{}, {}] · [{}]", m, k, x.len());

        let dot = |row: &[f64]| -> f64 { row.iter().zip(x).map(|(w, v)| w * v).sum() };

        if m * k >= PARALLEL_THRESHOLD {
            self.data.par_chunks(k).map(dot).collect()
        } else {
            self.data.chunks(k).map(dot).collect()
        }
    }

    /// Transposed matrix-vector product `selfᵀ · y`
    pub fn transpose_matvec(&self, y: &[f64]) -> Vec<f64> {
        let (m, k) = (self.rows(), self.cols());
        assert_eq!(m, y.len(), "transpose_matvec: [{}, {}]ᵀ · [{}]", m, k, y.len());

        let column = |j: usize| -> f64 { (0..m).map(|i| self.data[i * k + j] * y[i]).sum() };

        if m * k >= PARALLEL_THRESHOLD {
            (0..k).into_par_iter().map(column).collect()
        } else {
            (0..k).map(column).collect()
        }
    }

    /// In-place `self += scale * other`
    pub fn add_scaled(&mut self, other: &Tensor, scale: f64) {
        assert_eq!(self.shape, other.shape, "Shapes must match for add_scaled");
        for (a, b) in self.data.iter_mut().zip(&other.data) {
            *a += scale * b;
        }
    }

    /// In-place multiplication by a scalar
    pub fn scale(&mut self, factor: f64) {
        self.data.iter_mut().for_each(|x| *x *= factor);
    }

    /// Sum of squared elements (squared L2 norm)
    pub fn sum_squares(&self) -> f64 {
        self.data.iter().map(|&x| x * x).sum()
    }

    /// `true` when no element is NaN or infinite
    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|x| x.is_finite())
    }
}
