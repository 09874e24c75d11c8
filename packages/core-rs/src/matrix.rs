use crate::error::{Error, Result};
use ndarray::{ArrayView2, ArrayViewMut2, ShapeBuilder};
use rand::Rng;

/// Both dimensions must exceed this before the tiled transpose is used.
pub const BLOCK_TRANSPOSE_MIN_DIM: usize = 375;
/// Tile width of the blocked transpose.
pub const TRANSPOSE_BLOCK: usize = 60;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransposeType {
    NoTranspose,
    Transpose,
}

impl TransposeType {
    pub fn is_transpose(self) -> bool {
        matches!(self, TransposeType::Transpose)
    }

    /// BLAS/LAPACK character flag.
    pub fn as_flag(self) -> u8 {
        match self {
            TransposeType::NoTranspose => b'N',
            TransposeType::Transpose => b'T',
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransposeAlgorithm {
    /// Swap across the diagonal, square matrices only.
    Square,
    /// Tiled copy for large matrices.
    Block,
    /// Column scan.
    Naive,
}

impl TransposeAlgorithm {
    pub fn select(rows: usize, cols: usize) -> Self {
        if rows == cols {
            TransposeAlgorithm::Square
        } else if rows > BLOCK_TRANSPOSE_MIN_DIM && cols > BLOCK_TRANSPOSE_MIN_DIM {
            TransposeAlgorithm::Block
        } else {
            TransposeAlgorithm::Naive
        }
    }
}

/// Dense column-major matrix of `f64`. Element `(r, c)` lives at
/// `r + c * rows`.
#[derive(Clone, Debug, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Matrix {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    pub fn identity(rows: usize, cols: usize) -> Self {
        let mut matrix = Matrix::zeros(rows, cols);
        for i in 0..rows.min(cols) {
            matrix.set(i, i, 1.0);
        }
        matrix
    }

    /// Uniform values in `[min, max)`.
    pub fn random<R: Rng + ?Sized>(
        rows: usize,
        cols: usize,
        rng: &mut R,
        min: f64,
        max: f64,
    ) -> Self {
        let span = max - min;
        let data = (0..rows * cols)
            .map(|_| min + span * rng.gen::<f64>())
            .collect();
        Matrix { rows, cols, data }
    }

    /// Takes ownership of a caller supplied column-major buffer.
    pub fn from_column_major(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::InvalidShape {
                rows,
                cols,
                len: data.len(),
            });
        }
        Ok(Matrix { rows, cols, data })
    }

    pub fn from_row_major(rows: usize, cols: usize, data: &[f64]) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::InvalidShape {
                rows,
                cols,
                len: data.len(),
            });
        }
        let mut matrix = Matrix::zeros(rows, cols);
        for r in 0..rows {
            for c in 0..cols {
                matrix.set(r, c, data[r * cols + c]);
            }
        }
        Ok(matrix)
    }

    pub fn from_rows(rows: &[&[f64]]) -> Result<Self> {
        let cols = rows.first().map_or(0, |row| row.len());
        let mut matrix = Matrix::zeros(rows.len(), cols);
        for (r, row) in rows.iter().enumerate() {
            if row.len() != cols {
                return Err(Error::dimension_mismatch(
                    "from_rows",
                    (1, cols),
                    (1, row.len()),
                ));
            }
            for (c, &value) in row.iter().enumerate() {
                matrix.set(r, c, value);
            }
        }
        Ok(matrix)
    }

    /// Single column vector.
    pub fn column_vector(values: &[f64]) -> Self {
        Matrix {
            rows: values.len(),
            cols: 1,
            data: values.to_vec(),
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_square(&self) -> bool {
        self.rows == self.cols
    }

    /// Leading dimension of the backing buffer.
    pub fn leading_dimension(&self) -> usize {
        self.rows.max(1)
    }

    #[inline]
    pub fn index_of(&self, row: usize, col: usize) -> usize {
        debug_assert!(row < self.rows && col < self.cols);
        row + col * self.rows
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[self.index_of(row, col)]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        let idx = self.index_of(row, col);
        self.data[idx] = value;
    }

    #[inline]
    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        let idx = self.index_of(row, col);
        self.data[idx] += value;
    }

    #[inline]
    pub fn get_at(&self, index: usize) -> f64 {
        self.data[index]
    }

    #[inline]
    pub fn set_at(&mut self, index: usize, value: f64) {
        self.data[index] = value;
    }

    #[inline]
    pub fn add_at(&mut self, index: usize, value: f64) {
        self.data[index] += value;
    }

    pub fn set_all(&mut self, value: f64) {
        self.data.fill(value);
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.data
    }

    pub fn column(&self, col: usize) -> &[f64] {
        let start = col * self.rows;
        &self.data[start..start + self.rows]
    }

    pub fn column_mut(&mut self, col: usize) -> &mut [f64] {
        let start = col * self.rows;
        &mut self.data[start..start + self.rows]
    }

    pub fn diagonal(&self) -> Vec<f64> {
        (0..self.rows.min(self.cols)).map(|i| self.get(i, i)).collect()
    }

    pub fn to_row_major_vec(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.len());
        for r in 0..self.rows {
            for c in 0..self.cols {
                out.push(self.get(r, c));
            }
        }
        out
    }

    /// Copies the leading `rows x cols` block.
    pub fn submatrix(&self, rows: usize, cols: usize) -> Result<Self> {
        if rows > self.rows || cols > self.cols {
            return Err(Error::dimension_mismatch(
                "submatrix",
                (self.rows, self.cols),
                (rows, cols),
            ));
        }
        let mut out = Matrix::zeros(rows, cols);
        for c in 0..cols {
            out.column_mut(c).copy_from_slice(&self.column(c)[..rows]);
        }
        Ok(out)
    }

    pub(crate) fn view(&self) -> Result<ArrayView2<'_, f64>> {
        ArrayView2::from_shape((self.rows, self.cols).f(), &self.data).map_err(|_| {
            Error::InvalidShape {
                rows: self.rows,
                cols: self.cols,
                len: self.data.len(),
            }
        })
    }

    pub(crate) fn view_mut(&mut self) -> Result<ArrayViewMut2<'_, f64>> {
        let (rows, cols, len) = (self.rows, self.cols, self.data.len());
        ArrayViewMut2::from_shape((rows, cols).f(), &mut self.data)
            .map_err(|_| Error::InvalidShape { rows, cols, len })
    }

    /// Multiplies every element by `alpha`. Zero overwrites in one pass so
    /// NaN or infinite entries do not survive.
    pub fn scale(&mut self, alpha: f64) {
        if alpha == 0.0 {
            self.data.fill(0.0);
            return;
        }
        for value in &mut self.data {
            *value *= alpha;
        }
    }

    pub fn scaled(&self, alpha: f64) -> Self {
        let mut out = self.clone();
        out.scale(alpha);
        out
    }

    pub fn transpose(&self) -> Self {
        self.transpose_using(TransposeAlgorithm::select(self.rows, self.cols))
    }

    /// Transposes with an explicit algorithm. `Square` falls back to the
    /// naive scan when the matrix is not square.
    pub fn transpose_using(&self, algorithm: TransposeAlgorithm) -> Self {
        match algorithm {
            TransposeAlgorithm::Square if self.is_square() => {
                let mut out = self.clone();
                out.transpose_square_in_place();
                out
            }
            TransposeAlgorithm::Block => self.transpose_block(),
            _ => self.transpose_naive(),
        }
    }

    pub fn transpose_in_place(&mut self) {
        if self.is_square() {
            self.transpose_square_in_place();
        } else {
            *self = self.transpose();
        }
    }

    fn transpose_square_in_place(&mut self) {
        let n = self.rows;
        for c in 0..n {
            for r in (c + 1)..n {
                self.data.swap(r + c * n, c + r * n);
            }
        }
    }

    fn transpose_block(&self) -> Self {
        let (rows, cols) = (self.rows, self.cols);
        let mut out = Matrix::zeros(cols, rows);
        for col_block in (0..cols).step_by(TRANSPOSE_BLOCK) {
            let col_end = (col_block + TRANSPOSE_BLOCK).min(cols);
            for row_block in (0..rows).step_by(TRANSPOSE_BLOCK) {
                let row_end = (row_block + TRANSPOSE_BLOCK).min(rows);
                for c in col_block..col_end {
                    for r in row_block..row_end {
                        out.data[c + r * cols] = self.data[r + c * rows];
                    }
                }
            }
        }
        out
    }

    fn transpose_naive(&self) -> Self {
        let (rows, cols) = (self.rows, self.cols);
        let mut out = Matrix::zeros(cols, rows);
        for c in 0..cols {
            for r in 0..rows {
                out.data[c + r * cols] = self.data[r + c * rows];
            }
        }
        out
    }

    /// Element-wise `|a - b| <= eps`; shapes must agree.
    pub fn approx_eq(&self, other: &Matrix, eps: f64) -> bool {
        if self.shape() != other.shape() {
            return false;
        }
        self.data
            .iter()
            .zip(other.data.iter())
            .all(|(a, b)| (a - b).abs() <= eps)
    }

    /// Largest absolute element-wise difference, `None` on shape mismatch.
    pub fn max_abs_diff(&self, other: &Matrix) -> Option<f64> {
        if self.shape() != other.shape() {
            return None;
        }
        Some(
            self.data
                .iter()
                .zip(other.data.iter())
                .fold(0.0f64, |acc, (a, b)| acc.max((a - b).abs())),
        )
    }
}
