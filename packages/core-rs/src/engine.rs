//! The capability contract every backend implements, and the factorization
//! values they hand back.
//!
//! In-place work is expressed through ownership: the `*_in_place` methods
//! consume their matrix argument and factor inside its storage, the
//! borrowing variants clone first.

use crate::computed::{lu as lu_kernel, qr as qr_kernel};
use crate::error::{Error, Result};
use crate::matrix::{Matrix, TransposeType};
use crate::pinv::PInvSvd;

pub trait Engine {
    fn name(&self) -> &'static str;

    /// `alpha * op(a) * op(b) + beta * c`. Without `c` the result starts
    /// from zero and `beta` is ignored.
    #[allow(clippy::too_many_arguments)]
    fn multiply(
        &self,
        trans_a: TransposeType,
        alpha: f64,
        a: &Matrix,
        trans_b: TransposeType,
        b: &Matrix,
        beta: f64,
        c: Option<&Matrix>,
    ) -> Result<Matrix>;

    fn decompose_lu_in_place(&self, a: Matrix) -> Result<LuDecomposition>;

    /// Householder QR, requires `rows >= cols`.
    fn decompose_qr_in_place(&self, a: Matrix) -> Result<QrDecomposition>;

    fn decompose_svd_in_place(&self, a: Matrix) -> Result<SvdDecomposition>;

    /// `None` when `a` is not square or is singular.
    fn invert_in_place(&self, a: Matrix) -> Result<Option<Matrix>>;

    /// Solves `op(a) * x = b`. `None` when the factorization is singular.
    fn solve_lu_in_place(
        &self,
        a: Matrix,
        b: &Matrix,
        trans: TransposeType,
    ) -> Result<Option<Matrix>>;

    /// Least squares solution of `a * x = op(b)`, where `Transpose` means
    /// the caller passed the right-hand side transposed.
    fn solve_qr_in_place(&self, a: Matrix, b: &Matrix, trans_b: TransposeType) -> Result<Matrix>;

    fn decompose_lu(&self, a: &Matrix) -> Result<LuDecomposition> {
        self.decompose_lu_in_place(a.clone())
    }

    fn decompose_qr(&self, a: &Matrix) -> Result<QrDecomposition> {
        self.decompose_qr_in_place(a.clone())
    }

    fn decompose_svd(&self, a: &Matrix) -> Result<SvdDecomposition> {
        self.decompose_svd_in_place(a.clone())
    }

    fn invert(&self, a: &Matrix) -> Result<Option<Matrix>> {
        self.invert_in_place(a.clone())
    }

    fn solve_lu(&self, a: &Matrix, b: &Matrix, trans: TransposeType) -> Result<Option<Matrix>> {
        self.solve_lu_in_place(a.clone(), b, trans)
    }

    fn solve_qr(&self, a: &Matrix, b: &Matrix, trans_b: TransposeType) -> Result<Matrix> {
        self.solve_qr_in_place(a.clone(), b, trans_b)
    }

    fn pinv_in_place(&self, a: Matrix) -> Result<Matrix> {
        Ok(PInvSvd::factor_in_place(self, a)?.into_pinv())
    }

    fn pinv(&self, a: &Matrix) -> Result<Matrix> {
        self.pinv_in_place(a.clone())
    }
}

impl Matrix {
    /// `a * b` on the given engine.
    pub fn multiply<E: Engine + ?Sized>(engine: &E, a: &Matrix, b: &Matrix) -> Result<Matrix> {
        engine.multiply(
            TransposeType::NoTranspose,
            1.0,
            a,
            TransposeType::NoTranspose,
            b,
            0.0,
            None,
        )
    }
}

pub(crate) fn op_shape(matrix: &Matrix, trans: TransposeType) -> (usize, usize) {
    if trans.is_transpose() {
        (matrix.cols(), matrix.rows())
    } else {
        (matrix.rows(), matrix.cols())
    }
}

/// Validates a GEMM call and returns `(m, n, k)`.
pub(crate) fn multiply_shape(
    trans_a: TransposeType,
    a: &Matrix,
    trans_b: TransposeType,
    b: &Matrix,
    c: Option<&Matrix>,
) -> Result<(usize, usize, usize)> {
    let (m, k) = op_shape(a, trans_a);
    let (kb, n) = op_shape(b, trans_b);
    if k != kb {
        return Err(Error::dimension_mismatch("multiply", (m, k), (kb, n)));
    }
    if let Some(c) = c {
        if c.shape() != (m, n) {
            return Err(Error::dimension_mismatch("multiply", (m, n), c.shape()));
        }
    }
    Ok((m, n, k))
}

/// Right-hand side of a QR solve in natural orientation.
pub(crate) fn qr_rhs(a: &Matrix, b: &Matrix, trans_b: TransposeType) -> Result<Matrix> {
    let rhs = if trans_b.is_transpose() {
        b.transpose()
    } else {
        b.clone()
    };
    if rhs.rows() != a.rows() {
        return Err(Error::dimension_mismatch(
            "solve_qr",
            (a.rows(), rhs.cols()),
            rhs.shape(),
        ));
    }
    Ok(rhs)
}

pub(crate) fn check_lu_solve(a: &Matrix, b: &Matrix) -> Result<()> {
    if !a.is_square() {
        return Err(Error::dimension_mismatch(
            "solve_lu",
            (a.rows(), a.rows()),
            a.shape(),
        ));
    }
    if b.rows() != a.rows() {
        return Err(Error::dimension_mismatch(
            "solve_lu",
            (a.rows(), b.cols()),
            b.shape(),
        ));
    }
    Ok(())
}

pub(crate) fn check_tall(op: &'static str, a: &Matrix) -> Result<()> {
    if a.rows() < a.cols() {
        return Err(Error::dimension_mismatch(
            op,
            (a.cols(), a.cols()),
            a.shape(),
        ));
    }
    Ok(())
}

/// LU factors with partial pivoting, `P * A = L * U`, packed in one matrix:
/// unit lower triangle below the diagonal, `U` on and above it.
#[derive(Clone, Debug)]
pub struct LuDecomposition {
    lu: Matrix,
    pivot: Vec<usize>,
    singular: bool,
}

impl LuDecomposition {
    pub(crate) fn new(lu: Matrix, pivot: Vec<usize>, singular: bool) -> Self {
        LuDecomposition {
            lu,
            pivot,
            singular,
        }
    }

    pub fn packed(&self) -> &Matrix {
        &self.lu
    }

    /// Row interchanges in the order they were applied: row `i` was swapped
    /// with row `pivot[i]`. One entry per row up to `min(rows, cols)`.
    pub fn pivot(&self) -> &[usize] {
        &self.pivot
    }

    /// `perm[i]` is the original row that ended up at position `i`.
    pub fn permutation_vector(&self) -> Vec<usize> {
        let mut perm: Vec<usize> = (0..self.lu.rows()).collect();
        for (i, &p) in self.pivot.iter().enumerate() {
            perm.swap(i, p);
        }
        perm
    }

    pub fn is_singular(&self) -> bool {
        self.singular
    }

    pub fn l(&self) -> Matrix {
        let (m, n) = self.lu.shape();
        let k = m.min(n);
        let mut l = Matrix::zeros(m, k);
        for c in 0..k {
            l.set(c, c, 1.0);
            for r in (c + 1)..m {
                l.set(r, c, self.lu.get(r, c));
            }
        }
        l
    }

    pub fn u(&self) -> Matrix {
        let (m, n) = self.lu.shape();
        let k = m.min(n);
        let mut u = Matrix::zeros(k, n);
        for c in 0..n {
            for r in 0..k.min(c + 1) {
                u.set(r, c, self.lu.get(r, c));
            }
        }
        u
    }

    pub fn determinant(&self) -> Result<f64> {
        if !self.lu.is_square() {
            return Err(Error::dimension_mismatch(
                "determinant",
                (self.lu.rows(), self.lu.rows()),
                self.lu.shape(),
            ));
        }
        let swaps = self
            .pivot
            .iter()
            .enumerate()
            .filter(|&(i, &p)| i != p)
            .count();
        let sign = if swaps % 2 == 0 { 1.0 } else { -1.0 };
        Ok(self.lu.diagonal().iter().fold(sign, |acc, d| acc * d))
    }

    /// Solves `op(A) * X = B` by substitution against the packed factors.
    pub fn solve(&self, b: &Matrix, trans: TransposeType) -> Result<Matrix> {
        check_lu_solve(&self.lu, b)?;
        if self.singular {
            return Err(Error::SingularMatrix { op: "solve_lu" });
        }
        Ok(lu_kernel::substitute(&self.lu, &self.pivot, b, trans))
    }
}

#[derive(Clone, Debug)]
enum QrFactors {
    /// Householder vectors below and on the diagonal, strict upper triangle
    /// of `R` above it, diagonal of `R` kept apart.
    Householder { packed: Matrix, r_diag: Vec<f64> },
    /// Reflector scalars plus the explicitly formed factors.
    Explicit { q: Matrix, r: Matrix, tau: Vec<f64> },
}

/// `A = Q * R` for `rows >= cols`, economy sized: `Q` is `m x n`, `R` is
/// `n x n`.
#[derive(Clone, Debug)]
pub struct QrDecomposition {
    factors: QrFactors,
}

impl QrDecomposition {
    pub(crate) fn from_householder(packed: Matrix, r_diag: Vec<f64>) -> Self {
        QrDecomposition {
            factors: QrFactors::Householder { packed, r_diag },
        }
    }

    pub(crate) fn explicit(q: Matrix, r: Matrix, tau: Vec<f64>) -> Self {
        QrDecomposition {
            factors: QrFactors::Explicit { q, r, tau },
        }
    }

    pub fn q(&self) -> Matrix {
        match &self.factors {
            QrFactors::Householder { packed, .. } => qr_kernel::form_q(packed),
            QrFactors::Explicit { q, .. } => q.clone(),
        }
    }

    pub fn r(&self) -> Matrix {
        match &self.factors {
            QrFactors::Householder { packed, r_diag } => qr_kernel::form_r(packed, r_diag),
            QrFactors::Explicit { r, .. } => r.clone(),
        }
    }

    /// Householder vectors as the columns of an `m x n` lower trapezoid.
    /// `None` for native factors, where `dorgqr` has already consumed them.
    pub fn householder(&self) -> Option<Matrix> {
        match &self.factors {
            QrFactors::Householder { packed, .. } => Some(qr_kernel::form_h(packed)),
            QrFactors::Explicit { .. } => None,
        }
    }

    /// Reflector scale factors; empty for factors produced by the computed
    /// backend.
    pub fn tau(&self) -> &[f64] {
        match &self.factors {
            QrFactors::Householder { .. } => &[],
            QrFactors::Explicit { tau, .. } => tau,
        }
    }

    pub fn r_diagonal(&self) -> Vec<f64> {
        match &self.factors {
            QrFactors::Householder { r_diag, .. } => r_diag.clone(),
            QrFactors::Explicit { r, .. } => r.diagonal(),
        }
    }

    pub fn is_full_rank(&self) -> bool {
        self.r_diagonal().iter().all(|&d| d != 0.0)
    }

    /// Least squares solution of `A * X = B`.
    pub fn solve(&self, b: &Matrix) -> Result<Matrix> {
        match &self.factors {
            QrFactors::Householder { packed, r_diag } => qr_kernel::solve(packed, r_diag, b),
            QrFactors::Explicit { q, r, .. } => {
                if b.rows() != q.rows() {
                    return Err(Error::dimension_mismatch(
                        "solve_qr",
                        (q.rows(), b.cols()),
                        b.shape(),
                    ));
                }
                if !self.is_full_rank() {
                    return Err(Error::RankDeficient { op: "solve_qr" });
                }
                let qt_b = crate::computed::multiply::gemm(
                    TransposeType::Transpose,
                    1.0,
                    q,
                    TransposeType::NoTranspose,
                    b,
                    0.0,
                    None,
                )?;
                Ok(qr_kernel::back_substitute(r, qt_b))
            }
        }
    }
}

/// Economy SVD, `A = U * diag(S) * Vt` with `k = min(m, n)`: `U` is `m x k`,
/// `S` has `k` non-negative values sorted descending, `Vt` is `k x n`.
#[derive(Clone, Debug)]
pub struct SvdDecomposition {
    pub u: Matrix,
    pub s: Vec<f64>,
    pub vt: Matrix,
}

impl SvdDecomposition {
    pub fn rows(&self) -> usize {
        self.u.rows()
    }

    pub fn cols(&self) -> usize {
        self.vt.cols()
    }

    pub fn max_singular_value(&self) -> f64 {
        self.s.first().copied().unwrap_or(0.0)
    }

    pub fn rank(&self, tol: f64) -> usize {
        self.s.iter().filter(|&&s| s > tol).count()
    }

    /// `s_max / s_min`, infinite when the smallest value is zero.
    pub fn condition_number(&self) -> f64 {
        match (self.s.first(), self.s.last()) {
            (Some(&max), Some(&min)) if min > 0.0 => max / min,
            (Some(_), Some(_)) => f64::INFINITY,
            _ => 0.0,
        }
    }

    pub fn reconstruct(&self) -> Matrix {
        let (m, n) = (self.u.rows(), self.vt.cols());
        let mut out = Matrix::zeros(m, n);
        for (k, &sigma) in self.s.iter().enumerate() {
            for c in 0..n {
                let scale = sigma * self.vt.get(k, c);
                if scale == 0.0 {
                    continue;
                }
                for r in 0..m {
                    out.add(r, c, self.u.get(r, k) * scale);
                }
            }
        }
        out
    }
}
