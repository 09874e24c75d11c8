use crate::engine::QrDecomposition;
use crate::error::{Error, Result};
use crate::matrix::Matrix;

/// Householder QR for `rows >= cols`. Reflector `k` lives in column `k` on
/// and below the diagonal, `R`'s strict upper triangle above it.
pub(crate) fn factor(mut a: Matrix) -> QrDecomposition {
    let (m, n) = a.shape();
    debug_assert!(m >= n, "householder qr needs rows >= cols");
    let mut r_diag = vec![0.0; n];

    for k in 0..n {
        let mut nrm = 0.0f64;
        for i in k..m {
            nrm = nrm.hypot(a.get(i, k));
        }

        if nrm != 0.0 {
            if a.get(k, k) < 0.0 {
                nrm = -nrm;
            }
            for i in k..m {
                a.set(i, k, a.get(i, k) / nrm);
            }
            a.add(k, k, 1.0);

            for j in (k + 1)..n {
                let s = -reflect_dot(&a, k, &a, j, k) / a.get(k, k);
                for i in k..m {
                    a.add(i, j, s * a.get(i, k));
                }
            }
        }
        r_diag[k] = -nrm;
    }

    QrDecomposition::from_householder(a, r_diag)
}

/// Dot product of column `va` of `v` with column `xa` of `x`, rows `from..`.
fn reflect_dot(v: &Matrix, va: usize, x: &Matrix, xa: usize, from: usize) -> f64 {
    v.column(va)[from..]
        .iter()
        .zip(&x.column(xa)[from..])
        .map(|(a, b)| a * b)
        .sum()
}

/// Explicit economy `Q` (`m x n`) accumulated from the stored reflectors.
pub(crate) fn form_q(packed: &Matrix) -> Matrix {
    let (m, n) = packed.shape();
    let mut q = Matrix::zeros(m, n);
    for k in (0..n).rev() {
        q.set(k, k, 1.0);
        let pivot = packed.get(k, k);
        if pivot == 0.0 {
            continue;
        }
        for j in k..n {
            let s = -reflect_dot(packed, k, &q, j, k) / pivot;
            for i in k..m {
                q.add(i, j, s * packed.get(i, k));
            }
        }
    }
    q
}

pub(crate) fn form_h(packed: &Matrix) -> Matrix {
    let (m, n) = packed.shape();
    let mut h = Matrix::zeros(m, n);
    for c in 0..n {
        h.column_mut(c)[c..].copy_from_slice(&packed.column(c)[c..]);
    }
    h
}

pub(crate) fn form_r(packed: &Matrix, r_diag: &[f64]) -> Matrix {
    let n = packed.cols();
    let mut r = Matrix::zeros(n, n);
    for c in 0..n {
        for row in 0..c {
            r.set(row, c, packed.get(row, c));
        }
        r.set(c, c, r_diag[c]);
    }
    r
}

/// Least squares `A * X = B`: applies `Q^T` to `B` reflector by reflector,
/// then back-substitutes against `R`.
pub(crate) fn solve(packed: &Matrix, r_diag: &[f64], b: &Matrix) -> Result<Matrix> {
    let (m, n) = packed.shape();
    if b.rows() != m {
        return Err(Error::dimension_mismatch("solve_qr", (m, b.cols()), b.shape()));
    }
    if r_diag.iter().any(|&d| d == 0.0) {
        return Err(Error::RankDeficient { op: "solve_qr" });
    }

    let mut x = b.clone();
    for k in 0..n {
        let pivot = packed.get(k, k);
        for j in 0..x.cols() {
            let s = -reflect_dot(packed, k, &x, j, k) / pivot;
            for i in k..m {
                x.add(i, j, s * packed.get(i, k));
            }
        }
    }

    for k in (0..n).rev() {
        for j in 0..x.cols() {
            let v = x.get(k, j) / r_diag[k];
            x.set(k, j, v);
            for i in 0..k {
                x.add(i, j, -v * packed.get(i, k));
            }
        }
    }
    x.submatrix(n, b.cols())
}

/// Solves `R * X = Y[..n]` for upper triangular `R` (`n x n`).
pub(crate) fn back_substitute(r: &Matrix, mut y: Matrix) -> Matrix {
    let n = r.rows();
    let nrhs = y.cols();
    for k in (0..n).rev() {
        for j in 0..nrhs {
            let v = y.get(k, j) / r.get(k, k);
            y.set(k, j, v);
            for i in 0..k {
                y.add(i, j, -v * r.get(i, k));
            }
        }
    }
    if y.rows() == n {
        return y;
    }
    let mut out = Matrix::zeros(n, nrhs);
    for c in 0..nrhs {
        out.column_mut(c).copy_from_slice(&y.column(c)[..n]);
    }
    out
}
