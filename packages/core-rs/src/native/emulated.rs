//! In-crate rendition of the LAPACK routines the native backend needs,
//! with the reference argument checks, pivot conventions and workspace
//! queries. Used whenever no system provider feature is enabled.

use super::ffi::{self, LapackProvider, JOB_ALL, JOB_SMALL, NO_TRANSPOSE, WORKSPACE_QUERY};
use crate::computed::svd;
use crate::matrix::Matrix;
use ndarray::linalg::general_mat_mul;
use ndarray::{ArrayView2, ArrayViewMut2, ShapeBuilder};
use std::ops::Range;

#[derive(Clone, Copy, Debug, Default)]
pub struct EmulatedLapack;

/// Applies `H = I - tau * v * v^T` from the left to columns `cols`, rows
/// `i..m`, where `v = [1; a(i+1.., i)]`.
fn apply_reflector(a: &mut [f64], ld: usize, m: usize, i: usize, cols: Range<usize>, tau: f64) {
    for c in cols {
        let mut w = a[i + c * ld];
        for r in (i + 1)..m {
            w += a[r + i * ld] * a[r + c * ld];
        }
        a[i + c * ld] -= tau * w;
        for r in (i + 1)..m {
            a[r + c * ld] -= tau * w * a[r + i * ld];
        }
    }
}

fn store(dst: &mut [f64], ld: usize, src: &Matrix) {
    for c in 0..src.cols() {
        for r in 0..src.rows() {
            dst[r + c * ld] = src.get(r, c);
        }
    }
}

/// Extends orthonormal columns to a full square orthonormal basis.
fn complete_basis(q: &Matrix) -> Matrix {
    let m = q.rows();
    let mut basis: Vec<Vec<f64>> = (0..q.cols()).map(|c| q.column(c).to_vec()).collect();
    while basis.len() < m {
        let mut best: Option<(f64, Vec<f64>)> = None;
        for e in 0..m {
            let mut v = vec![0.0; m];
            v[e] = 1.0;
            for _ in 0..2 {
                for b in &basis {
                    let d: f64 = b.iter().zip(&v).map(|(x, y)| x * y).sum();
                    for (vi, bi) in v.iter_mut().zip(b) {
                        *vi -= d * bi;
                    }
                }
            }
            let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
            if best.as_ref().map_or(true, |(n, _)| norm > *n) {
                best = Some((norm, v));
            }
        }
        match best {
            Some((norm, v)) if norm > 0.0 => basis.push(v.into_iter().map(|x| x / norm).collect()),
            _ => break,
        }
    }
    let mut out = Matrix::zeros(m, m);
    for (c, column) in basis.iter().enumerate() {
        out.column_mut(c).copy_from_slice(column);
    }
    out
}

impl LapackProvider for EmulatedLapack {
    fn name(&self) -> &'static str {
        "emulated"
    }

    fn dgemm(
        &self,
        trans_a: u8,
        trans_b: u8,
        m: i32,
        n: i32,
        k: i32,
        alpha: f64,
        a: &[f64],
        lda: i32,
        b: &[f64],
        ldb: i32,
        beta: f64,
        c: &mut [f64],
        ldc: i32,
        info: &mut i32,
    ) {
        *info = ffi::check_dgemm(
            trans_a,
            trans_b,
            m,
            n,
            k,
            a.len(),
            lda,
            b.len(),
            ldb,
            c.len(),
            ldc,
        );
        if *info != 0 || m == 0 || n == 0 {
            return;
        }
        let (m, n, k) = (m as usize, n as usize, k as usize);
        let shape_a = if ffi::is_transposed(trans_a) { (k, m) } else { (m, k) };
        let shape_b = if ffi::is_transposed(trans_b) { (n, k) } else { (k, n) };

        let Ok(a_view) = ArrayView2::from_shape(shape_a.strides((1, lda as usize)), a) else {
            *info = -7;
            return;
        };
        let Ok(b_view) = ArrayView2::from_shape(shape_b.strides((1, ldb as usize)), b) else {
            *info = -9;
            return;
        };
        let Ok(mut c_view) = ArrayViewMut2::from_shape((m, n).strides((1, ldc as usize)), c) else {
            *info = -12;
            return;
        };
        let a_op = if ffi::is_transposed(trans_a) {
            a_view.reversed_axes()
        } else {
            a_view
        };
        let b_op = if ffi::is_transposed(trans_b) {
            b_view.reversed_axes()
        } else {
            b_view
        };
        general_mat_mul(alpha, &a_op, &b_op, beta, &mut c_view);
    }

    fn dgetrf(&self, m: i32, n: i32, a: &mut [f64], lda: i32, ipiv: &mut [i32], info: &mut i32) {
        *info = ffi::check_dgetrf(m, n, a.len(), lda, ipiv.len());
        if *info != 0 {
            return;
        }
        let (m, n, ld) = (m as usize, n as usize, lda as usize);

        for j in 0..m.min(n) {
            let mut p = j;
            for i in (j + 1)..m {
                if a[i + j * ld].abs() > a[p + j * ld].abs() {
                    p = i;
                }
            }
            ipiv[j] = p as i32 + 1;

            let pivot = a[p + j * ld];
            if pivot != 0.0 {
                if p != j {
                    for c in 0..n {
                        a.swap(j + c * ld, p + c * ld);
                    }
                }
                for i in (j + 1)..m {
                    a[i + j * ld] /= pivot;
                }
            } else if *info == 0 {
                *info = j as i32 + 1;
            }

            for c in (j + 1)..n {
                let u_jc = a[j + c * ld];
                if u_jc != 0.0 {
                    for i in (j + 1)..m {
                        a[i + c * ld] -= a[i + j * ld] * u_jc;
                    }
                }
            }
        }
    }

    fn dgetrs(
        &self,
        trans: u8,
        n: i32,
        nrhs: i32,
        a: &[f64],
        lda: i32,
        ipiv: &[i32],
        b: &mut [f64],
        ldb: i32,
        info: &mut i32,
    ) {
        *info = ffi::check_dgetrs(trans, n, nrhs, a.len(), lda, ipiv.len(), b.len(), ldb);
        if *info != 0 || n == 0 {
            return;
        }
        let (n, ld, ldb) = (n as usize, lda as usize, ldb as usize);
        if ipiv[..n].iter().any(|&p| p < 1 || p as usize > n) {
            *info = -6;
            return;
        }
        let swaps: Vec<(usize, usize)> = ipiv[..n]
            .iter()
            .enumerate()
            .map(|(i, &p)| (i, p as usize - 1))
            .collect();

        for col in 0..nrhs as usize {
            let x = &mut b[col * ldb..col * ldb + n];
            if !ffi::is_transposed(trans) {
                for &(i, p) in &swaps {
                    x.swap(i, p);
                }
                for k in 0..n {
                    let v = x[k];
                    if v != 0.0 {
                        for i in (k + 1)..n {
                            x[i] -= v * a[i + k * ld];
                        }
                    }
                }
                for k in (0..n).rev() {
                    x[k] /= a[k + k * ld];
                    let v = x[k];
                    for i in 0..k {
                        x[i] -= v * a[i + k * ld];
                    }
                }
            } else {
                for k in 0..n {
                    let mut s = x[k];
                    for i in 0..k {
                        s -= a[i + k * ld] * x[i];
                    }
                    x[k] = s / a[k + k * ld];
                }
                for k in (0..n).rev() {
                    let mut s = x[k];
                    for i in (k + 1)..n {
                        s -= a[i + k * ld] * x[i];
                    }
                    x[k] = s;
                }
                for &(i, p) in swaps.iter().rev() {
                    x.swap(i, p);
                }
            }
        }
    }

    fn dgetri(
        &self,
        n: i32,
        a: &mut [f64],
        lda: i32,
        ipiv: &[i32],
        work: &mut [f64],
        lwork: i32,
        info: &mut i32,
    ) {
        *info = ffi::check_dgetri(n, a.len(), lda, ipiv.len(), work.len(), lwork);
        if *info != 0 {
            return;
        }
        work[0] = n.max(1) as f64;
        if lwork == WORKSPACE_QUERY || n == 0 {
            return;
        }
        let (nu, ld) = (n as usize, lda as usize);
        if let Some(j) = (0..nu).find(|&j| a[j + j * ld] == 0.0) {
            *info = j as i32 + 1;
            return;
        }

        let mut inverse = Matrix::identity(nu, nu).into_vec();
        let mut status = 0;
        self.dgetrs(NO_TRANSPOSE, n, n, a, lda, ipiv, &mut inverse, n, &mut status);
        if status != 0 {
            *info = -4;
            return;
        }
        for c in 0..nu {
            a[c * ld..c * ld + nu].copy_from_slice(&inverse[c * nu..(c + 1) * nu]);
        }
    }

    fn dgeqrf(
        &self,
        m: i32,
        n: i32,
        a: &mut [f64],
        lda: i32,
        tau: &mut [f64],
        work: &mut [f64],
        lwork: i32,
        info: &mut i32,
    ) {
        *info = ffi::check_dgeqrf(m, n, a.len(), lda, tau.len(), work.len(), lwork);
        if *info != 0 {
            return;
        }
        work[0] = n.max(1) as f64;
        if lwork == WORKSPACE_QUERY {
            return;
        }
        let (m, n, ld) = (m as usize, n as usize, lda as usize);

        for i in 0..m.min(n) {
            let alpha = a[i + i * ld];
            let x_norm = a[(i + 1 + i * ld)..(m + i * ld)]
                .iter()
                .fold(0.0f64, |acc, &x| acc.hypot(x));
            if x_norm == 0.0 {
                tau[i] = 0.0;
                continue;
            }
            let beta = -alpha.hypot(x_norm).copysign(alpha);
            tau[i] = (beta - alpha) / beta;
            let scale = 1.0 / (alpha - beta);
            for r in (i + 1)..m {
                a[r + i * ld] *= scale;
            }
            a[i + i * ld] = beta;
            apply_reflector(a, ld, m, i, (i + 1)..n, tau[i]);
        }
    }

    fn dorgqr(
        &self,
        m: i32,
        n: i32,
        k: i32,
        a: &mut [f64],
        lda: i32,
        tau: &[f64],
        work: &mut [f64],
        lwork: i32,
        info: &mut i32,
    ) {
        *info = ffi::check_dorgqr(m, n, k, a.len(), lda, tau.len(), work.len(), lwork);
        if *info != 0 {
            return;
        }
        work[0] = n.max(1) as f64;
        if lwork == WORKSPACE_QUERY || n == 0 {
            return;
        }
        let (m, n, k, ld) = (m as usize, n as usize, k as usize, lda as usize);

        for j in k..n {
            for l in 0..m {
                a[l + j * ld] = 0.0;
            }
            a[j + j * ld] = 1.0;
        }
        for i in (0..k).rev() {
            if i + 1 < n {
                apply_reflector(a, ld, m, i, (i + 1)..n, tau[i]);
            }
            for r in (i + 1)..m {
                a[r + i * ld] *= -tau[i];
            }
            a[i + i * ld] = 1.0 - tau[i];
            for l in 0..i {
                a[l + i * ld] = 0.0;
            }
        }
    }

    fn dgesdd(
        &self,
        jobz: u8,
        m: i32,
        n: i32,
        a: &mut [f64],
        lda: i32,
        s: &mut [f64],
        u: &mut [f64],
        ldu: i32,
        vt: &mut [f64],
        ldvt: i32,
        work: &mut [f64],
        lwork: i32,
        iwork: &mut [i32],
        info: &mut i32,
    ) {
        *info = ffi::check_dgesdd(
            jobz,
            m,
            n,
            a.len(),
            lda,
            s.len(),
            u.len(),
            ldu,
            vt.len(),
            ldvt,
            work.len(),
            lwork,
            iwork.len(),
        );
        if *info != 0 {
            return;
        }
        let job = jobz.to_ascii_uppercase();
        work[0] = ffi::dgesdd_min_lwork(job, m, n) as f64;
        if lwork == WORKSPACE_QUERY {
            return;
        }
        let (m, n, ld) = (m as usize, n as usize, lda as usize);
        let k = m.min(n);
        if k == 0 {
            return;
        }

        let mut dense = Matrix::zeros(m, n);
        for c in 0..n {
            dense
                .column_mut(c)
                .copy_from_slice(&a[c * ld..c * ld + m]);
        }
        let Ok(factors) = svd::factor(dense) else {
            *info = 1;
            return;
        };
        s[..k].copy_from_slice(&factors.s);
        match job {
            JOB_SMALL => {
                store(u, ldu as usize, &factors.u);
                store(vt, ldvt as usize, &factors.vt);
            }
            JOB_ALL => {
                store(u, ldu as usize, &complete_basis(&factors.u));
                let v = complete_basis(&factors.vt.transpose());
                store(vt, ldvt as usize, &v.transpose());
            }
            _ => {}
        }
    }
}
