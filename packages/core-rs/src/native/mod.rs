//! Backend that delegates every kernel to a [`LapackProvider`]: operands are
//! marshalled into [`buffer::ForeignBuffer`]s, the routine runs, and its
//! `info` code is turned into a typed error or a `None` result.

mod buffer;
pub mod emulated;
pub mod ffi;
pub mod system;

use crate::engine::{
    check_lu_solve, check_tall, multiply_shape, qr_rhs, Engine, LuDecomposition,
    QrDecomposition, SvdDecomposition,
};
use crate::error::{Error, Result};
use crate::matrix::{Matrix, TransposeType};
use buffer::ForeignBuffer;
use log::{debug, warn};

pub use emulated::EmulatedLapack;
pub use ffi::LapackProvider;
#[cfg(any(feature = "cpu-openblas", feature = "cpu-mkl"))]
pub use system::SystemLapack;

/// Provider used when none is named explicitly.
#[cfg(any(feature = "cpu-openblas", feature = "cpu-mkl"))]
pub type DefaultLapack = SystemLapack;
#[cfg(not(any(feature = "cpu-openblas", feature = "cpu-mkl")))]
pub type DefaultLapack = EmulatedLapack;

/// Negative `info` is an argument error; anything else is handed back for
/// the caller to interpret.
fn lapack_status(routine: &'static str, info: i32) -> Result<i32> {
    if info < 0 {
        warn!("{routine}: illegal value in argument {}", -info);
        return Err(Error::InvalidArgument {
            routine,
            position: -info,
        });
    }
    Ok(info)
}

fn lapack_int(routine: &'static str, position: i32, value: usize) -> Result<i32> {
    i32::try_from(value).map_err(|_| Error::InvalidArgument { routine, position })
}

/// Leading dimension for a column-major operand with `rows` rows.
fn leading(routine: &'static str, position: i32, rows: usize) -> Result<i32> {
    lapack_int(routine, position, rows.max(1))
}

/// Workspace size from a `lwork == -1` query.
fn queried_lwork(work: &ForeignBuffer<f64>) -> usize {
    work.as_slice()
        .first()
        .map_or(1, |&size| size.max(1.0) as usize)
}

struct QrFactors {
    q: Matrix,
    r: Matrix,
    tau: Vec<f64>,
}

#[derive(Clone, Debug, Default)]
pub struct NativeEngine<L = DefaultLapack> {
    provider: L,
}

impl NativeEngine<DefaultLapack> {
    pub fn new() -> Self {
        NativeEngine {
            provider: DefaultLapack::default(),
        }
    }
}

impl<L: LapackProvider> NativeEngine<L> {
    pub fn with_provider(provider: L) -> Self {
        NativeEngine { provider }
    }

    pub fn provider(&self) -> &L {
        &self.provider
    }

    /// Factors `a` into packed LU form, keeping LAPACK's raw results.
    fn getrf(&self, a: Matrix) -> Result<(ForeignBuffer<f64>, ForeignBuffer<i32>, i32)> {
        let (rows, cols) = a.shape();
        let m = lapack_int("dgetrf", 1, rows)?;
        let n = lapack_int("dgetrf", 2, cols)?;
        let lda = leading("dgetrf", 4, rows)?;
        let mut lu = ForeignBuffer::adopt(a.into_vec());
        let mut ipiv = ForeignBuffer::<i32>::zeroed(rows.min(cols));
        let mut info = 0;
        self.provider
            .dgetrf(m, n, lu.as_mut_slice(), lda, ipiv.as_mut_slice(), &mut info);
        let info = lapack_status("dgetrf", info)?;
        Ok((lu, ipiv, info))
    }

    /// Householder QR through `dgeqrf` then `dorgqr`, each sized by a
    /// workspace query. Requires `rows >= cols`.
    fn householder_qr(&self, a: Matrix) -> Result<QrFactors> {
        let (rows, cols) = a.shape();
        let m = lapack_int("dgeqrf", 1, rows)?;
        let n = lapack_int("dgeqrf", 2, cols)?;
        let lda = leading("dgeqrf", 4, rows)?;
        let mut packed = ForeignBuffer::adopt(a.into_vec());
        let mut tau = ForeignBuffer::<f64>::zeroed(cols);
        let mut info = 0;

        let mut probe = ForeignBuffer::<f64>::zeroed(1);
        self.provider.dgeqrf(
            m,
            n,
            packed.as_mut_slice(),
            lda,
            tau.as_mut_slice(),
            probe.as_mut_slice(),
            ffi::WORKSPACE_QUERY,
            &mut info,
        );
        lapack_status("dgeqrf", info)?;
        let lwork = queried_lwork(&probe);
        let mut work = ForeignBuffer::<f64>::zeroed(lwork);
        self.provider.dgeqrf(
            m,
            n,
            packed.as_mut_slice(),
            lda,
            tau.as_mut_slice(),
            work.as_mut_slice(),
            lapack_int("dgeqrf", 7, lwork)?,
            &mut info,
        );
        lapack_status("dgeqrf", info)?;

        let mut r = Matrix::zeros(cols, cols);
        let stored = packed.as_slice();
        for c in 0..cols {
            for row in 0..=c {
                r.set(row, c, stored[row + c * rows]);
            }
        }

        self.provider.dorgqr(
            m,
            n,
            n,
            packed.as_mut_slice(),
            lda,
            tau.as_slice(),
            probe.as_mut_slice(),
            ffi::WORKSPACE_QUERY,
            &mut info,
        );
        lapack_status("dorgqr", info)?;
        let lwork = queried_lwork(&probe);
        let mut work = ForeignBuffer::<f64>::zeroed(lwork);
        self.provider.dorgqr(
            m,
            n,
            n,
            packed.as_mut_slice(),
            lda,
            tau.as_slice(),
            work.as_mut_slice(),
            lapack_int("dorgqr", 8, lwork)?,
            &mut info,
        );
        lapack_status("dorgqr", info)?;

        Ok(QrFactors {
            q: Matrix::from_column_major(rows, cols, packed.into_vec())?,
            r,
            tau: tau.into_vec(),
        })
    }
}

impl<L: LapackProvider> Engine for NativeEngine<L> {
    fn name(&self) -> &'static str {
        "native"
    }

    fn multiply(
        &self,
        trans_a: TransposeType,
        alpha: f64,
        a: &Matrix,
        trans_b: TransposeType,
        b: &Matrix,
        beta: f64,
        c: Option<&Matrix>,
    ) -> Result<Matrix> {
        let (m, n, k) = multiply_shape(trans_a, a, trans_b, b, c)?;
        let lhs = ForeignBuffer::copy_of(a.as_slice());
        let rhs = ForeignBuffer::copy_of(b.as_slice());
        let (mut out, beta) = match c {
            Some(c) => (ForeignBuffer::copy_of(c.as_slice()), beta),
            None => (ForeignBuffer::zeroed(m * n), 0.0),
        };
        let mut info = 0;
        self.provider.dgemm(
            trans_a.as_flag(),
            trans_b.as_flag(),
            lapack_int("dgemm", 3, m)?,
            lapack_int("dgemm", 4, n)?,
            lapack_int("dgemm", 5, k)?,
            alpha,
            lhs.as_slice(),
            leading("dgemm", 8, a.rows())?,
            rhs.as_slice(),
            leading("dgemm", 10, b.rows())?,
            beta,
            out.as_mut_slice(),
            leading("dgemm", 13, m)?,
            &mut info,
        );
        lapack_status("dgemm", info)?;
        Matrix::from_column_major(m, n, out.into_vec())
    }

    fn decompose_lu_in_place(&self, a: Matrix) -> Result<LuDecomposition> {
        let (rows, cols) = a.shape();
        let (lu, ipiv, info) = self.getrf(a)?;
        let pivot = ipiv
            .as_slice()
            .iter()
            .map(|&p| (p - 1).max(0) as usize)
            .collect();
        Ok(LuDecomposition::new(
            Matrix::from_column_major(rows, cols, lu.into_vec())?,
            pivot,
            info > 0,
        ))
    }

    fn decompose_qr_in_place(&self, a: Matrix) -> Result<QrDecomposition> {
        check_tall("decompose_qr", &a)?;
        let QrFactors { q, r, tau } = self.householder_qr(a)?;
        Ok(QrDecomposition::explicit(q, r, tau))
    }

    fn decompose_svd_in_place(&self, a: Matrix) -> Result<SvdDecomposition> {
        let (rows, cols) = a.shape();
        let k = rows.min(cols);
        if k == 0 {
            return Ok(SvdDecomposition {
                u: Matrix::zeros(rows, 0),
                s: Vec::new(),
                vt: Matrix::zeros(0, cols),
            });
        }
        let m = lapack_int("dgesdd", 2, rows)?;
        let n = lapack_int("dgesdd", 3, cols)?;
        let lda = leading("dgesdd", 5, rows)?;
        let ldu = leading("dgesdd", 8, rows)?;
        let ldvt = leading("dgesdd", 10, k)?;

        let mut data = ForeignBuffer::adopt(a.into_vec());
        let mut s = ForeignBuffer::<f64>::zeroed(k);
        let mut u = ForeignBuffer::<f64>::zeroed(rows * k);
        let mut vt = ForeignBuffer::<f64>::zeroed(k * cols);
        let mut iwork = ForeignBuffer::<i32>::zeroed(8 * k);
        let mut probe = ForeignBuffer::<f64>::zeroed(1);
        let mut info = 0;

        self.provider.dgesdd(
            ffi::JOB_SMALL,
            m,
            n,
            data.as_mut_slice(),
            lda,
            s.as_mut_slice(),
            u.as_mut_slice(),
            ldu,
            vt.as_mut_slice(),
            ldvt,
            probe.as_mut_slice(),
            ffi::WORKSPACE_QUERY,
            iwork.as_mut_slice(),
            &mut info,
        );
        lapack_status("dgesdd", info)?;
        let lwork = queried_lwork(&probe);
        let mut work = ForeignBuffer::<f64>::zeroed(lwork);
        self.provider.dgesdd(
            ffi::JOB_SMALL,
            m,
            n,
            data.as_mut_slice(),
            lda,
            s.as_mut_slice(),
            u.as_mut_slice(),
            ldu,
            vt.as_mut_slice(),
            ldvt,
            work.as_mut_slice(),
            lapack_int("dgesdd", 12, lwork)?,
            iwork.as_mut_slice(),
            &mut info,
        );
        if lapack_status("dgesdd", info)? > 0 {
            warn!("dgesdd: {info} superdiagonals did not converge");
            return Err(Error::NotConverged {
                op: "svd",
                iterations: info as usize,
            });
        }

        Ok(SvdDecomposition {
            u: Matrix::from_column_major(rows, k, u.into_vec())?,
            s: s.into_vec(),
            vt: Matrix::from_column_major(k, cols, vt.into_vec())?,
        })
    }

    fn invert_in_place(&self, a: Matrix) -> Result<Option<Matrix>> {
        if !a.is_square() {
            debug!("native invert: {}x{} is not square", a.rows(), a.cols());
            return Ok(None);
        }
        let n = a.rows();
        if n == 0 {
            return Ok(Some(a));
        }
        let (mut lu, ipiv, info) = self.getrf(a)?;
        if info > 0 {
            debug!("native invert: dgetrf found zero pivot {info}");
            return Ok(None);
        }

        let lwork = (n * n).max(1);
        let mut work = ForeignBuffer::<f64>::zeroed(lwork);
        let mut info = 0;
        self.provider.dgetri(
            lapack_int("dgetri", 1, n)?,
            lu.as_mut_slice(),
            leading("dgetri", 3, n)?,
            ipiv.as_slice(),
            work.as_mut_slice(),
            lapack_int("dgetri", 6, lwork)?,
            &mut info,
        );
        if lapack_status("dgetri", info)? > 0 {
            return Ok(None);
        }
        Ok(Some(Matrix::from_column_major(n, n, lu.into_vec())?))
    }

    fn solve_lu_in_place(
        &self,
        a: Matrix,
        b: &Matrix,
        trans: TransposeType,
    ) -> Result<Option<Matrix>> {
        check_lu_solve(&a, b)?;
        let n = a.rows();
        let (lu, ipiv, info) = self.getrf(a)?;
        if info > 0 {
            debug!("native solve_lu: dgetrf found zero pivot {info}");
            return Ok(None);
        }

        let mut x = ForeignBuffer::copy_of(b.as_slice());
        let mut info = 0;
        self.provider.dgetrs(
            trans.as_flag(),
            lapack_int("dgetrs", 2, n)?,
            lapack_int("dgetrs", 3, b.cols())?,
            lu.as_slice(),
            leading("dgetrs", 5, n)?,
            ipiv.as_slice(),
            x.as_mut_slice(),
            leading("dgetrs", 8, n)?,
            &mut info,
        );
        lapack_status("dgetrs", info)?;
        Ok(Some(Matrix::from_column_major(n, b.cols(), x.into_vec())?))
    }

    fn solve_qr_in_place(&self, a: Matrix, b: &Matrix, trans_b: TransposeType) -> Result<Matrix> {
        check_tall("solve_qr", &a)?;
        let rhs = qr_rhs(&a, b, trans_b)?;
        let QrFactors { q, r, .. } = self.householder_qr(a)?;
        if r.diagonal().iter().any(|&d| d == 0.0) {
            debug!("native solve_qr: zero on the diagonal of R");
            return Err(Error::RankDeficient { op: "solve_qr" });
        }
        let qt_b = self.multiply(
            TransposeType::Transpose,
            1.0,
            &q,
            TransposeType::NoTranspose,
            &rhs,
            0.0,
            None,
        )?;
        Ok(crate::computed::qr::back_substitute(&r, qt_b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics;

    /// Provider that answers every call with a fixed `info` code.
    struct FixedInfo(i32);

    impl LapackProvider for FixedInfo {
        fn name(&self) -> &'static str {
            "fixed-info"
        }
        fn dgemm(
            &self,
            _: u8,
            _: u8,
            _: i32,
            _: i32,
            _: i32,
            _: f64,
            _: &[f64],
            _: i32,
            _: &[f64],
            _: i32,
            _: f64,
            _: &mut [f64],
            _: i32,
            info: &mut i32,
        ) {
            *info = self.0;
        }
        fn dgetrf(&self, _: i32, _: i32, _: &mut [f64], _: i32, _: &mut [i32], info: &mut i32) {
            *info = self.0;
        }
        fn dgetrs(
            &self,
            _: u8,
            _: i32,
            _: i32,
            _: &[f64],
            _: i32,
            _: &[i32],
            _: &mut [f64],
            _: i32,
            info: &mut i32,
        ) {
            *info = self.0;
        }
        fn dgetri(&self, _: i32, _: &mut [f64], _: i32, _: &[i32], _: &mut [f64], _: i32, info: &mut i32) {
            *info = self.0;
        }
        fn dgeqrf(
            &self,
            _: i32,
            _: i32,
            _: &mut [f64],
            _: i32,
            _: &mut [f64],
            _: &mut [f64],
            _: i32,
            info: &mut i32,
        ) {
            *info = self.0;
        }
        fn dorgqr(
            &self,
            _: i32,
            _: i32,
            _: i32,
            _: &mut [f64],
            _: i32,
            _: &[f64],
            _: &mut [f64],
            _: i32,
            info: &mut i32,
        ) {
            *info = self.0;
        }
        fn dgesdd(
            &self,
            _: u8,
            _: i32,
            _: i32,
            _: &mut [f64],
            _: i32,
            _: &mut [f64],
            _: &mut [f64],
            _: i32,
            _: &mut [f64],
            _: i32,
            _: &mut [f64],
            _: i32,
            _: &mut [i32],
            info: &mut i32,
        ) {
            *info = self.0;
        }
    }

    fn sample() -> Matrix {
        Matrix::from_rows(&[&[4.0, 1.0, 2.0], &[1.0, 5.0, 3.0], &[2.0, 3.0, 6.0]]).unwrap()
    }

    #[test]
    fn negative_info_becomes_invalid_argument_without_leaks() {
        let engine = NativeEngine::with_provider(FixedInfo(-4));
        let before = metrics::live_foreign_buffers();
        let err = engine.decompose_lu(&sample()).unwrap_err();
        assert_eq!(
            err,
            Error::InvalidArgument {
                routine: "dgetrf",
                position: 4
            }
        );
        assert!(engine.decompose_svd(&sample()).is_err());
        assert!(engine.solve_qr(&sample(), &Matrix::zeros(3, 1), TransposeType::NoTranspose).is_err());
        assert_eq!(metrics::live_foreign_buffers(), before);
    }

    #[test]
    fn positive_gesdd_info_is_not_converged() {
        let engine = NativeEngine::with_provider(FixedInfo(1));
        let before = metrics::live_foreign_buffers();
        let err = engine.decompose_svd(&sample()).unwrap_err();
        assert_eq!(
            err,
            Error::NotConverged {
                op: "svd",
                iterations: 1
            }
        );
        assert_eq!(err.code(), crate::error::codes::NOT_CONVERGED);
        assert!(engine.pinv(&sample()).is_err());
        assert_eq!(metrics::live_foreign_buffers(), before);
    }

    #[test]
    fn pivots_come_back_zero_based() {
        let engine = NativeEngine::with_provider(EmulatedLapack);
        let a = Matrix::from_rows(&[&[1.0, 2.0], &[3.0, 4.0]]).unwrap();
        let lu = engine.decompose_lu(&a).unwrap();
        assert_eq!(lu.pivot(), &[1, 1]);
        assert!((lu.determinant().unwrap() - -2.0).abs() < 1e-12);
    }

    #[test]
    fn singular_inputs_give_none() {
        let engine = NativeEngine::with_provider(EmulatedLapack);
        let singular = Matrix::from_rows(&[&[1.0, 2.0], &[2.0, 4.0]]).unwrap();
        assert!(engine.invert(&singular).unwrap().is_none());
        assert!(engine
            .solve_lu(&singular, &Matrix::zeros(2, 1), TransposeType::NoTranspose)
            .unwrap()
            .is_none());
    }

    #[test]
    fn marshalling_is_counted() {
        let engine = NativeEngine::with_provider(EmulatedLapack);
        let before = metrics::marshalled_bytes_total();
        Matrix::multiply(&engine, &sample(), &sample()).unwrap();
        // two 3x3 operands in, one 3x3 result out
        assert!(metrics::marshalled_bytes_total() - before >= 3 * 9 * 8);
    }

    #[test]
    fn qr_solve_matches_normal_equations() {
        let engine = NativeEngine::with_provider(EmulatedLapack);
        let a = Matrix::from_rows(&[&[1.0, 0.0], &[1.0, 1.0], &[1.0, 2.0], &[1.0, 3.0]]).unwrap();
        let y = Matrix::column_vector(&[1.0, 3.0, 5.0, 7.0]);
        let x = engine.solve_qr(&a, &y, TransposeType::NoTranspose).unwrap();
        assert!(x.approx_eq(&Matrix::column_vector(&[1.0, 2.0]), 1e-12));
    }

    #[test]
    fn explicit_factors_carry_no_householder_vectors() {
        let engine = NativeEngine::with_provider(EmulatedLapack);
        let qr = engine.decompose_qr(&sample()).unwrap();
        assert!(qr.householder().is_none());
        assert_eq!(qr.tau().len(), 3);
    }

    #[test]
    fn rank_deficient_qr_solve_is_an_error() {
        let engine = NativeEngine::with_provider(EmulatedLapack);
        let a = Matrix::from_rows(&[&[1.0, 0.0], &[2.0, 0.0], &[3.0, 0.0]]).unwrap();
        let err = engine
            .solve_qr(&a, &Matrix::column_vector(&[1.0, 2.0, 3.0]), TransposeType::NoTranspose)
            .unwrap_err();
        assert_eq!(err, Error::RankDeficient { op: "solve_qr" });
    }
}
