//! Pure Rust backend. Every kernel works on the column-major buffer of a
//! [`Matrix`] directly; GEMM goes through ndarray.

pub(crate) mod lu;
pub(crate) mod multiply;
pub(crate) mod qr;
pub(crate) mod svd;

use crate::engine::{
    check_lu_solve, check_tall, qr_rhs, Engine, LuDecomposition, QrDecomposition,
    SvdDecomposition,
};
use crate::error::Result;
use crate::matrix::{Matrix, TransposeType};
use log::debug;

pub use svd::MAX_STEPS_PER_VALUE as SVD_MAX_STEPS_PER_VALUE;

#[derive(Clone, Copy, Debug, Default)]
pub struct ComputedEngine;

impl ComputedEngine {
    pub fn new() -> Self {
        ComputedEngine
    }
}

impl Engine for ComputedEngine {
    fn name(&self) -> &'static str {
        "computed"
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
        multiply::gemm(trans_a, alpha, a, trans_b, b, beta, c)
    }

    fn decompose_lu_in_place(&self, a: Matrix) -> Result<LuDecomposition> {
        Ok(lu::factor(a))
    }

    fn decompose_qr_in_place(&self, a: Matrix) -> Result<QrDecomposition> {
        check_tall("decompose_qr", &a)?;
        Ok(qr::factor(a))
    }

    fn decompose_svd_in_place(&self, a: Matrix) -> Result<SvdDecomposition> {
        svd::factor(a)
    }

    fn invert_in_place(&self, a: Matrix) -> Result<Option<Matrix>> {
        if !a.is_square() {
            debug!("computed invert: {}x{} is not square", a.rows(), a.cols());
            return Ok(None);
        }
        let n = a.rows();
        let factors = lu::factor(a);
        if factors.is_singular() {
            debug!("computed invert: {n}x{n} is singular");
            return Ok(None);
        }
        Ok(Some(lu::substitute(
            factors.packed(),
            factors.pivot(),
            &Matrix::identity(n, n),
            TransposeType::NoTranspose,
        )))
    }

    fn solve_lu_in_place(
        &self,
        a: Matrix,
        b: &Matrix,
        trans: TransposeType,
    ) -> Result<Option<Matrix>> {
        check_lu_solve(&a, b)?;
        let factors = lu::factor(a);
        if factors.is_singular() {
            debug!("computed solve_lu: zero pivot");
            return Ok(None);
        }
        Ok(Some(lu::substitute(
            factors.packed(),
            factors.pivot(),
            b,
            trans,
        )))
    }

    fn solve_qr_in_place(&self, a: Matrix, b: &Matrix, trans_b: TransposeType) -> Result<Matrix> {
        check_tall("solve_qr", &a)?;
        let rhs = qr_rhs(&a, b, trans_b)?;
        qr::factor(a).solve(&rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn invert_round_trips_to_identity() {
        let engine = ComputedEngine;
        let a = Matrix::from_rows(&[&[4.0, 7.0], &[2.0, 6.0]]).unwrap();
        let inv = engine.invert(&a).unwrap().unwrap();
        let expected = Matrix::from_rows(&[&[0.6, -0.7], &[-0.2, 0.4]]).unwrap();
        assert!(inv.approx_eq(&expected, 1e-12));
        let id = Matrix::multiply(&engine, &a, &inv).unwrap();
        assert!(id.approx_eq(&Matrix::identity(2, 2), 1e-12));
    }

    #[test]
    fn invert_reports_none_for_singular_or_rectangular() {
        let engine = ComputedEngine;
        let singular = Matrix::from_rows(&[&[1.0, 2.0], &[2.0, 4.0]]).unwrap();
        assert!(engine.invert(&singular).unwrap().is_none());
        assert!(engine.invert(&Matrix::zeros(2, 3)).unwrap().is_none());
    }

    #[test]
    fn solve_lu_honours_transpose_flag() {
        let engine = ComputedEngine;
        let a = Matrix::from_rows(&[&[1.0, 2.0], &[0.0, 1.0]]).unwrap();
        let b = Matrix::column_vector(&[5.0, 2.0]);
        let x = engine
            .solve_lu(&a, &b, TransposeType::NoTranspose)
            .unwrap()
            .unwrap();
        assert!(x.approx_eq(&Matrix::column_vector(&[1.0, 2.0]), 1e-12));
        let xt = engine
            .solve_lu(&a, &b, TransposeType::Transpose)
            .unwrap()
            .unwrap();
        assert!(xt.approx_eq(&Matrix::column_vector(&[5.0, -8.0]), 1e-12));
    }

    #[test]
    fn solve_lu_rejects_bad_shapes() {
        let engine = ComputedEngine;
        let err = engine
            .solve_lu(&Matrix::zeros(2, 3), &Matrix::zeros(2, 1), TransposeType::NoTranspose)
            .unwrap_err();
        assert_eq!(err.code(), crate::error::codes::SHAPE_MISMATCH);
    }

    #[test]
    fn solve_qr_accepts_transposed_rhs() {
        let engine = ComputedEngine;
        let a = Matrix::from_rows(&[&[1.0, 0.0], &[1.0, 1.0], &[1.0, 2.0]]).unwrap();
        let row = Matrix::from_rows(&[&[1.0, 3.0, 5.0]]).unwrap();
        let x = engine.solve_qr(&a, &row, TransposeType::Transpose).unwrap();
        assert!(x.approx_eq(&Matrix::column_vector(&[1.0, 2.0]), 1e-12));
    }

    #[test]
    fn qr_refuses_wide_input() {
        let err = ComputedEngine
            .decompose_qr(&Matrix::zeros(2, 3))
            .unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { op: "decompose_qr", .. }));
    }
}
