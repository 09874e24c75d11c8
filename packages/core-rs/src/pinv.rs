//! Moore-Penrose pseudo-inverse through the SVD.

use crate::engine::{Engine, SvdDecomposition};
use crate::error::Result;
use crate::matrix::{Matrix, TransposeType};

/// `2^-46`, the relative rank tolerance.
pub const RANK_EPS: f64 = 1.0 / (1u64 << 46) as f64;

/// An SVD together with the pseudo-inverse, numerical rank and the product
/// of the retained singular values.
#[derive(Clone, Debug)]
pub struct PInvSvd {
    svd: SvdDecomposition,
    tolerance: f64,
    rank: usize,
    determinant: f64,
    pinv: Matrix,
}

impl PInvSvd {
    pub fn factor<E: Engine + ?Sized>(engine: &E, a: &Matrix) -> Result<Self> {
        Self::factor_in_place(engine, a.clone())
    }

    pub fn factor_in_place<E: Engine + ?Sized>(engine: &E, a: Matrix) -> Result<Self> {
        let (m, n) = a.shape();
        let svd = engine.decompose_svd_in_place(a)?;

        let tolerance = RANK_EPS * m.max(n) as f64 * svd.max_singular_value();
        let rank = svd.rank(tolerance);
        let determinant = svd.s[..rank].iter().product();

        // V * S+ * U^T as (S+ * Vt)^T * U^T.
        let mut scaled_vt = svd.vt.clone();
        for (row, &sigma) in svd.s.iter().enumerate() {
            let inverse = if row < rank { 1.0 / sigma } else { 0.0 };
            for c in 0..n {
                scaled_vt.set(row, c, scaled_vt.get(row, c) * inverse);
            }
        }
        let pinv = engine.multiply(
            TransposeType::Transpose,
            1.0,
            &scaled_vt,
            TransposeType::Transpose,
            &svd.u,
            0.0,
            None,
        )?;

        Ok(PInvSvd {
            svd,
            tolerance,
            rank,
            determinant,
            pinv,
        })
    }

    pub fn pinv(&self) -> &Matrix {
        &self.pinv
    }

    pub fn into_pinv(self) -> Matrix {
        self.pinv
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Product of the singular values above the rank tolerance; 1 when none
    /// are.
    pub fn determinant(&self) -> f64 {
        self.determinant
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn singular_values(&self) -> &[f64] {
        &self.svd.s
    }

    pub fn svd(&self) -> &SvdDecomposition {
        &self.svd
    }
}
