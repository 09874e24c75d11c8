//! Size-based dispatch between the computed and native backends.

use crate::computed::ComputedEngine;
use crate::config::DispatchThresholds;
use crate::engine::{op_shape, Engine, LuDecomposition, QrDecomposition, SvdDecomposition};
use crate::error::Result;
use crate::matrix::{Matrix, TransposeType};
use crate::native::{DefaultLapack, LapackProvider, NativeEngine};
use log::trace;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backend {
    Computed,
    Native,
}

/// Runs small problems on [`ComputedEngine`] and everything else on
/// [`NativeEngine`]. QR always goes native.
#[derive(Clone, Debug)]
pub struct HybridEngine<L = DefaultLapack> {
    computed: ComputedEngine,
    native: NativeEngine<L>,
    thresholds: DispatchThresholds,
}

impl HybridEngine<DefaultLapack> {
    pub fn new() -> Self {
        Self::with_thresholds(DispatchThresholds::default())
    }

    /// Thresholds read from the `DENSEMAT_*_THRESHOLD` variables.
    pub fn from_env() -> Self {
        Self::with_thresholds(DispatchThresholds::from_env())
    }

    pub fn with_thresholds(thresholds: DispatchThresholds) -> Self {
        Self::with_native(NativeEngine::new(), thresholds)
    }
}

impl Default for HybridEngine<DefaultLapack> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: LapackProvider> HybridEngine<L> {
    pub fn with_native(native: NativeEngine<L>, thresholds: DispatchThresholds) -> Self {
        HybridEngine {
            computed: ComputedEngine,
            native,
            thresholds,
        }
    }

    pub fn thresholds(&self) -> &DispatchThresholds {
        &self.thresholds
    }

    fn pick(&self, op: &'static str, max_dim: usize, threshold: usize) -> Backend {
        let backend = if max_dim < threshold {
            Backend::Computed
        } else {
            Backend::Native
        };
        trace!("{op}: max dimension {max_dim}, threshold {threshold} -> {backend:?}");
        backend
    }

    fn engine(&self, backend: Backend) -> &dyn Engine {
        match backend {
            Backend::Computed => &self.computed,
            Backend::Native => &self.native,
        }
    }

    pub fn backend_for_multiply(&self, m: usize, n: usize, k: usize) -> Backend {
        self.pick("multiply", m.max(n).max(k), self.thresholds.multiply)
    }

    pub fn backend_for_invert(&self, a: &Matrix) -> Backend {
        self.pick("invert", a.rows().max(a.cols()), self.thresholds.invert)
    }

    pub fn backend_for_lu(&self, a: &Matrix) -> Backend {
        self.pick("lu", a.rows().max(a.cols()), self.thresholds.solve_lu)
    }

    pub fn backend_for_svd(&self, a: &Matrix) -> Backend {
        self.pick("svd", a.rows().max(a.cols()), self.thresholds.svd)
    }
}

impl<L: LapackProvider> Engine for HybridEngine<L> {
    fn name(&self) -> &'static str {
        "hybrid"
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
        let (m, k) = op_shape(a, trans_a);
        let (_, n) = op_shape(b, trans_b);
        self.engine(self.backend_for_multiply(m, n, k))
            .multiply(trans_a, alpha, a, trans_b, b, beta, c)
    }

    fn decompose_lu_in_place(&self, a: Matrix) -> Result<LuDecomposition> {
        self.engine(self.backend_for_lu(&a)).decompose_lu_in_place(a)
    }

    fn decompose_qr_in_place(&self, a: Matrix) -> Result<QrDecomposition> {
        trace!("decompose_qr -> Native");
        self.native.decompose_qr_in_place(a)
    }

    fn decompose_svd_in_place(&self, a: Matrix) -> Result<SvdDecomposition> {
        self.engine(self.backend_for_svd(&a)).decompose_svd_in_place(a)
    }

    fn invert_in_place(&self, a: Matrix) -> Result<Option<Matrix>> {
        self.engine(self.backend_for_invert(&a)).invert_in_place(a)
    }

    fn solve_lu_in_place(
        &self,
        a: Matrix,
        b: &Matrix,
        trans: TransposeType,
    ) -> Result<Option<Matrix>> {
        self.engine(self.backend_for_lu(&a)).solve_lu_in_place(a, b, trans)
    }

    fn solve_qr_in_place(&self, a: Matrix, b: &Matrix, trans_b: TransposeType) -> Result<Matrix> {
        trace!("solve_qr -> Native");
        self.native.solve_qr_in_place(a, b, trans_b)
    }
}
