use crate::engine::multiply_shape;
use crate::error::Result;
use crate::matrix::{Matrix, TransposeType};
use ndarray::linalg::general_mat_mul;

/// `alpha * op(a) * op(b) + beta * c` through ndarray's GEMM.
pub(crate) fn gemm(
    trans_a: TransposeType,
    alpha: f64,
    a: &Matrix,
    trans_b: TransposeType,
    b: &Matrix,
    beta: f64,
    c: Option<&Matrix>,
) -> Result<Matrix> {
    let (m, n, _) = multiply_shape(trans_a, a, trans_b, b, c)?;
    let (mut out, beta) = match c {
        Some(c) => (c.clone(), beta),
        None => (Matrix::zeros(m, n), 0.0),
    };

    let a_view = a.view()?;
    let b_view = b.view()?;
    let a_op = if trans_a.is_transpose() {
        a_view.reversed_axes()
    } else {
        a_view
    };
    let b_op = if trans_b.is_transpose() {
        b_view.reversed_axes()
    } else {
        b_view
    };
    {
        let mut c_view = out.view_mut()?;
        general_mat_mul(alpha, &a_op, &b_op, beta, &mut c_view);
    }
    Ok(out)
}
