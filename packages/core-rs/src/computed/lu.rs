use crate::engine::LuDecomposition;
use crate::matrix::{Matrix, TransposeType};

/// Left-looking (dot product) LU with partial pivoting, done inside `a`.
/// Works on rectangular input; the recorded swaps cover `min(m, n)` rows.
pub(crate) fn factor(mut a: Matrix) -> LuDecomposition {
    let (m, n) = a.shape();
    let mut pivot = Vec::with_capacity(m.min(n));
    let mut col = vec![0.0; m];

    for j in 0..n {
        col.copy_from_slice(a.column(j));

        for i in 0..m {
            let mut s = 0.0;
            for p in 0..i.min(j) {
                s += a.get(i, p) * col[p];
            }
            col[i] -= s;
            a.set(i, j, col[i]);
        }

        if j >= m {
            continue;
        }

        let mut p = j;
        for i in (j + 1)..m {
            if col[i].abs() > col[p].abs() {
                p = i;
            }
        }
        if p != j {
            for c in 0..n {
                let upper = a.get(j, c);
                a.set(j, c, a.get(p, c));
                a.set(p, c, upper);
            }
        }
        pivot.push(p);

        let d = a.get(j, j);
        if d != 0.0 {
            for i in (j + 1)..m {
                a.set(i, j, a.get(i, j) / d);
            }
        }
    }

    let singular = (0..m.min(n)).any(|j| a.get(j, j) == 0.0);
    LuDecomposition::new(a, pivot, singular)
}

/// Solves `op(A) * X = B` against square packed factors `P * A = L * U`.
pub(crate) fn substitute(lu: &Matrix, pivot: &[usize], b: &Matrix, trans: TransposeType) -> Matrix {
    let n = lu.rows();
    let mut x = b.clone();

    match trans {
        TransposeType::NoTranspose => {
            for (i, &p) in pivot.iter().enumerate() {
                swap_rows(&mut x, i, p);
            }
            for c in 0..x.cols() {
                let xc = x.column_mut(c);
                for k in 0..n {
                    let v = xc[k];
                    if v != 0.0 {
                        for i in (k + 1)..n {
                            xc[i] -= v * lu.get(i, k);
                        }
                    }
                }
                for k in (0..n).rev() {
                    xc[k] /= lu.get(k, k);
                    let v = xc[k];
                    for i in 0..k {
                        xc[i] -= v * lu.get(i, k);
                    }
                }
            }
        }
        // A^T = U^T * L^T * P
        TransposeType::Transpose => {
            for c in 0..x.cols() {
                let xc = x.column_mut(c);
                for k in 0..n {
                    let mut s = xc[k];
                    for i in 0..k {
                        s -= lu.get(i, k) * xc[i];
                    }
                    xc[k] = s / lu.get(k, k);
                }
                for k in (0..n).rev() {
                    let mut s = xc[k];
                    for i in (k + 1)..n {
                        s -= lu.get(i, k) * xc[i];
                    }
                    xc[k] = s;
                }
            }
            for (i, &p) in pivot.iter().enumerate().rev() {
                swap_rows(&mut x, i, p);
            }
        }
    }
    x
}

fn swap_rows(x: &mut Matrix, i: usize, p: usize) {
    if i == p {
        return;
    }
    for c in 0..x.cols() {
        let upper = x.get(i, c);
        x.set(i, c, x.get(p, c));
        x.set(p, c, upper);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Matrix {
        Matrix::from_rows(&[&[2.0, 1.0, 1.0], &[4.0, -6.0, 0.0], &[-2.0, 7.0, 2.0]]).unwrap()
    }

    #[test]
    fn pivots_on_largest_magnitude() {
        let lu = factor(sample());
        assert_eq!(lu.pivot()[0], 1);
        assert!(!lu.is_singular());
        let pa = {
            let a = sample();
            let perm = lu.permutation_vector();
            let mut out = Matrix::zeros(3, 3);
            for (r, &src) in perm.iter().enumerate() {
                for c in 0..3 {
                    out.set(r, c, a.get(src, c));
                }
            }
            out
        };
        let l = lu.l();
        let u = lu.u();
        let mut prod = Matrix::zeros(3, 3);
        for r in 0..3 {
            for c in 0..3 {
                let v: f64 = (0..3).map(|k| l.get(r, k) * u.get(k, c)).sum();
                prod.set(r, c, v);
            }
        }
        assert!(prod.approx_eq(&pa, 1e-12));
    }

    fn apply(a: &Matrix, x: &[f64], transposed: bool) -> Matrix {
        let n = a.rows();
        let values = (0..n)
            .map(|r| {
                (0..n)
                    .map(|c| (if transposed { a.get(c, r) } else { a.get(r, c) }) * x[c])
                    .sum()
            })
            .collect();
        Matrix::from_column_major(n, 1, values).unwrap()
    }

    #[test]
    fn solves_both_orientations() {
        let a = sample();
        let x = [1.0, -2.0, 3.0];
        let expected = Matrix::column_vector(&x);
        let lu = factor(a.clone());

        let b = apply(&a, &x, false);
        let got = substitute(lu.packed(), lu.pivot(), &b, TransposeType::NoTranspose);
        assert!(got.approx_eq(&expected, 1e-12));

        let bt = apply(&a, &x, true);
        let got = substitute(lu.packed(), lu.pivot(), &bt, TransposeType::Transpose);
        assert!(got.approx_eq(&expected, 1e-12));
    }

    #[test]
    fn exact_zero_pivot_marks_singular() {
        let a = Matrix::from_rows(&[&[1.0, 2.0], &[2.0, 4.0]]).unwrap();
        assert!(factor(a).is_singular());
    }

    #[test]
    fn determinant_tracks_swap_parity() {
        let a = Matrix::from_rows(&[&[0.0, 1.0], &[1.0, 0.0]]).unwrap();
        assert_eq!(factor(a).determinant().unwrap(), -1.0);
        assert!((factor(sample()).determinant().unwrap() - -16.0).abs() < 1e-12);
    }

    #[test]
    fn wide_input_records_row_count_pivots() {
        let a = Matrix::from_rows(&[&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]]).unwrap();
        let lu = factor(a);
        assert_eq!(lu.pivot().len(), 2);
        assert_eq!(lu.u().shape(), (2, 3));
        assert_eq!(lu.l().shape(), (2, 2));
    }
}
