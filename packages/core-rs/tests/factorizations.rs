mod common;

use approx::assert_relative_eq;
use common::{diag, engines, permute_rows, product, random, well_conditioned};
use densemat_core::native::EmulatedLapack;
use densemat_core::{
    metrics, ComputedEngine, Engine, Error, Matrix, NativeEngine, TransposeType,
};

#[test]
fn lu_reconstructs_permuted_input() {
    for engine in engines() {
        for (rows, cols, seed) in [(5, 5, 1), (9, 9, 2), (7, 4, 3), (4, 7, 4)] {
            let a = random(rows, cols, seed);
            let lu = engine.decompose_lu(&a).unwrap();
            assert_eq!(lu.pivot().len(), rows.min(cols));
            let pa = permute_rows(&a, &lu.permutation_vector());
            let got = product(&lu.l(), &lu.u());
            assert!(got.approx_eq(&pa, 1e-12), "{} {rows}x{cols}", engine.name());
        }
    }
}

#[test]
fn inverse_round_trips() {
    for engine in engines() {
        for n in [1, 3, 5, 6, 10] {
            let a = well_conditioned(n, n as u64);
            let inv = engine.invert(&a).unwrap().expect("invertible");
            let id = product(&a, &inv);
            assert!(id.approx_eq(&Matrix::identity(n, n), 1e-9), "{} n={n}", engine.name());
        }
    }
}

#[test]
fn singular_inputs_are_reported_in_band() {
    let singular = Matrix::from_rows(&[
        &[1.0, 2.0, 3.0],
        &[2.0, 4.0, 6.0],
        &[0.0, 1.0, 1.0],
    ])
    .unwrap();
    for engine in engines() {
        assert!(engine.invert(&singular).unwrap().is_none(), "{}", engine.name());
        let solved = engine
            .solve_lu(&singular, &Matrix::zeros(3, 2), TransposeType::NoTranspose)
            .unwrap();
        assert!(solved.is_none());
        assert!(engine.decompose_lu(&singular).unwrap().is_singular());
        assert!(engine.invert(&Matrix::zeros(2, 3)).unwrap().is_none());
    }
}

#[test]
fn solving_against_singular_factors_is_an_error() {
    let singular = Matrix::from_rows(&[&[1.0, 2.0], &[2.0, 4.0]]).unwrap();
    let b = Matrix::column_vector(&[1.0, 2.0]);
    for engine in engines() {
        let lu = engine.decompose_lu(&singular).unwrap();
        assert!(lu.is_singular(), "{}", engine.name());
        for trans in [TransposeType::NoTranspose, TransposeType::Transpose] {
            let err = lu.solve(&b, trans).unwrap_err();
            assert_eq!(err, Error::SingularMatrix { op: "solve_lu" }, "{}", engine.name());
            assert_eq!(err.code(), densemat_core::error::codes::SINGULAR_MATRIX);
        }
    }
}

#[test]
fn lu_solve_both_orientations() {
    let a = well_conditioned(7, 21);
    let x = random(7, 3, 22);
    let b = product(&a, &x);
    let bt = product(&a.transpose(), &x);
    for engine in engines() {
        let got = engine.solve_lu(&a, &b, TransposeType::NoTranspose).unwrap().unwrap();
        assert!(got.approx_eq(&x, 1e-10), "{}", engine.name());
        let got = engine.solve_lu(&a, &bt, TransposeType::Transpose).unwrap().unwrap();
        assert!(got.approx_eq(&x, 1e-10), "{} transposed", engine.name());
    }
}

#[test]
fn qr_is_orthonormal_times_upper() {
    for engine in engines() {
        for (rows, cols, seed) in [(6, 6, 5), (9, 4, 6), (20, 3, 7)] {
            let a = random(rows, cols, seed);
            let qr = engine.decompose_qr(&a).unwrap();
            let q = qr.q();
            let r = qr.r();
            assert_eq!(q.shape(), (rows, cols));
            assert!(product(&q, &r).approx_eq(&a, 1e-12), "{}", engine.name());
            assert!(product(&q.transpose(), &q).approx_eq(&Matrix::identity(cols, cols), 1e-12));
            for c in 0..cols {
                for row in (c + 1)..cols {
                    assert_eq!(r.get(row, c), 0.0);
                }
            }
            assert!(qr.is_full_rank());
        }
    }
}

#[test]
fn qr_solve_is_least_squares() {
    let a = random(12, 4, 31);
    let b = random(12, 2, 32);
    // normal equations reference: (A^T A) x = A^T b
    let ata = product(&a.transpose(), &a);
    let atb = product(&a.transpose(), &b);
    let reference = ComputedEngine
        .solve_lu(&ata, &atb, TransposeType::NoTranspose)
        .unwrap()
        .unwrap();
    for engine in engines() {
        let x = engine.solve_qr(&a, &b, TransposeType::NoTranspose).unwrap();
        assert!(x.approx_eq(&reference, 1e-9), "{}", engine.name());
        let xt = engine.solve_qr(&a, &b.transpose(), TransposeType::Transpose).unwrap();
        assert!(xt.approx_eq(&reference, 1e-9));
    }
}

#[test]
fn qr_rejects_wide_and_rank_deficient_systems() {
    let mut deficient = random(5, 3, 41);
    for r in 0..5 {
        deficient.set(r, 2, 0.0);
    }
    for engine in engines() {
        let err = engine
            .solve_qr(&Matrix::zeros(2, 3), &Matrix::zeros(2, 1), TransposeType::NoTranspose)
            .unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { .. }));
        let err = engine
            .solve_qr(&deficient, &Matrix::zeros(5, 1), TransposeType::NoTranspose)
            .unwrap_err();
        assert_eq!(err, Error::RankDeficient { op: "solve_qr" }, "{}", engine.name());
    }
}

#[test]
fn svd_reconstructs_with_sorted_values() {
    for engine in engines() {
        for (rows, cols, seed) in [(5, 5, 51), (10, 4, 52), (3, 9, 53), (12, 12, 54)] {
            let a = random(rows, cols, seed);
            let svd = engine.decompose_svd(&a).unwrap();
            let k = rows.min(cols);
            assert_eq!(svd.u.shape(), (rows, k));
            assert_eq!(svd.vt.shape(), (k, cols));
            assert!(svd.s.iter().all(|&s| s >= 0.0));
            assert!(svd.s.windows(2).all(|w| w[0] >= w[1]));
            let rebuilt = product(&product(&svd.u, &diag(k, k, &svd.s)), &svd.vt);
            assert!(rebuilt.approx_eq(&a, 1e-10), "{} {rows}x{cols}", engine.name());
        }
    }
}

#[test]
fn singular_values_match_nalgebra() {
    let a = random(8, 5, 61);
    let reference = nalgebra::DMatrix::from_column_slice(8, 5, a.as_slice());
    let mut expected: Vec<f64> = reference.singular_values().iter().copied().collect();
    expected.sort_by(|x, y| y.total_cmp(x));
    for engine in engines() {
        let svd = engine.decompose_svd(&a).unwrap();
        for (got, want) in svd.s.iter().zip(&expected) {
            assert_relative_eq!(*got, *want, epsilon = 1e-10);
        }
    }
}

#[test]
fn backends_agree_within_tolerance() {
    let computed = ComputedEngine;
    let native = NativeEngine::with_provider(EmulatedLapack);
    for n in [2, 5, 8, 13] {
        let a = well_conditioned(n, 70 + n as u64);
        let b = random(n, 2, 80 + n as u64);

        let inv_c = computed.invert(&a).unwrap().unwrap();
        let inv_n = native.invert(&a).unwrap().unwrap();
        assert!(inv_c.approx_eq(&inv_n, 1e-6));

        let x_c = computed.solve_lu(&a, &b, TransposeType::NoTranspose).unwrap().unwrap();
        let x_n = native.solve_lu(&a, &b, TransposeType::NoTranspose).unwrap().unwrap();
        assert!(x_c.approx_eq(&x_n, 1e-6));

        let q_c = computed.solve_qr(&a, &b, TransposeType::NoTranspose).unwrap();
        let q_n = native.solve_qr(&a, &b, TransposeType::NoTranspose).unwrap();
        assert!(q_c.approx_eq(&q_n, 1e-6));

        // singular vectors are only defined up to sign, compare invariants
        let s_c = computed.decompose_svd(&a).unwrap();
        let s_n = native.decompose_svd(&a).unwrap();
        for (x, y) in s_c.s.iter().zip(&s_n.s) {
            assert!((x - y).abs() < 1e-6);
        }
        assert!(computed.pinv(&a).unwrap().approx_eq(&native.pinv(&a).unwrap(), 1e-6));

        let lu_c = computed.decompose_lu(&a).unwrap();
        let lu_n = native.decompose_lu(&a).unwrap();
        assert_eq!(lu_c.pivot(), lu_n.pivot());
        assert_relative_eq!(
            lu_c.determinant().unwrap(),
            lu_n.determinant().unwrap(),
            max_relative = 1e-9
        );
    }
}

#[test]
fn native_calls_release_foreign_buffers() {
    let native = NativeEngine::with_provider(EmulatedLapack);
    let before = metrics::live_foreign_buffers();
    let a = well_conditioned(6, 90);
    native.invert(&a).unwrap();
    native.decompose_svd(&a).unwrap();
    native.solve_qr(&a, &Matrix::zeros(6, 1), TransposeType::NoTranspose).unwrap();
    // error paths
    assert!(native.solve_lu(&Matrix::zeros(2, 3), &Matrix::zeros(2, 1), TransposeType::NoTranspose).is_err());
    let mut deficient = a.clone();
    for r in 0..6 {
        deficient.set(r, 0, 0.0);
    }
    assert!(native.solve_qr(&deficient, &Matrix::zeros(6, 1), TransposeType::NoTranspose).is_err());
    assert_eq!(metrics::live_foreign_buffers(), before);
}

#[test]
fn empty_matrices_are_accepted() {
    for engine in engines() {
        let svd = engine.decompose_svd(&Matrix::zeros(0, 3)).unwrap();
        assert!(svd.s.is_empty());
        let inv = engine.invert(&Matrix::zeros(0, 0)).unwrap().unwrap();
        assert_eq!(inv.shape(), (0, 0));
    }
}
