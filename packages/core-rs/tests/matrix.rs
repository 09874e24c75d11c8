mod common;

use densemat_core::{Engine, Matrix, TransposeAlgorithm, TransposeType};

#[test]
fn transpose_is_involutive_on_every_path() {
    for (rows, cols, expected) in [
        (4, 4, TransposeAlgorithm::Square),
        (400, 400, TransposeAlgorithm::Square),
        (400, 380, TransposeAlgorithm::Block),
        (400, 3, TransposeAlgorithm::Naive),
    ] {
        assert_eq!(TransposeAlgorithm::select(rows, cols), expected);
        let a = common::random(rows, cols, (rows * 1000 + cols) as u64);
        let t = a.transpose();
        assert_eq!(t.shape(), (cols, rows));
        assert_eq!(t.get(cols - 1, 0), a.get(0, cols - 1));
        assert_eq!(t.transpose(), a);
    }
}

#[test]
fn transpose_algorithms_agree_exactly() {
    let a = common::random(420, 390, 7);
    let block = a.transpose_using(TransposeAlgorithm::Block);
    let naive = a.transpose_using(TransposeAlgorithm::Naive);
    assert_eq!(block, naive);

    let square = common::random(33, 33, 8);
    let mut in_place = square.clone();
    in_place.transpose_in_place();
    assert_eq!(in_place, square.transpose_using(TransposeAlgorithm::Naive));
}

#[test]
fn scaling_by_zero_clears_everything() {
    let mut a = common::random(5, 3, 1);
    a.set(0, 0, f64::NAN);
    a.set(4, 2, f64::INFINITY);
    a.scale(0.0);
    assert!(a.as_slice().iter().all(|&v| v == 0.0));

    let mut b = Matrix::identity(2, 2);
    b.scale(-3.0);
    assert_eq!(b.to_row_major_vec(), vec![-3.0, 0.0, 0.0, -3.0]);
}

#[test]
fn approx_eq_needs_matching_shapes() {
    let a = Matrix::zeros(2, 3);
    assert!(!a.approx_eq(&Matrix::zeros(3, 2), 1.0));
    let mut b = a.clone();
    b.set(1, 1, 1e-10);
    assert!(a.approx_eq(&b, 1e-9));
    assert!(!a.approx_eq(&b, 1e-11));
}

#[test]
fn multiply_honours_flags_on_every_engine() {
    let a = common::random(4, 3, 11);
    let b = common::random(4, 5, 12);
    let c = common::random(3, 5, 13);
    let expected = {
        let mut e = common::product(&a.transpose(), &b);
        e.scale(2.0);
        let mut acc = c.clone();
        acc.scale(-1.0);
        for r in 0..3 {
            for col in 0..5 {
                e.add(r, col, acc.get(r, col));
            }
        }
        e
    };
    for engine in common::engines() {
        let got = engine
            .multiply(TransposeType::Transpose, 2.0, &a, TransposeType::NoTranspose, &b, -1.0, Some(&c))
            .unwrap();
        assert!(got.approx_eq(&expected, 1e-12), "{}", engine.name());

        let err = Matrix::multiply(engine.as_ref(), &a, &b).unwrap_err();
        assert_eq!(err.code(), "E_SHAPE_MISMATCH");
    }
}

#[test]
fn multiply_across_the_dispatch_threshold() {
    for n in [3, 11, 12, 30] {
        let a = common::random(n, n + 1, n as u64);
        let b = common::random(n + 1, n, n as u64 + 100);
        let expected = common::product(&a, &b);
        for engine in common::engines() {
            let got = Matrix::multiply(engine.as_ref(), &a, &b).unwrap();
            assert!(got.approx_eq(&expected, 1e-12), "{} n={n}", engine.name());
        }
    }
}
