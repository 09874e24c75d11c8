#![allow(dead_code)]

use densemat_core::{ComputedEngine, Engine, HybridEngine, Matrix, NativeEngine};
use rand::rngs::StdRng;
use rand::SeedableRng;

pub fn engines() -> Vec<Box<dyn Engine>> {
    vec![
        Box::new(ComputedEngine),
        Box::new(NativeEngine::new()),
        Box::new(HybridEngine::new()),
    ]
}

pub fn rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

pub fn random(rows: usize, cols: usize, seed: u64) -> Matrix {
    Matrix::random(rows, cols, &mut rng(seed), -1.0, 1.0)
}

/// Random square matrix made strictly diagonally dominant, so invertible.
pub fn well_conditioned(n: usize, seed: u64) -> Matrix {
    let mut a = random(n, n, seed);
    for i in 0..n {
        a.add(i, i, n as f64 + 1.0);
    }
    a
}

/// Triple loop product, independent of every engine.
pub fn product(a: &Matrix, b: &Matrix) -> Matrix {
    assert_eq!(a.cols(), b.rows());
    let mut out = Matrix::zeros(a.rows(), b.cols());
    for r in 0..a.rows() {
        for c in 0..b.cols() {
            let mut acc = 0.0;
            for k in 0..a.cols() {
                acc += a.get(r, k) * b.get(k, c);
            }
            out.set(r, c, acc);
        }
    }
    out
}

pub fn permute_rows(a: &Matrix, perm: &[usize]) -> Matrix {
    let mut out = Matrix::zeros(a.rows(), a.cols());
    for (r, &src) in perm.iter().enumerate() {
        for c in 0..a.cols() {
            out.set(r, c, a.get(src, c));
        }
    }
    out
}

pub fn diag(rows: usize, cols: usize, values: &[f64]) -> Matrix {
    let mut out = Matrix::zeros(rows, cols);
    for (i, &v) in values.iter().enumerate() {
        out.set(i, i, v);
    }
    out
}
