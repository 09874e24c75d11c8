use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::matrix::{Matrix, TransposeType};

/// Least squares polynomial of fixed degree. Coefficients are stored in
/// increasing power order.
#[derive(Clone, Debug, PartialEq)]
pub struct PolynomialFit {
    degree: usize,
    coefficients: Vec<f64>,
}

impl PolynomialFit {
    pub fn new(degree: usize) -> Self {
        PolynomialFit {
            degree,
            coefficients: vec![0.0; degree + 1],
        }
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    /// Solves the Vandermonde system `A[i][j] = t_i^j` against `y` by QR.
    /// Needs at least `degree + 1` samples.
    pub fn fit<E: Engine + ?Sized>(&mut self, engine: &E, t: &[f64], y: &[f64]) -> Result<&[f64]> {
        if t.len() != y.len() {
            return Err(Error::dimension_mismatch(
                "polynomial_fit",
                (t.len(), 1),
                (y.len(), 1),
            ));
        }
        let cols = self.degree + 1;
        let mut vandermonde = Matrix::zeros(t.len(), cols);
        for (i, &ti) in t.iter().enumerate() {
            let mut power = 1.0;
            for j in 0..cols {
                vandermonde.set(i, j, power);
                power *= ti;
            }
        }
        let rhs = Matrix::column_vector(y);
        let solution = engine.solve_qr_in_place(vandermonde, &rhs, TransposeType::NoTranspose)?;
        self.coefficients = solution.into_vec();
        Ok(&self.coefficients)
    }

    pub fn evaluate(&self, t: f64) -> f64 {
        Self::extrapolate(t, &self.coefficients)
    }

    /// Horner evaluation of `sum(coefficients[j] * t^j)`.
    pub fn extrapolate(t: f64, coefficients: &[f64]) -> f64 {
        coefficients.iter().rev().fold(0.0, |acc, &c| acc * t + c)
    }
}
