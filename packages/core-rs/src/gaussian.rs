//! Sufficient statistics and the multivariate normal distribution built
//! from them.
//!
//! Sums of products are stored as the packed upper triangle in row-major
//! order: entry `(i, j)` with `i <= j` lives at [`packed_index`]. Consumers
//! decode this layout positionally, so it must not change.

use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::matrix::Matrix;
use crate::pinv::PInvSvd;
use log::debug;
use std::f64::consts::PI;

/// Scale of the off-diagonal shrink applied to a singular covariance.
pub const REGULARIZATION: f64 = 1e-4;

/// Position of `(i, j)` in a packed upper triangle of a `features` square
/// matrix. Arguments may come in either order.
pub fn packed_index(i: usize, j: usize, features: usize) -> usize {
    let (i, j) = if i <= j { (i, j) } else { (j, i) };
    i * features - i * (i + 1) / 2 + j
}

pub fn packed_len(features: usize) -> usize {
    features * (features + 1) / 2
}

fn check_len(op: &'static str, expected: usize, got: usize) -> Result<()> {
    if expected != got {
        return Err(Error::dimension_mismatch(op, (expected, 1), (got, 1)));
    }
    Ok(())
}

/// Sample covariance from sufficient statistics, mirrored across the
/// diagonal, with the diagonal raised to `floor` where given.
fn covariance_from(
    sum: &[f64],
    sum_of_products: &[f64],
    total: u64,
    floor: Option<&[f64]>,
) -> Result<Matrix> {
    let n = sum.len();
    check_len("covariance", packed_len(n), sum_of_products.len())?;
    if let Some(floor) = floor {
        check_len("covariance", n, floor.len())?;
    }

    let t = total as f64;
    let mean: Vec<f64> = sum.iter().map(|s| s / t).collect();
    let correction = t / (t - 1.0);
    let mut cov = Matrix::zeros(n, n);
    for i in 0..n {
        for j in i..n {
            let mut value =
                (sum_of_products[packed_index(i, j, n)] / t - mean[i] * mean[j]) * correction;
            if i == j {
                // cancellation can leave a constant feature slightly negative
                value = value.max(0.0);
            }
            cov.set(i, j, value);
            cov.set(j, i, value);
        }
    }
    if let Some(floor) = floor {
        for (i, &min) in floor.iter().enumerate() {
            if cov.get(i, i) < min {
                cov.set(i, i, min);
            }
        }
    }
    Ok(cov)
}

/// Running count, sum and packed sum of products of fixed-width samples.
#[derive(Clone, Debug, PartialEq)]
pub struct GaussianStatistics {
    total: u64,
    sum: Vec<f64>,
    sum_of_products: Vec<f64>,
}

impl GaussianStatistics {
    pub fn new(features: usize) -> Self {
        GaussianStatistics {
            total: 0,
            sum: vec![0.0; features],
            sum_of_products: vec![0.0; packed_len(features)],
        }
    }

    /// Rebuilds an accumulator from stored state.
    pub fn from_parts(total: u64, sum: Vec<f64>, sum_of_products: Vec<f64>) -> Result<Self> {
        check_len("gaussian_statistics", packed_len(sum.len()), sum_of_products.len())?;
        Ok(GaussianStatistics {
            total,
            sum,
            sum_of_products,
        })
    }

    pub fn features(&self) -> usize {
        self.sum.len()
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn sum(&self) -> &[f64] {
        &self.sum
    }

    pub fn sum_of_products(&self) -> &[f64] {
        &self.sum_of_products
    }

    pub fn learn(&mut self, sample: &[f64]) -> Result<()> {
        let n = self.features();
        check_len("learn", n, sample.len())?;
        for i in 0..n {
            self.sum[i] += sample[i];
            for j in i..n {
                self.sum_of_products[packed_index(i, j, n)] += sample[i] * sample[j];
            }
        }
        self.total += 1;
        Ok(())
    }

    pub fn merge(&mut self, other: &GaussianStatistics) -> Result<()> {
        check_len("merge", self.features(), other.features())?;
        for (acc, v) in self.sum.iter_mut().zip(&other.sum) {
            *acc += v;
        }
        for (acc, v) in self.sum_of_products.iter_mut().zip(&other.sum_of_products) {
            *acc += v;
        }
        self.total += other.total;
        Ok(())
    }

    pub fn mean(&self) -> Option<Vec<f64>> {
        if self.total == 0 {
            return None;
        }
        let t = self.total as f64;
        Some(self.sum.iter().map(|s| s / t).collect())
    }

    /// `None` with fewer than two samples.
    pub fn covariance(&self, floor: Option<&[f64]>) -> Result<Option<Matrix>> {
        if self.total < 2 {
            return Ok(None);
        }
        covariance_from(&self.sum, &self.sum_of_products, self.total, floor).map(Some)
    }

    pub fn distribution<E: Engine + ?Sized>(
        &self,
        engine: &E,
        floor: Option<&[f64]>,
        allow_singular: bool,
    ) -> Result<Option<MultivariateNormalDistribution>> {
        MultivariateNormalDistribution::get_distribution_with_floor(
            engine,
            &self.sum,
            &self.sum_of_products,
            self.total,
            floor,
            allow_singular,
        )
    }
}

#[derive(Clone, Debug)]
pub struct MultivariateNormalDistribution {
    mean: Vec<f64>,
    covariance: Matrix,
    pseudo_inverse: Matrix,
    determinant: f64,
    rank: usize,
    covariance_diagonal: Vec<f64>,
}

impl MultivariateNormalDistribution {
    /// Factors `covariance` through its pseudo-inverse. Unless
    /// `allow_singular`, a rank deficient covariance gets its off-diagonal
    /// entries shrunk by `REGULARIZATION * sqrt(d_i) * sqrt(d_j)` and is
    /// factored once more; the second result is kept as is.
    pub fn new<E: Engine + ?Sized>(
        engine: &E,
        mean: Vec<f64>,
        mut covariance: Matrix,
        allow_singular: bool,
    ) -> Result<Self> {
        let d = mean.len();
        if covariance.shape() != (d, d) {
            return Err(Error::dimension_mismatch(
                "gaussian",
                (d, d),
                covariance.shape(),
            ));
        }

        let covariance_diagonal = covariance.diagonal();
        let mut factors = PInvSvd::factor(engine, &covariance)?;
        if !allow_singular && factors.rank() < d {
            debug!(
                "covariance rank {} below dimension {d}, regularizing",
                factors.rank()
            );
            let roots: Vec<f64> = covariance_diagonal.iter().map(|v| v.max(0.0).sqrt()).collect();
            for j in 0..d {
                for i in 0..d {
                    if i != j {
                        covariance.add(i, j, -REGULARIZATION * roots[i] * roots[j]);
                    }
                }
            }
            factors = PInvSvd::factor(engine, &covariance)?;
        }

        Ok(MultivariateNormalDistribution {
            mean,
            covariance,
            rank: factors.rank(),
            determinant: factors.determinant(),
            pseudo_inverse: factors.into_pinv(),
            covariance_diagonal,
        })
    }

    /// `None` when `total < 2`.
    pub fn get_distribution<E: Engine + ?Sized>(
        engine: &E,
        sum: &[f64],
        sum_of_products: &[f64],
        total: u64,
        allow_singular: bool,
    ) -> Result<Option<Self>> {
        Self::get_distribution_with_floor(engine, sum, sum_of_products, total, None, allow_singular)
    }

    pub fn get_distribution_with_floor<E: Engine + ?Sized>(
        engine: &E,
        sum: &[f64],
        sum_of_products: &[f64],
        total: u64,
        floor: Option<&[f64]>,
        allow_singular: bool,
    ) -> Result<Option<Self>> {
        if total < 2 {
            return Ok(None);
        }
        let covariance = covariance_from(sum, sum_of_products, total, floor)?;
        let t = total as f64;
        let mean = sum.iter().map(|s| s / t).collect();
        Self::new(engine, mean, covariance, allow_singular).map(Some)
    }

    /// `exp(-0.5 * (x - mean)^T * pinv * (x - mean))`.
    pub fn exponent_term(&self, features: &[f64]) -> Result<f64> {
        let d = self.mean.len();
        check_len("density", d, features.len())?;
        let diff: Vec<f64> = features.iter().zip(&self.mean).map(|(x, m)| x - m).collect();
        let mut quad = 0.0;
        for (j, &dj) in diff.iter().enumerate() {
            let column = self.pseudo_inverse.column(j);
            let dot: f64 = column.iter().zip(&diff).map(|(p, di)| p * di).sum();
            quad += dot * dj;
        }
        Ok((-0.5 * quad).exp())
    }

    /// With `normalize_on_avg` only the exponent term is returned, which is
    /// enough to compare candidates under one covariance.
    pub fn density(&self, features: &[f64], normalize_on_avg: bool) -> Result<f64> {
        let exponent = self.exponent_term(features)?;
        if normalize_on_avg {
            return Ok(exponent);
        }
        Ok(self.normalization() * exponent)
    }

    /// One density per column of `samples`.
    pub fn density_batch(&self, samples: &Matrix, normalize_on_avg: bool) -> Result<Vec<f64>> {
        if samples.rows() != self.mean.len() {
            return Err(Error::dimension_mismatch(
                "density",
                (self.mean.len(), samples.cols()),
                samples.shape(),
            ));
        }
        (0..samples.cols())
            .map(|c| self.density(samples.column(c), normalize_on_avg))
            .collect()
    }

    /// `(2*pi)^(-rank/2) * det^(-1/2)`.
    pub fn normalization(&self) -> f64 {
        (2.0 * PI).powf(-(self.rank as f64) / 2.0) * self.determinant.powf(-0.5)
    }

    /// Same covariance factorization around another mean.
    pub fn clone_with_mean(&self, mean: Vec<f64>) -> Result<Self> {
        check_len("clone_with_mean", self.mean.len(), mean.len())?;
        Ok(MultivariateNormalDistribution {
            mean,
            ..self.clone()
        })
    }

    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    pub fn covariance(&self) -> &Matrix {
        &self.covariance
    }

    pub fn pseudo_inverse(&self) -> &Matrix {
        &self.pseudo_inverse
    }

    pub fn determinant(&self) -> f64 {
        self.determinant
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn covariance_diagonal(&self) -> &[f64] {
        &self.covariance_diagonal
    }
}
