#[cfg(feature = "cpu-openblas")]
extern crate openblas_src as _;
#[cfg(feature = "cpu-mkl")]
extern crate intel_mkl_src as _;

pub mod computed;
pub mod config;
pub mod engine;
pub mod error;
pub mod gaussian;
pub mod hybrid;
pub mod matrix;
pub mod metrics;
pub mod native;
pub mod pinv;
pub mod polynomial;

pub use computed::ComputedEngine;
pub use config::DispatchThresholds;
pub use engine::{Engine, LuDecomposition, QrDecomposition, SvdDecomposition};
pub use error::{Error, Result};
pub use gaussian::{packed_index, GaussianStatistics, MultivariateNormalDistribution};
pub use hybrid::{Backend, HybridEngine};
pub use matrix::{Matrix, TransposeAlgorithm, TransposeType};
pub use metrics::{marshalled_bytes_total, reset_marshalled_bytes, take_marshalled_bytes};
pub use native::{DefaultLapack, EmulatedLapack, LapackProvider, NativeEngine};
pub use pinv::PInvSvd;
pub use polynomial::PolynomialFit;
