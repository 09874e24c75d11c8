use std::env;

const MULTIPLY_ENV: &str = "DENSEMAT_MULTIPLY_THRESHOLD";
const INVERT_ENV: &str = "DENSEMAT_INVERT_THRESHOLD";
const SOLVE_LU_ENV: &str = "DENSEMAT_SOLVE_LU_THRESHOLD";
const SVD_ENV: &str = "DENSEMAT_SVD_THRESHOLD";

const DEFAULT_MULTIPLY: usize = 12;
const DEFAULT_INVERT: usize = 6;
const DEFAULT_SOLVE_LU: usize = 6;
const DEFAULT_SVD: usize = 8;

/// Size cut-overs for [`crate::hybrid::HybridEngine`]. An operation runs on
/// the computed backend while the largest operand dimension is strictly
/// below its threshold, on the native backend otherwise.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DispatchThresholds {
    pub multiply: usize,
    pub invert: usize,
    pub solve_lu: usize,
    pub svd: usize,
}

impl Default for DispatchThresholds {
    fn default() -> Self {
        DispatchThresholds {
            multiply: DEFAULT_MULTIPLY,
            invert: DEFAULT_INVERT,
            solve_lu: DEFAULT_SOLVE_LU,
            svd: DEFAULT_SVD,
        }
    }
}

impl DispatchThresholds {
    /// Defaults overridden by `DENSEMAT_*_THRESHOLD` variables. Blank,
    /// unparsable or zero values keep the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str, default: usize| {
            lookup(key)
                .and_then(|raw| raw.trim().parse::<usize>().ok())
                .filter(|&value| value > 0)
                .unwrap_or(default)
        };
        DispatchThresholds {
            multiply: read(MULTIPLY_ENV, DEFAULT_MULTIPLY),
            invert: read(INVERT_ENV, DEFAULT_INVERT),
            solve_lu: read(SOLVE_LU_ENV, DEFAULT_SOLVE_LU),
            svd: read(SVD_ENV, DEFAULT_SVD),
        }
    }

    /// Every operation on the computed backend.
    pub fn always_computed() -> Self {
        DispatchThresholds {
            multiply: usize::MAX,
            invert: usize::MAX,
            solve_lu: usize::MAX,
            svd: usize::MAX,
        }
    }

    /// Every operation on the native backend.
    pub fn always_native() -> Self {
        DispatchThresholds {
            multiply: 0,
            invert: 0,
            solve_lu: 0,
            svd: 0,
        }
    }
}
