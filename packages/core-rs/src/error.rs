use thiserror::Error;

/// Canonical error codes emitted by the engine. The codes are stable across
/// backends so that higher layers can branch on them without matching on
/// message text.
pub mod codes {
    /// Operand shapes disagree for the requested operation.
    pub const SHAPE_MISMATCH: &str = "E_SHAPE_MISMATCH";
    /// LU factorization found an exactly zero pivot.
    pub const SINGULAR_MATRIX: &str = "E_SINGULAR_MATRIX";
    /// QR solve on a system whose R factor has a zero diagonal.
    pub const RANK_DEFICIENT: &str = "E_RANK_DEFICIENT";
    /// SVD iteration exceeded its step budget.
    pub const NOT_CONVERGED: &str = "E_NOT_CONVERGED";
    /// A native routine rejected one of its arguments, or a caller passed
    /// malformed input.
    pub const INVALID_ARGUMENT: &str = "E_INVALID_ARGUMENT";
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("{op}: dimension mismatch, expected {expected:?} got {got:?}")]
    DimensionMismatch {
        op: &'static str,
        expected: (usize, usize),
        got: (usize, usize),
    },

    #[error("data length {len} does not match shape {rows}x{cols}")]
    InvalidShape { rows: usize, cols: usize, len: usize },

    #[error("{op}: matrix is singular")]
    SingularMatrix { op: &'static str },

    #[error("{op}: matrix is rank deficient")]
    RankDeficient { op: &'static str },

    #[error("{op}: no convergence after {iterations} iterations")]
    NotConverged { op: &'static str, iterations: usize },

    #[error("{routine}: illegal value in argument {position}")]
    InvalidArgument { routine: &'static str, position: i32 },
}

impl Error {
    pub fn dimension_mismatch(
        op: &'static str,
        expected: (usize, usize),
        got: (usize, usize),
    ) -> Self {
        Self::DimensionMismatch { op, expected, got }
    }

    /// Stable code for this error, see [`codes`].
    pub fn code(&self) -> &'static str {
        match self {
            Error::DimensionMismatch { .. } | Error::InvalidShape { .. } => codes::SHAPE_MISMATCH,
            Error::SingularMatrix { .. } => codes::SINGULAR_MATRIX,
            Error::RankDeficient { .. } => codes::RANK_DEFICIENT,
            Error::NotConverged { .. } => codes::NOT_CONVERGED,
            Error::InvalidArgument { .. } => codes::INVALID_ARGUMENT,
        }
    }

    /// Formats the error as `CODE: message`, the shape foreign bindings split
    /// on the first colon.
    pub fn to_coded_string(&self) -> String {
        format!("{}: {}", self.code(), self)
    }
}
