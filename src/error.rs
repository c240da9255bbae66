//! Error types for laplace-rig.
//!
//! Geometric edge cases (degenerate triangles, unreachable bones) are absorbed
//! where they occur and never show up here. Only caller input problems and
//! genuine linear solver failures are reported.

use thiserror::Error;

/// Result type alias using [`LaplacianError`].
pub type Result<T> = std::result::Result<T, LaplacianError>;

/// Errors that can occur while building or solving a Laplacian system.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LaplacianError {
    /// The input has no vertices or no triangles.
    #[error("mesh has no vertices or no triangles")]
    EmptyMesh,

    /// A triangle references a vertex that was never added.
    #[error("triangle {triangle} references invalid vertex index {vertex}")]
    InvalidVertexIndex {
        /// The triangle index.
        triangle: usize,
        /// The invalid vertex index.
        vertex: usize,
    },

    /// Two per-vertex or per-bone inputs disagree in length.
    #[error("{what} has length {found}, expected {expected}")]
    LengthMismatch {
        /// Which input was inspected.
        what: &'static str,
        /// The required length.
        expected: usize,
        /// The length that was supplied.
        found: usize,
    },

    /// The linear solver could not produce a solution.
    #[error("linear solve failed: {reason}")]
    SolveFailed {
        /// Human readable description of the failure.
        reason: String,
    },

    /// The iterative solver did not reach the requested tolerance.
    #[error("solver failed to converge after {iterations} iterations")]
    ConvergenceFailed {
        /// Number of iterations attempted.
        iterations: usize,
    },

    /// Invalid parameter value.
    #[error("invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// The invalid value (as string).
        value: String,
        /// Reason the value is invalid.
        reason: &'static str,
    },
}

impl LaplacianError {
    /// Create an invalid parameter error.
    pub fn invalid_param<T: std::fmt::Display>(
        name: &'static str,
        value: T,
        reason: &'static str,
    ) -> Self {
        LaplacianError::InvalidParameter {
            name,
            value: value.to_string(),
            reason,
        }
    }

    /// Create a solve failure with the given reason.
    pub fn solve_failed(reason: impl Into<String>) -> Self {
        LaplacianError::SolveFailed {
            reason: reason.into(),
        }
    }

    /// Whether this error came from the linear solver rather than from the input.
    pub fn is_solver_failure(&self) -> bool {
        matches!(
            self,
            LaplacianError::SolveFailed { .. } | LaplacianError::ConvergenceFailed { .. }
        )
    }

    /// Check that a per-element input has the expected length.
    pub(crate) fn check_len(what: &'static str, expected: usize, found: usize) -> Result<()> {
        if expected == found {
            Ok(())
        } else {
            Err(LaplacianError::LengthMismatch {
                what,
                expected,
                found,
            })
        }
    }
}
