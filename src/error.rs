//! Error types for the Breadboard circuit simulator.
//!
//! This module provides a unified error type [`BreadboardError`] covering
//! every failure the engine can report during circuit analysis and
//! transient stepping. Fatal errors are also recorded on the engine (see
//! [`Simulator::error`](crate::Simulator::error)) so callers that poll
//! after `update` keep working.

use thiserror::Error;

/// Result type alias using [`BreadboardError`].
pub type Result<T> = std::result::Result<T, BreadboardError>;

/// Unified error type for all Breadboard operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BreadboardError {
    // ============ Analysis Errors ============
    /// A zero-resistance loop of wires and voltage sources was found.
    #[error("Voltage source/wire loop with no resistance!")]
    VoltageSourceLoop,

    /// A current source has no closed path to push its current through.
    #[error("No path for current source!")]
    NoCurrentSourcePath,

    /// A capacitor sits in a loop of wires, capacitors and voltage sources
    /// with no resistive element.
    #[error("Capacitor loop with no resistance!")]
    CapacitorLoop,

    /// Row simplification found an equation with no free unknown left.
    #[error("Matrix error")]
    MatrixError,

    // ============ Stepping Errors ============
    /// LU factorization failed; the system has no unique solution.
    #[error("Singular matrix!")]
    SingularMatrix,

    /// A non-finite value appeared in the system matrix.
    #[error("NaN/Infinite matrix!")]
    NonFiniteMatrix,

    /// Newton-Raphson iteration did not settle within the sub-iteration
    /// limit.
    #[error("Convergence failed!")]
    ConvergenceFailed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        // Callers match on these strings, so they are part of the contract.
        assert_eq!(
            BreadboardError::VoltageSourceLoop.to_string(),
            "Voltage source/wire loop with no resistance!"
        );
        assert_eq!(
            BreadboardError::NoCurrentSourcePath.to_string(),
            "No path for current source!"
        );
        assert_eq!(
            BreadboardError::CapacitorLoop.to_string(),
            "Capacitor loop with no resistance!"
        );
        assert_eq!(BreadboardError::SingularMatrix.to_string(), "Singular matrix!");
        assert_eq!(
            BreadboardError::NonFiniteMatrix.to_string(),
            "NaN/Infinite matrix!"
        );
        assert_eq!(
            BreadboardError::ConvergenceFailed.to_string(),
            "Convergence failed!"
        );
    }
}
