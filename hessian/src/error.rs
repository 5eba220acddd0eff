use basis::IntegralError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a Hessian evaluation. There is no partial result.
#[derive(Debug, Error)]
pub enum HessianError {
    /// The integral engine could not produce a requested block.
    #[error("Integral evaluation failed: {0}")]
    IntegralFailure(#[from] IntegralError),

    /// The coupled-perturbed equations did not reach the tolerance.
    #[error(
        "Coupled-perturbed equations for atom {atom} did not converge in {max_cycle} iterations (residual {residual:.3e})"
    )]
    SolverDivergence {
        atom: usize,
        residual: f64,
        max_cycle: usize,
    },

    /// Reference orbitals, basis or atom selection do not fit together.
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Occupation numbers must be 0 or 2 for a closed-shell reference.
    #[error("Orbital {index} has occupation {value}, expected 0 or 2")]
    InvalidOccupation { index: usize, value: f64 },

    /// The electron count does not allow a closed-shell determinant.
    #[error("A closed-shell reference needs an even, positive electron count, got {0}")]
    OpenShell(i64),

    /// The reference SCF did not converge.
    #[error("SCF did not converge in {max_cycle} cycles (dE = {delta_e:.3e}, max |FDS - SDF| = {error:.3e})")]
    ScfNotConverged {
        max_cycle: usize,
        delta_e: f64,
        error: f64,
    },

    /// The eigensolver did not bring the Fock matrix to diagonal form.
    #[error("Orbitals are not canonical: max off-diagonal |C^T F C| = {off_diagonal:.3e}")]
    NonCanonical { off_diagonal: f64 },

    /// Reading or writing a checkpoint entry failed.
    #[error("Checkpoint I/O failed for {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A checkpoint entry could not be encoded or decoded.
    #[error("Checkpoint entry '{key}' could not be (de)serialized: {source}")]
    Serialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// Nothing was stored under the key.
    #[error("No checkpoint entry for key '{0}'")]
    MissingEntry(String),
}
