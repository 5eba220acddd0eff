use thiserror::Error;

/// Errors raised while building a basis or evaluating integrals.
#[derive(Debug, Error)]
pub enum IntegralError {
    /// The element symbol is not in the periodic table.
    #[error("Unknown element symbol '{0}'")]
    UnknownElement(String),

    /// The requested basis set is not in the built-in library.
    #[error("Unknown basis set '{0}'")]
    UnknownBasis(String),

    /// The basis set exists but has no functions for the element.
    #[error("Basis set '{basis}' has no functions for element {element}")]
    MissingElement { basis: String, element: String },

    /// A line of basis-set text could not be interpreted.
    #[error("Malformed basis set data at line {line}: {reason}")]
    Parse { line: usize, reason: String },

    /// A shell slice does not fit inside the basis.
    #[error("Shell range {start}..{end} is invalid for a basis with {nbas} shells")]
    ShellRange { start: usize, end: usize, nbas: usize },

    /// An integral evaluated to NaN or infinity.
    #[error("Non-finite value encountered while evaluating {integral} integrals")]
    NonFinite { integral: String },
}
