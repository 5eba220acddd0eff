//! Seam between the response machinery and the integral engine.

use basis::{AoBasis, Deriv1e, Deriv2e, Eri, IntegralError, Molecule, Operator};
use nalgebra::DMatrix;
use std::ops::Range;

/// Source of AO integrals and their nuclear derivatives for one geometry.
///
/// Implementations are shared read-only across worker threads.
pub trait IntegralProvider: Sync {
    fn molecule(&self) -> &Molecule;

    fn nao(&self) -> usize;

    fn nbas(&self) -> usize;

    /// `[shl0, shl1, p0, p1]` per atom.
    fn aoslice_by_atom(&self) -> Vec<[usize; 4]>;

    /// `comps x nao x nao`; the rinv origin travels inside `Operator::Rinv`.
    fn int1e(&self, op: Operator, deriv: Deriv1e) -> Result<Vec<DMatrix<f64>>, IntegralError>;

    /// `comps x n_i x nao x nao x nao` with `i` over the AOs of `shells`.
    fn int2e(&self, deriv: Deriv2e, shells: Range<usize>) -> Result<Eri, IntegralError>;
}

impl IntegralProvider for AoBasis {
    fn molecule(&self) -> &Molecule {
        AoBasis::molecule(self)
    }

    fn nao(&self) -> usize {
        AoBasis::nao(self)
    }

    fn nbas(&self) -> usize {
        AoBasis::nbas(self)
    }

    fn aoslice_by_atom(&self) -> Vec<[usize; 4]> {
        AoBasis::aoslice_by_atom(self)
    }

    fn int1e(&self, op: Operator, deriv: Deriv1e) -> Result<Vec<DMatrix<f64>>, IntegralError> {
        AoBasis::int1e(self, op, deriv)
    }

    fn int2e(&self, deriv: Deriv2e, shells: Range<usize>) -> Result<Eri, IntegralError> {
        AoBasis::int2e(self, deriv, shells)
    }
}
