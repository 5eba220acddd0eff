//! Converged closed-shell reference: orbitals, orbital energies and occupations.

use crate::error::HessianError;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceState {
    /// `nao x nmo`
    pub mo_coeff: DMatrix<f64>,
    pub mo_energy: DVector<f64>,
    /// 2 for occupied, 0 for virtual
    pub mo_occ: DVector<f64>,
}

impl ReferenceState {
    pub fn new(mo_coeff: DMatrix<f64>, mo_energy: DVector<f64>, mo_occ: DVector<f64>) -> Self {
        Self {
            mo_coeff,
            mo_energy,
            mo_occ,
        }
    }

    /// Checks shapes against a basis of `nao` functions and the occupation pattern.
    pub fn validate(&self, nao: usize) -> Result<(), HessianError> {
        if self.mo_coeff.nrows() != nao {
            return Err(HessianError::DimensionMismatch(format!(
                "mo_coeff has {} rows but the basis has {} functions",
                self.mo_coeff.nrows(),
                nao
            )));
        }
        let nmo = self.mo_coeff.ncols();
        if self.mo_energy.len() != nmo || self.mo_occ.len() != nmo {
            return Err(HessianError::DimensionMismatch(format!(
                "mo_coeff has {} orbitals but mo_energy has {} and mo_occ has {}",
                nmo,
                self.mo_energy.len(),
                self.mo_occ.len()
            )));
        }
        for (index, &value) in self.mo_occ.iter().enumerate() {
            if value != 0.0 && value != 2.0 {
                return Err(HessianError::InvalidOccupation { index, value });
            }
        }
        if self.nocc() == 0 {
            return Err(HessianError::DimensionMismatch(
                "the reference has no occupied orbitals".to_string(),
            ));
        }
        Ok(())
    }

    pub fn nao(&self) -> usize {
        self.mo_coeff.nrows()
    }

    pub fn nmo(&self) -> usize {
        self.mo_coeff.ncols()
    }

    pub fn occ_indices(&self) -> Vec<usize> {
        (0..self.nmo()).filter(|&p| self.mo_occ[p] > 0.0).collect()
    }

    pub fn vir_indices(&self) -> Vec<usize> {
        (0..self.nmo()).filter(|&p| self.mo_occ[p] == 0.0).collect()
    }

    pub fn nocc(&self) -> usize {
        self.mo_occ.iter().filter(|&&o| o > 0.0).count()
    }

    /// Occupied columns of `mo_coeff`.
    pub fn mocc(&self) -> DMatrix<f64> {
        self.mo_coeff.select_columns(&self.occ_indices())
    }

    pub fn mo_energy_occ(&self) -> DVector<f64> {
        DVector::from_iterator(
            self.nocc(),
            self.occ_indices().into_iter().map(|i| self.mo_energy[i]),
        )
    }

    /// dm0 = 2 C_occ C_occ^T
    pub fn dm0(&self) -> DMatrix<f64> {
        let mocc = self.mocc();
        &mocc * mocc.transpose() * 2.0
    }

    /// dme0 = 2 C_occ diag(e_occ) C_occ^T
    pub fn dme0(&self) -> DMatrix<f64> {
        let mocc = self.mocc();
        let weighted = &mocc * DMatrix::from_diagonal(&self.mo_energy_occ());
        weighted * mocc.transpose() * 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy() -> ReferenceState {
        let c = DMatrix::from_row_slice(3, 3, &[0.8, 0.6, 0.0, -0.6, 0.8, 0.0, 0.0, 0.0, 1.0]);
        ReferenceState::new(
            c,
            DVector::from_vec(vec![-1.0, -0.5, 0.3]),
            DVector::from_vec(vec![2.0, 2.0, 0.0]),
        )
    }

    #[test]
    fn test_densities() {
        let r = toy();
        r.validate(3).unwrap();
        assert_eq!(r.nocc(), 2);
        assert_eq!(r.vir_indices(), vec![2]);
        let dm0 = r.dm0();
        // two orthonormal occupied orbitals spanning the first two AOs
        assert!((dm0[(0, 0)] - 2.0).abs() < 1e-14);
        assert!(dm0[(0, 1)].abs() < 1e-14);
        assert!(dm0[(2, 2)].abs() < 1e-14);
        let dme0 = r.dme0();
        assert!((dme0[(0, 0)] - 2.0 * (0.64 * -1.0 + 0.36 * -0.5)).abs() < 1e-14);
    }

    #[test]
    fn test_validate_rejects_bad_shapes() {
        let r = toy();
        assert!(matches!(r.validate(4), Err(HessianError::DimensionMismatch(_))));

        let mut bad = toy();
        bad.mo_energy = DVector::from_vec(vec![-1.0, 0.3]);
        assert!(matches!(bad.validate(3), Err(HessianError::DimensionMismatch(_))));

        let mut half = toy();
        half.mo_occ[1] = 1.0;
        assert!(matches!(
            half.validate(3),
            Err(HessianError::InvalidOccupation { index: 1, .. })
        ));
    }
}
