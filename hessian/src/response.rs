//! Orbital-rotation response of the closed-shell effective potential.

use crate::error::HessianError;
use crate::jk::get_jk;
use crate::reference::ReferenceState;
use basis::Eri;
use nalgebra::DMatrix;
use rayon::prelude::*;

/// Maps a trial rotation `x` (`nmo x nocc`, MO basis) to `Cᵀ v1[x] C_occ`,
/// where v1 is the Coulomb-minus-half-exchange potential of the first-order
/// density `C (2x) C_occᵀ + transpose`.
pub struct ResponseOperator<'a> {
    eri: &'a Eri,
    mo_coeff: DMatrix<f64>,
    mocc: DMatrix<f64>,
}

impl<'a> ResponseOperator<'a> {
    /// `eri` must hold the full, underived two-electron tensor.
    pub fn new(eri: &'a Eri, reference: &ReferenceState) -> Result<Self, HessianError> {
        let nao = reference.nao();
        if eri.ncomp != 1 || eri.nao != nao || eri.ao_range() != (0..nao) {
            return Err(HessianError::DimensionMismatch(format!(
                "response needs the full {}-function ERI tensor, got {} components over AOs {:?}",
                nao,
                eri.ncomp,
                eri.ao_range()
            )));
        }
        Ok(ResponseOperator {
            eri,
            mo_coeff: reference.mo_coeff.clone(),
            mocc: reference.mocc(),
        })
    }

    pub fn nmo(&self) -> usize {
        self.mo_coeff.ncols()
    }

    pub fn nocc(&self) -> usize {
        self.mocc.ncols()
    }

    fn apply_one(&self, x: &DMatrix<f64>) -> DMatrix<f64> {
        let dm = &self.mo_coeff * (x * 2.0) * self.mocc.transpose();
        let dm1 = &dm + dm.transpose();
        let (vj, vk) = get_jk(self.eri, &dm1);
        let v1 = vj - vk * 0.5;
        self.mo_coeff.transpose() * v1 * &self.mocc
    }

    /// Each trial is handled on its own; results keep the input order.
    pub fn apply(&self, trials: &[DMatrix<f64>]) -> Result<Vec<DMatrix<f64>>, HessianError> {
        let (nmo, nocc) = (self.nmo(), self.nocc());
        if let Some(bad) = trials.iter().find(|x| x.shape() != (nmo, nocc)) {
            return Err(HessianError::DimensionMismatch(format!(
                "response trial is {:?}, expected ({}, {})",
                bad.shape(),
                nmo,
                nocc
            )));
        }
        Ok(trials.par_iter().map(|x| self.apply_one(x)).collect())
    }
}
