//! Finite-difference Hessian from central differences of analytic gradients.

use crate::error::HessianError;
use crate::gradient;
use crate::scf::{Rhf, ScfOptions};
use crate::tensor::HessianTensor;
use basis::{AoBasis, Molecule};
use nalgebra::{DMatrix, Vector3};
use rayon::prelude::*;
use tracing::debug;

/// Analytic gradient at `molecule`, with the SCF restarted from `dm`.
fn displaced_gradient(
    molecule: &Molecule,
    basis_name: &str,
    charge: i32,
    dm: &DMatrix<f64>,
    options: &ScfOptions,
) -> Result<Vec<Vector3<f64>>, HessianError> {
    let basis = AoBasis::build(molecule, basis_name)?;
    let scf = Rhf::new(&basis, options.clone())
        .with_charge(charge)
        .with_initial_density(dm.clone())
        .kernel()?;
    gradient::kernel(&basis, &scf.reference)
}

/// `H[a,b,i,j] = (g(R + h e_bj)[a,i] - g(R - h e_bj)[a,i]) / 2h` over `atoms`.
///
/// The result is not symmetrized.
pub fn finite_difference_hessian(
    molecule: &Molecule,
    basis_name: &str,
    charge: i32,
    dm: &DMatrix<f64>,
    options: &ScfOptions,
    step: f64,
    atoms: &[usize],
) -> Result<HessianTensor, HessianError> {
    if let Some(&ia) = atoms.iter().find(|&&ia| ia >= molecule.natm()) {
        return Err(HessianError::DimensionMismatch(format!(
            "atom {} is out of range for a molecule with {} atoms",
            ia,
            molecule.natm()
        )));
    }
    let displacements: Vec<(usize, usize)> = (0..atoms.len())
        .flat_map(|j0| (0..3).map(move |dir| (j0, dir)))
        .collect();

    let columns = displacements
        .par_iter()
        .map(|&(j0, dir)| {
            let ja = atoms[j0];
            let plus = displaced_gradient(&molecule.displaced(ja, dir, step), basis_name, charge, dm, options)?;
            let minus = displaced_gradient(&molecule.displaced(ja, dir, -step), basis_name, charge, dm, options)?;
            debug!("Displacement of atom {} along {} done", ja, dir);
            Ok(plus
                .iter()
                .zip(&minus)
                .map(|(p, m)| (p - m) / (2.0 * step))
                .collect::<Vec<Vector3<f64>>>())
        })
        .collect::<Result<Vec<_>, HessianError>>()?;

    let mut hess = HessianTensor::zeros(atoms.len());
    for (&(j0, dir), column) in displacements.iter().zip(&columns) {
        for (i0, &ia) in atoms.iter().enumerate() {
            let mut block = *hess.block(i0, j0);
            block.set_column(dir, &column[ia]);
            hess.set_block(i0, j0, block);
        }
    }
    Ok(hess)
}
