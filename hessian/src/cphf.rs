//! Coupled-perturbed Hartree-Fock equations for nuclear displacements.
//!
//! For a perturbation with MO-basis Hamiltonian derivative `h1` and overlap
//! derivative `s1` (both `nmo x nocc`), the occupied block of the orbital
//! response is fixed by orthonormality, `mo1_oo = -s1_oo / 2`, and the
//! virtual block solves
//!
//! ```text
//! (e_a - e_i) x_ai + V(x)_ai = -(h1 - s1 e_i)_ai
//! ```
//!
//! where `V` is the [`ResponseOperator`] acting on the whole `mo1`.

use crate::error::HessianError;
use crate::integrals::IntegralProvider;
use crate::jk::rows_only;
use crate::krylov;
use crate::reference::ReferenceState;
use crate::response::ResponseOperator;
use crate::storage::{orbital_response_key, perturbed_hamiltonian_key, ResponseStore};
use basis::{Deriv1e, Operator};
use nalgebra::{DMatrix, DVector};
use std::time::Instant;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct CphfSolution {
    /// `nmo x nocc` per perturbation, MO basis.
    pub mo1: Vec<DMatrix<f64>>,
    /// `nocc x nocc` per perturbation.
    pub mo_e1: Vec<DMatrix<f64>>,
    pub residuals: Vec<f64>,
    pub converged: Vec<bool>,
}

fn scatter_rows(block: &DMatrix<f64>, rows: &[usize], nrows: usize) -> DMatrix<f64> {
    let mut full = DMatrix::zeros(nrows, block.ncols());
    for (src, &dst) in rows.iter().enumerate() {
        full.row_mut(dst).copy_from(&block.row(src));
    }
    full
}

/// Solves one set of perturbations; `h1` and `s1` are parallel slices.
pub fn solve(
    op: &ResponseOperator,
    reference: &ReferenceState,
    h1: &[DMatrix<f64>],
    s1: &[DMatrix<f64>],
    tol: f64,
    max_cycle: usize,
) -> Result<CphfSolution, HessianError> {
    let nmo = reference.nmo();
    let nocc = reference.nocc();
    if h1.len() != s1.len() {
        return Err(HessianError::DimensionMismatch(format!(
            "{} Hamiltonian derivatives but {} overlap derivatives",
            h1.len(),
            s1.len()
        )));
    }
    if let Some(bad) = h1.iter().chain(s1).find(|m| m.shape() != (nmo, nocc)) {
        return Err(HessianError::DimensionMismatch(format!(
            "perturbation is {:?}, expected ({}, {})",
            bad.shape(),
            nmo,
            nocc
        )));
    }

    let occ = reference.occ_indices();
    let vir = reference.vir_indices();
    let e_i = reference.mo_energy_occ();
    let e_a = DVector::from_iterator(vir.len(), vir.iter().map(|&a| reference.mo_energy[a]));
    let e_ai = DMatrix::from_fn(vir.len(), nocc, |a, i| e_a[a] - e_i[i]);
    let e_i_diag = DMatrix::from_diagonal(&e_i);

    let hs: Vec<DMatrix<f64>> = h1.iter().zip(s1).map(|(h, s)| h - s * &e_i_diag).collect();
    // occupied block of mo1, fixed by orthonormality
    let fixed: Vec<DMatrix<f64>> = s1
        .iter()
        .map(|s| scatter_rows(&(s.select_rows(&occ) * -0.5), &occ, nmo))
        .collect();

    let v_fixed = op.apply(&fixed)?;
    let rhs: Vec<DMatrix<f64>> = hs
        .iter()
        .zip(&v_fixed)
        .map(|(h, v)| -(h.select_rows(&vir) + v.select_rows(&vir)))
        .collect();

    let coupling = |xs: &[DMatrix<f64>]| -> Result<Vec<DMatrix<f64>>, HessianError> {
        let full: Vec<DMatrix<f64>> = xs.iter().map(|x| scatter_rows(x, &vir, nmo)).collect();
        Ok(op.apply(&full)?.iter().map(|v| v.select_rows(&vir)).collect())
    };
    let pcg = krylov::solve(coupling, &e_ai, &rhs, tol, max_cycle)?;

    let mut mo1: Vec<DMatrix<f64>> = pcg
        .x
        .iter()
        .zip(&fixed)
        .map(|(x, f)| scatter_rows(x, &vir, nmo) + f)
        .collect();
    let v1 = op.apply(&mo1)?;

    let mut mo_e1 = Vec::with_capacity(mo1.len());
    for k in 0..mo1.len() {
        // one more Jacobi step on the virtual block with the converged potential
        let refined = -(hs[k].select_rows(&vir) + v1[k].select_rows(&vir)).component_div(&e_ai);
        for (src, &a) in vir.iter().enumerate() {
            mo1[k].row_mut(a).copy_from(&refined.row(src));
        }

        let x_oo = fixed[k].select_rows(&occ);
        let gap = DMatrix::from_fn(nocc, nocc, |i, j| x_oo[(i, j)] * (e_i[i] - e_i[j]));
        mo_e1.push(hs[k].select_rows(&occ) + v1[k].select_rows(&occ) + gap);
    }

    Ok(CphfSolution {
        mo1,
        mo_e1,
        residuals: pcg.residuals,
        converged: pcg.converged,
    })
}

/// Atoms per CPHF batch so the batched trial arrays fit in `max_memory` MB.
///
/// A budget below one atom's arrays yields single-atom batches.
pub fn atoms_per_batch(max_memory: f64, nmo: usize, nocc: usize) -> usize {
    let per_atom = (nmo * nocc * 3 * 6).max(1) as f64;
    ((max_memory * 1e6 / 8.0 / per_atom) as usize).max(1)
}

/// `s1a` restricted to the rows of one atom plus its transpose.
pub fn overlap_deriv(s1a: &[DMatrix<f64>], p0: usize, p1: usize) -> Vec<DMatrix<f64>> {
    s1a.iter()
        .map(|s| {
            let rows = rows_only(s, p0..p1);
            rows.transpose() + rows
        })
        .collect()
}

/// `-<nabla i|j>`
pub fn ip_overlap<P: IntegralProvider>(provider: &P) -> Result<Vec<DMatrix<f64>>, HessianError> {
    Ok(provider
        .int1e(Operator::Overlap, Deriv1e::Bra)?
        .into_iter()
        .map(|s| -s)
        .collect())
}

/// Solves the response of every listed atom, batching atoms to respect
/// `max_memory`. `mo1` (back-transformed to the AO basis, `nao x nocc`) goes
/// to the store; `mo_e1` is returned in the order of `atoms`.
#[allow(clippy::too_many_arguments)]
pub fn solve_mo1<P: IntegralProvider>(
    provider: &P,
    reference: &ReferenceState,
    op: &ResponseOperator,
    store: &mut dyn ResponseStore,
    atoms: &[usize],
    tol: f64,
    max_cycle: usize,
    max_memory: f64,
) -> Result<Vec<Vec<DMatrix<f64>>>, HessianError> {
    let start = Instant::now();
    let mo_coeff = &reference.mo_coeff;
    let mocc = reference.mocc();
    let to_mo = |m: &DMatrix<f64>| mo_coeff.transpose() * m * &mocc;

    let s1a = ip_overlap(provider)?;
    let slices = provider.aoslice_by_atom();
    let batch = atoms_per_batch(max_memory, reference.nmo(), reference.nocc());
    info!("Solving CPHF for {} atoms, {} per batch", atoms.len(), batch);

    let mut mo_e1 = Vec::with_capacity(atoms.len());
    for chunk in atoms.chunks(batch) {
        let mut h1mo = Vec::with_capacity(chunk.len() * 3);
        let mut s1mo = Vec::with_capacity(chunk.len() * 3);
        for &ia in chunk {
            let [_, _, p0, p1] = slices[ia];
            s1mo.extend(overlap_deriv(&s1a, p0, p1).iter().map(to_mo));
            h1mo.extend(store.load(&perturbed_hamiltonian_key(ia))?.iter().map(to_mo));
        }

        let solution = solve(op, reference, &h1mo, &s1mo, tol, max_cycle)?;
        if let Some(k) = solution.converged.iter().position(|&c| !c) {
            return Err(HessianError::SolverDivergence {
                atom: chunk[k / 3],
                residual: solution.residuals[k],
                max_cycle,
            });
        }

        for (n, &ia) in chunk.iter().enumerate() {
            let mo1_ao: Vec<DMatrix<f64>> = solution.mo1[3 * n..3 * n + 3]
                .iter()
                .map(|x| mo_coeff * x)
                .collect();
            store.save(&orbital_response_key(ia), &mo1_ao)?;
            mo_e1.push(solution.mo_e1[3 * n..3 * n + 3].to_vec());
        }
        debug!(
            "CPHF batch {:?} done, max residual {:.3e}",
            chunk,
            solution.residuals.iter().fold(0.0_f64, |m, &r| m.max(r))
        );
    }
    debug!("solve_mo1 took {:.2?}", start.elapsed());
    Ok(mo_e1)
}
