//! Restricted Hartree-Fock ground state with DIIS acceleration.

use crate::diis::Diis;
use crate::error::HessianError;
use crate::integrals::IntegralProvider;
use crate::jk::get_jk;
use crate::reference::ReferenceState;
use basis::{Deriv1e, Deriv2e, Operator};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScfOptions {
    pub max_cycle: usize,
    /// Energy change between cycles.
    pub conv_tol: f64,
    /// Largest element of FDS - SDF.
    pub conv_tol_grad: f64,
    pub diis_space: usize,
}

impl Default for ScfOptions {
    fn default() -> Self {
        ScfOptions {
            max_cycle: 100,
            conv_tol: 1e-12,
            conv_tol_grad: 1e-9,
            diis_space: 8,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScfResult {
    pub e_tot: f64,
    pub e_nuc: f64,
    pub cycles: usize,
    pub reference: ReferenceState,
}

/// Given a matrix where each column is an eigenvector, flips each column so
/// that its entry of largest magnitude is positive.
pub fn align_eigenvectors(mut eigvecs: DMatrix<f64>) -> DMatrix<f64> {
    for j in 0..eigvecs.ncols() {
        let max_val = eigvecs
            .column(j)
            .iter()
            .copied()
            .max_by(|a, b| a.abs().partial_cmp(&b.abs()).unwrap_or(Ordering::Less))
            .unwrap_or(0.0);
        if max_val < 0.0 {
            eigvecs.column_mut(j).neg_mut();
        }
    }
    eigvecs
}

/// Symmetric orthogonalization S^{-1/2}, dropping near-linear dependencies.
pub fn orthogonalizer(overlap: &DMatrix<f64>) -> DMatrix<f64> {
    let eig = overlap.clone().symmetric_eigen();
    let threshold = 1e-10;
    let inv_sqrt_vals = eig
        .eigenvalues
        .map(|val| if val > threshold { 1.0 / val.sqrt() } else { 0.0 });
    &eig.eigenvectors * DMatrix::from_diagonal(&inv_sqrt_vals) * eig.eigenvectors.transpose()
}

/// Eigenvectors of a symmetric matrix, ordered by ascending eigenvalue.
fn sorted_eigen(matrix: DMatrix<f64>) -> DMatrix<f64> {
    let eig = matrix.symmetric_eigen();
    let mut indices: Vec<usize> = (0..eig.eigenvalues.len()).collect();
    indices.sort_by(|&a, &b| {
        eig.eigenvalues[a]
            .partial_cmp(&eig.eigenvalues[b])
            .unwrap_or(Ordering::Equal)
    });
    eig.eigenvectors.select_columns(&indices)
}

fn max_off_diagonal(m: &DMatrix<f64>) -> f64 {
    let mut worst = 0.0_f64;
    for j in 0..m.ncols() {
        for i in (0..m.nrows()).filter(|&i| i != j) {
            worst = worst.max(m[(i, j)].abs());
        }
    }
    worst
}

/// Largest off-diagonal element of `Cᵀ F C` accepted as canonical.
const CANONICAL_TOL: f64 = 1e-10;
const MAX_REFINEMENTS: usize = 10;

/// Solves F C = S C e in the orthogonal basis `x`; eigenpairs in ascending order.
///
/// The eigenvectors are re-diagonalized in the MO basis until `Cᵀ F C` is
/// diagonal to [`CANONICAL_TOL`], and `e` is read off its diagonal.
fn diagonalize(fock: &DMatrix<f64>, x: &DMatrix<f64>) -> Result<(DVector<f64>, DMatrix<f64>), HessianError> {
    let mut coeffs = x * sorted_eigen(x.transpose() * fock * x);
    let mut round = 0;
    loop {
        let f_mo = coeffs.transpose() * fock * &coeffs;
        let f_mo = (&f_mo + f_mo.transpose()) * 0.5;
        let off_diagonal = max_off_diagonal(&f_mo);
        if off_diagonal < CANONICAL_TOL {
            return Ok((f_mo.diagonal(), align_eigenvectors(coeffs)));
        }
        if round == MAX_REFINEMENTS {
            return Err(HessianError::NonCanonical { off_diagonal });
        }
        round += 1;
        debug!("Refining orbitals, round {}: max off-diagonal {:.3e}", round, off_diagonal);
        coeffs = coeffs * sorted_eigen(f_mo);
    }
}

fn density(coeffs: &DMatrix<f64>, nocc: usize) -> DMatrix<f64> {
    let mocc = coeffs.columns(0, nocc);
    mocc * mocc.transpose() * 2.0
}

/// Closed-shell SCF over the integrals of one geometry.
pub struct Rhf<'a, P: IntegralProvider> {
    provider: &'a P,
    options: ScfOptions,
    charge: i32,
    initial_density: Option<DMatrix<f64>>,
}

impl<'a, P: IntegralProvider> Rhf<'a, P> {
    pub fn new(provider: &'a P, options: ScfOptions) -> Self {
        Rhf {
            provider,
            options,
            charge: 0,
            initial_density: None,
        }
    }

    pub fn with_charge(mut self, charge: i32) -> Self {
        self.charge = charge;
        self
    }

    /// Starts from `dm` instead of the core-Hamiltonian guess.
    pub fn with_initial_density(mut self, dm: DMatrix<f64>) -> Self {
        self.initial_density = Some(dm);
        self
    }

    pub fn kernel(&self) -> Result<ScfResult, HessianError> {
        let provider = self.provider;
        let nao = provider.nao();
        let nelectron = provider.molecule().nelectron(self.charge);
        if nelectron <= 0 || nelectron % 2 != 0 {
            return Err(HessianError::OpenShell(nelectron));
        }
        let nocc = (nelectron / 2) as usize;
        if nocc > nao {
            return Err(HessianError::DimensionMismatch(format!(
                "{} occupied orbitals do not fit in {} basis functions",
                nocc, nao
            )));
        }

        let overlap = provider.int1e(Operator::Overlap, Deriv1e::None)?.remove(0);
        let h_core = provider.int1e(Operator::Kinetic, Deriv1e::None)?.remove(0)
            + provider.int1e(Operator::Nuclear, Deriv1e::None)?.remove(0);
        let eri = provider.int2e(Deriv2e::None, 0..provider.nbas())?;
        let e_nuc = provider.molecule().energy_nuc();
        let x = orthogonalizer(&overlap);

        let mut dm = match &self.initial_density {
            Some(dm) if dm.nrows() == nao && dm.ncols() == nao => dm.clone(),
            Some(dm) => {
                return Err(HessianError::DimensionMismatch(format!(
                    "initial density is {}x{}, basis has {} functions",
                    dm.nrows(),
                    dm.ncols(),
                    nao
                )))
            }
            None => density(&diagonalize(&h_core, &x)?.1, nocc),
        };
        info!("RHF: {} basis functions, {} occupied orbitals", nao, nocc);

        let mut diis = Diis::new(self.options.diis_space);
        let mut e_old = 0.0;
        let mut delta_e = f64::INFINITY;
        let mut error = f64::INFINITY;

        for cycle in 0..self.options.max_cycle {
            let (vj, vk) = get_jk(&eri, &dm);
            let fock = &h_core + vj - vk * 0.5;
            let e_tot = 0.5 * dm.dot(&(&h_core + &fock)) + e_nuc;
            let err = Diis::error_matrix(&fock, &dm, &overlap);
            error = err.amax();
            delta_e = e_tot - e_old;
            debug!("Cycle {}: E = {:.12} au, dE = {:.3e}, |FDS - SDF| = {:.3e}", cycle, e_tot, delta_e, error);

            if cycle > 0 && delta_e.abs() < self.options.conv_tol && error < self.options.conv_tol_grad {
                let (mo_energy, mo_coeff) = diagonalize(&fock, &x)?;
                let mo_occ = DVector::from_fn(nao, |p, _| if p < nocc { 2.0 } else { 0.0 });
                info!("SCF converged in {} cycles, E = {:.12} au", cycle + 1, e_tot);
                return Ok(ScfResult {
                    e_tot,
                    e_nuc,
                    cycles: cycle + 1,
                    reference: ReferenceState::new(mo_coeff, mo_energy, mo_occ),
                });
            }

            diis.update(fock.clone(), err);
            let fock = if diis.size() >= 2 {
                diis.extrapolate().unwrap_or(fock)
            } else {
                fock
            };
            let (_, coeffs) = diagonalize(&fock, &x)?;
            dm = density(&coeffs, nocc);
            e_old = e_tot;
        }

        Err(HessianError::ScfNotConverged {
            max_cycle: self.options.max_cycle,
            delta_e,
            error,
        })
    }
}
