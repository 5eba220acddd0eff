//! First derivative of the closed-shell Fock operator with respect to nuclear coordinates.

use crate::error::HessianError;
use crate::gradient::ip_core;
use crate::integrals::IntegralProvider;
use crate::jk::{contract, rows_only, Script};
use crate::reference::ReferenceState;
use crate::storage::{perturbed_hamiltonian_key, ResponseStore};
use basis::{Deriv1e, Deriv2e, Operator};
use nalgebra::DMatrix;
use std::time::Instant;
use tracing::debug;

/// `dF/dR_A` for one atom (x, y, z), in the AO basis with fixed orbitals.
pub fn perturbed_hamiltonian<P: IntegralProvider>(
    provider: &P,
    core: &[DMatrix<f64>],
    dm0: &DMatrix<f64>,
    atom: usize,
) -> Result<Vec<DMatrix<f64>>, HessianError> {
    let [shl0, shl1, p0, p1] = provider.aoslice_by_atom()[atom];
    let mol = provider.molecule();

    // one-electron part before the final symmetrization
    let mut h1 = provider.int1e(Operator::Rinv(mol.atom_coord(atom)), Deriv1e::Bra)?;
    for (h, c) in h1.iter_mut().zip(core) {
        *h *= -mol.atom_charge(atom);
        *h += rows_only(c, p0..p1);
    }

    let ip1 = provider.int2e(Deriv2e::Bra1, shl0..shl1)?;
    let neg_dm = -dm0;
    let vj1 = contract(&ip1, Script::JiKl, &neg_dm);
    let vj2 = contract(&ip1, Script::LkIj, &neg_dm);
    let vk1 = contract(&ip1, Script::LiKj, &neg_dm);
    let vk2 = contract(&ip1, Script::JkIl, &neg_dm);

    Ok(h1
        .into_iter()
        .enumerate()
        .map(|(x, h)| {
            let h = h + &vj1[x] - &vk1[x] * 0.5 + &vj2[x] - &vk2[x] * 0.5;
            h.transpose() + h
        })
        .collect())
}

/// Builds `h1` for every atom in `atoms` and stores it under
/// `perturbed_hamiltonian/<atom>`.
pub fn make_h1<P: IntegralProvider>(
    provider: &P,
    reference: &ReferenceState,
    atoms: &[usize],
    store: &mut dyn ResponseStore,
) -> Result<(), HessianError> {
    let start = Instant::now();
    let dm0 = reference.dm0();
    let core = ip_core(provider)?;
    for &ia in atoms {
        let h1 = perturbed_hamiltonian(provider, &core, &dm0, ia)?;
        store.save(&perturbed_hamiltonian_key(ia), &h1)?;
    }
    debug!("make_h1 for {} atoms took {:.2?}", atoms.len(), start.elapsed());
    Ok(())
}
