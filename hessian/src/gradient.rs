//! Analytic RHF nuclear gradient.

use crate::error::HessianError;
use crate::integrals::IntegralProvider;
use crate::jk::{block_dot, contract, Script};
use crate::reference::ReferenceState;
use basis::{Deriv1e, Deriv2e, Molecule, Operator};
use nalgebra::{DMatrix, Vector3};
use tracing::debug;

/// d h_core / d R_A as three full `nao x nao` matrices.
///
/// `ip_core` holds `-<nabla i|T + V|j>`, the part shared by all atoms.
pub fn hcore_deriv<P: IntegralProvider>(
    provider: &P,
    ip_core: &[DMatrix<f64>],
    atom: usize,
) -> Result<Vec<DMatrix<f64>>, HessianError> {
    let mol = provider.molecule();
    let [_, _, p0, p1] = provider.aoslice_by_atom()[atom];
    let mut vrinv = provider.int1e(Operator::Rinv(mol.atom_coord(atom)), Deriv1e::Bra)?;
    for (v, h) in vrinv.iter_mut().zip(ip_core) {
        *v *= -mol.atom_charge(atom);
        let mut rows = v.rows_mut(p0, p1 - p0);
        rows += h.rows(p0, p1 - p0);
    }
    Ok(vrinv.into_iter().map(|v| v.transpose() + v).collect())
}

/// `-<nabla i|T + V|j>`
pub fn ip_core<P: IntegralProvider>(provider: &P) -> Result<Vec<DMatrix<f64>>, HessianError> {
    let kin = provider.int1e(Operator::Kinetic, Deriv1e::Bra)?;
    let nuc = provider.int1e(Operator::Nuclear, Deriv1e::Bra)?;
    Ok(kin.into_iter().zip(nuc).map(|(t, v)| -(t + v)).collect())
}

/// Electronic part of dE/dR for every atom.
pub fn grad_elec<P: IntegralProvider>(
    provider: &P,
    reference: &ReferenceState,
) -> Result<Vec<Vector3<f64>>, HessianError> {
    reference.validate(provider.nao())?;
    let nao = provider.nao();
    let dm0 = reference.dm0();
    let dme0 = reference.dme0();

    let h1 = ip_core(provider)?;
    let s1: Vec<DMatrix<f64>> = provider
        .int1e(Operator::Overlap, Deriv1e::Bra)?
        .into_iter()
        .map(|s| -s)
        .collect();

    let ip1 = provider.int2e(Deriv2e::Bra1, 0..provider.nbas())?;
    let vj = contract(&ip1, Script::LkIj, &dm0);
    let vk = contract(&ip1, Script::JkIl, &dm0);
    let vhf: Vec<DMatrix<f64>> = vj.into_iter().zip(vk).map(|(j, k)| -(j - k * 0.5)).collect();

    let slices = provider.aoslice_by_atom();
    let mut de = Vec::with_capacity(slices.len());
    for (ia, &[_, _, p0, p1]) in slices.iter().enumerate() {
        let h1ao = hcore_deriv(provider, &h1, ia)?;
        let g = Vector3::from_fn(|x, _| {
            h1ao[x].dot(&dm0) + block_dot(&vhf[x], &dm0, p0..p1, 0..nao) * 2.0
                - block_dot(&s1[x], &dme0, p0..p1, 0..nao) * 2.0
        });
        de.push(g);
    }
    debug!("Electronic gradient evaluated for {} atoms", de.len());
    Ok(de)
}

/// Point-charge repulsion gradient.
pub fn grad_nuc(mol: &Molecule) -> Vec<Vector3<f64>> {
    let natm = mol.natm();
    (0..natm)
        .map(|j| {
            let mut g = Vector3::zeros();
            for i in (0..natm).filter(|&i| i != j) {
                let r = mol.atom_coord(j) - mol.atom_coord(i);
                g -= r * (mol.atom_charge(i) * mol.atom_charge(j) / r.norm().powi(3));
            }
            g
        })
        .collect()
}

/// Total dE/dR.
pub fn kernel<P: IntegralProvider>(
    provider: &P,
    reference: &ReferenceState,
) -> Result<Vec<Vector3<f64>>, HessianError> {
    let elec = grad_elec(provider, reference)?;
    Ok(elec
        .into_iter()
        .zip(grad_nuc(provider.molecule()))
        .map(|(e, n)| e + n)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scf::{Rhf, ScfOptions};
    use basis::{AoBasis, Unit};

    fn molecule() -> Molecule {
        Molecule::from_symbols(
            &["O", "H", "H"],
            &[
                Vector3::new(0.0, 0.1, 0.0),
                Vector3::new(0.0, 1.5, -1.0),
                Vector3::new(0.1, -1.4, -1.2),
            ],
            Unit::Bohr,
        )
        .unwrap()
    }

    fn tight() -> ScfOptions {
        ScfOptions {
            conv_tol: 1e-12,
            conv_tol_grad: 1e-10,
            max_cycle: 200,
            ..ScfOptions::default()
        }
    }

    #[test]
    fn test_gradient_matches_energy_differences() {
        let mol = molecule();
        let basis = AoBasis::build(&mol, "sto-3g").unwrap();
        let scf = Rhf::new(&basis, tight()).kernel().unwrap();
        let grad = kernel(&basis, &scf.reference).unwrap();
        let dm0 = scf.reference.dm0();

        let step = 1e-4;
        for (ia, dir) in [(0, 1), (1, 2), (2, 0)] {
            let energy = |h: f64| {
                let b = AoBasis::build(&mol.displaced(ia, dir, h), "sto-3g").unwrap();
                Rhf::new(&b, tight())
                    .with_initial_density(dm0.clone())
                    .kernel()
                    .unwrap()
                    .e_tot
            };
            let fd = (energy(step) - energy(-step)) / (2.0 * step);
            assert!(
                (fd - grad[ia][dir]).abs() < 1e-6,
                "atom {} dir {}: fd {} analytic {}",
                ia,
                dir,
                fd,
                grad[ia][dir]
            );
        }
    }

    #[test]
    fn test_nuclear_gradient_sums_to_zero() {
        let g = grad_nuc(&molecule());
        let total: Vector3<f64> = g.iter().sum();
        assert!(total.norm() < 1e-12);
        // two protons on the z axis push apart
        let h2 = Molecule::from_symbols(&["H", "H"], &[Vector3::zeros(), Vector3::new(0.0, 0.0, 2.0)], Unit::Bohr)
            .unwrap();
        let g = grad_nuc(&h2);
        assert!((g[0].z - 0.25).abs() < 1e-14);
        assert!((g[1].z + 0.25).abs() < 1e-14);
    }
}
