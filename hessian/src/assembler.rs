//! Electronic part of the RHF nuclear Hessian.
//!
//! Second-derivative integrals are contracted with the ground-state densities
//! and first-order response quantities are contracted with the perturbed
//! Hamiltonians. Blocks are computed for `B <= A` in the order of the atom
//! list; the upper half follows from `H[B,A] = H[A,B]ᵀ`.

use crate::cphf::{ip_overlap, overlap_deriv};
use crate::error::HessianError;
use crate::integrals::IntegralProvider;
use crate::jk::{block_dot, contract, Script};
use crate::reference::ReferenceState;
use crate::storage::{orbital_response_key, perturbed_hamiltonian_key, ResponseStore};
use crate::tensor::HessianTensor;
use basis::{Deriv1e, Deriv2e, Operator};
use nalgebra::{DMatrix, Matrix3};
use std::time::Instant;
use tracing::{debug, info};

// 9-component stacks, component 3x + y
type Stack9 = Vec<DMatrix<f64>>;

/// `Z_A <nabla nabla i|1/r_A|j>` and `Z_A <nabla i|1/r_A|nabla j>`.
fn hess_rinv<P: IntegralProvider>(provider: &P, atom: usize) -> Result<(Stack9, Stack9), HessianError> {
    let mol = provider.molecule();
    let z = mol.atom_charge(atom);
    let origin = mol.atom_coord(atom);
    let scale = |stack: Vec<DMatrix<f64>>| stack.into_iter().map(|m| m * z).collect::<Stack9>();
    Ok((
        scale(provider.int1e(Operator::Rinv(origin), Deriv1e::BraBra)?),
        scale(provider.int1e(Operator::Rinv(origin), Deriv1e::BraKet)?),
    ))
}

fn sum_pair(a: Vec<DMatrix<f64>>, b: Vec<DMatrix<f64>>) -> Vec<DMatrix<f64>> {
    a.into_iter().zip(b).map(|(x, y)| x + y).collect()
}

/// Two-electron second-derivative potential for atom A, contracted with `dm0`.
/// Returns the distinct-center stack (rows of the partner atom are used) and
/// the same-center stack (rows of A are used).
fn two_electron_blocks<P: IntegralProvider>(
    provider: &P,
    dm0: &DMatrix<f64>,
    shells: std::ops::Range<usize>,
) -> Result<(Stack9, Stack9), HessianError> {
    let ipip1 = provider.int2e(Deriv2e::Bra1Bra1, shells.clone())?;
    let vj = contract(&ipip1, Script::LkIj, dm0);
    let vk = contract(&ipip1, Script::JkIl, dm0);
    let vhf_diag: Stack9 = vj.into_iter().zip(vk).map(|(j, k)| j - k * 0.5).collect();
    drop(ipip1);

    let ip1ip2 = provider.int2e(Deriv2e::Bra1Bra2, shells.clone())?;
    let vj1 = contract(&ip1ip2, Script::JiKl, dm0);
    let vk1 = contract(&ip1ip2, Script::LiKj, dm0);
    let vk2 = contract(&ip1ip2, Script::LjKi, dm0);
    drop(ip1ip2);

    let ipvip1 = provider.int2e(Deriv2e::Bra1Ket1, shells)?;
    let vj3 = contract(&ipvip1, Script::LkIj, dm0);
    let vk3 = contract(&ipvip1, Script::LiKj, dm0);

    let vhf: Stack9 = (0..9)
        .map(|c| {
            &vj1[c] * 2.0 - &vk1[c] * 0.5 - &vk2[c] * 0.5 + vj3[c].transpose() - vk3[c].transpose() * 0.5
        })
        .collect();
    Ok((vhf, vhf_diag))
}

/// `Σ_pq m[3x+y][p,q] d[p,q]` over the given rows and columns, as a 3x3 block.
fn contract9(
    stack: &[DMatrix<f64>],
    d: &DMatrix<f64>,
    rows: std::ops::Range<usize>,
    cols: std::ops::Range<usize>,
) -> Matrix3<f64> {
    Matrix3::from_fn(|x, y| block_dot(&stack[3 * x + y], d, rows.clone(), cols.clone()))
}

/// Electronic Hessian for `atoms`; `h1` and `mo1` are read from `store`,
/// `mo_e1` is parallel to `atoms`.
pub fn hess_elec<P: IntegralProvider>(
    provider: &P,
    reference: &ReferenceState,
    atoms: &[usize],
    store: &dyn ResponseStore,
    mo_e1: &[Vec<DMatrix<f64>>],
) -> Result<HessianTensor, HessianError> {
    let start = Instant::now();
    let nao = provider.nao();
    if mo_e1.len() != atoms.len() {
        return Err(HessianError::DimensionMismatch(format!(
            "{} orbital-energy responses for {} atoms",
            mo_e1.len(),
            atoms.len()
        )));
    }
    let all = 0..nao;
    let mocc = reference.mocc();
    let dm0 = reference.dm0();
    let dme0 = reference.dme0();
    let e_occ = DMatrix::from_diagonal(&reference.mo_energy_occ());

    let h1aa = sum_pair(
        provider.int1e(Operator::Kinetic, Deriv1e::BraBra)?,
        provider.int1e(Operator::Nuclear, Deriv1e::BraBra)?,
    );
    let h1ab = sum_pair(
        provider.int1e(Operator::Kinetic, Deriv1e::BraKet)?,
        provider.int1e(Operator::Nuclear, Deriv1e::BraKet)?,
    );
    let s1a = ip_overlap(provider)?;
    let s1aa = provider.int1e(Operator::Overlap, Deriv1e::BraBra)?;
    let s1ab = provider.int1e(Operator::Overlap, Deriv1e::BraKet)?;

    let slices = provider.aoslice_by_atom();
    let rinv = atoms
        .iter()
        .map(|&ia| hess_rinv(provider, ia))
        .collect::<Result<Vec<_>, _>>()?;

    // first-order densities: mo1 C_occᵀ and mo1 e_occ C_occᵀ per atom and direction
    let mut dm1 = Vec::with_capacity(atoms.len());
    let mut dm1e = Vec::with_capacity(atoms.len());
    for &ja in atoms {
        let mo1 = store.load(&orbital_response_key(ja))?;
        if mo1.len() != 3 || mo1.iter().any(|m| m.shape() != (nao, mocc.ncols())) {
            return Err(HessianError::DimensionMismatch(format!(
                "orbital response of atom {} does not match the reference",
                ja
            )));
        }
        dm1.push(mo1.iter().map(|m| m * mocc.transpose()).collect::<Vec<_>>());
        dm1e.push(mo1.iter().map(|m| m * &e_occ * mocc.transpose()).collect::<Vec<_>>());
    }

    let mut hess = HessianTensor::zeros(atoms.len());
    for (i0, &ia) in atoms.iter().enumerate() {
        let [shl0, shl1, p0, p1] = slices[ia];
        let h1ao = store.load(&perturbed_hamiltonian_key(ia))?;
        let (vhf, vhf_diag) = two_electron_blocks(provider, &dm0, shl0..shl1)?;

        let (rinv2aa, rinv2ab) = &rinv[i0];
        let hcore: Stack9 = (0..9)
            .map(|c| {
                let mut m = &rinv2ab[c] + rinv2aa[c].transpose();
                let mut rows = m.rows_mut(p0, p1 - p0);
                rows += h1ab[c].rows(p0, p1 - p0);
                m
            })
            .collect();
        let s1ao = overlap_deriv(&s1a, p0, p1);
        let s1oo: Vec<DMatrix<f64>> = s1ao.iter().map(|s| mocc.transpose() * s * &mocc).collect();

        for (j0, &ja) in atoms.iter().enumerate().take(i0 + 1) {
            let [_, _, q0, q1] = slices[ja];
            let (v2aa, v2ab) = &rinv[j0];

            // response contributions, *2 for double occupancy and *2 for the c.c.
            let mut de = Matrix3::from_fn(|x, y| {
                h1ao[x].dot(&dm1[j0][y]) * 4.0 - s1ao[x].dot(&dm1e[j0][y]) * 4.0
                    - s1oo[x].dot(&mo_e1[j0][y]) * 2.0
            });

            de += contract9(v2aa, &dm0, p0..p1, all.clone()) * 2.0;
            de += contract9(v2ab, &dm0, p0..p1, all.clone()) * 2.0;
            de += contract9(&hcore, &dm0, all.clone(), q0..q1) * 2.0;
            de += contract9(&vhf, &dm0, q0..q1, all.clone()) * 2.0;
            de -= contract9(&s1ab, &dme0, p0..p1, q0..q1) * 2.0;

            if i0 == j0 {
                de += contract9(&h1aa, &dm0, p0..p1, all.clone()) * 2.0;
                de -= contract9(v2aa, &dm0, all.clone(), all.clone()) * 2.0;
                de -= contract9(v2ab, &dm0, all.clone(), all.clone()) * 2.0;
                de += contract9(&vhf_diag, &dm0, p0..p1, all.clone()) * 2.0;
                de -= contract9(&s1aa, &dme0, p0..p1, all.clone()) * 2.0;
                hess.set_block(i0, i0, (de + de.transpose()) * 0.5);
            } else {
                hess.set_pair(i0, j0, de);
            }
        }
        debug!("Hessian row for atom {} done", ia);
    }
    info!("Electronic Hessian assembled in {:.2?}", start.elapsed());
    Ok(hess)
}
