//! Hessian of the point-charge nuclear repulsion.

use crate::tensor::HessianTensor;
use basis::Molecule;
use nalgebra::Matrix3;

/// Off-diagonal blocks `q_i q_j (I/s³ - 3 r rᵀ/s⁵)` with `r = R_i - R_j`;
/// each diagonal block is minus the sum of its row.
pub fn hess_nuc(mol: &Molecule) -> HessianTensor {
    let natm = mol.natm();
    let mut hess = HessianTensor::zeros(natm);
    for i in 0..natm {
        let mut diag = Matrix3::zeros();
        for j in (0..natm).filter(|&j| j != i) {
            let r = mol.atom_coord(i) - mol.atom_coord(j);
            let s = r.norm();
            let qq = mol.atom_charge(i) * mol.atom_charge(j);
            let block = Matrix3::identity() * (qq / s.powi(3)) - r * r.transpose() * (3.0 * qq / s.powi(5));
            hess.set_block(i, j, block);
            diag -= block;
        }
        hess.set_block(i, i, diag);
    }
    hess
}

/// [`hess_nuc`] restricted to `atoms`.
pub fn hess_nuc_for(mol: &Molecule, atoms: &[usize]) -> HessianTensor {
    hess_nuc(mol).select(atoms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gradient::grad_nuc;
    use basis::Unit;
    use nalgebra::Vector3;

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

    #[test]
    fn test_matches_gradient_differences() {
        let mol = molecule();
        let hess = hess_nuc(&mol);
        let step = 1e-5;
        for b in 0..3 {
            for j in 0..3 {
                let plus = grad_nuc(&mol.displaced(b, j, step));
                let minus = grad_nuc(&mol.displaced(b, j, -step));
                for a in 0..3 {
                    for i in 0..3 {
                        let fd = (plus[a][i] - minus[a][i]) / (2.0 * step);
                        assert!(
                            (fd - hess.get(a, b, i, j)).abs() < 1e-7,
                            "({}, {}, {}, {}): fd {} analytic {}",
                            a, b, i, j, fd, hess.get(a, b, i, j)
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_symmetric_and_translation_invariant() {
        let hess = hess_nuc(&molecule());
        assert!(hess.max_asymmetry() < 1e-14);
        assert!(hess.translational_residual() < 1e-12);
        let sub = hess_nuc_for(&molecule(), &[2, 1]);
        assert_eq!(sub.block(0, 1), hess.block(2, 1));
    }
}
