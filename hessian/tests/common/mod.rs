//! Shared molecules and settings for the integration tests

use basis::{AoBasis, Molecule, Unit};
use hessian::{Rhf, ScfOptions, ScfResult};
use nalgebra::Vector3;

pub fn h4() -> Molecule {
    Molecule::from_symbols(
        &["H", "H", "H", "H"],
        &[
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::new(0.0, -1.517, 1.177),
            Vector3::new(0.0, 1.517, 1.177),
        ],
        Unit::Bohr,
    )
    .unwrap()
}

pub fn water() -> Molecule {
    Molecule::from_symbols(
        &["O", "H", "H"],
        &[
            Vector3::new(0.0, 0.0, 0.2217),
            Vector3::new(0.0, 1.4309, -0.8867),
            Vector3::new(0.0, -1.4309, -0.8867),
        ],
        Unit::Bohr,
    )
    .unwrap()
}

pub fn tight_scf() -> ScfOptions {
    ScfOptions {
        max_cycle: 200,
        conv_tol: 1e-12,
        conv_tol_grad: 1e-11,
        ..ScfOptions::default()
    }
}

pub fn converged(mol: &Molecule, basis_name: &str) -> (AoBasis, ScfResult) {
    let basis = AoBasis::build(mol, basis_name).unwrap();
    let scf = Rhf::new(&basis, tight_scf()).kernel().unwrap();
    (basis, scf)
}
