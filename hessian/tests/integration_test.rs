//! End-to-end tests of the analytic Hessian against finite differences,
//! reference values and its own invariants.

mod common;

use common::{converged, h4, tight_scf, water};
use hessian::cphf;
use hessian::{
    finite_difference_hessian, Hessian, HessianError, HessianOptions, ReferenceState, ResponseOperator,
};
use nalgebra::DMatrix;
use std::path::PathBuf;
use std::process::Command;

fn tight_response() -> HessianOptions {
    HessianOptions {
        conv_tol: 1e-12,
        max_cycle: 100,
        ..HessianOptions::default()
    }
}

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[test]
    fn test_h4_fingerprint() {
        let (basis, scf) = converged(&h4(), "6-31G");
        let hess = Hessian::new(&basis, &scf.reference, tight_response()).kernel().unwrap();
        let fp = hess.fingerprint();
        assert!(
            (fp - (-0.50693144355876429)).abs() < 1e-6,
            "fingerprint {}",
            fp
        );
    }

    #[test]
    fn test_symmetry_and_translational_invariance() {
        for (mol, name) in [(h4(), "6-31G"), (water(), "sto-3g")] {
            let (basis, scf) = converged(&mol, name);
            let hess = Hessian::new(&basis, &scf.reference, tight_response()).kernel().unwrap();
            assert_eq!(hess.max_asymmetry(), 0.0);
            assert!(
                hess.translational_residual() < 1e-7,
                "{}: translational residual {}",
                name,
                hess.translational_residual()
            );
        }
    }

    #[test]
    fn test_matches_finite_differences() {
        let mol = h4();
        let (basis, scf) = converged(&mol, "sto-3g");
        let analytic = Hessian::new(&basis, &scf.reference, tight_response()).kernel().unwrap();
        let atoms: Vec<usize> = (0..mol.natm()).collect();
        let numeric = finite_difference_hessian(
            &mol,
            "sto-3g",
            0,
            &scf.reference.dm0(),
            &tight_scf(),
            5e-5,
            &atoms,
        )
        .unwrap();

        let a = analytic.to_cartesian();
        let n = numeric.to_cartesian();
        for r in 0..a.nrows() {
            for c in 0..a.ncols() {
                assert!(
                    (a[(r, c)] - n[(r, c)]).abs() < 1e-6,
                    "entry ({}, {}): analytic {} numeric {}",
                    r,
                    c,
                    a[(r, c)],
                    n[(r, c)]
                );
            }
        }
    }

    #[test]
    fn test_water_hydrogens_match_finite_differences() {
        let mol = water();
        let (basis, scf) = converged(&mol, "sto-3g");
        let options = HessianOptions {
            atoms: Some(vec![2, 1]),
            ..tight_response()
        };
        let analytic = Hessian::new(&basis, &scf.reference, options).kernel().unwrap();
        let numeric =
            finite_difference_hessian(&mol, "sto-3g", 0, &scf.reference.dm0(), &tight_scf(), 1e-4, &[2, 1])
                .unwrap();
        let diff = (analytic.to_cartesian() - numeric.to_cartesian()).amax();
        assert!(diff < 1e-5, "largest deviation {}", diff);
    }

    #[test]
    fn test_water_all_atoms_match_finite_differences() {
        let mol = water();
        let (basis, scf) = converged(&mol, "sto-3g");
        let analytic = Hessian::new(&basis, &scf.reference, tight_response()).kernel().unwrap();
        let numeric = finite_difference_hessian(
            &mol,
            "sto-3g",
            0,
            &scf.reference.dm0(),
            &tight_scf(),
            5e-5,
            &[0, 1, 2],
        )
        .unwrap();
        let a = analytic.to_cartesian();
        let n = numeric.to_cartesian();
        for r in 0..9 {
            for c in 0..9 {
                assert!(
                    (a[(r, c)] - n[(r, c)]).abs() < 1e-6,
                    "entry ({}, {}): analytic {} numeric {}",
                    r,
                    c,
                    a[(r, c)],
                    n[(r, c)]
                );
            }
        }
    }

    #[test]
    fn test_atom_subset_matches_full_blocks() {
        let (basis, scf) = converged(&h4(), "sto-3g");
        let full = Hessian::new(&basis, &scf.reference, tight_response()).kernel().unwrap();
        let options = HessianOptions {
            atoms: Some(vec![3, 1]),
            ..tight_response()
        };
        let sub = Hessian::new(&basis, &scf.reference, options).kernel().unwrap();
        assert_eq!(sub.natm(), 2);
        for (i, a) in [3, 1].into_iter().enumerate() {
            for (j, b) in [3, 1].into_iter().enumerate() {
                let d = (sub.block(i, j) - full.block(a, b)).amax();
                assert!(d < 1e-9, "block ({}, {}) differs by {}", a, b, d);
            }
        }
    }

    #[test]
    fn test_batch_size_invariance() {
        let (basis, scf) = converged(&h4(), "6-31G");
        let run = |max_memory: f64| {
            let options = HessianOptions {
                max_memory,
                ..tight_response()
            };
            Hessian::new(&basis, &scf.reference, options).orbital_response().unwrap()
        };
        let one_atom = run(1e-9);
        let all_atoms = run(1e4);
        for (a, b) in one_atom.iter().zip(&all_atoms) {
            for x in 0..3 {
                assert!((&a.mo1[x] - &b.mo1[x]).amax() < 1e-12);
                assert!((&a.mo_e1[x] - &b.mo_e1[x]).amax() < 1e-12);
            }
        }
    }

    #[test]
    fn test_checkpoint_store_gives_same_hessian() {
        let (basis, scf) = converged(&h4(), "sto-3g");
        let dir = tempfile::tempdir().unwrap();
        let options = HessianOptions {
            checkpoint: Some(dir.path().join("chk")),
            ..tight_response()
        };
        let from_disk = Hessian::new(&basis, &scf.reference, options).kernel().unwrap();
        let in_memory = Hessian::new(&basis, &scf.reference, tight_response()).kernel().unwrap();
        assert!((from_disk.to_cartesian() - in_memory.to_cartesian()).amax() < 1e-10);
        assert!(dir.path().join("chk/orbital_response/3.json").exists());
        assert!(dir.path().join("chk/perturbed_hamiltonian/0.json").exists());
    }

    #[test]
    fn test_response_is_linear() {
        let (basis, scf) = converged(&h4(), "6-31G");
        let reference = &scf.reference;
        let eri = basis.int2e_full().unwrap();
        let op = ResponseOperator::new(&eri, reference).unwrap();
        let (nmo, nocc) = (reference.nmo(), reference.nocc());

        let h1 = DMatrix::from_fn(nmo, nocc, |p, i| ((p * 7 + i * 3) as f64 * 0.37).sin());
        let s1 = DMatrix::zeros(nmo, nocc);
        let once = cphf::solve(&op, reference, &[h1.clone()], &[s1.clone()], 1e-12, 100).unwrap();
        let scaled = cphf::solve(&op, reference, &[&h1 * -2.5], &[s1.clone()], 1e-12, 100).unwrap();
        assert!((&once.mo1[0] * -2.5 - &scaled.mo1[0]).amax() < 1e-9);
        assert!((&once.mo_e1[0] * -2.5 - &scaled.mo_e1[0]).amax() < 1e-9);

        let zero = cphf::solve(&op, reference, &[s1.clone()], &[s1], 1e-12, 100).unwrap();
        assert_eq!(zero.mo1[0].amax(), 0.0);
        assert_eq!(zero.mo_e1[0].amax(), 0.0);
    }

    #[test]
    fn test_solver_divergence_is_reported() {
        let (basis, scf) = converged(&water(), "sto-3g");
        let options = HessianOptions {
            conv_tol: 1e-14,
            max_cycle: 1,
            ..HessianOptions::default()
        };
        let err = Hessian::new(&basis, &scf.reference, options).kernel().unwrap_err();
        match err {
            HessianError::SolverDivergence { atom, residual, max_cycle } => {
                assert_eq!(atom, 0);
                assert!(residual > 1e-14);
                assert_eq!(max_cycle, 1);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_dimension_mismatch_is_reported() {
        let (basis, scf) = converged(&h4(), "sto-3g");
        let reference = scf.reference;
        let truncated = ReferenceState::new(
            reference.mo_coeff.rows(0, 3).into_owned(),
            reference.mo_energy.clone(),
            reference.mo_occ.clone(),
        );
        // the basis has four functions, the orbitals only three rows
        let err = Hessian::new(&basis, &truncated, HessianOptions::default()).kernel();
        assert!(matches!(err, Err(HessianError::DimensionMismatch(_))));
    }

    #[test]
    fn test_command_line_driver() {
        let config = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demos").join("h4.yaml");
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("h4.out");
        let status = Command::new(env!("CARGO_BIN_EXE_hessian"))
            .arg("--config-file")
            .arg(&config)
            .arg("--output")
            .arg(&output)
            .status()
            .unwrap();
        assert!(status.success());

        let text = std::fs::read_to_string(&output).unwrap();
        assert!(text.contains("Nuclear Hessian (Hartree/Bohr^2):"));
        let fp: f64 = text
            .lines()
            .find_map(|l| l.strip_prefix("Fingerprint: "))
            .unwrap()
            .trim()
            .parse()
            .unwrap();
        assert!((fp - (-0.50693144355876429)).abs() < 1e-6, "fingerprint {}", fp);
    }
}
