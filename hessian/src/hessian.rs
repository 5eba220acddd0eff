//! Analytic nuclear Hessian driver for a converged closed-shell reference.

use crate::assembler::hess_elec;
use crate::cphf::solve_mo1;
use crate::error::HessianError;
use crate::h1::make_h1;
use crate::integrals::IntegralProvider;
use crate::nuclear::hess_nuc_for;
use crate::reference::ReferenceState;
use crate::response::ResponseOperator;
use crate::storage::{orbital_response_key, CheckpointStore, InMemoryStore, ResponseStore};
use crate::tensor::HessianTensor;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HessianOptions {
    /// Residual norm at which the coupled-perturbed equations count as solved.
    pub conv_tol: f64,
    pub max_cycle: usize,
    /// Memory budget in MB for batching the coupled-perturbed solve.
    pub max_memory: f64,
    /// Directory for checkpointed intermediates; kept in memory when absent.
    pub checkpoint: Option<PathBuf>,
    /// Atoms to differentiate; all atoms when absent.
    pub atoms: Option<Vec<usize>>,
}

impl Default for HessianOptions {
    fn default() -> Self {
        HessianOptions {
            conv_tol: 1e-9,
            max_cycle: 50,
            max_memory: 4000.0,
            checkpoint: None,
            atoms: None,
        }
    }
}

/// First-order orbital response of one atom.
#[derive(Debug, Clone)]
pub struct OrbitalResponse {
    /// `nao x nocc` per direction, AO basis.
    pub mo1: Vec<DMatrix<f64>>,
    /// `nocc x nocc` per direction.
    pub mo_e1: Vec<DMatrix<f64>>,
}

pub struct Hessian<'a, P: IntegralProvider> {
    provider: &'a P,
    reference: &'a ReferenceState,
    options: HessianOptions,
}

impl<'a, P: IntegralProvider> Hessian<'a, P> {
    pub fn new(provider: &'a P, reference: &'a ReferenceState, options: HessianOptions) -> Self {
        Hessian {
            provider,
            reference,
            options,
        }
    }

    /// Checks the reference against the basis and resolves the atom list.
    fn validate(&self) -> Result<Vec<usize>, HessianError> {
        self.reference.validate(self.provider.nao())?;
        let natm = self.provider.molecule().natm();
        let atoms = match &self.options.atoms {
            Some(atoms) => atoms.clone(),
            None => (0..natm).collect(),
        };
        if atoms.is_empty() {
            return Err(HessianError::DimensionMismatch("the atom list is empty".to_string()));
        }
        let mut seen = HashSet::new();
        for &ia in &atoms {
            if ia >= natm {
                return Err(HessianError::DimensionMismatch(format!(
                    "atom {} is out of range for a molecule with {} atoms",
                    ia, natm
                )));
            }
            if !seen.insert(ia) {
                return Err(HessianError::DimensionMismatch(format!("atom {} is listed twice", ia)));
            }
        }
        Ok(atoms)
    }

    fn open_store(&self) -> Result<Box<dyn ResponseStore>, HessianError> {
        Ok(match &self.options.checkpoint {
            Some(dir) => {
                info!("Checkpointing response intermediates to {}", dir.display());
                Box::new(CheckpointStore::open(dir)?)
            }
            None => Box::new(InMemoryStore::new()),
        })
    }

    // builds h1 and solves the response into `store`, returning mo_e1
    fn solve_response(
        &self,
        atoms: &[usize],
        store: &mut dyn ResponseStore,
    ) -> Result<Vec<Vec<DMatrix<f64>>>, HessianError> {
        let t0 = Instant::now();
        make_h1(self.provider, self.reference, atoms, store)?;
        info!("Perturbed Hamiltonians built in {:.2?}", t0.elapsed());

        let t1 = Instant::now();
        let eri = self.provider.int2e(basis::Deriv2e::None, 0..self.provider.nbas())?;
        let op = ResponseOperator::new(&eri, self.reference)?;
        let mo_e1 = solve_mo1(
            self.provider,
            self.reference,
            &op,
            store,
            atoms,
            self.options.conv_tol,
            self.options.max_cycle,
            self.options.max_memory,
        )?;
        info!("Orbital response solved in {:.2?}", t1.elapsed());
        Ok(mo_e1)
    }

    /// Orbital response of every selected atom, in the order of the atom list.
    pub fn orbital_response(&self) -> Result<Vec<OrbitalResponse>, HessianError> {
        let atoms = self.validate()?;
        let mut store = self.open_store()?;
        let mo_e1 = self.solve_response(&atoms, &mut *store)?;
        atoms
            .iter()
            .zip(mo_e1)
            .map(|(&ia, mo_e1)| {
                Ok(OrbitalResponse {
                    mo1: store.load(&orbital_response_key(ia))?,
                    mo_e1,
                })
            })
            .collect()
    }

    /// Electronic plus nuclear Hessian over the selected atoms.
    pub fn kernel(&self) -> Result<HessianTensor, HessianError> {
        let start = Instant::now();
        let atoms = self.validate()?;
        info!(
            "RHF Hessian: {} atoms, {} basis functions, {} occupied orbitals",
            atoms.len(),
            self.provider.nao(),
            self.reference.nocc()
        );
        let mut store = self.open_store()?;
        let mo_e1 = self.solve_response(&atoms, &mut *store)?;

        let elec = hess_elec(self.provider, self.reference, &atoms, &*store, &mo_e1)?;
        let hess = elec.try_add(&hess_nuc_for(self.provider.molecule(), &atoms))?;
        info!("RHF Hessian done in {:.2?}", start.elapsed());
        Ok(hess)
    }
}
