//! Configuration management for Hessian calculations
//!
//! This module handles the YAML input, its defaults, and the conversion into
//! the option structs of the library.

mod args;

pub use args::Args;

use basis::{IntegralError, Molecule, Unit};
use hessian::{HessianOptions, ScfOptions};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure for Hessian calculations
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    pub geometry: Vec<Atom>,
    pub unit: Option<Unit>,
    pub basis: Option<String>,
    pub charge: Option<i32>,
    pub scf_params: Option<ScfParams>,
    pub hessian_params: Option<HessianParams>,
    /// Atoms to differentiate (0-based); all when absent
    pub atoms: Option<Vec<usize>>,
}

/// Atomic position configuration
#[derive(Debug, Deserialize, Serialize)]
pub struct Atom {
    pub element: String,
    pub coords: [f64; 3],
}

/// Reference SCF parameters
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ScfParams {
    pub max_cycle: Option<usize>,
    pub conv_tol: Option<f64>,
    pub conv_tol_grad: Option<f64>,
    pub diis_subspace_size: Option<usize>,
}

impl Default for ScfParams {
    fn default() -> Self {
        let defaults = ScfOptions::default();
        ScfParams {
            max_cycle: Some(defaults.max_cycle),
            conv_tol: Some(defaults.conv_tol),
            conv_tol_grad: Some(defaults.conv_tol_grad),
            diis_subspace_size: Some(defaults.diis_space),
        }
    }
}

impl ScfParams {
    /// Apply default values to any missing parameters
    pub fn with_defaults(mut self) -> Self {
        let defaults = Self::default();
        if self.max_cycle.is_none() {
            self.max_cycle = defaults.max_cycle;
        }
        if self.conv_tol.is_none() {
            self.conv_tol = defaults.conv_tol;
        }
        if self.conv_tol_grad.is_none() {
            self.conv_tol_grad = defaults.conv_tol_grad;
        }
        if self.diis_subspace_size.is_none() {
            self.diis_subspace_size = defaults.diis_subspace_size;
        }
        self
    }
}

/// Coupled-perturbed and assembly parameters
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HessianParams {
    pub conv_tol: Option<f64>,
    pub max_cycle: Option<usize>,
    pub max_memory: Option<f64>,
    pub checkpoint: Option<String>,
}

impl Default for HessianParams {
    fn default() -> Self {
        let defaults = HessianOptions::default();
        HessianParams {
            conv_tol: Some(defaults.conv_tol),
            max_cycle: Some(defaults.max_cycle),
            max_memory: Some(defaults.max_memory),
            checkpoint: None,
        }
    }
}

impl HessianParams {
    /// Apply default values to any missing parameters
    pub fn with_defaults(mut self) -> Self {
        let defaults = Self::default();
        if self.conv_tol.is_none() {
            self.conv_tol = defaults.conv_tol;
        }
        if self.max_cycle.is_none() {
            self.max_cycle = defaults.max_cycle;
        }
        if self.max_memory.is_none() {
            self.max_memory = defaults.max_memory;
        }
        self
    }
}

impl Config {
    /// Apply defaults to all configuration sections
    pub fn with_defaults(mut self) -> Self {
        self.unit = Some(self.unit.unwrap_or_default());
        if self.basis.is_none() {
            self.basis = Some("sto-3g".to_string());
        }
        self.scf_params = Some(self.scf_params.take().unwrap_or_default().with_defaults());
        self.hessian_params = Some(self.hessian_params.take().unwrap_or_default().with_defaults());
        self
    }

    /// Command-line values take precedence over the file.
    pub fn apply_overrides(&mut self, args: &Args) {
        let params = self.hessian_params.get_or_insert_with(HessianParams::default);
        if args.conv_tol.is_some() {
            params.conv_tol = args.conv_tol;
        }
        if args.max_cycle.is_some() {
            params.max_cycle = args.max_cycle;
        }
        if args.max_memory.is_some() {
            params.max_memory = args.max_memory;
        }
        if args.checkpoint.is_some() {
            params.checkpoint = args.checkpoint.clone();
        }
        if args.charge.is_some() {
            self.charge = args.charge;
        }
    }

    pub fn basis_name(&self) -> &str {
        self.basis.as_deref().unwrap_or("sto-3g")
    }

    pub fn molecule(&self) -> Result<Molecule, IntegralError> {
        let symbols: Vec<&str> = self.geometry.iter().map(|a| a.element.as_str()).collect();
        let coords: Vec<Vector3<f64>> = self
            .geometry
            .iter()
            .map(|a| Vector3::new(a.coords[0], a.coords[1], a.coords[2]))
            .collect();
        Molecule::from_symbols(&symbols, &coords, self.unit.unwrap_or_default())
    }

    pub fn scf_options(&self) -> ScfOptions {
        let params = self.scf_params.clone().unwrap_or_default().with_defaults();
        let defaults = ScfOptions::default();
        ScfOptions {
            max_cycle: params.max_cycle.unwrap_or(defaults.max_cycle),
            conv_tol: params.conv_tol.unwrap_or(defaults.conv_tol),
            conv_tol_grad: params.conv_tol_grad.unwrap_or(defaults.conv_tol_grad),
            diis_space: params.diis_subspace_size.unwrap_or(defaults.diis_space),
        }
    }

    pub fn hessian_options(&self) -> HessianOptions {
        let params = self.hessian_params.clone().unwrap_or_default().with_defaults();
        let defaults = HessianOptions::default();
        HessianOptions {
            conv_tol: params.conv_tol.unwrap_or(defaults.conv_tol),
            max_cycle: params.max_cycle.unwrap_or(defaults.max_cycle),
            max_memory: params.max_memory.unwrap_or(defaults.max_memory),
            checkpoint: params.checkpoint.map(PathBuf::from),
            atoms: self.atoms.clone(),
        }
    }
}
