//! Analytic nuclear Hessian of closed-shell Hartree-Fock.
//!
//! The integral engine lives in the `basis` crate. This crate builds the
//! perturbed Hamiltonians, solves the coupled-perturbed equations and
//! assembles the second derivatives, together with the reference SCF and the
//! analytic gradient used to validate them.

pub mod assembler;
pub mod cphf;
pub mod diis;
pub mod error;
pub mod gradient;
pub mod h1;
pub mod hessian;
pub mod integrals;
pub mod jk;
pub mod krylov;
pub mod nuclear;
pub mod reference;
pub mod response;
pub mod scf;
pub mod storage;
pub mod tensor;
pub mod validation;

pub use error::HessianError;
pub use hessian::{Hessian, HessianOptions, OrbitalResponse};
pub use integrals::IntegralProvider;
pub use nuclear::hess_nuc;
pub use reference::ReferenceState;
pub use response::ResponseOperator;
pub use scf::{Rhf, ScfOptions, ScfResult};
pub use storage::{CheckpointStore, InMemoryStore, ResponseStore};
pub use tensor::HessianTensor;
pub use validation::finite_difference_hessian;
