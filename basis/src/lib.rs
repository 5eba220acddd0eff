pub mod basis;
pub mod cgto;
pub mod error;
pub mod gto;
pub mod helper;
pub mod intor;
pub mod molecule;

pub use error::IntegralError;
pub use intor::{AoBasis, Deriv1e, Deriv2e, Eri, Operator};
pub use molecule::{Atom, Molecule, Unit};
