//! Input/Output operations for Hessian calculations
//!
//! This module handles logging setup and result printing.

mod output;

pub use output::{print_hessian, setup_output};
