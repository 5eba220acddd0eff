//! Command-line argument parsing for Hessian calculations

use clap::Parser;

/// Analytic RHF nuclear Hessian with YAML configuration
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    pub config_file: String,

    /// Override output file: (default stdout)
    #[arg(short, long)]
    pub output: Option<String>,

    /// Override the coupled-perturbed convergence tolerance
    #[arg(long)]
    pub conv_tol: Option<f64>,

    /// Override maximum coupled-perturbed iterations
    #[arg(long)]
    pub max_cycle: Option<usize>,

    /// Override memory budget in MB for the coupled-perturbed batches
    #[arg(long)]
    pub max_memory: Option<f64>,

    /// Write response intermediates to this directory
    #[arg(long)]
    pub checkpoint: Option<String>,

    /// Molecular charge (default: 0 for neutral)
    #[arg(long)]
    pub charge: Option<i32>,
}
