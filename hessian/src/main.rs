//! Hessian Calculation Command-Line Interface
//!
//! This is the main entry point for running analytic RHF Hessian calculations
//! with YAML configuration.

use basis::AoBasis;
use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use hessian::{Hessian, Rhf};
use std::fs::{self, File};
use tracing::info;

mod config;
mod io;

use config::{Args, Config};
use io::{print_hessian, setup_output};

fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    setup_output(args.output.as_ref());

    // Load and parse configuration
    info!("Reading configuration from: {}", args.config_file);
    let config_content = fs::read_to_string(&args.config_file)
        .wrap_err_with(|| format!("Unable to read configuration file: {}", args.config_file))?;

    let mut config: Config = serde_yml::from_str::<Config>(&config_content)
        .wrap_err("Failed to parse configuration file")?
        .with_defaults();
    config.apply_overrides(&args);

    info!("Configuration loaded:\n{:?}", config);

    let molecule = config.molecule().wrap_err("Invalid geometry")?;
    let basis = AoBasis::build(&molecule, config.basis_name())
        .wrap_err_with(|| format!("Unable to build basis {}", config.basis_name()))?;
    info!(
        "Basis {}: {} shells, {} functions",
        config.basis_name(),
        basis.nbas(),
        basis.nao()
    );

    info!("\nStarting SCF cycle...\n");
    let scf = Rhf::new(&basis, config.scf_options())
        .with_charge(config.charge.unwrap_or(0))
        .kernel()
        .wrap_err("Reference SCF failed")?;
    info!("SCF converged in {} cycles, E = {:.10} au", scf.cycles, scf.e_tot);

    info!("\nStarting Hessian calculation...\n");
    let options = config.hessian_options();
    let atoms = options
        .atoms
        .clone()
        .unwrap_or_else(|| (0..molecule.natm()).collect());
    let hess = Hessian::new(&basis, &scf.reference, options)
        .kernel()
        .wrap_err("Hessian calculation failed")?;
    info!(
        "Max asymmetry {:.3e}, translational residual {:.3e}",
        hess.max_asymmetry(),
        hess.translational_residual()
    );

    match args.output {
        Some(ref output_file) => {
            let mut file = File::options()
                .append(true)
                .open(output_file)
                .or_else(|_| File::create(output_file))
                .wrap_err_with(|| format!("Unable to write to {}", output_file))?;
            print_hessian(&mut file, &molecule, &atoms, &hess, scf.e_tot)?;
        }
        None => {
            let stdout = std::io::stdout();
            print_hessian(&mut stdout.lock(), &molecule, &atoms, &hess, scf.e_tot)?;
        }
    }

    Ok(())
}
