//! Output formatting and logging utilities

use basis::Molecule;
use color_eyre::eyre::Result;
use hessian::HessianTensor;
use std::fmt;
use std::fs::File;
use std::io::Write;
use std::time::SystemTime as StdSystemTime;
use tracing::info;
use tracing_subscriber::{
    fmt::format::Writer, fmt::layer, fmt::time::FormatTime, layer::SubscriberExt,
    util::SubscriberInitExt, Registry,
};

/// Custom time formatter that shows only seconds
struct SecondPrecisionTimer;

impl FormatTime for SecondPrecisionTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        let now = StdSystemTime::now();
        let duration = now
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default();

        let total_seconds = duration.as_secs();
        let hours = (total_seconds / 3600) % 24;
        let minutes = (total_seconds / 60) % 60;
        let seconds = total_seconds % 60;

        write!(w, "{:02}:{:02}:{:02}", hours, minutes, seconds)
    }
}

/// Setup output logging to file or stdout
pub fn setup_output(output_path: Option<&String>) {
    match output_path {
        Some(path) => {
            if let Ok(log) = File::create(path) {
                let file_layer = layer()
                    .with_writer(log)
                    .with_timer(SecondPrecisionTimer)
                    .with_ansi(false);
                Registry::default().with(file_layer).init();
                info!("Output will be written to: {}", path);
            } else {
                eprintln!("Could not create output file: {}", path);
            }
        }
        None => {
            let stdout_layer = layer()
                .with_writer(std::io::stdout)
                .with_timer(SecondPrecisionTimer)
                .with_ansi(true);
            Registry::default().with(stdout_layer).init();
        }
    }
}

/// Print the Cartesian Hessian, one row per atom coordinate
pub fn print_hessian<W: Write>(
    writer: &mut W,
    molecule: &Molecule,
    atoms: &[usize],
    hessian: &HessianTensor,
    energy: f64,
) -> Result<()> {
    const AXES: [&str; 3] = ["x", "y", "z"];
    let labels: Vec<String> = atoms
        .iter()
        .flat_map(|&ia| {
            let symbol = molecule.atoms[ia].symbol.clone();
            AXES.iter().map(move |axis| format!("{}{}{}", symbol, ia, axis))
        })
        .collect();

    writeln!(writer, "SCF energy: {:.10} au", energy)?;
    writeln!(writer, "Nuclear Hessian (Hartree/Bohr^2):")?;
    write!(writer, "{:>8}", "")?;
    for label in &labels {
        write!(writer, " {:>12}", label)?;
    }
    writeln!(writer)?;

    let matrix = hessian.to_cartesian();
    for (r, label) in labels.iter().enumerate() {
        write!(writer, "{:>8}", label)?;
        for c in 0..labels.len() {
            write!(writer, " {:>12.6}", matrix[(r, c)])?;
        }
        writeln!(writer)?;
    }
    writeln!(writer, "Fingerprint: {:.12}", hessian.fingerprint())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use basis::Unit;
    use nalgebra::{Matrix3, Vector3};

    #[test]
    fn test_print_hessian_layout() {
        let mol = Molecule::from_symbols(&["O", "H"], &[Vector3::zeros(), Vector3::new(0.0, 0.0, 1.8)], Unit::Bohr)
            .unwrap();
        let mut hess = HessianTensor::zeros(1);
        hess.set_block(0, 0, Matrix3::identity() * 0.5);
        let mut out = Vec::new();
        print_hessian(&mut out, &mol, &[1], &hess, -1.25).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "SCF energy: -1.2500000000 au");
        assert!(lines[2].contains("H1x") && lines[2].contains("H1z"));
        assert!(lines[3].trim_start().starts_with("H1x"));
        assert!(lines[3].contains("0.500000"));
        assert_eq!(lines.len(), 7);
    }
}
