//! Molecular geometry: ordered atoms with nuclear charges and positions in Bohr.

use crate::error::IntegralError;
use nalgebra::Vector3;
use periodic_table_on_an_enum::Element;
use serde::{Deserialize, Serialize};

/// Angstrom per Bohr.
pub const BOHR: f64 = 0.52917721092;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    #[default]
    Angstrom,
    Bohr,
}

impl Unit {
    /// Factor converting a length in this unit to Bohr.
    pub fn to_bohr(self) -> f64 {
        match self {
            Unit::Angstrom => 1.0 / BOHR,
            Unit::Bohr => 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Atom {
    pub symbol: String,
    pub charge: f64,
    pub position: Vector3<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Molecule {
    pub atoms: Vec<Atom>,
}

/// "h" and "H" both map to "H", "he" to "He".
fn canonical_symbol(symbol: &str) -> String {
    let mut chars = symbol.trim().chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase(),
        None => String::new(),
    }
}

impl Molecule {
    pub fn new(atoms: Vec<Atom>) -> Self {
        Self { atoms }
    }

    /// Builds a molecule from element symbols and coordinates given in `unit`.
    pub fn from_symbols<S: AsRef<str>>(
        symbols: &[S],
        coords: &[Vector3<f64>],
        unit: Unit,
    ) -> Result<Self, IntegralError> {
        let scale = unit.to_bohr();
        let atoms = symbols
            .iter()
            .zip(coords.iter())
            .map(|(s, r)| {
                let symbol = canonical_symbol(s.as_ref());
                let element = Element::from_symbol(&symbol)
                    .ok_or_else(|| IntegralError::UnknownElement(s.as_ref().to_string()))?;
                Ok(Atom {
                    symbol: element.get_symbol().to_string(),
                    charge: element.get_atomic_number() as f64,
                    position: r * scale,
                })
            })
            .collect::<Result<Vec<_>, IntegralError>>()?;
        Ok(Self { atoms })
    }

    pub fn natm(&self) -> usize {
        self.atoms.len()
    }

    pub fn atom_charge(&self, ia: usize) -> f64 {
        self.atoms[ia].charge
    }

    pub fn atom_coord(&self, ia: usize) -> Vector3<f64> {
        self.atoms[ia].position
    }

    /// Number of electrons for the given total molecular charge.
    pub fn nelectron(&self, charge: i32) -> i64 {
        self.atoms.iter().map(|a| a.charge.round() as i64).sum::<i64>() - charge as i64
    }

    /// Copy of the molecule with one coordinate of one atom shifted by `step` Bohr.
    pub fn displaced(&self, ia: usize, dir: usize, step: f64) -> Self {
        let mut mol = self.clone();
        mol.atoms[ia].position[dir] += step;
        mol
    }

    /// Classical repulsion energy of the nuclei.
    pub fn energy_nuc(&self) -> f64 {
        let mut e = 0.0;
        for (i, a) in self.atoms.iter().enumerate() {
            for b in &self.atoms[..i] {
                e += a.charge * b.charge / (a.position - b.position).norm();
            }
        }
        e
    }
}
