//! Built-in Gaussian basis-set library stored as NWChem-format text.

use crate::error::IntegralError;
use periodic_table_on_an_enum::Element;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const STO_3G: &str = r#"
#   Basis set: STO-3G
BASIS "ao basis" PRINT
H    S
      3.42525091             0.15432897
      0.62391373             0.53532814
      0.16885540             0.44463454
He    S
      6.36242139             0.15432897
      1.15892300             0.53532814
      0.31364979             0.44463454
C    S
     71.6168370              0.15432897
     13.0450960              0.53532814
      3.5305122              0.44463454
C    SP
      2.9412494             -0.09996723             0.15591627
      0.6834831              0.39951283             0.60768372
      0.2222899              0.70011547             0.39195739
N    S
     99.1061690              0.15432897
     18.0523120              0.53532814
      4.8856602              0.44463454
N    SP
      3.7804559             -0.09996723             0.15591627
      0.8784966              0.39951283             0.60768372
      0.2857144              0.70011547             0.39195739
O    S
    130.7093200              0.15432897
     23.8088610              0.53532814
      6.4436083              0.44463454
O    SP
      5.0331513             -0.09996723             0.15591627
      1.1695961              0.39951283             0.60768372
      0.3803890              0.70011547             0.39195739
END
"#;

const BASIS_6_31G: &str = r#"
#   Basis set: 6-31G
BASIS "ao basis" PRINT
H    S
     18.7311370              0.03349460
      2.8253937              0.23472695
      0.6401217              0.81375733
H    S
      0.1612778              1.0000000
O    S
   5484.6717000              0.0018311
    825.2349500              0.0139501
    188.0469600              0.0684451
     52.9645000              0.2327143
     16.8975700              0.4701930
      5.7996353              0.3585209
O    SP
     15.5396160             -0.1107775              0.0708743
      3.5999336             -0.1480263              0.3397528
      1.0137618              1.1307670              0.7271586
O    SP
      0.2700058              1.0000000              1.0000000
END
"#;

/// Radial part of one shell, shared by all its cartesian components.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellTemplate {
    pub l: i32,
    pub exponents: Vec<f64>,
    pub coefficients: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasisSet {
    pub name: String,
    elements: HashMap<String, Vec<ShellTemplate>>,
}

fn shell_momenta(shell_type: &str) -> Option<Vec<i32>> {
    match shell_type {
        "S" => Some(vec![0]),
        "P" => Some(vec![1]),
        "D" => Some(vec![2]),
        "SP" => Some(vec![0, 1]),
        _ => None,
    }
}

impl BasisSet {
    /// Looks up a basis set of the built-in library by name ("sto-3g", "6-31G", "631g").
    pub fn load(name: &str) -> Result<Self, IntegralError> {
        let key: String = name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "sto3g" => Self::parse_nwchem("STO-3G", STO_3G),
            "631g" => Self::parse_nwchem("6-31G", BASIS_6_31G),
            _ => Err(IntegralError::UnknownBasis(name.to_string())),
        }
    }

    // Example of nwchem format:
    // BASIS "ao basis" PRINT
    // O    S
    //   5484.6717000              0.0018311
    //    ...
    // O    SP
    //     15.5396160             -0.1107775              0.0708743
    //    ...
    // END
    fn parse_primitive_block(
        lines: &[(usize, &str)],
        shell_type: &str,
        header_line: usize,
    ) -> Result<Vec<ShellTemplate>, IntegralError> {
        let momenta = shell_momenta(shell_type).ok_or_else(|| IntegralError::Parse {
            line: header_line,
            reason: format!("unsupported shell type '{}'", shell_type),
        })?;
        let mut shells: Vec<ShellTemplate> = momenta
            .iter()
            .map(|&l| ShellTemplate {
                l,
                exponents: Vec::new(),
                coefficients: Vec::new(),
            })
            .collect();

        for &(lineno, line) in lines {
            let numbers = line
                .split_whitespace()
                .map(|tok| tok.replace(['D', 'd'], "E").parse::<f64>())
                .collect::<Result<Vec<f64>, _>>()
                .map_err(|e| IntegralError::Parse {
                    line: lineno,
                    reason: e.to_string(),
                })?;
            if numbers.len() != momenta.len() + 1 {
                return Err(IntegralError::Parse {
                    line: lineno,
                    reason: format!(
                        "expected {} columns for a {} shell, found {}",
                        momenta.len() + 1,
                        shell_type,
                        numbers.len()
                    ),
                });
            }
            for (k, shell) in shells.iter_mut().enumerate() {
                shell.exponents.push(numbers[0]);
                shell.coefficients.push(numbers[k + 1]);
            }
        }
        Ok(shells)
    }

    fn flush_block(
        elements: &mut HashMap<String, Vec<ShellTemplate>>,
        current: &Option<(String, String, usize)>,
        block: &mut Vec<(usize, &str)>,
    ) -> Result<(), IntegralError> {
        if let Some((symbol, shell_type, header)) = current {
            let parsed = Self::parse_primitive_block(block, shell_type, *header)?;
            elements.entry(symbol.clone()).or_default().extend(parsed);
        }
        block.clear();
        Ok(())
    }

    /// Parses a string in NWChem format.
    pub fn parse_nwchem(name: &str, input: &str) -> Result<Self, IntegralError> {
        let mut elements: HashMap<String, Vec<ShellTemplate>> = HashMap::new();
        // (element symbol, shell type, header line)
        let mut current: Option<(String, String, usize)> = None;
        let mut block: Vec<(usize, &str)> = Vec::new();

        for (idx, raw) in input.lines().enumerate() {
            let lineno = idx + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with("BASIS") {
                continue;
            }
            if line.eq_ignore_ascii_case("END") {
                break;
            }

            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.len() == 2 && tokens[0].chars().all(char::is_alphabetic) {
                Self::flush_block(&mut elements, &current, &mut block)?;
                let element = Element::from_symbol(tokens[0])
                    .ok_or_else(|| IntegralError::UnknownElement(tokens[0].to_string()))?;
                current = Some((
                    element.get_symbol().to_string(),
                    tokens[1].to_ascii_uppercase(),
                    lineno,
                ));
            } else if current.is_some() {
                block.push((lineno, line));
            } else {
                return Err(IntegralError::Parse {
                    line: lineno,
                    reason: "primitive data before any shell header".to_string(),
                });
            }
        }
        Self::flush_block(&mut elements, &current, &mut block)?;

        Ok(BasisSet {
            name: name.to_string(),
            elements,
        })
    }

    pub fn element(&self, symbol: &str) -> Result<&[ShellTemplate], IntegralError> {
        self.elements
            .get(symbol)
            .map(|v| v.as_slice())
            .ok_or_else(|| IntegralError::MissingElement {
                basis: self.name.clone(),
                element: symbol.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sto3g_oxygen_shells() {
        let basis = BasisSet::load("sto-3g").unwrap();
        let oxygen = basis.element("O").unwrap();
        let momenta: Vec<i32> = oxygen.iter().map(|s| s.l).collect();
        assert_eq!(momenta, vec![0, 0, 1]);
        assert_eq!(oxygen[2].exponents, vec![5.0331513, 1.1695961, 0.3803890]);
        assert_eq!(oxygen[2].coefficients, vec![0.15591627, 0.60768372, 0.39195739]);
    }

    #[test]
    fn test_631g_hydrogen_is_split_valence() {
        let basis = BasisSet::load("631G").unwrap();
        assert_eq!(basis.name, "6-31G");
        let h = basis.element("H").unwrap();
        assert_eq!(h.len(), 2);
        assert_eq!(h[0].exponents.len(), 3);
        assert_eq!(h[1].exponents, vec![0.1612778]);
    }

    #[test]
    fn test_missing_entries() {
        assert!(matches!(
            BasisSet::load("cc-pvdz"),
            Err(IntegralError::UnknownBasis(_))
        ));
        let basis = BasisSet::load("6-31g").unwrap();
        assert!(matches!(
            basis.element("C"),
            Err(IntegralError::MissingElement { .. })
        ));
    }

    #[test]
    fn test_parse_rejects_bad_columns() {
        let text = "H    SP\n 1.0  0.5\n";
        let err = BasisSet::parse_nwchem("bad", text).unwrap_err();
        assert!(matches!(err, IntegralError::Parse { line: 2, .. }));
    }
}
