/* Contracted gaussian type orbitals (CGTO) built on the primitives in gto.rs.
   A shell groups the cartesian components that share exponents and centre.
*/

use crate::basis::ShellTemplate;
use crate::gto::{GaussianProduct, GTO};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shell {
    pub atom: usize,
    pub l: i32,
    pub center: Vector3<f64>,
    pub exponents: Vec<f64>,
    pub coefficients: Vec<f64>,
}

/// One AO: a normalized contraction of primitives with a fixed cartesian power.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractedGTO {
    pub shell: usize,
    pub primitives: Vec<GTO>,
    pub coefficients: Vec<f64>,
}

/// Cartesian powers of a shell in the order xx, xy, xz, yy, yz, zz (for l = 2).
pub fn cartesian_components(l: i32) -> Vec<Vector3<i32>> {
    let mut comps = Vec::new();
    for lx in (0..=l).rev() {
        for ly in (0..=(l - lx)).rev() {
            comps.push(Vector3::new(lx, ly, l - lx - ly));
        }
    }
    comps
}

impl Shell {
    pub fn from_template(atom: usize, center: Vector3<f64>, template: &ShellTemplate) -> Self {
        Shell {
            atom,
            l: template.l,
            center,
            exponents: template.exponents.clone(),
            coefficients: template.coefficients.clone(),
        }
    }

    pub fn nao(&self) -> usize {
        ((self.l + 1) * (self.l + 2) / 2) as usize
    }

    /// Expands the shell into normalized cartesian AOs.
    pub fn contract(&self, shell_index: usize) -> Vec<ContractedGTO> {
        cartesian_components(self.l)
            .into_iter()
            .map(|l_xyz| {
                let primitives: Vec<GTO> = self
                    .exponents
                    .iter()
                    .map(|&alpha| GTO::new(alpha, l_xyz, self.center))
                    .collect();
                let coefficients = primitives
                    .iter()
                    .zip(self.coefficients.iter())
                    .map(|(g, &c)| c * g.norm())
                    .collect();
                let mut ao = ContractedGTO {
                    shell: shell_index,
                    primitives,
                    coefficients,
                };
                ao.normalize();
                ao
            })
            .collect()
    }
}

impl ContractedGTO {
    pub fn l_xyz(&self) -> Vector3<i32> {
        self.primitives[0].l_xyz
    }

    pub fn center(&self) -> Vector3<f64> {
        self.primitives[0].center
    }

    pub fn evaluate(&self, r: &Vector3<f64>) -> f64 {
        self.primitives
            .iter()
            .zip(self.coefficients.iter())
            .map(|(g, c)| c * g.evaluate(r))
            .sum()
    }

    pub fn self_overlap(&self) -> f64 {
        let l = self.l_xyz();
        let mut s = 0.0;
        for (a, ca) in self.primitives.iter().zip(self.coefficients.iter()) {
            for (b, cb) in self.primitives.iter().zip(self.coefficients.iter()) {
                s += ca * cb * GaussianProduct::new(a, b, 0, 0).overlap(l, l);
            }
        }
        s
    }

    // rescale so that <phi|phi> = 1
    fn normalize(&mut self) {
        let s = self.self_overlap();
        let scale = 1.0 / s.sqrt();
        for c in self.coefficients.iter_mut() {
            *c *= scale;
        }
    }
}
