//! Preconditioned conjugate gradient over a batch of independent systems.
//!
//! Each system reads `diag ∘ x + apply(x) = b`. Trials converge and stop on
//! their own, so a trial's iterates never depend on which other trials share
//! its batch.

use crate::error::HessianError;
use nalgebra::DMatrix;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct PcgSolution {
    pub x: Vec<DMatrix<f64>>,
    /// Final residual norm per trial.
    pub residuals: Vec<f64>,
    pub converged: Vec<bool>,
}

impl PcgSolution {
    /// First trial that missed the tolerance, with its residual.
    pub fn first_failure(&self) -> Option<(usize, f64)> {
        self.converged
            .iter()
            .position(|&c| !c)
            .map(|k| (k, self.residuals[k]))
    }
}

struct Trial {
    x: DMatrix<f64>,
    r: DMatrix<f64>,
    p: DMatrix<f64>,
    rz: f64,
}

/// Solves every system in `rhs` to a residual norm below `tol`.
///
/// `diag` is both the diagonal part of the operator and the preconditioner.
/// `apply` receives the active search directions and returns the coupling
/// term for each of them in the same order.
pub fn solve<F>(
    apply: F,
    diag: &DMatrix<f64>,
    rhs: &[DMatrix<f64>],
    tol: f64,
    max_cycle: usize,
) -> Result<PcgSolution, HessianError>
where
    F: Fn(&[DMatrix<f64>]) -> Result<Vec<DMatrix<f64>>, HessianError>,
{
    for b in rhs {
        if b.shape() != diag.shape() {
            return Err(HessianError::DimensionMismatch(format!(
                "right-hand side is {:?}, preconditioner is {:?}",
                b.shape(),
                diag.shape()
            )));
        }
    }
    let precondition = |r: &DMatrix<f64>| r.component_div(diag);

    let x0: Vec<DMatrix<f64>> = rhs.iter().map(precondition).collect();
    let ax0 = apply(&x0)?;
    let mut trials: Vec<Trial> = x0
        .into_iter()
        .zip(ax0)
        .zip(rhs)
        .map(|((x, ax), b)| {
            let r = b - x.component_mul(diag) - ax;
            let z = precondition(&r);
            let rz = r.dot(&z);
            Trial { x, r, p: z, rz }
        })
        .collect();
    let mut converged: Vec<bool> = trials.iter().map(|t| t.r.norm() < tol).collect();

    for cycle in 0..max_cycle {
        let active: Vec<usize> = (0..trials.len()).filter(|&k| !converged[k]).collect();
        if active.is_empty() {
            break;
        }
        let directions: Vec<DMatrix<f64>> = active.iter().map(|&k| trials[k].p.clone()).collect();
        let coupling = apply(&directions)?;

        for (&k, ap) in active.iter().zip(coupling) {
            let t = &mut trials[k];
            let ap = t.p.component_mul(diag) + ap;
            let alpha = t.rz / t.p.dot(&ap);
            t.x += &t.p * alpha;
            t.r -= &ap * alpha;
            if t.r.norm() < tol {
                converged[k] = true;
                continue;
            }
            let z = precondition(&t.r);
            let rz = t.r.dot(&z);
            let beta = rz / t.rz;
            t.p = z + &t.p * beta;
            t.rz = rz;
        }
        debug!(
            "PCG cycle {}: {} of {} trials converged",
            cycle + 1,
            converged.iter().filter(|&&c| c).count(),
            trials.len()
        );
    }

    let residuals = trials.iter().map(|t| t.r.norm()).collect();
    Ok(PcgSolution {
        x: trials.into_iter().map(|t| t.x).collect(),
        residuals,
        converged,
    })
}
