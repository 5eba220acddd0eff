//! DIIS (Direct Inversion in the Iterative Subspace) convergence accelerator.

use nalgebra::{DMatrix, DVector};
use tracing::debug;

/// Extrapolates the Fock matrix from a linear combination of previous Fock
/// matrices that minimizes the norm of the combined error.
///
/// The error of a Fock matrix is the commutator E = FDS - SDF, which vanishes
/// at self-consistency. Coefficients c_i minimize ||Σ c_i E_i||² subject to
/// Σ c_i = 1.
#[derive(Debug, Clone)]
pub struct Diis {
    error_matrices: Vec<DMatrix<f64>>,
    fock_matrices: Vec<DMatrix<f64>>,
    max_subspace_size: usize,
}

impl Diis {
    /// `max_subspace_size` is the number of Fock/error pairs kept (typically 6-12).
    pub fn new(max_subspace_size: usize) -> Self {
        Diis {
            error_matrices: Vec::new(),
            fock_matrices: Vec::new(),
            max_subspace_size: max_subspace_size.max(1),
        }
    }

    /// FDS - SDF
    pub fn error_matrix(fock: &DMatrix<f64>, density: &DMatrix<f64>, overlap: &DMatrix<f64>) -> DMatrix<f64> {
        fock * density * overlap - overlap * density * fock
    }

    /// Stores a Fock matrix with its error; the oldest pair is dropped when full.
    pub fn update(&mut self, fock: DMatrix<f64>, error: DMatrix<f64>) {
        if self.error_matrices.len() >= self.max_subspace_size {
            self.error_matrices.remove(0);
            self.fock_matrices.remove(0);
        }
        self.error_matrices.push(error);
        self.fock_matrices.push(fock);
    }

    /// Returns None when the subspace is empty or the B matrix is singular.
    pub fn extrapolate(&self) -> Option<DMatrix<f64>> {
        let n = self.error_matrices.len();
        if n == 0 {
            return None;
        }

        // B_ij = <e_i|e_j>, bordered by the Σ c_i = 1 constraint
        let mut b = DMatrix::zeros(n + 1, n + 1);
        for i in 0..n {
            for j in 0..=i {
                let v = self.error_matrices[i].dot(&self.error_matrices[j]);
                b[(i, j)] = v;
                b[(j, i)] = v;
            }
            b[(i, n)] = -1.0;
            b[(n, i)] = -1.0;
        }
        // rescale so late iterations with tiny errors stay well conditioned
        let scale = (0..n).map(|i| b[(i, i)]).fold(0.0_f64, f64::max);
        if scale > 0.0 {
            for i in 0..n {
                for j in 0..n {
                    b[(i, j)] /= scale;
                }
            }
        }

        let mut rhs = DVector::zeros(n + 1);
        rhs[n] = -1.0;

        let coeffs = match b.lu().solve(&rhs) {
            Some(x) => x,
            None => {
                debug!("DIIS extrapolation failed: singular B matrix");
                return None;
            }
        };

        let mut fock = DMatrix::zeros(self.fock_matrices[0].nrows(), self.fock_matrices[0].ncols());
        for (f, &c) in self.fock_matrices.iter().zip(coeffs.iter()) {
            fock += f * c;
        }
        debug!("DIIS extrapolation with {} vectors", n);
        Some(fock)
    }

    pub fn reset(&mut self) {
        self.error_matrices.clear();
        self.fock_matrices.clear();
    }

    pub fn size(&self) -> usize {
        self.error_matrices.len()
    }
}
