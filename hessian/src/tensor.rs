//! Nuclear Hessian stored as `natm x natm` Cartesian 3x3 blocks.

use crate::error::HessianError;
use nalgebra::{DMatrix, Matrix3};
use serde::{Deserialize, Serialize};

/// `block(a, b)[(i, j)] = d²E / dR_a,i dR_b,j`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HessianTensor {
    natm: usize,
    blocks: Vec<Matrix3<f64>>,
}

impl HessianTensor {
    pub fn zeros(natm: usize) -> Self {
        HessianTensor {
            natm,
            blocks: vec![Matrix3::zeros(); natm * natm],
        }
    }

    pub fn natm(&self) -> usize {
        self.natm
    }

    pub fn block(&self, a: usize, b: usize) -> &Matrix3<f64> {
        &self.blocks[a * self.natm + b]
    }

    pub fn set_block(&mut self, a: usize, b: usize, block: Matrix3<f64>) {
        self.blocks[a * self.natm + b] = block;
    }

    /// Sets `(a, b)` to `block` and `(b, a)` to its transpose.
    pub fn set_pair(&mut self, a: usize, b: usize, block: Matrix3<f64>) {
        self.set_block(b, a, block.transpose());
        self.set_block(a, b, block);
    }

    pub fn get(&self, a: usize, b: usize, i: usize, j: usize) -> f64 {
        self.block(a, b)[(i, j)]
    }

    /// `3N x 3N` matrix with row `3a + i` and column `3b + j`.
    pub fn to_cartesian(&self) -> DMatrix<f64> {
        let n = self.natm;
        DMatrix::from_fn(3 * n, 3 * n, |r, c| self.get(r / 3, c / 3, r % 3, c % 3))
    }

    pub fn from_cartesian(matrix: &DMatrix<f64>) -> Result<Self, HessianError> {
        let (rows, cols) = matrix.shape();
        if rows != cols || rows % 3 != 0 {
            return Err(HessianError::DimensionMismatch(format!(
                "a Cartesian Hessian must be 3N x 3N, got {} x {}",
                rows, cols
            )));
        }
        let natm = rows / 3;
        let mut tensor = HessianTensor::zeros(natm);
        for a in 0..natm {
            for b in 0..natm {
                tensor.set_block(a, b, matrix.fixed_view::<3, 3>(3 * a, 3 * b).into_owned());
            }
        }
        Ok(tensor)
    }

    /// `Σ_k cos(k) h_k` over the row-major entries of [`to_cartesian`](Self::to_cartesian).
    pub fn fingerprint(&self) -> f64 {
        let flat = self.to_cartesian().transpose();
        flat.iter()
            .enumerate()
            .map(|(k, v)| (k as f64).cos() * v)
            .sum()
    }

    /// Largest `|H[a,b,i,j] - H[b,a,j,i]|`.
    pub fn max_asymmetry(&self) -> f64 {
        let h = self.to_cartesian();
        (&h - h.transpose()).amax()
    }

    /// Largest `|Σ_b H[a,b,i,j]|`; zero for a translation-invariant energy.
    pub fn translational_residual(&self) -> f64 {
        let mut worst = 0.0_f64;
        for a in 0..self.natm {
            let sum: Matrix3<f64> = (0..self.natm).map(|b| self.block(a, b)).sum();
            worst = worst.max(sum.amax());
        }
        worst
    }

    /// Blocks of the listed atoms, in the listed order.
    pub fn select(&self, atoms: &[usize]) -> Self {
        let mut out = HessianTensor::zeros(atoms.len());
        for (i, &a) in atoms.iter().enumerate() {
            for (j, &b) in atoms.iter().enumerate() {
                out.set_block(i, j, *self.block(a, b));
            }
        }
        out
    }

    /// Element-wise sum of two Hessians over the same atoms.
    pub fn try_add(mut self, rhs: &HessianTensor) -> Result<HessianTensor, HessianError> {
        if self.natm != rhs.natm {
            return Err(HessianError::DimensionMismatch(format!(
                "cannot add Hessians over {} and {} atoms",
                self.natm, rhs.natm
            )));
        }
        for (a, b) in self.blocks.iter_mut().zip(&rhs.blocks) {
            *a += b;
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> HessianTensor {
        let m = DMatrix::from_fn(6, 6, |r, c| ((r * 6 + c) as f64 * 0.7).sin() + ((c * 6 + r) as f64 * 0.7).sin());
        HessianTensor::from_cartesian(&m).unwrap()
    }

    #[test]
    fn test_block_layout() {
        let h = sample();
        let c = h.to_cartesian();
        assert_eq!(h.get(1, 0, 2, 1), c[(5, 1)]);
        assert_eq!(h.max_asymmetry(), 0.0);
        assert!(HessianTensor::from_cartesian(&DMatrix::zeros(4, 4)).is_err());
    }

    #[test]
    fn test_fingerprint_is_row_major() {
        let mut h = HessianTensor::zeros(2);
        let mut block = Matrix3::zeros();
        block[(0, 1)] = 1.0;
        h.set_block(0, 0, block);
        // row 0, column 1 of the 6x6 matrix
        assert!((h.fingerprint() - 1.0_f64.cos()).abs() < 1e-15);
        h.set_block(0, 0, Matrix3::zeros());
        h.set_block(1, 0, Matrix3::identity());
        // rows 3..6, columns 0..3
        let expected = 18.0_f64.cos() + 25.0_f64.cos() + 32.0_f64.cos();
        assert!((h.fingerprint() - expected).abs() < 1e-14);
    }

    #[test]
    fn test_set_pair_and_select() {
        let mut h = HessianTensor::zeros(3);
        let block = Matrix3::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0);
        h.set_pair(2, 0, block);
        assert_eq!(*h.block(0, 2), block.transpose());
        let sub = h.select(&[2, 0]);
        assert_eq!(*sub.block(0, 1), block);
        assert_eq!(sub.natm(), 2);
    }

    #[test]
    fn test_translational_residual_and_add() {
        let mut h = HessianTensor::zeros(2);
        h.set_block(0, 0, Matrix3::identity());
        h.set_pair(0, 1, -Matrix3::identity());
        h.set_block(1, 1, Matrix3::identity());
        assert_eq!(h.translational_residual(), 0.0);
        let doubled = h.clone().try_add(&h).unwrap();
        assert_eq!(doubled.get(0, 1, 2, 2), -2.0);
        let err = h.try_add(&HessianTensor::zeros(3)).unwrap_err();
        assert!(matches!(err, HessianError::DimensionMismatch(_)));
    }
}
