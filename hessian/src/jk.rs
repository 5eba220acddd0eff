//! Contractions of AO two-electron blocks with density matrices.
//!
//! A [`Script`] names which density indices are summed and which remain, with
//! the integral indexed as (ij|kl) and `i` restricted to the block's AO range.
//! Results are always full `nao x nao` matrices; rows or columns outside the
//! restricted range stay zero.

use basis::Eri;
use nalgebra::DMatrix;
use rayon::prelude::*;
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    /// v[k,l] = Σ (ij|kl) D[j,i]
    JiKl,
    /// v[i,j] = Σ (ij|kl) D[l,k]
    LkIj,
    /// v[k,j] = Σ (ij|kl) D[l,i]
    LiKj,
    /// v[i,l] = Σ (ij|kl) D[j,k]
    JkIl,
    /// v[k,i] = Σ (ij|kl) D[l,j]
    LjKi,
}

fn contract_comp(eri: &Eri, comp: usize, script: Script, dm: &DMatrix<f64>) -> DMatrix<f64> {
    let n = eri.nao;
    let mut v = DMatrix::zeros(n, n);
    for i in eri.ao_range() {
        for j in 0..n {
            let slab = eri.kl_slab(comp, i, j);
            match script {
                Script::JiKl => {
                    let d = dm[(j, i)];
                    for k in 0..n {
                        for l in 0..n {
                            v[(k, l)] += slab[k * n + l] * d;
                        }
                    }
                }
                Script::LkIj => {
                    let mut acc = 0.0;
                    for k in 0..n {
                        for l in 0..n {
                            acc += slab[k * n + l] * dm[(l, k)];
                        }
                    }
                    v[(i, j)] += acc;
                }
                Script::LiKj => {
                    for k in 0..n {
                        let mut acc = 0.0;
                        for l in 0..n {
                            acc += slab[k * n + l] * dm[(l, i)];
                        }
                        v[(k, j)] += acc;
                    }
                }
                Script::JkIl => {
                    for k in 0..n {
                        let d = dm[(j, k)];
                        for l in 0..n {
                            v[(i, l)] += slab[k * n + l] * d;
                        }
                    }
                }
                Script::LjKi => {
                    for k in 0..n {
                        let mut acc = 0.0;
                        for l in 0..n {
                            acc += slab[k * n + l] * dm[(l, j)];
                        }
                        v[(k, i)] += acc;
                    }
                }
            }
        }
    }
    v
}

/// Applies `script` to every component of `eri`.
pub fn contract(eri: &Eri, script: Script, dm: &DMatrix<f64>) -> Vec<DMatrix<f64>> {
    (0..eri.ncomp)
        .into_par_iter()
        .map(|comp| contract_comp(eri, comp, script, dm))
        .collect()
}

/// Coulomb and exchange matrices of `dm` from the full ERI tensor.
pub fn get_jk(eri: &Eri, dm: &DMatrix<f64>) -> (DMatrix<f64>, DMatrix<f64>) {
    let (vj, vk) = rayon::join(
        || contract_comp(eri, 0, Script::LkIj, dm),
        || contract_comp(eri, 0, Script::JkIl, dm),
    );
    (vj, vk)
}

/// Keeps rows `rows` of `m` and zeroes the rest.
pub fn rows_only(m: &DMatrix<f64>, rows: Range<usize>) -> DMatrix<f64> {
    let mut out = DMatrix::zeros(m.nrows(), m.ncols());
    out.rows_mut(rows.start, rows.len())
        .copy_from(&m.rows(rows.start, rows.len()));
    out
}

/// Σ_{p in rows, q in cols} a[p,q] b[p,q]
pub fn block_dot(a: &DMatrix<f64>, b: &DMatrix<f64>, rows: Range<usize>, cols: Range<usize>) -> f64 {
    a.view((rows.start, cols.start), (rows.len(), cols.len()))
        .dot(&b.view((rows.start, cols.start), (rows.len(), cols.len())))
}
