#![allow(non_snake_case)]
extern crate nalgebra as na;

use crate::helper::{boys_table, double_factorial};
use na::Vector3;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Cartesian Gaussian primitive x^l y^m z^n exp(-alpha |r - A|^2).
///
/// Primitives carry no normalization; contraction coefficients absorb it.
#[derive(Debug, Serialize, Deserialize, Copy, Clone)]
pub struct GTO {
    pub alpha: f64,
    pub l_xyz: Vector3<i32>,
    pub center: Vector3<f64>,
}

impl GTO {
    pub fn new(alpha: f64, l_xyz: Vector3<i32>, center: Vector3<f64>) -> Self {
        Self {
            alpha,
            l_xyz,
            center,
        }
    }

    pub fn evaluate(&self, r: &Vector3<f64>) -> f64 {
        let d = r - self.center;
        d.x.powi(self.l_xyz.x) * d.y.powi(self.l_xyz.y) * d.z.powi(self.l_xyz.z)
            * (-self.alpha * d.norm_squared()).exp()
    }

    /// Normalization constant of the primitive.
    pub fn norm(&self) -> f64 {
        let l = self.l_xyz.x + self.l_xyz.y + self.l_xyz.z;
        let a = self.alpha;
        let df = double_factorial(2 * self.l_xyz.x - 1)
            * double_factorial(2 * self.l_xyz.y - 1)
            * double_factorial(2 * self.l_xyz.z - 1);
        (2.0 * a / PI).powf(0.75) * (4.0 * a).powf(l as f64 / 2.0) / df.sqrt()
    }

    /// Applies the electronic gradient along each of `dirs` in turn.
    ///
    /// d/dx_d phi = l_d phi(l_d - 1) - 2 alpha phi(l_d + 1), so the result is a
    /// combination of primitives sharing this exponent and centre.
    pub fn nabla(&self, dirs: &[usize]) -> Vec<(f64, Vector3<i32>)> {
        let mut terms = vec![(1.0, self.l_xyz)];
        for &d in dirs {
            let mut next = Vec::with_capacity(terms.len() * 2);
            for (c, l) in terms {
                if l[d] > 0 {
                    let mut lower = l;
                    lower[d] -= 1;
                    next.push((c * l[d] as f64, lower));
                }
                let mut upper = l;
                upper[d] += 1;
                next.push((-2.0 * self.alpha * c, upper));
            }
            terms = next;
        }
        terms
    }

    fn max_l(&self) -> usize {
        self.l_xyz.x.max(self.l_xyz.y).max(self.l_xyz.z).max(0) as usize
    }
}

/// McMurchie-Davidson expansion coefficients E^{ij}_t of a 1D Gaussian product.
#[derive(Debug, Clone)]
pub struct HermiteE {
    jdim: usize,
    tdim: usize,
    imax: usize,
    data: Vec<f64>,
}

impl HermiteE {
    /// `Qx` is the separation A - B, `a` and `b` the exponents on A and B.
    pub fn new(imax: usize, jmax: usize, Qx: f64, a: f64, b: f64) -> Self {
        let p = a + b;
        let q = a * b / p;
        let XPA = -q * Qx / a;
        let XPB = q * Qx / b;
        let jdim = jmax + 1;
        let tdim = imax + jmax + 1;
        let mut e = HermiteE {
            jdim,
            tdim,
            imax,
            data: vec![0.0; (imax + 1) * jdim * tdim],
        };
        e.data[0] = (-q * Qx * Qx).exp();

        for i in 0..=imax as i32 {
            for j in 0..=jmax as i32 {
                if i == 0 && j == 0 {
                    continue;
                }
                for t in 0..=(i + j) {
                    let val = if i > 0 {
                        e.get(i - 1, j, t - 1) / (2.0 * p)
                            + XPA * e.get(i - 1, j, t)
                            + (t + 1) as f64 * e.get(i - 1, j, t + 1)
                    } else {
                        e.get(i, j - 1, t - 1) / (2.0 * p)
                            + XPB * e.get(i, j - 1, t)
                            + (t + 1) as f64 * e.get(i, j - 1, t + 1)
                    };
                    let idx = e.index(i as usize, j as usize, t as usize);
                    e.data[idx] = val;
                }
            }
        }
        e
    }

    fn index(&self, i: usize, j: usize, t: usize) -> usize {
        (i * self.jdim + j) * self.tdim + t
    }

    pub fn get(&self, i: i32, j: i32, t: i32) -> f64 {
        if i < 0 || j < 0 || t < 0 || t > i + j {
            return 0.0;
        }
        debug_assert!(i as usize <= self.imax && (j as usize) < self.jdim);
        self.data[self.index(i as usize, j as usize, t as usize)]
    }
}

/// Hermite Coulomb integrals R_{tuv} = R^0_{tuv}(p, PC) for t + u + v <= lmax.
#[derive(Debug, Clone)]
pub struct HermiteCoulomb {
    dim: usize,
    data: Vec<f64>,
}

impl HermiteCoulomb {
    pub fn new(lmax: usize, p: f64, PC: Vector3<f64>) -> Self {
        let dim = lmax + 1;
        let idx = |n: usize, t: usize, u: usize, v: usize| ((n * dim + t) * dim + u) * dim + v;
        let mut r = vec![0.0; dim * dim * dim * dim];
        let boys = boys_table(lmax, p * PC.norm_squared());

        // R^n_{t+1,u,v} = t R^{n+1}_{t-1,u,v} + X_PC R^{n+1}_{t,u,v}
        for n in (0..=lmax).rev() {
            let budget = lmax - n;
            for t in 0..=budget {
                for u in 0..=(budget - t) {
                    for v in 0..=(budget - t - u) {
                        let val = if t > 0 {
                            let mut x = PC.x * r[idx(n + 1, t - 1, u, v)];
                            if t > 1 {
                                x += (t - 1) as f64 * r[idx(n + 1, t - 2, u, v)];
                            }
                            x
                        } else if u > 0 {
                            let mut x = PC.y * r[idx(n + 1, t, u - 1, v)];
                            if u > 1 {
                                x += (u - 1) as f64 * r[idx(n + 1, t, u - 2, v)];
                            }
                            x
                        } else if v > 0 {
                            let mut x = PC.z * r[idx(n + 1, t, u, v - 1)];
                            if v > 1 {
                                x += (v - 1) as f64 * r[idx(n + 1, t, u, v - 2)];
                            }
                            x
                        } else {
                            (-2.0 * p).powi(n as i32) * boys[n]
                        };
                        r[idx(n, t, u, v)] = val;
                    }
                }
            }
        }
        r.truncate(dim * dim * dim);
        Self { dim, data: r }
    }

    pub fn get(&self, t: usize, u: usize, v: usize) -> f64 {
        self.data[(t * self.dim + u) * self.dim + v]
    }
}

/// Gaussian product of two primitives with Hermite tables in x, y and z.
///
/// `extra_a` and `extra_b` widen the tables so that angular momenta raised by
/// derivative or kinetic operators stay in range.
#[derive(Debug, Clone)]
pub struct GaussianProduct {
    pub p: f64,
    pub center: Vector3<f64>,
    beta: f64,
    e: [HermiteE; 3],
}

impl GaussianProduct {
    pub fn new(a: &GTO, b: &GTO, extra_a: usize, extra_b: usize) -> Self {
        let p = a.alpha + b.alpha;
        let center = (a.center * a.alpha + b.center * b.alpha) / p;
        let Q = a.center - b.center;
        let imax = a.max_l() + extra_a;
        let jmax = b.max_l() + extra_b;
        let e = [
            HermiteE::new(imax, jmax, Q.x, a.alpha, b.alpha),
            HermiteE::new(imax, jmax, Q.y, a.alpha, b.alpha),
            HermiteE::new(imax, jmax, Q.z, a.alpha, b.alpha),
        ];
        Self {
            p,
            center,
            beta: b.alpha,
            e,
        }
    }

    fn s1d(&self, d: usize, i: i32, j: i32) -> f64 {
        self.e[d].get(i, j, 0) * (PI / self.p).sqrt()
    }

    // -1/2 <i| d^2/dx^2 |j>
    fn t1d(&self, d: usize, i: i32, j: i32) -> f64 {
        let b = self.beta;
        let jf = j as f64;
        -0.5 * (jf * (jf - 1.0) * self.s1d(d, i, j - 2) - 2.0 * b * (2.0 * jf + 1.0) * self.s1d(d, i, j)
            + 4.0 * b * b * self.s1d(d, i, j + 2))
    }

    pub fn overlap(&self, la: Vector3<i32>, lb: Vector3<i32>) -> f64 {
        self.s1d(0, la.x, lb.x) * self.s1d(1, la.y, lb.y) * self.s1d(2, la.z, lb.z)
    }

    /// Kinetic energy integral; the operator acts on the ket.
    pub fn kinetic(&self, la: Vector3<i32>, lb: Vector3<i32>) -> f64 {
        let s = [
            self.s1d(0, la.x, lb.x),
            self.s1d(1, la.y, lb.y),
            self.s1d(2, la.z, lb.z),
        ];
        self.t1d(0, la.x, lb.x) * s[1] * s[2]
            + s[0] * self.t1d(1, la.y, lb.y) * s[2]
            + s[0] * s[1] * self.t1d(2, la.z, lb.z)
    }

    /// <a|1/|r - C||b> given the Hermite Coulomb table built for P - C.
    pub fn coulomb(&self, la: Vector3<i32>, lb: Vector3<i32>, r: &HermiteCoulomb) -> f64 {
        let mut val = 0.0;
        for t in 0..=(la.x + lb.x) {
            let ex = self.e[0].get(la.x, lb.x, t);
            for u in 0..=(la.y + lb.y) {
                let exy = ex * self.e[1].get(la.y, lb.y, u);
                for v in 0..=(la.z + lb.z) {
                    val += exy * self.e[2].get(la.z, lb.z, v) * r.get(t as usize, u as usize, v as usize);
                }
            }
        }
        2.0 * PI / self.p * val
    }

    fn hermite(&self, la: Vector3<i32>, lb: Vector3<i32>) -> Vec<(usize, usize, usize, f64)> {
        let mut coeffs = Vec::new();
        for t in 0..=(la.x + lb.x) {
            let ex = self.e[0].get(la.x, lb.x, t);
            for u in 0..=(la.y + lb.y) {
                let exy = ex * self.e[1].get(la.y, lb.y, u);
                for v in 0..=(la.z + lb.z) {
                    let c = exy * self.e[2].get(la.z, lb.z, v);
                    if c != 0.0 {
                        coeffs.push((t as usize, u as usize, v as usize, c));
                    }
                }
            }
        }
        coeffs
    }
}

/// Primitive electron repulsion integral (ab|cd).
///
/// `r` must be the Hermite Coulomb table for the reduced exponent pq/(p+q)
/// and separation P - Q.
pub fn electron_repulsion(
    ab: &GaussianProduct,
    la: Vector3<i32>,
    lb: Vector3<i32>,
    cd: &GaussianProduct,
    lc: Vector3<i32>,
    ld: Vector3<i32>,
    r: &HermiteCoulomb,
) -> f64 {
    let bra = ab.hermite(la, lb);
    let ket = cd.hermite(lc, ld);
    let mut val = 0.0;
    for &(t, u, v, e1) in &bra {
        for &(tau, nu, phi, e2) in &ket {
            let sgn = if (tau + nu + phi) % 2 == 0 { 1.0 } else { -1.0 };
            val += e1 * e2 * sgn * r.get(t + tau, u + nu, v + phi);
        }
    }
    let p = ab.p;
    let q = cd.p;
    2.0 * PI.powf(2.5) / (p * q * (p + q).sqrt()) * val
}

/// Hermite Coulomb table for the pair of Gaussian products entering an ERI.
pub fn eri_coulomb_table(ab: &GaussianProduct, cd: &GaussianProduct, lmax: usize) -> HermiteCoulomb {
    let alpha = ab.p * cd.p / (ab.p + cd.p);
    HermiteCoulomb::new(lmax, alpha, ab.center - cd.center)
}
