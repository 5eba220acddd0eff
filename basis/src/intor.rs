//! AO integrals and their derivatives with respect to the electronic coordinate.
//!
//! Derivatives act on basis functions only (`<nabla i|`), which is minus the
//! derivative with respect to the centre the function sits on. The component of
//! a two-gradient request is `3 * first + second`.

use crate::basis::BasisSet;
use crate::cgto::{ContractedGTO, Shell};
use crate::error::IntegralError;
use crate::gto::{eri_coulomb_table, electron_repulsion, GaussianProduct, HermiteCoulomb, GTO};
use crate::molecule::Molecule;
use itertools::iproduct;
use nalgebra::{DMatrix, Vector3};
use rayon::prelude::*;
use std::ops::Range;

/// One-electron operators.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operator {
    Overlap,
    Kinetic,
    /// -Σ_C Z_C / |r - C| over all nuclei.
    Nuclear,
    /// 1 / |r - origin|
    Rinv(Vector3<f64>),
}

/// Placement of gradients in a one-electron integral.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deriv1e {
    None,
    /// <nabla i|O|j>
    Bra,
    /// <nabla nabla i|O|j>
    BraBra,
    /// <nabla i|O|nabla j>
    BraKet,
    /// <i|O|nabla nabla j>
    KetKet,
}

impl Deriv1e {
    pub fn ncomp(self) -> usize {
        match self {
            Deriv1e::None => 1,
            Deriv1e::Bra => 3,
            _ => 9,
        }
    }

    fn orders(self) -> (usize, usize) {
        match self {
            Deriv1e::None => (0, 0),
            Deriv1e::Bra => (1, 0),
            Deriv1e::BraBra => (2, 0),
            Deriv1e::BraKet => (1, 1),
            Deriv1e::KetKet => (0, 2),
        }
    }

    fn directions(self, comp: usize) -> (Vec<usize>, Vec<usize>) {
        let (x, y) = (comp / 3, comp % 3);
        match self {
            Deriv1e::None => (vec![], vec![]),
            Deriv1e::Bra => (vec![comp], vec![]),
            Deriv1e::BraBra => (vec![x, y], vec![]),
            Deriv1e::BraKet => (vec![x], vec![y]),
            Deriv1e::KetKet => (vec![], vec![x, y]),
        }
    }
}

/// Placement of gradients in a two-electron integral (ij|kl).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deriv2e {
    None,
    /// (nabla i j|kl)
    Bra1,
    /// (nabla nabla i j|kl)
    Bra1Bra1,
    /// (nabla i nabla j|kl)
    Bra1Ket1,
    /// (nabla i j|nabla k l)
    Bra1Bra2,
}

impl Deriv2e {
    pub fn ncomp(self) -> usize {
        match self {
            Deriv2e::None => 1,
            Deriv2e::Bra1 => 3,
            _ => 9,
        }
    }

    // table widening per function i, j, k, l
    fn extra(self) -> [usize; 4] {
        match self {
            Deriv2e::None => [0, 0, 0, 0],
            Deriv2e::Bra1 => [1, 0, 0, 0],
            Deriv2e::Bra1Bra1 => [2, 0, 0, 0],
            Deriv2e::Bra1Ket1 => [1, 1, 0, 0],
            Deriv2e::Bra1Bra2 => [1, 0, 1, 0],
        }
    }

    fn directions(self, comp: usize) -> [Vec<usize>; 4] {
        let (x, y) = (comp / 3, comp % 3);
        match self {
            Deriv2e::None => [vec![], vec![], vec![], vec![]],
            Deriv2e::Bra1 => [vec![comp], vec![], vec![], vec![]],
            Deriv2e::Bra1Bra1 => [vec![x, y], vec![], vec![], vec![]],
            Deriv2e::Bra1Ket1 => [vec![x], vec![y], vec![], vec![]],
            Deriv2e::Bra1Bra2 => [vec![x], vec![], vec![y], vec![]],
        }
    }
}

/// Dense block of two-electron integrals, `i` restricted to a contiguous AO range.
#[derive(Debug, Clone)]
pub struct Eri {
    pub ncomp: usize,
    pub nao: usize,
    ao_start: usize,
    ni: usize,
    data: Vec<f64>,
}

impl Eri {
    pub fn ao_range(&self) -> Range<usize> {
        self.ao_start..self.ao_start + self.ni
    }

    /// `i` is an absolute AO index inside `ao_range()`.
    #[inline]
    pub fn get(&self, comp: usize, i: usize, j: usize, k: usize, l: usize) -> f64 {
        let n = self.nao;
        self.data[(((comp * self.ni + i - self.ao_start) * n + j) * n + k) * n + l]
    }

    /// Contiguous (k, l) slab for fixed comp, i and j.
    pub fn kl_slab(&self, comp: usize, i: usize, j: usize) -> &[f64] {
        let n = self.nao;
        let start = ((comp * self.ni + i - self.ao_start) * n + j) * n * n;
        &self.data[start..start + n * n]
    }
}

// Gradient expansion of a primitive pair: (coefficient, powers on first, powers on second).
type PairTerms = Vec<(f64, Vector3<i32>, Vector3<i32>)>;

fn pair_terms(a: &GTO, da: &[usize], b: &GTO, db: &[usize]) -> PairTerms {
    let ta = a.nabla(da);
    let tb = b.nabla(db);
    iproduct!(ta.iter(), tb.iter())
        .map(|(&(ca, la), &(cb, lb))| (ca * cb, la, lb))
        .collect()
}

fn total_l(ao: &ContractedGTO) -> usize {
    let l = ao.l_xyz();
    (l.x + l.y + l.z) as usize
}

struct KetPair {
    coef: f64,
    product: GaussianProduct,
    terms: Vec<PairTerms>,
}

/// Basis functions placed on a molecule.
#[derive(Debug, Clone)]
pub struct AoBasis {
    molecule: Molecule,
    shells: Vec<Shell>,
    aos: Vec<ContractedGTO>,
    // AO offset of every shell plus the total
    shell_offsets: Vec<usize>,
}

impl AoBasis {
    pub fn new(molecule: &Molecule, basis: &BasisSet) -> Result<Self, IntegralError> {
        let mut shells = Vec::new();
        for (ia, atom) in molecule.atoms.iter().enumerate() {
            for template in basis.element(&atom.symbol)? {
                shells.push(Shell::from_template(ia, atom.position, template));
            }
        }
        let mut aos = Vec::new();
        let mut shell_offsets = vec![0];
        for (ish, shell) in shells.iter().enumerate() {
            aos.extend(shell.contract(ish));
            shell_offsets.push(aos.len());
        }
        Ok(Self {
            molecule: molecule.clone(),
            shells,
            aos,
            shell_offsets,
        })
    }

    /// Places the named library basis on `molecule`.
    pub fn build(molecule: &Molecule, basis_name: &str) -> Result<Self, IntegralError> {
        Self::new(molecule, &BasisSet::load(basis_name)?)
    }

    pub fn molecule(&self) -> &Molecule {
        &self.molecule
    }

    pub fn shells(&self) -> &[Shell] {
        &self.shells
    }

    pub fn aos(&self) -> &[ContractedGTO] {
        &self.aos
    }

    pub fn nao(&self) -> usize {
        self.aos.len()
    }

    pub fn nbas(&self) -> usize {
        self.shells.len()
    }

    pub fn natm(&self) -> usize {
        self.molecule.natm()
    }

    /// `[shl0, shl1, p0, p1]` per atom: shell range and AO range.
    pub fn aoslice_by_atom(&self) -> Vec<[usize; 4]> {
        (0..self.natm())
            .map(|ia| {
                let shl0 = self.shells.iter().take_while(|s| s.atom < ia).count();
                let shl1 = shl0 + self.shells[shl0..].iter().take_while(|s| s.atom == ia).count();
                [shl0, shl1, self.shell_offsets[shl0], self.shell_offsets[shl1]]
            })
            .collect()
    }

    pub fn shell_ao_range(&self, shells: Range<usize>) -> Result<Range<usize>, IntegralError> {
        if shells.start > shells.end || shells.end > self.nbas() {
            return Err(IntegralError::ShellRange {
                start: shells.start,
                end: shells.end,
                nbas: self.nbas(),
            });
        }
        Ok(self.shell_offsets[shells.start]..self.shell_offsets[shells.end])
    }

    fn one_electron_pair(&self, op: Operator, deriv: Deriv1e, i: usize, j: usize) -> Vec<f64> {
        let a = &self.aos[i];
        let b = &self.aos[j];
        let ncomp = deriv.ncomp();
        let (nbra, nket) = deriv.orders();
        let kinetic_extra = if op == Operator::Kinetic { 2 } else { 0 };
        let lmax = total_l(a) + total_l(b) + nbra + nket;
        let directions: Vec<(Vec<usize>, Vec<usize>)> =
            (0..ncomp).map(|c| deriv.directions(c)).collect();

        let mut out = vec![0.0; ncomp];
        for (pa, &ca) in a.primitives.iter().zip(a.coefficients.iter()) {
            for (pb, &cb) in b.primitives.iter().zip(b.coefficients.iter()) {
                let pair = GaussianProduct::new(pa, pb, nbra, nket + kinetic_extra);
                let coulomb: Vec<(f64, HermiteCoulomb)> = match op {
                    Operator::Nuclear => self
                        .molecule
                        .atoms
                        .iter()
                        .map(|atom| {
                            (-atom.charge, HermiteCoulomb::new(lmax, pair.p, pair.center - atom.position))
                        })
                        .collect(),
                    Operator::Rinv(origin) => {
                        vec![(1.0, HermiteCoulomb::new(lmax, pair.p, pair.center - origin))]
                    }
                    _ => Vec::new(),
                };

                for (c, (da, db)) in directions.iter().enumerate() {
                    let mut v = 0.0;
                    for (coef, la, lb) in pair_terms(pa, da, pb, db) {
                        let prim = match op {
                            Operator::Overlap => pair.overlap(la, lb),
                            Operator::Kinetic => pair.kinetic(la, lb),
                            Operator::Nuclear | Operator::Rinv(_) => coulomb
                                .iter()
                                .map(|(z, r)| z * pair.coulomb(la, lb, r))
                                .sum(),
                        };
                        v += coef * prim;
                    }
                    out[c] += ca * cb * v;
                }
            }
        }
        out
    }

    /// One-electron integrals, one `nao x nao` matrix per component.
    pub fn int1e(&self, op: Operator, deriv: Deriv1e) -> Result<Vec<DMatrix<f64>>, IntegralError> {
        let n = self.nao();
        let values: Vec<Vec<f64>> = iproduct!(0..n, 0..n)
            .collect::<Vec<_>>()
            .par_iter()
            .map(|&(i, j)| self.one_electron_pair(op, deriv, i, j))
            .collect();

        if values.iter().flatten().any(|v| !v.is_finite()) {
            return Err(IntegralError::NonFinite {
                integral: format!("{:?} {:?}", op, deriv),
            });
        }
        Ok((0..deriv.ncomp())
            .map(|c| DMatrix::from_fn(n, n, |i, j| values[i * n + j][c]))
            .collect())
    }

    fn ket_pairs(&self, deriv: Deriv2e) -> Vec<Vec<KetPair>> {
        let n = self.nao();
        let extra = deriv.extra();
        let ncomp = deriv.ncomp();
        iproduct!(0..n, 0..n)
            .collect::<Vec<_>>()
            .par_iter()
            .map(|&(k, l)| {
                let c = &self.aos[k];
                let d = &self.aos[l];
                let mut pairs = Vec::with_capacity(c.primitives.len() * d.primitives.len());
                for (pc, &cc) in c.primitives.iter().zip(c.coefficients.iter()) {
                    for (pd, &cd) in d.primitives.iter().zip(d.coefficients.iter()) {
                        let terms = (0..ncomp)
                            .map(|comp| {
                                let dirs = deriv.directions(comp);
                                pair_terms(pc, &dirs[2], pd, &dirs[3])
                            })
                            .collect();
                        pairs.push(KetPair {
                            coef: cc * cd,
                            product: GaussianProduct::new(pc, pd, extra[2], extra[3]),
                            terms,
                        });
                    }
                }
                pairs
            })
            .collect()
    }

    // all comps and all (k, l) for one (i, j)
    fn eri_row(&self, deriv: Deriv2e, kets: &[Vec<KetPair>], i: usize, j: usize) -> Vec<f64> {
        let n = self.nao();
        let ncomp = deriv.ncomp();
        let extra = deriv.extra();
        let nderiv: usize = extra.iter().sum();
        let a = &self.aos[i];
        let b = &self.aos[j];
        let mut out = vec![0.0; ncomp * n * n];

        for (pa, &ca) in a.primitives.iter().zip(a.coefficients.iter()) {
            for (pb, &cb) in b.primitives.iter().zip(b.coefficients.iter()) {
                let ab = GaussianProduct::new(pa, pb, extra[0], extra[1]);
                let bra_terms: Vec<PairTerms> = (0..ncomp)
                    .map(|comp| {
                        let dirs = deriv.directions(comp);
                        pair_terms(pa, &dirs[0], pb, &dirs[1])
                    })
                    .collect();

                for (k, l) in iproduct!(0..n, 0..n) {
                    let lmax = total_l(a) + total_l(b) + total_l(&self.aos[k]) + total_l(&self.aos[l]) + nderiv;
                    for ket in &kets[k * n + l] {
                        let r = eri_coulomb_table(&ab, &ket.product, lmax);
                        let scale = ca * cb * ket.coef;
                        for comp in 0..ncomp {
                            let mut v = 0.0;
                            for &(c1, li, lj) in &bra_terms[comp] {
                                for &(c2, lk, ll) in &ket.terms[comp] {
                                    v += c1 * c2 * electron_repulsion(&ab, li, lj, &ket.product, lk, ll, &r);
                                }
                            }
                            out[(comp * n + k) * n + l] += scale * v;
                        }
                    }
                }
            }
        }
        out
    }

    /// Two-electron integrals with `i` running over the AOs of `shells` and
    /// `j, k, l` over the whole basis.
    pub fn int2e(&self, deriv: Deriv2e, shells: Range<usize>) -> Result<Eri, IntegralError> {
        let ao = self.shell_ao_range(shells)?;
        let n = self.nao();
        let ni = ao.len();
        let ncomp = deriv.ncomp();
        let kets = self.ket_pairs(deriv);

        let rows: Vec<Vec<f64>> = iproduct!(ao.clone(), 0..n)
            .collect::<Vec<_>>()
            .par_iter()
            .map(|&(i, j)| self.eri_row(deriv, &kets, i, j))
            .collect();

        let mut data = vec![0.0; ncomp * ni * n * n * n];
        for (idx, row) in rows.iter().enumerate() {
            let (i, j) = (idx / n, idx % n);
            for comp in 0..ncomp {
                let dst = ((comp * ni + i) * n + j) * n * n;
                data[dst..dst + n * n].copy_from_slice(&row[comp * n * n..(comp + 1) * n * n]);
            }
        }
        if data.iter().any(|v| !v.is_finite()) {
            return Err(IntegralError::NonFinite {
                integral: format!("{:?} two-electron", deriv),
            });
        }
        Ok(Eri {
            ncomp,
            nao: n,
            ao_start: ao.start,
            ni,
            data,
        })
    }

    /// Full two-electron integral tensor over all shells.
    pub fn int2e_full(&self) -> Result<Eri, IntegralError> {
        self.int2e(Deriv2e::None, 0..self.nbas())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::molecule::Unit;

    fn water(displace: Option<(usize, usize, f64)>) -> AoBasis {
        let mut mol = Molecule::from_symbols(
            &["O", "H", "H"],
            &[
                Vector3::new(0.0, 0.0, 0.1),
                Vector3::new(0.0, 1.43, -0.9),
                Vector3::new(0.2, -1.43, -0.8),
            ],
            Unit::Bohr,
        )
        .unwrap();
        if let Some((ia, dir, step)) = displace {
            mol = mol.displaced(ia, dir, step);
        }
        AoBasis::build(&mol, "sto-3g").unwrap()
    }

    const H: f64 = 1e-4;

    #[test]
    fn test_layout() {
        let basis = water(None);
        assert_eq!(basis.nao(), 7);
        assert_eq!(basis.nbas(), 5);
        let slices = basis.aoslice_by_atom();
        assert_eq!(slices[0], [0, 3, 0, 5]);
        assert_eq!(slices[1], [3, 4, 5, 6]);
        assert_eq!(slices[2], [4, 5, 6, 7]);
        assert!(basis.shell_ao_range(4..6).is_err());
    }

    #[test]
    fn test_overlap_is_normalized_and_symmetric() {
        let basis = water(None);
        let s = &basis.int1e(Operator::Overlap, Deriv1e::None).unwrap()[0];
        for i in 0..7 {
            assert!((s[(i, i)] - 1.0).abs() < 1e-12);
            for j in 0..7 {
                assert!((s[(i, j)] - s[(j, i)]).abs() < 1e-14);
            }
        }
    }

    #[test]
    fn test_nuclear_is_sum_of_rinv() {
        let basis = water(None);
        let v = &basis.int1e(Operator::Nuclear, Deriv1e::None).unwrap()[0];
        let mut sum = DMatrix::zeros(7, 7);
        for atom in &basis.molecule().atoms {
            sum -= &basis.int1e(Operator::Rinv(atom.position), Deriv1e::None).unwrap()[0] * atom.charge;
        }
        assert!((v - &sum).amax() < 1e-12);
    }

    // d/dA <i|O|j> for i on A, j elsewhere is -<nabla i|O|j>
    #[test]
    fn test_bra_derivatives_match_finite_difference() {
        let origin = Vector3::new(0.3, -0.2, 0.4);
        for op in [Operator::Overlap, Operator::Kinetic, Operator::Rinv(origin)] {
            let basis = water(None);
            let ip = basis.int1e(op, Deriv1e::Bra).unwrap();
            for dir in 0..3 {
                let plus = &water(Some((0, dir, H))).int1e(op, Deriv1e::None).unwrap()[0];
                let minus = &water(Some((0, dir, -H))).int1e(op, Deriv1e::None).unwrap()[0];
                for i in 0..5 {
                    for j in 5..7 {
                        let fd = (plus[(i, j)] - minus[(i, j)]) / (2.0 * H);
                        assert!(
                            (fd + ip[dir][(i, j)]).abs() < 1e-7,
                            "{:?} dir {} ({}, {}): fd {} analytic {}",
                            op, dir, i, j, fd, -ip[dir][(i, j)]
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_second_derivatives_match_finite_difference() {
        let origin = Vector3::new(-0.1, 0.5, 0.2);
        for op in [Operator::Overlap, Operator::Kinetic, Operator::Rinv(origin)] {
            let basis = water(None);
            let ipip = basis.int1e(op, Deriv1e::BraBra).unwrap();
            let ipvip = basis.int1e(op, Deriv1e::BraKet).unwrap();
            let kk = basis.int1e(op, Deriv1e::KetKet).unwrap();
            for y in 0..3 {
                // moving O differentiates the bra (i on O)
                let po = water(Some((0, y, H))).int1e(op, Deriv1e::Bra).unwrap();
                let mo = water(Some((0, y, -H))).int1e(op, Deriv1e::Bra).unwrap();
                // moving H1 differentiates the ket (j = 5)
                let ph = water(Some((1, y, H))).int1e(op, Deriv1e::Bra).unwrap();
                let mh = water(Some((1, y, -H))).int1e(op, Deriv1e::Bra).unwrap();
                for x in 0..3 {
                    for i in 0..5 {
                        let j = 5;
                        let fd_aa = (po[x][(i, j)] - mo[x][(i, j)]) / (2.0 * H);
                        assert!((fd_aa + ipip[3 * x + y][(i, j)]).abs() < 1e-6, "{:?} ipip", op);
                        let fd_ab = (ph[x][(i, j)] - mh[x][(i, j)]) / (2.0 * H);
                        assert!((fd_ab + ipvip[3 * x + y][(i, j)]).abs() < 1e-6, "{:?} ipvip", op);
                        // <i|O|nabla nabla j> is the transpose of the bra-bra pattern
                        assert!((kk[3 * x + y][(j, i)] - ipip[3 * x + y][(i, j)]).abs() < 1e-10);
                    }
                }
            }
        }
    }

    #[test]
    fn test_eri_permutational_symmetry() {
        let basis = water(None);
        let eri = basis.int2e_full().unwrap();
        let (i, j, k, l) = (2, 5, 4, 6);
        let v = eri.get(0, i, j, k, l);
        assert!((eri.get(0, j, i, k, l) - v).abs() < 1e-12);
        assert!((eri.get(0, i, j, l, k) - v).abs() < 1e-12);
        assert!((eri.get(0, k, l, i, j) - v).abs() < 1e-12);
    }

    #[test]
    fn test_eri_derivatives_match_finite_difference() {
        let basis = water(None);
        let slices = basis.aoslice_by_atom();
        let oxygen = slices[0][0]..slices[0][1];
        let ip1 = basis.int2e(Deriv2e::Bra1, oxygen.clone()).unwrap();
        let ipip1 = basis.int2e(Deriv2e::Bra1Bra1, oxygen.clone()).unwrap();
        let ipvip1 = basis.int2e(Deriv2e::Bra1Ket1, oxygen.clone()).unwrap();
        let ip1ip2 = basis.int2e(Deriv2e::Bra1Bra2, oxygen.clone()).unwrap();
        assert_eq!(ip1.ao_range(), 0..5);

        for y in 0..3 {
            let full = |ia: usize, step: f64| water(Some((ia, y, step))).int2e(Deriv2e::None, 0..5).unwrap();
            let (p0, m0) = (full(0, H), full(0, -H));
            // only i sits on O
            for i in 0..5 {
                let fd = (p0.get(0, i, 5, 6, 5) - m0.get(0, i, 5, 6, 5)) / (2.0 * H);
                assert!((fd + ip1.get(y, i, 5, 6, 5)).abs() < 1e-7, "ip1 i={} dir={}", i, y);
            }

            let grad = |ia: usize, step: f64| water(Some((ia, y, step))).int2e(Deriv2e::Bra1, 0..3).unwrap();
            let (po, mo) = (grad(0, H), grad(0, -H));
            let (ph, mh) = (grad(1, H), grad(1, -H));
            for x in 0..3 {
                let c = 3 * x + y;
                for i in 0..5 {
                    let fd = (po.get(x, i, 6, 5, 6) - mo.get(x, i, 6, 5, 6)) / (2.0 * H);
                    assert!((fd + ipip1.get(c, i, 6, 5, 6)).abs() < 1e-6, "ipip1");
                    // j on H1
                    let fd = (ph.get(x, i, 5, 6, 6) - mh.get(x, i, 5, 6, 6)) / (2.0 * H);
                    assert!((fd + ipvip1.get(c, i, 5, 6, 6)).abs() < 1e-6, "ipvip1");
                    // k on H1
                    let fd = (ph.get(x, i, 6, 5, 6) - mh.get(x, i, 6, 5, 6)) / (2.0 * H);
                    assert!((fd + ip1ip2.get(c, i, 6, 5, 6)).abs() < 1e-6, "ip1ip2");
                }
            }
        }
    }
}
