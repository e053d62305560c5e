use crate::{algorithms::{hierarchisation::on_fiber, sweep::{self, SweepFunction}, up_down::{self, UpDown}}, errors::SGError, iterators::grid_iterator::{GridIterator, GridIteratorT}, storage::SparseGridData};

///
/// Level zero neighbours of the current fiber. Leaves the iterator on the right level
/// zero point.
///
pub(crate) fn boundary_pair(iterator: &mut GridIterator, dim: usize) -> (Option<usize>, Option<usize>)
{
    let left = iterator.seq();
    iterator.reset_to_right_level_zero(dim);
    (left, iterator.seq())
}

#[inline]
pub(crate) fn value_or_zero(source: &[f64], seq: Option<usize>) -> f64
{
    seq.map_or(0.0, |s| source[s])
}

///
/// Up part of the 1D mass matrix of hierarchical hats: every point collects
/// `∫ φ_p φ_c α_c` from all of its descendants `c` in the fiber.
///
pub struct PhiPhiUp
{
    q: f64,
}

impl PhiPhiUp
{
    pub fn new(storage: &SparseGridData, dim: usize) -> Self
    {
        Self { q: storage.bounding_box().width(dim) }
    }

    // fl and fr are the descendant contributions seen by the left and right
    // neighbours of the subtree rooted at the iterator
    fn recurse(&self, source: &[f64], result: &mut [f64], iterator: &mut GridIterator, dim: usize, fl: &mut f64, fr: &mut f64)
    {
        let Some(seq) = iterator.seq() else { return };
        let mut fml = 0.0;
        let mut fmr = 0.0;
        if !iterator.is_leaf()
        {
            iterator.left_child(dim);
            if iterator.seq().is_some()
            {
                self.recurse(source, result, iterator, dim, fl, &mut fml);
            }
            iterator.step_right(dim);
            if iterator.seq().is_some()
            {
                self.recurse(source, result, iterator, dim, &mut fmr, fr);
            }
            iterator.up(dim);
        }
        let level = iterator.point_level(dim) as u32;
        let fm = fml + fmr;
        result[seq] = fm;
        let tmp = 0.5 * fm + source[seq] * self.q / (1_u64 << (level + 1)) as f64;
        *fl += tmp;
        *fr += tmp;
    }
}

impl SweepFunction for PhiPhiUp
{
    fn execute(&mut self, source: &[f64], result: &mut [f64], iterator: &mut GridIterator, dim: usize) -> Result<(), SGError> {
        let mut fl = 0.0;
        let mut fr = 0.0;
        if iterator.point_level(dim) == 0
        {
            let (left, right) = boundary_pair(iterator, dim);
            on_fiber(iterator, dim, |it| self.recurse(source, result, it, dim, &mut fl, &mut fr));
            let bbox = iterator.storage.bounding_box();
            if let Some(seq) = left
            {
                result[seq] = if bbox.dirichlet_left[dim] { 0.0 } else { fl };
            }
            if let Some(seq) = right
            {
                result[seq] = if bbox.dirichlet_right[dim] { 0.0 } else { fr };
            }
        }
        else
        {
            self.recurse(source, result, iterator, dim, &mut fl, &mut fr);
        }
        Ok(())
    }
}

///
/// Down part of the 1D mass matrix including the diagonal: every point collects
/// `∫ φ_p φ_a α_a` from all of its ancestors `a` and itself.
///
pub struct PhiPhiDown
{
    q: f64,
}

impl PhiPhiDown
{
    pub fn new(storage: &SparseGridData, dim: usize) -> Self
    {
        Self { q: storage.bounding_box().width(dim) }
    }

    // fl and fr are the values of the ancestors' interpolant at the ends of the support
    fn recurse(&self, source: &[f64], result: &mut [f64], iterator: &mut GridIterator, dim: usize, fl: f64, fr: f64)
    {
        let Some(seq) = iterator.seq() else { return };
        let level = iterator.point_level(dim) as u32;
        let h = 1.0 / (1_u64 << level) as f64;
        let alpha = source[seq];
        result[seq] = self.q * (h * 0.5 * (fl + fr) + 2.0 / 3.0 * h * alpha);
        if !iterator.is_leaf()
        {
            let fm = 0.5 * (fl + fr) + alpha;
            iterator.left_child(dim);
            if iterator.seq().is_some()
            {
                self.recurse(source, result, iterator, dim, fl, fm);
            }
            iterator.step_right(dim);
            if iterator.seq().is_some()
            {
                self.recurse(source, result, iterator, dim, fm, fr);
            }
            iterator.up(dim);
        }
    }
}

impl SweepFunction for PhiPhiDown
{
    fn execute(&mut self, source: &[f64], result: &mut [f64], iterator: &mut GridIterator, dim: usize) -> Result<(), SGError> {
        if iterator.point_level(dim) == 0
        {
            let (left, right) = boundary_pair(iterator, dim);
            let al = value_or_zero(source, left);
            let ar = value_or_zero(source, right);
            on_fiber(iterator, dim, |it| self.recurse(source, result, it, dim, al, ar));
            let bbox = iterator.storage.bounding_box();
            if let Some(seq) = left
            {
                result[seq] = if bbox.dirichlet_left[dim] { 0.0 } else { self.q * (al / 3.0 + ar / 6.0) };
            }
            if let Some(seq) = right
            {
                result[seq] = if bbox.dirichlet_right[dim] { 0.0 } else { self.q * (al / 6.0 + ar / 3.0) };
            }
        }
        else
        {
            self.recurse(source, result, iterator, dim, 0.0, 0.0);
        }
        Ok(())
    }
}

///
/// Matrix-free mass matrix `M_ij = ∫ φ_i φ_j dx` over the bounding box for piecewise
/// linear grids, with or without boundary points.
///
pub struct OperationLTwoDotProduct<'a>
{
    storage: &'a SparseGridData,
}

impl<'a> OperationLTwoDotProduct<'a>
{
    pub fn new(storage: &'a SparseGridData) -> Self
    {
        Self { storage }
    }

    pub fn mult(&self, alpha: &[f64], result: &mut [f64]) -> Result<(), SGError>
    {
        up_down::mult(self, alpha, result)
    }
}

impl UpDown for OperationLTwoDotProduct<'_>
{
    fn storage(&self) -> &SparseGridData {
        self.storage
    }

    fn up(&self, source: &[f64], result: &mut [f64], dim: usize) -> Result<(), SGError> {
        sweep::sweep(&mut PhiPhiUp::new(self.storage, dim), self.storage, source, result, dim)
    }

    fn down(&self, source: &[f64], result: &mut [f64], dim: usize) -> Result<(), SGError> {
        sweep::sweep(&mut PhiPhiDown::new(self.storage, dim), self.storage, source, result, dim)
    }
}

#[cfg(test)]
pub(crate) mod tests
{
    use super::*;
    use crate::{basis::{base::{Basis, BasisType}, gauss_legendre::integrate_interval}, generators, storage::BoundingBox};

    ///
    /// Dense reference matrix built by tensor-product quadrature of the 1D factors.
    ///
    pub(crate) fn reference_matrix<F: Fn(usize, (u32, u32), (u32, u32)) -> f64>(storage: &SparseGridData, factor: F) -> Vec<Vec<f64>>
    {
        let n = storage.len();
        let mut m = vec![vec![0.0; n]; n];
        for i in 0..n
        {
            for j in 0..n
            {
                m[i][j] = (0..storage.num_inputs()).map(|d|
                {
                    factor(d, (storage.level(i, d) as u32, storage.index(i, d)), (storage.level(j, d) as u32, storage.index(j, d)))
                }).product();
            }
        }
        m
    }

    pub(crate) fn hat_product(basis: BasisType, a: (u32, u32), b: (u32, u32)) -> f64
    {
        // integrate cell by cell on the finest of both meshes
        let level = a.0.max(b.0).max(1);
        let h = 1.0 / (1_u64 << level) as f64;
        (0..(1_u64 << level)).map(|k|
        {
            let lo = k as f64 * h;
            integrate_interval(|x| basis.eval(a.0, a.1, x) * basis.eval(b.0, b.1, x), lo, lo + h, 3)
        }).sum()
    }

    pub(crate) fn check_against(storage: &SparseGridData, matrix: &[Vec<f64>], apply: impl Fn(&[f64], &mut [f64]))
    {
        let n = storage.len();
        for j in 0..n
        {
            let mut unit = vec![0.0; n];
            unit[j] = 1.0;
            let mut column = vec![0.0; n];
            apply(&unit, &mut column);
            for i in 0..n
            {
                assert!((column[i] - matrix[i][j]).abs() < 1e-12, "({i}, {j}): {} != {}", column[i], matrix[i][j]);
            }
        }
    }

    #[test]
    fn mass_matrix_matches_quadrature()
    {
        let mut storage = SparseGridData::new(2);
        generators::regular(&mut storage, 3).unwrap();
        *storage.bounding_box_mut() = BoundingBox::new(&[0.0, -1.0], &[2.0, 0.5]);
        let widths = [2.0, 1.5];
        let matrix = reference_matrix(&storage, |d, a, b| widths[d] * hat_product(BasisType::Linear, a, b));
        let op = OperationLTwoDotProduct::new(&storage);
        check_against(&storage, &matrix, |a, r| op.mult(a, r).unwrap());
    }

    #[test]
    fn boundary_mass_matrix_matches_quadrature()
    {
        let mut storage = SparseGridData::new(2);
        generators::regular_with_boundaries(&mut storage, 3, 1).unwrap();
        let matrix = reference_matrix(&storage, |_, a, b| hat_product(BasisType::LinearBoundary, a, b));
        let op = OperationLTwoDotProduct::new(&storage);
        check_against(&storage, &matrix, |a, r| op.mult(a, r).unwrap());

        let mut storage = SparseGridData::new(1);
        generators::full_with_boundaries(&mut storage, 3).unwrap();
        let matrix = reference_matrix(&storage, |_, a, b| hat_product(BasisType::LinearBoundary, a, b));
        let op = OperationLTwoDotProduct::new(&storage);
        check_against(&storage, &matrix, |a, r| op.mult(a, r).unwrap());
    }

    #[test]
    fn mass_matrix_is_symmetric()
    {
        let mut storage = SparseGridData::new(3);
        generators::regular(&mut storage, 4).unwrap();
        let n = storage.len();
        let op = OperationLTwoDotProduct::new(&storage);
        let x: Vec<f64> = (0..n).map(|i| ((i * 7 % 13) as f64) - 6.0).collect();
        let y: Vec<f64> = (0..n).map(|i| ((i * 5 % 11) as f64) * 0.25).collect();
        let mut mx = vec![0.0; n];
        let mut my = vec![0.0; n];
        op.mult(&x, &mut mx).unwrap();
        op.mult(&y, &mut my).unwrap();
        let xmy: f64 = x.iter().zip(&my).map(|(a, b)| a * b).sum();
        let ymx: f64 = y.iter().zip(&mx).map(|(a, b)| a * b).sum();
        assert!((xmy - ymx).abs() < 1e-10 * xmy.abs().max(1.0));
    }

    #[test]
    fn dirichlet_boundary_rows_vanish()
    {
        let mut storage = SparseGridData::new(1);
        generators::full_with_boundaries(&mut storage, 2).unwrap();
        storage.bounding_box_mut().set_dirichlet(0, true, true);
        let op = OperationLTwoDotProduct::new(&storage);
        let alpha = vec![1.0; storage.len()];
        let mut result = vec![0.0; storage.len()];
        op.mult(&alpha, &mut result).unwrap();
        for seq in 0..storage.len()
        {
            if storage.level(seq, 0) == 0
            {
                assert_eq!(result[seq], 0.0);
            }
            else
            {
                assert!(result[seq] > 0.0);
            }
        }
        assert_eq!(op.mult(&alpha[1..], &mut result), Err(SGError::NumberOfPointsAndValuesMismatch));
    }
}
