use crate::{algorithms::{hierarchisation::on_fiber, l2_dot_product::{boundary_pair, value_or_zero, PhiPhiDown, PhiPhiUp}, sweep::{self, SweepFunction}, up_down::{self, UpDown, UpDownOneOpDim}}, errors::SGError, iterators::grid_iterator::{GridIterator, GridIteratorT}, storage::SparseGridData};

///
/// Down part of the 1D stiffness matrix `∫ φ'_i φ'_j`. Hierarchical hats are orthogonal
/// in the energy norm, so only the diagonal and the coupling of the two level zero
/// functions remain.
///
pub struct LaplaceDown
{
    q: f64,
}

impl LaplaceDown
{
    pub fn new(storage: &SparseGridData, dim: usize) -> Self
    {
        Self { q: storage.bounding_box().width(dim) }
    }

    fn recurse(&self, source: &[f64], result: &mut [f64], iterator: &mut GridIterator, dim: usize)
    {
        let Some(seq) = iterator.seq() else { return };
        let level = iterator.point_level(dim) as u32;
        result[seq] = (1_u64 << (level + 1)) as f64 / self.q * source[seq];
        if !iterator.is_leaf()
        {
            iterator.left_child(dim);
            self.recurse(source, result, iterator, dim);
            iterator.step_right(dim);
            self.recurse(source, result, iterator, dim);
            iterator.up(dim);
        }
    }
}

impl SweepFunction for LaplaceDown
{
    fn execute(&mut self, source: &[f64], result: &mut [f64], iterator: &mut GridIterator, dim: usize) -> Result<(), SGError> {
        if iterator.point_level(dim) == 0
        {
            let (left, right) = boundary_pair(iterator, dim);
            let al = value_or_zero(source, left);
            let ar = value_or_zero(source, right);
            on_fiber(iterator, dim, |it| self.recurse(source, result, it, dim));
            let bbox = iterator.storage.bounding_box();
            if let Some(seq) = left
            {
                result[seq] = if bbox.dirichlet_left[dim] { 0.0 } else { (al - ar) / self.q };
            }
            if let Some(seq) = right
            {
                result[seq] = if bbox.dirichlet_right[dim] { 0.0 } else { (ar - al) / self.q };
            }
        }
        else
        {
            self.recurse(source, result, iterator, dim);
        }
        Ok(())
    }
}

///
/// Matrix-free Laplacian `L_ij = ∫ ∇φ_i · ∇φ_j dx` for piecewise linear grids. Every term
/// of the gradient product applies the stiffness matrix in one direction and the mass
/// matrix in all others.
///
pub struct OperationLaplace<'a>
{
    storage: &'a SparseGridData,
}

impl<'a> OperationLaplace<'a>
{
    pub fn new(storage: &'a SparseGridData) -> Self
    {
        Self { storage }
    }

    pub fn mult(&self, alpha: &[f64], result: &mut [f64]) -> Result<(), SGError>
    {
        up_down::mult_one_op_dim(self, alpha, result)
    }
}

impl UpDown for OperationLaplace<'_>
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

impl UpDownOneOpDim for OperationLaplace<'_>
{
    fn up_op_dim(&self, _source: &[f64], result: &mut [f64], _dim: usize) -> Result<(), SGError> {
        result.fill(0.0);
        Ok(())
    }

    fn down_op_dim(&self, source: &[f64], result: &mut [f64], dim: usize) -> Result<(), SGError> {
        sweep::sweep(&mut LaplaceDown::new(self.storage, dim), self.storage, source, result, dim)
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::{algorithms::l2_dot_product::tests::{check_against, hat_product, reference_matrix}, basis::{base::{Basis, BasisType}, gauss_legendre::integrate_interval}, generators, storage::BoundingBox};

    fn stiffness(basis: BasisType, a: (u32, u32), b: (u32, u32)) -> f64
    {
        let level = a.0.max(b.0).max(1);
        let h = 1.0 / (1_u64 << level) as f64;
        (0..(1_u64 << level)).map(|k|
        {
            let lo = k as f64 * h;
            integrate_interval(|x| basis.eval_deriv(a.0, a.1, x) * basis.eval_deriv(b.0, b.1, x), lo, lo + h, 2)
        }).sum()
    }

    fn laplace_reference(storage: &SparseGridData, basis: BasisType, widths: &[f64]) -> Vec<Vec<f64>>
    {
        let n = storage.len();
        let mut total = vec![vec![0.0; n]; n];
        for op_dim in 0..storage.num_inputs()
        {
            let term = reference_matrix(storage, |d, a, b|
            {
                if d == op_dim { stiffness(basis, a, b) / widths[d] } else { widths[d] * hat_product(basis, a, b) }
            });
            for i in 0..n
            {
                for j in 0..n
                {
                    total[i][j] += term[i][j];
                }
            }
        }
        total
    }

    #[test]
    fn laplace_matches_quadrature()
    {
        let mut storage = SparseGridData::new(2);
        generators::regular(&mut storage, 3).unwrap();
        *storage.bounding_box_mut() = BoundingBox::new(&[0.0, 1.0], &[0.5, 3.0]);
        let matrix = laplace_reference(&storage, BasisType::Linear, &[0.5, 2.0]);
        let op = OperationLaplace::new(&storage);
        check_against(&storage, &matrix, |a, r| op.mult(a, r).unwrap());
    }

    #[test]
    fn boundary_laplace_matches_quadrature()
    {
        let mut storage = SparseGridData::new(2);
        generators::regular_with_boundaries(&mut storage, 2, 1).unwrap();
        let matrix = laplace_reference(&storage, BasisType::LinearBoundary, &[1.0, 1.0]);
        let op = OperationLaplace::new(&storage);
        check_against(&storage, &matrix, |a, r| op.mult(a, r).unwrap());
    }

    #[test]
    fn constants_are_in_the_kernel()
    {
        // the level zero functions sum to one, and a constant has no gradient
        let mut storage = SparseGridData::new(1);
        generators::full_with_boundaries(&mut storage, 3).unwrap();
        let alpha: Vec<f64> = (0..storage.len()).map(|seq| if storage.level(seq, 0) == 0 { 1.0 } else { 0.0 }).collect();
        let mut result = vec![1.0; storage.len()];
        OperationLaplace::new(&storage).mult(&alpha, &mut result).unwrap();
        assert!(result.iter().all(|r| r.abs() < 1e-14));
    }
}
