use num_traits::Float;
use rayon::{iter::{IndexedParallelIterator, ParallelIterator}, slice::{ParallelSlice, ParallelSliceMut}};

use crate::{basis::base::{Basis, BasisType}, errors::SGError, iterators::grid_iterator::{GridIterator, GridIteratorT}, storage::SparseGridData};

fn check_input(storage: &SparseGridData, alpha_len: usize, x: &[f64]) -> Result<(), SGError>
{
    if alpha_len != storage.len()
    {
        return Err(SGError::NumberOfPointsAndValuesMismatch);
    }
    if x.len() != storage.num_inputs()
    {
        return Err(SGError::DimensionMismatch);
    }
    if !storage.bounding_box().contains(x)
    {
        return Err(SGError::OutOfDomain);
    }
    Ok(())
}

///
/// Value of the product basis function `seq` at the unit coordinate `x`, stopping at the
/// first vanishing factor.
///
#[inline]
pub fn basis_product(basis: &BasisType, storage: &SparseGridData, seq: usize, x: &[f64]) -> f64
{
    let mut value = 1.0;
    for (d, &xd) in x.iter().enumerate()
    {
        let phi = basis.eval(storage.level(seq, d) as u32, storage.index(seq, d), xd);
        if phi == 0.0
        {
            return 0.0;
        }
        value *= phi;
    }
    value
}

///
/// Sums `alpha[seq] * phi_seq(x)` over every stored point. Does not rely on the hierarchy,
/// so it is valid on grids with missing ancestors.
///
pub fn evaluate_unit<T: Float + std::ops::AddAssign>(basis: BasisType, storage: &SparseGridData, alpha: &[T], x: &[f64]) -> T
{
    let mut result = T::zero();
    for (seq, &a) in alpha.iter().enumerate()
    {
        let phi = basis_product(&basis, storage, seq, x);
        if phi != 0.0
        {
            result += a * T::from(phi).unwrap_or_else(T::zero);
        }
    }
    result
}

///
/// Evaluates the function with coefficients `alpha` at the real coordinate `x`.
///
pub fn evaluate(basis: BasisType, storage: &SparseGridData, alpha: &[f64], x: &[f64]) -> Result<f64, SGError>
{
    check_input(storage, alpha.len(), x)?;
    let unit = storage.bounding_box().to_unit_coordinate(x);
    Ok(evaluate_unit(basis, storage, alpha, &unit))
}

///
/// Evaluates many points at once; `points` holds one point per `num_inputs` chunk.
///
pub fn evaluate_batch(basis: BasisType, storage: &SparseGridData, alpha: &[f64], points: &[f64]) -> Result<Vec<f64>, SGError>
{
    let ndim = storage.num_inputs();
    if ndim == 0 || points.len() % ndim != 0
    {
        return Err(SGError::DimensionMismatch);
    }
    let mut results = vec![0.0; points.len() / ndim];
    points.par_chunks_exact(ndim).zip(results.par_chunks_exact_mut(1)).try_for_each(|(x, y)|
    {
        y[0] = evaluate(basis, storage, alpha, x)?;
        Ok(())
    })?;
    Ok(results)
}

///
/// Evaluation by descending the hierarchy: in every direction only the chain of
/// functions whose support contains the point is visited. Requires a grid without
/// boundary points whose points all have their ancestors stored.
///
pub struct BasisEvaluation<'a>
{
    pub storage: &'a SparseGridData,
    pub basis: BasisType,
}

impl<'a> BasisEvaluation<'a>
{
    pub fn new(storage: &'a SparseGridData, basis: BasisType) -> Self
    {
        Self { storage, basis }
    }

    fn recursive_eval(&self, x: &[f64], current_dim: usize, value: f64, iterator: &mut GridIterator, alpha: &[f64], result: &mut f64)
    {
        let ndim = self.storage.num_inputs();
        loop
        {
            let level = iterator.point_level(current_dim) as u32;
            let index = iterator.point_index(current_dim);
            let phi = self.basis.eval(level, index, x[current_dim]);
            if phi != 0.0
            {
                let val = phi * value;
                if current_dim == ndim - 1
                {
                    if let Some(seq) = iterator.seq()
                    {
                        *result += alpha[seq] * val;
                    }
                }
                else
                {
                    self.recursive_eval(x, current_dim + 1, val, iterator, alpha, result);
                }
            }
            if iterator.is_leaf()
            {
                break;
            }
            let go_right = x[current_dim] * (1_u64 << level) as f64 > index as f64;
            let found = if go_right { iterator.right_child(current_dim) } else { iterator.left_child(current_dim) };
            if !found
            {
                break;
            }
        }
        iterator.reset_to_level_one_in_dim(current_dim);
    }

    pub fn eval(&self, alpha: &[f64], x: &[f64]) -> Result<f64, SGError>
    {
        check_input(self.storage, alpha.len(), x)?;
        if self.storage.has_boundary() || matches!(self.basis, BasisType::Bspline { .. })
        {
            return Err(SGError::UnsupportedOperation);
        }
        let unit = self.storage.bounding_box().to_unit_coordinate(x);
        let mut iterator = GridIterator::new(self.storage);
        let mut result = 0.0;
        if iterator.reset_to_level_one()
        {
            self.recursive_eval(&unit, 0, 1.0, &mut iterator, alpha, &mut result);
        }
        Ok(result)
    }
}
