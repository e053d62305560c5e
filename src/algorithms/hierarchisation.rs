use crate::{algorithms::sweep::{self, SweepFunction}, basis::base::{Basis, BasisType}, errors::SGError, iterators::grid_iterator::{GridIterator, GridIteratorT}, storage::SparseGridData};

pub trait HierarchisationOperation
{
    ///
    /// Converts nodal values into hierarchical surpluses in place.
    ///
    fn hierarchize(&self, node_values: &mut [f64], storage: &SparseGridData) -> Result<(), SGError>;
    ///
    /// Converts hierarchical surpluses into nodal values in place.
    ///
    fn dehierarchize(&self, alpha: &mut [f64], storage: &SparseGridData) -> Result<(), SGError>;
}

///
/// Boundary values of a fiber; on grids without boundary points both are zero.
///
fn fiber_boundary(source: &[f64], result: &mut [f64], iterator: &mut GridIterator, dim: usize) -> (f64, f64)
{
    let mut left = 0.0;
    let mut right = 0.0;
    if iterator.point_level(dim) == 0
    {
        if let Some(seq) = iterator.seq()
        {
            left = source[seq];
            result[seq] = left;
        }
        iterator.reset_to_right_level_zero(dim);
        if let Some(seq) = iterator.seq()
        {
            right = source[seq];
            result[seq] = right;
        }
    }
    (left, right)
}

///
/// Runs `recurse` on the level one point of the fiber, coming from the fiber root.
///
pub(crate) fn on_fiber<R: FnMut(&mut GridIterator)>(iterator: &mut GridIterator, dim: usize, mut recurse: R)
{
    if iterator.point_level(dim) == 0
    {
        if !iterator.is_leaf()
        {
            iterator.reset_to_level_one_in_dim(dim);
            if iterator.seq().is_some()
            {
                recurse(iterator);
            }
        }
        iterator.reset_to_left_level_zero(dim);
    }
    else
    {
        recurse(iterator);
    }
}

pub struct LinearHierarchisation;

impl LinearHierarchisation
{
    fn recurse(source: &[f64], result: &mut [f64], iterator: &mut GridIterator, dim: usize, left_value: f64, right_value: f64)
    {
        if let Some(seq) = iterator.seq()
        {
            let mid_value = source[seq];
            if !iterator.is_leaf()
            {
                iterator.left_child(dim);
                if iterator.seq().is_some()
                {
                    Self::recurse(source, result, iterator, dim, left_value, mid_value);
                }
                iterator.step_right(dim);
                if iterator.seq().is_some()
                {
                    Self::recurse(source, result, iterator, dim, mid_value, right_value);
                }
                iterator.up(dim);
            }
            result[seq] = mid_value - 0.5 * (left_value + right_value);
        }
    }
}

impl SweepFunction for LinearHierarchisation
{
    fn execute(&mut self, source: &[f64], result: &mut [f64], iterator: &mut GridIterator, dim: usize) -> Result<(), SGError> {
        let (left, right) = fiber_boundary(source, result, iterator, dim);
        on_fiber(iterator, dim, |it| Self::recurse(source, result, it, dim, left, right));
        Ok(())
    }
}

pub struct LinearDehierarchisation;

impl LinearDehierarchisation
{
    fn recurse(source: &[f64], result: &mut [f64], iterator: &mut GridIterator, dim: usize, left_value: f64, right_value: f64)
    {
        if let Some(seq) = iterator.seq()
        {
            let mid_value = source[seq] + 0.5 * (left_value + right_value);
            result[seq] = mid_value;
            if !iterator.is_leaf()
            {
                iterator.left_child(dim);
                if iterator.seq().is_some()
                {
                    Self::recurse(source, result, iterator, dim, left_value, mid_value);
                }
                iterator.step_right(dim);
                if iterator.seq().is_some()
                {
                    Self::recurse(source, result, iterator, dim, mid_value, right_value);
                }
                iterator.up(dim);
            }
        }
    }
}

impl SweepFunction for LinearDehierarchisation
{
    fn execute(&mut self, source: &[f64], result: &mut [f64], iterator: &mut GridIterator, dim: usize) -> Result<(), SGError> {
        let (left, right) = fiber_boundary(source, result, iterator, dim);
        on_fiber(iterator, dim, |it| Self::recurse(source, result, it, dim, left, right));
        Ok(())
    }
}

///
/// Hierarchisation for bases whose functions are not plain hats (modified linear,
/// polynomial). Walks each fiber top-down keeping the chain of ancestors and their
/// surpluses; the surplus of a point is its value minus the ancestors' interpolant.
///
pub struct AncestorChainHierarchisation
{
    pub basis: BasisType,
    pub inverse: bool,
    ancestors: Vec<(u32, u32, f64)>,
}

impl AncestorChainHierarchisation
{
    pub fn new(basis: BasisType, inverse: bool) -> Self
    {
        Self { basis, inverse, ancestors: Vec::new() }
    }

    fn recurse(&mut self, source: &[f64], result: &mut [f64], iterator: &mut GridIterator, dim: usize)
    {
        if let Some(seq) = iterator.seq()
        {
            let level = iterator.point_level(dim) as u32;
            let index = iterator.point_index(dim);
            let x = index as f64 / (1_u64 << level) as f64;
            let interpolant: f64 = self.ancestors.iter().map(|&(l, i, c)| c * self.basis.eval(l, i, x)).sum();
            let surplus = if self.inverse
            {
                result[seq] = source[seq] + interpolant;
                source[seq]
            }
            else
            {
                result[seq] = source[seq] - interpolant;
                result[seq]
            };
            if !iterator.is_leaf()
            {
                self.ancestors.push((level, index, surplus));
                iterator.left_child(dim);
                if iterator.seq().is_some()
                {
                    self.recurse(source, result, iterator, dim);
                }
                iterator.step_right(dim);
                if iterator.seq().is_some()
                {
                    self.recurse(source, result, iterator, dim);
                }
                iterator.up(dim);
                self.ancestors.pop();
            }
        }
    }
}

impl SweepFunction for AncestorChainHierarchisation
{
    fn execute(&mut self, source: &[f64], result: &mut [f64], iterator: &mut GridIterator, dim: usize) -> Result<(), SGError> {
        self.ancestors.clear();
        self.recurse(source, result, iterator, dim);
        Ok(())
    }
}

fn sweep_all_dimensions<F: SweepFunction>(function: &mut F, values: &mut [f64], storage: &SparseGridData) -> Result<(), SGError>
{
    if values.len() != storage.len()
    {
        return Err(SGError::NumberOfPointsAndValuesMismatch);
    }
    let mut source = values.to_vec();
    for d in 0..storage.num_inputs()
    {
        sweep::sweep(function, storage, &source, values, d)?;
        source.copy_from_slice(values);
    }
    Ok(())
}

#[derive(Clone, Copy)]
pub struct LinearHierarchisationOperation;

impl HierarchisationOperation for LinearHierarchisationOperation
{
    fn hierarchize(&self, node_values: &mut [f64], storage: &SparseGridData) -> Result<(), SGError> {
        sweep_all_dimensions(&mut LinearHierarchisation, node_values, storage)
    }

    fn dehierarchize(&self, alpha: &mut [f64], storage: &SparseGridData) -> Result<(), SGError> {
        sweep_all_dimensions(&mut LinearDehierarchisation, alpha, storage)
    }
}

#[derive(Clone, Copy)]
pub struct AncestorChainHierarchisationOperation(pub BasisType);

impl HierarchisationOperation for AncestorChainHierarchisationOperation
{
    fn hierarchize(&self, node_values: &mut [f64], storage: &SparseGridData) -> Result<(), SGError> {
        sweep_all_dimensions(&mut AncestorChainHierarchisation::new(self.0, false), node_values, storage)
    }

    fn dehierarchize(&self, alpha: &mut [f64], storage: &SparseGridData) -> Result<(), SGError> {
        sweep_all_dimensions(&mut AncestorChainHierarchisation::new(self.0, true), alpha, storage)
    }
}

///
/// Hierarchisation matching the basis of a grid. B-splines are not interpolating, so
/// they have no sweep-based transform.
///
pub fn hierarchize(basis: BasisType, node_values: &mut [f64], storage: &SparseGridData) -> Result<(), SGError>
{
    match basis
    {
        BasisType::Linear | BasisType::LinearBoundary => LinearHierarchisationOperation.hierarchize(node_values, storage),
        BasisType::ModifiedLinear | BasisType::Poly { .. } => AncestorChainHierarchisationOperation(basis).hierarchize(node_values, storage),
        BasisType::Bspline { .. } => Err(SGError::UnsupportedOperation),
    }
}

pub fn dehierarchize(basis: BasisType, alpha: &mut [f64], storage: &SparseGridData) -> Result<(), SGError>
{
    match basis
    {
        BasisType::Linear | BasisType::LinearBoundary => LinearHierarchisationOperation.dehierarchize(alpha, storage),
        BasisType::ModifiedLinear | BasisType::Poly { .. } => AncestorChainHierarchisationOperation(basis).dehierarchize(alpha, storage),
        BasisType::Bspline { .. } => Err(SGError::UnsupportedOperation),
    }
}
