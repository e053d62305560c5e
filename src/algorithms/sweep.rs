use crate::{errors::SGError, iterators::grid_iterator::{GridIterator, GridIteratorT}, storage::SparseGridData};

///
/// A 1D operation applied to one fiber of the grid. On entry the iterator sits on the
/// fiber root (level one in `dim` without boundaries, left level zero with boundaries)
/// and must be left there on exit.
///
pub trait SweepFunction
{
    fn execute(&mut self, source: &[f64], result: &mut [f64], iterator: &mut GridIterator, dim: usize) -> Result<(), SGError>;
}

fn sweep_recursive<F: SweepFunction>(function: &mut F, source: &[f64], result: &mut [f64], iterator: &mut GridIterator,
    dim_list: &[usize], dim_rem: usize, dim_sweep: usize) -> Result<(), SGError>
{
    function.execute(source, result, iterator, dim_sweep)?;
    for d in 0..dim_rem
    {
        let cur_dim = dim_list[d];
        if iterator.is_leaf()
        {
            continue;
        }
        iterator.left_child(cur_dim);
        if iterator.seq().is_some()
        {
            sweep_recursive(function, source, result, iterator, dim_list, d + 1, dim_sweep)?;
        }
        iterator.step_right(cur_dim);
        if iterator.seq().is_some()
        {
            sweep_recursive(function, source, result, iterator, dim_list, d + 1, dim_sweep)?;
        }
        iterator.up(cur_dim);
    }
    Ok(())
}

fn sweep_boundary_recursive<F: SweepFunction>(function: &mut F, source: &[f64], result: &mut [f64], iterator: &mut GridIterator,
    dim_list: &[usize], dim_rem: usize, dim_sweep: usize) -> Result<(), SGError>
{
    if dim_rem == 0
    {
        return function.execute(source, result, iterator, dim_sweep);
    }
    let d = dim_list[dim_rem - 1];
    if iterator.point_level(d) > 0
    {
        sweep_boundary_recursive(function, source, result, iterator, dim_list, dim_rem - 1, dim_sweep)?;
        if !iterator.is_leaf()
        {
            iterator.left_child(d);
            if iterator.seq().is_some()
            {
                sweep_boundary_recursive(function, source, result, iterator, dim_list, dim_rem, dim_sweep)?;
            }
            iterator.step_right(d);
            if iterator.seq().is_some()
            {
                sweep_boundary_recursive(function, source, result, iterator, dim_list, dim_rem, dim_sweep)?;
            }
            iterator.up(d);
        }
    }
    else
    {
        sweep_boundary_recursive(function, source, result, iterator, dim_list, dim_rem - 1, dim_sweep)?;
        iterator.reset_to_right_level_zero(d);
        sweep_boundary_recursive(function, source, result, iterator, dim_list, dim_rem - 1, dim_sweep)?;
        if !iterator.is_leaf()
        {
            iterator.reset_to_level_one_in_dim(d);
            if iterator.seq().is_some()
            {
                sweep_boundary_recursive(function, source, result, iterator, dim_list, dim_rem, dim_sweep)?;
            }
        }
        iterator.reset_to_left_level_zero(d);
    }
    Ok(())
}

fn other_dimensions(ndim: usize, dim_sweep: usize) -> Vec<usize>
{
    (0..ndim).filter(|&d| d != dim_sweep).collect()
}

fn check_lengths(storage: &SparseGridData, source: &[f64], result: &[f64]) -> Result<(), SGError>
{
    if source.len() != storage.len() || result.len() != storage.len()
    {
        return Err(SGError::NumberOfPointsAndValuesMismatch);
    }
    Ok(())
}

///
/// Runs `function` on every fiber of direction `dim_sweep` of a grid without boundary points.
///
pub fn sweep_1d<F: SweepFunction>(function: &mut F, storage: &SparseGridData, source: &[f64], result: &mut [f64], dim_sweep: usize) -> Result<(), SGError>
{
    check_lengths(storage, source, result)?;
    let dim_list = other_dimensions(storage.num_inputs(), dim_sweep);
    let mut iterator = GridIterator::new(storage);
    if !iterator.reset_to_level_one()
    {
        return Ok(());
    }
    sweep_recursive(function, source, result, &mut iterator, &dim_list, dim_list.len(), dim_sweep)
}

///
/// Runs `function` on every fiber of direction `dim_sweep` of a grid with boundary points.
///
pub fn sweep_1d_boundary<F: SweepFunction>(function: &mut F, storage: &SparseGridData, source: &[f64], result: &mut [f64], dim_sweep: usize) -> Result<(), SGError>
{
    check_lengths(storage, source, result)?;
    let dim_list = other_dimensions(storage.num_inputs(), dim_sweep);
    let mut iterator = GridIterator::new(storage);
    if !iterator.reset_to_level_zero()
    {
        return Ok(());
    }
    sweep_boundary_recursive(function, source, result, &mut iterator, &dim_list, dim_list.len(), dim_sweep)
}

///
/// Dispatches to the boundary or interior sweep depending on the grid.
///
pub fn sweep<F: SweepFunction>(function: &mut F, storage: &SparseGridData, source: &[f64], result: &mut [f64], dim_sweep: usize) -> Result<(), SGError>
{
    if storage.has_boundary()
    {
        sweep_1d_boundary(function, storage, source, result, dim_sweep)
    }
    else
    {
        sweep_1d(function, storage, source, result, dim_sweep)
    }
}
