use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::{errors::SGError, storage::SparseGridData};

///
/// Matrix-free application of a separable operator. `up` carries contributions from finer
/// to coarser points of a fiber, `down` from coarser to finer points including the diagonal.
///
pub trait UpDown : Sync
{
    fn storage(&self) -> &SparseGridData;
    fn up(&self, source: &[f64], result: &mut [f64], dim: usize) -> Result<(), SGError>;
    fn down(&self, source: &[f64], result: &mut [f64], dim: usize) -> Result<(), SGError>;
}

///
/// Operators that apply a different 1D operator in one direction (e.g. the stiffness
/// part of the Laplacian) and the mass operator everywhere else.
///
pub trait UpDownOneOpDim : UpDown
{
    fn up_op_dim(&self, source: &[f64], result: &mut [f64], dim: usize) -> Result<(), SGError>;
    fn down_op_dim(&self, source: &[f64], result: &mut [f64], dim: usize) -> Result<(), SGError>;
}

fn add_into(result: &mut [f64], a: &[f64], b: &[f64])
{
    for ((r, &x), &y) in result.iter_mut().zip(a).zip(b)
    {
        *r = x + y;
    }
}

///
/// One level of the unidirectional scheme in direction `dim`:
/// `result = lower(up(alpha)) + down(lower(alpha))`, or `up(alpha) + down(alpha)` when
/// there is no lower direction left. The two branches are independent and run in parallel.
///
fn unidirectional<U, D, L>(alpha: &[f64], result: &mut [f64], up: U, down: D, lower: Option<L>) -> Result<(), SGError>
where
    U: Fn(&[f64], &mut [f64]) -> Result<(), SGError> + Sync,
    D: Fn(&[f64], &mut [f64]) -> Result<(), SGError> + Sync,
    L: Fn(&[f64], &mut [f64]) -> Result<(), SGError> + Sync,
{
    let n = alpha.len();
    match lower
    {
        None =>
        {
            let mut up_part = vec![0.0; n];
            let mut down_part = vec![0.0; n];
            up(alpha, &mut up_part)?;
            down(alpha, &mut down_part)?;
            add_into(result, &up_part, &down_part);
        }
        Some(lower) =>
        {
            let (first, second) = rayon::join(
                || -> Result<Vec<f64>, SGError>
                {
                    let mut temp = vec![0.0; n];
                    up(alpha, &mut temp)?;
                    let mut r = vec![0.0; n];
                    lower(&temp, &mut r)?;
                    Ok(r)
                },
                || -> Result<Vec<f64>, SGError>
                {
                    let mut temp = vec![0.0; n];
                    lower(alpha, &mut temp)?;
                    let mut r = vec![0.0; n];
                    down(&temp, &mut r)?;
                    Ok(r)
                });
            add_into(result, &first?, &second?);
        }
    }
    Ok(())
}

///
/// Applies the operator in directions `0..=dim`.
///
pub fn updown<O: UpDown + ?Sized>(op: &O, alpha: &[f64], result: &mut [f64], dim: usize) -> Result<(), SGError>
{
    let lower = (dim > 0).then_some(|s: &[f64], r: &mut [f64]| updown(op, s, r, dim - 1));
    unidirectional(alpha, result, |s, r| op.up(s, r, dim), |s, r| op.down(s, r, dim), lower)
}

///
/// Applies the operator in directions `0..=dim`, using the special 1D operator in `op_dim`.
///
pub fn updown_one_op_dim<O: UpDownOneOpDim + ?Sized>(op: &O, alpha: &[f64], result: &mut [f64], dim: usize, op_dim: usize) -> Result<(), SGError>
{
    let lower = (dim > 0).then_some(|s: &[f64], r: &mut [f64]| updown_one_op_dim(op, s, r, dim - 1, op_dim));
    if dim == op_dim
    {
        unidirectional(alpha, result, |s, r| op.up_op_dim(s, r, dim), |s, r| op.down_op_dim(s, r, dim), lower)
    }
    else
    {
        unidirectional(alpha, result, |s, r| op.up(s, r, dim), |s, r| op.down(s, r, dim), lower)
    }
}

fn check_sizes(storage: &SparseGridData, alpha: &[f64], result: &[f64]) -> Result<(), SGError>
{
    if alpha.len() != storage.len() || result.len() != storage.len()
    {
        return Err(SGError::NumberOfPointsAndValuesMismatch);
    }
    Ok(())
}

///
/// `result = Op(alpha)` for an operator acting the same way in every direction.
///
pub fn mult<O: UpDown + ?Sized>(op: &O, alpha: &[f64], result: &mut [f64]) -> Result<(), SGError>
{
    check_sizes(op.storage(), alpha, result)?;
    if alpha.is_empty()
    {
        return Ok(());
    }
    updown(op, alpha, result, op.storage().num_inputs() - 1)
}

///
/// `result = sum_i Op_i(alpha)` where `Op_i` uses the special 1D operator in direction `i`.
/// The terms are computed in parallel.
///
pub fn mult_one_op_dim<O: UpDownOneOpDim + ?Sized>(op: &O, alpha: &[f64], result: &mut [f64]) -> Result<(), SGError>
{
    check_sizes(op.storage(), alpha, result)?;
    if alpha.is_empty()
    {
        return Ok(());
    }
    let ndim = op.storage().num_inputs();
    let n = alpha.len();
    let sum = (0..ndim).into_par_iter().map(|op_dim|
    {
        let mut beta = vec![0.0; n];
        updown_one_op_dim(op, alpha, &mut beta, ndim - 1, op_dim)?;
        Ok(beta)
    }).try_reduce(|| vec![0.0; n], |mut a, b|
    {
        a.iter_mut().zip(b).for_each(|(x, y)| *x += y);
        Ok(a)
    })?;
    result.copy_from_slice(&sum);
    Ok(())
}
