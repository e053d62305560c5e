use rustc_hash::FxHashMap;

use crate::{basis::{base::{Basis, BasisType}, gauss_legendre::{gauss_legendre, integrate_with_rule}}, errors::SGError, storage::SparseGridData};

fn check_alpha(storage: &SparseGridData, alpha: &[f64]) -> Result<(), SGError>
{
    if alpha.len() != storage.len()
    {
        return Err(SGError::NumberOfPointsAndValuesMismatch);
    }
    Ok(())
}

///
/// Integral of the 1D function over `[lo, hi]` with `order` Gauss-Legendre nodes on every
/// cell of width `2^-l` (the functions are smooth between cell boundaries).
///
fn integrate_cells<F: Fn(f64) -> f64>(f: F, level: u32, lo: f64, hi: f64, nodes: &[f64], weights: &[f64]) -> f64
{
    let h = 1.0 / (1_u64 << level.max(1)) as f64;
    let mut sum = 0.0;
    let mut a = lo;
    while a < hi
    {
        let b = (a + h).min(hi);
        sum += integrate_with_rule(&f, a, b, nodes, weights);
        a = b;
    }
    sum
}

///
/// Integral of the sparse grid function over its bounding box.
///
pub fn integrate(basis: BasisType, storage: &SparseGridData, alpha: &[f64]) -> Result<f64, SGError>
{
    check_alpha(storage, alpha)?;
    let mut integral = 0.0;
    for (seq, &a) in alpha.iter().enumerate()
    {
        let mut weight = 1.0;
        for d in 0..storage.num_inputs()
        {
            weight *= basis.integral(storage.level(seq, d) as u32, storage.index(seq, d));
        }
        integral += a * weight;
    }
    Ok(integral * storage.bounding_box().volume())
}

///
/// `∫ (x_1 ... x_d) f(x) dx` over the bounding box.
///
pub fn first_moment(basis: BasisType, storage: &SparseGridData, alpha: &[f64]) -> Result<f64, SGError>
{
    check_alpha(storage, alpha)?;
    let (nodes, weights) = gauss_legendre(basis.degree() / 2 + 2);
    let bbox = storage.bounding_box();
    let mut cache: FxHashMap<(u32, u32), (f64, f64)> = FxHashMap::default();
    let mut result = 0.0;
    for (seq, &a) in alpha.iter().enumerate()
    {
        let mut product = 1.0;
        for d in 0..storage.num_inputs()
        {
            let (level, index) = (storage.level(seq, d) as u32, storage.index(seq, d));
            let (i0, i1) = *cache.entry((level, index)).or_insert_with(||
            {
                let (lo, hi) = basis.support(level, index);
                let i1 = integrate_cells(|x| x * basis.eval(level, index, x), level, lo, hi, &nodes, &weights);
                (basis.integral(level, index), i1)
            });
            let (q, t) = (bbox.width(d), bbox.offset(d));
            product *= q * (t * i0 + q * i1);
        }
        result += a * product;
    }
    Ok(result)
}

///
/// Integral of the sparse grid function against the product density
/// `density(0, x_0) * ... * density(d - 1, x_{d-1})`, computed with `order` Gauss-Legendre
/// nodes per grid cell.
///
pub fn weighted_quadrature<F: Fn(usize, f64) -> f64>(basis: BasisType, storage: &SparseGridData, alpha: &[f64], density: F, order: usize) -> Result<f64, SGError>
{
    check_alpha(storage, alpha)?;
    let (nodes, weights) = gauss_legendre(order.max(1));
    let bbox = storage.bounding_box();
    let mut cache: FxHashMap<(usize, u32, u32), f64> = FxHashMap::default();
    let mut result = 0.0;
    for (seq, &a) in alpha.iter().enumerate()
    {
        let mut product = 1.0;
        for d in 0..storage.num_inputs()
        {
            let (level, index) = (storage.level(seq, d) as u32, storage.index(seq, d));
            let (q, t) = (bbox.width(d), bbox.offset(d));
            product *= *cache.entry((d, level, index)).or_insert_with(||
            {
                let (lo, hi) = basis.support(level, index);
                q * integrate_cells(|y| basis.eval(level, index, y) * density(d, t + q * y), level, lo, hi, &nodes, &weights)
            });
            if product == 0.0
            {
                break;
            }
        }
        result += a * product;
    }
    Ok(result)
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::{algorithms::hierarchisation::hierarchize, generators, storage::BoundingBox};

    fn interpolant(basis: BasisType, storage: &SparseGridData, f: impl Fn(&[f64]) -> f64) -> Vec<f64>
    {
        let mut alpha: Vec<f64> = storage.points().map(|x| f(&x)).collect();
        hierarchize(basis, &mut alpha, storage).unwrap();
        alpha
    }

    #[test]
    fn integral_of_bilinear_function()
    {
        // x*y on [0,1]^2 with boundaries is reproduced exactly by the bilinear level zero part
        let mut storage = SparseGridData::new(2);
        generators::regular_with_boundaries(&mut storage, 2, 1).unwrap();
        let alpha = interpolant(BasisType::LinearBoundary, &storage, |x| x[0] * x[1]);
        let r = integrate(BasisType::LinearBoundary, &storage, &alpha).unwrap();
        assert!((r - 0.25).abs() < 1e-14);
    }

    #[test]
    fn integral_respects_bounding_box()
    {
        let mut storage = SparseGridData::new(1);
        generators::regular_with_boundaries(&mut storage, 1, 1).unwrap();
        *storage.bounding_box_mut() = BoundingBox::new(&[1.0], &[3.0]);
        let alpha = interpolant(BasisType::LinearBoundary, &storage, |x| x[0]);
        // ∫_1^3 x dx = 4
        assert!((integrate(BasisType::LinearBoundary, &storage, &alpha).unwrap() - 4.0).abs() < 1e-14);
        // ∫_1^3 x * x dx = 26/3, exact because the interpolant of x is exact
        assert!((first_moment(BasisType::LinearBoundary, &storage, &alpha).unwrap() - 26.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn first_moment_of_single_hat()
    {
        let mut storage = SparseGridData::new(1);
        generators::regular(&mut storage, 3).unwrap();
        let mut alpha = vec![0.0; storage.len()];
        let seq = storage.index_of(&crate::storage::GridPoint::new(&[3], &[5], false)).unwrap();
        alpha[seq] = 1.0;
        // i * 4^-l
        assert!((first_moment(BasisType::Linear, &storage, &alpha).unwrap() - 5.0 / 64.0).abs() < 1e-14);
    }

    #[test]
    fn uniform_density_matches_integral()
    {
        let mut storage = SparseGridData::new(2);
        generators::regular(&mut storage, 4).unwrap();
        let alpha = interpolant(BasisType::Linear, &storage, |x| (x[0] * (1.0 - x[0])) * x[1].sin());
        let plain = integrate(BasisType::Linear, &storage, &alpha).unwrap();
        let weighted = weighted_quadrature(BasisType::Linear, &storage, &alpha, |_, _| 1.0, 2).unwrap();
        assert!((plain - weighted).abs() < 1e-13);
        // density 2x in the first direction
        let weighted = weighted_quadrature(BasisType::Linear, &storage, &alpha, |d, x| if d == 0 { 2.0 * x } else { 1.0 }, 3).unwrap();
        assert!(weighted > 0.0);
    }
}
