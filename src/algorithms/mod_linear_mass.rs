use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::{basis::{base::Basis, modified_linear::ModifiedLinearBasis}, errors::SGError, storage::SparseGridData};

///
/// `∫_0^1 φ_a φ_b dx` for two modified linear functions, in closed form.
///
pub fn modified_linear_product(la: u32, ia: u32, lb: u32, ib: u32) -> f64
{
    if la == lb
    {
        if la == 1
        {
            return 1.0;
        }
        if ia != ib
        {
            return 0.0;
        }
        let h = (1_u64 << la) as f64;
        return if ia == 1 || ia as f64 == h - 1.0 { 8.0 / (3.0 * h) } else { 2.0 / (3.0 * h) };
    }
    // the level one function is constant
    if la == 1
    {
        return ModifiedLinearBasis.integral(lb, ib);
    }
    if lb == 1
    {
        return ModifiedLinearBasis.integral(la, ia);
    }
    // (lf, f) is the finer function, (lc, c) the coarser one
    let (lf, f, lc, c) = if la > lb { (la, ia, lb, ib) } else { (lb, ib, la, ia) };
    let hf = (1_u64 << lf) as f64;
    let hc = (1_u64 << lc) as f64;
    let (f, c) = (f as f64, c as f64);
    if (f - 1.0) / hf >= (c + 1.0) / hc || (f + 1.0) / hf <= (c - 1.0) / hc
    {
        return 0.0;
    }
    if (f == 1.0 && c == 1.0) || (f == hf - 1.0 && c == hc - 1.0)
    {
        return 4.0 * (1.0 / hf - hc / (3.0 * hf * hf));
    }
    if c == 1.0
    {
        return (2.0 * hf - f * hc) / (hf * hf);
    }
    if c == hc - 1.0
    {
        return (2.0 * hf - (hf - f) * hc) / (hf * hf);
    }
    let diff = f / hf - c / hc;
    let t = ((diff - 1.0 / hf).abs() + (diff + 1.0 / hf).abs() - diff.abs()) * hc;
    (1.0 - t) / hf
}

///
/// Mass matrix of a modified linear grid applied by summing the explicit pairwise
/// products. Quadratic in the number of points; the rows are computed in parallel.
///
pub struct OperationModLinearMass<'a>
{
    storage: &'a SparseGridData,
}

impl<'a> OperationModLinearMass<'a>
{
    pub fn new(storage: &'a SparseGridData) -> Self
    {
        Self { storage }
    }

    ///
    /// Matrix entry `M_ij` including the bounding box scaling.
    ///
    pub fn entry(&self, i: usize, j: usize) -> f64
    {
        let mut value = 1.0;
        for d in 0..self.storage.num_inputs()
        {
            let factor = modified_linear_product(self.storage.level(i, d) as u32, self.storage.index(i, d),
                self.storage.level(j, d) as u32, self.storage.index(j, d));
            if factor == 0.0
            {
                return 0.0;
            }
            value *= factor * self.storage.bounding_box().width(d);
        }
        value
    }

    pub fn mult(&self, alpha: &[f64], result: &mut [f64]) -> Result<(), SGError>
    {
        let n = self.storage.len();
        if alpha.len() != n || result.len() != n
        {
            return Err(SGError::NumberOfPointsAndValuesMismatch);
        }
        // upper triangle row by row, mirrored into the lower triangle
        let sum = (0..n).into_par_iter().fold(|| vec![0.0; n], |mut acc, i|
        {
            for j in i..n
            {
                let m = self.entry(i, j);
                if m != 0.0
                {
                    acc[i] += m * alpha[j];
                    if i != j
                    {
                        acc[j] += m * alpha[i];
                    }
                }
            }
            acc
        }).reduce(|| vec![0.0; n], |mut a, b|
        {
            a.iter_mut().zip(b).for_each(|(x, y)| *x += y);
            a
        });
        result.copy_from_slice(&sum);
        Ok(())
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::{algorithms::l2_dot_product::tests::{check_against, hat_product, reference_matrix}, basis::base::BasisType, generators, storage::BoundingBox};

    #[test]
    fn closed_form_matches_quadrature_1d()
    {
        let mut storage = SparseGridData::new(1);
        generators::regular(&mut storage, 5).unwrap();
        for i in 0..storage.len()
        {
            for j in 0..storage.len()
            {
                let a = (storage.level(i, 0) as u32, storage.index(i, 0));
                let b = (storage.level(j, 0) as u32, storage.index(j, 0));
                let exact = hat_product(BasisType::ModifiedLinear, a, b);
                let closed = modified_linear_product(a.0, a.1, b.0, b.1);
                assert!((exact - closed).abs() < 1e-13, "{a:?} {b:?}: {exact} != {closed}");
            }
        }
    }

    #[test]
    fn mass_matrix_matches_quadrature_2d()
    {
        let mut storage = SparseGridData::new(2);
        generators::regular(&mut storage, 4).unwrap();
        *storage.bounding_box_mut() = BoundingBox::new(&[-1.0, 0.0], &[1.0, 0.25]);
        let widths = [2.0, 0.25];
        let matrix = reference_matrix(&storage, |d, a, b| widths[d] * hat_product(BasisType::ModifiedLinear, a, b));
        let op = OperationModLinearMass::new(&storage);
        check_against(&storage, &matrix, |a, r| op.mult(a, r).unwrap());
    }
}
