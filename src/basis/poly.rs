use super::{base::Basis, gauss_legendre::integrate_interval};

///
/// Hierarchical Lagrange polynomials. The function `(l, i)` is the polynomial of degree
/// `min(p, l + 1)` that equals one at its grid point and vanishes at the support ends and
/// at the nearest ancestor grid points (then the domain ends), restricted to its support.
///
#[derive(Copy, Clone, Debug)]
pub struct PolyBasis
{
    degree: usize,
}

impl PolyBasis
{
    pub fn new(degree: usize) -> Self
    {
        Self { degree: degree.max(2) }
    }

    ///
    /// Roots in the scaled coordinate `z = 2^l x`.
    ///
    fn roots(&self, level: u32, index: u32) -> Vec<f64>
    {
        let count = self.degree.min(level as usize + 1);
        let mut roots = Vec::with_capacity(count + 2);
        roots.push(index as f64 - 1.0);
        roots.push(index as f64 + 1.0);
        for k in (1..level).rev()
        {
            let shift = level - k;
            let ancestor = ((index >> shift) | 1) as u64;
            roots.push((ancestor << shift) as f64);
        }
        roots.push(0.0);
        roots.push((1_u64 << level) as f64);
        let mut unique: Vec<f64> = Vec::with_capacity(count);
        for r in roots
        {
            if unique.len() == count
            {
                break;
            }
            if !unique.contains(&r)
            {
                unique.push(r);
            }
        }
        unique
    }
}

impl Basis for PolyBasis
{
    fn eval(&self, level: u32, index: u32, x: f64) -> f64 {
        let scale = (1_u64 << level) as f64;
        let z = scale * x;
        if z <= index as f64 - 1.0 || z >= index as f64 + 1.0
        {
            return 0.0;
        }
        let center = index as f64;
        self.roots(level, index).iter().map(|&r| (z - r) / (center - r)).product()
    }

    fn eval_deriv(&self, level: u32, index: u32, x: f64) -> f64 {
        let scale = (1_u64 << level) as f64;
        let z = scale * x;
        if z <= index as f64 - 1.0 || z >= index as f64 + 1.0
        {
            return 0.0;
        }
        let center = index as f64;
        let roots = self.roots(level, index);
        let mut sum = 0.0;
        for k in 0..roots.len()
        {
            let mut term = 1.0 / (center - roots[k]);
            for (j, &r) in roots.iter().enumerate()
            {
                if j != k
                {
                    term *= (z - r) / (center - r);
                }
            }
            sum += term;
        }
        sum * scale
    }

    fn degree(&self) -> usize {
        self.degree
    }

    fn integral(&self, level: u32, index: u32) -> f64 {
        let (a, b) = self.support(level, index);
        integrate_interval(|x| self.eval(level, index, x), a, b, self.degree / 2 + 1)
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn check(basis: &PolyBasis, level: u32, index: u32, x: f64, expected: f64)
    {
        let value = basis.eval(level, index, x);
        assert!((value - expected).abs() < 1e-12, "({level}, {index}, {x}) = {value}, expected {expected}");
    }

    #[test]
    fn quadratic_values()
    {
        let basis = PolyBasis::new(2);
        check(&basis, 1, 1, 0.25, 0.75);
        check(&basis, 2, 1, 0.125, 0.75);
        check(&basis, 2, 1, 0.25, 1.0);
        check(&basis, 2, 1, 0.5, 0.0);
    }

    #[test]
    fn cubic_values()
    {
        let basis = PolyBasis::new(3);
        check(&basis, 2, 1, 0.125, 0.875);
        check(&basis, 2, 1, 0.375, 0.625);
        check(&basis, 3, 1, 0.0625, 0.875);
        check(&basis, 3, 1, 0.1875, 0.625);
        check(&basis, 3, 3, 0.3125, 0.625);
        check(&basis, 3, 3, 0.4375, 0.875);
    }

    #[test]
    fn integral_of_quadratic()
    {
        // parabola through (0,0), (1/2,1), (1,0)
        let basis = PolyBasis::new(2);
        assert!((basis.integral(1, 1) - 2.0 / 3.0).abs() < 1e-12);
        let h = 1e-6;
        let numeric = (basis.eval(2, 3, 0.7 + h) - basis.eval(2, 3, 0.7 - h)) / (2.0 * h);
        assert!((basis.eval_deriv(2, 3, 0.7) - numeric).abs() < 1e-6);
    }
}
