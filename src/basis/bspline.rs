use super::{base::Basis, gauss_legendre::integrate_interval};

///
/// Cardinal B-spline of degree `p` with knots `0, 1, ..., p + 1`, evaluated with the
/// Cox-de Boor recurrence.
///
pub fn cardinal_bspline(t: f64, p: usize) -> f64
{
    if t < 0.0 || t >= (p + 1) as f64
    {
        return 0.0;
    }
    let mut b = vec![0.0; p + 1];
    b[t.floor() as usize] = 1.0;
    for q in 1..=p
    {
        let qf = q as f64;
        for j in 0..=(p - q)
        {
            let s = t - j as f64;
            b[j] = (s * b[j] + (qf + 1.0 - s) * b[j + 1]) / qf;
        }
    }
    b[0]
}

pub fn cardinal_bspline_deriv(t: f64, p: usize) -> f64
{
    if p == 0
    {
        return 0.0;
    }
    cardinal_bspline(t, p - 1) - cardinal_bspline(t - 1.0, p - 1)
}

///
/// Hierarchical B-splines of odd degree centred on the grid points.
///
#[derive(Copy, Clone, Debug)]
pub struct BsplineBasis
{
    degree: usize,
}

impl BsplineBasis
{
    pub fn new(degree: usize) -> Self
    {
        let degree = if degree % 2 == 0 { degree + 1 } else { degree };
        Self { degree }
    }

    #[inline]
    fn shift(&self) -> f64
    {
        (self.degree + 1) as f64 / 2.0
    }
}

impl Basis for BsplineBasis
{
    #[inline]
    fn eval(&self, level: u32, index: u32, x: f64) -> f64 {
        let scale = (1_u64 << level) as f64;
        cardinal_bspline(scale * x - index as f64 + self.shift(), self.degree)
    }

    fn eval_deriv(&self, level: u32, index: u32, x: f64) -> f64 {
        let scale = (1_u64 << level) as f64;
        scale * cardinal_bspline_deriv(scale * x - index as f64 + self.shift(), self.degree)
    }

    fn degree(&self) -> usize {
        self.degree
    }

    fn integral(&self, level: u32, index: u32) -> f64 {
        let h = 1.0 / (1_u64 << level) as f64;
        let first_knot = index as f64 - self.shift();
        let mut sum = 0.0;
        // piecewise polynomial: integrate knot interval by knot interval
        for k in 0..=self.degree
        {
            let a = ((first_knot + k as f64) * h).max(0.0);
            let b = ((first_knot + k as f64 + 1.0) * h).min(1.0);
            if b > a
            {
                sum += integrate_interval(|x| self.eval(level, index, x), a, b, self.degree / 2 + 1);
            }
        }
        sum
    }

    fn support(&self, level: u32, index: u32) -> (f64, f64)
    {
        let h = 1.0 / (1_u64 << level) as f64;
        (((index as f64 - self.shift()) * h).max(0.0), ((index as f64 + self.shift()) * h).min(1.0))
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::basis::linear::LinearBasis;

    #[test]
    fn degree_one_matches_hats()
    {
        let bspline = BsplineBasis::new(1);
        for &x in &[0.1, 0.3, 0.55, 0.8]
        {
            assert!((bspline.eval(2, 3, x) - LinearBasis.eval(2, 3, x)).abs() < 1e-14);
        }
    }

    #[test]
    fn cubic_cardinal_values()
    {
        assert!((cardinal_bspline(2.0, 3) - 2.0 / 3.0).abs() < 1e-14);
        assert!((cardinal_bspline(1.0, 3) - 1.0 / 6.0).abs() < 1e-14);
        // integer shifts sum to one
        let t = 0.37;
        let sum: f64 = (0..4).map(|k| cardinal_bspline(t + k as f64, 3)).sum();
        assert!((sum - 1.0).abs() < 1e-14);
        // full support integrates to one
        let basis = BsplineBasis::new(3);
        assert!((basis.integral(3, 3) - 0.125).abs() < 1e-12);
        let h = 1e-6;
        let numeric = (basis.eval(3, 3, 0.3 + h) - basis.eval(3, 3, 0.3 - h)) / (2.0 * h);
        assert!((basis.eval_deriv(3, 3, 0.3) - numeric).abs() < 1e-5);
    }
}
