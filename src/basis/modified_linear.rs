use super::base::Basis;

///
/// Linear hats whose boundary-adjacent functions are extrapolated to the domain edge,
/// so that no boundary points are needed. The single level one function is constant.
///
#[derive(Copy, Clone, Debug, Default)]
pub struct ModifiedLinearBasis;

impl Basis for ModifiedLinearBasis
{
    #[inline]
    fn eval(&self, level: u32, index: u32, x: f64) -> f64 {
        if level == 1
        {
            return 1.0;
        }
        let scale = (1_u64 << level) as f64;
        if index == 1
        {
            0.0_f64.max(2.0 - scale * x)
        }
        else if index as u64 == (1_u64 << level) - 1
        {
            0.0_f64.max(scale * x - index as f64 + 1.0)
        }
        else
        {
            0.0_f64.max(1.0 - f64::abs(scale * x - index as f64))
        }
    }

    fn eval_deriv(&self, level: u32, index: u32, x: f64) -> f64 {
        if level == 1
        {
            return 0.0;
        }
        let scale = (1_u64 << level) as f64;
        let (lo, hi) = self.support(level, index);
        if x <= lo || x >= hi
        {
            return 0.0;
        }
        if index == 1
        {
            -scale
        }
        else if index as u64 == (1_u64 << level) - 1
        {
            scale
        }
        else if scale * x < index as f64
        {
            scale
        }
        else
        {
            -scale
        }
    }

    fn degree(&self) -> usize {
        1
    }

    fn integral(&self, level: u32, index: u32) -> f64 {
        if level == 1
        {
            1.0
        }
        else if index == 1 || index as u64 == (1_u64 << level) - 1
        {
            2.0 / (1_u64 << level) as f64
        }
        else
        {
            1.0 / (1_u64 << level) as f64
        }
    }

    fn support(&self, level: u32, index: u32) -> (f64, f64)
    {
        if level == 1
        {
            return (0.0, 1.0);
        }
        let h = 1.0 / (1_u64 << level) as f64;
        let lo = if index == 1 { 0.0 } else { (index as f64 - 1.0) * h };
        let hi = if index as u64 == (1_u64 << level) - 1 { 1.0 } else { (index as f64 + 1.0) * h };
        (lo, hi)
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn modified_linear_values()
    {
        let basis = ModifiedLinearBasis;
        assert_eq!(basis.eval(1, 1, 0.3), 1.0);
        assert_eq!(basis.eval(2, 1, 0.125), 1.5);
        assert_eq!(basis.eval(2, 1, 0.375), 0.5);
        assert_eq!(basis.eval(2, 3, 0.875), 1.5);
        assert_eq!(basis.eval(3, 3, 0.4375), 0.5);
        assert_eq!(basis.eval(3, 3, 0.6), 0.0);
        assert_eq!(basis.eval(2, 1, 0.25), 1.0);
        assert_eq!(basis.integral(2, 3), 0.5);
        assert_eq!(basis.eval_deriv(3, 7, 0.9), 8.0);
        assert_eq!(basis.support(3, 1), (0.0, 0.25));
    }
}
