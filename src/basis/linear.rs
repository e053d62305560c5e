use super::base::Basis;

///
/// Piecewise linear hat functions. Level zero holds the two boundary functions
/// `1 - x` (index 0) and `x` (index 1), which is the same hat formula restricted
/// to the unit interval.
///
#[derive(Copy, Clone, Debug, Default)]
pub struct LinearBasis;

impl Basis for LinearBasis
{
    #[inline]
    fn eval(&self, level: u32, index: u32, x: f64) -> f64 {
        if level == 0
        {
            if index == 0
            {
                1.0 - x
            }
            else
            {
                x
            }
        }
        else
        {
            0.0_f64.max(1.0 - f64::abs((1_u64 << level) as f64 * x - index as f64))
        }
    }

    fn eval_deriv(&self, level: u32, index: u32, x: f64) -> f64 {
        if level == 0
        {
            return if index == 0 { -1.0 } else { 1.0 };
        }
        let scale = (1_u64 << level) as f64;
        let t = scale * x - index as f64;
        if t <= -1.0 || t >= 1.0
        {
            0.0
        }
        else if t < 0.0
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

    #[inline]
    fn integral(&self, level: u32, _index: u32) -> f64 {
        if level == 0
        {
            0.5
        }
        else
        {
            1.0 / (1_u64 << level) as f64
        }
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn partition_of_unity()
    {
        let basis = LinearBasis;
        for level in 1..6_u32
        {
            let h = 1.0 / (1_u64 << level) as f64;
            for &x in &[0.013, 0.25, 0.377, 0.5, 0.71, 0.999]
            {
                if x < h || x > 1.0 - h
                {
                    continue;
                }
                let sum: f64 = (1..(1_u32 << level)).map(|i| basis.eval(level, i, x)).sum();
                assert!((sum - 1.0).abs() < 1e-14);
            }
        }
    }

    #[test]
    fn values_and_derivatives()
    {
        let basis = LinearBasis;
        assert_eq!(basis.eval(1, 1, 0.5), 1.0);
        assert_eq!(basis.eval(2, 1, 0.125), 0.5);
        assert_eq!(basis.eval(2, 1, 0.5), 0.0);
        assert_eq!(basis.eval(0, 0, 0.25), 0.75);
        assert_eq!(basis.eval(0, 1, 0.25), 0.25);
        assert_eq!(basis.eval_deriv(2, 1, 0.1), 4.0);
        assert_eq!(basis.eval_deriv(2, 1, 0.3), -4.0);
        assert_eq!(basis.eval_deriv(2, 1, 0.7), 0.0);
        assert_eq!(basis.integral(3, 5), 0.125);
    }
}
