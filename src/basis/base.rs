use serde::{Deserialize, Serialize};

use super::{bspline::BsplineBasis, linear::LinearBasis, modified_linear::ModifiedLinearBasis, poly::PolyBasis};

pub trait Basis
{
    ///
    /// Value of the 1D function `(level, index)` at the unit coordinate `x`.
    /// Returns exactly zero outside the support.
    ///
    fn eval(&self, level: u32, index: u32, x: f64) -> f64;
    fn eval_deriv(&self, level: u32, index: u32, x: f64) -> f64;
    fn degree(&self) -> usize;
    ///
    /// Integral of the 1D function over the unit interval.
    ///
    fn integral(&self, level: u32, index: u32) -> f64;

    ///
    /// Support of the 1D function, clamped to the unit interval.
    ///
    fn support(&self, level: u32, index: u32) -> (f64, f64)
    {
        if level == 0
        {
            return (0.0, 1.0);
        }
        let h = 1.0 / (1_u64 << level) as f64;
        ((index as f64 - 1.0) * h, (index as f64 + 1.0) * h)
    }
}

///
/// Basis family of a grid. Chosen once when the grid is constructed; every evaluation
/// dispatches through this enum.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BasisType
{
    Linear,
    LinearBoundary,
    ModifiedLinear,
    Poly { degree: usize },
    Bspline { degree: usize },
}

impl BasisType
{
    ///
    /// True if grids of this basis carry level zero points on the domain boundary.
    ///
    pub fn has_boundary(&self) -> bool
    {
        matches!(self, BasisType::LinearBoundary)
    }
}

impl Basis for BasisType
{
    #[inline]
    fn eval(&self, level: u32, index: u32, x: f64) -> f64
    {
        match self
        {
            BasisType::Linear | BasisType::LinearBoundary => LinearBasis.eval(level, index, x),
            BasisType::ModifiedLinear => ModifiedLinearBasis.eval(level, index, x),
            BasisType::Poly { degree } => PolyBasis::new(*degree).eval(level, index, x),
            BasisType::Bspline { degree } => BsplineBasis::new(*degree).eval(level, index, x),
        }
    }

    fn eval_deriv(&self, level: u32, index: u32, x: f64) -> f64
    {
        match self
        {
            BasisType::Linear | BasisType::LinearBoundary => LinearBasis.eval_deriv(level, index, x),
            BasisType::ModifiedLinear => ModifiedLinearBasis.eval_deriv(level, index, x),
            BasisType::Poly { degree } => PolyBasis::new(*degree).eval_deriv(level, index, x),
            BasisType::Bspline { degree } => BsplineBasis::new(*degree).eval_deriv(level, index, x),
        }
    }

    fn degree(&self) -> usize
    {
        match self
        {
            BasisType::Linear | BasisType::LinearBoundary | BasisType::ModifiedLinear => 1,
            BasisType::Poly { degree } | BasisType::Bspline { degree } => *degree,
        }
    }

    fn integral(&self, level: u32, index: u32) -> f64
    {
        match self
        {
            BasisType::Linear | BasisType::LinearBoundary => LinearBasis.integral(level, index),
            BasisType::ModifiedLinear => ModifiedLinearBasis.integral(level, index),
            BasisType::Poly { degree } => PolyBasis::new(*degree).integral(level, index),
            BasisType::Bspline { degree } => BsplineBasis::new(*degree).integral(level, index),
        }
    }

    fn support(&self, level: u32, index: u32) -> (f64, f64)
    {
        match self
        {
            BasisType::ModifiedLinear => ModifiedLinearBasis.support(level, index),
            BasisType::Bspline { degree } => BsplineBasis::new(*degree).support(level, index),
            _ => LinearBasis.support(level, index),
        }
    }
}
