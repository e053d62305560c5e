use rayon::{iter::{IndexedParallelIterator, IntoParallelRefIterator, ParallelIterator}, slice::ParallelSlice};
use serde::{Deserialize, Serialize};

use crate::{algorithms::refinement::RefinementFunctor, basis::base::{Basis, BasisType}, errors::SGError, storage::{GridPoint, SparseGridData}};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictiveOptions
{
    pub refinements_num: usize,
    pub threshold: f64,
    /// Rows that must lie in the support of a candidate before it gets a score.
    pub min_support_points: usize,
}

impl Default for PredictiveOptions
{
    fn default() -> Self {
        Self { refinements_num: 1, threshold: 0.0, min_support_points: 0 }
    }
}

///
/// Per candidate sums over the dataset rows.
///
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Moments
{
    error_indicator: f64,
    r2phi: f64,
    denominator: f64,
    counter: usize,
}

impl Moments
{
    fn add(self, other: Moments) -> Moments
    {
        Moments
        {
            error_indicator: self.error_indicator + other.error_indicator,
            r2phi: self.r2phi + other.r2phi,
            denominator: self.denominator + other.denominator,
            counter: self.counter + other.counter,
        }
    }
}

///
/// Predicts the error reduction of adding a basis function by projecting the residual
/// onto it: with `a = Σ φ r / Σ φ²` the reduction is `a (2 Σ φ r - a Σ φ²)`.
/// A point is scored by the indicators of the children it would get.
///
pub struct PredictiveRefinement<'a>
{
    basis: BasisType,
    options: PredictiveOptions,
    /// Row-major dataset in unit coordinates.
    points: Vec<f64>,
    errors: &'a [f64],
}

impl<'a> PredictiveRefinement<'a>
{
    ///
    /// `points` holds one dataset row per `num_inputs` chunk in real coordinates,
    /// `errors` the residual of every row.
    ///
    pub fn new(basis: BasisType, storage: &SparseGridData, points: &[f64], errors: &'a [f64], options: PredictiveOptions) -> Result<Self, SGError>
    {
        let ndim = storage.num_inputs();
        if errors.is_empty() || points.len() != errors.len() * ndim
        {
            return Err(SGError::MissingTrainingData);
        }
        let bbox = storage.bounding_box();
        let points = points.chunks_exact(ndim).flat_map(|x| bbox.to_unit_coordinate(x)).collect();
        Ok(Self { basis, options, points, errors })
    }

    fn moments(&self, point: &GridPoint) -> Moments
    {
        let ndim = point.dim();
        self.points.par_chunks_exact(ndim).zip(self.errors.par_iter()).map(|(x, &err)|
        {
            let mut phi = 1.0;
            for d in 0..ndim
            {
                phi *= self.basis.eval(point.level[d] as u32, point.index[d], x[d]).max(0.0);
                if phi == 0.0
                {
                    break;
                }
            }
            Moments { error_indicator: phi * err, r2phi: phi * err, denominator: phi * phi, counter: usize::from(phi != 0.0) }
        }).reduce(Moments::default, Moments::add)
    }

    ///
    /// Expected error reduction of adding `point` to the grid.
    ///
    pub fn indicator(&self, point: &GridPoint) -> f64
    {
        let m = self.moments(point);
        if m.denominator != 0.0 && m.counter >= self.options.min_support_points
        {
            let a = m.error_indicator / m.denominator;
            a * (2.0 * m.r2phi - a * m.denominator)
        }
        else
        {
            0.0
        }
    }

    fn missing_children(storage: &SparseGridData, point: &GridPoint, dim: usize) -> Vec<GridPoint>
    {
        let children: Vec<GridPoint> = if point.level[dim] == 0 { vec![point.root(dim)] } else { point.left_child(dim).into_iter().chain(point.right_child(dim)).collect() };
        children.into_iter().filter(|c| !storage.contains(c)).collect()
    }
}

impl RefinementFunctor for PredictiveRefinement<'_>
{
    fn score(&self, storage: &SparseGridData, seq: usize) -> f64 {
        (0..storage.num_inputs()).map(|d| self.score_per_dimension(storage, seq, d)).sum()
    }

    fn score_per_dimension(&self, storage: &SparseGridData, seq: usize, dim: usize) -> f64 {
        let point = storage.point(seq);
        Self::missing_children(storage, &point, dim).iter().map(|c| self.indicator(c)).sum()
    }

    fn refinements_num(&self) -> usize {
        self.options.refinements_num
    }

    fn threshold(&self) -> f64 {
        self.options.threshold
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::{algorithms::refinement::{BaseRefinement, RefinementMode, RefinementOptions}, generators};

    #[test]
    fn indicator_of_a_single_row()
    {
        let mut storage = SparseGridData::new(1);
        generators::regular(&mut storage, 1).unwrap();
        let errors = [2.0];
        let functor = PredictiveRefinement::new(BasisType::Linear, &storage, &[0.25], &errors, PredictiveOptions::default()).unwrap();
        // phi = 1 at the row: a = 2, reduction = 2 * (4 - 2) = 4
        assert_eq!(functor.indicator(&GridPoint::new(&[2], &[1], false)), 4.0);
        assert_eq!(functor.indicator(&GridPoint::new(&[2], &[3], false)), 0.0);
        assert_eq!(functor.score(&storage, 0), 4.0);
    }

    #[test]
    fn too_few_support_points_give_zero()
    {
        let mut storage = SparseGridData::new(1);
        generators::regular(&mut storage, 1).unwrap();
        let errors = [1.0, -1.0];
        let options = PredictiveOptions { min_support_points: 3, ..Default::default() };
        let functor = PredictiveRefinement::new(BasisType::Linear, &storage, &[0.2, 0.3], &errors, options).unwrap();
        assert_eq!(functor.indicator(&GridPoint::new(&[2], &[1], false)), 0.0);
        assert!(PredictiveRefinement::new(BasisType::Linear, &storage, &[0.2], &errors, options).is_err());
    }

    #[test]
    fn anisotropic_refinement_follows_the_residual()
    {
        let mut storage = SparseGridData::new(2);
        generators::regular(&mut storage, 1).unwrap();
        // residual concentrated left of the centre in the first direction
        let points = [0.25, 0.5, 0.2, 0.45, 0.3, 0.55];
        let errors = [1.0, 0.8, 0.9];
        let mut functor = PredictiveRefinement::new(BasisType::Linear, &storage, &points, &errors, PredictiveOptions::default()).unwrap();
        assert!(functor.score_per_dimension(&storage, 0, 0) > functor.score_per_dimension(&storage, 0, 1));
        let refinement = BaseRefinement::new(RefinementOptions::new(RefinementMode::Anisotropic));
        let new = refinement.refine(&mut storage, &mut functor).unwrap();
        assert_eq!(new.len(), 2);
        assert!(new.iter().all(|&s| storage.level(s, 0) == 2));
    }
}
